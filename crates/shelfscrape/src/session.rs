//! Bounded browser sessions.
//!
//! A session visits at most `max_pages` targets, each under a per-page
//! timeout, with image/font/stylesheet/script requests suppressed. It always
//! completes: every failure becomes a [`Diagnostic`] and the DOM present at
//! the timeout boundary is still handed on for extraction.

use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::renderer::{RenderContext, Renderer};
use crate::report::Diagnostic;

/// Clicks the first visible button/link whose accessible name reads like
/// "accept" or "allow". Evaluates to whether anything was clicked.
const CONSENT_SCRIPT: &str = r#"(() => {
  const pattern = /accept|allow/i;
  const candidates = document.querySelectorAll('button, [role="button"], a, input[type="button"], input[type="submit"]');
  for (const el of candidates) {
    const name = (el.getAttribute('aria-label') || el.innerText || el.value || '').trim();
    if (!pattern.test(name)) continue;
    const rect = el.getBoundingClientRect();
    const style = window.getComputedStyle(el);
    if (rect.width === 0 || rect.height === 0 || style.visibility === 'hidden' || style.display === 'none') continue;
    el.click();
    return true;
  }
  return false;
})()"#;

/// Rendered DOM of one visited page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomSnapshot {
    /// Requested URL.
    pub url: String,
    /// URL the page ended up on; relative links resolve against this.
    pub final_url: String,
    pub html: String,
}

/// Everything a session captured, plus what went wrong.
#[derive(Debug, Default)]
pub struct SessionOutcome {
    pub snapshots: Vec<DomSnapshot>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Runs bounded sessions against a renderer.
pub struct SessionDriver<'a> {
    renderer: &'a dyn Renderer,
    config: SessionConfig,
}

impl<'a> SessionDriver<'a> {
    pub fn new(renderer: &'a dyn Renderer, config: SessionConfig) -> Self {
        Self { renderer, config }
    }

    /// Visit the targets in order and collect their DOM.
    ///
    /// Every renderer call is bounded by the per-page timeout and every
    /// visit by what is left of the session budget, so this always returns.
    pub async fn run(&self, targets: &[String]) -> SessionOutcome {
        let mut outcome = SessionOutcome::default();
        let started = Instant::now();
        let budget = Duration::from_millis(self.config.session_timeout_ms);

        let limit = self.config.max_pages.max(1);
        if targets.len() > limit {
            warn!(
                limit,
                requested = targets.len(),
                "page cap reached; dropping extra targets"
            );
            outcome.diagnostics.push(Diagnostic::PageLimitReached {
                limit,
                dropped: targets.len() - limit,
            });
        }

        let batch = &targets[..targets.len().min(limit)];
        for (i, url) in batch.iter().enumerate() {
            let remaining = budget.saturating_sub(started.elapsed());
            let finished = !remaining.is_zero()
                && tokio::time::timeout(remaining, self.visit(url, &mut outcome))
                    .await
                    .is_ok();
            if !finished {
                let skipped = batch.len() - i;
                warn!(url, skipped, "session budget exhausted");
                outcome
                    .diagnostics
                    .push(Diagnostic::SessionBudgetExhausted { skipped });
                break;
            }
        }

        info!(
            pages = outcome.snapshots.len(),
            issues = outcome.diagnostics.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "session finished"
        );
        outcome
    }

    async fn visit(&self, url: &str, outcome: &mut SessionOutcome) {
        let mut ctx = match self.step(self.renderer.new_context()).await {
            Ok(ctx) => ctx,
            Err(failure) => {
                warn!(url, "cannot open browser context: {failure}");
                outcome.diagnostics.push(Diagnostic::ContextUnavailable {
                    url: url.to_string(),
                    reason: failure.to_string(),
                });
                return;
            }
        };

        let patterns = self.config.blocked_url_patterns();
        match self.step(ctx.block_urls(&patterns)).await {
            Ok(()) => {}
            Err(StepFailure::TimedOut(_)) => step_timed_out(url, "block_urls", outcome),
            Err(failure) => debug!(url, "resource suppression unavailable: {failure}"),
        }

        let mut final_url = url.to_string();
        match self
            .step(ctx.navigate(url, self.config.page_timeout_ms))
            .await
        {
            Ok(nav) => {
                debug!(url, load_time_ms = nav.load_time_ms, "page loaded");
                final_url = nav.final_url;
            }
            Err(failure) => {
                warn!(url, "page load incomplete, scraping whatever loaded: {failure}");
                outcome.diagnostics.push(Diagnostic::NavigationFailed {
                    url: url.to_string(),
                    reason: failure.to_string(),
                });
                match self.step(ctx.get_url()).await {
                    Ok(current) if !current.is_empty() && current != "about:blank" => {
                        final_url = current;
                    }
                    Ok(_) => {}
                    Err(StepFailure::TimedOut(_)) => step_timed_out(url, "get_url", outcome),
                    Err(failure) => debug!(url, "current URL unavailable: {failure}"),
                }
            }
        }

        if self.config.dismiss_consent {
            self.dismiss_consent(ctx.as_ref(), url, outcome).await;
        }

        match self.step(ctx.get_html()).await {
            Ok(html) => outcome.snapshots.push(DomSnapshot {
                url: url.to_string(),
                final_url,
                html,
            }),
            Err(failure) => {
                warn!(url, "no DOM captured: {failure}");
                outcome.diagnostics.push(Diagnostic::SnapshotUnavailable {
                    url: url.to_string(),
                    reason: failure.to_string(),
                });
            }
        }

        match self.step(ctx.close()).await {
            Ok(()) => {}
            Err(StepFailure::TimedOut(_)) => step_timed_out(url, "close", outcome),
            Err(failure) => debug!(url, "context close failed: {failure}"),
        }
    }

    /// Best effort; absence or failure of a banner is not reported.
    async fn dismiss_consent(
        &self,
        ctx: &dyn RenderContext,
        url: &str,
        outcome: &mut SessionOutcome,
    ) {
        match self.step(ctx.execute_js(CONSENT_SCRIPT)).await {
            Ok(clicked) if clicked.as_bool() == Some(true) => {
                debug!(url, "dismissed consent banner");
            }
            Ok(_) => {}
            Err(StepFailure::TimedOut(_)) => step_timed_out(url, "consent", outcome),
            Err(failure) => debug!(url, "consent dismissal skipped: {failure}"),
        }
    }

    /// Run one renderer call under the per-page timeout.
    async fn step<T, F>(&self, call: F) -> Result<T, StepFailure>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        let limit = self.config.page_timeout_ms;
        match tokio::time::timeout(Duration::from_millis(limit), call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(StepFailure::Failed(format!("{e:#}"))),
            Err(_) => Err(StepFailure::TimedOut(limit)),
        }
    }
}

/// Why a renderer call produced no value.
enum StepFailure {
    Failed(String),
    TimedOut(u64),
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepFailure::Failed(reason) => f.write_str(reason),
            StepFailure::TimedOut(ms) => write!(f, "timed out after {ms}ms"),
        }
    }
}

fn step_timed_out(url: &str, step: &str, outcome: &mut SessionOutcome) {
    warn!(url, step, "browser call timed out");
    outcome.diagnostics.push(Diagnostic::StepTimedOut {
        url: url.to_string(),
        step: step.to_string(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::NavigationResult;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Scripted context: optional navigation failure, fixed HTML, and one
    /// step that can be made to never resolve.
    struct ScriptedContext {
        html: Option<String>,
        fail_navigation: bool,
        hang: Option<&'static str>,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedContext {
        async fn maybe_hang(&self, step: &str) {
            if self.hang == Some(step) {
                std::future::pending::<()>().await;
            }
        }
    }

    #[async_trait]
    impl RenderContext for ScriptedContext {
        async fn block_urls(&mut self, patterns: &[String]) -> Result<()> {
            self.log
                .lock()
                .unwrap()
                .push(format!("block:{}", patterns.len()));
            Ok(())
        }
        async fn navigate(&mut self, url: &str, _timeout_ms: u64) -> Result<NavigationResult> {
            self.log.lock().unwrap().push(format!("goto:{url}"));
            self.maybe_hang("navigate").await;
            if self.fail_navigation {
                anyhow::bail!("navigation timed out after 10ms");
            }
            Ok(NavigationResult {
                final_url: format!("{url}?landed"),
                load_time_ms: 1,
            })
        }
        async fn execute_js(&self, _script: &str) -> Result<serde_json::Value> {
            self.log.lock().unwrap().push("consent".to_string());
            self.maybe_hang("consent").await;
            anyhow::bail!("no banner")
        }
        async fn get_html(&self) -> Result<String> {
            self.html.clone().ok_or_else(|| anyhow::anyhow!("page crashed"))
        }
        async fn get_url(&self) -> Result<String> {
            Ok("about:blank".to_string())
        }
        async fn close(self: Box<Self>) -> Result<()> {
            Ok(())
        }
    }

    struct ScriptedRenderer {
        html: Option<String>,
        fail_navigation: bool,
        hang: Option<&'static str>,
        opened: AtomicUsize,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedRenderer {
        fn new(html: Option<&str>, fail_navigation: bool) -> Self {
            Self {
                html: html.map(str::to_string),
                fail_navigation,
                hang: None,
                opened: AtomicUsize::new(0),
                log: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn hanging_at(mut self, step: &'static str) -> Self {
            self.hang = Some(step);
            self
        }
    }

    #[async_trait]
    impl Renderer for ScriptedRenderer {
        async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(ScriptedContext {
                html: self.html.clone(),
                fail_navigation: self.fail_navigation,
                hang: self.hang,
                log: Arc::clone(&self.log),
            }))
        }
        async fn shutdown(&self) -> Result<()> {
            Ok(())
        }
        fn active_contexts(&self) -> usize {
            0
        }
    }

    fn targets(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("https://shop.test/c/{i}")).collect()
    }

    #[tokio::test]
    async fn test_session_captures_snapshot() {
        let renderer = ScriptedRenderer::new(Some("<p>ok</p>"), false);
        let driver = SessionDriver::new(&renderer, SessionConfig::default());

        let outcome = driver.run(&targets(1)).await;
        assert_eq!(outcome.snapshots.len(), 1);
        assert_eq!(outcome.snapshots[0].final_url, "https://shop.test/c/0?landed");
        assert!(outcome.diagnostics.is_empty());

        let log = renderer.log.lock().unwrap().clone();
        assert!(log[0].starts_with("block:"));
        assert!(log.contains(&"consent".to_string()));
    }

    #[tokio::test]
    async fn test_navigation_failure_still_extracts_partial_dom() {
        let renderer = ScriptedRenderer::new(Some("<p>partial</p>"), true);
        let driver = SessionDriver::new(&renderer, SessionConfig::default());

        let outcome = driver.run(&targets(1)).await;
        assert_eq!(outcome.snapshots.len(), 1);
        assert_eq!(outcome.snapshots[0].html, "<p>partial</p>");
        assert_eq!(outcome.snapshots[0].final_url, "https://shop.test/c/0");
        assert!(matches!(
            outcome.diagnostics.as_slice(),
            [Diagnostic::NavigationFailed { .. }]
        ));
    }

    #[tokio::test]
    async fn test_missing_dom_is_reported_not_raised() {
        let renderer = ScriptedRenderer::new(None, false);
        let driver = SessionDriver::new(&renderer, SessionConfig::default());

        let outcome = driver.run(&targets(1)).await;
        assert!(outcome.snapshots.is_empty());
        assert!(outcome.diagnostics[0].is_upstream_unavailable());
    }

    #[tokio::test]
    async fn test_page_cap_bounds_loads() {
        let renderer = ScriptedRenderer::new(Some("<p/>"), false);
        let config = SessionConfig {
            max_pages: 2,
            ..SessionConfig::default()
        };
        let driver = SessionDriver::new(&renderer, config);

        let outcome = driver.run(&targets(5)).await;
        assert_eq!(renderer.opened.load(Ordering::SeqCst), 2);
        assert_eq!(outcome.snapshots.len(), 2);
        assert!(outcome.diagnostics.contains(&Diagnostic::PageLimitReached {
            limit: 2,
            dropped: 3
        }));
    }

    #[tokio::test]
    async fn test_consent_step_can_be_disabled() {
        let renderer = ScriptedRenderer::new(Some("<p/>"), false);
        let config = SessionConfig {
            dismiss_consent: false,
            ..SessionConfig::default()
        };
        SessionDriver::new(&renderer, config).run(&targets(1)).await;
        assert!(!renderer.log.lock().unwrap().contains(&"consent".to_string()));
    }

    #[tokio::test]
    async fn test_noop_renderer_completes_with_diagnostic() {
        let renderer = crate::renderer::NoopRenderer;
        let outcome = SessionDriver::new(&renderer, SessionConfig::default())
            .run(&targets(1))
            .await;
        assert!(outcome.snapshots.is_empty());
        assert!(matches!(
            outcome.diagnostics.as_slice(),
            [Diagnostic::ContextUnavailable { .. }]
        ));
    }

    #[tokio::test]
    async fn test_hung_consent_script_is_bounded_by_page_timeout() {
        let renderer = ScriptedRenderer::new(Some("<p>ok</p>"), false).hanging_at("consent");
        let config = SessionConfig {
            page_timeout_ms: 50,
            session_timeout_ms: 5_000,
            ..SessionConfig::default()
        };
        let driver = SessionDriver::new(&renderer, config);

        let outcome = tokio::time::timeout(Duration::from_secs(3), driver.run(&targets(1)))
            .await
            .expect("session must finish");
        assert_eq!(outcome.snapshots.len(), 1);
        assert!(outcome.diagnostics.contains(&Diagnostic::StepTimedOut {
            url: "https://shop.test/c/0".to_string(),
            step: "consent".to_string(),
        }));
    }

    #[tokio::test]
    async fn test_session_budget_bounds_a_single_target() {
        let renderer = ScriptedRenderer::new(Some("<p/>"), false).hanging_at("navigate");
        let config = SessionConfig {
            page_timeout_ms: 60_000,
            session_timeout_ms: 100,
            ..SessionConfig::default()
        };
        let driver = SessionDriver::new(&renderer, config);

        let outcome = tokio::time::timeout(Duration::from_secs(3), driver.run(&targets(1)))
            .await
            .expect("session must finish");
        assert!(outcome.snapshots.is_empty());
        assert_eq!(
            outcome.diagnostics,
            vec![Diagnostic::SessionBudgetExhausted { skipped: 1 }]
        );
    }
}
