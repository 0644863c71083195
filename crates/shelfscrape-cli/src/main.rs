//! Shelfscrape — entry point.

mod commands;
mod output;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use crate::output::Output;

#[derive(Parser)]
#[command(
    name = "shelfscrape",
    about = "Mirror a storefront's book listings into a local catalog",
    version
)]
struct Cli {
    /// Path to the catalog database. Also reads SHELFSCRAPE_DB.
    #[arg(long, global = true)]
    db: Option<String>,

    /// Print machine-readable JSON instead of tables.
    #[arg(long, global = true)]
    json: bool,

    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seed or refresh the navigation table.
    Bootstrap,

    /// List navigation entries.
    Nav,

    /// Scrape one category and reconcile it into the catalog.
    Scrape {
        /// Category slug, with or without the `-books` suffix.
        category: String,
    },

    /// Show a product with its long-form detail, fetching it on first request.
    Detail {
        /// Product source id (e.g. `the-great-escape`).
        source_id: String,
    },

    /// Page through stored products of a category.
    Books {
        category: String,

        /// 1-based page number.
        #[arg(long, default_value_t = 1)]
        page: u32,
    },

    /// Case-insensitive title search over stored products.
    Search { query: String },

    /// Show catalog row counts and browser availability.
    Status,

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   shelfscrape completions bash > ~/.local/share/bash-completion/completions/shelfscrape
    ///   shelfscrape completions zsh > ~/.zfunc/_shelfscrape
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let out = Output::new(cli.json);
    let db = cli.db.as_deref();

    match cli.command {
        Commands::Bootstrap => commands::bootstrap(db, &out).await,
        Commands::Nav => commands::nav(db, &out).await,
        Commands::Scrape { category } => commands::scrape(db, &category, &out).await,
        Commands::Detail { source_id } => commands::detail(db, &source_id, &out).await,
        Commands::Books { category, page } => commands::books(db, &category, page, &out).await,
        Commands::Search { query } => commands::search(db, &query, &out).await,
        Commands::Status => commands::status(db, &out).await,
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "shelfscrape",
                &mut std::io::stdout(),
            );
            Ok(())
        }
    }
}
