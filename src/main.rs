//! # Notebook Router CLI (`nbr`)
//!
//! Routes questions about the Exeol product lines to the matching
//! NotebookLM notebook and prints the answer.
//!
//! ## Usage
//!
//! ```bash
//! nbr --config ./config/nbr.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `nbr ask "<question>"` | Classify, route, optionally research, and answer |
//! | `nbr classify "<question>"` | Show the category and notebook a question routes to |
//! | `nbr notebooks` | List notebooks visible to the engine account |
//! | `nbr sources` | List the sources of a notebook |
//! | `nbr add-source <path>` | Upload a document into a notebook |
//! | `nbr bindings` | Show the category → notebook table |
//! | `nbr health` | Check the engine install and notebook configuration |
//!
//! ## Examples
//!
//! ```bash
//! # Ask with automatic routing
//! nbr ask "Nồng độ sử dụng của Exeol OPA là bao nhiêu?"
//!
//! # Continue a conversation in a specific notebook
//! nbr ask "Còn thời gian ngâm?" --notebook 3f1c0d9e --conversation-id abc-123
//!
//! # Run a deep research pass before answering, JSON output
//! nbr ask "So sánh Cidex OPA và Exeol OPA" --mode extended --json
//! ```

use clap::{Parser, Subcommand};
use notebook_router::commands::{self, AskOptions};
use notebook_router::config;
use notebook_router::error::QueryError;
use notebook_router::service::QueryService;
use notebook_router_core::models::QueryMode;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Notebook Router: answers product questions from NotebookLM notebooks.
///
/// Notebook ids come from the `[notebooks]` table of the config file or
/// from `NOTEBOOK_ID_<CATEGORY>` variables (a `.env` file is read first).
#[derive(Parser)]
#[command(
    name = "nbr",
    about = "Route product questions to NotebookLM notebooks and answer them",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/nbr.toml`; built-in defaults apply when that
    /// file does not exist.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print internal error detail alongside user-facing messages.
    #[arg(long, global = true)]
    dev: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a question.
    ///
    /// Without `--notebook`, the question is classified and routed to the
    /// notebook bound to its category, falling back to the default notebook.
    Ask {
        question: String,

        /// Ask this notebook directly; skips classification.
        #[arg(long)]
        notebook: Option<String>,

        /// Continue an earlier conversation.
        #[arg(long)]
        conversation_id: Option<String>,

        /// `quick` (fast research), `extended` (deep research), or `chat`.
        #[arg(long, default_value = "chat")]
        mode: QueryMode,

        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Classify a question without answering it.
    Classify { question: String },

    /// List notebooks visible to the engine account.
    Notebooks,

    /// List the sources of a notebook (default notebook when omitted).
    Sources {
        #[arg(long)]
        notebook: Option<String>,
    },

    /// Upload a document into a notebook (default notebook when omitted).
    AddSource {
        path: PathBuf,

        #[arg(long)]
        notebook: Option<String>,
    },

    /// Show category → notebook bindings.
    Bindings,

    /// Check that the engine is installed and notebooks are configured.
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cfg = config::load_or_default(cli.config.as_deref())?;
    let dev_mode = cli.dev || cfg.answer.dev_mode;
    let service = QueryService::from_config(&cfg)?;

    let outcome = match cli.command {
        Commands::Ask {
            question,
            notebook,
            conversation_id,
            mode,
            json,
        } => {
            let options = AskOptions {
                notebook,
                conversation_id,
                mode,
                json,
            };
            commands::run_ask(&service, &question, options).await
        }
        Commands::Classify { question } => commands::run_classify(&service, &question).await,
        Commands::Notebooks => commands::run_notebooks(&service).await,
        Commands::Sources { notebook } => {
            commands::run_sources(&service, notebook.as_deref()).await
        }
        Commands::AddSource { path, notebook } => {
            commands::run_add_source(&service, &path, notebook.as_deref()).await
        }
        Commands::Bindings => commands::run_bindings(&service),
        Commands::Health => match commands::run_health(&service).await {
            Ok(true) => Ok(()),
            Ok(false) => std::process::exit(1),
            Err(e) => Err(e),
        },
    };

    match outcome {
        Ok(()) => Ok(()),
        Err(err) => match err.downcast_ref::<QueryError>() {
            Some(query_err) => {
                eprintln!("{}", query_err.user_message());
                if dev_mode {
                    if let Some(detail) = query_err.detail() {
                        eprintln!("[{}] {}", query_err.code(), detail);
                    }
                }
                std::process::exit(1);
            }
            None => Err(err),
        },
    }
}
