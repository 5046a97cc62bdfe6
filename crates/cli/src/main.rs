use anyhow::Result;
use clap::{Parser, Subcommand};
use foresight_cli::app::{now_ms, now_s, AppConfig, AppState};
use foresight_predict::PredictInput;
use foresight_protocol::serialize_json;
use foresight_ranking::Weights;
use foresight_symbols::QueryMode;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "foresight")]
#[command(about = "Local code intelligence: learns tool usage, predicts next reads", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(long, global = true)]
    quiet: bool,

    /// Data directory (overrides FORESIGHT_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP surface for hooks and the CLI
    Serve {
        /// Bind address
        #[arg(long, default_value = "127.0.0.1:8700")]
        bind: String,

        /// Project root to enable (defaults to current directory)
        #[arg(long)]
        project_root: Option<PathBuf>,

        /// Disable the file watcher
        #[arg(long)]
        no_watch: bool,
    },

    /// Index a project directory
    Index {
        /// Project path to index
        path: Option<PathBuf>,
    },

    /// Look up a symbol in the index
    Symbol {
        /// Token to search for
        query: String,

        #[arg(short, long, default_value_t = 20)]
        limit: usize,

        /// Require every token (AND) instead of any (OR)
        #[arg(long)]
        and: bool,
    },

    /// Rank files by recency, frequency, and tag affinity
    Rank {
        /// Boost files carrying this tag
        #[arg(long)]
        tag: Option<String>,

        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Predict the next files for an intent
    Predict {
        /// Intent text
        intent: String,

        /// Anchor file for transition evidence
        #[arg(long)]
        current_file: Option<String>,

        #[arg(short, long, default_value_t = 5)]
        limit: usize,
    },
}

fn init_logging(verbose: bool, quiet: bool) {
    let default_filter = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .target(env_logger::Target::Stderr)
        .init();
}

fn config_for(data_dir: Option<PathBuf>, watch: bool) -> AppConfig {
    let mut config = match data_dir {
        Some(dir) => AppConfig::with_data_dir(dir),
        None => AppConfig::from_env(),
    };
    config.watch = watch;
    config
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serialize_json(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Serve {
            bind,
            project_root,
            no_watch,
        } => {
            let root = match project_root {
                Some(root) => root,
                None => std::env::current_dir()?,
            };
            let config = config_for(cli.data_dir, !no_watch);
            foresight_cli::serve(config, &root, &bind).await
        }

        Commands::Index { path } => {
            let root = match path {
                Some(path) => path,
                None => std::env::current_dir()?,
            };
            let config = config_for(cli.data_dir, false);
            let state = AppState::initialize(config).await?;
            let ctx = state.enable_project(&root).await?;
            let stats = ctx.indexer.index().await?;
            print_json(&stats)
        }

        Commands::Symbol { query, limit, and } => {
            let config = config_for(cli.data_dir, false);
            let state = AppState::initialize(config).await?;
            let ctx = state.enable_project(&std::env::current_dir()?).await?;
            let terms: Vec<String> = query.split_whitespace().map(str::to_string).collect();
            let mode = if and { QueryMode::And } else { QueryMode::Or };
            let hits = ctx.indexer.store().multi(&terms, mode, limit);
            print_json(&hits)
        }

        Commands::Rank { tag, limit } => {
            let config = config_for(cli.data_dir, false);
            let state = AppState::initialize(config).await?;
            let ctx = state.enable_project(&std::env::current_dir()?).await?;
            let tags: Vec<String> = tag.into_iter().collect();
            let ranked = ctx
                .engine
                .scorer()
                .top_composite(&tags, Weights::default(), limit, now_s());
            print_json(
                &ranked
                    .into_iter()
                    .map(|r| {
                        serde_json::json!({
                            "path": r.path,
                            "recency": r.recency,
                            "frequency": r.frequency,
                            "tag": r.tag,
                            "composite": r.composite,
                        })
                    })
                    .collect::<Vec<_>>(),
            )
        }

        Commands::Predict {
            intent,
            current_file,
            limit,
        } => {
            let config = config_for(cli.data_dir, false);
            let state = AppState::initialize(config).await?;
            let ctx = state.enable_project(&std::env::current_dir()?).await?;
            let outcome = ctx
                .engine
                .predict(
                    PredictInput {
                        intent: Some(intent),
                        current_file,
                        session: "cli".to_string(),
                        limit: Some(limit),
                        ..PredictInput::default()
                    },
                    now_ms(),
                )
                .await;
            print_json(
                &outcome
                    .files
                    .into_iter()
                    .map(|f| {
                        serde_json::json!({
                            "path": f.path,
                            "confidence": f.confidence,
                        })
                    })
                    .collect::<Vec<_>>(),
            )
        }
    }
}
