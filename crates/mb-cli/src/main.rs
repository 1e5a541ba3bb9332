//! macroboard command line
//!
//! Runs saved boards against dry-run devices and parses, validates,
//! executes or imports scripts.

mod ports;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mb_config::{load_config, MacroboardConfig};
use mb_core::{board_to_json, load_board, save_board, ActionResult};
use mb_engine::{ExecutionEngine, HandlerRegistry, InMemoryRecordStore, RecordStore, RecordTable};
use mb_script::{parse_file, LegacyImporter, RunMode, ScriptRunner, Validator};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::ports::dry_run_ports;

#[derive(Parser)]
#[command(name = "macroboard")]
#[command(about = "Desktop automation boards and script runner")]
#[command(version)]
struct Cli {
    /// YAML configuration file
    #[arg(long, global = true, env = "MACROBOARD_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter (overrides RUST_LOG and the configured level)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a saved board with dry-run devices
    Run {
        /// Board JSON file
        board: PathBuf,

        /// JSON object of record tables, keyed by store name
        #[arg(long)]
        records: Option<PathBuf>,
    },

    /// Print the parsed script model as JSON
    Parse { script: PathBuf },

    /// Print diagnostics; exits non-zero when the script is invalid
    Validate { script: PathBuf },

    /// Run a script natively or in emulation
    Exec {
        script: PathBuf,

        /// auto, native or emulated
        #[arg(long, default_value = "auto")]
        mode: RunMode,

        /// Native run limit in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Refuse scripts outside this directory
        #[arg(long)]
        allowed_root: Option<PathBuf>,
    },

    /// Translate a script or legacy macro into a board
    Import {
        script: PathBuf,

        /// Output file; the board is printed when omitted
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)
            .with_context(|| format!("failed to load configuration {}", path.display()))?,
        None => MacroboardConfig::default(),
    };
    init_logging(cli.log_level.as_deref(), &config)?;

    match cli.command {
        Commands::Run { board, records } => run_board(&config, &board, records.as_deref()).await,
        Commands::Parse { script } => {
            let script = parse_file(&script)?;
            println!("{}", serde_json::to_string_pretty(&script)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Validate { script } => {
            let result = Validator::new().validate(&parse_file(&script)?);
            for diagnostic in &result.diagnostics {
                println!("{}", diagnostic);
            }
            println!("{}", if result.is_valid { "valid" } else { "invalid" });
            Ok(exit_code(result.is_valid))
        }
        Commands::Exec {
            script,
            mode,
            timeout,
            allowed_root,
        } => {
            let engine = build_engine(&config, None);
            let runner = ScriptRunner::new(engine.clone(), config.script.clone());
            let stopper = spawn_stop_on_ctrl_c(engine);
            let execution = runner
                .execute_file(
                    &script,
                    mode,
                    timeout.map(Duration::from_secs),
                    allowed_root.as_deref(),
                )
                .await;
            stopper.abort();
            println!("{}", serde_json::to_string_pretty(&execution)?);
            Ok(exit_code(execution.success))
        }
        Commands::Import { script, output } => {
            let board = LegacyImporter::default().import_file(&script)?;
            match output {
                Some(path) => {
                    save_board(&board, &path)?;
                    info!(path = %path.display(), actions = board.action_count(), "Board written");
                }
                None => println!("{}", board_to_json(&board)?),
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init_logging(cli_level: Option<&str>, config: &MacroboardConfig) -> Result<()> {
    let filter = match cli_level {
        Some(level) => EnvFilter::try_new(level)?,
        None => EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&config.logging.level))?,
    };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn build_engine(config: &MacroboardConfig, records: Option<Arc<dyn RecordStore>>) -> Arc<ExecutionEngine> {
    let registry = Arc::new(HandlerRegistry::new(dry_run_ports(records), config.engine.clone()));
    Arc::new(ExecutionEngine::new(registry, config.engine.clone()))
}

/// Request a stop when Ctrl-C arrives; the current action still finishes
fn spawn_stop_on_ctrl_c(engine: Arc<ExecutionEngine>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; stopping after the current action");
            engine.stop();
        }
    })
}

fn load_records(path: &Path) -> Result<InMemoryRecordStore> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read records {}", path.display()))?;
    let tables: HashMap<String, RecordTable> = serde_json::from_str(&text)
        .with_context(|| format!("invalid records file {}", path.display()))?;
    Ok(InMemoryRecordStore::from_tables(tables))
}

async fn run_board(config: &MacroboardConfig, path: &Path, records: Option<&Path>) -> Result<ExitCode> {
    let board = load_board(path)?;
    let records = match records {
        Some(path) => Some(Arc::new(load_records(path)?) as Arc<dyn RecordStore>),
        None => None,
    };

    let engine = build_engine(config, records);
    let stopper = spawn_stop_on_ctrl_c(engine.clone());
    let results = engine.execute_board(board).await?;
    stopper.abort();

    for result in &results {
        println!("{}", result);
    }
    let failed = results.iter().filter(|r| !r.success).count();
    println!("{} actions, {} unsuccessful", results.len(), failed);
    Ok(exit_code(all_succeeded(&results)))
}

fn all_succeeded(results: &[ActionResult]) -> bool {
    results.iter().all(|r| r.success)
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
