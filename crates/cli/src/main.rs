//! QA Base CLI
//!
//! Main entry point for the qabase command-line tool.
//! Manages question/answer knowledge bases and their vector indices.

mod commands;

use clap::{Parser, Subcommand};
use commands::{
    AddCommand, DeleteCommand, IndicesCommand, QueryCommand, ReindexCommand, UpdateCommand,
};
use qabase_core::{config::AppConfig, logging, AppResult};
use std::path::PathBuf;

/// QA Base - question/answer knowledge bases with similarity search
#[derive(Parser, Debug)]
#[command(name = "qabase")]
#[command(about = "Question/answer knowledge bases with similarity search", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "QABASE_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "QABASE_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Write logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Rebuild every index from the stored records
    Reindex(ReindexCommand),

    /// Add a question/answer pair
    Add(AddCommand),

    /// Update a question/answer pair
    Update(UpdateCommand),

    /// Delete a question/answer pair
    Delete(DeleteCommand),

    /// Query a knowledge base
    Query(QueryCommand),

    /// Show loaded indices
    Indices(IndicesCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Load configuration from defaults, config file and environment
    let config = AppConfig::load(cli.workspace, cli.config)?;

    // Apply CLI overrides
    let config = config.with_overrides(cli.log_level, cli.verbose, cli.no_color, cli.json_logs);

    // Initialize logging with final configuration
    logging::init_logging(config.log_level.as_deref(), config.no_color, config.json_logs)?;

    config.validate()?;

    // Log startup
    tracing::info!("QA Base CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!(
        "Embedding: {} / {} ({} dims)",
        config.embedding.provider,
        config.embedding.model,
        config.embedding.dimensions
    );

    // Ensure .qabase directory exists
    config.ensure_state_dir()?;

    let command_name = match &cli.command {
        Commands::Reindex(_) => "reindex",
        Commands::Add(_) => "add",
        Commands::Update(_) => "update",
        Commands::Delete(_) => "delete",
        Commands::Query(_) => "query",
        Commands::Indices(_) => "indices",
    };
    let span = tracing::info_span!("command", name = command_name);

    let result = tracing::Instrument::instrument(run(cli.command, &config), span).await;

    // Log completion
    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}

async fn run(command: Commands, config: &AppConfig) -> AppResult<()> {
    let orchestrator = qabase_knowledge::open(config).await?;

    let loaded = orchestrator.bootstrap().await?;
    tracing::debug!("Loaded {} indices at startup", loaded);

    // Route to command handlers
    match command {
        Commands::Reindex(cmd) => cmd.execute(&orchestrator).await,
        Commands::Add(cmd) => cmd.execute(&orchestrator).await,
        Commands::Update(cmd) => cmd.execute(&orchestrator).await,
        Commands::Delete(cmd) => cmd.execute(&orchestrator).await,
        Commands::Query(cmd) => cmd.execute(&orchestrator).await,
        Commands::Indices(cmd) => cmd.execute(&orchestrator).await,
    }
}
