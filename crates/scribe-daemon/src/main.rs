use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use scribe_core::config::ScribeConfig;
use scribe_core::{Execution, Result as ScribeResult, ScribeError};
use scribe_pipeline::{ContentGenerator, Executor, GenerateRequest};
use scribe_scheduler::{JobService, Scheduler};
use scribe_store::SqliteStore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

mod openai;
mod wordpress;

#[derive(Parser)]
#[command(name = "scribe-daemon", version, about = "Scheduled content production engine")]
struct Cli {
    /// Config file (default: $SCRIBE_CONFIG, then ~/.scribe/scribe.toml).
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the scheduler until interrupted.
    Run,
    /// Execute one job now and reschedule it.
    RunJob { id: String },
    /// List executions waiting for validation.
    Pending,
    /// Approve or reject an execution waiting for validation.
    Validate {
        execution_id: String,
        #[arg(long, conflicts_with = "reject", required_unless_present = "reject")]
        approve: bool,
        #[arg(long)]
        reject: bool,
    },
    /// List all jobs.
    Jobs,
    /// Check that a site's publishing endpoint accepts its credentials.
    Check { site_id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "scribe_daemon=info,scribe_scheduler=info,scribe_pipeline=info".into()
            }),
        )
        .init();

    let cli = Cli::parse();

    // load config: --config > SCRIBE_CONFIG env > ~/.scribe/scribe.toml
    let config_path = cli.config.clone().or_else(|| std::env::var("SCRIBE_CONFIG").ok());
    let config = ScribeConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        ScribeConfig::default()
    });

    let db_path = &config.database.path;
    ensure_parent_dir(db_path)?;
    info!(path = %db_path, "opening SQLite database");
    let conn = rusqlite::Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    let store = Arc::new(SqliteStore::new(conn)?);

    let executor = Arc::new(Executor::new(
        store.clone(),
        build_generator(&config),
        Arc::new(wordpress::WordPressPublisher::new(config.publisher.timeout_secs)?),
        chrono::Duration::seconds(config.scheduler.claim_ttl_secs as i64),
    ));

    match cli.command {
        Command::Run => {
            let scheduler = Scheduler::new(store, executor, config.scheduler.clone());
            scheduler.start().await?;
            info!("scribe daemon running, Ctrl-C to stop");
            tokio::signal::ctrl_c().await?;
            info!("shutdown signal received");
            scheduler.stop().await;
        }
        Command::RunJob { id } => {
            let scheduler = Scheduler::new(store, executor, config.scheduler.clone());
            let exec = scheduler.run_now(&id, &interrupt_token()).await?;
            print_execution(&exec)?;
        }
        Command::Pending => {
            let pending = executor.pending_validations()?;
            if pending.is_empty() {
                println!("no executions awaiting validation");
            }
            for exec in pending {
                println!(
                    "{}  job={}  created={}  {}",
                    exec.id,
                    exec.job_id,
                    exec.created_at.format("%Y-%m-%d %H:%M"),
                    exec.title.as_deref().unwrap_or("(untitled)")
                );
            }
        }
        Command::Validate {
            execution_id,
            approve,
            reject: _,
        } => {
            let exec = executor
                .validate_execution(&execution_id, approve, &interrupt_token())
                .await?;
            print_execution(&exec)?;
        }
        Command::Jobs => {
            for job in JobService::new(store).list()? {
                let next = job
                    .next_run_at
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{}  {:<24} {:<8} {:<9} next={}",
                    job.id, job.name, job.schedule_type, job.status, next
                );
            }
        }
        Command::Check { site_id } => {
            let site = executor.check_site(&site_id, &interrupt_token()).await?;
            println!("{} ({}) is reachable", site.name, site.url);
        }
    }

    Ok(())
}

/// Token cancelled on Ctrl-C, for one-shot commands.
fn interrupt_token() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            child.cancel();
        }
    });
    token
}

fn print_execution(exec: &Execution) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(exec)?);
    Ok(())
}

/// OpenAI-compatible generator, or a placeholder that fails every call when
/// no API key is configured.
fn build_generator(config: &ScribeConfig) -> Arc<dyn ContentGenerator> {
    let key = config
        .generator
        .api_key
        .clone()
        .or_else(|| std::env::var("OPENAI_API_KEY").ok());
    match key {
        Some(key) => Arc::new(openai::OpenAiGenerator::new(&config.generator, key)),
        None => {
            warn!("no generator API key configured; executions will fail at generation");
            Arc::new(NullGenerator)
        }
    }
}

fn ensure_parent_dir(path: &str) -> anyhow::Result<()> {
    if let Some(parent) = std::path::Path::new(path).parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating database directory {}", parent.display()))?;
    }
    Ok(())
}

/// Placeholder generator when no API key is available.
struct NullGenerator;

#[async_trait::async_trait]
impl ContentGenerator for NullGenerator {
    fn name(&self) -> &str {
        "null"
    }

    async fn generate(&self, _req: &GenerateRequest) -> ScribeResult<String> {
        Err(ScribeError::Generation(
            "no API key configured (set generator.api_key or OPENAI_API_KEY)".into(),
        ))
    }
}
