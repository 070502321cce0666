use std::pin::pin;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use litessay_core::types::DbId;
use litessay_db::repositories::RequeuePolicy;
use litessay_db::DbPool;
use litessay_events::{progress_stream, PgProgressStore, ProgressPublisher, StreamConfig};
use litessay_pipeline::intake::submit_job;
use litessay_pipeline::{Collaborators, JobStore, PgJobStore, PipelineEngine};
use litessay_providers::{GutenbergSource, OpenAiClient, PineconeClient};
use litessay_worker::reports::{self, JobResult};
use litessay_worker::{WorkerConfig, WorkerLoop};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "litessay_worker=debug,litessay_pipeline=debug";

#[derive(Debug, Parser)]
#[command(name = "litessay-worker", about = "Literary essay pipeline worker")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Poll the queue and run jobs until interrupted.
    Run,
    /// Register a Gutenberg book and queue an essay job for it.
    Enqueue {
        /// Gutenberg ebook id.
        source_ref: String,
    },
    /// Put a running job back on the queue.
    Requeue {
        job_id: DbId,
        #[arg(long, default_value = "operator requeue")]
        reason: String,
        /// Seconds before the job becomes claimable again.
        #[arg(long, default_value_t = 0.0)]
        delay_secs: f64,
        /// Requeue even if the job's heartbeat is fresh.
        #[arg(long)]
        force: bool,
    },
    /// Queue a new job for a failed job's document.
    Retry { job_id: DbId },
    /// Print a job's progress events until it finishes.
    Watch { job_id: DbId },
    /// Print a job's status and last progress snapshot.
    Status { job_id: DbId },
    /// Print a succeeded job's themes, evidence, summary and essay.
    #[command(name = "result")]
    Results {
        job_id: DbId,
        /// Print the whole result as JSON instead of markdown.
        #[arg(long)]
        json: bool,
    },
    /// List running jobs whose heartbeat is older than the requeue threshold.
    Stale {
        /// Override `REQUEUE_STALE_SECS`.
        #[arg(long)]
        older_than_secs: Option<f64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    // --- Configuration ---
    let config = WorkerConfig::from_env()?;
    config.log_summary();

    // --- Database ---
    let pool = litessay_db::create_pool(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    litessay_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    litessay_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database ready");

    let store = Arc::new(PgJobStore::new(pool.clone()));

    match cli.command {
        Command::Run => run(&config, pool, store).await,
        Command::Enqueue { source_ref } => {
            let source = GutenbergSource::new(config.gutenberg.clone())?;
            let (document, job) = submit_job(store.as_ref(), &source, &source_ref).await?;
            println!(
                "Queued job {} for document {} ({})",
                job.id,
                document.id,
                document.title.as_deref().unwrap_or("untitled"),
            );
            Ok(())
        }
        Command::Requeue {
            job_id,
            reason,
            delay_secs,
            force,
        } => {
            let policy = if force {
                RequeuePolicy::Force
            } else {
                RequeuePolicy::IfStale {
                    stale_after_secs: config.requeue_stale_secs,
                }
            };
            match store.requeue(job_id, &reason, delay_secs, policy).await? {
                Some(job) => {
                    tracing::info!(job_id, force, "Job requeued");
                    println!("Requeued job {}", job.id);
                    Ok(())
                }
                None => bail!(
                    "Job {job_id} was not requeued: it is not running, or its heartbeat is \
                     still fresh (use --force to override)"
                ),
            }
        }
        Command::Retry { job_id } => match store.retry(job_id).await? {
            Some(job) => {
                println!("Queued job {} as a retry of job {job_id}", job.id);
                Ok(())
            }
            None => bail!("Job {job_id} does not exist or has not failed"),
        },
        Command::Watch { job_id } => {
            let reader = Arc::new(PgProgressStore::new(pool));
            let mut events = pin!(progress_stream(reader, job_id, StreamConfig::default()));
            while let Some(event) = events.next().await {
                println!("event: {}\ndata: {}\n", event.event_name(), event.data());
            }
            Ok(())
        }
        Command::Status { job_id } => {
            let report = reports::job_status(store.as_ref(), job_id).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Command::Results { job_id, json } => {
            let result = reports::job_result(store.as_ref(), job_id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_result(&result);
            }
            Ok(())
        }
        Command::Stale { older_than_secs } => {
            let stale_after_secs = older_than_secs.unwrap_or(config.requeue_stale_secs);
            let jobs = reports::stale_jobs(store.as_ref(), stale_after_secs).await?;
            if jobs.is_empty() {
                println!("No running job has a heartbeat older than {stale_after_secs}s");
            }
            for job in jobs {
                let heartbeat = job
                    .heartbeat_at
                    .map_or_else(|| "never".to_string(), |at| at.to_rfc3339());
                println!(
                    "job {} (document {}): last heartbeat {heartbeat}",
                    job.job_id, job.document_id
                );
            }
            Ok(())
        }
    }
}

fn print_result(result: &JobResult) {
    println!("## Themes\n");
    for theme in &result.themes {
        println!("- {theme}");
    }
    if !result.book_summary.is_empty() {
        println!("\n## Summary\n\n{}", result.book_summary);
    }
    println!("\n## Essay\n\n{}", result.essay_markdown);
}

async fn run(config: &WorkerConfig, pool: DbPool, store: Arc<PgJobStore>) -> anyhow::Result<()> {
    // --- Collaborators ---
    let openai = Arc::new(OpenAiClient::new(config.openai()?)?);
    let index = Arc::new(PineconeClient::new(config.pinecone()?)?);
    let source = Arc::new(GutenbergSource::new(config.gutenberg.clone())?);
    let collaborators = Collaborators {
        text_source: source,
        llm: openai.clone(),
        embedder: openai,
        index,
    };

    let progress = ProgressPublisher::new(Arc::new(PgProgressStore::new(pool)));
    let engine = PipelineEngine::new(store.clone(), progress, collaborators, config.pipeline.clone());
    let worker = WorkerLoop::new(store, engine, config.poll_interval, config.heartbeat_interval);

    // --- Shutdown ---
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_cancel.cancel();
    });

    worker.run(cancel).await;
    tracing::info!("Graceful shutdown complete");
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Wait for SIGINT or SIGTERM. The job in flight, if any, runs to completion.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), finishing current job");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, finishing current job");
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn parse(args: &[&str]) -> Command {
        Cli::try_parse_from(std::iter::once("litessay-worker").chain(args.iter().copied()))
            .unwrap()
            .command
    }

    #[test]
    fn operator_subcommands_parse() {
        assert_matches!(parse(&["status", "7"]), Command::Status { job_id: 7 });
        assert_matches!(
            parse(&["result", "7", "--json"]),
            Command::Results { job_id: 7, json: true }
        );
        assert_matches!(parse(&["stale"]), Command::Stale { older_than_secs: None });
        assert_matches!(
            parse(&["stale", "--older-than-secs", "90"]),
            Command::Stale { older_than_secs: Some(secs) } if secs == 90.0
        );
    }

    #[test]
    fn requeue_defaults_to_stale_only() {
        assert_matches!(
            parse(&["requeue", "3"]),
            Command::Requeue { job_id: 3, force: false, ref reason, .. } if reason == "operator requeue"
        );
    }
}
