use std::sync::Arc;

use anyhow::{Context, bail};
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use analytics_worker::config::WorkerConfig;
use analytics_worker::error::Result;
use analytics_worker::events::{BroadcastSink, MultiSink, TracingSink};
use analytics_worker::model::JobId;
use analytics_worker::store::LibSqlStore;
use analytics_worker::worker::{Worker, WorkerDeps};

const USAGE: &str = "usage: analytics-worker <start|finish|run> <job_id>";

#[derive(Debug, Clone, Copy)]
enum Command {
    Start,
    Finish,
    Run,
}

fn parse_args(args: &[String]) -> anyhow::Result<(Command, JobId)> {
    let [command, job_id] = args else {
        bail!(USAGE);
    };
    let command = match command.as_str() {
        "start" => Command::Start,
        "finish" => Command::Finish,
        "run" => Command::Run,
        other => bail!("unknown command {other:?}\n{USAGE}"),
    };
    let job_id = job_id
        .parse()
        .with_context(|| format!("invalid job id {job_id:?}"))?;
    Ok((command, job_id))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = WorkerConfig::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_filter)),
        )
        .with_target(false)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (command, job_id) = parse_args(&args)?;

    eprintln!("{} v{}", config.component, env!("CARGO_PKG_VERSION"));
    eprintln!("   Store: {}", config.db_path.display());

    run(&config, command, job_id)
        .await
        .with_context(|| format!("{command:?} failed for job {job_id}"))?;
    Ok(())
}

/// Open the store, bind `job_id` to a fresh worker and run `command`.
async fn run(config: &WorkerConfig, command: Command, job_id: JobId) -> Result<()> {
    let store = Arc::new(LibSqlStore::new_local(&config.db_path).await?);
    let job = store.get_job(job_id).await?;

    // Progress lines for the operator; full detail goes through tracing.
    let broadcast = BroadcastSink::new(config.event_capacity);
    let mut rx = broadcast.subscribe();
    let progress = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => match event.result_id {
                    Some(result_id) => {
                        eprintln!("   result {result_id:03} is now {}", event.status)
                    }
                    None => eprintln!("   job {job_id:03} is now {}", event.status),
                },
                Err(RecvError::Lagged(skipped)) => {
                    eprintln!("   ({skipped} progress lines skipped)")
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let events = MultiSink::new()
        .with(Arc::new(TracingSink))
        .with(Arc::new(broadcast));
    let deps = WorkerDeps::new(store, Arc::new(events), config.component.clone());

    let worker = Worker::new(deps, Some(job));
    let outcome = match command {
        Command::Start => worker.job_starts().await,
        Command::Finish => worker.job_finishes().await,
        Command::Run => match worker.job_starts().await {
            Ok(()) => worker.job_finishes().await,
            Err(e) => Err(e),
        },
    };

    // Dropping the worker drops the last sender, which ends the progress task.
    drop(worker);
    if let Err(e) = progress.await {
        warn!(error = %e, "Progress task failed");
    }

    Ok(outcome?)
}
