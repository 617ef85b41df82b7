use std::sync::Arc;

use hotfolder_client::TransloaditClient;
use hotfolder_pipeline::{Orchestrator, WatchEvent};
use hotfolder_worker::config::WorkerConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hotfolder_worker=debug,hotfolder_pipeline=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "Worker failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = WorkerConfig::from_env()?;
    let client = TransloaditClient::new(config.client)?;

    tracing::info!(
        input = %config.watch.input.display(),
        output = %config.watch.output.display(),
        endpoint = %client.endpoint(),
        "Worker starting",
    );

    let (orchestrator, mut events) = Orchestrator::start(config.watch, Arc::new(client))?;

    let on_signal = orchestrator.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, stopping");
            on_signal.stop();
        }
    });

    while let Some(event) = events.recv().await {
        match event {
            WatchEvent::Change(path) => {
                tracing::info!(path = %path.display(), "Detected change");
            }
            WatchEvent::Done(done) => {
                tracing::info!(
                    source = %done.source.display(),
                    output = %done.output.display(),
                    job_id = %done.job.id,
                    "Successfully converted",
                );
            }
            WatchEvent::Error(e) => {
                tracing::error!(path = %e.path().display(), kind = ?e.kind(), error = %e, "File failed");
            }
        }
    }

    tracing::info!("Worker finished");
    Ok(())
}
