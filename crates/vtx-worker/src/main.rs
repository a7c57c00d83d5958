//! Transcoding worker binary.

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vtx_queue::EventRelay;
use vtx_storage::{BlobClient, BlobConfig};
use vtx_worker::{TranscodeJob, WorkerConfig};

#[tokio::main]
async fn main() {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    dotenvy::dotenv().ok();

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("vtx=info".parse().expect("valid log directive"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(true))
            .with(env_filter)
            .init();
    }

    info!("Starting vtx-worker");

    // Exit 2 on configuration errors: the relay is not reachable yet, so
    // there is no event to publish, only the exit code for the operator.
    let config = match WorkerConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Invalid worker configuration: {}", e);
            std::process::exit(2);
        }
    };

    let blob_config = match BlobConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Invalid blob storage configuration: {}", e);
            std::process::exit(2);
        }
    };

    let relay = match EventRelay::new(&config.redis_url) {
        Ok(r) => r,
        Err(e) => {
            error!("Failed to create event relay: {}", e);
            std::process::exit(2);
        }
    };

    let source = BlobClient::new(blob_config.clone(), config.source_bucket.clone());
    let outputs = BlobClient::new(blob_config, config.output_bucket.clone());

    let job_id = config.job_id.clone();
    let job = TranscodeJob::new(config, source, outputs, relay);

    if let Err(e) = job.run().await {
        error!(job_id = %job_id, "Worker failed: {}", e);
        std::process::exit(1);
    }

    info!(job_id = %job_id, "Worker finished");
}
