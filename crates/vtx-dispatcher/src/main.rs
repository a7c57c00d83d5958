//! Upload dispatcher binary.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vtx_dispatcher::{Dispatcher, DispatcherConfig, ProcessLauncher};
use vtx_queue::UploadQueue;
use vtx_store::{JobRepository, StoreClient};

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

    info!("Starting vtx-dispatcher");

    let config = match DispatcherConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Invalid dispatcher configuration: {}", e);
            std::process::exit(2);
        }
    };

    let queue = match UploadQueue::from_env() {
        Ok(q) => q,
        Err(e) => {
            error!("Failed to create upload queue: {}", e);
            std::process::exit(1);
        }
    };

    let store = match StoreClient::from_env().await {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to create store client: {}", e);
            std::process::exit(1);
        }
    };

    let launcher = Arc::new(ProcessLauncher::new(config.worker_binary.clone()));
    let dispatcher = Dispatcher::new(config, queue, JobRepository::new(store), launcher);

    let shutdown = dispatcher.shutdown_handle();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        let _ = shutdown.send(true);
    });

    if let Err(e) = dispatcher.run().await {
        error!("Dispatcher error: {}", e);
        std::process::exit(1);
    }

    info!("Dispatcher shutdown complete");
}
