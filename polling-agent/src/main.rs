use std::path::Path;
use std::sync::Arc;

use envconfig::Envconfig;
use partitioning::PartitionCoordinator;
use pipeline::{setup_pipelines, PipelineFile};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use polling_agent::config::AgentConfig;
use polling_agent::manager::AgentManager;
use polling_agent::pollsters::default_registry;

fn setup_tracing() {
    let log_layer = tracing_subscriber::fmt::layer().with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(log_layer).init();
}

async fn shutdown_signal() {
    let mut term = signal::unix::signal(signal::unix::SignalKind::terminate())
        .expect("failed to register SIGTERM handler");
    let mut interrupt = signal::unix::signal(signal::unix::SignalKind::interrupt())
        .expect("failed to register SIGINT handler");

    tokio::select! {
        _ = term.recv() => {},
        _ = interrupt.recv() => {},
    };
}

#[tokio::main]
async fn main() {
    setup_tracing();
    let config = AgentConfig::init_from_env().expect("Invalid configuration:");

    let file = PipelineFile::from_path(Path::new(&config.pipeline_file))
        .expect("failed to load pipeline definition");
    let pipelines = Arc::new(setup_pipelines(&file).expect("failed to build pipelines"));
    let registry = Arc::new(default_registry(&config).expect("failed to load pollsters"));

    let coordinator = PartitionCoordinator::new(config.member_id());
    let cancel = CancellationToken::new();
    let coordination_handle = match config.coordination() {
        Some(coordination) => {
            let group = config.partitioning_group.clone();
            Some(tokio::spawn(coordinator.clone().run(
                group,
                coordination,
                cancel.clone(),
            )))
        }
        None => {
            info!("no coordination backend configured, this agent owns all resources");
            None
        }
    };

    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            info!("shutdown signal received");
            cancel.cancel();
        }
    });

    let manager = Arc::new(AgentManager::new(config, registry, coordinator, pipelines));
    manager.run(cancel).await;

    if let Some(handle) = coordination_handle {
        drop(handle.await);
    }
    info!("agent stopped");
}
