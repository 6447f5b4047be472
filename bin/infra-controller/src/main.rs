use anyhow::Result;
use infra_api::{AKSCluster, KubernetesCluster, ResourceGroup, Subnet, VirtualNetwork};
use infra_core::{NopClient, SecretPublisher};
use kube::Client;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod claim_controller;
mod config;
mod error_policy;
mod managed_controller;
mod metrics;
mod server;
mod store;

use claim_controller::ClaimContext;
use config::{ControllerConfig, LogFormat};
use managed_controller::ManagedContext;
use metrics::ControllerMetrics;
use store::{KubeSecretPublisher, KubeStore};

#[tokio::main]
async fn main() -> Result<()> {
    let config = ControllerConfig::from_env();
    init_tracing(config.log_format);

    info!("Starting infra-controller...");

    let client = Client::try_default().await?;
    let store = Arc::new(KubeStore::new(client.clone()));
    let secrets: Arc<dyn SecretPublisher> = Arc::new(KubeSecretPublisher::new(client.clone()));
    let metrics = Arc::new(ControllerMetrics::new()?);
    let policy = config.requeue_policy();
    let cancel = CancellationToken::new();

    macro_rules! managed {
        ($kind:ty) => {
            spawn(
                stringify!($kind),
                managed_controller::run::<$kind>(
                    client.clone(),
                    Arc::new(ManagedContext::new(
                        store.clone(),
                        Arc::new(NopClient::<$kind>::new()),
                        secrets.clone(),
                        metrics.clone(),
                        policy.clone(),
                        cancel.clone(),
                    )),
                ),
            )
        };
    }

    let mut tasks = vec![
        managed!(ResourceGroup),
        managed!(VirtualNetwork),
        managed!(Subnet),
        managed!(AKSCluster),
    ];

    tasks.push(spawn(
        "KubernetesCluster",
        claim_controller::run::<KubernetesCluster, AKSCluster>(
            client.clone(),
            Arc::new(ClaimContext::new(
                store.clone(),
                metrics.clone(),
                policy.clone(),
                cancel.clone(),
            )),
        ),
    ));

    tasks.push(spawn(
        "metrics server",
        server::serve(config.metrics_port, metrics.clone(), cancel.clone()),
    ));

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, stopping controllers...");
    cancel.cancel();

    futures::future::join_all(tasks).await;
    info!("infra-controller stopped");

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

fn spawn<F>(name: &'static str, task: F) -> JoinHandle<()>
where
    F: std::future::Future<Output = Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = task.await {
            error!("{} error: {}", name, e);
        }
    })
}
