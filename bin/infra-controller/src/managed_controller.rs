//! Controller for managed resources of one kind

use futures::StreamExt;
use infra_api::managed::ManagedResource;
use infra_core::{
    object_key, CoreError, Disposition, ExternalClient, ManagedReconciler, ObjectStore,
    RequeuePolicy, ResolveReferences, SecretPublisher,
};
use kube::{Api, Client, ResourceExt};
use kube_runtime::{controller::Action, watcher, Controller};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error_policy::FailureTracker;
use crate::metrics::ControllerMetrics;
use crate::store::KubeStore;

pub const FINALIZER: &str = "finalizer.managedresource.infra.datum.net";

pub struct ManagedContext<R: ManagedResource> {
    reconciler: ManagedReconciler<R, KubeStore>,
    store: Arc<KubeStore>,
    metrics: Arc<ControllerMetrics>,
    policy: RequeuePolicy,
    failures: FailureTracker,
    cancel: CancellationToken,
}

impl<R> ManagedContext<R>
where
    R: ManagedResource + ResolveReferences,
{
    pub fn new(
        store: Arc<KubeStore>,
        external: Arc<dyn ExternalClient<R>>,
        secrets: Arc<dyn SecretPublisher>,
        metrics: Arc<ControllerMetrics>,
        policy: RequeuePolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            reconciler: ManagedReconciler::new(store.clone(), external, secrets),
            store,
            metrics,
            policy,
            failures: FailureTracker::new(),
            cancel,
        }
    }
}

/// Watch and reconcile every `R` until cancelled
pub async fn run<R>(client: Client, ctx: Arc<ManagedContext<R>>) -> anyhow::Result<()>
where
    R: ManagedResource + ResolveReferences,
{
    info!("Starting {} reconciliation", R::kind(&()));

    let api: Api<R> = Api::all(client);
    let shutdown = ctx.cancel.clone();

    let mut stream = Controller::new(api, watcher::Config::default())
        .graceful_shutdown_on(async move { shutdown.cancelled().await })
        .run(reconcile::<R>, error_policy::<R>, ctx)
        .boxed();

    while let Some(item) = stream.next().await {
        match item {
            Ok((obj, _)) => debug!("Reconciled {} {}", R::kind(&()), obj.name),
            Err(e) => debug!("{} reconcile stream error: {}", R::kind(&()), e),
        }
    }

    info!("{} controller stopped", R::kind(&()));
    Ok(())
}

async fn reconcile<R>(resource: Arc<R>, ctx: Arc<ManagedContext<R>>) -> Result<Action, CoreError>
where
    R: ManagedResource + ResolveReferences,
{
    let kind = R::kind(&()).to_string();
    let name = resource.name_any();
    let _timer = ctx
        .metrics
        .reconcile_duration_seconds
        .with_label_values(&[kind.as_str()])
        .start_timer();

    let deleting = resource.meta().deletion_timestamp.is_some();
    let has_finalizer = resource.finalizers().iter().any(|f| f == FINALIZER);
    if deleting && !has_finalizer {
        return Ok(Action::await_change());
    }
    if !has_finalizer {
        info!("Adding finalizer to {} {}", kind, name);
        ctx.store.add_finalizer(resource.as_ref(), FINALIZER).await?;
        return Ok(Action::requeue(Duration::from_secs(1)));
    }

    let before = (*resource).clone();
    let outcome = ctx.reconciler.reconcile(before.clone(), &ctx.cancel).await;
    let after = outcome.resource;

    let (result, action) = match outcome.disposition {
        Disposition::Cancelled => ("cancelled", Action::await_change()),
        Disposition::Synced => {
            persist(&ctx, &before, &after).await?;
            ("synced", Action::requeue(ctx.policy.sync_period))
        }
        Disposition::Failed(err) => {
            persist(&ctx, &before, &after).await?;
            ctx.metrics.record_result(&kind, "failed");
            return Err(err);
        }
        Disposition::DeleteObject => {
            info!("Deleting {} {} after its claim was removed", kind, name);
            ctx.store.delete::<R>(None, &name).await?;
            ("deleted", Action::await_change())
        }
        Disposition::AwaitingDeletion => {
            persist(&ctx, &before, &after).await?;
            ("awaiting_deletion", Action::requeue(ctx.policy.deletion_poll))
        }
        Disposition::Finalized { external_deleted } => {
            info!(
                "Finalized {} {} (external resource deleted: {})",
                kind, name, external_deleted
            );
            ctx.store.remove_finalizer(&after, FINALIZER).await?;
            ("finalized", Action::await_change())
        }
    };

    ctx.failures.reset(&object_key(None, &name));
    ctx.metrics.record_result(&kind, result);
    Ok(action)
}

/// Write the new snapshot back if the pass changed it
async fn persist<R>(ctx: &ManagedContext<R>, before: &R, after: &R) -> Result<(), CoreError>
where
    R: ManagedResource + ResolveReferences,
{
    if serde_json::to_value(before).ok() == serde_json::to_value(after).ok() {
        return Ok(());
    }
    ctx.store.apply(after).await?;
    ctx.metrics
        .record_transition(&R::kind(&()), before.binding_phase(), after.binding_phase());
    Ok(())
}

fn error_policy<R>(resource: Arc<R>, err: &CoreError, ctx: Arc<ManagedContext<R>>) -> Action
where
    R: ManagedResource + ResolveReferences,
{
    let kind = R::kind(&()).to_string();
    let key = object_key(None, &resource.name_any());
    ctx.metrics.record_error(&kind, err.reason());

    let delay = ctx.failures.requeue_after(&key, err, &ctx.policy);
    if err.is_fatal() {
        error!("{} {} needs a spec change: {}", kind, key, err);
    } else {
        warn!("Reconcile of {} {} failed, retrying in {:?}: {}", kind, key, delay, err);
    }
    Action::requeue(delay)
}
