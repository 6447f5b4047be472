//! Controller binding claims of kind `C` to managed resources of kind `R`

use futures::StreamExt;
use infra_api::common::BindingPhase;
use infra_api::managed::{Classified, ManagedResource, ResourceClaim};
use infra_core::{object_key, ClaimBinder, CoreError, Disposition, ObjectStore, RequeuePolicy};
use kube::{Api, Client, ResourceExt};
use kube_runtime::reflector::ObjectRef;
use kube_runtime::{controller::Action, watcher, Controller};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error_policy::FailureTracker;
use crate::metrics::ControllerMetrics;
use crate::store::KubeStore;

pub const FINALIZER: &str = "finalizer.resourceclaim.infra.datum.net";

pub struct ClaimContext<R: ManagedResource> {
    binder: ClaimBinder<R, KubeStore>,
    store: Arc<KubeStore>,
    metrics: Arc<ControllerMetrics>,
    policy: RequeuePolicy,
    failures: FailureTracker,
    cancel: CancellationToken,
}

impl<R: Classified> ClaimContext<R> {
    pub fn new(
        store: Arc<KubeStore>,
        metrics: Arc<ControllerMetrics>,
        policy: RequeuePolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            binder: ClaimBinder::new(store.clone()),
            store,
            metrics,
            policy,
            failures: FailureTracker::new(),
            cancel,
        }
    }
}

/// Watch claims and the resources they bind to until cancelled
///
/// A change on a managed resource requeues the claim it refers to, so a
/// claim waiting for its resource to become Ready is bound promptly.
pub async fn run<C, R>(client: Client, ctx: Arc<ClaimContext<R>>) -> anyhow::Result<()>
where
    C: ResourceClaim,
    R: Classified,
{
    info!("Starting {} binding to {}", C::kind(&()), R::kind(&()));

    let claims: Api<C> = Api::all(client.clone());
    let resources: Api<R> = Api::all(client);
    let shutdown = ctx.cancel.clone();

    let mut stream = Controller::new(claims, watcher::Config::default())
        .watches(resources, watcher::Config::default(), claim_of::<C, R>)
        .graceful_shutdown_on(async move { shutdown.cancelled().await })
        .run(reconcile::<C, R>, error_policy::<C, R>, ctx)
        .boxed();

    while let Some(item) = stream.next().await {
        match item {
            Ok((obj, _)) => debug!("Reconciled {} {}", C::kind(&()), obj.name),
            Err(e) => debug!("{} reconcile stream error: {}", C::kind(&()), e),
        }
    }

    info!("{} controller stopped", C::kind(&()));
    Ok(())
}

/// Claim a managed resource refers to, if any
fn claim_of<C, R>(resource: R) -> Option<ObjectRef<C>>
where
    C: ResourceClaim,
    R: ManagedResource,
{
    let claim = resource.claim_reference()?;
    let reference = ObjectRef::new(&claim.name);
    Some(match claim.namespace.as_deref() {
        Some(ns) => reference.within(ns),
        None => reference,
    })
}

async fn reconcile<C, R>(claim: Arc<C>, ctx: Arc<ClaimContext<R>>) -> Result<Action, CoreError>
where
    C: ResourceClaim,
    R: Classified,
{
    let kind = C::kind(&()).to_string();
    let key = object_key(claim.namespace().as_deref(), &claim.name_any());
    let _timer = ctx
        .metrics
        .reconcile_duration_seconds
        .with_label_values(&[kind.as_str()])
        .start_timer();

    let has_finalizer = claim.finalizers().iter().any(|f| f == FINALIZER);
    if claim.meta().deletion_timestamp.is_some() {
        if has_finalizer {
            ctx.binder.release(claim.as_ref()).await?;
            ctx.store.remove_finalizer(claim.as_ref(), FINALIZER).await?;
            info!("Released {} {}", kind, key);
        }
        ctx.metrics.record_result(&kind, "finalized");
        return Ok(Action::await_change());
    }
    if !has_finalizer {
        info!("Adding finalizer to {} {}", kind, key);
        ctx.store.add_finalizer(claim.as_ref(), FINALIZER).await?;
        return Ok(Action::requeue(Duration::from_secs(1)));
    }

    let before = (*claim).clone();
    let outcome = ctx.binder.bind(before.clone(), &ctx.cancel).await;
    let after = outcome.resource;

    let result = match outcome.disposition {
        Disposition::Cancelled => {
            ctx.metrics.record_result(&kind, "cancelled");
            return Ok(Action::await_change());
        }
        Disposition::Failed(err) => {
            persist(&ctx, &before, &after).await?;
            ctx.metrics.record_result(&kind, "failed");
            return Err(err);
        }
        disposition => {
            let Some(result) = bind_result(&disposition, after.binding_phase()) else {
                return Err(CoreError::Internal(format!(
                    "unexpected outcome {:?} binding {} {}",
                    disposition, kind, key
                )));
            };
            persist(&ctx, &before, &after).await?;
            result
        }
    };

    ctx.failures.reset(&key);
    ctx.metrics.record_result(&kind, result);
    Ok(Action::requeue(ctx.policy.sync_period))
}

/// Metric result of a converged bind; `None` for outcomes binding never produces
fn bind_result(disposition: &Disposition, phase: BindingPhase) -> Option<&'static str> {
    match (disposition, phase) {
        (Disposition::Synced, BindingPhase::Bound) => Some("synced"),
        (Disposition::Synced, _) => Some("binding"),
        _ => None,
    }
}

async fn persist<C, R>(ctx: &ClaimContext<R>, before: &C, after: &C) -> Result<(), CoreError>
where
    C: ResourceClaim,
    R: Classified,
{
    if serde_json::to_value(before).ok() == serde_json::to_value(after).ok() {
        return Ok(());
    }
    ctx.store.apply(after).await?;
    ctx.metrics
        .record_transition(&C::kind(&()), before.binding_phase(), after.binding_phase());
    Ok(())
}

fn error_policy<C, R>(claim: Arc<C>, err: &CoreError, ctx: Arc<ClaimContext<R>>) -> Action
where
    C: ResourceClaim,
    R: Classified,
{
    let kind = C::kind(&()).to_string();
    let key = object_key(claim.namespace().as_deref(), &claim.name_any());
    ctx.metrics.record_error(&kind, err.reason());

    let delay = ctx.failures.requeue_after(&key, err, &ctx.policy);
    if err.is_fatal() {
        error!("{} {} needs a spec change: {}", kind, key, err);
    } else {
        warn!("Binding of {} {} failed, retrying in {:?}: {}", kind, key, delay, err);
    }
    Action::requeue(delay)
}
