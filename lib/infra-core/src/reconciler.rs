//! Generic reconcile pass for managed resources
//!
//! A pass works on an owned snapshot of the resource and hands the new
//! snapshot back in its outcome; the caller persists it in one write. Nothing
//! here branches on a concrete kind.

use infra_api::common::condition::TYPE_READY;
use infra_api::common::{BindingPhase, Condition};
use infra_api::managed::ManagedResource;
use kube::ResourceExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::binding::{on_claim_removed, transition, ClaimRemoval};
use crate::error::{CoreError, ExternalOperation, ResolveError, Result};
use crate::external::{ConnectionDetails, ExternalClient, SecretPublisher};
use crate::reclaim::should_delete_external_resource;
use crate::resolver::{ReferenceResolver, ResolveReferences};
use crate::store::ObjectStore;

/// How a pass ended, and what the caller should do about it
#[derive(Debug)]
pub enum Disposition {
    /// Converged; check again after the sync period
    Synced,
    /// The pass stopped early; `Synced=False` carries the reason
    Failed(CoreError),
    /// The claim went away under the Delete policy; delete the object
    DeleteObject,
    /// External deletion requested but not yet confirmed
    AwaitingDeletion,
    /// Deletion handling is done and the finalizer may be removed
    Finalized { external_deleted: bool },
    /// Aborted by shutdown; persist nothing
    Cancelled,
}

#[derive(Debug)]
pub struct ReconcileOutcome<R> {
    pub resource: R,
    pub disposition: Disposition,
}

impl<R> ReconcileOutcome<R> {
    fn new(resource: R, disposition: Disposition) -> Self {
        Self {
            resource,
            disposition,
        }
    }
}

/// Drives one managed resource kind toward its desired state
pub struct ManagedReconciler<R: ManagedResource, S> {
    store: Arc<S>,
    external: Arc<dyn ExternalClient<R>>,
    secrets: Arc<dyn SecretPublisher>,
}

impl<R, S> ManagedReconciler<R, S>
where
    R: ManagedResource + ResolveReferences,
    S: ObjectStore,
{
    pub fn new(
        store: Arc<S>,
        external: Arc<dyn ExternalClient<R>>,
        secrets: Arc<dyn SecretPublisher>,
    ) -> Self {
        Self {
            store,
            external,
            secrets,
        }
    }

    /// Run one pass over `resource`
    pub async fn reconcile(&self, resource: R, cancel: &CancellationToken) -> ReconcileOutcome<R> {
        if resource.meta().deletion_timestamp.is_some() {
            return self.finalize(resource, cancel).await;
        }

        let name = resource.name_any();
        debug!("Reconciling {} {}", R::kind(&()), name);

        let original = resource.clone();
        let mut resource = resource;

        let namespace = resource.namespace();
        let resolver = ReferenceResolver::new(self.store.as_ref(), namespace.as_deref(), cancel);
        let errors = resource.resolve_references(&resolver).await;

        if errors.iter().any(|e| e.source == ResolveError::Cancelled) {
            return ReconcileOutcome::new(original, Disposition::Cancelled);
        }
        // A fatal failure on any field decides how the whole pass is retried.
        let reported = errors
            .iter()
            .find(|e| e.source.is_fatal())
            .or_else(|| errors.first());
        if let Some(reported) = reported {
            let message = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            let err = CoreError::from(reported.clone());
            debug!("{} {} has unresolved references: {}", R::kind(&()), name, message);
            resource.set_conditions([Condition::reconcile_error(err.reason(), message)]);
            return ReconcileOutcome::new(resource, Disposition::Failed(err));
        }

        if cancel.is_cancelled() {
            return ReconcileOutcome::new(original, Disposition::Cancelled);
        }

        match self.sync(&mut resource).await {
            Ok(disposition) => {
                resource.set_conditions([Condition::reconcile_success()]);
                ReconcileOutcome::new(resource, disposition)
            }
            Err(err) => fail(resource, err),
        }
    }

    /// Observe, create or update, publish, then advance binding
    async fn sync(&self, resource: &mut R) -> Result<Disposition> {
        let observation = self
            .external
            .observe(resource)
            .await
            .map_err(|e| CoreError::external(ExternalOperation::Observe, e))?;

        let mut details: ConnectionDetails = observation.connection_details;

        if !observation.resource_exists {
            info!("Creating external resource for {} {}", R::kind(&()), resource.name_any());
            resource.set_conditions([Condition::creating()]);
            let creation = self
                .external
                .create(resource)
                .await
                .map_err(|e| CoreError::external(ExternalOperation::Create, e))?;
            details.extend(creation.connection_details);
        } else if !observation.resource_up_to_date {
            info!("Updating external resource for {} {}", R::kind(&()), resource.name_any());
            let update = self
                .external
                .update(resource)
                .await
                .map_err(|e| CoreError::external(ExternalOperation::Update, e))?;
            details.extend(update.connection_details);
        }

        if let Some(secret) = resource.write_connection_secret_to_reference() {
            if !details.is_empty() {
                self.secrets
                    .publish(secret, &details)
                    .await
                    .map_err(|e| CoreError::Publish(format!("{:#}", e)))?;
                debug!("Published {} connection details to {}", details.len(), secret.name);
            }
        }

        advance_binding(resource)
    }

    /// Deletion handling for a resource carrying a deletion timestamp
    pub async fn finalize(&self, resource: R, cancel: &CancellationToken) -> ReconcileOutcome<R> {
        let name = resource.name_any();

        if !should_delete_external_resource(resource.reclaim_policy(), resource.binding_phase()) {
            info!(
                "Keeping external resource of {} {} ({} policy, {})",
                R::kind(&()),
                name,
                resource.reclaim_policy(),
                resource.binding_phase()
            );
            return ReconcileOutcome::new(
                resource,
                Disposition::Finalized {
                    external_deleted: false,
                },
            );
        }

        if cancel.is_cancelled() {
            return ReconcileOutcome::new(resource, Disposition::Cancelled);
        }

        let original = resource.clone();
        let mut resource = resource;

        let observation = match self.external.observe(&mut resource).await {
            Ok(o) => o,
            Err(e) => return fail(resource, CoreError::external(ExternalOperation::Observe, e)),
        };
        if !observation.resource_exists {
            info!("External resource of {} {} is gone", R::kind(&()), name);
            return ReconcileOutcome::new(
                resource,
                Disposition::Finalized {
                    external_deleted: true,
                },
            );
        }

        if cancel.is_cancelled() {
            return ReconcileOutcome::new(original, Disposition::Cancelled);
        }

        if let Err(e) = self.external.delete(&resource).await {
            return fail(resource, CoreError::external(ExternalOperation::Delete, e));
        }
        info!("Deleting external resource of {} {}", R::kind(&()), name);
        resource.set_conditions([Condition::deleting()]);
        ReconcileOutcome::new(resource, Disposition::AwaitingDeletion)
    }
}

fn advance_binding<R: ManagedResource>(resource: &mut R) -> Result<Disposition> {
    let ready = resource.condition(TYPE_READY).is_true();
    let claimed = resource.claim_reference().is_some();

    match resource.binding_phase() {
        BindingPhase::Bound if !claimed => {
            if on_claim_removed(resource)? == ClaimRemoval::DeleteObject {
                return Ok(Disposition::DeleteObject);
            }
        }
        BindingPhase::Unbound | BindingPhase::Released if claimed && ready => {
            transition(resource, BindingPhase::Bound)?;
        }
        _ => {}
    }
    Ok(Disposition::Synced)
}

fn fail<R: ManagedResource>(mut resource: R, err: CoreError) -> ReconcileOutcome<R> {
    warn!("Reconcile of {} {} failed: {}", R::kind(&()), resource.name_any(), err);
    resource.set_conditions([Condition::reconcile_error(err.reason(), err.to_string())]);
    ReconcileOutcome::new(resource, Disposition::Failed(err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::{ExternalCreation, ExternalObservation, ExternalUpdate};
    use crate::registry::InMemoryStore;
    use async_trait::async_trait;
    use infra_api::azure::ResourceGroupSpec;
    use infra_api::common::condition::{REASON_CREATING, TYPE_SYNCED};
    use infra_api::common::{
        ConditionStatus, ObjectReference, ReclaimPolicy, Resolvable, SecretReference,
    };
    use infra_api::compute::AKSClusterSpec;
    use infra_api::managed::{Bindable, Conditioned};
    use crate::external::NopClient;
    use infra_api::network::{SubnetSpec, VirtualNetworkSpec};
    use infra_api::{AKSCluster, ResourceGroup, Subnet, VirtualNetwork};
    use std::collections::BTreeMap;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
    use std::sync::Mutex;

    /// Driver recording every call, with a scripted external state
    #[derive(Default)]
    struct RecordingDriver {
        exists: bool,
        up_to_date: bool,
        available: bool,
        details: ConnectionDetails,
        calls: Mutex<Vec<&'static str>>,
    }

    impl RecordingDriver {
        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ExternalClient<AKSCluster> for RecordingDriver {
        async fn observe(&self, resource: &mut AKSCluster) -> anyhow::Result<ExternalObservation> {
            self.calls.lock().unwrap().push("observe");
            if self.available {
                resource.set_conditions([Condition::available()]);
            }
            Ok(ExternalObservation {
                resource_exists: self.exists,
                resource_up_to_date: self.up_to_date,
                connection_details: self.details.clone(),
            })
        }

        async fn create(&self, _resource: &mut AKSCluster) -> anyhow::Result<ExternalCreation> {
            self.calls.lock().unwrap().push("create");
            Ok(ExternalCreation::default())
        }

        async fn update(&self, _resource: &mut AKSCluster) -> anyhow::Result<ExternalUpdate> {
            self.calls.lock().unwrap().push("update");
            Ok(ExternalUpdate::default())
        }

        async fn delete(&self, _resource: &AKSCluster) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push("delete");
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingPublisher {
        published: Mutex<Vec<(String, ConnectionDetails)>>,
    }

    #[async_trait]
    impl SecretPublisher for RecordingPublisher {
        async fn publish(
            &self,
            secret: &SecretReference,
            details: &ConnectionDetails,
        ) -> anyhow::Result<()> {
            self.published
                .lock()
                .unwrap()
                .push((secret.name.clone(), details.clone()));
            Ok(())
        }
    }

    struct Harness {
        store: Arc<InMemoryStore>,
        driver: Arc<RecordingDriver>,
        publisher: Arc<RecordingPublisher>,
        reconciler: ManagedReconciler<AKSCluster, InMemoryStore>,
    }

    fn harness(driver: RecordingDriver) -> Harness {
        let store = Arc::new(InMemoryStore::new());
        let driver = Arc::new(driver);
        let publisher = Arc::new(RecordingPublisher::default());
        let reconciler = ManagedReconciler::new(store.clone(), driver.clone(), publisher.clone());
        Harness {
            store,
            driver,
            publisher,
            reconciler,
        }
    }

    fn cluster() -> AKSCluster {
        AKSCluster::new(
            "prod",
            AKSClusterSpec {
                resource_group_name: Resolvable::value("rg-a"),
                location: "westeurope".into(),
                ..Default::default()
            },
        )
    }

    fn claim_ref() -> ObjectReference {
        ObjectReference {
            name: "team-a".into(),
            namespace: Some("apps".into()),
            ..Default::default()
        }
    }

    fn deleting(mut cluster: AKSCluster) -> AKSCluster {
        cluster.metadata.deletion_timestamp = Some(Time(chrono::Utc::now()));
        cluster
    }

    #[tokio::test]
    async fn test_missing_external_resource_is_created() {
        let h = harness(RecordingDriver::default());

        let outcome = h.reconciler.reconcile(cluster(), &CancellationToken::new()).await;

        assert!(matches!(outcome.disposition, Disposition::Synced));
        assert_eq!(h.driver.calls(), vec!["observe", "create"]);
        assert_eq!(outcome.resource.condition(TYPE_READY).reason, REASON_CREATING);
        assert!(outcome.resource.condition(TYPE_SYNCED).is_true());
    }

    #[tokio::test]
    async fn test_stale_external_resource_is_updated() {
        let h = harness(RecordingDriver {
            exists: true,
            ..Default::default()
        });

        h.reconciler.reconcile(cluster(), &CancellationToken::new()).await;

        assert_eq!(h.driver.calls(), vec!["observe", "update"]);
    }

    #[tokio::test]
    async fn test_unresolved_reference_stops_pass() {
        let h = harness(RecordingDriver::default());
        let mut cluster = cluster();
        cluster.spec.resource_group_name = Resolvable::reference("rg-missing");
        cluster.set_claim_reference(Some(claim_ref()));

        let outcome = h.reconciler.reconcile(cluster, &CancellationToken::new()).await;

        assert!(matches!(outcome.disposition, Disposition::Failed(_)));
        assert!(h.driver.calls().is_empty());
        let synced = outcome.resource.condition(TYPE_SYNCED);
        assert_eq!(synced.status, ConditionStatus::False);
        assert_eq!(synced.reason, "ReferenceNotFound");
        assert_eq!(outcome.resource.binding_phase(), BindingPhase::Unbound);
    }

    #[tokio::test]
    async fn test_fatal_field_error_outranks_earlier_retryable_one() {
        let store = Arc::new(InMemoryStore::new());
        for name in ["vnet-a", "vnet-b"] {
            let mut vnet = VirtualNetwork::new(name, VirtualNetworkSpec::default());
            vnet.metadata.labels = Some(BTreeMap::from([("env".to_string(), "prod".to_string())]));
            vnet.set_conditions([Condition::available()]);
            store.insert(&vnet).await.unwrap();
        }
        let reconciler: ManagedReconciler<Subnet, InMemoryStore> = ManagedReconciler::new(
            store,
            Arc::new(NopClient::<Subnet>::new()),
            Arc::new(RecordingPublisher::default()),
        );
        let subnet = Subnet::new(
            "subnet-a",
            SubnetSpec {
                resource_group_name: Resolvable::selector([("env".to_string(), "none".to_string())]),
                virtual_network_name: Resolvable::selector([("env".to_string(), "prod".to_string())]),
                ..Default::default()
            },
        );

        let outcome = reconciler.reconcile(subnet, &CancellationToken::new()).await;

        let err = match outcome.disposition {
            Disposition::Failed(err) => err,
            other => panic!("expected failure, got {:?}", other),
        };
        assert!(err.is_fatal());
        assert_eq!(err.reason(), "AmbiguousReference");
        let synced = outcome.resource.condition(TYPE_SYNCED);
        assert_eq!(synced.reason, "AmbiguousReference");
        assert!(synced.message.contains("spec.resourceGroupName"));
        assert!(synced.message.contains("spec.virtualNetworkName"));
    }

    #[tokio::test]
    async fn test_resolved_reference_is_frozen_in_outcome() {
        let h = harness(RecordingDriver {
            exists: true,
            up_to_date: true,
            ..Default::default()
        });
        let mut group = ResourceGroup::new("rg-a", ResourceGroupSpec::default());
        group.set_conditions([Condition::available()]);
        h.store.insert(&group).await.unwrap();

        let mut cluster = cluster();
        cluster.spec.resource_group_name = Resolvable::reference("rg-a");
        let outcome = h.reconciler.reconcile(cluster, &CancellationToken::new()).await;

        assert!(matches!(outcome.disposition, Disposition::Synced));
        assert_eq!(
            outcome.resource.spec.resource_group_name,
            Resolvable::value("rg-a")
        );
    }

    #[tokio::test]
    async fn test_claimed_ready_resource_becomes_bound() {
        let h = harness(RecordingDriver {
            exists: true,
            up_to_date: true,
            available: true,
            ..Default::default()
        });
        let mut cluster = cluster();
        cluster.set_claim_reference(Some(claim_ref()));

        let outcome = h.reconciler.reconcile(cluster, &CancellationToken::new()).await;

        assert!(matches!(outcome.disposition, Disposition::Synced));
        assert_eq!(outcome.resource.binding_phase(), BindingPhase::Bound);
    }

    #[tokio::test]
    async fn test_claimed_resource_not_ready_stays_unbound() {
        let h = harness(RecordingDriver {
            exists: true,
            up_to_date: true,
            ..Default::default()
        });
        let mut cluster = cluster();
        cluster.set_claim_reference(Some(claim_ref()));

        let outcome = h.reconciler.reconcile(cluster, &CancellationToken::new()).await;

        assert_eq!(outcome.resource.binding_phase(), BindingPhase::Unbound);
    }

    #[tokio::test]
    async fn test_cleared_claim_releases_under_retain() {
        let h = harness(RecordingDriver {
            exists: true,
            up_to_date: true,
            available: true,
            ..Default::default()
        });
        let mut cluster = cluster();
        cluster.set_binding_phase(BindingPhase::Bound);

        let outcome = h.reconciler.reconcile(cluster, &CancellationToken::new()).await;

        assert!(matches!(outcome.disposition, Disposition::Synced));
        assert_eq!(outcome.resource.binding_phase(), BindingPhase::Released);
    }

    #[tokio::test]
    async fn test_cleared_claim_deletes_object_under_delete() {
        let h = harness(RecordingDriver {
            exists: true,
            up_to_date: true,
            available: true,
            ..Default::default()
        });
        let mut cluster = cluster();
        cluster.set_reclaim_policy(ReclaimPolicy::Delete);
        cluster.set_binding_phase(BindingPhase::Bound);

        let outcome = h.reconciler.reconcile(cluster, &CancellationToken::new()).await;

        assert!(matches!(outcome.disposition, Disposition::DeleteObject));
    }

    #[tokio::test]
    async fn test_connection_details_are_published() {
        let h = harness(RecordingDriver {
            exists: true,
            up_to_date: true,
            details: ConnectionDetails::from([("kubeconfig".to_string(), b"apiVersion: v1".to_vec())]),
            ..Default::default()
        });
        let mut cluster = cluster();
        cluster.set_write_connection_secret_to_reference(Some(SecretReference {
            name: "prod-kubeconfig".into(),
            namespace: "infra-system".into(),
        }));

        h.reconciler.reconcile(cluster, &CancellationToken::new()).await;

        let published = h.publisher.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "prod-kubeconfig");
        assert!(published[0].1.contains_key("kubeconfig"));
    }

    #[tokio::test]
    async fn test_empty_details_are_not_published() {
        let h = harness(RecordingDriver {
            exists: true,
            up_to_date: true,
            ..Default::default()
        });
        let mut cluster = cluster();
        cluster.set_write_connection_secret_to_reference(Some(SecretReference {
            name: "prod-kubeconfig".into(),
            namespace: "infra-system".into(),
        }));

        h.reconciler.reconcile(cluster, &CancellationToken::new()).await;

        assert!(h.publisher.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_pass_returns_original() {
        let h = harness(RecordingDriver::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let original = cluster();
        let outcome = h.reconciler.reconcile(original.clone(), &cancel).await;

        assert!(matches!(outcome.disposition, Disposition::Cancelled));
        assert_eq!(outcome.resource, original);
        assert!(h.driver.calls().is_empty());
    }

    #[tokio::test]
    async fn test_retained_bound_resource_is_not_torn_down() {
        let h = harness(RecordingDriver {
            exists: true,
            ..Default::default()
        });
        let mut cluster = deleting(cluster());
        cluster.set_binding_phase(BindingPhase::Bound);

        let outcome = h.reconciler.reconcile(cluster, &CancellationToken::new()).await;

        assert!(matches!(
            outcome.disposition,
            Disposition::Finalized {
                external_deleted: false
            }
        ));
        assert!(h.driver.calls().is_empty());
    }

    #[tokio::test]
    async fn test_delete_policy_tears_down_existing_resource() {
        let h = harness(RecordingDriver {
            exists: true,
            ..Default::default()
        });
        let mut cluster = deleting(cluster());
        cluster.set_reclaim_policy(ReclaimPolicy::Delete);
        cluster.set_binding_phase(BindingPhase::Bound);

        let outcome = h.reconciler.reconcile(cluster, &CancellationToken::new()).await;

        assert!(matches!(outcome.disposition, Disposition::AwaitingDeletion));
        assert_eq!(h.driver.calls(), vec!["observe", "delete"]);
        assert_eq!(outcome.resource.condition(TYPE_READY).reason, "Deleting");
    }

    #[tokio::test]
    async fn test_deletion_completes_once_resource_is_gone() {
        let h = harness(RecordingDriver::default());
        let cluster = deleting(cluster());

        let outcome = h.reconciler.reconcile(cluster, &CancellationToken::new()).await;

        assert!(matches!(
            outcome.disposition,
            Disposition::Finalized {
                external_deleted: true
            }
        ));
        assert_eq!(h.driver.calls(), vec!["observe"]);
    }
}
