//! Binding of claims to managed resources

use infra_api::common::condition::TYPE_READY;
use infra_api::common::{BindingPhase, Condition, ObjectReference, Resolvable, SecretReference};
use infra_api::managed::{Classified, ManagedResource, ResourceClaim, ResourceClass};
use kube::ResourceExt;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::binding::{on_claim_removed, transition, ClaimRemoval};
use crate::error::{CoreError, FieldError, ResolveError, Result};
use crate::reconciler::{Disposition, ReconcileOutcome};
use crate::resolver::ReferenceResolver;
use crate::store::ObjectStore;

const RESOURCE_FIELD: &str = "spec.resource";
const CLASS_FIELD: &str = "spec.classRef";

/// Binds claims to managed resources of kind `R`
pub struct ClaimBinder<R, S> {
    store: Arc<S>,
    _kind: PhantomData<fn() -> R>,
}

impl<R, S> ClaimBinder<R, S>
where
    R: Classified,
    S: ObjectStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            _kind: PhantomData,
        }
    }

    /// Bind `claim` to the resource its selection picks
    ///
    /// The resource is claimed right away; it becomes Bound once it reports
    /// Ready, and the claim follows it on a later pass.
    pub async fn bind<C: ResourceClaim>(
        &self,
        claim: C,
        cancel: &CancellationToken,
    ) -> ReconcileOutcome<C> {
        let original = claim.clone();
        let mut claim = claim;

        match self.bind_resource(&mut claim, cancel).await {
            Ok(resource_phase) => {
                if resource_phase == BindingPhase::Bound {
                    if let Err(err) = transition(&mut claim, BindingPhase::Bound) {
                        return fail(claim, err);
                    }
                    claim.set_conditions([Condition::available(), Condition::reconcile_success()]);
                } else {
                    claim.set_conditions([Condition::binding(), Condition::reconcile_success()]);
                }
                ReconcileOutcome {
                    resource: claim,
                    disposition: Disposition::Synced,
                }
            }
            Err(CoreError::Cancelled) => ReconcileOutcome {
                resource: original,
                disposition: Disposition::Cancelled,
            },
            Err(err) => fail(claim, err),
        }
    }

    /// Claim the selected resource, returning its binding phase
    async fn bind_resource<C: ResourceClaim>(
        &self,
        claim: &mut C,
        cancel: &CancellationToken,
    ) -> Result<BindingPhase> {
        let me = ObjectReference::for_object(&*claim);
        let eligible = |r: &R| available_to(r, &me);

        let mut selection = claim.resource_reference().clone();
        let resolver = ReferenceResolver::new(self.store.as_ref(), None, cancel);
        let name = resolver
            .resolve_filtered(&mut selection, |r: &R| Some(r.name_any()), eligible)
            .await
            .map_err(|e| match e {
                ResolveError::Cancelled => CoreError::Cancelled,
                e => CoreError::from(FieldError::new(RESOURCE_FIELD, e)),
            })?;

        let mut resource: R = self.store.get(None, &name).await?.ok_or_else(|| {
            CoreError::from(FieldError::new(
                RESOURCE_FIELD,
                ResolveError::ReferenceNotFound {
                    kind: R::kind(&()).into_owned(),
                    name: name.clone(),
                },
            ))
        })?;

        // A frozen selection skips the eligibility filter; recheck here.
        if !available_to(&resource, &me) {
            return Err(CoreError::from(FieldError::new(
                RESOURCE_FIELD,
                ResolveError::ReferenceNotReady {
                    kind: R::kind(&()).into_owned(),
                    name,
                },
            )));
        }

        // Defaults come from the class only when it is first attached.
        let class = match claim.class_reference() {
            Some(class) if resource.class_reference() != Some(class) => {
                Some((class.clone(), self.fetch_class(class).await?))
            }
            _ => None,
        };

        if cancel.is_cancelled() {
            return Err(CoreError::Cancelled);
        }

        let before = resource.clone();
        if resource.claim_reference().is_none() {
            info!("Claiming {} {} for {}", R::kind(&()), name, claim_key(&me));
            resource.set_claim_reference(Some(me.clone()));
        }
        if let Some((reference, class)) = class {
            debug!(
                "Applying {} {} defaults to {} {}",
                <R::Class as kube::Resource>::kind(&()),
                reference.name,
                R::kind(&()),
                name
            );
            resource.set_reclaim_policy(class.reclaim_policy());
            resource.set_class_reference(Some(reference));
        }
        if resource.write_connection_secret_to_reference().is_none() {
            if let Some(secret) = claim_secret(&*claim) {
                resource.set_write_connection_secret_to_reference(Some(secret));
            }
        }
        if resource.condition(TYPE_READY).is_true() {
            transition(&mut resource, BindingPhase::Bound)?;
        }

        let phase = resource.binding_phase();
        if serde_json::to_value(&resource).ok() != serde_json::to_value(&before).ok() {
            self.store.apply(&resource).await?;
        }

        claim.set_resource_reference(Resolvable::Value(name));
        Ok(phase)
    }

    async fn fetch_class(&self, reference: &ObjectReference) -> Result<R::Class> {
        self.store
            .get::<R::Class>(None, &reference.name)
            .await?
            .ok_or_else(|| {
                CoreError::from(FieldError::new(
                    CLASS_FIELD,
                    ResolveError::ReferenceNotFound {
                        kind: <R::Class as kube::Resource>::kind(&()).into_owned(),
                        name: reference.name.clone(),
                    },
                ))
            })
    }

    /// Let go of the resource bound to a deleted claim
    pub async fn release<C: ResourceClaim>(&self, claim: &C) -> Result<()> {
        let Some(name) = claim.resource_reference().as_value() else {
            debug!("Claim {} never selected a resource", claim.name_any());
            return Ok(());
        };

        let Some(mut resource) = self.store.get::<R>(None, name).await? else {
            return Ok(());
        };

        let me = ObjectReference::for_object(claim);
        if !resource
            .claim_reference()
            .is_some_and(|bound| bound.refers_to(&me))
        {
            return Ok(());
        }

        match on_claim_removed(&mut resource)? {
            ClaimRemoval::DeleteObject => {
                info!("Deleting {} {} released by {}", R::kind(&()), name, claim_key(&me));
                self.store.delete::<R>(None, name).await?;
            }
            ClaimRemoval::Released => {
                info!("Released {} {} from {}", R::kind(&()), name, claim_key(&me));
                self.store.apply(&resource).await?;
            }
        }
        Ok(())
    }
}

/// Whether `resource` is free for, or already held by, the claim `me`
fn available_to<R: ManagedResource>(resource: &R, me: &ObjectReference) -> bool {
    match resource.claim_reference() {
        Some(holder) => holder.refers_to(me),
        None => resource.binding_phase() != BindingPhase::Bound,
    }
}

/// Connection secret a claim asks for, placed in the claim's namespace
fn claim_secret<C: ResourceClaim>(claim: &C) -> Option<SecretReference> {
    let secret = claim.write_connection_secret_to_reference()?;
    Some(SecretReference {
        name: secret.name.clone(),
        namespace: claim.namespace()?,
    })
}

fn claim_key(claim: &ObjectReference) -> String {
    crate::store::object_key(claim.namespace.as_deref(), &claim.name)
}

fn fail<C: ResourceClaim>(mut claim: C, err: CoreError) -> ReconcileOutcome<C> {
    warn!("Binding of {} {} failed: {}", C::kind(&()), claim.name_any(), err);
    claim.set_conditions([Condition::reconcile_error(err.reason(), err.to_string())]);
    ReconcileOutcome {
        resource: claim,
        disposition: Disposition::Failed(err),
    }
}
