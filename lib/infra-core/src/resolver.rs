//! Lazy resolution of spec fields from other resources' outputs
//!
//! A `Resolvable` field is either already a literal, a direct reference to
//! one object, or a selector that must match exactly one object. Once
//! resolved the value is frozen back into the field as a literal, so running
//! resolution again on the next pass is a no-op.

use async_trait::async_trait;
use infra_api::common::condition::TYPE_READY;
use infra_api::common::{Resolvable, Selector};
use infra_api::managed::ManagedResource;
use infra_api::{AKSCluster, ResourceGroup, Subnet, VirtualNetwork};
use kube::ResourceExt;
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{FieldError, ResolveError, StoreError};
use crate::store::{Lookup, ObjectStore};

/// Resolves `Resolvable` fields against an object store
pub struct ReferenceResolver<'a, S: ?Sized> {
    store: &'a S,
    namespace: Option<&'a str>,
    cancel: &'a CancellationToken,
}

impl<'a, S: ObjectStore + ?Sized> ReferenceResolver<'a, S> {
    /// Resolver looking up targets in `namespace` (`None` for cluster-scoped kinds)
    pub fn new(store: &'a S, namespace: Option<&'a str>, cancel: &'a CancellationToken) -> Self {
        Self {
            store,
            namespace,
            cancel,
        }
    }

    /// Resolve `field` by reading `extract` from the referenced `K`
    pub async fn resolve<K, F>(
        &self,
        field: &mut Resolvable,
        extract: F,
    ) -> Result<String, ResolveError>
    where
        K: Lookup,
        F: Fn(&K) -> Option<String> + Send + Sync,
    {
        self.resolve_filtered(field, extract, |_: &K| true).await
    }

    /// Like `resolve`, considering only candidates accepted by `eligible`
    ///
    /// A directly referenced object that is not eligible is reported as not
    /// ready; ineligible selector matches are ignored.
    pub async fn resolve_filtered<K, F, P>(
        &self,
        field: &mut Resolvable,
        extract: F,
        eligible: P,
    ) -> Result<String, ResolveError>
    where
        K: Lookup,
        F: Fn(&K) -> Option<String> + Send + Sync,
        P: Fn(&K) -> bool + Send + Sync,
    {
        let kind = K::kind(&()).into_owned();

        let resolved = match field {
            Resolvable::Value(v) => return Ok(v.clone()),

            Resolvable::Ref(reference) => {
                let name = reference.name.clone();
                let target: Option<K> = self
                    .cancellable(&kind, self.store.get(self.namespace, &name))
                    .await?;

                let target = target.ok_or_else(|| ResolveError::ReferenceNotFound {
                    kind: kind.clone(),
                    name: name.clone(),
                })?;
                if !eligible(&target) {
                    return Err(ResolveError::ReferenceNotReady { kind, name });
                }
                extract(&target).ok_or(ResolveError::ReferenceNotReady { kind: kind.clone(), name })?
            }

            Resolvable::Selector(selector) => {
                let selector = selector.clone();
                let candidates: Vec<K> = self
                    .cancellable(&kind, self.store.list(self.namespace, &selector))
                    .await?;
                let mut matched: Vec<K> = candidates.into_iter().filter(|c| eligible(c)).collect();

                match matched.len() {
                    0 => {
                        return Err(ResolveError::NoMatchingReference {
                            kind,
                            selector: describe(&selector),
                        })
                    }
                    1 => {}
                    count => {
                        return Err(ResolveError::AmbiguousReference {
                            kind,
                            selector: describe(&selector),
                            count,
                        })
                    }
                }

                let target = matched.remove(0);
                extract(&target).ok_or_else(|| ResolveError::ReferenceNotReady {
                    kind: kind.clone(),
                    name: target.name_any(),
                })?
            }
        };

        // A pass cancelled while we were looking things up must not commit.
        if self.cancel.is_cancelled() {
            return Err(ResolveError::Cancelled);
        }

        debug!("Resolved {} reference to {}", kind, resolved);
        *field = Resolvable::Value(resolved.clone());
        Ok(resolved)
    }

    async fn cancellable<T>(
        &self,
        kind: &str,
        lookup: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, ResolveError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ResolveError::Cancelled),
            result = lookup => result.map_err(|e| ResolveError::Store {
                kind: kind.to_string(),
                message: e.to_string(),
            }),
        }
    }
}

fn describe(selector: &Selector) -> String {
    if selector.match_labels.is_empty() {
        "<everything>".to_string()
    } else {
        selector.to_query()
    }
}

/// Name of a managed resource once it reports Ready
pub fn name_when_ready<K: ManagedResource>(target: &K) -> Option<String> {
    target
        .condition(TYPE_READY)
        .is_true()
        .then(|| target.name_any())
}

/// Resolution of every deferred field of a spec
///
/// Fields are resolved independently: a failure on one field never stops
/// the others, and successfully resolved fields are frozen even when a
/// sibling fails.
#[async_trait]
pub trait ResolveReferences {
    async fn resolve_references<S: ObjectStore + ?Sized>(
        &mut self,
        resolver: &ReferenceResolver<'_, S>,
    ) -> Vec<FieldError>;
}

#[async_trait]
impl ResolveReferences for ResourceGroup {
    async fn resolve_references<S: ObjectStore + ?Sized>(
        &mut self,
        _resolver: &ReferenceResolver<'_, S>,
    ) -> Vec<FieldError> {
        Vec::new()
    }
}

#[async_trait]
impl ResolveReferences for VirtualNetwork {
    async fn resolve_references<S: ObjectStore + ?Sized>(
        &mut self,
        resolver: &ReferenceResolver<'_, S>,
    ) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if let Err(e) = resolver
            .resolve(&mut self.spec.resource_group_name, name_when_ready::<ResourceGroup>)
            .await
        {
            errors.push(FieldError::new("spec.resourceGroupName", e));
        }
        errors
    }
}

#[async_trait]
impl ResolveReferences for Subnet {
    async fn resolve_references<S: ObjectStore + ?Sized>(
        &mut self,
        resolver: &ReferenceResolver<'_, S>,
    ) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if let Err(e) = resolver
            .resolve(&mut self.spec.resource_group_name, name_when_ready::<ResourceGroup>)
            .await
        {
            errors.push(FieldError::new("spec.resourceGroupName", e));
        }
        if let Err(e) = resolver
            .resolve(&mut self.spec.virtual_network_name, name_when_ready::<VirtualNetwork>)
            .await
        {
            errors.push(FieldError::new("spec.virtualNetworkName", e));
        }
        errors
    }
}

#[async_trait]
impl ResolveReferences for AKSCluster {
    async fn resolve_references<S: ObjectStore + ?Sized>(
        &mut self,
        resolver: &ReferenceResolver<'_, S>,
    ) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if let Err(e) = resolver
            .resolve(&mut self.spec.resource_group_name, name_when_ready::<ResourceGroup>)
            .await
        {
            errors.push(FieldError::new("spec.resourceGroupName", e));
        }
        if let Some(subnet_id) = self.spec.vnet_subnet_id.as_mut() {
            if let Err(e) = resolver
                .resolve(subnet_id, |s: &Subnet| {
                    s.status.as_ref().and_then(|st| st.id.clone())
                })
                .await
            {
                errors.push(FieldError::new("spec.vnetSubnetID", e));
            }
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::InMemoryStore;
    use infra_api::azure::ResourceGroupSpec;
    use infra_api::common::Condition;
    use infra_api::managed::Conditioned;
    use infra_api::network::{SubnetSpec, SubnetStatus};
    use std::collections::BTreeMap;

    fn group(name: &str, labels: &[(&str, &str)], ready: bool) -> ResourceGroup {
        let mut rg = ResourceGroup::new(
            name,
            ResourceGroupSpec {
                location: "westeurope".into(),
                ..Default::default()
            },
        );
        rg.metadata.labels = Some(
            labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
        );
        if ready {
            rg.set_conditions([Condition::available()]);
        }
        rg
    }

    fn prod() -> Resolvable {
        Resolvable::selector([("env".to_string(), "prod".to_string())])
    }

    #[tokio::test]
    async fn test_literal_is_returned_without_lookup() {
        let store = InMemoryStore::new();
        let cancel = CancellationToken::new();
        let resolver = ReferenceResolver::new(&store, None, &cancel);

        let mut field = Resolvable::value("rg-literal");
        let value = resolver
            .resolve(&mut field, name_when_ready::<ResourceGroup>)
            .await
            .unwrap();

        assert_eq!(value, "rg-literal");
        assert_eq!(field, Resolvable::value("rg-literal"));
    }

    #[tokio::test]
    async fn test_reference_not_found() {
        let store = InMemoryStore::new();
        let cancel = CancellationToken::new();
        let resolver = ReferenceResolver::new(&store, None, &cancel);

        let mut field = Resolvable::reference("rg-missing");
        let err = resolver
            .resolve(&mut field, name_when_ready::<ResourceGroup>)
            .await
            .unwrap_err();

        assert_eq!(err.reason(), "ReferenceNotFound");
        assert_eq!(field, Resolvable::reference("rg-missing"));
    }

    #[tokio::test]
    async fn test_reference_not_ready_until_target_is_ready() {
        let store = InMemoryStore::new();
        store.insert(&group("rg-a", &[], false)).await.unwrap();
        let cancel = CancellationToken::new();
        let resolver = ReferenceResolver::new(&store, None, &cancel);

        let mut field = Resolvable::reference("rg-a");
        let err = resolver
            .resolve(&mut field, name_when_ready::<ResourceGroup>)
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "ReferenceNotReady");

        store.insert(&group("rg-a", &[], true)).await.unwrap();
        let value = resolver
            .resolve(&mut field, name_when_ready::<ResourceGroup>)
            .await
            .unwrap();
        assert_eq!(value, "rg-a");
        assert_eq!(field, Resolvable::value("rg-a"));
    }

    #[tokio::test]
    async fn test_resolution_freezes_value() {
        let store = InMemoryStore::new();
        store.insert(&group("rg-a", &[("env", "prod")], true)).await.unwrap();
        let cancel = CancellationToken::new();
        let resolver = ReferenceResolver::new(&store, None, &cancel);

        let mut field = prod();
        let first = resolver
            .resolve(&mut field, name_when_ready::<ResourceGroup>)
            .await
            .unwrap();

        // Once frozen, the candidate set no longer matters.
        store.delete::<ResourceGroup>(None, "rg-a").await.unwrap();
        let second = resolver
            .resolve(&mut field, name_when_ready::<ResourceGroup>)
            .await
            .unwrap();

        assert_eq!(first, "rg-a");
        assert_eq!(second, first);
        assert_eq!(field, Resolvable::value("rg-a"));
    }

    #[tokio::test]
    async fn test_selector_without_match_is_retryable() {
        let store = InMemoryStore::new();
        store.insert(&group("rg-dev", &[("env", "dev")], true)).await.unwrap();
        let cancel = CancellationToken::new();
        let resolver = ReferenceResolver::new(&store, None, &cancel);

        let mut field = prod();
        let err = resolver
            .resolve(&mut field, name_when_ready::<ResourceGroup>)
            .await
            .unwrap_err();

        assert_eq!(err.reason(), "NoMatchingReference");
        assert!(!err.is_fatal());
        assert_eq!(field, prod());
    }

    #[tokio::test]
    async fn test_selector_with_two_matches_is_ambiguous() {
        let store = InMemoryStore::new();
        store.insert(&group("rg-a", &[("env", "prod")], true)).await.unwrap();
        store.insert(&group("rg-b", &[("env", "prod")], true)).await.unwrap();
        let cancel = CancellationToken::new();
        let resolver = ReferenceResolver::new(&store, None, &cancel);

        let mut field = prod();
        let err = resolver
            .resolve(&mut field, name_when_ready::<ResourceGroup>)
            .await
            .unwrap_err();

        assert!(matches!(err, ResolveError::AmbiguousReference { count: 2, .. }));
        assert!(err.is_fatal());
        assert_eq!(field, prod());
    }

    #[tokio::test]
    async fn test_filter_narrows_selector_candidates() {
        let store = InMemoryStore::new();
        store.insert(&group("rg-a", &[("env", "prod")], true)).await.unwrap();
        store.insert(&group("rg-b", &[("env", "prod")], true)).await.unwrap();
        let cancel = CancellationToken::new();
        let resolver = ReferenceResolver::new(&store, None, &cancel);

        let mut field = prod();
        let value = resolver
            .resolve_filtered(
                &mut field,
                name_when_ready::<ResourceGroup>,
                |rg: &ResourceGroup| rg.name_any() == "rg-b",
            )
            .await
            .unwrap();

        assert_eq!(value, "rg-b");
    }

    #[tokio::test]
    async fn test_cancelled_resolution_leaves_field_untouched() {
        let store = InMemoryStore::new();
        store.insert(&group("rg-a", &[], true)).await.unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let resolver = ReferenceResolver::new(&store, None, &cancel);

        let mut field = Resolvable::reference("rg-a");
        let err = resolver
            .resolve(&mut field, name_when_ready::<ResourceGroup>)
            .await
            .unwrap_err();

        assert_eq!(err, ResolveError::Cancelled);
        assert_eq!(field, Resolvable::reference("rg-a"));
    }

    #[tokio::test]
    async fn test_one_failing_field_does_not_block_others() {
        let store = InMemoryStore::new();
        store.insert(&group("rg-a", &[], true)).await.unwrap();
        let cancel = CancellationToken::new();
        let resolver = ReferenceResolver::new(&store, None, &cancel);

        let mut subnet = Subnet::new(
            "nodes",
            SubnetSpec {
                resource_group_name: Resolvable::reference("rg-a"),
                virtual_network_name: Resolvable::reference("vnet-missing"),
                ..Default::default()
            },
        );
        let errors = subnet.resolve_references(&resolver).await;

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "spec.virtualNetworkName");
        assert_eq!(subnet.spec.resource_group_name, Resolvable::value("rg-a"));
    }

    #[tokio::test]
    async fn test_every_failing_field_is_reported_in_order() {
        let store = InMemoryStore::new();
        let cancel = CancellationToken::new();
        let resolver = ReferenceResolver::new(&store, None, &cancel);

        let mut subnet = Subnet::new(
            "nodes",
            SubnetSpec {
                resource_group_name: Resolvable::selector([("env".to_string(), "none".to_string())]),
                virtual_network_name: Resolvable::reference("vnet-missing"),
                ..Default::default()
            },
        );
        let errors = subnet.resolve_references(&resolver).await;

        let reasons: Vec<_> = errors.iter().map(|e| (e.field.as_str(), e.source.reason())).collect();
        assert_eq!(
            reasons,
            vec![
                ("spec.resourceGroupName", "NoMatchingReference"),
                ("spec.virtualNetworkName", "ReferenceNotFound"),
            ]
        );
    }

    #[tokio::test]
    async fn test_cluster_reads_subnet_id_from_status() {
        let store = InMemoryStore::new();
        store.insert(&group("rg-a", &[], true)).await.unwrap();
        let mut subnet = Subnet::new("nodes", SubnetSpec::default());
        subnet.metadata.labels = Some(BTreeMap::from([(
            "tier".to_string(),
            "nodes".to_string(),
        )]));
        subnet.status = Some(SubnetStatus {
            id: Some("/subscriptions/s/subnets/nodes".into()),
            ..Default::default()
        });
        store.insert(&subnet).await.unwrap();

        let cancel = CancellationToken::new();
        let resolver = ReferenceResolver::new(&store, None, &cancel);
        let mut cluster = AKSCluster::new(
            "prod",
            infra_api::compute::AKSClusterSpec {
                resource_group_name: Resolvable::reference("rg-a"),
                vnet_subnet_id: Some(Resolvable::selector([(
                    "tier".to_string(),
                    "nodes".to_string(),
                )])),
                ..Default::default()
            },
        );
        let errors = cluster.resolve_references(&resolver).await;

        assert!(errors.is_empty());
        assert_eq!(
            cluster.spec.vnet_subnet_id,
            Some(Resolvable::value("/subscriptions/s/subnets/nodes"))
        );
    }
}
