//! Kubernetes API backed object store and connection secret sink

use async_trait::async_trait;
use infra_api::common::{SecretReference, Selector};
use infra_core::{ConnectionDetails, Lookup, ObjectStore, SecretPublisher, StoreError};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kube::api::{
    Api, ApiResource, DeleteParams, DynamicObject, ListParams, Patch, PatchParams, PostParams,
};
use kube::{Client, ResourceExt};
use tracing::debug;

/// Field manager for writes made by the controller
pub const FIELD_MANAGER: &str = "infra-controller";

/// ObjectStore over the Kubernetes API
///
/// Objects go through the dynamic API so the same code path serves
/// cluster-scoped managed resources and namespaced claims.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K: Lookup>(&self, namespace: Option<&str>) -> Api<DynamicObject> {
        let resource = ApiResource::erase::<K>(&());
        match namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &resource),
            None => Api::all_with(self.client.clone(), &resource),
        }
    }

    /// Add `finalizer` to an object unless already present
    pub async fn add_finalizer<K: Lookup>(
        &self,
        object: &K,
        finalizer: &str,
    ) -> Result<(), StoreError> {
        let mut finalizers = object.finalizers().to_vec();
        if finalizers.iter().any(|f| f == finalizer) {
            return Ok(());
        }
        finalizers.push(finalizer.to_string());
        self.patch_finalizers(object, finalizers).await
    }

    /// Remove `finalizer` from an object
    pub async fn remove_finalizer<K: Lookup>(
        &self,
        object: &K,
        finalizer: &str,
    ) -> Result<(), StoreError> {
        let finalizers: Vec<String> = object
            .finalizers()
            .iter()
            .filter(|f| *f != finalizer)
            .cloned()
            .collect();
        self.patch_finalizers(object, finalizers).await
    }

    async fn patch_finalizers<K: Lookup>(
        &self,
        object: &K,
        finalizers: Vec<String>,
    ) -> Result<(), StoreError> {
        let patch = serde_json::json!({
            "metadata": {
                "finalizers": finalizers
            }
        });

        self.api::<K>(object.namespace().as_deref())
            .patch(&object.name_any(), &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| classify(e, &object.name_any()))?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get<K: Lookup>(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<K>, StoreError> {
        self.api::<K>(namespace)
            .get_opt(name)
            .await?
            .map(typed)
            .transpose()
    }

    async fn list<K: Lookup>(
        &self,
        namespace: Option<&str>,
        selector: &Selector,
    ) -> Result<Vec<K>, StoreError> {
        let mut params = ListParams::default();
        if !selector.match_labels.is_empty() {
            params = params.labels(&selector.to_query());
        }

        let objects = self.api::<K>(namespace).list(&params).await?;
        objects.items.into_iter().map(typed).collect()
    }

    /// Write `object` back, spec first and then status
    ///
    /// Status is a subresource, so a change to both takes two writes. When
    /// only status differs from the stored object the replace is skipped. If
    /// the status patch fails after a replace, the new spec is stored with the
    /// previous status until the next pass writes it again.
    async fn apply<K: Lookup>(&self, object: &K) -> Result<K, StoreError> {
        let name = object.name_any();
        let api = self.api::<K>(object.namespace().as_deref());

        let current = api
            .get_opt(&name)
            .await?
            .ok_or_else(|| StoreError::NotFound(name.clone()))?;
        let current = serde_json::to_value(typed::<K>(current)?)?;
        let desired = serde_json::to_value(object)?;
        let status = desired.get("status").filter(|s| !s.is_null()).cloned();

        let mut stored = None;
        if needs_replace(&current, &desired) {
            let dynamic: DynamicObject = serde_json::from_value(desired.clone())?;
            stored = Some(
                api.replace(&name, &PostParams::default(), &dynamic)
                    .await
                    .map_err(|e| classify(e, &name))?,
            );
        }

        if let Some(status) = status.filter(|s| current.get("status") != Some(s)) {
            // Carry the version we read so a concurrent writer gets a conflict.
            let version = stored
                .as_ref()
                .and_then(|s| s.resource_version())
                .or_else(|| object.resource_version());
            let mut patch = serde_json::json!({ "status": status });
            if let Some(version) = version {
                patch["metadata"] = serde_json::json!({ "resourceVersion": version });
            }
            stored = Some(
                api.patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch))
                    .await
                    .map_err(|e| classify(e, &name))?,
            );
        }

        match stored {
            Some(stored) => {
                debug!("Applied {} {}", K::kind(&()), name);
                typed(stored)
            }
            None => Ok(object.clone()),
        }
    }

    async fn delete<K: Lookup>(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<(), StoreError> {
        match self
            .api::<K>(namespace)
            .delete(name, &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Whether the non-status parts of `desired` differ from `current`
fn needs_replace(current: &serde_json::Value, desired: &serde_json::Value) -> bool {
    if current.get("spec") != desired.get("spec") {
        return true;
    }
    ["labels", "annotations", "finalizers", "ownerReferences"]
        .iter()
        .any(|field| current["metadata"].get(field) != desired["metadata"].get(field))
}

fn typed<K: Lookup>(object: DynamicObject) -> Result<K, StoreError> {
    Ok(serde_json::from_value(serde_json::to_value(object)?)?)
}

fn classify(err: kube::Error, name: &str) -> StoreError {
    match err {
        kube::Error::Api(ae) if ae.code == 409 => StoreError::Conflict(name.to_string()),
        kube::Error::Api(ae) if ae.code == 404 => StoreError::NotFound(name.to_string()),
        e => StoreError::KubernetesError(e),
    }
}

/// Publishes connection details as an Opaque Secret
pub struct KubeSecretPublisher {
    client: Client,
}

impl KubeSecretPublisher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SecretPublisher for KubeSecretPublisher {
    async fn publish(
        &self,
        secret: &SecretReference,
        details: &ConnectionDetails,
    ) -> anyhow::Result<()> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), &secret.namespace);
        let object = connection_secret(secret, details);

        api.patch(
            &secret.name,
            &PatchParams::apply(FIELD_MANAGER).force(),
            &Patch::Apply(&object),
        )
        .await?;

        debug!("Published connection secret {}/{}", secret.namespace, secret.name);
        Ok(())
    }
}

fn connection_secret(secret: &SecretReference, details: &ConnectionDetails) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(secret.name.clone()),
            namespace: Some(secret.namespace.clone()),
            ..Default::default()
        },
        type_: Some("Opaque".to_string()),
        data: Some(
            details
                .iter()
                .map(|(k, v)| (k.clone(), ByteString(v.clone())))
                .collect(),
        ),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subnet(address_prefix: &str, phase: &str) -> serde_json::Value {
        serde_json::json!({
            "metadata": { "name": "nodes", "labels": { "tier": "nodes" } },
            "spec": { "properties": { "addressPrefix": address_prefix } },
            "status": { "bindingPhase": phase },
        })
    }

    #[test]
    fn test_status_only_change_skips_replace() {
        assert!(!needs_replace(&subnet("10.0.0.0/24", "Unbound"), &subnet("10.0.0.0/24", "Bound")));
    }

    #[test]
    fn test_spec_or_label_change_needs_replace() {
        let current = subnet("10.0.0.0/24", "Unbound");
        assert!(needs_replace(&current, &subnet("10.0.1.0/24", "Unbound")));

        let mut relabelled = current.clone();
        relabelled["metadata"]["labels"]["tier"] = "system".into();
        assert!(needs_replace(&current, &relabelled));
    }

    #[test]
    fn test_connection_secret_carries_details() {
        let reference = SecretReference {
            name: "prod-kubeconfig".into(),
            namespace: "infra-system".into(),
        };
        let details =
            ConnectionDetails::from([("kubeconfig".to_string(), b"apiVersion: v1".to_vec())]);

        let secret = connection_secret(&reference, &details);

        assert_eq!(secret.metadata.name.as_deref(), Some("prod-kubeconfig"));
        assert_eq!(secret.metadata.namespace.as_deref(), Some("infra-system"));
        assert_eq!(secret.type_.as_deref(), Some("Opaque"));
        let data = secret.data.unwrap();
        assert_eq!(data["kubeconfig"].0, b"apiVersion: v1".to_vec());
    }
}
