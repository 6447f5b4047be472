use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::common::{ResourceClaimSpec, ResourceClaimStatus};
use crate::managed::resource_claim;

/// KubernetesCluster is a claim for a managed Kubernetes cluster.
/// It binds to a single AKSCluster chosen by name or by label selector.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "compute.infra.datum.net",
    version = "v1alpha1",
    kind = "KubernetesCluster",
    plural = "kubernetesclusters",
    namespaced,
    derive = "Default",
    derive = "PartialEq",
    status = "ResourceClaimStatus",
    printcolumn = r#"{"name":"READY","type":"string","jsonPath":".status.conditions[?(@.type=='Ready')].status"}"#,
    printcolumn = r#"{"name":"PHASE","type":"string","jsonPath":".status.bindingPhase"}"#,
)]
#[serde(rename_all = "camelCase")]
pub struct KubernetesClusterSpec {
    #[serde(flatten)]
    pub claim_spec: ResourceClaimSpec,
}

resource_claim!(KubernetesCluster);
