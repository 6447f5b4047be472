use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::common::{Resolvable, ResourceSpec, ResourceStatus};
use crate::managed::managed_resource;

/// Default node count for an agent pool
pub const DEFAULT_NODE_COUNT: i32 = 1;

/// AKSCluster is a managed resource representing an Azure Kubernetes Service cluster
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "compute.azure.infra.datum.net",
    version = "v1alpha3",
    kind = "AKSCluster",
    plural = "aksclusters",
    derive = "Default",
    derive = "PartialEq",
    status = "AKSClusterStatus",
    printcolumn = r#"{"name":"READY","type":"string","jsonPath":".status.conditions[?(@.type=='Ready')].status"}"#,
    printcolumn = r#"{"name":"SYNCED","type":"string","jsonPath":".status.conditions[?(@.type=='Synced')].status"}"#,
    printcolumn = r#"{"name":"PHASE","type":"string","jsonPath":".status.bindingPhase"}"#,
    printcolumn = r#"{"name":"ENDPOINT","type":"string","jsonPath":".status.endpoint"}"#,
    printcolumn = r#"{"name":"LOCATION","type":"string","jsonPath":".spec.location"}"#,
)]
#[serde(rename_all = "camelCase")]
pub struct AKSClusterSpec {
    #[serde(flatten)]
    pub resource_spec: ResourceSpec,

    /// Resource group the cluster is created in
    pub resource_group_name: Resolvable,

    /// Azure region of the cluster
    pub location: String,

    /// Kubernetes version deployed to the cluster
    pub version: String,

    /// Subnet the cluster nodes are deployed to
    #[serde(default, rename = "vnetSubnetID", skip_serializing_if = "Option::is_none")]
    pub vnet_subnet_id: Option<Resolvable>,

    /// Agent pools
    pub agent_pool_profiles: Vec<AgentPoolProfile>,

    /// Networking configuration
    #[serde(default)]
    pub network_profile: NetworkProfile,

    /// DNS name prefix of the hosted API server FQDN
    #[serde(default)]
    pub dns_name_prefix: String,

    /// Disable Kubernetes RBAC in the cluster
    #[serde(default, rename = "disableRBAC")]
    pub disable_rbac: bool,
}

/// Desired state of an agent pool
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AgentPoolProfile {
    pub name: String,

    #[serde(default = "default_node_count")]
    pub node_count: i32,

    #[serde(rename = "nodeVMSize")]
    pub node_vm_size: String,

    #[serde(default)]
    pub mode: AgentPoolMode,

    #[serde(default, rename = "type")]
    pub pool_type: AgentPoolType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pods: Option<i32>,
}

/// Role of an agent pool
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum AgentPoolMode {
    #[default]
    System,
    User,
}

/// VM orchestration backing an agent pool
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum AgentPoolType {
    #[default]
    VirtualMachineScaleSets,
    AvailabilitySet,
}

/// Cluster networking configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NetworkProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_plugin: Option<NetworkPlugin>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_policy: Option<NetworkPolicy>,
}

/// CNI plugin used by the cluster
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum NetworkPlugin {
    Azure,
    Kubenet,
}

/// Network policy engine used by the cluster
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum NetworkPolicy {
    Azure,
    Calico,
}

/// Status of an AKSCluster
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AKSClusterStatus {
    #[serde(flatten)]
    pub resource_status: ResourceStatus,

    /// Current state of the cluster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// External ID identifying the cluster at the provider
    #[serde(default, rename = "providerID", skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,

    /// API server endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

managed_resource!(AKSCluster);

fn default_node_count() -> i32 {
    DEFAULT_NODE_COUNT
}
