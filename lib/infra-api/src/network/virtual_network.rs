use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::common::{Resolvable, ResourceSpec, ResourceStatus};
use crate::managed::managed_resource;

/// VirtualNetwork is a managed resource representing an Azure virtual network
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "network.azure.infra.datum.net",
    version = "v1alpha3",
    kind = "VirtualNetwork",
    plural = "virtualnetworks",
    derive = "Default",
    derive = "PartialEq",
    status = "VirtualNetworkStatus",
    printcolumn = r#"{"name":"READY","type":"string","jsonPath":".status.conditions[?(@.type=='Ready')].status"}"#,
    printcolumn = r#"{"name":"SYNCED","type":"string","jsonPath":".status.conditions[?(@.type=='Synced')].status"}"#,
    printcolumn = r#"{"name":"PHASE","type":"string","jsonPath":".status.bindingPhase"}"#,
    printcolumn = r#"{"name":"STATE","type":"string","jsonPath":".status.state"}"#,
    printcolumn = r#"{"name":"LOCATION","type":"string","jsonPath":".spec.location"}"#,
)]
#[serde(rename_all = "camelCase")]
pub struct VirtualNetworkSpec {
    #[serde(flatten)]
    pub resource_spec: ResourceSpec,

    /// Resource group the network is created in
    pub resource_group_name: Resolvable,

    /// Azure region of the network
    pub location: String,

    /// Network properties
    pub properties: VirtualNetworkProperties,

    /// Azure tags
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

/// Properties of a virtual network
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VirtualNetworkProperties {
    /// Address prefixes available to subnets
    pub address_space: AddressSpace,

    /// Enable DDoS protection for all protected resources in the network
    #[serde(default)]
    pub enable_ddos_protection: bool,

    /// Enable VM protection for all subnets in the network
    #[serde(default)]
    pub enable_vm_protection: bool,
}

/// CIDR blocks assigned to a virtual network
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddressSpace {
    pub address_prefixes: Vec<String>,
}

/// Status of a VirtualNetwork
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VirtualNetworkStatus {
    #[serde(flatten)]
    pub resource_status: ResourceStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// Azure resource ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_guid: Option<String>,
}

managed_resource!(VirtualNetwork);
