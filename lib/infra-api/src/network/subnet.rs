use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::common::{Resolvable, ResourceSpec, ResourceStatus};
use crate::managed::managed_resource;

/// Subnet is a managed resource representing a subnet of an Azure virtual network
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "network.azure.infra.datum.net",
    version = "v1alpha3",
    kind = "Subnet",
    plural = "subnets",
    derive = "Default",
    derive = "PartialEq",
    status = "SubnetStatus",
    printcolumn = r#"{"name":"READY","type":"string","jsonPath":".status.conditions[?(@.type=='Ready')].status"}"#,
    printcolumn = r#"{"name":"SYNCED","type":"string","jsonPath":".status.conditions[?(@.type=='Synced')].status"}"#,
    printcolumn = r#"{"name":"PHASE","type":"string","jsonPath":".status.bindingPhase"}"#,
    printcolumn = r#"{"name":"STATE","type":"string","jsonPath":".status.state"}"#,
)]
#[serde(rename_all = "camelCase")]
pub struct SubnetSpec {
    #[serde(flatten)]
    pub resource_spec: ResourceSpec,

    /// Resource group of the parent virtual network
    pub resource_group_name: Resolvable,

    /// Parent virtual network
    pub virtual_network_name: Resolvable,

    /// Subnet properties
    pub properties: SubnetProperties,
}

/// Properties of a subnet
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubnetProperties {
    /// CIDR of the subnet
    pub address_prefix: String,

    /// Service endpoints enabled on the subnet
    #[serde(default)]
    pub service_endpoints: Vec<ServiceEndpoint>,
}

/// Azure service endpoint enabled on a subnet
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ServiceEndpoint {
    /// Service type, e.g. "Microsoft.Sql"
    pub service: String,
}

/// Status of a Subnet
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubnetStatus {
    #[serde(flatten)]
    pub resource_status: ResourceStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// Azure resource ID, read by resources deployed into the subnet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
}

managed_resource!(Subnet);
