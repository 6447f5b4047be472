use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::common::{ResourceSpec, ResourceStatus};
use crate::managed::managed_resource;

/// ResourceGroup is a managed resource representing an Azure resource group.
/// Other resources reference it by name once it is ready.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "azure.infra.datum.net",
    version = "v1alpha3",
    kind = "ResourceGroup",
    plural = "resourcegroups",
    derive = "Default",
    derive = "PartialEq",
    status = "ResourceGroupStatus",
    printcolumn = r#"{"name":"READY","type":"string","jsonPath":".status.conditions[?(@.type=='Ready')].status"}"#,
    printcolumn = r#"{"name":"SYNCED","type":"string","jsonPath":".status.conditions[?(@.type=='Synced')].status"}"#,
    printcolumn = r#"{"name":"PHASE","type":"string","jsonPath":".status.bindingPhase"}"#,
)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGroupSpec {
    #[serde(flatten)]
    pub resource_spec: ResourceSpec,

    /// Azure region the group lives in
    pub location: String,
}

/// Status of a ResourceGroup
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGroupStatus {
    #[serde(flatten)]
    pub resource_status: ResourceStatus,

    /// Provisioning state reported by Azure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
}

managed_resource!(ResourceGroup);
