use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{
    BindingPhase, ConditionSet, ObjectReference, ProviderReference, ReclaimPolicy, Resolvable,
    SecretReference,
};

/// Spec fields common to every managed resource, flattened into each kind's spec
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSpec {
    /// Secret to publish connection details to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_connection_secret_to_ref: Option<SecretReference>,

    /// Claim this resource is bound to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_ref: Option<ObjectReference>,

    /// Class this resource was provisioned from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_ref: Option<ObjectReference>,

    /// Provider configuration used to reach the external API
    #[serde(default)]
    pub provider_ref: ProviderReference,

    /// What happens to the external resource on deletion
    #[serde(default)]
    pub reclaim_policy: ReclaimPolicy,
}

/// Status fields common to every managed resource
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceStatus {
    #[serde(default)]
    pub conditions: ConditionSet,

    #[serde(default)]
    pub binding_phase: BindingPhase,
}

/// Spec fields common to every claim
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceClaimSpec {
    /// Managed resource to bind: literal name, reference or selector
    pub resource: Resolvable,

    /// Class providing defaults for the bound resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_ref: Option<ObjectReference>,

    /// Secret in the claim's namespace to receive connection details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_connection_secret_to_ref: Option<SecretReference>,
}

/// Status fields common to every claim
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceClaimStatus {
    #[serde(default)]
    pub conditions: ConditionSet,

    #[serde(default)]
    pub binding_phase: BindingPhase,
}

/// Defaults a class hands to the managed resources provisioned from it
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClassSpecTemplate {
    /// Provider configuration for resources of this class
    #[serde(default)]
    pub provider_ref: ProviderReference,

    /// Reclaim policy given to resources bound through this class
    #[serde(default)]
    pub reclaim_policy: ReclaimPolicy,
}
