use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::AKSCluster;
use crate::common::ClassSpecTemplate;
use crate::managed::resource_class;

/// AKSClusterClass holds the defaults applied to an AKSCluster when a claim
/// naming this class binds to it
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "compute.azure.infra.datum.net",
    version = "v1alpha3",
    kind = "AKSClusterClass",
    plural = "aksclusterclasses",
    derive = "Default",
    derive = "PartialEq",
    printcolumn = r#"{"name":"RECLAIM-POLICY","type":"string","jsonPath":".spec.specTemplate.reclaimPolicy"}"#,
    printcolumn = r#"{"name":"PROVIDER-REF","type":"string","jsonPath":".spec.specTemplate.providerRef.name"}"#,
)]
#[serde(rename_all = "camelCase")]
pub struct AKSClusterClassSpec {
    #[serde(default)]
    pub spec_template: AKSClusterClassSpecTemplate,
}

/// Template for AKSClusters of this class
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AKSClusterClassSpecTemplate {
    #[serde(flatten)]
    pub class_spec_template: ClassSpecTemplate,

    /// Azure region for clusters of this class
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// Kubernetes version for clusters of this class
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

resource_class!(AKSClusterClass => AKSCluster);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ReclaimPolicy;
    use crate::managed::ResourceClass;

    #[test]
    fn test_template_carries_reclaim_policy() {
        let class: AKSClusterClass = serde_json::from_value(serde_json::json!({
            "apiVersion": "compute.azure.infra.datum.net/v1alpha3",
            "kind": "AKSClusterClass",
            "metadata": { "name": "standard" },
            "spec": {
                "specTemplate": {
                    "reclaimPolicy": "Delete",
                    "providerRef": { "name": "azure" },
                    "location": "westeurope"
                }
            }
        }))
        .unwrap();

        assert_eq!(class.reclaim_policy(), ReclaimPolicy::Delete);
        assert_eq!(
            class.spec.spec_template.class_spec_template.provider_ref.name,
            "azure"
        );
        assert_eq!(class.spec.spec_template.location.as_deref(), Some("westeurope"));
    }

    #[test]
    fn test_omitted_template_defaults_to_retain() {
        let mut class = AKSClusterClass::new("standard", AKSClusterClassSpec::default());
        assert_eq!(class.reclaim_policy(), ReclaimPolicy::Retain);

        class.set_reclaim_policy(ReclaimPolicy::Delete);
        assert_eq!(
            class.spec.spec_template.class_spec_template.reclaim_policy,
            ReclaimPolicy::Delete
        );
    }
}
