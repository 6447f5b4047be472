//! Cross-resource references
//!
//! Ownership-by-name pointers (claim, class, provider, connection secret) and
//! the `Resolvable` field type used for values that may be computed from
//! another resource's observed output.

use kube::{Resource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reference to another Kubernetes object by name
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Name of the referenced object
    pub name: String,

    /// Namespace of the referenced object (absent for cluster-scoped objects)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

impl ObjectReference {
    /// Build a full reference to an existing object
    pub fn for_object<K: Resource<DynamicType = ()>>(obj: &K) -> Self {
        Self {
            api_version: Some(K::api_version(&()).into_owned()),
            kind: Some(K::kind(&()).into_owned()),
            name: obj.name_any(),
            namespace: obj.namespace(),
            uid: obj.uid(),
        }
    }

    /// Whether this reference points at the same object as `other`
    ///
    /// Names and namespaces must match; uids are compared only when both
    /// sides carry one.
    pub fn refers_to(&self, other: &ObjectReference) -> bool {
        if self.name != other.name || self.namespace != other.namespace {
            return false;
        }
        match (&self.uid, &other.uid) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }
}

/// Reference to the provider configuration a resource is managed with
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ProviderReference {
    pub name: String,
}

/// Destination secret for connection details
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SecretReference {
    pub name: String,
    /// Ignored on claims, whose secrets always land in the claim's namespace
    #[serde(default)]
    pub namespace: String,
}

/// Direct reference to another resource by name
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Reference {
    pub name: String,
}

/// Label selector picking exactly one resource
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Selector {
    /// Labels the selected resource must carry; empty matches everything
    #[serde(default)]
    pub match_labels: BTreeMap<String, String>,
}

impl Selector {
    pub fn new(match_labels: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            match_labels: match_labels.into_iter().collect(),
        }
    }

    /// Check a label set against this selector
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.match_labels
            .iter()
            .all(|(k, v)| labels.get(k) == Some(v))
    }

    /// Render as a Kubernetes label selector query (`k1=v1,k2=v2`)
    pub fn to_query(&self) -> String {
        self.match_labels
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// A spec field given literally, by reference, or by selector
///
/// Resolution replaces `Ref` and `Selector` with `Value` once the referenced
/// output is known, so later passes skip the lookup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum Resolvable {
    /// Literal value
    Value(String),
    /// Read the value from the named resource
    Ref(Reference),
    /// Read the value from the single resource matching the selector
    Selector(Selector),
}

impl Resolvable {
    pub fn value(v: impl Into<String>) -> Self {
        Self::Value(v.into())
    }

    pub fn reference(name: impl Into<String>) -> Self {
        Self::Ref(Reference { name: name.into() })
    }

    pub fn selector(match_labels: impl IntoIterator<Item = (String, String)>) -> Self {
        Self::Selector(Selector::new(match_labels))
    }

    /// The literal value, if already resolved
    pub fn as_value(&self) -> Option<&str> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Value(_))
    }
}

impl Default for Resolvable {
    fn default() -> Self {
        Self::Value(String::new())
    }
}
