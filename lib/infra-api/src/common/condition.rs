use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Condition type reporting whether the external resource is usable
pub const TYPE_READY: &str = "Ready";
/// Condition type reporting whether the last reconciliation pass succeeded
pub const TYPE_SYNCED: &str = "Synced";

pub const REASON_AVAILABLE: &str = "Available";
pub const REASON_UNAVAILABLE: &str = "Unavailable";
pub const REASON_CREATING: &str = "Creating";
pub const REASON_DELETING: &str = "Deleting";
pub const REASON_BINDING: &str = "Binding";
pub const REASON_RECONCILE_SUCCESS: &str = "ReconcileSuccess";

/// Condition status following Kubernetes conventions
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    #[default]
    Unknown,
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::True => write!(f, "True"),
            Self::False => write!(f, "False"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Kubernetes-style condition for status reporting
///
/// The zero value (`Condition::default()`) has status Unknown and is what
/// lookups of an unrecorded type return.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition (e.g. Ready, Synced)
    #[serde(rename = "type")]
    pub type_: String,

    /// Status of the condition (True, False, Unknown)
    pub status: ConditionStatus,

    /// Machine-readable reason for the condition
    #[serde(default)]
    pub reason: String,

    /// Human-readable message
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,

    /// Last time the status changed
    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    /// Create a new condition stamped with the current time
    pub fn new(
        type_: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            type_: type_.into(),
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: Utc::now(),
        }
    }

    /// The external resource exists and is usable.
    pub fn available() -> Self {
        Self::new(TYPE_READY, ConditionStatus::True, REASON_AVAILABLE, "")
    }

    /// The external resource exists but is not usable.
    pub fn unavailable() -> Self {
        Self::new(TYPE_READY, ConditionStatus::False, REASON_UNAVAILABLE, "")
    }

    /// The external resource is being created.
    pub fn creating() -> Self {
        Self::new(TYPE_READY, ConditionStatus::False, REASON_CREATING, "")
    }

    /// The external resource is being deleted.
    pub fn deleting() -> Self {
        Self::new(TYPE_READY, ConditionStatus::False, REASON_DELETING, "")
    }

    /// A claim is waiting for its resource to become bindable.
    pub fn binding() -> Self {
        Self::new(TYPE_READY, ConditionStatus::False, REASON_BINDING, "")
    }

    pub fn reconcile_success() -> Self {
        Self::new(TYPE_SYNCED, ConditionStatus::True, REASON_RECONCILE_SUCCESS, "")
    }

    /// The last pass failed; `reason` is the error kind.
    pub fn reconcile_error(reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(TYPE_SYNCED, ConditionStatus::False, reason, message)
    }

    pub fn is_true(&self) -> bool {
        self.status == ConditionStatus::True
    }
}

/// Ordered set of conditions, unique by type
///
/// Insertion order is kept so serialization is deterministic; lookups go by
/// type.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ConditionSet(Vec<Condition>);

impl ConditionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a condition by type, returning an Unknown condition if absent
    pub fn get(&self, type_: &str) -> Condition {
        self.0
            .iter()
            .find(|c| c.type_ == type_)
            .cloned()
            .unwrap_or_else(|| Condition {
                type_: type_.to_string(),
                ..Condition::default()
            })
    }

    /// Upsert conditions by type
    ///
    /// Conditions not mentioned are left alone. A condition whose status is
    /// unchanged keeps its original transition time.
    pub fn set(&mut self, conditions: impl IntoIterator<Item = Condition>) {
        for condition in conditions {
            match self.0.iter_mut().find(|c| c.type_ == condition.type_) {
                Some(existing) if existing.status == condition.status => {
                    existing.reason = condition.reason;
                    existing.message = condition.message;
                }
                Some(existing) => *existing = condition,
                None => self.0.push(condition),
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Condition> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
