use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Binding phase of a managed resource or claim
///
/// Unbound is the phase of a freshly created object. Bound means an active
/// claim references the resource. Released means the claim is gone but the
/// resource survived under a Retain reclaim policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum BindingPhase {
    /// Not bound to any claim
    #[default]
    Unbound,
    /// Bound to exactly one claim
    Bound,
    /// Formerly bound; the claim was removed and the resource retained
    Released,
}

impl fmt::Display for BindingPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unbound => write!(f, "Unbound"),
            Self::Bound => write!(f, "Bound"),
            Self::Released => write!(f, "Released"),
        }
    }
}
