use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What happens to the external resource when its managing object goes away
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ReclaimPolicy {
    /// Tear down the external resource together with the object
    Delete,
    /// Leave the external resource running
    #[default]
    Retain,
}

impl fmt::Display for ReclaimPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delete => write!(f, "Delete"),
            Self::Retain => write!(f, "Retain"),
        }
    }
}
