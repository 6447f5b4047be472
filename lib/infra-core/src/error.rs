use infra_api::common::BindingPhase;
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

/// Why a deferred field could not be resolved
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Referenced {kind} {name} not found")]
    ReferenceNotFound { kind: String, name: String },

    #[error("Referenced {kind} {name} is not ready")]
    ReferenceNotReady { kind: String, name: String },

    #[error("No {kind} matches selector {selector}")]
    NoMatchingReference { kind: String, selector: String },

    #[error("{count} {kind} objects match selector {selector}; expected exactly one")]
    AmbiguousReference {
        kind: String,
        selector: String,
        count: usize,
    },

    #[error("Lookup of {kind} failed: {message}")]
    Store { kind: String, message: String },

    #[error("Resolution cancelled")]
    Cancelled,
}

impl ResolveError {
    /// Machine-readable kind, used as a condition reason
    pub fn reason(&self) -> &'static str {
        match self {
            Self::ReferenceNotFound { .. } => "ReferenceNotFound",
            Self::ReferenceNotReady { .. } => "ReferenceNotReady",
            Self::NoMatchingReference { .. } => "NoMatchingReference",
            Self::AmbiguousReference { .. } => "AmbiguousReference",
            Self::Store { .. } => "StoreError",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Fatal errors need a spec change; retrying on a short backoff is pointless
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::AmbiguousReference { .. })
    }
}

/// A resolution failure for one field of a spec
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{field}: {source}")]
pub struct FieldError {
    pub field: String,
    #[source]
    pub source: ResolveError,
}

impl FieldError {
    pub fn new(field: impl Into<String>, source: ResolveError) -> Self {
        Self {
            field: field.into(),
            source,
        }
    }
}

/// Object store failures
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Conflicting write to {0}")]
    Conflict(String),

    #[error("Kubernetes error: {0}")]
    KubernetesError(#[from] kube::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Provider driver operation that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalOperation {
    Observe,
    Create,
    Update,
    Delete,
}

impl fmt::Display for ExternalOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Observe => write!(f, "observe"),
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Cannot resolve {field}: {source}")]
    Resolve {
        field: String,
        #[source]
        source: ResolveError,
    },

    #[error("Invalid binding transition from {from} to {to}")]
    InvalidTransition { from: BindingPhase, to: BindingPhase },

    #[error("External {operation} failed: {message}")]
    External {
        operation: ExternalOperation,
        message: String,
    },

    #[error("Failed to publish connection details: {0}")]
    Publish(String),

    #[error("Object store error: {0}")]
    Store(#[from] StoreError),

    #[error("Reconciliation cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn external(operation: ExternalOperation, err: anyhow::Error) -> Self {
        Self::External {
            operation,
            message: format!("{:#}", err),
        }
    }

    /// Machine-readable kind, used as the reason of a `Synced=False` condition
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Resolve { source, .. } => source.reason(),
            Self::InvalidTransition { .. } => "InvalidTransition",
            Self::External { .. } => "ExternalError",
            Self::Publish(_) => "PublishError",
            Self::Store(_) => "StoreError",
            Self::Cancelled => "Cancelled",
            Self::Internal(_) => "InternalError",
        }
    }

    /// Fatal errors persist until the spec is corrected
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Resolve { source, .. } => source.is_fatal(),
            Self::InvalidTransition { .. } => true,
            _ => false,
        }
    }
}

impl From<FieldError> for CoreError {
    fn from(err: FieldError) -> Self {
        Self::Resolve {
            field: err.field,
            source: err.source,
        }
    }
}
