//! Lifecycle core for managed infrastructure resources
//!
//! This library provides:
//! - Reference resolution for spec fields computed from other resources
//! - The claim/resource binding state machine and reclaim policy
//! - A generic reconcile pass driving external resources through a provider driver
//! - Claim binding
//! - Object store abstraction with an in-memory implementation

pub mod backoff;
pub mod binding;
pub mod claim;
pub mod error;
pub mod external;
pub mod reclaim;
pub mod reconciler;
pub mod registry;
pub mod resolver;
pub mod store;

pub use backoff::RequeuePolicy;
pub use binding::{on_claim_removed, transition, validate_transition, ClaimRemoval};
pub use claim::ClaimBinder;
pub use error::{CoreError, FieldError, ResolveError, Result, StoreError};
pub use external::{
    ConnectionDetails, ExternalClient, ExternalCreation, ExternalObservation, ExternalUpdate,
    NopClient, SecretPublisher,
};
pub use reclaim::should_delete_external_resource;
pub use reconciler::{Disposition, ManagedReconciler, ReconcileOutcome};
pub use registry::InMemoryStore;
pub use resolver::{name_when_ready, ReferenceResolver, ResolveReferences};
pub use store::{object_key, Lookup, ObjectStore};
