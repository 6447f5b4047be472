//! Status contract and reference types shared by every managed resource and claim

pub mod binding;
pub mod condition;
pub mod reclaim;
pub mod reference;
pub mod resource;

pub use binding::BindingPhase;
pub use condition::{Condition, ConditionSet, ConditionStatus};
pub use reclaim::ReclaimPolicy;
pub use reference::{
    ObjectReference, ProviderReference, Reference, Resolvable, SecretReference, Selector,
};
pub use resource::{
    ClassSpecTemplate, ResourceClaimSpec, ResourceClaimStatus, ResourceSpec, ResourceStatus,
};
