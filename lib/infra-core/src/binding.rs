//! Binding lifecycle between claims and managed resources
//!
//! ```text
//! Unbound --claim binds--> Bound --claim removed, Retain--> Released
//!                            ^                                 |
//!                            +--------- admin re-binds --------+
//! ```
//!
//! Deletion of the object itself is allowed from any phase and is not a
//! phase transition.

use infra_api::common::{BindingPhase, ReclaimPolicy};
use infra_api::managed::{Bindable, ManagedResource};
use tracing::debug;

use crate::error::{CoreError, Result};

/// Check a binding phase change against the lifecycle
///
/// Staying in the current phase is always allowed.
pub fn validate_transition(from: BindingPhase, to: BindingPhase) -> Result<()> {
    use BindingPhase::*;

    match (from, to) {
        (a, b) if a == b => Ok(()),
        (Unbound, Bound) | (Bound, Released) | (Released, Bound) => Ok(()),
        (from, to) => Err(CoreError::InvalidTransition { from, to }),
    }
}

/// Move an object to a new binding phase
///
/// Returns whether the phase actually changed.
pub fn transition<T: Bindable + ?Sized>(object: &mut T, to: BindingPhase) -> Result<bool> {
    let from = object.binding_phase();
    validate_transition(from, to)?;
    if from == to {
        return Ok(false);
    }
    debug!("Binding phase {} -> {}", from, to);
    object.set_binding_phase(to);
    Ok(true)
}

/// What happens to a managed resource whose claim went away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimRemoval {
    /// The resource was kept and is now Released (or stays Unbound)
    Released,
    /// The reclaim policy asks for the resource object to be deleted
    DeleteObject,
}

/// Apply the reclaim policy to a resource whose claim was deleted
pub fn on_claim_removed<R: ManagedResource>(resource: &mut R) -> Result<ClaimRemoval> {
    match resource.reclaim_policy() {
        ReclaimPolicy::Delete => Ok(ClaimRemoval::DeleteObject),
        ReclaimPolicy::Retain => {
            resource.set_claim_reference(None);
            if resource.binding_phase() == BindingPhase::Bound {
                transition(resource, BindingPhase::Released)?;
            }
            Ok(ClaimRemoval::Released)
        }
    }
}
