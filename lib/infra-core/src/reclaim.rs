use infra_api::common::{BindingPhase, ReclaimPolicy};

/// Whether deleting a managed resource object also deletes the external resource
///
/// `Delete` always tears down. `Retain` only tears down a resource that was
/// never bound: a Bound or Released resource may still hold a claimant's
/// data, so it is left for an operator to clean up.
pub fn should_delete_external_resource(policy: ReclaimPolicy, phase: BindingPhase) -> bool {
    match policy {
        ReclaimPolicy::Delete => true,
        ReclaimPolicy::Retain => phase == BindingPhase::Unbound,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delete_policy_always_tears_down() {
        for phase in [BindingPhase::Unbound, BindingPhase::Bound, BindingPhase::Released] {
            assert!(should_delete_external_resource(ReclaimPolicy::Delete, phase));
        }
    }

    #[test]
    fn test_retain_policy_keeps_once_bound() {
        assert!(should_delete_external_resource(
            ReclaimPolicy::Retain,
            BindingPhase::Unbound
        ));
        assert!(!should_delete_external_resource(
            ReclaimPolicy::Retain,
            BindingPhase::Bound
        ));
        assert!(!should_delete_external_resource(
            ReclaimPolicy::Retain,
            BindingPhase::Released
        ));
    }
}
