//! Capability traits for managed resources and claims
//!
//! The reconcilers in `infra-core` are written against these traits only and
//! never branch on a concrete kind. Every kind implements them through the
//! `managed_resource!` / `resource_claim!` macros, which assume the standard
//! layout: `spec.resource_spec: ResourceSpec` and a status struct carrying
//! `resource_status: ResourceStatus` for managed resources, and
//! `spec.claim_spec: ResourceClaimSpec` with `ResourceClaimStatus` for claims.
//! Classes go through `resource_class!` and keep their defaults in
//! `spec.spec_template.class_spec_template: ClassSpecTemplate`.

use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

use crate::common::{
    BindingPhase, Condition, ObjectReference, ProviderReference, ReclaimPolicy, Resolvable,
    SecretReference,
};

/// Objects that carry a binding phase
pub trait Bindable {
    fn binding_phase(&self) -> BindingPhase;
    fn set_binding_phase(&mut self, phase: BindingPhase);
}

/// Objects that carry status conditions
pub trait Conditioned {
    /// Condition of the given type, Unknown if never set
    fn condition(&self, type_: &str) -> Condition;
    /// Upsert conditions by type, preserving the ones not mentioned
    fn set_conditions(&mut self, conditions: impl IntoIterator<Item = Condition>);
}

/// A concrete cloud resource managed by the controller
pub trait ManagedResource:
    Resource<DynamicType = ()>
    + Bindable
    + Conditioned
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    fn claim_reference(&self) -> Option<&ObjectReference>;
    fn set_claim_reference(&mut self, reference: Option<ObjectReference>);

    fn class_reference(&self) -> Option<&ObjectReference>;
    fn set_class_reference(&mut self, reference: Option<ObjectReference>);

    fn provider_reference(&self) -> &ProviderReference;
    fn set_provider_reference(&mut self, reference: ProviderReference);

    fn reclaim_policy(&self) -> ReclaimPolicy;
    fn set_reclaim_policy(&mut self, policy: ReclaimPolicy);

    fn write_connection_secret_to_reference(&self) -> Option<&SecretReference>;
    fn set_write_connection_secret_to_reference(&mut self, reference: Option<SecretReference>);
}

/// A user's request for a managed resource
pub trait ResourceClaim:
    Resource<DynamicType = ()>
    + Bindable
    + Conditioned
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    /// Which managed resource this claim wants
    fn resource_reference(&self) -> &Resolvable;
    fn set_resource_reference(&mut self, reference: Resolvable);

    fn class_reference(&self) -> Option<&ObjectReference>;

    fn write_connection_secret_to_reference(&self) -> Option<&SecretReference>;
}

/// Defaults shared by the managed resources provisioned from it
pub trait ResourceClass:
    Resource<DynamicType = ()> + Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    fn reclaim_policy(&self) -> ReclaimPolicy;
    fn set_reclaim_policy(&mut self, policy: ReclaimPolicy);
}

/// Managed resources that take their defaults from a class of kind `Class`
pub trait Classified: ManagedResource {
    type Class: ResourceClass;
}

macro_rules! managed_resource {
    ($($kind:ty),+ $(,)?) => {$(
        impl $crate::managed::Bindable for $kind {
            fn binding_phase(&self) -> $crate::common::BindingPhase {
                self.status
                    .as_ref()
                    .map(|s| s.resource_status.binding_phase)
                    .unwrap_or_default()
            }

            fn set_binding_phase(&mut self, phase: $crate::common::BindingPhase) {
                self.status
                    .get_or_insert_with(Default::default)
                    .resource_status
                    .binding_phase = phase;
            }
        }

        impl $crate::managed::Conditioned for $kind {
            fn condition(&self, type_: &str) -> $crate::common::Condition {
                match self.status.as_ref() {
                    Some(s) => s.resource_status.conditions.get(type_),
                    None => $crate::common::ConditionSet::new().get(type_),
                }
            }

            fn set_conditions(
                &mut self,
                conditions: impl IntoIterator<Item = $crate::common::Condition>,
            ) {
                self.status
                    .get_or_insert_with(Default::default)
                    .resource_status
                    .conditions
                    .set(conditions);
            }
        }

        impl $crate::managed::ManagedResource for $kind {
            fn claim_reference(&self) -> Option<&$crate::common::ObjectReference> {
                self.spec.resource_spec.claim_ref.as_ref()
            }

            fn set_claim_reference(&mut self, reference: Option<$crate::common::ObjectReference>) {
                self.spec.resource_spec.claim_ref = reference;
            }

            fn class_reference(&self) -> Option<&$crate::common::ObjectReference> {
                self.spec.resource_spec.class_ref.as_ref()
            }

            fn set_class_reference(&mut self, reference: Option<$crate::common::ObjectReference>) {
                self.spec.resource_spec.class_ref = reference;
            }

            fn provider_reference(&self) -> &$crate::common::ProviderReference {
                &self.spec.resource_spec.provider_ref
            }

            fn set_provider_reference(&mut self, reference: $crate::common::ProviderReference) {
                self.spec.resource_spec.provider_ref = reference;
            }

            fn reclaim_policy(&self) -> $crate::common::ReclaimPolicy {
                self.spec.resource_spec.reclaim_policy
            }

            fn set_reclaim_policy(&mut self, policy: $crate::common::ReclaimPolicy) {
                self.spec.resource_spec.reclaim_policy = policy;
            }

            fn write_connection_secret_to_reference(
                &self,
            ) -> Option<&$crate::common::SecretReference> {
                self.spec.resource_spec.write_connection_secret_to_ref.as_ref()
            }

            fn set_write_connection_secret_to_reference(
                &mut self,
                reference: Option<$crate::common::SecretReference>,
            ) {
                self.spec.resource_spec.write_connection_secret_to_ref = reference;
            }
        }
    )+};
}

macro_rules! resource_claim {
    ($($kind:ty),+ $(,)?) => {$(
        impl $crate::managed::Bindable for $kind {
            fn binding_phase(&self) -> $crate::common::BindingPhase {
                self.status
                    .as_ref()
                    .map(|s| s.binding_phase)
                    .unwrap_or_default()
            }

            fn set_binding_phase(&mut self, phase: $crate::common::BindingPhase) {
                self.status.get_or_insert_with(Default::default).binding_phase = phase;
            }
        }

        impl $crate::managed::Conditioned for $kind {
            fn condition(&self, type_: &str) -> $crate::common::Condition {
                match self.status.as_ref() {
                    Some(s) => s.conditions.get(type_),
                    None => $crate::common::ConditionSet::new().get(type_),
                }
            }

            fn set_conditions(
                &mut self,
                conditions: impl IntoIterator<Item = $crate::common::Condition>,
            ) {
                self.status
                    .get_or_insert_with(Default::default)
                    .conditions
                    .set(conditions);
            }
        }

        impl $crate::managed::ResourceClaim for $kind {
            fn resource_reference(&self) -> &$crate::common::Resolvable {
                &self.spec.claim_spec.resource
            }

            fn set_resource_reference(&mut self, reference: $crate::common::Resolvable) {
                self.spec.claim_spec.resource = reference;
            }

            fn class_reference(&self) -> Option<&$crate::common::ObjectReference> {
                self.spec.claim_spec.class_ref.as_ref()
            }

            fn write_connection_secret_to_reference(
                &self,
            ) -> Option<&$crate::common::SecretReference> {
                self.spec.claim_spec.write_connection_secret_to_ref.as_ref()
            }
        }
    )+};
}

macro_rules! resource_class {
    ($($class:ty => $kind:ty),+ $(,)?) => {$(
        impl $crate::managed::ResourceClass for $class {
            fn reclaim_policy(&self) -> $crate::common::ReclaimPolicy {
                self.spec.spec_template.class_spec_template.reclaim_policy
            }

            fn set_reclaim_policy(&mut self, policy: $crate::common::ReclaimPolicy) {
                self.spec.spec_template.class_spec_template.reclaim_policy = policy;
            }
        }

        impl $crate::managed::Classified for $kind {
            type Class = $class;
        }
    )+};
}

pub(crate) use managed_resource;
pub(crate) use resource_claim;
pub(crate) use resource_class;
