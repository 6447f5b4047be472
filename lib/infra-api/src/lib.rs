//! Datum infrastructure API types and CRDs for Kubernetes integration
//!
//! This library defines the managed resources and claims reconciled by the
//! infra-controller:
//! - ResourceGroup: Azure resource group
//! - VirtualNetwork / Subnet: Azure virtual networking
//! - AKSCluster: Azure Kubernetes Service cluster
//! - AKSClusterClass: defaults applied to AKSClusters bound through a claim
//! - KubernetesCluster: namespaced claim bound to an AKSCluster
//!
//! The `common` module carries the status contract shared by every kind and
//! `managed` the capability traits the generic reconcilers operate on.

pub mod common;
pub mod managed;

pub mod azure;
pub mod compute;
pub mod network;

pub use azure::ResourceGroup;
pub use compute::{AKSCluster, AKSClusterClass, KubernetesCluster};
pub use managed::{
    Bindable, Classified, Conditioned, ManagedResource, ResourceClaim, ResourceClass,
};
pub use network::{Subnet, VirtualNetwork};

#[cfg(test)]
mod tests {
    use super::*;
    use kube::CustomResourceExt;

    fn printer_columns<K: CustomResourceExt>() -> Vec<String> {
        K::crd().spec.versions[0]
            .additional_printer_columns
            .iter()
            .flatten()
            .map(|c| c.name.clone())
            .collect()
    }

    #[test]
    fn test_managed_kinds_print_status_columns() {
        for columns in [
            printer_columns::<ResourceGroup>(),
            printer_columns::<VirtualNetwork>(),
            printer_columns::<Subnet>(),
            printer_columns::<AKSCluster>(),
        ] {
            for expected in ["READY", "SYNCED", "PHASE"] {
                assert!(columns.iter().any(|c| c == expected), "missing {} in {:?}", expected, columns);
            }
        }
    }
}
