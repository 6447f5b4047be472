/// Kubernetes cluster resources and claims

pub mod aks_cluster;
pub mod aks_cluster_class;
pub mod kubernetes_cluster;

pub use aks_cluster::{AKSCluster, AKSClusterSpec, AKSClusterStatus};
pub use aks_cluster_class::{AKSClusterClass, AKSClusterClassSpec, AKSClusterClassSpecTemplate};
pub use kubernetes_cluster::{KubernetesCluster, KubernetesClusterSpec};

/// API group for Azure compute resources
pub const API_GROUP: &str = "compute.azure.infra.datum.net";
/// API version for Azure compute resources
pub const API_VERSION: &str = "v1alpha3";

/// API group for portable compute claims
pub const CLAIM_API_GROUP: &str = "compute.infra.datum.net";
/// API version for portable compute claims
pub const CLAIM_API_VERSION: &str = "v1alpha1";
