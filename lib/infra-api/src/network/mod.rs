/// Azure virtual networking resources (API group network.azure.infra.datum.net)

pub mod subnet;
pub mod virtual_network;

pub use subnet::{Subnet, SubnetSpec, SubnetStatus};
pub use virtual_network::{VirtualNetwork, VirtualNetworkSpec, VirtualNetworkStatus};

/// API group for Azure networking resources
pub const API_GROUP: &str = "network.azure.infra.datum.net";
/// API version for Azure networking resources
pub const API_VERSION: &str = "v1alpha3";
