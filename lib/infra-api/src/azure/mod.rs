/// Core Azure resources (API group azure.infra.datum.net)

pub mod resource_group;

pub use resource_group::{ResourceGroup, ResourceGroupSpec, ResourceGroupStatus};

/// API group for core Azure resources
pub const API_GROUP: &str = "azure.infra.datum.net";
/// API version for core Azure resources
pub const API_VERSION: &str = "v1alpha3";
