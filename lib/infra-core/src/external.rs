//! Seams to the cloud provider and the connection secret sink

use async_trait::async_trait;
use infra_api::common::{Condition, SecretReference};
use infra_api::managed::ManagedResource;
use std::collections::BTreeMap;
use std::marker::PhantomData;

/// Credentials and endpoints needed to use an external resource
pub type ConnectionDetails = BTreeMap<String, Vec<u8>>;

/// Result of observing an external resource
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalObservation {
    pub resource_exists: bool,
    pub resource_up_to_date: bool,
    pub connection_details: ConnectionDetails,
}

/// Result of creating an external resource
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalCreation {
    pub connection_details: ConnectionDetails,
}

/// Result of updating an external resource
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalUpdate {
    pub connection_details: ConnectionDetails,
}

/// Provider driver for one managed resource kind
///
/// Drivers own the `Ready` condition: they set it from what they observe
/// at the provider. Any status fields they write (IDs, endpoints) are
/// persisted with the rest of the pass.
#[async_trait]
pub trait ExternalClient<R: ManagedResource>: Send + Sync {
    async fn observe(&self, resource: &mut R) -> anyhow::Result<ExternalObservation>;

    async fn create(&self, resource: &mut R) -> anyhow::Result<ExternalCreation>;

    async fn update(&self, resource: &mut R) -> anyhow::Result<ExternalUpdate>;

    async fn delete(&self, resource: &R) -> anyhow::Result<()>;
}

/// Driver that treats every resource as existing, current and available
///
/// Lets the binding and reference machinery run end to end without a cloud
/// provider linked in.
pub struct NopClient<R> {
    _kind: PhantomData<fn() -> R>,
}

impl<R> NopClient<R> {
    pub fn new() -> Self {
        Self { _kind: PhantomData }
    }
}

impl<R> Default for NopClient<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<R: ManagedResource> ExternalClient<R> for NopClient<R> {
    async fn observe(&self, resource: &mut R) -> anyhow::Result<ExternalObservation> {
        resource.set_conditions([Condition::available()]);
        Ok(ExternalObservation {
            resource_exists: true,
            resource_up_to_date: true,
            connection_details: ConnectionDetails::new(),
        })
    }

    async fn create(&self, _resource: &mut R) -> anyhow::Result<ExternalCreation> {
        Ok(ExternalCreation::default())
    }

    async fn update(&self, _resource: &mut R) -> anyhow::Result<ExternalUpdate> {
        Ok(ExternalUpdate::default())
    }

    async fn delete(&self, _resource: &R) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Destination for connection details
#[async_trait]
pub trait SecretPublisher: Send + Sync {
    async fn publish(
        &self,
        secret: &SecretReference,
        details: &ConnectionDetails,
    ) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use infra_api::common::condition::TYPE_READY;
    use infra_api::managed::Conditioned;
    use infra_api::network::VirtualNetworkSpec;
    use infra_api::VirtualNetwork;

    #[tokio::test]
    async fn test_nop_client_reports_available() {
        let client = NopClient::<VirtualNetwork>::new();
        let mut vnet = VirtualNetwork::new("vnet-a", VirtualNetworkSpec::default());

        let observation = client.observe(&mut vnet).await.unwrap();

        assert!(observation.resource_exists);
        assert!(observation.resource_up_to_date);
        assert!(vnet.condition(TYPE_READY).is_true());
    }
}
