//! Object repository abstraction
//!
//! The reconcilers read claims, resources and reference targets through
//! `ObjectStore`, keyed by namespace/name with list-by-label-selector. The
//! in-memory implementation lives in `registry`; the Kubernetes API one in
//! the controller binary.

use async_trait::async_trait;
use infra_api::common::Selector;
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

use crate::error::StoreError;

/// Bounds every object kind stored and looked up through an `ObjectStore`
pub trait Lookup:
    Resource<DynamicType = ()> + Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

impl<K> Lookup for K where
    K: Resource<DynamicType = ()>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch one object; `None` if it does not exist
    async fn get<K: Lookup>(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<K>, StoreError>;

    /// List objects whose labels match the selector
    async fn list<K: Lookup>(
        &self,
        namespace: Option<&str>,
        selector: &Selector,
    ) -> Result<Vec<K>, StoreError>;

    /// Write spec and status of an object, returning the stored version
    async fn apply<K: Lookup>(&self, object: &K) -> Result<K, StoreError>;

    /// Delete an object; deleting a missing object is not an error
    async fn delete<K: Lookup>(&self, namespace: Option<&str>, name: &str)
        -> Result<(), StoreError>;
}

/// `namespace/name` key of an object, `name` for cluster-scoped ones
pub fn object_key(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(ns) => format!("{}/{}", ns, name),
        None => name.to_string(),
    }
}
