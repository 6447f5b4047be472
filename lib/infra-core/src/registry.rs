//! In-memory object store
//!
//! Holds objects of any kind keyed by kind and namespace/name. Used as the
//! object repository in tests and dry runs.

use async_trait::async_trait;
use infra_api::common::Selector;
use kube::ResourceExt;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::StoreError;
use crate::store::{object_key, Lookup, ObjectStore};

/// InMemoryStore keeps serialized objects per kind
#[derive(Clone, Default)]
pub struct InMemoryStore {
    // kind -> (namespace/name -> object)
    objects: Arc<RwLock<HashMap<String, HashMap<String, serde_json::Value>>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite an object
    pub async fn insert<K: Lookup>(&self, object: &K) -> Result<(), StoreError> {
        let key = object_key(object.namespace().as_deref(), &object.name_any());
        let value = serde_json::to_value(object)?;

        let mut objects = self.objects.write().await;
        objects
            .entry(K::kind(&()).into_owned())
            .or_default()
            .insert(key.clone(), value);

        debug!("Stored {} {}", K::kind(&()), key);
        Ok(())
    }

    /// Count objects of one kind
    pub async fn count<K: Lookup>(&self) -> usize {
        let objects = self.objects.read().await;
        objects.get(K::kind(&()).as_ref()).map_or(0, HashMap::len)
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn get<K: Lookup>(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<K>, StoreError> {
        let objects = self.objects.read().await;
        objects
            .get(K::kind(&()).as_ref())
            .and_then(|by_key| by_key.get(&object_key(namespace, name)))
            .map(|value| serde_json::from_value(value.clone()).map_err(StoreError::from))
            .transpose()
    }

    async fn list<K: Lookup>(
        &self,
        namespace: Option<&str>,
        selector: &Selector,
    ) -> Result<Vec<K>, StoreError> {
        let objects = self.objects.read().await;
        let Some(by_key) = objects.get(K::kind(&()).as_ref()) else {
            return Ok(Vec::new());
        };

        let mut matched = Vec::new();
        for value in by_key.values() {
            let object: K = serde_json::from_value(value.clone())?;
            if namespace.is_some() && object.namespace().as_deref() != namespace {
                continue;
            }
            if selector.matches(object.labels()) {
                matched.push(object);
            }
        }
        // HashMap iteration order is arbitrary; keep listings stable.
        matched.sort_by_key(|o| object_key(o.namespace().as_deref(), &o.name_any()));
        Ok(matched)
    }

    async fn apply<K: Lookup>(&self, object: &K) -> Result<K, StoreError> {
        self.insert(object).await?;
        Ok(object.clone())
    }

    async fn delete<K: Lookup>(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<(), StoreError> {
        let mut objects = self.objects.write().await;
        if let Some(by_key) = objects.get_mut(K::kind(&()).as_ref()) {
            by_key.remove(&object_key(namespace, name));
        }
        debug!("Deleted {} {}", K::kind(&()), object_key(namespace, name));
        Ok(())
    }
}
