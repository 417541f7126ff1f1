//! Tracked state: what the runtime is currently running.

use std::collections::BTreeMap;

use tokio::sync::RwLock;

use crate::model::{Component, Subscription};
use crate::resource::Resource;

/// Name-keyed store for one resource kind.
#[derive(Debug)]
pub struct ResourceStore<T> {
    items: RwLock<BTreeMap<String, T>>,
}

impl<T> Default for ResourceStore<T> {
    fn default() -> Self {
        Self {
            items: RwLock::new(BTreeMap::new()),
        }
    }
}

impl<T: Resource> ResourceStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, name: &str) -> Option<T> {
        self.items.read().await.get(name).cloned()
    }

    /// Insert or replace the entry named after `item`.
    pub async fn set(&self, item: T) {
        self.items
            .write()
            .await
            .insert(item.name().to_string(), item);
    }

    /// Remove and return the entry, if any.
    pub async fn delete(&self, name: &str) -> Option<T> {
        self.items.write().await.remove(name)
    }

    /// All entries, ordered by name.
    pub async fn list(&self) -> Vec<T> {
        self.items.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }
}

/// Tracked state for every resource kind.
#[derive(Debug, Default)]
pub struct CompStore {
    components: ResourceStore<Component>,
    subscriptions: ResourceStore<Subscription>,
}

impl CompStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn components(&self) -> &ResourceStore<Component> {
        &self.components
    }

    pub fn subscriptions(&self) -> &ResourceStore<Subscription> {
        &self.subscriptions
    }
}
