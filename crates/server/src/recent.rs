//! Most-recently-used tracking of accessed object names, per scope key
//! `endpoint/namespace/resource-type`, with a global LRU cap on the
//! number of scope keys.

use std::collections::HashMap;
use std::sync::RwLock;

const MAX_RECENT_KEYS: usize = 100;

struct Inner {
    max_items: usize,
    max_keys: usize,
    items: HashMap<String, Vec<String>>,
    /// Scope keys, least-recently-used first.
    key_order: Vec<String>,
}

/// Thread-safe recency tracker; readers get copies.
pub struct RecencyTracker {
    inner: RwLock<Inner>,
}

impl RecencyTracker {
    pub fn new(max_items: usize) -> Self {
        Self::with_max_keys(max_items, MAX_RECENT_KEYS)
    }

    pub fn with_max_keys(max_items: usize, max_keys: usize) -> Self {
        Self {
            inner: RwLock::new(Inner {
                max_items,
                max_keys,
                items: HashMap::new(),
                key_order: Vec::with_capacity(max_keys),
            }),
        }
    }

    /// Records a name as most recently used under the scope key. A name
    /// already present moves to the front; the list is truncated to
    /// `max_items`. A new scope key beyond `max_keys` evicts the oldest
    /// scope key wholesale.
    pub fn add(&self, endpoint: &str, namespace: &str, resource_type: &str, name: &str) {
        let key = scope_key(endpoint, namespace, resource_type);
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let max_items = inner.max_items;

        let existed = inner.items.contains_key(&key);
        let list = inner.items.entry(key.clone()).or_default();
        if let Some(pos) = list.iter().position(|n| n == name) {
            list.remove(pos);
        }
        list.insert(0, name.to_string());
        list.truncate(max_items);

        if existed {
            if let Some(pos) = inner.key_order.iter().position(|k| *k == key) {
                inner.key_order.remove(pos);
            }
            inner.key_order.push(key);
        } else {
            if inner.key_order.len() >= inner.max_keys {
                let oldest = inner.key_order.remove(0);
                inner.items.remove(&oldest);
            }
            inner.key_order.push(key);
        }
    }

    /// Returns a copy of the scope key's list, most recent first.
    pub fn get(&self, endpoint: &str, namespace: &str, resource_type: &str) -> Vec<String> {
        let key = scope_key(endpoint, namespace, resource_type);
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.items.get(&key).cloned().unwrap_or_default()
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.items.clear();
        inner.key_order.clear();
    }
}

fn scope_key(endpoint: &str, namespace: &str, resource_type: &str) -> String {
    format!("{}/{}/{}", endpoint, namespace, resource_type)
}
