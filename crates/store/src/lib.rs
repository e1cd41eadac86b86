//! In-memory mirror of watched upstream collections.
//!
//! Objects are indexed endpoint -> resource id -> namespace bucket ->
//! name; cluster-scoped objects live in the reserved `_cluster` bucket.
//! A single reader-writer lock guards the maps; every read copies the
//! `Arc` handles it returns, so later mutations never surprise a caller.

#![forbid(unsafe_code)]

use kompl_core::{CachedObject, ResourceId, CLUSTER_BUCKET};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

type Bucket = HashMap<String, Arc<CachedObject>>;
type ResourceMap = HashMap<ResourceId, HashMap<String, Bucket>>;

#[derive(Default)]
struct Inner {
    resources: HashMap<String, ResourceMap>,
    watching: HashMap<String, HashMap<ResourceId, bool>>,
}

/// Thread-safe resource store shared by the watch tasks (writers) and
/// the request handlers (readers).
#[derive(Default)]
pub struct ResourceStore {
    inner: RwLock<Inner>,
}

impl ResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upserts an object under its extracted name. The object is stored
    /// as-is; callers promise not to mutate it after insertion.
    pub fn insert(&self, endpoint: &str, obj: CachedObject) {
        let bucket = obj.bucket().to_string();
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner
            .resources
            .entry(endpoint.to_string())
            .or_default()
            .entry(obj.id.clone())
            .or_default()
            .entry(bucket)
            .or_default()
            .insert(obj.name.clone(), Arc::new(obj));
    }

    /// No-op when the key is absent. An empty namespace addresses the
    /// cluster bucket.
    pub fn remove(&self, endpoint: &str, id: &ResourceId, namespace: &str, name: &str) {
        let bucket = bucket_key(namespace);
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if let Some(b) = inner
            .resources
            .get_mut(endpoint)
            .and_then(|m| m.get_mut(id))
            .and_then(|m| m.get_mut(bucket))
        {
            b.remove(name);
        }
    }

    pub fn get(
        &self,
        endpoint: &str,
        id: &ResourceId,
        namespace: &str,
        name: &str,
    ) -> Option<Arc<CachedObject>> {
        let bucket = bucket_key(namespace);
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner
            .resources
            .get(endpoint)?
            .get(id)?
            .get(bucket)?
            .get(name)
            .cloned()
    }

    /// Objects of one namespace, or of every namespace (excluding the
    /// cluster bucket) when `namespace` is empty. Order is unspecified.
    pub fn list_namespaced(
        &self,
        endpoint: &str,
        id: &ResourceId,
        namespace: &str,
    ) -> Vec<Arc<CachedObject>> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let Some(buckets) = inner.resources.get(endpoint).and_then(|m| m.get(id)) else {
            return Vec::new();
        };
        if namespace.is_empty() {
            buckets
                .iter()
                .filter(|(ns, _)| ns.as_str() != CLUSTER_BUCKET)
                .flat_map(|(_, b)| b.values().cloned())
                .collect()
        } else {
            buckets
                .get(namespace)
                .map(|b| b.values().cloned().collect())
                .unwrap_or_default()
        }
    }

    /// The cluster bucket of a resource.
    pub fn list_cluster(&self, endpoint: &str, id: &ResourceId) -> Vec<Arc<CachedObject>> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner
            .resources
            .get(endpoint)
            .and_then(|m| m.get(id))
            .and_then(|m| m.get(CLUSTER_BUCKET))
            .map(|b| b.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Drops the subtree for one resource along with its watch flag.
    pub fn clear(&self, endpoint: &str, id: &ResourceId) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if let Some(m) = inner.resources.get_mut(endpoint) {
            m.remove(id);
        }
        if let Some(m) = inner.watching.get_mut(endpoint) {
            m.remove(id);
        }
    }

    /// Drops everything held for an endpoint, watch flags included.
    pub fn clear_endpoint(&self, endpoint: &str) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.resources.remove(endpoint);
        inner.watching.remove(endpoint);
    }

    pub fn set_watching(&self, endpoint: &str, id: &ResourceId, watching: bool) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner
            .watching
            .entry(endpoint.to_string())
            .or_default()
            .insert(id.clone(), watching);
    }

    pub fn is_watching(&self, endpoint: &str, id: &ResourceId) -> bool {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner
            .watching
            .get(endpoint)
            .and_then(|m| m.get(id))
            .copied()
            .unwrap_or(false)
    }

    /// Per-endpoint per-resource object counts, keyed by the qualified
    /// plural. Approximate under concurrent writes.
    pub fn stats(&self) -> HashMap<String, HashMap<String, usize>> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let mut stats = HashMap::new();
        for (endpoint, ids) in &inner.resources {
            let entry: &mut HashMap<String, usize> =
                stats.entry(endpoint.clone()).or_default();
            for (id, buckets) in ids {
                let count: usize = buckets.values().map(HashMap::len).sum();
                *entry.entry(id.plural.clone()).or_insert(0) += count;
            }
        }
        stats
    }

    /// Total object count across all endpoints and resources.
    pub fn count(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner
            .resources
            .values()
            .flat_map(|ids| ids.values())
            .flat_map(|buckets| buckets.values())
            .map(HashMap::len)
            .sum()
    }
}

fn bucket_key(namespace: &str) -> &str {
    if namespace.is_empty() {
        CLUSTER_BUCKET
    } else {
        namespace
    }
}
