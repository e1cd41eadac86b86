//! The watch manager: one list-then-watch task per (endpoint, resource)
//! pair, feeding the store.
//!
//! Each task repeats an indefinite cycle: list the full collection,
//! replace the store subtree, stream events from the list's version
//! token. Transient failures retry with exponential backoff; cancellation
//! is terminal. Registry entries are generation-tagged so that a task's
//! exit cleanup never removes an entry owned by a newer task.

use crate::client::ClientCache;
use anyhow::{anyhow, Context, Result};
use futures::TryStreamExt;
use kompl_core::{CachedObject, ResourceId, ResourceScope};
use kompl_store::ResourceStore;
use kube::api::{Api, DynamicObject, ListParams, WatchEvent, WatchParams};
use kube::core::ApiResource;
use metrics::{counter, histogram};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct WatchKey {
    endpoint: String,
    id: ResourceId,
}

struct WatchEntry {
    token: CancellationToken,
    generation: u64,
}

struct Shared {
    clients: Arc<ClientCache>,
    store: Arc<ResourceStore>,
    root: CancellationToken,
    next_generation: AtomicU64,
    watches: RwLock<HashMap<WatchKey, WatchEntry>>,
}

/// Cheap-to-clone handle over the watch registry. Handlers drive it only
/// through `start`/`stop`; the tasks themselves write to the store.
#[derive(Clone)]
pub struct WatchManager {
    shared: Arc<Shared>,
}

impl WatchManager {
    pub fn new(clients: Arc<ClientCache>, store: Arc<ResourceStore>, root: CancellationToken) -> Self {
        Self {
            shared: Arc::new(Shared {
                clients,
                store,
                root,
                next_generation: AtomicU64::new(0),
                watches: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Starts a watch task for the key. Idempotent: an existing task is
    /// left untouched. Never blocks on the initial list.
    pub fn start(&self, endpoint: &str, id: &ResourceId, scope: ResourceScope) {
        let key = WatchKey {
            endpoint: endpoint.to_string(),
            id: id.clone(),
        };
        let (token, generation) = {
            let mut watches = self.shared.watches.write().unwrap_or_else(|e| e.into_inner());
            if watches.contains_key(&key) {
                return;
            }
            let token = self.shared.root.child_token();
            let generation = self.shared.next_generation.fetch_add(1, Ordering::Relaxed);
            watches.insert(
                key.clone(),
                WatchEntry {
                    token: token.clone(),
                    generation,
                },
            );
            (token, generation)
        };

        let manager = self.clone();
        tokio::spawn(async move {
            manager.run(key, scope, token, generation).await;
        });
    }

    /// Cancels the task and clears the store subtree along with its
    /// watch-status flag. Safe when absent.
    pub fn stop(&self, endpoint: &str, id: &ResourceId) {
        let key = WatchKey {
            endpoint: endpoint.to_string(),
            id: id.clone(),
        };
        let entry = {
            let mut watches = self.shared.watches.write().unwrap_or_else(|e| e.into_inner());
            watches.remove(&key)
        };
        if let Some(entry) = entry {
            entry.token.cancel();
            self.shared.store.clear(endpoint, id);
        }
    }

    /// Stops every watch of an endpoint and clears any orphan store data
    /// left under it.
    pub fn stop_endpoint(&self, endpoint: &str) {
        let entries = {
            let mut watches = self.shared.watches.write().unwrap_or_else(|e| e.into_inner());
            let keys: Vec<WatchKey> = watches
                .keys()
                .filter(|k| k.endpoint == endpoint)
                .cloned()
                .collect();
            keys.into_iter()
                .filter_map(|k| watches.remove(&k).map(|e| (k, e)))
                .collect::<Vec<_>>()
        };
        for (key, entry) in entries {
            entry.token.cancel();
            self.shared.store.clear(&key.endpoint, &key.id);
        }
        self.shared.store.clear_endpoint(endpoint);
    }

    /// Stops every watch and clears all cached data.
    pub fn stop_all(&self) {
        let entries = {
            let mut watches = self.shared.watches.write().unwrap_or_else(|e| e.into_inner());
            watches.drain().collect::<Vec<_>>()
        };
        for (key, entry) in entries {
            entry.token.cancel();
            self.shared.store.clear(&key.endpoint, &key.id);
        }
    }

    /// Whether the registry holds a task for the key.
    pub fn is_watching(&self, endpoint: &str, id: &ResourceId) -> bool {
        let key = WatchKey {
            endpoint: endpoint.to_string(),
            id: id.clone(),
        };
        let watches = self.shared.watches.read().unwrap_or_else(|e| e.into_inner());
        watches.contains_key(&key)
    }

    /// Registered watches, grouped by endpoint.
    pub fn list_watches(&self) -> HashMap<String, Vec<ResourceId>> {
        let watches = self.shared.watches.read().unwrap_or_else(|e| e.into_inner());
        let mut out: HashMap<String, Vec<ResourceId>> = HashMap::new();
        for key in watches.keys() {
            out.entry(key.endpoint.clone()).or_default().push(key.id.clone());
        }
        out
    }

    async fn run(
        self,
        key: WatchKey,
        scope: ResourceScope,
        token: CancellationToken,
        generation: u64,
    ) {
        info!(
            endpoint = %key.endpoint,
            resource = %key.id,
            scope = ?scope,
            "starting watch"
        );

        let mut backoff = INITIAL_BACKOFF;
        loop {
            if token.is_cancelled() {
                break;
            }
            let mut drained = 0usize;
            match self.cycle(&key, &token, &mut drained).await {
                Ok(()) => break, // cancelled mid-cycle
                Err(err) => {
                    if token.is_cancelled() {
                        break;
                    }
                    // A cycle that made progress restarts from the short
                    // backoff; repeated dry failures keep doubling.
                    if drained > 0 {
                        backoff = INITIAL_BACKOFF;
                    }
                    warn!(
                        endpoint = %key.endpoint,
                        resource = %key.id,
                        error = %err,
                        backoff_secs = backoff.as_secs(),
                        "watch error, will retry"
                    );
                    counter!("watch_errors_total", 1u64);
                    histogram!("watch_backoff_ms", backoff.as_millis() as f64);
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    if drained == 0 {
                        backoff = (backoff * 2).min(MAX_BACKOFF);
                    }
                    counter!("watch_restarts_total", 1u64);
                }
            }
        }

        self.cleanup(&key, generation);
        info!(endpoint = %key.endpoint, resource = %key.id, "watch stopped");
    }

    /// One list-then-watch cycle. Returns `Ok` only on cancellation; any
    /// other exit is an error for the outer loop to retry.
    async fn cycle(
        &self,
        key: &WatchKey,
        token: &CancellationToken,
        drained: &mut usize,
    ) -> Result<()> {
        let bundle = self
            .shared
            .clients
            .get(&key.endpoint)
            .await
            .context("failed to get client")?;
        let api = dynamic_api(bundle.client.clone(), &key.id);

        let list_params = ListParams::default();
        let list = tokio::select! {
            _ = token.cancelled() => return Ok(()),
            res = api.list(&list_params) => res.context("failed to list resources")?,
        };
        let version = list.metadata.resource_version.clone().unwrap_or_default();

        // Replace the subtree wholesale from the fresh list.
        self.shared.store.clear(&key.endpoint, &key.id);
        let mut count = 0usize;
        for item in list.items {
            if self.ingest(key, item) {
                count += 1;
            }
        }
        self.shared.store.set_watching(&key.endpoint, &key.id, true);
        info!(
            endpoint = %key.endpoint,
            resource = %key.id,
            count,
            "initial list complete"
        );

        let watch_params = WatchParams::default();
        let stream = tokio::select! {
            _ = token.cancelled() => return Ok(()),
            res = api.watch(&watch_params, &version) => {
                res.context("failed to start watch")?
            }
        };
        futures::pin_mut!(stream);

        loop {
            let event = tokio::select! {
                _ = token.cancelled() => return Ok(()),
                ev = stream.try_next() => ev.context("watch stream error")?,
            };
            match event {
                Some(WatchEvent::Added(obj)) | Some(WatchEvent::Modified(obj)) => {
                    self.ingest(key, obj);
                    *drained += 1;
                }
                Some(WatchEvent::Deleted(obj)) => {
                    let name = obj.metadata.name.unwrap_or_default();
                    let namespace = obj.metadata.namespace.unwrap_or_default();
                    debug!(
                        endpoint = %key.endpoint,
                        resource = %key.id,
                        name = %name,
                        namespace = %namespace,
                        "resource deleted"
                    );
                    self.shared.store.remove(&key.endpoint, &key.id, &namespace, &name);
                    *drained += 1;
                }
                Some(WatchEvent::Bookmark(_)) => {}
                Some(WatchEvent::Error(err)) => {
                    warn!(
                        endpoint = %key.endpoint,
                        resource = %key.id,
                        code = err.code,
                        message = %err.message,
                        "watch error event"
                    );
                }
                None => return Err(anyhow!("watch channel closed")),
            }
        }
    }

    /// Prunes and upserts one object; returns false when the object is
    /// unusable (no name, unserializable).
    fn ingest(&self, key: &WatchKey, obj: DynamicObject) -> bool {
        let mut raw = match serde_json::to_value(&obj) {
            Ok(v) => v,
            Err(err) => {
                warn!(error = %err, "failed to serialize watched object");
                return false;
            }
        };
        prune_object(&mut raw);
        match CachedObject::from_raw(key.id.clone(), raw) {
            Some(cached) => {
                debug!(
                    endpoint = %key.endpoint,
                    resource = %key.id,
                    name = %cached.name,
                    namespace = %cached.namespace,
                    "resource upserted"
                );
                self.shared.store.insert(&key.endpoint, cached);
                true
            }
            None => {
                debug!(resource = %key.id, "dropping object without a name");
                false
            }
        }
    }

    /// Task-exit path: removes the registry entry exactly once (a racing
    /// `stop` or a replacement task wins by generation) and drops the
    /// watch-status flag.
    fn cleanup(&self, key: &WatchKey, generation: u64) {
        let owned = {
            let mut watches = self.shared.watches.write().unwrap_or_else(|e| e.into_inner());
            match watches.get(key) {
                Some(entry) if entry.generation == generation => {
                    watches.remove(key);
                    true
                }
                _ => false,
            }
        };
        if owned {
            self.shared.store.set_watching(&key.endpoint, &key.id, false);
        }
    }
}

/// A dynamic API handle over the collection addressed by `id`, across all
/// namespaces. The kind is not needed for list/watch request paths.
fn dynamic_api(client: kube::Client, id: &ResourceId) -> Api<DynamicObject> {
    let ar = ApiResource {
        group: id.group.clone(),
        version: id.version.clone(),
        api_version: id.api_version(),
        kind: String::new(),
        plural: id.plural.clone(),
    };
    Api::all_with(client, &ar)
}

/// Strips large fields that completion queries never read, before an
/// object enters the store. Identity, labels, container identities and
/// ports, and the status/spec fields the formatter uses all survive.
pub fn prune_object(raw: &mut Value) {
    let Some(root) = raw.as_object_mut() else {
        return;
    };
    root.remove("data");
    root.remove("binaryData");
    root.remove("stringData");

    if let Some(meta) = root.get_mut("metadata").and_then(Value::as_object_mut) {
        meta.remove("managedFields");
        if let Some(annotations) = meta.get_mut("annotations").and_then(Value::as_object_mut) {
            annotations.remove("kubectl.kubernetes.io/last-applied-configuration");
        }
    }

    if let Some(spec) = root.get_mut("spec").and_then(Value::as_object_mut) {
        spec.remove("volumes");
        for list in ["containers", "initContainers"] {
            if let Some(containers) = spec.get_mut(list).and_then(Value::as_array_mut) {
                for container in containers {
                    prune_container(container);
                }
            }
        }
    }
}

fn prune_container(container: &mut Value) {
    let Some(c) = container.as_object_mut() else {
        return;
    };
    for field in [
        "env",
        "envFrom",
        "volumeMounts",
        "resources",
        "livenessProbe",
        "readinessProbe",
        "startupProbe",
        "lifecycle",
        "securityContext",
        "command",
        "args",
    ] {
        c.remove(field);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prune_strips_bulk_fields_and_keeps_identity() {
        let mut obj = json!({
            "metadata": {
                "name": "web-0",
                "namespace": "prod",
                "labels": { "app": "web" },
                "managedFields": [{ "manager": "kubectl" }],
                "annotations": {
                    "kubectl.kubernetes.io/last-applied-configuration": "{...}",
                    "team": "platform",
                },
            },
            "data": { "huge": "blob" },
            "binaryData": { "bin": "AAAA" },
            "stringData": { "s": "v" },
            "spec": {
                "nodeName": "node-1",
                "volumes": [{ "name": "cache" }],
                "containers": [{
                    "name": "nginx",
                    "image": "nginx:1.25",
                    "ports": [{ "containerPort": 80, "name": "http" }],
                    "env": [{ "name": "X", "value": "1" }],
                    "envFrom": [{}],
                    "volumeMounts": [{ "name": "cache", "mountPath": "/cache" }],
                    "resources": { "limits": { "cpu": "1" } },
                    "livenessProbe": { "httpGet": { "path": "/" } },
                    "readinessProbe": { "httpGet": { "path": "/" } },
                    "startupProbe": { "httpGet": { "path": "/" } },
                    "lifecycle": { "preStop": {} },
                    "securityContext": { "runAsUser": 1000 },
                    "command": ["nginx"],
                    "args": ["-g", "daemon off;"],
                }],
                "initContainers": [{
                    "name": "init-db",
                    "command": ["sh"],
                }],
            },
            "status": { "phase": "Running" },
        });

        prune_object(&mut obj);

        assert!(obj.get("data").is_none());
        assert!(obj.get("binaryData").is_none());
        assert!(obj.get("stringData").is_none());
        assert!(obj.pointer("/metadata/managedFields").is_none());
        assert!(obj
            .pointer("/metadata/annotations/kubectl.kubernetes.io~1last-applied-configuration")
            .is_none());
        assert_eq!(
            obj.pointer("/metadata/annotations/team").and_then(|v| v.as_str()),
            Some("platform")
        );
        assert!(obj.pointer("/spec/volumes").is_none());

        let container = obj.pointer("/spec/containers/0").unwrap();
        assert_eq!(container.get("name").and_then(|v| v.as_str()), Some("nginx"));
        assert!(container.get("ports").is_some());
        for gone in ["env", "envFrom", "volumeMounts", "resources", "command", "args"] {
            assert!(container.get(gone).is_none(), "{gone} should be pruned");
        }
        assert!(obj.pointer("/spec/initContainers/0/command").is_none());
        assert_eq!(
            obj.pointer("/spec/initContainers/0/name").and_then(|v| v.as_str()),
            Some("init-db")
        );
        assert_eq!(
            obj.pointer("/status/phase").and_then(|v| v.as_str()),
            Some("Running")
        );
        assert_eq!(
            obj.pointer("/metadata/labels/app").and_then(|v| v.as_str()),
            Some("web")
        );
    }
}
