#![forbid(unsafe_code)]

use kompl_core::{CachedObject, ResourceId, ResourceScope};
use kompl_kubehub::{ClientCache, WatchManager};
use kompl_store::ResourceStore;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const KUBECONFIG_YAML: &str = r#"
apiVersion: v1
kind: Config
current-context: test-context
clusters:
  - name: test-cluster
    cluster:
      server: https://127.0.0.1:1
contexts:
  - name: test-context
    context:
      cluster: test-cluster
      user: test-user
users:
  - name: test-user
    user: {}
"#;

fn write_kubeconfig(dir: &std::path::Path) -> PathBuf {
    let path = dir.join("config");
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(KUBECONFIG_YAML.as_bytes()).unwrap();
    path
}

fn setup(dir: &std::path::Path) -> (WatchManager, Arc<ResourceStore>) {
    let clients = Arc::new(ClientCache::with_path(write_kubeconfig(dir)).unwrap());
    let store = Arc::new(ResourceStore::new());
    let manager = WatchManager::new(clients, Arc::clone(&store), CancellationToken::new());
    (manager, store)
}

fn pods() -> ResourceId {
    ResourceId::core("v1", "pods")
}

fn pod(id: &ResourceId, name: &str) -> CachedObject {
    CachedObject::from_raw(
        id.clone(),
        serde_json::json!({ "metadata": { "name": name, "namespace": "default" } }),
    )
    .unwrap()
}

#[tokio::test]
async fn start_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let (manager, _store) = setup(dir.path());
    let id = pods();

    manager.start("test-context", &id, ResourceScope::Namespaced);
    manager.start("test-context", &id, ResourceScope::Namespaced);

    assert!(manager.is_watching("test-context", &id));
    let watches = manager.list_watches();
    assert_eq!(watches["test-context"].len(), 1);
}

#[tokio::test]
async fn concurrent_starts_register_one_task() {
    let dir = tempfile::tempdir().unwrap();
    let (manager, _store) = setup(dir.path());
    let id = pods();

    let mut joins = Vec::new();
    for _ in 0..16 {
        let manager = manager.clone();
        let id = id.clone();
        joins.push(tokio::spawn(async move {
            manager.start("test-context", &id, ResourceScope::Namespaced);
        }));
    }
    for j in joins {
        j.await.unwrap();
    }

    assert_eq!(manager.list_watches()["test-context"].len(), 1);
}

#[tokio::test]
async fn stop_clears_store_and_flag() {
    let dir = tempfile::tempdir().unwrap();
    let (manager, store) = setup(dir.path());
    let id = pods();

    store.insert("test-context", pod(&id, "a"));
    store.set_watching("test-context", &id, true);
    manager.start("test-context", &id, ResourceScope::Namespaced);

    manager.stop("test-context", &id);

    assert!(!manager.is_watching("test-context", &id));
    assert!(!store.is_watching("test-context", &id));
    assert!(store.list_namespaced("test-context", &id, "").is_empty());

    // Stopping an absent watch is safe.
    manager.stop("test-context", &id);
}

#[tokio::test]
async fn stop_endpoint_drops_orphan_data_too() {
    let dir = tempfile::tempdir().unwrap();
    let (manager, store) = setup(dir.path());
    let pods = pods();
    let services = ResourceId::core("v1", "services");

    manager.start("test-context", &pods, ResourceScope::Namespaced);
    // Orphan data with no registered watch.
    store.insert("test-context", pod(&services, "svc"));
    store.insert("other-context", pod(&pods, "keep"));

    manager.stop_endpoint("test-context");

    assert!(manager.list_watches().get("test-context").is_none());
    assert!(store.list_namespaced("test-context", &services, "").is_empty());
    assert_eq!(store.list_namespaced("other-context", &pods, "").len(), 1);
}

#[tokio::test]
async fn stop_all_empties_registry() {
    let dir = tempfile::tempdir().unwrap();
    let (manager, store) = setup(dir.path());
    let pods = pods();
    let services = ResourceId::core("v1", "services");

    manager.start("test-context", &pods, ResourceScope::Namespaced);
    manager.start("test-context", &services, ResourceScope::Namespaced);
    store.insert("test-context", pod(&pods, "a"));

    manager.stop_all();

    assert!(manager.list_watches().is_empty());
    assert!(store.list_namespaced("test-context", &pods, "").is_empty());

    // The registry accepts a fresh start after a full stop.
    manager.start("test-context", &pods, ResourceScope::Namespaced);
    assert!(manager.is_watching("test-context", &pods));
}
