#![forbid(unsafe_code)]

use kompl_core::{CachedObject, ResourceId, CLUSTER_BUCKET};
use kompl_store::ResourceStore;
use std::sync::Arc;

fn pods() -> ResourceId {
    ResourceId::core("v1", "pods")
}

fn obj(id: &ResourceId, name: &str, ns: Option<&str>) -> CachedObject {
    let mut meta = serde_json::json!({ "name": name });
    if let Some(ns) = ns {
        meta["namespace"] = serde_json::Value::String(ns.to_string());
    }
    CachedObject::from_raw(id.clone(), serde_json::json!({ "metadata": meta })).unwrap()
}

#[test]
fn insert_get_remove_round_trip() {
    let store = ResourceStore::new();
    let id = pods();
    store.insert("ctx", obj(&id, "pod-1", Some("default")));

    let got = store.get("ctx", &id, "default", "pod-1").expect("pod-1 present");
    assert_eq!(got.name, "pod-1");
    assert_eq!(got.namespace, "default");

    store.remove("ctx", &id, "default", "pod-1");
    assert!(store.get("ctx", &id, "default", "pod-1").is_none());

    // Removing again is a no-op.
    store.remove("ctx", &id, "default", "pod-1");
}

#[test]
fn insert_replaces_by_name() {
    let store = ResourceStore::new();
    let id = pods();
    let first = CachedObject::from_raw(
        id.clone(),
        serde_json::json!({
            "metadata": { "name": "pod-1", "namespace": "default" },
            "status": { "phase": "Pending" },
        }),
    )
    .unwrap();
    let second = CachedObject::from_raw(
        id.clone(),
        serde_json::json!({
            "metadata": { "name": "pod-1", "namespace": "default" },
            "status": { "phase": "Running" },
        }),
    )
    .unwrap();

    store.insert("ctx", first);
    store.insert("ctx", second);

    assert_eq!(store.list_namespaced("ctx", &id, "default").len(), 1);
    let got = store.get("ctx", &id, "default", "pod-1").unwrap();
    assert_eq!(
        got.raw.pointer("/status/phase").and_then(|v| v.as_str()),
        Some("Running")
    );
}

#[test]
fn all_namespaces_excludes_cluster_bucket() {
    let store = ResourceStore::new();
    let id = pods();
    store.insert("ctx", obj(&id, "a", Some("default")));
    store.insert("ctx", obj(&id, "b", Some("kube-system")));
    store.insert("ctx", obj(&id, "weird", None)); // lands in _cluster

    assert_eq!(store.list_namespaced("ctx", &id, "default").len(), 1);
    let all = store.list_namespaced("ctx", &id, "");
    assert_eq!(all.len(), 2);
    assert!(all.iter().all(|o| o.bucket() != CLUSTER_BUCKET));
    assert_eq!(store.list_cluster("ctx", &id).len(), 1);
}

#[test]
fn empty_namespace_on_get_addresses_cluster_bucket() {
    let store = ResourceStore::new();
    let nodes = ResourceId::core("v1", "nodes");
    store.insert("ctx", obj(&nodes, "node-a", None));

    assert!(store.get("ctx", &nodes, "", "node-a").is_some());
    assert!(store.get("ctx", &nodes, CLUSTER_BUCKET, "node-a").is_some());
    assert!(store.get("ctx", &nodes, "default", "node-a").is_none());
}

#[test]
fn clear_drops_subtree_and_watch_flag() {
    let store = ResourceStore::new();
    let id = pods();
    store.insert("ctx", obj(&id, "a", Some("default")));
    store.set_watching("ctx", &id, true);

    store.clear("ctx", &id);
    assert!(store.list_namespaced("ctx", &id, "").is_empty());
    assert!(!store.is_watching("ctx", &id));
}

#[test]
fn clear_endpoint_drops_everything_for_that_endpoint() {
    let store = ResourceStore::new();
    let id = pods();
    store.insert("a", obj(&id, "x", Some("default")));
    store.insert("b", obj(&id, "y", Some("default")));
    store.set_watching("a", &id, true);

    store.clear_endpoint("a");
    assert!(store.get("a", &id, "default", "x").is_none());
    assert!(!store.is_watching("a", &id));
    assert!(store.get("b", &id, "default", "y").is_some());
}

#[test]
fn watching_flag_toggles() {
    let store = ResourceStore::new();
    let id = pods();
    assert!(!store.is_watching("ctx", &id));
    store.set_watching("ctx", &id, true);
    assert!(store.is_watching("ctx", &id));
    store.set_watching("ctx", &id, false);
    assert!(!store.is_watching("ctx", &id));
}

#[test]
fn count_matches_stats_totals() {
    let store = ResourceStore::new();
    let pods = pods();
    let svcs = ResourceId::core("v1", "services");
    store.insert("a", obj(&pods, "p1", Some("default")));
    store.insert("a", obj(&pods, "p2", Some("kube-system")));
    store.insert("a", obj(&svcs, "s1", Some("default")));
    store.insert("b", obj(&pods, "p3", Some("default")));

    let stats = store.stats();
    let total: usize = stats.values().flat_map(|m| m.values()).sum();
    assert_eq!(total, store.count());
    assert_eq!(store.count(), 4);
    assert_eq!(stats["a"]["pods"], 2);
    assert_eq!(stats["a"]["services"], 1);
    assert_eq!(stats["b"]["pods"], 1);
}

#[test]
fn concurrent_readers_and_writers() {
    let store = Arc::new(ResourceStore::new());
    let id = pods();

    let mut handles = Vec::new();
    for w in 0..8 {
        let store = Arc::clone(&store);
        let id = id.clone();
        handles.push(std::thread::spawn(move || {
            for i in 0..200 {
                let name = format!("pod-{}-{}", w, i);
                store.insert("ctx", obj(&id, &name, Some("default")));
                if i % 2 == 0 {
                    store.remove("ctx", &id, "default", &name);
                }
            }
        }));
    }
    for _ in 0..8 {
        let store = Arc::clone(&store);
        let id = id.clone();
        handles.push(std::thread::spawn(move || {
            for _ in 0..200 {
                let _ = store.list_namespaced("ctx", &id, "default");
                let _ = store.count();
                let _ = store.stats();
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    // Odd-numbered inserts survive for every writer.
    assert_eq!(store.count(), 8 * 100);
}
