#![allow(dead_code)]

use kompl_core::{CachedObject, ResourceId};
use kompl_kubehub::ClientCache;
use kompl_server::config::Config;
use kompl_server::Server;
use serde_json::Value;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const ENDPOINT: &str = "test-context";

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
      namespace: default
users:
  - name: test-user
    user: {}
"#;

/// A server wired against a scratch kubeconfig whose cluster is
/// unreachable; tests answer from a pre-seeded store.
pub fn test_server(dir: &Path) -> (Arc<Server>, CancellationToken) {
    let kubeconfig = dir.join("kubeconfig");
    let mut f = std::fs::File::create(&kubeconfig).unwrap();
    f.write_all(KUBECONFIG_YAML.as_bytes()).unwrap();

    let clients = Arc::new(ClientCache::with_path(kubeconfig).unwrap());
    let mut config = Config::default_config();
    config.server.socket_path = dir.join("kompl.sock");

    let shutdown = CancellationToken::new();
    (Server::new(config, clients, shutdown.clone()), shutdown)
}

pub fn pods_id() -> ResourceId {
    ResourceId::core("v1", "pods")
}

pub fn services_id() -> ResourceId {
    ResourceId::core("v1", "services")
}

pub fn seed(server: &Server, id: &ResourceId, raw: Value) {
    let obj = CachedObject::from_raw(id.clone(), raw).expect("seed object has a name");
    server.store().insert(ENDPOINT, obj);
}

/// Marks the resource as synced so handlers answer immediately.
pub fn mark_synced(server: &Server, id: &ResourceId) {
    server.store().set_watching(ENDPOINT, id, true);
}

pub fn pod(name: &str, ns: &str, labels: Value) -> Value {
    serde_json::json!({
        "metadata": { "name": name, "namespace": ns, "labels": labels },
        "spec": { "nodeName": "node-1" },
        "status": { "phase": "Running" },
    })
}
