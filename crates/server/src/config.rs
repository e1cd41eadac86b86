//! YAML configuration: socket path plus per-resource output columns.
//! A user file is merged over the built-in defaults; a missing file
//! simply means defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub resources: HashMap<String, ResourceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServerConfig {
    #[serde(rename = "socketPath", default)]
    pub socket_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResourceConfig {
    #[serde(default)]
    pub columns: Vec<ColumnConfig>,
}

/// One output column: header name, extraction field path, fixed width
/// (0 = no padding).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub name: String,
    pub field: String,
    #[serde(default)]
    pub width: usize,
}

impl Config {
    /// Loads from `path`, merging over defaults. A missing file yields
    /// the defaults unchanged.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut cfg = Config::default_config();
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(cfg),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", path.display()))
            }
        };
        let user: Config = serde_yaml::from_slice(&data)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        if !user.server.socket_path.as_os_str().is_empty() {
            cfg.server.socket_path = user.server.socket_path;
        }
        for (resource, res_cfg) in user.resources {
            cfg.resources.insert(resource, res_cfg);
        }
        Ok(cfg)
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    /// Column set for a resource type, falling back to `_default`.
    pub fn resource_config(&self, resource_type: &str) -> &ResourceConfig {
        self.resources
            .get(resource_type)
            .or_else(|| self.resources.get("_default"))
            .unwrap_or(&EMPTY_RESOURCE)
    }

    pub fn default_config() -> Self {
        let col = |name: &str, field: &str, width: usize| ColumnConfig {
            name: name.to_string(),
            field: field.to_string(),
            width,
        };
        let columns = |cols: Vec<ColumnConfig>| ResourceConfig { columns: cols };

        let mut resources = HashMap::new();
        resources.insert(
            "pods".to_string(),
            columns(vec![
                col("NAME", ".metadata.name", 40),
                col("NAMESPACE", ".metadata.namespace", 40),
                col("STATUS", ".status.phase", 12),
                col("AGE", ".metadata.creationTimestamp", 10),
            ]),
        );
        resources.insert(
            "deployments".to_string(),
            columns(vec![
                col("NAME", ".metadata.name", 40),
                col("NAMESPACE", ".metadata.namespace", 40),
                col("READY", ".status.readyReplicas/.spec.replicas", 10),
                col("AGE", ".metadata.creationTimestamp", 10),
            ]),
        );
        resources.insert(
            "services".to_string(),
            columns(vec![
                col("NAME", ".metadata.name", 40),
                col("NAMESPACE", ".metadata.namespace", 40),
                col("TYPE", ".spec.type", 12),
                col("CLUSTER-IP", ".spec.clusterIP", 16),
            ]),
        );
        resources.insert(
            "configmaps".to_string(),
            columns(vec![
                col("NAME", ".metadata.name", 40),
                col("NAMESPACE", ".metadata.namespace", 40),
                col("AGE", ".metadata.creationTimestamp", 10),
            ]),
        );
        resources.insert(
            "secrets".to_string(),
            columns(vec![
                col("NAME", ".metadata.name", 40),
                col("NAMESPACE", ".metadata.namespace", 40),
                col("TYPE", ".type", 30),
                col("AGE", ".metadata.creationTimestamp", 10),
            ]),
        );
        resources.insert(
            "namespaces".to_string(),
            columns(vec![
                col("NAME", ".metadata.name", 40),
                col("STATUS", ".status.phase", 12),
                col("AGE", ".metadata.creationTimestamp", 10),
            ]),
        );
        resources.insert(
            "nodes".to_string(),
            columns(vec![
                col("NAME", ".metadata.name", 65),
                col(
                    "READY",
                    ".status.conditions[?(@.type==\"Ready\")].status",
                    8,
                ),
                col("AGE", ".metadata.creationTimestamp", 6),
            ]),
        );
        resources.insert(
            "statefulsets".to_string(),
            columns(vec![
                col("NAME", ".metadata.name", 40),
                col("NAMESPACE", ".metadata.namespace", 40),
                col("READY", ".status.readyReplicas/.spec.replicas", 10),
                col("AGE", ".metadata.creationTimestamp", 10),
            ]),
        );
        resources.insert(
            "daemonsets".to_string(),
            columns(vec![
                col("NAME", ".metadata.name", 40),
                col("NAMESPACE", ".metadata.namespace", 40),
                col("DESIRED", ".status.desiredNumberScheduled", 8),
                col("READY", ".status.numberReady", 8),
            ]),
        );
        resources.insert(
            "jobs".to_string(),
            columns(vec![
                col("NAME", ".metadata.name", 40),
                col("NAMESPACE", ".metadata.namespace", 40),
                col("COMPLETIONS", ".status.succeeded/.spec.completions", 12),
                col("AGE", ".metadata.creationTimestamp", 10),
            ]),
        );
        resources.insert(
            "cronjobs".to_string(),
            columns(vec![
                col("NAME", ".metadata.name", 40),
                col("NAMESPACE", ".metadata.namespace", 40),
                col("SCHEDULE", ".spec.schedule", 20),
                col("SUSPEND", ".spec.suspend", 8),
            ]),
        );
        resources.insert(
            "ingresses".to_string(),
            columns(vec![
                col("NAME", ".metadata.name", 40),
                col("NAMESPACE", ".metadata.namespace", 40),
                col("HOSTS", ".spec.rules[*].host", 40),
            ]),
        );
        resources.insert(
            "persistentvolumeclaims".to_string(),
            columns(vec![
                col("NAME", ".metadata.name", 40),
                col("NAMESPACE", ".metadata.namespace", 40),
                col("STATUS", ".status.phase", 10),
                col("CAPACITY", ".spec.resources.requests.storage", 10),
            ]),
        );
        resources.insert(
            "persistentvolumes".to_string(),
            columns(vec![
                col("NAME", ".metadata.name", 40),
                col("CAPACITY", ".spec.capacity.storage", 10),
                col("STATUS", ".status.phase", 12),
                col("CLAIM", ".spec.claimRef.name", 30),
            ]),
        );
        resources.insert(
            "applications.argoproj.io".to_string(),
            columns(vec![
                col("NAME", ".metadata.name", 40),
                col("NAMESPACE", ".metadata.namespace", 25),
                col("SYNC", ".status.sync.status", 10),
                col("HEALTH", ".status.health.status", 12),
                col("AGE", ".metadata.creationTimestamp", 10),
            ]),
        );
        resources.insert(
            "_default".to_string(),
            columns(vec![
                col("NAME", ".metadata.name", 40),
                col("NAMESPACE", ".metadata.namespace", 40),
                col("AGE", ".metadata.creationTimestamp", 10),
            ]),
        );

        Config {
            server: ServerConfig {
                socket_path: std::env::temp_dir().join("kompl.sock"),
            },
            resources,
        }
    }
}

static EMPTY_RESOURCE: ResourceConfig = ResourceConfig { columns: Vec::new() };

/// `$XDG_CONFIG_HOME/kompl/config.yaml`, else
/// `$HOME/.config/kompl/config.yaml`.
pub fn config_path() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg.is_empty() {
            return PathBuf::from(xdg).join("kompl").join("config.yaml");
        }
    }
    let home = std::env::var("HOME").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("."));
    home.join(".config").join("kompl").join("config.yaml")
}
