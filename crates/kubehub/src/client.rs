//! Per-endpoint client bundles built lazily from the kubeconfig file.
//!
//! The current endpoint is cached and re-read only when the file's
//! modification time advances. `refresh` reloads the file and drops every
//! cached bundle so stale credentials are never handed out.

use anyhow::{Context, Result};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::{Duration, Instant, SystemTime};
use tracing::debug;

/// Handles for one endpoint. `kube::Client` is cheap to clone; bundles
/// are handed out by value.
#[derive(Clone)]
pub struct ClientBundle {
    pub endpoint: String,
    pub client: Client,
    pub default_namespace: String,
}

struct CachedBundle {
    bundle: ClientBundle,
    last_access: Instant,
}

struct Inner {
    kubeconfig: Kubeconfig,
    current_context: String,
    config_mtime: Option<SystemTime>,
    bundles: HashMap<String, CachedBundle>,
}

/// Lazily built, idle-reaped cache of per-endpoint client bundles.
pub struct ClientCache {
    config_path: PathBuf,
    inner: RwLock<Inner>,
}

impl ClientCache {
    /// Reads the kubeconfig from the default location (`KUBECONFIG`, else
    /// `~/.kube/config`). Failure here is fatal at startup.
    pub fn new() -> Result<Self> {
        Self::with_path(kubeconfig_path())
    }

    pub fn with_path(path: PathBuf) -> Result<Self> {
        let kubeconfig = Kubeconfig::read_from(&path)
            .with_context(|| format!("failed to load kubeconfig from {}", path.display()))?;
        let current_context = kubeconfig.current_context.clone().unwrap_or_default();
        let config_mtime = file_mtime(&path);
        Ok(Self {
            config_path: path,
            inner: RwLock::new(Inner {
                kubeconfig,
                current_context,
                config_mtime,
                bundles: HashMap::new(),
            }),
        })
    }

    /// Returns the bundle for an endpoint, building it on first use. The
    /// lock is not held across the build; when two callers race, the
    /// first inserted bundle wins.
    pub async fn get(&self, endpoint: &str) -> Result<ClientBundle> {
        let kubeconfig = {
            let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
            if let Some(cached) = inner.bundles.get_mut(endpoint) {
                cached.last_access = Instant::now();
                return Ok(cached.bundle.clone());
            }
            inner.kubeconfig.clone()
        };

        let bundle = build_bundle(kubeconfig, endpoint).await?;

        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let cached = inner
            .bundles
            .entry(endpoint.to_string())
            .or_insert(CachedBundle {
                bundle,
                last_access: Instant::now(),
            });
        cached.last_access = Instant::now();
        Ok(cached.bundle.clone())
    }

    /// Name of the kubeconfig's current context. The file is re-read only
    /// when its modification time has advanced since the last read.
    pub fn current_endpoint(&self) -> String {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let Some(mtime) = file_mtime(&self.config_path) else {
            return inner.current_context.clone();
        };
        if inner.config_mtime.map(|m| mtime <= m).unwrap_or(false) {
            return inner.current_context.clone();
        }
        match Kubeconfig::read_from(&self.config_path) {
            Ok(kubeconfig) => {
                inner.current_context = kubeconfig.current_context.clone().unwrap_or_default();
                inner.kubeconfig = kubeconfig;
                inner.config_mtime = Some(mtime);
            }
            Err(err) => {
                debug!(error = %err, "kubeconfig reload failed; keeping cached context");
            }
        }
        inner.current_context.clone()
    }

    /// Reloads the kubeconfig and evicts every cached bundle. A
    /// previously cached bundle is never returned after this succeeds.
    pub fn refresh(&self) -> Result<()> {
        let kubeconfig = Kubeconfig::read_from(&self.config_path)
            .with_context(|| format!("failed to reload {}", self.config_path.display()))?;
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.current_context = kubeconfig.current_context.clone().unwrap_or_default();
        inner.kubeconfig = kubeconfig;
        inner.config_mtime = file_mtime(&self.config_path);
        inner.bundles.clear();
        Ok(())
    }

    /// Evicts bundles whose last access is older than `max_age`; returns
    /// how many were removed.
    pub fn reap_idle(&self, max_age: Duration) -> usize {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let before = inner.bundles.len();
        inner
            .bundles
            .retain(|_, cached| cached.last_access.elapsed() < max_age);
        before - inner.bundles.len()
    }

    pub fn bundle_count(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.bundles.len()
    }
}

async fn build_bundle(kubeconfig: Kubeconfig, endpoint: &str) -> Result<ClientBundle> {
    let options = KubeConfigOptions {
        context: Some(endpoint.to_string()),
        ..Default::default()
    };
    let config = Config::from_custom_kubeconfig(kubeconfig, &options)
        .await
        .with_context(|| format!("failed to build client config for context {endpoint}"))?;
    let default_namespace = if config.default_namespace.is_empty() {
        "default".to_string()
    } else {
        config.default_namespace.clone()
    };
    let client = Client::try_from(config)
        .with_context(|| format!("failed to build client for context {endpoint}"))?;
    Ok(ClientBundle {
        endpoint: endpoint.to_string(),
        client,
        default_namespace,
    })
}

fn file_mtime(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// First `KUBECONFIG` path when the variable is set, else
/// `$HOME/.kube/config`.
pub fn kubeconfig_path() -> PathBuf {
    if let Ok(var) = std::env::var("KUBECONFIG") {
        if let Some(first) = var.split(':').find(|p| !p.is_empty()) {
            return PathBuf::from(first);
        }
    }
    let home = std::env::var("HOME").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("."));
    home.join(".kube").join("config")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const KUBECONFIG_YAML: &str = r#"
apiVersion: v1
kind: Config
current-context: alpha
clusters:
  - name: alpha
    cluster:
      server: https://127.0.0.1:1
contexts:
  - name: alpha
    context:
      cluster: alpha
      user: alpha
      namespace: team-a
users:
  - name: alpha
    user: {}
"#;

    fn write_kubeconfig(dir: &std::path::Path, contents: &str) -> PathBuf {
        let path = dir.join("config");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn reads_current_context() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_kubeconfig(dir.path(), KUBECONFIG_YAML);
        let cache = ClientCache::with_path(path).unwrap();
        assert_eq!(cache.current_endpoint(), "alpha");
    }

    #[tokio::test]
    async fn builds_and_caches_bundles() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_kubeconfig(dir.path(), KUBECONFIG_YAML);
        let cache = ClientCache::with_path(path).unwrap();

        let bundle = cache.get("alpha").await.unwrap();
        assert_eq!(bundle.default_namespace, "team-a");
        assert_eq!(cache.bundle_count(), 1);

        // Second get is served from the cache.
        let _ = cache.get("alpha").await.unwrap();
        assert_eq!(cache.bundle_count(), 1);

        assert!(cache.get("missing-context").await.is_err());
    }

    #[tokio::test]
    async fn refresh_evicts_bundles() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_kubeconfig(dir.path(), KUBECONFIG_YAML);
        let cache = ClientCache::with_path(path).unwrap();
        let _ = cache.get("alpha").await.unwrap();
        assert_eq!(cache.bundle_count(), 1);

        cache.refresh().unwrap();
        assert_eq!(cache.bundle_count(), 0);
    }

    #[tokio::test]
    async fn reap_idle_honours_age() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_kubeconfig(dir.path(), KUBECONFIG_YAML);
        let cache = ClientCache::with_path(path).unwrap();
        let _ = cache.get("alpha").await.unwrap();

        assert_eq!(cache.reap_idle(Duration::from_secs(3600)), 0);
        assert_eq!(cache.reap_idle(Duration::ZERO), 1);
        assert_eq!(cache.bundle_count(), 0);
    }
}
