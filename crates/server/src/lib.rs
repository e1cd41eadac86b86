//! The kompl daemon: a unix-socket request dispatcher over the mirrored
//! resource store.
//!
//! One newline-terminated JSON request per connection, one response back.
//! Handlers are read-only over the store; watches are started on demand
//! and a periodic reaper evicts idle clients, discovery catalogues and
//! endpoints.

#![forbid(unsafe_code)]

pub mod config;
pub mod format;
pub mod protocol;
pub mod recent;

use anyhow::{Context, Result};
use futures::FutureExt;
use kompl_core::{paths, ResourceId, ResourceScope};
use kompl_kubehub::{discovery, ClientCache, DiscoveryCache, WatchManager};
use kompl_store::ResourceStore;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::os::unix::fs::PermissionsExt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use config::Config;
use format::Formatter;
use protocol::{Request, RequestType, Response, StatusInfo};
use recent::RecencyTracker;

const MAX_CONCURRENT_CONNECTIONS: usize = 50;
const READ_TIMEOUT: Duration = Duration::from_secs(5);
const WRITE_TIMEOUT: Duration = Duration::from_secs(30);
const SYNC_TIMEOUT: Duration = Duration::from_secs(1);
const SYNC_POLL_INTERVAL: Duration = Duration::from_millis(10);
const REAPER_INTERVAL: Duration = Duration::from_secs(300);
const CLIENT_IDLE_MAX: Duration = Duration::from_secs(30 * 60);
const DISCOVERY_IDLE_MAX: Duration = Duration::from_secs(60 * 60);
const ENDPOINT_IDLE_MAX: Duration = Duration::from_secs(60 * 60);
const RECENT_MAX_ITEMS: usize = 20;

/// Resources watched by default for every endpoint on first touch.
const DEFAULT_WATCHES: &[&str] = &[
    "pods",
    "services",
    "configmaps",
    "secrets",
    "namespaces",
    "nodes",
    "deployments",
    "statefulsets",
    "daemonsets",
];

/// Field selectors whitelisted for `field_values`, with their extraction
/// paths.
const FIELD_PATHS: &[(&str, &str)] = &[
    ("metadata.name", ".metadata.name"),
    ("metadata.namespace", ".metadata.namespace"),
    ("spec.nodeName", ".spec.nodeName"),
    ("spec.restartPolicy", ".spec.restartPolicy"),
    ("spec.schedulerName", ".spec.schedulerName"),
    ("spec.serviceAccountName", ".spec.serviceAccountName"),
    ("status.phase", ".status.phase"),
    ("status.podIP", ".status.podIP"),
    ("status.nominatedNodeName", ".status.nominatedNodeName"),
];

/// Failure to turn a user-typed resource name into an identifier.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("unknown resource type: {0}")]
    UnknownResource(String),
    #[error("failed to discover resources: {0}")]
    Discovery(anyhow::Error),
}

pub struct Server {
    config: Arc<Config>,
    clients: Arc<ClientCache>,
    watches: WatchManager,
    store: Arc<ResourceStore>,
    discovery: Arc<DiscoveryCache>,
    formatter: Formatter,
    recent: RecencyTracker,
    initialized: RwLock<HashMap<String, Instant>>,
    start_time: Instant,
    conn_limit: Arc<Semaphore>,
    shutdown: CancellationToken,
}

impl Server {
    pub fn new(config: Config, clients: Arc<ClientCache>, shutdown: CancellationToken) -> Arc<Self> {
        let config = Arc::new(config);
        let store = Arc::new(ResourceStore::new());
        let watches = WatchManager::new(
            Arc::clone(&clients),
            Arc::clone(&store),
            shutdown.child_token(),
        );
        Arc::new(Self {
            formatter: Formatter::new(Arc::clone(&config)),
            config,
            clients,
            watches,
            store,
            discovery: Arc::new(DiscoveryCache::new()),
            recent: RecencyTracker::new(RECENT_MAX_ITEMS),
            initialized: RwLock::new(HashMap::new()),
            start_time: Instant::now(),
            conn_limit: Arc::new(Semaphore::new(MAX_CONCURRENT_CONNECTIONS)),
            shutdown,
        })
    }

    /// Mirrored store, shared with the watch tasks.
    pub fn store(&self) -> &Arc<ResourceStore> {
        &self.store
    }

    /// Binds the socket and serves requests until the shutdown token
    /// fires. Stale socket files are replaced; permissions are owner-only.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        let socket_path = self.config.server.socket_path.clone();
        if let Some(dir) = socket_path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create socket directory {}", dir.display()))?;
        }
        match std::fs::remove_file(&socket_path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err).context("failed to remove existing socket"),
        }
        let listener = UnixListener::bind(&socket_path)
            .with_context(|| format!("failed to bind unix socket {}", socket_path.display()))?;
        if let Err(err) =
            std::fs::set_permissions(&socket_path, std::fs::Permissions::from_mode(0o600))
        {
            warn!(error = %err, "failed to set socket permissions");
        }
        info!(socket = %socket_path.display(), "server started");

        self.start_default_watches();
        tokio::spawn(Arc::clone(&self).reaper());

        loop {
            // Park on a connection slot before accepting; the cap bounds
            // live handler tasks.
            let permit = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                permit = Arc::clone(&self.conn_limit).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        let server = Arc::clone(&self);
                        tokio::spawn(async move {
                            let _permit = permit;
                            server.handle_conn(stream).await;
                        });
                    }
                    Err(err) => {
                        error!(error = %err, "failed to accept connection");
                    }
                },
            }
        }

        info!("shutting down server");
        self.watches.stop_all();
        drop(listener);
        let _ = std::fs::remove_file(&socket_path);
        Ok(())
    }

    async fn handle_conn(self: Arc<Self>, stream: UnixStream) {
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        let mut line = String::new();
        match tokio::time::timeout(READ_TIMEOUT, reader.read_line(&mut line)).await {
            // A client may connect and leave without sending anything
            // (health checks); that is not an error.
            Ok(Ok(0)) => return,
            Ok(Ok(_)) => {}
            Ok(Err(err)) => {
                error!(error = %err, "failed to read request");
                return;
            }
            Err(_) => {
                debug!("request read timed out");
                return;
            }
        }

        let response = match protocol::decode_request(line.as_bytes()) {
            Ok(req) => match AssertUnwindSafe(self.dispatch(req)).catch_unwind().await {
                Ok(resp) => resp,
                Err(_) => {
                    error!("panic in request handler");
                    Response::failure("internal server error")
                }
            },
            Err(err) => {
                error!(error = %err, "failed to decode request");
                Response::failure("invalid request format")
            }
        };

        let data = match protocol::encode_response(&response) {
            Ok(data) => data,
            Err(err) => {
                error!(error = %err, "failed to encode response");
                return;
            }
        };
        match tokio::time::timeout(WRITE_TIMEOUT, write_half.write_all(&data)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => debug!(error = %err, "failed to write response"),
            Err(_) => debug!("response write timed out"),
        }
    }

    /// Routes one decoded request to its handler.
    pub async fn dispatch(&self, req: Request) -> Response {
        match req.request_type {
            RequestType::Complete => self.handle_complete(&req).await,
            RequestType::Containers => self.handle_containers(&req).await,
            RequestType::Ports => self.handle_ports(&req).await,
            RequestType::Labels => self.handle_labels(&req).await,
            RequestType::FieldValues => self.handle_field_values(&req).await,
            RequestType::Status => self.handle_status(),
            RequestType::Refresh => self.handle_refresh(),
            RequestType::Watch => self.handle_watch(&req).await,
            RequestType::StopWatch => self.handle_stop_watch(&req).await,
            RequestType::RecordRecent => self.handle_record_recent(&req),
            RequestType::GetRecent => self.handle_get_recent(&req),
            RequestType::Unknown => Response::failure("unknown request type"),
        }
    }

    async fn handle_complete(&self, req: &Request) -> Response {
        let endpoint = self.endpoint_for(req);
        self.initialize_endpoint(&endpoint);

        let resource_type = discovery::normalize(&req.resource_type);
        let (id, scope) = match self.resolve(&endpoint, &resource_type).await {
            Ok(resolved) => resolved,
            Err(err) => return Response::failure(err.to_string()),
        };
        self.ensure_watch(&endpoint, &id, scope).await;

        let mut resources = if scope.is_namespaced() {
            self.store.list_namespaced(&endpoint, &id, &req.namespace)
        } else {
            self.store.list_cluster(&endpoint, &id)
        };
        resources.sort_by(|a, b| a.name.cmp(&b.name));

        Response::with_output(self.formatter.format(&resources, &resource_type))
    }

    async fn handle_containers(&self, req: &Request) -> Response {
        let endpoint = self.endpoint_for(req);
        if req.pod_name.is_empty() {
            return Response::failure("pod_name is required");
        }

        let (id, scope) = match self.resolve(&endpoint, "pods").await {
            Ok(resolved) => resolved,
            Err(err) => return Response::failure(err.to_string()),
        };
        self.ensure_watch(&endpoint, &id, scope).await;

        let Some(pod) = self.store.get(&endpoint, &id, &req.namespace, &req.pod_name) else {
            return Response::failure("pod not found in cache");
        };

        let mut output = String::new();
        for name in container_names(&pod.raw, "containers") {
            output.push_str(&name);
            output.push('\n');
        }
        for name in container_names(&pod.raw, "initContainers") {
            output.push_str(&name);
            output.push_str("\t\x1b[33m(init)\x1b[0m\n");
        }
        if output.is_empty() {
            return Response::failure("no containers found");
        }
        Response::with_output(output)
    }

    async fn handle_ports(&self, req: &Request) -> Response {
        let endpoint = self.endpoint_for(req);
        if req.pod_name.is_empty() {
            return Response::failure("pod_name is required");
        }

        let hint = req.resource_type.to_ascii_lowercase();
        if matches!(hint.as_str(), "services" | "service" | "svc") {
            return self
                .handle_service_ports(&endpoint, &req.namespace, &req.pod_name)
                .await;
        }

        let (id, scope) = match self.resolve(&endpoint, "pods").await {
            Ok(resolved) => resolved,
            Err(err) => return Response::failure(err.to_string()),
        };
        self.ensure_watch(&endpoint, &id, scope).await;

        let Some(pod) = self.store.get(&endpoint, &id, &req.namespace, &req.pod_name) else {
            return Response::failure("pod not found in cache");
        };

        let mut output = String::new();
        if let Some(containers) =
            paths::nested_value(&pod.raw, ".spec.containers").and_then(Value::as_array)
        {
            for container in containers {
                let container_name = container
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                let Some(ports) = container.get("ports").and_then(Value::as_array) else {
                    continue;
                };
                for port in ports {
                    let container_port = int_field(port, "containerPort");
                    if container_port <= 0 {
                        continue;
                    }
                    let protocol = port
                        .get("protocol")
                        .and_then(Value::as_str)
                        .unwrap_or("TCP");
                    let port_name = match port.get("name").and_then(Value::as_str) {
                        Some(name) if !name.is_empty() => name,
                        _ => "-",
                    };
                    output.push_str(&format!(
                        "{}\t{}\t{}\t{}\n",
                        container_port, protocol, container_name, port_name
                    ));
                }
            }
        }
        if output.is_empty() {
            return Response::failure("no ports found");
        }
        Response::with_output(output)
    }

    async fn handle_service_ports(&self, endpoint: &str, namespace: &str, name: &str) -> Response {
        let (id, scope) = match self.resolve(endpoint, "services").await {
            Ok(resolved) => resolved,
            Err(err) => return Response::failure(err.to_string()),
        };
        self.ensure_watch(endpoint, &id, scope).await;

        let Some(svc) = self.store.get(endpoint, &id, namespace, name) else {
            return Response::failure("service not found in cache");
        };

        let mut output = String::new();
        if let Some(ports) = paths::nested_value(&svc.raw, ".spec.ports").and_then(Value::as_array)
        {
            for port in ports {
                let svc_port = int_field(port, "port");
                if svc_port <= 0 {
                    continue;
                }
                let target_port = match port.get("targetPort") {
                    Some(Value::Null) | None => "-".to_string(),
                    Some(v) => paths::display_value(v),
                };
                let protocol = port
                    .get("protocol")
                    .and_then(Value::as_str)
                    .unwrap_or("TCP");
                let port_name = match port.get("name").and_then(Value::as_str) {
                    Some(n) if !n.is_empty() => n,
                    _ => "-",
                };
                output.push_str(&format!(
                    "{}\t{}\t{}\t{}\n",
                    svc_port, target_port, protocol, port_name
                ));
            }
        }
        if output.is_empty() {
            return Response::failure("no ports found");
        }
        Response::with_output(output)
    }

    async fn handle_labels(&self, req: &Request) -> Response {
        let endpoint = self.endpoint_for(req);
        self.initialize_endpoint(&endpoint);

        let resource_type = discovery::normalize(&req.resource_type);
        let (id, scope) = match self.resolve(&endpoint, &resource_type).await {
            Ok(resolved) => resolved,
            Err(err) => return Response::failure(err.to_string()),
        };
        self.ensure_watch(&endpoint, &id, scope).await;

        let resources = if scope.is_namespaced() {
            self.store.list_namespaced(&endpoint, &id, &req.namespace)
        } else {
            self.store.list_cluster(&endpoint, &id)
        };

        let mut labels = BTreeSet::new();
        for res in &resources {
            let Some(map) =
                paths::nested_value(&res.raw, ".metadata.labels").and_then(Value::as_object)
            else {
                continue;
            };
            for (key, value) in map {
                if let Some(value) = value.as_str() {
                    labels.insert(format!("{}={}", key, value));
                }
            }
        }

        let mut output = String::new();
        for label in labels {
            output.push_str(&label);
            output.push('\n');
        }
        Response::with_output(output)
    }

    async fn handle_field_values(&self, req: &Request) -> Response {
        let endpoint = self.endpoint_for(req);
        self.initialize_endpoint(&endpoint);

        if req.field_name.is_empty() {
            return Response::failure("field_name is required");
        }
        let Some((_, path)) = FIELD_PATHS.iter().find(|(name, _)| *name == req.field_name)
        else {
            return Response::failure(format!("unsupported field selector: {}", req.field_name));
        };

        let resource_type = discovery::normalize(&req.resource_type);
        let (id, scope) = match self.resolve(&endpoint, &resource_type).await {
            Ok(resolved) => resolved,
            Err(err) => return Response::failure(err.to_string()),
        };
        self.ensure_watch(&endpoint, &id, scope).await;

        let resources = if scope.is_namespaced() {
            self.store.list_namespaced(&endpoint, &id, &req.namespace)
        } else {
            self.store.list_cluster(&endpoint, &id)
        };

        let mut values = BTreeSet::new();
        for res in &resources {
            let value = paths::nested_string(&res.raw, path);
            if !value.is_empty() {
                values.insert(value);
            }
        }

        let mut output = String::new();
        for value in values {
            output.push_str(&req.field_name);
            output.push('=');
            output.push_str(&value);
            output.push('\n');
        }
        Response::with_output(output)
    }

    fn handle_status(&self) -> Response {
        let watched = self.watches.list_watches();
        let mut watched_resources = HashMap::new();
        for (endpoint, ids) in watched {
            watched_resources.insert(
                endpoint,
                ids.into_iter().map(|id| id.plural).collect::<Vec<_>>(),
            );
        }

        Response {
            success: true,
            error: None,
            output: None,
            status: Some(StatusInfo {
                uptime: format_uptime(self.start_time.elapsed()),
                resource_count: self.store.count(),
                watched_resources,
                resource_stats: self.store.stats(),
            }),
        }
    }

    fn handle_refresh(&self) -> Response {
        if let Err(err) = self.clients.refresh() {
            return Response::failure(err.to_string());
        }
        self.watches.stop_all();
        self.discovery.clear();
        {
            let mut initialized = self.initialized.write().unwrap_or_else(|e| e.into_inner());
            initialized.clear();
        }
        self.recent.clear();
        Response::ok()
    }

    async fn handle_watch(&self, req: &Request) -> Response {
        let endpoint = self.endpoint_for(req);
        for resource_type in &req.resource_types {
            let name = discovery::normalize(resource_type);
            match self.resolve(&endpoint, &name).await {
                Ok((id, scope)) => self.watches.start(&endpoint, &id, scope),
                Err(err) => {
                    warn!(resource = %name, error = %err, "failed to resolve resource type");
                }
            }
        }
        Response::ok()
    }

    async fn handle_stop_watch(&self, req: &Request) -> Response {
        let endpoint = self.endpoint_for(req);
        for resource_type in &req.resource_types {
            let name = discovery::normalize(resource_type);
            match self.resolve(&endpoint, &name).await {
                Ok((id, _)) => self.watches.stop(&endpoint, &id),
                Err(err) => {
                    warn!(resource = %name, error = %err, "failed to resolve resource type");
                }
            }
        }
        Response::ok()
    }

    fn handle_record_recent(&self, req: &Request) -> Response {
        let endpoint = self.endpoint_for(req);
        if req.resource_name.is_empty() {
            return Response::failure("resource_name is required");
        }
        let resource_type = discovery::normalize(&req.resource_type);
        self.recent
            .add(&endpoint, &req.namespace, &resource_type, &req.resource_name);
        Response::ok()
    }

    fn handle_get_recent(&self, req: &Request) -> Response {
        let endpoint = self.endpoint_for(req);
        let resource_type = discovery::normalize(&req.resource_type);
        let recent = self.recent.get(&endpoint, &req.namespace, &resource_type);
        if recent.is_empty() {
            return Response::ok();
        }
        Response::with_output(recent.join("\n"))
    }

    /// The request's endpoint, defaulting to the current one.
    fn endpoint_for(&self, req: &Request) -> String {
        if req.context.is_empty() {
            self.clients.current_endpoint()
        } else {
            req.context.clone()
        }
    }

    /// Resolution pipeline: builtin table first, then the endpoint's
    /// discovered catalogue.
    async fn resolve(
        &self,
        endpoint: &str,
        name: &str,
    ) -> Result<(ResourceId, ResourceScope), ResolveError> {
        if let Some(hit) = discovery::preferred(name) {
            return Ok(hit);
        }
        let bundle = self
            .clients
            .get(endpoint)
            .await
            .map_err(ResolveError::Discovery)?;
        let catalog = self
            .discovery
            .catalog(&bundle)
            .await
            .map_err(ResolveError::Discovery)?;
        match discovery::find(&catalog, name) {
            Some(descriptor) => Ok((descriptor.id.clone(), descriptor.scope)),
            None => Err(ResolveError::UnknownResource(name.to_string())),
        }
    }

    /// Starts a watch when none is registered, then waits briefly for the
    /// first sync so cold queries usually see hydrated data.
    async fn ensure_watch(&self, endpoint: &str, id: &ResourceId, scope: ResourceScope) {
        if !self.watches.is_watching(endpoint, id) {
            self.watches.start(endpoint, id, scope);
        }
        self.wait_for_sync(endpoint, id, SYNC_TIMEOUT).await;
    }

    /// Polls the watch-status flag until it is set or the budget elapses;
    /// a timed-out wait means answering from whatever is present.
    async fn wait_for_sync(&self, endpoint: &str, id: &ResourceId, budget: Duration) {
        if self.store.is_watching(endpoint, id) {
            return;
        }
        let deadline = Instant::now() + budget;
        let mut tick = tokio::time::interval(SYNC_POLL_INTERVAL);
        loop {
            tick.tick().await;
            if self.store.is_watching(endpoint, id) || Instant::now() >= deadline {
                return;
            }
        }
    }

    fn start_default_watches(&self) {
        let endpoint = self.clients.current_endpoint();
        if endpoint.is_empty() {
            warn!("no current context set");
            return;
        }
        self.initialize_endpoint(&endpoint);
    }

    /// Starts the default watch set for an endpoint on first touch and
    /// refreshes its last-access time on every touch.
    fn initialize_endpoint(&self, endpoint: &str) {
        {
            let mut initialized = self.initialized.write().unwrap_or_else(|e| e.into_inner());
            let known = initialized
                .insert(endpoint.to_string(), Instant::now())
                .is_some();
            if known {
                return;
            }
        }
        info!(endpoint = %endpoint, "initializing watches for new endpoint");
        for name in DEFAULT_WATCHES {
            if let Some((id, scope)) = discovery::preferred(name) {
                self.watches.start(endpoint, &id, scope);
            }
        }
    }

    async fn reaper(self: Arc<Self>) {
        let mut tick = tokio::time::interval(REAPER_INTERVAL);
        tick.tick().await; // the first tick fires immediately
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => return,
                _ = tick.tick() => {}
            }
            let removed = self.clients.reap_idle(CLIENT_IDLE_MAX);
            if removed > 0 {
                info!(count = removed, "evicted idle client bundles");
            }
            let removed = self.discovery.reap_idle(DISCOVERY_IDLE_MAX);
            if removed > 0 {
                info!(count = removed, "evicted idle discovery catalogues");
            }
            self.reap_idle_endpoints();
        }
    }

    /// Stops every watch of endpoints idle past the limit. The current
    /// endpoint is never reaped.
    fn reap_idle_endpoints(&self) {
        let current = self.clients.current_endpoint();
        let expired: Vec<String> = {
            let mut initialized = self.initialized.write().unwrap_or_else(|e| e.into_inner());
            let expired: Vec<String> = initialized
                .iter()
                .filter(|(endpoint, touched)| {
                    endpoint.as_str() != current && touched.elapsed() >= ENDPOINT_IDLE_MAX
                })
                .map(|(endpoint, _)| endpoint.clone())
                .collect();
            for endpoint in &expired {
                initialized.remove(endpoint);
            }
            expired
        };
        for endpoint in expired {
            info!(endpoint = %endpoint, "stopping watches for idle endpoint");
            self.watches.stop_endpoint(&endpoint);
        }
    }
}

fn container_names(pod: &Value, list: &str) -> Vec<String> {
    let path = format!(".spec.{}", list);
    let Some(containers) = paths::nested_value(pod, &path).and_then(Value::as_array) else {
        return Vec::new();
    };
    containers
        .iter()
        .filter_map(|c| c.get("name").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

/// Integer extraction tolerant of float-typed JSON numbers.
fn int_field(obj: &Value, key: &str) -> i64 {
    match obj.get(key) {
        Some(v) => v
            .as_i64()
            .or_else(|| v.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        None => 0,
    }
}

/// Go-duration style uptime: `1h2m3s`, `4m5s`, `42s`.
fn format_uptime(uptime: Duration) -> String {
    let total = uptime.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    if hours > 0 {
        format!("{}h{}m{}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m{}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uptime_renders_go_style() {
        assert_eq!(format_uptime(Duration::from_secs(42)), "42s");
        assert_eq!(format_uptime(Duration::from_secs(245)), "4m5s");
        assert_eq!(format_uptime(Duration::from_secs(3723)), "1h2m3s");
    }

    #[test]
    fn int_field_handles_floats_and_misses() {
        let port = serde_json::json!({ "a": 80, "b": 8080.0, "c": "x" });
        assert_eq!(int_field(&port, "a"), 80);
        assert_eq!(int_field(&port, "b"), 8080);
        assert_eq!(int_field(&port, "c"), 0);
        assert_eq!(int_field(&port, "missing"), 0);
    }
}
