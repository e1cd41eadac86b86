//! Resource discovery and the alias table.
//!
//! Resolution never needs a round trip for builtin or aliased names; the
//! discovered catalogue (cached per endpoint, idle-evicted) backs
//! everything else, CRDs included.

use crate::client::ClientBundle;
use anyhow::{Context, Result};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::APIResourceList;
use kompl_core::{ResourceId, ResourceScope};
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// One discovered resource collection of an endpoint.
#[derive(Debug, Clone)]
pub struct ResourceDescriptor {
    pub id: ResourceId,
    pub kind: String,
    pub scope: ResourceScope,
    pub short_names: Vec<String>,
    pub verbs: Vec<String>,
}

/// Common shortcuts mapped to canonical plural names, plus selected
/// fully-qualified CRD shortcuts.
static ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("po", "pods"),
        ("pod", "pods"),
        ("svc", "services"),
        ("service", "services"),
        ("no", "nodes"),
        ("node", "nodes"),
        ("ns", "namespaces"),
        ("namespace", "namespaces"),
        ("cm", "configmaps"),
        ("configmap", "configmaps"),
        ("secret", "secrets"),
        ("pv", "persistentvolumes"),
        ("pvc", "persistentvolumeclaims"),
        ("sa", "serviceaccounts"),
        ("ev", "events"),
        ("event", "events"),
        ("ep", "endpoints"),
        ("deploy", "deployments"),
        ("deployment", "deployments"),
        ("rs", "replicasets"),
        ("replicaset", "replicasets"),
        ("sts", "statefulsets"),
        ("statefulset", "statefulsets"),
        ("ds", "daemonsets"),
        ("daemonset", "daemonsets"),
        ("cj", "cronjobs"),
        ("cronjob", "cronjobs"),
        ("job", "jobs"),
        ("ing", "ingresses"),
        ("ingress", "ingresses"),
        ("netpol", "networkpolicies"),
        // ArgoCD resources
        ("app", "applications.argoproj.io"),
        ("application", "applications.argoproj.io"),
        ("applications", "applications.argoproj.io"),
        ("appproj", "appprojects.argoproj.io"),
        ("appproject", "appprojects.argoproj.io"),
        ("appprojects", "appprojects.argoproj.io"),
        ("appset", "applicationsets.argoproj.io"),
        ("applicationset", "applicationsets.argoproj.io"),
        ("appsets", "applicationsets.argoproj.io"),
    ])
});

/// Builtin kinds with an unambiguous home, resolvable without discovery.
static PREFERRED: Lazy<HashMap<&'static str, ResourceId>> = Lazy::new(|| {
    let core = |plural| ResourceId::core("v1", plural);
    HashMap::from([
        ("pods", core("pods")),
        ("services", core("services")),
        ("nodes", core("nodes")),
        ("namespaces", core("namespaces")),
        ("configmaps", core("configmaps")),
        ("secrets", core("secrets")),
        ("persistentvolumes", core("persistentvolumes")),
        ("persistentvolumeclaims", core("persistentvolumeclaims")),
        ("serviceaccounts", core("serviceaccounts")),
        ("events", core("events")),
        ("endpoints", core("endpoints")),
        ("deployments", ResourceId::grouped("apps", "v1", "deployments")),
        ("replicasets", ResourceId::grouped("apps", "v1", "replicasets")),
        ("statefulsets", ResourceId::grouped("apps", "v1", "statefulsets")),
        ("daemonsets", ResourceId::grouped("apps", "v1", "daemonsets")),
        ("jobs", ResourceId::grouped("batch", "v1", "jobs")),
        ("cronjobs", ResourceId::grouped("batch", "v1", "cronjobs")),
        (
            "ingresses",
            ResourceId::grouped("networking.k8s.io", "v1", "ingresses"),
        ),
        (
            "networkpolicies",
            ResourceId::grouped("networking.k8s.io", "v1", "networkpolicies"),
        ),
    ])
});

/// Well-known cluster-scoped plurals; everything else defaults to
/// namespace-scoped.
static CLUSTER_SCOPED: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "nodes",
        "namespaces",
        "persistentvolumes",
        "clusterroles",
        "clusterrolebindings",
        "customresourcedefinitions",
        "storageclasses",
        "priorityclasses",
        "csidrivers",
        "csinodes",
        "volumeattachments",
        "ingressclasses",
        "runtimeclasses",
    ])
});

/// Lower-cases a user-typed resource name and applies the alias table.
pub fn normalize(name: &str) -> String {
    let lower = name.to_ascii_lowercase();
    match ALIASES.get(lower.as_str()) {
        Some(canonical) => (*canonical).to_string(),
        None => lower,
    }
}

/// Resolves a normalized name against the builtin table, with the
/// well-known scope.
pub fn preferred(name: &str) -> Option<(ResourceId, ResourceScope)> {
    PREFERRED.get(name).map(|id| (id.clone(), known_scope(name)))
}

/// Scope of a well-known plural name.
pub fn known_scope(plural: &str) -> ResourceScope {
    if CLUSTER_SCOPED.contains(plural) {
        ResourceScope::Cluster
    } else {
        ResourceScope::Namespaced
    }
}

/// Looks a normalized name up in a discovered catalogue: `<plural>.<group>`
/// first for dotted input, then exact plural, short name, lower-cased kind.
pub fn find<'a>(catalog: &'a [ResourceDescriptor], name: &str) -> Option<&'a ResourceDescriptor> {
    if let Some((plural, group)) = name.split_once('.') {
        if let Some(d) = catalog
            .iter()
            .find(|d| d.id.plural == plural && d.id.group.eq_ignore_ascii_case(group))
        {
            return Some(d);
        }
        // Fall through: the dot may be part of an unusual plural.
    }

    if let Some(d) = catalog.iter().find(|d| d.id.plural == name) {
        return Some(d);
    }
    if let Some(d) = catalog
        .iter()
        .find(|d| d.short_names.iter().any(|s| s.eq_ignore_ascii_case(name)))
    {
        return Some(d);
    }
    catalog.iter().find(|d| d.kind.eq_ignore_ascii_case(name))
}

struct CatalogEntry {
    descriptors: Arc<Vec<ResourceDescriptor>>,
    last_access: Instant,
}

/// Per-endpoint cache of discovered catalogues.
#[derive(Default)]
pub struct DiscoveryCache {
    inner: RwLock<HashMap<String, CatalogEntry>>,
}

impl DiscoveryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the endpoint's catalogue, fetching it on first need. The
    /// lock is not held across the fetch.
    pub async fn catalog(&self, bundle: &ClientBundle) -> Result<Arc<Vec<ResourceDescriptor>>> {
        {
            let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
            if let Some(entry) = inner.get_mut(&bundle.endpoint) {
                entry.last_access = Instant::now();
                return Ok(Arc::clone(&entry.descriptors));
            }
        }

        let descriptors = Arc::new(fetch_catalog(bundle).await?);
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.insert(
            bundle.endpoint.clone(),
            CatalogEntry {
                descriptors: Arc::clone(&descriptors),
                last_access: Instant::now(),
            },
        );
        Ok(descriptors)
    }

    /// Evicts catalogues idle longer than `max_age`; returns a count.
    pub fn reap_idle(&self, max_age: Duration) -> usize {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let before = inner.len();
        inner.retain(|_, entry| entry.last_access.elapsed() < max_age);
        before - inner.len()
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.clear();
    }
}

/// Fetches an endpoint's full resource catalogue, keeping only entries
/// that are not sub-resources and advertise both `list` and `watch`.
async fn fetch_catalog(bundle: &ClientBundle) -> Result<Vec<ResourceDescriptor>> {
    let client = &bundle.client;
    let mut out = Vec::new();

    let core = client
        .list_core_api_versions()
        .await
        .context("failed to list core API versions")?;
    for version in &core.versions {
        match client.list_core_api_resources(version).await {
            Ok(list) => collect_resources("", version, &list, &mut out),
            Err(err) => warn!(version = %version, error = %err, "core resource discovery failed"),
        }
    }

    let groups = client
        .list_api_groups()
        .await
        .context("failed to list API groups")?;
    for group in &groups.groups {
        let Some(gv) = group
            .preferred_version
            .as_ref()
            .or_else(|| group.versions.first())
        else {
            continue;
        };
        let version = gv
            .group_version
            .split_once('/')
            .map(|(_, v)| v)
            .unwrap_or(gv.group_version.as_str());
        match client.list_api_group_resources(&gv.group_version).await {
            Ok(list) => collect_resources(&group.name, version, &list, &mut out),
            Err(err) => {
                // Aggregated APIs come and go; use what did resolve.
                warn!(group = %group.name, error = %err, "group resource discovery failed");
            }
        }
    }

    debug!(endpoint = %bundle.endpoint, count = out.len(), "discovered resources");
    Ok(out)
}

fn collect_resources(
    group: &str,
    version: &str,
    list: &APIResourceList,
    out: &mut Vec<ResourceDescriptor>,
) {
    for resource in &list.resources {
        if resource.name.contains('/') {
            continue; // sub-resource, e.g. pods/log
        }
        let verbs = &resource.verbs;
        if !verbs.iter().any(|v| v == "list") || !verbs.iter().any(|v| v == "watch") {
            continue;
        }
        let group = resource.group.as_deref().unwrap_or(group);
        let version = resource.version.as_deref().unwrap_or(version);
        out.push(ResourceDescriptor {
            id: ResourceId::grouped(group, version, &resource.name),
            kind: resource.kind.clone(),
            scope: if resource.namespaced {
                ResourceScope::Namespaced
            } else {
                ResourceScope::Cluster
            },
            short_names: resource.short_names.clone().unwrap_or_default(),
            verbs: verbs.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(
        group: &str,
        plural: &str,
        kind: &str,
        short: &[&str],
        scope: ResourceScope,
    ) -> ResourceDescriptor {
        ResourceDescriptor {
            id: ResourceId::grouped(group, "v1", plural),
            kind: kind.to_string(),
            scope,
            short_names: short.iter().map(|s| s.to_string()).collect(),
            verbs: vec!["list".into(), "watch".into()],
        }
    }

    #[test]
    fn aliases_normalize_to_canonical_names() {
        assert_eq!(normalize("po"), "pods");
        assert_eq!(normalize("Deploy"), "deployments");
        assert_eq!(normalize("app"), "applications.argoproj.io");
        assert_eq!(normalize("widgets.example.io"), "widgets.example.io");
    }

    #[test]
    fn builtins_resolve_without_discovery() {
        let (id, scope) = preferred("pods").unwrap();
        assert_eq!(id, ResourceId::core("v1", "pods"));
        assert_eq!(scope, ResourceScope::Namespaced);

        let (id, scope) = preferred("nodes").unwrap();
        assert_eq!(id, ResourceId::core("v1", "nodes"));
        assert_eq!(scope, ResourceScope::Cluster);

        let (id, _) = preferred("deployments").unwrap();
        assert_eq!(id.group, "apps");

        assert!(preferred("applications.argoproj.io").is_none());
    }

    #[test]
    fn catalog_lookup_order() {
        let catalog = vec![
            descriptor("example.io", "widgets", "Widget", &["wd"], ResourceScope::Namespaced),
            descriptor("other.io", "widgets", "Widget", &[], ResourceScope::Namespaced),
            descriptor(
                "argoproj.io",
                "applications",
                "Application",
                &["app"],
                ResourceScope::Namespaced,
            ),
        ];

        // Dotted input picks the matching group.
        let d = find(&catalog, "widgets.other.io").unwrap();
        assert_eq!(d.id.group, "other.io");

        // Exact plural match takes the first entry.
        let d = find(&catalog, "widgets").unwrap();
        assert_eq!(d.id.group, "example.io");

        // Short name and kind fall back.
        assert_eq!(find(&catalog, "wd").unwrap().id.plural, "widgets");
        assert_eq!(find(&catalog, "application").unwrap().id.group, "argoproj.io");

        assert!(find(&catalog, "gadgets").is_none());
    }

    #[test]
    fn dotted_alias_resolves_through_catalog() {
        let catalog = vec![descriptor(
            "argoproj.io",
            "applications",
            "Application",
            &["app"],
            ResourceScope::Namespaced,
        )];
        let name = normalize("app");
        assert!(preferred(&name).is_none());
        let d = find(&catalog, &name).unwrap();
        assert_eq!(d.id.qualified(), "applications.argoproj.io");
    }
}
