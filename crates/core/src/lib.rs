//! Core types shared by the kompl crates: resource identifiers, cached
//! objects, and nested-path value extraction.

#![forbid(unsafe_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

pub mod paths;

/// Reserved store bucket for objects that carry no namespace.
pub const CLUSTER_BUCKET: &str = "_cluster";

/// Addresses one upstream resource collection as a (group, version,
/// plural) triple. `pods` in the core group is `("", "v1", "pods")`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId {
    pub group: String,
    pub version: String,
    pub plural: String,
}

impl ResourceId {
    pub fn core(version: &str, plural: &str) -> Self {
        Self {
            group: String::new(),
            version: version.to_string(),
            plural: plural.to_string(),
        }
    }

    pub fn grouped(group: &str, version: &str, plural: &str) -> Self {
        Self {
            group: group.to_string(),
            version: version.to_string(),
            plural: plural.to_string(),
        }
    }

    /// `plural.group` for grouped resources, bare plural for the core group.
    pub fn qualified(&self) -> String {
        if self.group.is_empty() {
            self.plural.clone()
        } else {
            format!("{}.{}", self.plural, self.group)
        }
    }

    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}/{}", self.version, self.plural)
        } else {
            write!(f, "{}/{}/{}", self.group, self.version, self.plural)
        }
    }
}

/// Whether objects of a resource carry a namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceScope {
    Cluster,
    Namespaced,
}

impl ResourceScope {
    pub fn is_namespaced(self) -> bool {
        matches!(self, ResourceScope::Namespaced)
    }
}

/// A mirrored upstream object. The raw value tree is stored as received
/// (after pruning); callers must not mutate it after insertion.
#[derive(Debug, Clone)]
pub struct CachedObject {
    pub name: String,
    /// Empty iff the object is cluster-scoped.
    pub namespace: String,
    pub id: ResourceId,
    pub creation_ts: Option<DateTime<Utc>>,
    pub raw: Value,
}

impl CachedObject {
    /// Builds a cached object from a raw value tree, extracting the
    /// mandatory metadata attributes. Returns `None` when the object has
    /// no non-empty `.metadata.name`.
    pub fn from_raw(id: ResourceId, raw: Value) -> Option<Self> {
        let meta = raw.get("metadata")?;
        let name = meta.get("name")?.as_str()?.to_string();
        if name.is_empty() {
            return None;
        }
        let namespace = meta
            .get("namespace")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        let creation_ts = meta
            .get("creationTimestamp")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));
        Some(Self {
            name,
            namespace,
            id,
            creation_ts,
            raw,
        })
    }

    /// Store bucket for this object: its namespace, or the reserved
    /// cluster bucket when the namespace is empty.
    pub fn bucket(&self) -> &str {
        if self.namespace.is_empty() {
            CLUSTER_BUCKET
        } else {
            &self.namespace
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cached_object_extracts_metadata() {
        let raw = json!({
            "metadata": {
                "name": "web-0",
                "namespace": "prod",
                "creationTimestamp": "2024-03-01T12:00:00Z",
            }
        });
        let obj = CachedObject::from_raw(ResourceId::core("v1", "pods"), raw).unwrap();
        assert_eq!(obj.name, "web-0");
        assert_eq!(obj.namespace, "prod");
        assert_eq!(obj.bucket(), "prod");
        assert!(obj.creation_ts.is_some());
    }

    #[test]
    fn cluster_scoped_object_uses_reserved_bucket() {
        let raw = json!({ "metadata": { "name": "node-a" } });
        let obj = CachedObject::from_raw(ResourceId::core("v1", "nodes"), raw).unwrap();
        assert_eq!(obj.namespace, "");
        assert_eq!(obj.bucket(), CLUSTER_BUCKET);
        assert!(obj.creation_ts.is_none());
    }

    #[test]
    fn object_without_name_is_rejected() {
        assert!(CachedObject::from_raw(
            ResourceId::core("v1", "pods"),
            json!({ "metadata": { "namespace": "x" } })
        )
        .is_none());
        assert!(CachedObject::from_raw(ResourceId::core("v1", "pods"), json!({})).is_none());
    }

    #[test]
    fn qualified_names() {
        assert_eq!(ResourceId::core("v1", "pods").qualified(), "pods");
        assert_eq!(
            ResourceId::grouped("apps", "v1", "deployments").qualified(),
            "deployments.apps"
        );
        assert_eq!(
            ResourceId::grouped("apps", "v1", "deployments").api_version(),
            "apps/v1"
        );
    }
}
