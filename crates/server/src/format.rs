//! Tab-separated record formatting for the fuzzy-finder front-end.
//!
//! Column sets come from the config; the first column is always the
//! object's name under the default sets. Namespace columns pad but never
//! truncate so all-namespaces completion keeps the full value.

use crate::config::Config;
use kompl_core::paths;
use kompl_core::CachedObject;
use std::sync::Arc;

pub struct Formatter {
    config: Arc<Config>,
}

impl Formatter {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// Renders one tab-separated record per object, newline-joined with
    /// no trailing newline.
    pub fn format(&self, resources: &[Arc<CachedObject>], resource_type: &str) -> String {
        if resources.is_empty() {
            return String::new();
        }
        let columns = &self.config.resource_config(resource_type).columns;

        let mut out = String::with_capacity(resources.len() * 96);
        for (i, res) in resources.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            for (j, col) in columns.iter().enumerate() {
                if j > 0 {
                    out.push('\t');
                }
                let mut value = paths::extract_field(&res.raw, &col.field, res.creation_ts);
                if col.width > 0 {
                    if col.field == ".metadata.namespace" {
                        value = pad_only(value, col.width);
                    } else {
                        value = truncate_or_pad(value, col.width);
                    }
                }
                out.push_str(&value);
            }
        }
        out
    }
}

fn pad_only(mut s: String, width: usize) -> String {
    while s.chars().count() < width {
        s.push(' ');
    }
    s
}

fn truncate_or_pad(s: String, width: usize) -> String {
    let len = s.chars().count();
    if len > width {
        let mut truncated: String = s.chars().take(width.saturating_sub(3)).collect();
        truncated.push_str("...");
        truncated
    } else {
        pad_only(s, width)
    }
}
