//! Upstream plumbing: per-endpoint client bundles, resource discovery
//! with the alias table, and the list-then-watch manager feeding the
//! store.

#![forbid(unsafe_code)]

pub mod client;
pub mod discovery;
pub mod watch;

pub use client::{ClientBundle, ClientCache};
pub use discovery::{DiscoveryCache, ResourceDescriptor};
pub use watch::WatchManager;
