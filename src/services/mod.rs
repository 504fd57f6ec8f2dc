//! Service layer
//!
//! Bundles the engine components into a session object so callers (the CLI,
//! or a library consumer) deal with one handle instead of wiring caches and
//! executors themselves.

pub mod argocd_service;

pub use argocd_service::{ArgoCdService, ServiceCacheStats};
