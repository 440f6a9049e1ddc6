//! Dracin - multi-provider drama catalog gateway
//!
//! This library crate exposes the gateway internals for integration testing:
//! the request governor, provider adapters and their registry, provider
//! selection, the key-value store, and the HTTP router.

pub mod config;
pub mod debounce;
pub mod governor;
pub mod providers;
pub mod selection;
pub mod server;
pub mod store;
