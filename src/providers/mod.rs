//! Upstream provider adapters.
//!
//! Every upstream is one [`ProviderAdapter`] implementation built from its
//! [`ProviderConfig`](crate::config::ProviderConfig). Adding a provider means
//! adding a config entry and registering one constructor in the
//! [`AdapterRegistry`]; the governor is untouched.

pub mod adapter;
pub mod dramabos;
pub mod gimita;
pub mod health;
pub mod paxsenix;
pub mod registry;
pub mod sansekai;
pub mod url;

pub use adapter::{
    operation_for_action, sanitize_keyword, AdapterCore, ProviderAdapter, ProxyParams,
    DEFAULT_PAGE_SIZE, MAX_KEYWORD_CHARS,
};
pub use dramabos::DramabosAdapter;
pub use gimita::GimitaAdapter;
pub use health::{probe, probe_all, record_probes, ProbeResult};
pub use paxsenix::PaxsenixAdapter;
pub use registry::{AdapterConstructor, AdapterRegistry};
pub use sansekai::SansekaiAdapter;
