//! tabcap-core: pure tab-limit decision core.
//! Open-tab registry, limit configuration, the eviction policy, and the
//! host-adapter boundary. No IO and no async: timestamps arrive as
//! arguments, host facts arrive through the adapter trait.

pub mod config;
pub mod host;
pub mod policy;
pub mod registry;
pub mod types;

pub use config::{DEFAULT_MAX_TABS, TabLimit};
pub use host::{HostAdapter, HostError};
pub use policy::{EvictionOutcome, Victim, evaluate};
pub use registry::TabRegistry;
pub use types::{EventKind, TabEvent, TabHandle, TabRecord};
