//! tabcap-host: host IO boundary.
//! Implements the host-adapter trait by invoking a host-provided helper
//! executable, one short-lived subprocess per query. No policy logic
//! lives here.

pub mod bridge;

pub use bridge::{HostCommandBridge, parse_flag_reply};
