//! fwgate - firewall mode gate
//!
//! A control-plane daemon that switches a host between an isolated
//! maintenance mode and a normal production mode by applying static nftables
//! rule-set files, with all transitions serialized through a single state
//! machine.
//!
//! # Architecture
//!
//! - [`core`] - Transition state machine, rule applier and error taxonomy
//! - [`http`] - The `/firewall/*` axum surface
//! - [`elevation`] - Privileged `nft` invocation (run0/sudo/root)
//! - [`audit`] - JSON-lines audit trail of privileged transitions
//! - [`config`] - Configuration persistence
//! - [`utils`] - XDG directory helpers
//!
//! # Safety Features
//!
//! - One exclusive lock serializes every mode change and status read
//! - Failed rule applications are compensated back to the previous mode
//! - A failed compensation halts the process instead of serving with an
//!   unknown packet-filter state (external supervision restarts into the
//!   maintenance default)
//! - `nft --check` preflight of all rule-set files before serving

// Allow pedantic clippy warnings that are not worth fixing for this codebase
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::missing_errors_doc)]

pub mod audit;
pub mod config;
pub mod core;
pub mod elevation;
pub mod http;
pub mod utils;

// Re-export commonly used types
pub use crate::core::error::{Error, Result};
pub use crate::core::gate::{FirewallGate, TransitionConfig};
pub use crate::core::mode::FirewallMode;
