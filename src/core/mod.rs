//! Core firewall transition logic
//!
//! This module contains the state machine and its collaborators:
//!
//! - [`mode`]: the tri-state firewall mode and its stable string tokens
//! - [`gate`]: the serialized transition state machine and deferred finalizer
//! - [`applier`]: the rule-applier seam and the nftables implementation
//! - [`error`]: error taxonomy for transition operations

pub mod applier;
pub mod error;
pub mod gate;
pub mod mode;

#[cfg(test)]
pub mod test_helpers;
