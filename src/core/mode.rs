//! Firewall operating modes
//!
//! A host is always in exactly one of three packet-filtering modes. The modes
//! map one-to-one onto static nftables rule-set files; the string tokens are
//! stable and are what `/firewall/status` returns.

use serde::{Deserialize, Serialize};

/// Packet-filtering mode of the host
///
/// Only specific transition edges between modes are legal; see
/// [`crate::core::gate::FirewallGate`]. `Copy` trait allows efficient passing
/// by value for this small enum.
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
pub enum FirewallMode {
    /// Isolated mode: only management traffic is admitted. Safe default on
    /// process start.
    #[strum(serialize = "maintenance")]
    Maintenance,
    /// Normal serving mode.
    #[strum(serialize = "production")]
    Production,
    /// Intermediate window on the way from production to maintenance, held
    /// until the deferred finalizer fires.
    #[strum(serialize = "transition_to_maintenance")]
    TransitionToMaintenance,
}

impl FirewallMode {
    /// Returns the stable lowercase token as a static string
    pub const fn as_str(self) -> &'static str {
        match self {
            FirewallMode::Maintenance => "maintenance",
            FirewallMode::Production => "production",
            FirewallMode::TransitionToMaintenance => "transition_to_maintenance",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_mode_tokens_are_stable() {
        assert_eq!(FirewallMode::Maintenance.as_str(), "maintenance");
        assert_eq!(FirewallMode::Production.as_str(), "production");
        assert_eq!(
            FirewallMode::TransitionToMaintenance.as_str(),
            "transition_to_maintenance"
        );
    }

    #[test]
    fn test_display_matches_as_str() {
        for mode in FirewallMode::iter() {
            assert_eq!(mode.to_string(), mode.as_str());
        }
    }

    #[test]
    fn test_parse_round_trip() {
        for mode in FirewallMode::iter() {
            assert_eq!(FirewallMode::from_str(mode.as_str()).unwrap(), mode);
        }
        assert!(FirewallMode::from_str("unknown").is_err());
    }
}
