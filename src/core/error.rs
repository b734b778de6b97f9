use crate::core::mode::FirewallMode;
use thiserror::Error;

/// Core error types for fwgate
#[derive(Debug, Error)]
pub enum Error {
    /// Requested transition is not legal from the current mode
    #[error("invalid transition to {requested} requested while in {from} mode")]
    InvalidTransition {
        from: FirewallMode,
        requested: FirewallMode,
    },

    /// Rule application failed but the compensating revert succeeded; the
    /// host is still in its previous known-good mode
    #[error("could not transition to {target}: {reason}")]
    TransitionFailed {
        target: FirewallMode,
        reason: String,
    },

    /// Rule application failed and the compensating revert also failed, or an
    /// invariant was violated. The firewall state is unknown and the process
    /// must halt.
    #[error("unrecoverable firewall state: {0}")]
    Unrecoverable(String),

    /// nftables command execution failed
    #[error("nftables error: {message}")]
    Nftables {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    /// Privilege escalation failed
    #[error("elevation error: {0}")]
    Elevation(#[from] crate::elevation::ElevationError),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_transition_message_names_both_modes() {
        let err = Error::InvalidTransition {
            from: FirewallMode::Maintenance,
            requested: FirewallMode::TransitionToMaintenance,
        };
        let msg = err.to_string();
        assert!(msg.contains("transition_to_maintenance"));
        assert!(msg.contains("maintenance mode"));
    }

    #[test]
    fn test_transition_failed_carries_reason() {
        let err = Error::TransitionFailed {
            target: FirewallMode::Production,
            reason: "nft exited with status 1".to_string(),
        };
        assert!(err.to_string().contains("nft exited with status 1"));
    }
}
