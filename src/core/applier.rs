//! Rule application against the external nftables engine
//!
//! The state machine never talks to nftables directly; it goes through the
//! [`RuleApplier`] trait so tests can substitute a stub. The production
//! implementation, [`NftApplier`], maps each [`FirewallMode`] to exactly one
//! static rule-set file and runs `nft -f <path>` through the elevation layer.
//!
//! Applying a rule-set is idempotent: the files are complete rule-sets that
//! replace the active configuration, so re-applying the current mode is safe.
//! The caller guarantees the call is never concurrent (it holds the gate's
//! exclusive lock for the full duration).

use crate::core::error::{Error, Result};
use crate::core::mode::FirewallMode;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Seam between the transition state machine and the firewall engine
#[async_trait]
pub trait RuleApplier: Send + Sync {
    /// Synchronously applies the rule-set corresponding to `mode`.
    ///
    /// # Errors
    ///
    /// Returns `Err` with the engine's diagnostic output if the rule-set
    /// could not be applied.
    async fn apply(&self, mode: FirewallMode) -> Result<()>;
}

/// One rule-set file per firewall mode
#[derive(Debug, Clone)]
pub struct RulesetPaths {
    pub maintenance: PathBuf,
    pub production: PathBuf,
    pub transition: PathBuf,
}

impl Default for RulesetPaths {
    fn default() -> Self {
        Self {
            maintenance: PathBuf::from("/etc/nftables-maintenance.conf"),
            production: PathBuf::from("/etc/nftables-production.conf"),
            transition: PathBuf::from("/etc/nftables-transition.conf"),
        }
    }
}

impl RulesetPaths {
    /// Returns the rule-set file for a mode. Total: every mode has exactly
    /// one rule-set.
    pub fn for_mode(&self, mode: FirewallMode) -> &Path {
        match mode {
            FirewallMode::Maintenance => &self.maintenance,
            FirewallMode::Production => &self.production,
            FirewallMode::TransitionToMaintenance => &self.transition,
        }
    }
}

/// Applies rule-set files with `nft -f`
pub struct NftApplier {
    rulesets: RulesetPaths,
}

impl NftApplier {
    pub fn new(rulesets: RulesetPaths) -> Self {
        Self { rulesets }
    }

    /// Runs the elevated nft command and converts a non-zero exit into a
    /// structured error carrying the engine's diagnostics.
    async fn run_nft(&self, args: &[&str]) -> Result<()> {
        let output = crate::elevation::create_elevated_nft_command(args)?
            .output()
            .await
            .map_err(|e| {
                error!("failed to spawn elevated nft: {e}");
                Error::Io(e)
            })?;

        if output.status.success() {
            return Ok(());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        error!(
            exit_code = output.status.code(),
            stdout = %stdout.trim(),
            stderr = %stderr.trim(),
            "could not apply nftables configuration"
        );

        Err(Error::Nftables {
            message: format!("nft {} failed", args.join(" ")),
            stderr: Some(stderr.into_owned()),
            exit_code: output.status.code(),
        })
    }

    /// Checks a single mode's rule-set with `nft --check -f` without
    /// touching the active configuration.
    pub async fn check(&self, mode: FirewallMode) -> Result<()> {
        let path = self.rulesets.for_mode(mode);
        let path_str = path.to_string_lossy();
        info!(mode = mode.as_str(), ruleset = %path_str, "checking nftables rule-set");
        self.run_nft(&["--check", "-f", &path_str]).await
    }

    /// Startup preflight: checks all three rule-set files.
    ///
    /// # Errors
    ///
    /// Returns the first check failure; the server must not start serving
    /// with a rule-set it cannot apply later.
    pub async fn check_all(&self) -> Result<()> {
        use strum::IntoEnumIterator;
        for mode in FirewallMode::iter() {
            self.check(mode).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl RuleApplier for NftApplier {
    async fn apply(&self, mode: FirewallMode) -> Result<()> {
        let path = self.rulesets.for_mode(mode);
        let path_str = path.to_string_lossy();
        info!(mode = mode.as_str(), ruleset = %path_str, "applying nftables rule-set");
        self.run_nft(&["-f", &path_str]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ruleset_paths() {
        let paths = RulesetPaths::default();
        assert_eq!(
            paths.for_mode(FirewallMode::Maintenance),
            Path::new("/etc/nftables-maintenance.conf")
        );
        assert_eq!(
            paths.for_mode(FirewallMode::Production),
            Path::new("/etc/nftables-production.conf")
        );
        assert_eq!(
            paths.for_mode(FirewallMode::TransitionToMaintenance),
            Path::new("/etc/nftables-transition.conf")
        );
    }

    #[test]
    fn test_every_mode_has_a_ruleset() {
        use strum::IntoEnumIterator;
        let paths = RulesetPaths::default();
        for mode in FirewallMode::iter() {
            assert!(!paths.for_mode(mode).as_os_str().is_empty());
        }
    }
}
