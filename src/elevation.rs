//! Privilege elevation for nftables invocations
//!
//! fwgate is normally started as root by the process supervisor, in which case
//! `nft` is executed directly. When running unprivileged (development,
//! integration environments) the command is wrapped in an elevation helper:
//!
//! - **Preferred**: `run0` when available (systemd v256+, no SUID)
//! - **Fallback**: `sudo`
//!
//! # Environment Variables
//!
//! - `FWGATE_ELEVATION_METHOD`: Force a specific elevation method (`sudo` or
//!   `run0`). Useful for scripts with sudoers NOPASSWD rules.
//!
//! - `FWGATE_NFT_COMMAND`: Replace the `nft` binary with another program.
//!   Tests point this at a mock script so they never touch real nftables.
//!
//! - `FWGATE_TEST_NO_ELEVATION`: Bypass elevation entirely (for testing only).
//!
//! # Security
//!
//! Only `nft` (or its configured replacement) can be elevated, and arguments
//! are passed directly without shell interpolation.

use std::io;
use tokio::process::Command;

/// Error type for privilege elevation operations
#[derive(Debug, thiserror::Error)]
pub enum ElevationError {
    /// Requested elevation method is not available (binary not found)
    #[error("elevation method '{0}' is not available (binary not found)")]
    MethodNotAvailable(String),

    /// Invalid value for `FWGATE_ELEVATION_METHOD`
    #[error("invalid FWGATE_ELEVATION_METHOD '{0}'. Valid options: sudo, run0")]
    InvalidMethod(String),

    /// Neither run0 nor sudo is installed
    #[error("no elevation helper found - install run0 (systemd) or sudo, or run as root")]
    NoHelperAvailable,

    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Checks if a binary exists in PATH
fn binary_exists(name: &str) -> bool {
    std::env::var_os("PATH")
        .and_then(|paths| {
            std::env::split_paths(&paths).find_map(|dir| {
                let full_path = dir.join(name);
                if full_path.is_file() {
                    Some(full_path)
                } else {
                    None
                }
            })
        })
        .is_some()
}

/// Resolves the nft program, honoring the `FWGATE_NFT_COMMAND` test override.
fn nft_program() -> String {
    std::env::var("FWGATE_NFT_COMMAND").unwrap_or_else(|_| "nft".to_string())
}

/// Builds an elevated command for the nft program.
fn build_elevated_command(program: &str, args: &[&str]) -> Result<Command, ElevationError> {
    // 1. Strict test mode override (highest priority)
    if std::env::var("FWGATE_TEST_NO_ELEVATION").is_ok() {
        let mut cmd = Command::new(program);
        cmd.args(args);
        return Ok(cmd);
    }

    // 2. Direct root execution (no helper needed)
    if nix::unistd::getuid().is_root() {
        let mut cmd = Command::new(program);
        cmd.args(args);
        return Ok(cmd);
    }

    // 3. Explicit elevation method override (for scripts with sudoers NOPASSWD, etc.)
    if let Ok(method) = std::env::var("FWGATE_ELEVATION_METHOD") {
        let method = method.to_lowercase();
        if !method.is_empty() {
            return match method.as_str() {
                "sudo" | "run0" => {
                    if !binary_exists(&method) {
                        return Err(ElevationError::MethodNotAvailable(method));
                    }
                    let mut cmd = Command::new(&method);
                    cmd.arg(program).args(args);
                    Ok(cmd)
                }
                _ => Err(ElevationError::InvalidMethod(method)),
            };
        }
    }

    // 4. Automatic detection - prefer run0 (modern, no SUID), fallback to sudo
    if binary_exists("run0") {
        let mut cmd = Command::new("run0");
        cmd.arg(program).args(args);
        return Ok(cmd);
    }

    if binary_exists("sudo") {
        let mut cmd = Command::new("sudo");
        cmd.arg(program).args(args);
        return Ok(cmd);
    }

    Err(ElevationError::NoHelperAvailable)
}

/// Creates an elevated `nft` command with the specified arguments
///
/// Arguments are passed directly to `nft` without shell interpretation.
/// Callers must ensure arguments are properly validated before calling this
/// function.
///
/// # Errors
///
/// Returns `Err` if the configured elevation method or any elevation helper
/// is unavailable.
pub fn create_elevated_nft_command(args: &[&str]) -> Result<Command, ElevationError> {
    build_elevated_command(&nft_program(), args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_helpers::ENV_VAR_MUTEX;

    #[test]
    fn test_binary_exists() {
        // sh should exist on all Unix systems
        assert!(binary_exists("sh"));
        assert!(!binary_exists("fwgate_nonexistent_binary_xyz"));
    }

    #[tokio::test]
    async fn test_create_nft_command_test_mode() {
        let _guard = ENV_VAR_MUTEX.lock().unwrap();

        unsafe {
            std::env::set_var("FWGATE_TEST_NO_ELEVATION", "1");
        }

        let cmd = create_elevated_nft_command(&["--check", "-f", "/dev/null"]);
        assert!(cmd.is_ok());

        unsafe {
            std::env::remove_var("FWGATE_TEST_NO_ELEVATION");
        }
    }

    #[test]
    fn test_invalid_elevation_method() {
        let _guard = ENV_VAR_MUTEX.lock().unwrap();

        unsafe {
            std::env::remove_var("FWGATE_TEST_NO_ELEVATION");
            std::env::set_var("FWGATE_ELEVATION_METHOD", "doas");
        }

        let result = create_elevated_nft_command(&["-f", "/dev/null"]);

        unsafe {
            std::env::remove_var("FWGATE_ELEVATION_METHOD");
        }

        // Root skips the method lookup entirely, so only assert when unprivileged
        if !nix::unistd::getuid().is_root() {
            assert!(matches!(result, Err(ElevationError::InvalidMethod(_))));
        }
    }

    #[test]
    fn test_elevation_method_case_insensitive() {
        let _guard = ENV_VAR_MUTEX.lock().unwrap();

        unsafe {
            std::env::remove_var("FWGATE_TEST_NO_ELEVATION");
            std::env::set_var("FWGATE_ELEVATION_METHOD", "SUDO");
        }

        let result = create_elevated_nft_command(&["-f", "/dev/null"]);

        unsafe {
            std::env::remove_var("FWGATE_ELEVATION_METHOD");
        }

        // Should succeed (sudo exists) or fail with MethodNotAvailable,
        // but never InvalidMethod
        assert!(!matches!(result, Err(ElevationError::InvalidMethod(_))));
    }

    #[test]
    fn test_nft_program_override() {
        let _guard = ENV_VAR_MUTEX.lock().unwrap();

        unsafe {
            std::env::set_var("FWGATE_NFT_COMMAND", "/usr/local/bin/fake-nft");
        }
        assert_eq!(nft_program(), "/usr/local/bin/fake-nft");

        unsafe {
            std::env::remove_var("FWGATE_NFT_COMMAND");
        }
        assert_eq!(nft_program(), "nft");
    }
}
