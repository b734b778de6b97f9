//! The firewall transition state machine
//!
//! [`FirewallGate`] owns the host's current [`FirewallMode`] and is the only
//! component allowed to change it. A single exclusive lock serializes every
//! operation, including the synchronous call into the [`RuleApplier`], so no
//! two rule applications can ever run concurrently and status reads never
//! observe a torn state.
//!
//! # Transitions
//!
//! | State                     | request_maintenance         | request_production | finalizer fires              |
//! |---------------------------|-----------------------------|--------------------|------------------------------|
//! | `Production`              | → `TransitionToMaintenance` | rejected           | n/a                          |
//! | `Maintenance`             | rejected                    | → `Production`     | n/a                          |
//! | `TransitionToMaintenance` | rejected                    | rejected           | → `Maintenance` or reverted  |
//!
//! The maintenance path goes through an intermediate window: the transition
//! rule-set is applied immediately and a deferred finalizer completes the move
//! after `transition_duration`. Once scheduled, the finalizer always runs;
//! there is no cancellation.
//!
//! # Failure policy
//!
//! Every failed rule application is compensated by re-applying the rule-set of
//! the mode the host was in. Compensation success leaves the host in a known
//! mode and surfaces as [`Error::TransitionFailed`]. Compensation failure
//! means the packet-filter state is unknown: the gate signals the fatal
//! channel and the supervisor halts the process, relying on external restart
//! into the safe maintenance default.

use crate::audit::{AuditEvent, AuditLog, EventType};
use crate::core::applier::RuleApplier;
use crate::core::error::{Error, Result};
use crate::core::mode::FirewallMode;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Immutable transition timing configuration
#[derive(Debug, Clone, Copy)]
pub struct TransitionConfig {
    /// How long the intermediate window is held before the deferred
    /// finalizer completes the move to maintenance
    pub transition_duration: Duration,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            transition_duration: Duration::from_secs(300),
        }
    }
}

/// The mutable core state, only ever touched under the gate's lock
struct TransitionState {
    mode: FirewallMode,
    /// Set iff `mode == TransitionToMaintenance`
    transition_started_at: Option<DateTime<Utc>>,
}

/// Serialized tri-state firewall mode switch
pub struct FirewallGate {
    state: Mutex<TransitionState>,
    applier: Arc<dyn RuleApplier>,
    config: TransitionConfig,
    fatal_tx: mpsc::UnboundedSender<String>,
    audit: Option<AuditLog>,
    /// Handle of the most recently scheduled finalizer. Kept so graceful
    /// shutdown can wait for an in-flight transition window; never aborted.
    finalizer: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl FirewallGate {
    /// Creates a gate in the safe `Maintenance` default.
    ///
    /// `fatal_tx` is the supervisor's channel: a message on it means the
    /// firewall state is unknown and the process must exit.
    pub fn new(
        applier: Arc<dyn RuleApplier>,
        config: TransitionConfig,
        fatal_tx: mpsc::UnboundedSender<String>,
        audit: Option<AuditLog>,
    ) -> Self {
        Self {
            state: Mutex::new(TransitionState {
                mode: FirewallMode::Maintenance,
                transition_started_at: None,
            }),
            applier,
            config,
            fatal_tx,
            audit,
            finalizer: std::sync::Mutex::new(None),
        }
    }

    /// Current mode. Side-effect free; serialized with transitions by the
    /// same lock, so it never observes a half-applied change.
    pub async fn status(&self) -> FirewallMode {
        self.state.lock().await.mode
    }

    /// Applies the rule-set of the current (initial) mode so the kernel
    /// packet filter agrees with the reported state. Called once at startup,
    /// before the HTTP surface is served.
    pub async fn apply_initial_mode(&self) -> Result<()> {
        let state = self.state.lock().await;
        self.applier.apply(state.mode).await
    }

    /// Requests the move `Production` → `TransitionToMaintenance`.
    ///
    /// On success the transition rule-set is active, the intermediate mode is
    /// recorded and a deferred finalizer is scheduled to complete the move to
    /// `Maintenance` after the configured window.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidTransition`] if the current mode is not `Production`
    ///   (state unchanged).
    /// - [`Error::TransitionFailed`] if rule application failed and the
    ///   compensating revert to production succeeded.
    /// - [`Error::Unrecoverable`] if the revert also failed; the fatal
    ///   channel is signalled and the process is expected to halt.
    pub async fn request_maintenance(self: Arc<Self>) -> Result<()> {
        let mut state = self.state.lock().await;

        if state.mode != FirewallMode::Production {
            return Err(Error::InvalidTransition {
                from: state.mode,
                requested: FirewallMode::TransitionToMaintenance,
            });
        }

        let transition_id = Uuid::new_v4();
        info!(%transition_id, "maintenance transition requested");

        if let Err(err) = self.applier.apply(FirewallMode::TransitionToMaintenance).await {
            warn!(%transition_id, "transition rule-set failed, reverting to production: {err}");

            if let Err(revert_err) = self.applier.apply(FirewallMode::Production).await {
                return Err(self
                    .fatal(format!(
                        "could not revert to production after failed maintenance transition: {revert_err}"
                    ))
                    .await);
            }

            // Reverted; still in production.
            self.record(
                EventType::RequestMaintenance,
                false,
                json!({ "transition_id": transition_id, "mode": state.mode }),
                Some(err.to_string()),
            )
            .await;
            return Err(Error::TransitionFailed {
                target: FirewallMode::TransitionToMaintenance,
                reason: err.to_string(),
            });
        }

        state.transition_started_at = Some(Utc::now());
        state.mode = FirewallMode::TransitionToMaintenance;

        let gate = Arc::clone(&self);
        let delay = self.config.transition_duration;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            gate.finalize_transition(transition_id).await;
        });
        *self.finalizer.lock().expect("finalizer mutex poisoned") = Some(handle);

        info!(
            %transition_id,
            window_secs = delay.as_secs(),
            "entered transition window, finalizer scheduled"
        );
        self.record(
            EventType::RequestMaintenance,
            true,
            json!({ "transition_id": transition_id, "mode": state.mode }),
            None,
        )
        .await;
        Ok(())
    }

    /// Requests the move `Maintenance` → `Production`.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`Self::request_maintenance`]: a failed apply with a
    /// successful compensating re-apply of the maintenance rule-set is
    /// [`Error::TransitionFailed`] (the host stays in maintenance); a failed
    /// compensation is [`Error::Unrecoverable`].
    pub async fn request_production(&self) -> Result<()> {
        let mut state = self.state.lock().await;

        if state.mode != FirewallMode::Maintenance {
            return Err(Error::InvalidTransition {
                from: state.mode,
                requested: FirewallMode::Production,
            });
        }

        let transition_id = Uuid::new_v4();
        info!(%transition_id, "production transition requested");

        if let Err(err) = self.applier.apply(FirewallMode::Production).await {
            warn!(%transition_id, "production rule-set failed, re-applying maintenance: {err}");

            if let Err(revert_err) = self.applier.apply(FirewallMode::Maintenance).await {
                return Err(self
                    .fatal(format!(
                        "could not re-apply maintenance after failed production transition: {revert_err}"
                    ))
                    .await);
            }

            self.record(
                EventType::RequestProduction,
                false,
                json!({ "transition_id": transition_id, "mode": state.mode }),
                Some(err.to_string()),
            )
            .await;
            return Err(Error::TransitionFailed {
                target: FirewallMode::Production,
                reason: err.to_string(),
            });
        }

        state.mode = FirewallMode::Production;
        info!(%transition_id, "production mode active");
        self.record(
            EventType::RequestProduction,
            true,
            json!({ "transition_id": transition_id, "mode": state.mode }),
            None,
        )
        .await;
        Ok(())
    }

    /// Body of the deferred finalizer. Runs exactly once per scheduled
    /// transition, after the window elapses, and re-acquires the lock before
    /// touching state.
    async fn finalize_transition(self: Arc<Self>, transition_id: Uuid) {
        let mut state = self.state.lock().await;

        if state.mode != FirewallMode::TransitionToMaintenance {
            // Nothing else may leave the intermediate state; if it changed,
            // the state was mutated underneath us.
            let _ = self
                .fatal(format!(
                    "finalizer fired in {} mode, transition state invariant violated",
                    state.mode
                ))
                .await;
            return;
        }

        match self.applier.apply(FirewallMode::Maintenance).await {
            Ok(()) => {
                state.mode = FirewallMode::Maintenance;
                state.transition_started_at = None;
                info!(%transition_id, "maintenance mode active");
                self.record(
                    EventType::FinalizeMaintenance,
                    true,
                    json!({ "transition_id": transition_id, "mode": state.mode }),
                    None,
                )
                .await;
            }
            Err(err) => {
                error!(%transition_id, "failed to apply maintenance rule-set: {err}");

                // Try to revert back to production. The original requester is
                // long gone; this is a purely background correction.
                match self.applier.apply(FirewallMode::Production).await {
                    Ok(()) => {
                        state.mode = FirewallMode::Production;
                        state.transition_started_at = None;
                        warn!(%transition_id, "transition reverted, production mode active again");
                        self.record(
                            EventType::RevertToProduction,
                            true,
                            json!({ "transition_id": transition_id, "mode": state.mode }),
                            Some(err.to_string()),
                        )
                        .await;
                    }
                    Err(revert_err) => {
                        let _ = self
                            .fatal(format!(
                                "could not revert to production after failed maintenance finalization: {revert_err}"
                            ))
                            .await;
                    }
                }
            }
        }
    }

    /// Waits for the most recently scheduled finalizer, if any. Used by
    /// graceful shutdown so a transition window is never cut short.
    pub async fn await_pending_finalizer(&self) {
        let handle = self
            .finalizer
            .lock()
            .expect("finalizer mutex poisoned")
            .take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                error!("finalizer task failed: {err}");
            }
        }
    }

    /// Signals the supervisor that the firewall state is unknown and returns
    /// the matching error. The supervisor halts the process; this function
    /// never does so itself, which keeps the contract testable.
    async fn fatal(&self, reason: String) -> Error {
        error!("unrecoverable firewall state: {reason}");
        self.record(
            EventType::Unrecoverable,
            false,
            json!({}),
            Some(reason.clone()),
        )
        .await;
        let _ = self.fatal_tx.send(reason.clone());
        Error::Unrecoverable(reason)
    }

    /// Best-effort audit write; failures are logged and never affect the
    /// transition outcome.
    async fn record(
        &self,
        event_type: EventType,
        success: bool,
        details: serde_json::Value,
        error: Option<String>,
    ) {
        if let Some(audit) = &self.audit {
            let event = AuditEvent::new(event_type, success, details, error);
            if let Err(err) = audit.log(event).await {
                warn!("failed to write audit event: {err}");
            }
        }
    }
}
