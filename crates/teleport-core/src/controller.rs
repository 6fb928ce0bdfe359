//! Install and remove the tunnel service.
//!
//! Activation is remove-then-install, so it is idempotent and doubles as the
//! update path after a config refresh. Deactivation waits for the service to
//! disappear, within a bounded budget.

use std::path::Path;
use std::time::Duration;

use crate::clock::{Clock, Wake};
use crate::config::DeactivatePolicy;
use crate::error::{Error, Result};
use crate::service::ServiceManager;
use crate::status::{StatusMonitor, TunnelRuntimeState};

/// Outcome of a successful [`TunnelController::deactivate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deactivation {
    /// The service was removed and is no longer reported.
    Confirmed,
    /// Removal was accepted but the service was still reported when the
    /// wait budget ran out.
    Unconfirmed,
    /// There was no service to remove.
    NotActive,
}

/// How long to wait for a removed service to disappear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_wait: Duration,
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        (&DeactivatePolicy::default()).into()
    }
}

impl From<&DeactivatePolicy> for PollPolicy {
    fn from(policy: &DeactivatePolicy) -> Self {
        Self {
            max_wait: policy.max_wait(),
            interval: policy.poll_interval(),
        }
    }
}

pub struct TunnelController<'a> {
    manager: &'a dyn ServiceManager,
    clock: &'a dyn Clock,
    tunnel: &'a str,
    policy: PollPolicy,
}

impl<'a> TunnelController<'a> {
    pub fn new(
        manager: &'a dyn ServiceManager,
        clock: &'a dyn Clock,
        tunnel: &'a str,
        policy: PollPolicy,
    ) -> Self {
        Self {
            manager,
            clock,
            tunnel,
            policy,
        }
    }

    /// Replace any installed service with one built from `config_path`.
    pub fn activate(&self, config_path: &Path) -> Result<()> {
        // The service may legitimately not exist yet.
        match self.manager.remove(self.tunnel) {
            Ok(output) if !output.success => {
                tracing::debug!("pre-install removal skipped: {}", output.diagnostic());
            }
            Err(e) => tracing::debug!("pre-install removal skipped: {e}"),
            Ok(_) => tracing::debug!("removed previous {} service", self.tunnel),
        }

        match self.manager.install(config_path) {
            Ok(output) if output.success => {
                tracing::info!("tunnel {} activated", self.tunnel);
                Ok(())
            }
            Ok(output) => Err(Error::ActivationFailed(output.diagnostic())),
            Err(e) => Err(Error::ActivationFailed(e.to_string())),
        }
    }

    /// Remove the service and wait for it to be gone.
    pub fn deactivate(&self) -> Result<Deactivation> {
        let output = self
            .manager
            .remove(self.tunnel)
            .map_err(|e| Error::DeactivationFailed(e.to_string()))?;

        if !output.success {
            if output.mentions("not found") {
                tracing::info!("tunnel {} is not installed", self.tunnel);
                return Ok(Deactivation::NotActive);
            }
            return Err(Error::DeactivationFailed(output.diagnostic()));
        }

        let outcome = self.await_removal();
        if outcome == Deactivation::Unconfirmed {
            tracing::warn!(
                "tunnel {} still reported after {:?}; removal may take a moment to show",
                self.tunnel,
                self.policy.max_wait
            );
        } else {
            tracing::info!("tunnel {} deactivated", self.tunnel);
        }
        Ok(outcome)
    }

    /// Poll until the service reads `Inactive` or the budget is spent.
    /// Polls happen at whole multiples of the interval strictly inside the
    /// budget, and no sleep runs past it.
    fn await_removal(&self) -> Deactivation {
        let monitor = StatusMonitor::new(self.manager, self.clock, self.tunnel);
        let interval = self.policy.interval.max(Duration::from_millis(1));
        let mut elapsed = Duration::ZERO;

        while elapsed < self.policy.max_wait {
            if monitor.query_state() == TunnelRuntimeState::Inactive {
                return Deactivation::Confirmed;
            }
            let next = elapsed + interval;
            if next >= self.policy.max_wait {
                break;
            }
            if self.clock.sleep(interval) == Wake::Cancelled {
                break;
            }
            elapsed = next;
        }
        Deactivation::Unconfirmed
    }
}
