//! Tunnel service run-state queries.

use std::fmt;
use std::time::Duration;

use crate::clock::{Clock, Wake};
use crate::cmd::CommandOutput;
use crate::service::ServiceManager;

/// Observed run state of the tunnel service. Never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunnelRuntimeState {
    Inactive,
    /// The service is starting or stopping.
    Pending,
    Active,
    /// The manager could not be queried.
    Unknown,
}

impl TunnelRuntimeState {
    /// `Active` and `Inactive` are settled; the others may still change.
    pub const fn is_settled(self) -> bool {
        matches!(self, Self::Active | Self::Inactive)
    }

    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }
}

impl fmt::Display for TunnelRuntimeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inactive => write!(f, "inactive"),
            Self::Pending => write!(f, "pending"),
            Self::Active => write!(f, "active"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Classify a completed status query.
///
/// A failed query means the service does not exist. Without a positive
/// "running" report the tunnel is treated as not active.
pub fn classify(output: &CommandOutput) -> TunnelRuntimeState {
    if !output.success {
        return TunnelRuntimeState::Inactive;
    }
    let text = output.stdout.to_lowercase();
    if text.contains("running") {
        TunnelRuntimeState::Active
    } else if text.contains("stopped") {
        TunnelRuntimeState::Inactive
    } else if text.contains("pending") {
        TunnelRuntimeState::Pending
    } else {
        TunnelRuntimeState::Inactive
    }
}

pub struct StatusMonitor<'a> {
    manager: &'a dyn ServiceManager,
    clock: &'a dyn Clock,
    tunnel: &'a str,
}

impl<'a> StatusMonitor<'a> {
    pub fn new(manager: &'a dyn ServiceManager, clock: &'a dyn Clock, tunnel: &'a str) -> Self {
        Self {
            manager,
            clock,
            tunnel,
        }
    }

    /// One status query. Transport failures degrade to `Unknown`.
    pub fn query_state(&self) -> TunnelRuntimeState {
        match self.manager.query(self.tunnel) {
            Ok(output) => {
                let state = classify(&output);
                tracing::debug!("tunnel {} is {state}", self.tunnel);
                state
            }
            Err(e) => {
                tracing::warn!("could not query tunnel service: {e}");
                TunnelRuntimeState::Unknown
            }
        }
    }

    /// Up to `attempts` queries, `delay` apart, stopping at the first settled
    /// state. Otherwise returns the last state observed.
    pub fn query_with_retry(&self, attempts: u32, delay: Duration) -> TunnelRuntimeState {
        let attempts = attempts.max(1);
        let mut state = TunnelRuntimeState::Unknown;
        for attempt in 1..=attempts {
            state = self.query_state();
            if state.is_settled() || attempt == attempts {
                break;
            }
            if self.clock.sleep(delay) == Wake::Cancelled {
                break;
            }
        }
        state
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::testing::ScriptedManager;

    fn sc_output(success: bool, stdout: &str) -> CommandOutput {
        CommandOutput {
            success,
            code: Some(if success { 0 } else { 1060 }),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    #[test]
    fn running_service_is_active() {
        let out = sc_output(
            true,
            "SERVICE_NAME: WireGuardTunnel$teleport\n        STATE              : 4  RUNNING",
        );
        assert_eq!(classify(&out), TunnelRuntimeState::Active);
    }

    #[test]
    fn stopped_service_is_inactive() {
        let out = sc_output(true, "        STATE              : 1  STOPPED");
        assert_eq!(classify(&out), TunnelRuntimeState::Inactive);
    }

    #[test]
    fn transitioning_service_is_pending() {
        assert_eq!(
            classify(&sc_output(true, "STATE : 2  START_PENDING")),
            TunnelRuntimeState::Pending
        );
        assert_eq!(
            classify(&sc_output(true, "STATE : 3  STOP_PENDING")),
            TunnelRuntimeState::Pending
        );
    }

    #[test]
    fn missing_service_is_inactive() {
        let out = sc_output(
            false,
            "[SC] EnumQueryServicesStatus:OpenService FAILED 1060:\n\nThe specified service does not exist as an installed service.",
        );
        assert_eq!(classify(&out), TunnelRuntimeState::Inactive);
    }

    #[test]
    fn unrecognised_output_is_inactive() {
        assert_eq!(
            classify(&sc_output(true, "STATE : 7  PAUSED")),
            TunnelRuntimeState::Inactive
        );
    }

    #[test]
    fn transport_error_is_unknown() {
        let manager = ScriptedManager::new();
        manager.fail_queries(true);
        let clock = ManualClock::new();
        let monitor = StatusMonitor::new(&manager, &clock, "teleport");
        assert_eq!(monitor.query_state(), TunnelRuntimeState::Unknown);
    }

    #[test]
    fn retry_stops_at_first_settled_state() {
        let manager = ScriptedManager::new();
        manager.set_installed(true);
        let clock = ManualClock::new();
        let monitor = StatusMonitor::new(&manager, &clock, "teleport");

        assert_eq!(
            monitor.query_with_retry(4, Duration::from_millis(800)),
            TunnelRuntimeState::Active
        );
        assert_eq!(manager.query_count(), 1);
        assert_eq!(clock.sleeps(), 0);
    }

    #[test]
    fn retry_smooths_over_pending_state() {
        let manager = ScriptedManager::new();
        manager.set_installed(true);
        manager.linger_after_removal(2);
        manager.remove("teleport").unwrap();
        let clock = ManualClock::new();
        let monitor = StatusMonitor::new(&manager, &clock, "teleport");

        assert_eq!(
            monitor.query_with_retry(4, Duration::from_millis(800)),
            TunnelRuntimeState::Inactive
        );
        assert_eq!(manager.query_count(), 3);
        assert_eq!(clock.elapsed(), Duration::from_millis(1600));
    }

    #[test]
    fn exhausted_retries_stay_within_bound() {
        let manager = ScriptedManager::new();
        manager.fail_queries(true);
        let clock = ManualClock::new();
        let monitor = StatusMonitor::new(&manager, &clock, "teleport");
        let delay = Duration::from_millis(800);

        assert_eq!(monitor.query_with_retry(4, delay), TunnelRuntimeState::Unknown);
        assert_eq!(manager.query_count(), 4);
        assert!(clock.elapsed() <= delay * 4);
    }

    #[test]
    fn zero_attempts_still_queries_once() {
        let manager = ScriptedManager::new();
        let clock = ManualClock::new();
        let monitor = StatusMonitor::new(&manager, &clock, "teleport");
        assert_eq!(
            monitor.query_with_retry(0, Duration::from_secs(1)),
            TunnelRuntimeState::Inactive
        );
        assert_eq!(manager.query_count(), 1);
    }

    #[test]
    fn cancelled_clock_ends_retries() {
        let manager = ScriptedManager::new();
        manager.fail_queries(true);
        let clock = ManualClock::new();
        clock.cancel_after(1);
        let monitor = StatusMonitor::new(&manager, &clock, "teleport");

        assert_eq!(
            monitor.query_with_retry(10, Duration::from_secs(1)),
            TunnelRuntimeState::Unknown
        );
        assert_eq!(manager.query_count(), 1);
    }
}
