//! Wiring and dispatch for the `teleport` binary.

use std::io::Write;

use anyhow::{Context, Result};
use teleport_core::{
    Config, FileStore, HttpExchange, Intent, Orchestrator, Outcome, PinPrompt, SystemClock,
    WireGuardManager,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Connect,
    Configure,
    Disconnect,
    Reset,
    Status,
}

impl Command {
    /// Commands that install or remove the tunnel service.
    pub const fn needs_admin(self) -> bool {
        matches!(self, Self::Connect | Self::Disconnect | Self::Reset)
    }
}

/// Build an orchestrator over the real file store, HTTP client, and
/// WireGuard service manager.
pub fn build_orchestrator(config: Config, prompt: impl PinPrompt + 'static) -> Result<Orchestrator> {
    let remote = HttpExchange::new(&config.remote).context("failed to set up HTTP client")?;
    let manager = WireGuardManager::new(&config.service);
    let store = FileStore::new(config.state.clone());
    tracing::debug!("state directory: {}", config.state.dir.display());
    Orchestrator::new(config, store, remote, manager, SystemClock::new(), prompt)
        .context("invalid configuration")
}

/// Run `command` and print its result. Returns whether it succeeded.
///
/// `confirm_reset` is only consulted for a reset with something to delete.
pub fn execute(
    orchestrator: &Orchestrator,
    command: Command,
    out: &mut dyn Write,
    confirm_reset: impl FnOnce() -> Result<bool>,
) -> Result<bool> {
    let outcome = match command {
        Command::Connect => orchestrator.run(Intent::Connect),
        Command::Configure => orchestrator.run(Intent::Configure),
        Command::Disconnect => orchestrator.run(Intent::Disconnect),
        Command::Reset => {
            if !orchestrator.has_persisted_state() {
                writeln!(out, "Nothing to reset.")?;
                return Ok(true);
            }
            if !confirm_reset()? {
                writeln!(out, "{}", Outcome::Cancelled)?;
                return Ok(true);
            }
            orchestrator.run(Intent::Reset)
        }
        Command::Status => {
            let state = orchestrator.state();
            writeln!(out, "Teleport: {state}")?;
            return Ok(true);
        }
    };

    writeln!(out, "{outcome}")?;
    if let Outcome::Configured { path } = &outcome {
        writeln!(out, "Config written to {}", path.display())?;
    }
    Ok(outcome.is_success())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use teleport_core::storage::{MemoryStore, Slot, SlotStore};
    use teleport_core::testing::{FixedPin, ScriptedManager, StaticRemote};
    use teleport_core::{Config, ManualClock};

    use super::*;

    struct Setup {
        store: MemoryStore,
        manager: ScriptedManager,
        orchestrator: Orchestrator,
    }

    fn setup(pin: Option<&str>) -> Setup {
        let config = Config::with_state_dir("/state/AmpliFiTeleport");
        let store = MemoryStore::new(config.state.clone());
        let manager = ScriptedManager::new();
        let orchestrator = Orchestrator::new(
            config,
            store.clone(),
            StaticRemote::accepting("AB123"),
            manager.clone(),
            ManualClock::new(),
            FixedPin::new(pin),
        )
        .unwrap();
        Setup {
            store,
            manager,
            orchestrator,
        }
    }

    fn run(setup: &Setup, command: Command, confirm: bool) -> (bool, String) {
        let mut out = Vec::new();
        let ok = execute(&setup.orchestrator, command, &mut out, || Ok(confirm)).unwrap();
        (ok, String::from_utf8(out).unwrap())
    }

    #[test]
    fn service_commands_need_admin() {
        assert!(Command::Connect.needs_admin());
        assert!(Command::Disconnect.needs_admin());
        assert!(Command::Reset.needs_admin());
        assert!(!Command::Configure.needs_admin());
        assert!(!Command::Status.needs_admin());
    }

    #[test]
    fn connect_prints_activation() {
        let s = setup(Some("AB123"));
        let (ok, out) = run(&s, Command::Connect, false);
        assert!(ok);
        assert_eq!(out, "Tunnel activated!\n");
        assert!(s.manager.is_installed());
    }

    #[test]
    fn wrong_pin_fails() {
        let s = setup(Some("ZZ999"));
        let (ok, out) = run(&s, Command::Connect, false);
        assert!(!ok);
        assert!(out.starts_with("Error: Invalid PIN"));
    }

    #[test]
    fn configure_prints_location() {
        let s = setup(Some("AB123"));
        let (ok, out) = run(&s, Command::Configure, false);
        assert!(ok);
        assert!(out.contains("Config generated successfully!"));
        assert!(out.contains("teleport.conf"));
    }

    #[test]
    fn status_reports_lifecycle_state() {
        let s = setup(Some("AB123"));
        assert_eq!(run(&s, Command::Status, false).1, "Teleport: not set up\n");
        run(&s, Command::Connect, false);
        assert_eq!(run(&s, Command::Status, false).1, "Teleport: tunnel active\n");
    }

    #[test]
    fn reset_with_nothing_stored_skips_confirmation() {
        let s = setup(Some("AB123"));
        let mut out = Vec::new();
        let ok = execute(&s.orchestrator, Command::Reset, &mut out, || {
            panic!("confirmation should not be asked")
        })
        .unwrap();
        assert!(ok);
        assert_eq!(String::from_utf8(out).unwrap(), "Nothing to reset.\n");
    }

    #[test]
    fn declined_reset_keeps_state() {
        let s = setup(Some("AB123"));
        run(&s, Command::Connect, false);
        let (ok, out) = run(&s, Command::Reset, false);
        assert!(ok);
        assert_eq!(out, "Cancelled.\n");
        assert!(s.store.exists(Slot::Token));
        assert!(s.manager.is_installed());
    }

    #[test]
    fn confirmed_reset_deletes_state() {
        let s = setup(Some("AB123"));
        run(&s, Command::Connect, false);
        let (ok, out) = run(&s, Command::Reset, true);
        assert!(ok);
        assert_eq!(out, "Configuration deleted. You can now enter a new PIN.\n");
        assert!(!s.store.exists(Slot::Identity));
    }

    #[test]
    fn disconnect_without_tunnel_is_not_an_error() {
        let s = setup(Some("AB123"));
        let (ok, out) = run(&s, Command::Disconnect, false);
        assert!(ok);
        assert_eq!(out, "No Teleport tunnel is active.\n");
    }
}
