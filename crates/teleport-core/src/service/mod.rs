//! External tunnel-service manager.
//!
//! The lifecycle drives the manager through three commands and pattern-matches
//! their output; see [`crate::status::classify`] and
//! [`crate::controller::TunnelController`].

mod wireguard;

use std::path::Path;

use crate::cmd::{CommandError, CommandOutput};

pub use wireguard::{SERVICE_PREFIX, WireGuardManager};

/// Result of one service-manager invocation.
pub type CommandResult = Result<CommandOutput, CommandError>;

pub trait ServiceManager {
    /// Install and start a tunnel service from a config file. The service is
    /// named after the file stem.
    fn install(&self, config_path: &Path) -> CommandResult;

    /// Stop and remove the tunnel service.
    fn remove(&self, tunnel: &str) -> CommandResult;

    /// Query the tunnel service's run state.
    fn query(&self, tunnel: &str) -> CommandResult;
}
