use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cmd::run_cmd_capture;
use crate::config::ServiceConfig;

use super::{CommandResult, ServiceManager};

/// WireGuard registers each tunnel as the service `WireGuardTunnel$<name>`.
pub const SERVICE_PREFIX: &str = "WireGuardTunnel$";

/// WireGuard tunnel services, queried through the service control tool.
#[derive(Debug, Clone)]
pub struct WireGuardManager {
    wireguard_exe: PathBuf,
    sc_exe: PathBuf,
    query_timeout: Duration,
}

impl WireGuardManager {
    pub fn new(config: &ServiceConfig) -> Self {
        Self {
            wireguard_exe: config.wireguard_exe.clone(),
            sc_exe: config.sc_exe.clone(),
            query_timeout: config.query_timeout(),
        }
    }

    pub fn service_name(tunnel: &str) -> String {
        format!("{SERVICE_PREFIX}{tunnel}")
    }
}

impl ServiceManager for WireGuardManager {
    fn install(&self, config_path: &Path) -> CommandResult {
        tracing::info!("installing tunnel service from {}", config_path.display());
        run_cmd_capture(
            &self.wireguard_exe,
            &[OsStr::new("/installtunnelservice"), config_path.as_os_str()],
            None,
        )
    }

    fn remove(&self, tunnel: &str) -> CommandResult {
        tracing::info!("removing tunnel service {tunnel}");
        run_cmd_capture(&self.wireguard_exe, &["/uninstalltunnelservice", tunnel], None)
    }

    fn query(&self, tunnel: &str) -> CommandResult {
        run_cmd_capture(
            &self.sc_exe,
            &["query", &Self::service_name(tunnel)],
            Some(self.query_timeout),
        )
    }
}
