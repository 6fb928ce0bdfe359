//! Configuration resolution for Teleport.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (`<config dir>/AmpliFiTeleport/settings.json`)
//! 3. Environment variables
//! 4. CLI arguments (applied by the caller, highest priority)

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::storage::Slot;

/// Directory name under the platform config dir holding all persisted state.
pub const APP_DIR_NAME: &str = "AmpliFiTeleport";

/// Name of the single tunnel this tool manages.
pub const DEFAULT_TUNNEL_NAME: &str = "teleport";

/// Complete Teleport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Tunnel (and WireGuard service) name.
    pub tunnel_name: String,
    pub state: StatePaths,
    pub remote: RemoteConfig,
    pub service: ServiceConfig,
    pub status: StatusPolicy,
    pub deactivate: DeactivatePolicy,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tunnel_name: DEFAULT_TUNNEL_NAME.to_string(),
            state: StatePaths::default(),
            remote: RemoteConfig::default(),
            service: ServiceConfig::default(),
            status: StatusPolicy::default(),
            deactivate: DeactivatePolicy::default(),
            log_level: "info".to_string(),
        }
    }
}

/// Locations of the three persisted slots.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatePaths {
    pub dir: PathBuf,
    pub identity_file: String,
    pub token_file: String,
    /// Must be `<tunnel_name>.conf`: WireGuard names the tunnel after the file.
    pub config_file: String,
}

impl Default for StatePaths {
    fn default() -> Self {
        Self {
            dir: default_state_dir(),
            identity_file: "teleport_uuid".to_string(),
            token_file: "teleport_token_0".to_string(),
            config_file: format!("{DEFAULT_TUNNEL_NAME}.conf"),
        }
    }
}

impl StatePaths {
    /// Slot layout rooted at `dir` with the default file names.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Self::default()
        }
    }

    /// Full path of a slot's file.
    pub fn slot_path(&self, slot: Slot) -> PathBuf {
        let name = match slot {
            Slot::Identity => &self.identity_file,
            Slot::Token => &self.token_file,
            Slot::Config => &self.config_file,
        };
        self.dir.join(name)
    }
}

/// Remote credential/config service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL; endpoints are appended to it.
    pub base_url: String,
    pub timeout_secs: u64,
    /// Honour `HTTP(S)_PROXY` from the environment.
    pub use_system_proxy: bool,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://amplifi.com/api/teleport".to_string(),
            timeout_secs: 15,
            use_system_proxy: true,
        }
    }
}

impl RemoteConfig {
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// External service manager programs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// WireGuard CLI. Set a full path if it is not on `PATH`.
    pub wireguard_exe: PathBuf,
    /// Service control tool used for status queries.
    pub sc_exe: PathBuf,
    pub query_timeout_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            wireguard_exe: PathBuf::from("wireguard.exe"),
            sc_exe: PathBuf::from("sc"),
            query_timeout_ms: 5_000,
        }
    }
}

impl ServiceConfig {
    pub const fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }
}

/// Retry policy for status queries made to decide which actions to offer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusPolicy {
    pub attempts: u32,
    pub delay_ms: u64,
}

impl Default for StatusPolicy {
    fn default() -> Self {
        Self {
            attempts: 4,
            delay_ms: 800,
        }
    }
}

impl StatusPolicy {
    pub const fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Wait budget for confirming that a removed service is gone.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DeactivatePolicy {
    pub max_wait_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for DeactivatePolicy {
    fn default() -> Self {
        Self {
            max_wait_ms: 8_000,
            poll_interval_ms: 800,
        }
    }
}

impl DeactivatePolicy {
    pub const fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }

    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Config {
    /// Default configuration with all state rooted at `dir`.
    pub fn with_state_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            state: StatePaths::in_dir(dir),
            ..Self::default()
        }
    }

    /// Reject values the lifecycle components cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.tunnel_name.is_empty() {
            return Err(Error::Config("tunnel_name must not be empty".into()));
        }
        let expected = format!("{}.conf", self.tunnel_name);
        if self.state.config_file != expected {
            return Err(Error::Config(format!(
                "state.config_file must be {expected} so the service manager names the tunnel {}",
                self.tunnel_name
            )));
        }
        if self.status.attempts == 0 {
            return Err(Error::Config("status.attempts must be at least 1".into()));
        }
        if self.deactivate.poll_interval_ms == 0 {
            return Err(Error::Config(
                "deactivate.poll_interval_ms must be greater than zero".into(),
            ));
        }
        if self.remote.base_url.is_empty() {
            return Err(Error::Config("remote.base_url must not be empty".into()));
        }
        Ok(())
    }
}

/// Load configuration with hierarchical resolution.
///
/// `explicit` replaces the global config file location when given; a missing
/// explicit file is an error, a missing global file is not.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let mut config = match explicit {
        Some(path) => load_config_file(path)?,
        None => match global_config_path() {
            Some(path) if path.exists() => load_config_file(&path)?,
            _ => Config::default(),
        },
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

/// Default directory for persisted state: `<config dir>/AmpliFiTeleport`.
pub fn default_state_dir() -> PathBuf {
    dirs::config_dir().map_or_else(|| PathBuf::from(APP_DIR_NAME), |d| d.join(APP_DIR_NAME))
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("settings.json"))
}

fn load_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(val) = var("TELEPORT_STATE_DIR") {
        config.state.dir = PathBuf::from(val);
    }
    if let Some(val) = var("TELEPORT_BASE_URL") {
        config.remote.base_url = val;
    }
    if let Some(val) = var("TELEPORT_WIREGUARD_EXE") {
        config.service.wireguard_exe = PathBuf::from(val);
    }
    if let Some(val) = var("TELEPORT_SC_EXE") {
        config.service.sc_exe = PathBuf::from(val);
    }
    if let Some(val) = var("TELEPORT_LOG_LEVEL") {
        config.log_level = val;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn default_poll_policy_allows_ten_polls() {
        let policy = DeactivatePolicy::default();
        assert_eq!(policy.max_wait().as_millis() / policy.poll_interval().as_millis(), 10);
    }

    #[test]
    fn slot_paths_use_fixed_names() {
        let paths = StatePaths::in_dir("/state");
        assert_eq!(paths.slot_path(Slot::Identity), Path::new("/state/teleport_uuid"));
        assert_eq!(paths.slot_path(Slot::Token), Path::new("/state/teleport_token_0"));
        assert_eq!(paths.slot_path(Slot::Config), Path::new("/state/teleport.conf"));
    }

    #[test]
    fn config_file_must_match_tunnel_name() {
        let mut config = Config::default();
        config.tunnel_name = "office".into();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
        config.state.config_file = "office.conf".into();
        config.validate().unwrap();
    }

    #[test]
    fn zero_poll_interval_rejected() {
        let mut config = Config::default();
        config.deactivate.poll_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "remote": { "base_url": "http://localhost:9000" } }"#)
            .unwrap();

        let config = load_config_file(&path).unwrap();
        assert_eq!(config.remote.base_url, "http://localhost:9000");
        assert_eq!(config.remote.timeout_secs, 15);
        assert_eq!(config.tunnel_name, DEFAULT_TUNNEL_NAME);
        assert_eq!(config.status.attempts, 4);
    }

    #[test]
    fn corrupted_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load_config_file(&path), Err(Error::Config(_))));
    }

    #[test]
    fn missing_explicit_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_config(Some(&dir.path().join("absent.json")));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = Config::default();
        apply_env_overrides(&mut config, |key| match key {
            "TELEPORT_STATE_DIR" => Some("/tmp/teleport-state".into()),
            "TELEPORT_WIREGUARD_EXE" => Some(r"C:\Program Files\WireGuard\wireguard.exe".into()),
            _ => None,
        });
        assert_eq!(config.state.dir, PathBuf::from("/tmp/teleport-state"));
        assert_eq!(
            config.service.wireguard_exe,
            PathBuf::from(r"C:\Program Files\WireGuard\wireguard.exe")
        );
        assert_eq!(config.service.sc_exe, PathBuf::from("sc"));
    }
}
