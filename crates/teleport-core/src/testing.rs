//! Scripted collaborators for exercising the lifecycle without WireGuard or
//! the remote service. Clones share state, so a test can hand one clone to
//! the orchestrator and inspect the other.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::cmd::{CommandError, CommandOutput};
use crate::error::{Error, Result};
use crate::lifecycle::PinPrompt;
use crate::remote::RemoteExchange;
use crate::service::{CommandResult, ServiceManager};
use crate::storage::{MemoryStore, Slot, SlotStore};
use crate::types::{DeviceIdentity, DeviceToken};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A call made to [`ScriptedManager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Install(PathBuf),
    Remove(String),
    Query(String),
}

/// In-memory stand-in for the WireGuard service manager.
///
/// Installing over an installed service fails the way the real manager does,
/// so only remove-then-install succeeds twice in a row.
#[derive(Debug, Clone, Default)]
pub struct ScriptedManager {
    inner: Arc<Mutex<ManagerState>>,
}

#[derive(Debug, Default)]
struct ManagerState {
    installed: bool,
    calls: Vec<Call>,
    linger: usize,
    lingering: usize,
    install_failure: Option<String>,
    removal_failure: Option<String>,
    query_failure: bool,
}

fn ok(stdout: &str) -> CommandResult {
    Ok(CommandOutput {
        success: true,
        code: Some(0),
        stdout: stdout.to_string(),
        stderr: String::new(),
    })
}

fn failed(code: i32, stderr: &str) -> CommandResult {
    Ok(CommandOutput {
        success: false,
        code: Some(code),
        stdout: String::new(),
        stderr: stderr.to_string(),
    })
}

impl ScriptedManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_installed(&self, installed: bool) {
        lock(&self.inner).installed = installed;
    }

    /// After each successful removal, report the next `queries` status
    /// queries as `STOP_PENDING`.
    pub fn linger_after_removal(&self, queries: usize) {
        lock(&self.inner).linger = queries;
    }

    pub fn fail_installs_with(&self, stderr: &str) {
        lock(&self.inner).install_failure = Some(stderr.to_string());
    }

    pub fn fail_removals_with(&self, stderr: &str) {
        lock(&self.inner).removal_failure = Some(stderr.to_string());
    }

    /// Make status queries time out.
    pub fn fail_queries(&self, fail: bool) {
        lock(&self.inner).query_failure = fail;
    }

    pub fn is_installed(&self) -> bool {
        lock(&self.inner).installed
    }

    pub fn calls(&self) -> Vec<Call> {
        lock(&self.inner).calls.clone()
    }

    pub fn install_count(&self) -> usize {
        self.count(|c| matches!(c, Call::Install(_)))
    }

    pub fn remove_count(&self) -> usize {
        self.count(|c| matches!(c, Call::Remove(_)))
    }

    pub fn query_count(&self) -> usize {
        self.count(|c| matches!(c, Call::Query(_)))
    }

    fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        lock(&self.inner).calls.iter().filter(|c| pred(c)).count()
    }
}

impl ServiceManager for ScriptedManager {
    fn install(&self, config_path: &Path) -> CommandResult {
        let mut state = lock(&self.inner);
        state.calls.push(Call::Install(config_path.to_path_buf()));
        if let Some(stderr) = &state.install_failure {
            return failed(1, stderr);
        }
        if state.installed {
            return failed(1, "Tunnel already installed and running");
        }
        state.installed = true;
        state.lingering = 0;
        ok("")
    }

    fn remove(&self, tunnel: &str) -> CommandResult {
        let mut state = lock(&self.inner);
        state.calls.push(Call::Remove(tunnel.to_string()));
        if let Some(stderr) = &state.removal_failure {
            return failed(1, stderr);
        }
        if !state.installed {
            return failed(1, "Error: Tunnel service not found");
        }
        state.installed = false;
        state.lingering = state.linger;
        ok("")
    }

    fn query(&self, tunnel: &str) -> CommandResult {
        let mut state = lock(&self.inner);
        state.calls.push(Call::Query(tunnel.to_string()));
        if state.query_failure {
            return Err(CommandError::TimedOut {
                command: format!("sc query WireGuardTunnel${tunnel}"),
                timeout: Duration::from_secs(5),
            });
        }
        if state.lingering > 0 {
            state.lingering -= 1;
            return ok("        STATE              : 3  STOP_PENDING");
        }
        if state.installed {
            ok("        STATE              : 4  RUNNING")
        } else {
            failed(
                1060,
                "The specified service does not exist as an installed service.",
            )
        }
    }
}

/// Remote service that accepts a single PIN and issues sequential tokens.
#[derive(Debug, Clone)]
pub struct StaticRemote {
    inner: Arc<Mutex<RemoteState>>,
}

#[derive(Debug, Default)]
struct RemoteState {
    pin: String,
    unavailable: bool,
    config_failure: Option<String>,
    issued: Vec<String>,
    token_requests: usize,
    config_requests: usize,
    last_client_hint: Option<String>,
}

impl StaticRemote {
    pub fn accepting(pin: &str) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RemoteState {
                pin: pin.to_string(),
                ..RemoteState::default()
            })),
        }
    }

    /// Treat `token` as issued earlier, e.g. by a previous run.
    pub fn remember_token(&self, token: &str) {
        lock(&self.inner).issued.push(token.to_string());
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        lock(&self.inner).unavailable = unavailable;
    }

    pub fn fail_config_with(&self, detail: &str) {
        lock(&self.inner).config_failure = Some(detail.to_string());
    }

    pub fn token_requests(&self) -> usize {
        lock(&self.inner).token_requests
    }

    pub fn config_requests(&self) -> usize {
        lock(&self.inner).config_requests
    }

    pub fn last_client_hint(&self) -> Option<String> {
        lock(&self.inner).last_client_hint.clone()
    }
}

impl RemoteExchange for StaticRemote {
    fn request_token(&self, identity: &DeviceIdentity, pin: &str) -> Result<DeviceToken> {
        let mut state = lock(&self.inner);
        state.token_requests += 1;
        if state.unavailable {
            return Err(Error::RemoteUnavailable("connection refused".into()));
        }
        state.last_client_hint = Some(identity.as_str().to_string());
        if pin != state.pin {
            return Err(Error::InvalidPin);
        }
        let token = format!("token-{}-{}", state.token_requests, identity.as_str());
        state.issued.push(token.clone());
        Ok(DeviceToken::new(token))
    }

    fn request_config(&self, token: &DeviceToken) -> Result<String> {
        let mut state = lock(&self.inner);
        state.config_requests += 1;
        if let Some(detail) = &state.config_failure {
            return Err(Error::ConfigExchangeFailed(detail.clone()));
        }
        if !state.issued.iter().any(|t| t == token.as_str()) {
            return Err(Error::ConfigExchangeFailed("unknown device token".into()));
        }
        Ok(format!(
            "[Interface]\nPrivateKey = cHJpdmF0ZS1rZXk=\nAddress = 10.8.0.2/32\n# generation {}\n\n[Peer]\nPublicKey = cGVlci1rZXk=\nAllowedIPs = 0.0.0.0/0\nEndpoint = 203.0.113.7:51820\n",
            state.config_requests
        ))
    }
}

/// PIN prompt answering with a fixed value (`None` = dismissed).
#[derive(Debug, Clone)]
pub struct FixedPin {
    pin: Option<String>,
    prompts: Arc<Mutex<usize>>,
}

impl FixedPin {
    pub fn new(pin: Option<&str>) -> Self {
        Self {
            pin: pin.map(str::to_string),
            prompts: Arc::default(),
        }
    }

    pub fn prompts(&self) -> usize {
        *lock(&self.prompts)
    }
}

impl PinPrompt for FixedPin {
    fn prompt_pin(&self) -> Result<Option<String>> {
        *lock(&self.prompts) += 1;
        Ok(self.pin.clone())
    }
}

/// [`MemoryStore`] whose deletes fail for selected slots.
#[derive(Debug, Clone, Default)]
pub struct FailingStore {
    inner: MemoryStore,
    failing: Arc<Mutex<HashSet<Slot>>>,
}

impl FailingStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            failing: Arc::default(),
        }
    }

    pub fn fail_delete(&self, slot: Slot) {
        lock(&self.failing).insert(slot);
    }
}

impl SlotStore for FailingStore {
    fn read(&self, slot: Slot) -> Result<Option<String>> {
        self.inner.read(slot)
    }

    fn write(&self, slot: Slot, contents: &str) -> Result<()> {
        self.inner.write(slot, contents)
    }

    fn delete(&self, slot: Slot) -> Result<bool> {
        if lock(&self.failing).contains(&slot) {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                format!("{slot} file is locked"),
            )));
        }
        self.inner.delete(slot)
    }

    fn exists(&self, slot: Slot) -> bool {
        self.inner.exists(slot)
    }

    fn location(&self, slot: Slot) -> PathBuf {
        self.inner.location(slot)
    }
}
