//! User intents: connect, configure, disconnect, reset.
//!
//! The [`Orchestrator`] sequences the identity, token, config, and service
//! components. Every intent returns an [`Outcome`]; nothing here exits the
//! process or panics on a failed step.


use std::fmt;
use std::path::PathBuf;

use crate::clock::Clock;
use crate::config::Config;
use crate::controller::{Deactivation, PollPolicy, TunnelController};
use crate::error::{Error, Result};
use crate::identity::IdentityStore;
use crate::remote::RemoteExchange;
use crate::service::ServiceManager;
use crate::status::StatusMonitor;
use crate::storage::{Slot, SlotStore};
use crate::token::TokenExchange;
use crate::tunnel_config::ConfigGenerator;
use crate::types::DeviceToken;

/// Source of the user's PIN.
pub trait PinPrompt {
    /// Ask for a PIN. `Ok(None)` when the user dismisses the prompt.
    fn prompt_pin(&self) -> Result<Option<String>>;
}

/// Where the installation stands, derived from the slots and one status
/// query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    NoCredential,
    CredentialedNotConfigured,
    Configured,
    Active,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredential => write!(f, "not set up"),
            Self::CredentialedNotConfigured => write!(f, "credential stored, no tunnel config"),
            Self::Configured => write!(f, "configured, tunnel not active"),
            Self::Active => write!(f, "tunnel active"),
        }
    }
}

/// A user intent, for front-ends that dispatch by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Connect,
    Configure,
    Disconnect,
    Reset,
}

/// Result of one intent.
#[derive(Debug)]
pub enum Outcome {
    /// The tunnel service was installed. `refreshed` when an existing token
    /// was reused instead of asking for a PIN.
    Connected { refreshed: bool },
    /// A config was generated and persisted but not activated.
    Configured { path: PathBuf },
    /// The PIN prompt was dismissed. Nothing changed.
    Cancelled,
    Disconnected { confirmed: bool },
    /// Disconnect found no tunnel service.
    NotActive,
    /// Slots that could not be deleted, with the reason.
    Reset { failed: Vec<(Slot, String)> },
    Failed(Error),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        match self {
            Self::Failed(_) => false,
            Self::Reset { failed } => failed.is_empty(),
            _ => true,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected { .. } => write!(f, "Tunnel activated!"),
            Self::Configured { .. } => write!(f, "Config generated successfully!"),
            Self::Cancelled => write!(f, "Cancelled."),
            Self::Disconnected { confirmed: true } => write!(f, "Tunnel deactivated!"),
            Self::Disconnected { confirmed: false } => write!(
                f,
                "Tunnel deactivation requested (status may take a moment to update)"
            ),
            Self::NotActive => write!(f, "No Teleport tunnel is active."),
            Self::Reset { failed } if failed.is_empty() => {
                write!(f, "Configuration deleted. You can now enter a new PIN.")
            }
            Self::Reset { failed } => {
                write!(f, "Configuration partially deleted. Could not delete:")?;
                for (slot, reason) in failed {
                    write!(f, " {slot} ({reason})")?;
                }
                Ok(())
            }
            Self::Failed(e) => write!(f, "Error: {e}"),
        }
    }
}

/// Drives the tunnel lifecycle over injected collaborators.
pub struct Orchestrator {
    config: Config,
    store: Box<dyn SlotStore>,
    remote: Box<dyn RemoteExchange>,
    manager: Box<dyn ServiceManager>,
    clock: Box<dyn Clock>,
    prompt: Box<dyn PinPrompt>,
}

impl Orchestrator {
    /// Validates `config` before taking ownership of the collaborators.
    pub fn new(
        config: Config,
        store: impl SlotStore + 'static,
        remote: impl RemoteExchange + 'static,
        manager: impl ServiceManager + 'static,
        clock: impl Clock + 'static,
        prompt: impl PinPrompt + 'static,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            store: Box::new(store),
            remote: Box::new(remote),
            manager: Box::new(manager),
            clock: Box::new(clock),
            prompt: Box::new(prompt),
        })
    }

    pub const fn config(&self) -> &Config {
        &self.config
    }

    pub fn run(&self, intent: Intent) -> Outcome {
        match intent {
            Intent::Connect => self.connect(),
            Intent::Configure => self.configure(),
            Intent::Disconnect => self.disconnect(),
            Intent::Reset => self.reset(),
        }
    }

    /// Enrol with a PIN on first use, otherwise refresh the config from the
    /// stored token. Either way the tunnel ends up (re)installed.
    pub fn connect(&self) -> Outcome {
        let result = match self.tokens().load_token() {
            Ok(token) => self.refresh(&token),
            Err(Error::NoTokenPresent) => self.connect_with_pin(),
            Err(e) => Err(e),
        };
        settle("connect", result)
    }

    /// Enrol with a PIN and persist the config without activating it.
    pub fn configure(&self) -> Outcome {
        let result = self.ask_pin().and_then(|pin| match pin {
            Some(pin) => Ok(Outcome::Configured {
                path: self.enrol(&pin)?,
            }),
            None => Ok(Outcome::Cancelled),
        });
        settle("configure", result)
    }

    /// Remove the tunnel service.
    pub fn disconnect(&self) -> Outcome {
        let state = self.monitor().query_state();
        tracing::info!("tunnel is {state} before disconnect");

        let result = self.controller().deactivate().map(|d| match d {
            Deactivation::Confirmed => Outcome::Disconnected { confirmed: true },
            Deactivation::Unconfirmed => Outcome::Disconnected { confirmed: false },
            Deactivation::NotActive => Outcome::NotActive,
        });
        settle("disconnect", result)
    }

    /// Deactivate, then delete every slot. Each deletion is attempted even if
    /// another fails.
    pub fn reset(&self) -> Outcome {
        match self.controller().deactivate() {
            Ok(d) => tracing::debug!("reset deactivation: {d:?}"),
            Err(e) => tracing::warn!("reset continuing after failed deactivation: {e}"),
        }

        let mut failed = Vec::new();
        for slot in Slot::ALL {
            match self.store.delete(slot) {
                Ok(true) => tracing::info!("deleted {slot}"),
                Ok(false) => tracing::debug!("{slot} already absent"),
                Err(e) => {
                    tracing::warn!("failed to delete {slot}: {e}");
                    failed.push((slot, e.to_string()));
                }
            }
        }
        Outcome::Reset { failed }
    }

    /// Current lifecycle state. Queries the service with retries, so this may
    /// block for up to the configured status budget.
    pub fn state(&self) -> LifecycleState {
        let runtime = self
            .monitor()
            .query_with_retry(self.config.status.attempts, self.config.status.delay());
        if runtime.is_active() {
            LifecycleState::Active
        } else if self.store.exists(Slot::Config) {
            LifecycleState::Configured
        } else if self.store.exists(Slot::Token) {
            LifecycleState::CredentialedNotConfigured
        } else {
            LifecycleState::NoCredential
        }
    }

    /// True when any slot holds data, i.e. there is something to reset.
    pub fn has_persisted_state(&self) -> bool {
        Slot::ALL.iter().any(|slot| self.store.exists(*slot))
    }

    fn connect_with_pin(&self) -> Result<Outcome> {
        let Some(pin) = self.ask_pin()? else {
            return Ok(Outcome::Cancelled);
        };
        let path = self.enrol(&pin)?;
        self.activate(path)?;
        Ok(Outcome::Connected { refreshed: false })
    }

    fn refresh(&self, token: &DeviceToken) -> Result<Outcome> {
        tracing::info!("refreshing tunnel config with stored token");
        let path = self.regenerate(token)?;
        self.activate(path)?;
        Ok(Outcome::Connected { refreshed: true })
    }

    /// A blank answer counts as dismissing the prompt.
    fn ask_pin(&self) -> Result<Option<String>> {
        Ok(self
            .prompt
            .prompt_pin()?
            .map(|pin| pin.trim().to_string())
            .filter(|pin| !pin.is_empty()))
    }

    /// Identity, then token, then config.
    fn enrol(&self, pin: &str) -> Result<PathBuf> {
        let identity = IdentityStore::new(self.store.as_ref()).get_or_create()?;
        let tokens = self.tokens();
        let token = tokens.issue_token(&identity, pin)?;
        tokens.store_token(&token)?;
        self.regenerate(&token)
    }

    fn regenerate(&self, token: &DeviceToken) -> Result<PathBuf> {
        let generator = ConfigGenerator::new(self.remote.as_ref(), self.store.as_ref());
        let config = generator.generate(token)?;
        generator.persist(&config)
    }

    fn activate(&self, path: PathBuf) -> Result<()> {
        if !self.store.exists(Slot::Config) {
            return Err(Error::NoConfigPresent);
        }
        self.controller().activate(&path)
    }

    fn tokens(&self) -> TokenExchange<'_> {
        TokenExchange::new(self.remote.as_ref(), self.store.as_ref())
    }

    fn controller(&self) -> TunnelController<'_> {
        TunnelController::new(
            self.manager.as_ref(),
            self.clock.as_ref(),
            &self.config.tunnel_name,
            PollPolicy::from(&self.config.deactivate),
        )
    }

    fn monitor(&self) -> StatusMonitor<'_> {
        StatusMonitor::new(
            self.manager.as_ref(),
            self.clock.as_ref(),
            &self.config.tunnel_name,
        )
    }
}

fn settle(intent: &str, result: Result<Outcome>) -> Outcome {
    result.unwrap_or_else(|e| {
        tracing::warn!("{intent} failed: {e}");
        Outcome::Failed(e)
    })
}
