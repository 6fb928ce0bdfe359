//! `Teleport` Core Library
//!
//! Lifecycle of a single AmpliFi Teleport WireGuard tunnel:
//! - Device identity and token persistence
//! - Remote token and tunnel-config exchange
//! - WireGuard service install, removal, and status polling
//! - Connect / disconnect / reset orchestration

pub mod clock;
pub mod cmd;
pub mod config;
pub mod controller;
pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod privilege;
pub mod remote;
pub mod service;
pub mod status;
pub mod storage;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
pub mod token;
pub mod tracing_init;
pub mod tunnel_config;
pub mod types;

pub use clock::{CancelHandle, Clock, ManualClock, SystemClock};
pub use config::Config;
pub use controller::{Deactivation, TunnelController};
pub use error::{Error, Result};
pub use lifecycle::{Intent, LifecycleState, Orchestrator, Outcome, PinPrompt};
pub use privilege::{PrivilegeCheckResult, check_privileges};
pub use remote::{HttpExchange, RemoteExchange};
pub use service::{ServiceManager, WireGuardManager};
pub use status::{StatusMonitor, TunnelRuntimeState};
pub use storage::{FileStore, MemoryStore, Slot, SlotStore};
pub use types::{DeviceIdentity, DeviceToken, TunnelConfig};
