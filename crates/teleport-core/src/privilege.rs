//! Administrator privilege detection.
//!
//! Installing and removing tunnel services needs elevated rights. The check
//! never fails outright; an inconclusive check is reported as `Unknown`.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrivilegeCheckResult {
    Elevated,
    NotElevated,
    /// The check itself failed.
    Unknown(String),
}

impl PrivilegeCheckResult {
    pub const fn is_elevated(&self) -> bool {
        matches!(self, Self::Elevated)
    }
}

impl fmt::Display for PrivilegeCheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Elevated => write!(f, "elevated"),
            Self::NotElevated => write!(f, "not elevated"),
            Self::Unknown(reason) => write!(f, "unknown ({reason})"),
        }
    }
}

/// Whether the current process runs with administrator rights.
#[cfg(unix)]
pub fn check_privileges() -> PrivilegeCheckResult {
    if nix::unistd::geteuid().is_root() {
        PrivilegeCheckResult::Elevated
    } else {
        PrivilegeCheckResult::NotElevated
    }
}

/// Whether the current process runs with administrator rights.
///
/// `net session` only succeeds for members of the Administrators group
/// running elevated.
#[cfg(windows)]
pub fn check_privileges() -> PrivilegeCheckResult {
    use std::path::Path;
    use std::time::Duration;

    match crate::cmd::run_cmd_capture(Path::new("net"), &["session"], Some(Duration::from_secs(5)))
    {
        Ok(output) if output.success => PrivilegeCheckResult::Elevated,
        Ok(output) if output.code == Some(2) => PrivilegeCheckResult::NotElevated,
        Ok(output) => PrivilegeCheckResult::Unknown(output.diagnostic()),
        Err(e) => PrivilegeCheckResult::Unknown(e.to_string()),
    }
}

#[cfg(not(any(unix, windows)))]
pub fn check_privileges() -> PrivilegeCheckResult {
    PrivilegeCheckResult::Unknown("unsupported platform".into())
}
