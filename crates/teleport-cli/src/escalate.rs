use std::ffi::OsString;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use dialoguer::Confirm;
use teleport_core::{PrivilegeCheckResult, check_privileges};

/// What to do about the privilege check before touching the service manager.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Proceed,
    /// The check was inconclusive; carry on and let the service manager refuse.
    ProceedUnverified(String),
    /// Ask, then run the same command again under `sudo`.
    OfferRerun,
    Refuse(&'static str),
}

fn step_for(check: PrivilegeCheckResult, non_interactive: bool, can_rerun: bool) -> Step {
    match check {
        PrivilegeCheckResult::Elevated => Step::Proceed,
        PrivilegeCheckResult::Unknown(reason) => Step::ProceedUnverified(reason),
        PrivilegeCheckResult::NotElevated if !can_rerun => Step::Refuse(
            "managing the tunnel service requires administrator rights; \
             run teleport from an elevated prompt",
        ),
        PrivilegeCheckResult::NotElevated if non_interactive => Step::Refuse(
            "managing the tunnel service requires root privileges; re-run with sudo",
        ),
        PrivilegeCheckResult::NotElevated => Step::OfferRerun,
    }
}

/// Make sure the process can manage tunnel services.
///
/// Returns `Some(code)` when the command was handed to an elevated copy of
/// this process; the caller should exit with that code.
pub fn ensure_elevated(non_interactive: bool) -> Result<Option<ExitCode>> {
    match step_for(check_privileges(), non_interactive, cfg!(unix)) {
        Step::Proceed => Ok(None),
        Step::ProceedUnverified(reason) => {
            tracing::warn!("could not determine privileges ({reason}); continuing");
            Ok(None)
        }
        Step::Refuse(msg) => bail!("{msg}"),
        Step::OfferRerun => {
            let confirmed = Confirm::new()
                .with_prompt("Managing the tunnel service requires root privileges. Re-run with sudo?")
                .default(true)
                .interact()?;
            if !confirmed {
                bail!("root privileges declined; re-run manually with sudo");
            }
            let code = rerun_with_sudo(std::env::args_os().skip(1).collect())?;
            Ok(Some(ExitCode::from(code)))
        }
    }
}

/// Run this executable again under `sudo` with `args`, waiting for it.
fn rerun_with_sudo(args: Vec<OsString>) -> Result<u8> {
    let exe = std::env::current_exe().context("cannot locate the teleport executable")?;
    tracing::info!("re-running with sudo");
    tracing::debug!("exec: sudo {} {:?}", exe.display(), args);

    let status = std::process::Command::new("sudo")
        .arg(&exe)
        .args(&args)
        .status()
        .context("failed to start sudo")?;
    Ok(status
        .code()
        .and_then(|code| u8::try_from(code).ok())
        .unwrap_or(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elevated_proceeds() {
        assert_eq!(
            step_for(PrivilegeCheckResult::Elevated, true, true),
            Step::Proceed
        );
    }

    #[test]
    fn inconclusive_check_proceeds_with_reason() {
        let step = step_for(PrivilegeCheckResult::Unknown("no net".into()), false, true);
        assert_eq!(step, Step::ProceedUnverified("no net".into()));
    }

    #[test]
    fn interactive_unix_offers_rerun() {
        assert_eq!(
            step_for(PrivilegeCheckResult::NotElevated, false, true),
            Step::OfferRerun
        );
    }

    #[test]
    fn non_interactive_refuses_instead_of_prompting() {
        let step = step_for(PrivilegeCheckResult::NotElevated, true, true);
        assert!(matches!(step, Step::Refuse(msg) if msg.contains("sudo")));
    }

    #[test]
    fn no_rerun_without_sudo() {
        let step = step_for(PrivilegeCheckResult::NotElevated, false, false);
        assert!(matches!(step, Step::Refuse(msg) if msg.contains("elevated prompt")));
    }
}
