use anyhow::{Result, bail};
use dialoguer::{Confirm, Input};
use teleport_core::{Error, PinPrompt};

/// Environment variable consulted for the PIN when `--pin` is not given.
pub const PIN_ENV: &str = "TELEPORT_PIN";

/// PIN from `--pin`, then `TELEPORT_PIN`, then an interactive prompt.
#[derive(Debug, Clone)]
pub struct PinSource {
    preset: Option<String>,
    non_interactive: bool,
}

impl PinSource {
    pub fn new(flag: Option<String>, env: Option<String>, non_interactive: bool) -> Self {
        Self {
            preset: flag.or(env),
            non_interactive,
        }
    }
}

impl PinPrompt for PinSource {
    fn prompt_pin(&self) -> teleport_core::Result<Option<String>> {
        if let Some(pin) = &self.preset {
            return Ok(Some(pin.clone()));
        }
        if self.non_interactive {
            return Err(Error::Config(format!(
                "--pin or {PIN_ENV} is required in non-interactive mode"
            )));
        }
        let pin: String = Input::new()
            .with_prompt("Enter your Teleport PIN (e.g., AB123)")
            .allow_empty(true)
            .interact_text()
            .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;
        Ok(Some(pin))
    }
}

/// Confirm deletion of all persisted state.
pub fn confirm_reset(non_interactive: bool, yes: bool) -> Result<bool> {
    if yes {
        return Ok(true);
    }
    if non_interactive {
        bail!("reset requires --yes in non-interactive mode");
    }
    let confirmed = Confirm::new()
        .with_prompt("Delete previous configuration and reset?")
        .default(false)
        .interact()?;
    Ok(confirmed)
}
