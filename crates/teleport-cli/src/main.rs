use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use teleport_cli::app::{self, Command};
use teleport_cli::escalate;
use teleport_cli::prompt::{self, PIN_ENV, PinSource};
use teleport_core::config::load_config;
use teleport_core::tracing_init::{default_filter, init_tracing};

/// AmpliFi Teleport tunnel client.
#[derive(Debug, Parser)]
#[command(name = "teleport", version, about)]
struct Cli {
    /// Run without interactive prompts (PIN from --pin or TELEPORT_PIN)
    #[arg(long, global = true)]
    non_interactive: bool,

    /// Directory holding the identity, token, and tunnel config
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    /// Settings file to use instead of the global one
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Activate the tunnel, enrolling with a PIN on first use
    Connect(PinArgs),
    /// Generate and store a tunnel config without activating it
    Configure(PinArgs),
    /// Deactivate the tunnel
    Disconnect,
    /// Deactivate and delete the stored identity, token, and config
    Reset(ResetArgs),
    /// Show the current tunnel state
    Status,
}

#[derive(Debug, Args)]
struct PinArgs {
    /// Teleport PIN (e.g. AB123)
    #[arg(long)]
    pin: Option<String>,
}

#[derive(Debug, Args)]
struct ResetArgs {
    /// Skip the confirmation prompt
    #[arg(long)]
    yes: bool,
}

impl Commands {
    const fn kind(&self) -> Command {
        match self {
            Self::Connect(_) => Command::Connect,
            Self::Configure(_) => Command::Configure,
            Self::Disconnect => Command::Disconnect,
            Self::Reset(_) => Command::Reset,
            Self::Status => Command::Status,
        }
    }

    fn pin(&self) -> Option<String> {
        match self {
            Self::Connect(args) | Self::Configure(args) => args.pin.clone(),
            _ => None,
        }
    }

    const fn confirmed(&self) -> bool {
        matches!(self, Self::Reset(ResetArgs { yes: true }))
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(dir) = cli.state_dir {
        config.state.dir = dir;
    }

    init_tracing(&default_filter("teleport_cli", &config.log_level), cli.log_json);

    let command = cli.command.kind();
    if command.needs_admin()
        && let Some(code) = escalate::ensure_elevated(cli.non_interactive)?
    {
        return Ok(code);
    }

    let pins = PinSource::new(
        cli.command.pin(),
        std::env::var(PIN_ENV).ok(),
        cli.non_interactive,
    );
    let orchestrator = app::build_orchestrator(config, pins)?;

    let non_interactive = cli.non_interactive;
    let yes = cli.command.confirmed();
    let mut stdout = std::io::stdout().lock();
    let ok = app::execute(&orchestrator, command, &mut stdout, || {
        prompt::confirm_reset(non_interactive, yes)
    })?;

    Ok(if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
