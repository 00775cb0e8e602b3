//! factorctl - enable or disable the invoking user's second authentication
//! factor, behind an interactive credential check.
//!
//! One invocation is one privileged transaction: resolve the invoking user,
//! evaluate the authentication gate, then install or remove the state file.
//! Exit status is binary: 0 on success, 1 on any failure.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context as _;
use clap::{ArgGroup, Parser};
use tracing_subscriber::EnvFilter;

use factorctl_core::pam::{MANAGE_SERVICE, PamService};
use factorctl_core::{Action, Identity, InstallOptions, StateDir, run};

#[derive(Debug, Parser)]
#[command(
    name = "factorctl",
    version,
    about = "Enable or disable the second authentication factor for the invoking user"
)]
#[command(group(ArgGroup::new("action").required(true).multiple(false)))]
struct Cli {
    /// Enable the second factor using the given secret file
    #[arg(short, long, value_name = "CONFIG", group = "action")]
    enable: Option<PathBuf>,

    /// Disable the second factor
    #[arg(short, long, group = "action")]
    disable: bool,
}

impl Cli {
    /// Reduce the parsed surface to the closed action set. The arg group is
    /// required and exclusive, so no `--enable` value means `--disable`.
    fn action(self) -> Action {
        match self.enable {
            Some(candidate) => Action::Enable { candidate },
            None => Action::Disable,
        }
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    init_tracing();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // Help and version are informational actions, not failures;
            // everything else collapses to the single failure status.
            let printed_to_stderr = err.use_stderr();
            let _ = err.print();
            return if printed_to_stderr {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let action = cli.action();
    match run_invocation(&action) {
        Ok(()) => {
            match action {
                Action::Enable { .. } => eprintln!("Second factor enabled successfully"),
                Action::Disable => eprintln!("Second factor disabled successfully"),
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("factorctl: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run_invocation(action: &Action) -> anyhow::Result<()> {
    let identity = Identity::current().context("unable to resolve the invoking user")?;
    tracing::debug!(user = identity.name(), "resolved invoking user");
    let service = PamService::new(MANAGE_SERVICE);
    run(
        &service,
        &identity,
        &StateDir::default(),
        action,
        InstallOptions::default(),
    )?;
    Ok(())
}
