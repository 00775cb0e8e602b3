//! factor-verify - run the authentication gate alone, against the login
//! stack's own PAM service, and report the result. Never touches state.
//!
//! Useful for checking a PAM configuration end to end before relying on it
//! at login time.

use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use factorctl_core::pam::{LOGIN_SERVICE, PamService};
use factorctl_core::{AuthenticationOutcome, Identity, authenticate};

fn main() -> ExitCode {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let identity = match Identity::current() {
        Ok(identity) => identity,
        Err(err) => {
            eprintln!("factor-verify: unable to resolve the invoking user: {err}");
            return ExitCode::FAILURE;
        }
    };

    let service = PamService::new(LOGIN_SERVICE);
    tracing::debug!(user = identity.name(), service = LOGIN_SERVICE, "running gate");
    match authenticate(&service, &identity) {
        AuthenticationOutcome::Success => {
            eprintln!("Authentication succeeded");
            ExitCode::SUCCESS
        }
        AuthenticationOutcome::CredentialRejected(err) => {
            eprintln!("Authentication failed: {err}");
            ExitCode::FAILURE
        }
        AuthenticationOutcome::AccountUnusable(err) => {
            eprintln!("Account is not available: {err}");
            ExitCode::FAILURE
        }
        AuthenticationOutcome::SessionError(err) => {
            eprintln!("Verification session failed: {err}");
            ExitCode::FAILURE
        }
    }
}
