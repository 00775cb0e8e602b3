//! One-invocation driver sequencing: authentication gate first, then the
//! selected store operation. There is no retry and no degraded mode; any
//! failure is terminal for the whole invocation.

use std::path::PathBuf;

use thiserror::Error;

use crate::gate::{self, AuthenticationOutcome, CredentialService, GateError};
use crate::identity::Identity;
use crate::state_dir::StateDir;
use crate::store::{self, InstallOptions, StoreError};

/// The one mutation selected for this invocation.
///
/// A closed set, decided once at the command boundary; dispatch below is an
/// exhaustive match with no unreachable arm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Install `candidate` as the user's state file.
    Enable { candidate: PathBuf },
    /// Remove the user's state file.
    Disable,
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("authentication failed: {0}")]
    CredentialRejected(GateError),
    #[error("account is not available: {0}")]
    AccountUnusable(GateError),
    #[error("verification session failed: {0}")]
    Session(GateError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Run one privileged transaction: resolve the state path, evaluate the
/// gate, and only on success dispatch the selected store operation.
///
/// When the gate does not pass, the filesystem is never touched, whichever
/// action was selected.
pub fn run<S: CredentialService>(
    service: &S,
    identity: &Identity,
    state_dir: &StateDir,
    action: &Action,
    options: InstallOptions,
) -> Result<(), RunError> {
    let state_path = state_dir.state_path(identity);

    match gate::authenticate(service, identity) {
        AuthenticationOutcome::Success => {}
        AuthenticationOutcome::CredentialRejected(err) => {
            return Err(RunError::CredentialRejected(err));
        }
        AuthenticationOutcome::AccountUnusable(err) => {
            return Err(RunError::AccountUnusable(err));
        }
        AuthenticationOutcome::SessionError(err) => {
            return Err(RunError::Session(err));
        }
    }

    match action {
        Action::Enable { candidate } => {
            store::install(candidate, &state_path, identity.uid(), options)?;
        }
        Action::Disable => store::revoke(&state_path)?,
    }

    Ok(())
}
