//! The authentication gate.
//!
//! One gate evaluation happens per invocation, before any state mutation is
//! allowed. The credential-verification service itself is external and
//! opaque; this module only sequences its fixed protocol (open session,
//! verify credential, verify account usability, close session) and reduces
//! the result to a single [`AuthenticationOutcome`]. The gate is never
//! retried: a rejection ends the invocation.

use thiserror::Error;
use tracing::debug;

use crate::identity::Identity;

/// Human-readable diagnostic from the verification service.
///
/// Carries only what the service reports about the failure; the supplied
/// credential value never appears here.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct GateError {
    message: String,
}

impl GateError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// An external credential-verification service.
///
/// Implementations may prompt the caller interactively on the controlling
/// terminal while a session is open; any diagnostics they print pass
/// through unmodified.
pub trait CredentialService {
    type Session: CredentialSession;

    /// Open a verification session bound to this invocation and `identity`.
    fn open_session(&self, identity: &Identity) -> Result<Self::Session, GateError>;
}

/// A single open verification session.
pub trait CredentialSession {
    /// Verify the supplied credential.
    fn verify_credential(&mut self) -> Result<(), GateError>;

    /// Verify the account is currently usable (not locked, expired, or in a
    /// forced-change state that blocks this operation).
    fn verify_account_usable(&mut self) -> Result<(), GateError>;

    /// Tear the session down. A session that cannot be closed cleanly must
    /// not be treated as a successful verification.
    fn close(self) -> Result<(), GateError>;
}

/// Result of one gate evaluation; consumed exactly once by the driver and
/// never persisted.
#[derive(Debug)]
pub enum AuthenticationOutcome {
    Success,
    CredentialRejected(GateError),
    AccountUnusable(GateError),
    SessionError(GateError),
}

impl AuthenticationOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Run the four-step gate protocol against `service`.
///
/// Step order is fixed: a rejected credential is reported before account
/// usability is ever checked, and a session that verified both but failed
/// teardown still yields [`AuthenticationOutcome::SessionError`], because a
/// service that cannot close its own session is in an inconsistent state.
pub fn authenticate<S: CredentialService>(
    service: &S,
    identity: &Identity,
) -> AuthenticationOutcome {
    debug!(user = identity.name(), "opening verification session");
    let mut session = match service.open_session(identity) {
        Ok(session) => session,
        Err(err) => return AuthenticationOutcome::SessionError(err),
    };

    if let Err(err) = session.verify_credential() {
        // The session is dropped without a clean close; the rejection is
        // the outcome that matters.
        return AuthenticationOutcome::CredentialRejected(err);
    }

    if let Err(err) = session.verify_account_usable() {
        return AuthenticationOutcome::AccountUnusable(err);
    }

    if let Err(err) = session.close() {
        return AuthenticationOutcome::SessionError(err);
    }

    debug!(user = identity.name(), "gate passed");
    AuthenticationOutcome::Success
}
