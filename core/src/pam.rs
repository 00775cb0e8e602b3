//! PAM-backed credential service (cargo feature `pam`).
//!
//! Thin adapter from the [`crate::gate`] traits onto `pam_client`. The
//! conversation is the crate's interactive terminal handler, so the PAM
//! stack can prompt the caller for a password on the controlling tty; any
//! module diagnostics pass through to the terminal unmodified.

use pam_client::conv_cli::Conversation;
use pam_client::{Context, Flag};

use crate::gate::{CredentialService, CredentialSession, GateError};
use crate::identity::Identity;

/// PAM service name for the state-management tool itself.
pub const MANAGE_SERVICE: &str = "factorctl";

/// PAM service name of the login stack the second factor belongs to; used
/// by the verification-only companion tool.
pub const LOGIN_SERVICE: &str = "factor";

/// A configured PAM service, addressed by service name.
#[derive(Debug, Clone)]
pub struct PamService {
    service_name: String,
}

impl PamService {
    #[must_use]
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }
}

pub struct PamSession {
    context: Context<Conversation>,
}

impl CredentialService for PamService {
    type Session = PamSession;

    fn open_session(&self, identity: &Identity) -> Result<Self::Session, GateError> {
        let context = Context::new(&self.service_name, Some(identity.name()), Conversation::new())
            .map_err(|err| GateError::new(err.to_string()))?;
        Ok(PamSession { context })
    }
}

impl CredentialSession for PamSession {
    fn verify_credential(&mut self) -> Result<(), GateError> {
        self.context
            .authenticate(Flag::NONE)
            .map_err(|err| GateError::new(err.to_string()))
    }

    fn verify_account_usable(&mut self) -> Result<(), GateError> {
        self.context
            .acct_mgmt(Flag::NONE)
            .map_err(|err| GateError::new(err.to_string()))
    }

    fn close(self) -> Result<(), GateError> {
        // pam_client runs pam_end on drop and does not surface its status;
        // a teardown failure is not observable through this binding.
        drop(self.context);
        Ok(())
    }
}
