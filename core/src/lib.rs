//! Core logic for `factorctl`: manage a user's second-factor state file
//! behind an authentication gate.
//!
//! The crate is split along the security boundary:
//!
//! - **`identity`**: resolve the invoking user once from the host identity
//!   database.
//! - **`state_dir`**: derive the one state path owned by that identity.
//! - **`gate`**: drive an external credential-verification service and
//!   reduce it to a single pass/fail outcome.
//! - **`store`**: validate a caller-supplied candidate file and atomically
//!   install or remove the state file.
//! - **`ops`**: the one-invocation sequencing of gate then store.
//!
//! Everything here is synchronous and single-threaded; concurrency between
//! independent invocations is handled with atomic filesystem primitives
//! (exclusive staging creation, rename-into-place), not locks.

#![cfg(unix)]

pub mod gate;
pub mod identity;
pub mod ops;
pub mod state_dir;
pub mod store;

#[cfg(feature = "pam")]
pub mod pam;

pub use gate::{
    AuthenticationOutcome, CredentialService, CredentialSession, GateError, authenticate,
};
pub use identity::{Identity, IdentityError};
pub use ops::{Action, RunError, run};
pub use state_dir::StateDir;
pub use store::{FileSyncPolicy, InstallOptions, StoreError, install, revoke};

#[cfg(feature = "pam")]
pub use pam::PamService;
