//! State-path resolution.
//!
//! Every identity owns exactly one state path, `<root>/<name>`, derived by a
//! plain path join. Uniqueness is by construction; nothing is looked up. The
//! name is trusted (see [`crate::identity`]) and is not filtered for path
//! separators here.

use std::path::{Path, PathBuf};

use crate::identity::Identity;

/// Build-time default for the state root; override with the
/// `FACTORCTL_STATE_DIR` environment variable when compiling.
const DEFAULT_STATE_DIR: &str = match option_env!("FACTORCTL_STATE_DIR") {
    Some(dir) => dir,
    None => "/var/lib/factorctl",
};

/// Root directory holding one state file per enrolled user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateDir(PathBuf);

impl Default for StateDir {
    fn default() -> Self {
        Self(PathBuf::from(DEFAULT_STATE_DIR))
    }
}

impl StateDir {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self(root.into())
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.0
    }

    /// The authoritative state path for `identity`. Pure; no filesystem I/O.
    #[must_use]
    pub fn state_path(&self, identity: &Identity) -> PathBuf {
        self.0.join(identity.name())
    }
}
