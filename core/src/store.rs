//! Secure state store: validate a caller-supplied candidate file and
//! atomically install it as the state file, or remove the state file.
//!
//! This is the security boundary of the whole tool. The candidate is opened
//! with symlink-following disabled and validated through the same file
//! descriptor that is subsequently read, so nothing can be swapped in
//! between the check and the copy. The live state path only ever changes at
//! the final rename; every failure before that leaves it byte-for-byte
//! untouched.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::os::unix::fs::{MetadataExt, OpenOptionsExt};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

/// Suffix of the transient staging file created next to the state file
/// during an install.
pub const STAGING_SUFFIX: &str = ".new";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("candidate path is a symlink; refusing to follow it")]
    CandidateIsSymlink,
    #[error("unable to open candidate file: {0}")]
    OpenCandidate(#[source] io::Error),
    #[error("unable to inspect candidate file: {0}")]
    InspectCandidate(#[source] io::Error),
    #[error("candidate file is owned by uid {actual}, not by the invoking user (uid {expected})")]
    ForeignOwner { actual: u32, expected: u32 },
    #[error("candidate file has insecure permissions (mode {mode:03o} grants group/other access)")]
    InsecureMode { mode: u32 },
    #[error("unable to clear stale staging file {path}: {source}")]
    ClearStaging { path: PathBuf, source: io::Error },
    #[error("unable to create staging file {path}: {source}")]
    CreateStaging { path: PathBuf, source: io::Error },
    #[error("copying into the staging file failed: {0}")]
    Copy(#[source] io::Error),
    #[error("unable to replace the state file: {0}")]
    Replace(#[source] io::Error),
    #[error("unable to remove the state file: {0}")]
    Remove(#[source] io::Error),
}

/// Whether the staging file is flushed to disk before the rename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileSyncPolicy {
    #[default]
    SyncAll,
    SkipSync,
}

/// Options for [`install`].
///
/// The staging mode is an explicit parameter rather than a process-wide
/// umask, so the store can be exercised in isolation. Since the staging
/// file becomes the state file via rename, this is also the installed mode.
#[derive(Debug, Clone, Copy)]
pub struct InstallOptions {
    /// Permission bits for the freshly created staging file.
    pub staging_mode: u32,
    pub file_sync: FileSyncPolicy,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            staging_mode: 0o600,
            file_sync: FileSyncPolicy::SyncAll,
        }
    }
}

/// `<state_path>.new`, the staging slot used only during an install.
#[must_use]
pub fn staging_path(state_path: &Path) -> PathBuf {
    let mut raw = state_path.as_os_str().to_os_string();
    raw.push(STAGING_SUFFIX);
    PathBuf::from(raw)
}

/// Validate `candidate` and atomically install it at `state_path`.
///
/// Preconditions: the authentication gate has already passed for this
/// invocation, and `invoking_uid` is the real uid of the caller. Every step
/// is fatal on failure; no step is retried.
pub fn install(
    candidate: &Path,
    state_path: &Path,
    invoking_uid: u32,
    options: InstallOptions,
) -> Result<(), StoreError> {
    let mut source = open_candidate(candidate)?;

    // Inspect through the open descriptor, not a second path lookup -- the
    // file we validate is exactly the file we copy.
    let meta = source.metadata().map_err(StoreError::InspectCandidate)?;
    if meta.uid() != invoking_uid {
        return Err(StoreError::ForeignOwner {
            actual: meta.uid(),
            expected: invoking_uid,
        });
    }
    let mode = meta.mode() & 0o7777;
    if mode & 0o077 != 0 {
        return Err(StoreError::InsecureMode { mode });
    }

    let staging = staging_path(state_path);
    match fs::remove_file(&staging) {
        Ok(()) => debug!(path = %staging.display(), "discarded stale staging file"),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => {
            // The staging slot is not usable (wrong ownership, denied
            // permission, a directory squatting the name, ...).
            return Err(StoreError::ClearStaging {
                path: staging,
                source: err,
            });
        }
    }

    // Exclusive create: a concurrent install racing for the same slot loses
    // outright instead of silently sharing the staging file.
    let mut dest = OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(options.staging_mode)
        .open(&staging)
        .map_err(|err| StoreError::CreateStaging {
            path: staging.clone(),
            source: err,
        })?;

    let copied = io::copy(&mut source, &mut dest)
        .map_err(StoreError::Copy)
        .and_then(|_| match options.file_sync {
            FileSyncPolicy::SyncAll => dest.sync_all().map_err(StoreError::Copy),
            FileSyncPolicy::SkipSync => Ok(()),
        });
    if let Err(err) = copied {
        drop(dest);
        if let Err(unlink_err) = fs::remove_file(&staging) {
            warn!(
                path = %staging.display(),
                "failed to remove staging file after copy error: {unlink_err}"
            );
        }
        return Err(err);
    }

    drop(source);
    drop(dest);

    // The rename is the only moment the live state changes: the old content,
    // if any, is replaced in one step or preserved unchanged. A remnant
    // staging file is left for operator inspection on failure.
    fs::rename(&staging, state_path).map_err(StoreError::Replace)?;

    debug!(path = %state_path.display(), "state file installed");
    Ok(())
}

/// Remove `state_path`. Removing an already-absent state file is success.
pub fn revoke(state_path: &Path) -> Result<(), StoreError> {
    match fs::remove_file(state_path) {
        Ok(()) => {
            debug!(path = %state_path.display(), "state file removed");
            Ok(())
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(path = %state_path.display(), "state file already absent");
            Ok(())
        }
        Err(err) => Err(StoreError::Remove(err)),
    }
}

fn open_candidate(path: &Path) -> Result<File, StoreError> {
    let mut opts = OpenOptions::new();
    opts.read(true).custom_flags(libc::O_NOFOLLOW);
    match opts.open(path) {
        Ok(file) => Ok(file),
        // Linux reports a refused symlink as ELOOP, the BSDs as EMLINK.
        Err(err)
            if matches!(
                err.raw_os_error(),
                Some(code) if code == libc::ELOOP || code == libc::EMLINK
            ) =>
        {
            Err(StoreError::CandidateIsSymlink)
        }
        Err(err) => Err(StoreError::OpenCandidate(err)),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    use super::{InstallOptions, install, revoke, staging_path};

    fn current_uid() -> u32 {
        unsafe { libc::getuid() }
    }

    fn write_candidate(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, bytes).expect("write candidate");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).expect("chmod candidate");
        path
    }

    #[test]
    fn staging_path_appends_suffix_to_full_name() {
        assert_eq!(
            staging_path(Path::new("/var/lib/factorctl/alice")),
            Path::new("/var/lib/factorctl/alice.new")
        );
    }

    #[test]
    fn install_then_revoke_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let candidate = write_candidate(dir.path(), "candidate", b"totp-secret-material");
        let state = dir.path().join("alice");

        install(&candidate, &state, current_uid(), InstallOptions::default()).expect("install");
        assert_eq!(fs::read(&state).expect("read state"), b"totp-secret-material");
        assert!(!staging_path(&state).exists());

        revoke(&state).expect("revoke");
        assert!(!state.exists());
    }

    #[test]
    fn revoke_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = dir.path().join("alice");

        revoke(&state).expect("first revoke of absent state");
        revoke(&state).expect("second revoke of absent state");
        assert!(!state.exists());
    }

    #[test]
    fn stale_staging_file_is_discarded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let candidate = write_candidate(dir.path(), "candidate", b"fresh");
        let state = dir.path().join("alice");
        fs::write(staging_path(&state), b"left over from a dead install").expect("stale staging");

        install(&candidate, &state, current_uid(), InstallOptions::default()).expect("install");
        assert_eq!(fs::read(&state).expect("read state"), b"fresh");
        assert!(!staging_path(&state).exists());
    }

    #[test]
    fn installed_state_file_is_owner_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        let candidate = write_candidate(dir.path(), "candidate", b"secret");
        let state = dir.path().join("alice");

        install(&candidate, &state, current_uid(), InstallOptions::default()).expect("install");
        let mode = fs::metadata(&state).expect("metadata").permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }
}
