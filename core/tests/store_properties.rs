//! End-to-end properties of the secure state store: a rejected candidate
//! must never perturb the live state file, and install/revoke must compose
//! the way a user session expects.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use factorctl_core::store::{InstallOptions, StoreError, install, revoke, staging_path};

fn current_uid() -> u32 {
    unsafe { libc::getuid() }
}

fn write_secure(path: &Path, bytes: &[u8]) {
    fs::write(path, bytes).expect("write file");
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).expect("chmod file");
}

fn seeded_state(dir: &Path) -> PathBuf {
    let state = dir.join("alice");
    write_secure(&state, b"previous enrollment");
    state
}

#[test]
fn round_trip_install_read_back_revoke_twice() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let candidate = tmp.path().join("candidate");
    let payload: Vec<u8> = (0_u32..4096).map(|i| (i % 251) as u8).collect();
    write_secure(&candidate, &payload);
    let state = tmp.path().join("alice");

    install(&candidate, &state, current_uid(), InstallOptions::default()).expect("install");
    assert_eq!(fs::read(&state).expect("read back"), payload);
    assert!(!staging_path(&state).exists());

    revoke(&state).expect("revoke");
    assert!(!state.exists());
    revoke(&state).expect("repeated revoke still succeeds");
}

#[test]
fn install_replaces_existing_state_completely() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let state = seeded_state(tmp.path());
    let candidate = tmp.path().join("candidate");
    write_secure(&candidate, b"new enrollment");

    install(&candidate, &state, current_uid(), InstallOptions::default()).expect("install");
    assert_eq!(fs::read(&state).expect("read state"), b"new enrollment");
    assert!(!staging_path(&state).exists());
}

#[test]
fn symlink_candidate_is_rejected_and_state_untouched() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let state = seeded_state(tmp.path());

    // Even a link to a file the caller legitimately owns with correct
    // permissions must be refused: only the final path component matters.
    let target = tmp.path().join("target");
    write_secure(&target, b"legitimate content");
    let link = tmp.path().join("candidate");
    std::os::unix::fs::symlink(&target, &link).expect("symlink");

    let err = install(&link, &state, current_uid(), InstallOptions::default()).unwrap_err();
    assert!(matches!(err, StoreError::CandidateIsSymlink));
    assert_eq!(fs::read(&state).expect("read state"), b"previous enrollment");
}

#[test]
fn foreign_owner_is_rejected_before_any_copy() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let state = seeded_state(tmp.path());
    let candidate = tmp.path().join("candidate");
    write_secure(&candidate, b"someone else's file");

    // The candidate belongs to the test uid; claim a different invoking
    // uid to exercise the ownership check.
    let other_uid = current_uid().wrapping_add(1);
    let err = install(&candidate, &state, other_uid, InstallOptions::default()).unwrap_err();
    assert!(matches!(err, StoreError::ForeignOwner { .. }));
    assert_eq!(fs::read(&state).expect("read state"), b"previous enrollment");
    assert!(!staging_path(&state).exists());
}

#[test]
fn group_readable_candidate_is_rejected_before_any_copy() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let state = seeded_state(tmp.path());
    let candidate = tmp.path().join("candidate");
    fs::write(&candidate, b"overshared").expect("write candidate");
    fs::set_permissions(&candidate, fs::Permissions::from_mode(0o640)).expect("chmod candidate");

    let err = install(&candidate, &state, current_uid(), InstallOptions::default()).unwrap_err();
    assert!(matches!(err, StoreError::InsecureMode { mode } if mode & 0o077 != 0));
    assert_eq!(fs::read(&state).expect("read state"), b"previous enrollment");
    assert!(!staging_path(&state).exists());
}

#[test]
fn other_readable_candidate_is_rejected() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let state = tmp.path().join("alice");
    let candidate = tmp.path().join("candidate");
    fs::write(&candidate, b"world readable").expect("write candidate");
    fs::set_permissions(&candidate, fs::Permissions::from_mode(0o604)).expect("chmod candidate");

    let err = install(&candidate, &state, current_uid(), InstallOptions::default()).unwrap_err();
    assert!(matches!(err, StoreError::InsecureMode { .. }));
    assert!(!state.exists());
}

#[test]
fn mid_copy_failure_leaves_state_untouched() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let state = seeded_state(tmp.path());

    // A directory owned by the caller with mode 0o700 passes the open,
    // ownership, and permission checks, but the first read from it fails.
    // That exercises the copy-error branch after staging creation.
    let candidate = tmp.path().join("candidate");
    fs::create_dir(&candidate).expect("create candidate dir");
    fs::set_permissions(&candidate, fs::Permissions::from_mode(0o700)).expect("chmod candidate");

    let err = install(&candidate, &state, current_uid(), InstallOptions::default()).unwrap_err();
    assert!(matches!(err, StoreError::Copy(_)));
    assert_eq!(fs::read(&state).expect("read state"), b"previous enrollment");
    assert!(!staging_path(&state).exists());
}

#[test]
fn unusable_staging_slot_is_fatal_and_state_untouched() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let state = seeded_state(tmp.path());
    let candidate = tmp.path().join("candidate");
    write_secure(&candidate, b"new enrollment");

    // A directory squatting the staging name cannot be unlinked, so the
    // staging slot is unusable and the install must abort.
    fs::create_dir(staging_path(&state)).expect("squat staging slot");

    let err = install(&candidate, &state, current_uid(), InstallOptions::default()).unwrap_err();
    assert!(matches!(err, StoreError::ClearStaging { .. }));
    assert_eq!(fs::read(&state).expect("read state"), b"previous enrollment");
}

#[test]
fn missing_candidate_reports_open_failure() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let state = tmp.path().join("alice");

    let err = install(
        &tmp.path().join("does-not-exist"),
        &state,
        current_uid(),
        InstallOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, StoreError::OpenCandidate(_)));
    assert!(!state.exists());
}
