//! Invoking-user resolution.
//!
//! The identity is resolved exactly once per invocation, from the real uid
//! via the host identity database (`getpwuid_r`). The resulting name is
//! trusted verbatim when building the state path: it comes from the system's
//! own user database, never from untrusted input. Callers must not weaken
//! this by feeding externally supplied names into [`Identity::new`].

use std::ffi::CStr;
use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("no identity database entry for uid {uid}")]
    UnknownUid { uid: u32 },
    #[error("identity database lookup failed: {0}")]
    Lookup(#[source] io::Error),
    #[error("identity database returned an empty user name")]
    EmptyName,
}

/// The invoking user: name plus real uid, immutable for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    name: String,
    uid: u32,
}

impl Identity {
    /// Build an identity from parts. The name must be non-empty.
    pub fn new(name: impl Into<String>, uid: u32) -> Result<Self, IdentityError> {
        let name = name.into();
        if name.is_empty() {
            return Err(IdentityError::EmptyName);
        }
        Ok(Self { name, uid })
    }

    /// Resolve the invoking user from the real uid.
    ///
    /// Uses the real uid, not the effective uid, so a setuid deployment
    /// still acts on behalf of the caller.
    pub fn current() -> Result<Self, IdentityError> {
        let uid = unsafe { libc::getuid() };
        let name = user_name_for_uid(uid)?;
        Self::new(name, uid)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn uid(&self) -> u32 {
        self.uid
    }
}

fn user_name_for_uid(uid: libc::uid_t) -> Result<String, IdentityError> {
    let mut buf_len = match unsafe { libc::sysconf(libc::_SC_GETPW_R_SIZE_MAX) } {
        n if n > 0 => usize::try_from(n).unwrap_or(1024),
        _ => 1024,
    };

    loop {
        let mut buf = vec![0_u8; buf_len];
        let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
        let mut result: *mut libc::passwd = std::ptr::null_mut();

        let ret = unsafe {
            libc::getpwuid_r(
                uid,
                &raw mut pwd,
                buf.as_mut_ptr().cast::<libc::c_char>(),
                buf.len(),
                &raw mut result,
            )
        };

        if ret == libc::ERANGE {
            // Entry longer than the buffer; retry with more room.
            buf_len *= 2;
            continue;
        }
        if ret != 0 {
            return Err(IdentityError::Lookup(io::Error::from_raw_os_error(ret)));
        }
        if result.is_null() {
            return Err(IdentityError::UnknownUid { uid });
        }

        // result points into pwd/buf, both still alive here.
        let name = unsafe { CStr::from_ptr(pwd.pw_name) };
        return Ok(name.to_string_lossy().into_owned());
    }
}
