//! # Secure Buffer
//!
//! A byte buffer that zeroizes on drop and hides its contents from
//! `Debug`, mirroring the redaction pattern the identity layer already
//! uses for recovery material, generalized to an arbitrary-length byte
//! buffer suitable for passwords, rescue codes, and raw key slots alike.
//!
//! Page locking (`mlock` on unix) is attempted best-effort at
//! construction: a failure is not propagated as an error (the spec
//! treats it as non-fatal) but is recorded in [`SecureBuffer::is_locked`]
//! so a [`crate::identity::User`] can fold it into its own `MemLocked`
//! status bit. There is no Windows `VirtualLock` path in this build —
//! lock attempts there simply report `false`, the same outcome a failed
//! unix `mlock` produces.

use std::fmt;

use zeroize::Zeroize;

/// An owned, zeroizing byte buffer with a best-effort page lock.
#[derive(Clone)]
pub struct SecureBuffer {
    bytes: Vec<u8>,
    locked: bool,
}

impl SecureBuffer {
    /// Wrap an existing buffer, taking ownership of its bytes, and
    /// attempt to lock it into physical memory.
    pub fn new(bytes: Vec<u8>) -> Self {
        let locked = platform::lock(&bytes);
        Self { bytes, locked }
    }

    /// Allocate `len` zeroed bytes.
    pub fn zeroed(len: usize) -> Self {
        Self::new(vec![0u8; len])
    }

    /// Borrow the contents.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Borrow the contents mutably.
    pub fn as_mut_bytes(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Number of bytes held.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the buffer holds zero bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Whether the backing pages were successfully locked against swap.
    /// `false` means the platform lock call failed (or isn't
    /// implemented) — the buffer is still zeroized on drop either way.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Overwrite the contents with zero, without deallocating.
    pub fn clear(&mut self) {
        self.bytes.zeroize();
    }

    /// Copy into a fixed-size array, failing if the length doesn't match.
    pub fn to_array<const N: usize>(&self) -> Option<[u8; N]> {
        self.bytes.as_slice().try_into().ok()
    }
}

impl From<Vec<u8>> for SecureBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl<const N: usize> From<[u8; N]> for SecureBuffer {
    fn from(bytes: [u8; N]) -> Self {
        Self::new(bytes.to_vec())
    }
}

impl fmt::Debug for SecureBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecureBuffer([REDACTED; {} bytes])", self.bytes.len())
    }
}

impl PartialEq for SecureBuffer {
    fn eq(&self, other: &Self) -> bool {
        // Constant-time comparison: secret buffers are compared when
        // checking a supplied password/rescue code against a derived key,
        // where a timing side channel would leak which byte first
        // mismatched.
        if self.bytes.len() != other.bytes.len() {
            return false;
        }
        let mut diff = 0u8;
        for (a, b) in self.bytes.iter().zip(other.bytes.iter()) {
            diff |= a ^ b;
        }
        diff == 0
    }
}

impl Eq for SecureBuffer {}

impl Drop for SecureBuffer {
    fn drop(&mut self) {
        self.bytes.zeroize();
        if self.locked {
            platform::unlock(&self.bytes);
        }
    }
}

#[cfg(unix)]
mod platform {
    /// Best-effort `mlock`; `false` on failure (permission, RLIMIT_MEMLOCK,
    /// or an empty buffer with nothing to lock).
    pub(super) fn lock(bytes: &[u8]) -> bool {
        if bytes.is_empty() {
            return false;
        }
        // SAFETY: `bytes` is a valid, non-empty slice for the duration of
        // this call; mlock neither reads nor writes through the pointer.
        let rc = unsafe { libc::mlock(bytes.as_ptr().cast(), bytes.len()) };
        if rc != 0 {
            tracing::warn!("SecureBuffer: mlock failed, secret may be swappable");
        }
        rc == 0
    }

    pub(super) fn unlock(bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        // SAFETY: same region previously passed to `mlock`.
        unsafe {
            libc::munlock(bytes.as_ptr().cast(), bytes.len());
        }
    }
}

#[cfg(not(unix))]
mod platform {
    pub(super) fn lock(_bytes: &[u8]) -> bool {
        false
    }

    pub(super) fn unlock(_bytes: &[u8]) {}
}
