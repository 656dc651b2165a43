//! # SQRL Identity Core
//!
//! The identity cryptographic core of a SQRL ("Secure Quick Reliable
//! Login") client: derives every key in the Identity Unlock Key
//! hierarchy, stretches passwords and rescue codes through the
//! protocol's scrypt-based KDF, and reads/writes the S4 on-disk
//! identity container. URI parsing, the network query/ident wire
//! format, and the transaction logic that drives a login end to end
//! are all out of scope here; see [`facade`] for the capability
//! surface those layers are expected to consume.
//!
//! ## Module Hierarchy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      IDENTITY CORE MODULES                              │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────┐  ┌─────────────┐  ┌──────────────┐  ┌──────────────┐ │
//! │  │   entropy   │  │    kdf      │  │ keyschedule  │  │   identity   │ │
//! │  │             │  │             │  │              │  │              │ │
//! │  │ - SHA-512   │─►│ - EnHash    │─►│ - IUK/MK/ILK │─►│ - User slots │ │
//! │  │   sponge    │  │ - EnScrypt  │  │ - RLK/SUK/   │  │ - Lifecycle  │ │
//! │  │ - jitter    │  │             │  │   VUK/URSK   │  │ - Dirty bits │ │
//! │  │   collector │  │             │  │ - site keys  │  │              │ │
//! │  └─────────────┘  └─────────────┘  └──────────────┘  └──────┬───────┘ │
//! │                                                               │         │
//! │  ┌─────────────┐  ┌─────────────┐                   ┌────────▼──────┐ │
//! │  │   codec     │  │secure_buffer│                   │    storage    │ │
//! │  │             │  │             │                   │               │ │
//! │  │ - base64url │  │ - zeroize   │                   │ - Type 1/2/3  │ │
//! │  │ - hex       │  │ - mlock     │                   │   AEAD blocks │ │
//! │  │ - rescue    │  │             │                   │ - binary/text │ │
//! │  │   code      │  │             │                   │   export      │ │
//! │  └─────────────┘  └─────────────┘                   └───────────────┘ │
//! │                                                                         │
//! │  facade: callback trait + transaction/credential enums consumed by a   │
//! │  higher layer — no dispatch logic lives in this crate.                 │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          SECURITY LAYERS                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Layer 1: Key-in-use hygiene (SecureBuffer)                            │
//! │  ────────────────────────────────────────────                           │
//! │  Every secret-bearing byte run lives in a zeroizing, best-effort        │
//! │  page-locked buffer for as long as a slot is resident, and is wiped     │
//! │  on every drop path — normal return, early `?`, or panic unwind.        │
//! │                                                                         │
//! │  Layer 2: Randomness (entropy pool)                                     │
//! │  ───────────────────────────────────                                    │
//! │  A checked draw from the process-wide pool refuses to serve bytes       │
//! │  until its SHA-512 sponge's bit estimate clears a floor, so a freshly   │
//! │  started process can't mint a weak IUK before it has gathered enough    │
//! │  jitter from its background collector thread.                          │
//! │                                                                         │
//! │  Layer 3: At-rest protection (S4 container)                            │
//! │  ────────────────────────────────────────────                           │
//! │  Each block is AES-256-GCM sealed under a key derived fresh from the    │
//! │  caller's password or rescue code, with the block header as associated  │
//! │  data; a wrong credential and a corrupted block surface the same        │
//! │  [`error::Error::AuthenticationFailed`], so neither can be distinguished │
//! │  from the error alone.                                                  │
//! │                                                                         │
//! │  Layer 4: Recovery without trust (identity lock)                        │
//! │  ───────────────────────────────────────────────                        │
//! │  A server that supports identity lock can host an unlock/re-lock        │
//! │  exchange with a client, without ever learning IUK or being able to     │
//! │  decrypt a stored identity itself.                                      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Non-goals
//!
//! Transaction dispatch, `sqrl://` URI parsing, CLI, network I/O, the
//! SQRL wire query/ident format, and primitive crypto algorithm
//! implementations (delegated to `sha2`, `scrypt`, `ed25519-dalek`,
//! `x25519-dalek`, `aes-gcm`) are outside this crate's scope.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

pub mod codec;
pub mod config;
pub mod entropy;
pub mod error;
pub mod facade;
pub mod identity;
pub mod kdf;
pub mod keyschedule;
pub mod secure_buffer;
pub mod storage;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use error::{Error, Result};
pub use identity::{HintLock, KeySlot, User, UserOptions};
pub use keyschedule::SiteKeyPair;
pub use secure_buffer::SecureBuffer;
pub use storage::Storage;

// ============================================================================
// VERSION INFO
// ============================================================================

/// Returns the version of this crate.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Returns build information for debugging.
pub fn build_info() -> BuildInfo {
    BuildInfo {
        version: env!("CARGO_PKG_VERSION"),
        profile: if cfg!(debug_assertions) {
            "debug"
        } else {
            "release"
        },
    }
}

/// Build information for debugging.
#[derive(Debug, Clone)]
pub struct BuildInfo {
    /// Crate version.
    pub version: &'static str,
    /// Build profile (debug/release).
    pub profile: &'static str,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }

    #[test]
    fn test_build_info() {
        let info = build_info();
        assert_eq!(info.version, version());
    }

    /// Generate a fresh identity, save it under a password, drop it,
    /// then reload and confirm the master key comes back unchanged.
    #[test]
    fn test_generate_save_load_preserves_master_key() {
        let (user, rescue_code) = User::generate(UserOptions::default()).unwrap();
        let original_mk = user.slot(KeySlot::Mk).unwrap();

        let storage = user.save(b"pw", Some(rescue_code.as_bytes())).unwrap();
        drop(user);

        let loaded = User::load(&storage, b"pw", UserOptions::default()).unwrap();
        assert_eq!(loaded.slot(KeySlot::Mk).unwrap(), original_mk);
    }

    /// The identity-lock key sequence: IUK/ILK on one side, RLK/SUK/VUK/
    /// URSK on the other, meeting at a signature that verifies.
    #[test]
    fn test_identity_lock_message_round_trip() {
        let iuk = keyschedule::generate_iuk().unwrap();
        let ilk = keyschedule::derive_identity_lock_key(&iuk);
        let rlk = keyschedule::generate_random_lock_key().unwrap();
        let suk = keyschedule::derive_server_unlock_key(&rlk);
        let vuk = keyschedule::derive_verify_unlock_key(&ilk, &rlk);
        let ursk = keyschedule::derive_unlock_request_signing_key(&suk, &iuk);

        let message = b"This is a test message!";
        let signature = keyschedule::sign(&ursk, message);
        assert!(keyschedule::verify(&vuk, message, &signature).is_ok());
    }
}
