//! Default tunables for identity creation and the S4 container.
//!
//! Values are lifted from the reference client's `sqrl.h` so that an
//! identity created here has the same defaults a reference client would
//! produce, keeping cross-client interchange unsurprising.

/// Default EnScrypt `nFactor` (scrypt cost parameter, `N = 2^nFactor`).
pub const DEFAULT_N_FACTOR: u8 = 9;

/// Default `UserOptions` flag word written into new Type 1 blocks.
pub const DEFAULT_FLAGS: u16 = 0xF1;

/// Default number of leading password characters retained as a login
/// hint after a timeout.
pub const DEFAULT_HINT_LENGTH: u8 = 4;

/// Default minutes before a cached password hint must be re-entered.
pub const DEFAULT_TIMEOUT_MINUTES: u16 = 15;

/// Target wall-clock seconds for the Type 1 (password) EnScrypt stretch.
pub const DEFAULT_ENSCRYPT_SECONDS: u8 = 5;

/// Target wall-clock seconds for the Type 2 (rescue code) EnScrypt
/// stretch — deliberately much larger since the rescue code is the
/// fallback of last resort.
pub const RESCUE_ENSCRYPT_SECONDS: u8 = 60;

/// Minimum entropy pool estimate, in bits, required before a secret key
/// may be generated from it in a release build.
#[cfg(not(debug_assertions))]
pub const ENTROPY_NEEDED_BITS: u32 = 512;

/// Minimum entropy pool estimate in debug builds — kept low so tests
/// don't stall waiting on the background collector.
#[cfg(debug_assertions)]
pub const ENTROPY_NEEDED_BITS: u32 = 1;

/// scrypt block size parameter `r` used by every EnScrypt call.
pub const ENSCRYPT_R: u32 = 256;

/// scrypt parallelism parameter `p` used by every EnScrypt call.
pub const ENSCRYPT_P: u32 = 1;

/// Length in bytes of every identity key slot (MK, ILK, IUK, PIUK, ...).
pub const KEY_SIZE: usize = 32;

/// Length in bytes of an Ed25519 signature.
pub const SIG_SIZE: usize = 64;

/// Number of decimal digits in a rescue code.
pub const RESCUE_CODE_LENGTH: usize = 24;

/// Number of previous-IUK slots carried in the Type 3 block's ring.
pub const PIUK_RING_SIZE: usize = 4;

/// Type 1 block: password-encrypted IMK (identity master key material)
/// and ILK.
pub const BLOCK_TYPE_USER: u16 = 1;

/// Type 2 block: rescue-code-encrypted IUK.
pub const BLOCK_TYPE_RESCUE: u16 = 2;

/// Type 3 block: MK-encrypted ring of previous IUKs.
pub const BLOCK_TYPE_PREVIOUS: u16 = 3;

/// AES-GCM nonce length in bytes.
pub const AES_GCM_IV_SIZE: usize = 12;

/// AES-GCM authentication tag length in bytes.
pub const AES_GCM_TAG_SIZE: usize = 16;

/// Literal prefix marking a binary-encoded S4 container.
pub const BINARY_CONTAINER_PREFIX: &[u8] = b"sqrldata";

/// Literal prefix marking a textual (base64url-bodied) S4 container.
pub const TEXT_CONTAINER_PREFIX: &str = "SQRLDATA";

/// Line width used when wrapping a textual S4 export's base64url body.
pub const TEXT_EXPORT_LINE_WIDTH: usize = 64;

/// Salt length, in bytes, for the hint-lock's single-round EnScrypt key.
pub const HINT_SALT_SIZE: usize = 16;
