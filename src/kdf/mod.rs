//! # KDF Primitives
//!
//! The two SQRL-specific key derivation building blocks: EnHash (a fixed
//! 16-round SHA-256 fold) and EnScrypt (scrypt iterated and XOR-chained
//! across rounds, either a fixed number of times or for a target
//! wall-clock duration).

mod enhash;
mod enscrypt;

pub use enhash::enhash;
pub use enscrypt::{enscrypt, enscrypt_millis, enscrypt_with_progress};
