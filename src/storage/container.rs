//! AEAD sealing/opening of S4 blocks, the three typed block kinds this
//! crate knows how to build, and the block-type-indexed container that
//! holds them.
//!
//! Every block that carries a secret follows the same shape: some
//! unencrypted header fields (salt, KDF cost, ...) immediately after the
//! 4-byte block header, then a 12-byte AES-GCM IV, then an AES-256-GCM
//! ciphertext the same length as its plaintext, then a 16-byte
//! authentication tag. The additional authenticated data is the block
//! header plus every unencrypted field that precedes the IV, so a
//! corrupted cost parameter or mismatched block type is caught by the
//! tag rather than silently accepted.
//!
//! Every seal draws a fresh random 12-byte IV (spec §4.6's "AES-GCM IV
//! (12 B)" header field) rather than relying solely on key freshness,
//! so a Type 3 reseal under an unchanged Master Key — the one case
//! where the KDF key isn't itself fresh — still never reuses a nonce.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;

use crate::config::{
    AES_GCM_IV_SIZE, AES_GCM_TAG_SIZE, BLOCK_TYPE_PREVIOUS, BLOCK_TYPE_RESCUE, BLOCK_TYPE_USER,
    KEY_SIZE, PIUK_RING_SIZE,
};
use crate::error::{Error, Result};
use crate::kdf::enscrypt;
use crate::storage::block::Block;

const SALT_SIZE: usize = 16;

/// Seal `plaintext` under `key` with the given associated data, drawing
/// a fresh random IV and prefixing it to the returned ciphertext. Used
/// by every block kind below, and also by [`crate::identity`]'s
/// hint-lock blob, which is not itself a block but follows the same
/// fresh-IV discipline.
pub(crate) fn seal(key: &[u8; KEY_SIZE], aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let mut iv = [0u8; AES_GCM_IV_SIZE];
    rand::thread_rng().fill_bytes(&mut iv);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&iv), Payload { msg: plaintext, aad })
        .map_err(|e| Error::Crypto(format!("block encryption failed: {e}")))?;
    let mut out = Vec::with_capacity(AES_GCM_IV_SIZE + ciphertext.len());
    out.extend_from_slice(&iv);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Inverse of [`seal`]: split the leading IV from the ciphertext+tag
/// before decrypting.
pub(crate) fn open(key: &[u8; KEY_SIZE], aad: &[u8], sealed: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() < AES_GCM_IV_SIZE {
        return Err(Error::CorruptBlock("sealed payload shorter than its IV".into()));
    }
    let (iv, ciphertext) = sealed.split_at(AES_GCM_IV_SIZE);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(iv), Payload { msg: ciphertext, aad })
        .map_err(|_| Error::AuthenticationFailed)
}

/// EnScrypt salt/cost for a block whose key is derived from a password
/// or rescue code (Type 1, Type 2).
struct KdfParams {
    salt: [u8; SALT_SIZE],
    n_factor: u8,
    iteration_count: u32,
}

impl KdfParams {
    fn header_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(SALT_SIZE + 5);
        out.extend_from_slice(&self.salt);
        out.push(self.n_factor);
        out.extend_from_slice(&self.iteration_count.to_le_bytes());
        out
    }

    fn derive_key(&self, key_material: &[u8]) -> Result<[u8; KEY_SIZE]> {
        enscrypt(key_material, &self.salt, self.iteration_count, self.n_factor)
    }
}

/// The `Sqrl_Crypt_Context`-equivalent restored from
/// `original_source/src/sqrl.h`: the AEAD parameters for one block's
/// seal/open, bundling its optional EnScrypt salt/cost with its
/// block-specific flag bytes so Type 1, Type 2, and Type 3 assemble
/// their header, associated data, and key the same way instead of each
/// hand-rolling it.
struct CryptParams {
    /// `Some` for Type 1/2, which derive their key via EnScrypt from a
    /// password or rescue code. `None` for Type 3, keyed directly by
    /// the Master Key with no per-block stretch.
    kdf: Option<KdfParams>,
    /// Block-specific header bytes following the KDF fields (or taking
    /// their place, for Type 3): Type 1's option word, hint length, and
    /// timeout fields; Type 2's none; Type 3's edition counter.
    flags: Vec<u8>,
}

impl CryptParams {
    fn header_bytes(&self) -> Vec<u8> {
        let mut out = self.kdf.as_ref().map(KdfParams::header_bytes).unwrap_or_default();
        out.extend_from_slice(&self.flags);
        out
    }

    fn aad(&self, block: &Block) -> Vec<u8> {
        let mut aad = block.block_length().to_le_bytes().to_vec();
        aad.extend_from_slice(&block.block_type().to_le_bytes());
        aad.extend_from_slice(&self.header_bytes());
        aad
    }

    fn resolve_key(&self, key_material: &[u8]) -> Result<[u8; KEY_SIZE]> {
        match &self.kdf {
            Some(kdf) => kdf.derive_key(key_material),
            None => key_material
                .try_into()
                .map_err(|_| Error::InvalidArgument("key material must be exactly 32 bytes".into())),
        }
    }

    /// Seal `plaintext` into a new block of `block_type`. `key_material`
    /// is a password or rescue code when `kdf` is `Some`, or the
    /// already-derived key itself when it's `None`.
    fn seal(&self, block_type: u16, key_material: &[u8], plaintext: &[u8]) -> Result<Block> {
        let key = self.resolve_key(key_material)?;
        let header_fields = self.header_bytes();
        let payload_len = header_fields.len() + AES_GCM_IV_SIZE + plaintext.len() + AES_GCM_TAG_SIZE;
        let mut block = Block::new(block_type, payload_len);
        block.write(&header_fields)?;

        let aad = self.aad(&block);
        let sealed = seal(&key, &aad, plaintext)?;
        block.write(&sealed)?;
        Ok(block)
    }

    /// Parse the unencrypted header run off the front of `payload`: the
    /// KDF fields if `has_kdf`, then `flags_len` further bytes. Returns
    /// the parsed params plus the remaining (still-sealed) bytes.
    fn parse(payload: &[u8], has_kdf: bool, flags_len: usize) -> Result<(Self, &[u8])> {
        let kdf_len = if has_kdf { SALT_SIZE + 5 } else { 0 };
        let header_len = kdf_len + flags_len;
        if payload.len() < header_len {
            return Err(Error::CorruptBlock("block shorter than its declared header".into()));
        }
        let kdf = if has_kdf {
            let mut salt = [0u8; SALT_SIZE];
            salt.copy_from_slice(&payload[..SALT_SIZE]);
            let n_factor = payload[SALT_SIZE];
            let iteration_count = u32::from_le_bytes(payload[SALT_SIZE + 1..SALT_SIZE + 5].try_into().unwrap());
            Some(KdfParams { salt, n_factor, iteration_count })
        } else {
            None
        };
        let flags = payload[kdf_len..header_len].to_vec();
        Ok((Self { kdf, flags }, &payload[header_len..]))
    }

    /// Parse and decrypt a block, checking its type tag before touching
    /// any key material.
    fn open(
        block: &Block,
        expected_type: u16,
        has_kdf: bool,
        flags_len: usize,
        key_material: &[u8],
    ) -> Result<(Self, Vec<u8>)> {
        if block.block_type() != expected_type {
            return Err(Error::CorruptBlock(format!(
                "expected a Type {expected_type} block, found Type {}",
                block.block_type()
            )));
        }
        let (params, sealed) = Self::parse(block.payload(), has_kdf, flags_len)?;
        let key = params.resolve_key(key_material)?;
        let aad = params.aad(block);
        let plaintext = open(&key, &aad, sealed)?;
        Ok((params, plaintext))
    }
}

/// Type 1 block: the identity's everyday password-protected keys (the
/// identity master key and identity lock key), plus the EnScrypt cost
/// and UI option fields needed to reproduce the decryption key.
pub struct Type1Block {
    pub salt: [u8; SALT_SIZE],
    pub n_factor: u8,
    pub iteration_count: u32,
    pub option_flags: u16,
    pub hint_length: u8,
    pub pw_verify_seconds: u8,
    pub idle_timeout_minutes: u16,
}

impl Type1Block {
    const FLAGS_LEN: usize = 6;

    fn crypt_params(&self) -> CryptParams {
        let mut flags = Vec::with_capacity(Self::FLAGS_LEN);
        flags.extend_from_slice(&self.option_flags.to_le_bytes());
        flags.push(self.hint_length);
        flags.push(self.pw_verify_seconds);
        flags.extend_from_slice(&self.idle_timeout_minutes.to_le_bytes());
        CryptParams {
            kdf: Some(KdfParams { salt: self.salt, n_factor: self.n_factor, iteration_count: self.iteration_count }),
            flags,
        }
    }

    /// Encrypt `imk || ilk` under a password-derived key and pack the
    /// result into a Type 1 block.
    pub fn seal(&self, password: &[u8], imk: &[u8; KEY_SIZE], ilk: &[u8; KEY_SIZE]) -> Result<Block> {
        let mut plaintext = Vec::with_capacity(KEY_SIZE * 2);
        plaintext.extend_from_slice(imk);
        plaintext.extend_from_slice(ilk);
        self.crypt_params().seal(BLOCK_TYPE_USER, password, &plaintext)
    }

    /// Decrypt a Type 1 block with a candidate password, returning
    /// `(imk, ilk)` on success.
    pub fn open(block: &Block, password: &[u8]) -> Result<([u8; KEY_SIZE], [u8; KEY_SIZE])> {
        let (_params, plaintext) = CryptParams::open(block, BLOCK_TYPE_USER, true, Self::FLAGS_LEN, password)?;
        if plaintext.len() != KEY_SIZE * 2 {
            return Err(Error::CorruptBlock("decrypted Type 1 payload has wrong length".into()));
        }
        let imk: [u8; KEY_SIZE] = plaintext[..KEY_SIZE].try_into().unwrap();
        let ilk: [u8; KEY_SIZE] = plaintext[KEY_SIZE..].try_into().unwrap();
        Ok((imk, ilk))
    }
}

/// Type 2 block: the rescue-code-protected Identity Unlock Key, the
/// recovery path of last resort.
pub struct Type2Block {
    pub salt: [u8; SALT_SIZE],
    pub n_factor: u8,
    pub iteration_count: u32,
}

impl Type2Block {
    fn crypt_params(&self) -> CryptParams {
        CryptParams {
            kdf: Some(KdfParams { salt: self.salt, n_factor: self.n_factor, iteration_count: self.iteration_count }),
            flags: Vec::new(),
        }
    }

    /// Encrypt `iuk` under a rescue-code-derived key.
    pub fn seal(&self, rescue_code: &[u8], iuk: &[u8; KEY_SIZE]) -> Result<Block> {
        self.crypt_params().seal(BLOCK_TYPE_RESCUE, rescue_code, iuk)
    }

    /// Decrypt a Type 2 block with a candidate rescue code, returning the
    /// recovered Identity Unlock Key.
    pub fn open(block: &Block, rescue_code: &[u8]) -> Result<[u8; KEY_SIZE]> {
        let (_params, plaintext) = CryptParams::open(block, BLOCK_TYPE_RESCUE, true, 0, rescue_code)?;
        plaintext
            .try_into()
            .map_err(|_| Error::CorruptBlock("decrypted Type 2 payload has wrong length".into()))
    }
}

/// Type 3 block: the ring of retired IUKs kept around so a site that
/// still remembers an old identity can be re-verified after a rekey,
/// encrypted directly under the current Master Key (no per-block KDF).
pub struct Type3Block {
    pub edition: u32,
}

impl Type3Block {
    const FLAGS_LEN: usize = 4;

    fn crypt_params(&self) -> CryptParams {
        CryptParams { kdf: None, flags: self.edition.to_le_bytes().to_vec() }
    }

    /// Encrypt a `PIUK_RING_SIZE`-entry ring of previous IUKs under `mk`.
    pub fn seal(&self, mk: &[u8; KEY_SIZE], ring: &[[u8; KEY_SIZE]; PIUK_RING_SIZE]) -> Result<Block> {
        let mut plaintext = Vec::with_capacity(KEY_SIZE * PIUK_RING_SIZE);
        for key in ring {
            plaintext.extend_from_slice(key);
        }
        self.crypt_params().seal(BLOCK_TYPE_PREVIOUS, mk, &plaintext)
    }

    /// Decrypt a Type 3 block, returning `(edition, ring)`.
    pub fn open(block: &Block, mk: &[u8; KEY_SIZE]) -> Result<(u32, [[u8; KEY_SIZE]; PIUK_RING_SIZE])> {
        let (params, plaintext) = CryptParams::open(block, BLOCK_TYPE_PREVIOUS, false, Self::FLAGS_LEN, mk)?;
        if plaintext.len() != KEY_SIZE * PIUK_RING_SIZE {
            return Err(Error::CorruptBlock("decrypted Type 3 payload has wrong length".into()));
        }
        let edition = u32::from_le_bytes(params.flags[..4].try_into().unwrap());
        let mut ring = [[0u8; KEY_SIZE]; PIUK_RING_SIZE];
        for (i, slot) in ring.iter_mut().enumerate() {
            slot.copy_from_slice(&plaintext[i * KEY_SIZE..(i + 1) * KEY_SIZE]);
        }
        Ok((edition, ring))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type1_seals_and_opens_with_matching_password() {
        let t1 = Type1Block {
            salt: [1u8; SALT_SIZE],
            n_factor: 1,
            iteration_count: 1,
            option_flags: 0xF1,
            hint_length: 4,
            pw_verify_seconds: 5,
            idle_timeout_minutes: 15,
        };
        let imk = [2u8; KEY_SIZE];
        let ilk = [3u8; KEY_SIZE];
        let block = t1.seal(b"hunter2", &imk, &ilk).unwrap();

        let (recovered_imk, recovered_ilk) = Type1Block::open(&block, b"hunter2").unwrap();
        assert_eq!(recovered_imk, imk);
        assert_eq!(recovered_ilk, ilk);
    }

    #[test]
    fn test_type1_wrong_password_fails_closed() {
        let t1 = Type1Block {
            salt: [1u8; SALT_SIZE],
            n_factor: 1,
            iteration_count: 1,
            option_flags: 0xF1,
            hint_length: 4,
            pw_verify_seconds: 5,
            idle_timeout_minutes: 15,
        };
        let block = t1.seal(b"hunter2", &[2u8; KEY_SIZE], &[3u8; KEY_SIZE]).unwrap();
        let err = Type1Block::open(&block, b"wrong").unwrap_err();
        assert!(matches!(err, Error::AuthenticationFailed));
    }

    #[test]
    fn test_type2_rescue_round_trip() {
        let t2 = Type2Block { salt: [9u8; SALT_SIZE], n_factor: 1, iteration_count: 1 };
        let iuk = [4u8; KEY_SIZE];
        let block = t2.seal(b"012345678901234567890123", &iuk).unwrap();
        let recovered = Type2Block::open(&block, b"012345678901234567890123").unwrap();
        assert_eq!(recovered, iuk);
    }

    #[test]
    fn test_type3_ring_round_trip() {
        let mk = [5u8; KEY_SIZE];
        let ring = [[1u8; KEY_SIZE], [2u8; KEY_SIZE], [3u8; KEY_SIZE], [4u8; KEY_SIZE]];
        let t3 = Type3Block { edition: 7 };
        let block = t3.seal(&mk, &ring).unwrap();
        let (edition, recovered) = Type3Block::open(&block, &mk).unwrap();
        assert_eq!(edition, 7);
        assert_eq!(recovered, ring);
    }

    #[test]
    fn test_tampered_block_fails_authentication() {
        let t1 = Type1Block {
            salt: [1u8; SALT_SIZE],
            n_factor: 1,
            iteration_count: 1,
            option_flags: 0xF1,
            hint_length: 4,
            pw_verify_seconds: 5,
            idle_timeout_minutes: 15,
        };
        let mut block = t1.seal(b"hunter2", &[2u8; KEY_SIZE], &[3u8; KEY_SIZE]).unwrap();
        let last = block.payload().len() - 1;
        block.payload_mut()[last] ^= 0xff;
        assert!(matches!(Type1Block::open(&block, b"hunter2"), Err(Error::AuthenticationFailed)));
    }
}
