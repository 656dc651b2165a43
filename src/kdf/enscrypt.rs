//! EnScrypt: scrypt iterated across `count` rounds, each round's salt
//! being the previous round's output, with every round after the first
//! XORed into an accumulator. Round 0 (the first scrypt call) seeds both
//! the accumulator and the chain; `count == 1` is therefore a single
//! plain scrypt call with no XOR folding.
//!
//! EnScrypt never suspends on its own — a caller wanting a time-bounded
//! derivation drives it via [`enscrypt_millis`], which runs a fixed
//! number of rounds at a time and checks a clock between batches, or via
//! [`enscrypt_with_progress`] for a cancellable fixed-count derivation.

use std::time::Instant;

use scrypt::Params;

use crate::config::{ENSCRYPT_P, ENSCRYPT_R, KEY_SIZE};
use crate::error::{Error, Result};

fn scrypt_round(password: &[u8], salt: &[u8], n_factor: u8) -> Result<[u8; KEY_SIZE]> {
    let params = Params::new(n_factor, ENSCRYPT_R, ENSCRYPT_P, KEY_SIZE)
        .map_err(|e| Error::Crypto(format!("invalid scrypt parameters: {e}")))?;
    let mut out = [0u8; KEY_SIZE];
    scrypt::scrypt(password, salt, &params, &mut out)
        .map_err(|e| Error::Crypto(format!("scrypt failed: {e}")))?;
    Ok(out)
}

/// Run `count` EnScrypt rounds and return the XOR-folded result.
pub fn enscrypt(password: &[u8], salt: &[u8], count: u32, n_factor: u8) -> Result<[u8; KEY_SIZE]> {
    if count == 0 {
        return Err(Error::InvalidArgument("enscrypt count must be >= 1".into()));
    }
    let mut round = scrypt_round(password, salt, n_factor)?;
    let mut acc = round;
    for _ in 1..count {
        round = scrypt_round(password, &round, n_factor)?;
        for (a, r) in acc.iter_mut().zip(round.iter()) {
            *a ^= r;
        }
    }
    Ok(acc)
}

/// Run EnScrypt for a fixed `count`, invoking `progress` after every
/// round with the number of rounds completed so far. If `progress`
/// returns `false`, the derivation stops early and `Error::Cancelled` is
/// returned.
pub fn enscrypt_with_progress(
    password: &[u8],
    salt: &[u8],
    count: u32,
    n_factor: u8,
    mut progress: impl FnMut(u32) -> bool,
) -> Result<[u8; KEY_SIZE]> {
    if count == 0 {
        return Err(Error::InvalidArgument("enscrypt count must be >= 1".into()));
    }
    let mut round = scrypt_round(password, salt, n_factor)?;
    let mut acc = round;
    if !progress(1) {
        return Err(Error::Cancelled);
    }
    for i in 1..count {
        round = scrypt_round(password, &round, n_factor)?;
        for (a, r) in acc.iter_mut().zip(round.iter()) {
            *a ^= r;
        }
        if !progress(i + 1) {
            return Err(Error::Cancelled);
        }
    }
    Ok(acc)
}

/// Run EnScrypt for approximately `target_millis` wall-clock milliseconds,
/// returning both the derived key and the number of rounds actually
/// completed. The round count must be persisted alongside the derived
/// key's ciphertext (as the block's iteration count) since it is not
/// reproducible from the password and salt alone.
pub fn enscrypt_millis(
    password: &[u8],
    salt: &[u8],
    target_millis: u32,
    n_factor: u8,
) -> Result<([u8; KEY_SIZE], u32)> {
    let start = Instant::now();
    let target = std::time::Duration::from_millis(target_millis as u64);

    let mut round = scrypt_round(password, salt, n_factor)?;
    let mut acc = round;
    let mut count = 1u32;
    while start.elapsed() < target {
        round = scrypt_round(password, &round, n_factor)?;
        for (a, r) in acc.iter_mut().zip(round.iter()) {
            *a ^= r;
        }
        count += 1;
    }
    Ok((acc, count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::hex;

    fn kat(password: &[u8], salt: &[u8], count: u32, n_factor: u8, expected_hex: &str) {
        let out = enscrypt(password, salt, count, n_factor).unwrap();
        assert_eq!(hex::encode(&out).to_lowercase(), expected_hex);
    }

    #[test]
    fn test_enscrypt_1_iteration() {
        kat(
            b"",
            b"",
            1,
            9,
            "a8ea62a6e1bfd20e4275011595307aa302645c1801600ef5cd79bf9d884d911c",
        );
    }

    #[test]
    fn test_enscrypt_100_iterations() {
        kat(
            b"",
            b"",
            100,
            9,
            "45a42a01709a0012a37b7b6874cf16623543409d19e7740ed96741d2e99aab67",
        );
    }

    #[test]
    fn test_enscrypt_123_iterations_with_password() {
        kat(
            b"password",
            b"",
            123,
            9,
            "129d96d1e735618517259416a605be7094c2856a53c14ef7d4e4ba8e4ea36aeb",
        );
    }

    #[test]
    fn test_enscrypt_123_iterations_with_password_and_salt() {
        kat(
            b"password",
            &[0u8; 32],
            123,
            9,
            "2f30b9d4e5c48056177ff90a6cc9da04b648a7e8451dfa60da56c148187f6a7d",
        );
    }

    #[test]
    fn test_enscrypt_millis_count_is_reproducible() {
        let (once, count) = enscrypt_millis(b"", b"", 50, 9).unwrap();
        let fixed = enscrypt(b"", b"", count, 9).unwrap();
        assert_eq!(once, fixed);
    }

    #[test]
    fn test_enscrypt_with_progress_cancels() {
        let mut calls = 0;
        let result = enscrypt_with_progress(b"", b"", 10, 9, |n| {
            calls = n;
            n < 3
        });
        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_enscrypt_rejects_zero_count() {
        assert!(enscrypt(b"", b"", 0, 9).is_err());
    }
}
