//! # Entropy Pool
//!
//! A process-wide sponge that folds timing jitter and OS randomness into a
//! SHA-512 state, plus a coarse bit estimate used to gate secret
//! generation. Mirrors the original client's opaque `sqrl_entropy_pool`
//! handle (`add`, `estimate`, `get`), but as a safe Rust singleton instead
//! of a `malloc`'d struct passed around by pointer.
//!
//! ## Background collector
//!
//! A single background thread is spawned lazily on first use. It wakes on
//! a short, jittered interval and feeds the pool a fresh sample (the CPU
//! cycle counter where available, monotonic-clock low bits otherwise).
//! This is the only routinely concurrent element in the crate; callers
//! never interact with the thread directly.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rand_core::RngCore;
use sha2::{Digest, Sha512};

use crate::error::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(20);
/// How long [`get_blocking`] sleeps between estimate checks while
/// waiting for the background collector to catch up.
const BLOCKING_POLL_INTERVAL: Duration = Duration::from_millis(5);
/// Each injected sample is credited this many bits toward the estimate.
/// Conservative: timing jitter rarely carries a full bit of entropy per
/// sample, so this deliberately undercounts.
const BITS_PER_SAMPLE: u32 = 1;
const MAX_ESTIMATE: u32 = 4096;

struct Pool {
    state: Sha512,
    estimate: AtomicU32,
}

impl Pool {
    fn new() -> Self {
        let mut state = Sha512::new();
        // Seed from the OS CSPRNG so the pool is never predictable even
        // before the background collector has run.
        let mut seed = [0u8; 64];
        rand::rngs::OsRng.fill_bytes(&mut seed);
        state.update(seed);
        Self {
            state,
            estimate: AtomicU32::new(0),
        }
    }

    fn add(&mut self, data: &[u8], credited_bits: u32) {
        self.state.update(data);
        let new = self
            .estimate
            .load(Ordering::Relaxed)
            .saturating_add(credited_bits)
            .min(MAX_ESTIMATE);
        self.estimate.store(new, Ordering::Relaxed);
    }

    /// Derive `len` bytes from the current sponge state without consuming
    /// it — a cheap domain-separated squeeze, re-seeding the running
    /// digest afterward so repeated draws don't repeat.
    fn get(&mut self, len: usize, out: &mut [u8]) {
        let mut counter: u32 = 0;
        let mut produced = 0;
        while produced < len {
            let mut block = self.state.clone();
            block.update(counter.to_le_bytes());
            let digest = block.finalize();
            let take = (len - produced).min(digest.len());
            out[produced..produced + take].copy_from_slice(&digest[..take]);
            produced += take;
            counter += 1;
        }
        // Fold the squeezed output back in so the state visibly advances.
        self.state.update(out);
    }
}

static POOL: Lazy<Mutex<Pool>> = Lazy::new(|| Mutex::new(Pool::new()));
static COLLECTOR_STARTED: AtomicBool = AtomicBool::new(false);

fn with_pool<R>(f: impl FnOnce(&mut Pool) -> R) -> R {
    let mut guard = POOL.lock();
    f(&mut guard)
}

fn start_collector() {
    if COLLECTOR_STARTED.swap(true, Ordering::SeqCst) {
        return;
    }
    thread::Builder::new()
        .name("sqrl-entropy-collector".into())
        .spawn(|| loop {
            let sample = jitter_sample();
            with_pool(|pool| pool.add(&sample.to_le_bytes(), BITS_PER_SAMPLE));
            thread::sleep(POLL_INTERVAL);
        })
        .ok(); // best-effort: a failed spawn just means no background collection
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
fn cycle_counter() -> Option<u64> {
    // SAFETY: RDTSC is available on every x86/x86_64 target we build for;
    // it has no side effects and cannot fault.
    #[cfg(target_arch = "x86_64")]
    unsafe {
        Some(core::arch::x86_64::_rdtsc())
    }
    #[cfg(target_arch = "x86")]
    unsafe {
        Some(core::arch::x86::_rdtsc())
    }
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
fn cycle_counter() -> Option<u64> {
    None
}

/// A single timing sample: the cycle counter when available, or the low
/// bits of a monotonic clock read otherwise. Either way this is "free"
/// entropy credited conservatively, never the sole basis for a key.
fn jitter_sample() -> u64 {
    cycle_counter().unwrap_or_else(|| Instant::now().elapsed().subsec_nanos() as u64)
}

/// Mix externally observed data (mouse movement, keystroke timing, network
/// jitter) into the pool. `credited_bits` is the caller's (conservative)
/// estimate of how much entropy `data` actually carries.
pub fn add(data: &[u8], credited_bits: u32) {
    start_collector();
    with_pool(|pool| pool.add(data, credited_bits));
}

/// Current bit estimate for the pool.
pub fn estimate() -> u32 {
    start_collector();
    with_pool(|pool| pool.estimate.load(Ordering::Relaxed))
}

/// Draw `len` bytes from the pool, folding in a final slug of OS
/// randomness so output quality never falls below what `OsRng` alone
/// would provide.
pub fn get_bytes(len: usize) -> Vec<u8> {
    start_collector();
    let mut out = vec![0u8; len];
    with_pool(|pool| pool.get(len, &mut out));
    let mut os_bytes = vec![0u8; len];
    rand::rngs::OsRng.fill_bytes(&mut os_bytes);
    for (o, r) in out.iter_mut().zip(os_bytes.iter()) {
        *o ^= r;
    }
    out
}

/// Draw `len` bytes, failing if the pool's bit estimate is below
/// `min_bits`. Used before generating long-lived secrets (IUK, RLK).
/// This is the `get()` operation of spec §4.1.
pub fn get_bytes_checked(len: usize, min_bits: u32) -> Result<Vec<u8>> {
    let have = estimate();
    if have < min_bits {
        tracing::debug!(have, need = min_bits, "entropy pool draw rejected: insufficient estimate");
        return Err(Error::InsufficientEntropy {
            have,
            need: min_bits,
        });
    }
    tracing::trace!(len, have, "entropy pool draw");
    Ok(get_bytes(len))
}

/// Draw `len` bytes, blocking the calling thread until the background
/// collector has pushed the pool's estimate to at least `min_bits`. This
/// is the `get_blocking()` operation of spec §4.1 — unlike
/// [`get_bytes_checked`] it never fails, it waits.
pub fn get_blocking(len: usize, min_bits: u32) -> Vec<u8> {
    start_collector();
    while estimate() < min_bits {
        thread::sleep(BLOCKING_POLL_INTERVAL);
    }
    get_bytes(len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_grows_with_add() {
        let before = estimate();
        add(b"some observed jitter", 10);
        let after = estimate();
        assert!(after >= before + 10);
    }

    #[test]
    fn test_get_bytes_is_not_all_zero() {
        let bytes = get_bytes(32);
        assert_eq!(bytes.len(), 32);
        assert!(bytes.iter().any(|&b| b != 0));
    }

    #[test]
    fn test_get_bytes_checked_rejects_low_estimate() {
        let err = get_bytes_checked(32, u32::MAX);
        assert!(matches!(err, Err(Error::InsufficientEntropy { .. })));
    }

    #[test]
    fn test_successive_draws_differ() {
        let a = get_bytes(16);
        let b = get_bytes(16);
        assert_ne!(a, b);
    }

    #[test]
    fn test_get_blocking_returns_once_estimate_met() {
        add(b"prime the pool for the blocking test", 4096);
        let bytes = get_blocking(32, 1);
        assert_eq!(bytes.len(), 32);
    }
}
