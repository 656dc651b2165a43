//! Known-answer vectors for EnHash, the 16-round SHA-256 XOR fold.
//!
//! Each line of `tests/fixtures/enhash-vectors.txt` is a 43-char
//! unpadded base64url input followed by its 43-char expected EnHash
//! output, space-separated. Every line must round-trip with bit
//! exactness — spec §8 scenario 1.

use sqrl_identity_core::codec::base64;
use sqrl_identity_core::kdf::enhash;

const VECTORS: &str = include_str!("fixtures/enhash-vectors.txt");

#[test]
fn enhash_known_answer_vectors() {
    let mut checked = 0;
    for line in VECTORS.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut parts = line.split_whitespace();
        let input_b64 = parts.next().expect("vector line missing input column");
        let expected_b64 = parts.next().expect("vector line missing expected column");
        assert_eq!(input_b64.len(), 43, "input column must be 43 unpadded base64url chars");
        assert_eq!(expected_b64.len(), 43, "expected column must be 43 unpadded base64url chars");

        let input_bytes = base64::decode(input_b64);
        let expected_bytes = base64::decode(expected_b64);
        let input: [u8; 32] = input_bytes.try_into().expect("vector input must decode to 32 bytes");
        let expected: [u8; 32] = expected_bytes.try_into().expect("vector output must decode to 32 bytes");

        assert_eq!(enhash(&input), expected, "EnHash mismatch for input {input_b64}");
        checked += 1;
    }
    assert!(checked > 0, "no vectors were read from the fixture file");
}
