//! The 24-digit decimal rescue code: the identity's fallback unlock
//! credential, generated from the entropy pool and fed into EnScrypt the
//! same way a password is, but without ever being transformed through a
//! word list — a rescue code is exactly the digits the user writes down.

use crate::config::RESCUE_CODE_LENGTH;
use crate::entropy;
use crate::error::{Error, Result};
use crate::secure_buffer::SecureBuffer;

/// Generate a fresh rescue code as `RESCUE_CODE_LENGTH` ASCII decimal
/// digit bytes (e.g. `b'0'..=b'9'`), suitable for passing directly into
/// `kdf::enscrypt` as the password.
pub fn generate() -> Result<SecureBuffer> {
    let raw = entropy::get_bytes_checked(RESCUE_CODE_LENGTH, crate::config::ENTROPY_NEEDED_BITS)?;
    let digits: Vec<u8> = raw.iter().map(|b| b'0' + (b % 10)).collect();
    Ok(SecureBuffer::new(digits))
}

/// Format a rescue code's raw digit bytes for display, grouped in
/// fours separated by dashes (`1234-5678-...`).
pub fn format_for_display(code: &SecureBuffer) -> String {
    let digits = code.as_bytes();
    let mut out = String::with_capacity(digits.len() + digits.len() / 4);
    for (i, &d) in digits.iter().enumerate() {
        if i != 0 && i % 4 == 0 {
            out.push('-');
        }
        out.push(d as char);
    }
    out
}

/// Parse a user-entered rescue code, discarding any non-digit grouping
/// characters (dashes, spaces), and validating the result is exactly
/// `RESCUE_CODE_LENGTH` decimal digits.
pub fn parse(input: &str) -> Result<SecureBuffer> {
    let digits: Vec<u8> = input.bytes().filter(u8::is_ascii_digit).collect();
    if digits.len() != RESCUE_CODE_LENGTH {
        return Err(Error::InvalidArgument(format!(
            "rescue code must have {} digits, got {}",
            RESCUE_CODE_LENGTH,
            digits.len()
        )));
    }
    Ok(SecureBuffer::new(digits))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_produces_right_length_and_digits() {
        let code = generate().unwrap();
        assert_eq!(code.len(), RESCUE_CODE_LENGTH);
        assert!(code.as_bytes().iter().all(u8::is_ascii_digit));
    }

    #[test]
    fn test_format_groups_in_fours() {
        let code = SecureBuffer::new(b"123456789012345678901234".to_vec());
        let formatted = format_for_display(&code);
        assert_eq!(formatted, "1234-5678-9012-3456-7890-1234");
    }

    #[test]
    fn test_parse_strips_grouping_and_roundtrips() {
        let code = generate().unwrap();
        let formatted = format_for_display(&code);
        let parsed = parse(&formatted).unwrap();
        assert_eq!(code, parsed);
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        assert!(parse("1234-5678").is_err());
    }
}
