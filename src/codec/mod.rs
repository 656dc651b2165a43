//! # Codecs
//!
//! The textual encodings used to move identity material in and out of the
//! core: the SQRL base64url variant (no padding, tolerant of noise),
//! plain hex, URL percent-encoding, and the rescue code's digit grouping.

pub mod base64;
pub mod hex;
pub mod rescue_code;
pub mod urlencode;
