//! Verbatim quote verification
//!
//! Quoted text in a story is later used to find the exact moment in the
//! meeting recording, so every quote must appear in the source as spoken.

mod protocol;
pub mod quotes;

pub use protocol::{QuoteVerifier, Verification, VerificationWarning, MAX_ROUNDS};
pub use quotes::{extract_quotes, find_unmatched, normalize, NormalizedSource};
