//! Short access codes for private matches.
//!
//! Codes are what players read out to each other, so the alphabet drops
//! the glyphs people confuse (`0`/`O`, `1`/`I`) and comparison ignores
//! case.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Characters a generated code may contain.
pub const ACCESS_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Length of a generated code.
pub const ACCESS_CODE_LEN: usize = 6;

/// An access code as issued by the server. Always stored uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessCode(String);

impl AccessCode {
    /// Draws a fresh code from the thread-local RNG.
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::rng())
    }

    /// Draws a fresh code from `rng`. Seeded RNGs make this deterministic.
    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let code = (0..ACCESS_CODE_LEN)
            .map(|_| {
                let idx = rng.random_range(0..ACCESS_CODE_ALPHABET.len());
                ACCESS_CODE_ALPHABET[idx] as char
            })
            .collect();
        Self(code)
    }

    /// Wraps a code typed by a player, normalizing it to uppercase.
    ///
    /// No alphabet check: a code outside the alphabet simply never
    /// matches a generated one.
    pub fn parse(raw: &str) -> Self {
        Self(raw.trim().to_ascii_uppercase())
    }

    /// Case-insensitive comparison against a client-supplied code.
    pub fn matches(&self, candidate: &str) -> bool {
        self.0.eq_ignore_ascii_case(candidate.trim())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccessCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for AccessCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_uses_alphabet_and_length() {
        for _ in 0..200 {
            let code = AccessCode::generate();
            assert_eq!(code.as_str().len(), ACCESS_CODE_LEN);
            assert!(
                code.as_str()
                    .bytes()
                    .all(|b| ACCESS_CODE_ALPHABET.contains(&b)),
                "unexpected character in {code}"
            );
        }
    }

    #[test]
    fn test_generate_never_emits_ambiguous_glyphs() {
        for _ in 0..200 {
            let code = AccessCode::generate();
            assert!(!code.as_str().contains(['0', 'O', '1', 'I']));
        }
    }

    #[test]
    fn test_matches_ignores_case() {
        let code = AccessCode::parse("ABC234");
        assert!(code.matches("abc234"));
        assert!(code.matches("AbC234"));
        assert!(!code.matches("ABC235"));
    }

    #[test]
    fn test_parse_normalizes_to_uppercase() {
        assert_eq!(AccessCode::parse(" xyz789 ").as_str(), "XYZ789");
    }

    #[test]
    fn test_access_code_serializes_as_plain_string() {
        let code = AccessCode::parse("QWE234");
        let json = serde_json::to_string(&code).unwrap();
        assert_eq!(json, "\"QWE234\"");
    }
}
