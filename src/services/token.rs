//! Secure random token generator
//!
//! Opaque tokens for account confirmation and anywhere else an unguessable
//! identifier is needed. Characters are drawn uniformly from a 62-character
//! alphabet using the operating system's secure random source.

/// Alphabet tokens are drawn from.
pub const ALPHABET: &[u8; 62] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Length used for confirmation tokens.
pub const DEFAULT_TOKEN_LENGTH: usize = 30;

// Largest multiple of 62 that fits in a byte; bytes at or above it are
// rejected so every character stays equally likely.
const REJECTION_THRESHOLD: u8 = 248;

/// Errors produced by the token generator
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Secure random source unavailable: {0}")]
    RandomSourceUnavailable(String),

    #[error("Token length must be at least 1")]
    InvalidLength,
}

/// Source of cryptographically secure random bytes.
pub trait RandomSource: Send + Sync {
    fn fill(&self, buf: &mut [u8]) -> Result<(), TokenError>;
}

/// Random source backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill(&self, buf: &mut [u8]) -> Result<(), TokenError> {
        getrandom::fill(buf).map_err(|e| TokenError::RandomSourceUnavailable(e.to_string()))
    }
}

/// Generates random alphanumeric tokens.
#[derive(Debug, Clone, Default)]
pub struct TokenGenerator<R = OsRandom> {
    source: R,
}

impl TokenGenerator<OsRandom> {
    pub fn new() -> Self {
        Self { source: OsRandom }
    }
}

impl<R: RandomSource> TokenGenerator<R> {
    pub fn with_source(source: R) -> Self {
        Self { source }
    }

    /// Generate a token of exactly `length` characters.
    ///
    /// # Errors
    ///
    /// `InvalidLength` for a zero length, `RandomSourceUnavailable` when the
    /// secure source fails. There is no fallback to a weaker generator.
    pub fn generate(&self, length: usize) -> Result<String, TokenError> {
        if length == 0 {
            return Err(TokenError::InvalidLength);
        }

        let mut token = String::with_capacity(length);
        let mut buf = [0u8; 64];

        while token.len() < length {
            self.source.fill(&mut buf)?;
            for &byte in buf.iter() {
                if byte >= REJECTION_THRESHOLD {
                    continue;
                }
                token.push(ALPHABET[(byte % 62) as usize] as char);
                if token.len() == length {
                    break;
                }
            }
        }

        Ok(token)
    }

    /// Generate a token of [`DEFAULT_TOKEN_LENGTH`] characters.
    pub fn generate_default(&self) -> Result<String, TokenError> {
        self.generate(DEFAULT_TOKEN_LENGTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;

    struct BrokenSource;

    impl RandomSource for BrokenSource {
        fn fill(&self, _buf: &mut [u8]) -> Result<(), TokenError> {
            Err(TokenError::RandomSourceUnavailable("entropy pool closed".to_string()))
        }
    }

    /// Replays a fixed byte pattern.
    struct FixedSource(Vec<u8>);

    impl RandomSource for FixedSource {
        fn fill(&self, buf: &mut [u8]) -> Result<(), TokenError> {
            for (i, byte) in buf.iter_mut().enumerate() {
                *byte = self.0[i % self.0.len()];
            }
            Ok(())
        }
    }

    #[test]
    fn test_default_length() {
        let token = TokenGenerator::new().generate_default().unwrap();
        assert_eq!(token.len(), DEFAULT_TOKEN_LENGTH);
    }

    #[test]
    fn test_zero_length_rejected() {
        assert!(matches!(
            TokenGenerator::new().generate(0),
            Err(TokenError::InvalidLength)
        ));
    }

    #[test]
    fn test_broken_source_fails_instead_of_degrading() {
        let generator = TokenGenerator::with_source(BrokenSource);
        assert!(matches!(
            generator.generate(30),
            Err(TokenError::RandomSourceUnavailable(_))
        ));
    }

    #[test]
    fn test_bytes_above_threshold_are_rejected() {
        // 255 and 248 are skipped; 0 -> 'A', 61 -> '9', 62 -> 'A'
        let generator = TokenGenerator::with_source(FixedSource(vec![255, 0, 248, 61, 62]));
        assert_eq!(generator.generate(3).unwrap(), "A9A");
    }

    #[test]
    fn test_consecutive_tokens_differ() {
        let generator = TokenGenerator::new();
        let a = generator.generate(30).unwrap();
        let b = generator.generate(30).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_chi_square_uniformity() {
        const PER_SYMBOL: usize = 1000;
        let generator = TokenGenerator::new();
        let token = generator.generate(ALPHABET.len() * PER_SYMBOL).unwrap();

        let mut counts: HashMap<char, usize> = HashMap::new();
        for c in token.chars() {
            *counts.entry(c).or_default() += 1;
        }
        assert_eq!(counts.len(), ALPHABET.len());

        let expected = PER_SYMBOL as f64;
        let chi_square: f64 = counts
            .values()
            .map(|&observed| {
                let diff = observed as f64 - expected;
                diff * diff / expected
            })
            .sum();

        // 61 degrees of freedom; p = 0.0001 critical value is about 113.
        assert!(chi_square < 130.0, "chi-square too large: {}", chi_square);
    }

    proptest! {
        #[test]
        fn generated_tokens_have_requested_length_and_alphabet(length in 1usize..256) {
            let token = TokenGenerator::new().generate(length).unwrap();
            prop_assert_eq!(token.len(), length);
            prop_assert!(token.bytes().all(|b| ALPHABET.contains(&b)));
        }
    }
}
