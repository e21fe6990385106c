use rand::{rngs::OsRng, RngCore};

/// 16 random bytes, 32 hex characters.
const DEFAULT_TOKEN_BYTES: usize = 16;

/// Produces the one-time tokens used by the confirmation and reset flows.
#[derive(Debug, Clone, Copy)]
pub struct TokenGenerator {
    bytes: usize,
}

impl Default for TokenGenerator {
    fn default() -> Self {
        Self {
            bytes: DEFAULT_TOKEN_BYTES,
        }
    }
}

impl TokenGenerator {
    pub fn generate(&self) -> String {
        let mut buffer = vec![0u8; self.bytes];
        OsRng.fill_bytes(&mut buffer);
        hex::encode(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_hex_and_unique() {
        let generator = TokenGenerator::default();
        let a = generator.generate();
        let b = generator.generate();

        assert_ne!(a, b);
        assert_eq!(a.len(), DEFAULT_TOKEN_BYTES * 2);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
