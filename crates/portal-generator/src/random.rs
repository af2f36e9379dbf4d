use crate::{Generator, ALPHABET};

/// Draws identifiers from the operating system's secure random source.
///
/// Each random byte is mapped onto [`ALPHABET`] by taking it modulo 62. The
/// slight bias toward the first characters is acceptable for identifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomGenerator;

impl RandomGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl Generator for RandomGenerator {
    fn generate(&self, length: usize) -> String {
        let mut bytes = vec![0u8; length];
        // Entropy exhaustion is fatal.
        getrandom::fill(&mut bytes).expect("system entropy source failed");

        bytes
            .into_iter()
            .map(|b| ALPHABET[usize::from(b) % ALPHABET.len()] as char)
            .collect()
    }
}
