use crate::{Generator, ALPHABET};
use std::sync::atomic::{AtomicU64, Ordering};

/// A deterministic generator backed by a counter.
///
/// Produces "aaaaaa", "aaaaab", ... : the counter written in base 62 over
/// [`ALPHABET`], left-padded to the requested length. Unique within a single
/// instance as long as the counter fits in `length` digits; useful for tests
/// and local development where reproducible codes help.
#[derive(Debug)]
pub struct SeqGenerator {
    counter: AtomicU64,
}

impl Clone for SeqGenerator {
    fn clone(&self) -> Self {
        Self {
            counter: AtomicU64::new(self.counter.load(Ordering::SeqCst)),
        }
    }
}

impl Default for SeqGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl SeqGenerator {
    pub fn new() -> Self {
        Self::with_offset(0)
    }

    /// Creates a generator starting from a specific counter value.
    pub fn with_offset(offset: u64) -> Self {
        Self {
            counter: AtomicU64::new(offset),
        }
    }
}

fn encode(mut value: u64, length: usize) -> String {
    let base = ALPHABET.len() as u64;
    let mut digits = vec![ALPHABET[0]; length];
    for slot in digits.iter_mut().rev() {
        *slot = ALPHABET[(value % base) as usize];
        value /= base;
    }
    digits.into_iter().map(char::from).collect()
}

impl Generator for SeqGenerator {
    fn generate(&self, length: usize) -> String {
        let count = self.counter.fetch_add(1, Ordering::SeqCst);
        encode(count, length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn produces_sequential_codes() {
        let generator = SeqGenerator::new();

        assert_eq!(generator.generate(6), "aaaaaa");
        assert_eq!(generator.generate(6), "aaaaab");
        assert_eq!(generator.generate(6), "aaaaac");
    }

    #[test]
    fn carries_into_the_next_digit() {
        let generator = SeqGenerator::with_offset(62);
        assert_eq!(generator.generate(6), "aaaaba");
    }

    #[test]
    fn honours_requested_length() {
        let generator = SeqGenerator::with_offset(61);
        assert_eq!(generator.generate(10), "aaaaaaaaa9");
    }

    #[test]
    fn clone_preserves_counter_state() {
        let generator = SeqGenerator::new();
        generator.generate(6);
        generator.generate(6);

        let cloned = generator.clone();

        assert_eq!(generator.generate(6), "aaaaac");
        assert_eq!(cloned.generate(6), "aaaaac");
    }
}
