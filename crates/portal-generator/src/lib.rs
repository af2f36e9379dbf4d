//! Identifier generation for link ids and auto-assigned short codes.

pub mod random;
pub mod seq;

pub use random::RandomGenerator;
pub use seq::SeqGenerator;

/// Length of generated link ids.
pub const ID_LENGTH: usize = 10;
/// Length of auto-generated short codes.
pub const SHORT_CODE_LENGTH: usize = 6;

/// The 62 characters generated identifiers are drawn from.
pub const ALPHABET: &[u8; 62] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Trait for generating identifiers.
///
/// Implementations are pure generators that don't interact with storage;
/// callers that need uniqueness check it against the store themselves.
pub trait Generator: Send + Sync + 'static {
    /// Generates a `length`-character alphanumeric identifier.
    fn generate(&self, length: usize) -> String;
}

impl Generator for Box<dyn Generator> {
    fn generate(&self, length: usize) -> String {
        (**self).generate(length)
    }
}
