use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// The primary key of a link: the path segment of its short URL.
///
/// Codes are either produced by a generator or chosen by the caller as a
/// custom slug. Custom slugs must be 3-32 characters long and contain only
/// alphanumeric characters, hyphens, or underscores.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShortCode(String);

const MIN_LENGTH: usize = 3;
const MAX_LENGTH: usize = 32;

impl ShortCode {
    /// Creates a new `ShortCode` after validating the input.
    ///
    /// Valid codes are 3-32 characters and contain only `[a-zA-Z0-9_-]`.
    pub fn new(code: impl Into<String>) -> Result<Self, CoreError> {
        let code = code.into();
        Self::validate(&code)?;
        Ok(Self(code))
    }

    /// Creates a `ShortCode` without validation.
    ///
    /// Use this for codes produced by trusted internal sources (generators,
    /// records read back from the store) and for lookups, where an
    /// ill-formed code simply finds nothing.
    pub fn new_unchecked(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Generates the full shortened URL based on the provided base URL.
    pub fn to_url(&self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self)
    }

    /// Extracts a short code from caller input that may be a full short URL.
    ///
    /// If `input` starts with `base_url` followed by `/`, the prefix is
    /// stripped. Anything else is taken verbatim.
    pub fn from_input(input: &str, base_url: &str) -> Option<Self> {
        let input = input.trim();
        let prefix = format!("{}/", base_url.trim_end_matches('/'));
        let code = match input.strip_prefix(prefix.as_str()) {
            Some(rest) if !base_url.is_empty() => rest,
            _ => input,
        };
        let code = code.trim_end_matches('/');
        if code.is_empty() {
            return None;
        }
        Some(Self::new_unchecked(code))
    }

    /// Returns the short code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(code: &str) -> Result<(), CoreError> {
        if code.len() < MIN_LENGTH || code.len() > MAX_LENGTH {
            return Err(CoreError::InvalidShortCode(format!(
                "length must be between {} and {}, got {}",
                MIN_LENGTH,
                MAX_LENGTH,
                code.len()
            )));
        }

        if !code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(CoreError::InvalidShortCode(format!(
                "must contain only alphanumeric characters, hyphens, or underscores: '{}'",
                code
            )));
        }

        Ok(())
    }
}

impl Display for ShortCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_codes() {
        assert!(ShortCode::new("abc").is_ok());
        assert!(ShortCode::new("Abc-123_xyz").is_ok());
        assert!(ShortCode::new("a".repeat(32)).is_ok());
    }

    #[test]
    fn too_short() {
        assert!(ShortCode::new("ab").is_err());
        assert!(ShortCode::new("").is_err());
    }

    #[test]
    fn too_long() {
        assert!(ShortCode::new("a".repeat(33)).is_err());
    }

    #[test]
    fn invalid_characters() {
        assert!(ShortCode::new("abc def").is_err());
        assert!(ShortCode::new("abc/def").is_err());
        assert!(ShortCode::new("abc!def").is_err());
    }

    #[test]
    fn to_url() {
        let code = ShortCode::new("abc123").unwrap();
        assert_eq!(code.to_url("https://por.tl"), "https://por.tl/abc123");
        assert_eq!(code.to_url("https://por.tl/"), "https://por.tl/abc123");
    }

    #[test]
    fn from_input_strips_base_url() {
        let code = ShortCode::from_input("https://por.tl/abc123", "https://por.tl").unwrap();
        assert_eq!(code.as_str(), "abc123");

        let code = ShortCode::from_input("https://por.tl/abc123", "https://por.tl/").unwrap();
        assert_eq!(code.as_str(), "abc123");
    }

    #[test]
    fn from_input_keeps_bare_codes() {
        let code = ShortCode::from_input("abc123", "https://por.tl").unwrap();
        assert_eq!(code.as_str(), "abc123");
    }

    #[test]
    fn from_input_leaves_foreign_hosts_alone() {
        let code = ShortCode::from_input("https://other.tl/abc123", "https://por.tl").unwrap();
        assert_eq!(code.as_str(), "https://other.tl/abc123");
    }

    #[test]
    fn from_input_rejects_empty() {
        assert!(ShortCode::from_input("", "https://por.tl").is_none());
        assert!(ShortCode::from_input("https://por.tl/", "https://por.tl").is_none());
    }

    #[test]
    fn serializes_as_plain_string() {
        let code = ShortCode::new_unchecked("abc123");
        assert_eq!(serde_json::to_string(&code).unwrap(), "\"abc123\"");
    }
}
