use crate::error::{CoreError, Result};
use crate::shortcode::ShortCode;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Opaque, immutable identifier of a link record.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkId(String);

impl LinkId {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(CoreError::MissingField("id"));
        }
        Ok(Self(id))
    }

    pub fn new_unchecked(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for LinkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of the owning customer, as verified by the upstream session layer.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerId(String);

impl CustomerId {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(CoreError::MissingField("customer_id"));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CustomerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stored short link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub id: LinkId,
    /// Primary key of the store. Never changes once assigned.
    pub short_code: ShortCode,
    pub original_url: String,
    pub custom_slug: Option<String>,
    /// Owner. Never changes once assigned.
    pub customer_id: CustomerId,
    pub clicks: u64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub expiration_date: Option<Timestamp>,
}

impl Link {
    /// Store-managed deletion time in epoch seconds, derived from the
    /// expiration date.
    pub fn ttl(&self) -> Option<i64> {
        self.expiration_date.map(|at| at.as_second())
    }

    /// Whether the link's expiration date has been reached at `now`.
    ///
    /// The store may keep an expired record around for a while after its
    /// TTL, so callers must check this instead of relying on absence.
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        self.expiration_date.is_some_and(|at| at <= now)
    }

    pub fn has_custom_slug(&self) -> bool {
        self.custom_slug.as_deref().is_some_and(|s| !s.is_empty())
    }

    pub fn short_url(&self, base_url: &str) -> String {
        self.short_code.to_url(base_url)
    }
}

/// A presence-aware change to an optional field.
///
/// Distinguishes "leave as stored" from "clear" from "replace", which a bare
/// `Option` cannot express.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FieldUpdate<T> {
    #[default]
    Unchanged,
    Cleared,
    Set(T),
}

impl<T> FieldUpdate<T> {
    /// Applies the update on top of the currently stored value.
    pub fn apply(self, current: Option<T>) -> Option<T> {
        match self {
            FieldUpdate::Unchanged => current,
            FieldUpdate::Cleared => None,
            FieldUpdate::Set(value) => Some(value),
        }
    }

    pub fn as_set(&self) -> Option<&T> {
        match self {
            FieldUpdate::Set(value) => Some(value),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> FieldUpdate<U> {
        match self {
            FieldUpdate::Unchanged => FieldUpdate::Unchanged,
            FieldUpdate::Cleared => FieldUpdate::Cleared,
            FieldUpdate::Set(value) => FieldUpdate::Set(f(value)),
        }
    }
}

/// Checks that `url` is an absolute http(s) URL with a host.
pub fn validate_original_url(url: &str) -> Result<()> {
    if url.trim().is_empty() {
        return Err(CoreError::MissingField("original_url"));
    }

    let parsed = url::Url::parse(url).map_err(|e| CoreError::InvalidUrl(format!("{url}: {e}")))?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(CoreError::InvalidUrl(format!(
            "URL scheme must be http or https: {}",
            parsed.scheme()
        )));
    }

    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(CoreError::InvalidUrl(format!("URL must have a host: {url}")));
    }

    Ok(())
}

/// Parses an RFC 3339 expiration date such as `2024-12-31T23:59:59Z`.
pub fn parse_expiration(value: &str) -> Result<Timestamp> {
    value.trim().parse::<Timestamp>().map_err(|e| {
        CoreError::InvalidExpiration(format!(
            "'{value}' is not RFC 3339 (e.g., 2024-12-31T23:59:59Z): {e}"
        ))
    })
}

/// Rejects expiration dates that are not strictly after `now`.
pub fn ensure_future(expiration: Timestamp, now: Timestamp) -> Result<()> {
    if expiration <= now {
        return Err(CoreError::InvalidExpiration(format!(
            "expiration date must be in the future: {expiration}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::SignedDuration;

    fn link(expiration_date: Option<Timestamp>) -> Link {
        let now = Timestamp::from_second(1_700_000_000).unwrap();
        Link {
            id: LinkId::new_unchecked("aaaaaaaaaa"),
            short_code: ShortCode::new_unchecked("abc123"),
            original_url: "https://example.com".to_string(),
            custom_slug: None,
            customer_id: CustomerId::new("c1").unwrap(),
            clicks: 0,
            created_at: now,
            updated_at: now,
            expiration_date,
        }
    }

    #[test]
    fn ttl_follows_expiration_date() {
        assert_eq!(link(None).ttl(), None);

        let at = Timestamp::from_second(1_800_000_000).unwrap();
        assert_eq!(link(Some(at)).ttl(), Some(1_800_000_000));
    }

    #[test]
    fn expiry_is_inclusive_of_the_deadline() {
        let at = Timestamp::from_second(1_800_000_000).unwrap();
        let l = link(Some(at));
        assert!(!l.is_expired_at(at - SignedDuration::from_secs(1)));
        assert!(l.is_expired_at(at));
        assert!(!link(None).is_expired_at(at));
    }

    #[test]
    fn field_update_apply() {
        assert_eq!(FieldUpdate::Unchanged.apply(Some(1)), Some(1));
        assert_eq!(FieldUpdate::<i32>::Cleared.apply(Some(1)), None);
        assert_eq!(FieldUpdate::Set(2).apply(Some(1)), Some(2));
        assert_eq!(FieldUpdate::Set(2).apply(None), Some(2));
    }

    #[test]
    fn empty_ids_are_rejected() {
        assert_eq!(
            CustomerId::new("  ").unwrap_err(),
            CoreError::MissingField("customer_id")
        );
        assert_eq!(LinkId::new("").unwrap_err(), CoreError::MissingField("id"));
    }

    #[test]
    fn urls() {
        assert!(validate_original_url("https://example.com").is_ok());
        assert!(validate_original_url("http://a.test/path?q=1").is_ok());
        assert!(matches!(
            validate_original_url(""),
            Err(CoreError::MissingField("original_url"))
        ));
        assert!(matches!(
            validate_original_url("not-a-valid-url"),
            Err(CoreError::InvalidUrl(_))
        ));
        assert!(matches!(
            validate_original_url("ftp://example.com"),
            Err(CoreError::InvalidUrl(_))
        ));
    }

    #[test]
    fn expiration_parsing() {
        let at = parse_expiration("2024-12-31T23:59:59Z").unwrap();
        assert_eq!(at.to_string(), "2024-12-31T23:59:59Z");

        let offset = parse_expiration("2025-01-01T01:59:59+02:00").unwrap();
        assert_eq!(offset, at);

        assert!(matches!(
            parse_expiration("tomorrow"),
            Err(CoreError::InvalidExpiration(_))
        ));
    }

    #[test]
    fn expiration_must_be_strictly_future() {
        let now = Timestamp::from_second(1_700_000_000).unwrap();
        assert!(ensure_future(now + SignedDuration::from_secs(1), now).is_ok());
        assert!(ensure_future(now, now).is_err());
        assert!(ensure_future(now - SignedDuration::from_secs(1), now).is_err());
    }
}
