use crate::links::v1::Link;
use jiff::Timestamp;
use portal_core as core;
use portal_core::FieldUpdate;

/// Wire rendering of a timestamp: RFC 3339, UTC.
pub fn format_timestamp(at: Timestamp) -> String {
    at.to_string()
}

/// Reads a presence-aware optional string: absent keeps, empty clears.
pub fn field_update(value: Option<String>) -> FieldUpdate<String> {
    match value {
        None => FieldUpdate::Unchanged,
        Some(value) if value.trim().is_empty() => FieldUpdate::Cleared,
        Some(value) => FieldUpdate::Set(value),
    }
}

/// Treats an empty optional string the same as an absent one.
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Link {
    pub fn from_record(link: &core::Link, base_url: &str) -> Self {
        Self {
            id: link.id.to_string(),
            short_url: link.short_url(base_url),
            original_url: link.original_url.clone(),
            custom_slug: link.custom_slug.clone().filter(|s| !s.is_empty()),
            customer_id: link.customer_id.to_string(),
            clicks: link.clicks,
            created_at: format_timestamp(link.created_at),
            updated_at: format_timestamp(link.updated_at),
            expiration_date: link.expiration_date.map(format_timestamp),
        }
    }
}
