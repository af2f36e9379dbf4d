use crate::cursor;
use crate::error::{ReaderError, Result};
use jiff::Timestamp;
use portal_core::{CustomerId, IndexCursor, Link};
use std::cmp::Ordering;
use std::str::FromStr;

pub const DEFAULT_LIMIT: u32 = 20;
pub const MAX_LIMIT: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Expired,
}

impl StatusFilter {
    pub fn matches(self, link: &Link, now: Timestamp) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Active => !link.is_expired_at(now),
            StatusFilter::Expired => link.is_expired_at(now),
        }
    }
}

impl FromStr for StatusFilter {
    type Err = ReaderError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "all" => Ok(StatusFilter::All),
            "active" => Ok(StatusFilter::Active),
            "expired" => Ok(StatusFilter::Expired),
            other => Err(unknown("status", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlugTypeFilter {
    #[default]
    All,
    Custom,
    Auto,
}

impl SlugTypeFilter {
    pub fn matches(self, link: &Link) -> bool {
        match self {
            SlugTypeFilter::All => true,
            SlugTypeFilter::Custom => link.has_custom_slug(),
            SlugTypeFilter::Auto => !link.has_custom_slug(),
        }
    }
}

impl FromStr for SlugTypeFilter {
    type Err = ReaderError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "all" => Ok(SlugTypeFilter::All),
            "custom" => Ok(SlugTypeFilter::Custom),
            "auto" => Ok(SlugTypeFilter::Auto),
            other => Err(unknown("slug_type", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    /// The customer index order.
    #[default]
    CreatedAt,
    UpdatedAt,
    Clicks,
    OriginalUrl,
    CustomSlug,
    ExpirationDate,
}

impl FromStr for SortField {
    type Err = ReaderError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "created_at" => Ok(SortField::CreatedAt),
            "updated_at" => Ok(SortField::UpdatedAt),
            "clicks" => Ok(SortField::Clicks),
            "original_url" => Ok(SortField::OriginalUrl),
            "custom_slug" => Ok(SortField::CustomSlug),
            "expiration_date" => Ok(SortField::ExpirationDate),
            other => Err(unknown("sort_by", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl FromStr for SortDirection {
    type Err = ReaderError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(unknown("sort_direction", other)),
        }
    }
}

fn unknown(field: &str, value: &str) -> ReaderError {
    ReaderError::InvalidArgument(format!("unknown {field}: '{value}'"))
}

/// Where a listing starts in the customer index.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PageStart {
    #[default]
    First,
    /// Resume strictly after a previously returned position.
    After(IndexCursor),
    /// Skip this many index entries. Costs a walk over all of them.
    Offset(u32),
}

/// Raw listing arguments as they arrive over the wire.
///
/// Empty strings count as absent.
#[derive(Debug, Clone, Default)]
pub struct ListLinksParams {
    pub customer_id: String,
    pub limit: Option<u32>,
    pub cursor: Option<String>,
    pub offset: Option<u32>,
    pub search: Option<String>,
    pub status: Option<String>,
    pub slug_type: Option<String>,
    pub sort_by: Option<String>,
    pub sort_direction: Option<String>,
}

/// A validated listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub customer_id: CustomerId,
    pub limit: u32,
    pub start: PageStart,
    pub search: Option<String>,
    pub status: StatusFilter,
    pub slug_type: SlugTypeFilter,
    pub sort_by: SortField,
    pub direction: SortDirection,
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or_default<T: FromStr<Err = ReaderError> + Default>(value: Option<String>) -> Result<T> {
    present(value)
        .map(|v| v.to_ascii_lowercase().parse())
        .transpose()
        .map(Option::unwrap_or_default)
}

impl TryFrom<ListLinksParams> for ListQuery {
    type Error = ReaderError;

    fn try_from(params: ListLinksParams) -> Result<Self> {
        let customer_id = CustomerId::new(params.customer_id)?;

        let limit = match params.limit {
            None | Some(0) => DEFAULT_LIMIT,
            Some(limit) => limit.min(MAX_LIMIT),
        };

        let start = match (present(params.cursor), params.offset) {
            (Some(_), Some(offset)) if offset > 0 => {
                return Err(ReaderError::InvalidArgument(
                    "cursor and offset are mutually exclusive".to_string(),
                ))
            }
            (Some(token), _) => PageStart::After(cursor::decode(&token)?),
            (None, Some(offset)) if offset > 0 => PageStart::Offset(offset),
            (None, _) => PageStart::First,
        };

        Ok(Self {
            customer_id,
            limit,
            start,
            search: present(params.search),
            status: parse_or_default(params.status)?,
            slug_type: parse_or_default(params.slug_type)?,
            sort_by: parse_or_default(params.sort_by)?,
            direction: parse_or_default(params.sort_direction)?,
        })
    }
}

impl ListQuery {
    /// Applies the search, status and slug type filters.
    pub fn matches(&self, link: &Link, now: Timestamp) -> bool {
        let searched = match &self.search {
            Some(term) => link
                .custom_slug
                .as_deref()
                .is_some_and(|slug| slug.contains(term.as_str())),
            None => true,
        };

        searched && self.status.matches(link, now) && self.slug_type.matches(link)
    }

    /// Orders one page of links that arrived in index order (newest first).
    ///
    /// Only the page is reordered; ordering across pages always follows the
    /// index.
    pub fn sort(&self, links: &mut [Link]) {
        let compare: fn(&Link, &Link) -> Ordering = match self.sort_by {
            SortField::CreatedAt => {
                if self.direction == SortDirection::Asc {
                    links.reverse();
                }
                return;
            }
            SortField::UpdatedAt => |a, b| a.updated_at.cmp(&b.updated_at),
            SortField::Clicks => |a, b| a.clicks.cmp(&b.clicks),
            SortField::OriginalUrl => |a, b| a.original_url.cmp(&b.original_url),
            SortField::CustomSlug => |a, b| a.custom_slug.cmp(&b.custom_slug),
            SortField::ExpirationDate => |a, b| a.expiration_date.cmp(&b.expiration_date),
        };

        match self.direction {
            SortDirection::Asc => links.sort_by(compare),
            SortDirection::Desc => links.sort_by(|a, b| compare(b, a)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_core::{LinkId, ShortCode};

    fn ts(second: i64) -> Timestamp {
        Timestamp::from_second(second).unwrap()
    }

    fn link(code: &str, slug: Option<&str>, created_at: i64, clicks: u64) -> Link {
        Link {
            id: LinkId::new_unchecked(format!("id-{code}")),
            short_code: ShortCode::new_unchecked(code),
            original_url: format!("https://{code}.example"),
            custom_slug: slug.map(str::to_string),
            customer_id: CustomerId::new("c1").unwrap(),
            clicks,
            created_at: ts(created_at),
            updated_at: ts(created_at),
            expiration_date: None,
        }
    }

    fn params() -> ListLinksParams {
        ListLinksParams {
            customer_id: "c1".to_string(),
            ..Default::default()
        }
    }

    fn query(params: ListLinksParams) -> ListQuery {
        ListQuery::try_from(params).unwrap()
    }

    #[test]
    fn defaults() {
        let q = query(params());
        assert_eq!(q.limit, DEFAULT_LIMIT);
        assert_eq!(q.start, PageStart::First);
        assert_eq!(q.search, None);
        assert_eq!(q.status, StatusFilter::All);
        assert_eq!(q.slug_type, SlugTypeFilter::All);
        assert_eq!(q.sort_by, SortField::CreatedAt);
        assert_eq!(q.direction, SortDirection::Desc);
    }

    #[test]
    fn limit_is_clamped() {
        let limit = |limit| {
            query(ListLinksParams {
                limit: Some(limit),
                ..params()
            })
            .limit
        };
        assert_eq!(limit(0), DEFAULT_LIMIT);
        assert_eq!(limit(1), 1);
        assert_eq!(limit(500), MAX_LIMIT);
    }

    #[test]
    fn enum_values_parse_and_empty_means_default() {
        let q = query(ListLinksParams {
            status: Some("expired".to_string()),
            slug_type: Some("CUSTOM".to_string()),
            sort_by: Some("clicks".to_string()),
            sort_direction: Some("asc".to_string()),
            search: Some("  ".to_string()),
            ..params()
        });
        assert_eq!(q.status, StatusFilter::Expired);
        assert_eq!(q.slug_type, SlugTypeFilter::Custom);
        assert_eq!(q.sort_by, SortField::Clicks);
        assert_eq!(q.direction, SortDirection::Asc);
        assert_eq!(q.search, None);

        let q = query(ListLinksParams {
            status: Some(String::new()),
            ..params()
        });
        assert_eq!(q.status, StatusFilter::All);
    }

    #[test]
    fn invalid_arguments() {
        let cases = [
            ListLinksParams {
                customer_id: String::new(),
                ..Default::default()
            },
            ListLinksParams {
                status: Some("archived".to_string()),
                ..params()
            },
            ListLinksParams {
                sort_by: Some("title".to_string()),
                ..params()
            },
            ListLinksParams {
                sort_direction: Some("up".to_string()),
                ..params()
            },
            ListLinksParams {
                slug_type: Some("vanity".to_string()),
                ..params()
            },
            ListLinksParams {
                cursor: Some("not a cursor".to_string()),
                ..params()
            },
            ListLinksParams {
                cursor: Some(cursor::encode(&IndexCursor {
                    created_at: ts(1),
                    short_code: ShortCode::new_unchecked("abc"),
                })),
                offset: Some(5),
                ..params()
            },
        ];

        for case in cases {
            assert!(
                matches!(ListQuery::try_from(case.clone()), Err(ReaderError::InvalidArgument(_))),
                "{case:?}"
            );
        }
    }

    #[test]
    fn start_position() {
        let position = IndexCursor {
            created_at: ts(100),
            short_code: ShortCode::new_unchecked("abc123"),
        };

        let q = query(ListLinksParams {
            cursor: Some(cursor::encode(&position)),
            offset: Some(0),
            ..params()
        });
        assert_eq!(q.start, PageStart::After(position));

        let q = query(ListLinksParams {
            offset: Some(40),
            ..params()
        });
        assert_eq!(q.start, PageStart::Offset(40));
    }

    #[test]
    fn filters() {
        let now = ts(1_000);
        let mut expired = link("old", Some("spring-sale"), 100, 0);
        expired.expiration_date = Some(ts(900));
        let mut active = link("new", None, 200, 0);
        active.expiration_date = Some(ts(2_000));
        let forever = link("perm", Some("about"), 300, 0);

        let q = query(ListLinksParams {
            status: Some("expired".to_string()),
            ..params()
        });
        assert!(q.matches(&expired, now));
        assert!(!q.matches(&active, now));
        assert!(!q.matches(&forever, now));

        let q = query(ListLinksParams {
            status: Some("active".to_string()),
            slug_type: Some("auto".to_string()),
            ..params()
        });
        assert!(!q.matches(&expired, now));
        assert!(q.matches(&active, now));
        assert!(!q.matches(&forever, now));

        let q = query(ListLinksParams {
            search: Some("sale".to_string()),
            ..params()
        });
        assert!(q.matches(&expired, now));
        assert!(!q.matches(&active, now));
        assert!(!q.matches(&forever, now));
    }

    #[test]
    fn created_at_ascending_reverses_the_page() {
        let mut page = vec![link("c", None, 300, 0), link("b", None, 200, 0), link("a", None, 100, 0)];

        query(params()).sort(&mut page);
        let codes: Vec<_> = page.iter().map(|l| l.short_code.as_str()).collect();
        assert_eq!(codes, vec!["c", "b", "a"]);

        query(ListLinksParams {
            sort_direction: Some("asc".to_string()),
            ..params()
        })
        .sort(&mut page);
        let codes: Vec<_> = page.iter().map(|l| l.short_code.as_str()).collect();
        assert_eq!(codes, vec!["a", "b", "c"]);
    }

    #[test]
    fn sorts_by_other_fields_within_the_page() {
        let mut page = vec![
            link("a", Some("zeta"), 300, 5),
            link("b", None, 200, 9),
            link("c", Some("alpha"), 100, 1),
        ];

        query(ListLinksParams {
            sort_by: Some("clicks".to_string()),
            ..params()
        })
        .sort(&mut page);
        let clicks: Vec<_> = page.iter().map(|l| l.clicks).collect();
        assert_eq!(clicks, vec![9, 5, 1]);

        query(ListLinksParams {
            sort_by: Some("custom_slug".to_string()),
            sort_direction: Some("asc".to_string()),
            ..params()
        })
        .sort(&mut page);
        let slugs: Vec<_> = page.iter().map(|l| l.custom_slug.as_deref()).collect();
        assert_eq!(slugs, vec![None, Some("alpha"), Some("zeta")]);
    }
}
