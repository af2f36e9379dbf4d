use crate::error::StorageError;
use crate::link::{CustomerId, Link, LinkId};
use crate::shortcode::ShortCode;
use async_trait::async_trait;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Result type for link store operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Consistency requested for a primary-key read.
///
/// Index lookups are always eventually consistent; only reads by short code
/// can ask the store for the latest committed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadConsistency {
    #[default]
    Eventual,
    Strong,
}

/// Position in the customer index: the last key a page evaluated.
///
/// The index is ordered by `created_at`; `short_code` breaks ties and makes
/// the key unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexCursor {
    pub created_at: Timestamp,
    pub short_code: ShortCode,
}

impl IndexCursor {
    pub fn of(link: &Link) -> Self {
        Self {
            created_at: link.created_at,
            short_code: link.short_code.clone(),
        }
    }
}

/// One page of the customer index, newest first.
#[derive(Debug, Clone)]
pub struct CustomerIndexQuery {
    pub customer_id: CustomerId,
    pub limit: u32,
    /// Resume strictly after this key.
    pub start_after: Option<IndexCursor>,
}

#[derive(Debug, Clone, Default)]
pub struct IndexPage {
    pub links: Vec<Link>,
    /// Set when the index may hold more entries past this page.
    pub last_evaluated: Option<IndexCursor>,
}

/// A read-only view of the link store.
///
/// The read service only ever gets this view.
#[async_trait]
pub trait ReadRepository: Send + Sync + 'static {
    /// Looks a link up by its primary key.
    ///
    /// Expired records that the store has not reclaimed yet are returned
    /// as-is; expiration is the caller's concern.
    async fn get(&self, code: &ShortCode, consistency: ReadConsistency) -> Result<Option<Link>>;

    /// Checks whether a short code is taken, with a strongly consistent read.
    async fn exists(&self, code: &ShortCode) -> Result<bool>;

    /// Looks a link up through the id index.
    async fn find_by_id(&self, id: &LinkId) -> Result<Option<Link>>;

    /// Looks a link up through the custom slug index.
    async fn find_by_custom_slug(&self, slug: &str) -> Result<Option<Link>>;

    /// Reads one page of a customer's links, newest first.
    async fn query_by_customer(&self, query: &CustomerIndexQuery) -> Result<IndexPage>;
}

#[async_trait]
pub trait Repository: ReadRepository {
    /// Stores a new link only if its short code is not taken.
    ///
    /// Returns `Err(Conflict)` if the code already exists. This is the
    /// authoritative uniqueness check; an earlier [`ReadRepository::exists`]
    /// call is only a hint.
    async fn insert(&self, link: &Link) -> Result<()>;

    /// Overwrites the editable fields of a record, only if its short code
    /// still exists.
    ///
    /// The stored click counter is kept as-is; only
    /// [`Repository::increment_clicks`] moves it. Returns the record as
    /// stored after the write, or `Err(Missing)` if it vanished in the
    /// meantime.
    async fn replace(&self, link: &Link) -> Result<Link>;

    /// Deletes the link stored under `code`.
    /// Returns `true` if the record existed and was removed.
    async fn delete(&self, code: &ShortCode) -> Result<bool>;

    /// Atomically adds one to the click counter and stamps `updated_at`.
    ///
    /// Returns the record as it is after the increment, or `None` if the code
    /// does not exist.
    async fn increment_clicks(&self, code: &ShortCode, updated_at: Timestamp)
        -> Result<Option<Link>>;
}
