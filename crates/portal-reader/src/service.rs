use crate::cursor;
use crate::error::{ReaderError, Result};
use crate::query::{ListQuery, PageStart, MAX_LIMIT};
use async_trait::async_trait;
use portal_core::{
    Clock, CustomerId, CustomerIndexQuery, IndexCursor, Link, LinkId, ReadConsistency,
    ReadRepository, ShortCode, SystemClock,
};
use std::sync::Arc;
use tracing::{debug, instrument, trace};
use typed_builder::TypedBuilder;

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

#[derive(Clone, TypedBuilder)]
pub struct ReaderSettings {
    /// Prefix stripped from full short URLs and prepended to returned codes.
    #[builder(default = DEFAULT_BASE_URL.to_string(), setter(into))]
    pub base_url: String,
    #[builder(default = system_clock())]
    pub clock: Arc<dyn Clock>,
}

fn system_clock() -> Arc<dyn Clock> {
    Arc::new(SystemClock)
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// One page of a customer listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomerLinksPage {
    pub links: Vec<Link>,
    /// Pass back as the cursor to read the next page.
    pub next_cursor: Option<String>,
    /// Index entries read for this page, before filtering.
    pub scanned_count: u32,
}

#[async_trait]
pub trait LinkReader: Send + Sync + 'static {
    /// Resolves a bare short code or a full short URL.
    ///
    /// Fails with [`ReaderError::Expired`] for links past their expiration
    /// date, even if the store still holds them.
    async fn get_by_short_code(&self, input: &str, consistency: ReadConsistency) -> Result<Link>;

    async fn get_by_id(&self, id: &str) -> Result<Link>;

    async fn get_by_custom_slug(&self, slug: &str) -> Result<Link>;

    async fn list_by_customer(&self, query: ListQuery) -> Result<CustomerLinksPage>;

    fn base_url(&self) -> &str;
}

/// Where an offset walk ended up.
enum Resume {
    After(Option<IndexCursor>),
    Exhausted,
}

pub struct ReaderService<R> {
    repository: Arc<R>,
    settings: ReaderSettings,
}

impl<R> Clone for ReaderService<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            settings: self.settings.clone(),
        }
    }
}

impl<R: ReadRepository> ReaderService<R> {
    pub fn new(repository: R, settings: ReaderSettings) -> Self {
        Self::from_shared(Arc::new(repository), settings)
    }

    pub fn from_shared(repository: Arc<R>, settings: ReaderSettings) -> Self {
        Self {
            repository,
            settings,
        }
    }

    /// Walks the index past `offset` entries, discarding them.
    async fn skip(&self, customer_id: &CustomerId, offset: u32) -> Result<Resume> {
        let mut remaining = offset;
        let mut start_after = None;

        while remaining > 0 {
            let page = self
                .repository
                .query_by_customer(&CustomerIndexQuery {
                    customer_id: customer_id.clone(),
                    limit: remaining.min(MAX_LIMIT),
                    start_after: start_after.clone(),
                })
                .await?;

            let read = u32::try_from(page.links.len()).unwrap_or(u32::MAX);
            remaining = remaining.saturating_sub(read);
            trace!(read, remaining, "skipped index entries");

            if let Some(last) = page.links.last() {
                start_after = Some(IndexCursor::of(last));
            } else if page.last_evaluated.is_some() {
                start_after = page.last_evaluated.clone();
            }

            if remaining > 0 && page.last_evaluated.is_none() {
                return Ok(Resume::Exhausted);
            }
        }

        Ok(Resume::After(start_after))
    }
}

#[async_trait]
impl<R: ReadRepository> LinkReader for ReaderService<R> {
    #[instrument(skip(self))]
    async fn get_by_short_code(&self, input: &str, consistency: ReadConsistency) -> Result<Link> {
        let code = ShortCode::from_input(input, &self.settings.base_url)
            .ok_or_else(|| ReaderError::InvalidArgument("short_url is required".to_string()))?;

        let link = self
            .repository
            .get(&code, consistency)
            .await?
            .ok_or(ReaderError::NotFound)?;

        if link.is_expired_at(self.settings.clock.now()) {
            debug!(short_code = %code, "link has expired");
            return Err(ReaderError::Expired);
        }

        Ok(link)
    }

    #[instrument(skip(self))]
    async fn get_by_id(&self, id: &str) -> Result<Link> {
        let id = LinkId::new(id)?;
        self.repository
            .find_by_id(&id)
            .await?
            .ok_or(ReaderError::NotFound)
    }

    #[instrument(skip(self))]
    async fn get_by_custom_slug(&self, slug: &str) -> Result<Link> {
        let slug = slug.trim();
        if slug.is_empty() {
            return Err(ReaderError::InvalidArgument(
                "custom_slug is required".to_string(),
            ));
        }
        self.repository
            .find_by_custom_slug(slug)
            .await?
            .ok_or(ReaderError::NotFound)
    }

    #[instrument(skip_all, fields(customer_id = %query.customer_id, limit = query.limit))]
    async fn list_by_customer(&self, query: ListQuery) -> Result<CustomerLinksPage> {
        let start_after = match &query.start {
            PageStart::First => None,
            PageStart::After(cursor) => Some(cursor.clone()),
            PageStart::Offset(offset) => match self.skip(&query.customer_id, *offset).await? {
                Resume::After(cursor) => cursor,
                Resume::Exhausted => return Ok(CustomerLinksPage::default()),
            },
        };

        let page = self
            .repository
            .query_by_customer(&CustomerIndexQuery {
                customer_id: query.customer_id.clone(),
                limit: query.limit,
                start_after,
            })
            .await?;

        let scanned_count = u32::try_from(page.links.len()).unwrap_or(u32::MAX);
        let now = self.settings.clock.now();
        let mut links: Vec<Link> = page
            .links
            .into_iter()
            .filter(|link| query.matches(link, now))
            .collect();
        query.sort(&mut links);

        debug!(scanned_count, returned = links.len(), "listed customer links");

        Ok(CustomerLinksPage {
            links,
            next_cursor: page.last_evaluated.as_ref().map(cursor::encode),
            scanned_count,
        })
    }

    fn base_url(&self) -> &str {
        &self.settings.base_url
    }
}
