use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use jiff::Timestamp;
use portal_core::repository::Result;
use portal_core::{
    Clock, CustomerIndexQuery, IndexCursor, IndexPage, Link, LinkId, ReadConsistency,
    ReadRepository, Repository, ShortCode, StorageError,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

/// In-memory implementation of the link store using DashMap.
///
/// Mirrors the key-value store contract: single-key conditional writes
/// through the entry API, atomic counter updates under the shard lock, and
/// secondary lookups that scan the table. Expired records stay in place
/// until [`InMemoryRepository::purge_expired`] runs, the same way a store's
/// background TTL deletion lags behind the expiration time.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    storage: DashMap<String, Link>,
}

impl InMemoryRepository {
    /// Creates a new in-memory repository.
    pub fn new() -> Self {
        Self {
            storage: DashMap::new(),
        }
    }

    /// Number of stored records, expired ones included.
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Removes every record whose TTL has passed at `now`.
    ///
    /// Returns the number of records removed.
    pub fn purge_expired(&self, now: Timestamp) -> usize {
        let cutoff = now.as_second();
        let mut removed = 0;
        self.storage.retain(|_, link| {
            let expired = link.ttl().is_some_and(|ttl| ttl <= cutoff);
            if expired {
                removed += 1;
            }
            !expired
        });
        if removed > 0 {
            debug!(removed, remaining = self.len(), "purged expired links");
        }
        removed
    }

    /// Runs [`InMemoryRepository::purge_expired`] every `every` until the
    /// returned task is aborted.
    pub fn spawn_ttl_sweeper(
        self: Arc<Self>,
        clock: Arc<dyn Clock>,
        every: Duration,
    ) -> JoinHandle<()> {
        let every = every.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.purge_expired(clock.now());
            }
        })
    }

    fn find(&self, predicate: impl Fn(&Link) -> bool) -> Option<Link> {
        self.storage
            .iter()
            .find(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
    }
}

/// Sort key of the customer index, newest first.
fn index_key(link: &Link) -> (Timestamp, &ShortCode) {
    (link.created_at, &link.short_code)
}

fn is_after(link: &Link, cursor: &IndexCursor) -> bool {
    index_key(link) < (cursor.created_at, &cursor.short_code)
}

#[async_trait]
impl ReadRepository for InMemoryRepository {
    async fn get(&self, code: &ShortCode, _consistency: ReadConsistency) -> Result<Option<Link>> {
        trace!(short_code = %code, "get");
        Ok(self.storage.get(code.as_str()).map(|e| e.value().clone()))
    }

    async fn exists(&self, code: &ShortCode) -> Result<bool> {
        Ok(self.storage.contains_key(code.as_str()))
    }

    async fn find_by_id(&self, id: &LinkId) -> Result<Option<Link>> {
        trace!(link_id = %id, "find by id");
        Ok(self.find(|link| &link.id == id))
    }

    async fn find_by_custom_slug(&self, slug: &str) -> Result<Option<Link>> {
        trace!(custom_slug = slug, "find by custom slug");
        Ok(self.find(|link| link.custom_slug.as_deref() == Some(slug)))
    }

    async fn query_by_customer(&self, query: &CustomerIndexQuery) -> Result<IndexPage> {
        let mut links: Vec<Link> = self
            .storage
            .iter()
            .filter(|entry| entry.value().customer_id == query.customer_id)
            .filter(|entry| {
                query
                    .start_after
                    .as_ref()
                    .is_none_or(|cursor| is_after(entry.value(), cursor))
            })
            .map(|entry| entry.value().clone())
            .collect();

        links.sort_by(|a, b| index_key(b).cmp(&index_key(a)));

        let limit = query.limit.max(1) as usize;
        let has_more = links.len() > limit;
        links.truncate(limit);

        let last_evaluated = if has_more {
            links.last().map(IndexCursor::of)
        } else {
            None
        };

        trace!(
            customer_id = %query.customer_id,
            returned = links.len(),
            has_more,
            "query by customer"
        );

        Ok(IndexPage {
            links,
            last_evaluated,
        })
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn insert(&self, link: &Link) -> Result<()> {
        match self.storage.entry(link.short_code.as_str().to_owned()) {
            Entry::Occupied(_) => Err(StorageError::Conflict(link.short_code.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(link.clone());
                Ok(())
            }
        }
    }

    async fn replace(&self, link: &Link) -> Result<Link> {
        match self.storage.get_mut(link.short_code.as_str()) {
            Some(mut stored) => {
                let clicks = stored.clicks;
                *stored = Link {
                    clicks,
                    ..link.clone()
                };
                Ok(stored.clone())
            }
            None => Err(StorageError::Missing(link.short_code.to_string())),
        }
    }

    async fn delete(&self, code: &ShortCode) -> Result<bool> {
        Ok(self.storage.remove(code.as_str()).is_some())
    }

    async fn increment_clicks(
        &self,
        code: &ShortCode,
        updated_at: Timestamp,
    ) -> Result<Option<Link>> {
        Ok(self.storage.get_mut(code.as_str()).map(|mut stored| {
            stored.clicks = stored.clicks.saturating_add(1);
            stored.updated_at = updated_at;
            stored.clone()
        }))
    }
}
