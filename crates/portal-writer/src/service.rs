use crate::error::{Result, WriterError};
use async_trait::async_trait;
use jiff::Timestamp;
use portal_core::link::{ensure_future, parse_expiration, validate_original_url};
use portal_core::{
    Clock, CustomerId, FieldUpdate, Link, LinkId, Repository, ShortCode, StorageError,
    SystemClock,
};
use portal_generator::{Generator, ID_LENGTH, SHORT_CODE_LENGTH};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use typed_builder::TypedBuilder;

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";
pub const DEFAULT_MAX_CODE_ATTEMPTS: u32 = 8;
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(5);

/// Largest backoff exponent; keeps the delay bounded for large attempt caps.
const MAX_BACKOFF_SHIFT: u32 = 8;

#[derive(Clone, TypedBuilder)]
pub struct WriterSettings {
    /// Prefix of every short URL handed back to callers.
    #[builder(default = DEFAULT_BASE_URL.to_string(), setter(into))]
    pub base_url: String,
    #[builder(default = system_clock())]
    pub clock: Arc<dyn Clock>,
    /// Upper bound on short code draws per create.
    #[builder(default = DEFAULT_MAX_CODE_ATTEMPTS)]
    pub max_code_attempts: u32,
    /// Delay after the first collision; doubles on each further one.
    #[builder(default = DEFAULT_RETRY_BACKOFF)]
    pub retry_backoff: Duration,
}

fn system_clock() -> Arc<dyn Clock> {
    Arc::new(SystemClock)
}

impl Default for WriterSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CreateLinkParams {
    pub original_url: String,
    pub customer_id: String,
    /// Used verbatim as the short code when present.
    pub custom_slug: Option<String>,
    /// RFC 3339.
    pub expiration_date: Option<String>,
}

/// A full replacement of a link's mutable fields.
#[derive(Debug, Clone, Default)]
pub struct UpdateLinkParams {
    pub id: String,
    pub customer_id: String,
    pub original_url: String,
    pub custom_slug: FieldUpdate<String>,
    /// RFC 3339.
    pub expiration_date: FieldUpdate<String>,
}

#[async_trait]
pub trait LinkWriter: Send + Sync + 'static {
    /// Creates a link, allocating a short code unless a custom slug is given.
    async fn create_link(&self, params: CreateLinkParams) -> Result<Link>;

    /// Replaces the mutable fields of the caller's link.
    async fn update_link(&self, params: UpdateLinkParams) -> Result<Link>;

    /// Deletes the caller's link.
    async fn delete_link(&self, id: &str, customer_id: &str) -> Result<()>;

    /// Adds one click and returns the updated link.
    async fn increment_clicks(&self, id: &str) -> Result<Link>;

    /// Base URL that short URLs are rendered against.
    fn base_url(&self) -> &str;
}

/// The write service over a link store and an identifier generator.
///
/// Validates every input before touching the store, so a rejected request
/// never causes a store round-trip.
pub struct WriterService<R, G> {
    repository: Arc<R>,
    generator: Arc<G>,
    settings: WriterSettings,
}

impl<R, G> Clone for WriterService<R, G> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            generator: Arc::clone(&self.generator),
            settings: self.settings.clone(),
        }
    }
}

impl<R: Repository, G: Generator> WriterService<R, G> {
    pub fn new(repository: R, generator: G, settings: WriterSettings) -> Self {
        Self::from_shared(Arc::new(repository), Arc::new(generator), settings)
    }

    /// Creates a service over a store that is also used elsewhere.
    pub fn from_shared(repository: Arc<R>, generator: Arc<G>, settings: WriterSettings) -> Self {
        Self {
            repository,
            generator,
            settings,
        }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    fn now(&self) -> Timestamp {
        self.settings.clock.now()
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(MAX_BACKOFF_SHIFT);
        self.settings.retry_backoff.saturating_mul(1 << shift)
    }

    fn parse_future_expiration(&self, value: &str) -> Result<Timestamp> {
        let expiration = parse_expiration(value)?;
        ensure_future(expiration, self.now())?;
        Ok(expiration)
    }

    async fn load_owned(&self, id: &LinkId, customer_id: &CustomerId) -> Result<Link> {
        let link = self
            .repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| WriterError::NotFound(id.to_string()))?;

        if &link.customer_id != customer_id {
            warn!(link_id = %id, customer_id = %customer_id, "link owned by another customer");
            return Err(WriterError::PermissionDenied(format!(
                "link {id} does not belong to customer {customer_id}"
            )));
        }

        Ok(link)
    }

    async fn ensure_slug_free(&self, slug: &str, owner: Option<&LinkId>) -> Result<()> {
        match self.repository.find_by_custom_slug(slug).await? {
            Some(existing) if owner != Some(&existing.id) => {
                debug!(custom_slug = slug, "custom slug already taken");
                Err(WriterError::AlreadyExists(format!(
                    "custom slug '{slug}' is already in use"
                )))
            }
            _ => Ok(()),
        }
    }

    async fn insert_with_custom_slug(&self, link: Link) -> Result<Link> {
        self.ensure_slug_free(link.short_code.as_str(), None).await?;

        // The slug is the primary key, so the conditional put settles races
        // between concurrent creators of the same slug.
        match self.repository.insert(&link).await {
            Ok(()) => Ok(link),
            Err(StorageError::Conflict(code)) => Err(WriterError::AlreadyExists(format!(
                "custom slug '{code}' is already in use"
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn insert_with_generated_code(&self, mut link: Link) -> Result<Link> {
        let attempts = self.settings.max_code_attempts.max(1);

        for attempt in 1..=attempts {
            let code = ShortCode::new_unchecked(self.generator.generate(SHORT_CODE_LENGTH));

            if self.repository.exists(&code).await? {
                debug!(short_code = %code, attempt, "generated code taken");
            } else {
                link.short_code = code;
                match self.repository.insert(&link).await {
                    Ok(()) => return Ok(link),
                    Err(StorageError::Conflict(_)) => {
                        debug!(short_code = %link.short_code, attempt, "lost race for generated code");
                    }
                    Err(e) => return Err(e.into()),
                }
            }

            if attempt < attempts {
                tokio::time::sleep(self.backoff(attempt)).await;
            }
        }

        warn!(attempts, "short code allocation exhausted");
        Err(WriterError::AlreadyExists(format!(
            "no free short code after {attempts} attempts"
        )))
    }
}

#[async_trait]
impl<R: Repository, G: Generator> LinkWriter for WriterService<R, G> {
    #[instrument(skip_all, fields(customer_id = %params.customer_id))]
    async fn create_link(&self, params: CreateLinkParams) -> Result<Link> {
        validate_original_url(&params.original_url)?;
        let customer_id = CustomerId::new(params.customer_id)?;
        let custom_slug = params
            .custom_slug
            .filter(|slug| !slug.trim().is_empty())
            .map(ShortCode::new)
            .transpose()?;
        let expiration_date = params
            .expiration_date
            .as_deref()
            .filter(|value| !value.trim().is_empty())
            .map(|value| self.parse_future_expiration(value))
            .transpose()?;

        let now = self.now();
        let link = Link {
            id: LinkId::new_unchecked(self.generator.generate(ID_LENGTH)),
            // Generated codes are assigned during allocation.
            short_code: custom_slug
                .clone()
                .unwrap_or_else(|| ShortCode::new_unchecked(String::new())),
            original_url: params.original_url,
            custom_slug: custom_slug.as_ref().map(ShortCode::to_string),
            customer_id,
            clicks: 0,
            created_at: now,
            updated_at: now,
            expiration_date,
        };

        let link = match custom_slug {
            Some(_) => self.insert_with_custom_slug(link).await?,
            None => self.insert_with_generated_code(link).await?,
        };

        info!(link_id = %link.id, short_code = %link.short_code, "link created");
        Ok(link)
    }

    #[instrument(skip_all, fields(link_id = %params.id, customer_id = %params.customer_id))]
    async fn update_link(&self, params: UpdateLinkParams) -> Result<Link> {
        let id = LinkId::new(params.id)?;
        let customer_id = CustomerId::new(params.customer_id)?;
        validate_original_url(&params.original_url)?;
        if let Some(slug) = params.custom_slug.as_set() {
            ShortCode::new(slug.as_str())?;
        }
        let expiration_date = match params.expiration_date {
            FieldUpdate::Set(value) => FieldUpdate::Set(self.parse_future_expiration(&value)?),
            FieldUpdate::Cleared => FieldUpdate::Cleared,
            FieldUpdate::Unchanged => FieldUpdate::Unchanged,
        };

        let existing = self.load_owned(&id, &customer_id).await?;

        if let Some(slug) = params.custom_slug.as_set() {
            if existing.custom_slug.as_ref() != Some(slug) {
                self.ensure_slug_free(slug, Some(&existing.id)).await?;
            }
        }

        let updated = Link {
            original_url: params.original_url,
            custom_slug: params.custom_slug.apply(existing.custom_slug.clone()),
            expiration_date: expiration_date.apply(existing.expiration_date),
            updated_at: self.now(),
            ..existing
        };

        let stored = match self.repository.replace(&updated).await {
            Ok(stored) => stored,
            Err(StorageError::Missing(_)) => return Err(WriterError::NotFound(id.to_string())),
            Err(e) => return Err(e.into()),
        };

        info!(short_code = %stored.short_code, "link updated");
        Ok(stored)
    }

    #[instrument(skip(self))]
    async fn delete_link(&self, id: &str, customer_id: &str) -> Result<()> {
        let id = LinkId::new(id)?;
        let customer_id = CustomerId::new(customer_id)?;

        let link = self.load_owned(&id, &customer_id).await?;

        if !self.repository.delete(&link.short_code).await? {
            return Err(WriterError::NotFound(id.to_string()));
        }

        info!(short_code = %link.short_code, "link deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn increment_clicks(&self, id: &str) -> Result<Link> {
        let id = LinkId::new(id)?;

        let link = self
            .repository
            .find_by_id(&id)
            .await?
            .ok_or_else(|| WriterError::NotFound(id.to_string()))?;

        let updated = self
            .repository
            .increment_clicks(&link.short_code, self.now())
            .await?
            .ok_or_else(|| WriterError::NotFound(id.to_string()))?;

        debug!(short_code = %updated.short_code, clicks = updated.clicks, "click recorded");
        Ok(updated)
    }

    fn base_url(&self) -> &str {
        &self.settings.base_url
    }
}
