use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_dynamodb::config::Region;
use aws_sdk_dynamodb::error::{BuildError, DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue, BillingMode, GlobalSecondaryIndex, KeySchemaElement,
    KeyType, Projection, ProjectionType, ReturnValue, ScalarAttributeType, TableStatus,
    TimeToLiveSpecification,
};
use aws_sdk_dynamodb::Client;
use jiff::Timestamp;
use portal_core::repository::Result;
use portal_core::{
    CustomerId, CustomerIndexQuery, IndexCursor, IndexPage, Link, LinkId, ReadConsistency,
    ReadRepository, Repository, ShortCode, StorageError,
};
use tracing::{debug, info, instrument};
use typed_builder::TypedBuilder;

pub const DEFAULT_TABLE_NAME: &str = "Links";
pub const DEFAULT_REGION: &str = "us-east-2";

pub const BY_CUSTOM_SLUG_INDEX: &str = "ByCustomSlug";
pub const BY_CUSTOMER_INDEX: &str = "ByCustomer";
pub const BY_ID_INDEX: &str = "ByID";

const SHORT_CODE: &str = "short_code";
const ID: &str = "id";
const ORIGINAL_URL: &str = "original_url";
const CUSTOM_SLUG: &str = "custom_slug";
const CUSTOMER_ID: &str = "customer_id";
const CLICKS: &str = "clicks";
const CREATED_AT: &str = "created_at";
const UPDATED_AT: &str = "updated_at";
const EXPIRATION_DATE: &str = "expiration_date";
const TTL: &str = "ttl";

const CONDITIONAL_CHECK_FAILED: &str = "ConditionalCheckFailedException";
const TABLE_READY_POLLS: usize = 60;
const TABLE_READY_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Connection settings for the DynamoDB link table.
#[derive(Debug, Clone, TypedBuilder)]
pub struct DynamoSettings {
    #[builder(default = DEFAULT_REGION.to_string(), setter(into))]
    pub region: String,
    /// Overrides the service endpoint, e.g. for DynamoDB Local.
    #[builder(default, setter(strip_option, into))]
    pub endpoint: Option<String>,
    #[builder(default = DEFAULT_TABLE_NAME.to_string(), setter(into))]
    pub table_name: String,
}

/// DynamoDB implementation of the link store.
///
/// Each link is one item keyed by `short_code`. The id, custom slug and
/// customer lookups go through global secondary indexes, so they are
/// eventually consistent. The `ttl` attribute mirrors the expiration date so
/// the table's TTL process reclaims expired items on its own schedule.
#[derive(Debug, Clone)]
pub struct DynamoRepository {
    client: Client,
    table: String,
}

impl DynamoRepository {
    pub fn new(client: Client, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }

    /// Builds a client from the default AWS credential chain.
    pub async fn connect(settings: DynamoSettings) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(settings.region));
        if let Some(endpoint) = settings.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let config = loader.load().await;

        Self::new(Client::new(&config), settings.table_name)
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Creates the link table with its indexes and TTL if it does not exist.
    #[instrument(skip(self), fields(table = %self.table))]
    pub async fn ensure_table(&self) -> Result<()> {
        match self
            .client
            .describe_table()
            .table_name(&self.table)
            .send()
            .await
        {
            Ok(_) => {
                debug!("table already exists");
                return Ok(());
            }
            Err(err) if err.code() == Some("ResourceNotFoundException") => {}
            Err(err) => return Err(map_sdk_error("describe_table", err)),
        }

        let attributes = [SHORT_CODE, ID, CUSTOM_SLUG, CUSTOMER_ID, CREATED_AT]
            .into_iter()
            .map(|name| {
                built(
                    AttributeDefinition::builder()
                        .attribute_name(name)
                        .attribute_type(ScalarAttributeType::S)
                        .build(),
                )
            })
            .collect::<Result<Vec<_>>>()?;

        let indexes = vec![
            index(BY_CUSTOM_SLUG_INDEX, CUSTOM_SLUG, None)?,
            index(BY_CUSTOMER_INDEX, CUSTOMER_ID, Some(CREATED_AT))?,
            index(BY_ID_INDEX, ID, None)?,
        ];

        self.client
            .create_table()
            .table_name(&self.table)
            .set_attribute_definitions(Some(attributes))
            .key_schema(key(SHORT_CODE, KeyType::Hash)?)
            .set_global_secondary_indexes(Some(indexes))
            .billing_mode(BillingMode::PayPerRequest)
            .send()
            .await
            .map_err(|e| map_sdk_error("create_table", e))
            .map_err(initialization)?;

        self.wait_until_active().await?;

        self.client
            .update_time_to_live()
            .table_name(&self.table)
            .time_to_live_specification(built(
                TimeToLiveSpecification::builder()
                    .enabled(true)
                    .attribute_name(TTL)
                    .build(),
            )?)
            .send()
            .await
            .map_err(|e| map_sdk_error("update_time_to_live", e))
            .map_err(initialization)?;

        info!("created link table");
        Ok(())
    }

    async fn wait_until_active(&self) -> Result<()> {
        for _ in 0..TABLE_READY_POLLS {
            let output = self
                .client
                .describe_table()
                .table_name(&self.table)
                .send()
                .await
                .map_err(|e| map_sdk_error("describe_table", e))?;

            if output.table().and_then(|t| t.table_status()) == Some(&TableStatus::Active) {
                return Ok(());
            }
            tokio::time::sleep(TABLE_READY_POLL_INTERVAL).await;
        }

        Err(StorageError::Initialization(format!(
            "table {} did not become active",
            self.table
        )))
    }

    /// Fetches the first item of an index partition.
    async fn query_single(&self, index: &str, attribute: &str, value: &str) -> Result<Option<Link>> {
        let output = self
            .client
            .query()
            .table_name(&self.table)
            .index_name(index)
            .key_condition_expression("#k = :v")
            .expression_attribute_names("#k", attribute)
            .expression_attribute_values(":v", AttributeValue::S(value.to_string()))
            .limit(1)
            .send()
            .await
            .map_err(|e| map_sdk_error("query", e))?;

        output.items().first().map(from_item).transpose()
    }
}

fn built<T>(result: std::result::Result<T, BuildError>) -> Result<T> {
    result.map_err(|e| StorageError::Initialization(e.to_string()))
}

fn initialization(err: StorageError) -> StorageError {
    StorageError::Initialization(err.to_string())
}

fn key(attribute: &str, key_type: KeyType) -> Result<KeySchemaElement> {
    built(
        KeySchemaElement::builder()
            .attribute_name(attribute)
            .key_type(key_type)
            .build(),
    )
}

fn index(name: &str, hash: &str, range: Option<&str>) -> Result<GlobalSecondaryIndex> {
    let mut schema = vec![key(hash, KeyType::Hash)?];
    if let Some(range) = range {
        schema.push(key(range, KeyType::Range)?);
    }

    built(
        GlobalSecondaryIndex::builder()
            .index_name(name)
            .set_key_schema(Some(schema))
            .projection(
                Projection::builder()
                    .projection_type(ProjectionType::All)
                    .build(),
            )
            .build(),
    )
}

fn is_conditional_check_failed<E, R>(err: &SdkError<E, R>) -> bool
where
    E: ProvideErrorMetadata,
{
    err.code() == Some(CONDITIONAL_CHECK_FAILED)
}

fn map_sdk_error<E, R>(operation: &str, err: SdkError<E, R>) -> StorageError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let message = format!("{operation}: {}", DisplayErrorContext(&err));

    match &err {
        SdkError::TimeoutError(_) => StorageError::Timeout(message),
        SdkError::DispatchFailure(_) => StorageError::Unavailable(message),
        SdkError::ResponseError(_) => StorageError::InvalidData(message),
        SdkError::ServiceError(_) => match err.code() {
            Some(
                "ProvisionedThroughputExceededException"
                | "ThrottlingException"
                | "RequestLimitExceeded"
                | "InternalServerError"
                | "ServiceUnavailable",
            ) => StorageError::Unavailable(message),
            _ => StorageError::Query(message),
        },
        _ => StorageError::Operation(message),
    }
}

fn string(value: impl ToString) -> AttributeValue {
    AttributeValue::S(value.to_string())
}

fn to_item(link: &Link) -> HashMap<String, AttributeValue> {
    let mut item = HashMap::from([
        (SHORT_CODE.to_string(), string(&link.short_code)),
        (ID.to_string(), string(&link.id)),
        (ORIGINAL_URL.to_string(), string(&link.original_url)),
        (CUSTOMER_ID.to_string(), string(&link.customer_id)),
        (CLICKS.to_string(), AttributeValue::N(link.clicks.to_string())),
        (CREATED_AT.to_string(), string(link.created_at)),
        (UPDATED_AT.to_string(), string(link.updated_at)),
    ]);

    // Index key attributes cannot be empty strings; leave the item out of
    // the slug index instead.
    if let Some(slug) = link.custom_slug.as_deref().filter(|s| !s.is_empty()) {
        item.insert(CUSTOM_SLUG.to_string(), string(slug));
    }

    if let Some(at) = link.expiration_date {
        item.insert(EXPIRATION_DATE.to_string(), string(at));
        item.insert(TTL.to_string(), AttributeValue::N(at.as_second().to_string()));
    }

    item
}

/// Update expression that rewrites the editable fields of a link.
///
/// `clicks` is never part of it; cleared optional fields are removed so the
/// item drops out of the slug index and loses its TTL.
struct ReplaceUpdate {
    expression: String,
    names: HashMap<String, String>,
    values: HashMap<String, AttributeValue>,
}

impl ReplaceUpdate {
    fn of(link: &Link) -> Self {
        let mut set = vec!["#original_url = :original_url", "#updated_at = :updated_at"];
        let mut remove = vec![];
        let names = HashMap::from([
            ("#pk".to_string(), SHORT_CODE.to_string()),
            ("#original_url".to_string(), ORIGINAL_URL.to_string()),
            ("#updated_at".to_string(), UPDATED_AT.to_string()),
            ("#custom_slug".to_string(), CUSTOM_SLUG.to_string()),
            ("#expiration_date".to_string(), EXPIRATION_DATE.to_string()),
            ("#ttl".to_string(), TTL.to_string()),
        ]);
        let mut values = HashMap::from([
            (":original_url".to_string(), string(&link.original_url)),
            (":updated_at".to_string(), string(link.updated_at)),
        ]);

        match link.custom_slug.as_deref().filter(|s| !s.is_empty()) {
            Some(slug) => {
                set.push("#custom_slug = :custom_slug");
                values.insert(":custom_slug".to_string(), string(slug));
            }
            None => remove.push("#custom_slug"),
        }

        match link.expiration_date {
            Some(at) => {
                set.push("#expiration_date = :expiration_date");
                set.push("#ttl = :ttl");
                values.insert(":expiration_date".to_string(), string(at));
                values.insert(
                    ":ttl".to_string(),
                    AttributeValue::N(at.as_second().to_string()),
                );
            }
            None => {
                remove.push("#expiration_date");
                remove.push("#ttl");
            }
        }

        let mut expression = format!("SET {}", set.join(", "));
        if !remove.is_empty() {
            expression.push_str(&format!(" REMOVE {}", remove.join(", ")));
        }

        Self {
            expression,
            names,
            values,
        }
    }
}

fn required<'a>(item: &'a HashMap<String, AttributeValue>, name: &str) -> Result<&'a str> {
    optional(item, name)?
        .ok_or_else(|| StorageError::InvalidData(format!("missing attribute '{name}'")))
}

fn optional<'a>(item: &'a HashMap<String, AttributeValue>, name: &str) -> Result<Option<&'a str>> {
    item.get(name)
        .map(|value| {
            value
                .as_s()
                .map(String::as_str)
                .map_err(|_| StorageError::InvalidData(format!("attribute '{name}' is not a string")))
        })
        .transpose()
}

fn timestamp(name: &str, value: &str) -> Result<Timestamp> {
    value.parse::<Timestamp>().map_err(|e| {
        StorageError::InvalidData(format!("invalid {name} timestamp '{value}': {e}"))
    })
}

fn from_item(item: &HashMap<String, AttributeValue>) -> Result<Link> {
    let clicks = match item.get(CLICKS) {
        None => 0,
        Some(value) => {
            let raw = value
                .as_n()
                .map_err(|_| StorageError::InvalidData("attribute 'clicks' is not a number".into()))?;
            raw.parse::<u64>()
                .map_err(|e| StorageError::InvalidData(format!("invalid clicks '{raw}': {e}")))?
        }
    };

    let customer_id = CustomerId::new(required(item, CUSTOMER_ID)?)
        .map_err(|e| StorageError::InvalidData(e.to_string()))?;

    Ok(Link {
        id: LinkId::new_unchecked(required(item, ID)?),
        short_code: ShortCode::new_unchecked(required(item, SHORT_CODE)?),
        original_url: required(item, ORIGINAL_URL)?.to_string(),
        custom_slug: optional(item, CUSTOM_SLUG)?
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        customer_id,
        clicks,
        created_at: timestamp(CREATED_AT, required(item, CREATED_AT)?)?,
        updated_at: timestamp(UPDATED_AT, required(item, UPDATED_AT)?)?,
        expiration_date: optional(item, EXPIRATION_DATE)?
            .map(|value| timestamp(EXPIRATION_DATE, value))
            .transpose()?,
    })
}

/// Exclusive start key for the customer index. Both the index key and the
/// table key are required.
fn cursor_key(customer_id: &CustomerId, cursor: &IndexCursor) -> HashMap<String, AttributeValue> {
    HashMap::from([
        (CUSTOMER_ID.to_string(), string(customer_id)),
        (CREATED_AT.to_string(), string(cursor.created_at)),
        (SHORT_CODE.to_string(), string(&cursor.short_code)),
    ])
}

fn cursor_from_key(key: &HashMap<String, AttributeValue>) -> Result<IndexCursor> {
    Ok(IndexCursor {
        created_at: timestamp(CREATED_AT, required(key, CREATED_AT)?)?,
        short_code: ShortCode::new_unchecked(required(key, SHORT_CODE)?),
    })
}

#[async_trait]
impl ReadRepository for DynamoRepository {
    async fn get(&self, code: &ShortCode, consistency: ReadConsistency) -> Result<Option<Link>> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table)
            .key(SHORT_CODE, string(code))
            .consistent_read(consistency == ReadConsistency::Strong)
            .send()
            .await
            .map_err(|e| map_sdk_error("get_item", e))?;

        output.item().map(from_item).transpose()
    }

    async fn exists(&self, code: &ShortCode) -> Result<bool> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table)
            .key(SHORT_CODE, string(code))
            .consistent_read(true)
            .projection_expression("#pk")
            .expression_attribute_names("#pk", SHORT_CODE)
            .send()
            .await
            .map_err(|e| map_sdk_error("get_item", e))?;

        Ok(output.item().is_some())
    }

    async fn find_by_id(&self, id: &LinkId) -> Result<Option<Link>> {
        self.query_single(BY_ID_INDEX, ID, id.as_str()).await
    }

    async fn find_by_custom_slug(&self, slug: &str) -> Result<Option<Link>> {
        self.query_single(BY_CUSTOM_SLUG_INDEX, CUSTOM_SLUG, slug)
            .await
    }

    async fn query_by_customer(&self, query: &CustomerIndexQuery) -> Result<IndexPage> {
        let limit = i32::try_from(query.limit.max(1)).unwrap_or(i32::MAX);

        let output = self
            .client
            .query()
            .table_name(&self.table)
            .index_name(BY_CUSTOMER_INDEX)
            .key_condition_expression("#c = :c")
            .expression_attribute_names("#c", CUSTOMER_ID)
            .expression_attribute_values(":c", string(&query.customer_id))
            .scan_index_forward(false)
            .limit(limit)
            .set_exclusive_start_key(
                query
                    .start_after
                    .as_ref()
                    .map(|cursor| cursor_key(&query.customer_id, cursor)),
            )
            .send()
            .await
            .map_err(|e| map_sdk_error("query", e))?;

        let links = output
            .items()
            .iter()
            .map(from_item)
            .collect::<Result<Vec<_>>>()?;

        let last_evaluated = output.last_evaluated_key().map(cursor_from_key).transpose()?;

        Ok(IndexPage {
            links,
            last_evaluated,
        })
    }
}

#[async_trait]
impl Repository for DynamoRepository {
    async fn insert(&self, link: &Link) -> Result<()> {
        let result = self
            .client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(to_item(link)))
            .condition_expression("attribute_not_exists(#pk)")
            .expression_attribute_names("#pk", SHORT_CODE)
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_conditional_check_failed(&err) => {
                Err(StorageError::Conflict(link.short_code.to_string()))
            }
            Err(err) => Err(map_sdk_error("put_item", err)),
        }
    }

    async fn replace(&self, link: &Link) -> Result<Link> {
        let update = ReplaceUpdate::of(link);
        let result = self
            .client
            .update_item()
            .table_name(&self.table)
            .key(SHORT_CODE, string(&link.short_code))
            .update_expression(update.expression)
            .condition_expression("attribute_exists(#pk)")
            .set_expression_attribute_names(Some(update.names))
            .set_expression_attribute_values(Some(update.values))
            .return_values(ReturnValue::AllNew)
            .send()
            .await;

        match result {
            Ok(output) => match output.attributes() {
                Some(item) => from_item(item),
                None => Err(StorageError::InvalidData(
                    "update_item returned no attributes".to_string(),
                )),
            },
            Err(err) if is_conditional_check_failed(&err) => {
                Err(StorageError::Missing(link.short_code.to_string()))
            }
            Err(err) => Err(map_sdk_error("update_item", err)),
        }
    }

    async fn delete(&self, code: &ShortCode) -> Result<bool> {
        let output = self
            .client
            .delete_item()
            .table_name(&self.table)
            .key(SHORT_CODE, string(code))
            .return_values(ReturnValue::AllOld)
            .send()
            .await
            .map_err(|e| map_sdk_error("delete_item", e))?;

        Ok(output.attributes().is_some())
    }

    async fn increment_clicks(
        &self,
        code: &ShortCode,
        updated_at: Timestamp,
    ) -> Result<Option<Link>> {
        let result = self
            .client
            .update_item()
            .table_name(&self.table)
            .key(SHORT_CODE, string(code))
            .update_expression("ADD #clicks :one SET #updated_at = :now")
            .condition_expression("attribute_exists(#pk)")
            .expression_attribute_names("#clicks", CLICKS)
            .expression_attribute_names("#updated_at", UPDATED_AT)
            .expression_attribute_names("#pk", SHORT_CODE)
            .expression_attribute_values(":one", AttributeValue::N("1".to_string()))
            .expression_attribute_values(":now", string(updated_at))
            .return_values(ReturnValue::AllNew)
            .send()
            .await;

        match result {
            Ok(output) => output.attributes().map(from_item).transpose(),
            Err(err) if is_conditional_check_failed(&err) => Ok(None),
            Err(err) => Err(map_sdk_error("update_item", err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link() -> Link {
        Link {
            id: LinkId::new_unchecked("Xy12Ab34Cd"),
            short_code: ShortCode::new_unchecked("abc123"),
            original_url: "https://example.com".to_string(),
            custom_slug: None,
            customer_id: CustomerId::new("c1").unwrap(),
            clicks: 7,
            created_at: Timestamp::from_second(1_700_000_000).unwrap(),
            updated_at: Timestamp::from_second(1_700_000_100).unwrap(),
            expiration_date: None,
        }
    }

    #[test]
    fn item_attributes() {
        let mut l = link();
        l.expiration_date = Some(Timestamp::from_second(1_800_000_000).unwrap());

        let item = to_item(&l);
        assert_eq!(item[SHORT_CODE], AttributeValue::S("abc123".into()));
        assert_eq!(item[CLICKS], AttributeValue::N("7".into()));
        assert_eq!(item[CREATED_AT], AttributeValue::S("2023-11-14T22:13:20Z".into()));
        assert_eq!(item[TTL], AttributeValue::N("1800000000".into()));
        assert!(!item.contains_key(CUSTOM_SLUG));

        assert_eq!(from_item(&item).unwrap(), l);
    }

    #[test]
    fn replace_update_never_touches_clicks() {
        let mut l = link();
        let update = ReplaceUpdate::of(&l);
        assert_eq!(
            update.expression,
            "SET #original_url = :original_url, #updated_at = :updated_at \
             REMOVE #custom_slug, #expiration_date, #ttl"
        );
        assert!(!update.names.values().any(|name| name == CLICKS));

        l.custom_slug = Some("promo".to_string());
        l.expiration_date = Some(Timestamp::from_second(1_800_000_000).unwrap());
        let update = ReplaceUpdate::of(&l);
        assert_eq!(
            update.expression,
            "SET #original_url = :original_url, #updated_at = :updated_at, \
             #custom_slug = :custom_slug, #expiration_date = :expiration_date, #ttl = :ttl"
        );
        assert_eq!(update.values[":ttl"], AttributeValue::N("1800000000".into()));
        assert_eq!(update.values[":custom_slug"], AttributeValue::S("promo".into()));
        assert!(!update.values.values().any(|v| *v == AttributeValue::N("7".into())));
    }

    #[test]
    fn empty_custom_slug_is_not_written() {
        let mut l = link();
        l.custom_slug = Some(String::new());
        assert!(!to_item(&l).contains_key(CUSTOM_SLUG));

        l.custom_slug = Some("promo".to_string());
        assert_eq!(to_item(&l)[CUSTOM_SLUG], AttributeValue::S("promo".into()));
    }

    #[test]
    fn items_without_ttl_have_no_expiration() {
        let item = to_item(&link());
        assert!(!item.contains_key(TTL));
        assert!(!item.contains_key(EXPIRATION_DATE));
        assert_eq!(from_item(&item).unwrap().expiration_date, None);
    }

    #[test]
    fn malformed_items_are_invalid_data() {
        let mut item = to_item(&link());
        item.insert(CREATED_AT.to_string(), AttributeValue::S("yesterday".into()));
        assert!(matches!(from_item(&item), Err(StorageError::InvalidData(_))));

        let mut item = to_item(&link());
        item.remove(ORIGINAL_URL);
        assert!(matches!(from_item(&item), Err(StorageError::InvalidData(_))));

        let mut item = to_item(&link());
        item.insert(CLICKS.to_string(), AttributeValue::S("many".into()));
        assert!(matches!(from_item(&item), Err(StorageError::InvalidData(_))));
    }

    #[test]
    fn cursor_key_round_trips_through_index_key() {
        let l = link();
        let cursor = IndexCursor::of(&l);
        let key = cursor_key(&l.customer_id, &cursor);
        assert_eq!(key.len(), 3);
        assert_eq!(cursor_from_key(&key).unwrap(), cursor);
    }

    #[test]
    fn settings_defaults() {
        let settings = DynamoSettings::builder().build();
        assert_eq!(settings.region, "us-east-2");
        assert_eq!(settings.table_name, "Links");
        assert!(settings.endpoint.is_none());

        let local = DynamoSettings::builder()
            .endpoint("http://localhost:8000")
            .table_name("Links-test")
            .build();
        assert_eq!(local.endpoint.as_deref(), Some("http://localhost:8000"));
    }
}
