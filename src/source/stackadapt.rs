//! StackAdapt ad network source.
//!
//! Campaigns are listed with page-number pagination (the response reports
//! `total_campaigns`); each campaign's daily delivery stats, grouped by
//! native ad, are then fetched for the whole sync window in one request.
//! Every stats row is widened with its campaign's fields.

use chrono::NaiveDate;
use serde_json::Value as Json;
use tracing::debug;

use super::{BulkSource, Entity, http};
use crate::error::{Error, Result};
use crate::model::{ColumnSpec, ColumnType, Record, SyncWindow, TableSchema};
use crate::sync::{Page, Paginator};

pub const NAME: &str = "stackadapt";

pub const DEFAULT_ENDPOINT: &str = "https://api.stackadapt.com/service/v2";

/// Earliest date with data in the API.
pub const DEFAULT_FLOOR: Option<NaiveDate> = NaiveDate::from_ymd_opt(2021, 2, 1);

/// Campaign fields copied onto every stats row.
pub const CAMPAIGN_FIELDS: &[&str] = &[
    "id",
    "name",
    "created_at",
    "updated_at",
    "state",
    "bid_type",
    "bid_amount_total",
    "start_date",
    "end_date",
    "channel",
    "campaign_type",
    "budget",
];

/// Delivery metrics kept from each stats row.
pub const STATS_FIELDS: &[&str] = &[
    "click",
    "cost",
    "conv",
    "date",
    "imp",
    "unique_imp",
    "uniq_conv",
];

/// Destination schema: stats columns first, then campaign columns.
///
/// # Errors
///
/// Never fails in practice; the column list is fixed.
pub fn table_schema() -> Result<TableSchema> {
    use ColumnType::{Date, Float, Integer, Text, Timestamp};

    TableSchema::new(
        [
            ("date", Date),
            ("click", Integer),
            ("cost", Float),
            ("conv", Integer),
            ("imp", Integer),
            ("unique_imp", Integer),
            ("uniq_conv", Integer),
            ("id", Integer),
            ("name", Text),
            ("created_at", Timestamp),
            ("updated_at", Timestamp),
            ("state", Text),
            ("bid_type", Text),
            ("bid_amount_total", Integer),
            ("start_date", Timestamp),
            ("end_date", Timestamp),
            ("channel", Text),
            ("campaign_type", Text),
            ("budget", Float),
        ]
        .into_iter()
        .map(|(name, ty)| ColumnSpec::new(name, ty))
        .collect(),
    )
}

/// Parse one page of `GET /campaigns`.
///
/// # Errors
///
/// Returns `SourceUnavailable` when the body has no `data` array or a
/// campaign has no `id`, and `InvalidRecord` for non-scalar fields.
pub fn parse_campaign_page(body: &Json) -> Result<Page<Entity>> {
    let data = body
        .get("data")
        .and_then(Json::as_array)
        .ok_or_else(|| Error::source_unavailable(NAME, "campaign page has no 'data' array"))?;

    let entities = data
        .iter()
        .map(|campaign| {
            let object = campaign
                .as_object()
                .ok_or_else(|| Error::source_unavailable(NAME, "campaign is not an object"))?;
            let id = match object.get("id") {
                Some(Json::Number(n)) => n.to_string(),
                Some(Json::String(s)) if !s.is_empty() => s.clone(),
                _ => return Err(Error::source_unavailable(NAME, "campaign has no 'id'")),
            };
            Ok(Entity {
                id,
                record: Record::from_json_object(object, CAMPAIGN_FIELDS)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let total = body
        .get("total_campaigns")
        .and_then(Json::as_u64)
        .and_then(|t| usize::try_from(t).ok());

    Ok(match total {
        Some(total) => Page::with_total(entities, total),
        None => Page::items(entities),
    })
}

/// Parse `GET /delivery` for one campaign into rows carrying the
/// campaign's fields.
///
/// A missing or null `stats` array means the campaign had no delivery in
/// the window.
///
/// # Errors
///
/// Returns `SourceUnavailable` when `stats` is not an array of objects.
pub fn parse_delivery(body: &Json, campaign: &Entity) -> Result<Vec<Record>> {
    let stats = match body.get("stats") {
        None | Some(Json::Null) => return Ok(Vec::new()),
        Some(Json::Array(stats)) => stats,
        Some(_) => {
            return Err(Error::source_unavailable(NAME, "delivery 'stats' is not an array"));
        }
    };

    stats
        .iter()
        .map(|row| {
            let object = row
                .as_object()
                .ok_or_else(|| Error::source_unavailable(NAME, "stats row is not an object"))?;
            let mut record = Record::from_json_object(object, STATS_FIELDS)?;
            record.merge(&campaign.record);
            Ok(record)
        })
        .collect()
}

/// StackAdapt campaign delivery source.
pub struct StackAdaptSource {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    schema: TableSchema,
    max_rows: Option<usize>,
}

impl StackAdaptSource {
    /// Create a source talking to `endpoint` (the public API when `None`).
    ///
    /// # Errors
    ///
    /// Returns `Config` for an empty API key and `SourceUnavailable` if the
    /// HTTP client cannot be built.
    pub fn new(api_key: String, endpoint: Option<String>) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(Error::Config("stackadapt api key is empty".into()));
        }
        Ok(Self {
            client: http::client(NAME)?,
            endpoint: endpoint
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key,
            schema: table_schema()?,
            max_rows: None,
        })
    }

    /// Stop listing campaigns after this many.
    #[must_use]
    pub fn with_max_rows(mut self, max_rows: Option<usize>) -> Self {
        self.max_rows = max_rows;
        self
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}/{path}", self.endpoint))
            .header("X-Authorization", &self.api_key)
    }

    async fn campaign_page(&self, page: usize) -> Result<Page<Entity>> {
        let body = http::send_json(NAME, self.get("campaigns").query(&[("page", page)])).await?;
        parse_campaign_page(&body)
    }
}

impl BulkSource for StackAdaptSource {
    fn name(&self) -> &str {
        NAME
    }

    fn schema(&self) -> &TableSchema {
        &self.schema
    }

    async fn list_entities(&self) -> Result<Vec<Entity>> {
        let paginator = match self.max_rows {
            Some(max) => Paginator::page_numbers().with_max_rows(max),
            None => Paginator::page_numbers(),
        };
        paginator
            .drain(|token| self.campaign_page(token.value()))
            .await
    }

    async fn fetch_entity(&self, entity: &Entity, window: &SyncWindow) -> Result<Vec<Record>> {
        let start = window.start().to_string();
        let end = window.end().to_string();
        let request = self.get("delivery").query(&[
            ("resource_type", "campaign"),
            ("type", "daily"),
            ("id", entity.id.as_str()),
            ("date_range_type", "custom"),
            ("start_date", start.as_str()),
            ("end_date", end.as_str()),
            ("group_by_resource", "native_ad"),
        ]);

        let body = http::send_json(NAME, request).await?;
        let records = parse_delivery(&body, entity)?;
        debug!(entity_id = %entity.id, rows = records.len(), "Fetched delivery stats");
        Ok(records)
    }
}
