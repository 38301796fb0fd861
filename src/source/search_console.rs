//! Google Search Console search analytics source.
//!
//! One query per calendar day, paged by `startRow` with at most 25 000 rows
//! per page. A page shorter than the row limit ends the day.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{DailySource, http};
use crate::error::{Error, Result};
use crate::model::{ColumnSpec, ColumnType, DATE_FIELD, Record, TableSchema, Value};
use crate::sync::{Page, Paginator};

pub const NAME: &str = "search_console";

pub const DEFAULT_ENDPOINT: &str = "https://www.googleapis.com/webmasters/v3";

/// Largest `rowLimit` the API accepts.
pub const MAX_ROW_LIMIT: usize = 25_000;

pub const DEFAULT_DIMENSIONS: &[&str] = &["page", "query", "device", "country"];

/// Metric columns returned for every row.
pub const METRICS: &[(&str, ColumnType)] = &[
    ("clicks", ColumnType::Integer),
    ("impressions", ColumnType::Integer),
    ("ctr", ColumnType::Float),
    ("position", ColumnType::Float),
];

/// Destination schema for a dimension list: `date`, the dimensions as text,
/// then the metrics.
///
/// # Errors
///
/// Returns `InvalidArgument` if the list is empty or a dimension collides
/// with `date` or a metric name.
pub fn table_schema(dimensions: &[String]) -> Result<TableSchema> {
    if dimensions.is_empty() {
        return Err(Error::InvalidArgument(
            "search console needs at least one dimension".into(),
        ));
    }
    if let Some(bad) = dimensions
        .iter()
        .find(|d| d.as_str() == DATE_FIELD || METRICS.iter().any(|(m, _)| *m == d.as_str()))
    {
        return Err(Error::InvalidArgument(format!(
            "'{bad}' cannot be used as a search console dimension"
        )));
    }

    let mut columns = vec![ColumnSpec::new(DATE_FIELD, ColumnType::Date)];
    columns.extend(dimensions.iter().map(|d| ColumnSpec::new(d, ColumnType::Text)));
    columns.extend(METRICS.iter().map(|(m, ty)| ColumnSpec::new(m, *ty)));
    TableSchema::new(columns)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    start_date: String,
    end_date: String,
    dimensions: &'a [String],
    row_limit: usize,
    start_row: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub rows: Vec<QueryRow>,
}

#[derive(Debug, Deserialize)]
pub struct QueryRow {
    #[serde(default)]
    pub keys: Vec<String>,
    pub clicks: Option<f64>,
    pub impressions: Option<f64>,
    pub ctr: Option<f64>,
    pub position: Option<f64>,
}

/// Turn response rows into records for `day`.
///
/// Keys map positionally onto `dimensions`.
///
/// # Errors
///
/// Returns `SourceUnavailable` when a row's key count does not match the
/// dimension count.
pub fn rows_to_records(
    dimensions: &[String],
    day: NaiveDate,
    rows: Vec<QueryRow>,
) -> Result<Vec<Record>> {
    rows.into_iter()
        .map(|row| {
            if row.keys.len() != dimensions.len() {
                return Err(Error::source_unavailable(
                    NAME,
                    format!(
                        "row has {} keys for {} dimensions",
                        row.keys.len(),
                        dimensions.len()
                    ),
                ));
            }
            let mut record = Record::new().with(DATE_FIELD, Value::Date(day));
            for (dim, key) in dimensions.iter().zip(row.keys) {
                record.set(dim.as_str(), Value::Text(key));
            }
            for (name, metric) in [
                ("clicks", row.clicks),
                ("impressions", row.impressions),
                ("ctr", row.ctr),
                ("position", row.position),
            ] {
                record.set(name, metric.map_or(Value::Null, Value::Float));
            }
            Ok(record)
        })
        .collect()
}

/// Search analytics for one site.
pub struct SearchConsoleSource {
    client: reqwest::Client,
    query_url: reqwest::Url,
    access_token: String,
    dimensions: Vec<String>,
    row_limit: usize,
    max_rows: Option<usize>,
    schema: TableSchema,
}

impl SearchConsoleSource {
    /// Create a source for `site_url` (`https://example.com/` or
    /// `sc-domain:example.com`).
    ///
    /// # Errors
    ///
    /// Returns `Config` for an empty site or token or an unusable endpoint,
    /// and `InvalidArgument` for a bad dimension list.
    pub fn new(
        site_url: &str,
        access_token: String,
        dimensions: Vec<String>,
        endpoint: Option<&str>,
    ) -> Result<Self> {
        if site_url.trim().is_empty() {
            return Err(Error::Config("search console site_url is empty".into()));
        }
        if access_token.trim().is_empty() {
            return Err(Error::Config("search console access token is empty".into()));
        }

        let endpoint = endpoint.unwrap_or(DEFAULT_ENDPOINT);
        let mut query_url = reqwest::Url::parse(endpoint)
            .map_err(|e| Error::Config(format!("invalid search console endpoint '{endpoint}': {e}")))?;
        query_url
            .path_segments_mut()
            .map_err(|()| Error::Config(format!("search console endpoint '{endpoint}' cannot take a path")))?
            .pop_if_empty()
            .extend(["sites", site_url.trim(), "searchAnalytics", "query"]);

        Ok(Self {
            client: http::client(NAME)?,
            query_url,
            access_token,
            schema: table_schema(&dimensions)?,
            dimensions,
            row_limit: MAX_ROW_LIMIT,
            max_rows: None,
        })
    }

    /// Rows requested per page, clamped to `1..=25000`.
    #[must_use]
    pub fn with_row_limit(mut self, row_limit: usize) -> Self {
        self.row_limit = row_limit.clamp(1, MAX_ROW_LIMIT);
        self
    }

    /// Stop a day's drain after this many rows.
    #[must_use]
    pub fn with_max_rows(mut self, max_rows: Option<usize>) -> Self {
        self.max_rows = max_rows;
        self
    }

    #[must_use]
    pub fn query_url(&self) -> &str {
        self.query_url.as_str()
    }

    async fn query_page(&self, day: NaiveDate, start_row: usize) -> Result<Page<Record>> {
        let request = QueryRequest {
            start_date: day.to_string(),
            end_date: day.to_string(),
            dimensions: &self.dimensions,
            row_limit: self.row_limit,
            start_row,
        };
        let body = http::send_json(
            NAME,
            self.client
                .post(self.query_url.clone())
                .bearer_auth(&self.access_token)
                .json(&request),
        )
        .await?;

        let response: QueryResponse = serde_json::from_value(body)
            .map_err(|e| Error::source_unavailable(NAME, format!("malformed query response: {e}")))?;
        debug!(%day, start_row, rows = response.rows.len(), "Fetched search analytics page");
        Ok(Page::items(rows_to_records(&self.dimensions, day, response.rows)?))
    }
}

impl DailySource for SearchConsoleSource {
    fn name(&self) -> &str {
        NAME
    }

    fn schema(&self) -> &TableSchema {
        &self.schema
    }

    async fn fetch_day(&self, day: NaiveDate) -> Result<Vec<Record>> {
        let paginator = Paginator::row_offsets(self.row_limit);
        let paginator = match self.max_rows {
            Some(max) => paginator.with_max_rows(max),
            None => paginator,
        };
        paginator
            .drain(|token| self.query_page(day, token.value()))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dims() -> Vec<String> {
        DEFAULT_DIMENSIONS.iter().map(ToString::to_string).collect()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    #[test]
    fn test_rows_to_records_maps_keys_positionally() {
        let response: QueryResponse = serde_json::from_value(json!({
            "rows": [{
                "keys": ["https://example.com/a", "rust etl", "MOBILE", "usa"],
                "clicks": 4.0,
                "impressions": 100.0,
                "ctr": 0.04,
                "position": 3.2
            }],
            "responseAggregationType": "byPage"
        }))
        .unwrap();

        let records = rows_to_records(&dims(), day(), response.rows).unwrap();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.get("query"), Some(&Value::Text("rust etl".into())));
        assert_eq!(r.get("country"), Some(&Value::Text("usa".into())));
        assert_eq!(r.date(), Some(day()));

        let schema = table_schema(&dims()).unwrap();
        let row = schema.conform(r).unwrap();
        // date, 4 dimensions, then clicks.
        assert_eq!(row[5], Value::Int(4));
        assert_eq!(row[7], Value::Float(0.04));
    }

    #[test]
    fn test_missing_rows_is_empty() {
        let response: QueryResponse = serde_json::from_value(json!({})).unwrap();
        assert!(rows_to_records(&dims(), day(), response.rows).unwrap().is_empty());
    }

    #[test]
    fn test_key_count_mismatch_is_rejected() {
        let response: QueryResponse =
            serde_json::from_value(json!({"rows": [{"keys": ["only one"], "clicks": 1.0}]})).unwrap();
        let err = rows_to_records(&dims(), day(), response.rows).unwrap_err();
        assert!(err.to_string().contains("1 keys for 4 dimensions"));
    }

    #[test]
    fn test_table_schema_rejects_colliding_dimensions() {
        assert!(table_schema(&[]).is_err());
        assert!(table_schema(&["date".to_string()]).is_err());
        assert!(table_schema(&["page".to_string(), "clicks".to_string()]).is_err());
        assert_eq!(table_schema(&dims()).unwrap().columns().len(), 9);
    }

    #[test]
    fn test_query_url_encodes_site() {
        let source = SearchConsoleSource::new(
            "https://example.com/",
            "token".into(),
            dims(),
            Some("https://api.test/webmasters/v3/"),
        )
        .unwrap();
        assert_eq!(
            source.query_url(),
            "https://api.test/webmasters/v3/sites/https:%2F%2Fexample.com%2F/searchAnalytics/query"
        );
    }

    #[test]
    fn test_row_limit_is_clamped() {
        let source = SearchConsoleSource::new("sc-domain:example.com", "t".into(), dims(), None)
            .unwrap()
            .with_row_limit(100_000);
        assert_eq!(source.row_limit, MAX_ROW_LIMIT);
    }
}
