//! PostgREST row API and RPC access to a Supabase project.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_RANGE};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SupabaseError {
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("{status}: {message}")]
    Api { status: StatusCode, message: String },

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("could not decode response: {0}")]
    Decode(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type SupabaseResult<T> = Result<T, SupabaseError>;

/// A schema-less row: column name to JSON value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(pub Map<String, Value>);

impl Record {
    /// Parse a JSON object. Anything else, including valid non-object JSON, is rejected.
    pub fn parse(text: &str) -> SupabaseResult<Self> {
        match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => Ok(Record(map)),
            Ok(other) => Err(SupabaseError::InvalidJson(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
            Err(e) => Err(SupabaseError::InvalidJson(e.to_string())),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Equality filter, sent to PostgREST as `column=eq.value`
#[derive(Debug, Clone, PartialEq)]
pub struct EqFilter {
    pub column: String,
    pub value: String,
}

impl EqFilter {
    pub fn new(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    fn as_query(&self) -> [(String, String); 1] {
        [(self.column.clone(), format!("eq.{}", self.value))]
    }
}

#[derive(Deserialize, Default)]
struct ApiMessage {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Clone)]
pub struct SupabaseClient {
    client: Client,
    base_url: String,
}

impl SupabaseClient {
    pub fn new(url: &str, key: &str) -> SupabaseResult<Self> {
        let url = url.trim();
        if url.is_empty() || key.trim().is_empty() {
            return Err(SupabaseError::Config(
                "SUPABASE_URL and SUPABASE_KEY must both be set".to_string(),
            ));
        }
        let parsed =
            url::Url::parse(url).map_err(|e| SupabaseError::Config(format!("{}: {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(SupabaseError::Config(format!(
                "unsupported scheme '{}'",
                parsed.scheme()
            )));
        }

        let mut headers = HeaderMap::new();
        let apikey =
            HeaderValue::from_str(key).map_err(|e| SupabaseError::Config(e.to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", key))
            .map_err(|e| SupabaseError::Config(e.to_string()))?;
        headers.insert("apikey", apikey);
        headers.insert(AUTHORIZATION, bearer);

        let client = Client::builder().default_headers(headers).build()?;
        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    async fn check(response: Response) -> SupabaseResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await?;
        let message = serde_json::from_str::<ApiMessage>(&body)
            .ok()
            .map(|m| m.message)
            .filter(|m| !m.is_empty())
            .unwrap_or(body);
        Err(SupabaseError::Api { status, message })
    }

    async fn send<T: DeserializeOwned>(request: RequestBuilder) -> SupabaseResult<T> {
        let response = Self::check(request.send().await?).await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| SupabaseError::Decode(e.to_string()))
    }

    /// `GET /rest/v1/{table}?select=..&limit=..`
    pub async fn select(&self, table: &str, columns: &str, limit: i64) -> SupabaseResult<Vec<Value>> {
        let request = self
            .client
            .get(self.table_url(table))
            .query(&[("select", columns.to_string()), ("limit", limit.to_string())]);
        Self::send(request).await
    }

    /// Rows where `filter.column` equals `filter.value`
    pub async fn select_eq(&self, table: &str, filter: &EqFilter) -> SupabaseResult<Vec<Value>> {
        let request = self
            .client
            .get(self.table_url(table))
            .query(&[("select", "*")])
            .query(&filter.as_query());
        Self::send(request).await
    }

    pub async fn insert(&self, table: &str, record: &Record) -> SupabaseResult<Vec<Value>> {
        let request = self
            .client
            .post(self.table_url(table))
            .header("Prefer", "return=representation")
            .json(record);
        Self::send(request).await
    }

    pub async fn update(
        &self,
        table: &str,
        filter: &EqFilter,
        changes: &Record,
    ) -> SupabaseResult<Vec<Value>> {
        let request = self
            .client
            .patch(self.table_url(table))
            .query(&filter.as_query())
            .header("Prefer", "return=representation")
            .json(changes);
        Self::send(request).await
    }

    /// Delete matching rows and return them
    pub async fn delete(&self, table: &str, filter: &EqFilter) -> SupabaseResult<Vec<Value>> {
        let request = self
            .client
            .delete(self.table_url(table))
            .query(&filter.as_query())
            .header("Prefer", "return=representation");
        Self::send(request).await
    }

    /// Exact row count, read from the `Content-Range` header
    pub async fn count(&self, table: &str, filter: Option<&EqFilter>) -> SupabaseResult<u64> {
        let mut request = self
            .client
            .head(self.table_url(table))
            .query(&[("select", "*")])
            .header("Prefer", "count=exact");
        if let Some(filter) = filter {
            request = request.query(&filter.as_query());
        }

        let response = Self::check(request.send().await?).await?;
        let range = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| SupabaseError::Decode("missing Content-Range header".to_string()))?;
        parse_content_range_total(range)
    }

    /// `POST /rest/v1/rpc/{function}` with a JSON argument object
    pub async fn rpc<T: DeserializeOwned>(&self, function: &str, args: &Value) -> SupabaseResult<T> {
        let request = self
            .client
            .post(format!("{}/rest/v1/rpc/{}", self.base_url, function))
            .json(args);
        Self::send(request).await
    }
}

/// `0-9/42` or `*/0` yields the total after the slash
fn parse_content_range_total(range: &str) -> SupabaseResult<u64> {
    range
        .rsplit('/')
        .next()
        .and_then(|total| total.trim().parse().ok())
        .ok_or_else(|| SupabaseError::Decode(format!("unexpected Content-Range '{}'", range)))
}
