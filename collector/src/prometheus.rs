//! Minimal client for the Prometheus instant query API (`/api/v1/query`).
//!
//! Only instant vectors are supported. Anything else the querier answers with
//! is reported as an error so the caller never has to guess about the shape of
//! the response.

use chrono::{
    DateTime,
    Utc,
};
use reqwest::StatusCode;
use serde::Deserialize;
use std::{
    collections::BTreeMap,
    future::Future,
    pin::Pin,
    time::Duration,
};
use url::Url;

pub type Warnings = Vec<String>;

/// One `(labelset, value)` entry of an instant vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub metric: BTreeMap<String, String>,
    pub timestamp: f64,
    pub value: f64,
}

impl Sample {
    pub fn new(value: f64) -> Self {
        Self {
            metric: BTreeMap::new(),
            timestamp: 0.0,
            value,
        }
    }

    pub fn with_label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.metric.insert(name.into(), value.into());
        self
    }
}

/// Successful answer of a query: the vector plus whatever warnings the backend attached.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResponse {
    pub vector: Vec<Sample>,
    pub warnings: Warnings,
}

impl QueryResponse {
    pub fn new(vector: Vec<Sample>) -> Self {
        Self {
            vector,
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(mut self, warnings: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.warnings = warnings.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(thiserror::Error, Debug)]
pub enum QueryError {
    #[error("client error: {status}")]
    Client { status: u16, body: String },
    #[error("server error: {status}")]
    Server { status: u16, body: String },
    #[error("{error_type}: {message}")]
    Api { error_type: String, message: String },
    #[error("unexpected result type {0:?}, expected vector")]
    UnexpectedResultType(String),
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid sample value {0:?}")]
    InvalidSample(String),
    #[error("invalid query URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("{0}")]
    Message(String),
}

/// The backend a [`crate::Getter`] talks to.
pub trait QueryApi: Send + Sync {
    /// Evaluates `query` at `time`.
    fn query<'a>(
        &'a self,
        query: &'a str,
        time: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<QueryResponse, QueryError>> + Send + 'a>>;
}

/// HTTP client for a Prometheus compatible querier (Prometheus, Thanos querier).
#[derive(Debug, Clone)]
pub struct PrometheusClient {
    http_client: reqwest::Client,
    query_url: Url,
    token: Option<String>,
}

impl PrometheusClient {
    pub fn new(base_url: Url, token: Option<String>, timeout: Duration) -> Result<Self, QueryError> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Self::with_http_client(http_client, base_url, token)
    }

    pub fn with_http_client(
        http_client: reqwest::Client,
        mut base_url: Url,
        token: Option<String>,
    ) -> Result<Self, QueryError> {
        // Without the trailing slash `join` would drop the last path segment.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let query_url = base_url.join("api/v1/query")?;
        Ok(Self {
            http_client,
            query_url,
            token,
        })
    }

    pub fn query_url(&self) -> &Url {
        &self.query_url
    }

    async fn instant_query(&self, query: &str, time: DateTime<Utc>) -> Result<QueryResponse, QueryError> {
        let time = format!("{:.3}", time.timestamp_millis() as f64 / 1000.0);
        let mut request = self
            .http_client
            .get(self.query_url.clone())
            .query(&[("query", query), ("time", time.as_str())]);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        trace!(%status, query, "prometheus answered");

        decode_response(status, &body)
    }
}

impl QueryApi for PrometheusClient {
    fn query<'a>(
        &'a self,
        query: &'a str,
        time: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<QueryResponse, QueryError>> + Send + 'a>> {
        Box::pin(self.instant_query(query, time))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    status: String,
    #[serde(default)]
    data: Option<ApiData>,
    #[serde(default)]
    error_type: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    warnings: Warnings,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiData {
    result_type: String,
    result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RawSample {
    #[serde(default)]
    metric: BTreeMap<String, String>,
    value: (f64, String),
}

/// Status codes for which Prometheus answers with a JSON error body.
fn carries_api_error(status: StatusCode) -> bool {
    matches!(status.as_u16(), 400 | 422 | 503)
}

fn status_error(status: StatusCode, body: &str) -> QueryError {
    let body = body.to_string();
    if status.is_server_error() {
        QueryError::Server {
            status: status.as_u16(),
            body,
        }
    } else {
        QueryError::Client {
            status: status.as_u16(),
            body,
        }
    }
}

fn decode_response(status: StatusCode, body: &str) -> Result<QueryResponse, QueryError> {
    if !status.is_success() && !carries_api_error(status) {
        return Err(status_error(status, body));
    }

    let response: ApiResponse = match serde_json::from_str(body) {
        Ok(response) => response,
        Err(_) if !status.is_success() => return Err(status_error(status, body)),
        Err(err) => return Err(err.into()),
    };

    if response.status == "error" {
        return Err(QueryError::Api {
            error_type: response.error_type.unwrap_or_else(|| "unknown".to_string()),
            message: response.error.unwrap_or_default(),
        });
    }

    let data = response
        .data
        .ok_or_else(|| QueryError::Message("response without data".to_string()))?;
    if data.result_type != "vector" {
        return Err(QueryError::UnexpectedResultType(data.result_type));
    }

    let raw: Vec<RawSample> = serde_json::from_value(data.result)?;
    let vector = raw
        .into_iter()
        .map(|sample| {
            let (timestamp, value) = sample.value;
            let value = value.parse::<f64>().map_err(|_| QueryError::InvalidSample(value))?;
            Ok(Sample {
                metric: sample.metric,
                timestamp,
                value,
            })
        })
        .collect::<Result<Vec<_>, QueryError>>()?;

    Ok(QueryResponse {
        vector,
        warnings: response.warnings,
    })
}
