//! Client for the remote ingest-status API

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use satchel_core::config::IngestApiConfig;
use satchel_core::retry::{RetryExecutor, TracingObserver, TransientOnly};
use satchel_core::{Error, Result, RetryPolicy};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// One ingest work item as reported by the remote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestRecord {
    pub status: String,
    #[serde(default)]
    pub stage: String,
    #[serde(default)]
    pub object_identifier: Option<String>,
    #[serde(default)]
    pub date_processed: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct IngestResponse {
    #[serde(default)]
    count: u64,
    #[serde(default)]
    results: Vec<IngestRecord>,
}

/// Source of ingest results for deposited bags
#[async_trait]
pub trait IngestApi: Send + Sync {
    /// Most recent ingest record for `identifier` processed at or after `processed_since`
    async fn latest_ingest(
        &self,
        identifier: &str,
        processed_since: DateTime<Utc>,
    ) -> Result<Option<IngestRecord>>;
}

/// [`IngestApi`] over HTTP
///
/// Queries `GET <base_url>/items` for the newest `Ingest` action on the
/// prefixed object identifier.
pub struct HttpIngestApi {
    client: reqwest::Client,
    config: IngestApiConfig,
    policy: RetryPolicy,
}

impl HttpIngestApi {
    pub fn new(config: IngestApiConfig, policy: RetryPolicy) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("satchel/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::invalid_config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            policy,
        })
    }

    fn items_url(&self) -> String {
        format!("{}/items", self.config.base_url.trim_end_matches('/'))
    }

    async fn fetch(&self, object_identifier: &str, since: &str, context: &str) -> Result<IngestResponse> {
        let response = self
            .client
            .get(self.items_url())
            .query(&[
                ("object_identifier", object_identifier),
                ("action", "Ingest"),
                ("date_processed__gteq", since),
                ("sort", "date_processed__desc"),
                ("per_page", "1"),
            ])
            .header(self.config.user_header.as_str(), self.config.api_user.as_str())
            .header(self.config.key_header.as_str(), self.config.api_key.as_str())
            .send()
            .await
            .map_err(|e| Error::transport(context, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, context));
        }

        response
            .json::<IngestResponse>()
            .await
            .map_err(|e| Error::transport(context, format!("unexpected response body: {}", e)))
    }
}

/// Map a non-success response to an error; only 429 and 5xx stay transient
fn status_error(status: StatusCode, context: &str) -> Error {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::invalid_config(format!(
            "{} was rejected with HTTP {}; check the ingest API credentials",
            context, status
        )),
        StatusCode::NOT_FOUND => Error::not_found(format!("{} (HTTP {})", context, status)),
        StatusCode::TOO_MANY_REQUESTS => Error::transport(context, format!("HTTP {}", status)),
        s if s.is_client_error() => {
            Error::invalid_config(format!("{} was rejected with HTTP {}", context, status))
        }
        _ => Error::transport(context, format!("HTTP {}", status)),
    }
}

#[async_trait]
impl IngestApi for HttpIngestApi {
    async fn latest_ingest(
        &self,
        identifier: &str,
        processed_since: DateTime<Utc>,
    ) -> Result<Option<IngestRecord>> {
        let object_identifier = format!("{}{}", self.config.object_identifier_prefix, identifier);
        let since = processed_since.to_rfc3339_opts(SecondsFormat::Secs, true);
        let context = format!("ingest status for {}", object_identifier);

        let response = RetryExecutor::new(self.policy.clone())
            .with_predicate(TransientOnly)
            .with_observer(TracingObserver::new(context.as_str()))
            .execute(|| self.fetch(&object_identifier, &since, &context))
            .await
            .map_err(|e| e.into_error(context.as_str()))?;

        debug!(
            "Ingest query for {} returned {} results",
            object_identifier, response.count
        );
        Ok(response.results.into_iter().next())
    }
}
