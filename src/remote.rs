use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;

use crate::domain::ItemId;
use crate::error::SyncError;

/// Looks up when an item was last updated upstream.
///
/// `None` means "unknown". Lookup failures are never fatal: they only make
/// staleness detection less precise.
pub trait RemoteMetadata: Send + Sync {
    fn fetch_update_time(&self, id: &ItemId, timeout: Duration) -> Option<DateTime<Utc>>;
}

#[derive(Clone)]
pub struct SteamWorkshopClient {
    client: Client,
    endpoint: String,
}

impl SteamWorkshopClient {
    pub fn new(endpoint: &str) -> Result<Self, SyncError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("workshop-sync/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| SyncError::Network(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|err| SyncError::Network(err.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }

    /// One round trip to `GetPublishedFileDetails` for a single id.
    pub fn query(
        &self,
        id: &ItemId,
        timeout: Duration,
    ) -> Result<Option<DateTime<Utc>>, SyncError> {
        let response = self
            .client
            .post(&self.endpoint)
            .timeout(timeout)
            .form(&[("itemcount", "1"), ("publishedfileids[0]", id.as_str())])
            .send()
            .map_err(|err| SyncError::Network(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "remote metadata request failed".to_string());
            return Err(SyncError::RemoteStatus { status, message });
        }
        let body: Value = response
            .json()
            .map_err(|err| SyncError::Network(err.to_string()))?;
        Ok(parse_update_time(&body))
    }
}

impl RemoteMetadata for SteamWorkshopClient {
    fn fetch_update_time(&self, id: &ItemId, timeout: Duration) -> Option<DateTime<Utc>> {
        match self.query(id, timeout) {
            Ok(Some(updated_at)) => {
                tracing::debug!(item = %id, %updated_at, "remote metadata");
                Some(updated_at)
            }
            Ok(None) => {
                tracing::debug!(item = %id, "remote metadata has no update time");
                None
            }
            Err(err) => {
                tracing::warn!(item = %id, error = %err, "NetworkError: remote metadata unavailable");
                None
            }
        }
    }
}

/// Never knows anything; every present item is treated as fresh.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineRemote;

impl RemoteMetadata for OfflineRemote {
    fn fetch_update_time(&self, _id: &ItemId, _timeout: Duration) -> Option<DateTime<Utc>> {
        None
    }
}

/// Extracts `time_updated` from a `GetPublishedFileDetails` response body.
pub fn parse_update_time(body: &Value) -> Option<DateTime<Utc>> {
    let details = body
        .get("response")
        .and_then(|value| value.get("publishedfiledetails"))
        .and_then(|value| value.as_array())
        .and_then(|array| array.first())?;

    // result != 1 means the item was not found or is hidden.
    let result = details.get("result").and_then(|value| value.as_i64());
    if result.is_some_and(|code| code != 1) {
        return None;
    }

    details
        .get("time_updated")
        .and_then(|value| value.as_i64())
        .filter(|secs| *secs > 0)
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}
