//! Bybit fiat OTC client
//!
//! POSTs the online-items filter payload to Bybit's P2P endpoint and unwraps
//! the response envelope into a page of listings.

use super::{FetchError, Listing, PageFetcher};
use crate::config::UpstreamConfig;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Upstream path for online P2P offers
pub const ONLINE_ITEMS_PATH: &str = "/x-api/fiat/otc/item/online";

/// Fallback message when the upstream reports failure without a reason
const UPSTREAM_FALLBACK_MSG: &str = "unexpected response from upstream";

/// HTTP client for the Bybit P2P online-items endpoint
pub struct BybitClient {
    config: UpstreamConfig,
    client: Client,
}

impl BybitClient {
    /// Create a new client from upstream configuration
    pub fn new(config: UpstreamConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}{}",
            self.config.base_url.trim_end_matches('/'),
            ONLINE_ITEMS_PATH
        )
    }

    /// Build the filter payload for the given 1-based page
    fn build_request(&self, page: u32) -> OnlineItemsRequest {
        OnlineItemsRequest {
            user_id: String::new(),
            token_id: self.config.token_id.clone(),
            currency_id: self.config.currency_id.clone(),
            payment: self.config.payment_methods.clone(),
            side: self.config.side.clone(),
            size: self.config.page_size.to_string(),
            page: page.to_string(),
            amount: self.config.min_amount.clone(),
            va_maker: false,
            bulk_maker: false,
            can_trade: false,
            verification_filter: 0,
            sort_type: self.config.sort_type.clone(),
            payment_period: vec![],
            item_region: self.config.item_region,
        }
    }

    async fn send_request(&self, page: u32) -> Result<Vec<Listing>, FetchError> {
        let url = self.endpoint();

        tracing::debug!(page, url = %url, "Fetching P2P listings page");

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json;charset=UTF-8")
            .header(ACCEPT, "application/json")
            .json(&self.build_request(page))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Transport {
                status: status.as_u16(),
                reason: status
                    .canonical_reason()
                    .unwrap_or("unknown status")
                    .to_string(),
            });
        }

        let envelope: OnlineItemsResponse = response.json().await?;
        envelope.into_listings()
    }
}

#[async_trait]
impl PageFetcher for BybitClient {
    async fn fetch_page(
        &self,
        page: u32,
        cancel: &CancellationToken,
    ) -> Result<Vec<Listing>, FetchError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            result = self.send_request(page) => result,
        }
    }
}

/// Filter payload for the online-items endpoint
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OnlineItemsRequest {
    user_id: String,
    token_id: String,
    currency_id: String,
    payment: Vec<String>,
    side: String,
    size: String,
    page: String,
    amount: String,
    va_maker: bool,
    bulk_maker: bool,
    can_trade: bool,
    verification_filter: i32,
    sort_type: String,
    payment_period: Vec<String>,
    item_region: i32,
}

/// Response envelope from the online-items endpoint
#[derive(Debug, Deserialize)]
struct OnlineItemsResponse {
    ret_code: i64,
    #[serde(default)]
    ret_msg: String,
    result: Option<OnlineItemsResult>,
}

#[derive(Debug, Deserialize)]
struct OnlineItemsResult {
    #[serde(default)]
    #[allow(dead_code)]
    count: i64,
    #[serde(default, deserialize_with = "listings_or_empty")]
    items: Vec<Listing>,
}

impl OnlineItemsResponse {
    /// Success iff ret_code is zero and a result payload is present
    fn into_listings(self) -> Result<Vec<Listing>, FetchError> {
        match self.result {
            Some(result) if self.ret_code == 0 => Ok(result.items),
            _ => {
                let msg = if self.ret_msg.is_empty() {
                    UPSTREAM_FALLBACK_MSG.to_string()
                } else {
                    self.ret_msg
                };
                Err(FetchError::Upstream(msg))
            }
        }
    }
}

/// Accept a missing or malformed items field as an empty page
fn listings_or_empty<'de, D>(deserializer: D) -> Result<Vec<Listing>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let Some(entries) = value.as_array() else {
        return Ok(Vec::new());
    };

    Ok(entries
        .iter()
        .cloned()
        .filter_map(|entry| serde_json::from_value(entry).ok())
        .collect())
}
