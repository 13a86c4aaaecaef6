//! Upstream P2P pricing module
//!
//! Fetches pages of online P2P offers from the Bybit fiat OTC endpoint

mod bybit;

pub use bybit::{BybitClient, ONLINE_ITEMS_PATH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// One P2P offer as returned by the upstream service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    /// Upstream offer identifier
    #[serde(default)]
    pub id: Option<String>,
    /// Advertiser display name
    #[serde(default)]
    pub nick_name: String,
    /// Offer price as decimal text
    #[serde(default)]
    pub price: String,
    /// Upstream price-type code
    #[serde(default)]
    pub price_type: i32,
    /// Fiat currency identifier
    #[serde(default)]
    pub currency_id: String,
    /// Asset identifier
    #[serde(default)]
    pub token_id: String,
    /// Minimum tradeable amount as decimal text
    #[serde(default)]
    pub min_amount: String,
    /// Maximum tradeable amount as decimal text
    #[serde(default)]
    pub max_amount: String,
    /// Accepted payment-method identifiers
    #[serde(default)]
    pub payments: Vec<String>,
}

/// Errors from a page fetch
#[derive(Debug, Error)]
pub enum FetchError {
    /// Non-2xx HTTP status from the upstream
    #[error("HTTP {status} {reason}")]
    Transport { status: u16, reason: String },
    /// Failure reported inside the response envelope
    #[error("{0}")]
    Upstream(String),
    /// The cycle owning this request was superseded; callers ignore this silently
    #[error("request cancelled")]
    Cancelled,
    /// Connection-level failure
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl FetchError {
    /// True for the silent cancelled outcome
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled)
    }
}

/// Trait for page-fetch implementations
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch one 1-based page of listings, honoring the cancellation token
    async fn fetch_page(
        &self,
        page: u32,
        cancel: &CancellationToken,
    ) -> Result<Vec<Listing>, FetchError>;
}
