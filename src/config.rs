//! Configuration types for p2p-rates

use serde::Deserialize;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub upstream: UpstreamConfig,
    pub poll: PollConfig,
    pub telemetry: TelemetryConfig,
}

/// Upstream endpoint and offer-filter configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the upstream service
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Asset identifier to quote
    pub token_id: String,
    /// Fiat currency identifier
    pub currency_id: String,
    /// Payment-method identifiers to filter by
    pub payment_methods: Vec<String>,
    /// Offer side ("1" = buy)
    pub side: String,
    /// Listings requested per page
    pub page_size: u32,
    /// Minimum tradeable amount filter
    pub min_amount: String,
    /// Upstream sort order
    pub sort_type: String,
    /// Upstream region code
    pub item_region: i32,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.bybit.com".to_string(),
            timeout_secs: 10,
            token_id: "USDT".to_string(),
            currency_id: "RUB".to_string(),
            payment_methods: vec!["582".to_string()],
            side: "1".to_string(),
            page_size: 10,
            min_amount: "10000".to_string(),
            sort_type: "OVERALL_RANKING".to_string(),
            item_region: 1,
        }
    }
}

/// Refresh scheduling configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Seconds between refresh cycles
    pub refresh_interval_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 10,
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Default log filter when RUST_LOG is unset
    pub log_level: String,
    /// Prometheus exporter port (0 disables the exporter)
    pub metrics_port: u16,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_port: 0,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
