//! p2p-rates: terminal watcher for Bybit P2P USDT/RUB buy offers
//!
//! This library provides the core components for:
//! - Page fetches against the Bybit fiat OTC "online items" endpoint
//! - Refresh scheduling with cancel-on-supersede cycles
//! - Slicing and averaging of the combined two-page result set
//! - Snapshot publication for the presentation layer
//! - Terminal rendering of the published snapshot
//! - Configuration and observability stack

pub mod cli;
pub mod config;
pub mod poll;
pub mod render;
pub mod telemetry;
pub mod upstream;
