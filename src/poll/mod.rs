//! Poll controller module
//!
//! Owns refresh scheduling, fetch cancellation, derived-data computation,
//! and snapshot publication

mod compute;
mod controller;

pub use compute::{average_price, parse_price, primary_subset, secondary_subset};
pub use controller::{PollController, PollHandle};

use crate::upstream::Listing;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Published state for one refresh cycle
///
/// Replaced atomically through the controller's watch channel; consumers only
/// ever observe a complete snapshot derived from a single pair of page
/// fetches.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// True until the first cycle resolves
    pub loading: bool,
    /// Message of the most recent failed cycle, cleared on success
    pub error: Option<String>,
    /// Completion time of the last successful cycle
    pub last_updated: Option<DateTime<Utc>>,
    /// Last listing of page 1 followed by the first five of page 2
    pub primary: Vec<Listing>,
    /// Page-2 listings at zero-based indices 4 through 9
    pub secondary: Vec<Listing>,
    /// Mean price of the primary subset
    pub primary_average: Option<Decimal>,
    /// Mean price of the secondary subset
    pub secondary_average: Option<Decimal>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            loading: true,
            error: None,
            last_updated: None,
            primary: vec![],
            secondary: vec![],
            primary_average: None,
            secondary_average: None,
        }
    }
}

impl Snapshot {
    /// True when no cycle has published listings yet
    pub fn is_empty(&self) -> bool {
        self.primary.is_empty() && self.secondary.is_empty()
    }
}
