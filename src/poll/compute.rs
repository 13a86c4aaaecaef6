//! Derived-data computation
//!
//! Deterministic slicing of the two fetched pages into the displayed subsets,
//! plus price averaging.

use crate::upstream::Listing;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Page-2 listings prepended to the primary subset
const PRIMARY_PAGE2_COUNT: usize = 5;

/// Zero-based page-2 index range of the secondary subset
const SECONDARY_RANGE: std::ops::Range<usize> = 4..10;

/// Last listing of page 1 (when present) followed by the first five of page 2
pub fn primary_subset(page1: &[Listing], page2: &[Listing]) -> Vec<Listing> {
    let mut subset = Vec::with_capacity(PRIMARY_PAGE2_COUNT + 1);
    if let Some(last) = page1.last() {
        subset.push(last.clone());
    }
    subset.extend(page2.iter().take(PRIMARY_PAGE2_COUNT).cloned());
    subset
}

/// Page-2 listings at indices 4 through 9 (six entries)
///
/// Index 4 also appears in the primary subset; the overlap is intentional.
pub fn secondary_subset(page2: &[Listing]) -> Vec<Listing> {
    page2
        .iter()
        .skip(SECONDARY_RANGE.start)
        .take(SECONDARY_RANGE.len())
        .cloned()
        .collect()
}

/// Parse a listing's price field, ignoring values that are not plain decimals
pub fn parse_price(listing: &Listing) -> Option<Decimal> {
    Decimal::from_str(listing.price.trim()).ok()
}

/// Arithmetic mean of the parseable prices, rounded to 2 decimal places
///
/// Unparseable prices are skipped; returns None when nothing in the subset
/// parses. Rounding is midpoint-away-from-zero.
pub fn average_price(listings: &[Listing]) -> Option<Decimal> {
    let prices: Vec<Decimal> = listings.iter().filter_map(parse_price).collect();
    if prices.is_empty() {
        return None;
    }

    let sum: Decimal = prices.iter().sum();
    let mean = sum / Decimal::from(prices.len());
    Some(mean.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}
