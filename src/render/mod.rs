//! Terminal rendering of snapshots
//!
//! Presentation glue only: number/date formatting and table layout

use crate::poll::{parse_price, Snapshot};
use crate::upstream::Listing;
use chrono::{DateTime, Local, Utc};
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, Table};
use rust_decimal::Decimal;

/// Placeholder for absent values
const EMPTY_VALUE: &str = "—";

/// Clear the terminal before redrawing
pub fn clear_terminal() {
    println!("{}c", 27 as char);
}

/// Format a price with two decimals and the currency sign
pub fn format_price(value: Option<Decimal>) -> String {
    match value {
        Some(v) => format!("{v:.2} ₽"),
        None => EMPTY_VALUE.to_string(),
    }
}

/// Format the last-updated instant as local wall-clock time
pub fn format_updated_at(value: Option<DateTime<Utc>>) -> String {
    match value {
        Some(ts) => ts.with_timezone(&Local).format("%H:%M:%S").to_string(),
        None => EMPTY_VALUE.to_string(),
    }
}

/// Render a full snapshot for the terminal
pub fn render_snapshot(snapshot: &Snapshot, refresh_interval_secs: u64) -> String {
    let mut out = String::new();

    if snapshot.loading && snapshot.is_empty() {
        out.push_str("Loading current rates...\n");
        return out;
    }

    if let Some(error) = &snapshot.error {
        out.push_str(&format!("Failed to refresh: {error}\n"));
        out.push_str("Press Enter to retry; previous data shown below.\n\n");
    }

    out.push_str(&render_section(
        "Last of page 1 + first 5 of page 2",
        &snapshot.primary,
        snapshot.primary_average,
        1,
    ));
    out.push('\n');
    out.push_str(&render_section(
        "Positions 15–20 (page 2)",
        &snapshot.secondary,
        snapshot.secondary_average,
        15,
    ));
    out.push('\n');
    out.push_str(&format!(
        "Refreshing every {refresh_interval_secs} s. Last update: {}\n",
        format_updated_at(snapshot.last_updated)
    ));

    out
}

fn render_section(
    title: &str,
    listings: &[Listing],
    average: Option<Decimal>,
    first_rank: usize,
) -> String {
    let mut out = format!("{title}\n");
    out.push_str(&format!(
        "Average: {} over {} offers\n",
        format_price(average),
        listings.len()
    ));

    if listings.is_empty() {
        out.push_str("No offers available.\n");
        return out;
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("#"),
            Cell::new("Advertiser"),
            Cell::new("Price").fg(Color::Green),
        ]);

    for (index, listing) in listings.iter().enumerate() {
        table.add_row(vec![
            (first_rank + index).to_string(),
            listing.nick_name.clone(),
            format_price(parse_price(listing)),
        ]);
    }

    out.push_str(&table.to_string());
    out.push('\n');
    out
}
