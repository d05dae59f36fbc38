use crate::models::{AnalyticsSummary, ClickShare, UrlRecord};
use chrono::{DateTime, Utc};
use std::sync::Arc;

const RECENT_LIMIT: usize = 3;
const TOP_LIMIT: usize = 5;
const TRUNCATE_AT: usize = 30;

/// The dashboard shows at most this many distribution rows.
pub const DISTRIBUTION_DISPLAY_LIMIT: usize = 10;

/// Derive the dashboard statistics from a session's links (newest first).
///
/// Defined for the empty list, where every count is zero, the lists are
/// empty and `most_clicked` is the default record.
pub fn summarize(records: &[UrlRecord]) -> AnalyticsSummary {
    let total_urls = records.len();
    let total_clicks: u64 = records.iter().map(|r| r.clicks).sum();

    // Strict `>` keeps the first record on ties.
    let most_clicked = records
        .iter()
        .fold(None::<&UrlRecord>, |best, r| match best {
            Some(b) if r.clicks <= b.clicks => Some(b),
            _ => Some(r),
        })
        .cloned()
        .unwrap_or_default();

    // Stable sorts: ties keep store order.
    let mut recent = records.to_vec();
    recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    recent.truncate(RECENT_LIMIT);

    let mut top = records.to_vec();
    top.sort_by(|a, b| b.clicks.cmp(&a.clicks));
    top.truncate(TOP_LIMIT);

    let distribution = records
        .iter()
        .filter(|r| r.clicks > 0)
        .map(|r| ClickShare {
            short_url: r.short_url.clone(),
            clicks: r.clicks,
            percentage: percentage(r.clicks, total_clicks),
        })
        .collect();

    AnalyticsSummary {
        total_urls,
        total_clicks,
        avg_clicks_per_url: average(total_clicks, total_urls),
        most_clicked,
        recent,
        top,
        distribution,
    }
}

/// Mean clicks per link to one decimal place.
///
/// Rounds the binary quotient to the nearest tenth; a quotient sitting exactly
/// halfway between two tenths rounds up.
fn average(total_clicks: u64, total_urls: usize) -> String {
    if total_urls == 0 {
        return "0".to_owned();
    }
    let mean = total_clicks as f64 / total_urls as f64;

    // Exact halfway points are odd multiples of 1/4.
    let quarters = mean * 4.0;
    if quarters.fract() == 0.0 && quarters % 2.0 == 1.0 {
        let tenths = (quarters as u64 * 5 + 1) / 2;
        return format!("{}.{}", tenths / 10, tenths % 10);
    }
    format!("{mean:.1}")
}

fn percentage(clicks: u64, total_clicks: u64) -> f64 {
    if total_clicks == 0 {
        0.0
    } else {
        clicks as f64 / total_clicks as f64 * 100.0
    }
}

/// Caches the last summary together with the snapshot it was computed from.
///
/// A lookup with the same snapshot (by pointer) returns the cached summary;
/// any other snapshot triggers a full recompute.
#[derive(Debug, Default)]
pub struct SummaryMemo {
    last: Option<(Arc<Vec<UrlRecord>>, Arc<AnalyticsSummary>)>,
}

impl SummaryMemo {
    pub fn get(&mut self, records: &Arc<Vec<UrlRecord>>) -> Arc<AnalyticsSummary> {
        if let Some((input, output)) = &self.last {
            if Arc::ptr_eq(input, records) {
                return Arc::clone(output);
            }
        }
        let summary = Arc::new(summarize(records));
        self.last = Some((Arc::clone(records), Arc::clone(&summary)));
        summary
    }
}

// ── Display helpers ────────────────────────────────────────────────────────

/// Shorten long URLs for list rows: 30 characters plus "...".
pub fn truncate_url(url: &str) -> String {
    match url.char_indices().nth(TRUNCATE_AT) {
        Some((cut, _)) => format!("{}...", &url[..cut]),
        None => url.to_owned(),
    }
}

/// "Oct 19, 04:13 PM", used in the recent-activity panel.
pub fn format_activity_time(at: &DateTime<Utc>) -> String {
    at.format("%b %-d, %I:%M %p").to_string()
}

/// "10/19/2026", used in the link list.
pub fn format_list_date(at: &DateTime<Utc>) -> String {
    at.format("%-m/%-d/%Y").to_string()
}

/// Hue of the n-th distribution bar.
pub fn bar_hue(index: usize) -> usize {
    220 + index * 20
}
