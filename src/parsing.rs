//! Parsing for Last.fm web service responses.
//!
//! All functions here are pure: they take a response body and return
//! structured data. Last.fm's JSON has a few quirks that are absorbed here:
//! numbers arrive as strings, a list with a single element is sometimes
//! serialized as a bare object, and errors come back as a 200 with an
//! `{"error": code, "message": ...}` body.

use crate::{ChartEntry, ChartFragment, ChartWindow, Result, SyncError};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

/// Last.fm error code for "rate limit exceeded".
pub const RATE_LIMIT_ERROR_CODE: u32 = 29;

/// Seconds to back off when Last.fm reports a rate limit without saying how long.
pub const DEFAULT_RATE_LIMIT_RETRY_AFTER: u64 = 60;

#[derive(Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
pub enum ApiNumber {
    Text(String),
    Number(u64),
}

impl ApiNumber {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            ApiNumber::Text(text) => text.trim().parse().ok(),
            ApiNumber::Number(number) => Some(*number),
        }
    }
}

#[derive(Deserialize)]
pub struct ApiErrorResponse {
    pub error: u32,
    #[serde(default)]
    pub message: String,
}

#[derive(Deserialize)]
pub struct WeeklyChartListResponse {
    pub weeklychartlist: WeeklyChartList,
}

#[derive(Deserialize)]
pub struct WeeklyChartList {
    /// Decoded per element so one bad window does not hide the rest
    #[serde(default)]
    pub chart: OneOrMany<Value>,
}

#[derive(Deserialize)]
pub struct ApiChartRange {
    pub from: ApiNumber,
    pub to: ApiNumber,
}

#[derive(Deserialize)]
pub struct WeeklyTrackChartResponse {
    pub weeklytrackchart: WeeklyTrackChart,
}

#[derive(Deserialize)]
pub struct WeeklyTrackChart {
    /// Decoded per element so one bad entry does not hide the rest
    #[serde(default)]
    pub track: OneOrMany<Value>,
}

#[derive(Deserialize)]
pub struct ApiChartTrack {
    pub name: String,
    pub artist: ApiTextField,
    pub playcount: ApiNumber,
}

#[derive(Deserialize)]
pub struct ApiTextField {
    #[serde(rename = "#text")]
    pub text: String,
}

/// Detect an error payload in a response body.
///
/// Returns `None` when the body is not an error document. Rate limit
/// errors are surfaced as [`SyncError::RateLimit`] so callers can retry.
pub fn parse_api_error(body: &str) -> Option<SyncError> {
    let response: ApiErrorResponse = serde_json::from_str(body).ok()?;

    if response.error == RATE_LIMIT_ERROR_CODE {
        return Some(SyncError::RateLimit {
            retry_after: DEFAULT_RATE_LIMIT_RETRY_AFTER,
        });
    }

    Some(SyncError::Api {
        code: response.error,
        message: response.message,
    })
}

/// Decode every element of a list on its own, skipping the ones that do
/// not match `T`.
fn decode_each<T: DeserializeOwned>(items: OneOrMany<Value>, what: &str) -> Vec<T> {
    items
        .into_vec()
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                log::debug!("Skipping malformed {what}: {e}");
                None
            }
        })
        .collect()
}

/// Parse a `user.getweeklychartlist` response into chart windows.
///
/// Windows with missing or unparseable boundaries are skipped.
pub fn parse_weekly_chart_list(json: &str) -> Result<Vec<ChartWindow>> {
    let response: WeeklyChartListResponse =
        serde_json::from_str(json).map_err(|e| SyncError::Parse(e.to_string()))?;

    let windows: Vec<ChartWindow> =
        decode_each::<ApiChartRange>(response.weeklychartlist.chart, "chart window")
            .into_iter()
            .filter_map(|range| match (range.from.as_u64(), range.to.as_u64()) {
                (Some(from), Some(to)) => Some(ChartWindow::new(from, to)),
                _ => {
                    log::debug!("Skipping chart window with malformed boundaries");
                    None
                }
            })
            .collect();

    log::debug!("Parsed {} chart windows", windows.len());
    Ok(windows)
}

/// Parse a `user.getweeklytrackchart` response for `window`.
///
/// Entries missing a name or artist, or with an unparseable play count,
/// are skipped.
pub fn parse_weekly_track_chart(json: &str, window: ChartWindow) -> Result<ChartFragment> {
    let response: WeeklyTrackChartResponse =
        serde_json::from_str(json).map_err(|e| SyncError::Parse(e.to_string()))?;

    let entries: Vec<ChartEntry> =
        decode_each::<ApiChartTrack>(response.weeklytrackchart.track, "chart entry")
            .into_iter()
            .filter_map(|track| {
                let Some(playcount) = track.playcount.as_u64() else {
                    log::debug!(
                        "Skipping chart entry '{}' by '{}' with malformed playcount",
                        track.name,
                        track.artist.text
                    );
                    return None;
                };
                Some(ChartEntry {
                    artist: track.artist.text,
                    name: track.name,
                    playcount,
                })
            })
            .collect();

    log::debug!("Parsed {} chart entries for {}", entries.len(), window);
    Ok(ChartFragment { window, entries })
}
