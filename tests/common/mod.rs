#![allow(dead_code)]
use async_trait::async_trait;
use lastfm_playcount_sync::{
    AggregateCache, ChartEntry, ChartFragment, ChartSource, ChartWindow, PlaycountAggregator,
    Result, RetryConfig, SyncConfig, SyncError,
};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Scripted chart source keyed by window start.
///
/// Windows without a scripted response return an empty chart.
#[derive(Default)]
pub struct FakeChartSource {
    pub history: Vec<ChartWindow>,
    pub charts: HashMap<u64, Vec<ChartEntry>>,
    pub failing: HashMap<u64, fn() -> SyncError>,
    pub rate_limited_once: RefCell<Vec<u64>>,
    pub fail_chart_list: bool,
    pub chart_list_calls: Cell<usize>,
    pub requested: RefCell<Vec<ChartWindow>>,
}

impl FakeChartSource {
    pub fn new(history: Vec<ChartWindow>) -> Self {
        Self {
            history,
            ..Default::default()
        }
    }

    pub fn with_chart(mut self, from: u64, entries: &[(&str, &str, u64)]) -> Self {
        self.charts.insert(
            from,
            entries
                .iter()
                .map(|(artist, name, count)| ChartEntry::new(*artist, *name, *count))
                .collect(),
        );
        self
    }

    pub fn with_failure(mut self, from: u64, error: fn() -> SyncError) -> Self {
        self.failing.insert(from, error);
        self
    }

    pub fn with_rate_limit_once(self, from: u64) -> Self {
        self.rate_limited_once.borrow_mut().push(from);
        self
    }

    pub fn with_failing_chart_list(mut self) -> Self {
        self.fail_chart_list = true;
        self
    }

    pub fn chart_calls(&self) -> usize {
        self.requested.borrow().len()
    }

    pub fn total_calls(&self) -> usize {
        self.chart_list_calls.get() + self.chart_calls()
    }
}

#[async_trait(?Send)]
impl ChartSource for FakeChartSource {
    async fn weekly_chart_list(&self, _username: &str) -> Result<Vec<ChartWindow>> {
        self.chart_list_calls.set(self.chart_list_calls.get() + 1);
        if self.fail_chart_list {
            return Err(SyncError::Http("connection reset".to_string()));
        }
        Ok(self.history.clone())
    }

    async fn weekly_track_chart(
        &self,
        _username: &str,
        window: &ChartWindow,
    ) -> Result<ChartFragment> {
        self.requested.borrow_mut().push(*window);

        if let Some(error) = self.failing.get(&window.from) {
            return Err(error());
        }

        let mut limited = self.rate_limited_once.borrow_mut();
        if let Some(position) = limited.iter().position(|from| *from == window.from) {
            limited.remove(position);
            return Err(SyncError::RateLimit { retry_after: 0 });
        }

        Ok(ChartFragment {
            window: *window,
            entries: self.charts.get(&window.from).cloned().unwrap_or_default(),
        })
    }
}

/// Run settings with no pacing or backoff so tests finish instantly.
pub fn fast_config(username: &str) -> SyncConfig {
    SyncConfig::new(username)
        .with_request_delay(Duration::ZERO)
        .with_retry_config(RetryConfig::with_delays(0, 0))
}

pub fn aggregator(
    source: FakeChartSource,
    cache_dir: &Path,
    config: &SyncConfig,
) -> PlaycountAggregator<FakeChartSource> {
    PlaycountAggregator::new(source, AggregateCache::new(cache_dir)).with_config(config)
}

/// Write a JSON library file and return its path.
pub fn write_library(dir: &Path, tracks: &[(&str, &str, u64)]) -> PathBuf {
    let tracks: Vec<serde_json::Value> = tracks
        .iter()
        .map(|(artist, name, play_count)| {
            serde_json::json!({"artist": artist, "name": name, "play_count": play_count})
        })
        .collect();
    let path = dir.join("library.json");
    std::fs::write(&path, serde_json::to_string_pretty(&tracks).unwrap()).unwrap();
    path
}
