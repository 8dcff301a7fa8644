use crate::headers::add_api_headers;
use crate::parsing::{
    parse_api_error, parse_weekly_chart_list, parse_weekly_track_chart,
    DEFAULT_RATE_LIMIT_RETRY_AFTER,
};
use crate::{ChartFragment, ChartWindow, Result, SyncError};
use async_trait::async_trait;
use http_client::{HttpClient, Request};
use http_types::{Method, Url};
use std::sync::Arc;

/// Last.fm web service endpoint
pub const API_BASE_URL: &str = "https://ws.audioscrobbler.com/2.0/";

// =============================================================================
// ChartSource trait and implementation
// =============================================================================

/// Source of per-window listening charts for a user.
///
/// The aggregator only needs these two queries; the HTTP client below is
/// the production implementation and tests substitute fakes or mocks.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait(?Send)]
pub trait ChartSource {
    /// List every closed chart window covering the user's history.
    async fn weekly_chart_list(&self, username: &str) -> Result<Vec<ChartWindow>>;

    /// Fetch the track chart for one window.
    async fn weekly_track_chart(&self, username: &str, window: &ChartWindow)
        -> Result<ChartFragment>;
}

#[derive(Clone)]
pub struct LastFmApiClientImpl {
    client: Arc<dyn HttpClient + Send + Sync>,
    api_key: String,
    base_url: String,
}

impl LastFmApiClientImpl {
    pub fn new(client: Box<dyn HttpClient + Send + Sync>, api_key: String) -> Self {
        Self::with_base_url(client, api_key, API_BASE_URL.to_string())
    }

    pub fn with_base_url(
        client: Box<dyn HttpClient + Send + Sync>,
        api_key: String,
        base_url: String,
    ) -> Self {
        Self {
            client: Arc::from(client),
            api_key,
            base_url,
        }
    }

    /// Build the request URL for an API method.
    pub fn method_url(&self, method: &str, params: &[(&str, String)]) -> String {
        let mut url = format!(
            "{}?method={}&api_key={}&format=json",
            self.base_url,
            urlencoding::encode(method),
            urlencoding::encode(&self.api_key),
        );
        for (key, value) in params {
            url.push('&');
            url.push_str(key);
            url.push('=');
            url.push_str(&urlencoding::encode(value));
        }
        url
    }

    /// Issue a GET for `method` and return the body of a successful response.
    async fn get(&self, method: &str, params: &[(&str, String)]) -> Result<String> {
        let url = self.method_url(method, params);
        log::debug!("GET {method} {params:?}");

        let parsed = url
            .parse::<Url>()
            .map_err(|e| SyncError::Http(format!("Invalid request URL: {e}")))?;
        let mut request = Request::new(Method::Get, parsed);
        add_api_headers(&mut request);

        let request_start = std::time::Instant::now();
        let mut response = self
            .client
            .send(request)
            .await
            .map_err(|e| SyncError::Http(e.to_string()))?;

        log::debug!(
            "{method} responded {} in {}ms",
            response.status(),
            request_start.elapsed().as_millis()
        );

        if response.status() == 429 {
            let retry_after = response
                .header("retry-after")
                .and_then(|h| h.get(0))
                .and_then(|v| v.as_str().parse::<u64>().ok())
                .unwrap_or(DEFAULT_RATE_LIMIT_RETRY_AFTER);
            return Err(SyncError::RateLimit { retry_after });
        }

        let status = response.status();
        let body = response
            .body_string()
            .await
            .map_err(|e| SyncError::Http(e.to_string()))?;

        // Last.fm reports most failures as an error document, sometimes with a 200.
        if let Some(error) = parse_api_error(&body) {
            return Err(error);
        }

        if !status.is_success() {
            return Err(SyncError::Http(format!("{method} returned HTTP {status}")));
        }

        Ok(body)
    }
}

#[async_trait(?Send)]
impl ChartSource for LastFmApiClientImpl {
    async fn weekly_chart_list(&self, username: &str) -> Result<Vec<ChartWindow>> {
        let body = self
            .get("user.getweeklychartlist", &[("user", username.to_string())])
            .await?;
        parse_weekly_chart_list(&body)
    }

    async fn weekly_track_chart(
        &self,
        username: &str,
        window: &ChartWindow,
    ) -> Result<ChartFragment> {
        let body = self
            .get(
                "user.getweeklytrackchart",
                &[
                    ("user", username.to_string()),
                    ("from", window.from.to_string()),
                    ("to", window.to.to_string()),
                ],
            )
            .await?;
        parse_weekly_track_chart(&body, *window)
    }
}
