use http_client::Request;

/// User agent sent with every web service request
const USER_AGENT: &str = concat!(
    "lastfm-playcount-sync/",
    env!("CARGO_PKG_VERSION"),
    " (+https://www.last.fm/api)"
);

/// Add headers for Last.fm web service GET requests
pub fn add_api_headers(request: &mut Request) {
    let _ = request.insert_header("User-Agent", USER_AGENT);
    let _ = request.insert_header("Accept", "application/json");
    let _ = request.insert_header("Accept-Language", "en-US,en;q=0.9");
    let _ = request.insert_header("Connection", "keep-alive");
}
