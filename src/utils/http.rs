use std::time::Duration;

use log::debug;
use reqwest::Client;
use thiserror::Error;

/// Default timeout for HTTP requests in seconds
const DEFAULT_TIMEOUT: u64 = 15;

/// Some feed providers only serve full documents to browser-looking clients
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Failed to request {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} from {url}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Build the shared HTTP client used for upstream retrieval
pub fn build_client() -> Result<Client, FetchError> {
    Client::builder()
        .timeout(Duration::from_secs(DEFAULT_TIMEOUT))
        .user_agent(BROWSER_USER_AGENT)
        .build()
        .map_err(FetchError::Client)
}

/// Makes a GET request to the specified URL and returns the raw body
///
/// # Arguments
/// * `client` - Client built by [`build_client`]
/// * `url` - The URL to request
///
/// # Returns
/// * `Ok(Vec<u8>)` - The response body
/// * `Err(FetchError)` - Transport failure or a non-success status
pub async fn web_get_bytes(client: &Client, url: &str) -> Result<Vec<u8>, FetchError> {
    debug!("Fetching {}", url);
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|source| FetchError::Request {
            url: url.to_string(),
            source,
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status,
        });
    }

    let body = response.bytes().await.map_err(|source| FetchError::Request {
        url: url.to_string(),
        source,
    })?;
    Ok(body.to_vec())
}
