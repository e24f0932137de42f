use super::FetchError;
use std::time::Duration;

/// Build the HTTP client shared by one fetcher
///
/// Every request made through it is bounded by `timeout`; an expired timeout
/// surfaces as [`FetchError::Timeout`].
pub fn build_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// GET `url` and return the body, treating non-2xx statuses as errors
pub async fn get_bytes(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, FetchError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| FetchError::from_reqwest(url, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| FetchError::from_reqwest(url, e))?;

    tracing::debug!("GET {} -> {} ({} bytes)", url, status, body.len());
    Ok(body.to_vec())
}
