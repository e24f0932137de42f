use thiserror::Error;

/// Errors that can occur while fetching remote content
///
/// Fetchers return these from their `fetch()` methods; the aggregator only
/// ever sees the degraded (empty) result, so none of these reach the UI.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network error fetching {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Timed out fetching {url}")]
    Timeout { url: String },

    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Malformed {what} from {url}: {reason}")]
    Parse {
        what: &'static str,
        url: String,
        reason: String,
    },

    #[error("Invalid announcement: {0}")]
    Validation(String),
}

impl FetchError {
    /// Classify a transport error, separating timeouts from other failures
    pub fn from_reqwest(url: &str, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else {
            FetchError::Network {
                url: url.to_string(),
                source: error,
            }
        }
    }

    pub fn parse(what: &'static str, url: &str, reason: impl ToString) -> Self {
        FetchError::Parse {
            what,
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Whether the failure came from the network layer rather than the payload
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            FetchError::Network { .. } | FetchError::Timeout { .. } | FetchError::Status { .. }
        )
    }
}
