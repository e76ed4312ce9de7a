use shared::domain::Resource;
use thiserror::Error;

/// Failures of a single call against the service-desk API.
///
/// None of these are retried; the next module switch or refresh is the only
/// recovery path.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid api base url '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("failed to build http client: {0}")]
    HttpClient(#[source] reqwest::Error),
    #[error("network failure while contacting {resource}: {source}")]
    Network {
        resource: Resource,
        #[source]
        source: reqwest::Error,
    },
    #[error("{resource} responded with HTTP {status}{}", detail_suffix(.message))]
    BadResponse {
        resource: Resource,
        status: u16,
        message: Option<String>,
    },
    #[error("malformed {resource} payload: {source}")]
    MalformedPayload {
        resource: Resource,
        #[source]
        source: serde_json::Error,
    },
}

impl ClientError {
    pub fn resource(&self) -> Option<Resource> {
        match self {
            ClientError::Network { resource, .. }
            | ClientError::BadResponse { resource, .. }
            | ClientError::MalformedPayload { resource, .. } => Some(*resource),
            ClientError::InvalidBaseUrl { .. } | ClientError::HttpClient(_) => None,
        }
    }
}

fn detail_suffix(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|m| format!(": {m}"))
        .unwrap_or_default()
}
