//! HTTP access to the service-desk REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize};
use shared::{
    domain::Resource,
    protocol::{
        ConfigurationItem, CreateIncidentRequest, DashboardStats, DataEnvelope, Incident,
        ServiceRequest,
    },
};
use tracing::debug;
use url::Url;

use crate::error::ClientError;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// How resource paths are laid onto the base URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteStyle {
    /// `{base}/incidents`
    #[default]
    Path,
    /// `{base}?path=/incidents`, for single-function deployments.
    Query,
}

#[async_trait]
pub trait ServiceDeskApi: Send + Sync {
    async fn list_incidents(&self) -> Result<Vec<Incident>, ClientError>;
    async fn list_requests(&self) -> Result<Vec<ServiceRequest>, ClientError>;
    async fn list_cmdb(&self) -> Result<Vec<ConfigurationItem>, ClientError>;
    /// `Ok(None)` when the response carried no `data`.
    async fn fetch_stats(&self) -> Result<Option<DashboardStats>, ClientError>;
    async fn create_incident(&self, request: &CreateIncidentRequest) -> Result<(), ClientError>;
}

/// Error bodies carry a human-readable `error` field.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

pub struct HttpServiceDesk {
    http: Client,
    base_url: Url,
    route_style: RouteStyle,
}

impl HttpServiceDesk {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Self::with_options(base_url, RouteStyle::default(), DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_options(
        base_url: &str,
        route_style: RouteStyle,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let base_url = parse_base_url(base_url)?;
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ClientError::HttpClient)?;
        Ok(Self {
            http,
            base_url,
            route_style,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn resource_url(&self, resource: Resource) -> Url {
        let mut url = self.base_url.clone();
        match self.route_style {
            RouteStyle::Path => {
                let path = format!("{}{}", url.path().trim_end_matches('/'), resource.path());
                url.set_path(&path);
            }
            RouteStyle::Query => {
                url.query_pairs_mut().append_pair("path", resource.path());
            }
        }
        url
    }

    async fn get_data<T: DeserializeOwned>(
        &self,
        resource: Resource,
    ) -> Result<Option<T>, ClientError> {
        let url = self.resource_url(resource);
        debug!(%url, "GET");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|source| ClientError::Network { resource, source })?;

        let status = response.status();
        if !status.is_success() {
            let message = error_message(response).await;
            return Err(ClientError::BadResponse {
                resource,
                status: status.as_u16(),
                message,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| ClientError::Network { resource, source })?;
        let envelope: DataEnvelope<T> = serde_json::from_slice(&body)
            .map_err(|source| ClientError::MalformedPayload { resource, source })?;
        Ok(envelope.data)
    }
}

#[async_trait]
impl ServiceDeskApi for HttpServiceDesk {
    async fn list_incidents(&self) -> Result<Vec<Incident>, ClientError> {
        Ok(self
            .get_data(Resource::Incidents)
            .await?
            .unwrap_or_default())
    }

    async fn list_requests(&self) -> Result<Vec<ServiceRequest>, ClientError> {
        Ok(self.get_data(Resource::Requests).await?.unwrap_or_default())
    }

    async fn list_cmdb(&self) -> Result<Vec<ConfigurationItem>, ClientError> {
        Ok(self.get_data(Resource::Cmdb).await?.unwrap_or_default())
    }

    async fn fetch_stats(&self) -> Result<Option<DashboardStats>, ClientError> {
        self.get_data(Resource::Stats).await
    }

    async fn create_incident(&self, request: &CreateIncidentRequest) -> Result<(), ClientError> {
        let resource = Resource::Incidents;
        let url = self.resource_url(resource);
        debug!(%url, title = %request.title, "POST");
        let response = self
            .http
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|source| ClientError::Network { resource, source })?;

        let status = response.status();
        if !status.is_success() {
            let message = error_message(response).await;
            return Err(ClientError::BadResponse {
                resource,
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ClientError> {
    let invalid = |reason: String| ClientError::InvalidBaseUrl {
        url: raw.to_string(),
        reason,
    };
    let url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.cannot_be_a_base() {
        return Err(invalid("url cannot be a base".to_string()));
    }
    Ok(url)
}

/// Best-effort extraction of the reason from a failed response.
async fn error_message(response: reqwest::Response) -> Option<String> {
    let body = response.bytes().await.ok()?;
    serde_json::from_slice::<ErrorBody>(&body)
        .map(|err| err.error)
        .ok()
        .or_else(|| {
            let text = String::from_utf8_lossy(&body).trim().to_string();
            (!text.is_empty()).then_some(text)
        })
}
