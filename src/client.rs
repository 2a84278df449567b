//! HTTP client for the facility API
//!
//! The synchronizer and the navigation stepper only see the
//! [`SnapshotSource`] and [`RouteSource`] traits, so tests can swap in
//! in-memory collaborators.

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::Serialize;

use crate::config::ApiConfig;
use crate::error::{MonitorError, Result};
use crate::types::{OccupancySnapshot, RouteResponse, SpotAssignment, Zone};

// ============================================================================
// Collaborator Traits
// ============================================================================

/// Authoritative roster and aggregate counts
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Full zone roster with nested spots and grid overlays
    async fn fetch_zones(&self) -> Result<Vec<Zone>>;

    /// Aggregate occupancy counts
    async fn fetch_occupancy(&self) -> Result<OccupancySnapshot>;
}

/// Navigation route lookup
#[async_trait]
pub trait RouteSource: Send + Sync {
    /// Ordered instruction tokens leading to `target_spot_id`
    async fn fetch_route(&self, request: &RouteRequest) -> Result<RouteResponse>;
}

/// Parameters of a route lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RouteRequest {
    pub target_spot_id: i64,
    pub start_x: i64,
    pub start_y: i64,
}

impl RouteRequest {
    /// Route from the facility entrance at `(0, 0)`
    pub fn to_spot(target_spot_id: i64) -> Self {
        Self {
            target_spot_id,
            start_x: 0,
            start_y: 0,
        }
    }
}

// ============================================================================
// HTTP Client
// ============================================================================

/// HTTP client for the facility API
///
/// # Example
///
/// ```rust,no_run
/// use cloudpark_monitor::{ApiClient, ApiConfig, SnapshotSource};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = ApiClient::new(&ApiConfig {
///     base_url: "http://localhost:8000/api/v1".into(),
///     token: Some("token".into()),
///     ..Default::default()
/// })?;
///
/// let zones = client.fetch_zones().await?;
/// let occupancy = client.fetch_occupancy().await?;
/// println!("{} zones, {:.0}% occupied", zones.len(), occupancy.rate() * 100.0);
/// # Ok(())
/// # }
/// ```
pub struct ApiClient {
    base_url: String,
    client: Client,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        if let Some(ref token) = config.token {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| MonitorError::Config(format!("Invalid API token: {}", e)))?;
            headers.insert(header::AUTHORIZATION, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Ask the server for the first free spot
    pub async fn assign_spot(&self) -> Result<SpotAssignment> {
        let url = format!("{}/navigation/assign", self.base_url);
        let response = self.client.post(&url).send().await?;
        self.handle_response(response).await
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        if response.status() == StatusCode::NOT_FOUND {
            let body = response.text().await.unwrap_or_default();
            return Err(MonitorError::NotFound(body));
        }

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(MonitorError::Server {
                status,
                message: body,
            });
        }

        let body = response.json().await?;
        Ok(body)
    }
}

#[async_trait]
impl SnapshotSource for ApiClient {
    async fn fetch_zones(&self) -> Result<Vec<Zone>> {
        let url = format!("{}/zones/", self.base_url);
        let response = self.client.get(&url).send().await?;
        self.handle_response(response).await
    }

    async fn fetch_occupancy(&self) -> Result<OccupancySnapshot> {
        let url = format!("{}/analytics/occupancy", self.base_url);
        let response = self.client.get(&url).send().await?;
        self.handle_response(response).await
    }
}

#[async_trait]
impl RouteSource for ApiClient {
    async fn fetch_route(&self, request: &RouteRequest) -> Result<RouteResponse> {
        let url = format!("{}/navigation/route", self.base_url);
        let response = self.client.get(&url).query(request).send().await?;
        self.handle_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash() {
        let client = ApiClient::new(&ApiConfig {
            base_url: "http://localhost:8000/api/v1/".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000/api/v1");
    }

    #[test]
    fn test_invalid_token_is_config_error() {
        let result = ApiClient::new(&ApiConfig {
            token: Some("bad\ntoken".into()),
            ..Default::default()
        });
        assert!(matches!(result, Err(MonitorError::Config(_))));
    }

    #[test]
    fn test_route_request_query() {
        let query = serde_json::to_value(RouteRequest::to_spot(12)).unwrap();
        assert_eq!(query["target_spot_id"], 12);
        assert_eq!(query["start_x"], 0);
        assert_eq!(query["start_y"], 0);
    }
}
