//! Guidance API client.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;
use waymark_config::ApiConfig;
use waymark_protocols::{ApiError, Banner, Tooltip, Tour};

/// List endpoints answer either a bare array or `{"data": [...]}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum ListBody<T> {
    Bare(Vec<T>),
    Wrapped { data: Vec<T> },
}

impl<T> ListBody<T> {
    fn into_items(self) -> Vec<T> {
        match self {
            ListBody::Bare(items) | ListBody::Wrapped { data: items } => items,
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(alias = "message")]
    error: String,
}

/// Guidance API client.
#[derive(Debug, Clone)]
pub struct GuidanceApi {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl GuidanceApi {
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;
        let base_url: String = base_url.into();
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    pub fn from_config(config: &ApiConfig) -> Result<Self, ApiError> {
        Self::new(
            config.base_url.clone(),
            config.token.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Tours for `url`, in the order the API returns them.
    pub async fn fetch_tours(&self, url: &str) -> Result<Vec<Tour>, ApiError> {
        self.get_list("tours", &[("url", url)]).await
    }

    pub async fn fetch_tooltips(&self, url: &str, lang: &str) -> Result<Vec<Tooltip>, ApiError> {
        self.get_list("tooltips", &[("url", url), ("lang", lang)]).await
    }

    pub async fn fetch_banners(&self, url: &str) -> Result<Vec<Banner>, ApiError> {
        self.get_list("banners", &[("url", url)]).await
    }

    /// Check a token against the auth endpoint. `None` checks the
    /// configured one.
    ///
    /// A rejected token is `Ok(false)`; only transport problems are errors.
    pub async fn validate_token(&self, token: Option<&str>) -> Result<bool, ApiError> {
        let token = match token.or(self.token.as_deref()) {
            Some(t) if !t.is_empty() => t,
            _ => return Err(ApiError::NotConfigured("API token not set".to_string())),
        };

        let response = self
            .client
            .get(format!("{}/auth/validate", self.base_url))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        match response.status() {
            s if s.is_success() => Ok(true),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(false),
            s => Err(ApiError::Status {
                status: s.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }),
        }
    }

    async fn get_list<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, ApiError> {
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| ApiError::NotConfigured("API token not set".to_string()))?;
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!("GET {} {:?}", url, query);

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            return Err(match status {
                StatusCode::UNAUTHORIZED => ApiError::Unauthorized(message),
                _ => ApiError::Status {
                    status: status.as_u16(),
                    message,
                },
            });
        }

        serde_json::from_str::<ListBody<T>>(&body)
            .map(ListBody::into_items)
            .map_err(|e| ApiError::InvalidResponse(format!("{}: {}", endpoint, e)))
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
