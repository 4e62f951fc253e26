/// HTTP client for the remote recommender
///
/// API Flow:
/// 1. GET /recommendations/search-based-discovery with the batch size, slider
///    values, variation seed and exclusion list as query parameters
/// 2. Response is `{"recommendations": [track, ...]}`
use crate::{
    error::{AppError, AppResult},
    models::{Item, ItemId, PreferenceVector},
    services::providers::CatalogueClient,
};
use reqwest::Client as HttpClient;
use serde::Deserialize;
use std::time::Duration;

const DISCOVERY_PATH: &str = "/recommendations/search-based-discovery";

#[derive(Debug, Deserialize)]
struct RecommendationsResponse {
    #[serde(default)]
    recommendations: Vec<Item>,
}

#[derive(Clone)]
pub struct HttpCatalogueClient {
    http_client: HttpClient,
    api_url: String,
    token: Option<String>,
}

impl HttpCatalogueClient {
    pub fn new(api_url: String, token: Option<String>, timeout: Duration) -> AppResult<Self> {
        let http_client = HttpClient::builder().timeout(timeout).build()?;

        Ok(Self {
            http_client,
            api_url: api_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn query_params(
        &self,
        count: usize,
        preferences: &PreferenceVector,
        exclude: &[ItemId],
        seed: u64,
    ) -> Vec<(String, String)> {
        let mut params = vec![
            ("n_recommendations".to_string(), count.to_string()),
            ("seed".to_string(), seed.to_string()),
        ];

        params.extend(
            preferences
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string())),
        );

        if !exclude.is_empty() {
            let joined = exclude
                .iter()
                .map(ItemId::as_str)
                .collect::<Vec<_>>()
                .join(",");
            params.push(("exclude".to_string(), joined));
        }

        if let Some(token) = &self.token {
            params.push(("token".to_string(), token.clone()));
        }

        params
    }
}

#[async_trait::async_trait]
impl CatalogueClient for HttpCatalogueClient {
    async fn fetch_candidates(
        &self,
        count: usize,
        preferences: &PreferenceVector,
        exclude: &[ItemId],
        seed: u64,
    ) -> AppResult<Vec<Item>> {
        let url = format!("{}{}", self.api_url, DISCOVERY_PATH);
        let params = self.query_params(count, preferences, exclude, seed);

        tracing::debug!(count, seed, excluded = exclude.len(), "Requesting candidates");

        let response = self
            .http_client
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| AppError::UpstreamUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Recommender request failed");
            return Err(AppError::UpstreamUnavailable(format!(
                "Recommender returned status {}",
                status
            )));
        }

        let payload: RecommendationsResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to parse recommender response");
            AppError::UpstreamUnavailable(format!("Malformed recommender response: {}", e))
        })?;

        tracing::info!(
            requested = count,
            received = payload.recommendations.len(),
            client = self.name(),
            "Candidates fetched"
        );

        Ok(payload.recommendations)
    }

    fn name(&self) -> &'static str {
        "http-recommender"
    }
}
