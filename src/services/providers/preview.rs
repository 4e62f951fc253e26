/// Preview lookup against a public music search API
///
/// Searches by free-text "title artist" and takes the first hit that carries a
/// preview stream. Matching is fuzzy, so a miss is reported as
/// `LocateError::NotFound` rather than as a failure.
use crate::{
    error::AppResult,
    models::PlayableSource,
    services::providers::{LocateError, MediaLocator},
};
use chrono::Utc;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use std::time::Duration;

const SEARCH_LIMIT: &str = "5";

/// Length of the clips the search API serves as previews
pub const PREVIEW_CLIP_SECS: f64 = 30.0;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResult {
    #[serde(default)]
    preview_url: Option<String>,
    /// Full track length in milliseconds
    #[serde(default)]
    track_time_millis: Option<u64>,
}

#[derive(Clone)]
pub struct HttpMediaLocator {
    http_client: HttpClient,
    api_url: String,
}

impl HttpMediaLocator {
    pub fn new(api_url: String, timeout: Duration) -> AppResult<Self> {
        let http_client = HttpClient::builder().timeout(timeout).build()?;

        Ok(Self {
            http_client,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }

    fn search_term(title: &str, primary_artist: &str) -> String {
        format!("{} {}", title.trim(), primary_artist.trim())
            .trim()
            .to_string()
    }

    fn pick_source(response: SearchResponse) -> Option<PlayableSource> {
        response.results.into_iter().find_map(|result| {
            let uri = result.preview_url.filter(|url| !url.is_empty())?;
            Some(PlayableSource {
                uri,
                duration_secs: result
                    .track_time_millis
                    .map(|ms| (ms as f64 / 1000.0).min(PREVIEW_CLIP_SECS)),
                resolved_at: Utc::now(),
            })
        })
    }
}

#[async_trait::async_trait]
impl MediaLocator for HttpMediaLocator {
    async fn resolve(
        &self,
        title: &str,
        primary_artist: &str,
    ) -> Result<PlayableSource, LocateError> {
        let term = Self::search_term(title, primary_artist);
        if term.is_empty() {
            return Err(LocateError::NotFound);
        }

        let url = format!("{}/search", self.api_url);

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("term", term.as_str()),
                ("media", "music"),
                ("entity", "song"),
                ("limit", SEARCH_LIMIT),
            ])
            .send()
            .await
            .map_err(|e| LocateError::Failed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            tracing::warn!(status = %status, term = %term, "Preview search failed");
            return Err(LocateError::Failed(format!(
                "Preview search returned status {}",
                status
            )));
        }

        let payload: SearchResponse = response
            .json()
            .await
            .map_err(|e| LocateError::Failed(format!("Malformed search response: {}", e)))?;

        match Self::pick_source(payload) {
            Some(source) => {
                tracing::debug!(term = %term, uri = %source.uri, "Preview resolved");
                Ok(source)
            }
            None => {
                tracing::debug!(term = %term, "No preview match");
                Err(LocateError::NotFound)
            }
        }
    }

    fn name(&self) -> &'static str {
        "http-preview-search"
    }
}
