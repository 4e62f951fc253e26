use serde::Deserialize;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Base URL of the remote recommender
    #[serde(default = "default_recommender_url")]
    pub recommender_url: String,

    /// Access token forwarded to the recommender, if any
    #[serde(default)]
    pub recommender_token: Option<String>,

    /// Base URL of the preview search API used to resolve playable sources
    #[serde(default = "default_media_locator_url")]
    pub media_locator_url: String,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout for the recommender and the media locator
    #[serde(default = "default_upstream_timeout_secs")]
    pub upstream_timeout_secs: u64,
}

fn default_recommender_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_media_locator_url() -> String {
    "https://itunes.apple.com".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_upstream_timeout_secs() -> u64 {
    20
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_environment() {
        let config: Config = envy::from_iter(Vec::<(String, String)>::new()).unwrap();
        assert_eq!(config.recommender_url, "http://127.0.0.1:8000");
        assert_eq!(config.recommender_token, None);
        assert_eq!(config.upstream_timeout(), Duration::from_secs(20));
        assert_eq!(config.bind_addr(), "127.0.0.1:3000");
    }

    #[test]
    fn test_overrides() {
        let vars = vec![
            ("RECOMMENDER_TOKEN".to_string(), "abc".to_string()),
            ("PORT".to_string(), "8080".to_string()),
            ("UPSTREAM_TIMEOUT_SECS".to_string(), "5".to_string()),
        ];
        let config: Config = envy::from_iter(vars).unwrap();
        assert_eq!(config.recommender_token.as_deref(), Some("abc"));
        assert_eq!(config.port, 8080);
        assert_eq!(config.upstream_timeout(), Duration::from_secs(5));
    }
}
