use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Recommender unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Result discarded: preferences changed while the fetch was in flight")]
    Superseded,

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Superseded => (StatusCode::CONFLICT, self.to_string()),
            AppError::UpstreamUnavailable(_) | AppError::HttpClient(_) => {
                (StatusCode::BAD_GATEWAY, self.to_string())
            }
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::UpstreamUnavailable("down".into()), StatusCode::BAD_GATEWAY),
            (AppError::Superseded, StatusCode::CONFLICT),
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (AppError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }
}
