use axum::{
    Json,
    extract::rejection::QueryRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use core_types::CoreError;
use engine::error::EngineError;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("{0}")]
    InvalidInput(String),
    #[error("Invalid query string: {0}")]
    Query(#[from] QueryRejection),
    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<CoreError> for AppError {
    fn from(e: CoreError) -> Self {
        AppError::InvalidInput(e.to_string())
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Engine(EngineError::UpstreamUnavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Engine(EngineError::Configuration(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Engine(_) | AppError::InvalidInput(_) | AppError::Query(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

/// Converts our custom `AppError` into an HTTP response with a `detail` body.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match &self {
            AppError::Engine(EngineError::Configuration(message)) => {
                tracing::error!(error = %message, "Configuration error.");
                "A server configuration error occurred".to_string()
            }
            other if status.is_server_error() => {
                tracing::error!(error = %other, "Request failed.");
                other.to_string()
            }
            other => {
                tracing::debug!(error = %other, "Request rejected.");
                other.to_string()
            }
        };

        let body = Json(json!({ "detail": detail }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::CoinId;

    #[test]
    fn statuses_follow_the_error_kind() {
        let no_data = AppError::from(EngineError::NoData(vec![CoinId::parse("foo").unwrap()]));
        assert_eq!(no_data.status(), StatusCode::BAD_REQUEST);

        let down = AppError::from(EngineError::UpstreamUnavailable("binance".into()));
        assert_eq!(down.status(), StatusCode::SERVICE_UNAVAILABLE);

        let bad_id = AppError::from(CoinId::parse("bit$coin").unwrap_err());
        assert_eq!(bad_id.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn body_is_a_detail_object() {
        let response = AppError::from(EngineError::NoData(vec![CoinId::parse("foo").unwrap()]))
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["detail"], "No price data available for: foo");
    }
}
