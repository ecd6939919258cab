//! Error types for the HTTP API.
//!
//! [`ApiError`] unifies engine failures and request-shape problems into a
//! single enum that converts into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation. Every
//! error body is `{"error": <message>, "status": <code>}`.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use studyquest_core::GamificationError;

/// Errors that can occur in the API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The engine rejected or failed the operation.
    #[error(transparent)]
    Engine(#[from] GamificationError),

    /// An invalid query parameter was provided.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// A UUID could not be parsed from the request path or query.
    #[error("invalid UUID: {0}")]
    InvalidUuid(String),

    /// The request body was not valid JSON for the endpoint.
    #[error("invalid body: {0}")]
    InvalidBody(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidBody(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::InvalidQuery(rejection.body_text())
    }
}

impl ApiError {
    /// The HTTP status this error maps to.
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Engine(err) => match err {
                GamificationError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                GamificationError::AlreadyParticipated { .. } => StatusCode::CONFLICT,
                GamificationError::NotFound(_) => StatusCode::NOT_FOUND,
                GamificationError::TransientStore(_) => StatusCode::SERVICE_UNAVAILABLE,
                GamificationError::AggregationMismatch { .. } | GamificationError::Corrupt(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::InvalidQuery(_) | Self::InvalidUuid(_) | Self::InvalidBody(_) => {
                StatusCode::BAD_REQUEST
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
        }

        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use studyquest_core::ValidationError;
    use studyquest_types::{EventId, EventStatus, UserId};

    use super::*;

    #[test]
    fn engine_errors_map_to_statuses() {
        let cases = [
            (
                GamificationError::Validation(ValidationError::EventNotActive {
                    event_id: EventId::new(),
                    status: EventStatus::Finished,
                }),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                GamificationError::AlreadyParticipated {
                    event_id: EventId::new(),
                    user_id: UserId::new(),
                },
                StatusCode::CONFLICT,
            ),
            (GamificationError::NotFound("event".to_owned()), StatusCode::NOT_FOUND),
            (
                GamificationError::TransientStore("timeout".to_owned()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                GamificationError::AggregationMismatch {
                    user_id: UserId::new(),
                    primary: 1,
                    fallback: 2,
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn request_shape_errors_are_bad_requests() {
        assert_eq!(ApiError::InvalidUuid("x".to_owned()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::InvalidQuery("x".to_owned()).status(), StatusCode::BAD_REQUEST);
    }
}
