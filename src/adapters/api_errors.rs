use crate::domain::error::PipelineError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

// Newtype over the domain error so axum's IntoResponse can live here.
pub struct ApiError(pub PipelineError);

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            PipelineError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PipelineError::MalformedPayload(_) => StatusCode::BAD_REQUEST,
            PipelineError::NotFound(_) => StatusCode::NOT_FOUND,
            PipelineError::Authentication(_) => StatusCode::UNAUTHORIZED,
            PipelineError::InventoryExhausted { .. } => StatusCode::CONFLICT,
            PipelineError::GatewayUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            PipelineError::Config(_)
            | PipelineError::Database(_)
            | PipelineError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (error_code, message) = match &self.0 {
            PipelineError::Validation(msg) => ("validation_error", msg.clone()),
            PipelineError::MalformedPayload(msg) => ("malformed_payload", msg.clone()),
            PipelineError::NotFound(msg) => ("not_found", msg.clone()),
            PipelineError::Authentication(msg) => {
                tracing::warn!("rejected unauthenticated request: {msg}");
                ("unauthorized", "authentication failed".to_string())
            }
            e @ PipelineError::InventoryExhausted { .. } => ("inventory_exhausted", e.to_string()),
            PipelineError::GatewayUnavailable(msg) => {
                tracing::warn!("gateway unavailable: {msg}");
                ("gateway_unavailable", "payment gateway unavailable".to_string())
            }
            PipelineError::Config(msg) => {
                tracing::error!("configuration error: {msg}");
                ("internal_error", "internal error".to_string())
            }
            PipelineError::Database(err) => {
                tracing::error!("database error: {err}");
                ("internal_error", "internal error".to_string())
            }
            PipelineError::Serialization(err) => {
                tracing::error!("serialization error: {err}");
                ("internal_error", "internal error".to_string())
            }
        };

        let body = serde_json::json!({
            "error_code": error_code,
            "message": message,
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_error_kinds_to_statuses() {
        let cases = [
            (PipelineError::Validation("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (PipelineError::MalformedPayload("x".into()), StatusCode::BAD_REQUEST),
            (PipelineError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (PipelineError::Authentication("x".into()), StatusCode::UNAUTHORIZED),
            (
                PipelineError::InventoryExhausted { requested: 2, available: 1 },
                StatusCode::CONFLICT,
            ),
            (PipelineError::GatewayUnavailable("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (PipelineError::Config("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError(err).status(), expected);
        }
    }
}
