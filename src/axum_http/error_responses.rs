use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::error;

use crate::usecases::billing_commands::BillingError;

/// Failure envelope returned to command callers.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub data: Value,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Unauthorized(String),

    #[error(transparent)]
    Billing(#[from] BillingError),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, data) = match &self {
            AppError::Unauthorized(message) => (
                StatusCode::UNAUTHORIZED,
                json!({ "status": 401, "message": message }),
            ),
            AppError::Billing(err) => (err.status_code(), err.data()),
            AppError::Internal(err) => {
                error!(error = ?err, "router: internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "status": 500, "message": self.to_string() }),
                )
            }
        };

        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "router: request failed");
        }

        let body = Json(ErrorResponse {
            success: false,
            data,
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::asaas_client::GatewayError;

    #[test]
    fn billing_errors_keep_their_status_codes() {
        let response =
            AppError::from(BillingError::MissingParams("payment_id is required".into()))
                .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = AppError::from(BillingError::Gateway(GatewayError::Rejected {
            context: "create payment".to_string(),
            status: 400,
            body: json!({ "errors": [] }),
        }))
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = AppError::Unauthorized("missing credential".into()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
