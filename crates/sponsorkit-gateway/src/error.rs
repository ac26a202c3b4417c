use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use sponsorkit_common::SponsorError;

/// Unified API error response that maps SponsorError to HTTP responses
pub struct ApiError(SponsorError);

impl From<SponsorError> for ApiError {
    fn from(err: SponsorError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message, error_code) = match &self.0 {
            SponsorError::ProviderInit(_) => (StatusCode::SERVICE_UNAVAILABLE, self.0.to_string(), "PROVIDER_INIT_ERROR"),
            SponsorError::NotInitialized(_) => (StatusCode::CONFLICT, self.0.to_string(), "NOT_INITIALIZED"),
            SponsorError::NotConnected => (StatusCode::UNAUTHORIZED, self.0.to_string(), "NOT_CONNECTED"),
            SponsorError::AlreadyConnected => (StatusCode::CONFLICT, self.0.to_string(), "ALREADY_CONNECTED"),
            SponsorError::AlreadyInitialized => (StatusCode::CONFLICT, self.0.to_string(), "ALREADY_INITIALIZED"),
            SponsorError::WalletNotInitialized => (StatusCode::CONFLICT, self.0.to_string(), "WALLET_NOT_INITIALIZED"),
            SponsorError::ContractNotInitialized => (StatusCode::CONFLICT, self.0.to_string(), "CONTRACT_NOT_INITIALIZED"),
            SponsorError::TransactionData(_) => (StatusCode::UNPROCESSABLE_ENTITY, self.0.to_string(), "TRANSACTION_DATA_ERROR"),
            SponsorError::TransactionSubmission(_) => (StatusCode::BAD_GATEWAY, self.0.to_string(), "TRANSACTION_SUBMISSION_ERROR"),
            SponsorError::Identity(_) => (StatusCode::UNAUTHORIZED, self.0.to_string(), "IDENTITY_ERROR"),
            SponsorError::Rpc(_) => (StatusCode::BAD_GATEWAY, self.0.to_string(), "RPC_ERROR"),
            SponsorError::Relay(_) => (StatusCode::BAD_GATEWAY, self.0.to_string(), "RELAY_ERROR"),
            SponsorError::SessionExpired => (StatusCode::CONFLICT, self.0.to_string(), "SESSION_EXPIRED"),
            SponsorError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal configuration error".into(), "CONFIG_ERROR"),
            SponsorError::Signing(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal signing error".into(), "SIGNING_ERROR"),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": error_message,
                "status": status.as_u16()
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
