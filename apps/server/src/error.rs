use axum::Json;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use rpcguard_core::{AppError, RpcCode};
use serde::Serialize;

const GRPC_STATUS_HEADER: HeaderName = HeaderName::from_static("grpc-status");

/// RPC error payload.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    code: &'static str,
    message: String,
}

/// HTTP transport error wrapper around core application errors.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(value: AppError) -> Self {
        Self(value)
    }
}

pub fn status_for(code: RpcCode) -> StatusCode {
    match code {
        RpcCode::InvalidArgument => StatusCode::BAD_REQUEST,
        RpcCode::NotFound => StatusCode::NOT_FOUND,
        RpcCode::AlreadyExists => StatusCode::CONFLICT,
        RpcCode::PermissionDenied => StatusCode::FORBIDDEN,
        RpcCode::FailedPrecondition => StatusCode::PRECONDITION_FAILED,
        RpcCode::Unimplemented => StatusCode::NOT_IMPLEMENTED,
        RpcCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        RpcCode::Unauthenticated => StatusCode::UNAUTHORIZED,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.0.code();
        let payload = Json(ErrorResponse {
            code: code.as_str(),
            message: self.0.to_string(),
        });

        (
            status_for(code),
            [(GRPC_STATUS_HEADER, HeaderValue::from(code.grpc_code()))],
            payload,
        )
            .into_response()
    }
}

/// Standard transport result type.
pub type ApiResult<T> = Result<T, ApiError>;
