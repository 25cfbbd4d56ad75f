//! HTTP rendering of service errors

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::error::{ErrorKind, OrderingError};

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: ErrorKind,
    message: String,
    field: Option<String>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'static str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'a str>,
}

impl ApiError {
    /// Input that could not be decoded at all.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, kind: ErrorKind::Validation, message: message.into(), field: None }
    }

    pub fn status(&self) -> StatusCode { self.status }
}

impl From<OrderingError> for ApiError {
    fn from(e: OrderingError) -> Self {
        let kind = e.kind();
        let status = match (&e, kind) {
            (_, ErrorKind::Validation) => StatusCode::UNPROCESSABLE_ENTITY,
            (_, ErrorKind::Conflict) => StatusCode::CONFLICT,
            (_, ErrorKind::UpstreamUnavailable) => StatusCode::SERVICE_UNAVAILABLE,
            (OrderingError::Forbidden(_), _) => StatusCode::FORBIDDEN,
            (_, ErrorKind::Authorization) => StatusCode::UNAUTHORIZED,
            (_, ErrorKind::NotFound) => StatusCode::NOT_FOUND,
            (OrderingError::PaymentProvider(_), _) => StatusCode::BAD_GATEWAY,
            (_, ErrorKind::Internal) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %e, "Request failed");
            "internal error".to_string()
        } else {
            if status == StatusCode::BAD_GATEWAY || status == StatusCode::SERVICE_UNAVAILABLE {
                tracing::error!(error = %e, "Upstream call failed");
            }
            e.to_string()
        };
        Self { status, kind, message, field: e.field().map(str::to_string) }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(e: validator::ValidationErrors) -> Self { OrderingError::from(e).into() }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            // Well-formed JSON with the wrong shape or values.
            JsonRejection::JsonDataError(e) => Self {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                kind: ErrorKind::Validation,
                message: e.body_text(),
                field: None,
            },
            other => Self::malformed(other.body_text()),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self { Self::malformed(rejection.body_text()) }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody { error: self.kind.as_str(), message: &self.message, field: self.field.as_deref() };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::OrderStatus;
    use rust_decimal::Decimal;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (OrderingError::EmptyCart, StatusCode::UNPROCESSABLE_ENTITY),
            (OrderingError::InvalidAmount(Decimal::ZERO), StatusCode::UNPROCESSABLE_ENTITY),
            (OrderingError::InvalidTransition { from: OrderStatus::Completed, to: OrderStatus::Ready }, StatusCode::UNPROCESSABLE_ENTITY),
            (OrderingError::Conflict("x".into()), StatusCode::CONFLICT),
            (OrderingError::UpstreamUnavailable("db".into()), StatusCode::SERVICE_UNAVAILABLE),
            (OrderingError::Unauthorized, StatusCode::UNAUTHORIZED),
            (OrderingError::Forbidden("admin only".into()), StatusCode::FORBIDDEN),
            (OrderingError::NotFound("order".into()), StatusCode::NOT_FOUND),
            (OrderingError::PaymentProvider("declined".into()), StatusCode::BAD_GATEWAY),
            (OrderingError::Storage("disk".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_internal_message_is_hidden() {
        let e = ApiError::from(OrderingError::Storage("connection string leaked".into()));
        assert_eq!(e.message, "internal error");
        let e = ApiError::from(OrderingError::InvalidPickupTime("bad".into()));
        assert_eq!(e.field.as_deref(), Some("pickupTime"));
    }
}
