use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use pricebook_core::ProductId;
use pricebook_infra::PricingError;

pub fn pricing_error_to_response(err: PricingError) -> axum::response::Response {
    match err {
        PricingError::InvalidRange(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_range", msg),
        PricingError::InvalidPrice(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_price", msg),
        PricingError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        PricingError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, "not_found", msg),
        PricingError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        PricingError::PersistenceFailure(msg) => {
            tracing::warn!(error = %msg, "persistence failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "persistence_error", msg)
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn parse_product_id(s: &str) -> Result<ProductId, axum::response::Response> {
    s.trim()
        .parse::<ProductId>()
        .map_err(|e| json_error(StatusCode::BAD_REQUEST, "invalid_product", e.to_string()))
}
