use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::Value;

use pricebook_infra::{PricingService, SetPrice};

use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().route("/", get(list_prices).post(create_price))
}

pub async fn create_price(
    Extension(services): Extension<Arc<PricingService>>,
    body: Result<Json<dto::CreatePriceRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_body", e.body_text()),
    };
    let product_id = match errors::parse_product_id(&body.product) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let cmd = SetPrice {
        product_id,
        start_date: body.start_date,
        end_date: body.end_date,
        price: body.price,
    };

    match services.set_price(cmd).await {
        Ok(interval) => (StatusCode::CREATED, Json(dto::interval_to_json(&interval))).into_response(),
        Err(e) => errors::pricing_error_to_response(e),
    }
}

/// `GET /prices[?product=]`
pub async fn list_prices(
    Extension(services): Extension<Arc<PricingService>>,
    query: Result<Query<dto::ListPricesQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_query", e.body_text()),
    };
    let product_id = match query.product.as_deref().filter(|p| !p.trim().is_empty()) {
        None => None,
        Some(raw) => match errors::parse_product_id(raw) {
            Ok(id) => Some(id),
            Err(resp) => return resp,
        },
    };

    match services.list_intervals(product_id).await {
        Ok(intervals) => {
            let items: Vec<Value> = intervals.iter().map(dto::interval_to_json).collect();
            Json(serde_json::json!({ "items": items })).into_response()
        }
        Err(e) => errors::pricing_error_to_response(e),
    }
}
