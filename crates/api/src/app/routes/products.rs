use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::Value;

use pricebook_infra::PricingService;

use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/stats", get(price_stats))
        .route("/:id", get(get_product))
}

pub async fn create_product(
    Extension(services): Extension<Arc<PricingService>>,
    body: Result<Json<dto::CreateProductRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_body", e.body_text()),
    };

    match services.create_product(&body.name).await {
        Ok(product) => (StatusCode::CREATED, Json(dto::product_to_json(&product))).into_response(),
        Err(e) => errors::pricing_error_to_response(e),
    }
}

pub async fn list_products(
    Extension(services): Extension<Arc<PricingService>>,
) -> axum::response::Response {
    match services.list_products().await {
        Ok(products) => {
            let items: Vec<Value> = products.iter().map(dto::product_to_json).collect();
            Json(serde_json::json!({ "items": items })).into_response()
        }
        Err(e) => errors::pricing_error_to_response(e),
    }
}

pub async fn get_product(
    Extension(services): Extension<Arc<PricingService>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let product_id = match errors::parse_product_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.get_product(product_id).await {
        Ok(product) => Json(dto::product_to_json(&product)).into_response(),
        Err(e) => errors::pricing_error_to_response(e),
    }
}

/// `GET /products/stats?product=&start_date=&end_date=`
pub async fn price_stats(
    Extension(services): Extension<Arc<PricingService>>,
    query: Result<Query<dto::StatsQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_query", e.body_text()),
    };
    let product_id = match errors::parse_product_id(&query.product) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services
        .price_stats(product_id, query.start_date, query.end_date)
        .await
    {
        Ok(stats) => Json(dto::stats_to_json(&stats)).into_response(),
        Err(e) => errors::pricing_error_to_response(e),
    }
}
