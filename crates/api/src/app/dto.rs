use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};

use pricebook_products::{PriceInterval, PriceStats, Product};

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CreatePriceRequest {
    pub product: String,
    pub start_date: NaiveDate,
    /// Missing, `null` and `""` all mean open-ended.
    #[serde(default, deserialize_with = "empty_date_as_none")]
    pub end_date: Option<NaiveDate>,
    pub price: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct ListPricesQuery {
    pub product: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub product: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

fn empty_date_as_none<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// Prices go out as JSON numbers; a value `f64` cannot hold falls back to its
/// exact string form.
pub fn decimal_to_json(value: Decimal) -> Value {
    match value.normalize().to_f64().and_then(serde_json::Number::from_f64) {
        Some(n) => Value::Number(n),
        None => Value::String(value.to_string()),
    }
}

pub fn product_to_json(product: &Product) -> Value {
    json!({
        "id": product.id_typed().to_string(),
        "name": product.name(),
        "created_at": product.created_at().to_rfc3339(),
    })
}

pub fn interval_to_json(interval: &PriceInterval) -> Value {
    json!({
        "id": interval.id_typed().to_string(),
        "product": interval.product_id().to_string(),
        "start_date": interval.start_date().to_string(),
        "end_date": interval.end_date().to_string(),
        "open_ended": interval.range().is_open_ended(),
        "price": decimal_to_json(interval.price().amount()),
    })
}

pub fn stats_to_json(stats: &PriceStats) -> Value {
    json!({
        "price": decimal_to_json(stats.price),
        "days": stats.days,
    })
}
