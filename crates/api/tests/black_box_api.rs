use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::{json, Value};

use pricebook_infra::InMemoryPriceStore;

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, in-memory store, ephemeral port.
        let app = pricebook_api::app::build_app(Arc::new(InMemoryPriceStore::new()));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn create_product(&self, name: &str) -> String {
        let res = self
            .client
            .post(self.url("/products"))
            .json(&json!({ "name": name }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        let body: Value = res.json().await.unwrap();
        body["id"].as_str().unwrap().to_string()
    }

    async fn post_price(&self, body: Value) -> reqwest::Response {
        self.client
            .post(self.url("/prices"))
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn prices(&self, product: &str) -> Vec<Value> {
        let res = self
            .client
            .get(self.url(&format!("/prices?product={product}")))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = res.json().await.unwrap();
        body["items"].as_array().unwrap().clone()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn spans(prices: &[Value]) -> Vec<(String, String, f64)> {
    prices
        .iter()
        .map(|p| {
            (
                p["start_date"].as_str().unwrap().to_string(),
                p["end_date"].as_str().unwrap().to_string(),
                p["price"].as_f64().unwrap(),
            )
        })
        .collect()
}

#[tokio::test]
async fn health_is_ok() {
    let srv = TestServer::spawn().await;
    let res = srv.client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn products_can_be_created_listed_and_fetched() {
    let srv = TestServer::spawn().await;
    let id = srv.create_product("Espresso").await;
    srv.create_product("Latte").await;

    let res = srv.client.get(srv.url("/products")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let list: Value = res.json().await.unwrap();
    assert_eq!(list["items"].as_array().unwrap().len(), 2);

    let res = srv
        .client
        .get(srv.url(&format!("/products/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["name"], "Espresso");
}

#[tokio::test]
async fn blank_product_name_is_rejected() {
    let srv = TestServer::spawn().await;
    let res = srv
        .client
        .post(srv.url("/products"))
        .json(&json!({ "name": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn nested_price_splits_the_enclosing_interval() {
    let srv = TestServer::spawn().await;
    let id = srv.create_product("Espresso").await;

    let res = srv
        .post_price(json!({ "product": id, "start_date": "2023-01-01", "end_date": "2023-12-31", "price": 10 }))
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let res = srv
        .post_price(json!({ "product": id, "start_date": "2023-03-01", "end_date": "2023-03-31", "price": 20 }))
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);

    assert_eq!(
        spans(&srv.prices(&id).await),
        vec![
            ("2023-01-01".to_string(), "2023-02-28".to_string(), 10.0),
            ("2023-03-01".to_string(), "2023-03-31".to_string(), 20.0),
            ("2023-04-01".to_string(), "2023-12-31".to_string(), 10.0),
        ]
    );
}

#[tokio::test]
async fn empty_end_date_is_open_ended() {
    let srv = TestServer::spawn().await;
    let id = srv.create_product("Espresso").await;

    let res = srv
        .post_price(json!({ "product": id, "start_date": "2024-01-01", "end_date": "", "price": "3.50" }))
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["end_date"], "9999-12-31");
    assert_eq!(body["open_ended"], true);
    assert_eq!(body["price"].as_f64(), Some(3.5));
}

#[tokio::test]
async fn negative_zero_price_is_returned_as_zero() {
    let srv = TestServer::spawn().await;
    let id = srv.create_product("Espresso").await;

    let res = srv
        .post_price(json!({ "product": id, "start_date": "2024-01-01", "price": "-0.00" }))
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["price"], json!(0.0));
    assert!(!body["price"].as_f64().unwrap().is_sign_negative());
}

#[tokio::test]
async fn price_above_cap_is_rejected() {
    let srv = TestServer::spawn().await;
    let id = srv.create_product("Espresso").await;

    let res = srv
        .post_price(json!({ "product": id, "start_date": "2024-01-01", "price": "1000000000000000.01" }))
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_price");
}

#[tokio::test]
async fn stats_average_over_covered_days() {
    let srv = TestServer::spawn().await;
    let id = srv.create_product("Espresso").await;
    srv.post_price(json!({ "product": id, "start_date": "2024-01-10", "end_date": "2024-01-20", "price": 100 }))
        .await;

    let res = srv
        .client
        .get(srv.url(&format!(
            "/products/stats?product={id}&start_date=2024-01-01&end_date=2024-01-31"
        )))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["days"], 31);
    assert_eq!(body["price"].as_f64(), Some(100.0));
}

#[tokio::test]
async fn inverted_range_and_negative_price_are_bad_requests() {
    let srv = TestServer::spawn().await;
    let id = srv.create_product("Espresso").await;

    let res = srv
        .post_price(json!({ "product": id, "start_date": "2024-02-01", "end_date": "2024-01-01", "price": 1 }))
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_range");

    let res = srv
        .post_price(json!({ "product": id, "start_date": "2024-01-01", "price": -1 }))
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_price");

    assert!(srv.prices(&id).await.is_empty());
}

#[tokio::test]
async fn malformed_requests_are_bad_requests() {
    let srv = TestServer::spawn().await;

    let res = srv
        .post_price(json!({ "product": "not-a-uuid", "start_date": "2024-01-01", "price": 1 }))
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = srv.post_price(json!({ "start_date": "2024-01-01" })).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_body");

    let res = srv
        .client
        .get(srv.url("/products/stats?product=abc"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_product_is_not_found() {
    let srv = TestServer::spawn().await;
    let missing = "0190b5a0-0000-7000-8000-000000000000";

    let res = srv
        .client
        .get(srv.url(&format!("/products/{missing}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = srv
        .post_price(json!({ "product": missing, "start_date": "2024-01-01", "price": 1 }))
        .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "not_found");
}
