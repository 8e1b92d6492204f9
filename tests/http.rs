use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use storefront::config::Config;
use storefront::domain::aggregates::{Category, Discount, Product};
use storefront::domain::events::EventPublisher;
use storefront::domain::value_objects::{Money, Slug};
use storefront::routes::{router, AppState};
use storefront::store::{CatalogStore, InMemoryStore};

struct Catalog {
    boots: Product,
    manual: Product,
}

async fn seed(store: &InMemoryStore) -> Catalog {
    let shoes = Category::new("Shoes", Slug::new("shoes").unwrap(), None);
    let boots_category = Category::new("Boots", Slug::new("boots").unwrap(), Some(shoes.id));
    let sandals = Category::new("Sandals", Slug::new("sandals").unwrap(), Some(shoes.id));
    for category in [&shoes, &boots_category, &sandals] {
        store.save_category(category).await.unwrap();
    }

    let mut boots = Product::create(Slug::new("trail-boots").unwrap(), "Trail Boots", Money::new(dec!(80), "USD"));
    boots.assign_category(boots_category.id);
    boots.set_discount(Some(Discount::new("Spring", dec!(25)).unwrap()));
    boots.publish().unwrap();

    let mut manual = Product::create(Slug::new("care-manual").unwrap(), "Care Manual", Money::new(dec!(5), "USD"));
    manual.digital = true;
    manual.assign_category(shoes.id);
    manual.publish().unwrap();

    store.save_product(&boots).await.unwrap();
    store.save_product(&manual).await.unwrap();
    Catalog { boots, manual }
}

async fn app() -> (Router, Catalog) {
    let store = Arc::new(InMemoryStore::new());
    let catalog = seed(&store).await;
    let config = Config { gateway_types: vec!["dummy".into()], ..Config::default() };
    let state = AppState::new(store, &config, EventPublisher::default()).unwrap();
    (router(state), catalog)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>, headers: &[(header::HeaderName, &str)]) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        request = request.header(name, *value);
    }
    let request = match body {
        Some(body) => request.header(header::CONTENT_TYPE, "application/json").body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, value)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Method::GET, uri, None, &[]).await
}

async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(app, Method::POST, uri, Some(body), &[]).await
}

/// Fills a cart with both products and checks it out.
async fn place_order(app: &Router, catalog: &Catalog) -> String {
    post(app, "/cart/s1", json!({"product_id": catalog.boots.id, "quantity": 2})).await;
    post(app, "/cart/s1", json!({"product_id": catalog.manual.id, "quantity": 1})).await;
    let (status, order) = post(app, "/order/", json!({"session_id": "s1"})).await;
    assert_eq!(status, StatusCode::CREATED);
    order["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_and_root_redirect() {
    let (app, _) = app().await;
    let (status, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let response = app.clone().oneshot(Request::get("/").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(response.headers()[header::LOCATION], "/products/");
}

#[tokio::test]
async fn test_category_and_product_pages() {
    let (app, catalog) = app().await;
    let (status, index) = get(&app, "/products/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(index["products"].as_array().unwrap().len(), 2);
    assert_eq!(index["subcategories"][0]["url"], "/products/shoes/");

    let (_, shoes) = get(&app, "/products/shoes/").await;
    let urls: Vec<&str> = shoes["products"].as_array().unwrap().iter().filter_map(|p| p["url"].as_str()).collect();
    assert!(urls.contains(&"/products/shoes/boots/+trail-boots/"));

    let (status, detail) = get(&app, &format!("/products/+{}-trail-boots/", catalog.boots.id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["name"], "Trail Boots");
    assert_eq!(detail["price_ranges"][0][0], "base");

    let (status, scoped) = get(&app, "/products/shoes/boots/+trail-boots/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(scoped["id"], catalog.boots.id.to_string());

    let (status, error) = get(&app, "/products/shoes/sandals/+trail-boots/").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error["status"], 404);
    let (status, _) = get(&app, "/products/hats/").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_sale_pages() {
    let (app, _) = app().await;
    let (status, sale) = get(&app, "/sale/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sale["products"].as_array().unwrap().len(), 1);
    assert_eq!(sale["subcategories"][0]["url"], "/sale/shoes/");
    assert_eq!(sale["subcategories"][0]["count"], 1);

    let (_, shoes) = get(&app, "/sale/shoes/").await;
    let subcategories = shoes["subcategories"].as_array().unwrap();
    assert_eq!(subcategories.len(), 1, "sandals has nothing on sale");
    assert_eq!(subcategories[0]["category"]["name"], "Boots");
    assert_eq!(shoes["products"][0]["undiscounted_price_range"]["min"]["amount"], "80");
}

#[tokio::test]
async fn test_search() {
    let (app, _) = app().await;
    let (_, found) = get(&app, "/search/?q=boot").await;
    assert_eq!(found["results"].as_array().unwrap().len(), 1);
    let (_, empty) = get(&app, "/search/?q=").await;
    assert!(empty["results"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_cart_validation() {
    let (app, catalog) = app().await;
    let (status, _) = post(&app, "/cart/s1", json!({"product_id": catalog.boots.id, "quantity": 0})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = post(&app, "/order/", json!({"session_id": "empty"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    post(&app, "/cart/s1", json!({"product_id": catalog.boots.id, "quantity": 1})).await;
    let (status, cart) = send(&app, Method::PUT, &format!("/cart/s1/{}", catalog.boots.id), Some(json!({"quantity": 3})), &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["items"][0]["quantity"], 3);
    let (status, _) = post(&app, "/cart/s1", json!({"product_id": catalog.boots.id, "quantity": 998})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(&app, Method::DELETE, "/cart/s1", None, &[]).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_processor_payment_completes_order() {
    let (app, catalog) = app().await;
    let order_id = place_order(&app, &catalog).await;

    let (_, choices) = get(&app, &format!("/order/{order_id}/payment")).await;
    assert_eq!(choices["choices"].as_array().unwrap().len(), 2);

    let (status, variant) = post(&app, &format!("/order/{order_id}/payment"), json!({"provider": "processor", "type": "dummy"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(variant["provider"], "processor");

    let (_, order) = get(&app, &format!("/order/{order_id}/")).await;
    assert_eq!(order["status"], "payment-pending");

    let (_, form) = get(&app, &format!("/order/{order_id}/payment/confirm")).await;
    let action = form["action"].as_str().unwrap().to_string();
    assert!(action.starts_with("/payment-gateways/processor/"));

    let (status, request) = send(&app, Method::POST, &action, None, &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(request["items"].as_array().unwrap().len(), 2);
    assert_eq!(request["return_urls"]["paid"], format!("/order/{order_id}/"));

    let status_url = format!("{}/status", action.strip_suffix("/process").unwrap());
    let (status, outcome) = post(&app, &status_url, json!({"status": "paid"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["status"], "paid");

    let (_, order) = get(&app, &format!("/order/{order_id}/")).await;
    assert_eq!(order["status"], "payment-complete");
}

#[tokio::test]
async fn test_gateway_failure_marks_order() {
    let (app, catalog) = app().await;
    let order_id = place_order(&app, &catalog).await;
    post(&app, &format!("/order/{order_id}/payment"), json!({"provider": "gateway", "type": "dummy"})).await;

    let (_, form) = get(&app, &format!("/order/{order_id}/payment/confirm")).await;
    assert_eq!(form["method"], "POST");
    let action = form["action"].as_str().unwrap().to_string();

    let (status, _) = post(&app, &action, json!({"status": "in_progress"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = post(&app, &action, json!({"status": "failed"})).await;
    assert_eq!(status, StatusCode::OK);
    let (status, error) = post(&app, &action, json!({"status": "paid"})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error["status"], 409);

    let (_, order) = get(&app, &format!("/order/{order_id}/")).await;
    assert_eq!(order["status"], "payment-failed");
}

#[tokio::test]
async fn test_variant_translation_follows_accept_language() {
    let (app, catalog) = app().await;
    let order_id = place_order(&app, &catalog).await;
    let (_, variant) = post(&app, &format!("/order/{order_id}/payment"), json!({"provider": "processor", "type": "dummy"})).await;
    let variant_id = variant["id"].as_str().unwrap();

    let uri = format!("/payment-variants/{variant_id}/translations/pl");
    let (status, _) = send(&app, Method::PUT, &uri, Some(json!({"name": "Przelew"})), &[]).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, Method::PUT, &format!("/payment-variants/{variant_id}/translations/fr"), Some(json!({"name": "Virement"})), &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let order_uri = format!("/order/{order_id}/");
    let (_, polish) = send(&app, Method::GET, &order_uri, None, &[(header::ACCEPT_LANGUAGE, "pl-PL, pl;q=0.9, en;q=0.5")]).await;
    assert_eq!(polish["payment"]["name"], "Przelew");
    let (_, english) = get(&app, &order_uri).await;
    assert_eq!(english["payment"]["name"], "dummy");
}
