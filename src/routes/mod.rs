//! HTTP surface.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::checkout::Checkout;
use crate::config::{Config, Languages};
use crate::domain::aggregates::OrderError;
use crate::domain::events::EventPublisher;
use crate::payment::Payments;
use crate::pricing::PricingChain;
use crate::store::Store;
use crate::StorefrontError;

mod cart;
mod catalog;
mod gateways;
mod order;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub pricing: Arc<PricingChain>,
    pub checkout: Checkout,
    pub payments: Payments,
    pub languages: Languages,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: &Config, events: EventPublisher) -> crate::Result<Self> {
        let pricing = Arc::new(PricingChain::from_names(&config.pricing_handlers)?);
        let checkout = Checkout::new(store.clone(), pricing.clone(), events.clone(), &config.currency, config.tax_rate);
        let payments = Payments::from_config(store.clone(), config, events);
        Ok(Self { store, pricing, checkout, payments, languages: config.languages.clone() })
    }
}

pub fn order_url(order_id: Uuid) -> String {
    format!("/order/{order_id}/")
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { Redirect::temporary("/products/") }))
        .route("/health", get(|| async { Json(json!({"status": "healthy", "service": "storefront"})) }))
        .route("/products/", get(catalog::index))
        .route("/products/*path", get(catalog::browse))
        .route("/sale/", get(catalog::sale_index))
        .route("/sale/*category_path", get(catalog::sale_category))
        .route("/search/", get(catalog::search))
        .route("/cart/:session", get(cart::get_cart).post(cart::add_to_cart).delete(cart::clear_cart))
        .route("/cart/:session/:product_id", put(cart::update_item).delete(cart::remove_item))
        .route("/order/", post(cart::place_order))
        .route("/order/:order_id/", get(order::get_order))
        .route("/order/:order_id/payment", get(order::payment_choices).post(order::select_payment))
        .route("/order/:order_id/payment/confirm", get(order::confirm_payment))
        .route("/payment-variants/:variant_id/translations/:language", put(order::translate_variant))
        .route("/payment-gateways/gateway/:payment_id/process", post(gateways::gateway_process))
        .route("/payment-gateways/processor/:payment_id/process", post(gateways::processor_process))
        .route("/payment-gateways/processor/:payment_id/status", post(gateways::processor_status))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

impl StorefrontError {
    fn status_code(&self) -> StatusCode {
        match self {
            StorefrontError::ProductNotFound(_)
            | StorefrontError::CategoryNotFound(_)
            | StorefrontError::OrderNotFound(_)
            | StorefrontError::PaymentVariantNotFound(_)
            | StorefrontError::PaymentNotFound(_) => StatusCode::NOT_FOUND,
            StorefrontError::Validation(_)
            | StorefrontError::Cart(_)
            | StorefrontError::Product(_)
            | StorefrontError::PaymentVariant(_)
            | StorefrontError::Money(_)
            | StorefrontError::Language(_)
            | StorefrontError::Slug(_) => StatusCode::BAD_REQUEST,
            StorefrontError::Order(OrderError::NoItems) => StatusCode::BAD_REQUEST,
            StorefrontError::Order(OrderError::InvalidTransition { .. })
            | StorefrontError::PaymentStatus(_)
            | StorefrontError::Payment(_) => StatusCode::CONFLICT,
            StorefrontError::Category(_)
            | StorefrontError::Configuration(_)
            | StorefrontError::InvalidRecord(_)
            | StorefrontError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for StorefrontError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));
        (status, body).into_response()
    }
}

/// Turns `validator` failures into a 400.
fn validate<T: validator::Validate>(request: &T) -> crate::Result<()> {
    request.validate().map_err(|e| StorefrontError::Validation(e.to_string()))
}
