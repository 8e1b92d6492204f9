//! Order page, payment selection and payment variant translations.

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap};
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{validate, AppState};
use crate::domain::aggregates::{Order, PaymentVariant, PaymentVariantTranslation};
use crate::domain::value_objects::{LanguageCode, Money};
use crate::payment::{ConfirmationForm, PaymentChoice};
use crate::{Result, StorefrontError};

/// Payment variant as shown to a customer in one language.
#[derive(Debug, Serialize)]
pub struct VariantView {
    pub id: Uuid,
    pub provider: &'static str,
    pub name: String,
    pub description: String,
    pub price: Decimal,
}

impl VariantView {
    fn new(variant: &PaymentVariant, language: &LanguageCode) -> Self {
        Self {
            id: variant.id,
            provider: variant.kind.provider(),
            name: variant.name_in(language).to_string(),
            description: variant.description_in(language).to_string(),
            price: variant.price(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderPage {
    #[serde(flatten)]
    pub order: Order,
    pub total: Money,
    pub language: LanguageCode,
    pub payment: Option<VariantView>,
}

#[derive(Debug, Serialize)]
pub struct PaymentChoices {
    pub order_id: Uuid,
    pub choices: Vec<PaymentChoice>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SelectPaymentRequest {
    #[validate(length(min = 1))]
    pub provider: String,
    #[serde(rename = "type")]
    #[validate(length(min = 1, max = 128))]
    pub typ: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TranslationRequest {
    #[validate(length(min = 1, max = 128))]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

pub async fn get_order(State(state): State<AppState>, Path(order_id): Path<Uuid>, headers: HeaderMap) -> Result<Json<OrderPage>> {
    let order = state.store.order(order_id).await?.ok_or(StorefrontError::OrderNotFound(order_id))?;
    let accept_language = headers.get(header::ACCEPT_LANGUAGE).and_then(|v| v.to_str().ok());
    let language = state.languages.negotiate(accept_language);
    let payment = state.payments.variant_for_order(order_id).await?.map(|v| VariantView::new(&v, &language));
    Ok(Json(OrderPage { total: order.total(), order, language, payment }))
}

pub async fn payment_choices(State(state): State<AppState>, Path(order_id): Path<Uuid>) -> Result<Json<PaymentChoices>> {
    let choices = state.payments.choices(order_id).await?;
    Ok(Json(PaymentChoices { order_id, choices }))
}

pub async fn select_payment(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(request): Json<SelectPaymentRequest>,
) -> Result<Json<VariantView>> {
    validate(&request)?;
    let variant = state.payments.select(order_id, &request.provider, &request.typ).await?;
    Ok(Json(VariantView::new(&variant, state.languages.default_language())))
}

pub async fn confirm_payment(State(state): State<AppState>, Path(order_id): Path<Uuid>) -> Result<Json<ConfirmationForm>> {
    Ok(Json(state.payments.confirmation_form(order_id).await?))
}

pub async fn translate_variant(
    State(state): State<AppState>,
    Path((variant_id, language)): Path<(Uuid, String)>,
    Json(request): Json<TranslationRequest>,
) -> Result<Json<PaymentVariant>> {
    validate(&request)?;
    let translation = PaymentVariantTranslation {
        language: LanguageCode::new(language)?,
        name: request.name,
        description: request.description,
    };
    Ok(Json(state.payments.translate_variant(variant_id, translation).await?))
}
