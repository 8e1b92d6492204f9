//! Endpoints the payment providers talk to.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{order_url, AppState};
use crate::domain::aggregates::{Payment, PaymentStatus};
use crate::payment::{processor, PaymentRequest};
use crate::{Result, StorefrontError};

#[derive(Debug, Deserialize)]
pub struct StatusNotification {
    pub status: String,
}

impl StatusNotification {
    fn status(&self) -> Result<PaymentStatus> {
        PaymentStatus::parse(&self.status).ok_or_else(|| StorefrontError::Validation(format!("unknown payment status {}", self.status)))
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentOutcome {
    pub payment_id: Uuid,
    pub status: PaymentStatus,
    pub order_url: String,
}

impl From<Payment> for PaymentOutcome {
    fn from(payment: Payment) -> Self {
        Self { payment_id: payment.id, status: payment.status(), order_url: order_url(payment.order_id) }
    }
}

pub async fn gateway_process(
    State(state): State<AppState>,
    Path(payment_id): Path<Uuid>,
    Json(notification): Json<StatusNotification>,
) -> Result<Json<PaymentOutcome>> {
    let payment = state.payments.gateway_outcome(payment_id, notification.status()?).await?;
    Ok(Json(payment.into()))
}

pub async fn processor_process(State(state): State<AppState>, Path(payment_id): Path<Uuid>) -> Result<Json<PaymentRequest>> {
    Ok(Json(state.payments.payment_request(payment_id).await?))
}

pub async fn processor_status(
    State(state): State<AppState>,
    Path(payment_id): Path<Uuid>,
    Json(notification): Json<StatusNotification>,
) -> Result<Json<PaymentOutcome>> {
    let payment = state.payments.update_status(processor::PROVIDER, payment_id, notification.status()?).await?;
    Ok(Json(payment.into()))
}
