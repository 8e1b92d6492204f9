//! Bridge to a generic payment gateway.
//!
//! Every configured payment type is offered as-is. The gateway payment is
//! created for the order's gross total; the variant itself costs nothing.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;

use super::{ConfirmationForm, FormField, PaymentChoice, PaymentProvider};
use crate::domain::aggregates::{Order, Payment, PaymentStatus, PaymentVariant, PaymentVariantKind};
use crate::store::Store;
use crate::{Result, StorefrontError};

pub const PROVIDER: &str = "gateway";

/// Gateway type whose form lets the customer pick the outcome.
pub const DUMMY_TYPE: &str = "dummy";

pub struct GatewayProvider {
    store: Arc<dyn Store>,
    types: Vec<String>,
}

impl GatewayProvider {
    pub fn new(store: Arc<dyn Store>, types: Vec<String>) -> Self { Self { store, types } }
}

pub fn process_url(payment_id: uuid::Uuid) -> String {
    format!("/payment-gateways/{PROVIDER}/{payment_id}/process")
}

#[async_trait]
impl PaymentProvider for GatewayProvider {
    fn name(&self) -> &'static str { PROVIDER }

    fn enum_types(&self, _order: &Order) -> Vec<PaymentChoice> {
        self.types.iter().map(|t| PaymentChoice { provider: PROVIDER, typ: t.clone(), label: t.clone() }).collect()
    }

    async fn get_variant(&self, order: &Order, typ: &str) -> Result<PaymentVariant> {
        if !self.types.iter().any(|t| t == typ) {
            return Err(StorefrontError::Validation(format!("unknown gateway payment type {typ}")));
        }
        let payment = Payment::create(order.id(), PROVIDER, typ, order.total());
        self.store.save_payment(&payment).await?;
        tracing::info!(order_id = %order.id(), payment_id = %payment.id, typ, "gateway payment created");
        Ok(PaymentVariant::create(order.id(), typ, Decimal::ZERO, PaymentVariantKind::Gateway { payment_id: payment.id })?)
    }

    async fn get_confirmation_form(&self, _order: &Order, variant: &PaymentVariant) -> Result<ConfirmationForm> {
        let payment_id = variant.kind.payment_id();
        let payment = self.store.payment(payment_id).await?.ok_or(StorefrontError::PaymentNotFound(payment_id))?;
        let mut fields = vec![
            FormField::hidden("amount", payment.amount.amount().to_string()),
            FormField::hidden("currency", payment.amount.currency()),
        ];
        if payment.backend == DUMMY_TYPE {
            fields.push(FormField::choice("status", [PaymentStatus::Paid, PaymentStatus::Failed].map(|s| s.as_str().to_string()).to_vec()));
        }
        Ok(ConfirmationForm { action: process_url(payment.id), method: "POST", fields })
    }
}
