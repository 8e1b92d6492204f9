//! Regional payment processor.
//!
//! The customer is sent to the processor with a payment request listing the
//! order lines and the URLs to come back to. The processor reports the
//! outcome through status notifications.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;

use super::{ConfirmationForm, FormField, PaymentChoice, PaymentProvider};
use crate::domain::aggregates::{Order, Payment, PaymentVariant, PaymentVariantKind};
use crate::store::Store;
use crate::{Result, StorefrontError};

pub const PROVIDER: &str = "processor";

pub struct ProcessorProvider {
    store: Arc<dyn Store>,
    backends: Vec<String>,
}

impl ProcessorProvider {
    pub fn new(store: Arc<dyn Store>, backends: Vec<String>) -> Self { Self { store, backends } }
}

pub fn process_url(payment_id: uuid::Uuid) -> String {
    format!("/payment-gateways/{PROVIDER}/{payment_id}/process")
}

#[async_trait]
impl PaymentProvider for ProcessorProvider {
    fn name(&self) -> &'static str { PROVIDER }

    fn enum_types(&self, _order: &Order) -> Vec<PaymentChoice> {
        self.backends
            .iter()
            .map(|b| PaymentChoice { provider: PROVIDER, typ: b.clone(), label: format!("{b} (processor)") })
            .collect()
    }

    async fn get_variant(&self, order: &Order, typ: &str) -> Result<PaymentVariant> {
        if !self.backends.iter().any(|b| b == typ) {
            return Err(StorefrontError::Validation(format!("unknown processor backend {typ}")));
        }
        let payment = Payment::create(order.id(), PROVIDER, typ, order.total());
        self.store.save_payment(&payment).await?;
        tracing::info!(order_id = %order.id(), payment_id = %payment.id, backend = typ, "processor payment created");
        Ok(PaymentVariant::create(order.id(), typ, Decimal::ZERO, PaymentVariantKind::Processor { payment_id: payment.id })?)
    }

    async fn get_confirmation_form(&self, _order: &Order, variant: &PaymentVariant) -> Result<ConfirmationForm> {
        let payment_id = variant.kind.payment_id();
        let payment = self.store.payment(payment_id).await?.ok_or(StorefrontError::PaymentNotFound(payment_id))?;
        Ok(ConfirmationForm {
            action: process_url(payment.id),
            method: "POST",
            fields: vec![FormField::hidden("backend", &payment.backend)],
        })
    }
}
