//! Notifications raised by payment providers.
//!
//! Providers do not know about orders. They announce what happens to a
//! [`Payment`] and ask listeners for data they need to build a payment
//! request. Listeners run in registration order; the first error stops the
//! dispatch.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;

use crate::domain::aggregates::{Payment, PaymentStatus};
use crate::Result;

/// Where the provider sends the customer after a paid or failed payment.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReturnUrls {
    pub paid: Option<String>,
    pub failure: Option<String>,
}

/// One line of a payment request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PaymentItem {
    pub name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

#[async_trait]
pub trait PaymentListener: Send + Sync {
    async fn payment_status_changed(&self, _payment: &Payment, _old_status: PaymentStatus, _new_status: PaymentStatus) -> Result<()> {
        Ok(())
    }

    async fn return_urls_query(&self, _payment: &Payment, _urls: &mut ReturnUrls) -> Result<()> {
        Ok(())
    }

    async fn order_items_query(&self, _payment: &Payment, _items: &mut Vec<PaymentItem>) -> Result<()> {
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct PaymentSignals {
    listeners: Vec<Arc<dyn PaymentListener>>,
}

impl PaymentSignals {
    pub fn new() -> Self { Self::default() }

    pub fn connect(&mut self, listener: Arc<dyn PaymentListener>) { self.listeners.push(listener); }

    pub fn len(&self) -> usize { self.listeners.len() }
    pub fn is_empty(&self) -> bool { self.listeners.is_empty() }

    pub async fn payment_status_changed(&self, payment: &Payment, old_status: PaymentStatus, new_status: PaymentStatus) -> Result<()> {
        tracing::debug!(payment_id = %payment.id, %old_status, %new_status, listeners = self.listeners.len(), "payment_status_changed");
        for listener in &self.listeners {
            listener.payment_status_changed(payment, old_status, new_status).await?;
        }
        Ok(())
    }

    pub async fn return_urls_query(&self, payment: &Payment) -> Result<ReturnUrls> {
        let mut urls = ReturnUrls::default();
        for listener in &self.listeners {
            listener.return_urls_query(payment, &mut urls).await?;
        }
        Ok(urls)
    }

    pub async fn order_items_query(&self, payment: &Payment) -> Result<Vec<PaymentItem>> {
        let mut items = Vec::new();
        for listener in &self.listeners {
            listener.order_items_query(payment, &mut items).await?;
        }
        Ok(items)
    }
}
