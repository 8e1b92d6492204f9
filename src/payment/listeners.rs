//! Binds payment notifications to orders.

use async_trait::async_trait;
use std::sync::Arc;

use super::signals::{PaymentItem, PaymentListener, ReturnUrls};
use crate::domain::aggregates::{OrderStatus, Payment, PaymentStatus};
use crate::domain::events::EventPublisher;
use crate::routes::order_url;
use crate::store::Store;
use crate::{Result, StorefrontError};

pub struct OrderPaymentListener {
    store: Arc<dyn Store>,
    events: EventPublisher,
}

impl OrderPaymentListener {
    pub fn new(store: Arc<dyn Store>, events: EventPublisher) -> Self { Self { store, events } }
}

#[async_trait]
impl PaymentListener for OrderPaymentListener {
    async fn payment_status_changed(&self, payment: &Payment, _old_status: PaymentStatus, new_status: PaymentStatus) -> Result<()> {
        let target = match new_status {
            PaymentStatus::Paid => OrderStatus::PaymentComplete,
            PaymentStatus::Failed => OrderStatus::PaymentFailed,
            _ => return Ok(()),
        };
        let current = self.store.variant_for_order(payment.order_id).await?.map(|v| v.kind.payment_id());
        if current != Some(payment.id) {
            tracing::info!(order_id = %payment.order_id, payment_id = %payment.id, "ignoring payment replaced by another selection");
            return Ok(());
        }
        let mut order = self.store.order(payment.order_id).await?.ok_or(StorefrontError::OrderNotFound(payment.order_id))?;
        // A late failure must not undo a completed payment.
        if target == OrderStatus::PaymentFailed && order.status() != OrderStatus::PaymentPending {
            tracing::info!(order_id = %order.id(), status = %order.status(), "ignoring payment failure");
            return Ok(());
        }
        if order.set_status(target)? {
            self.store.save_order(&order).await?;
            tracing::info!(order_id = %order.id(), payment_id = %payment.id, status = %target, "order status updated from payment");
            self.events.publish_all(order.take_events()).await;
        }
        Ok(())
    }

    async fn return_urls_query(&self, payment: &Payment, urls: &mut ReturnUrls) -> Result<()> {
        if self.store.order(payment.order_id).await?.is_none() {
            tracing::warn!(payment_id = %payment.id, order_id = %payment.order_id, "payment refers to a missing order");
            return Err(StorefrontError::OrderNotFound(payment.order_id));
        }
        let url = order_url(payment.order_id);
        urls.paid = Some(url.clone());
        urls.failure = Some(url);
        tracing::debug!(payment_id = %payment.id, ?urls, "return urls resolved");
        Ok(())
    }

    async fn order_items_query(&self, payment: &Payment, items: &mut Vec<PaymentItem>) -> Result<()> {
        let ordered = self.store.ordered_items(payment.order_id).await?;
        items.extend(ordered.into_iter().map(|item| PaymentItem {
            name: item.product_name,
            quantity: item.quantity,
            unit_price: item.unit_price_gross,
        }));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::order::tests::sample_order;
    use crate::domain::aggregates::{PaymentVariant, PaymentVariantKind};
    use crate::domain::value_objects::Money;
    use crate::store::{InMemoryStore, OrderStore, PaymentStore};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    async fn select(store: &InMemoryStore, payment: &Payment) {
        let kind = PaymentVariantKind::Processor { payment_id: payment.id };
        let variant = PaymentVariant::create(payment.order_id, "dummy", Decimal::ZERO, kind).unwrap();
        store.save_payment(payment).await.unwrap();
        store.save_variant(&variant).await.unwrap();
    }

    async fn setup() -> (Arc<InMemoryStore>, OrderPaymentListener, Payment) {
        let store = Arc::new(InMemoryStore::new());
        let mut order = sample_order();
        order.set_status(OrderStatus::PaymentPending).unwrap();
        store.save_order(&order).await.unwrap();
        let listener = OrderPaymentListener::new(store.clone(), EventPublisher::default());
        let payment = Payment::create(order.id(), "processor", "dummy", order.total());
        select(&store, &payment).await;
        (store, listener, payment)
    }

    #[tokio::test]
    async fn test_paid_completes_order() {
        let (store, listener, payment) = setup().await;
        listener.payment_status_changed(&payment, PaymentStatus::InProgress, PaymentStatus::Paid).await.unwrap();
        let order = store.order(payment.order_id).await.unwrap().unwrap();
        assert_eq!(order.status(), OrderStatus::PaymentComplete);

        // A duplicate notification leaves the order where it is.
        listener.payment_status_changed(&payment, PaymentStatus::Paid, PaymentStatus::Paid).await.unwrap();
        assert_eq!(store.order(payment.order_id).await.unwrap().unwrap().status(), OrderStatus::PaymentComplete);
    }

    #[tokio::test]
    async fn test_other_statuses_ignored() {
        let (store, listener, payment) = setup().await;
        listener.payment_status_changed(&payment, PaymentStatus::New, PaymentStatus::InProgress).await.unwrap();
        assert_eq!(store.order(payment.order_id).await.unwrap().unwrap().status(), OrderStatus::PaymentPending);
    }

    #[tokio::test]
    async fn test_failure_after_completion_ignored() {
        let (store, listener, payment) = setup().await;
        listener.payment_status_changed(&payment, PaymentStatus::New, PaymentStatus::Failed).await.unwrap();
        assert_eq!(store.order(payment.order_id).await.unwrap().unwrap().status(), OrderStatus::PaymentFailed);

        let (store, listener, payment) = setup().await;
        listener.payment_status_changed(&payment, PaymentStatus::New, PaymentStatus::Paid).await.unwrap();
        listener.payment_status_changed(&payment, PaymentStatus::Paid, PaymentStatus::Failed).await.unwrap();
        assert_eq!(store.order(payment.order_id).await.unwrap().unwrap().status(), OrderStatus::PaymentComplete);
    }

    #[tokio::test]
    async fn test_replaced_payment_ignored() {
        let (store, listener, stale) = setup().await;
        let current = Payment::create(stale.order_id, "processor", "dummy", stale.amount.clone());
        select(&store, &current).await;

        listener.payment_status_changed(&stale, PaymentStatus::New, PaymentStatus::Paid).await.unwrap();
        assert_eq!(store.order(stale.order_id).await.unwrap().unwrap().status(), OrderStatus::PaymentPending);

        listener.payment_status_changed(&current, PaymentStatus::New, PaymentStatus::Paid).await.unwrap();
        assert_eq!(store.order(stale.order_id).await.unwrap().unwrap().status(), OrderStatus::PaymentComplete);
    }

    #[tokio::test]
    async fn test_items_mirror_ordered_items() {
        let (store, listener, payment) = setup().await;
        let mut items = Vec::new();
        listener.order_items_query(&payment, &mut items).await.unwrap();
        let ordered = store.ordered_items(payment.order_id).await.unwrap();
        assert_eq!(items.len(), ordered.len());
        for (item, row) in items.iter().zip(&ordered) {
            assert_eq!(item.unit_price, row.unit_price_gross);
            assert_eq!(item.quantity, row.quantity);
        }
    }

    #[tokio::test]
    async fn test_return_urls_point_at_order() {
        let (_store, listener, payment) = setup().await;
        let mut urls = ReturnUrls::default();
        listener.return_urls_query(&payment, &mut urls).await.unwrap();
        let expected = format!("/order/{}/", payment.order_id);
        assert_eq!(urls.paid.as_deref(), Some(expected.as_str()));
        assert_eq!(urls.failure, urls.paid);

        let orphan = Payment::create(Uuid::new_v4(), "processor", "dummy", Money::new(dec!(1), "USD"));
        assert!(matches!(listener.return_urls_query(&orphan, &mut urls).await, Err(StorefrontError::OrderNotFound(_))));
    }
}
