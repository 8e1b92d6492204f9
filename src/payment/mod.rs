//! Payment selection and provider plumbing.
//!
//! An order pays through exactly one [`PaymentVariant`]. Providers create the
//! variant together with their own [`Payment`] record and later report the
//! payment's fate through [`PaymentSignals`].

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::{Config, Languages};
use crate::domain::aggregates::{Order, OrderStatus, Payment, PaymentStatus, PaymentVariant, PaymentVariantTranslation};
use crate::domain::events::{DomainEvent, EventPublisher, PaymentEvent};
use crate::store::Store;
use crate::{Result, StorefrontError};

pub mod gateway;
pub mod listeners;
pub mod processor;
pub mod signals;

pub use gateway::GatewayProvider;
pub use listeners::OrderPaymentListener;
pub use processor::ProcessorProvider;
pub use signals::{PaymentItem, PaymentListener, PaymentSignals, ReturnUrls};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PaymentChoice {
    pub provider: &'static str,
    #[serde(rename = "type")]
    pub typ: String,
    pub label: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FormField {
    pub name: String,
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
    pub hidden: bool,
}

impl FormField {
    pub fn hidden(name: &str, value: impl Into<String>) -> Self {
        Self { name: name.to_string(), value: Some(value.into()), choices: vec![], hidden: true }
    }

    pub fn choice(name: &str, choices: Vec<String>) -> Self {
        Self { name: name.to_string(), value: None, choices, hidden: false }
    }
}

/// Form the customer submits to hand the payment over to its provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConfirmationForm {
    pub action: String,
    pub method: &'static str,
    #[serde(rename = "form")]
    pub fields: Vec<FormField>,
}

/// What a processor needs to collect a payment.
#[derive(Clone, Debug, Serialize)]
pub struct PaymentRequest {
    pub payment_id: Uuid,
    pub backend: String,
    pub amount: rust_decimal::Decimal,
    pub currency: String,
    pub items: Vec<PaymentItem>,
    pub return_urls: ReturnUrls,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn enum_types(&self, order: &Order) -> Vec<PaymentChoice>;

    /// Creates the provider payment and returns an unsaved variant pointing at it.
    async fn get_variant(&self, order: &Order, typ: &str) -> Result<PaymentVariant>;

    async fn get_confirmation_form(&self, order: &Order, variant: &PaymentVariant) -> Result<ConfirmationForm>;
}

/// Entry point for everything payment related.
#[derive(Clone)]
pub struct Payments {
    store: Arc<dyn Store>,
    providers: Vec<Arc<dyn PaymentProvider>>,
    signals: PaymentSignals,
    events: EventPublisher,
    languages: Languages,
}

impl Payments {
    /// Wires both providers and the order listener from configuration.
    pub fn from_config(store: Arc<dyn Store>, config: &Config, events: EventPublisher) -> Self {
        let providers: Vec<Arc<dyn PaymentProvider>> = vec![
            Arc::new(GatewayProvider::new(store.clone(), config.gateway_types.clone())),
            Arc::new(ProcessorProvider::new(store.clone(), config.processor_backends.clone())),
        ];
        let mut signals = PaymentSignals::new();
        signals.connect(Arc::new(OrderPaymentListener::new(store.clone(), events.clone())));
        Self::new(store, providers, signals, events, config.languages.clone())
    }

    pub fn new(
        store: Arc<dyn Store>,
        providers: Vec<Arc<dyn PaymentProvider>>,
        signals: PaymentSignals,
        events: EventPublisher,
        languages: Languages,
    ) -> Self {
        Self { store, providers, signals, events, languages }
    }

    fn provider(&self, name: &str) -> Result<&Arc<dyn PaymentProvider>> {
        self.providers
            .iter()
            .find(|p| p.name() == name)
            .ok_or_else(|| StorefrontError::Validation(format!("unknown payment provider {name}")))
    }

    async fn load_order(&self, order_id: Uuid) -> Result<Order> {
        self.store.order(order_id).await?.ok_or(StorefrontError::OrderNotFound(order_id))
    }

    async fn load_payment(&self, payment_id: Uuid) -> Result<Payment> {
        self.store.payment(payment_id).await?.ok_or(StorefrontError::PaymentNotFound(payment_id))
    }

    pub async fn choices(&self, order_id: Uuid) -> Result<Vec<PaymentChoice>> {
        let order = self.load_order(order_id).await?;
        Ok(self.providers.iter().flat_map(|p| p.enum_types(&order)).collect())
    }

    /// Attaches a payment method to the order and moves it to `payment-pending`.
    ///
    /// A payment created by an earlier selection is cancelled. The order is
    /// written last, so a failed write leaves it selectable again.
    pub async fn select(&self, order_id: Uuid, provider: &str, typ: &str) -> Result<PaymentVariant> {
        let mut order = self.load_order(order_id).await?;
        if !matches!(order.status(), OrderStatus::Checkout | OrderStatus::PaymentPending | OrderStatus::PaymentFailed) {
            return Err(StorefrontError::Validation(format!("order in status {} cannot select a payment", order.status())));
        }
        let provider = self.provider(provider)?;
        let replaced = self.store.variant_for_order(order_id).await?;
        let variant = provider.get_variant(&order, typ).await?;
        order.set_payment_price(variant.price());
        order.set_status(OrderStatus::PaymentPending)?;

        let mut events = Vec::new();
        if let Some(replaced) = replaced {
            events.extend(self.cancel_payment(replaced.kind.payment_id()).await?);
        }
        self.store.save_variant(&variant).await?;
        self.store.save_order(&order).await?;
        tracing::info!(%order_id, variant_id = %variant.id, provider = provider.name(), typ, "payment selected");

        events.extend(order.take_events());
        events.push(DomainEvent::Payment(PaymentEvent::VariantSelected {
            order_id,
            variant_id: variant.id,
            provider: provider.name().to_string(),
        }));
        self.events.publish_all(events).await;
        Ok(variant)
    }

    /// Cancels a payment that has not settled yet and returns its events.
    async fn cancel_payment(&self, payment_id: Uuid) -> Result<Vec<DomainEvent>> {
        let Some(mut payment) = self.store.payment(payment_id).await? else {
            return Ok(vec![]);
        };
        if payment.status().is_final() {
            return Ok(vec![]);
        }
        payment.set_status(PaymentStatus::Cancelled)?;
        self.store.save_payment(&payment).await?;
        tracing::info!(order_id = %payment.order_id, %payment_id, "replaced payment cancelled");
        Ok(payment.take_events())
    }

    /// Fails unless the payment belongs to the order's current variant.
    async fn ensure_current(&self, payment: &Payment) -> Result<()> {
        let current = self.store.variant_for_order(payment.order_id).await?.map(|v| v.kind.payment_id());
        if current != Some(payment.id) {
            return Err(StorefrontError::Payment(format!("payment {} was replaced by another selection", payment.id)));
        }
        Ok(())
    }

    pub async fn variant_for_order(&self, order_id: Uuid) -> Result<Option<PaymentVariant>> {
        self.store.variant_for_order(order_id).await
    }

    pub async fn confirmation_form(&self, order_id: Uuid) -> Result<ConfirmationForm> {
        let order = self.load_order(order_id).await?;
        let variant = self
            .store
            .variant_for_order(order_id)
            .await?
            .ok_or_else(|| StorefrontError::Validation(format!("order {order_id} has no payment selected")))?;
        self.provider(variant.kind.provider())?.get_confirmation_form(&order, &variant).await
    }

    /// Adds or replaces the variant's copy in one of the translated languages.
    pub async fn translate_variant(&self, variant_id: Uuid, translation: PaymentVariantTranslation) -> Result<PaymentVariant> {
        if !self.languages.is_translatable(&translation.language) {
            return Err(StorefrontError::Validation(format!("language {} is not translatable", translation.language.as_str())));
        }
        let mut variant = self.store.variant(variant_id).await?.ok_or(StorefrontError::PaymentVariantNotFound(variant_id))?;
        variant.set_translation(translation)?;
        self.store.save_variant(&variant).await?;
        Ok(variant)
    }

    /// Applies a provider's status notification.
    ///
    /// Listeners are notified on every notification, repeated ones included.
    pub async fn update_status(&self, provider: &str, payment_id: Uuid, status: PaymentStatus) -> Result<Payment> {
        let mut payment = self.load_payment(payment_id).await?;
        if payment.provider != provider {
            return Err(StorefrontError::PaymentNotFound(payment_id));
        }
        let old_status = payment.set_status(status)?;
        self.store.save_payment(&payment).await?;
        if old_status != status {
            tracing::info!(%payment_id, %old_status, new_status = %status, "payment status changed");
        }
        self.events.publish_all(payment.take_events()).await;
        self.signals.payment_status_changed(&payment, old_status, status).await?;
        Ok(payment)
    }

    /// Applies the outcome a customer picked on the dummy gateway form.
    ///
    /// Real gateway types report back through their own notifications, never
    /// through a customer-posted form.
    pub async fn gateway_outcome(&self, payment_id: Uuid, status: PaymentStatus) -> Result<Payment> {
        if !matches!(status, PaymentStatus::Paid | PaymentStatus::Failed) {
            return Err(StorefrontError::Validation(format!("gateway cannot report {status}")));
        }
        let payment = self.load_payment(payment_id).await?;
        if payment.provider != gateway::PROVIDER {
            return Err(StorefrontError::PaymentNotFound(payment_id));
        }
        if payment.backend != gateway::DUMMY_TYPE {
            return Err(StorefrontError::Validation(format!("gateway type {} does not accept posted results", payment.backend)));
        }
        self.update_status(gateway::PROVIDER, payment_id, status).await
    }

    /// Starts a processor payment and assembles the request sent to the backend.
    pub async fn payment_request(&self, payment_id: Uuid) -> Result<PaymentRequest> {
        let payment = self.load_payment(payment_id).await?;
        if payment.provider != processor::PROVIDER {
            return Err(StorefrontError::PaymentNotFound(payment_id));
        }
        self.ensure_current(&payment).await?;
        let payment = match payment.status() {
            PaymentStatus::New => self.update_status(processor::PROVIDER, payment_id, PaymentStatus::InProgress).await?,
            PaymentStatus::InProgress => payment,
            other => return Err(StorefrontError::Payment(format!("payment {payment_id} is already {other}"))),
        };
        let items = self.signals.order_items_query(&payment).await?;
        let return_urls = self.signals.return_urls_query(&payment).await?;
        Ok(PaymentRequest {
            payment_id,
            backend: payment.backend.clone(),
            amount: payment.amount.amount(),
            currency: payment.amount.currency().to_string(),
            items,
            return_urls,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::order::tests::sample_order;
    use crate::domain::value_objects::LanguageCode;
    use crate::store::{InMemoryStore, OrderStore, PaymentStore};

    async fn setup_with(gateway_types: &[&str]) -> (Arc<InMemoryStore>, Payments, Uuid) {
        let store = Arc::new(InMemoryStore::new());
        let order = sample_order();
        store.save_order(&order).await.unwrap();
        let config = Config { gateway_types: gateway_types.iter().map(|t| t.to_string()).collect(), ..Config::default() };
        let payments = Payments::from_config(store.clone(), &config, EventPublisher::default());
        (store, payments, order.id())
    }

    async fn setup() -> (Arc<InMemoryStore>, Payments, Uuid) {
        setup_with(&["dummy"]).await
    }

    #[tokio::test]
    async fn test_choices_cover_all_providers() {
        let (_store, payments, order_id) = setup().await;
        let choices = payments.choices(order_id).await.unwrap();
        let providers: Vec<_> = choices.iter().map(|c| c.provider).collect();
        assert_eq!(providers, ["gateway", "processor"]);
    }

    #[tokio::test]
    async fn test_select_moves_order_to_payment_pending() {
        let (store, payments, order_id) = setup().await;
        let variant = payments.select(order_id, "processor", "dummy").await.unwrap();
        let order = store.order(order_id).await.unwrap().unwrap();
        assert_eq!(order.status(), OrderStatus::PaymentPending);
        assert_eq!(store.variant_for_order(order_id).await.unwrap().unwrap().id, variant.id);

        // Choosing again replaces the variant.
        let second = payments.select(order_id, "gateway", "dummy").await.unwrap();
        assert_eq!(store.variant_for_order(order_id).await.unwrap().unwrap().id, second.id);
        let form = payments.confirmation_form(order_id).await.unwrap();
        assert!(form.action.starts_with("/payment-gateways/gateway/"));
    }

    #[tokio::test]
    async fn test_processor_flow_completes_order() {
        let (store, payments, order_id) = setup().await;
        let variant = payments.select(order_id, "processor", "dummy").await.unwrap();
        let payment_id = variant.kind.payment_id();

        let request = payments.payment_request(payment_id).await.unwrap();
        assert_eq!(request.items.len(), 3);
        assert_eq!(request.return_urls.paid.as_deref(), Some(format!("/order/{order_id}/").as_str()));
        assert_eq!(store.payment(payment_id).await.unwrap().unwrap().status(), PaymentStatus::InProgress);

        payments.update_status("processor", payment_id, PaymentStatus::Paid).await.unwrap();
        assert_eq!(store.order(order_id).await.unwrap().unwrap().status(), OrderStatus::PaymentComplete);
        assert!(matches!(payments.payment_request(payment_id).await, Err(StorefrontError::Payment(_))));
    }

    #[tokio::test]
    async fn test_reselect_cancels_previous_payment() {
        let (store, payments, order_id) = setup().await;
        let first = payments.select(order_id, "processor", "dummy").await.unwrap().kind.payment_id();
        payments.select(order_id, "gateway", "dummy").await.unwrap();
        assert_eq!(store.payment(first).await.unwrap().unwrap().status(), PaymentStatus::Cancelled);

        assert!(matches!(payments.payment_request(first).await, Err(StorefrontError::Payment(_))));
        let late = payments.update_status("processor", first, PaymentStatus::Paid).await;
        assert!(matches!(late, Err(StorefrontError::PaymentStatus(_))));
        assert_eq!(store.payment(first).await.unwrap().unwrap().status(), PaymentStatus::Cancelled);
        assert_eq!(store.order(order_id).await.unwrap().unwrap().status(), OrderStatus::PaymentPending);
    }

    #[tokio::test]
    async fn test_settled_payment_cannot_restart() {
        let (store, payments, order_id) = setup().await;
        let payment_id = payments.select(order_id, "processor", "dummy").await.unwrap().kind.payment_id();
        payments.payment_request(payment_id).await.unwrap();
        payments.update_status("processor", payment_id, PaymentStatus::Paid).await.unwrap();

        let reset = payments.update_status("processor", payment_id, PaymentStatus::New).await;
        assert!(matches!(reset, Err(StorefrontError::PaymentStatus(_))));
        assert!(matches!(payments.payment_request(payment_id).await, Err(StorefrontError::Payment(_))));
        assert_eq!(store.payment(payment_id).await.unwrap().unwrap().status(), PaymentStatus::Paid);
        assert_eq!(store.order(order_id).await.unwrap().unwrap().status(), OrderStatus::PaymentComplete);
    }

    #[tokio::test]
    async fn test_posted_gateway_outcome_only_for_dummy() {
        let (store, payments, order_id) = setup_with(&["dummy", "card"]).await;
        let card = payments.select(order_id, "gateway", "card").await.unwrap().kind.payment_id();
        assert!(matches!(payments.gateway_outcome(card, PaymentStatus::Paid).await, Err(StorefrontError::Validation(_))));
        assert_eq!(store.payment(card).await.unwrap().unwrap().status(), PaymentStatus::New);
        assert_eq!(store.order(order_id).await.unwrap().unwrap().status(), OrderStatus::PaymentPending);

        let dummy = payments.select(order_id, "gateway", "dummy").await.unwrap().kind.payment_id();
        assert!(matches!(payments.gateway_outcome(dummy, PaymentStatus::InProgress).await, Err(StorefrontError::Validation(_))));
        payments.gateway_outcome(dummy, PaymentStatus::Paid).await.unwrap();
        assert_eq!(store.order(order_id).await.unwrap().unwrap().status(), OrderStatus::PaymentComplete);
    }

    #[tokio::test]
    async fn test_notification_for_wrong_provider_rejected() {
        let (_store, payments, order_id) = setup().await;
        let variant = payments.select(order_id, "gateway", "dummy").await.unwrap();
        let result = payments.update_status("processor", variant.kind.payment_id(), PaymentStatus::Paid).await;
        assert!(matches!(result, Err(StorefrontError::PaymentNotFound(_))));
    }

    #[tokio::test]
    async fn test_translation_limited_to_configured_languages() {
        let (_store, payments, order_id) = setup().await;
        let variant = payments.select(order_id, "processor", "dummy").await.unwrap();
        let polish = PaymentVariantTranslation { language: LanguageCode::new("pl").unwrap(), name: "Przelew".into(), description: String::new() };
        let updated = payments.translate_variant(variant.id, polish).await.unwrap();
        assert_eq!(updated.name_in(&LanguageCode::new("pl").unwrap()), "Przelew");

        let french = PaymentVariantTranslation { language: LanguageCode::new("fr").unwrap(), name: "Virement".into(), description: String::new() };
        assert!(matches!(payments.translate_variant(variant.id, french).await, Err(StorefrontError::Validation(_))));
    }
}
