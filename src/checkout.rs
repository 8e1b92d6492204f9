//! Cart handling and the conversion of a cart into an order.

use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::aggregates::{Cart, CartItem, DeliveryGroup, DeliveryKind, Order, OrderedItem, Product};
use crate::domain::events::EventPublisher;
use crate::pricing::PricingChain;
use crate::store::Store;
use crate::{Result, StorefrontError};

#[derive(Clone)]
pub struct Checkout {
    store: Arc<dyn Store>,
    pricing: Arc<PricingChain>,
    events: EventPublisher,
    currency: String,
    tax_rate: Decimal,
}

impl Checkout {
    pub fn new(store: Arc<dyn Store>, pricing: Arc<PricingChain>, events: EventPublisher, currency: &str, tax_rate: Decimal) -> Self {
        Self { store, pricing, events, currency: currency.to_uppercase(), tax_rate }
    }

    /// The session's cart, or a fresh empty one.
    pub async fn cart(&self, session_id: &str) -> Result<Cart> {
        Ok(self.store.cart(session_id).await?.unwrap_or_else(|| Cart::new(session_id, &self.currency)))
    }

    async fn active_product(&self, product_id: Uuid) -> Result<Product> {
        self.store
            .product(product_id)
            .await?
            .filter(Product::is_active)
            .ok_or_else(|| StorefrontError::ProductNotFound(product_id.to_string()))
    }

    pub async fn add_to_cart(&self, session_id: &str, product_id: Uuid, quantity: u32) -> Result<Cart> {
        let product = self.active_product(product_id).await?;
        let mut cart = self.cart(session_id).await?;
        cart.add_item(CartItem {
            product_id,
            name: product.name.clone(),
            quantity,
            unit_price: self.pricing.unit_price(&product),
        })?;
        self.store.save_cart(&cart).await?;
        tracing::debug!(session_id, %product_id, quantity, "item added to cart");
        Ok(cart)
    }

    /// Zero removes the item.
    pub async fn update_quantity(&self, session_id: &str, product_id: Uuid, quantity: u32) -> Result<Cart> {
        let mut cart = self.cart(session_id).await?;
        cart.update_quantity(product_id, quantity)?;
        self.store.save_cart(&cart).await?;
        Ok(cart)
    }

    pub async fn remove_item(&self, session_id: &str, product_id: Uuid) -> Result<Cart> {
        let mut cart = self.cart(session_id).await?;
        cart.remove_item(product_id)?;
        self.store.save_cart(&cart).await?;
        Ok(cart)
    }

    pub async fn clear_cart(&self, session_id: &str) -> Result<()> {
        self.store.delete_cart(session_id).await
    }

    /// Turns the session's cart into an order and empties the cart.
    ///
    /// Lines are repriced through the pricing chain. Physical products ship,
    /// digital ones go into a separate delivery group.
    pub async fn place_order(&self, session_id: &str) -> Result<Order> {
        let cart = self.cart(session_id).await?;
        if cart.is_empty() {
            return Err(StorefrontError::Validation("cart is empty".into()));
        }

        let mut shipping = Vec::new();
        let mut digital = Vec::new();
        for line in cart.items() {
            let product = self.active_product(line.product_id).await?;
            let net = self.pricing.unit_price(&product).amount();
            let item = OrderedItem {
                id: Uuid::now_v7(),
                product_id: product.id,
                product_name: product.name.clone(),
                quantity: line.quantity,
                unit_price_net: net,
                unit_price_gross: self.gross(net),
            };
            if product.digital { digital.push(item) } else { shipping.push(item) }
        }

        let groups = [(DeliveryKind::Shipping, shipping), (DeliveryKind::Digital, digital)]
            .into_iter()
            .map(|(kind, items)| DeliveryGroup { id: Uuid::now_v7(), kind, items })
            .collect();
        let number = self.store.next_order_number().await?;
        let mut order = Order::create(number, cart.currency(), groups)?;
        self.store.save_order(&order).await?;
        self.store.delete_cart(session_id).await?;

        tracing::info!(order_id = %order.id(), number, total = %order.total(), "order placed");
        self.events.publish_all(order.take_events()).await;
        Ok(order)
    }

    fn gross(&self, net: Decimal) -> Decimal {
        (net * (Decimal::ONE + self.tax_rate)).round_dp(2)
    }
}
