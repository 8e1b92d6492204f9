use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CartStore, CatalogStore, OrderStore, PaymentStore};
use crate::domain::aggregates::{Cart, Category, Order, OrderedItem, Payment, PaymentVariant, Product};
use crate::Result;

const FIRST_ORDER_NUMBER: i64 = 1000;

/// A thread-safe in-memory store.
///
/// Used by tests and when no `DATABASE_URL` is configured.
#[derive(Clone)]
pub struct InMemoryStore {
    categories: Arc<RwLock<HashMap<Uuid, Category>>>,
    products: Arc<RwLock<HashMap<Uuid, Product>>>,
    carts: Arc<RwLock<HashMap<String, Cart>>>,
    orders: Arc<RwLock<HashMap<Uuid, Order>>>,
    variants: Arc<RwLock<HashMap<Uuid, PaymentVariant>>>,
    payments: Arc<RwLock<HashMap<Uuid, Payment>>>,
    order_numbers: Arc<AtomicI64>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self {
            categories: Default::default(),
            products: Default::default(),
            carts: Default::default(),
            orders: Default::default(),
            variants: Default::default(),
            payments: Default::default(),
            order_numbers: Arc::new(AtomicI64::new(FIRST_ORDER_NUMBER)),
        }
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn categories(&self) -> Result<Vec<Category>> {
        Ok(self.categories.read().await.values().cloned().collect())
    }

    async fn save_category(&self, category: &Category) -> Result<()> {
        self.categories.write().await.insert(category.id, category.clone());
        Ok(())
    }

    async fn products(&self) -> Result<Vec<Product>> {
        let mut products: Vec<Product> = self.products.read().await.values().filter(|p| p.is_active()).cloned().collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }

    async fn product(&self, id: Uuid) -> Result<Option<Product>> {
        Ok(self.products.read().await.get(&id).cloned())
    }

    async fn save_product(&self, product: &Product) -> Result<()> {
        self.products.write().await.insert(product.id, product.clone());
        Ok(())
    }

    async fn search_products(&self, query: &str) -> Result<Vec<Product>> {
        let needle = query.to_lowercase();
        Ok(self.products().await?.into_iter().filter(|p| p.name.to_lowercase().contains(&needle)).collect())
    }
}

#[async_trait]
impl CartStore for InMemoryStore {
    async fn cart(&self, session_id: &str) -> Result<Option<Cart>> {
        Ok(self.carts.read().await.get(session_id).cloned())
    }

    async fn save_cart(&self, cart: &Cart) -> Result<()> {
        self.carts.write().await.insert(cart.session_id.clone(), cart.clone());
        Ok(())
    }

    async fn delete_cart(&self, session_id: &str) -> Result<()> {
        self.carts.write().await.remove(session_id);
        Ok(())
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn next_order_number(&self) -> Result<i64> {
        Ok(self.order_numbers.fetch_add(1, Ordering::SeqCst))
    }

    async fn save_order(&self, order: &Order) -> Result<()> {
        let mut stored = order.clone();
        // Pending events belong to the caller.
        stored.take_events();
        self.orders.write().await.insert(order.id(), stored);
        Ok(())
    }

    async fn order(&self, id: Uuid) -> Result<Option<Order>> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn ordered_items(&self, order_id: Uuid) -> Result<Vec<OrderedItem>> {
        let orders = self.orders.read().await;
        Ok(orders.get(&order_id).map(|o| o.ordered_items().cloned().collect()).unwrap_or_default())
    }
}

#[async_trait]
impl PaymentStore for InMemoryStore {
    async fn save_variant(&self, variant: &PaymentVariant) -> Result<()> {
        let mut variants = self.variants.write().await;
        variants.retain(|id, v| v.order_id != variant.order_id || *id == variant.id);
        variants.insert(variant.id, variant.clone());
        Ok(())
    }

    async fn variant(&self, id: Uuid) -> Result<Option<PaymentVariant>> {
        Ok(self.variants.read().await.get(&id).cloned())
    }

    async fn variant_for_order(&self, order_id: Uuid) -> Result<Option<PaymentVariant>> {
        Ok(self.variants.read().await.values().find(|v| v.order_id == order_id).cloned())
    }

    async fn save_payment(&self, payment: &Payment) -> Result<()> {
        let mut stored = payment.clone();
        stored.take_events();
        self.payments.write().await.insert(payment.id, stored);
        Ok(())
    }

    async fn payment(&self, id: Uuid) -> Result<Option<Payment>> {
        Ok(self.payments.read().await.get(&id).cloned())
    }
}
