//! Persistence ports and their adapters.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::aggregates::{Cart, Category, Order, OrderedItem, Payment, PaymentVariant, Product};
use crate::Result;

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn categories(&self) -> Result<Vec<Category>>;
    async fn save_category(&self, category: &Category) -> Result<()>;
    /// Active products only.
    async fn products(&self) -> Result<Vec<Product>>;
    async fn product(&self, id: Uuid) -> Result<Option<Product>>;
    async fn save_product(&self, product: &Product) -> Result<()>;
    /// Case-insensitive match on active product names.
    async fn search_products(&self, query: &str) -> Result<Vec<Product>>;
}

#[async_trait]
pub trait CartStore: Send + Sync {
    async fn cart(&self, session_id: &str) -> Result<Option<Cart>>;
    async fn save_cart(&self, cart: &Cart) -> Result<()>;
    async fn delete_cart(&self, session_id: &str) -> Result<()>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn next_order_number(&self) -> Result<i64>;
    async fn save_order(&self, order: &Order) -> Result<()>;
    async fn order(&self, id: Uuid) -> Result<Option<Order>>;
    /// Items of every delivery group belonging to the order.
    async fn ordered_items(&self, order_id: Uuid) -> Result<Vec<OrderedItem>>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Replaces any variant previously attached to the same order.
    async fn save_variant(&self, variant: &PaymentVariant) -> Result<()>;
    async fn variant(&self, id: Uuid) -> Result<Option<PaymentVariant>>;
    async fn variant_for_order(&self, order_id: Uuid) -> Result<Option<PaymentVariant>>;
    async fn save_payment(&self, payment: &Payment) -> Result<()>;
    async fn payment(&self, id: Uuid) -> Result<Option<Payment>>;
}

pub trait Store: CatalogStore + CartStore + OrderStore + PaymentStore {}

impl<T: CatalogStore + CartStore + OrderStore + PaymentStore> Store for T {}
