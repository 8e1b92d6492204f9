use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use super::{CartStore, CatalogStore, OrderStore, PaymentStore};
use crate::domain::aggregates::{
    Cart, CartItem, Category, DeliveryGroup, DeliveryKind, Discount, Order, OrderStatus, OrderedItem, Payment, PaymentStatus,
    PaymentVariant, PaymentVariantKind, PaymentVariantTranslation, Product, ProductStatus, Variant,
};
use crate::domain::value_objects::{LanguageCode, Money, Slug};
use crate::{Result, StorefrontError};

fn db_quantity(quantity: u32) -> Result<i32> {
    i32::try_from(quantity).map_err(|_| StorefrontError::Validation(format!("quantity {quantity} out of range")))
}

/// Postgres-backed store. Aggregates are written in one transaction each:
/// the root row is upserted, child rows are replaced.
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self { Self { db } }

    pub async fn migrate(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.db).await
    }

    async fn fetch_products(&self, id: Option<Uuid>, active_only: bool, search: Option<&str>) -> Result<Vec<Product>> {
        let pattern = search.map(|q| format!("%{}%", q.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")));
        let rows = sqlx::query_as::<_, ProductRow>(
            "SELECT p.id, p.slug, p.name, p.description, p.price, p.currency, p.digital, p.status, p.created_at, p.updated_at, \
                    d.id AS discount_id, d.name AS discount_name, d.rate AS discount_rate \
             FROM products p LEFT JOIN discounts d ON d.id = p.discount_id \
             WHERE ($1::uuid IS NULL OR p.id = $1) \
               AND ($2 = FALSE OR p.status = 'active') \
               AND ($3::text IS NULL OR p.name ILIKE $3) \
             ORDER BY p.name",
        )
        .bind(id).bind(active_only).bind(pattern)
        .fetch_all(&self.db).await?;
        if rows.is_empty() { return Ok(vec![]); }

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let variants = sqlx::query_as::<_, VariantRow>("SELECT id, product_id, name, price FROM product_variants WHERE product_id = ANY($1) ORDER BY price, name")
            .bind(&ids).fetch_all(&self.db).await?;
        let links = sqlx::query_as::<_, (Uuid, Uuid)>("SELECT product_id, category_id FROM product_categories WHERE product_id = ANY($1) ORDER BY category_id")
            .bind(&ids).fetch_all(&self.db).await?;

        let mut variants_by_product: HashMap<Uuid, Vec<VariantRow>> = HashMap::new();
        for v in variants { variants_by_product.entry(v.product_id).or_default().push(v); }
        let mut categories_by_product: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for (product_id, category_id) in links { categories_by_product.entry(product_id).or_default().push(category_id); }

        rows.into_iter()
            .map(|row| {
                let variants = variants_by_product.remove(&row.id).unwrap_or_default();
                let categories = categories_by_product.remove(&row.id).unwrap_or_default();
                row.into_product(variants, categories)
            })
            .collect()
    }
}

#[derive(sqlx::FromRow)]
struct CategoryRow { id: Uuid, parent_id: Option<Uuid>, name: String, slug: String, position: i32 }

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid, slug: String, name: String, description: String, price: Decimal, currency: String,
    digital: bool, status: String, created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
    discount_id: Option<Uuid>, discount_name: Option<String>, discount_rate: Option<Decimal>,
}

#[derive(sqlx::FromRow)]
struct VariantRow { id: Uuid, product_id: Uuid, name: String, price: Decimal }

impl ProductRow {
    fn into_product(self, variants: Vec<VariantRow>, category_ids: Vec<Uuid>) -> Result<Product> {
        let discount = match (self.discount_id, self.discount_name, self.discount_rate) {
            (Some(id), Some(name), Some(rate)) => Some(Discount::restore(id, name, rate)?),
            _ => None,
        };
        let status = ProductStatus::parse(&self.status)
            .ok_or_else(|| StorefrontError::InvalidRecord(format!("product {} status {}", self.id, self.status)))?;
        Ok(Product {
            id: self.id,
            slug: Slug::new(self.slug)?,
            name: self.name,
            description: self.description,
            price: Money::new(self.price, &self.currency),
            variants: variants.into_iter().map(|v| Variant { id: v.id, name: v.name, price: Money::new(v.price, &self.currency) }).collect(),
            category_ids,
            discount,
            digital: self.digital,
            status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CartRow { session_id: String, currency: String, created_at: DateTime<Utc>, updated_at: DateTime<Utc> }

#[derive(sqlx::FromRow)]
struct CartItemRow { product_id: Uuid, name: String, quantity: i32, unit_price: Decimal }

#[derive(sqlx::FromRow)]
struct OrderRow { id: Uuid, number: i64, currency: String, status: String, payment_price: Decimal, created_at: DateTime<Utc>, updated_at: DateTime<Utc> }

#[derive(sqlx::FromRow)]
struct DeliveryGroupRow { id: Uuid, kind: String }

#[derive(sqlx::FromRow)]
struct OrderedItemRow {
    id: Uuid, delivery_group_id: Uuid, product_id: Uuid, product_name: String, quantity: i32,
    unit_price_net: Decimal, unit_price_gross: Decimal,
}

impl From<OrderedItemRow> for OrderedItem {
    fn from(row: OrderedItemRow) -> Self {
        OrderedItem {
            id: row.id, product_id: row.product_id, product_name: row.product_name, quantity: row.quantity.max(0) as u32,
            unit_price_net: row.unit_price_net, unit_price_gross: row.unit_price_gross,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PaymentVariantRow { id: Uuid, order_id: Uuid, name: String, description: String, price: Decimal, provider: String, payment_id: Uuid }

#[derive(sqlx::FromRow)]
struct TranslationRow { language: String, name: String, description: String }

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: Uuid, order_id: Uuid, provider: String, backend: String, amount: Decimal, currency: String,
    status: String, created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn categories(&self) -> Result<Vec<Category>> {
        let rows = sqlx::query_as::<_, CategoryRow>("SELECT id, parent_id, name, slug, position FROM categories ORDER BY position, name")
            .fetch_all(&self.db).await?;
        rows.into_iter()
            .map(|r| -> Result<Category> { Ok(Category { id: r.id, parent_id: r.parent_id, name: r.name, slug: Slug::new(r.slug)?, position: r.position }) })
            .collect()
    }

    async fn save_category(&self, category: &Category) -> Result<()> {
        sqlx::query(
            "INSERT INTO categories (id, parent_id, name, slug, position) VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (id) DO UPDATE SET parent_id = $2, name = $3, slug = $4, position = $5",
        )
        .bind(category.id).bind(category.parent_id).bind(&category.name).bind(category.slug.as_str()).bind(category.position)
        .execute(&self.db).await?;
        Ok(())
    }

    async fn products(&self) -> Result<Vec<Product>> {
        self.fetch_products(None, true, None).await
    }

    async fn product(&self, id: Uuid) -> Result<Option<Product>> {
        Ok(self.fetch_products(Some(id), false, None).await?.into_iter().next())
    }

    async fn save_product(&self, product: &Product) -> Result<()> {
        let mut tx = self.db.begin().await?;
        if let Some(discount) = &product.discount {
            sqlx::query("INSERT INTO discounts (id, name, rate) VALUES ($1, $2, $3) ON CONFLICT (id) DO UPDATE SET name = $2, rate = $3")
                .bind(discount.id).bind(&discount.name).bind(discount.rate())
                .execute(&mut *tx).await?;
        }
        sqlx::query(
            "INSERT INTO products (id, slug, name, description, price, currency, discount_id, digital, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             ON CONFLICT (id) DO UPDATE SET slug = $2, name = $3, description = $4, price = $5, currency = $6, \
                 discount_id = $7, digital = $8, status = $9, updated_at = $11",
        )
        .bind(product.id).bind(product.slug.as_str()).bind(&product.name).bind(&product.description)
        .bind(product.price.amount()).bind(product.price.currency()).bind(product.discount.as_ref().map(|d| d.id))
        .bind(product.digital).bind(product.status.as_str()).bind(product.created_at).bind(product.updated_at)
        .execute(&mut *tx).await?;

        sqlx::query("DELETE FROM product_variants WHERE product_id = $1").bind(product.id).execute(&mut *tx).await?;
        for variant in &product.variants {
            sqlx::query("INSERT INTO product_variants (id, product_id, name, price) VALUES ($1, $2, $3, $4)")
                .bind(variant.id).bind(product.id).bind(&variant.name).bind(variant.price.amount())
                .execute(&mut *tx).await?;
        }
        sqlx::query("DELETE FROM product_categories WHERE product_id = $1").bind(product.id).execute(&mut *tx).await?;
        for category_id in &product.category_ids {
            sqlx::query("INSERT INTO product_categories (product_id, category_id) VALUES ($1, $2)")
                .bind(product.id).bind(category_id)
                .execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn search_products(&self, query: &str) -> Result<Vec<Product>> {
        self.fetch_products(None, true, Some(query)).await
    }
}

#[async_trait]
impl CartStore for PgStore {
    async fn cart(&self, session_id: &str) -> Result<Option<Cart>> {
        let Some(row) = sqlx::query_as::<_, CartRow>("SELECT session_id, currency, created_at, updated_at FROM carts WHERE session_id = $1")
            .bind(session_id).fetch_optional(&self.db).await?
        else {
            return Ok(None);
        };
        let items = sqlx::query_as::<_, CartItemRow>("SELECT product_id, name, quantity, unit_price FROM cart_items WHERE session_id = $1 ORDER BY position")
            .bind(session_id).fetch_all(&self.db).await?
            .into_iter()
            .map(|i| CartItem { product_id: i.product_id, name: i.name, quantity: i.quantity.max(0) as u32, unit_price: Money::new(i.unit_price, &row.currency) })
            .collect();
        Ok(Some(Cart::restore(row.session_id, &row.currency, items, row.created_at, row.updated_at)))
    }

    async fn save_cart(&self, cart: &Cart) -> Result<()> {
        let mut tx = self.db.begin().await?;
        sqlx::query(
            "INSERT INTO carts (session_id, currency, created_at, updated_at) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (session_id) DO UPDATE SET currency = $2, updated_at = $4",
        )
        .bind(&cart.session_id).bind(cart.currency()).bind(cart.created_at()).bind(cart.updated_at())
        .execute(&mut *tx).await?;
        sqlx::query("DELETE FROM cart_items WHERE session_id = $1").bind(&cart.session_id).execute(&mut *tx).await?;
        for (position, item) in cart.items().iter().enumerate() {
            sqlx::query("INSERT INTO cart_items (session_id, product_id, name, quantity, unit_price, position) VALUES ($1, $2, $3, $4, $5, $6)")
                .bind(&cart.session_id).bind(item.product_id).bind(&item.name).bind(db_quantity(item.quantity)?)
                .bind(item.unit_price.amount()).bind(position as i32)
                .execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn delete_cart(&self, session_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM carts WHERE session_id = $1").bind(session_id).execute(&self.db).await?;
        Ok(())
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn next_order_number(&self) -> Result<i64> {
        let (number,): (i64,) = sqlx::query_as("SELECT nextval('order_numbers')").fetch_one(&self.db).await?;
        Ok(number)
    }

    async fn save_order(&self, order: &Order) -> Result<()> {
        let mut tx = self.db.begin().await?;
        sqlx::query(
            "INSERT INTO orders (id, number, currency, status, payment_price, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (id) DO UPDATE SET status = $4, payment_price = $5, updated_at = $7",
        )
        .bind(order.id()).bind(order.number()).bind(order.currency()).bind(order.status().as_str())
        .bind(order.payment_price()).bind(order.created_at()).bind(order.updated_at())
        .execute(&mut *tx).await?;

        sqlx::query("DELETE FROM delivery_groups WHERE order_id = $1").bind(order.id()).execute(&mut *tx).await?;
        for (group_position, group) in order.groups().iter().enumerate() {
            sqlx::query("INSERT INTO delivery_groups (id, order_id, kind, position) VALUES ($1, $2, $3, $4)")
                .bind(group.id).bind(order.id()).bind(group.kind.as_str()).bind(group_position as i32)
                .execute(&mut *tx).await?;
            for (position, item) in group.items.iter().enumerate() {
                sqlx::query(
                    "INSERT INTO ordered_items (id, delivery_group_id, product_id, product_name, quantity, unit_price_net, unit_price_gross, position) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
                )
                .bind(item.id).bind(group.id).bind(item.product_id).bind(&item.product_name).bind(db_quantity(item.quantity)?)
                .bind(item.unit_price_net).bind(item.unit_price_gross).bind(position as i32)
                .execute(&mut *tx).await?;
            }
        }
        tx.commit().await?;
        Ok(())
    }

    async fn order(&self, id: Uuid) -> Result<Option<Order>> {
        let Some(row) = sqlx::query_as::<_, OrderRow>("SELECT id, number, currency, status, payment_price, created_at, updated_at FROM orders WHERE id = $1")
            .bind(id).fetch_optional(&self.db).await?
        else {
            return Ok(None);
        };
        let groups = sqlx::query_as::<_, DeliveryGroupRow>("SELECT id, kind FROM delivery_groups WHERE order_id = $1 ORDER BY position")
            .bind(id).fetch_all(&self.db).await?;
        let mut items: HashMap<Uuid, Vec<OrderedItem>> = HashMap::new();
        for item in self.ordered_item_rows(id).await? {
            items.entry(item.delivery_group_id).or_default().push(item.into());
        }
        let groups = groups
            .into_iter()
            .map(|g| -> Result<DeliveryGroup> {
                let kind = DeliveryKind::parse(&g.kind).ok_or_else(|| StorefrontError::InvalidRecord(format!("delivery group {} kind {}", g.id, g.kind)))?;
                Ok(DeliveryGroup { id: g.id, kind, items: items.remove(&g.id).unwrap_or_default() })
            })
            .collect::<Result<Vec<_>>>()?;
        let status = OrderStatus::parse(&row.status).ok_or_else(|| StorefrontError::InvalidRecord(format!("order {} status {}", row.id, row.status)))?;
        Ok(Some(Order::restore(row.id, row.number, row.currency, status, groups, row.payment_price, row.created_at, row.updated_at)))
    }

    async fn ordered_items(&self, order_id: Uuid) -> Result<Vec<OrderedItem>> {
        Ok(self.ordered_item_rows(order_id).await?.into_iter().map(OrderedItem::from).collect())
    }
}

impl PgStore {
    async fn ordered_item_rows(&self, order_id: Uuid) -> Result<Vec<OrderedItemRow>> {
        Ok(sqlx::query_as::<_, OrderedItemRow>(
            "SELECT i.id, i.delivery_group_id, i.product_id, i.product_name, i.quantity, i.unit_price_net, i.unit_price_gross \
             FROM ordered_items i JOIN delivery_groups g ON g.id = i.delivery_group_id \
             WHERE g.order_id = $1 ORDER BY g.position, i.position",
        )
        .bind(order_id)
        .fetch_all(&self.db)
        .await?)
    }

    async fn load_variant(&self, row: PaymentVariantRow) -> Result<PaymentVariant> {
        let translations = sqlx::query_as::<_, TranslationRow>(
            "SELECT language, name, description FROM payment_variant_translations WHERE variant_id = $1 ORDER BY language",
        )
        .bind(row.id).fetch_all(&self.db).await?
        .into_iter()
        .map(|t| -> Result<PaymentVariantTranslation> {
            Ok(PaymentVariantTranslation { language: LanguageCode::new(t.language)?, name: t.name, description: t.description })
        })
        .collect::<Result<Vec<_>>>()?;
        let kind = match row.provider.as_str() {
            "gateway" => PaymentVariantKind::Gateway { payment_id: row.payment_id },
            "processor" => PaymentVariantKind::Processor { payment_id: row.payment_id },
            other => return Err(StorefrontError::InvalidRecord(format!("payment variant {} provider {other}", row.id))),
        };
        Ok(PaymentVariant::restore(row.id, row.order_id, row.name, row.description, row.price, translations, kind))
    }
}

const VARIANT_COLUMNS: &str = "id, order_id, name, description, price, provider, payment_id";

#[async_trait]
impl PaymentStore for PgStore {
    async fn save_variant(&self, variant: &PaymentVariant) -> Result<()> {
        let mut tx = self.db.begin().await?;
        sqlx::query("DELETE FROM payment_variants WHERE order_id = $1 AND id <> $2")
            .bind(variant.order_id).bind(variant.id).execute(&mut *tx).await?;
        sqlx::query(
            "INSERT INTO payment_variants (id, order_id, name, description, price, provider, payment_id) VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (id) DO UPDATE SET name = $3, description = $4, price = $5, provider = $6, payment_id = $7",
        )
        .bind(variant.id).bind(variant.order_id).bind(&variant.name).bind(&variant.description).bind(variant.price())
        .bind(variant.kind.provider()).bind(variant.kind.payment_id())
        .execute(&mut *tx).await?;
        sqlx::query("DELETE FROM payment_variant_translations WHERE variant_id = $1").bind(variant.id).execute(&mut *tx).await?;
        for t in variant.translations() {
            sqlx::query("INSERT INTO payment_variant_translations (variant_id, language, name, description) VALUES ($1, $2, $3, $4)")
                .bind(variant.id).bind(t.language.as_str()).bind(&t.name).bind(&t.description)
                .execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn variant(&self, id: Uuid) -> Result<Option<PaymentVariant>> {
        let row = sqlx::query_as::<_, PaymentVariantRow>(&format!("SELECT {VARIANT_COLUMNS} FROM payment_variants WHERE id = $1"))
            .bind(id).fetch_optional(&self.db).await?;
        match row { Some(row) => Ok(Some(self.load_variant(row).await?)), None => Ok(None) }
    }

    async fn variant_for_order(&self, order_id: Uuid) -> Result<Option<PaymentVariant>> {
        let row = sqlx::query_as::<_, PaymentVariantRow>(&format!("SELECT {VARIANT_COLUMNS} FROM payment_variants WHERE order_id = $1"))
            .bind(order_id).fetch_optional(&self.db).await?;
        match row { Some(row) => Ok(Some(self.load_variant(row).await?)), None => Ok(None) }
    }

    async fn save_payment(&self, payment: &Payment) -> Result<()> {
        sqlx::query(
            "INSERT INTO payments (id, order_id, provider, backend, amount, currency, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (id) DO UPDATE SET status = $7, updated_at = $9",
        )
        .bind(payment.id).bind(payment.order_id).bind(&payment.provider).bind(&payment.backend)
        .bind(payment.amount.amount()).bind(payment.amount.currency()).bind(payment.status().as_str())
        .bind(payment.created_at).bind(payment.updated_at)
        .execute(&self.db).await?;
        Ok(())
    }

    async fn payment(&self, id: Uuid) -> Result<Option<Payment>> {
        let Some(row) = sqlx::query_as::<_, PaymentRow>(
            "SELECT id, order_id, provider, backend, amount, currency, status, created_at, updated_at FROM payments WHERE id = $1",
        )
        .bind(id).fetch_optional(&self.db).await?
        else {
            return Ok(None);
        };
        let status = PaymentStatus::parse(&row.status).ok_or_else(|| StorefrontError::InvalidRecord(format!("payment {} status {}", row.id, row.status)))?;
        Ok(Some(Payment::restore(row.id, row.order_id, row.provider, row.backend, Money::new(row.amount, &row.currency), status, row.created_at, row.updated_at)))
    }
}
