//! Product Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::value_objects::{Money, Slug};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub slug: Slug,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub variants: Vec<Variant>,
    pub category_ids: Vec<Uuid>,
    pub discount: Option<Discount>,
    /// Digital goods are delivered without shipping.
    pub digital: bool,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Variant { pub id: Uuid, pub name: String, pub price: Money }

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus { #[default] Draft, Active, Archived }

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Draft => "draft", Self::Active => "active", Self::Archived => "archived" }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value { "draft" => Some(Self::Draft), "active" => Some(Self::Active), "archived" => Some(Self::Archived), _ => None }
    }
}

/// Percentage discount attached to products on sale.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discount {
    pub id: Uuid,
    pub name: String,
    rate: Decimal,
}

impl Discount {
    pub fn new(name: impl Into<String>, rate: Decimal) -> Result<Self, ProductError> {
        Self::restore(Uuid::now_v7(), name, rate)
    }

    pub fn restore(id: Uuid, name: impl Into<String>, rate: Decimal) -> Result<Self, ProductError> {
        if rate <= Decimal::ZERO || rate > Decimal::ONE_HUNDRED { return Err(ProductError::InvalidDiscountRate(rate)); }
        Ok(Self { id, name: name.into(), rate })
    }

    /// Percentage, `0 < rate <= 100`.
    pub fn rate(&self) -> Decimal { self.rate }

    pub fn apply(&self, price: &Money) -> Money {
        price.scale((Decimal::ONE_HUNDRED - self.rate) / Decimal::ONE_HUNDRED)
    }
}

impl Product {
    pub fn create(slug: Slug, name: impl Into<String>, price: Money) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(), slug, name: name.into(), description: String::new(), price,
            variants: vec![], category_ids: vec![], discount: None, digital: false,
            status: ProductStatus::Draft, created_at: now, updated_at: now,
        }
    }

    pub fn is_on_sale(&self) -> bool { self.discount.is_some() }
    pub fn is_active(&self) -> bool { self.status == ProductStatus::Active }

    pub fn publish(&mut self) -> Result<(), ProductError> {
        if self.name.is_empty() { return Err(ProductError::MissingName); }
        self.status = ProductStatus::Active;
        self.touch();
        Ok(())
    }

    pub fn add_variant(&mut self, name: impl Into<String>, price: Money) -> Result<Uuid, ProductError> {
        if price.currency() != self.price.currency() {
            return Err(ProductError::CurrencyMismatch(price.currency().to_string()));
        }
        let id = Uuid::now_v7();
        self.variants.push(Variant { id, name: name.into(), price });
        self.touch();
        Ok(id)
    }

    pub fn assign_category(&mut self, category_id: Uuid) {
        if !self.category_ids.contains(&category_id) {
            self.category_ids.push(category_id);
            self.touch();
        }
    }

    pub fn set_discount(&mut self, discount: Option<Discount>) { self.discount = discount; self.touch(); }

    /// Every price a customer might pay before any discount: the base price and each variant's.
    pub fn candidate_prices(&self) -> impl Iterator<Item = &Money> + '_ {
        std::iter::once(&self.price).chain(self.variants.iter().map(|v| &v.price))
    }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProductError {
    #[error("missing name")]
    MissingName,
    #[error("discount rate {0} outside (0, 100]")]
    InvalidDiscountRate(Decimal),
    #[error("variant currency {0} differs from product currency")]
    CurrencyMismatch(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_product_create() {
        let mut p = Product::create(Slug::new("test-product").unwrap(), "Test Product", Money::new(dec!(19.99), "USD"));
        assert_eq!(p.status, ProductStatus::Draft);
        p.publish().unwrap();
        assert!(p.is_active());
    }

    #[test]
    fn test_variants_share_currency() {
        let mut p = Product::create(Slug::new("shirt").unwrap(), "Shirt", Money::new(dec!(10), "USD"));
        p.add_variant("XL", Money::new(dec!(12), "USD")).unwrap();
        assert!(p.add_variant("XS", Money::new(dec!(9), "EUR")).is_err());
        assert_eq!(p.candidate_prices().count(), 2);
    }

    #[test]
    fn test_discount() {
        assert!(Discount::new("Free", dec!(0)).is_err());
        assert!(Discount::new("Too much", dec!(101)).is_err());
        let d = Discount::new("Summer", dec!(25)).unwrap();
        assert_eq!(d.apply(&Money::new(dec!(40), "USD")).amount(), dec!(30.00));
    }
}
