//! Cart Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::value_objects::Money;

/// Per-session basket. Prices are snapshots taken when the item was added.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Cart {
    pub session_id: String,
    items: Vec<CartItem>,
    subtotal: Money,
    currency: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: Uuid,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

impl CartItem {
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

impl Cart {
    /// Largest quantity a single line may hold.
    pub const MAX_QUANTITY: u32 = 1000;

    pub fn new(session_id: impl Into<String>, currency: &str) -> Self {
        let created_at = Utc::now();
        let currency = currency.to_uppercase();
        Self { session_id: session_id.into(), items: vec![], subtotal: Money::zero(&currency), currency, created_at, updated_at: created_at }
    }

    /// Rebuilds a cart from persisted rows.
    pub fn restore(session_id: impl Into<String>, currency: &str, items: Vec<CartItem>, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> Self {
        let mut cart = Self::new(session_id, currency);
        cart.items = items;
        cart.created_at = created_at;
        cart.refresh();
        cart.updated_at = updated_at;
        cart
    }

    pub fn items(&self) -> &[CartItem] { &self.items }
    pub fn subtotal(&self) -> &Money { &self.subtotal }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn item_count(&self) -> usize { self.items.len() }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    /// Merges with an existing line for the same product.
    pub fn add_item(&mut self, item: CartItem) -> Result<(), CartError> {
        if item.quantity == 0 { return Err(CartError::InvalidQuantity); }
        if item.unit_price.currency() != self.currency {
            return Err(CartError::CurrencyMismatch(item.unit_price.currency().to_string()));
        }
        match self.position(item.product_id) {
            Some(index) => {
                let line = &mut self.items[index];
                line.quantity = checked_quantity(line.quantity.checked_add(item.quantity))?;
            }
            None => {
                checked_quantity(Some(item.quantity))?;
                self.items.push(item);
            }
        }
        self.refresh();
        Ok(())
    }

    /// Setting zero drops the line.
    pub fn update_quantity(&mut self, product_id: Uuid, quantity: u32) -> Result<(), CartError> {
        let index = self.position(product_id).ok_or(CartError::ItemNotFound(product_id))?;
        if quantity == 0 {
            self.items.remove(index);
        } else {
            self.items[index].quantity = checked_quantity(Some(quantity))?;
        }
        self.refresh();
        Ok(())
    }

    pub fn remove_item(&mut self, product_id: Uuid) -> Result<(), CartError> {
        let index = self.position(product_id).ok_or(CartError::ItemNotFound(product_id))?;
        self.items.remove(index);
        self.refresh();
        Ok(())
    }

    fn position(&self, product_id: Uuid) -> Option<usize> {
        self.items.iter().position(|line| line.product_id == product_id)
    }

    /// Lines always share the cart currency, so the sum cannot mismatch.
    fn refresh(&mut self) {
        let amount = self.items.iter().map(|line| line.line_total().amount()).sum();
        self.subtotal = Money::new(amount, &self.currency);
        self.updated_at = Utc::now();
    }
}

fn checked_quantity(quantity: Option<u32>) -> Result<u32, CartError> {
    quantity.filter(|q| *q <= Cart::MAX_QUANTITY).ok_or(CartError::QuantityTooLarge(Cart::MAX_QUANTITY))
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CartError {
    #[error("item {0} not in cart")]
    ItemNotFound(Uuid),
    #[error("invalid quantity")]
    InvalidQuantity,
    #[error("quantity cannot exceed {0}")]
    QuantityTooLarge(u32),
    #[error("item priced in {0} does not match cart currency")]
    CurrencyMismatch(String),
}
