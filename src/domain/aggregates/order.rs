//! Order Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::value_objects::Money;

#[derive(Clone, Debug, Serialize)]
pub struct Order {
    id: Uuid,
    number: i64,
    currency: String,
    status: OrderStatus,
    groups: Vec<DeliveryGroup>,
    /// Price of the selected payment variant, zero until one is chosen.
    payment_price: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

/// Partition of an order's items that is fulfilled together.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeliveryGroup { pub id: Uuid, pub kind: DeliveryKind, pub items: Vec<OrderedItem> }

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryKind { Shipping, Digital }

impl DeliveryKind {
    pub fn as_str(&self) -> &'static str { match self { Self::Shipping => "shipping", Self::Digital => "digital" } }
    pub fn parse(value: &str) -> Option<Self> {
        match value { "shipping" => Some(Self::Shipping), "digital" => Some(Self::Digital), _ => None }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderedItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price_net: Decimal,
    pub unit_price_gross: Decimal,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderStatus {
    #[default]
    Checkout,
    PaymentPending,
    PaymentComplete,
    PaymentFailed,
    Delivery,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Checkout => "checkout",
            Self::PaymentPending => "payment-pending",
            Self::PaymentComplete => "payment-complete",
            Self::PaymentFailed => "payment-failed",
            Self::Delivery => "delivery",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "checkout" => Self::Checkout,
            "payment-pending" => Self::PaymentPending,
            "payment-complete" => Self::PaymentComplete,
            "payment-failed" => Self::PaymentFailed,
            "delivery" => Self::Delivery,
            "completed" => Self::Completed,
            "cancelled" => Self::Cancelled,
            _ => return None,
        })
    }

    pub fn is_final(&self) -> bool { matches!(self, Self::Completed | Self::Cancelled) }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

impl Order {
    pub fn create(number: i64, currency: &str, groups: Vec<DeliveryGroup>) -> Result<Self, OrderError> {
        if groups.iter().all(|g| g.items.is_empty()) { return Err(OrderError::NoItems); }
        let now = Utc::now();
        let mut order = Self {
            id: Uuid::now_v7(), number, currency: currency.to_uppercase(), status: OrderStatus::Checkout,
            groups: groups.into_iter().filter(|g| !g.items.is_empty()).collect(),
            payment_price: Decimal::ZERO, created_at: now, updated_at: now, events: vec![],
        };
        order.raise_event(DomainEvent::Order(OrderEvent::Created { order_id: order.id, total: order.total().amount(), currency: order.currency.clone() }));
        Ok(order)
    }

    /// Rebuilds an order from persisted rows without raising events.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(id: Uuid, number: i64, currency: String, status: OrderStatus, groups: Vec<DeliveryGroup>, payment_price: Decimal, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> Self {
        Self { id, number, currency, status, groups, payment_price, created_at, updated_at, events: vec![] }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn number(&self) -> i64 { self.number }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn groups(&self) -> &[DeliveryGroup] { &self.groups }
    pub fn payment_price(&self) -> Decimal { self.payment_price }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    /// Every ordered item across all delivery groups.
    pub fn ordered_items(&self) -> impl Iterator<Item = &OrderedItem> + '_ {
        self.groups.iter().flat_map(|g| g.items.iter())
    }

    pub fn subtotal(&self) -> Money {
        let amount = self.ordered_items().map(|i| i.unit_price_gross * Decimal::from(i.quantity)).sum();
        Money::new(amount, &self.currency)
    }

    /// Gross total including the payment variant's price.
    pub fn total(&self) -> Money {
        Money::new(self.subtotal().amount() + self.payment_price, &self.currency)
    }

    /// Returns whether the status actually changed.
    pub fn set_status(&mut self, status: OrderStatus) -> Result<bool, OrderError> {
        if self.status == status { return Ok(false); }
        if self.status.is_final() { return Err(OrderError::InvalidTransition { from: self.status, to: status }); }
        let from = std::mem::replace(&mut self.status, status);
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::StatusChanged { order_id: self.id, from, to: status }));
        Ok(true)
    }

    pub fn set_payment_price(&mut self, price: Decimal) { self.payment_price = price; self.touch(); }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrderError {
    #[error("order has no items")]
    NoItems,
    #[error("cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
}
