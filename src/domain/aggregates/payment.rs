//! Provider-side payment record.
//!
//! Created by a payment provider when a variant is selected; its status is
//! driven by notifications from the gateway or processor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::events::{DomainEvent, PaymentEvent};
use crate::domain::value_objects::Money;

#[derive(Clone, Debug, Serialize)]
pub struct Payment {
    pub id: Uuid,
    pub order_id: Uuid,
    /// `gateway` or `processor`.
    pub provider: String,
    /// Payment type or processor backend the customer picked.
    pub backend: String,
    pub amount: Money,
    status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    New,
    InProgress,
    Paid,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::InProgress => "in_progress",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Settled payments never change status again.
    pub fn is_final(&self) -> bool { matches!(self, Self::Paid | Self::Failed | Self::Cancelled) }

    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "new" => Self::New,
            "in_progress" => Self::InProgress,
            "paid" => Self::Paid,
            "failed" => Self::Failed,
            "cancelled" => Self::Cancelled,
            _ => return None,
        })
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

impl Payment {
    pub fn create(order_id: Uuid, provider: &str, backend: impl Into<String>, amount: Money) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(), order_id, provider: provider.to_string(), backend: backend.into(), amount,
            status: PaymentStatus::New, created_at: now, updated_at: now, events: vec![],
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn restore(id: Uuid, order_id: Uuid, provider: String, backend: String, amount: Money, status: PaymentStatus, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> Self {
        Self { id, order_id, provider, backend, amount, status, created_at, updated_at, events: vec![] }
    }

    pub fn status(&self) -> PaymentStatus { self.status }

    /// Returns the previous status. Repeating the current status is a no-op.
    pub fn set_status(&mut self, status: PaymentStatus) -> Result<PaymentStatus, PaymentError> {
        if self.status == status { return Ok(status); }
        if self.status.is_final() || status == PaymentStatus::New {
            return Err(PaymentError::InvalidTransition { from: self.status, to: status });
        }
        let old = std::mem::replace(&mut self.status, status);
        self.updated_at = Utc::now();
        self.events.push(DomainEvent::Payment(PaymentEvent::StatusChanged {
            payment_id: self.id,
            from: old.as_str().to_string(),
            to: status.as_str().to_string(),
        }));
        Ok(old)
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PaymentError {
    #[error("cannot move payment from {from} to {to}")]
    InvalidTransition { from: PaymentStatus, to: PaymentStatus },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_status_change_records_event_once() {
        let mut payment = Payment::create(Uuid::new_v4(), "processor", "dummy", Money::new(dec!(10), "USD"));
        assert_eq!(payment.set_status(PaymentStatus::Paid), Ok(PaymentStatus::New));
        assert_eq!(payment.set_status(PaymentStatus::Paid), Ok(PaymentStatus::Paid));
        assert_eq!(payment.take_events().len(), 1);
        assert_eq!(PaymentStatus::parse("in_progress"), Some(PaymentStatus::InProgress));
    }

    #[test]
    fn test_settled_payment_keeps_its_status() {
        let mut payment = Payment::create(Uuid::new_v4(), "processor", "dummy", Money::new(dec!(10), "USD"));
        payment.set_status(PaymentStatus::InProgress).unwrap();
        assert!(payment.set_status(PaymentStatus::New).is_err());
        payment.set_status(PaymentStatus::Paid).unwrap();

        for status in [PaymentStatus::New, PaymentStatus::InProgress, PaymentStatus::Failed, PaymentStatus::Cancelled] {
            assert_eq!(
                payment.set_status(status),
                Err(PaymentError::InvalidTransition { from: PaymentStatus::Paid, to: status })
            );
        }
        assert_eq!(payment.status(), PaymentStatus::Paid);
        assert_eq!(payment.take_events().len(), 2);
    }
}
