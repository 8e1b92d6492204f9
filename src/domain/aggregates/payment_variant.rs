//! Payment Variant Aggregate
//!
//! The payment method chosen for an order at checkout, with optional
//! per-language copies of its name and description.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::value_objects::LanguageCode;

/// Largest price storable in a `NUMERIC(12, 4)` column.
const MAX_PRICE: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, 4); // 99_999_999.9999

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaymentVariant {
    pub id: Uuid,
    pub order_id: Uuid,
    pub name: String,
    pub description: String,
    price: Decimal,
    translations: Vec<PaymentVariantTranslation>,
    pub kind: PaymentVariantKind,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentVariantTranslation {
    pub language: LanguageCode,
    pub name: String,
    pub description: String,
}

/// Provider-specific part of a variant, pointing at the provider's payment record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum PaymentVariantKind {
    Gateway { payment_id: Uuid },
    Processor { payment_id: Uuid },
}

impl PaymentVariantKind {
    pub fn provider(&self) -> &'static str {
        match self { Self::Gateway { .. } => "gateway", Self::Processor { .. } => "processor" }
    }

    pub fn payment_id(&self) -> Uuid {
        match self { Self::Gateway { payment_id } | Self::Processor { payment_id } => *payment_id }
    }
}

impl PaymentVariant {
    pub fn create(order_id: Uuid, name: impl Into<String>, price: Decimal, kind: PaymentVariantKind) -> Result<Self, PaymentVariantError> {
        let name = name.into();
        if name.trim().is_empty() { return Err(PaymentVariantError::MissingName); }
        if name.chars().count() > 128 { return Err(PaymentVariantError::NameTooLong); }
        Ok(Self {
            id: Uuid::now_v7(), order_id, name, description: String::new(),
            price: checked_price(price)?, translations: vec![], kind,
        })
    }

    pub fn restore(id: Uuid, order_id: Uuid, name: String, description: String, price: Decimal, translations: Vec<PaymentVariantTranslation>, kind: PaymentVariantKind) -> Self {
        Self { id, order_id, name, description, price, translations, kind }
    }

    /// Unit price, at most 12 digits with 4 decimal places.
    pub fn price(&self) -> Decimal { self.price }
    pub fn translations(&self) -> &[PaymentVariantTranslation] { &self.translations }

    /// Inserts or replaces the row for the translation's language.
    pub fn set_translation(&mut self, translation: PaymentVariantTranslation) -> Result<(), PaymentVariantError> {
        if translation.name.chars().count() > 128 { return Err(PaymentVariantError::NameTooLong); }
        match self.translations.iter_mut().find(|t| t.language == translation.language) {
            Some(existing) => *existing = translation,
            None => self.translations.push(translation),
        }
        self.translations.sort_by(|a, b| a.language.cmp(&b.language));
        Ok(())
    }

    pub fn remove_translation(&mut self, language: &LanguageCode) -> bool {
        let before = self.translations.len();
        self.translations.retain(|t| &t.language != language);
        self.translations.len() != before
    }

    /// Exact language first, then its primary subtag.
    fn translation(&self, language: &LanguageCode) -> Option<&PaymentVariantTranslation> {
        self.translations.iter().find(|t| &t.language == language)
            .or_else(|| self.translations.iter().find(|t| t.language.as_str() == language.primary()))
    }

    pub fn name_in(&self, language: &LanguageCode) -> &str {
        self.translation(language).map(|t| t.name.as_str()).filter(|n| !n.is_empty()).unwrap_or(&self.name)
    }

    pub fn description_in(&self, language: &LanguageCode) -> &str {
        self.translation(language).map(|t| t.description.as_str()).filter(|d| !d.is_empty()).unwrap_or(&self.description)
    }
}

impl std::fmt::Display for PaymentVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(&self.name) }
}

impl std::fmt::Display for PaymentVariantTranslation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "{}@{}", self.name, self.language) }
}

fn checked_price(price: Decimal) -> Result<Decimal, PaymentVariantError> {
    let price = price.round_dp(4);
    if price.is_sign_negative() || price > MAX_PRICE { return Err(PaymentVariantError::PriceOutOfRange(price)); }
    Ok(price)
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PaymentVariantError {
    #[error("payment variant needs a name")]
    MissingName,
    #[error("name longer than 128 characters")]
    NameTooLong,
    #[error("price {0} does not fit 12 digits with 4 decimal places")]
    PriceOutOfRange(Decimal),
}
