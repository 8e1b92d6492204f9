//! Value Objects for the storefront

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// URL slug value object
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Slug(String);

impl Slug {
    pub fn new(value: impl Into<String>) -> Result<Self, SlugError> {
        let value = value.into().trim().to_lowercase();
        if value.is_empty() { return Err(SlugError::Empty); }
        if value.len() > 128 { return Err(SlugError::TooLong); }
        if !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(SlugError::InvalidCharacter);
        }
        Ok(Self(value))
    }

    /// Builds a slug out of free text, e.g. a category name.
    pub fn slugify(text: &str) -> Result<Self, SlugError> {
        let raw: String = text
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect();
        let collapsed = raw.split('-').filter(|part| !part.is_empty()).collect::<Vec<_>>().join("-");
        Self::new(collapsed)
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl TryFrom<String> for Slug {
    type Error = SlugError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Slug> for String {
    fn from(slug: Slug) -> Self { slug.0 }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug empty")]
    Empty,
    #[error("slug too long")]
    TooLong,
    #[error("slug contains an invalid character")]
    InvalidCharacter,
}

/// Language code of a translation row, e.g. `pl` or `pt-br`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LanguageCode(String);

impl LanguageCode {
    pub const MAX_LEN: usize = 5;

    pub fn new(value: impl Into<String>) -> Result<Self, LanguageCodeError> {
        let value = value.into().trim().to_lowercase();
        if value.is_empty() { return Err(LanguageCodeError::Empty); }
        if value.len() > Self::MAX_LEN { return Err(LanguageCodeError::TooLong(value)); }
        Ok(Self(value))
    }

    /// For codes known to be valid at compile time.
    pub(crate) fn from_static(value: &'static str) -> Self { Self(value.to_string()) }

    pub fn as_str(&self) -> &str { &self.0 }

    /// Primary subtag, `pt` for `pt-br`.
    pub fn primary(&self) -> &str { self.0.split('-').next().unwrap_or(&self.0) }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl TryFrom<String> for LanguageCode {
    type Error = LanguageCodeError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<LanguageCode> for String {
    fn from(code: LanguageCode) -> Self { code.0 }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LanguageCodeError {
    #[error("language code empty")]
    Empty,
    #[error("language code {0} longer than 5 characters")]
    TooLong(String),
}

/// Money value object
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money { amount: Decimal, currency: String }

impl Money {
    pub fn new(amount: Decimal, currency: &str) -> Self { Self { amount, currency: currency.to_uppercase() } }
    pub fn zero(currency: &str) -> Self { Self::new(Decimal::ZERO, currency) }
    pub fn amount(&self) -> Decimal { self.amount }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn add(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch { left: self.currency.clone(), right: other.currency.clone() });
        }
        Ok(Money::new(self.amount + other.amount, &self.currency))
    }
    pub fn multiply(&self, qty: u32) -> Money { Money::new(self.amount * Decimal::from(qty), &self.currency) }

    /// Applies a multiplier and rounds to the currency's 2 decimal places.
    pub fn scale(&self, factor: Decimal) -> Money { Money::new((self.amount * factor).round_dp(2), &self.currency) }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{} {}", self.amount, self.currency) }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("currency mismatch: {left} vs {right}")]
    CurrencyMismatch { left: String, right: String },
}
