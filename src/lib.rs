//! Storefront
//!
//! Catalog, cart, checkout and order handling with pluggable payment providers.
//!
//! ## Features
//! - Product catalog with a nested-set category tree
//! - Pricing handler chain with percentage sales
//! - Shopping cart and checkout into delivery groups
//! - Order status machine driven by payment notifications
//! - Payment variants with per-language translations
//! - Generic payment gateway bridge and a regional payment processor

use thiserror::Error;
use uuid::Uuid;

pub mod checkout;
pub mod config;
pub mod domain;
pub mod payment;
pub mod pricing;
pub mod routes;
pub mod sale;
pub mod store;

use domain::aggregates::{CartError, CategoryError, OrderError, PaymentError, PaymentVariantError, ProductError};
use domain::value_objects::{LanguageCodeError, MoneyError, SlugError};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum StorefrontError {
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Category not found: {0}")]
    CategoryNotFound(String),

    #[error("Order not found: {0}")]
    OrderNotFound(Uuid),

    #[error("Payment variant not found: {0}")]
    PaymentVariantNotFound(Uuid),

    #[error("Payment not found: {0}")]
    PaymentNotFound(Uuid),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Payment error: {0}")]
    Payment(String),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Category(#[from] CategoryError),

    #[error(transparent)]
    Product(#[from] ProductError),

    #[error(transparent)]
    PaymentStatus(#[from] PaymentError),

    #[error(transparent)]
    PaymentVariant(#[from] PaymentVariantError),

    #[error(transparent)]
    Money(#[from] MoneyError),

    #[error(transparent)]
    Language(#[from] LanguageCodeError),

    #[error(transparent)]
    Slug(#[from] SlugError),

    #[error("Stored record invalid: {0}")]
    InvalidRecord(String),

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, StorefrontError>;
