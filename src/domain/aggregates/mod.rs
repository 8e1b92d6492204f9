//! Aggregates module
pub mod cart;
pub mod category;
pub mod order;
pub mod payment;
pub mod payment_variant;
pub mod product;

pub use cart::{Cart, CartError, CartItem};
pub use category::{Category, CategoryError, CategoryTree, TreeNode};
pub use order::{DeliveryGroup, DeliveryKind, Order, OrderError, OrderStatus, OrderedItem};
pub use payment::{Payment, PaymentError, PaymentStatus};
pub use payment_variant::{PaymentVariant, PaymentVariantError, PaymentVariantKind, PaymentVariantTranslation};
pub use product::{Discount, Product, ProductError, ProductStatus, Variant};
