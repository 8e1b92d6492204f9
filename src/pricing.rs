//! Pricing handler chain.
//!
//! Handlers run in configured order; each receives the range produced by the
//! previous one. The chain keeps every intermediate range so views can show
//! e.g. the price before the sale handler ran.

use serde::Serialize;

use crate::domain::aggregates::Product;
use crate::domain::value_objects::Money;
use crate::{Result, StorefrontError};

pub const BASE_HANDLER: &str = "base";
pub const SALE_HANDLER: &str = "sale";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PriceRange { pub min: Money, pub max: Money }

impl PriceRange {
    pub fn single(price: Money) -> Self { Self { min: price.clone(), max: price } }
}

pub trait PricingHandler: Send + Sync {
    fn name(&self) -> &'static str;
    fn price_range(&self, product: &Product, previous: Option<PriceRange>) -> PriceRange;
}

/// Cheapest and most expensive of the product's base and variant prices.
pub struct BasePricing;

impl PricingHandler for BasePricing {
    fn name(&self) -> &'static str { BASE_HANDLER }

    fn price_range(&self, product: &Product, _previous: Option<PriceRange>) -> PriceRange {
        let mut prices = product.candidate_prices();
        let first = prices.next().unwrap_or(&product.price);
        let (min, max) = prices.fold((first, first), |(min, max), p| {
            (if p.amount() < min.amount() { p } else { min }, if p.amount() > max.amount() { p } else { max })
        });
        PriceRange { min: min.clone(), max: max.clone() }
    }
}

/// Applies the product's discount to whatever range it is handed.
pub struct SalePricing;

impl PricingHandler for SalePricing {
    fn name(&self) -> &'static str { SALE_HANDLER }

    fn price_range(&self, product: &Product, previous: Option<PriceRange>) -> PriceRange {
        let range = previous.unwrap_or_else(|| BasePricing.price_range(product, None));
        match &product.discount {
            Some(discount) => PriceRange { min: discount.apply(&range.min), max: discount.apply(&range.max) },
            None => range,
        }
    }
}

/// Ranges keyed by the handler that produced them, in chain order.
#[derive(Clone, Debug, Default, Serialize)]
pub struct PriceRangeChain(Vec<(String, PriceRange)>);

impl PriceRangeChain {
    pub fn get(&self, handler: &str) -> Option<&PriceRange> {
        self.0.iter().find(|(name, _)| name == handler).map(|(_, range)| range)
    }

    pub fn last(&self) -> Option<&PriceRange> { self.0.last().map(|(_, range)| range) }
    pub fn handlers(&self) -> impl Iterator<Item = &str> + '_ { self.0.iter().map(|(name, _)| name.as_str()) }
}

impl FromIterator<(String, PriceRange)> for PriceRangeChain {
    fn from_iter<I: IntoIterator<Item = (String, PriceRange)>>(iter: I) -> Self { Self(iter.into_iter().collect()) }
}

pub struct PricingChain {
    handlers: Vec<Box<dyn PricingHandler>>,
}

impl PricingChain {
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        let handlers = names
            .iter()
            .map(|name| match name.as_ref() {
                BASE_HANDLER => Ok(Box::new(BasePricing) as Box<dyn PricingHandler>),
                SALE_HANDLER => Ok(Box::new(SalePricing) as Box<dyn PricingHandler>),
                other => Err(StorefrontError::Configuration(format!("unknown pricing handler {other}"))),
            })
            .collect::<Result<Vec<_>>>()?;
        if handlers.is_empty() {
            return Err(StorefrontError::Configuration("pricing chain needs at least one handler".into()));
        }
        Ok(Self { handlers })
    }

    pub fn price_range_chain(&self, product: &Product) -> PriceRangeChain {
        let mut previous = None;
        let mut chain = Vec::with_capacity(self.handlers.len());
        for handler in &self.handlers {
            let range = handler.price_range(product, previous.take());
            chain.push((handler.name().to_string(), range.clone()));
            previous = Some(range);
        }
        PriceRangeChain(chain)
    }

    /// Range after the last handler.
    pub fn price_range(&self, product: &Product) -> PriceRange {
        self.price_range_chain(product).last().cloned().unwrap_or_else(|| PriceRange::single(product.price.clone()))
    }

    /// Unit price charged at checkout: the cheapest end of the final range.
    pub fn unit_price(&self, product: &Product) -> Money { self.price_range(product).min }
}
