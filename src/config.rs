use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::domain::value_objects::LanguageCode;
use crate::pricing::{BASE_HANDLER, SALE_HANDLER};

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Absent means the in-memory store.
    pub database_url: Option<String>,
    pub nats_url: Option<String>,
    pub currency: String,
    pub languages: Languages,
    /// Added on top of net prices, `0.23` for 23%.
    pub tax_rate: Decimal,
    pub pricing_handlers: Vec<String>,
    pub gateway_types: Vec<String>,
    pub processor_backends: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8083,
            database_url: None,
            nats_url: None,
            currency: "USD".into(),
            languages: Languages::default(),
            tax_rate: Decimal::ZERO,
            pricing_handlers: vec![BASE_HANDLER.into(), SALE_HANDLER.into()],
            gateway_types: vec![],
            processor_backends: vec!["dummy".into()],
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let list = |key: &str, fallback: Vec<String>| lookup(key).map(|raw| split_list(&raw)).unwrap_or(fallback);

        let tax_rate = match lookup("STOREFRONT_TAX_RATE") {
            Some(raw) => Decimal::from_str(raw.trim()).with_context(|| format!("STOREFRONT_TAX_RATE={raw}"))?,
            None => defaults.tax_rate,
        };
        if tax_rate.is_sign_negative() {
            bail!("STOREFRONT_TAX_RATE must not be negative");
        }

        let languages = match lookup("STOREFRONT_LANGUAGES") {
            Some(raw) => Languages::parse(&raw)?,
            None => defaults.languages,
        };

        Ok(Self {
            port: lookup("PORT").map(|p| p.parse()).transpose().context("PORT")?.unwrap_or(defaults.port),
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            nats_url: lookup("NATS_URL").filter(|url| !url.is_empty()),
            currency: lookup("STOREFRONT_CURRENCY").map(|c| c.trim().to_uppercase()).unwrap_or(defaults.currency),
            languages,
            tax_rate,
            pricing_handlers: list("STOREFRONT_PRICING_HANDLERS", defaults.pricing_handlers),
            gateway_types: list("STOREFRONT_GATEWAY_TYPES", defaults.gateway_types),
            processor_backends: list("STOREFRONT_PROCESSOR_BACKENDS", defaults.processor_backends),
        })
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|entry| !entry.is_empty()).map(String::from).collect()
}

/// Site languages. The first one is the default; only the others get
/// translation rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Languages {
    default: LanguageCode,
    translated: Vec<LanguageCode>,
}

impl Default for Languages {
    fn default() -> Self {
        Self {
            default: LanguageCode::from_static("en"),
            translated: vec![LanguageCode::from_static("pl"), LanguageCode::from_static("de")],
        }
    }
}

impl Languages {
    pub fn parse(raw: &str) -> Result<Self> {
        let mut codes = split_list(raw).into_iter().map(LanguageCode::new);
        let Some(default) = codes.next() else { bail!("STOREFRONT_LANGUAGES must list at least one language") };
        Ok(Self { default: default?, translated: codes.collect::<std::result::Result<_, _>>()? })
    }

    pub fn default_language(&self) -> &LanguageCode { &self.default }
    pub fn is_translatable(&self, code: &LanguageCode) -> bool { self.translated.contains(code) }

    /// Picks the best site language for an `Accept-Language` header.
    pub fn negotiate(&self, accept_language: Option<&str>) -> LanguageCode {
        let Some(header) = accept_language else { return self.default.clone() };
        let mut preferences: Vec<(Decimal, LanguageCode)> = header
            .split(',')
            .filter_map(|part| {
                let mut pieces = part.trim().split(';');
                let code = LanguageCode::new(pieces.next()?).ok()?;
                let quality = pieces
                    .find_map(|p| p.trim().strip_prefix("q="))
                    .and_then(|q| Decimal::from_str(q).ok())
                    .unwrap_or(Decimal::ONE);
                Some((quality, code))
            })
            .collect();
        // Stable sort keeps header order among equal weights.
        preferences.sort_by(|a, b| b.0.cmp(&a.0));

        let known: Vec<&LanguageCode> = std::iter::once(&self.default).chain(self.translated.iter()).collect();
        preferences
            .into_iter()
            .filter(|(quality, _)| !quality.is_zero())
            .find_map(|(_, wanted)| {
                known.iter().copied().find(|k| *k == &wanted)
                    .or_else(|| known.iter().copied().find(|k| k.as_str() == wanted.primary()))
                    .cloned()
            })
            .unwrap_or_else(|| self.default.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, 8083);
        assert!(config.database_url.is_none());
        assert_eq!(config.pricing_handlers, ["base", "sale"]);
        assert!(config.gateway_types.is_empty());
        assert_eq!(config.languages.default_language().as_str(), "en");
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("PORT", "9000"),
            ("STOREFRONT_CURRENCY", "pln"),
            ("STOREFRONT_TAX_RATE", "0.23"),
            ("STOREFRONT_GATEWAY_TYPES", "dummy, paypal ,"),
            ("STOREFRONT_LANGUAGES", "pl,en"),
        ]))
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.currency, "PLN");
        assert_eq!(config.tax_rate, dec!(0.23));
        assert_eq!(config.gateway_types, ["dummy", "paypal"]);
        assert!(config.languages.is_translatable(&LanguageCode::new("en").unwrap()));
        assert!(!config.languages.is_translatable(&LanguageCode::new("pl").unwrap()));
    }

    #[test]
    fn test_invalid_values() {
        assert!(Config::from_lookup(lookup(&[("PORT", "http")])).is_err());
        assert!(Config::from_lookup(lookup(&[("STOREFRONT_TAX_RATE", "-1")])).is_err());
        assert!(Config::from_lookup(lookup(&[("STOREFRONT_LANGUAGES", " , ")])).is_err());
    }

    #[test]
    fn test_negotiate_language() {
        let languages = Languages::default();
        assert_eq!(languages.negotiate(None).as_str(), "en");
        assert_eq!(languages.negotiate(Some("pl-PL,pl;q=0.9,en;q=0.8")).as_str(), "pl");
        assert_eq!(languages.negotiate(Some("fr;q=1, de;q=0.5")).as_str(), "de");
        assert_eq!(languages.negotiate(Some("de;q=0, fr")).as_str(), "en");
    }
}
