//! Helpers behind the sale pages.

use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::{Category, CategoryTree, Discount, Product};
use crate::pricing::{PriceRange, PriceRangeChain, PricingChain, SALE_HANDLER};
use crate::{Result, StorefrontError};

/// A category below the sale root together with its number of discounted
/// product placements, counted over its whole subtree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SaleCategory {
    pub category: Category,
    pub url: String,
    pub count: usize,
}

/// Price display for one product on the sale page.
#[derive(Clone, Debug, Serialize)]
pub struct DiscountPrice {
    pub product_id: Uuid,
    pub name: String,
    pub discount: Option<Discount>,
    pub price_range: PriceRange,
    /// Range before the sale handler ran, if the chain has one.
    pub undiscounted_price_range: Option<PriceRange>,
}

/// Range produced by the handler that runs right before the sale handler.
pub fn pre_discount_price_range(chain: &PriceRangeChain) -> Result<PriceRange> {
    let handlers: Vec<&str> = chain.handlers().collect();
    let position = handlers
        .iter()
        .position(|name| *name == SALE_HANDLER)
        .ok_or_else(|| StorefrontError::Configuration(format!("pricing chain has no {SALE_HANDLER} handler")))?;
    let previous = position
        .checked_sub(1)
        .and_then(|i| chain.get(handlers[i]))
        .ok_or_else(|| StorefrontError::Configuration(format!("no pricing handler runs before {SALE_HANDLER}")))?;
    Ok(previous.clone())
}

pub fn category_in_sale_url(tree: &CategoryTree, category_id: Uuid) -> String {
    let path = tree.slug_path(category_id);
    if path.is_empty() {
        return "/sale/".to_string();
    }
    format!("/sale/{}/", path.join("/"))
}

pub fn category_url(tree: &CategoryTree, category_id: Uuid) -> String {
    format!("/products/{}/", tree.slug_path(category_id).join("/"))
}

/// Strict descendants of `category_id` that hold discounted products.
///
/// A product placed in several categories of one subtree counts once per
/// placement.
pub fn subcategories_in_sale(tree: &CategoryTree, category_id: Uuid, products: &[Product]) -> Vec<SaleCategory> {
    let placements = sale_placements(products);
    tree.descendants(category_id).into_iter().filter_map(|c| sale_entry(tree, c, &placements)).collect()
}

/// Top-level categories holding discounted products, counted the same way.
pub fn root_categories_in_sale(tree: &CategoryTree, products: &[Product]) -> Vec<SaleCategory> {
    let placements = sale_placements(products);
    tree.roots().filter_map(|c| sale_entry(tree, c, &placements)).collect()
}

fn sale_placements(products: &[Product]) -> Vec<Uuid> {
    products.iter().filter(|p| p.is_on_sale()).flat_map(|p| p.category_ids.iter().copied()).collect()
}

fn sale_entry(tree: &CategoryTree, category: &Category, placements: &[Uuid]) -> Option<SaleCategory> {
    let count = placements.iter().filter(|placed| tree.is_in_subtree(category.id, **placed)).count();
    (count > 0).then(|| SaleCategory { category: category.clone(), url: category_in_sale_url(tree, category.id), count })
}

/// Discounted products, limited to a category subtree when one is given.
pub fn products_in_sale<'a>(tree: &CategoryTree, category_id: Option<Uuid>, products: &'a [Product]) -> Vec<&'a Product> {
    products
        .iter()
        .filter(|p| p.is_on_sale())
        .filter(|p| match category_id {
            Some(root) => p.category_ids.iter().any(|c| tree.is_in_subtree(root, *c)),
            None => true,
        })
        .collect()
}

pub fn product_url(product: &Product) -> String {
    format!("/products/+{}-{}/", product.id, product.slug.as_str())
}

/// Product URL nested under the first of the product's categories that lies
/// inside `category_id`'s subtree.
pub fn product_in_category_tree_url(tree: &CategoryTree, product: &Product, category_id: Option<Uuid>) -> String {
    let scoped = category_id.and_then(|root| product.category_ids.iter().copied().find(|c| tree.is_in_subtree(root, *c)));
    match scoped {
        Some(category) => format!("/products/{}/+{}/", tree.slug_path(category).join("/"), product.slug.as_str()),
        None => product_url(product),
    }
}

pub fn discount_price(chain: &PricingChain, product: &Product) -> DiscountPrice {
    let ranges = chain.price_range_chain(product);
    DiscountPrice {
        product_id: product.id,
        name: product.name.clone(),
        discount: product.discount.clone(),
        price_range: chain.price_range(product),
        undiscounted_price_range: pre_discount_price_range(&ranges).ok(),
    }
}

/// Resolves `a/b/c` against the tree; an empty path means no category.
pub fn resolve_category_path<'a>(tree: &'a CategoryTree, path: &str) -> Result<Option<&'a Category>> {
    let slugs: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if slugs.is_empty() {
        return Ok(None);
    }
    tree.find_by_path(&slugs).map(Some).ok_or_else(|| StorefrontError::CategoryNotFound(path.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::category::tests::category;
    use crate::domain::value_objects::{Money, Slug};
    use rust_decimal_macros::dec;

    struct Fixture {
        tree: CategoryTree,
        shoes: Category,
        boots: Category,
        hiking: Category,
        sandals: Category,
        hats: Category,
    }

    fn fixture() -> Fixture {
        let shoes = category("Shoes", None);
        let boots = category("Boots", Some(&shoes));
        let hiking = category("Hiking", Some(&boots));
        let sandals = category("Sandals", Some(&shoes));
        let mut hats = category("Hats", None);
        hats.position = 1;
        let tree = CategoryTree::build(vec![shoes.clone(), boots.clone(), hiking.clone(), sandals.clone(), hats.clone()]).unwrap();
        Fixture { tree, shoes, boots, hiking, sandals, hats }
    }

    fn product(name: &str, categories: &[&Category], rate: Option<rust_decimal::Decimal>) -> Product {
        let mut p = Product::create(Slug::slugify(name).unwrap(), name, Money::new(dec!(100), "USD"));
        for c in categories {
            p.assign_category(c.id);
        }
        p.set_discount(rate.map(|r| Discount::new("Sale", r).unwrap()));
        p
    }

    #[test]
    fn test_pre_discount_range() {
        let p = product("Boots", &[], Some(dec!(20)));
        let ranges = PricingChain::from_names(&["base", "sale"]).unwrap().price_range_chain(&p);
        assert_eq!(pre_discount_price_range(&ranges).unwrap().min.amount(), dec!(100));

        let no_sale = PricingChain::from_names(&["base"]).unwrap().price_range_chain(&p);
        assert!(pre_discount_price_range(&no_sale).is_err());
        let sale_first = PricingChain::from_names(&["sale", "base"]).unwrap().price_range_chain(&p);
        assert!(pre_discount_price_range(&sale_first).is_err());
    }

    #[test]
    fn test_sale_urls() {
        let f = fixture();
        assert_eq!(category_in_sale_url(&f.tree, f.hiking.id), "/sale/shoes/boots/hiking/");
        assert_eq!(category_in_sale_url(&f.tree, f.hats.id), "/sale/hats/");
        assert_eq!(category_url(&f.tree, f.boots.id), "/products/shoes/boots/");
    }

    #[test]
    fn test_subcategory_counts() {
        let f = fixture();
        let products = vec![
            product("Trail", &[&f.hiking], Some(dec!(10))),
            product("Summit", &[&f.hiking, &f.boots], Some(dec!(10))),
            product("Flip", &[&f.sandals], None),
            product("Cap", &[&f.hats], Some(dec!(10))),
        ];
        let below_shoes = subcategories_in_sale(&f.tree, f.shoes.id, &products);
        let counts: Vec<(&str, usize)> = below_shoes.iter().map(|s| (s.category.name.as_str(), s.count)).collect();
        // Sandals has nothing discounted; Hats is another tree.
        assert_eq!(counts, [("Boots", 3), ("Hiking", 2)]);

        let top_level = root_categories_in_sale(&f.tree, &products);
        let roots: Vec<(&str, usize)> = top_level.iter().map(|s| (s.category.name.as_str(), s.count)).collect();
        assert_eq!(roots, [("Shoes", 3), ("Hats", 1)]);
    }

    #[test]
    fn test_counts_grow_toward_root() {
        let f = fixture();
        let products = vec![
            product("Trail", &[&f.hiking], Some(dec!(10))),
            product("Strap", &[&f.sandals, &f.boots], Some(dec!(5))),
        ];
        let root = f.tree.roots().next().unwrap().id;
        let sale = subcategories_in_sale(&f.tree, root, &products);
        for entry in &sale {
            if let Some(parent) = entry.category.parent_id.and_then(|id| sale.iter().find(|s| s.category.id == id)) {
                assert!(parent.count >= entry.count);
            }
            assert!(entry.count > 0);
        }
    }

    #[test]
    fn test_product_urls() {
        let f = fixture();
        let p = product("Trail Runner", &[&f.sandals, &f.hiking], None);
        assert_eq!(product_url(&p), format!("/products/+{}-trail-runner/", p.id));
        assert_eq!(product_in_category_tree_url(&f.tree, &p, None), product_url(&p));
        assert_eq!(product_in_category_tree_url(&f.tree, &p, Some(f.boots.id)), "/products/shoes/boots/hiking/+trail-runner/");
        assert_eq!(product_in_category_tree_url(&f.tree, &p, Some(f.shoes.id)), "/products/shoes/sandals/+trail-runner/");
        assert_eq!(product_in_category_tree_url(&f.tree, &p, Some(f.hats.id)), product_url(&p));
    }

    #[test]
    fn test_products_in_sale_scoped() {
        let f = fixture();
        let products = vec![
            product("Trail", &[&f.hiking], Some(dec!(10))),
            product("Cap", &[&f.hats], Some(dec!(10))),
            product("Flip", &[&f.sandals], None),
        ];
        assert_eq!(products_in_sale(&f.tree, None, &products).len(), 2);
        let scoped = products_in_sale(&f.tree, Some(f.shoes.id), &products);
        assert_eq!(scoped.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(), ["Trail"]);
        assert!(resolve_category_path(&f.tree, "shoes/nope").is_err());
        assert_eq!(resolve_category_path(&f.tree, "/shoes/boots/").unwrap().map(|c| c.id), Some(f.boots.id));
    }

    #[test]
    fn test_discount_price_context() {
        let p = product("Trail", &[], Some(dec!(25)));
        let chain = PricingChain::from_names(&["base", "sale"]).unwrap();
        let price = discount_price(&chain, &p);
        assert_eq!(price.price_range.min.amount(), dec!(75.00));
        assert_eq!(price.undiscounted_price_range.map(|r| r.min.amount()), Some(dec!(100)));
    }
}
