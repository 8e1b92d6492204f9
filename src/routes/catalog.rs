//! Catalog, sale and search pages.

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AppState;
use crate::domain::aggregates::{Category, CategoryTree, Discount, Product, Variant};
use crate::pricing::{PriceRange, PriceRangeChain};
use crate::sale::{self, DiscountPrice, SaleCategory};
use crate::{Result, StorefrontError};

#[derive(Debug, Serialize)]
pub struct CategoryLink {
    pub id: Uuid,
    pub name: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct ProductSummary {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub url: String,
    pub digital: bool,
    pub discount: Option<Discount>,
    pub price_range: PriceRange,
}

#[derive(Debug, Serialize)]
pub struct CatalogPage {
    pub category: Option<CategoryLink>,
    pub subcategories: Vec<CategoryLink>,
    pub products: Vec<ProductSummary>,
}

#[derive(Debug, Serialize)]
pub struct ProductPage {
    #[serde(flatten)]
    pub summary: ProductSummary,
    pub description: String,
    pub variants: Vec<Variant>,
    pub categories: Vec<CategoryLink>,
    pub price_ranges: PriceRangeChain,
}

#[derive(Debug, Serialize)]
pub struct SaleProduct {
    #[serde(flatten)]
    pub price: DiscountPrice,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct SalePage {
    pub category: Option<CategoryLink>,
    pub subcategories: Vec<SaleCategory>,
    pub products: Vec<SaleProduct>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SearchPage {
    pub query: String,
    pub results: Vec<ProductSummary>,
}

async fn load_catalog(state: &AppState) -> Result<(CategoryTree, Vec<Product>)> {
    let tree = CategoryTree::build(state.store.categories().await?)?;
    let products = state.store.products().await?;
    Ok((tree, products))
}

fn category_link(tree: &CategoryTree, category: &Category) -> CategoryLink {
    CategoryLink { id: category.id, name: category.name.clone(), url: sale::category_url(tree, category.id) }
}

fn summary(state: &AppState, tree: &CategoryTree, product: &Product, scope: Option<Uuid>) -> ProductSummary {
    ProductSummary {
        id: product.id,
        name: product.name.clone(),
        slug: product.slug.as_str().to_string(),
        url: sale::product_in_category_tree_url(tree, product, scope),
        digital: product.digital,
        discount: product.discount.clone(),
        price_range: state.pricing.price_range(product),
    }
}

fn catalog_page(state: &AppState, tree: &CategoryTree, products: &[Product], category: Option<&Category>) -> CatalogPage {
    let scope = category.map(|c| c.id);
    let subcategories = match category {
        Some(c) => tree.children(c.id).map(|child| category_link(tree, child)).collect(),
        None => tree.roots().map(|root| category_link(tree, root)).collect(),
    };
    let products = products
        .iter()
        .filter(|p| match scope {
            Some(root) => p.category_ids.iter().any(|c| tree.is_in_subtree(root, *c)),
            None => true,
        })
        .map(|p| summary(state, tree, p, scope))
        .collect();
    CatalogPage { category: category.map(|c| category_link(tree, c)), subcategories, products }
}

pub async fn index(State(state): State<AppState>) -> Result<Json<CatalogPage>> {
    let (tree, products) = load_catalog(&state).await?;
    Ok(Json(catalog_page(&state, &tree, &products, None)))
}

/// The product reference in the last path segment.
#[derive(Debug, PartialEq, Eq)]
enum ProductRef<'a> {
    Id(Uuid),
    Slug(&'a str),
}

/// `+{id}-{slug}` or `+{slug}`.
fn parse_product_segment(segment: &str) -> Option<ProductRef<'_>> {
    let rest = segment.strip_prefix('+')?;
    if let Some(id) = rest.get(..36).and_then(|head| Uuid::parse_str(head).ok()) {
        let tail = &rest[36..];
        if tail.is_empty() || tail.starts_with('-') {
            return Some(ProductRef::Id(id));
        }
    }
    (!rest.is_empty()).then_some(ProductRef::Slug(rest))
}

/// Category listing, or product detail when the last segment starts with `+`.
pub async fn browse(State(state): State<AppState>, Path(path): Path<String>) -> Result<Response> {
    let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let (tree, products) = load_catalog(&state).await?;

    let product_ref = segments.last().copied().and_then(parse_product_segment);
    let Some(product_ref) = product_ref else {
        let category = tree.find_by_path(&segments).ok_or_else(|| StorefrontError::CategoryNotFound(path.clone()))?;
        return Ok(Json(catalog_page(&state, &tree, &products, Some(category))).into_response());
    };
    segments.pop();

    let category = if segments.is_empty() {
        None
    } else {
        Some(tree.find_by_path(&segments).ok_or_else(|| StorefrontError::CategoryNotFound(path.clone()))?)
    };
    let product = products
        .iter()
        .find(|p| match (&product_ref, category) {
            (ProductRef::Id(id), _) => p.id == *id,
            (ProductRef::Slug(slug), Some(c)) => p.slug.as_str() == *slug && p.category_ids.contains(&c.id),
            (ProductRef::Slug(slug), None) => p.slug.as_str() == *slug,
        })
        .ok_or_else(|| StorefrontError::ProductNotFound(path.clone()))?;

    let page = ProductPage {
        summary: summary(&state, &tree, product, category.map(|c| c.id)),
        description: product.description.clone(),
        variants: product.variants.clone(),
        categories: product.category_ids.iter().filter_map(|id| tree.get(*id)).map(|c| category_link(&tree, c)).collect(),
        price_ranges: state.pricing.price_range_chain(product),
    };
    Ok(Json(page).into_response())
}

fn sale_page(state: &AppState, tree: &CategoryTree, products: &[Product], category: Option<&Category>) -> SalePage {
    let scope = category.map(|c| c.id);
    let subcategories = match category {
        Some(c) => sale::subcategories_in_sale(tree, c.id, products),
        None => sale::root_categories_in_sale(tree, products),
    };
    let products = sale::products_in_sale(tree, scope, products)
        .into_iter()
        .map(|p| SaleProduct { price: sale::discount_price(&state.pricing, p), url: sale::product_in_category_tree_url(tree, p, scope) })
        .collect();
    SalePage { category: category.map(|c| category_link(tree, c)), subcategories, products }
}

pub async fn sale_index(State(state): State<AppState>) -> Result<Json<SalePage>> {
    let (tree, products) = load_catalog(&state).await?;
    Ok(Json(sale_page(&state, &tree, &products, None)))
}

pub async fn sale_category(State(state): State<AppState>, Path(category_path): Path<String>) -> Result<Json<SalePage>> {
    let (tree, products) = load_catalog(&state).await?;
    let category = sale::resolve_category_path(&tree, &category_path)?;
    Ok(Json(sale_page(&state, &tree, &products, category)))
}

pub async fn search(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Result<Json<SearchPage>> {
    let query = params.q.unwrap_or_default().trim().to_string();
    if query.is_empty() {
        return Ok(Json(SearchPage { query, results: vec![] }));
    }
    let tree = CategoryTree::build(state.store.categories().await?)?;
    let found = state.store.search_products(&query).await?;
    tracing::debug!(%query, hits = found.len(), "product search");
    let results = found.iter().map(|p| summary(&state, &tree, p, None)).collect();
    Ok(Json(SearchPage { query, results }))
}
