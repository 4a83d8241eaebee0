//! Order book and product catalog backed by the retailer's JSON exports.
//!
//! `CustomerOrders.json` and `ProductCatalog.json` use PascalCase keys; records are
//! converted into [`Order`] and [`Product`] on load so nothing downstream sees the
//! export format.

use std::cmp::Reverse;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rand::Rng;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::CatalogConfig;
use crate::domain::order::{normalize_order_number, Order};
use crate::domain::product::Product;
use crate::domain::promotion::{is_early_risers_window, Promotion};

pub const DEFAULT_RECOMMENDATION_LIMIT: usize = 3;

const DISCOUNT_CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const DISCOUNT_CODE_LEN: usize = 8;

const NAME_MATCH_SCORE: u32 = 10;
const TAG_MATCH_SCORE: u32 = 5;
const DESCRIPTION_MATCH_SCORE: u32 = 2;

const SEARCH_STOP_WORDS: &[&str] = &[
    "a", "an", "and", "any", "are", "can", "do", "find", "for", "have", "i", "in", "is", "looking",
    "me", "my", "need", "of", "on", "please", "product", "products", "recommend", "search",
    "show", "some", "the", "to", "want", "what", "with", "you", "your",
];

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("could not read catalog file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse catalog file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: serde_json::Error },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OrderRecord {
    customer_name: String,
    email: String,
    order_number: String,
    products_ordered: Vec<String>,
    status: String,
    #[serde(default)]
    tracking_number: Option<String>,
}

impl From<OrderRecord> for Order {
    fn from(record: OrderRecord) -> Self {
        Self {
            customer_name: record.customer_name,
            email: record.email,
            order_number: record.order_number,
            products_ordered: record.products_ordered,
            status: record.status,
            tracking_number: record.tracking_number.filter(|number| !number.trim().is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProductRecord {
    #[serde(rename = "ProductName")]
    product_name: String,
    #[serde(rename = "SKU")]
    sku: String,
    #[serde(rename = "Inventory")]
    inventory: u32,
    #[serde(rename = "Description")]
    description: String,
    #[serde(rename = "Tags", default)]
    tags: Vec<String>,
}

impl From<ProductRecord> for Product {
    fn from(record: ProductRecord) -> Self {
        Self {
            product_name: record.product_name,
            sku: record.sku,
            inventory: record.inventory,
            description: record.description,
            tags: record.tags,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecommendationRequest {
    pub reference_skus: Vec<String>,
    pub preferences: Vec<String>,
    pub category: Option<String>,
    pub limit: usize,
}

#[derive(Clone, Debug, Default)]
pub struct Catalog {
    orders: Vec<Order>,
    products: Vec<Product>,
}

impl Catalog {
    pub fn new(orders: Vec<Order>, products: Vec<Product>) -> Self {
        Self { orders, products }
    }

    /// Loads both exports. A missing file yields an empty section; a malformed one is an error.
    pub fn load(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let orders = read_records::<OrderRecord>(&config.orders_path())?
            .into_iter()
            .map(Order::from)
            .collect::<Vec<_>>();
        let products = read_records::<ProductRecord>(&config.products_path())?
            .into_iter()
            .map(Product::from)
            .collect::<Vec<_>>();

        info!(
            event_name = "catalog.loaded",
            order_count = orders.len(),
            product_count = products.len(),
            data_dir = %config.data_dir.display(),
            "catalog data loaded"
        );

        Ok(Self::new(orders, products))
    }

    pub fn from_json(orders_json: &str, products_json: &str) -> Result<Self, serde_json::Error> {
        let orders = serde_json::from_str::<Vec<OrderRecord>>(orders_json)?;
        let products = serde_json::from_str::<Vec<ProductRecord>>(products_json)?;
        Ok(Self::new(
            orders.into_iter().map(Order::from).collect(),
            products.into_iter().map(Product::from).collect(),
        ))
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn find_order(&self, email: &str, order_number: &str) -> Option<&Order> {
        normalize_order_number(order_number)?;
        self.orders.iter().find(|order| order.matches(email, order_number))
    }

    pub fn product_by_sku(&self, sku: &str) -> Option<&Product> {
        let wanted = sku.trim();
        self.products.iter().find(|product| product.sku.eq_ignore_ascii_case(wanted))
    }

    /// Products for the given SKUs, in request order, skipping unknown SKUs.
    pub fn products_by_skus(&self, skus: &[String]) -> Vec<Product> {
        skus.iter().filter_map(|sku| self.product_by_sku(sku)).cloned().collect()
    }

    /// Word-boundary search scored by where each query word hits: name, then tags, then
    /// description. Results are ordered by score, ties keep catalog order.
    pub fn search(&self, query: &str, category: Option<&str>) -> Vec<Product> {
        let patterns = query_patterns(query);
        if patterns.is_empty() {
            return Vec::new();
        }

        let mut scored = self
            .products
            .iter()
            .filter(|product| category.map_or(true, |category| product.has_tag(category)))
            .filter_map(|product| {
                let score = score_product(product, &patterns);
                (score > 0).then_some((score, product))
            })
            .collect::<Vec<_>>();
        scored.sort_by_key(|(score, _)| Reverse(*score));

        scored.into_iter().map(|(_, product)| product.clone()).collect()
    }

    pub fn recommend(&self, request: &RecommendationRequest) -> Vec<Product> {
        let limit = if request.limit == 0 { DEFAULT_RECOMMENDATION_LIMIT } else { request.limit };
        let category = request.category.as_deref();

        let references = self.products_by_skus(&request.reference_skus);
        let mut candidates = if references.is_empty() {
            Vec::new()
        } else {
            self.complementary_products(&references)
        };

        if candidates.is_empty() && !request.preferences.is_empty() {
            candidates = self.search(&request.preferences.join(" "), category);
        }
        if candidates.is_empty() {
            candidates = self.best_stocked();
        }

        candidates
            .into_iter()
            .filter(|product| {
                !request.reference_skus.iter().any(|sku| sku.eq_ignore_ascii_case(&product.sku))
            })
            .filter(|product| category.map_or(true, |category| product.has_tag(category)))
            .take(limit)
            .collect()
    }

    fn complementary_products(&self, references: &[Product]) -> Vec<Product> {
        let mut scored = self
            .products
            .iter()
            .filter(|product| product.in_stock())
            .filter_map(|product| {
                let shared =
                    references.iter().map(|reference| reference.shared_tags(product)).sum::<usize>();
                (shared > 0).then_some((shared, product.inventory, product))
            })
            .collect::<Vec<_>>();
        scored.sort_by_key(|(shared, inventory, _)| (Reverse(*shared), Reverse(*inventory)));
        scored.into_iter().map(|(_, _, product)| product.clone()).collect()
    }

    fn best_stocked(&self) -> Vec<Product> {
        let mut in_stock =
            self.products.iter().filter(|product| product.in_stock()).cloned().collect::<Vec<_>>();
        in_stock.sort_by_key(|product| Reverse(product.inventory));
        in_stock
    }
}

pub fn generate_discount_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..DISCOUNT_CODE_LEN)
        .map(|_| DISCOUNT_CODE_CHARSET[rng.gen_range(0..DISCOUNT_CODE_CHARSET.len())] as char)
        .collect()
}

/// The Early Risers promotion as seen at `now`; the code is only minted inside the window.
pub fn early_risers_promotion(now: DateTime<Utc>) -> Promotion {
    if is_early_risers_window(now) {
        Promotion::early_risers_active(generate_discount_code(&mut rand::thread_rng()))
    } else {
        Promotion::early_risers_inactive(now)
    }
}

fn read_records<T>(path: &Path) -> Result<Vec<T>, CatalogError>
where
    T: for<'de> Deserialize<'de>,
{
    if !path.exists() {
        warn!(
            event_name = "catalog.file_missing",
            path = %path.display(),
            "catalog file not found, continuing with an empty section"
        );
        return Ok(Vec::new());
    }

    let raw = fs::read_to_string(path)
        .map_err(|source| CatalogError::ReadFile { path: path.to_path_buf(), source })?;
    serde_json::from_str::<Vec<T>>(&raw)
        .map_err(|source| CatalogError::ParseFile { path: path.to_path_buf(), source })
}

fn query_patterns(query: &str) -> Vec<Regex> {
    query
        .to_ascii_lowercase()
        .split(|character: char| !character.is_ascii_alphanumeric() && character != '-')
        .filter(|word| word.len() > 1 && !SEARCH_STOP_WORDS.contains(word))
        .filter_map(|word| Regex::new(&format!(r"\b{}\b", regex::escape(word))).ok())
        .collect()
}

fn score_product(product: &Product, patterns: &[Regex]) -> u32 {
    let name = product.product_name.to_ascii_lowercase();
    let tags = product.tags.join(" ").to_ascii_lowercase();
    let description = product.description.to_ascii_lowercase();

    patterns
        .iter()
        .map(|pattern| {
            if pattern.is_match(&name) {
                NAME_MATCH_SCORE
            } else if pattern.is_match(&tags) {
                TAG_MATCH_SCORE
            } else if pattern.is_match(&description) {
                DESCRIPTION_MATCH_SCORE
            } else {
                0
            }
        })
        .sum()
}
