//! The retailer's business operations exposed as registered tools.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use trailhead_core::catalog::{early_risers_promotion, Catalog, RecommendationRequest};
use trailhead_core::domain::order::normalize_order_number;
use trailhead_core::errors::DomainError;

use crate::actions::{
    GET_EARLY_RISERS_PROMOTION, GET_ORDER_STATUS, GET_PRODUCT_DETAILS,
    GET_PRODUCT_RECOMMENDATIONS, SEARCH_PRODUCTS,
};
use crate::tools::{Tool, ToolData, ToolParams, ToolRegistry, ToolResult};

pub const ORDER_NOT_FOUND: &str =
    "No order matches that email address and order number. Please double-check both.";

pub fn register_catalog_tools(registry: &mut ToolRegistry, catalog: Arc<Catalog>) {
    registry.register(OrderStatusTool { catalog: Arc::clone(&catalog) });
    registry.register(ProductDetailsTool { catalog: Arc::clone(&catalog) });
    registry.register(SearchProductsTool { catalog: Arc::clone(&catalog) });
    registry.register(RecommendationsTool { catalog });
    registry.register(PromotionTool::default());
}

pub fn catalog_registry(catalog: Arc<Catalog>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    register_catalog_tools(&mut registry, catalog);
    registry
}

pub struct OrderStatusTool {
    catalog: Arc<Catalog>,
}

#[async_trait]
impl Tool for OrderStatusTool {
    fn name(&self) -> &str {
        GET_ORDER_STATUS
    }

    fn description(&self) -> &str {
        "Look up an order's status and tracking number by email address and order number"
    }

    fn required_params(&self) -> Vec<String> {
        Vec::from(["email", "order_number"].map(String::from))
    }

    async fn invoke(&self, params: &ToolParams) -> Result<ToolResult> {
        let email = string_param(params, "email").unwrap_or_default();
        let raw_number = string_param(params, "order_number").unwrap_or_default();
        if normalize_order_number(&raw_number).is_none() {
            return Err(DomainError::InvalidOrderNumber(raw_number).into());
        }

        Ok(match self.catalog.find_order(&email, &raw_number) {
            Some(order) => ToolResult::ok(ToolData::Order(order.clone())),
            None => ToolResult::failure(ORDER_NOT_FOUND),
        })
    }
}

pub struct ProductDetailsTool {
    catalog: Arc<Catalog>,
}

#[async_trait]
impl Tool for ProductDetailsTool {
    fn name(&self) -> &str {
        GET_PRODUCT_DETAILS
    }

    fn description(&self) -> &str {
        "Get name, description, stock and tags for products by SKU"
    }

    fn required_params(&self) -> Vec<String> {
        vec!["skus".to_string()]
    }

    async fn invoke(&self, params: &ToolParams) -> Result<ToolResult> {
        let skus = string_list_param(params, "skus");
        let products = self.catalog.products_by_skus(&skus);
        if products.is_empty() {
            return Ok(ToolResult::failure(format!(
                "No products found for SKUs: {}",
                skus.join(", ")
            )));
        }
        Ok(ToolResult::ok(ToolData::ProductList(products)))
    }
}

pub struct SearchProductsTool {
    catalog: Arc<Catalog>,
}

#[async_trait]
impl Tool for SearchProductsTool {
    fn name(&self) -> &str {
        SEARCH_PRODUCTS
    }

    fn description(&self) -> &str {
        "Search the catalog by keywords matched against names, tags and descriptions"
    }

    fn required_params(&self) -> Vec<String> {
        vec!["query".to_string()]
    }

    async fn invoke(&self, params: &ToolParams) -> Result<ToolResult> {
        let query = string_param(params, "query").unwrap_or_default();
        let category = string_param(params, "category");
        let products = self.catalog.search(&query, category.as_deref());
        Ok(ToolResult::ok(ToolData::ProductList(products)))
    }
}

pub struct RecommendationsTool {
    catalog: Arc<Catalog>,
}

#[async_trait]
impl Tool for RecommendationsTool {
    fn name(&self) -> &str {
        GET_PRODUCT_RECOMMENDATIONS
    }

    fn description(&self) -> &str {
        "Recommend products that complement previous purchases or match stated interests"
    }

    async fn invoke(&self, params: &ToolParams) -> Result<ToolResult> {
        let mut reference_skus = string_list_param(params, "reference_skus");
        let mut preferences = Vec::new();
        for preference in string_list_param(params, "preferences") {
            if self.catalog.product_by_sku(&preference).is_some() {
                if !reference_skus.iter().any(|sku| sku.eq_ignore_ascii_case(&preference)) {
                    reference_skus.push(preference);
                }
            } else {
                preferences.push(preference);
            }
        }

        let limit = params
            .get("limit")
            .and_then(Value::as_u64)
            .and_then(|limit| usize::try_from(limit).ok())
            .unwrap_or_default();
        let request = RecommendationRequest {
            reference_skus,
            preferences,
            category: string_param(params, "category"),
            limit,
        };
        Ok(ToolResult::ok(ToolData::ProductList(self.catalog.recommend(&request))))
    }
}

pub struct PromotionTool {
    clock: fn() -> DateTime<Utc>,
}

impl Default for PromotionTool {
    fn default() -> Self {
        Self { clock: Utc::now }
    }
}

impl PromotionTool {
    pub fn with_clock(clock: fn() -> DateTime<Utc>) -> Self {
        Self { clock }
    }
}

#[async_trait]
impl Tool for PromotionTool {
    fn name(&self) -> &str {
        GET_EARLY_RISERS_PROMOTION
    }

    fn description(&self) -> &str {
        "Check the Early Risers promotion (10% off, 8:00-10:00 AM Pacific) and issue a code"
    }

    async fn invoke(&self, _params: &ToolParams) -> Result<ToolResult> {
        Ok(ToolResult::ok(ToolData::Promotion(early_risers_promotion((self.clock)()))))
    }
}

fn string_param(params: &ToolParams, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn string_list_param(params: &ToolParams, key: &str) -> Vec<String> {
    params
        .get(key)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}
