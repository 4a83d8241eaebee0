use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use trailhead_core::domain::order::Order;
use trailhead_core::domain::product::Product;

use crate::actions::{
    GET_EARLY_RISERS_PROMOTION, GET_ORDER_STATUS, GET_PRODUCT_DETAILS,
    GET_PRODUCT_RECOMMENDATIONS, SEARCH_PRODUCTS,
};
use crate::extract;
use crate::tools::{ToolData, ToolParams, ToolResult};

/// Business facts accumulated over one conversation.
///
/// While `current_order` is held, `customer_email` and `order_number` mirror it and text
/// extraction leaves them alone; only another successful order result replaces them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationContext {
    pub customer_email: Option<String>,
    pub order_number: Option<String>,
    pub current_order: Option<Order>,
    pub found_products: Vec<Product>,
    pub search_query: Option<String>,
    pub preferences: BTreeSet<String>,
}

impl ConversationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_from_text(&mut self, text: &str) {
        if self.current_order.is_none() {
            if let Some(email) = extract::extract_email(text) {
                self.customer_email = Some(email);
            }
            if let Some(order_number) = extract::extract_order_number(text) {
                self.order_number = Some(order_number);
            }
        }

        if extract::has_product_intent(text) {
            let query = text.trim();
            if !query.is_empty() {
                self.search_query = Some(query.to_string());
            }
        }

        self.preferences.extend(extract::extract_preferences(text));
    }

    /// Merges a tool result by the shape of its payload. Failed results change nothing.
    pub fn update_from_result(&mut self, result: &ToolResult) {
        if !result.success {
            return;
        }

        match &result.data {
            ToolData::Order(order) => {
                self.customer_email = Some(order.email.clone());
                self.order_number = Some(order.order_number.clone());
                self.current_order = Some(order.clone());
            }
            ToolData::ProductList(products) if !products.is_empty() => {
                self.found_products = products.clone();
            }
            ToolData::ProductList(_) | ToolData::Promotion(_) | ToolData::Empty => {}
        }
    }

    pub fn resolve_params(&self, action: &str) -> ToolParams {
        let mut params = ToolParams::new();
        match action {
            GET_ORDER_STATUS => {
                params.insert("email".to_string(), optional_string(&self.customer_email));
                params.insert("order_number".to_string(), optional_string(&self.order_number));
            }
            GET_PRODUCT_DETAILS => {
                let skus = self
                    .current_order
                    .as_ref()
                    .map(|order| order.products_ordered.clone())
                    .unwrap_or_default();
                params.insert("skus".to_string(), json!(skus));
            }
            SEARCH_PRODUCTS => {
                params.insert("query".to_string(), optional_string(&self.search_query));
            }
            GET_PRODUCT_RECOMMENDATIONS => {
                let preferences = match &self.current_order {
                    Some(order) => order.products_ordered.clone(),
                    None => self.preferences.iter().cloned().collect(),
                };
                let reference_skus =
                    self.found_products.iter().map(|product| product.sku.clone()).collect::<Vec<_>>();
                params.insert("category".to_string(), Value::Null);
                params.insert("preferences".to_string(), json!(preferences));
                params.insert("reference_skus".to_string(), json!(reference_skus));
            }
            GET_EARLY_RISERS_PROMOTION => {}
            _ => {}
        }
        params
    }

    /// Fields this context knows `action` needs that `params` does not supply, in a stable order.
    pub fn missing_fields(&self, action: &str, params: &ToolParams) -> Vec<String> {
        let needed: &[&str] = match action {
            GET_ORDER_STATUS => &["email", "order_number"],
            GET_PRODUCT_DETAILS => &["skus"],
            SEARCH_PRODUCTS => &["query"],
            _ => &[],
        };
        needed
            .iter()
            .filter(|field| is_missing(params.get(**field)))
            .map(|field| (*field).to_string())
            .collect()
    }

    pub fn has_required(&self, action: &str, params: &ToolParams) -> bool {
        self.missing_fields(action, params).is_empty()
    }

    /// One-line summary used in model prompts and logs. Never includes the email address.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if let Some(order) = &self.current_order {
            parts.push(format!(
                "current order {} ({}) with SKUs [{}]",
                order.order_number,
                order.status,
                order.products_ordered.join(", ")
            ));
        } else {
            if self.customer_email.is_some() {
                parts.push("email known".to_string());
            }
            if let Some(order_number) = &self.order_number {
                parts.push(format!("order number {order_number}"));
            }
        }
        if !self.found_products.is_empty() {
            let names = self
                .found_products
                .iter()
                .take(3)
                .map(|product| product.product_name.as_str())
                .collect::<Vec<_>>();
            parts.push(format!("previously found products: {}", names.join(", ")));
        }
        if !self.preferences.is_empty() {
            let preferences = self.preferences.iter().map(String::as_str).collect::<Vec<_>>();
            parts.push(format!("interests: {}", preferences.join(", ")));
        }

        if parts.is_empty() {
            "no previous context".to_string()
        } else {
            parts.join("; ")
        }
    }
}

/// Null, blank strings and empty arrays all count as absent.
pub fn is_missing(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(text)) => text.trim().is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(_) => false,
    }
}

fn optional_string(value: &Option<String>) -> Value {
    value.as_ref().map(|text| Value::String(text.clone())).unwrap_or(Value::Null)
}
