//! Customer-facing phrasing of a [`TurnOutcome`].
//!
//! [`render`] is deterministic and always available. [`ReplyComposer`] can hand the
//! rendered draft to the thinking model for friendlier wording and keeps the draft
//! whenever the model fails.

use std::sync::Arc;

use tracing::warn;
use trailhead_core::domain::order::Order;
use trailhead_core::domain::product::Product;
use trailhead_core::domain::promotion::Promotion;

use crate::context::ConversationContext;
use crate::llm::{LlmClient, ModelTier};
use crate::plan::TurnOutcome;
use crate::tools::{ToolData, ToolResult};

const MAX_LISTED_PRODUCTS: usize = 5;

pub const CONVERSATIONAL_REPLY: &str = "I can check on an order, look up the products in it, \
     search our gear, suggest items that go with what you have, or tell you about the \
     Early Risers promotion. What would you like to do?";

pub fn render(outcome: &TurnOutcome) -> String {
    match outcome {
        TurnOutcome::NoAction => CONVERSATIONAL_REPLY.to_string(),
        TurnOutcome::InsufficientParams { missing_fields, .. } => {
            let labels = missing_fields.iter().map(|field| field_label(field)).collect::<Vec<_>>();
            format!("To help with that, I need your {}.", join_labels(&labels))
        }
        TurnOutcome::Executed { action, result } => render_result(action, result),
    }
}

/// Phrases turn replies, optionally through the thinking model.
#[derive(Clone, Default)]
pub struct ReplyComposer {
    client: Option<Arc<dyn LlmClient>>,
}

impl ReplyComposer {
    pub fn deterministic() -> Self {
        Self::default()
    }

    pub fn with_model(client: Arc<dyn LlmClient>) -> Self {
        Self { client: Some(client) }
    }

    pub fn uses_model(&self) -> bool {
        self.client.is_some()
    }

    /// Missing-field prompts stay deterministic so the customer is asked for exactly
    /// the fields the gate reported.
    pub async fn compose(
        &self,
        message: &str,
        context: &ConversationContext,
        outcome: &TurnOutcome,
    ) -> String {
        let draft = render(outcome);
        let Some(client) = &self.client else {
            return draft;
        };
        if matches!(outcome, TurnOutcome::InsufficientParams { .. }) {
            return draft;
        }

        let prompt = build_reply_prompt(message, context, outcome, &draft);
        match client.generate(&prompt, ModelTier::Thinking).await {
            Ok(reply) => reply,
            Err(error) => {
                warn!(
                    event_name = "engine.reply.model_failed",
                    error = %error,
                    "model reply failed, using rendered reply"
                );
                draft
            }
        }
    }
}

pub fn build_reply_prompt(
    message: &str,
    context: &ConversationContext,
    outcome: &TurnOutcome,
    draft: &str,
) -> String {
    let tool_output = match outcome {
        TurnOutcome::Executed { result, .. } => {
            serde_json::to_string(result).unwrap_or_else(|_| "unavailable".to_string())
        }
        _ => "none".to_string(),
    };

    format!(
        "You are the customer service assistant for an outdoor gear retailer. Write a short, \
         friendly reply to the customer.\n\n\
         CUSTOMER MESSAGE: \"{message}\"\n\n\
         CONVERSATION CONTEXT: {context}\n\n\
         TOOL OUTPUT: {tool_output}\n\n\
         DRAFT REPLY:\n{draft}\n\n\
         Use only facts from the tool output and the draft. Never invent order numbers, \
         tracking numbers, SKUs, prices or discount codes.",
        context = context.summary(),
    )
}

fn render_result(action: &str, result: &ToolResult) -> String {
    if !result.success {
        let reason = result.error.as_deref().unwrap_or("the request could not be completed");
        return format!("Sorry, I couldn't complete that ({action}): {reason}");
    }

    match &result.data {
        ToolData::Order(order) => render_order(order),
        ToolData::ProductList(products) => render_products(products),
        ToolData::Promotion(promotion) => render_promotion(promotion),
        ToolData::Empty => "Done.".to_string(),
    }
}

fn render_order(order: &Order) -> String {
    let mut reply = format!(
        "Order {} for {} is currently {}.",
        order.order_number, order.customer_name, order.status
    );
    match &order.tracking_number {
        Some(tracking) if order.is_shipped() => {
            reply.push_str(&format!(" Tracking number: {tracking}."));
        }
        _ => reply.push_str(" It has not shipped yet, so there is no tracking number."),
    }
    if !order.products_ordered.is_empty() {
        reply.push_str(&format!(" Items: {}.", order.products_ordered.join(", ")));
    }
    reply
}

fn render_products(products: &[Product]) -> String {
    if products.is_empty() {
        return "I couldn't find any matching products. Try different keywords?".to_string();
    }

    let mut lines = products
        .iter()
        .take(MAX_LISTED_PRODUCTS)
        .map(|product| {
            let stock = if product.in_stock() {
                format!("{} in stock", product.inventory)
            } else {
                "out of stock".to_string()
            };
            format!("- {} ({}): {} [{stock}]", product.product_name, product.sku, product.description)
        })
        .collect::<Vec<_>>();
    if products.len() > MAX_LISTED_PRODUCTS {
        lines.push(format!("...and {} more.", products.len() - MAX_LISTED_PRODUCTS));
    }
    format!("Here's what I found:\n{}", lines.join("\n"))
}

fn render_promotion(promotion: &Promotion) -> String {
    match (&promotion.discount_code, promotion.available) {
        (Some(code), true) => format!(
            "Good news: the {} is on! Use code {code} for {}% off. Valid {}.",
            promotion.name, promotion.discount_percentage, promotion.valid_hours
        ),
        _ => format!("The {} isn't active right now. {}", promotion.name, promotion.description),
    }
}

fn field_label(field: &str) -> String {
    match field {
        "email" => "email address".to_string(),
        "order_number" => "order number (for example #W001)".to_string(),
        "skus" => "order details".to_string(),
        "query" => "what you are looking for".to_string(),
        other => other.replace('_', " "),
    }
}

fn join_labels(labels: &[String]) -> String {
    match labels {
        [] => "details".to_string(),
        [only] => only.clone(),
        [init @ .., last] => format!("{} and {last}", init.join(", ")),
    }
}
