//! Chooses at most one action per turn.
//!
//! The rule table is the default and the ground truth. A model-backed strategy may be tried
//! first, but any failure on that path falls back to the rules.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::actions::{
    GET_EARLY_RISERS_PROMOTION, GET_ORDER_STATUS, GET_PRODUCT_DETAILS,
    GET_PRODUCT_RECOMMENDATIONS, SEARCH_PRODUCTS,
};
use crate::context::ConversationContext;
use crate::extract;
use crate::llm::{LlmClient, ModelTier};
use crate::tools::ToolDescriptor;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "action", rename_all = "snake_case")]
pub enum Selection {
    Invoke(String),
    Conversational,
    Close,
}

/// Keyword classes and context facts the rules are evaluated against.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Signals {
    pub order_intent: bool,
    pub product_intent: bool,
    pub product_details: bool,
    pub recommendation: bool,
    pub promotion: bool,
    pub closing: bool,
    pub has_order: bool,
    pub has_found_products: bool,
}

impl Signals {
    pub fn detect(text: &str, context: &ConversationContext) -> Self {
        Self {
            order_intent: extract::has_order_intent(text),
            product_intent: extract::has_product_intent(text),
            product_details: extract::mentions_product_details(text),
            recommendation: extract::mentions_recommendation(text),
            promotion: extract::has_promotion_intent(text),
            closing: extract::has_closing_intent(text),
            has_order: context.current_order.is_some(),
            has_found_products: !context.found_products.is_empty(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Invoke(&'static str),
    NoAction,
    Close,
}

impl Decision {
    fn to_selection(self) -> Selection {
        match self {
            Self::Invoke(action) => Selection::Invoke(action.to_string()),
            Self::NoAction => Selection::Conversational,
            Self::Close => Selection::Close,
        }
    }
}

pub struct SelectionRule {
    pub name: &'static str,
    pub applies: fn(&Signals) -> bool,
    pub decision: Decision,
}

/// Evaluated top to bottom; the first rule that applies wins.
/// Order rules sit above product rules so blended requests resolve to the order.
pub const RULES: &[SelectionRule] = &[
    SelectionRule {
        name: "order_lookup",
        applies: |s| s.order_intent && !s.has_order,
        decision: Decision::Invoke(GET_ORDER_STATUS),
    },
    SelectionRule {
        name: "order_product_details",
        applies: |s| s.order_intent && s.has_order && s.product_details,
        decision: Decision::Invoke(GET_PRODUCT_DETAILS),
    },
    SelectionRule {
        name: "order_claimed",
        applies: |s| s.order_intent,
        decision: Decision::NoAction,
    },
    SelectionRule {
        name: "product_recommendations",
        applies: |s| {
            s.product_intent && s.recommendation && (s.has_order || s.has_found_products)
        },
        decision: Decision::Invoke(GET_PRODUCT_RECOMMENDATIONS),
    },
    SelectionRule {
        name: "product_search",
        applies: |s| s.product_intent,
        decision: Decision::Invoke(SEARCH_PRODUCTS),
    },
    SelectionRule {
        name: "promotion",
        applies: |s| s.promotion,
        decision: Decision::Invoke(GET_EARLY_RISERS_PROMOTION),
    },
    SelectionRule { name: "closing", applies: |s| s.closing, decision: Decision::Close },
];

pub const NO_MATCH_RULE: &str = "no_match";

/// Returns the name of the rule that fired with its selection.
pub fn evaluate_rules(signals: &Signals) -> (&'static str, Selection) {
    RULES
        .iter()
        .find(|rule| (rule.applies)(signals))
        .map(|rule| (rule.name, rule.decision.to_selection()))
        .unwrap_or((NO_MATCH_RULE, Selection::Conversational))
}

#[async_trait]
pub trait SelectionStrategy: Send + Sync {
    fn name(&self) -> &str;

    async fn select(&self, text: &str, context: &ConversationContext) -> Result<Selection>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct RuleSelector;

impl RuleSelector {
    pub fn select_with_rule(
        &self,
        text: &str,
        context: &ConversationContext,
    ) -> (&'static str, Selection) {
        evaluate_rules(&Signals::detect(text, context))
    }
}

#[async_trait]
impl SelectionStrategy for RuleSelector {
    fn name(&self) -> &str {
        "rules"
    }

    async fn select(&self, text: &str, context: &ConversationContext) -> Result<Selection> {
        Ok(self.select_with_rule(text, context).1)
    }
}

const CONVERSATIONAL_REPLY: &str = "conversational_response";
const CLOSE_REPLY: &str = "close_conversation";

/// Asks the low-latency model to name a single tool for the turn.
pub struct ModelSelector {
    client: Arc<dyn LlmClient>,
    tools: Vec<ToolDescriptor>,
}

impl ModelSelector {
    pub fn new(client: Arc<dyn LlmClient>, tools: Vec<ToolDescriptor>) -> Self {
        Self { client, tools }
    }

    pub fn build_prompt(&self, text: &str, context: &ConversationContext) -> String {
        let tool_lines = self
            .tools
            .iter()
            .map(|tool| {
                if tool.description.is_empty() {
                    format!("- {}", tool.name)
                } else {
                    format!("- {}: {}", tool.name, tool.description)
                }
            })
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "You choose the next tool for an outdoor gear retailer's customer service assistant.\n\n\
             CUSTOMER MESSAGE: \"{text}\"\n\n\
             CONVERSATION CONTEXT: {context}\n\n\
             AVAILABLE TOOLS:\n{tool_lines}\n\n\
             Order questions take precedence over product questions.\n\
             Reply with exactly one tool name, `{CONVERSATIONAL_REPLY}` if no tool is needed, \
             or `{CLOSE_REPLY}` if the customer is ending the conversation.",
            context = context.summary(),
        )
    }

    pub fn parse_reply(&self, reply: &str) -> Result<Selection> {
        let answer = reply
            .trim()
            .trim_matches(|character: char| character == '`' || character == '"' || character == '\'')
            .trim()
            .to_ascii_lowercase();

        if answer == CONVERSATIONAL_REPLY {
            return Ok(Selection::Conversational);
        }
        if answer == CLOSE_REPLY {
            return Ok(Selection::Close);
        }
        self.tools
            .iter()
            .find(|tool| tool.name == answer)
            .map(|tool| Selection::Invoke(tool.name.clone()))
            .ok_or_else(|| anyhow!("model reply does not name a known tool: {answer:.60}"))
    }
}

#[async_trait]
impl SelectionStrategy for ModelSelector {
    fn name(&self) -> &str {
        "model"
    }

    async fn select(&self, text: &str, context: &ConversationContext) -> Result<Selection> {
        let prompt = self.build_prompt(text, context);
        let reply = self.client.generate(&prompt, ModelTier::LowLatency).await?;
        self.parse_reply(&reply)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SelectionDecision {
    pub selection: Selection,
    /// `rules:<rule name>` or the override strategy's name.
    pub source: String,
}

/// Rule table plus an optional override tried first.
#[derive(Default)]
pub struct ActionSelector {
    rules: RuleSelector,
    override_strategy: Option<Box<dyn SelectionStrategy>>,
}

impl ActionSelector {
    pub fn rules_only() -> Self {
        Self::default()
    }

    pub fn with_override(strategy: Box<dyn SelectionStrategy>) -> Self {
        Self { rules: RuleSelector, override_strategy: Some(strategy) }
    }

    pub fn has_override(&self) -> bool {
        self.override_strategy.is_some()
    }

    pub async fn select(&self, text: &str, context: &ConversationContext) -> SelectionDecision {
        if let Some(strategy) = &self.override_strategy {
            match strategy.select(text, context).await {
                Ok(selection) => {
                    debug!(
                        event_name = "engine.selection.override",
                        strategy = strategy.name(),
                        "override strategy selected"
                    );
                    return SelectionDecision { selection, source: strategy.name().to_string() };
                }
                Err(error) => {
                    warn!(
                        event_name = "engine.selection.override_failed",
                        strategy = strategy.name(),
                        error = %error,
                        "override strategy failed, falling back to rules"
                    );
                }
            }
        }

        let (rule, selection) = self.rules.select_with_rule(text, context);
        SelectionDecision { selection, source: format!("rules:{rule}") }
    }
}
