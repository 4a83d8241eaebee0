use std::collections::{BTreeMap, HashMap};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use trailhead_core::domain::order::Order;
use trailhead_core::domain::product::Product;
use trailhead_core::domain::promotion::Promotion;

/// Named parameters handed to a tool. Unknown values are JSON `null`.
pub type ToolParams = BTreeMap<String, Value>;

/// Closed set of payload shapes a tool can return. Context merging matches on this.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ToolData {
    Order(Order),
    ProductList(Vec<Product>),
    Promotion(Promotion),
    Empty,
}

impl ToolData {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Order(_) => "order",
            Self::ProductList(_) => "product_list",
            Self::Promotion(_) => "promotion",
            Self::Empty => "empty",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub data: ToolData,
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(data: ToolData) -> Self {
        Self { success: true, data, error: None }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self { success: false, data: ToolData::Empty, error: Some(error.into()) }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Parameters that must be present and non-empty before the tool may run.
    fn required_params(&self) -> Vec<String> {
        Vec::new()
    }

    /// Failures belong in the returned `Err` or a failed [`ToolResult`]. A panic is caught
    /// by the executor and reported as a failed step, but the tool's own state may be left
    /// inconsistent.
    async fn invoke(&self, params: &ToolParams) -> Result<ToolResult>;
}

/// Adapts a plain closure into a [`Tool`].
pub struct FnTool<F> {
    name: String,
    required: Vec<String>,
    invoke: F,
}

#[async_trait]
impl<F> Tool for FnTool<F>
where
    F: Fn(&ToolParams) -> Result<ToolResult> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn required_params(&self) -> Vec<String> {
        self.required.clone()
    }

    async fn invoke(&self, params: &ToolParams) -> Result<ToolResult> {
        (self.invoke)(params)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub required_params: Vec<String>,
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `tool` under its own name, replacing any previous tool with that name.
    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.insert(tool.name().to_string(), Box::new(tool));
    }

    /// Registers a closure; `required` may be built at runtime.
    pub fn register_fn<I, F>(&mut self, name: impl Into<String>, required: I, invoke: F)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        F: Fn(&ToolParams) -> Result<ToolResult> + Send + Sync + 'static,
    {
        let required = required.into_iter().map(|param| param.as_ref().to_string()).collect();
        self.register(FnTool { name: name.into(), required, invoke });
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|tool| tool.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn required_params(&self, name: &str) -> Vec<String> {
        self.get(name).map(|tool| tool.required_params()).unwrap_or_default()
    }

    /// Registered tool names in sorted order.
    pub fn names(&self) -> Vec<String> {
        let mut names = self.tools.keys().cloned().collect::<Vec<_>>();
        names.sort();
        names
    }

    pub fn describe(&self) -> Vec<ToolDescriptor> {
        self.names()
            .into_iter()
            .filter_map(|name| {
                self.get(&name).map(|tool| ToolDescriptor {
                    description: tool.description().to_string(),
                    required_params: tool.required_params(),
                    name,
                })
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
