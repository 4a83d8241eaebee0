//! Adaptive plan execution for the outdoor-gear customer service assistant.
//!
//! Every customer message is one turn against a session's [`plan::PlanState`]:
//! 1. **Extraction** (`extract`, `context`) pulls email, order number and
//!    product intent out of free text and folds it into the conversation context.
//! 2. **Selection** (`selector`) picks one business action from a fixed rule
//!    table, optionally consulting a language model first.
//! 3. **Parameter gating** (`plan`) stops before any tool runs when required
//!    identifiers are still missing and reports exactly which.
//! 4. **Execution** (`executor`, `tools`) invokes the registered tool, records
//!    history and folds the result back into context.
//!
//! `reply` turns the outcome into customer text, optionally worded by the thinking model.
//!
//! The model never fabricates order data: tools answer from the catalog only.

pub mod actions;
pub mod catalog_tools;
pub mod context;
pub mod executor;
pub mod extract;
pub mod llm;
pub mod plan;
pub mod reply;
pub mod runtime;
pub mod selector;
pub mod session;
pub mod tools;

pub use context::ConversationContext;
pub use plan::{PlanState, PlanStatus, TurnOutcome};
pub use runtime::{Engine, TurnReport};
pub use selector::{ActionSelector, Selection};
pub use session::SessionId;
pub use tools::{Tool, ToolData, ToolRegistry, ToolResult};
