//! Tool registration seam between the adapter and the host transport.
//!
//! The adapter only sees [`ToolRegistry`] and [`ToolHandler`]; the stdio server in
//! [`crate::server`] is one implementation backed by a [`ToolTable`].

use crate::error::{AdapterError, Result};
use crate::schema;
use async_trait::async_trait;
use rmcp::model::{CallToolResult, JsonObject, Tool, ToolAnnotations};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Immutable description of a tool, registered once at startup.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Arc<JsonObject>,
    pub annotations: Option<ToolAnnotations>,
}

impl ToolDefinition {
    /// Wire representation advertised in `tools/list`.
    #[must_use]
    pub fn to_tool(&self) -> Tool {
        let mut tool = Tool::new(
            self.name.clone(),
            self.description.clone(),
            self.input_schema.clone(),
        );
        tool.annotations.clone_from(&self.annotations);
        tool
    }
}

/// Executes one tool call with raw JSON arguments.
///
/// Handlers validate their own arguments; a rejected call must return
/// [`AdapterError::Validation`] without having performed any I/O.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: Value) -> Result<CallToolResult>;
}

pub trait ToolRegistry {
    /// Register a tool and its handler.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Registry`] if a tool with the same name already exists or its
    /// input schema does not compile.
    fn register(&mut self, definition: ToolDefinition, handler: Arc<dyn ToolHandler>)
    -> Result<()>;
}

struct Registered {
    definition: ToolDefinition,
    handler: Arc<dyn ToolHandler>,
}

/// In-memory registry preserving registration order.
#[derive(Default)]
pub struct ToolTable {
    tools: Vec<Registered>,
    by_name: HashMap<String, usize>,
}

impl ToolTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn tools(&self) -> Vec<Tool> {
        self.tools.iter().map(|r| r.definition.to_tool()).collect()
    }

    #[must_use]
    pub fn handler(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.by_name
            .get(name)
            .map(|&idx| self.tools[idx].handler.clone())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl ToolRegistry for ToolTable {
    fn register(
        &mut self,
        definition: ToolDefinition,
        handler: Arc<dyn ToolHandler>,
    ) -> Result<()> {
        if self.by_name.contains_key(&definition.name) {
            return Err(AdapterError::Registry(format!(
                "Duplicate tool name '{}'",
                definition.name
            )));
        }
        schema::compile(&definition.input_schema).map_err(|e| {
            AdapterError::Registry(format!("tool '{}': {e}", definition.name))
        })?;
        self.by_name
            .insert(definition.name.clone(), self.tools.len());
        self.tools.push(Registered {
            definition,
            handler,
        });
        Ok(())
    }
}
