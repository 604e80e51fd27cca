//! Tool session trait: the abstraction over the external tool service.
//!
//! Tools are not implemented in this workspace. They are discovered at run
//! start from a separate service (an MCP server subprocess in production) and
//! invoked by name. Session setup and teardown belong to the caller.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ToolError;
use crate::provider::ToolDefinition;

/// A tool the LLM may request, as advertised by the tool service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default = "empty_object_schema", alias = "inputSchema")]
    pub input_schema: serde_json::Value,
}

fn empty_object_schema() -> serde_json::Value {
    serde_json::json!({ "type": "object" })
}

impl ToolDescriptor {
    /// Convert into the LLM's tool-declaration format.
    pub fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.clone(),
        }
    }
}

/// One content element of a tool result. Non-text elements carry no text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolContent {
    #[serde(default)]
    pub text: Option<String>,
}

impl ToolContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }
}

/// What the tool service returned for one call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallToolResult {
    #[serde(default)]
    pub is_error: bool,
    #[serde(default)]
    pub content: Vec<ToolContent>,
}

impl CallToolResult {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            is_error: false,
            content: vec![ToolContent::text(text)],
        }
    }

    pub fn failure(text: impl Into<String>) -> Self {
        Self {
            is_error: true,
            content: vec![ToolContent::text(text)],
        }
    }

    /// Only the first content element is ever used; missing text is empty.
    pub fn first_text(&self) -> &str {
        self.content
            .first()
            .and_then(|c| c.text.as_deref())
            .unwrap_or_default()
    }
}

/// An initialized session with the tool service.
#[async_trait]
pub trait ToolSession: Send + Sync {
    /// Enumerate the tools the service offers.
    async fn list_tools(&self) -> std::result::Result<Vec<ToolDescriptor>, ToolError>;

    /// Invoke a tool by name.
    async fn call_tool(
        &self,
        name: &str,
        input: serde_json::Value,
    ) -> std::result::Result<CallToolResult, ToolError>;

    /// Tear the session down. Called once when the owner is done with it.
    async fn close(&self) {}
}

/// Opens fresh, initialized tool sessions; one per run.
#[async_trait]
pub trait ToolSessionFactory: Send + Sync {
    async fn open(&self) -> std::result::Result<std::sync::Arc<dyn ToolSession>, ToolError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn descriptor_accepts_camel_case_schema() {
        let desc: ToolDescriptor = serde_json::from_value(json!({
            "name": "airbnb_listing_details",
            "description": "Get listing details",
            "inputSchema": { "type": "object", "required": ["id"] }
        }))
        .unwrap();
        let def = desc.to_definition();
        assert_eq!(def.name, "airbnb_listing_details");
        assert_eq!(def.input_schema["required"][0], "id");
    }

    #[test]
    fn descriptor_defaults_missing_fields() {
        let desc: ToolDescriptor = serde_json::from_value(json!({ "name": "ping" })).unwrap();
        assert_eq!(desc.description, "");
        assert_eq!(desc.input_schema, json!({ "type": "object" }));
    }

    #[test]
    fn first_text_uses_only_first_element() {
        let result = CallToolResult {
            is_error: false,
            content: vec![ToolContent::text("first"), ToolContent::text("second")],
        };
        assert_eq!(result.first_text(), "first");
        assert_eq!(CallToolResult::default().first_text(), "");
        let image_only = CallToolResult {
            is_error: false,
            content: vec![ToolContent { text: None }],
        };
        assert_eq!(image_only.first_text(), "");
    }
}
