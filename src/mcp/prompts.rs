//! MCP Prompts

use crate::mcp::errors::McpError;
use crate::mcp::protocol::*;
use crate::mcp::server::PromptHandler;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// Tone of the greeting requested from the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GreetingStyle {
    #[default]
    Friendly,
    Formal,
    Casual,
}

impl GreetingStyle {
    /// Parse a style name exactly; anything else falls back to friendly
    #[inline]
    pub fn parse(style: &str) -> Self {
        match style {
            "formal" => Self::Formal,
            "casual" => Self::Casual,
            _ => Self::Friendly,
        }
    }

    #[inline]
    pub fn instruction(self) -> &'static str {
        match self {
            Self::Friendly => "Please write a warm, friendly greeting",
            Self::Formal => "Please write a formal, professional greeting",
            Self::Casual => "Please write a casual, relaxed greeting",
        }
    }
}

/// `greet_user` prompt
pub struct GreetUserPrompt;

impl GreetUserPrompt {
    pub const NAME: &'static str = "greet_user";

    #[inline]
    pub fn prompt_definition() -> Prompt {
        Prompt {
            name: Self::NAME.to_string(),
            description: Some("Generate a greeting prompt".to_string()),
            arguments: vec![
                PromptArgument {
                    name: "name".to_string(),
                    description: Some("Name of the person to greet".to_string()),
                    required: Some(true),
                },
                PromptArgument {
                    name: "style".to_string(),
                    description: Some("friendly, formal or casual".to_string()),
                    required: Some(false),
                },
            ],
        }
    }

    #[inline]
    pub fn render(name: &str, style: GreetingStyle) -> String {
        format!("{} for someone named {}.", style.instruction(), name)
    }
}

#[async_trait]
impl PromptHandler for GreetUserPrompt {
    #[inline]
    async fn handle(&self, arguments: HashMap<String, String>) -> Result<GetPromptResult> {
        let Some(name) = arguments.get("name") else {
            return Err(McpError::InvalidParameters {
                message: "Missing required prompt argument: name".to_string(),
            }
            .into());
        };
        let style = arguments
            .get("style")
            .map(|s| GreetingStyle::parse(s))
            .unwrap_or_default();

        Ok(GetPromptResult {
            description: Some("Generate a greeting prompt".to_string()),
            messages: vec![PromptMessage {
                role: Role::User,
                content: ToolContent::Text {
                    text: Self::render(name, style),
                },
            }],
        })
    }
}
