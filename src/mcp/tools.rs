//! MCP Tools Implementation
//!
//! Tool definitions and handlers. The to-do tools translate a
//! [`TodoOutcome`] into the MCP result shape and annotate it with the widget
//! metadata the host uses to render the list.

use crate::mcp::protocol::*;
use crate::mcp::server::ToolHandler;
use crate::todo::{SharedTodoStore, TodoOutcome};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info};

/// Build the `_meta` block linking a tool (or its result) to the widget
#[inline]
pub fn widget_tool_meta(widget_uri: &str, invoking: &str, invoked: &str) -> Meta {
    let mut meta = Meta::new();
    meta.insert("openai/outputTemplate".to_string(), json!(widget_uri));
    meta.insert("openai/toolInvocation/invoking".to_string(), json!(invoking));
    meta.insert("openai/toolInvocation/invoked".to_string(), json!(invoked));
    meta.insert("openai/widgetAccessible".to_string(), json!(true));
    meta.insert("openai/resultCanProduceWidget".to_string(), json!(true));
    meta
}

/// Shape a store outcome into a tool result.
///
/// Error outcomes are flagged with `isError`; the JSON-RPC call itself still
/// succeeds.
#[inline]
pub fn todo_result(outcome: TodoOutcome, meta: Meta) -> CallToolResult {
    let is_error = outcome.is_error();
    let structured = json!({
        "tasks": outcome.items,
        "message": outcome.message,
    });

    let result = if is_error {
        CallToolResult::error_text(outcome.message)
    } else {
        CallToolResult::text(outcome.message)
    };
    result.with_structured_content(structured).with_meta(meta)
}

/// `add_todo` tool handler
pub struct AddTodoHandler {
    store: SharedTodoStore,
    widget_uri: String,
}

impl AddTodoHandler {
    pub const NAME: &'static str = "add_todo";
    const INVOKING: &'static str = "Adding todo";
    const INVOKED: &'static str = "Added todo";

    #[inline]
    pub fn new(store: SharedTodoStore, widget_uri: impl Into<String>) -> Self {
        Self {
            store,
            widget_uri: widget_uri.into(),
        }
    }

    /// Create the add_todo tool definition
    #[inline]
    pub fn tool_definition(widget_uri: &str) -> Tool {
        Tool {
            name: Self::NAME.to_string(),
            title: Some("Add todo".to_string()),
            description: Some("Creates a todo item with the given title.".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "title": {
                        "type": "string",
                        "description": "Title of the todo item"
                    }
                },
                "additionalProperties": false
            }),
            meta: Some(widget_tool_meta(widget_uri, Self::INVOKING, Self::INVOKED)),
        }
    }
}

#[async_trait]
impl ToolHandler for AddTodoHandler {
    #[inline]
    async fn handle(&self, params: CallToolParams) -> Result<CallToolResult> {
        let title = params.str_arg("title").unwrap_or_default();
        debug!("Adding todo: title='{}'", title);

        let outcome = self.store.lock().await.add(title);
        if !outcome.is_error() {
            info!("{}", outcome.message);
        }

        Ok(todo_result(
            outcome,
            widget_tool_meta(&self.widget_uri, Self::INVOKING, Self::INVOKED),
        ))
    }
}

/// `complete_todo` tool handler
pub struct CompleteTodoHandler {
    store: SharedTodoStore,
    widget_uri: String,
}

impl CompleteTodoHandler {
    pub const NAME: &'static str = "complete_todo";
    const INVOKING: &'static str = "Completing todo";
    const INVOKED: &'static str = "Completed todo";

    #[inline]
    pub fn new(store: SharedTodoStore, widget_uri: impl Into<String>) -> Self {
        Self {
            store,
            widget_uri: widget_uri.into(),
        }
    }

    /// Create the complete_todo tool definition
    #[inline]
    pub fn tool_definition(widget_uri: &str) -> Tool {
        Tool {
            name: Self::NAME.to_string(),
            title: Some("Complete todo".to_string()),
            description: Some("Marks a todo as done by id.".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "id": {
                        "type": "string",
                        "description": "Identifier of the todo item, e.g. todo-1"
                    }
                },
                "additionalProperties": false
            }),
            meta: Some(widget_tool_meta(widget_uri, Self::INVOKING, Self::INVOKED)),
        }
    }
}

#[async_trait]
impl ToolHandler for CompleteTodoHandler {
    #[inline]
    async fn handle(&self, params: CallToolParams) -> Result<CallToolResult> {
        let id = params.str_arg("id").unwrap_or_default();
        debug!("Completing todo: id='{}'", id);

        let outcome = self.store.lock().await.complete(id);
        if !outcome.is_error() {
            info!("{}", outcome.message);
        }

        Ok(todo_result(
            outcome,
            widget_tool_meta(&self.widget_uri, Self::INVOKING, Self::INVOKED),
        ))
    }
}

/// `add` tool handler: integer addition
pub struct AddNumbersHandler;

impl AddNumbersHandler {
    pub const NAME: &'static str = "add";

    /// Create the add tool definition
    #[inline]
    pub fn tool_definition() -> Tool {
        Tool {
            name: Self::NAME.to_string(),
            title: None,
            description: Some("Add two numbers".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "a": {"type": "integer"},
                    "b": {"type": "integer"}
                },
                "required": ["a", "b"],
                "additionalProperties": false
            }),
            meta: None,
        }
    }
}

#[async_trait]
impl ToolHandler for AddNumbersHandler {
    #[inline]
    async fn handle(&self, params: CallToolParams) -> Result<CallToolResult> {
        let (Some(a), Some(b)) = (params.i64_arg("a"), params.i64_arg("b")) else {
            return Ok(CallToolResult::error_text(
                "Both a and b must be integers.",
            ));
        };

        match a.checked_add(b) {
            Some(sum) => Ok(CallToolResult::text(sum.to_string())
                .with_structured_content(json!({ "result": sum }))),
            None => Ok(CallToolResult::error_text(format!(
                "{} + {} overflows a 64-bit integer.",
                a, b
            ))),
        }
    }
}

/// `count_letters` tool handler
pub struct CountLettersHandler;

impl CountLettersHandler {
    pub const NAME: &'static str = "count_letters";

    /// Create the count_letters tool definition
    #[inline]
    pub fn tool_definition() -> Tool {
        Tool {
            name: Self::NAME.to_string(),
            title: None,
            description: Some(
                "Count how many times a letter occurs in a word, ignoring case".to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "word": {"type": "string"},
                    "letter": {
                        "type": "string",
                        "description": "A single character"
                    }
                },
                "required": ["word", "letter"],
                "additionalProperties": false
            }),
            meta: None,
        }
    }

    /// Case-insensitive occurrences of `letter` in `word`
    #[inline]
    pub fn count(word: &str, letter: char) -> usize {
        word.chars()
            .filter(|c| c.to_lowercase().eq(letter.to_lowercase()))
            .count()
    }
}

#[async_trait]
impl ToolHandler for CountLettersHandler {
    #[inline]
    async fn handle(&self, params: CallToolParams) -> Result<CallToolResult> {
        let word = params.str_arg("word").unwrap_or_default();
        let letter = params.str_arg("letter").unwrap_or_default();

        let mut chars = letter.chars();
        let (Some(target), None) = (chars.next(), chars.next()) else {
            return Ok(CallToolResult::error_text(format!(
                "Expected a single letter, got \"{}\".",
                letter
            )));
        };

        let count = Self::count(word, target);
        Ok(CallToolResult::text(count.to_string()).with_structured_content(json!({
            "word": word,
            "letter": letter,
            "count": count,
        })))
    }
}
