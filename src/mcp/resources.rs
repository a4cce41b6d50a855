//! MCP Resources
//!
//! The to-do widget (a static HTML document rendered by the calling host)
//! and the `greeting://{name}` resource template.

use crate::mcp::protocol::*;
use crate::mcp::server::{ResourceHandler, ResourceTemplateHandler};
use crate::{Result as CrateResult, TodoMcpError};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// MIME type hosts expect for embeddable widget HTML
pub const WIDGET_MIME_TYPE: &str = "text/html+skybridge";

/// URI template of the greeting resource
pub const GREETING_TEMPLATE: &str = "greeting://{name}";

/// Static HTML widget, loaded once and served verbatim
#[derive(Debug, Clone)]
pub struct Widget {
    pub uri: String,
    pub name: String,
    html: Arc<str>,
}

impl Widget {
    #[inline]
    pub fn new(uri: impl Into<String>, name: impl Into<String>, html: impl Into<Arc<str>>) -> Self {
        Self {
            uri: uri.into(),
            name: name.into(),
            html: html.into(),
        }
    }

    /// Read the widget document from disk
    #[inline]
    pub fn load<P: AsRef<Path>>(
        path: P,
        uri: impl Into<String>,
        name: impl Into<String>,
    ) -> CrateResult<Self> {
        let path = path.as_ref();
        let html = fs::read_to_string(path).map_err(|e| {
            TodoMcpError::Widget(format!("Failed to read {}: {}", path.display(), e))
        })?;
        if html.trim().is_empty() {
            return Err(TodoMcpError::Widget(format!(
                "Widget file {} is empty",
                path.display()
            )));
        }

        info!("Loaded widget {} ({} bytes)", path.display(), html.len());
        Ok(Self::new(uri, name, html))
    }

    #[inline]
    pub fn html(&self) -> &str {
        &self.html
    }

    /// Resource entry advertised in `resources/list`
    #[inline]
    pub fn resource_definition(&self) -> Resource {
        let mut meta = Meta::new();
        meta.insert("openai/outputTemplate".to_string(), json!(self.uri));
        meta.insert("openai/widgetAccessible".to_string(), json!(true));
        meta.insert("openai/resultCanProduceWidget".to_string(), json!(true));
        meta.insert(
            "openai/widgetDescription".to_string(),
            json!("Interactive to-do list showing every task and its status"),
        );
        meta.insert("openai/widgetPrefersBorder".to_string(), json!(true));

        Resource {
            uri: self.uri.clone(),
            name: self.name.clone(),
            title: Some("To-do list widget".to_string()),
            description: Some("HTML widget rendering the current to-do list".to_string()),
            mime_type: Some(WIDGET_MIME_TYPE.to_string()),
            meta: Some(meta),
        }
    }
}

/// Serves the widget HTML
pub struct WidgetResourceHandler {
    widget: Arc<Widget>,
}

impl WidgetResourceHandler {
    #[inline]
    pub fn new(widget: Arc<Widget>) -> Self {
        Self { widget }
    }
}

#[async_trait]
impl ResourceHandler for WidgetResourceHandler {
    #[inline]
    async fn handle(&self, uri: &str) -> Result<ResourceContents> {
        debug!("Serving widget {}", uri);
        Ok(ResourceContents {
            uri: self.widget.uri.clone(),
            mime_type: Some(WIDGET_MIME_TYPE.to_string()),
            text: Some(self.widget.html().to_string()),
            meta: self.widget.resource_definition().meta,
        })
    }
}

/// Personalized greeting addressed by `greeting://{name}`
pub struct GreetingResourceHandler;

impl GreetingResourceHandler {
    #[inline]
    pub fn template_definition() -> ResourceTemplate {
        ResourceTemplate {
            uri_template: GREETING_TEMPLATE.to_string(),
            name: "greeting".to_string(),
            description: Some("Get a personalized greeting".to_string()),
            mime_type: Some("text/plain".to_string()),
        }
    }
}

#[async_trait]
impl ResourceTemplateHandler for GreetingResourceHandler {
    #[inline]
    async fn handle(
        &self,
        uri: &str,
        variables: HashMap<String, String>,
    ) -> Result<ResourceContents> {
        let name = variables.get("name").map_or("", String::as_str);

        Ok(ResourceContents {
            uri: uri.to_string(),
            mime_type: Some("text/plain".to_string()),
            text: Some(format!("Hello, {}!", name)),
            meta: None,
        })
    }
}

#[derive(Debug, PartialEq, Eq)]
enum TemplatePart<'a> {
    Literal(&'a str),
    Variable(&'a str),
}

fn parse_template(template: &str) -> Option<Vec<TemplatePart<'_>>> {
    let mut parts = Vec::new();
    let mut rest = template;

    while !rest.is_empty() {
        match rest.find('{') {
            Some(0) => {
                let end = rest.find('}')?;
                let name = rest.get(1..end)?;
                if name.is_empty() || name.contains('{') {
                    return None;
                }
                parts.push(TemplatePart::Variable(name));
                rest = rest.get(end + 1..)?;
            }
            Some(start) => {
                parts.push(TemplatePart::Literal(rest.get(..start)?));
                rest = rest.get(start..)?;
            }
            None => {
                if rest.contains('}') {
                    return None;
                }
                parts.push(TemplatePart::Literal(rest));
                rest = "";
            }
        }
    }

    Some(parts)
}

/// Match `uri` against a level-1 URI template such as `greeting://{name}`.
///
/// Variables match one or more characters other than `/`. Returns the bound
/// variables, or `None` when the URI does not fit the template.
#[inline]
pub fn match_uri_template(template: &str, uri: &str) -> Option<HashMap<String, String>> {
    let parts = parse_template(template)?;
    let mut variables = HashMap::new();
    let mut rest = uri;

    for (index, part) in parts.iter().enumerate() {
        match part {
            TemplatePart::Literal(literal) => {
                rest = rest.strip_prefix(literal)?;
            }
            TemplatePart::Variable(name) => {
                let value = match parts.get(index + 1) {
                    Some(TemplatePart::Literal(next)) => {
                        let end = rest.find(next)?;
                        rest.get(..end)?
                    }
                    _ => rest,
                };
                if value.is_empty() || value.contains('/') {
                    return None;
                }
                rest = rest.get(value.len()..)?;
                variables.insert((*name).to_string(), value.to_string());
            }
        }
    }

    rest.is_empty().then_some(variables)
}
