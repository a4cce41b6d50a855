use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::config::{Config, Transport};
use crate::mcp::McpServer;
use crate::mcp::http::serve_http;
use crate::mcp::prompts::GreetUserPrompt;
use crate::mcp::resources::{GreetingResourceHandler, Widget, WidgetResourceHandler};
use crate::mcp::tools::{AddNumbersHandler, AddTodoHandler, CompleteTodoHandler, CountLettersHandler};
use crate::todo::{SharedTodoStore, TodoStore};

const INSTRUCTIONS: &str = "Manage a to-do list with add_todo and complete_todo; \
    results render in the to-do widget. Also offers add, count_letters, \
    the greeting://{name} resource and the greet_user prompt.";

/// Command-line overrides applied on top of the configuration file
#[derive(Debug, Clone, Default)]
pub struct ServeOptions {
    pub config: Option<PathBuf>,
    pub transport: Option<Transport>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub widget: Option<PathBuf>,
}

/// Load the configuration file, then apply environment and CLI overrides.
///
/// Precedence, lowest first: defaults, file, `PORT`/`HOST`, flags.
#[inline]
pub fn resolve_config(options: &ServeOptions) -> Result<Config> {
    let path = match &options.config {
        Some(path) => path.clone(),
        None => Config::default_path()?,
    };

    let mut config = Config::load(&path)?;
    config
        .apply_env()
        .context("Invalid environment override")?;

    if let Some(transport) = options.transport {
        config.server.transport = transport;
    }
    if let Some(host) = &options.host {
        config.server.set_host(host.clone())?;
    }
    if let Some(port) = options.port {
        config.server.set_port(port)?;
    }
    if let Some(widget) = &options.widget {
        config.widget.path = widget.clone();
    }

    config.validate()?;
    Ok(config)
}

/// Create the MCP server and register every tool, resource and prompt
#[inline]
pub async fn build_server(
    config: &Config,
    widget: Widget,
    store: SharedTodoStore,
) -> Result<Arc<McpServer>> {
    let server = McpServer::new(
        config.server.name.clone(),
        env!("CARGO_PKG_VERSION").to_string(),
    )
    .context("Failed to create MCP server")?
    .with_instructions(INSTRUCTIONS);

    let widget = Arc::new(widget);
    let widget_uri = widget.uri.clone();

    server
        .register_tool(
            AddTodoHandler::tool_definition(&widget_uri),
            AddTodoHandler::new(Arc::clone(&store), widget_uri.clone()),
        )
        .await
        .context("Failed to register add_todo tool")?;

    server
        .register_tool(
            CompleteTodoHandler::tool_definition(&widget_uri),
            CompleteTodoHandler::new(Arc::clone(&store), widget_uri.clone()),
        )
        .await
        .context("Failed to register complete_todo tool")?;

    server
        .register_tool(AddNumbersHandler::tool_definition(), AddNumbersHandler)
        .await
        .context("Failed to register add tool")?;

    server
        .register_tool(CountLettersHandler::tool_definition(), CountLettersHandler)
        .await
        .context("Failed to register count_letters tool")?;

    server
        .register_resource(
            widget.resource_definition(),
            WidgetResourceHandler::new(Arc::clone(&widget)),
        )
        .await
        .context("Failed to register widget resource")?;

    server
        .register_resource_template(
            GreetingResourceHandler::template_definition(),
            GreetingResourceHandler,
        )
        .await
        .context("Failed to register greeting resource")?;

    server
        .register_prompt(GreetUserPrompt::prompt_definition(), GreetUserPrompt)
        .await
        .context("Failed to register greet_user prompt")?;

    Ok(Arc::new(server))
}

/// Start the MCP server on the configured transport
#[inline]
pub async fn serve_mcp(options: ServeOptions) -> Result<()> {
    let config = resolve_config(&options)?;

    let widget = Widget::load(
        &config.widget.path,
        config.widget.uri.clone(),
        config.widget.name.clone(),
    )?;

    let server = build_server(&config, widget, TodoStore::shared()).await?;
    let statistics = server.server_statistics().await;
    info!(
        "MCP server initialized with tools: {}",
        statistics.registered_tools.join(", ")
    );

    match config.server.transport {
        Transport::Http => {
            let addr = config.server.socket_addr()?;
            serve_http(server, addr, &config.server.path).await
        }
        Transport::Stdio => {
            tokio::select! {
                result = Arc::clone(&server).serve_stdio() => result,
                _ = tokio::signal::ctrl_c() => {
                    info!("Received interrupt signal, shutting down");
                    Ok(())
                }
            }
        }
    }
}

/// Print the effective configuration as TOML
#[inline]
pub fn show_config(options: &ServeOptions) -> Result<()> {
    let config = resolve_config(options)?;
    print!("{}", config.to_toml()?);
    Ok(())
}
