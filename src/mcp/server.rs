//! MCP Server Implementation
//!
//! This module provides the core MCP server framework with handler
//! registration, message routing, and protocol compliance. Transports feed
//! raw JSON values into [`MessageHandler::handle_value`] and write back
//! whatever message it returns.

use crate::mcp::errors::{ErrorHandler, McpError};
use crate::mcp::protocol::*;
use crate::mcp::resources::match_uri_template;
use crate::mcp::validation::McpValidator;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::io;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// MCP Server state and configuration
pub struct McpServer {
    /// Server implementation information
    pub server_info: Implementation,
    /// Server capabilities
    pub capabilities: ServerCapabilities,
    /// Instructions returned to the client on initialize
    pub instructions: Option<String>,
    /// Registered tools
    pub tools: Arc<RwLock<HashMap<String, Tool>>>,
    /// Registered resources, keyed by URI
    pub resources: Arc<RwLock<HashMap<String, Resource>>>,
    /// Registered resource templates, keyed by URI template
    pub resource_templates: Arc<RwLock<HashMap<String, ResourceTemplate>>>,
    /// Registered prompts
    pub prompts: Arc<RwLock<HashMap<String, Prompt>>>,
    /// Tool handlers
    pub tool_handlers: Arc<RwLock<HashMap<String, Arc<dyn ToolHandler>>>>,
    /// Resource handlers
    pub resource_handlers: Arc<RwLock<HashMap<String, Arc<dyn ResourceHandler>>>>,
    /// Resource template handlers
    pub template_handlers: Arc<RwLock<HashMap<String, Arc<dyn ResourceTemplateHandler>>>>,
    /// Prompt handlers
    pub prompt_handlers: Arc<RwLock<HashMap<String, Arc<dyn PromptHandler>>>>,
    /// Connection state
    pub connection_state: Arc<RwLock<ConnectionState>>,
    /// Message validator
    pub validator: Arc<RwLock<McpValidator>>,
    started_at: Instant,
}

/// Connection state tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Uninitialized,
    Initializing,
    Ready,
    Closed,
}

/// Tool handler trait for implementing tool execution
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn handle(&self, params: CallToolParams) -> Result<CallToolResult>;
}

/// Resource handler trait for implementing resource access
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    async fn handle(&self, uri: &str) -> Result<ResourceContents>;
}

/// Handler for resources addressed through a URI template
#[async_trait]
pub trait ResourceTemplateHandler: Send + Sync {
    async fn handle(&self, uri: &str, variables: HashMap<String, String>)
    -> Result<ResourceContents>;
}

/// Prompt handler trait for rendering prompts
#[async_trait]
pub trait PromptHandler: Send + Sync {
    async fn handle(&self, arguments: HashMap<String, String>) -> Result<GetPromptResult>;
}

/// Message handler for processing incoming messages
pub struct MessageHandler {
    server: Arc<McpServer>,
}

impl McpServer {
    /// Create a new MCP server
    #[inline]
    pub fn new(name: String, version: String) -> Result<Self> {
        let server_info = Implementation { name, version };

        let capabilities = ServerCapabilities {
            experimental: None,
            logging: Some(LoggingCapability {}),
            prompts: Some(PromptsCapability {
                list_changed: Some(false),
            }),
            resources: Some(ResourcesCapability {
                subscribe: Some(false),
                list_changed: Some(false),
            }),
            tools: Some(ToolsCapability {
                list_changed: Some(false),
            }),
        };

        let validator = McpValidator::new()?;

        Ok(Self {
            server_info,
            capabilities,
            instructions: None,
            tools: Arc::new(RwLock::new(HashMap::new())),
            resources: Arc::new(RwLock::new(HashMap::new())),
            resource_templates: Arc::new(RwLock::new(HashMap::new())),
            prompts: Arc::new(RwLock::new(HashMap::new())),
            tool_handlers: Arc::new(RwLock::new(HashMap::new())),
            resource_handlers: Arc::new(RwLock::new(HashMap::new())),
            template_handlers: Arc::new(RwLock::new(HashMap::new())),
            prompt_handlers: Arc::new(RwLock::new(HashMap::new())),
            connection_state: Arc::new(RwLock::new(ConnectionState::Uninitialized)),
            validator: Arc::new(RwLock::new(validator)),
            started_at: Instant::now(),
        })
    }

    /// Set the instructions sent back in the initialize result
    #[inline]
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Register a tool with the server
    #[inline]
    pub async fn register_tool<H>(&self, tool: Tool, handler: H) -> Result<()>
    where
        H: ToolHandler + 'static,
    {
        let tool_name = tool.name.clone();

        self.validator
            .write()
            .await
            .add_tool_schema(&tool)
            .with_context(|| format!("Invalid input schema for tool {}", tool_name))?;

        {
            let mut tools = self.tools.write().await;
            tools.insert(tool_name.clone(), tool);
        }

        {
            let mut handlers = self.tool_handlers.write().await;
            handlers.insert(tool_name.clone(), Arc::new(handler));
        }

        debug!("Registered tool: {}", tool_name);
        Ok(())
    }

    /// Register a resource with the server
    #[inline]
    pub async fn register_resource<H>(&self, resource: Resource, handler: H) -> Result<()>
    where
        H: ResourceHandler + 'static,
    {
        let resource_uri = resource.uri.clone();

        {
            let mut resources = self.resources.write().await;
            resources.insert(resource_uri.clone(), resource);
        }

        {
            let mut handlers = self.resource_handlers.write().await;
            handlers.insert(resource_uri.clone(), Arc::new(handler));
        }

        debug!("Registered resource: {}", resource_uri);
        Ok(())
    }

    /// Register a resource template with the server
    #[inline]
    pub async fn register_resource_template<H>(
        &self,
        template: ResourceTemplate,
        handler: H,
    ) -> Result<()>
    where
        H: ResourceTemplateHandler + 'static,
    {
        let uri_template = template.uri_template.clone();
        if !uri_template.contains('{') {
            return Err(anyhow!(
                "Resource template has no variables: {}",
                uri_template
            ));
        }

        {
            let mut templates = self.resource_templates.write().await;
            templates.insert(uri_template.clone(), template);
        }

        {
            let mut handlers = self.template_handlers.write().await;
            handlers.insert(uri_template.clone(), Arc::new(handler));
        }

        debug!("Registered resource template: {}", uri_template);
        Ok(())
    }

    /// Register a prompt with the server
    #[inline]
    pub async fn register_prompt<H>(&self, prompt: Prompt, handler: H) -> Result<()>
    where
        H: PromptHandler + 'static,
    {
        let prompt_name = prompt.name.clone();

        {
            let mut prompts = self.prompts.write().await;
            prompts.insert(prompt_name.clone(), prompt);
        }

        {
            let mut handlers = self.prompt_handlers.write().await;
            handlers.insert(prompt_name.clone(), Arc::new(handler));
        }

        debug!("Registered prompt: {}", prompt_name);
        Ok(())
    }

    /// Start the server using stdio transport
    #[inline]
    pub async fn serve_stdio(self: Arc<Self>) -> Result<()> {
        info!("Starting MCP server with stdio transport");

        let stdin = io::stdin();
        let mut stdout = io::stdout();
        let mut reader = BufReader::new(stdin);
        let handler = MessageHandler::new(Arc::clone(&self));

        let mut line = String::new();
        loop {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) => {
                    info!("EOF reached, closing connection");
                    break;
                }
                Ok(_) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }

                    if let Some(reply) = handler.handle_line(line).await {
                        self.send_message(&mut stdout, &reply).await?;
                    }
                }
                Err(e) => {
                    error!("Error reading from stdin: {}", e);
                    break;
                }
            }
        }

        {
            let mut state = self.connection_state.write().await;
            *state = ConnectionState::Closed;
        }

        info!("MCP server stopped");
        Ok(())
    }

    /// Send a message to the client
    async fn send_message<W>(&self, writer: &mut W, message: &JsonRpcMessage) -> Result<()>
    where
        W: AsyncWriteExt + Unpin,
    {
        let json = serde_json::to_string(message)?;
        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }

    /// Get current connection state
    #[inline]
    pub async fn connection_state(&self) -> ConnectionState {
        *self.connection_state.read().await
    }

    /// Snapshot of registration counts and uptime
    #[inline]
    pub async fn health_status(&self) -> ServerHealthStatus {
        ServerHealthStatus {
            connection_state: self.connection_state().await,
            tools_registered: self.tools.read().await.len(),
            resources_registered: self.resources.read().await.len()
                + self.resource_templates.read().await.len(),
            prompts_registered: self.prompts.read().await.len(),
            uptime: self.started_at.elapsed(),
        }
    }

    /// Names of everything registered on the server, sorted
    #[inline]
    pub async fn server_statistics(&self) -> ServerStatistics {
        ServerStatistics {
            server_info: self.server_info.clone(),
            capabilities: self.capabilities.clone(),
            connection_state: self.connection_state().await,
            registered_tools: sorted_keys(&*self.tools.read().await),
            registered_resources: sorted_keys(&*self.resources.read().await),
            registered_resource_templates: sorted_keys(&*self.resource_templates.read().await),
            registered_prompts: sorted_keys(&*self.prompts.read().await),
        }
    }
}

fn sorted_keys<V>(map: &HashMap<String, V>) -> Vec<String> {
    let mut keys: Vec<String> = map.keys().cloned().collect();
    keys.sort();
    keys
}

impl Clone for McpServer {
    #[inline]
    fn clone(&self) -> Self {
        Self {
            server_info: self.server_info.clone(),
            capabilities: self.capabilities.clone(),
            instructions: self.instructions.clone(),
            tools: Arc::clone(&self.tools),
            resources: Arc::clone(&self.resources),
            resource_templates: Arc::clone(&self.resource_templates),
            prompts: Arc::clone(&self.prompts),
            tool_handlers: Arc::clone(&self.tool_handlers),
            resource_handlers: Arc::clone(&self.resource_handlers),
            template_handlers: Arc::clone(&self.template_handlers),
            prompt_handlers: Arc::clone(&self.prompt_handlers),
            connection_state: Arc::clone(&self.connection_state),
            validator: Arc::clone(&self.validator),
            started_at: self.started_at,
        }
    }
}

impl MessageHandler {
    /// Create a new message handler
    #[inline]
    pub fn new(server: Arc<McpServer>) -> Self {
        Self { server }
    }

    /// Parse and process one line of JSON text
    #[inline]
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcMessage> {
        match serde_json::from_str::<Value>(line) {
            Ok(value) => self.handle_value(value).await,
            Err(e) => {
                let error = McpError::ParseError {
                    message: e.to_string(),
                };
                error.log();
                Some(error.to_error_response(None))
            }
        }
    }

    /// Validate and process a raw JSON-RPC value.
    ///
    /// Returns the message to send back, or `None` when the input was a
    /// notification or a client-side response.
    #[inline]
    pub async fn handle_value(&self, raw_value: Value) -> Option<JsonRpcMessage> {
        let validated = self.server.validator.read().await.validate_raw_message(&raw_value);
        match validated {
            Ok(message) => self.process_message(message).await,
            Err(e) => {
                let id = raw_value
                    .get("id")
                    .and_then(|id| serde_json::from_value::<RequestId>(id.clone()).ok());
                let error = McpError::InvalidRequest {
                    message: e.to_string(),
                };
                error.log();
                Some(error.to_error_response(id))
            }
        }
    }

    /// Process an incoming message
    #[inline]
    pub async fn process_message(&self, message: JsonRpcMessage) -> Option<JsonRpcMessage> {
        match message {
            JsonRpcMessage::Request(request) => Some(self.handle_request(request).await),
            JsonRpcMessage::Notification(notification) => {
                self.handle_notification(notification).await;
                None
            }
            JsonRpcMessage::Response(_) | JsonRpcMessage::ErrorResponse(_) => {
                warn!("Received unexpected response message from client");
                None
            }
        }
    }

    /// Handle a JSON-RPC request
    async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcMessage {
        if let Some(params) = &request.params {
            let checked = self
                .server
                .validator
                .read()
                .await
                .validate_method_params(&request.method, params);
            if let Err(e) = checked {
                return ErrorHandler::handle_error(&e, Some(request.id));
            }
        }

        let response = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.params).await,
            "tools/list" => self.handle_list_tools().await,
            "tools/call" => self.handle_call_tool(request.params).await,
            "resources/list" => self.handle_list_resources().await,
            "resources/templates/list" => self.handle_list_resource_templates().await,
            "resources/read" => self.handle_read_resource(request.params).await,
            "prompts/list" => self.handle_list_prompts().await,
            "prompts/get" => self.handle_get_prompt(request.params).await,
            "ping" => Ok(serde_json::json!({})),
            _ => Err(McpError::MethodNotFound {
                method: request.method.clone(),
            }
            .into()),
        };

        match response {
            Ok(result) => JsonRpcMessage::Response(JsonRpcResponse::new(result, request.id)),
            Err(e) => {
                debug!("Request {} failed: {:#}", request.method, e);
                ErrorHandler::handle_error(&e, Some(request.id))
            }
        }
    }

    /// Handle a JSON-RPC notification
    async fn handle_notification(&self, notification: JsonRpcNotification) {
        match notification.method.as_str() {
            "notifications/initialized" | "initialized" => self.handle_initialized().await,
            "notifications/cancelled" => {
                debug!("Received cancellation notification");
            }
            _ => {
                warn!("Unknown notification method: {}", notification.method);
            }
        }
    }

    /// Handle initialize request.
    ///
    /// A client asking for an unknown protocol version is answered with the
    /// newest version this server speaks.
    #[inline]
    pub async fn handle_initialize(&self, params: Option<Value>) -> Result<Value> {
        let params: InitializeParams = parse_params(params, "initialize")?;

        let protocol_version = {
            let validator = self.server.validator.read().await;
            if validator.is_protocol_version_supported(&params.protocol_version) {
                params.protocol_version.clone()
            } else {
                warn!(
                    "Client requested unsupported protocol version {}; offering {}",
                    params.protocol_version, MCP_VERSION
                );
                MCP_VERSION.to_string()
            }
        };

        {
            let mut state = self.server.connection_state.write().await;
            *state = ConnectionState::Initializing;
        }

        let result = InitializeResult {
            protocol_version,
            capabilities: self.server.capabilities.clone(),
            server_info: self.server.server_info.clone(),
            instructions: self.server.instructions.clone(),
        };

        info!(
            "Client initialized: {} {}",
            params.client_info.name, params.client_info.version
        );
        Ok(serde_json::to_value(result)?)
    }

    /// Handle initialized notification
    async fn handle_initialized(&self) {
        {
            let mut state = self.server.connection_state.write().await;
            *state = ConnectionState::Ready;
        }

        info!("Server ready to handle requests");
    }

    /// Handle list tools request
    #[inline]
    pub async fn handle_list_tools(&self) -> Result<Value> {
        let tools = self.server.tools.read().await;
        let mut tools_vec: Vec<Tool> = tools.values().cloned().collect();
        tools_vec.sort_by(|a, b| a.name.cmp(&b.name));

        let result = ListToolsResult { tools: tools_vec };
        Ok(serde_json::to_value(result)?)
    }

    /// Handle call tool request
    #[inline]
    pub async fn handle_call_tool(&self, params: Option<Value>) -> Result<Value> {
        let params: CallToolParams = parse_params(params, "tools/call")?;

        let handler = self
            .server
            .tool_handlers
            .read()
            .await
            .get(&params.name)
            .cloned()
            .ok_or_else(|| McpError::ToolNotFound {
                name: params.name.clone(),
            })?;

        let no_arguments = HashMap::new();
        self.server
            .validator
            .read()
            .await
            .validate_tool_arguments(
                &params.name,
                params.arguments.as_ref().unwrap_or(&no_arguments),
            )?;

        debug!("Calling tool: {}", params.name);
        let result = handler.handle(params).await?;
        Ok(serde_json::to_value(result)?)
    }

    /// Handle list resources request
    #[inline]
    pub async fn handle_list_resources(&self) -> Result<Value> {
        let resources = self.server.resources.read().await;
        let mut resources_vec: Vec<Resource> = resources.values().cloned().collect();
        resources_vec.sort_by(|a, b| a.uri.cmp(&b.uri));

        let result = ListResourcesResult {
            resources: resources_vec,
        };
        Ok(serde_json::to_value(result)?)
    }

    /// Handle list resource templates request
    #[inline]
    pub async fn handle_list_resource_templates(&self) -> Result<Value> {
        let templates = self.server.resource_templates.read().await;
        let mut templates_vec: Vec<ResourceTemplate> = templates.values().cloned().collect();
        templates_vec.sort_by(|a, b| a.uri_template.cmp(&b.uri_template));

        let result = ListResourceTemplatesResult {
            resource_templates: templates_vec,
        };
        Ok(serde_json::to_value(result)?)
    }

    /// Handle read resource request.
    ///
    /// Exact URIs take precedence over templates.
    #[inline]
    pub async fn handle_read_resource(&self, params: Option<Value>) -> Result<Value> {
        let params: ReadResourceParams = parse_params(params, "resources/read")?;
        let uri = params.uri.as_str();

        let direct = self.server.resource_handlers.read().await.get(uri).cloned();
        let contents = if let Some(handler) = direct {
            handler.handle(uri).await?
        } else {
            let (handler, variables) = self.find_template(uri).await.ok_or_else(|| {
                McpError::ResourceNotFound {
                    uri: uri.to_string(),
                }
            })?;
            handler.handle(uri, variables).await?
        };

        let result = ReadResourceResult {
            contents: vec![contents],
        };
        Ok(serde_json::to_value(result)?)
    }

    async fn find_template(
        &self,
        uri: &str,
    ) -> Option<(Arc<dyn ResourceTemplateHandler>, HashMap<String, String>)> {
        let handlers = self.server.template_handlers.read().await;
        let mut templates: Vec<&String> = handlers.keys().collect();
        templates.sort();

        templates.into_iter().find_map(|template| {
            let variables = match_uri_template(template, uri)?;
            let handler = handlers.get(template)?;
            Some((Arc::clone(handler), variables))
        })
    }

    /// Handle list prompts request
    #[inline]
    pub async fn handle_list_prompts(&self) -> Result<Value> {
        let prompts = self.server.prompts.read().await;
        let mut prompts_vec: Vec<Prompt> = prompts.values().cloned().collect();
        prompts_vec.sort_by(|a, b| a.name.cmp(&b.name));

        let result = ListPromptsResult {
            prompts: prompts_vec,
        };
        Ok(serde_json::to_value(result)?)
    }

    /// Handle get prompt request
    #[inline]
    pub async fn handle_get_prompt(&self, params: Option<Value>) -> Result<Value> {
        let params: GetPromptParams = parse_params(params, "prompts/get")?;

        let handler = self
            .server
            .prompt_handlers
            .read()
            .await
            .get(&params.name)
            .cloned()
            .ok_or_else(|| McpError::PromptNotFound {
                name: params.name.clone(),
            })?;

        let result = handler.handle(params.arguments.unwrap_or_default()).await?;
        Ok(serde_json::to_value(result)?)
    }
}

fn parse_params<T>(params: Option<Value>, method: &str) -> Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let Some(params) = params else {
        return Err(McpError::InvalidParameters {
            message: format!("{} request missing parameters", method),
        }
        .into());
    };

    serde_json::from_value(params).map_err(|e| {
        McpError::InvalidParameters {
            message: format!("Invalid {} parameters: {}", method, e),
        }
        .into()
    })
}
