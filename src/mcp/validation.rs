//! MCP Message Validation
//!
//! JSON Schema validation for incoming JSON-RPC envelopes, method parameters
//! and tool arguments.

use crate::mcp::errors::{McpError, McpResult};
use crate::mcp::protocol::*;
use anyhow::{Result, anyhow};
use jsonschema::{Draft, JSONSchema};
use serde_json::{Value, json};
use std::collections::HashMap;
use tracing::debug;

const TOOL_SCHEMA_PREFIX: &str = "tool:";

/// JSON Schema validator for MCP messages
#[derive(Debug)]
pub struct McpValidator {
    schemas: HashMap<String, JSONSchema>,
}

impl McpValidator {
    /// Create a new MCP validator with built-in schemas
    #[inline]
    pub fn new() -> Result<Self> {
        let mut validator = Self {
            schemas: HashMap::new(),
        };

        validator.load_builtin_schemas()?;

        Ok(validator)
    }

    /// Load built-in JSON schemas for MCP message types
    fn load_builtin_schemas(&mut self) -> Result<()> {
        let request_id = json!({
            "oneOf": [
                {"type": "string"},
                {"type": "integer"}
            ]
        });

        let request_schema = json!({
            "type": "object",
            "properties": {
                "jsonrpc": {
                    "type": "string",
                    "const": "2.0"
                },
                "method": {"type": "string"},
                "params": {"type": "object"},
                "id": request_id
            },
            "required": ["jsonrpc", "method", "id"]
        });
        self.add_schema("jsonrpc_request", &request_schema)?;

        let response_schema = json!({
            "type": "object",
            "properties": {
                "jsonrpc": {
                    "type": "string",
                    "const": "2.0"
                },
                "result": {},
                "id": request_id
            },
            "required": ["jsonrpc", "result", "id"]
        });
        self.add_schema("jsonrpc_response", &response_schema)?;

        let error_response_schema = json!({
            "type": "object",
            "properties": {
                "jsonrpc": {
                    "type": "string",
                    "const": "2.0"
                },
                "error": {
                    "type": "object",
                    "properties": {
                        "code": {"type": "integer"},
                        "message": {"type": "string"},
                        "data": {}
                    },
                    "required": ["code", "message"]
                },
                "id": {
                    "oneOf": [
                        {"type": "string"},
                        {"type": "integer"},
                        {"type": "null"}
                    ]
                }
            },
            "required": ["jsonrpc", "error", "id"]
        });
        self.add_schema("jsonrpc_error_response", &error_response_schema)?;

        let notification_schema = json!({
            "type": "object",
            "properties": {
                "jsonrpc": {
                    "type": "string",
                    "const": "2.0"
                },
                "method": {"type": "string"},
                "params": {"type": "object"}
            },
            "required": ["jsonrpc", "method"]
        });
        self.add_schema("jsonrpc_notification", &notification_schema)?;

        let initialize_schema = json!({
            "type": "object",
            "properties": {
                "protocolVersion": {"type": "string"},
                "capabilities": {"type": "object"},
                "clientInfo": {
                    "type": "object",
                    "properties": {
                        "name": {"type": "string"},
                        "version": {"type": "string"}
                    },
                    "required": ["name", "version"]
                }
            },
            "required": ["protocolVersion", "capabilities", "clientInfo"]
        });
        self.add_schema("initialize_params", &initialize_schema)?;

        let tool_call_schema = json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "arguments": {"type": "object"}
            },
            "required": ["name"]
        });
        self.add_schema("call_tool_params", &tool_call_schema)?;

        let read_resource_schema = json!({
            "type": "object",
            "properties": {
                "uri": {"type": "string", "minLength": 1}
            },
            "required": ["uri"]
        });
        self.add_schema("read_resource_params", &read_resource_schema)?;

        let get_prompt_schema = json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "arguments": {
                    "type": "object",
                    "additionalProperties": {"type": "string"}
                }
            },
            "required": ["name"]
        });
        self.add_schema("get_prompt_params", &get_prompt_schema)?;

        debug!("Loaded {} built-in JSON schemas", self.schemas.len());
        Ok(())
    }

    /// Add a JSON schema to the validator
    #[inline]
    pub fn add_schema(&mut self, name: &str, schema: &Value) -> Result<()> {
        let compiled = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(schema)
            .map_err(|e| anyhow!("Failed to compile schema '{}': {}", name, e))?;

        self.schemas.insert(name.to_string(), compiled);
        Ok(())
    }

    /// Compile a tool's input schema so its arguments can be checked on call
    #[inline]
    pub fn add_tool_schema(&mut self, tool: &Tool) -> Result<()> {
        self.add_schema(
            &format!("{}{}", TOOL_SCHEMA_PREFIX, tool.name),
            &tool.input_schema,
        )
    }

    /// Validate the envelope of a JSON-RPC request
    #[inline]
    pub fn validate_request(&self, request: &JsonRpcRequest) -> Result<()> {
        let request_value = serde_json::to_value(request)?;
        self.validate_with_schema("jsonrpc_request", &request_value)
    }

    /// Validate a JSON-RPC response
    #[inline]
    pub fn validate_response(&self, response: &JsonRpcResponse) -> Result<()> {
        let response_value = serde_json::to_value(response)?;
        self.validate_with_schema("jsonrpc_response", &response_value)
    }

    /// Validate a JSON-RPC error response
    #[inline]
    pub fn validate_error_response(&self, error_response: &JsonRpcErrorResponse) -> Result<()> {
        let error_value = serde_json::to_value(error_response)?;
        self.validate_with_schema("jsonrpc_error_response", &error_value)
    }

    /// Validate a JSON-RPC notification
    #[inline]
    pub fn validate_notification(&self, notification: &JsonRpcNotification) -> Result<()> {
        let notification_value = serde_json::to_value(notification)?;
        self.validate_with_schema("jsonrpc_notification", &notification_value)
    }

    /// Validate method-specific parameters.
    ///
    /// Failures are `McpError::ValidationError`, answered as invalid params.
    #[inline]
    pub fn validate_method_params(&self, method: &str, params: &Value) -> Result<()> {
        let schema_name = match method {
            "initialize" => "initialize_params",
            "tools/call" => "call_tool_params",
            "resources/read" => "read_resource_params",
            "prompts/get" => "get_prompt_params",
            _ => {
                debug!("No parameter validation schema for method: {}", method);
                return Ok(());
            }
        };

        self.validate_with_schema(schema_name, params)
    }

    /// Validate call arguments against the registered tool schema.
    ///
    /// Tools registered without a schema are not checked.
    #[inline]
    pub fn validate_tool_arguments(
        &self,
        tool: &str,
        arguments: &HashMap<String, Value>,
    ) -> McpResult<()> {
        let Some(schema) = self.schemas.get(&format!("{}{}", TOOL_SCHEMA_PREFIX, tool)) else {
            return Ok(());
        };

        let value = serde_json::to_value(arguments)?;
        if let Err(errors) = schema.validate(&value) {
            let message = errors
                .map(|e| {
                    let path = e.instance_path.to_string();
                    if path.is_empty() {
                        e.to_string()
                    } else {
                        format!("{}: {}", path, e)
                    }
                })
                .collect::<Vec<_>>()
                .join(", ");
            return Err(McpError::InvalidToolParameters {
                tool: tool.to_string(),
                message,
            });
        }

        Ok(())
    }

    /// Validate a value against a named schema
    #[inline]
    pub fn validate_with_schema(&self, schema_name: &str, value: &Value) -> Result<()> {
        let schema = self
            .schemas
            .get(schema_name)
            .ok_or_else(|| anyhow!("Schema '{}' not found", schema_name))?;

        let validation_result = schema.validate(value);
        if let Err(errors) = validation_result {
            let error_messages: Vec<String> = errors
                .into_iter()
                .map(|e| format!("{}:{}", e.instance_path, e))
                .collect();

            return Err(McpError::ValidationError {
                message: format!(
                    "Schema validation failed for '{}': {}",
                    schema_name,
                    error_messages.join(", ")
                ),
            }
            .into());
        }

        Ok(())
    }

    /// Validate a raw JSON value as a JSON-RPC message
    #[inline]
    pub fn validate_raw_message(&self, value: &Value) -> Result<JsonRpcMessage> {
        if let Ok(request) = serde_json::from_value::<JsonRpcRequest>(value.clone()) {
            self.validate_request(&request)?;
            return Ok(JsonRpcMessage::Request(request));
        }

        if let Ok(response) = serde_json::from_value::<JsonRpcResponse>(value.clone()) {
            self.validate_response(&response)?;
            return Ok(JsonRpcMessage::Response(response));
        }

        if let Ok(error_response) = serde_json::from_value::<JsonRpcErrorResponse>(value.clone()) {
            self.validate_error_response(&error_response)?;
            return Ok(JsonRpcMessage::ErrorResponse(error_response));
        }

        if value.get("id").is_none() {
            if let Ok(notification) = serde_json::from_value::<JsonRpcNotification>(value.clone())
            {
                self.validate_notification(&notification)?;
                return Ok(JsonRpcMessage::Notification(notification));
            }
        }

        Err(anyhow!(
            "Value does not match any known JSON-RPC message type"
        ))
    }

    /// Check if a protocol version is supported
    #[inline]
    pub fn is_protocol_version_supported(&self, version: &str) -> bool {
        self.supported_protocol_versions().contains(&version)
    }

    /// Get supported protocol versions, newest first
    #[inline]
    pub fn supported_protocol_versions(&self) -> Vec<&'static str> {
        vec![MCP_VERSION, MCP_LEGACY_VERSION]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add_todo_tool() -> Tool {
        Tool {
            name: "add_todo".to_string(),
            title: None,
            description: None,
            input_schema: json!({
                "type": "object",
                "properties": {"title": {"type": "string"}},
                "additionalProperties": false
            }),
            meta: None,
        }
    }

    fn args(value: Value) -> HashMap<String, Value> {
        serde_json::from_value(value).expect("arguments are an object")
    }

    #[test]
    fn validator_creation() {
        let validator = McpValidator::new().expect("validator is ok");
        assert!(!validator.schemas.is_empty());
    }

    #[test]
    fn protocol_version_validation() {
        let validator = McpValidator::new().expect("validator is ok");

        assert!(validator.is_protocol_version_supported(MCP_VERSION));
        assert!(validator.is_protocol_version_supported(MCP_LEGACY_VERSION));
        assert!(!validator.is_protocol_version_supported("invalid-version"));
    }

    #[test]
    fn request_validation() {
        let validator = McpValidator::new().expect("validator is ok");

        let valid_request = JsonRpcRequest::new(
            "test_method".to_string(),
            Some(json!({"key": "value"})),
            RequestId::String("test-id".to_string()),
        );

        assert!(validator.validate_request(&valid_request).is_ok());
    }

    #[test]
    fn initialize_params_validation() {
        let validator = McpValidator::new().expect("validator is ok");

        let params = json!({
            "protocolVersion": "2025-06-18",
            "capabilities": {},
            "clientInfo": {
                "name": "test-client",
                "version": "1.0.0"
            }
        });
        assert!(
            validator
                .validate_with_schema("initialize_params", &params)
                .is_ok()
        );

        let missing_client = json!({"protocolVersion": "2025-06-18"});
        assert!(
            validator
                .validate_with_schema("initialize_params", &missing_client)
                .is_err()
        );
    }

    #[test]
    fn read_resource_requires_uri() {
        let validator = McpValidator::new().expect("validator is ok");
        let request = JsonRpcRequest::new(
            "resources/read".to_string(),
            Some(json!({})),
            RequestId::Number(3),
        );
        assert!(validator.validate_request(&request).is_ok());

        let err = validator
            .validate_method_params("resources/read", &json!({}))
            .expect_err("uri is required");
        assert!(matches!(
            err.downcast_ref::<McpError>(),
            Some(McpError::ValidationError { .. })
        ));
    }

    #[test]
    fn tool_call_arguments_must_be_an_object() {
        let validator = McpValidator::new().expect("validator is ok");
        assert!(
            validator
                .validate_method_params("tools/call", &json!({"name": "add", "arguments": [1, 2]}))
                .is_err()
        );
        assert!(
            validator
                .validate_method_params("tools/call", &json!({"name": "add", "arguments": {}}))
                .is_ok()
        );
    }

    #[test]
    fn raw_notification_is_recognized() {
        let validator = McpValidator::new().expect("validator is ok");
        let message = validator
            .validate_raw_message(&json!({
                "jsonrpc": "2.0",
                "method": "notifications/initialized"
            }))
            .expect("valid notification");
        assert!(matches!(message, JsonRpcMessage::Notification(_)));
    }

    #[test]
    fn raw_message_with_wrong_version_is_rejected() {
        let validator = McpValidator::new().expect("validator is ok");
        let result = validator.validate_raw_message(&json!({
            "jsonrpc": "1.0",
            "method": "ping",
            "id": 1
        }));
        assert!(result.is_err());
    }

    #[test]
    fn tool_arguments_checked_against_tool_schema() {
        let mut validator = McpValidator::new().expect("validator is ok");
        validator
            .add_tool_schema(&add_todo_tool())
            .expect("schema compiles");

        assert!(
            validator
                .validate_tool_arguments("add_todo", &args(json!({"title": "Buy milk"})))
                .is_ok()
        );
        assert!(
            validator
                .validate_tool_arguments("add_todo", &args(json!({})))
                .is_ok()
        );

        let err = validator
            .validate_tool_arguments("add_todo", &args(json!({"title": 42})))
            .expect_err("number is not a title");
        assert!(matches!(err, McpError::InvalidToolParameters { .. }));

        assert!(
            validator
                .validate_tool_arguments("add_todo", &args(json!({"titel": "typo"})))
                .is_err()
        );
    }

    #[test]
    fn unknown_tool_arguments_pass_through() {
        let validator = McpValidator::new().expect("validator is ok");
        assert!(
            validator
                .validate_tool_arguments("no_schema", &args(json!({"anything": true})))
                .is_ok()
        );
    }
}
