//! MCP Error Handling
//!
//! Protocol-level errors and their mapping onto JSON-RPC error objects.
//! Domain failures of a tool (a missing to-do title, an unknown id) are not
//! represented here: those travel inside a successful response with
//! `isError: true`.

use crate::mcp::protocol::*;
use thiserror::Error;
use tracing::{error, warn};

/// MCP-specific errors that can occur during server operation
#[derive(Error, Debug)]
pub enum McpError {
    #[error("Tool not found: {name}")]
    ToolNotFound { name: String },

    #[error("Resource not found: {uri}")]
    ResourceNotFound { uri: String },

    #[error("Prompt not found: {name}")]
    PromptNotFound { name: String },

    #[error("Invalid tool parameters for {tool}: {message}")]
    InvalidToolParameters { tool: String, message: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Internal server error: {message}")]
    InternalError { message: String },

    #[error("JSON-RPC parse error: {message}")]
    ParseError { message: String },

    #[error("Method not found: {method}")]
    MethodNotFound { method: String },

    #[error("Invalid parameters: {message}")]
    InvalidParameters { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

impl McpError {
    /// Convert MCP error to JSON-RPC error
    #[inline]
    pub fn to_jsonrpc_error(&self) -> JsonRpcError {
        match self {
            Self::ToolNotFound { name } => JsonRpcError::new(
                mcp_error_codes::TOOL_NOT_FOUND,
                format!("Tool not found: {}", name),
                None,
            ),
            Self::ResourceNotFound { uri } => JsonRpcError::new(
                mcp_error_codes::RESOURCE_NOT_FOUND,
                format!("Resource not found: {}", uri),
                None,
            ),
            Self::PromptNotFound { name } => JsonRpcError::new(
                mcp_error_codes::PROMPT_NOT_FOUND,
                format!("Prompt not found: {}", name),
                None,
            ),
            Self::InvalidToolParameters { tool, message } => JsonRpcError::new(
                error_codes::INVALID_PARAMS,
                format!("Invalid parameters for tool '{}': {}", tool, message),
                None,
            ),
            Self::InvalidRequest { message } => {
                JsonRpcError::new(error_codes::INVALID_REQUEST, message.clone(), None)
            }
            Self::InternalError { message } => {
                JsonRpcError::new(error_codes::INTERNAL_ERROR, message.clone(), None)
            }
            Self::ParseError { message } => {
                JsonRpcError::new(error_codes::PARSE_ERROR, message.clone(), None)
            }
            Self::MethodNotFound { method } => JsonRpcError::new(
                error_codes::METHOD_NOT_FOUND,
                format!("Method not found: {}", method),
                None,
            ),
            Self::InvalidParameters { message } => {
                JsonRpcError::new(error_codes::INVALID_PARAMS, message.clone(), None)
            }
            Self::ValidationError { message } => JsonRpcError::new(
                error_codes::INVALID_PARAMS,
                format!("Validation error: {}", message),
                None,
            ),
        }
    }

    /// Create error response message
    #[inline]
    pub fn to_error_response(&self, id: Option<RequestId>) -> JsonRpcMessage {
        let error = self.to_jsonrpc_error();
        let error_response = JsonRpcErrorResponse::new(error, id);
        JsonRpcMessage::ErrorResponse(error_response)
    }

    /// Log the error with appropriate level
    #[inline]
    pub fn log(&self) {
        match self {
            Self::ParseError { .. }
            | Self::InvalidRequest { .. }
            | Self::InvalidParameters { .. }
            | Self::InvalidToolParameters { .. }
            | Self::ValidationError { .. } => {
                warn!("Client error: {}", self);
            }
            Self::ToolNotFound { .. }
            | Self::ResourceNotFound { .. }
            | Self::PromptNotFound { .. }
            | Self::MethodNotFound { .. } => {
                warn!("Not found error: {}", self);
            }
            Self::InternalError { .. } => {
                error!("Server error: {}", self);
            }
        }
    }
}

/// Error handler utility for consistent error processing
pub struct ErrorHandler;

impl ErrorHandler {
    /// Map any handler error onto a JSON-RPC error object
    #[inline]
    pub fn to_jsonrpc_error(error: &anyhow::Error) -> JsonRpcError {
        if let Some(mcp_error) = error.downcast_ref::<McpError>() {
            mcp_error.log();
            return mcp_error.to_jsonrpc_error();
        }

        error!("Unexpected error: {:#}", error);
        McpError::InternalError {
            message: error.to_string(),
        }
        .to_jsonrpc_error()
    }

    /// Handle any error and convert to appropriate JSON-RPC response
    #[inline]
    pub fn handle_error(error: &anyhow::Error, id: Option<RequestId>) -> JsonRpcMessage {
        JsonRpcMessage::ErrorResponse(JsonRpcErrorResponse::new(
            Self::to_jsonrpc_error(error),
            id,
        ))
    }
}

/// Result type for MCP operations
pub type McpResult<T> = Result<T, McpError>;

/// Convert from serde_json::Error to McpError
impl From<serde_json::Error> for McpError {
    #[inline]
    fn from(error: serde_json::Error) -> Self {
        Self::InvalidParameters {
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn tool_not_found_error() {
        let error = McpError::ToolNotFound {
            name: "add_todo_v2".to_string(),
        };

        let jsonrpc_error = error.to_jsonrpc_error();
        assert_eq!(jsonrpc_error.code, mcp_error_codes::TOOL_NOT_FOUND);
        assert!(jsonrpc_error.message.contains("add_todo_v2"));
    }

    #[test]
    fn invalid_tool_parameters_error() {
        let error = McpError::InvalidToolParameters {
            tool: "add".to_string(),
            message: "/a: \"one\" is not of type \"integer\"".to_string(),
        };

        let jsonrpc_error = error.to_jsonrpc_error();
        assert_eq!(jsonrpc_error.code, error_codes::INVALID_PARAMS);
        assert!(jsonrpc_error.message.contains("'add'"));
    }

    #[test]
    fn error_response_creation() {
        let error = McpError::InternalError {
            message: "test error".to_string(),
        };

        let response = error.to_error_response(Some(RequestId::String("test".to_string())));

        if let JsonRpcMessage::ErrorResponse(err_resp) = response {
            assert_eq!(err_resp.error.code, error_codes::INTERNAL_ERROR);
            assert!(err_resp.error.message.contains("test error"));
        } else {
            panic!("Expected error response");
        }
    }

    #[test]
    fn malformed_input_errors() {
        let parse = McpError::ParseError {
            message: "expected value at line 1 column 1".to_string(),
        };
        let JsonRpcMessage::ErrorResponse(response) = parse.to_error_response(None) else {
            panic!("Expected error response");
        };
        assert_eq!(response.error.code, error_codes::PARSE_ERROR);
        assert!(response.id.is_none());

        let invalid = McpError::InvalidRequest {
            message: "missing jsonrpc".to_string(),
        };
        assert_eq!(
            invalid.to_jsonrpc_error().code,
            error_codes::INVALID_REQUEST
        );
    }

    #[test]
    fn schema_failures_are_invalid_params() {
        let wrapped = anyhow::Error::new(McpError::ValidationError {
            message: "\"uri\" is a required property".to_string(),
        });
        let error = ErrorHandler::to_jsonrpc_error(&wrapped);
        assert_eq!(error.code, error_codes::INVALID_PARAMS);
        assert!(error.message.starts_with("Validation error"));
    }

    #[test]
    fn handler_downcasts_mcp_errors() {
        let wrapped = anyhow::Error::new(McpError::PromptNotFound {
            name: "shout".to_string(),
        });
        let error = ErrorHandler::to_jsonrpc_error(&wrapped);
        assert_eq!(error.code, mcp_error_codes::PROMPT_NOT_FOUND);

        let plain = anyhow!("disk on fire");
        let error = ErrorHandler::to_jsonrpc_error(&plain);
        assert_eq!(error.code, error_codes::INTERNAL_ERROR);
        assert!(error.message.contains("disk on fire"));
    }

    #[test]
    fn handle_error_keeps_request_id() {
        let wrapped = anyhow::Error::new(McpError::MethodNotFound {
            method: "todos/purge".to_string(),
        });
        let message = ErrorHandler::handle_error(&wrapped, Some(RequestId::Number(7)));

        let JsonRpcMessage::ErrorResponse(response) = message else {
            panic!("Expected error response");
        };
        assert_eq!(response.id, Some(RequestId::Number(7)));
        assert_eq!(response.error.code, error_codes::METHOD_NOT_FOUND);
    }
}
