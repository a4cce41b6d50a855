use thiserror::Error;

pub type Result<T> = std::result::Result<T, TodoMcpError>;

#[derive(Error, Debug)]
pub enum TodoMcpError {
    #[error("Widget error: {0}")]
    Widget(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod commands;
pub mod config;
pub mod mcp;
pub mod todo;
