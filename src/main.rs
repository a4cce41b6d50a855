use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use todo_mcp::Result;
use todo_mcp::commands::{ServeOptions, serve_mcp, show_config};
use todo_mcp::config::Transport;

#[derive(Parser)]
#[command(name = "todo-mcp")]
#[command(about = "Demonstration MCP server with an in-memory to-do list and widget")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the MCP server
    Serve(ServeArgs),
    /// Print the effective configuration
    Config {
        /// Path to the configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Args)]
struct ServeArgs {
    /// Path to the configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Transport to serve on
    #[arg(long, value_enum)]
    transport: Option<Transport>,
    /// Address to bind when serving HTTP
    #[arg(long)]
    host: Option<String>,
    /// Port to bind when serving HTTP (overrides PORT)
    #[arg(long)]
    port: Option<u16>,
    /// HTML file served as the to-do widget
    #[arg(long)]
    widget: Option<PathBuf>,
}

impl From<ServeArgs> for ServeOptions {
    fn from(args: ServeArgs) -> Self {
        Self {
            config: args.config,
            transport: args.transport,
            host: args.host,
            port: args.port,
            widget: args.widget,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => {
            serve_mcp(args.into()).await?;
        }
        Commands::Config { config } => {
            show_config(&ServeOptions {
                config,
                ..ServeOptions::default()
            })?;
        }
    }

    Ok(())
}
