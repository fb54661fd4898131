//! Todo MCP Server
//!
//! Serves the to-do list over stdin/stdout, or over sequential TCP
//! connections with the `tcp` subcommand.

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::info;

use todo_mcp::config::Config;
use todo_mcp::todo;

/// Todo MCP Server
#[derive(Parser)]
#[command(name = "todo-mcp-server")]
#[command(author, version, about = "Todo MCP Server - A Model Context Protocol server for a to-do list")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve sequential TCP connections instead of stdio
    Tcp {
        /// Listen address (overrides TODO_MCP_BIND)
        #[arg(long)]
        bind: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the protocol
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::new().context("Failed to load configuration")?;
    let mut server = todo::server(config.server_name.clone())
        .context("Failed to register to-do routes")?;

    match cli.command {
        None => {
            server.run_stdio().await?;
        }
        Some(Commands::Tcp { bind }) => {
            let addr = bind.unwrap_or(config.bind_addr);
            let listener = TcpListener::bind(&addr)
                .await
                .with_context(|| format!("Failed to bind {}", addr))?;
            info!(%addr, "Listening for MCP connections");

            tokio::select! {
                result = server.serve_tcp(listener) => result?,
                _ = tokio::signal::ctrl_c() => info!("Shutting down"),
            }
        }
    }

    Ok(())
}
