//! Todo MCP Client
//!
//! Spawns the server over stdio (or connects to one over TCP) and runs a
//! single command against it.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use todo_mcp::config::Config;
use todo_mcp::mcp::client::SessionConfig;
use todo_mcp::mcp::transport::{StdioTransport, StreamTransport, Transport};
use todo_mcp::todo::{Todo, TodoClient, TodoLookup};

/// Todo MCP Client
#[derive(Parser)]
#[command(name = "todo-mcp-client")]
#[command(author, version, about = "Todo MCP Client - talk to a Todo MCP server")]
struct Cli {
    /// Server program to spawn (overrides TODO_MCP_SERVER_COMMAND)
    #[arg(long, conflicts_with = "connect")]
    server_command: Option<PathBuf>,

    /// Connect to a server listening on this address instead of spawning one
    #[arg(long)]
    connect: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a new todo
    Add {
        #[arg(required = true)]
        title: Vec<String>,
    },
    /// List all todos
    List,
    /// Mark a todo as completed
    Complete { id: String },
    /// Delete a todo
    Delete { id: String },
    /// Show one todo
    Get { id: String },
    /// Get a greeting
    Greet {
        #[arg(default_value = "User")]
        name: String,
    },
    /// List the server's tools, resources and prompts
    Tools,
    /// Add three todos, complete the first and list them
    Demo,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::new().context("Failed to load configuration")?;
    let session_config = SessionConfig::from(&config);

    match cli.connect {
        Some(addr) => {
            let transport = StreamTransport::connect(addr.as_str())
                .await
                .with_context(|| format!("Failed to connect to {}", addr))?;
            let client = TodoClient::connect(transport, session_config).await?;
            run(client, cli.command).await
        }
        None => {
            let program = cli.server_command.unwrap_or(config.server_command);
            let program = program.to_string_lossy();
            let transport = StdioTransport::spawn(&program, std::iter::empty::<&str>())
                .with_context(|| format!("Failed to start {}", program))?;
            let client = TodoClient::connect(transport, session_config).await?;
            run(client, cli.command).await
        }
    }
}

/// Run one command, then close the session whatever the outcome
async fn run<T: Transport>(mut client: TodoClient<T>, command: Commands) -> anyhow::Result<()> {
    let outcome = execute(&mut client, command).await;
    let closed = client.close().await;
    outcome?;
    closed?;
    Ok(())
}

async fn execute<T: Transport>(client: &mut TodoClient<T>, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Add { title } => {
            println!("{}", client.add_todo(&title.join(" ")).await?);
        }
        Commands::List => {
            let todos = client.list_todos().await?;
            if todos.is_empty() {
                println!("No todos found");
            }
            for todo in &todos {
                print_summary(todo);
            }
        }
        Commands::Complete { id } => {
            println!("{}", client.complete_todo(&id).await?);
        }
        Commands::Delete { id } => {
            println!("{}", client.delete_todo(&id).await?);
        }
        Commands::Get { id } => match client.get_todo(&id).await? {
            TodoLookup::Found(todo) => {
                println!("ID:      {}", todo.id);
                println!("Title:   {}", todo.title);
                println!("Status:  {}", if todo.completed { "completed" } else { "pending" });
                println!("Created: {}", todo.created_at.to_rfc3339());
            }
            TodoLookup::NotFound(message) => println!("{}", message),
        },
        Commands::Greet { name } => {
            println!("{}", client.greet(&name).await?);
        }
        Commands::Tools => {
            let session = client.session();
            for tool in session.list_tools().await? {
                println!("tool      {}  {}", tool.name, tool.description.unwrap_or_default());
            }
            for resource in session.list_resources().await? {
                println!("resource  {}  {}", resource.uri, resource.name);
            }
            for template in session.list_resource_templates().await? {
                println!("template  {}  {}", template.uri_template, template.name);
            }
            for prompt in session.list_prompts().await? {
                println!("prompt    {}  {}", prompt.name, prompt.description.unwrap_or_default());
            }
        }
        Commands::Demo => {
            for title in ["Buy groceries", "Walk the dog", "Finish project"] {
                println!("{}", client.add_todo(title).await?);
            }

            let todos = client.list_todos().await?;
            todos.iter().for_each(print_summary);

            if let Some(first) = todos.first() {
                println!("{}", client.complete_todo(&first.id).await?);
            }

            for todo in &client.list_todos().await? {
                print_summary(todo);
            }
        }
    }
    Ok(())
}

fn print_summary(todo: &Todo) {
    let status = if todo.completed { "[x]" } else { "[ ]" };
    let short_id = todo.id.get(..8).unwrap_or(&todo.id);
    println!("  {} {} ({})", status, todo.title, short_id);
}
