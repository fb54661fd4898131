//! To-do domain served over MCP
//!
//! Tools mutate the store, resources read it, and two prompt templates round
//! out the surface. Everything is registered explicitly on a [`Router`].

pub mod client;
pub mod prompts;
pub mod resources;
pub mod store;
pub mod tools;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{HandlerError, RouteError};
use crate::mcp::router::Router;
use crate::mcp::server::McpServer;
use crate::mcp::types::Params;

pub use client::{TodoClient, TodoLookup};
pub use store::{CompleteOutcome, DeleteOutcome, Todo, TodoStore};

/// Build the route registry for the to-do server
pub fn router() -> Result<Router<TodoStore>, RouteError> {
    let mut router = Router::new();
    tools::register(&mut router)?;
    resources::register(&mut router)?;
    prompts::register(&mut router)?;
    Ok(router)
}

/// A server with every to-do route registered and an empty store
pub fn server(name: impl Into<String>) -> Result<McpServer<TodoStore>, RouteError> {
    Ok(McpServer::new(name, router()?, TodoStore::new()))
}

/// Coerce call params into a handler's typed arguments
pub(crate) fn parse_args<T: DeserializeOwned>(params: Params) -> Result<T, HandlerError> {
    serde_json::from_value(Value::Object(params))
        .map_err(|e| HandlerError::InvalidArguments(e.to_string()))
}

pub(crate) fn to_output<T: serde::Serialize>(value: &T) -> Result<Value, HandlerError> {
    serde_json::to_value(value).map_err(|e| HandlerError::Failed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::router::RouteKind;

    #[test]
    fn test_router_registers_every_route() {
        let router = router().unwrap();

        let tools: Vec<&str> = router.routes(RouteKind::Tool).map(|r| r.name()).collect();
        assert_eq!(tools, vec!["add_todo", "complete_todo", "delete_todo"]);

        let resources: Vec<&str> = router
            .routes(RouteKind::Resource)
            .map(|r| r.pattern().as_str())
            .collect();
        assert_eq!(
            resources,
            vec!["todos://all", "todo://{todo_id}", "greeting://{name}"]
        );

        let prompts: Vec<&str> = router.routes(RouteKind::Prompt).map(|r| r.name()).collect();
        assert_eq!(prompts, vec!["review_code", "debug_error"]);
    }
}
