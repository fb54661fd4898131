//! To-do tools: the only operations that change the store

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::RouteError;
use crate::mcp::router::{HandlerResult, RouteKind, Router};
use crate::mcp::types::Params;
use crate::todo::parse_args;
use crate::todo::store::{CompleteOutcome, DeleteOutcome, TodoStore};

/// Soft outcome text for an unknown id
pub const NOT_FOUND: &str = "Todo not found.";

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AddTodoArgs {
    /// Title of the new to-do item
    pub title: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct TodoIdArgs {
    /// ID returned by add_todo
    pub todo_id: String,
}

pub fn register(router: &mut Router<TodoStore>) -> Result<(), RouteError> {
    router
        .register("add_todo", RouteKind::Tool, add_todo)?
        .with_description("Add a new to-do item")
        .with_input_schema(input_schema::<AddTodoArgs>());
    router
        .register("complete_todo", RouteKind::Tool, complete_todo)?
        .with_description("Mark a todo as completed")
        .with_input_schema(input_schema::<TodoIdArgs>());
    router
        .register("delete_todo", RouteKind::Tool, delete_todo)?
        .with_description("Delete a todo")
        .with_input_schema(input_schema::<TodoIdArgs>());
    Ok(())
}

fn input_schema<T: JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(T))
        .unwrap_or_else(|_| json!({"type": "object", "properties": {}}))
}

fn add_todo(store: &mut TodoStore, params: Params) -> HandlerResult {
    let args: AddTodoArgs = parse_args(params)?;
    let todo = store.add(args.title);
    Ok(json!(format!("Todo '{}' added with ID {}", todo.title, todo.id)))
}

fn complete_todo(store: &mut TodoStore, params: Params) -> HandlerResult {
    let args: TodoIdArgs = parse_args(params)?;
    let text = match store.complete(&args.todo_id) {
        CompleteOutcome::NotFound => NOT_FOUND.to_string(),
        CompleteOutcome::AlreadyCompleted => "Todo already completed.".to_string(),
        CompleteOutcome::Completed { title } => format!("Todo '{}' marked as completed.", title),
    };
    Ok(json!(text))
}

fn delete_todo(store: &mut TodoStore, params: Params) -> HandlerResult {
    let args: TodoIdArgs = parse_args(params)?;
    let text = match store.delete(&args.todo_id) {
        DeleteOutcome::NotFound => NOT_FOUND.to_string(),
        DeleteOutcome::Deleted { title } => format!("Todo '{}' deleted.", title),
    };
    Ok(json!(text))
}
