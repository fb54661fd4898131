//! Read-only to-do resources and the greeting template

use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::RouteError;
use crate::mcp::router::{HandlerResult, RouteKind, Router};
use crate::mcp::types::Params;
use crate::todo::store::TodoStore;
use crate::todo::tools::TodoIdArgs;
use crate::todo::{parse_args, to_output};

pub const ALL_TODOS_URI: &str = "todos://all";
pub const TODO_URI: &str = "todo://{todo_id}";
pub const GREETING_URI: &str = "greeting://{name}";

/// Marker text returned when `todo://{todo_id}` names no entry
pub const TODO_NOT_FOUND: &str = "Todo not found";

pub fn register(router: &mut Router<TodoStore>) -> Result<(), RouteError> {
    router
        .register(ALL_TODOS_URI, RouteKind::Resource, list_todos)?
        .with_name("list_todos")
        .with_description("List all todos")
        .with_mime_type("application/json");
    router
        .register(TODO_URI, RouteKind::Resource, get_todo)?
        .with_name("get_todo")
        .with_description("Get a specific todo item")
        .with_mime_type("application/json");
    router
        .register(GREETING_URI, RouteKind::Resource, greet)?
        .with_name("greet")
        .with_description("Greet a user with their name")
        .with_mime_type("text/plain");
    Ok(())
}

pub fn todo_uri(todo_id: &str) -> String {
    format!("todo://{}", todo_id)
}

pub fn greeting_uri(name: &str) -> String {
    format!("greeting://{}", name)
}

fn list_todos(store: &mut TodoStore, _: Params) -> HandlerResult {
    to_output(&store.list())
}

/// A missing todo is a successful result carrying an error marker
fn get_todo(store: &mut TodoStore, params: Params) -> HandlerResult {
    let args: TodoIdArgs = parse_args(params)?;
    match store.get(&args.todo_id) {
        Some(todo) => to_output(todo),
        None => Ok(json!({"error": TODO_NOT_FOUND})),
    }
}

fn greet(_: &mut TodoStore, params: Params) -> HandlerResult {
    #[derive(Deserialize)]
    struct Args {
        name: String,
    }

    let args: Args = parse_args(params)?;
    Ok(Value::String(format!(
        "Hello, {}! Welcome to your todo manager.",
        args.name
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn captured(key: &str, value: &str) -> Params {
        let mut params = Params::new();
        params.insert(key.to_string(), json!(value));
        params
    }

    #[test]
    fn test_get_todo_found_and_missing() {
        let mut store = TodoStore::new();
        let todo = store.add("Walk the dog");

        let found = get_todo(&mut store, captured("todo_id", &todo.id)).unwrap();
        assert_eq!(found["title"], "Walk the dog");
        assert_eq!(found["completed"], false);
        assert_eq!(found["id"], json!(todo.id));
        assert!(found["created_at"].is_string());

        let missing = get_todo(&mut store, captured("todo_id", "not-a-real-id")).unwrap();
        assert_eq!(missing, json!({"error": "Todo not found"}));
    }

    #[test]
    fn test_list_todos_is_ordered_array() {
        let mut store = TodoStore::new();
        store.add("first");
        store.add("second");

        let listed = list_todos(&mut store, Params::new()).unwrap();
        let titles: Vec<&str> = listed
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["title"].as_str().unwrap())
            .collect();
        assert_eq!(titles, vec!["first", "second"]);
    }

    #[test]
    fn test_greeting() {
        let mut store = TodoStore::new();
        let text = greet(&mut store, captured("name", "kebede")).unwrap();
        assert_eq!(text, json!("Hello, kebede! Welcome to your todo manager."));
        assert_eq!(greeting_uri("kebede"), "greeting://kebede");
    }
}
