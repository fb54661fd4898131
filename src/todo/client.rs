//! Typed to-do client on top of a [`ClientSession`]

use serde_json::{json, Value};
use tracing::debug;

use crate::error::ClientError;
use crate::mcp::client::{ClientSession, SessionConfig};
use crate::mcp::transport::Transport;
use crate::mcp::types::{CallToolResult, ReadResourceResult};
use crate::todo::resources::{greeting_uri, todo_uri, ALL_TODOS_URI};
use crate::todo::store::Todo;

/// Result of reading `todo://{todo_id}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TodoLookup {
    Found(Todo),
    /// The server's error marker text
    NotFound(String),
}

/// Client for the to-do server's tools and resources
pub struct TodoClient<T> {
    session: ClientSession<T>,
}

impl<T: Transport> TodoClient<T> {
    /// Wrap an already initialized session
    pub fn new(session: ClientSession<T>) -> Self {
        Self { session }
    }

    /// Handshake over `transport` and wrap the resulting session
    pub async fn connect(transport: T, config: SessionConfig) -> Result<Self, ClientError> {
        let session = ClientSession::connect(transport, config).await?;
        Ok(Self::new(session))
    }

    pub fn session(&mut self) -> &mut ClientSession<T> {
        &mut self.session
    }

    /// Returns the server's confirmation text, which carries the new id
    pub async fn add_todo(&mut self, title: &str) -> Result<String, ClientError> {
        let result = self
            .session
            .call_tool("add_todo", json!({ "title": title }))
            .await?;
        tool_text(result)
    }

    pub async fn complete_todo(&mut self, todo_id: &str) -> Result<String, ClientError> {
        let result = self
            .session
            .call_tool("complete_todo", json!({ "todo_id": todo_id }))
            .await?;
        tool_text(result)
    }

    pub async fn delete_todo(&mut self, todo_id: &str) -> Result<String, ClientError> {
        let result = self
            .session
            .call_tool("delete_todo", json!({ "todo_id": todo_id }))
            .await?;
        tool_text(result)
    }

    pub async fn list_todos(&mut self) -> Result<Vec<Todo>, ClientError> {
        let result = self.session.read_resource(ALL_TODOS_URI).await?;
        let todos: Vec<Todo> = serde_json::from_value(resource_value(result)?)?;
        debug!(count = todos.len(), "Listed todos");
        Ok(todos)
    }

    pub async fn get_todo(&mut self, todo_id: &str) -> Result<TodoLookup, ClientError> {
        let result = self.session.read_resource(&todo_uri(todo_id)).await?;
        let value = resource_value(result)?;

        if let Some(marker) = value.get("error").and_then(Value::as_str) {
            return Ok(TodoLookup::NotFound(marker.to_string()));
        }
        Ok(TodoLookup::Found(serde_json::from_value(value)?))
    }

    pub async fn greet(&mut self, name: &str) -> Result<String, ClientError> {
        let result = self.session.read_resource(&greeting_uri(name)).await?;
        match resource_value(result)? {
            Value::String(text) => Ok(text),
            other => Ok(other.to_string()),
        }
    }

    pub async fn close(self) -> Result<(), ClientError> {
        self.session.close().await
    }
}

/// Pull the id out of an `add_todo` confirmation
pub fn added_id(text: &str) -> Option<&str> {
    text.rsplit_once(" with ID ").map(|(_, id)| id.trim())
}

fn tool_text(result: CallToolResult) -> Result<String, ClientError> {
    result
        .first_text()
        .map(str::to_string)
        .ok_or_else(|| ClientError::ProtocolViolation("tool result has no content".to_string()))
}

/// The first content item's payload. Servers that send JSON as a string
/// are accepted too.
fn resource_value(result: ReadResourceResult) -> Result<Value, ClientError> {
    let contents = result
        .contents
        .into_iter()
        .next()
        .ok_or_else(|| ClientError::ProtocolViolation("resource has no contents".to_string()))?;

    match contents.text {
        Value::String(text) if contents.mime_type.as_deref() == Some("application/json") => {
            Ok(serde_json::from_str(&text)?)
        }
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::transport::StreamTransport;
    use crate::todo;
    use tokio::io::{BufReader, DuplexStream};

    async fn connected() -> TodoClient<StreamTransport<DuplexStream>> {
        let (client_end, server_end) = tokio::io::duplex(64 * 1024);
        tokio::spawn(async move {
            let (reader, writer) = tokio::io::split(server_end);
            let mut server = todo::server("TodoMCP").unwrap();
            let _ = server.serve(BufReader::new(reader), writer).await;
        });

        TodoClient::connect(StreamTransport::new(client_end), SessionConfig::default())
            .await
            .unwrap()
    }

    #[test]
    fn test_added_id() {
        assert_eq!(
            added_id("Todo 'Buy groceries' added with ID 1b4e28ba-2fa1-11d2-883f-0016d3cca427"),
            Some("1b4e28ba-2fa1-11d2-883f-0016d3cca427")
        );
        assert_eq!(added_id("Todo not found."), None);
    }

    #[tokio::test]
    async fn test_add_complete_and_read_back() {
        let mut client = connected().await;

        let text = client.add_todo("Buy groceries").await.unwrap();
        let id = added_id(&text).unwrap().to_string();

        assert_eq!(
            client.complete_todo(&id).await.unwrap(),
            "Todo 'Buy groceries' marked as completed."
        );

        match client.get_todo(&id).await.unwrap() {
            TodoLookup::Found(todo) => {
                assert_eq!(todo.title, "Buy groceries");
                assert!(todo.completed);
            }
            other => panic!("expected a todo, got {:?}", other),
        }

        assert_eq!(
            client.get_todo("missing").await.unwrap(),
            TodoLookup::NotFound("Todo not found".to_string())
        );
        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_and_greet() {
        let mut client = connected().await;

        let text = client.add_todo("Walk the dog").await.unwrap();
        let id = added_id(&text).unwrap().to_string();
        assert_eq!(
            client.delete_todo(&id).await.unwrap(),
            "Todo 'Walk the dog' deleted."
        );
        assert!(client.list_todos().await.unwrap().is_empty());
        assert_eq!(client.delete_todo(&id).await.unwrap(), "Todo not found.");

        assert_eq!(
            client.greet("Ada").await.unwrap(),
            "Hello, Ada! Welcome to your todo manager."
        );
    }
}
