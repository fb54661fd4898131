//! MCP Server implementation
//!
//! A single-threaded dispatcher bound to one byte channel at a time. Each
//! request is read, resolved through the route registry, handled, and
//! answered before the next record is read.

use std::future::Future;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::error::{CodecError, HandlerError, Result, RouteError};
use crate::mcp::codec;
use crate::mcp::router::{RouteKind, Router};
use crate::mcp::types::*;

/// MCP Server version
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

impl From<RouteError> for JsonRpcError {
    fn from(err: RouteError) -> Self {
        match &err {
            RouteError::NoRouteFound { kind, target } => {
                let label = match kind {
                    RouteKind::Tool => "Unknown tool",
                    RouteKind::Resource => "Unknown resource",
                    RouteKind::Prompt => "Unknown prompt",
                };
                JsonRpcError::invalid_params(format!("{}: {}", label, target))
            }
            _ => JsonRpcError::internal_error(err.to_string()),
        }
    }
}

impl From<HandlerError> for JsonRpcError {
    fn from(err: HandlerError) -> Self {
        match err {
            HandlerError::InvalidArguments(_) => JsonRpcError::invalid_params(err.to_string()),
            HandlerError::Failed(message) => JsonRpcError::internal_error(message),
        }
    }
}

/// MCP Server over a route registry and the state its handlers share
pub struct McpServer<S> {
    info: Implementation,
    router: Router<S>,
    state: S,
    initialized: bool,
}

impl<S> McpServer<S> {
    /// Create a new MCP server owning `state`
    pub fn new(name: impl Into<String>, router: Router<S>, state: S) -> Self {
        Self {
            info: Implementation {
                name: name.into(),
                version: SERVER_VERSION.to_string(),
            },
            router,
            state,
            initialized: false,
        }
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn router(&self) -> &Router<S> {
        &self.router
    }

    /// Run the server on stdio
    pub async fn run_stdio(&mut self) -> Result<()> {
        let stdin = BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        info!(server = %self.info.name, "Serving MCP on stdio");
        self.serve(stdin, stdout).await
    }

    /// Accept TCP connections one at a time. The state outlives each
    /// connection; a framing error only closes the offending connection.
    pub async fn serve_tcp(&mut self, listener: TcpListener) -> Result<()> {
        info!(server = %self.info.name, addr = ?listener.local_addr().ok(), "Serving MCP on TCP");

        loop {
            let (stream, peer) = accept_next(|| listener.accept()).await;
            info!(%peer, "Client connected");

            let (reader, writer) = stream.into_split();
            match self.serve(BufReader::new(reader), writer).await {
                Ok(()) => info!(%peer, "Client disconnected"),
                Err(e) => warn!(%peer, error = %e, "Connection closed"),
            }
            self.initialized = false;
        }
    }

    /// Serve one connection until the peer closes it or sends a record that
    /// cannot be decoded as a request.
    pub async fn serve<R, W>(&mut self, mut reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut line = String::new();

        loop {
            line.clear();
            if reader.read_line(&mut line).await? == 0 {
                debug!("Channel reached EOF");
                return Ok(());
            }

            let record = line.trim_end_matches(['\n', '\r']);
            if record.trim().is_empty() {
                continue;
            }

            let request = match codec::decode(record) {
                Ok(Message::Request(request)) => request,
                Ok(Message::Response(response)) => {
                    error!(id = %response.id, "Received a response where a request was expected");
                    return Err(CodecError::malformed(format!(
                        "expected a request, got a response for id {}",
                        response.id
                    ))
                    .into());
                }
                Err(e) => {
                    error!(error = %e, "Malformed record, closing connection");
                    return Err(e.into());
                }
            };

            let response = self.handle_request(request);
            let bytes = codec::encode(&response.into())?;
            writer.write_all(&bytes).await?;
            writer.flush().await?;
        }
    }

    /// Handle one decoded request. Always produces exactly one response.
    pub fn handle_request(&mut self, request: JsonRpcRequest) -> JsonRpcResponse {
        let JsonRpcRequest { id, method, params } = request;
        debug!(%id, %method, "Handling request");

        if !self.initialized && method != methods::INITIALIZE {
            warn!(%id, %method, "Request received before initialize");
        }

        let outcome = match method.as_str() {
            methods::INITIALIZE => self.handle_initialize(&params),
            methods::PING => Ok(json!({})),
            methods::LIST_TOOLS => self.handle_list_tools(),
            methods::CALL_TOOL => self.handle_call_tool(params),
            methods::LIST_RESOURCES => self.handle_list_resources(),
            methods::LIST_RESOURCE_TEMPLATES => self.handle_list_resource_templates(),
            methods::READ_RESOURCE => self.handle_read_resource(params),
            methods::LIST_PROMPTS => self.handle_list_prompts(),
            methods::GET_PROMPT => self.handle_get_prompt(params),
            _ => Err(JsonRpcError::method_not_found(&method)),
        };

        match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => {
                warn!(%id, %method, error = %error, "Request failed");
                JsonRpcResponse::error(id, error)
            }
        }
    }

    /// Handle initialize request
    fn handle_initialize(&mut self, params: &Params) -> std::result::Result<Value, JsonRpcError> {
        let requested = params.get("protocolVersion").and_then(Value::as_str);
        let protocol_version = match requested {
            Some(v) if SUPPORTED_PROTOCOL_VERSIONS.contains(&v) => v,
            _ => MCP_VERSION,
        };

        if let Some(client) = params.get("clientInfo") {
            info!(client = %client, %protocol_version, "Client initialized");
        }

        let result = InitializeResult {
            protocol_version: protocol_version.to_string(),
            server_info: self.info.clone(),
            capabilities: ServerCapabilities {
                tools: self
                    .router
                    .has_kind(RouteKind::Tool)
                    .then(ToolsCapability::default),
                resources: self
                    .router
                    .has_kind(RouteKind::Resource)
                    .then(ResourcesCapability::default),
                prompts: self
                    .router
                    .has_kind(RouteKind::Prompt)
                    .then(PromptsCapability::default),
            },
        };

        self.initialized = true;
        to_result(&result)
    }

    /// Handle list tools request
    fn handle_list_tools(&self) -> std::result::Result<Value, JsonRpcError> {
        let tools = self
            .router
            .routes(RouteKind::Tool)
            .map(|route| Tool {
                name: route.name().to_string(),
                description: route.description().map(str::to_string),
                input_schema: route
                    .input_schema()
                    .cloned()
                    .unwrap_or_else(|| json!({"type": "object", "properties": {}})),
            })
            .collect();

        to_result(&ListToolsResult { tools })
    }

    /// Handle call tool request
    fn handle_call_tool(&mut self, params: Params) -> std::result::Result<Value, JsonRpcError> {
        let params: CallToolParams = parse_params(params, "Invalid tool parameters")?;

        let resolved = self.router.resolve(RouteKind::Tool, &params.name)?;
        let output = resolved.invoke(&mut self.state, params.arguments)?;

        to_result(&CallToolResult::text(value_to_text(output)))
    }

    fn handle_list_resources(&self) -> std::result::Result<Value, JsonRpcError> {
        let resources = self
            .router
            .routes(RouteKind::Resource)
            .filter(|route| !route.pattern().is_template())
            .map(|route| Resource {
                uri: route.pattern().as_str().to_string(),
                name: route.name().to_string(),
                description: route.description().map(str::to_string),
                mime_type: route.mime_type().map(str::to_string),
            })
            .collect();

        to_result(&ListResourcesResult { resources })
    }

    fn handle_list_resource_templates(&self) -> std::result::Result<Value, JsonRpcError> {
        let resource_templates = self
            .router
            .routes(RouteKind::Resource)
            .filter(|route| route.pattern().is_template())
            .map(|route| ResourceTemplate {
                uri_template: route.pattern().as_str().to_string(),
                name: route.name().to_string(),
                description: route.description().map(str::to_string),
                mime_type: route.mime_type().map(str::to_string),
            })
            .collect();

        to_result(&ListResourceTemplatesResult { resource_templates })
    }

    /// Handle read resource request. The handler sees `uri` plus the
    /// placeholder captures.
    fn handle_read_resource(&mut self, params: Params) -> std::result::Result<Value, JsonRpcError> {
        let uri = params
            .get("uri")
            .and_then(Value::as_str)
            .ok_or_else(|| JsonRpcError::invalid_params("Missing resource uri"))?
            .to_string();

        let resolved = self.router.resolve(RouteKind::Resource, &uri)?;
        let declared_mime = resolved.route.mime_type().map(str::to_string);
        let output = resolved.invoke(&mut self.state, params)?;

        let mime_type = declared_mime.unwrap_or_else(|| {
            if output.is_string() {
                "text/plain".to_string()
            } else {
                "application/json".to_string()
            }
        });

        to_result(&ReadResourceResult {
            contents: vec![ResourceContents {
                uri,
                mime_type: Some(mime_type),
                text: output,
            }],
        })
    }

    fn handle_list_prompts(&self) -> std::result::Result<Value, JsonRpcError> {
        let prompts = self
            .router
            .routes(RouteKind::Prompt)
            .map(|route| Prompt {
                name: route.name().to_string(),
                description: route.description().map(str::to_string),
                arguments: route.arguments().to_vec(),
            })
            .collect();

        to_result(&ListPromptsResult { prompts })
    }

    fn handle_get_prompt(&mut self, params: Params) -> std::result::Result<Value, JsonRpcError> {
        let params: GetPromptParams = parse_params(params, "Invalid prompt parameters")?;

        let resolved = self.router.resolve(RouteKind::Prompt, &params.name)?;
        let description = resolved.route.description().map(str::to_string);
        let output = resolved.invoke(&mut self.state, params.arguments)?;

        let messages: Vec<PromptMessage> = serde_json::from_value(output).map_err(|e| {
            JsonRpcError::internal_error(format!("Prompt produced invalid messages: {}", e))
        })?;

        to_result(&GetPromptResult {
            description,
            messages,
        })
    }
}

/// Pause after a failed accept so resource exhaustion does not spin the loop
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Retry `accept` until it yields a connection. Accept failures such as
/// EMFILE or ECONNABORTED are logged and never end the server.
async fn accept_next<F, Fut, C>(mut accept: F) -> C
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<C>>,
{
    loop {
        match accept().await {
            Ok(connection) => return connection,
            Err(e) => {
                warn!(error = %e, "Failed to accept connection, retrying");
                tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
            }
        }
    }
}

fn parse_params<T: DeserializeOwned>(
    params: Params,
    context: &str,
) -> std::result::Result<T, JsonRpcError> {
    serde_json::from_value(Value::Object(params))
        .map_err(|e| JsonRpcError::invalid_params(format!("{}: {}", context, e)))
}

fn to_result<T: serde::Serialize>(value: &T) -> std::result::Result<Value, JsonRpcError> {
    serde_json::to_value(value).map_err(|e| JsonRpcError::internal_error(e.to_string()))
}

/// Tool output as display text: strings verbatim, anything else as JSON
fn value_to_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TodoMcpError;
    use crate::mcp::router::HandlerResult;
    use tokio::io::AsyncReadExt;

    fn counter_router() -> Router<u32> {
        let mut router = Router::new();
        router
            .register("bump", RouteKind::Tool, |count: &mut u32, _| -> HandlerResult {
                *count += 1;
                Ok(json!(format!("count is {}", count)))
            })
            .unwrap()
            .with_description("Increment the counter");
        router
            .register("fail", RouteKind::Tool, |_: &mut u32, _| -> HandlerResult {
                Err(HandlerError::Failed("nope".to_string()))
            })
            .unwrap();
        router
            .register("echo://{word}", RouteKind::Resource, |_: &mut u32, params| {
                Ok(params["word"].clone())
            })
            .unwrap();
        router
            .register("state://count", RouteKind::Resource, |count: &mut u32, _| {
                Ok(json!({"count": *count}))
            })
            .unwrap();
        router
    }

    fn request(id: i64, method: &str, params: Value) -> JsonRpcRequest {
        let Value::Object(params) = params else {
            panic!("params must be an object");
        };
        JsonRpcRequest::new(RequestId(id), method).with_params(params)
    }

    #[test]
    fn test_initialize_advertises_registered_kinds() {
        let mut server = McpServer::new("test", counter_router(), 0);
        let response = server.handle_request(request(
            1,
            "initialize",
            json!({"protocolVersion": "2025-03-26", "capabilities": {}}),
        ));

        let result = response.into_result().unwrap();
        assert_eq!(result["protocolVersion"], "2025-03-26");
        assert_eq!(result["serverInfo"]["name"], "test");
        assert!(result["capabilities"]["tools"].is_object());
        assert!(result["capabilities"]["resources"].is_object());
        assert!(result["capabilities"].get("prompts").is_none());
    }

    #[test]
    fn test_unknown_protocol_version_falls_back() {
        let mut server = McpServer::new("test", counter_router(), 0);
        let response =
            server.handle_request(request(1, "initialize", json!({"protocolVersion": "1999-01-01"})));
        assert_eq!(response.into_result().unwrap()["protocolVersion"], MCP_VERSION);
    }

    #[test]
    fn test_call_tool_mutates_owned_state() {
        let mut server = McpServer::new("test", counter_router(), 0);
        for id in 1..=2 {
            let response =
                server.handle_request(request(id, "tools/call", json!({"name": "bump"})));
            assert_eq!(response.id, RequestId(id));
            assert!(!response.is_error());
        }
        assert_eq!(*server.state(), 2);

        let response =
            server.handle_request(request(3, "resources/read", json!({"uri": "state://count"})));
        let result = response.into_result().unwrap();
        assert_eq!(result["contents"][0]["text"], json!({"count": 2}));
        assert_eq!(result["contents"][0]["mimeType"], "application/json");
    }

    #[test]
    fn test_errors_become_error_responses() {
        let mut server = McpServer::new("test", counter_router(), 0);

        let cases = [
            (request(1, "bogus/method", json!({})), error_codes::METHOD_NOT_FOUND),
            (request(2, "tools/call", json!({"name": "missing"})), error_codes::INVALID_PARAMS),
            (request(3, "tools/call", json!({})), error_codes::INVALID_PARAMS),
            (request(4, "tools/call", json!({"name": "fail"})), error_codes::INTERNAL_ERROR),
            (request(5, "resources/read", json!({})), error_codes::INVALID_PARAMS),
            (request(6, "resources/read", json!({"uri": "nope://x"})), error_codes::INVALID_PARAMS),
            (request(7, "prompts/get", json!({"name": "x"})), error_codes::INVALID_PARAMS),
        ];

        for (req, code) in cases {
            let id = req.id;
            let response = server.handle_request(req);
            assert_eq!(response.id, id);
            assert_eq!(response.into_result().unwrap_err().code, Some(code), "request {}", id);
        }
    }

    #[test]
    fn test_listings_split_templates() {
        let mut server = McpServer::new("test", counter_router(), 0);

        let tools = server
            .handle_request(request(1, "tools/list", json!({})))
            .into_result()
            .unwrap();
        assert_eq!(tools["tools"][0]["name"], "bump");
        assert_eq!(tools["tools"][0]["description"], "Increment the counter");
        assert_eq!(tools["tools"][1]["inputSchema"]["type"], "object");

        let resources = server
            .handle_request(request(2, "resources/list", json!({})))
            .into_result()
            .unwrap();
        assert_eq!(resources["resources"].as_array().unwrap().len(), 1);
        assert_eq!(resources["resources"][0]["uri"], "state://count");

        let templates = server
            .handle_request(request(3, "resources/templates/list", json!({})))
            .into_result()
            .unwrap();
        assert_eq!(templates["resourceTemplates"][0]["uriTemplate"], "echo://{word}");
    }

    #[tokio::test]
    async fn test_serve_answers_in_order_and_survives_unknown_method() {
        let mock = tokio_test::io::Builder::new()
            .read(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"bogus\",\"params\":{}}\n")
            .write(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"error\":{\"code\":-32601,\"message\":\"Method not found: bogus\"}}\n")
            .read(b"\n{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"ping\"}\n")
            .write(b"{\"jsonrpc\":\"2.0\",\"id\":2,\"result\":{}}\n")
            .build();
        let (reader, writer) = tokio::io::split(mock);

        let mut server = McpServer::new("test", counter_router(), 0);
        server.serve(BufReader::new(reader), writer).await.unwrap();
    }

    #[tokio::test]
    async fn test_serve_closes_on_malformed_record() {
        let (client, server_end) = tokio::io::duplex(4096);
        let (reader, writer) = tokio::io::split(server_end);
        let (mut client_reader, mut client_writer) = tokio::io::split(client);

        client_writer
            .write_all(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n{oops\n")
            .await
            .unwrap();

        let mut server = McpServer::new("test", counter_router(), 0);
        let err = server
            .serve(BufReader::new(reader), writer)
            .await
            .unwrap_err();
        assert!(matches!(err, TodoMcpError::Codec(_)));

        // The ping was answered before the bad record, then the channel closed.
        let mut output = String::new();
        client_reader.read_to_string(&mut output).await.unwrap();
        assert_eq!(output, "{\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}\n");
    }

    #[tokio::test]
    async fn test_serve_rejects_response_records() {
        let mock = tokio_test::io::Builder::new()
            .read(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}\n")
            .build();
        let (reader, writer) = tokio::io::split(mock);

        let mut server = McpServer::new("test", counter_router(), 0);
        let err = server.serve(BufReader::new(reader), writer).await.unwrap_err();
        assert!(matches!(err, TodoMcpError::Codec(_)));
    }

    #[tokio::test]
    async fn test_accept_failures_do_not_stop_the_server() {
        let mut attempts = 0;
        let connection = accept_next(|| {
            attempts += 1;
            let outcome = match attempts {
                1 => Err(std::io::Error::from_raw_os_error(24)),
                2 => Err(std::io::Error::from(std::io::ErrorKind::ConnectionAborted)),
                n => Ok(n),
            };
            async move { outcome }
        })
        .await;

        assert_eq!(connection, 3);
        assert_eq!(attempts, 3);
    }
}
