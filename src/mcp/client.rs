//! MCP client session
//!
//! Strict request-then-response correlation over one transport. Ids start
//! at 1 and increase by one per call; a response carrying any other id is a
//! desync and ends the session.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, trace, warn};

use crate::config::Config;
use crate::error::ClientError;
use crate::mcp::codec;
use crate::mcp::transport::Transport;
use crate::mcp::types::*;

/// Default timeout for a single call
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Client session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Per-call timeout for the blocking read; `None` waits forever
    pub request_timeout: Option<Duration>,

    /// Name and version sent in the handshake
    pub client_info: Implementation,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            request_timeout: Some(DEFAULT_TIMEOUT),
            client_info: Implementation {
                name: "todo-mcp-client".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }
}

impl From<&Config> for SessionConfig {
    fn from(config: &Config) -> Self {
        Self {
            request_timeout: config.request_timeout(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    New,
    Ready,
    Closed,
}

/// One client's sequence of correlated calls over a single channel
pub struct ClientSession<T> {
    transport: T,
    next_id: i64,
    state: SessionState,
    config: SessionConfig,
    server_info: Option<InitializeResult>,
}

impl<T: Transport> ClientSession<T> {
    /// Wrap a transport without performing the handshake
    pub fn new(transport: T, config: SessionConfig) -> Self {
        Self {
            transport,
            next_id: 1,
            state: SessionState::New,
            config,
            server_info: None,
        }
    }

    /// Wrap a transport and perform the handshake. The transport is closed
    /// if the handshake fails.
    pub async fn connect(transport: T, config: SessionConfig) -> Result<Self, ClientError> {
        let mut session = Self::new(transport, config);
        let handshake = session.initialize().await.map(|_| ());
        match handshake {
            Ok(()) => Ok(session),
            Err(e) => {
                if let Err(close_err) = session.transport.close().await {
                    warn!(error = %close_err, "Failed to close transport after handshake error");
                }
                Err(e)
            }
        }
    }

    /// Perform the mandatory `initialize` round trip
    pub async fn initialize(&mut self) -> Result<&InitializeResult, ClientError> {
        let params = InitializeParams {
            protocol_version: MCP_VERSION.to_string(),
            capabilities: json!({"roots": {"listChanged": true}, "sampling": {}}),
            client_info: self.config.client_info.clone(),
        };

        let result: InitializeResult = self.request(methods::INITIALIZE, &params).await?;
        info!(
            server_name = %result.server_info.name,
            server_version = %result.server_info.version,
            protocol_version = %result.protocol_version,
            "MCP session initialized"
        );

        Ok(self.server_info.insert(result))
    }

    /// Send one request and wait for its response
    #[instrument(skip(self, params), fields(id = self.next_id))]
    pub async fn call(&mut self, method: &str, params: Params) -> Result<Value, ClientError> {
        match self.state {
            SessionState::Closed => return Err(ClientError::SessionClosed),
            SessionState::New if method != methods::INITIALIZE => {
                return Err(ClientError::NotInitialized)
            }
            _ => {}
        }

        let result = self.round_trip(method, params).await;
        match &result {
            Ok(_) if method == methods::INITIALIZE => self.state = SessionState::Ready,
            Err(e) if e.is_terminal() => {
                warn!(error = %e, "Connection-level failure, closing session");
                self.state = SessionState::Closed;
            }
            _ => {}
        }
        result
    }

    async fn round_trip(&mut self, method: &str, params: Params) -> Result<Value, ClientError> {
        let id = RequestId(self.next_id);
        self.next_id += 1;

        let request = JsonRpcRequest::new(id, method).with_params(params);
        let record = codec::encode(&request.into())?;
        trace!(%id, %method, "Sending request");
        self.transport.send(&record).await?;

        let line = match self.config.request_timeout {
            Some(limit) => tokio::time::timeout(limit, self.transport.receive())
                .await
                .map_err(|_| ClientError::Timeout(limit))??,
            None => self.transport.receive().await?,
        };

        let response = match codec::decode(&line)? {
            Message::Response(response) => response,
            Message::Request(request) => {
                return Err(ClientError::ProtocolViolation(format!(
                    "server sent a request ({}) instead of a response",
                    request.method
                )))
            }
        };

        if response.id != id {
            return Err(ClientError::ProtocolDesync {
                expected: id,
                actual: response.id,
            });
        }

        response.into_result().map_err(|error| {
            debug!(%id, %method, error = %error, "Server returned an error");
            ClientError::RemoteError(error)
        })
    }

    /// Typed request helper: serialize params, deserialize the result
    pub async fn request<P, R>(&mut self, method: &str, params: &P) -> Result<R, ClientError>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let params = match serde_json::to_value(params)? {
            Value::Object(map) => map,
            Value::Null => Params::new(),
            other => {
                return Err(ClientError::ProtocolViolation(format!(
                    "params must serialize to an object, got {}",
                    other
                )))
            }
        };
        let result = self.call(method, params).await?;
        Ok(serde_json::from_value(result)?)
    }

    pub async fn ping(&mut self) -> Result<(), ClientError> {
        self.call(methods::PING, Params::new()).await.map(|_| ())
    }

    pub async fn list_tools(&mut self) -> Result<Vec<Tool>, ClientError> {
        let result: ListToolsResult = self.request(methods::LIST_TOOLS, &json!({})).await?;
        Ok(result.tools)
    }

    /// Call a tool by name
    pub async fn call_tool(
        &mut self,
        name: &str,
        arguments: Value,
    ) -> Result<CallToolResult, ClientError> {
        let result: CallToolResult = self
            .request(
                methods::CALL_TOOL,
                &json!({"name": name, "arguments": arguments}),
            )
            .await?;
        if result.is_error {
            warn!(tool_name = %name, "Tool returned error result");
        }
        Ok(result)
    }

    pub async fn list_resources(&mut self) -> Result<Vec<Resource>, ClientError> {
        let result: ListResourcesResult =
            self.request(methods::LIST_RESOURCES, &json!({})).await?;
        Ok(result.resources)
    }

    pub async fn list_resource_templates(&mut self) -> Result<Vec<ResourceTemplate>, ClientError> {
        let result: ListResourceTemplatesResult = self
            .request(methods::LIST_RESOURCE_TEMPLATES, &json!({}))
            .await?;
        Ok(result.resource_templates)
    }

    pub async fn read_resource(&mut self, uri: &str) -> Result<ReadResourceResult, ClientError> {
        self.request(methods::READ_RESOURCE, &ReadResourceParams { uri: uri.to_string() })
            .await
    }

    pub async fn list_prompts(&mut self) -> Result<Vec<Prompt>, ClientError> {
        let result: ListPromptsResult = self.request(methods::LIST_PROMPTS, &json!({})).await?;
        Ok(result.prompts)
    }

    pub async fn get_prompt(
        &mut self,
        name: &str,
        arguments: Value,
    ) -> Result<GetPromptResult, ClientError> {
        self.request(
            methods::GET_PROMPT,
            &json!({"name": name, "arguments": arguments}),
        )
        .await
    }

    /// Server handshake payload, once initialized
    pub fn server_info(&self) -> Option<&InitializeResult> {
        self.server_info.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.state == SessionState::Ready
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    /// Id the next call will use
    pub fn next_request_id(&self) -> RequestId {
        RequestId(self.next_id)
    }

    /// Release the channel. The session cannot be used afterwards.
    pub async fn close(mut self) -> Result<(), ClientError> {
        debug!("Closing MCP client session");
        self.state = SessionState::Closed;
        self.transport.close().await?;
        Ok(())
    }
}
