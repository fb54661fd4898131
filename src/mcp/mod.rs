//! MCP (Model Context Protocol) module
//!
//! Line-delimited JSON-RPC framing, a route registry, and the server and
//! client ends of a session.

pub mod client;
pub mod codec;
pub mod router;
pub mod server;
pub mod transport;
pub mod types;
