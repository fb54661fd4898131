//! Todo MCP Library
//!
//! A small Model Context Protocol server and client over line-delimited
//! JSON-RPC, with an in-memory to-do list exposed as tools, resources and
//! prompts.

pub mod config;
pub mod error;
pub mod mcp;
pub mod todo;

pub use config::Config;
pub use error::{Result, TodoMcpError};
