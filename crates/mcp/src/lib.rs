//! MCP (Model Context Protocol) plumbing for the toolbelt: the JSON-RPC
//! protocol types, a stdio server exposing the tool registry, a stdio client
//! for proxying another server's tools, and the tools themselves.

pub mod client;
pub mod protocol;
pub mod server;
pub mod tools;

pub use client::{McpClient, McpClientError, ServerCommand};
pub use server::McpServer;
