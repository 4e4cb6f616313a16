//! SafeRx drug safety API exposed as MCP tools over stdio.
//!
//! - [`tools`] adapts tool calls to the SafeRx HTTP API ([`client`]) and renders the replies
//!   ([`format`]).
//! - [`registry`] is the seam to the host transport; [`server`] implements it over stdio.

pub mod client;
pub mod config;
pub mod error;
pub mod format;
pub mod model;
pub mod observability;
pub mod registry;
pub mod schema;
pub mod server;
pub mod tools;

pub use config::AdapterConfig;
pub use error::{AdapterError, Result, ValidationError};
pub use server::StdioServer;
pub use tools::SafetyTools;
