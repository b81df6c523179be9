//! Parley Protocol: Shared data model and JSON-RPC 2.0 types.
//!
//! This crate contains no I/O or async code. It defines the conversation,
//! node and settings types shared by the engine, the daemon and the CLI,
//! plus the messages exchanged between the CLI and the daemon.

mod chat;
mod error;
mod jsonrpc;
mod node;
mod rpc;
mod settings;

pub use chat::*;
pub use error::*;
pub use jsonrpc::*;
pub use node::*;
pub use rpc::*;
pub use settings::*;
