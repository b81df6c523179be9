//! Parley Daemon: Serves chat turns and conversation management over a Unix socket.

pub mod config;
pub mod engine;
pub mod handler;
pub mod server;
pub mod store;
