use thiserror::Error;

use crate::jsonrpc::{INVALID_PARAMS, METHOD_NOT_FOUND, PARSE_ERROR};

/// Errors raised while decoding a request before it reaches the engine.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Missing params")]
    MissingParams,

    #[error("Invalid params: {0}")]
    InvalidParams(#[from] serde_json::Error),

    #[error("Unknown method: {0}")]
    UnknownMethod(String),
}

impl ProtocolError {
    /// JSON-RPC error code for this failure.
    pub fn code(&self) -> i32 {
        match self {
            ProtocolError::Parse(_) => PARSE_ERROR,
            ProtocolError::MissingParams | ProtocolError::InvalidParams(_) => INVALID_PARAMS,
            ProtocolError::UnknownMethod(_) => METHOD_NOT_FOUND,
        }
    }
}
