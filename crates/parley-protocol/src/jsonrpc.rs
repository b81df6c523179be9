use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
    pub id: RequestId,
}

/// JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: RequestId,
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Request ID can be a string or number.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum RequestId {
    String(String),
    Number(i64),
}

// Standard JSON-RPC error codes
pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

/// Application error code for engine and store failures.
pub const SERVER_ERROR: i32 = -32000;

/// Known RPC method names.
pub mod methods {
    pub const STATUS: &str = "status";
    pub const SHUTDOWN: &str = "shutdown";
    pub const CHAT_SEND: &str = "chat/send";
    pub const CHAT_REGENERATE: &str = "chat/regenerate";
    pub const CHAT_HISTORY: &str = "chat/history";
    pub const CONVERSATION_CREATE: &str = "conversation/create";
    pub const CONVERSATION_LIST: &str = "conversation/list";
    pub const CONVERSATION_RENAME: &str = "conversation/rename";
    pub const CONVERSATION_DELETE: &str = "conversation/delete";
    pub const CONVERSATION_PRUNE: &str = "conversation/prune";
    pub const CONVERSATION_SYSTEM_PROMPT: &str = "conversation/system-prompt";
    pub const MESSAGE_EDIT: &str = "message/edit";
    pub const MESSAGE_DELETE: &str = "message/delete";
    pub const SETTINGS_GET: &str = "settings/get";
    pub const SETTINGS_UPDATE: &str = "settings/update";
    pub const FALLBACK_ADD: &str = "fallback/add";
    pub const FALLBACK_MOVE: &str = "fallback/move";
    pub const FALLBACK_REMOVE: &str = "fallback/remove";
}

impl JsonRpcRequest {
    pub fn new(method: impl Into<String>, params: Option<Value>, id: RequestId) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.into(),
            params,
            id,
        }
    }
}

impl JsonRpcResponse {
    pub fn success(result: Value, id: RequestId) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(code: i32, message: impl Into<String>, id: RequestId) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
            id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_request() {
        let req = JsonRpcRequest::new(
            methods::CHAT_SEND,
            Some(serde_json::json!({"text": "hello there"})),
            RequestId::Number(1),
        );
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"jsonrpc\":\"2.0\""));
        assert!(json.contains("\"method\":\"chat/send\""));
    }

    #[test]
    fn serialize_success_response() {
        let resp = JsonRpcResponse::success(
            serde_json::json!({"chat_id": "c1", "message": {"content": "Hello"}}),
            RequestId::Number(1),
        );
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"result\""));
        assert!(!json.contains("\"error\""));
    }

    #[test]
    fn serialize_error_response() {
        let resp =
            JsonRpcResponse::error(METHOD_NOT_FOUND, "Method not found", RequestId::Number(1));
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"error\""));
        assert!(json.contains("-32601"));
    }

    #[test]
    fn deserialize_request_with_string_id() {
        let json = r#"{"jsonrpc":"2.0","method":"chat/history","params":null,"id":"abc-123"}"#;
        let req: JsonRpcRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.id, RequestId::String("abc-123".to_string()));
        assert_eq!(req.method, methods::CHAT_HISTORY);
    }

    #[test]
    fn server_error_keeps_message() {
        let resp = JsonRpcResponse::error(SERVER_ERROR, "All API nodes failed", RequestId::Number(7));
        let err = resp.error.unwrap();
        assert_eq!(err.code, -32000);
        assert_eq!(err.message, "All API nodes failed");
    }
}
