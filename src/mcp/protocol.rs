use super::tools::ToolsHandler;
use crate::Error;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

pub const PROTOCOL_VERSION: &str = "2024-11-05";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    Request(JsonRpcRequest),
    Response(JsonRpcResponse),
    Notification(JsonRpcNotification),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Value,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, error: &Error) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code: error.error_code(),
                message: error.to_string(),
                data: None,
            }),
        }
    }
}

pub struct ProtocolHandler {
    initialized: bool,
    tools_handler: Arc<ToolsHandler>,
}

impl ProtocolHandler {
    pub fn new(tools_handler: Arc<ToolsHandler>) -> Self {
        Self {
            initialized: false,
            tools_handler,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Returns the reply to send, if any. Notifications never get one.
    pub async fn handle_message(&mut self, msg: JsonRpcMessage) -> Option<JsonRpcMessage> {
        match msg {
            JsonRpcMessage::Request(req) => {
                Some(JsonRpcMessage::Response(self.handle_request(req).await))
            }
            JsonRpcMessage::Notification(notif) => {
                debug!("Notification: {}", notif.method);
                if notif.method == "notifications/initialized" {
                    self.initialized = true;
                }
                None
            }
            JsonRpcMessage::Response(resp) => {
                warn!("Ignoring response message (id {})", resp.id);
                None
            }
        }
    }

    async fn handle_request(&mut self, req: JsonRpcRequest) -> JsonRpcResponse {
        debug!("Handling request: {}", req.method);

        match req.method.as_str() {
            "initialize" => self.handle_initialize(req),
            "ping" => JsonRpcResponse::success(req.id, json!({})),
            "tools/list" => JsonRpcResponse::success(
                req.id,
                json!({ "tools": ToolsHandler::list_tools() }),
            ),
            "tools/call" => self.handle_tools_call(req).await,
            _ => JsonRpcResponse::failure(req.id, &Error::MethodNotFound(req.method.clone())),
        }
    }

    fn handle_initialize(&mut self, req: JsonRpcRequest) -> JsonRpcResponse {
        self.initialized = true;

        JsonRpcResponse::success(
            req.id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {
                    "tools": {},
                },
                "serverInfo": {
                    "name": env!("CARGO_PKG_NAME"),
                    "version": env!("CARGO_PKG_VERSION"),
                },
            }),
        )
    }

    async fn handle_tools_call(&self, req: JsonRpcRequest) -> JsonRpcResponse {
        let Some(params) = req.params else {
            return JsonRpcResponse::failure(
                req.id,
                &Error::InvalidRequest("Missing params".to_string()),
            );
        };

        let name = params.get("name").and_then(|v| v.as_str()).unwrap_or("");
        let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

        match self.tools_handler.handle_tool(name, arguments).await {
            Ok(result) => JsonRpcResponse::success(
                req.id,
                json!({
                    "content": [{
                        "type": "text",
                        "text": serde_json::to_string_pretty(&result).unwrap_or_else(|_| "{}".to_string())
                    }]
                }),
            ),
            Err(e) => {
                warn!("Tool {} failed: {}", name, e);
                JsonRpcResponse::failure(req.id, &e)
            }
        }
    }
}
