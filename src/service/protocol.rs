//! JSON-RPC 2.0 protocol types for talking to the worktree daemon

#![allow(dead_code)]

use serde::{Deserialize, Serialize};

/// JSON-RPC 2.0 Request
#[derive(Debug, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: &'static str, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

/// JSON-RPC 2.0 Response
#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: u64,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 Error
#[derive(Debug, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

// Request parameter types

#[derive(Debug, Serialize)]
pub struct ProjectParams {
    pub project_id: String,
}

#[derive(Debug, Serialize)]
pub struct TaskParams {
    pub project_id: String,
    pub task_id: String,
}

#[derive(Debug, Serialize)]
pub struct ListTasksParams {
    pub project_id: String,
    pub filter: &'static str,
}

#[derive(Debug, Serialize)]
pub struct CommitParams {
    pub project_id: String,
    pub task_id: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct MergeParams {
    pub project_id: String,
    pub task_id: String,
    pub method: &'static str,
}

#[derive(Debug, Serialize)]
pub struct RebaseParams {
    pub project_id: String,
    pub task_id: String,
    pub new_target: String,
}

// Error codes matching the daemon
pub mod error_codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
    pub const PROJECT_NOT_FOUND: i32 = -32000;
    pub const TASK_NOT_FOUND: i32 = -32001;
    pub const WORKTREE_BUSY: i32 = -32002;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let request = JsonRpcRequest::new(1, "sync_task", Some(json!({"project_id": "p1"})));
        let json = serde_json::to_string(&request).unwrap();

        assert!(json.contains("\"jsonrpc\":\"2.0\""));
        assert!(json.contains("\"id\":1"));
        assert!(json.contains("\"method\":\"sync_task\""));
        assert!(json.contains("\"params\":{\"project_id\":\"p1\"}"));
    }

    #[test]
    fn test_request_without_params() {
        let request = JsonRpcRequest::new(42, "list_projects", None);
        let json = serde_json::to_string(&request).unwrap();

        assert!(json.contains("\"id\":42"));
        assert!(!json.contains("params"));
    }

    #[test]
    fn test_response_deserialization() {
        let json = r#"{"jsonrpc":"2.0","id":1,"result":{"total":3}}"#;
        let response: JsonRpcResponse = serde_json::from_str(json).unwrap();

        assert_eq!(response.id, 1);
        assert!(response.result.is_some());
        assert!(response.error.is_none());
    }

    #[test]
    fn test_error_response() {
        let json = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32001,"message":"Task not found"}}"#;
        let response: JsonRpcResponse = serde_json::from_str(json).unwrap();

        assert!(response.result.is_none());
        let error = response.error.unwrap();
        assert_eq!(error.code, error_codes::TASK_NOT_FOUND);
        assert_eq!(error.message, "Task not found");
    }

    #[test]
    fn test_merge_params_use_wire_method_names() {
        let params = MergeParams {
            project_id: "p1".to_string(),
            task_id: "t1".to_string(),
            method: crate::model::MergeMethod::MergeCommit.as_str(),
        };
        let json = serde_json::to_string(&params).unwrap();
        assert!(json.contains("\"method\":\"merge-commit\""));
    }
}
