//! Unix socket client for the worktree daemon

#![allow(dead_code)]

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::protocol::{
    CommitParams, JsonRpcRequest, JsonRpcResponse, ListTasksParams, MergeParams, ProjectParams,
    RebaseParams, TaskParams,
};
use super::{
    BranchList, CommitCount, NotificationService, OpResponse, ServiceError, ServiceResult,
    TaskFilter, TaskService,
};
use crate::model::{MergeMethod, NotificationEntry, Project, Task};

/// Path to the daemon socket
fn socket_path() -> PathBuf {
    if let Ok(path) = std::env::var("CANOPY_SOCKET") {
        return PathBuf::from(path);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".canopy")
        .join("daemon.sock")
}

/// Blocking JSON-RPC client. One request/response per call, serialized over
/// a single connection; worker threads contend on the stream mutex.
pub struct SocketClient {
    stream: Mutex<UnixStream>,
    request_id: AtomicU64,
}

impl SocketClient {
    /// Connect to the daemon at the default (or env-overridden) socket
    pub fn connect() -> ServiceResult<Self> {
        Self::connect_to(&socket_path())
    }

    pub fn connect_to(path: &Path) -> ServiceResult<Self> {
        let stream = UnixStream::connect(path).map_err(|e| {
            ServiceError::Transport(format!("failed to connect to {}: {}", path.display(), e))
        })?;
        stream
            .set_read_timeout(Some(Duration::from_secs(30)))
            .map_err(|e| ServiceError::Transport(e.to_string()))?;

        Ok(Self {
            stream: Mutex::new(stream),
            request_id: AtomicU64::new(1),
        })
    }

    /// Check whether the daemon socket exists at all
    pub fn is_available() -> bool {
        socket_path().exists()
    }

    fn send_request(
        &self,
        method: &'static str,
        params: Option<serde_json::Value>,
    ) -> ServiceResult<JsonRpcResponse> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest::new(id, method, params);
        let mut payload = serde_json::to_string(&request)
            .map_err(|e| ServiceError::Protocol(e.to_string()))?;
        payload.push('\n');

        let mut stream = self
            .stream
            .lock()
            .map_err(|_| ServiceError::Transport("client stream poisoned".to_string()))?;
        stream
            .write_all(payload.as_bytes())
            .map_err(|e| ServiceError::Transport(e.to_string()))?;

        let mut reader = BufReader::new(&*stream);
        let mut line = String::new();
        reader
            .read_line(&mut line)
            .map_err(|e| ServiceError::Transport(e.to_string()))?;
        if line.is_empty() {
            return Err(ServiceError::Transport("connection closed".to_string()));
        }

        serde_json::from_str(&line).map_err(|e| ServiceError::Protocol(e.to_string()))
    }

    fn call<T: DeserializeOwned>(
        &self,
        method: &'static str,
        params: Option<serde_json::Value>,
    ) -> ServiceResult<T> {
        let response = self.send_request(method, params)?;
        if let Some(error) = response.error {
            return Err(ServiceError::Remote(format!(
                "{} (code {})",
                error.message, error.code
            )));
        }
        let result = response
            .result
            .ok_or_else(|| ServiceError::Protocol("response missing result".to_string()))?;
        serde_json::from_value(result).map_err(|e| ServiceError::Protocol(e.to_string()))
    }
}

fn params<T: Serialize>(value: T) -> ServiceResult<Option<serde_json::Value>> {
    serde_json::to_value(value)
        .map(Some)
        .map_err(|e| ServiceError::Protocol(e.to_string()))
}

impl TaskService for SocketClient {
    fn list_projects(&self) -> ServiceResult<Vec<Project>> {
        self.call("list_projects", None)
    }

    fn get_project(&self, project_id: &str) -> ServiceResult<Project> {
        self.call(
            "get_project",
            params(ProjectParams {
                project_id: project_id.to_string(),
            })?,
        )
    }

    fn list_tasks(&self, project_id: &str, filter: TaskFilter) -> ServiceResult<Vec<Task>> {
        self.call(
            "list_tasks",
            params(ListTasksParams {
                project_id: project_id.to_string(),
                filter: filter.as_str(),
            })?,
        )
    }

    fn commit_task(
        &self,
        project_id: &str,
        task_id: &str,
        message: &str,
    ) -> ServiceResult<OpResponse> {
        self.call(
            "commit_task",
            params(CommitParams {
                project_id: project_id.to_string(),
                task_id: task_id.to_string(),
                message: message.to_string(),
            })?,
        )
    }

    fn sync_task(&self, project_id: &str, task_id: &str) -> ServiceResult<OpResponse> {
        self.call(
            "sync_task",
            params(TaskParams {
                project_id: project_id.to_string(),
                task_id: task_id.to_string(),
            })?,
        )
    }

    fn get_commits(&self, project_id: &str, task_id: &str) -> ServiceResult<CommitCount> {
        self.call(
            "get_commits",
            params(TaskParams {
                project_id: project_id.to_string(),
                task_id: task_id.to_string(),
            })?,
        )
    }

    fn merge_task(
        &self,
        project_id: &str,
        task_id: &str,
        method: MergeMethod,
    ) -> ServiceResult<OpResponse> {
        self.call(
            "merge_task",
            params(MergeParams {
                project_id: project_id.to_string(),
                task_id: task_id.to_string(),
                method: method.as_str(),
            })?,
        )
    }

    fn rebase_to_task(
        &self,
        project_id: &str,
        task_id: &str,
        new_target: &str,
    ) -> ServiceResult<OpResponse> {
        self.call(
            "rebase_task",
            params(RebaseParams {
                project_id: project_id.to_string(),
                task_id: task_id.to_string(),
                new_target: new_target.to_string(),
            })?,
        )
    }

    fn get_branches(&self, project_id: &str) -> ServiceResult<BranchList> {
        self.call(
            "get_branches",
            params(ProjectParams {
                project_id: project_id.to_string(),
            })?,
        )
    }

    fn archive_task(&self, project_id: &str, task_id: &str) -> ServiceResult<OpResponse> {
        self.call(
            "archive_task",
            params(TaskParams {
                project_id: project_id.to_string(),
                task_id: task_id.to_string(),
            })?,
        )
    }

    fn recover_task(&self, project_id: &str, task_id: &str) -> ServiceResult<OpResponse> {
        self.call(
            "recover_task",
            params(TaskParams {
                project_id: project_id.to_string(),
                task_id: task_id.to_string(),
            })?,
        )
    }

    fn delete_task(&self, project_id: &str, task_id: &str) -> ServiceResult<OpResponse> {
        self.call(
            "delete_task",
            params(TaskParams {
                project_id: project_id.to_string(),
                task_id: task_id.to_string(),
            })?,
        )
    }

    fn reset_task(&self, project_id: &str, task_id: &str) -> ServiceResult<OpResponse> {
        self.call(
            "reset_task",
            params(TaskParams {
                project_id: project_id.to_string(),
                task_id: task_id.to_string(),
            })?,
        )
    }
}

impl NotificationService for SocketClient {
    fn list_all_hooks(&self) -> ServiceResult<Vec<NotificationEntry>> {
        self.call("list_hooks", None)
    }

    fn dismiss_hook(&self, project_id: &str, task_id: &str) -> ServiceResult<()> {
        let _: serde_json::Value = self.call(
            "dismiss_hook",
            params(TaskParams {
                project_id: project_id.to_string(),
                task_id: task_id.to_string(),
            })?,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Write};
    use std::os::unix::net::UnixListener;
    use std::thread;

    /// One-shot daemon: accepts a single connection and answers every request
    /// line with the canned result
    fn serve_once(path: PathBuf, result: &'static str) -> thread::JoinHandle<Vec<String>> {
        let listener = UnixListener::bind(&path).unwrap();
        thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut writer = stream;
            let mut seen = Vec::new();
            let mut line = String::new();
            while reader.read_line(&mut line).unwrap_or(0) > 0 {
                let request: serde_json::Value = serde_json::from_str(&line).unwrap();
                let id = request["id"].as_u64().unwrap();
                seen.push(line.trim().to_string());
                line.clear();
                let response = format!(
                    "{{\"jsonrpc\":\"2.0\",\"id\":{},{}}}\n",
                    id, result
                );
                if writer.write_all(response.as_bytes()).is_err() {
                    break;
                }
            }
            seen
        })
    }

    #[test]
    fn test_get_commits_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon.sock");
        let server = serve_once(path.clone(), "\"result\":{\"total\":3}");

        let client = SocketClient::connect_to(&path).unwrap();
        let count = client.get_commits("p1", "t1").unwrap();
        assert_eq!(count.total, 3);

        drop(client);
        let seen = server.join().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].contains("\"method\":\"get_commits\""));
        assert!(seen[0].contains("\"task_id\":\"t1\""));
    }

    #[test]
    fn test_remote_error_is_surfaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon.sock");
        let server = serve_once(
            path.clone(),
            "\"error\":{\"code\":-32001,\"message\":\"Task not found\"}",
        );

        let client = SocketClient::connect_to(&path).unwrap();
        let err = client.sync_task("p1", "missing").unwrap_err();
        match err {
            ServiceError::Remote(msg) => assert!(msg.contains("Task not found")),
            other => panic!("expected remote error, got {:?}", other),
        }

        drop(client);
        server.join().unwrap();
    }
}
