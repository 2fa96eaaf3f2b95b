//! The fixed operation contract of the external worktree service, plus the
//! thread-per-call dispatcher that keeps the update loop non-blocking.

pub mod client;
pub mod protocol;

use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::message::Message;
use crate::model::{MergeMethod, NotificationEntry, Project, Task, TaskRef};

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Service unreachable or the connection died mid-call
    #[error("service unreachable: {0}")]
    Transport(String),
    /// The service answered with something we could not decode
    #[error("malformed service response: {0}")]
    Protocol(String),
    /// The service answered with an error of its own
    #[error("{0}")]
    Remote(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Outcome of a mutating verb as the update loop sees it: the logical
/// result, or the transport failure collapsed to a display string.
pub type OpResult = Result<OpResponse, String>;

/// Logical result of a mutating verb
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CommitCount {
    pub total: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchInfo {
    pub name: String,
    #[serde(default)]
    pub is_current: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchList {
    pub branches: Vec<BranchInfo>,
    pub current: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskFilter {
    All,
    Active,
    Archived,
}

impl TaskFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskFilter::All => "all",
            TaskFilter::Active => "active",
            TaskFilter::Archived => "archived",
        }
    }
}

/// Operation contract of the task service. The daemon implements this over a
/// Unix socket; tests implement it with stubs.
pub trait TaskService: Send + Sync {
    fn list_projects(&self) -> ServiceResult<Vec<Project>>;
    fn get_project(&self, project_id: &str) -> ServiceResult<Project>;
    fn list_tasks(&self, project_id: &str, filter: TaskFilter) -> ServiceResult<Vec<Task>>;
    fn commit_task(&self, project_id: &str, task_id: &str, message: &str)
        -> ServiceResult<OpResponse>;
    fn sync_task(&self, project_id: &str, task_id: &str) -> ServiceResult<OpResponse>;
    fn get_commits(&self, project_id: &str, task_id: &str) -> ServiceResult<CommitCount>;
    fn merge_task(
        &self,
        project_id: &str,
        task_id: &str,
        method: MergeMethod,
    ) -> ServiceResult<OpResponse>;
    fn rebase_to_task(
        &self,
        project_id: &str,
        task_id: &str,
        new_target: &str,
    ) -> ServiceResult<OpResponse>;
    fn get_branches(&self, project_id: &str) -> ServiceResult<BranchList>;
    fn archive_task(&self, project_id: &str, task_id: &str) -> ServiceResult<OpResponse>;
    fn recover_task(&self, project_id: &str, task_id: &str) -> ServiceResult<OpResponse>;
    fn delete_task(&self, project_id: &str, task_id: &str) -> ServiceResult<OpResponse>;
    fn reset_task(&self, project_id: &str, task_id: &str) -> ServiceResult<OpResponse>;
}

/// Attention-flag side of the daemon
pub trait NotificationService: Send + Sync {
    fn list_all_hooks(&self) -> ServiceResult<Vec<NotificationEntry>>;
    fn dismiss_hook(&self, project_id: &str, task_id: &str) -> ServiceResult<()>;
}

/// Hands verb calls to worker threads and routes each completion back into
/// the update loop as exactly one message. The caller keeps the (task, verb)
/// pair marked in-flight until that message lands, which is what disables the
/// triggering affordance for the duration.
#[derive(Clone)]
pub struct Dispatcher {
    tasks: Arc<dyn TaskService>,
    notifications: Arc<dyn NotificationService>,
    tx: Sender<Message>,
}

impl Dispatcher {
    pub fn new(
        tasks: Arc<dyn TaskService>,
        notifications: Arc<dyn NotificationService>,
        tx: Sender<Message>,
    ) -> Self {
        Self {
            tasks,
            notifications,
            tx,
        }
    }

    pub fn refresh_all(&self) {
        let svc = Arc::clone(&self.tasks);
        let tx = self.tx.clone();
        thread::spawn(move || {
            let result = svc.list_projects().map_err(|e| e.to_string());
            let _ = tx.send(Message::TasksLoaded(result));
        });
    }

    pub fn refresh_project(&self, project_id: String) {
        let svc = Arc::clone(&self.tasks);
        let tx = self.tx.clone();
        thread::spawn(move || {
            let result = svc.get_project(&project_id).map_err(|e| e.to_string());
            let _ = tx.send(Message::ProjectLoaded(result));
        });
    }

    pub fn commit(&self, task: TaskRef, message: String) {
        let svc = Arc::clone(&self.tasks);
        let tx = self.tx.clone();
        thread::spawn(move || {
            let outcome = svc
                .commit_task(&task.project_id, &task.task_id, &message)
                .map_err(|e| e.to_string());
            let _ = tx.send(Message::CommitFinished { task, outcome });
        });
    }

    pub fn sync(&self, task: TaskRef) {
        let svc = Arc::clone(&self.tasks);
        let tx = self.tx.clone();
        thread::spawn(move || {
            let outcome = svc
                .sync_task(&task.project_id, &task.task_id)
                .map_err(|e| e.to_string());
            let _ = tx.send(Message::SyncFinished { task, outcome });
        });
    }

    pub fn commit_count(&self, task: TaskRef) {
        let svc = Arc::clone(&self.tasks);
        let tx = self.tx.clone();
        thread::spawn(move || {
            let result = svc
                .get_commits(&task.project_id, &task.task_id)
                .map(|c| c.total)
                .map_err(|e| e.to_string());
            let _ = tx.send(Message::CommitCountLoaded { task, result });
        });
    }

    pub fn merge(&self, task: TaskRef, method: MergeMethod) {
        let svc = Arc::clone(&self.tasks);
        let tx = self.tx.clone();
        thread::spawn(move || {
            let outcome = svc
                .merge_task(&task.project_id, &task.task_id, method)
                .map_err(|e| e.to_string());
            let _ = tx.send(Message::MergeFinished { task, outcome });
        });
    }

    pub fn branches(&self, task: TaskRef) {
        let svc = Arc::clone(&self.tasks);
        let tx = self.tx.clone();
        thread::spawn(move || {
            let result = svc
                .get_branches(&task.project_id)
                .map(|list| list.branches.into_iter().map(|b| b.name).collect())
                .map_err(|e| e.to_string());
            let _ = tx.send(Message::BranchesLoaded { task, result });
        });
    }

    pub fn rebase(&self, task: TaskRef, new_target: String) {
        let svc = Arc::clone(&self.tasks);
        let tx = self.tx.clone();
        thread::spawn(move || {
            let outcome = svc
                .rebase_to_task(&task.project_id, &task.task_id, &new_target)
                .map_err(|e| e.to_string());
            let _ = tx.send(Message::RebaseFinished {
                task,
                new_target,
                outcome,
            });
        });
    }

    pub fn archive(&self, task: TaskRef) {
        let svc = Arc::clone(&self.tasks);
        let tx = self.tx.clone();
        thread::spawn(move || {
            let outcome = svc
                .archive_task(&task.project_id, &task.task_id)
                .map_err(|e| e.to_string());
            let _ = tx.send(Message::ArchiveFinished { task, outcome });
        });
    }

    /// Archive triggered from the post-merge cascade; same remote call,
    /// different completion handling on the way back
    pub fn cascade_archive(&self, task: TaskRef) {
        let svc = Arc::clone(&self.tasks);
        let tx = self.tx.clone();
        thread::spawn(move || {
            let outcome = svc
                .archive_task(&task.project_id, &task.task_id)
                .map_err(|e| e.to_string());
            let _ = tx.send(Message::CascadeArchiveFinished { task, outcome });
        });
    }

    pub fn recover(&self, task: TaskRef) {
        let svc = Arc::clone(&self.tasks);
        let tx = self.tx.clone();
        thread::spawn(move || {
            let outcome = svc
                .recover_task(&task.project_id, &task.task_id)
                .map_err(|e| e.to_string());
            let _ = tx.send(Message::RecoverFinished { task, outcome });
        });
    }

    pub fn reset(&self, task: TaskRef) {
        let svc = Arc::clone(&self.tasks);
        let tx = self.tx.clone();
        thread::spawn(move || {
            let outcome = svc
                .reset_task(&task.project_id, &task.task_id)
                .map_err(|e| e.to_string());
            let _ = tx.send(Message::ResetFinished { task, outcome });
        });
    }

    pub fn delete(&self, task: TaskRef) {
        let svc = Arc::clone(&self.tasks);
        let tx = self.tx.clone();
        thread::spawn(move || {
            let outcome = svc
                .delete_task(&task.project_id, &task.task_id)
                .map_err(|e| e.to_string());
            let _ = tx.send(Message::CleanFinished { task, outcome });
        });
    }

    /// Fire-and-forget remote dismiss; the local entry is already gone and a
    /// failure only means the flag reappears on the next poll
    pub fn dismiss(&self, project_id: String, task_id: String) {
        let svc = Arc::clone(&self.notifications);
        thread::spawn(move || {
            let _ = svc.dismiss_hook(&project_id, &task_id);
        });
    }
}
