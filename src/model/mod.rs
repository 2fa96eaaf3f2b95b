use chrono::{DateTime, Utc};
use edtui::{EditorEventHandler, EditorMode, EditorState, Lines};
use ratatui::widgets::ListState;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

use crate::layout::{CustomLayoutConfig, LayoutNode};
use crate::menu::MenuItem;
use crate::notifications::NotificationCenter;
use crate::ordering::OrderingStore;

/// Lifecycle status of a task's worktree/branch, as reported by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Agent session running in the worktree
    Live,
    #[default]
    Idle,
    Merged,
    Conflict,
    Broken,
    Archived,
}

impl TaskStatus {
    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::Live => "Live",
            TaskStatus::Idle => "Idle",
            TaskStatus::Merged => "Merged",
            TaskStatus::Conflict => "Conflict",
            TaskStatus::Broken => "Broken",
            TaskStatus::Archived => "Archived",
        }
    }
}

/// Who created the task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CreatedBy {
    #[default]
    User,
    Agent,
}

/// One commit on a task branch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskCommit {
    pub sha: String,
    pub subject: String,
}

/// A unit of work bound to a dedicated git worktree/branch.
/// Owned by the external service; the controller holds read-only mirrors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub name: String,
    pub branch: String,
    pub target_branch: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub additions: u32,
    #[serde(default)]
    pub deletions: u32,
    #[serde(default)]
    pub files_changed: u32,
    #[serde(default)]
    pub commits: Vec<TaskCommit>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub created_by: CreatedBy,
}

impl Task {
    pub fn is_archived(&self) -> bool {
        self.status == TaskStatus::Archived
    }

    pub fn is_broken(&self) -> bool {
        self.status == TaskStatus::Broken
    }

    /// Anything not archived is active
    pub fn is_active(&self) -> bool {
        !self.is_archived()
    }

    /// Active and not broken: the gate for branch-mutating verbs
    pub fn can_operate(&self) -> bool {
        self.is_active() && !self.is_broken()
    }

    pub fn can_commit(&self) -> bool {
        self.is_active()
    }

    pub fn can_sync(&self) -> bool {
        self.can_operate()
    }

    pub fn can_merge(&self) -> bool {
        self.can_operate()
    }

    pub fn can_rebase(&self) -> bool {
        self.can_operate()
    }

    pub fn can_archive(&self) -> bool {
        self.is_active()
    }

    pub fn can_reset(&self) -> bool {
        self.is_active()
    }

    pub fn can_recover(&self) -> bool {
        self.is_archived()
    }

    // Clean is always available; the confirmation prompt is the only gate.
    pub fn can_clean(&self) -> bool {
        true
    }
}

/// A registered repository with its task collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub path: PathBuf,
    pub current_branch: String,
    #[serde(default)]
    pub tasks: Vec<Task>,
    pub added_at: DateTime<Utc>,
}

impl Project {
    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }
}

/// Stable reference to one task in one project
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskRef {
    pub project_id: String,
    pub task_id: String,
}

impl TaskRef {
    pub fn new(project_id: impl Into<String>, task_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            task_id: task_id.into(),
        }
    }

    /// Stable ordering key, `projectId:taskId`
    pub fn key(&self) -> String {
        format!("{}:{}", self.project_id, self.task_id)
    }
}

/// A task seen through the cross-project aggregation
#[derive(Debug, Clone, Copy)]
pub struct CrossProjectTaskRef<'a> {
    pub project_id: &'a str,
    pub project_name: &'a str,
    pub task: &'a Task,
}

impl CrossProjectTaskRef<'_> {
    pub fn key(&self) -> String {
        format!("{}:{}", self.project_id, self.task.id)
    }

    pub fn to_ref(&self) -> TaskRef {
        TaskRef::new(self.project_id, self.task.id.clone())
    }
}

/// Severity of a server-raised attention flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Critical,
    Warn,
    Notice,
}

/// Attention flag attached to a (project, task) pair; at most one per task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEntry {
    pub project_id: String,
    pub task_id: String,
    pub level: NotificationLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl NotificationEntry {
    pub fn task_ref(&self) -> TaskRef {
        TaskRef::new(self.project_id.clone(), self.task_id.clone())
    }
}

/// How much detail/session is shown for the selected task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    List,
    Info,
    Workspace,
}

/// Tabs of the info panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InfoTab {
    #[default]
    Changes,
    Commits,
    Session,
}

impl InfoTab {
    pub fn next(&self) -> InfoTab {
        match self {
            InfoTab::Changes => InfoTab::Commits,
            InfoTab::Commits => InfoTab::Session,
            InfoTab::Session => InfoTab::Changes,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            InfoTab::Changes => "Changes",
            InfoTab::Commits => "Commits",
            InfoTab::Session => "Session",
        }
    }
}

/// Which surface consumes plain keystrokes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FocusArea {
    #[default]
    TaskList,
    Search,
}

/// The asynchronous git-lifecycle verbs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Commit,
    Sync,
    Merge,
    Rebase,
    Archive,
    Reset,
    Clean,
    Recover,
}

/// How a merge is performed on the target branch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMethod {
    Squash,
    MergeCommit,
}

impl MergeMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeMethod::Squash => "squash",
            MergeMethod::MergeCommit => "merge-commit",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MergeMethod::Squash => "Squash into one commit",
            MergeMethod::MergeCommit => "Merge commit",
        }
    }
}

/// In-flight bookkeeping for the operation pipeline.
/// Keyed by (task key, verb) so a response for one task can never bleed into
/// another task's dialog while the user switches selection mid-request.
#[derive(Debug, Default)]
pub struct OpState {
    in_flight: HashSet<(String, Verb)>,
}

impl OpState {
    pub fn begin(&mut self, task: &TaskRef, verb: Verb) {
        self.in_flight.insert((task.key(), verb));
    }

    pub fn finish(&mut self, task: &TaskRef, verb: Verb) {
        self.in_flight.remove(&(task.key(), verb));
    }

    pub fn is_loading(&self, task: &TaskRef, verb: Verb) -> bool {
        self.in_flight.contains(&(task.key(), verb))
    }

    /// Any verb in flight for this task (spinner display)
    pub fn any_for_key(&self, key: &str) -> bool {
        self.in_flight.iter().any(|(k, _)| k == key)
    }
}

/// Commit-message dialog; the message text lives in the shared editor
#[derive(Debug, Clone)]
pub struct CommitDialog {
    pub task: TaskRef,
    pub error: Option<String>,
}

/// Merge method-choice dialog (squash | merge-commit)
#[derive(Debug, Clone)]
pub struct MergeDialog {
    pub task: TaskRef,
    pub selected: usize,
    pub error: Option<String>,
}

impl MergeDialog {
    pub const METHODS: [MergeMethod; 2] = [MergeMethod::Squash, MergeMethod::MergeCommit];

    pub fn method(&self) -> MergeMethod {
        Self::METHODS[self.selected.min(Self::METHODS.len() - 1)]
    }
}

/// Branch picker for retargeting a task
#[derive(Debug, Clone)]
pub struct RebaseDialog {
    pub task: TaskRef,
    pub branches: Vec<String>,
    pub selected: usize,
}

impl RebaseDialog {
    pub fn branch(&self) -> Option<&str> {
        self.branches.get(self.selected).map(|s| s.as_str())
    }
}

/// Destructive-verb confirmation prompt (reset, clean)
#[derive(Debug, Clone)]
pub struct ConfirmDialog {
    pub task: TaskRef,
    pub verb: Verb,
    pub message: String,
}

/// Context menu opened on a task at a screen position
#[derive(Debug, Clone)]
pub struct ContextMenuState {
    pub task: TaskRef,
    pub anchor: (u16, u16),
    pub items: Vec<MenuItem>,
    pub selected: usize,
}

/// "Archive now or later" decision offered after a successful merge
#[derive(Debug, Clone, Default)]
pub enum CascadeState {
    #[default]
    Idle,
    AwaitingArchiveDecision { task: TaskRef, task_name: String },
}

impl CascadeState {
    pub fn is_awaiting(&self) -> bool {
        matches!(self, CascadeState::AwaitingArchiveDecision { .. })
    }
}

/// UI state (not persisted)
pub struct UiState {
    pub mode: ViewMode,
    pub selected: Option<TaskRef>,
    pub focus: FocusArea,
    pub search: String,
    pub show_archived: bool,
    pub info_tab: InfoTab,
    pub list_state: ListState,
    pub editor_state: EditorState,
    pub editor_event_handler: EditorEventHandler,
    pub commit_dialog: Option<CommitDialog>,
    pub merge_dialog: Option<MergeDialog>,
    pub rebase_dialog: Option<RebaseDialog>,
    pub confirm: Option<ConfirmDialog>,
    pub context_menu: Option<ContextMenuState>,
    pub show_help: bool,
    pub quick_select_visible: bool,
    /// Safety timeout for the quick-select hint, in ticks; release events are
    /// not delivered on every terminal
    pub quick_select_ticks: u16,
    pub status_message: Option<String>,
    pub status_ticks: u16,
    /// Active pane ordinal in the workspace layout
    pub workspace_pane: usize,
}

impl Default for UiState {
    fn default() -> Self {
        let mut editor_state = EditorState::default();
        editor_state.mode = EditorMode::Insert;

        Self {
            mode: ViewMode::default(),
            selected: None,
            focus: FocusArea::default(),
            search: String::new(),
            show_archived: false,
            info_tab: InfoTab::default(),
            list_state: ListState::default(),
            editor_state,
            editor_event_handler: EditorEventHandler::default(),
            commit_dialog: None,
            merge_dialog: None,
            rebase_dialog: None,
            confirm: None,
            context_menu: None,
            show_help: false,
            quick_select_visible: false,
            quick_select_ticks: 0,
            status_message: None,
            status_ticks: 0,
            workspace_pane: 0,
        }
    }
}

impl UiState {
    /// Get the current text content from the editor
    pub fn get_input_text(&self) -> String {
        self.editor_state.lines.to_string()
    }

    /// Set the editor text content (starts in Insert mode)
    pub fn set_input_text(&mut self, text: &str) {
        self.editor_state = EditorState::new(Lines::from(text));
        self.editor_state.mode = EditorMode::Insert;
    }

    /// Clear the editor text
    pub fn clear_input(&mut self) {
        self.editor_state = EditorState::default();
        self.editor_state.mode = EditorMode::Insert;
    }
}

/// Top-level application state
pub struct AppModel {
    /// Read-only mirrors of the service-owned data, refreshed on demand
    pub projects: Vec<Project>,
    pub ordering: OrderingStore,
    pub notifications: NotificationCenter,
    pub layouts: Vec<CustomLayoutConfig>,
    pub active_layout: usize,
    pub ops: OpState,
    pub cascade: CascadeState,
    pub ui_state: UiState,
}

impl Default for AppModel {
    fn default() -> Self {
        Self {
            projects: Vec::new(),
            ordering: OrderingStore::default(),
            notifications: NotificationCenter::default(),
            layouts: vec![CustomLayoutConfig::named("Default")],
            active_layout: 0,
            ops: OpState::default(),
            cascade: CascadeState::default(),
            ui_state: UiState::default(),
        }
    }
}

impl AppModel {
    pub fn project(&self, project_id: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == project_id)
    }

    pub fn task(&self, task: &TaskRef) -> Option<&Task> {
        self.project(&task.project_id)?.task(&task.task_id)
    }

    pub fn task_mut(&mut self, task: &TaskRef) -> Option<&mut Task> {
        self.projects
            .iter_mut()
            .find(|p| p.id == task.project_id)?
            .tasks
            .iter_mut()
            .find(|t| t.id == task.task_id)
    }

    pub fn selected_task(&self) -> Option<&Task> {
        self.ui_state.selected.as_ref().and_then(|r| self.task(r))
    }

    /// Tasks whose target equals their project's current branch, not archived
    pub fn aggregated(&self) -> Vec<CrossProjectTaskRef<'_>> {
        let mut refs = Vec::new();
        for project in &self.projects {
            for task in &project.tasks {
                if task.target_branch == project.current_branch && !task.is_archived() {
                    refs.push(CrossProjectTaskRef {
                        project_id: &project.id,
                        project_name: &project.name,
                        task,
                    });
                }
            }
        }
        refs
    }

    /// Ordering keys for the aggregated collection, in fetch order
    pub fn aggregated_keys(&self) -> Vec<String> {
        self.aggregated().iter().map(|r| r.key()).collect()
    }

    /// The collection the list shows: aggregated tasks in user order, filtered
    /// by the search text, with archived tasks appended when revealed
    pub fn visible_entries(&self) -> Vec<CrossProjectTaskRef<'_>> {
        let mut entries = self.aggregated();
        entries.sort_by_key(|r| self.ordering.position(&r.key()).unwrap_or(usize::MAX));

        if self.ui_state.show_archived {
            for project in &self.projects {
                for task in &project.tasks {
                    if task.is_archived() {
                        entries.push(CrossProjectTaskRef {
                            project_id: &project.id,
                            project_name: &project.name,
                            task,
                        });
                    }
                }
            }
        }

        let needle = self.ui_state.search.trim().to_lowercase();
        if !needle.is_empty() {
            entries.retain(|r| {
                r.task.name.to_lowercase().contains(&needle)
                    || r.task.branch.to_lowercase().contains(&needle)
            });
        }
        entries
    }

    /// Owned refs of the visible collection, for handlers that need to mutate
    pub fn visible_refs(&self) -> Vec<TaskRef> {
        self.visible_entries().iter().map(|r| r.to_ref()).collect()
    }

    /// Index of the selected task within the visible collection
    pub fn selected_visible_index(&self) -> Option<usize> {
        let selected = self.ui_state.selected.as_ref()?;
        self.visible_entries()
            .iter()
            .position(|r| r.project_id == selected.project_id && r.task.id == selected.task_id)
    }

    /// The workspace layout currently being arranged
    pub fn active_layout(&self) -> &LayoutNode {
        &self.layouts[self.active_layout].root
    }

    pub fn active_layout_mut(&mut self) -> &mut LayoutNode {
        &mut self.layouts[self.active_layout].root
    }
}
