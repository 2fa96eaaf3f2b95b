use crate::layout::SplitDirection;
use crate::model::{InfoTab, NotificationEntry, Project, TaskRef};
use crate::service::OpResult;

/// Messages that can be dispatched to update application state (TEA pattern)
#[derive(Debug, Clone)]
pub enum Message {
    // Selection and view modes
    /// Select a task; promotes List to Info, otherwise re-targets the current mode
    SelectTask(TaskRef),
    /// Open a task's workspace (double-select); refused for archived tasks
    ActivateTask(TaskRef),
    /// Step back: Workspace -> Info -> List
    CloseView,
    /// Move selection to the next/previous visible task, with wraparound
    SelectNext,
    SelectPrev,
    /// Jump to the nth visible task (0-based), via the modifier quick-select
    QuickSelect(usize),
    /// Show or hide the quick-select number badges (modifier press/release/blur)
    QuickSelectHint(bool),
    SetInfoTab(InfoTab),

    // Search
    FocusSearch,
    SearchChanged(String),
    ExitSearch,

    // Context menu
    OpenContextMenu { task: TaskRef, column: u16, row: u16 },
    CloseContextMenu,
    MenuNavigate(i32),
    MenuConfirm,

    // Display ordering
    MoveSelectedUp,
    MoveSelectedDown,
    DragStart(usize),
    DragOver(usize),
    DragDrop,
    DragCancel,

    // Data refresh
    RefreshAll,
    RefreshProject(String),
    /// Full project/task list fetched (from background thread)
    TasksLoaded(Result<Vec<Project>, String>),
    /// Single project refetched after an operation (from background thread)
    ProjectLoaded(Result<Project, String>),

    // Commit
    CommitRequested(TaskRef),
    CommitSubmit,
    CommitFinished { task: TaskRef, outcome: OpResult },

    // Sync
    SyncRequested(TaskRef),
    SyncFinished { task: TaskRef, outcome: OpResult },

    // Merge: commit count decides direct merge vs. method-choice dialog
    MergeRequested(TaskRef),
    CommitCountLoaded { task: TaskRef, result: Result<u32, String> },
    MergeMethodNavigate(i32),
    MergeSubmit,
    MergeFinished { task: TaskRef, outcome: OpResult },

    // Rebase / retarget
    RebaseRequested(TaskRef),
    BranchesLoaded { task: TaskRef, result: Result<Vec<String>, String> },
    RebaseNavigate(i32),
    RebaseSubmit,
    RebaseFinished { task: TaskRef, new_target: String, outcome: OpResult },

    // Archive / recover
    ArchiveRequested(TaskRef),
    ArchiveFinished { task: TaskRef, outcome: OpResult },
    RecoverRequested(TaskRef),
    RecoverFinished { task: TaskRef, outcome: OpResult },

    // Reset / clean (both confirmation-gated)
    ResetRequested(TaskRef),
    ResetFinished { task: TaskRef, outcome: OpResult },
    CleanRequested(TaskRef),
    CleanFinished { task: TaskRef, outcome: OpResult },
    ConfirmAccept,
    ConfirmCancel,
    /// Close whichever verb dialog is open without submitting
    CloseDialog,

    // Post-merge cascade
    CascadeArchive,
    CascadeKeep,
    CascadeArchiveFinished { task: TaskRef, outcome: OpResult },

    // Notifications
    NotificationsLoaded(Vec<NotificationEntry>),
    /// Jump to the task behind a notification (dismisses it on arrival)
    ActivateNotification(TaskRef),
    ToggleArchived,

    // Workspace layout
    SplitPane(SplitDirection),
    ClosePane,
    NextPane,
    CyclePaneKind,

    // Clipboard
    CopyBranch(TaskRef),

    // System
    ShowToast(String),
    ToggleHelp,
    Tick,
    Quit,
}
