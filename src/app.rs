use std::collections::VecDeque;
use std::path::PathBuf;

use anyhow::Result;
use arboard::Clipboard;
use serde::{Deserialize, Serialize};

use crate::layout::{CustomLayoutConfig, LayoutNode};
use crate::menu::{self, MenuAction, MenuOptions};
use crate::message::Message;
use crate::model::{
    AppModel, CascadeState, CommitDialog, ConfirmDialog, ContextMenuState, FocusArea, MergeDialog,
    MergeMethod, RebaseDialog, TaskRef, Verb, ViewMode,
};
use crate::ordering::{MoveDirection, OrderingStore};
use crate::service::Dispatcher;

/// How long a toast stays up, in 100ms ticks
const TOAST_TICKS: u16 = 50;

/// Application state and update logic (TEA pattern)
pub struct App {
    pub model: AppModel,
    pub dispatcher: Dispatcher,
    pub should_quit: bool,
}

impl App {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            model: AppModel::default(),
            dispatcher,
            should_quit: false,
        }
    }

    pub fn with_model(model: AppModel, dispatcher: Dispatcher) -> Self {
        Self {
            model,
            dispatcher,
            should_quit: false,
        }
    }

    /// Process a message and every command message it fans out into
    pub fn dispatch(&mut self, msg: Message) {
        let mut queue = VecDeque::new();
        queue.push_back(msg);
        while let Some(next) = queue.pop_front() {
            for cmd in self.update(next) {
                queue.push_back(cmd);
            }
        }
    }

    fn toast(&mut self, text: impl Into<String>) {
        self.model.ui_state.status_message = Some(text.into());
        self.model.ui_state.status_ticks = TOAST_TICKS;
    }

    /// Point the selection at a task. Dismisses any pending notification as
    /// part of the navigation; selecting the already-selected task is a
    /// no-op, so there is never a duplicate dismiss.
    fn set_selected(&mut self, task: TaskRef) {
        if self.model.ui_state.selected.as_ref() == Some(&task) {
            return;
        }
        if self
            .model
            .notifications
            .remove(&task.project_id, &task.task_id)
            .is_some()
        {
            self.dispatcher
                .dismiss(task.project_id.clone(), task.task_id.clone());
        }
        self.model.ui_state.selected = Some(task);
    }

    /// Host cleanup after a task leaves the collection (archive, clean,
    /// post-merge cascade)
    fn clear_selection_for(&mut self, task: &TaskRef) {
        if self.model.ui_state.selected.as_ref() == Some(task) {
            self.model.ui_state.selected = None;
            self.model.ui_state.mode = ViewMode::List;
        }
    }

    /// Re-anchor the selection after a refresh replaced the mirrors
    fn sync_selection(&mut self) {
        let Some(selected) = self.model.ui_state.selected.clone() else {
            return;
        };
        match self.model.task(&selected) {
            None => {
                self.model.ui_state.selected = None;
                self.model.ui_state.mode = ViewMode::List;
            }
            Some(t) if t.is_archived() && self.model.ui_state.mode == ViewMode::Workspace => {
                // The workspace is not available for archived tasks
                self.model.ui_state.mode = ViewMode::Info;
            }
            _ => {}
        }
    }

    fn move_selected(&mut self, direction: MoveDirection) {
        // Reordering runs over the full ordered collection, so it is
        // unavailable while a search filter narrows the view
        if !self.model.ui_state.search.trim().is_empty() {
            return;
        }
        let Some(selected) = self.model.ui_state.selected.clone() else {
            return;
        };
        if let Some(idx) = self.model.ordering.position(&selected.key()) {
            self.model.ordering.move_task(idx, direction);
        }
    }

    /// Update application state based on message (TEA pattern)
    pub fn update(&mut self, msg: Message) -> Vec<Message> {
        let mut commands = Vec::new();

        match msg {
            // === Selection and view modes ===
            Message::SelectTask(task) => {
                if self.model.task(&task).is_none() {
                    return commands;
                }
                self.set_selected(task);
                if self.model.ui_state.mode == ViewMode::List {
                    self.model.ui_state.mode = ViewMode::Info;
                }
            }

            Message::ActivateTask(task) => {
                let Some(t) = self.model.task(&task) else {
                    return commands;
                };
                if t.is_archived() {
                    self.toast("Archived tasks cannot be opened in a workspace");
                    return commands;
                }
                self.set_selected(task);
                self.model.ui_state.mode = ViewMode::Workspace;
                self.model.ui_state.workspace_pane = 0;
            }

            Message::CloseView => match self.model.ui_state.mode {
                ViewMode::Workspace => self.model.ui_state.mode = ViewMode::Info,
                ViewMode::Info => {
                    self.model.ui_state.mode = ViewMode::List;
                    self.model.ui_state.selected = None;
                }
                ViewMode::List => {}
            },

            Message::SelectNext => {
                let refs = self.model.visible_refs();
                if refs.is_empty() {
                    return commands;
                }
                let next = match self.model.selected_visible_index() {
                    Some(i) => (i + 1) % refs.len(),
                    None => 0,
                };
                self.set_selected(refs[next].clone());
                self.model.ui_state.list_state.select(Some(next));
            }

            Message::SelectPrev => {
                let refs = self.model.visible_refs();
                if refs.is_empty() {
                    return commands;
                }
                let prev = match self.model.selected_visible_index() {
                    Some(i) => (i + refs.len() - 1) % refs.len(),
                    None => refs.len() - 1,
                };
                self.set_selected(refs[prev].clone());
                self.model.ui_state.list_state.select(Some(prev));
            }

            Message::QuickSelect(index) => {
                let refs = self.model.visible_refs();
                if let Some(task) = refs.get(index) {
                    self.set_selected(task.clone());
                    self.model.ui_state.list_state.select(Some(index));
                }
            }

            Message::QuickSelectHint(show) => {
                self.model.ui_state.quick_select_visible = show;
                self.model.ui_state.quick_select_ticks = if show { 30 } else { 0 };
            }

            Message::SetInfoTab(tab) => {
                self.model.ui_state.info_tab = tab;
            }

            // === Search ===
            Message::FocusSearch => {
                self.model.ui_state.focus = FocusArea::Search;
            }

            Message::SearchChanged(text) => {
                self.model.ui_state.search = text;
            }

            Message::ExitSearch => {
                self.model.ui_state.focus = FocusArea::TaskList;
            }

            Message::ToggleHelp => {
                self.model.ui_state.show_help = !self.model.ui_state.show_help;
            }

            Message::ToggleArchived => {
                self.model.ui_state.show_archived = !self.model.ui_state.show_archived;
            }

            // === Context menu ===
            Message::OpenContextMenu { task, column, row } => {
                let items = match self.model.task(&task) {
                    Some(t) => menu::build_menu(t, MenuOptions::default()),
                    None => return commands,
                };
                // The menu always acts on the task it was opened on
                self.set_selected(task.clone());
                self.model.ui_state.context_menu = Some(ContextMenuState {
                    task,
                    anchor: (column, row),
                    items,
                    selected: 0,
                });
            }

            Message::CloseContextMenu => {
                self.model.ui_state.context_menu = None;
            }

            Message::MenuNavigate(delta) => {
                if let Some(menu) = self.model.ui_state.context_menu.as_mut() {
                    let len = menu.items.len();
                    if len > 0 {
                        menu.selected = if delta < 0 {
                            (menu.selected + len - 1) % len
                        } else {
                            (menu.selected + 1) % len
                        };
                    }
                }
            }

            Message::MenuConfirm => {
                let Some(menu) = self.model.ui_state.context_menu.take() else {
                    return commands;
                };
                let Some(item) = menu.items.get(menu.selected) else {
                    return commands;
                };
                if !item.enabled {
                    // Leave the menu up; a disabled row does nothing
                    self.model.ui_state.context_menu = Some(menu);
                    return commands;
                }
                let task = menu.task.clone();
                commands.push(match item.action {
                    MenuAction::Open => Message::SelectTask(task),
                    MenuAction::OpenWorkspace => Message::ActivateTask(task),
                    MenuAction::Commit => Message::CommitRequested(task),
                    MenuAction::Sync => Message::SyncRequested(task),
                    MenuAction::Merge => Message::MergeRequested(task),
                    MenuAction::Rebase => Message::RebaseRequested(task),
                    MenuAction::CopyBranch => Message::CopyBranch(task),
                    MenuAction::Archive => Message::ArchiveRequested(task),
                    MenuAction::Reset => Message::ResetRequested(task),
                    MenuAction::Clean => Message::CleanRequested(task),
                    MenuAction::Recover => Message::RecoverRequested(task),
                });
            }

            // === Display ordering ===
            Message::MoveSelectedUp => self.move_selected(MoveDirection::Up),
            Message::MoveSelectedDown => self.move_selected(MoveDirection::Down),

            Message::DragStart(index) => {
                // Drag indices address the unfiltered order; refuse to start
                // one while the view is narrowed or padded
                if self.model.ui_state.search.trim().is_empty()
                    && !self.model.ui_state.show_archived
                {
                    self.model.ordering.begin_drag(index);
                }
            }

            Message::DragOver(index) => {
                self.model.ordering.drag_over(index);
            }

            Message::DragDrop => {
                self.model.ordering.drop_drag();
            }

            Message::DragCancel => {
                self.model.ordering.cancel_drag();
            }

            // === Data refresh ===
            Message::RefreshAll => {
                self.dispatcher.refresh_all();
            }

            Message::RefreshProject(project_id) => {
                self.dispatcher.refresh_project(project_id);
            }

            Message::TasksLoaded(result) => match result {
                Ok(projects) => {
                    self.model.projects = projects;
                    let keys = self.model.aggregated_keys();
                    self.model.ordering.reconcile(keys);
                    self.sync_selection();
                }
                Err(_) => self.toast("Failed to refresh tasks"),
            },

            Message::ProjectLoaded(result) => match result {
                Ok(project) => {
                    match self.model.projects.iter_mut().find(|p| p.id == project.id) {
                        Some(existing) => *existing = project,
                        None => self.model.projects.push(project),
                    }
                    let keys = self.model.aggregated_keys();
                    self.model.ordering.reconcile(keys);
                    self.sync_selection();
                }
                Err(_) => self.toast("Failed to refresh project"),
            },

            // === Commit ===
            Message::CommitRequested(task) => {
                let allowed = self
                    .model
                    .task(&task)
                    .is_some_and(|t| t.can_commit());
                if !allowed || self.model.ops.is_loading(&task, Verb::Commit) {
                    return commands;
                }
                self.model.ui_state.clear_input();
                self.model.ui_state.commit_dialog = Some(CommitDialog { task, error: None });
            }

            Message::CommitSubmit => {
                let Some(dialog) = self.model.ui_state.commit_dialog.clone() else {
                    return commands;
                };
                if self.model.ops.is_loading(&dialog.task, Verb::Commit) {
                    return commands;
                }
                let message = self.model.ui_state.get_input_text().trim().to_string();
                if message.is_empty() {
                    if let Some(d) = self.model.ui_state.commit_dialog.as_mut() {
                        d.error = Some("Commit message is required".to_string());
                    }
                    return commands;
                }
                self.model.ops.begin(&dialog.task, Verb::Commit);
                self.dispatcher.commit(dialog.task, message);
            }

            Message::CommitFinished { task, outcome } => {
                self.model.ops.finish(&task, Verb::Commit);
                let dialog_matches = self
                    .model
                    .ui_state
                    .commit_dialog
                    .as_ref()
                    .is_some_and(|d| d.task == task);
                match outcome {
                    Ok(r) if r.success => {
                        if dialog_matches {
                            self.model.ui_state.commit_dialog = None;
                            self.model.ui_state.clear_input();
                        }
                        self.toast(r.message.unwrap_or_else(|| "Changes committed".to_string()));
                        commands.push(Message::RefreshProject(task.project_id));
                    }
                    Ok(r) => {
                        if dialog_matches {
                            if let Some(d) = self.model.ui_state.commit_dialog.as_mut() {
                                d.error =
                                    Some(r.message.unwrap_or_else(|| "Commit failed".to_string()));
                            }
                        }
                    }
                    Err(_) => {
                        if dialog_matches {
                            if let Some(d) = self.model.ui_state.commit_dialog.as_mut() {
                                d.error = Some("Failed to commit changes".to_string());
                            }
                        }
                    }
                }
            }

            // === Sync ===
            Message::SyncRequested(task) => {
                let allowed = self.model.task(&task).is_some_and(|t| t.can_sync());
                if !allowed || self.model.ops.is_loading(&task, Verb::Sync) {
                    return commands;
                }
                self.model.ops.begin(&task, Verb::Sync);
                self.dispatcher.sync(task);
            }

            Message::SyncFinished { task, outcome } => {
                self.model.ops.finish(&task, Verb::Sync);
                match outcome {
                    Ok(r) if r.success => {
                        self.toast(
                            r.message
                                .unwrap_or_else(|| "Task synced with its target".to_string()),
                        );
                        commands.push(Message::RefreshProject(task.project_id));
                    }
                    Ok(r) => self.toast(r.message.unwrap_or_else(|| "Sync failed".to_string())),
                    Err(_) => self.toast("Failed to sync task"),
                }
            }

            // === Merge ===
            Message::MergeRequested(task) => {
                let allowed = self.model.task(&task).is_some_and(|t| t.can_merge());
                if !allowed || self.model.ops.is_loading(&task, Verb::Merge) {
                    return commands;
                }
                // The commit count decides whether a method choice is needed;
                // the verb stays in flight across the fetch
                self.model.ops.begin(&task, Verb::Merge);
                self.dispatcher.commit_count(task);
            }

            Message::CommitCountLoaded { task, result } => match result {
                Ok(total) if total <= 1 => {
                    // Single commit: nothing to squash, merge directly
                    self.dispatcher.merge(task, MergeMethod::MergeCommit);
                }
                _ => {
                    // More than one commit, or the count fetch failed: let the
                    // user pick the method
                    self.model.ops.finish(&task, Verb::Merge);
                    self.model.ui_state.merge_dialog = Some(MergeDialog {
                        task,
                        selected: 0,
                        error: None,
                    });
                }
            },

            Message::MergeMethodNavigate(delta) => {
                if let Some(d) = self.model.ui_state.merge_dialog.as_mut() {
                    let len = MergeDialog::METHODS.len();
                    d.selected = if delta < 0 {
                        (d.selected + len - 1) % len
                    } else {
                        (d.selected + 1) % len
                    };
                }
            }

            Message::MergeSubmit => {
                let Some(dialog) = self.model.ui_state.merge_dialog.clone() else {
                    return commands;
                };
                if self.model.ops.is_loading(&dialog.task, Verb::Merge) {
                    return commands;
                }
                self.model.ops.begin(&dialog.task, Verb::Merge);
                let method = dialog.method();
                self.dispatcher.merge(dialog.task, method);
            }

            Message::MergeFinished { task, outcome } => {
                self.model.ops.finish(&task, Verb::Merge);
                let dialog_matches = self
                    .model
                    .ui_state
                    .merge_dialog
                    .as_ref()
                    .is_some_and(|d| d.task == task);
                match outcome {
                    Ok(r) if r.success => {
                        if dialog_matches {
                            self.model.ui_state.merge_dialog = None;
                        }
                        let task_name = self
                            .model
                            .task(&task)
                            .map(|t| t.name.clone())
                            .unwrap_or_default();
                        self.toast(r.message.unwrap_or_else(|| "Merged".to_string()));
                        self.model.cascade = CascadeState::AwaitingArchiveDecision {
                            task: task.clone(),
                            task_name,
                        };
                        commands.push(Message::RefreshProject(task.project_id));
                    }
                    Ok(r) => {
                        let text = r.message.unwrap_or_else(|| "Merge failed".to_string());
                        if dialog_matches {
                            if let Some(d) = self.model.ui_state.merge_dialog.as_mut() {
                                d.error = Some(text);
                            }
                        } else {
                            self.toast(text);
                        }
                    }
                    Err(_) => {
                        if dialog_matches {
                            if let Some(d) = self.model.ui_state.merge_dialog.as_mut() {
                                d.error = Some("Failed to merge task".to_string());
                            }
                        } else {
                            self.toast("Failed to merge task");
                        }
                    }
                }
            }

            // === Rebase / retarget ===
            Message::RebaseRequested(task) => {
                let allowed = self.model.task(&task).is_some_and(|t| t.can_rebase());
                if !allowed || self.model.ops.is_loading(&task, Verb::Rebase) {
                    return commands;
                }
                self.model.ops.begin(&task, Verb::Rebase);
                self.dispatcher.branches(task);
            }

            Message::BranchesLoaded { task, result } => {
                self.model.ops.finish(&task, Verb::Rebase);
                match result {
                    Ok(mut branches) => {
                        let Some((own_branch, current_target)) = self
                            .model
                            .task(&task)
                            .map(|t| (t.branch.clone(), t.target_branch.clone()))
                        else {
                            return commands;
                        };
                        branches.retain(|b| b != &own_branch);
                        if branches.is_empty() {
                            self.toast("No candidate target branches");
                            return commands;
                        }
                        let selected = branches
                            .iter()
                            .position(|b| b == &current_target)
                            .unwrap_or(0);
                        self.model.ui_state.rebase_dialog = Some(RebaseDialog {
                            task,
                            branches,
                            selected,
                        });
                    }
                    Err(_) => self.toast("Failed to load branches"),
                }
            }

            Message::RebaseNavigate(delta) => {
                if let Some(d) = self.model.ui_state.rebase_dialog.as_mut() {
                    let len = d.branches.len();
                    if len > 0 {
                        d.selected = if delta < 0 {
                            (d.selected + len - 1) % len
                        } else {
                            (d.selected + 1) % len
                        };
                    }
                }
            }

            Message::RebaseSubmit => {
                let Some(dialog) = self.model.ui_state.rebase_dialog.clone() else {
                    return commands;
                };
                if self.model.ops.is_loading(&dialog.task, Verb::Rebase) {
                    return commands;
                }
                let Some(branch) = dialog.branch().map(|b| b.to_string()) else {
                    return commands;
                };
                // Fire-and-forget: the picker closes on submit and failures
                // come back as toasts
                self.model.ui_state.rebase_dialog = None;
                self.model.ops.begin(&dialog.task, Verb::Rebase);
                self.dispatcher.rebase(dialog.task, branch);
            }

            Message::RebaseFinished {
                task,
                new_target,
                outcome,
            } => {
                self.model.ops.finish(&task, Verb::Rebase);
                match outcome {
                    Ok(r) if r.success => {
                        // Optimistic local patch; the next successful refresh
                        // wins either way
                        if let Some(t) = self.model.task_mut(&task) {
                            t.target_branch = new_target;
                        }
                        self.toast(
                            r.message
                                .unwrap_or_else(|| "Target branch updated".to_string()),
                        );
                        commands.push(Message::RefreshProject(task.project_id));
                    }
                    Ok(r) => self.toast(
                        r.message
                            .unwrap_or_else(|| "Failed to change target branch".to_string()),
                    ),
                    Err(_) => self.toast("Failed to change target branch"),
                }
            }

            // === Archive / recover ===
            Message::ArchiveRequested(task) => {
                let allowed = self.model.task(&task).is_some_and(|t| t.can_archive());
                if !allowed || self.model.ops.is_loading(&task, Verb::Archive) {
                    return commands;
                }
                self.model.ops.begin(&task, Verb::Archive);
                self.dispatcher.archive(task);
            }

            Message::ArchiveFinished { task, outcome } => {
                self.model.ops.finish(&task, Verb::Archive);
                match outcome {
                    Ok(r) if r.success => {
                        self.toast(r.message.unwrap_or_else(|| "Task archived".to_string()));
                        self.clear_selection_for(&task);
                        commands.push(Message::RefreshProject(task.project_id));
                    }
                    Ok(r) => self.toast(r.message.unwrap_or_else(|| "Archive failed".to_string())),
                    Err(_) => self.toast("Failed to archive task"),
                }
            }

            Message::RecoverRequested(task) => {
                let allowed = self.model.task(&task).is_some_and(|t| t.can_recover());
                if !allowed || self.model.ops.is_loading(&task, Verb::Recover) {
                    return commands;
                }
                self.model.ops.begin(&task, Verb::Recover);
                self.dispatcher.recover(task);
            }

            Message::RecoverFinished { task, outcome } => {
                self.model.ops.finish(&task, Verb::Recover);
                match outcome {
                    Ok(r) if r.success => {
                        self.toast(r.message.unwrap_or_else(|| "Task recovered".to_string()));
                        commands.push(Message::RefreshProject(task.project_id));
                    }
                    Ok(r) => self.toast(r.message.unwrap_or_else(|| "Recover failed".to_string())),
                    Err(_) => self.toast("Failed to recover task"),
                }
            }

            // === Reset / clean ===
            Message::ResetRequested(task) => {
                let Some(t) = self.model.task(&task) else {
                    return commands;
                };
                if !t.can_reset() || self.model.ops.is_loading(&task, Verb::Reset) {
                    return commands;
                }
                let message = format!("Reset '{}' to its target branch state? (y/n)", t.name);
                self.model.ui_state.confirm = Some(ConfirmDialog {
                    task,
                    verb: Verb::Reset,
                    message,
                });
            }

            Message::CleanRequested(task) => {
                let Some(t) = self.model.task(&task) else {
                    return commands;
                };
                if !t.can_clean() || self.model.ops.is_loading(&task, Verb::Clean) {
                    return commands;
                }
                let message = format!("Delete '{}' and its worktree? (y/n)", t.name);
                self.model.ui_state.confirm = Some(ConfirmDialog {
                    task,
                    verb: Verb::Clean,
                    message,
                });
            }

            Message::ConfirmAccept => {
                let Some(confirm) = self.model.ui_state.confirm.take() else {
                    return commands;
                };
                match confirm.verb {
                    Verb::Reset => {
                        self.model.ops.begin(&confirm.task, Verb::Reset);
                        self.dispatcher.reset(confirm.task);
                    }
                    Verb::Clean => {
                        self.model.ops.begin(&confirm.task, Verb::Clean);
                        self.dispatcher.delete(confirm.task);
                    }
                    _ => {}
                }
            }

            Message::ConfirmCancel => {
                self.model.ui_state.confirm = None;
            }

            Message::ResetFinished { task, outcome } => {
                self.model.ops.finish(&task, Verb::Reset);
                match outcome {
                    Ok(r) if r.success => {
                        self.toast(r.message.unwrap_or_else(|| "Task reset".to_string()));
                        // Selection stays on the task
                        commands.push(Message::RefreshProject(task.project_id));
                    }
                    Ok(r) => self.toast(r.message.unwrap_or_else(|| "Reset failed".to_string())),
                    Err(_) => self.toast("Failed to reset task"),
                }
            }

            Message::CleanFinished { task, outcome } => {
                self.model.ops.finish(&task, Verb::Clean);
                match outcome {
                    Ok(r) if r.success => {
                        self.toast(r.message.unwrap_or_else(|| "Task deleted".to_string()));
                        self.clear_selection_for(&task);
                        commands.push(Message::RefreshProject(task.project_id));
                    }
                    Ok(r) => self.toast(r.message.unwrap_or_else(|| "Delete failed".to_string())),
                    Err(_) => self.toast("Failed to delete task"),
                }
            }

            Message::CloseDialog => {
                self.model.ui_state.commit_dialog = None;
                self.model.ui_state.merge_dialog = None;
                self.model.ui_state.rebase_dialog = None;
            }

            // === Post-merge cascade ===
            Message::CascadeArchive => {
                if let CascadeState::AwaitingArchiveDecision { task, .. } =
                    std::mem::take(&mut self.model.cascade)
                {
                    // Cleanup runs regardless of how the archive turns out;
                    // a failure only surfaces as a toast later
                    self.dispatcher.cascade_archive(task);
                    self.model.ui_state.selected = None;
                    self.model.ui_state.mode = ViewMode::List;
                }
            }

            Message::CascadeKeep => {
                if let CascadeState::AwaitingArchiveDecision { .. } =
                    std::mem::take(&mut self.model.cascade)
                {
                    self.model.ui_state.selected = None;
                    self.model.ui_state.mode = ViewMode::List;
                }
            }

            Message::CascadeArchiveFinished { task, outcome } => {
                match outcome {
                    Ok(r) if r.success => {
                        self.toast(r.message.unwrap_or_else(|| "Task archived".to_string()))
                    }
                    Ok(r) => self.toast(r.message.unwrap_or_else(|| "Archive failed".to_string())),
                    Err(_) => self.toast("Failed to archive task"),
                }
                commands.push(Message::RefreshProject(task.project_id));
            }

            // === Notifications ===
            Message::NotificationsLoaded(entries) => {
                let fresh_critical = self.model.notifications.replace_all(entries);
                if !fresh_critical.is_empty() {
                    crate::notify::play_attention_chime();
                }
            }

            Message::ActivateNotification(task) => {
                if self.model.task(&task).is_none() {
                    return commands;
                }
                self.set_selected(task);
                self.model.ui_state.mode = ViewMode::Info;
            }

            // === Workspace layout ===
            Message::SplitPane(direction) => {
                if self.model.ui_state.mode != ViewMode::Workspace {
                    return commands;
                }
                let pane = self.model.ui_state.workspace_pane;
                let result = self.model.active_layout_mut().split_pane(pane, direction);
                if let Err(e) = result {
                    self.toast(e.to_string());
                }
            }

            Message::ClosePane => {
                if self.model.ui_state.mode != ViewMode::Workspace {
                    return commands;
                }
                let pane = self.model.ui_state.workspace_pane;
                let result = self.model.active_layout_mut().delete_pane(pane);
                match result {
                    Ok(()) => {
                        let count = self.model.active_layout().pane_count();
                        self.model.ui_state.workspace_pane =
                            self.model.ui_state.workspace_pane.min(count - 1);
                    }
                    Err(e) => self.toast(e.to_string()),
                }
            }

            Message::NextPane => {
                if self.model.ui_state.mode != ViewMode::Workspace {
                    return commands;
                }
                let count = self.model.active_layout().pane_count();
                self.model.ui_state.workspace_pane =
                    (self.model.ui_state.workspace_pane + 1) % count;
            }

            Message::CyclePaneKind => {
                if self.model.ui_state.mode != ViewMode::Workspace {
                    return commands;
                }
                let pane = self.model.ui_state.workspace_pane;
                if let Some(LayoutNode::Pane { kind, .. }) =
                    self.model.active_layout_mut().pane_at_mut(pane)
                {
                    *kind = kind.next();
                }
            }

            // === Clipboard ===
            Message::CopyBranch(task) => {
                let Some(branch) = self.model.task(&task).map(|t| t.branch.clone()) else {
                    return commands;
                };
                match Clipboard::new().and_then(|mut c| c.set_text(branch)) {
                    Ok(()) => self.toast("Branch name copied"),
                    Err(_) => self.toast("Clipboard unavailable"),
                }
            }

            // === System ===
            Message::ShowToast(text) => self.toast(text),

            Message::Tick => {
                if self.model.ui_state.status_ticks > 0 {
                    self.model.ui_state.status_ticks -= 1;
                    if self.model.ui_state.status_ticks == 0 {
                        self.model.ui_state.status_message = None;
                    }
                }
                if self.model.ui_state.quick_select_ticks > 0 {
                    self.model.ui_state.quick_select_ticks -= 1;
                    if self.model.ui_state.quick_select_ticks == 0 {
                        self.model.ui_state.quick_select_visible = false;
                    }
                }
            }

            Message::Quit => {
                self.should_quit = true;
            }
        }

        commands
    }
}

/// Controller-owned state that survives restarts: the display order and the
/// workspace layouts. The task mirrors are the service's to own.
#[derive(Serialize, Deserialize, Default)]
pub struct PersistedState {
    #[serde(default)]
    pub ordering: Vec<String>,
    #[serde(default)]
    pub layouts: Vec<CustomLayoutConfig>,
    #[serde(default)]
    pub active_layout: usize,
}

fn state_file() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("canopy")
        .join("state.json")
}

/// Load persisted controller state from disk
pub fn load_state() -> Result<AppModel> {
    load_state_from(&state_file())
}

pub fn load_state_from(path: &PathBuf) -> Result<AppModel> {
    let mut model = AppModel::default();
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let state: PersistedState = serde_json::from_str(&content)?;
        model.ordering = OrderingStore::from_saved(state.ordering);
        if !state.layouts.is_empty() {
            model.active_layout = state.active_layout.min(state.layouts.len() - 1);
            model.layouts = state.layouts;
        }
    }
    Ok(model)
}

/// Save persisted controller state to disk
pub fn save_state(model: &AppModel) -> Result<()> {
    save_state_to(model, &state_file())
}

pub fn save_state_to(model: &AppModel, path: &PathBuf) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let state = PersistedState {
        ordering: model.ordering.keys().to_vec(),
        layouts: model.layouts.clone(),
        active_layout: model.active_layout,
    };
    let content = serde_json::to_string_pretty(&state)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::model::{NotificationEntry, Project, Task};
    use crate::service::{
        BranchInfo, BranchList, CommitCount, NotificationService, OpResponse, ServiceError,
        ServiceResult, TaskFilter, TaskService,
    };
    use chrono::Utc;
    use std::sync::mpsc::{channel, Receiver};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Canned-response service; records every call it sees
    pub(crate) struct StubService {
        pub commit_total: Mutex<Option<u32>>,
        pub response: Mutex<OpResponse>,
        pub fail_transport: Mutex<bool>,
        pub branches: Mutex<Vec<String>>,
        pub calls: Mutex<Vec<String>>,
        pub dismissed: Mutex<Vec<String>>,
    }

    impl StubService {
        pub fn ok() -> Arc<Self> {
            Arc::new(Self {
                commit_total: Mutex::new(Some(1)),
                response: Mutex::new(OpResponse {
                    success: true,
                    message: None,
                }),
                fail_transport: Mutex::new(false),
                branches: Mutex::new(vec!["main".to_string(), "develop".to_string()]),
                calls: Mutex::new(Vec::new()),
                dismissed: Mutex::new(Vec::new()),
            })
        }

        pub fn set_response(&self, success: bool, message: &str) {
            *self.response.lock().unwrap() = OpResponse {
                success,
                message: Some(message.to_string()),
            };
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn op(&self) -> ServiceResult<OpResponse> {
            if *self.fail_transport.lock().unwrap() {
                return Err(ServiceError::Transport("stub offline".to_string()));
            }
            Ok(self.response.lock().unwrap().clone())
        }
    }

    impl TaskService for StubService {
        fn list_projects(&self) -> ServiceResult<Vec<Project>> {
            self.record("list_projects".to_string());
            Ok(Vec::new())
        }

        fn get_project(&self, project_id: &str) -> ServiceResult<Project> {
            self.record(format!("get_project {}", project_id));
            Err(ServiceError::Remote("no such project".to_string()))
        }

        fn list_tasks(&self, project_id: &str, filter: TaskFilter) -> ServiceResult<Vec<Task>> {
            self.record(format!("list_tasks {} {}", project_id, filter.as_str()));
            Ok(Vec::new())
        }

        fn commit_task(
            &self,
            project_id: &str,
            task_id: &str,
            message: &str,
        ) -> ServiceResult<OpResponse> {
            self.record(format!("commit {}:{} {}", project_id, task_id, message));
            self.op()
        }

        fn sync_task(&self, project_id: &str, task_id: &str) -> ServiceResult<OpResponse> {
            self.record(format!("sync {}:{}", project_id, task_id));
            self.op()
        }

        fn get_commits(&self, project_id: &str, task_id: &str) -> ServiceResult<CommitCount> {
            self.record(format!("get_commits {}:{}", project_id, task_id));
            match *self.commit_total.lock().unwrap() {
                Some(total) => Ok(CommitCount { total }),
                None => Err(ServiceError::Transport("stub offline".to_string())),
            }
        }

        fn merge_task(
            &self,
            project_id: &str,
            task_id: &str,
            method: crate::model::MergeMethod,
        ) -> ServiceResult<OpResponse> {
            self.record(format!(
                "merge {}:{} {}",
                project_id,
                task_id,
                method.as_str()
            ));
            self.op()
        }

        fn rebase_to_task(
            &self,
            project_id: &str,
            task_id: &str,
            new_target: &str,
        ) -> ServiceResult<OpResponse> {
            self.record(format!("rebase {}:{} {}", project_id, task_id, new_target));
            self.op()
        }

        fn get_branches(&self, project_id: &str) -> ServiceResult<BranchList> {
            self.record(format!("get_branches {}", project_id));
            let branches = self
                .branches
                .lock()
                .unwrap()
                .iter()
                .map(|name| BranchInfo {
                    name: name.clone(),
                    is_current: name == "main",
                })
                .collect();
            Ok(BranchList {
                branches,
                current: "main".to_string(),
            })
        }

        fn archive_task(&self, project_id: &str, task_id: &str) -> ServiceResult<OpResponse> {
            self.record(format!("archive {}:{}", project_id, task_id));
            self.op()
        }

        fn recover_task(&self, project_id: &str, task_id: &str) -> ServiceResult<OpResponse> {
            self.record(format!("recover {}:{}", project_id, task_id));
            self.op()
        }

        fn delete_task(&self, project_id: &str, task_id: &str) -> ServiceResult<OpResponse> {
            self.record(format!("delete {}:{}", project_id, task_id));
            self.op()
        }

        fn reset_task(&self, project_id: &str, task_id: &str) -> ServiceResult<OpResponse> {
            self.record(format!("reset {}:{}", project_id, task_id));
            self.op()
        }
    }

    impl NotificationService for StubService {
        fn list_all_hooks(&self) -> ServiceResult<Vec<NotificationEntry>> {
            Ok(Vec::new())
        }

        fn dismiss_hook(&self, project_id: &str, task_id: &str) -> ServiceResult<()> {
            self.dismissed
                .lock()
                .unwrap()
                .push(format!("{}:{}", project_id, task_id));
            Ok(())
        }
    }

    pub(crate) fn test_app(stub: Arc<StubService>) -> (App, Receiver<Message>) {
        let (tx, rx) = channel();
        let dispatcher = Dispatcher::new(stub.clone(), stub, tx);
        (App::new(dispatcher), rx)
    }

    /// Build one project "p1" on main with the given tasks and seed ordering
    pub(crate) fn seed(app: &mut App, tasks: Vec<Task>) {
        app.model.projects = vec![Project {
            id: "p1".to_string(),
            name: "demo".to_string(),
            path: std::path::PathBuf::from("/tmp/demo"),
            current_branch: "main".to_string(),
            tasks,
            added_at: Utc::now(),
        }];
        let keys = app.model.aggregated_keys();
        app.model.ordering.reconcile(keys);
    }

    /// Deliver the next background completion into the update loop
    pub(crate) fn pump(app: &mut App, rx: &Receiver<Message>) {
        let msg = rx
            .recv_timeout(Duration::from_secs(2))
            .expect("expected a background completion message");
        app.dispatch(msg);
    }

    /// Spin until the predicate holds (for assertions on fire-and-forget work)
    pub(crate) fn wait_until(mut predicate: impl FnMut() -> bool) {
        for _ in 0..100 {
            if predicate() {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("condition not reached in time");
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{pump, seed, test_app, wait_until, StubService};
    use super::*;
    use crate::model::tests::task as make_task;
    use crate::model::{NotificationEntry, NotificationLevel, TaskStatus, ViewMode};
    use chrono::Utc;

    fn t1() -> TaskRef {
        TaskRef::new("p1", "t1")
    }

    #[test]
    fn test_select_promotes_list_to_info_and_retargets_elsewhere() {
        let stub = StubService::ok();
        let (mut app, _rx) = test_app(stub);
        seed(
            &mut app,
            vec![
                make_task("t1", TaskStatus::Live),
                make_task("t2", TaskStatus::Idle),
            ],
        );

        app.dispatch(Message::SelectTask(t1()));
        assert_eq!(app.model.ui_state.mode, ViewMode::Info);

        // Selecting another task keeps the mode, only the reference moves
        app.dispatch(Message::SelectTask(TaskRef::new("p1", "t2")));
        assert_eq!(app.model.ui_state.mode, ViewMode::Info);
        assert_eq!(app.model.ui_state.selected, Some(TaskRef::new("p1", "t2")));
    }

    #[test]
    fn test_selecting_same_task_twice_dismisses_once() {
        let stub = StubService::ok();
        let (mut app, _rx) = test_app(stub.clone());
        seed(&mut app, vec![make_task("t1", TaskStatus::Live)]);

        app.dispatch(Message::NotificationsLoaded(vec![NotificationEntry {
            project_id: "p1".to_string(),
            task_id: "t1".to_string(),
            level: NotificationLevel::Warn,
            message: "agent waiting".to_string(),
            timestamp: Utc::now(),
        }]));

        app.dispatch(Message::SelectTask(t1()));
        app.dispatch(Message::SelectTask(t1()));

        assert!(app.model.notifications.lookup("p1", "t1").is_none());
        wait_until(|| stub.dismissed.lock().unwrap().len() == 1);
        // Still exactly one after the second select
        std::thread::sleep(std::time::Duration::from_millis(30));
        assert_eq!(stub.dismissed.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_double_select_refused_for_archived() {
        let stub = StubService::ok();
        let (mut app, _rx) = test_app(stub);
        seed(&mut app, vec![make_task("t1", TaskStatus::Archived)]);
        app.model.ui_state.show_archived = true;

        app.dispatch(Message::ActivateTask(t1()));
        assert_eq!(app.model.ui_state.mode, ViewMode::List);
    }

    #[test]
    fn test_close_steps_back_through_modes() {
        let stub = StubService::ok();
        let (mut app, _rx) = test_app(stub);
        seed(&mut app, vec![make_task("t1", TaskStatus::Live)]);

        app.dispatch(Message::ActivateTask(t1()));
        assert_eq!(app.model.ui_state.mode, ViewMode::Workspace);

        app.dispatch(Message::CloseView);
        assert_eq!(app.model.ui_state.mode, ViewMode::Info);
        assert!(app.model.ui_state.selected.is_some());

        app.dispatch(Message::CloseView);
        assert_eq!(app.model.ui_state.mode, ViewMode::List);
        assert!(app.model.ui_state.selected.is_none());
    }

    #[test]
    fn test_merge_with_two_commits_opens_method_dialog() {
        let stub = StubService::ok();
        *stub.commit_total.lock().unwrap() = Some(2);
        stub.set_response(true, "Merged");
        let (mut app, rx) = test_app(stub.clone());
        seed(&mut app, vec![make_task("t1", TaskStatus::Live)]);

        app.dispatch(Message::MergeRequested(t1()));
        assert!(app.model.ops.is_loading(&t1(), Verb::Merge));

        pump(&mut app, &rx); // CommitCountLoaded
        let dialog = app.model.ui_state.merge_dialog.as_ref().expect("dialog");
        assert_eq!(dialog.task, t1());
        assert!(dialog.error.is_none());
        assert!(!app.model.ops.is_loading(&t1(), Verb::Merge));
        // No mutating call yet
        assert!(!stub.calls().iter().any(|c| c.starts_with("merge ")));

        // Default is squash, first in the list
        app.dispatch(Message::MergeSubmit);
        assert!(app.model.ops.is_loading(&t1(), Verb::Merge));

        pump(&mut app, &rx); // MergeFinished
        assert!(app.model.ui_state.merge_dialog.is_none());
        assert_eq!(app.model.ui_state.status_message.as_deref(), Some("Merged"));
        assert!(stub.calls().contains(&"merge p1:t1 squash".to_string()));
        match &app.model.cascade {
            CascadeState::AwaitingArchiveDecision { task, .. } => assert_eq!(task, &t1()),
            other => panic!("expected cascade, got {:?}", other),
        }
    }

    #[test]
    fn test_merge_with_single_commit_never_opens_dialog() {
        let stub = StubService::ok();
        *stub.commit_total.lock().unwrap() = Some(1);
        let (mut app, rx) = test_app(stub.clone());
        seed(&mut app, vec![make_task("t1", TaskStatus::Live)]);

        app.dispatch(Message::MergeRequested(t1()));
        pump(&mut app, &rx); // CommitCountLoaded -> direct merge
        assert!(app.model.ui_state.merge_dialog.is_none());

        pump(&mut app, &rx); // MergeFinished
        assert!(stub.calls().contains(&"merge p1:t1 merge-commit".to_string()));
        assert!(app.model.cascade.is_awaiting());
    }

    #[test]
    fn test_merge_count_fetch_failure_still_opens_dialog() {
        let stub = StubService::ok();
        *stub.commit_total.lock().unwrap() = None;
        let (mut app, rx) = test_app(stub);
        seed(&mut app, vec![make_task("t1", TaskStatus::Live)]);

        app.dispatch(Message::MergeRequested(t1()));
        pump(&mut app, &rx);
        assert!(app.model.ui_state.merge_dialog.is_some());
    }

    #[test]
    fn test_cascade_keep_clears_selection_without_archiving() {
        let stub = StubService::ok();
        let (mut app, _rx) = test_app(stub.clone());
        seed(&mut app, vec![make_task("t1", TaskStatus::Merged)]);
        app.dispatch(Message::SelectTask(t1()));
        app.model.cascade = CascadeState::AwaitingArchiveDecision {
            task: t1(),
            task_name: "task t1".to_string(),
        };

        app.dispatch(Message::CascadeKeep);
        assert!(matches!(app.model.cascade, CascadeState::Idle));
        assert!(app.model.ui_state.selected.is_none());
        assert_eq!(app.model.ui_state.mode, ViewMode::List);
        assert!(!stub.calls().iter().any(|c| c.starts_with("archive")));
    }

    #[test]
    fn test_cascade_archive_runs_cleanup_even_on_failure() {
        let stub = StubService::ok();
        stub.set_response(false, "worktree busy");
        let (mut app, rx) = test_app(stub.clone());
        seed(&mut app, vec![make_task("t1", TaskStatus::Merged)]);
        app.dispatch(Message::SelectTask(t1()));
        app.model.cascade = CascadeState::AwaitingArchiveDecision {
            task: t1(),
            task_name: "task t1".to_string(),
        };

        app.dispatch(Message::CascadeArchive);
        // Cleanup already ran, before the outcome is known
        assert!(app.model.ui_state.selected.is_none());
        assert_eq!(app.model.ui_state.mode, ViewMode::List);

        pump(&mut app, &rx); // CascadeArchiveFinished
        assert!(stub.calls().contains(&"archive p1:t1".to_string()));
        assert_eq!(
            app.model.ui_state.status_message.as_deref(),
            Some("worktree busy")
        );
    }

    #[test]
    fn test_commit_logical_failure_keeps_dialog_open_inline() {
        let stub = StubService::ok();
        stub.set_response(false, "nothing to commit");
        let (mut app, rx) = test_app(stub);
        seed(&mut app, vec![make_task("t1", TaskStatus::Live)]);

        app.dispatch(Message::CommitRequested(t1()));
        assert!(app.model.ui_state.commit_dialog.is_some());
        app.model.ui_state.set_input_text("fix: adjust parser");
        app.dispatch(Message::CommitSubmit);

        pump(&mut app, &rx); // CommitFinished
        let dialog = app.model.ui_state.commit_dialog.as_ref().expect("dialog");
        assert_eq!(dialog.error.as_deref(), Some("nothing to commit"));
    }

    #[test]
    fn test_commit_transport_failure_shows_generic_inline_message() {
        let stub = StubService::ok();
        *stub.fail_transport.lock().unwrap() = true;
        let (mut app, rx) = test_app(stub);
        seed(&mut app, vec![make_task("t1", TaskStatus::Live)]);

        app.dispatch(Message::CommitRequested(t1()));
        app.model.ui_state.set_input_text("fix");
        app.dispatch(Message::CommitSubmit);

        pump(&mut app, &rx);
        let dialog = app.model.ui_state.commit_dialog.as_ref().expect("dialog");
        assert_eq!(dialog.error.as_deref(), Some("Failed to commit changes"));
    }

    #[test]
    fn test_stale_commit_result_does_not_touch_other_dialog() {
        let stub = StubService::ok();
        stub.set_response(false, "conflict in lib.rs");
        let (mut app, rx) = test_app(stub);
        seed(
            &mut app,
            vec![
                make_task("t1", TaskStatus::Live),
                make_task("t2", TaskStatus::Live),
            ],
        );

        // Submit for t1, then move the dialog to t2 while the call is in flight
        app.dispatch(Message::CommitRequested(t1()));
        app.model.ui_state.set_input_text("wip");
        app.dispatch(Message::CommitSubmit);
        app.dispatch(Message::CommitRequested(TaskRef::new("p1", "t2")));

        pump(&mut app, &rx); // CommitFinished for t1 (logical failure)
        let dialog = app.model.ui_state.commit_dialog.as_ref().expect("dialog");
        assert_eq!(dialog.task, TaskRef::new("p1", "t2"));
        assert!(dialog.error.is_none(), "t1's failure bled into t2's dialog");
        assert!(!app.model.ops.is_loading(&t1(), Verb::Commit));
    }

    #[test]
    fn test_verbs_are_guarded_by_status() {
        let stub = StubService::ok();
        let (mut app, _rx) = test_app(stub.clone());
        seed(
            &mut app,
            vec![
                make_task("t1", TaskStatus::Archived),
                make_task("t2", TaskStatus::Broken),
            ],
        );
        app.model.ui_state.show_archived = true;

        app.dispatch(Message::CommitRequested(t1()));
        assert!(app.model.ui_state.commit_dialog.is_none());

        let broken = TaskRef::new("p1", "t2");
        app.dispatch(Message::SyncRequested(broken.clone()));
        app.dispatch(Message::MergeRequested(broken.clone()));
        app.dispatch(Message::RebaseRequested(broken.clone()));
        assert!(stub.calls().is_empty());

        // Broken still commits, resets, archives
        app.dispatch(Message::CommitRequested(broken.clone()));
        assert!(app.model.ui_state.commit_dialog.is_some());
        app.dispatch(Message::ArchiveRequested(broken));
        wait_until(|| stub.calls().contains(&"archive p1:t2".to_string()));
    }

    #[test]
    fn test_duplicate_trigger_while_in_flight_is_ignored() {
        let stub = StubService::ok();
        let (mut app, rx) = test_app(stub.clone());
        seed(&mut app, vec![make_task("t1", TaskStatus::Live)]);

        app.dispatch(Message::SyncRequested(t1()));
        app.dispatch(Message::SyncRequested(t1()));
        pump(&mut app, &rx); // first SyncFinished

        let sync_calls = stub
            .calls()
            .iter()
            .filter(|c| c.starts_with("sync "))
            .count();
        assert_eq!(sync_calls, 1);
    }

    #[test]
    fn test_rebase_flow_patches_target_optimistically() {
        let stub = StubService::ok();
        stub.set_response(true, "Retargeted");
        let (mut app, rx) = test_app(stub.clone());
        seed(&mut app, vec![make_task("t1", TaskStatus::Live)]);

        app.dispatch(Message::RebaseRequested(t1()));
        pump(&mut app, &rx); // BranchesLoaded
        let dialog = app.model.ui_state.rebase_dialog.as_ref().expect("picker");
        // Pre-selected on the current target
        assert_eq!(dialog.branch(), Some("main"));

        app.dispatch(Message::RebaseNavigate(1));
        app.dispatch(Message::RebaseSubmit);
        assert!(app.model.ui_state.rebase_dialog.is_none());

        pump(&mut app, &rx); // RebaseFinished
        assert!(stub.calls().contains(&"rebase p1:t1 develop".to_string()));
        assert_eq!(
            app.model.task(&t1()).map(|t| t.target_branch.as_str()),
            Some("develop")
        );
    }

    #[test]
    fn test_rebase_branch_fetch_failure_aborts_with_toast() {
        let stub = StubService::ok();
        let (mut app, _rx) = test_app(stub);
        seed(&mut app, vec![make_task("t1", TaskStatus::Live)]);

        app.dispatch(Message::BranchesLoaded {
            task: t1(),
            result: Err("offline".to_string()),
        });
        assert!(app.model.ui_state.rebase_dialog.is_none());
        assert_eq!(
            app.model.ui_state.status_message.as_deref(),
            Some("Failed to load branches")
        );
    }

    #[test]
    fn test_archive_success_clears_selection_and_returns_to_list() {
        let stub = StubService::ok();
        let (mut app, rx) = test_app(stub);
        seed(&mut app, vec![make_task("t1", TaskStatus::Live)]);

        app.dispatch(Message::SelectTask(t1()));
        app.dispatch(Message::ArchiveRequested(t1()));
        pump(&mut app, &rx); // ArchiveFinished

        assert!(app.model.ui_state.selected.is_none());
        assert_eq!(app.model.ui_state.mode, ViewMode::List);
    }

    #[test]
    fn test_reset_keeps_selection() {
        let stub = StubService::ok();
        stub.set_response(true, "Reset to main");
        let (mut app, rx) = test_app(stub.clone());
        seed(&mut app, vec![make_task("t1", TaskStatus::Conflict)]);

        app.dispatch(Message::SelectTask(t1()));
        app.dispatch(Message::ResetRequested(t1()));
        assert!(app.model.ui_state.confirm.is_some());

        app.dispatch(Message::ConfirmAccept);
        pump(&mut app, &rx); // ResetFinished
        assert!(stub.calls().contains(&"reset p1:t1".to_string()));
        assert_eq!(app.model.ui_state.selected, Some(t1()));
        assert_eq!(
            app.model.ui_state.status_message.as_deref(),
            Some("Reset to main")
        );
    }

    #[test]
    fn test_clean_needs_confirmation_and_clears_selection() {
        let stub = StubService::ok();
        let (mut app, rx) = test_app(stub.clone());
        seed(&mut app, vec![make_task("t1", TaskStatus::Idle)]);

        app.dispatch(Message::SelectTask(t1()));
        app.dispatch(Message::CleanRequested(t1()));
        assert!(stub.calls().iter().all(|c| !c.starts_with("delete")));

        app.dispatch(Message::ConfirmAccept);
        pump(&mut app, &rx); // CleanFinished
        assert!(stub.calls().contains(&"delete p1:t1".to_string()));
        assert!(app.model.ui_state.selected.is_none());
        assert_eq!(app.model.ui_state.mode, ViewMode::List);
    }

    #[test]
    fn test_confirm_cancel_runs_nothing() {
        let stub = StubService::ok();
        let (mut app, _rx) = test_app(stub.clone());
        seed(&mut app, vec![make_task("t1", TaskStatus::Idle)]);

        app.dispatch(Message::CleanRequested(t1()));
        app.dispatch(Message::ConfirmCancel);
        assert!(app.model.ui_state.confirm.is_none());
        assert!(stub.calls().is_empty());
    }

    #[test]
    fn test_refresh_reconciles_ordering() {
        let stub = StubService::ok();
        let (mut app, _rx) = test_app(stub);
        seed(
            &mut app,
            vec![
                make_task("a", TaskStatus::Idle),
                make_task("b", TaskStatus::Idle),
                make_task("c", TaskStatus::Idle),
            ],
        );
        assert_eq!(app.model.ordering.keys(), &["p1:a", "p1:b", "p1:c"]);

        let mut project = app.model.projects[0].clone();
        project.tasks = vec![
            make_task("b", TaskStatus::Idle),
            make_task("c", TaskStatus::Idle),
            make_task("d", TaskStatus::Idle),
        ];
        app.dispatch(Message::TasksLoaded(Ok(vec![project])));
        assert_eq!(app.model.ordering.keys(), &["p1:b", "p1:c", "p1:d"]);
    }

    #[test]
    fn test_refresh_drops_vanished_selection() {
        let stub = StubService::ok();
        let (mut app, _rx) = test_app(stub);
        seed(&mut app, vec![make_task("t1", TaskStatus::Live)]);
        app.dispatch(Message::SelectTask(t1()));

        let mut project = app.model.projects[0].clone();
        project.tasks = Vec::new();
        app.dispatch(Message::TasksLoaded(Ok(vec![project])));

        assert!(app.model.ui_state.selected.is_none());
        assert_eq!(app.model.ui_state.mode, ViewMode::List);
    }

    #[test]
    fn test_navigation_wraps_over_visible_collection() {
        let stub = StubService::ok();
        let (mut app, _rx) = test_app(stub);
        seed(
            &mut app,
            vec![
                make_task("a", TaskStatus::Idle),
                make_task("b", TaskStatus::Idle),
            ],
        );

        app.dispatch(Message::SelectNext);
        assert_eq!(app.model.ui_state.selected, Some(TaskRef::new("p1", "a")));
        app.dispatch(Message::SelectNext);
        assert_eq!(app.model.ui_state.selected, Some(TaskRef::new("p1", "b")));
        app.dispatch(Message::SelectNext);
        assert_eq!(app.model.ui_state.selected, Some(TaskRef::new("p1", "a")));
        app.dispatch(Message::SelectPrev);
        assert_eq!(app.model.ui_state.selected, Some(TaskRef::new("p1", "b")));
    }

    #[test]
    fn test_persisted_state_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let mut model = AppModel::default();
        model.ordering = OrderingStore::from_saved(vec!["p1:b".to_string(), "p1:a".to_string()]);
        model.layouts[0]
            .root
            .split_pane(0, crate::layout::SplitDirection::Horizontal)
            .unwrap();
        save_state_to(&model, &path).unwrap();

        let restored = load_state_from(&path).unwrap();
        assert_eq!(restored.ordering.keys(), &["p1:b", "p1:a"]);
        assert_eq!(restored.layouts[0].root.pane_count(), 2);
    }
}
