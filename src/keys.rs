//! Hotkey routing: a single binding table gated by state predicates, inert
//! whenever a key-capturing layer (dialog, menu, search) is above the list.

use ratatui::crossterm::event::{
    KeyCode, KeyEvent, KeyEventKind, KeyModifiers, ModifierKeyCode,
};

use crate::app::App;
use crate::layout::SplitDirection;
use crate::message::Message;
use crate::model::{FocusArea, Task, TaskRef, Verb, ViewMode};

/// One key binding: a key, the action it triggers and the predicate that
/// keeps it inert when the state does not allow it
pub struct Binding {
    pub key: KeyCode,
    pub modifiers: KeyModifiers,
    pub help: &'static str,
    pub enabled: fn(&App) -> bool,
    pub action: fn(&App) -> Vec<Message>,
}

/// Shift is carried in the char itself; bindings only constrain ctrl/alt
const MODIFIER_MASK: KeyModifiers = KeyModifiers::CONTROL.union(KeyModifiers::ALT);

fn binding_matches(binding: &Binding, key: &KeyEvent) -> bool {
    binding.key == key.code && key.modifiers.intersection(MODIFIER_MASK) == binding.modifiers
}

// === Predicates ===

fn always(_: &App) -> bool {
    true
}

fn has_selection(app: &App) -> bool {
    app.model.ui_state.selected.is_some()
}

fn in_workspace(app: &App) -> bool {
    app.model.ui_state.mode == ViewMode::Workspace
}

fn in_info(app: &App) -> bool {
    app.model.ui_state.mode == ViewMode::Info
}

fn verb_ready(app: &App, verb: Verb, allowed: fn(&Task) -> bool) -> bool {
    // Verb shortcuts belong to the list/info surfaces, not the workspace
    if in_workspace(app) {
        return false;
    }
    let Some(selected) = app.model.ui_state.selected.as_ref() else {
        return false;
    };
    let Some(task) = app.model.task(selected) else {
        return false;
    };
    allowed(task) && !app.model.ops.is_loading(selected, verb)
}

fn can_commit_sel(app: &App) -> bool {
    verb_ready(app, Verb::Commit, Task::can_commit)
}

fn can_sync_sel(app: &App) -> bool {
    verb_ready(app, Verb::Sync, Task::can_sync)
}

fn can_merge_sel(app: &App) -> bool {
    verb_ready(app, Verb::Merge, Task::can_merge)
}

fn can_rebase_sel(app: &App) -> bool {
    verb_ready(app, Verb::Rebase, Task::can_rebase)
}

fn can_archive_sel(app: &App) -> bool {
    verb_ready(app, Verb::Archive, Task::can_archive)
}

fn can_reset_sel(app: &App) -> bool {
    verb_ready(app, Verb::Reset, Task::can_reset)
}

fn can_clean_sel(app: &App) -> bool {
    verb_ready(app, Verb::Clean, Task::can_clean)
}

fn can_recover_sel(app: &App) -> bool {
    verb_ready(app, Verb::Recover, Task::can_recover)
}

fn can_open_sel(app: &App) -> bool {
    app.model.selected_task().is_some_and(|t| t.is_active())
}

fn has_notifications(app: &App) -> bool {
    !app.model.notifications.is_empty()
}

// === Actions ===

fn sel(app: &App) -> Option<TaskRef> {
    app.model.ui_state.selected.clone()
}

fn one(msg: Message) -> Vec<Message> {
    vec![msg]
}

fn act_next(_: &App) -> Vec<Message> {
    one(Message::SelectNext)
}

fn act_prev(_: &App) -> Vec<Message> {
    one(Message::SelectPrev)
}

fn act_enter(app: &App) -> Vec<Message> {
    let Some(task) = sel(app) else {
        return Vec::new();
    };
    match app.model.ui_state.mode {
        ViewMode::List => one(Message::SelectTask(task)),
        ViewMode::Info => one(Message::ActivateTask(task)),
        ViewMode::Workspace => Vec::new(),
    }
}

fn act_open_workspace(app: &App) -> Vec<Message> {
    sel(app).map(Message::ActivateTask).into_iter().collect()
}

fn act_close(_: &App) -> Vec<Message> {
    one(Message::CloseView)
}

fn act_next_tab(app: &App) -> Vec<Message> {
    one(Message::SetInfoTab(app.model.ui_state.info_tab.next()))
}

fn act_commit(app: &App) -> Vec<Message> {
    sel(app).map(Message::CommitRequested).into_iter().collect()
}

fn act_sync(app: &App) -> Vec<Message> {
    sel(app).map(Message::SyncRequested).into_iter().collect()
}

fn act_merge(app: &App) -> Vec<Message> {
    sel(app).map(Message::MergeRequested).into_iter().collect()
}

fn act_rebase(app: &App) -> Vec<Message> {
    sel(app).map(Message::RebaseRequested).into_iter().collect()
}

fn act_archive(app: &App) -> Vec<Message> {
    sel(app).map(Message::ArchiveRequested).into_iter().collect()
}

fn act_reset(app: &App) -> Vec<Message> {
    sel(app).map(Message::ResetRequested).into_iter().collect()
}

fn act_clean(app: &App) -> Vec<Message> {
    sel(app).map(Message::CleanRequested).into_iter().collect()
}

fn act_recover(app: &App) -> Vec<Message> {
    sel(app).map(Message::RecoverRequested).into_iter().collect()
}

fn act_open_menu(app: &App) -> Vec<Message> {
    sel(app)
        .map(|task| Message::OpenContextMenu {
            task,
            column: 4,
            row: 4,
        })
        .into_iter()
        .collect()
}

fn act_move_up(_: &App) -> Vec<Message> {
    one(Message::MoveSelectedUp)
}

fn act_move_down(_: &App) -> Vec<Message> {
    one(Message::MoveSelectedDown)
}

fn act_refresh(_: &App) -> Vec<Message> {
    one(Message::RefreshAll)
}

fn act_search(_: &App) -> Vec<Message> {
    one(Message::FocusSearch)
}

fn act_help(_: &App) -> Vec<Message> {
    one(Message::ToggleHelp)
}

fn act_toggle_archived(_: &App) -> Vec<Message> {
    one(Message::ToggleArchived)
}

fn act_jump_notification(app: &App) -> Vec<Message> {
    app.model
        .notifications
        .latest()
        .map(|e| Message::ActivateNotification(e.task_ref()))
        .into_iter()
        .collect()
}

fn act_split_columns(_: &App) -> Vec<Message> {
    one(Message::SplitPane(SplitDirection::Horizontal))
}

fn act_split_rows(_: &App) -> Vec<Message> {
    one(Message::SplitPane(SplitDirection::Vertical))
}

fn act_next_pane(_: &App) -> Vec<Message> {
    one(Message::NextPane)
}

fn act_close_pane(_: &App) -> Vec<Message> {
    one(Message::ClosePane)
}

fn act_cycle_pane(_: &App) -> Vec<Message> {
    one(Message::CyclePaneKind)
}

fn act_quit(_: &App) -> Vec<Message> {
    one(Message::Quit)
}

/// The normal-mode binding table. First matching enabled binding wins, so
/// workspace arrangement keys shadow the verb keys while a workspace is open.
static BINDINGS: &[Binding] = &[
    // Workspace arrangement
    Binding {
        key: KeyCode::Char('s'),
        modifiers: KeyModifiers::NONE,
        help: "split pane into columns (workspace)",
        enabled: in_workspace,
        action: act_split_columns,
    },
    Binding {
        key: KeyCode::Char('v'),
        modifiers: KeyModifiers::NONE,
        help: "split pane into rows (workspace)",
        enabled: in_workspace,
        action: act_split_rows,
    },
    Binding {
        key: KeyCode::Char('w'),
        modifiers: KeyModifiers::NONE,
        help: "focus next pane (workspace)",
        enabled: in_workspace,
        action: act_next_pane,
    },
    Binding {
        key: KeyCode::Char('X'),
        modifiers: KeyModifiers::NONE,
        help: "close pane (workspace)",
        enabled: in_workspace,
        action: act_close_pane,
    },
    Binding {
        key: KeyCode::Char('t'),
        modifiers: KeyModifiers::NONE,
        help: "cycle pane type (workspace)",
        enabled: in_workspace,
        action: act_cycle_pane,
    },
    // Navigation
    Binding {
        key: KeyCode::Char('j'),
        modifiers: KeyModifiers::NONE,
        help: "next task",
        enabled: always,
        action: act_next,
    },
    Binding {
        key: KeyCode::Down,
        modifiers: KeyModifiers::NONE,
        help: "next task",
        enabled: always,
        action: act_next,
    },
    Binding {
        key: KeyCode::Char('k'),
        modifiers: KeyModifiers::NONE,
        help: "previous task",
        enabled: always,
        action: act_prev,
    },
    Binding {
        key: KeyCode::Up,
        modifiers: KeyModifiers::NONE,
        help: "previous task",
        enabled: always,
        action: act_prev,
    },
    Binding {
        key: KeyCode::Enter,
        modifiers: KeyModifiers::NONE,
        help: "open task / enter workspace",
        enabled: has_selection,
        action: act_enter,
    },
    Binding {
        key: KeyCode::Char('o'),
        modifiers: KeyModifiers::NONE,
        help: "open workspace",
        enabled: can_open_sel,
        action: act_open_workspace,
    },
    Binding {
        key: KeyCode::Esc,
        modifiers: KeyModifiers::NONE,
        help: "back (workspace > info > list)",
        enabled: always,
        action: act_close,
    },
    Binding {
        key: KeyCode::Tab,
        modifiers: KeyModifiers::NONE,
        help: "next info tab",
        enabled: in_info,
        action: act_next_tab,
    },
    // Verbs
    Binding {
        key: KeyCode::Char('c'),
        modifiers: KeyModifiers::NONE,
        help: "commit changes",
        enabled: can_commit_sel,
        action: act_commit,
    },
    Binding {
        key: KeyCode::Char('s'),
        modifiers: KeyModifiers::NONE,
        help: "sync with target branch",
        enabled: can_sync_sel,
        action: act_sync,
    },
    Binding {
        key: KeyCode::Char('m'),
        modifiers: KeyModifiers::NONE,
        help: "merge into target branch",
        enabled: can_merge_sel,
        action: act_merge,
    },
    Binding {
        key: KeyCode::Char('b'),
        modifiers: KeyModifiers::NONE,
        help: "change target branch",
        enabled: can_rebase_sel,
        action: act_rebase,
    },
    Binding {
        key: KeyCode::Char('a'),
        modifiers: KeyModifiers::NONE,
        help: "archive task",
        enabled: can_archive_sel,
        action: act_archive,
    },
    Binding {
        key: KeyCode::Char('r'),
        modifiers: KeyModifiers::NONE,
        help: "reset task to target state",
        enabled: can_reset_sel,
        action: act_reset,
    },
    Binding {
        key: KeyCode::Char('x'),
        modifiers: KeyModifiers::NONE,
        help: "delete task and worktree",
        enabled: can_clean_sel,
        action: act_clean,
    },
    Binding {
        key: KeyCode::Char('u'),
        modifiers: KeyModifiers::NONE,
        help: "recover archived task",
        enabled: can_recover_sel,
        action: act_recover,
    },
    // Ordering
    Binding {
        key: KeyCode::Char('+'),
        modifiers: KeyModifiers::NONE,
        help: "move task up",
        enabled: has_selection,
        action: act_move_up,
    },
    Binding {
        key: KeyCode::Char('='),
        modifiers: KeyModifiers::NONE,
        help: "move task up",
        enabled: has_selection,
        action: act_move_up,
    },
    Binding {
        key: KeyCode::Char('-'),
        modifiers: KeyModifiers::NONE,
        help: "move task down",
        enabled: has_selection,
        action: act_move_down,
    },
    Binding {
        key: KeyCode::Char('_'),
        modifiers: KeyModifiers::NONE,
        help: "move task down",
        enabled: has_selection,
        action: act_move_down,
    },
    // Misc
    Binding {
        key: KeyCode::Char('.'),
        modifiers: KeyModifiers::NONE,
        help: "open context menu",
        enabled: has_selection,
        action: act_open_menu,
    },
    Binding {
        key: KeyCode::Char('R'),
        modifiers: KeyModifiers::NONE,
        help: "refresh all projects",
        enabled: always,
        action: act_refresh,
    },
    Binding {
        key: KeyCode::Char('/'),
        modifiers: KeyModifiers::NONE,
        help: "search tasks",
        enabled: always,
        action: act_search,
    },
    Binding {
        key: KeyCode::Char('z'),
        modifiers: KeyModifiers::NONE,
        help: "show/hide archived tasks",
        enabled: always,
        action: act_toggle_archived,
    },
    Binding {
        key: KeyCode::Char('n'),
        modifiers: KeyModifiers::NONE,
        help: "jump to latest notification",
        enabled: has_notifications,
        action: act_jump_notification,
    },
    Binding {
        key: KeyCode::Char('?'),
        modifiers: KeyModifiers::NONE,
        help: "toggle help",
        enabled: always,
        action: act_help,
    },
    Binding {
        key: KeyCode::Char('q'),
        modifiers: KeyModifiers::NONE,
        help: "quit",
        enabled: always,
        action: act_quit,
    },
    Binding {
        key: KeyCode::Char('c'),
        modifiers: KeyModifiers::CONTROL,
        help: "quit",
        enabled: always,
        action: act_quit,
    },
];

/// The full binding table, for the help overlay
pub fn bindings() -> &'static [Binding] {
    BINDINGS
}

/// Route one key event. Capturing layers get the key first; the binding
/// table only runs for the plain list/info/workspace surfaces.
pub fn handle_key_event(key: KeyEvent, app: &mut App) -> Vec<Message> {
    // Bare modifier events drive the quick-select affordance
    if let KeyCode::Modifier(m) = key.code {
        if matches!(m, ModifierKeyCode::LeftAlt | ModifierKeyCode::RightAlt) {
            return match key.kind {
                KeyEventKind::Press => vec![Message::QuickSelectHint(true)],
                KeyEventKind::Release => vec![Message::QuickSelectHint(false)],
                _ => Vec::new(),
            };
        }
        return Vec::new();
    }
    if key.kind != KeyEventKind::Press {
        return Vec::new();
    }

    // Key-capturing layers, top-most first
    if app.model.ui_state.show_help {
        return one(Message::ToggleHelp);
    }
    if app.model.ui_state.confirm.is_some() {
        return handle_confirm_key(key);
    }
    if app.model.cascade.is_awaiting() {
        return handle_cascade_key(key);
    }
    if app.model.ui_state.context_menu.is_some() {
        return handle_menu_key(key);
    }
    if app.model.ui_state.merge_dialog.is_some() {
        return handle_merge_dialog_key(key);
    }
    if app.model.ui_state.rebase_dialog.is_some() {
        return handle_rebase_dialog_key(key);
    }
    if app.model.ui_state.commit_dialog.is_some() {
        return handle_commit_editor_key(key, app);
    }
    if app.model.ui_state.focus == FocusArea::Search {
        return handle_search_key(key, app);
    }

    // Alt-held numeric quick-select: 1-9, 0 addresses the 10th task
    if key.modifiers.contains(KeyModifiers::ALT) {
        if let KeyCode::Char(c) = key.code {
            if let Some(digit) = c.to_digit(10) {
                let index = if digit == 0 { 9 } else { digit as usize - 1 };
                return vec![Message::QuickSelectHint(true), Message::QuickSelect(index)];
            }
        }
    }

    for binding in BINDINGS {
        if binding_matches(binding, &key) && (binding.enabled)(app) {
            return (binding.action)(app);
        }
    }
    Vec::new()
}

fn handle_confirm_key(key: KeyEvent) -> Vec<Message> {
    match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') => one(Message::ConfirmAccept),
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => one(Message::ConfirmCancel),
        _ => Vec::new(),
    }
}

fn handle_cascade_key(key: KeyEvent) -> Vec<Message> {
    match key.code {
        KeyCode::Char('a') | KeyCode::Enter => one(Message::CascadeArchive),
        KeyCode::Char('k') | KeyCode::Esc => one(Message::CascadeKeep),
        _ => Vec::new(),
    }
}

fn handle_menu_key(key: KeyEvent) -> Vec<Message> {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => one(Message::MenuNavigate(1)),
        KeyCode::Char('k') | KeyCode::Up => one(Message::MenuNavigate(-1)),
        KeyCode::Enter => one(Message::MenuConfirm),
        KeyCode::Esc | KeyCode::Char('q') => one(Message::CloseContextMenu),
        _ => Vec::new(),
    }
}

fn handle_merge_dialog_key(key: KeyEvent) -> Vec<Message> {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down | KeyCode::Right => one(Message::MergeMethodNavigate(1)),
        KeyCode::Char('k') | KeyCode::Up | KeyCode::Left => one(Message::MergeMethodNavigate(-1)),
        KeyCode::Enter => one(Message::MergeSubmit),
        KeyCode::Esc => one(Message::CloseDialog),
        _ => Vec::new(),
    }
}

fn handle_rebase_dialog_key(key: KeyEvent) -> Vec<Message> {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => one(Message::RebaseNavigate(1)),
        KeyCode::Char('k') | KeyCode::Up => one(Message::RebaseNavigate(-1)),
        KeyCode::Enter => one(Message::RebaseSubmit),
        KeyCode::Esc => one(Message::CloseDialog),
        _ => Vec::new(),
    }
}

/// Commit dialog input goes to the editor; Enter submits unless the line
/// ends with \ (line continuation)
fn handle_commit_editor_key(key: KeyEvent, app: &mut App) -> Vec<Message> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    match key.code {
        KeyCode::Esc => one(Message::CloseDialog),

        KeyCode::Enter if !ctrl => {
            let text = app.model.ui_state.get_input_text();
            if text.ends_with('\\') {
                use edtui::actions::{DeleteChar, Execute, LineBreak};
                DeleteChar(1).execute(&mut app.model.ui_state.editor_state);
                LineBreak(1).execute(&mut app.model.ui_state.editor_state);
                Vec::new()
            } else {
                one(Message::CommitSubmit)
            }
        }

        // Ctrl+D also submits (explicit submit)
        KeyCode::Char('d') if ctrl => one(Message::CommitSubmit),

        _ => {
            app.model
                .ui_state
                .editor_event_handler
                .on_key_event(key, &mut app.model.ui_state.editor_state);
            Vec::new()
        }
    }
}

fn handle_search_key(key: KeyEvent, app: &App) -> Vec<Message> {
    match key.code {
        KeyCode::Esc | KeyCode::Enter => one(Message::ExitSearch),
        KeyCode::Down => vec![Message::ExitSearch, Message::SelectNext],
        KeyCode::Backspace => {
            let mut text = app.model.ui_state.search.clone();
            text.pop();
            one(Message::SearchChanged(text))
        }
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            let mut text = app.model.ui_state.search.clone();
            text.push(c);
            one(Message::SearchChanged(text))
        }
        _ => Vec::new(),
    }
}
