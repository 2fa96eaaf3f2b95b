mod app;
mod keys;
mod layout;
mod menu;
mod message;
mod model;
mod notifications;
mod notify;
mod ordering;
mod service;
mod ui;

use std::io;
use std::sync::mpsc::{channel, Receiver, TryRecvError};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use app::{load_state, save_state, App};
use message::Message;
use model::ViewMode;
use notifications::NotificationPoller;
use ratatui::{
    backend::CrosstermBackend,
    crossterm::{
        event::{
            self, DisableFocusChange, DisableMouseCapture, EnableFocusChange, EnableMouseCapture,
            Event, KeyboardEnhancementFlags, MouseButton, MouseEventKind,
            PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
        },
        execute,
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    },
    Terminal,
};
use service::client::SocketClient;
use service::Dispatcher;

const NOTIFICATION_POLL_INTERVAL: Duration = Duration::from_secs(5);

fn main() -> Result<()> {
    let client = Arc::new(
        SocketClient::connect().context("could not reach the worktree daemon — is it running?")?,
    );
    let (tx, rx) = channel();
    let dispatcher = Dispatcher::new(client.clone(), client.clone(), tx.clone());

    // Restore the user's display order and workspace layouts
    let model = load_state().unwrap_or_default();
    let mut app = App::with_model(model, dispatcher);

    // The poller is owned here and torn down when the session ends
    let poller = NotificationPoller::start(client, tx, NOTIFICATION_POLL_INTERVAL);

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture, EnableFocusChange)?;
    // Release events drive the quick-select affordance; not every terminal
    // supports the enhancement, so a failure is ignored
    let _ = execute!(
        io::stdout(),
        PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
    );
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    app.dispatch(Message::RefreshAll);

    // Run the main loop
    let result = run_app(&mut terminal, &mut app, &rx);

    poller.stop();

    // Restore terminal
    let _ = execute!(terminal.backend_mut(), PopKeyboardEnhancementFlags);
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture,
        DisableFocusChange
    )?;
    terminal.show_cursor()?;

    // Save ordering and layouts on exit
    if let Err(e) = save_state(&app.model) {
        eprintln!("Failed to save state: {}", e);
    }

    result
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    rx: &Receiver<Message>,
) -> Result<()>
where
    B::Error: Send + Sync + 'static,
{
    loop {
        // Render
        terminal.draw(|frame| ui::view(frame, app))?;

        // Drain background completions (verb calls, notification poller)
        loop {
            match rx.try_recv() {
                Ok(msg) => app.dispatch(msg),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }

        // Handle events with timeout for tick
        if event::poll(Duration::from_millis(100))? {
            match event::read()? {
                Event::Key(key) => {
                    for msg in keys::handle_key_event(key, app) {
                        app.dispatch(msg);
                    }
                }
                Event::Mouse(mouse) => {
                    let size = terminal.size()?;
                    for msg in handle_mouse_event(mouse, app, size.width, size.height) {
                        app.dispatch(msg);
                    }
                }
                // Window blur hides the quick-select affordance
                Event::FocusLost => app.dispatch(Message::QuickSelectHint(false)),
                _ => {}
            }
        } else {
            // Tick for toast expiry and transient affordances
            app.dispatch(Message::Tick);
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

/// Mouse events over the task list: click to select, drag to reorder,
/// right-click for the context menu
fn handle_mouse_event(
    mouse: event::MouseEvent,
    app: &App,
    width: u16,
    height: u16,
) -> Vec<Message> {
    let content_top = 1u16;
    let content_bottom = height.saturating_sub(2);
    let x = mouse.column;
    let y = mouse.row;

    // The list surface is full width in List mode and the left pane in Info
    let in_list = match app.model.ui_state.mode {
        ViewMode::List => true,
        ViewMode::Info => x < width * 2 / 5,
        ViewMode::Workspace => false,
    };
    if !in_list || y <= content_top || y >= content_bottom {
        // A release outside the list still ends a drag in progress
        if matches!(mouse.kind, MouseEventKind::Up(MouseButton::Left)) {
            return vec![Message::DragCancel];
        }
        return Vec::new();
    }

    // Rows start below the list border; account for scroll
    let row = (y - content_top - 1) as usize + app.model.ui_state.list_state.offset();
    let refs = app.model.visible_refs();

    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => match refs.get(row) {
            Some(task) => vec![Message::SelectTask(task.clone()), Message::DragStart(row)],
            None => Vec::new(),
        },
        MouseEventKind::Drag(MouseButton::Left) => {
            if row < refs.len() {
                vec![Message::DragOver(row)]
            } else {
                Vec::new()
            }
        }
        MouseEventKind::Up(MouseButton::Left) => vec![Message::DragDrop],
        MouseEventKind::Down(MouseButton::Right) => match refs.get(row) {
            Some(task) => vec![Message::OpenContextMenu {
                task: task.clone(),
                column: x,
                row: y,
            }],
            None => Vec::new(),
        },
        MouseEventKind::ScrollDown => vec![Message::SelectNext],
        MouseEventKind::ScrollUp => vec![Message::SelectPrev],
        _ => Vec::new(),
    }
}
