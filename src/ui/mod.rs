mod detail;
mod dialogs;
mod status_bar;
mod task_list;

use crate::app::App;
use crate::model::{FocusArea, ViewMode};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

/// Main view function - renders the entire UI
pub fn view(frame: &mut Frame, app: &mut App) {
    // Guard against extremely small terminals to prevent panics
    if frame.area().width < 40 || frame.area().height < 10 {
        let msg = Paragraph::new("Terminal too small").style(Style::default().fg(Color::Red));
        frame.render_widget(msg, frame.area());
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Header
            Constraint::Min(5),    // Main content
            Constraint::Length(1), // Search line
            Constraint::Length(1), // Status bar
        ])
        .split(frame.area());

    render_header(frame, chunks[0], app);

    match app.model.ui_state.mode {
        ViewMode::List => task_list::render_task_list(frame, chunks[1], app),
        ViewMode::Info => {
            let halves = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
                .split(chunks[1]);
            task_list::render_task_list(frame, halves[0], app);
            detail::render_info(frame, halves[1], app);
        }
        ViewMode::Workspace => detail::render_workspace(frame, chunks[1], app),
    }

    render_search(frame, chunks[2], app);
    status_bar::render_status_bar(frame, chunks[3], app);

    dialogs::render_overlays(frame, app);
}

fn render_header(frame: &mut Frame, area: Rect, app: &App) {
    let task_count = app.model.aggregated().len();
    let mut spans = vec![
        Span::styled(
            " canopy ",
            Style::default()
                .fg(Color::Black)
                .bg(Color::Green)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!(
            " {} project{} · {} task{}",
            app.model.projects.len(),
            if app.model.projects.len() == 1 { "" } else { "s" },
            task_count,
            if task_count == 1 { "" } else { "s" },
        )),
    ];

    let pending = app.model.notifications.len();
    if pending > 0 {
        spans.push(Span::styled(
            format!("  ● {} pending", pending),
            Style::default().fg(Color::Yellow),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_search(frame: &mut Frame, area: Rect, app: &App) {
    let focused = app.model.ui_state.focus == FocusArea::Search;
    let style = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let text = if app.model.ui_state.search.is_empty() && !focused {
        " /  search".to_string()
    } else {
        format!(" /  {}", app.model.ui_state.search)
    };

    let mut line = vec![Span::styled(text, style)];
    if focused {
        line.push(Span::styled("▏", Style::default().fg(Color::Yellow)));
    }
    frame.render_widget(Paragraph::new(Line::from(line)), area);
}
