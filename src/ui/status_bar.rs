use crate::app::App;
use crate::model::ViewMode;
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

/// Render the status bar: confirmation prompt, toast, or a summary line
pub fn render_status_bar(frame: &mut Frame, area: Rect, app: &App) {
    // A pending confirmation takes over the whole bar
    if let Some(confirm) = &app.model.ui_state.confirm {
        let prompt = Paragraph::new(Span::styled(
            format!(" {} ", confirm.message),
            Style::default()
                .fg(Color::Black)
                .bg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ));
        frame.render_widget(prompt, area);
        return;
    }

    if let Some(message) = &app.model.ui_state.status_message {
        let toast = Paragraph::new(Span::styled(
            format!(" {} ", message),
            Style::default().fg(Color::White).bg(Color::Blue),
        ));
        frame.render_widget(toast, area);
        return;
    }

    let mode = match app.model.ui_state.mode {
        ViewMode::List => "LIST",
        ViewMode::Info => "INFO",
        ViewMode::Workspace => "WORKSPACE",
    };

    let mut spans = vec![Span::styled(
        format!(" {} ", mode),
        Style::default().fg(Color::Black).bg(Color::Gray),
    )];

    if let Some(task) = app.model.selected_task() {
        spans.push(Span::raw(format!(
            " {} [{}] {} → {}",
            task.name,
            task.status.label(),
            task.branch,
            task.target_branch
        )));
    }

    spans.push(Span::styled(
        "  ? help",
        Style::default().fg(Color::DarkGray),
    ));

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
