use crate::app::App;
use crate::model::{AppModel, NotificationLevel, TaskStatus};
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem},
    Frame,
};
use unicode_width::UnicodeWidthStr;

/// Render the aggregated task list; scroll follows the selection
pub fn render_task_list(frame: &mut Frame, area: Rect, app: &mut App) {
    let rows = build_rows(&app.model, area.width);
    let count = rows.len();
    let selected = app.model.selected_visible_index();
    app.model.ui_state.list_state.select(selected);

    let title = if app.model.ui_state.show_archived {
        format!(" Tasks ({}) · archived shown ", count)
    } else {
        format!(" Tasks ({}) ", count)
    };

    let list = List::new(rows)
        .block(Block::default().title(title).borders(Borders::ALL))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol("❯ ");

    frame.render_stateful_widget(list, area, &mut app.model.ui_state.list_state);
}

fn status_marker(status: TaskStatus) -> Span<'static> {
    match status {
        TaskStatus::Live => Span::styled("●", Style::default().fg(Color::Green)),
        TaskStatus::Idle => Span::styled("○", Style::default().fg(Color::Gray)),
        TaskStatus::Merged => Span::styled("✓", Style::default().fg(Color::Blue)),
        TaskStatus::Conflict => Span::styled("!", Style::default().fg(Color::Yellow)),
        TaskStatus::Broken => Span::styled("✗", Style::default().fg(Color::Red)),
        TaskStatus::Archived => Span::styled("⊘", Style::default().fg(Color::DarkGray)),
    }
}

fn level_color(level: NotificationLevel) -> Color {
    match level {
        NotificationLevel::Critical => Color::Red,
        NotificationLevel::Warn => Color::Yellow,
        NotificationLevel::Notice => Color::Cyan,
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.width() <= max {
        return text.to_string();
    }
    let mut out = String::new();
    for c in text.chars() {
        if out.width() + 1 >= max {
            break;
        }
        out.push(c);
    }
    out.push('…');
    out
}

fn build_rows(model: &AppModel, width: u16) -> Vec<ListItem<'static>> {
    let name_width = (width as usize).saturating_sub(36).max(12);
    let quick = model.ui_state.quick_select_visible;

    model
        .visible_entries()
        .iter()
        .enumerate()
        .map(|(idx, entry)| {
            let task = entry.task;
            let mut spans: Vec<Span<'static>> = Vec::new();

            if quick {
                let badge = match idx {
                    0..=8 => format!("{} ", idx + 1),
                    9 => "0 ".to_string(),
                    _ => "  ".to_string(),
                };
                spans.push(Span::styled(
                    badge,
                    Style::default()
                        .fg(Color::Black)
                        .bg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                ));
                spans.push(Span::raw(" "));
            }

            if let Some(drag) = model.ordering.drag() {
                let marker = if drag.drag_over_index == Some(idx) {
                    "▸"
                } else if drag.dragged_index == idx {
                    "↕"
                } else {
                    " "
                };
                spans.push(Span::styled(marker, Style::default().fg(Color::Cyan)));
            }

            spans.push(status_marker(task.status));
            spans.push(Span::raw(" "));
            spans.push(Span::raw(format!(
                "{:<width$}",
                truncate(&task.name, name_width),
                width = name_width
            )));
            spans.push(Span::styled(
                format!(" {} ", entry.project_name),
                Style::default().fg(Color::DarkGray),
            ));
            spans.push(Span::styled(
                format!("→ {} ", task.target_branch),
                Style::default().fg(Color::DarkGray),
            ));
            spans.push(Span::styled(
                format!("+{}", task.additions),
                Style::default().fg(Color::Green),
            ));
            spans.push(Span::styled(
                format!("/-{}", task.deletions),
                Style::default().fg(Color::Red),
            ));

            if model.ops.any_for_key(&entry.key()) {
                spans.push(Span::styled(" ⋯", Style::default().fg(Color::Yellow)));
            }

            if let Some(note) = model.notifications.lookup(entry.project_id, &task.id) {
                spans.push(Span::styled(
                    " ●",
                    Style::default().fg(level_color(note.level)),
                ));
            }

            ListItem::new(Line::from(spans))
        })
        .collect()
}
