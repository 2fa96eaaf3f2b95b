use crate::app::App;
use crate::keys;
use crate::model::{CascadeState, MergeDialog, Verb};
use edtui::{EditorTheme, EditorView};
use ratatui::{
    crossterm::event::{KeyCode, KeyModifiers},
    layout::{Constraint, Direction, Layout, Rect},
    prelude::Widget,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph},
    Frame,
};

/// Render every overlay that may sit above the main surfaces
pub fn render_overlays(frame: &mut Frame, app: &mut App) {
    if app.model.ui_state.context_menu.is_some() {
        render_context_menu(frame, app);
    }
    if app.model.ui_state.merge_dialog.is_some() {
        render_merge_dialog(frame, app);
    }
    if app.model.ui_state.rebase_dialog.is_some() {
        render_rebase_dialog(frame, app);
    }
    if app.model.ui_state.commit_dialog.is_some() {
        render_commit_dialog(frame, app);
    }
    if app.model.cascade.is_awaiting() {
        render_cascade_prompt(frame, app);
    }
    if app.model.ui_state.show_help {
        render_help(frame);
    }
}

/// Helper function to create a centered rect
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

fn render_commit_dialog(frame: &mut Frame, app: &mut App) {
    let Some(dialog) = app.model.ui_state.commit_dialog.clone() else {
        return;
    };
    let name = app
        .model
        .task(&dialog.task)
        .map(|t| t.name.clone())
        .unwrap_or_else(|| dialog.task.task_id.clone());
    let loading = app.model.ops.is_loading(&dialog.task, Verb::Commit);

    let area = centered_rect(60, 40, frame.area());
    frame.render_widget(Clear, area);

    let block = Block::default()
        .title(format!(" Commit — {} ", name))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(inner);

    let theme = EditorTheme::default()
        .base(Style::default().fg(Color::White))
        .cursor_style(Style::default().bg(Color::White).fg(Color::Black));
    EditorView::new(&mut app.model.ui_state.editor_state)
        .wrap(true)
        .theme(theme)
        .render(chunks[0], frame.buffer_mut());

    if let Some(error) = &dialog.error {
        frame.render_widget(
            Paragraph::new(Span::styled(
                format!(" {}", error),
                Style::default().fg(Color::Red),
            )),
            chunks[1],
        );
    }

    let hint = if loading {
        " committing…"
    } else {
        " [Enter] commit  [\\ + Enter] newline  [Esc] cancel"
    };
    frame.render_widget(
        Paragraph::new(Span::styled(hint, Style::default().fg(Color::DarkGray))),
        chunks[2],
    );
}

fn render_merge_dialog(frame: &mut Frame, app: &App) {
    let Some(dialog) = app.model.ui_state.merge_dialog.as_ref() else {
        return;
    };
    let loading = app.model.ops.is_loading(&dialog.task, Verb::Merge);

    let area = centered_rect(44, 30, frame.area());
    frame.render_widget(Clear, area);

    let mut lines = vec![Line::from("")];
    for (idx, method) in MergeDialog::METHODS.iter().enumerate() {
        let selected = idx == dialog.selected;
        let marker = if selected { "❯ " } else { "  " };
        let style = if selected {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        lines.push(Line::from(Span::styled(
            format!(" {}{}", marker, method.label()),
            style,
        )));
    }
    lines.push(Line::from(""));
    if let Some(error) = &dialog.error {
        lines.push(Line::from(Span::styled(
            format!(" {}", error),
            Style::default().fg(Color::Red),
        )));
    }
    let hint = if loading {
        " merging…"
    } else {
        " [Enter] merge  [j/k] method  [Esc] cancel"
    };
    lines.push(Line::from(Span::styled(
        hint,
        Style::default().fg(Color::DarkGray),
    )));

    let dialog_widget = Paragraph::new(lines).block(
        Block::default()
            .title(" Merge method ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );
    frame.render_widget(dialog_widget, area);
}

fn render_rebase_dialog(frame: &mut Frame, app: &App) {
    let Some(dialog) = app.model.ui_state.rebase_dialog.as_ref() else {
        return;
    };

    let area = centered_rect(44, 50, frame.area());
    frame.render_widget(Clear, area);

    let mut lines = vec![Line::from("")];
    for (idx, branch) in dialog.branches.iter().enumerate() {
        let selected = idx == dialog.selected;
        let marker = if selected { "❯ " } else { "  " };
        let style = if selected {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        lines.push(Line::from(Span::styled(
            format!(" {}{}", marker, branch),
            style,
        )));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        " [Enter] retarget  [j/k] branch  [Esc] cancel",
        Style::default().fg(Color::DarkGray),
    )));

    let dialog_widget = Paragraph::new(lines).block(
        Block::default()
            .title(" Target branch ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );
    frame.render_widget(dialog_widget, area);
}

fn render_cascade_prompt(frame: &mut Frame, app: &App) {
    let CascadeState::AwaitingArchiveDecision { task_name, .. } = &app.model.cascade else {
        return;
    };

    let area = centered_rect(50, 20, frame.area());
    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            format!(" Merged '{}'.", task_name),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(" Archive the task now?"),
        Line::from(""),
        Line::from(Span::styled(
            " [a] archive now   [k] keep it around",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let prompt = Paragraph::new(lines).block(
        Block::default()
            .title(" Merged ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green)),
    );
    frame.render_widget(prompt, area);
}

fn render_context_menu(frame: &mut Frame, app: &App) {
    let Some(menu) = app.model.ui_state.context_menu.as_ref() else {
        return;
    };

    let width = menu
        .items
        .iter()
        .map(|i| i.label.len())
        .max()
        .unwrap_or(10) as u16
        + 6;
    let height = menu.items.len() as u16 + 2;
    let frame_area = frame.area();
    let x = menu.anchor.0.min(frame_area.width.saturating_sub(width));
    let y = menu.anchor.1.min(frame_area.height.saturating_sub(height));
    let area = Rect::new(x, y, width, height);

    let items: Vec<ListItem> = menu
        .items
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            let style = if !item.enabled {
                Style::default().fg(Color::DarkGray)
            } else if idx == menu.selected {
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(Span::styled(format!(" {}", item.label), style))
        })
        .collect();

    frame.render_widget(Clear, area);
    frame.render_widget(
        List::new(items).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        ),
        area,
    );
}

fn key_label(key: KeyCode, modifiers: KeyModifiers) -> String {
    let base = match key {
        KeyCode::Char(c) => c.to_string(),
        KeyCode::Enter => "Enter".to_string(),
        KeyCode::Esc => "Esc".to_string(),
        KeyCode::Tab => "Tab".to_string(),
        KeyCode::Up => "Up".to_string(),
        KeyCode::Down => "Down".to_string(),
        other => format!("{:?}", other),
    };
    if modifiers.contains(KeyModifiers::CONTROL) {
        format!("Ctrl-{}", base)
    } else if modifiers.contains(KeyModifiers::ALT) {
        format!("Alt-{}", base)
    } else {
        base
    }
}

/// Render help overlay, generated from the binding table
fn render_help(frame: &mut Frame) {
    let area = centered_rect(60, 80, frame.area());

    let mut lines = vec![
        Line::from(Span::styled(
            "Canopy Keyboard Shortcuts",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];

    for binding in keys::bindings() {
        lines.push(Line::from(format!(
            "  {:<8} {}",
            key_label(binding.key, binding.modifiers),
            binding.help
        )));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "  Alt-1..9/0  quick-select task 1-10",
        Style::default().fg(Color::DarkGray),
    )));
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Press any key to close",
        Style::default().fg(Color::DarkGray),
    )));

    let help = Paragraph::new(lines)
        .block(
            Block::default()
                .title(" Help ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .style(Style::default().fg(Color::White));

    frame.render_widget(Clear, area);
    frame.render_widget(help, area);
}
