use crate::app::App;
use crate::layout::{LayoutNode, SplitDirection};
use crate::model::{CreatedBy, InfoTab, Task};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

/// Render the info panel for the selected task
pub fn render_info(frame: &mut Frame, area: Rect, app: &App) {
    let Some(task) = app.model.selected_task() else {
        let empty = Paragraph::new("No task selected")
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(empty, area);
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(3)])
        .split(area);

    render_tabs(frame, chunks[0], app.model.ui_state.info_tab);

    let body = match app.model.ui_state.info_tab {
        InfoTab::Changes => changes_lines(task),
        InfoTab::Commits => commits_lines(task),
        InfoTab::Session => session_lines(app, task),
    };

    let block = Block::default()
        .title(format!(" {} ", task.name))
        .borders(Borders::ALL);
    frame.render_widget(Paragraph::new(body).block(block), chunks[1]);
}

fn render_tabs(frame: &mut Frame, area: Rect, active: InfoTab) {
    let mut spans = Vec::new();
    for tab in [InfoTab::Changes, InfoTab::Commits, InfoTab::Session] {
        let style = if tab == active {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(format!(" {} ", tab.label()), style));
        spans.push(Span::raw("│"));
    }
    spans.pop();
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn changes_lines(task: &Task) -> Vec<Line<'static>> {
    vec![
        Line::from(""),
        Line::from(vec![
            Span::styled("  Branch   ", Style::default().fg(Color::DarkGray)),
            Span::raw(task.branch.clone()),
        ]),
        Line::from(vec![
            Span::styled("  Target   ", Style::default().fg(Color::DarkGray)),
            Span::raw(task.target_branch.clone()),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Files    ", Style::default().fg(Color::DarkGray)),
            Span::raw(format!("{} changed", task.files_changed)),
        ]),
        Line::from(vec![
            Span::styled("  Diff     ", Style::default().fg(Color::DarkGray)),
            Span::styled(format!("+{}", task.additions), Style::default().fg(Color::Green)),
            Span::raw(" / "),
            Span::styled(format!("-{}", task.deletions), Style::default().fg(Color::Red)),
        ]),
    ]
}

fn commits_lines(task: &Task) -> Vec<Line<'static>> {
    if task.commits.is_empty() {
        return vec![
            Line::from(""),
            Line::from(Span::styled(
                "  No commits on this branch yet",
                Style::default().fg(Color::DarkGray),
            )),
        ];
    }

    let mut lines = vec![Line::from("")];
    for commit in &task.commits {
        let short = commit.sha.chars().take(7).collect::<String>();
        lines.push(Line::from(vec![
            Span::styled(format!("  {} ", short), Style::default().fg(Color::Yellow)),
            Span::raw(commit.subject.clone()),
        ]));
    }
    lines
}

fn session_lines(app: &App, task: &Task) -> Vec<Line<'static>> {
    let creator = match task.created_by {
        CreatedBy::User => "user",
        CreatedBy::Agent => "agent",
    };

    let mut lines = vec![
        Line::from(""),
        Line::from(vec![
            Span::styled("  Status   ", Style::default().fg(Color::DarkGray)),
            Span::raw(task.status.label()),
        ]),
        Line::from(vec![
            Span::styled("  Created  ", Style::default().fg(Color::DarkGray)),
            Span::raw(format!(
                "{} by {}",
                task.created_at.format("%Y-%m-%d %H:%M"),
                creator
            )),
        ]),
        Line::from(vec![
            Span::styled("  Updated  ", Style::default().fg(Color::DarkGray)),
            Span::raw(task.updated_at.format("%Y-%m-%d %H:%M").to_string()),
        ]),
    ];

    if let Some(selected) = app.model.ui_state.selected.as_ref() {
        if let Some(note) = app
            .model
            .notifications
            .lookup(&selected.project_id, &selected.task_id)
        {
            lines.push(Line::from(""));
            lines.push(Line::from(vec![
                Span::styled("  ● ", Style::default().fg(Color::Yellow)),
                Span::raw(note.message.clone()),
            ]));
        }
    }

    lines
}

/// Render the workspace: the selected task's panes arranged by the active
/// layout tree
pub fn render_workspace(frame: &mut Frame, area: Rect, app: &App) {
    let title = app
        .model
        .selected_task()
        .map(|t| format!(" Workspace — {} ", t.name))
        .unwrap_or_else(|| " Workspace ".to_string());

    let outer = Block::default().title(title).borders(Borders::ALL);
    let inner = outer.inner(area);
    frame.render_widget(outer, area);

    let mut ordinal = 0usize;
    render_node(
        frame,
        app.model.active_layout(),
        inner,
        app.model.ui_state.workspace_pane,
        &mut ordinal,
    );
}

fn render_node(
    frame: &mut Frame,
    node: &LayoutNode,
    area: Rect,
    active: usize,
    ordinal: &mut usize,
) {
    match node {
        LayoutNode::Split {
            direction,
            children,
        } => {
            let dir = match direction {
                SplitDirection::Horizontal => Direction::Horizontal,
                SplitDirection::Vertical => Direction::Vertical,
            };
            let halves = Layout::default()
                .direction(dir)
                .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
                .split(area);
            render_node(frame, &children[0], halves[0], active, ordinal);
            render_node(frame, &children[1], halves[1], active, ordinal);
        }
        LayoutNode::Pane {
            kind,
            custom_command,
        } => {
            let is_active = *ordinal == active;
            *ordinal += 1;

            let border_style = if is_active {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            let title = match custom_command {
                Some(cmd) => format!(" {} · {} ", kind.label(), cmd),
                None => format!(" {} ", kind.label()),
            };

            let block = Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(border_style);
            let body = Paragraph::new(Span::styled(
                "attached to external session",
                Style::default().fg(Color::DarkGray),
            ))
            .block(block);
            frame.render_widget(body, area);
        }
    }
}
