//! UI rendering for the TUI

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

use super::app::{App, Dialog, InputDialog, Screen};
use super::views::{goals, tree};
use crate::tree_view::{GoalTreeView, ToastKind};

/// Main draw function - orchestrates all rendering
pub fn draw(frame: &mut Frame, app: &App) {
    let area = frame.area();

    let main_layout = Layout::vertical([
        Constraint::Length(1), // Header
        Constraint::Min(3),    // Content
        Constraint::Length(1), // Footer/status
    ])
    .split(area);

    draw_header(frame, app, main_layout[0]);

    match &app.screen {
        Screen::Picker => goals::draw(frame, &app.data, app.picker_selected, main_layout[1]),
        Screen::Tree(tv) => tree::draw(frame, tv, main_layout[1]),
        Screen::NotFound(id) => goals::draw_not_found(frame, id, main_layout[1]),
    }

    draw_footer(frame, app, main_layout[2]);

    if let Some(dialog) = &app.dialog {
        draw_dialog(frame, dialog, area);
    }
}

fn draw_header(frame: &mut Frame, app: &App, area: Rect) {
    let refresh_indicator = if app.refresh_shown_at.is_some() {
        " [Updated]"
    } else {
        ""
    };

    let header_text = match &app.screen {
        Screen::Picker => format!(" goaltree │ {} goals{}", app.data.goals.len(), refresh_indicator),
        Screen::NotFound(_) => format!(" goaltree │ not found{}", refresh_indicator),
        Screen::Tree(tv) => {
            let progress = app
                .data
                .goal(tv.goal_id())
                .map(|g| g.progress())
                .unwrap_or(0.0);
            format!(
                " {} │ {:.0}% done │ zoom {:.0}% │ {}{}",
                tv.view().title,
                progress * 100.0,
                tv.viewport().scale() * 100.0,
                if tv.show_completed() {
                    "showing completed"
                } else {
                    "hiding completed"
                },
                refresh_indicator
            )
        }
    };

    let header = Paragraph::new(header_text).style(Style::default().bg(Color::Blue).fg(Color::White).bold());
    frame.render_widget(header, area);
}

fn key_hints(tv: &GoalTreeView) -> &'static str {
    if tv.focused().is_some() {
        "←↑↓→:move  space:collapse  a:add  e:edit  d:done  x:delete  g:generate  E:enhance  m/M:minimize  esc:unfocus"
    } else {
        "click/tab:focus  drag/arrows:pan  wheel/+/-:zoom  f:fit  c:completed  q:back"
    }
}

fn draw_footer(frame: &mut Frame, app: &App, area: Rect) {
    // toasts win over status messages, which win over key hints
    let (text, style) = match &app.screen {
        Screen::Tree(tv) => match (tv.toast(), &app.status_message) {
            (Some(toast), _) => {
                let color = match toast.kind {
                    ToastKind::Info => Color::Green,
                    ToastKind::Warning => Color::Yellow,
                    ToastKind::Error => Color::Red,
                };
                (toast.message.clone(), Style::default().bg(color).fg(Color::Black))
            }
            (None, Some((msg, _))) => (msg.clone(), Style::default().bg(Color::DarkGray).fg(Color::White)),
            (None, None) => (
                key_hints(tv).to_string(),
                Style::default().bg(Color::DarkGray).fg(Color::White),
            ),
        },
        _ => (
            app.status_message
                .as_ref()
                .map(|(msg, _)| msg.clone())
                .unwrap_or_else(|| "j/k:move  enter:open  n:new goal  q:quit".to_string()),
            Style::default().bg(Color::DarkGray).fg(Color::White),
        ),
    };

    let footer = Paragraph::new(format!(" {}", text)).style(style);
    frame.render_widget(footer, area);
}

/// Centered popup of at most `width` x `height`
fn popup_area(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(4));
    Rect {
        x: area.x + (area.width.saturating_sub(width)) / 2,
        y: area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height,
    }
}

fn draw_dialog(frame: &mut Frame, dialog: &Dialog, area: Rect) {
    match dialog {
        Dialog::Input(input) => draw_input(frame, input, area),
        Dialog::ConfirmDelete { title, .. } => {
            let popup = popup_area(area, 50, 7);
            frame.render_widget(Clear, popup);
            let text = vec![
                Line::from(""),
                Line::from(format!("Delete \"{}\" and everything under it?", title)),
                Line::from(""),
                Line::from(Span::styled("[y] delete   [n] cancel", Style::default().fg(Color::DarkGray))),
            ];
            let body = Paragraph::new(text)
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true })
                .block(
                    Block::default()
                        .title(" Confirm ")
                        .borders(Borders::ALL)
                        .border_style(Style::default().fg(Color::Red)),
                );
            frame.render_widget(body, popup);
        }
    }
}

fn draw_input(frame: &mut Frame, input: &InputDialog, area: Rect) {
    let height = 4 + 2 * input.fields.len() as u16 + 2;
    let popup = popup_area(area, 60, height);
    frame.render_widget(Clear, popup);

    let mut lines = Vec::new();
    for (i, field) in input.fields.iter().enumerate() {
        let active = i == input.active && input.waiting.is_none();
        let label_style = if active {
            Style::default().fg(Color::Cyan).bold()
        } else {
            Style::default().fg(Color::DarkGray)
        };
        lines.push(Line::from(Span::styled(format!("{}:", field.label), label_style)));
        let mut value = vec![Span::raw(format!("  {}", field.value))];
        if active {
            value.push(Span::styled("_", Style::default().fg(Color::Cyan).rapid_blink()));
        }
        lines.push(Line::from(value));
    }
    lines.push(Line::from(""));

    if input.waiting.is_some() {
        lines.push(Line::from(Span::styled(
            "Generating... (esc to cancel)",
            Style::default().fg(Color::Yellow),
        )));
    } else if let Some(error) = &input.error {
        lines.push(Line::from(Span::styled(error.clone(), Style::default().fg(Color::Red))));
    } else {
        lines.push(Line::from(Span::styled(
            "[enter] save  [tab] next field  [esc] cancel",
            Style::default().fg(Color::DarkGray),
        )));
    }

    let body = Paragraph::new(lines).wrap(Wrap { trim: false }).block(
        Block::default()
            .title(format!(" {} ", input.title()))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );
    frame.render_widget(body, popup);
}
