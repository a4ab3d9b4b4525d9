//! Goal picker - the home list of goals

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
};

use crate::model::{AppData, Goal};
use crate::week::IsoWeekId;

const BAR_WIDTH: usize = 10;

fn progress_bar(progress: f64) -> String {
    let filled = ((progress * BAR_WIDTH as f64).round() as usize).min(BAR_WIDTH);
    format!("[{}{}]", "#".repeat(filled), ".".repeat(BAR_WIDTH - filled))
}

fn schedule(goal: &Goal) -> String {
    match (goal.iso_week(), goal.duration) {
        (Some(week), Some(d)) if d > 1 => format!("{} +{}w", week, d - 1),
        (Some(week), _) => week.to_string(),
        (None, _) => String::new(),
    }
}

fn goal_item<'a>(data: &'a AppData, goal: &'a Goal, this_week: IsoWeekId) -> ListItem<'a> {
    let progress = goal.progress();
    let mut spans = vec![
        Span::styled(
            format!("{:<32}", goal.title()),
            Style::default().fg(Color::White).bold(),
        ),
        Span::raw(" "),
        Span::styled(
            progress_bar(progress),
            Style::default().fg(if progress >= 1.0 { Color::Green } else { Color::Yellow }),
        ),
        Span::raw(format!(" {:>3}% ", (progress * 100.0).round() as i32)),
    ];

    let week = schedule(goal);
    if !week.is_empty() {
        let style = if crate::week::covers(goal, this_week) {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(week, style));
        spans.push(Span::raw(" "));
    }

    for tag in data.tags_for(goal) {
        let style = if tag.is_hot {
            Style::default().fg(Color::Red).bold()
        } else {
            Style::default().fg(Color::Magenta)
        };
        spans.push(Span::styled(format!("#{}", tag.name), style));
        spans.push(Span::raw(" "));
    }

    ListItem::new(Line::from(spans))
}

pub fn draw(frame: &mut Frame, data: &AppData, selected: usize, area: Rect) {
    let block = Block::default()
        .title(" Goals │ [Enter] open  [n] new  [q] quit ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Magenta));

    if data.goals.is_empty() {
        let empty = Paragraph::new("No goals yet. Press n to create one.")
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center)
            .block(block);
        frame.render_widget(empty, area);
        return;
    }

    let this_week = IsoWeekId::current();
    let items: Vec<ListItem> = data.goals.iter().map(|g| goal_item(data, g, this_week)).collect();
    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().bg(Color::DarkGray))
        .highlight_symbol("▶ ");

    let mut state = ListState::default().with_selected(Some(selected));
    frame.render_stateful_widget(list, area, &mut state);
}

/// Shown when the requested goal id does not exist
pub fn draw_not_found(frame: &mut Frame, id: &str, area: Rect) {
    let text = vec![
        Line::from(""),
        Line::from(Span::styled("Goal not found", Style::default().fg(Color::Red).bold())),
        Line::from(""),
        Line::from(Span::styled(id.to_string(), Style::default().fg(Color::DarkGray))),
        Line::from(""),
        Line::from("Press Esc to go back"),
    ];
    let panel = Paragraph::new(text)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(panel, area);
}
