//! Tree view - the goal's layout drawn on a canvas through the viewport

use ratatui::{
    prelude::*,
    widgets::{
        canvas::{Canvas, Line as CanvasLine, Rectangle},
        Paragraph,
    },
};

use crate::tree_view::{GoalTreeView, Placement, Point};
use crate::tui::app::{CELL_HEIGHT, CELL_WIDTH};

fn node_color(tv: &GoalTreeView, placement: &Placement) -> Color {
    if tv.focused() == Some(placement.id.as_str()) {
        return Color::Yellow;
    }
    if placement.stub {
        return Color::DarkGray;
    }
    match tv.view().find(&placement.id) {
        Some(node) if node.done => Color::Green,
        Some(node) if node.collapsed => Color::Cyan,
        _ => Color::White,
    }
}

/// Fit a label into `cells` columns
fn clip(text: &str, cells: usize) -> String {
    if text.chars().count() <= cells {
        return text.to_string();
    }
    if cells <= 1 {
        return text.chars().take(cells).collect();
    }
    let mut out: String = text.chars().take(cells - 1).collect();
    out.push('…');
    out
}

/// Draw the tree canvas
pub fn draw(frame: &mut Frame, tv: &GoalTreeView, area: Rect) {
    let layout = tv.layout();
    let viewport = tv.viewport();
    let width_px = f64::from(area.width) * CELL_WIDTH;
    let height_px = f64::from(area.height) * CELL_HEIGHT;

    if layout.is_empty() {
        let empty = Paragraph::new("Nothing to show")
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center);
        frame.render_widget(empty, area);
        return;
    }

    // screen y grows downward, canvas y grows upward
    let to_canvas = |world: Point| {
        let s = viewport.to_screen(world);
        (s.x, height_px - s.y)
    };
    let scale = viewport.scale();
    let visible = viewport.visible_world();

    let canvas = Canvas::default()
        .x_bounds([0.0, width_px])
        .y_bounds([0.0, height_px])
        .paint(|ctx| {
            // Connectors first, behind the boxes
            for placement in layout.iter() {
                let Some(anchor) = placement.connector else {
                    continue;
                };
                let (x1, y1) = to_canvas(anchor);
                let (x2, y2) = to_canvas(placement.top_anchor());
                ctx.draw(&CanvasLine {
                    x1,
                    y1,
                    x2,
                    y2,
                    color: Color::DarkGray,
                });
            }

            ctx.layer();

            for placement in layout.iter() {
                let rect = placement.rect();
                if rect.right() < visible.x
                    || rect.x > visible.right()
                    || rect.bottom() < visible.y
                    || rect.y > visible.bottom()
                {
                    continue;
                }
                let (left, bottom) = to_canvas(Point::new(rect.x, rect.bottom()));
                let color = node_color(tv, placement);
                ctx.draw(&Rectangle {
                    x: left,
                    y: bottom,
                    width: rect.width * scale,
                    height: rect.height * scale,
                    color,
                });

                let cells = ((rect.width * scale) / CELL_WIDTH) as usize;
                let Some(node) = tv.view().find(&placement.id) else {
                    continue;
                };
                let label = if placement.stub {
                    format!("+{}", node.children.len())
                } else {
                    let marker = if node.done { "✓ " } else { "" };
                    format!("{}{}", marker, node.title)
                };
                let label = clip(&label, cells.saturating_sub(2));
                if label.is_empty() {
                    continue;
                }
                let (tx, ty) = to_canvas(Point::new(rect.x, rect.y + rect.height / 2.0));
                ctx.print(tx + CELL_WIDTH, ty, Span::styled(label, Style::default().fg(color)));
            }
        });

    frame.render_widget(canvas, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip() {
        assert_eq!(clip("short", 10), "short");
        assert_eq!(clip("a longer title", 6), "a lon…");
        assert_eq!(clip("abc", 1), "a");
        assert_eq!(clip("abc", 0), "");
    }
}
