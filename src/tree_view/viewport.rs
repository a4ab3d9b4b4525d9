//! Pan/zoom controller for one tree view
//!
//! The whole canvas is drawn through a single affine transform:
//! `screen = world * scale + offset`.

use std::time::Instant;

use super::layout::{Layout, Point, Rect};
use crate::config::ViewportConfig;

/// Wheel delta that counts as one full wheel notch
const WHEEL_NOTCH: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Drag {
    start: Point,
    origin: Point,
}

#[derive(Debug, Clone)]
pub struct Viewport {
    cfg: ViewportConfig,
    scale: f64,
    offset: Point,
    width: f64,
    height: f64,
    wheel_locked_until: Option<Instant>,
    drag: Option<Drag>,
    transition_until: Option<Instant>,
}

impl Viewport {
    pub fn new(cfg: ViewportConfig, width: f64, height: f64) -> Self {
        Self {
            cfg,
            scale: 1.0,
            offset: Point::default(),
            width,
            height,
            wheel_locked_until: None,
            drag: None,
            transition_until: None,
        }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn offset(&self) -> Point {
        self.offset
    }

    pub fn size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    pub fn set_size(&mut self, width: f64, height: f64) {
        self.width = width;
        self.height = height;
    }

    fn clamp(&self, scale: f64) -> f64 {
        scale.clamp(self.cfg.min_scale, self.cfg.max_scale)
    }

    pub fn to_screen(&self, world: Point) -> Point {
        Point::new(
            world.x * self.scale + self.offset.x,
            world.y * self.scale + self.offset.y,
        )
    }

    pub fn to_world(&self, screen: Point) -> Point {
        Point::new(
            (screen.x - self.offset.x) / self.scale,
            (screen.y - self.offset.y) / self.scale,
        )
    }

    /// World-space rectangle currently on screen
    pub fn visible_world(&self) -> Rect {
        let top_left = self.to_world(Point::new(0.0, 0.0));
        Rect {
            x: top_left.x,
            y: top_left.y,
            width: self.width / self.scale,
            height: self.height / self.scale,
        }
    }

    // =========================================================================
    // Zoom
    // =========================================================================

    pub fn zoom_in(&mut self) {
        self.scale = self.clamp(self.scale + self.cfg.zoom_step);
    }

    pub fn zoom_out(&mut self) {
        self.scale = self.clamp(self.scale - self.cfg.zoom_step);
    }

    /// Zoom around `cursor` (screen space). Positive `delta_y` zooms out.
    ///
    /// Steps are at most half a button step and shrink with the wheel delta.
    /// Events arriving while a previous wheel zoom is still settling are
    /// dropped. Returns whether this event was applied.
    pub fn wheel_zoom(&mut self, cursor: Point, delta_y: f64, now: Instant) -> bool {
        if let Some(until) = self.wheel_locked_until {
            if now < until {
                tracing::trace!("wheel zoom dropped");
                return false;
            }
        }
        self.wheel_locked_until = Some(now + self.cfg.wheel_debounce());

        if delta_y == 0.0 {
            return true;
        }
        let magnitude = (delta_y.abs() / WHEEL_NOTCH).min(1.0);
        let step = self.cfg.zoom_step / 2.0 * magnitude;
        let old = self.scale;
        let new = self.clamp(old - step * delta_y.signum());

        let ratio = new / old;
        self.offset = Point::new(
            cursor.x - (cursor.x - self.offset.x) * ratio,
            cursor.y - (cursor.y - self.offset.y) * ratio,
        );
        self.scale = new;
        true
    }

    // =========================================================================
    // Pan
    // =========================================================================

    pub fn begin_drag(&mut self, at: Point) {
        self.drag = Some(Drag {
            start: at,
            origin: self.offset,
        });
    }

    /// Translate by the distance moved since `begin_drag`
    pub fn drag_to(&mut self, at: Point) {
        if let Some(drag) = self.drag {
            self.offset = Point::new(
                drag.origin.x + at.x - drag.start.x,
                drag.origin.y + at.y - drag.start.y,
            );
        }
    }

    pub fn end_drag(&mut self) {
        self.drag = None;
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.offset = Point::new(self.offset.x + dx, self.offset.y + dy);
    }

    // =========================================================================
    // Fit & focus
    // =========================================================================

    /// Frame the root and the first `fit_depth` levels below it
    pub fn fit_to_screen(&mut self, layout: &Layout, now: Instant) {
        let Some(bounds) = layout
            .iter()
            .filter(|p| p.depth <= self.cfg.fit_depth)
            .map(|p| p.rect())
            .reduce(|a, b| a.union(&b))
        else {
            return;
        };

        let pad_x = (self.width * self.cfg.fit_padding_ratio).max(self.cfg.fit_min_padding);
        let pad_y = (self.height * self.cfg.fit_padding_ratio).max(self.cfg.fit_min_padding);
        let box_w = bounds.width + 2.0 * pad_x;
        let box_h = bounds.height + 2.0 * pad_y;

        let scale = (self.width / box_w)
            .min(self.height / box_h)
            .clamp(self.cfg.fit_min_scale, self.cfg.fit_max_scale);
        let center = bounds.center();

        self.scale = scale;
        self.offset = Point::new(
            self.width / 2.0 - center.x * scale,
            self.height / 2.0 - center.y * scale,
        );
        self.transition_until = Some(now + self.cfg.fit_transition());
    }

    /// Center a node horizontally at one third of the height, leaving room
    /// for its children below. Returns false when the node is not placed.
    pub fn focus_on_node(&mut self, id: &str, layout: &Layout) -> bool {
        let Some(placement) = layout.get(id) else {
            return false;
        };
        let target = placement.rect().center();
        let scale = self.clamp(self.cfg.focus_scale);
        self.scale = scale;
        self.offset = Point::new(
            self.width / 2.0 - target.x * scale,
            self.height / 3.0 - target.y * scale,
        );
        true
    }

    /// Whether a fit transition is still running
    pub fn is_transitioning(&self, now: Instant) -> bool {
        self.transition_until.is_some_and(|until| now < until)
    }
}
