//! Keyboard navigation over the view tree
//!
//! Focus moves between displayed nodes only: collapsed subtrees and
//! minimized stubs are skipped. Moving sets the focused id at once and
//! schedules a re-centering once the layout has settled.

use std::time::{Duration, Instant};

use super::project::ViewNode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavKey {
    Up,
    Down,
    Left,
    Right,
    Space,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavOutcome {
    /// Focus moved to this node
    Moved(String),
    /// Caller should toggle `collapsed` on this node
    ToggleCollapse(String),
    /// Nothing to do (no focus, or no node in that direction)
    Ignored,
}

/// Target of one arrow-key step from `from`, if any
pub fn step(root: &ViewNode, from: &str, key: NavKey) -> Option<String> {
    let node = root.find(from)?;
    match key {
        NavKey::Down => {
            if node.collapsed {
                return None;
            }
            node.expanded_children().next().map(|c| c.id.clone())
        }
        NavKey::Up => root.parent_of(from).map(|p| p.id.clone()),
        NavKey::Left | NavKey::Right => {
            let parent = root.parent_of(from)?;
            let siblings: Vec<&ViewNode> = parent.expanded_children().collect();
            let pos = siblings.iter().position(|s| s.id == from)?;
            let target = if key == NavKey::Right {
                siblings.get(pos + 1)
            } else {
                pos.checked_sub(1).and_then(|i| siblings.get(i))
            };
            target.map(|s| s.id.clone())
        }
        NavKey::Space => None,
    }
}

#[derive(Debug, Clone)]
pub struct Navigator {
    focused: Option<String>,
    refocus_at: Option<Instant>,
    settle: Duration,
}

impl Navigator {
    pub fn new(settle: Duration) -> Self {
        Self {
            focused: None,
            refocus_at: None,
            settle,
        }
    }

    pub fn focused(&self) -> Option<&str> {
        self.focused.as_deref()
    }

    /// Keys are only consumed while a node is focused
    pub fn is_active(&self) -> bool {
        self.focused.is_some()
    }

    /// Focus a node and schedule re-centering on it
    pub fn focus(&mut self, id: impl Into<String>, now: Instant) {
        self.focused = Some(id.into());
        self.refocus_at = Some(now + self.settle);
    }

    /// Focus a node without moving the viewport
    pub fn set_focused(&mut self, id: Option<String>) {
        self.focused = id;
    }

    pub fn clear(&mut self) {
        self.focused = None;
        self.refocus_at = None;
    }

    pub fn handle(&mut self, key: NavKey, root: &ViewNode, now: Instant) -> NavOutcome {
        let Some(current) = self.focused.clone() else {
            return NavOutcome::Ignored;
        };
        if key == NavKey::Space {
            return NavOutcome::ToggleCollapse(current);
        }
        match step(root, &current, key) {
            Some(target) => {
                self.focus(target.clone(), now);
                NavOutcome::Moved(target)
            }
            None => NavOutcome::Ignored,
        }
    }

    /// The node to re-center on, once its settle delay has passed
    pub fn due(&mut self, now: Instant) -> Option<String> {
        match self.refocus_at {
            Some(at) if now >= at => {
                self.refocus_at = None;
                self.focused.clone()
            }
            _ => None,
        }
    }
}
