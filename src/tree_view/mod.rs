//! Goal tree view engine
//!
//! `GoalTreeView` binds one goal's data tree to everything derived from it:
//! the view tree (UI flags), the layout, the viewport and keyboard focus.
//!
//! Every mutation follows the same path:
//! 1. validate, returning an [`EditError`] before anything changes
//! 2. rebuild the goal's data tree with one [`tree::rewrite`]
//! 3. reproject the view tree, keeping UI flags by id
//! 4. recompute the layout
//!
//! The caller owns [`AppData`] and persistence; this type never saves.

pub mod layout;
pub mod navigator;
pub mod project;
pub mod viewport;

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::ai::{AiError, GeneratedTask};
use crate::config::{Config, LayoutConfig};
use crate::model::{AppData, Node};
use crate::tree;

pub use layout::{Layout, Placement, Point, Rect};
pub use navigator::{NavKey, NavOutcome, Navigator};
pub use project::ViewNode;
pub use viewport::Viewport;

/// How long a toast stays up
pub const TOAST_TTL: Duration = Duration::from_millis(1500);

/// Request tickets are unique for the whole process, across views
static NEXT_TICKET: AtomicU64 = AtomicU64::new(1);

/// Error type for tree edits. None of these leave a partial change behind.
#[derive(Debug, Clone, PartialEq)]
pub enum EditError {
    EmptyTitle,
    InvalidCount { count: i64, max: usize },
    IncompleteDescendants { id: String },
    NodeNotFound(String),
    GoalNotFound(String),
    Generation(String),
}

impl std::fmt::Display for EditError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EditError::EmptyTitle => write!(f, "Title cannot be empty"),
            EditError::InvalidCount { count, max } => {
                write!(f, "Subtask count must be between 1 and {} (got {})", max, count)
            }
            EditError::IncompleteDescendants { .. } => {
                write!(f, "Complete all subtasks before marking this done")
            }
            EditError::NodeNotFound(id) => write!(f, "Node {} not found", id),
            EditError::GoalNotFound(id) => write!(f, "Goal {} not found", id),
            EditError::Generation(msg) => write!(f, "Subtask generation failed: {}", msg),
        }
    }
}

impl std::error::Error for EditError {}

pub type Result<T> = std::result::Result<T, EditError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Info,
    Warning,
    Error,
}

/// Short-lived message shown over the tree
#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    pub message: String,
    pub kind: ToastKind,
    pub shown_at: Instant,
}

/// What happened to the view after a delete
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The goal itself was deleted; there is no tree left to show
    GoalRemoved,
    /// A task was deleted and focus moved to its parent
    Refocused(String),
}

/// Work to hand to the text generator off the UI thread
#[derive(Debug, Clone, PartialEq)]
pub struct AiRequest {
    pub ticket: u64,
    pub node_id: String,
    pub description: String,
    pub job: AiJob,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiJob {
    Subtasks { count: usize },
    Enhance,
}

pub struct GoalTreeView {
    goal_id: String,
    view: ViewNode,
    layout: Layout,
    layout_cfg: LayoutConfig,
    viewport: Viewport,
    navigator: Navigator,
    show_completed: bool,
    toast: Option<Toast>,
    pending_ai: Option<u64>,
    max_subtasks: usize,
}

impl GoalTreeView {
    /// Open the tree view for `goal_id`, or report that the goal does not exist
    pub fn open(data: &AppData, goal_id: &str, config: &Config, width: f64, height: f64) -> Result<Self> {
        let goal = data
            .goal(goal_id)
            .ok_or_else(|| EditError::GoalNotFound(goal_id.to_string()))?;
        let view = project::project(&goal.root, true);
        let layout = Layout::compute(&view, &config.layout, width);
        Ok(Self {
            goal_id: goal_id.to_string(),
            view,
            layout,
            layout_cfg: config.layout.clone(),
            viewport: Viewport::new(config.viewport.clone(), width, height),
            navigator: Navigator::new(config.viewport.navigation_settle()),
            show_completed: true,
            toast: None,
            pending_ai: None,
            max_subtasks: config.ai.max_subtask_count,
        })
    }

    pub fn goal_id(&self) -> &str {
        &self.goal_id
    }

    pub fn view(&self) -> &ViewNode {
        &self.view
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    pub fn focused(&self) -> Option<&str> {
        self.navigator.focused()
    }

    pub fn show_completed(&self) -> bool {
        self.show_completed
    }

    pub fn toast(&self) -> Option<&Toast> {
        self.toast.as_ref()
    }

    pub fn is_generating(&self) -> bool {
        self.pending_ai.is_some()
    }

    /// Whether `ticket` is the request this view is waiting on
    pub fn is_pending(&self, ticket: u64) -> bool {
        self.pending_ai == Some(ticket)
    }

    fn show_toast(&mut self, message: impl Into<String>, kind: ToastKind, now: Instant) {
        self.toast = Some(Toast {
            message: message.into(),
            kind,
            shown_at: now,
        });
    }

    // =========================================================================
    // Derivation
    // =========================================================================

    /// Reproject from the current data and recompute layout.
    /// Returns false when the goal no longer exists.
    pub fn refresh(&mut self, data: &AppData) -> bool {
        let Some(goal) = data.goal(&self.goal_id) else {
            return false;
        };
        self.view = project::reproject_preserving_flags(&self.view, &goal.root, self.show_completed);
        if let Some(focused) = self.navigator.focused() {
            if !self.view.is_displayed(focused) {
                self.navigator.clear();
            }
        }
        self.relayout();
        true
    }

    fn relayout(&mut self) {
        let (width, _) = self.viewport.size();
        self.layout = Layout::compute(&self.view, &self.layout_cfg, width);
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        self.viewport.set_size(width, height);
        self.relayout();
    }

    /// Swap in a new goal tree, then rederive
    fn commit(&mut self, data: &mut AppData, root: Node) -> Result<()> {
        let goal = data
            .goal_mut(&self.goal_id)
            .ok_or_else(|| EditError::GoalNotFound(self.goal_id.clone()))?;
        goal.root = root;
        self.refresh(data);
        Ok(())
    }

    fn root<'a>(&self, data: &'a AppData) -> Result<&'a Node> {
        data.goal(&self.goal_id)
            .map(|g| &g.root)
            .ok_or_else(|| EditError::GoalNotFound(self.goal_id.clone()))
    }

    fn node<'a>(&self, data: &'a AppData, id: &str) -> Result<&'a Node> {
        tree::find(self.root(data)?, id).ok_or_else(|| EditError::NodeNotFound(id.to_string()))
    }

    // =========================================================================
    // Data mutations
    // =========================================================================

    /// Append a new pending task under `parent_id`
    pub fn add_child(
        &mut self,
        data: &mut AppData,
        parent_id: &str,
        title: &str,
        description: &str,
    ) -> Result<String> {
        let title = title.trim();
        if title.is_empty() {
            return Err(EditError::EmptyTitle);
        }
        self.node(data, parent_id)?;

        let task = Node::new_task(title, description.trim());
        let id = task.id.clone();
        let root = self.append(data, parent_id, vec![task])?;
        self.commit(data, root)?;
        tracing::debug!(goal = %self.goal_id, parent = parent_id, task = %id, "added task");
        Ok(id)
    }

    fn append(&self, data: &AppData, parent_id: &str, tasks: Vec<Node>) -> Result<Node> {
        let root = self.root(data)?;
        tree::rewrite_id(root, parent_id, |parent| {
            let mut children = parent.children.clone();
            children.extend(tasks.iter().cloned());
            Some(tree::with_children(parent, children))
        })
        .ok_or_else(|| EditError::NodeNotFound(parent_id.to_string()))
    }

    /// Update title and description in place
    pub fn edit_node(&mut self, data: &mut AppData, id: &str, title: &str, description: &str) -> Result<()> {
        let title = title.trim();
        if title.is_empty() {
            return Err(EditError::EmptyTitle);
        }
        self.node(data, id)?;

        let root = tree::rewrite_id(self.root(data)?, id, |n| {
            Some(Node {
                title: title.to_string(),
                description: description.trim().to_string(),
                ..n.clone()
            })
        })
        .ok_or_else(|| EditError::NodeNotFound(id.to_string()))?;
        self.commit(data, root)?;
        tracing::debug!(goal = %self.goal_id, node = id, "edited node");
        Ok(())
    }

    /// Flip `done`. Marking done requires every descendant to be done
    /// already; unmarking never touches other nodes. Returns the new state.
    pub fn toggle_done(&mut self, data: &mut AppData, id: &str, now: Instant) -> Result<bool> {
        let node = self.node(data, id)?;
        let mark = !node.done;
        if mark && !tree::all_descendants_done(node) {
            let err = EditError::IncompleteDescendants { id: id.to_string() };
            self.show_toast(err.to_string(), ToastKind::Warning, now);
            return Err(err);
        }

        let root = tree::rewrite_id(self.root(data)?, id, |n| {
            Some(Node {
                done: mark,
                ..n.clone()
            })
        })
        .ok_or_else(|| EditError::NodeNotFound(id.to_string()))?;
        self.commit(data, root)?;
        tracing::debug!(goal = %self.goal_id, node = id, done = mark, "toggled done");
        Ok(mark)
    }

    /// Remove a node with its whole subtree. Deleting the root deletes the goal.
    /// Confirmation is the caller's job.
    pub fn delete_node(&mut self, data: &mut AppData, id: &str, now: Instant) -> Result<DeleteOutcome> {
        if id == self.goal_id {
            data.goals.retain(|g| g.id() != id);
            self.navigator.clear();
            self.pending_ai = None;
            tracing::info!(goal = id, "deleted goal");
            return Ok(DeleteOutcome::GoalRemoved);
        }

        let root = self.root(data)?;
        let parent_id = tree::find_parent(root, id)
            .map(|p| p.id.clone())
            .ok_or_else(|| EditError::NodeNotFound(id.to_string()))?;
        let new_root = tree::rewrite_id(root, id, |_| None)
            .ok_or_else(|| EditError::NodeNotFound(id.to_string()))?;
        self.commit(data, new_root)?;

        self.navigator.focus(parent_id.clone(), now);
        tracing::debug!(goal = %self.goal_id, node = id, "deleted subtree");
        Ok(DeleteOutcome::Refocused(parent_id))
    }

    // =========================================================================
    // Generated content
    // =========================================================================

    /// Validate a subtask request and issue a ticket for it. Any earlier
    /// request still in flight is superseded.
    pub fn begin_generation(&mut self, data: &AppData, parent_id: &str, count: i64) -> Result<AiRequest> {
        let max = self.max_subtasks;
        if count <= 0 || count as u64 > max as u64 {
            return Err(EditError::InvalidCount { count, max });
        }
        let parent = self.node(data, parent_id)?;
        let description = if parent.description.trim().is_empty() {
            parent.title.clone()
        } else {
            format!("{}\n\n{}", parent.title, parent.description)
        };
        Ok(self.issue(parent_id, description, AiJob::Subtasks { count: count as usize }))
    }

    /// Issue a ticket for enhancing a node's description
    pub fn begin_enhancement(&mut self, data: &AppData, id: &str) -> Result<AiRequest> {
        let node = self.node(data, id)?;
        let description = if node.description.trim().is_empty() {
            node.title.clone()
        } else {
            node.description.clone()
        };
        Ok(self.issue(id, description, AiJob::Enhance))
    }

    fn issue(&mut self, node_id: &str, description: String, job: AiJob) -> AiRequest {
        let ticket = NEXT_TICKET.fetch_add(1, Ordering::Relaxed);
        self.pending_ai = Some(ticket);
        AiRequest {
            ticket,
            node_id: node_id.to_string(),
            description,
            job,
        }
    }

    /// Forget the in-flight request; its reply will be ignored
    pub fn cancel_generation(&mut self) {
        self.pending_ai = None;
    }

    fn claim(&mut self, ticket: u64) -> bool {
        if self.pending_ai == Some(ticket) {
            self.pending_ai = None;
            true
        } else {
            tracing::debug!(ticket, "dropping stale generator reply");
            false
        }
    }

    /// Apply a subtask reply. Stale replies return `Ok(None)` and change
    /// nothing; failures change nothing and surface as an error toast.
    pub fn finish_generation(
        &mut self,
        data: &mut AppData,
        request: &AiRequest,
        reply: std::result::Result<Vec<GeneratedTask>, AiError>,
        now: Instant,
    ) -> Result<Option<Vec<String>>> {
        if !self.claim(request.ticket) {
            return Ok(None);
        }
        let AiJob::Subtasks { count } = request.job else {
            return Ok(None);
        };
        let generated = match reply {
            Ok(tasks) => tasks,
            Err(e) => {
                let err = EditError::Generation(e.to_string());
                self.show_toast(err.to_string(), ToastKind::Error, now);
                return Err(err);
            }
        };
        self.append_generated(data, &request.node_id, generated, count, now)
            .map(Some)
    }

    /// Append exactly `count` generated tasks, padding with placeholders
    pub fn append_generated(
        &mut self,
        data: &mut AppData,
        parent_id: &str,
        generated: Vec<GeneratedTask>,
        count: usize,
        now: Instant,
    ) -> Result<Vec<String>> {
        self.node(data, parent_id)?;
        let tasks = normalize_generated(generated, count);
        let ids: Vec<String> = tasks.iter().map(|t| t.id.clone()).collect();
        let root = self.append(data, parent_id, tasks)?;
        self.commit(data, root)?;
        self.show_toast(format!("Added {} subtasks", ids.len()), ToastKind::Info, now);
        tracing::debug!(goal = %self.goal_id, parent = parent_id, count = ids.len(), "added generated subtasks");
        Ok(ids)
    }

    /// Apply an enhanced description. Stale replies are ignored.
    pub fn finish_enhancement(
        &mut self,
        data: &mut AppData,
        request: &AiRequest,
        text: String,
        now: Instant,
    ) -> Result<bool> {
        if !self.claim(request.ticket) || request.job != AiJob::Enhance {
            return Ok(false);
        }
        let title = self.node(data, &request.node_id)?.title.clone();
        self.edit_node(data, &request.node_id, &title, &text)?;
        self.show_toast("Description enhanced", ToastKind::Info, now);
        Ok(true)
    }

    // =========================================================================
    // UI flags
    // =========================================================================

    /// Body click toggles `collapsed`; the connector control toggles
    /// `minimized` on the node itself.
    pub fn toggle_collapse(&mut self, id: &str, from_connector: bool) -> Result<()> {
        let is_root = id == self.goal_id;
        let node = self
            .view
            .find_mut(id)
            .ok_or_else(|| EditError::NodeNotFound(id.to_string()))?;
        if from_connector {
            if !is_root {
                node.minimized = !node.minimized;
            }
        } else {
            node.collapsed = !node.collapsed;
        }
        if let Some(focused) = self.navigator.focused() {
            if !self.view.is_displayed(focused) {
                self.navigator.set_focused(Some(id.to_string()));
            }
        }
        self.relayout();
        Ok(())
    }

    /// Minimize the named immediate children of `parent_id`
    pub fn minimize_children(&mut self, parent_id: &str, child_ids: &[String]) -> Result<()> {
        let parent = self
            .view
            .find_mut(parent_id)
            .ok_or_else(|| EditError::NodeNotFound(parent_id.to_string()))?;
        for child in parent.children.iter_mut() {
            if child_ids.contains(&child.id) {
                child.minimized = true;
            }
        }
        if let Some(focused) = self.navigator.focused() {
            if !self.view.is_displayed(focused) {
                self.navigator.set_focused(Some(parent_id.to_string()));
            }
        }
        self.relayout();
        Ok(())
    }

    /// Minimize every immediate child of `parent_id`
    pub fn minimize_all_children(&mut self, parent_id: &str) -> Result<()> {
        let ids: Vec<String> = self
            .view
            .find(parent_id)
            .ok_or_else(|| EditError::NodeNotFound(parent_id.to_string()))?
            .children
            .iter()
            .map(|c| c.id.clone())
            .collect();
        self.minimize_children(parent_id, &ids)
    }

    pub fn set_show_completed(&mut self, data: &AppData, show: bool) {
        self.show_completed = show;
        self.refresh(data);
    }

    // =========================================================================
    // Focus & viewport
    // =========================================================================

    /// Focus a node (click or programmatic) and re-center on it after settling
    pub fn focus(&mut self, id: &str, now: Instant) {
        if self.view.find(id).is_some() {
            self.navigator.focus(id, now);
        }
    }

    pub fn clear_focus(&mut self) {
        self.navigator.clear();
    }

    pub fn handle_key(&mut self, key: NavKey, now: Instant) -> NavOutcome {
        let outcome = self.navigator.handle(key, &self.view, now);
        if let NavOutcome::ToggleCollapse(id) = &outcome {
            let id = id.clone();
            if let Err(e) = self.toggle_collapse(&id, false) {
                tracing::debug!("collapse refused: {}", e);
            }
        }
        outcome
    }

    pub fn fit_to_screen(&mut self, now: Instant) {
        self.viewport.fit_to_screen(&self.layout, now);
    }

    /// Periodic housekeeping: expire toasts, run delayed re-centering
    pub fn tick(&mut self, now: Instant) {
        if let Some(toast) = &self.toast {
            if now.duration_since(toast.shown_at) >= TOAST_TTL {
                self.toast = None;
            }
        }
        if let Some(id) = self.navigator.due(now) {
            self.relayout();
            self.viewport.focus_on_node(&id, &self.layout);
        }
    }

    /// Node under a screen-space point
    pub fn node_at(&self, screen: Point) -> Option<&Placement> {
        self.layout.hit_test(self.viewport.to_world(screen))
    }
}

/// Exactly `count` fresh tasks: truncate extras, pad with placeholders
pub fn normalize_generated(generated: Vec<GeneratedTask>, count: usize) -> Vec<Node> {
    let mut tasks: Vec<Node> = generated
        .into_iter()
        .filter(|t| !t.title.trim().is_empty())
        .take(count)
        .map(|t| Node::new_task(t.title.trim(), t.description.trim()))
        .collect();
    while tasks.len() < count {
        let n = tasks.len() + 1;
        tasks.push(Node::new_task(format!("Subtask {}", n), ""));
    }
    tasks
}
