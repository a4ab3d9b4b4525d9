//! Application state for the TUI

use std::path::Path;
use std::sync::{mpsc, Arc};
use std::time::Instant;

use crossterm::event::{MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;

use super::msg::{DialogKind, KeyContext, Msg, ScreenKind};
use crate::ai::{Assistant, GeneratedTask, TaskGenerator};
use crate::config::Config;
use crate::model::{AppData, NewGoal};
use crate::store::{PendingPush, RemoteOutcome, Store, StoreError};
use crate::tree_view::{AiJob, AiRequest, DeleteOutcome, GoalTreeView, Point};

/// Virtual pixels per terminal cell. Cells are about twice as tall as wide.
pub const CELL_WIDTH: f64 = 8.0;
pub const CELL_HEIGHT: f64 = 16.0;

/// Wheel delta reported for one terminal scroll event
const WHEEL_DELTA: f64 = 100.0;

pub enum Screen {
    Picker,
    Tree(Box<GoalTreeView>),
    NotFound(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextField {
    pub label: &'static str,
    pub value: String,
}

impl TextField {
    fn new(label: &'static str, value: impl Into<String>) -> Self {
        Self {
            label,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputPurpose {
    NewGoal,
    AddChild { parent: String },
    Edit { id: String },
    Generate { parent: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct InputDialog {
    pub purpose: InputPurpose,
    pub fields: Vec<TextField>,
    pub active: usize,
    /// Inline validation message
    pub error: Option<String>,
    /// Request in flight; the dialog shows a loading state until it settles
    pub waiting: Option<AiRequest>,
}

impl InputDialog {
    fn new(purpose: InputPurpose, fields: Vec<TextField>) -> Self {
        Self {
            purpose,
            fields,
            active: 0,
            error: None,
            waiting: None,
        }
    }

    pub fn title(&self) -> &'static str {
        match self.purpose {
            InputPurpose::NewGoal => "New goal",
            InputPurpose::AddChild { .. } => "Add subtask",
            InputPurpose::Edit { .. } => "Edit",
            InputPurpose::Generate { .. } => "Generate subtasks",
        }
    }

    fn value(&self, i: usize) -> &str {
        self.fields.get(i).map(|f| f.value.as_str()).unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Dialog {
    Input(InputDialog),
    ConfirmDelete { id: String, title: String },
}

/// Generator reply coming back from a worker thread
#[derive(Debug, Clone, PartialEq)]
pub struct AiReply {
    pub request: AiRequest,
    pub outcome: AiOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AiOutcome {
    Subtasks(Vec<GeneratedTask>),
    Enhanced(String),
}

/// Main application state
pub struct App {
    pub data: AppData,
    store: Store,
    config: Config,
    assistant: Arc<Assistant<Box<dyn TaskGenerator>>>,

    pub screen: Screen,
    pub dialog: Option<Dialog>,
    pub picker_selected: usize,

    /// Terminal area the tree canvas is drawn into
    pub canvas: Rect,

    pub status_message: Option<(String, Instant)>,
    pub refresh_shown_at: Option<Instant>,

    ai_tx: mpsc::Sender<AiReply>,
    ai_rx: mpsc::Receiver<AiReply>,
    sync_tx: mpsc::Sender<RemoteOutcome>,
    sync_rx: mpsc::Receiver<RemoteOutcome>,
}

impl App {
    pub fn new(mut store: Store, config: Config, goal: Option<&str>, now: Instant) -> Result<Self, StoreError> {
        let data = store.load()?;
        let assistant = Arc::new(Assistant::from_config(&config.ai));
        Ok(Self::with_assistant(store, config, data, assistant, goal, now))
    }

    pub fn with_assistant(
        store: Store,
        config: Config,
        data: AppData,
        assistant: Arc<Assistant<Box<dyn TaskGenerator>>>,
        goal: Option<&str>,
        now: Instant,
    ) -> Self {
        let (ai_tx, ai_rx) = mpsc::channel();
        let (sync_tx, sync_rx) = mpsc::channel();
        let mut app = Self {
            data,
            store,
            config,
            assistant,
            screen: Screen::Picker,
            dialog: None,
            picker_selected: 0,
            canvas: Rect::new(0, 1, 80, 22),
            status_message: None,
            refresh_shown_at: None,
            ai_tx,
            ai_rx,
            sync_tx,
            sync_rx,
        };
        if let Some(id) = goal {
            app.open_goal(id, now);
        }
        app
    }

    pub fn data_path(&self) -> &Path {
        self.store.path()
    }

    pub fn tree(&self) -> Option<&GoalTreeView> {
        match &self.screen {
            Screen::Tree(tv) => Some(&**tv),
            _ => None,
        }
    }

    fn tree_mut(&mut self) -> Option<&mut GoalTreeView> {
        match &mut self.screen {
            Screen::Tree(tv) => Some(&mut **tv),
            _ => None,
        }
    }

    pub fn key_context(&self) -> KeyContext {
        KeyContext {
            screen: match self.screen {
                Screen::Picker => ScreenKind::Picker,
                Screen::Tree(_) => ScreenKind::Tree,
                Screen::NotFound(_) => ScreenKind::NotFound,
            },
            dialog: self.dialog.as_ref().map(|d| match d {
                Dialog::Input(_) => DialogKind::Input,
                Dialog::ConfirmDelete { .. } => DialogKind::Confirm,
            }),
            focused: self.tree().and_then(|tv| tv.focused()).is_some(),
        }
    }

    pub fn set_status(&mut self, message: impl Into<String>, now: Instant) {
        self.status_message = Some((message.into(), now));
    }

    fn canvas_pixels(&self) -> (f64, f64) {
        (
            f64::from(self.canvas.width) * CELL_WIDTH,
            f64::from(self.canvas.height) * CELL_HEIGHT,
        )
    }

    /// Virtual-pixel point at the center of a terminal cell, if inside the canvas
    pub fn cell_to_point(&self, column: u16, row: u16) -> Option<Point> {
        let c = self.canvas;
        if column < c.x || row < c.y || column >= c.x + c.width || row >= c.y + c.height {
            return None;
        }
        Some(Point::new(
            (f64::from(column - c.x) + 0.5) * CELL_WIDTH,
            (f64::from(row - c.y) + 0.5) * CELL_HEIGHT,
        ))
    }

    // =========================================================================
    // Screens
    // =========================================================================

    pub fn open_goal(&mut self, id: &str, now: Instant) {
        let (width, height) = self.canvas_pixels();
        self.dialog = None;
        self.screen = match GoalTreeView::open(&self.data, id, &self.config, width, height) {
            Ok(mut tv) => {
                tv.fit_to_screen(now);
                Screen::Tree(Box::new(tv))
            }
            Err(e) => {
                tracing::info!("{}", e);
                Screen::NotFound(id.to_string())
            }
        };
    }

    fn back_to_picker(&mut self) {
        if let Some(tv) = self.tree_mut() {
            tv.cancel_generation();
        }
        self.dialog = None;
        self.screen = Screen::Picker;
        self.clamp_picker();
    }

    fn clamp_picker(&mut self) {
        let len = self.data.goals.len();
        if self.picker_selected >= len {
            self.picker_selected = len.saturating_sub(1);
        }
    }

    pub fn resize(&mut self, width: u16, height: u16) {
        // header and footer take one row each
        self.canvas = Rect::new(0, 1, width, height.saturating_sub(2));
        let (w, h) = self.canvas_pixels();
        if let Some(tv) = self.tree_mut() {
            tv.resize(w, h);
        }
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Local write on this thread; a due remote push goes to a worker
    fn persist(&mut self, now: Instant) {
        match self.store.save_deferred(&self.data, false, now) {
            Ok(Some(push)) => self.spawn_push(push),
            Ok(None) => {}
            Err(e) => {
                tracing::error!("save failed: {}", e);
                self.set_status(format!("Save failed: {}", e), now);
            }
        }
    }

    fn spawn_push(&self, push: PendingPush) {
        let tx = self.sync_tx.clone();
        std::thread::spawn(move || {
            let _ = tx.send(push.run());
        });
    }

    /// Drain finished remote pushes without blocking
    pub fn poll_sync(&mut self, now: Instant) {
        while let Ok(outcome) = self.sync_rx.try_recv() {
            self.store.finish_push(&outcome);
            if let RemoteOutcome::Failed(msg) = outcome {
                self.set_status(format!("Saved locally; remote sync failed: {}", msg), now);
            }
        }
    }

    /// Create the data file if it is missing, without touching the remote
    pub fn ensure_data_file(&self) -> Result<(), StoreError> {
        if self.store.path().exists() {
            return Ok(());
        }
        self.store.save_local(&self.data)
    }

    /// Final save with a forced remote flush
    pub fn shutdown(&mut self) {
        if let Err(e) = self.store.save(&self.data, true) {
            tracing::error!("final save failed: {}", e);
        }
    }

    /// Pick up changes another process wrote to the data file
    pub fn reload(&mut self, now: Instant) {
        let data = match self.store.load() {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!("reload failed: {}", e);
                return;
            }
        };
        if data == self.data {
            return;
        }
        self.data = data;
        self.refresh_shown_at = Some(now);
        self.clamp_picker();

        let vanished = match &mut self.screen {
            Screen::Tree(tv) => (!tv.refresh(&self.data)).then(|| tv.goal_id().to_string()),
            _ => None,
        };
        if let Some(id) = vanished {
            self.dialog = None;
            self.screen = Screen::NotFound(id);
        }
    }

    // =========================================================================
    // Generator replies
    // =========================================================================

    fn spawn_ai(&self, request: AiRequest) {
        let assistant = Arc::clone(&self.assistant);
        let tx = self.ai_tx.clone();
        std::thread::spawn(move || {
            let outcome = match request.job {
                AiJob::Subtasks { count } => {
                    AiOutcome::Subtasks(assistant.generate_subtasks(&request.description, count))
                }
                AiJob::Enhance => AiOutcome::Enhanced(assistant.enhance_description(&request.description)),
            };
            // receiver gone means the app already quit
            let _ = tx.send(AiReply { request, outcome });
        });
    }

    /// Drain finished generator work without blocking
    pub fn poll_ai(&mut self, now: Instant) {
        while let Ok(reply) = self.ai_rx.try_recv() {
            self.apply_ai_reply(reply, now);
        }
    }

    pub fn apply_ai_reply(&mut self, reply: AiReply, now: Instant) {
        let Screen::Tree(tv) = &mut self.screen else {
            tracing::debug!(ticket = reply.request.ticket, "dropping reply for closed view");
            return;
        };
        if !tv.is_pending(reply.request.ticket) {
            tracing::debug!(ticket = reply.request.ticket, "dropping reply this view did not ask for");
            return;
        }
        let applied = match reply.outcome {
            AiOutcome::Subtasks(tasks) => tv
                .finish_generation(&mut self.data, &reply.request, Ok(tasks), now)
                .map(|ids| ids.is_some()),
            AiOutcome::Enhanced(text) => tv.finish_enhancement(&mut self.data, &reply.request, text, now),
        };
        match applied {
            Ok(true) => {
                if let Some(Dialog::Input(d)) = &self.dialog {
                    if d.waiting.as_ref() == Some(&reply.request) {
                        self.dialog = None;
                    }
                }
                self.persist(now);
            }
            Ok(false) => {}
            Err(e) => self.set_status(e.to_string(), now),
        }
    }

    // =========================================================================
    // Update
    // =========================================================================

    /// Apply one message. Returns true when the app should quit.
    pub fn update(&mut self, msg: Msg, now: Instant) -> bool {
        match msg {
            Msg::Quit => return true,
            Msg::Tick => self.tick(now),
            Msg::Resize(w, h) => self.resize(w, h),
            Msg::Mouse(event) => self.handle_mouse(event, now),
            Msg::Noop => {}

            Msg::Input(_) | Msg::Backspace | Msg::NextField | Msg::Submit | Msg::Cancel => {
                self.update_dialog(msg, now)
            }

            Msg::PickerUp => self.picker_selected = self.picker_selected.saturating_sub(1),
            Msg::PickerDown => {
                if self.picker_selected + 1 < self.data.goals.len() {
                    self.picker_selected += 1;
                }
            }
            Msg::OpenSelected => {
                if let Some(id) = self.data.goals.get(self.picker_selected).map(|g| g.id().to_string()) {
                    self.open_goal(&id, now);
                }
            }
            Msg::NewGoal => {
                self.dialog = Some(Dialog::Input(InputDialog::new(
                    InputPurpose::NewGoal,
                    vec![
                        TextField::new("Title", ""),
                        TextField::new("Description", ""),
                        TextField::new("Week (YYYY-Www)", ""),
                    ],
                )));
            }
            Msg::Back => self.back_to_picker(),

            _ => self.update_tree(msg, now),
        }
        false
    }

    fn tick(&mut self, now: Instant) {
        if let Some(tv) = self.tree_mut() {
            tv.tick(now);
        }
        if let Some(shown_at) = self.refresh_shown_at {
            if now.duration_since(shown_at).as_secs() >= 2 {
                self.refresh_shown_at = None;
            }
        }
        if let Some((_, shown_at)) = &self.status_message {
            if now.duration_since(*shown_at).as_secs() >= 3 {
                self.status_message = None;
            }
        }
    }

    fn update_tree(&mut self, msg: Msg, now: Instant) {
        let Screen::Tree(tv) = &mut self.screen else {
            return;
        };
        let focused = tv.focused().map(str::to_string);

        match msg {
            Msg::Nav(key) => {
                tv.handle_key(key, now);
            }
            Msg::Pan(dx, dy) => tv.viewport_mut().pan_by(f64::from(dx), f64::from(dy)),
            Msg::ZoomIn => tv.viewport_mut().zoom_in(),
            Msg::ZoomOut => tv.viewport_mut().zoom_out(),
            Msg::Fit => tv.fit_to_screen(now),
            Msg::ToggleCompleted => {
                let show = !tv.show_completed();
                tv.set_show_completed(&self.data, show);
            }
            Msg::FocusRoot => {
                let root = tv.goal_id().to_string();
                tv.focus(&root, now);
            }
            Msg::ClearFocus => tv.clear_focus(),
            _ => {}
        }

        let Some(id) = focused else {
            return;
        };
        match msg {
            Msg::MinimizeSelf => {
                let _ = tv.toggle_collapse(&id, true);
            }
            Msg::MinimizeChildren => {
                let _ = tv.minimize_all_children(&id);
            }
            Msg::ToggleDone => match tv.toggle_done(&mut self.data, &id, now) {
                Ok(_) => self.persist(now),
                Err(e) => tracing::debug!("toggle refused: {}", e),
            },
            Msg::AddChild => {
                self.dialog = Some(Dialog::Input(InputDialog::new(
                    InputPurpose::AddChild { parent: id },
                    vec![TextField::new("Title", ""), TextField::new("Description", "")],
                )));
            }
            Msg::EditNode => {
                if let Some(node) = tv.view().find(&id) {
                    self.dialog = Some(Dialog::Input(InputDialog::new(
                        InputPurpose::Edit { id: id.clone() },
                        vec![
                            TextField::new("Title", node.title.clone()),
                            TextField::new("Description", node.description.clone()),
                        ],
                    )));
                }
            }
            Msg::DeleteNode => {
                if let Some(node) = tv.view().find(&id) {
                    self.dialog = Some(Dialog::ConfirmDelete {
                        id: id.clone(),
                        title: node.title.clone(),
                    });
                }
            }
            Msg::Generate => {
                let count = self.config.ai.default_subtask_count.to_string();
                self.dialog = Some(Dialog::Input(InputDialog::new(
                    InputPurpose::Generate { parent: id },
                    vec![TextField::new("How many subtasks", count)],
                )));
            }
            Msg::Enhance => match tv.begin_enhancement(&self.data, &id) {
                Ok(request) => {
                    self.spawn_ai(request);
                    self.set_status("Enhancing description...", now);
                }
                Err(e) => self.set_status(e.to_string(), now),
            },
            _ => {}
        }
    }

    fn update_dialog(&mut self, msg: Msg, now: Instant) {
        let Some(dialog) = self.dialog.as_mut() else {
            return;
        };

        if let Dialog::ConfirmDelete { id, .. } = dialog {
            let id = id.clone();
            self.dialog = None;
            if msg == Msg::Submit {
                self.delete(&id, now);
            }
            return;
        }
        let Dialog::Input(input) = dialog else {
            return;
        };

        match msg {
            Msg::Cancel => {
                if input.waiting.is_some() {
                    if let Some(tv) = self.tree_mut() {
                        tv.cancel_generation();
                    }
                }
                self.dialog = None;
            }
            // the form is frozen while its request is in flight
            _ if input.waiting.is_some() => {}
            Msg::Input(c) => {
                if let Some(field) = input.fields.get_mut(input.active) {
                    field.value.push(c);
                }
                input.error = None;
            }
            Msg::Backspace => {
                if let Some(field) = input.fields.get_mut(input.active) {
                    field.value.pop();
                }
                input.error = None;
            }
            Msg::NextField => input.active = (input.active + 1) % input.fields.len().max(1),
            Msg::Submit => self.submit(now),
            _ => {}
        }
    }

    fn submit(&mut self, now: Instant) {
        let Some(Dialog::Input(input)) = self.dialog.clone() else {
            return;
        };
        let result: Result<Option<AiRequest>, String> = match &input.purpose {
            InputPurpose::NewGoal => {
                let week = input.value(2).trim();
                let new = NewGoal {
                    title: input.value(0).to_string(),
                    description: input.value(1).to_string(),
                    week: (!week.is_empty()).then(|| week.to_string()),
                    ..Default::default()
                };
                match self.data.add_goal(new) {
                    Ok(id) => {
                        self.persist(now);
                        self.picker_selected = self.data.goals.len().saturating_sub(1);
                        self.open_goal(&id, now);
                        Ok(None)
                    }
                    Err(e) => Err(e.to_string()),
                }
            }
            InputPurpose::AddChild { parent } => self.with_tree(|tv, data| {
                tv.add_child(data, parent, input.value(0), input.value(1))
                    .map(|id| tv.focus(&id, now))
            }),
            InputPurpose::Edit { id } => {
                self.with_tree(|tv, data| tv.edit_node(data, id, input.value(0), input.value(1)))
            }
            InputPurpose::Generate { parent } => {
                let count = input.value(0).trim().parse::<i64>().unwrap_or(0);
                let data = &self.data;
                match &mut self.screen {
                    Screen::Tree(tv) => tv
                        .begin_generation(data, parent, count)
                        .map(Some)
                        .map_err(|e| e.to_string()),
                    _ => Ok(None),
                }
            }
        };

        match result {
            Ok(Some(request)) => {
                self.spawn_ai(request.clone());
                if let Some(Dialog::Input(d)) = self.dialog.as_mut() {
                    d.waiting = Some(request);
                }
            }
            Ok(None) => {
                if !matches!(input.purpose, InputPurpose::NewGoal) {
                    self.dialog = None;
                    self.persist(now);
                }
            }
            Err(message) => {
                if let Some(Dialog::Input(d)) = self.dialog.as_mut() {
                    d.error = Some(message);
                }
            }
        }
    }

    /// Run a data mutation on the open tree
    fn with_tree<T>(
        &mut self,
        f: impl FnOnce(&mut GoalTreeView, &mut AppData) -> crate::tree_view::Result<T>,
    ) -> Result<Option<AiRequest>, String> {
        match &mut self.screen {
            Screen::Tree(tv) => f(&mut **tv, &mut self.data).map(|_| None).map_err(|e| e.to_string()),
            _ => Ok(None),
        }
    }

    fn delete(&mut self, id: &str, now: Instant) {
        let Screen::Tree(tv) = &mut self.screen else {
            return;
        };
        match tv.delete_node(&mut self.data, id, now) {
            Ok(DeleteOutcome::GoalRemoved) => {
                self.persist(now);
                self.back_to_picker();
                self.set_status("Goal deleted", now);
            }
            Ok(DeleteOutcome::Refocused(_)) => self.persist(now),
            Err(e) => self.set_status(e.to_string(), now),
        }
    }

    // =========================================================================
    // Mouse
    // =========================================================================

    pub fn handle_mouse(&mut self, event: MouseEvent, now: Instant) {
        let Some(point) = self.cell_to_point(event.column, event.row) else {
            return;
        };
        let Screen::Tree(tv) = &mut self.screen else {
            return;
        };

        match event.kind {
            MouseEventKind::ScrollUp => {
                tv.viewport_mut().wheel_zoom(point, -WHEEL_DELTA, now);
            }
            MouseEventKind::ScrollDown => {
                tv.viewport_mut().wheel_zoom(point, WHEEL_DELTA, now);
            }
            MouseEventKind::Down(MouseButton::Left) => {
                let hit = tv.node_at(point).map(|p| (p.id.clone(), p.stub));
                match hit {
                    // clicking a stub brings it back to full size
                    Some((id, true)) => {
                        let _ = tv.toggle_collapse(&id, true);
                        tv.focus(&id, now);
                    }
                    Some((id, false)) => {
                        if tv.focused() == Some(id.as_str()) {
                            let _ = tv.toggle_collapse(&id, false);
                        } else {
                            tv.focus(&id, now);
                        }
                    }
                    None => tv.viewport_mut().begin_drag(point),
                }
            }
            MouseEventKind::Drag(MouseButton::Left) => tv.viewport_mut().drag_to(point),
            MouseEventKind::Up(MouseButton::Left) => tv.viewport_mut().end_drag(),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockGenerator;
    use crate::model::{Goal, Node};
    use crossterm::event::KeyModifiers;
    use std::time::Duration;
    use tempfile::TempDir;

    fn node(id: &str, done: bool, children: Vec<Node>) -> Node {
        Node {
            id: id.to_string(),
            title: format!("Title {}", id),
            description: String::new(),
            children,
            done,
        }
    }

    fn sample() -> AppData {
        let mut data = AppData::default();
        data.goals.push(Goal {
            root: node("g", false, vec![node("a", false, vec![node("a1", false, vec![])])]),
            created_at: String::new(),
            week: None,
            duration: None,
            tags: vec![],
        });
        data
    }

    fn app(dir: &TempDir, goal: Option<&str>) -> App {
        let store = Store::open(dir.path().join("goals.json"), None, Duration::from_secs(300));
        let assistant: Arc<Assistant<Box<dyn TaskGenerator>>> =
            Arc::new(Assistant::new(Box::new(MockGenerator) as Box<dyn TaskGenerator>));
        let mut app = App::with_assistant(store, Config::default(), sample(), assistant, None, Instant::now());
        app.resize(120, 40);
        if let Some(id) = goal {
            app.open_goal(id, Instant::now());
        }
        app
    }

    fn type_text(app: &mut App, text: &str, now: Instant) {
        for c in text.chars() {
            app.update(Msg::Input(c), now);
        }
    }

    fn focus(app: &mut App, id: &str, now: Instant) {
        if let Screen::Tree(tv) = &mut app.screen {
            tv.focus(id, now);
        }
    }

    #[test]
    fn test_unknown_goal_shows_not_found() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir, Some("missing"));
        assert!(matches!(app.screen, Screen::NotFound(ref id) if id == "missing"));
        assert_eq!(app.key_context().screen, ScreenKind::NotFound);
        app.update(Msg::Back, Instant::now());
        assert!(matches!(app.screen, Screen::Picker));
    }

    #[test]
    fn test_open_from_picker() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir, None);
        app.update(Msg::PickerDown, Instant::now());
        assert_eq!(app.picker_selected, 0);
        app.update(Msg::OpenSelected, Instant::now());
        assert_eq!(app.tree().map(|t| t.goal_id()), Some("g"));
    }

    #[test]
    fn test_add_child_through_dialog() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir, Some("g"));
        let now = Instant::now();
        focus(&mut app, "a", now);

        app.update(Msg::AddChild, now);
        assert_eq!(app.key_context().dialog, Some(DialogKind::Input));

        // empty title is rejected inline
        app.update(Msg::Submit, now);
        match &app.dialog {
            Some(Dialog::Input(d)) => assert!(d.error.is_some()),
            other => panic!("unexpected dialog {:?}", other),
        }

        type_text(&mut app, "Buy shoes", now);
        app.update(Msg::Submit, now);
        assert!(app.dialog.is_none());
        let a = crate::tree::find(&app.data.goals[0].root, "a").unwrap();
        assert_eq!(a.children.last().unwrap().title, "Buy shoes");

        // persisted
        let saved = std::fs::read_to_string(dir.path().join("goals.json")).unwrap();
        assert!(saved.contains("Buy shoes"));
    }

    #[test]
    fn test_toggle_done_refused_shows_toast() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir, Some("g"));
        let now = Instant::now();
        focus(&mut app, "a", now);
        app.update(Msg::ToggleDone, now);
        assert!(app.tree().unwrap().toast().is_some());
        assert!(!crate::tree::find(&app.data.goals[0].root, "a").unwrap().done);
        assert!(!dir.path().join("goals.json").exists());
    }

    #[test]
    fn test_delete_requires_confirmation() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir, Some("g"));
        let now = Instant::now();
        focus(&mut app, "a", now);

        app.update(Msg::DeleteNode, now);
        assert_eq!(app.key_context().dialog, Some(DialogKind::Confirm));
        app.update(Msg::Cancel, now);
        assert!(crate::tree::find(&app.data.goals[0].root, "a").is_some());

        app.update(Msg::DeleteNode, now);
        app.update(Msg::Submit, now);
        assert!(crate::tree::find(&app.data.goals[0].root, "a").is_none());
        assert_eq!(app.tree().unwrap().focused(), Some("g"));
    }

    #[test]
    fn test_deleting_goal_returns_to_picker() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir, Some("g"));
        let now = Instant::now();
        app.update(Msg::FocusRoot, now);
        app.update(Msg::DeleteNode, now);
        app.update(Msg::Submit, now);
        assert!(matches!(app.screen, Screen::Picker));
        assert!(app.data.goals.is_empty());
    }

    #[test]
    fn test_generation_reply_applies_and_closes_dialog() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir, Some("g"));
        let now = Instant::now();
        focus(&mut app, "a1", now);

        app.update(Msg::Generate, now);
        app.update(Msg::Backspace, now);
        type_text(&mut app, "2", now);
        app.update(Msg::Submit, now);
        let request = match &app.dialog {
            Some(Dialog::Input(d)) => d.waiting.clone().unwrap(),
            other => panic!("unexpected dialog {:?}", other),
        };
        // input is frozen while waiting
        app.update(Msg::Input('9'), now);

        let reply = app.ai_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(reply.request, request);
        app.apply_ai_reply(reply, now);
        assert!(app.dialog.is_none());
        let a1 = crate::tree::find(&app.data.goals[0].root, "a1").unwrap();
        assert_eq!(a1.children.len(), 2);
        assert!(a1.children[0].title.starts_with("Step 1"));
    }

    #[test]
    fn test_cancelled_generation_is_ignored() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir, Some("g"));
        let now = Instant::now();
        focus(&mut app, "a1", now);

        app.update(Msg::Generate, now);
        app.update(Msg::Submit, now);
        app.update(Msg::Cancel, now);
        assert!(app.dialog.is_none());

        let reply = app.ai_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        app.apply_ai_reply(reply, now);
        let a1 = crate::tree::find(&app.data.goals[0].root, "a1").unwrap();
        assert!(a1.children.is_empty());
    }

    #[test]
    fn test_invalid_count_is_inline_error() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir, Some("g"));
        let now = Instant::now();
        focus(&mut app, "a", now);
        app.update(Msg::Generate, now);
        app.update(Msg::Backspace, now);
        type_text(&mut app, "0", now);
        app.update(Msg::Submit, now);
        match &app.dialog {
            Some(Dialog::Input(d)) => {
                assert!(d.error.is_some());
                assert!(d.waiting.is_none());
            }
            other => panic!("unexpected dialog {:?}", other),
        }
    }

    #[test]
    fn test_new_goal_opens_tree() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir, None);
        let now = Instant::now();
        app.update(Msg::NewGoal, now);
        type_text(&mut app, "Learn piano", now);
        app.update(Msg::Submit, now);
        assert_eq!(app.data.goals.len(), 2);
        assert_eq!(app.tree().map(|t| t.view().title.as_str()), Some("Learn piano"));
        assert_eq!(app.picker_selected, 1);
    }

    #[test]
    fn test_reload_keeps_flags_and_detects_removal() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir, Some("g"));
        let now = Instant::now();
        focus(&mut app, "a", now);
        app.update(Msg::Nav(crate::tree_view::NavKey::Space), now);

        // another process renames a node
        let mut external = app.data.clone();
        external.goals[0].root.children[0].title = "Renamed".into();
        std::fs::write(dir.path().join("goals.json"), serde_json::to_string(&external).unwrap()).unwrap();
        app.reload(now);
        let view = app.tree().unwrap().view().find("a").unwrap();
        assert_eq!(view.title, "Renamed");
        assert!(view.collapsed);

        // and then deletes the goal
        external.goals.clear();
        std::fs::write(dir.path().join("goals.json"), serde_json::to_string(&external).unwrap()).unwrap();
        app.reload(now);
        assert!(matches!(app.screen, Screen::NotFound(_)));
    }

    #[test]
    fn test_mouse_click_focuses_and_wheel_zooms() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir, Some("g"));
        let now = Instant::now();
        let root = app.tree().unwrap().layout().get("g").unwrap().rect().center();
        let screen = app.tree().unwrap().viewport().to_screen(root);
        let column = (screen.x / CELL_WIDTH) as u16;
        let row = (screen.y / CELL_HEIGHT) as u16 + app.canvas.y;

        let click = MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column,
            row,
            modifiers: KeyModifiers::NONE,
        };
        app.update(Msg::Mouse(click), now);
        assert_eq!(app.tree().unwrap().focused(), Some("g"));

        let before = app.tree().unwrap().viewport().scale();
        let wheel = MouseEvent {
            kind: MouseEventKind::ScrollUp,
            column,
            row,
            modifiers: KeyModifiers::NONE,
        };
        app.update(Msg::Mouse(wheel), now);
        assert!(app.tree().unwrap().viewport().scale() > before);
    }

    #[test]
    fn test_cell_to_point_bounds() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir, None);
        assert_eq!(app.cell_to_point(0, 0), None);
        assert_eq!(app.cell_to_point(0, 1), Some(Point::new(4.0, 8.0)));
        assert_eq!(app.cell_to_point(120, 5), None);
    }

    #[test]
    fn test_reply_from_closed_view_is_dropped_after_reopen() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir, Some("g"));
        let now = Instant::now();

        let waiting = |app: &App| match &app.dialog {
            Some(Dialog::Input(d)) => d.waiting.clone().unwrap(),
            other => panic!("unexpected dialog {:?}", other),
        };

        focus(&mut app, "a1", now);
        app.update(Msg::Generate, now);
        app.update(Msg::Submit, now);
        let old = waiting(&app);

        app.update(Msg::Back, now);
        app.open_goal("g", now);
        focus(&mut app, "a1", now);
        app.update(Msg::Generate, now);
        app.update(Msg::Submit, now);
        let new = waiting(&app);
        assert_ne!(old.ticket, new.ticket);

        let mut replies = vec![
            app.ai_rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            app.ai_rx.recv_timeout(Duration::from_secs(5)).unwrap(),
        ];
        let i = replies.iter().position(|r| r.request == old).unwrap();
        let old_reply = replies.remove(i);

        app.apply_ai_reply(old_reply, now);
        assert!(crate::tree::find(&app.data.goals[0].root, "a1").unwrap().children.is_empty());
        assert_eq!(waiting(&app), new);

        app.apply_ai_reply(replies.remove(0), now);
        assert!(app.dialog.is_none());
        assert_eq!(crate::tree::find(&app.data.goals[0].root, "a1").unwrap().children.len(), 3);
    }

    /// Remote whose pushes wait for the test to release them
    #[derive(Default)]
    struct SlowRemote {
        gate: Option<std::sync::Mutex<mpsc::Receiver<()>>>,
        pushes: Arc<std::sync::Mutex<usize>>,
        fail_pull: bool,
    }

    impl crate::store::RemoteStore for SlowRemote {
        fn pull(&self) -> crate::store::Result<Option<String>> {
            if self.fail_pull {
                return Err(StoreError::Remote {
                    message: "offline".into(),
                });
            }
            Ok(None)
        }

        fn push(&self, _contents: &str) -> crate::store::Result<()> {
            if let Some(gate) = &self.gate {
                let _ = gate.lock().unwrap().recv();
            }
            *self.pushes.lock().unwrap() += 1;
            Ok(())
        }
    }

    #[test]
    fn test_remote_push_does_not_block_edits() {
        let dir = TempDir::new().unwrap();
        let (release, gate) = mpsc::channel();
        let remote = SlowRemote {
            gate: Some(std::sync::Mutex::new(gate)),
            ..Default::default()
        };
        let pushes = remote.pushes.clone();
        let store = Store::open(dir.path().join("goals.json"), Some(Box::new(remote)), Duration::from_secs(300));
        let assistant: Arc<Assistant<Box<dyn TaskGenerator>>> =
            Arc::new(Assistant::new(Box::new(MockGenerator) as Box<dyn TaskGenerator>));
        let mut app = App::with_assistant(store, Config::default(), sample(), assistant, Some("g"), Instant::now());
        let now = Instant::now();

        focus(&mut app, "a1", now);
        app.update(Msg::ToggleDone, now);
        // the local write landed while the push is still held back
        assert!(dir.path().join("goals.json").exists());
        assert_eq!(*pushes.lock().unwrap(), 0);

        release.send(()).unwrap();
        let outcome = app.sync_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(outcome, RemoteOutcome::Flushed);
        assert_eq!(*pushes.lock().unwrap(), 1);
    }

    #[test]
    fn test_failed_pull_never_pushes_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("goals.json");
        let remote = SlowRemote {
            fail_pull: true,
            ..Default::default()
        };
        let pushes = remote.pushes.clone();
        let store = Store::open(&path, Some(Box::new(remote)), Duration::from_secs(300));
        let mut app = App::new(store, Config::default(), None, Instant::now()).unwrap();
        assert!(app.data.goals.is_empty());

        app.ensure_data_file().unwrap();
        assert!(path.exists());
        app.shutdown();
        assert_eq!(*pushes.lock().unwrap(), 0);
    }
}
