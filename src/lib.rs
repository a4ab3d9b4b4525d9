//! goaltree - Personal goal tracking with hierarchical task trees
//!
//! Break goals into subtasks, schedule them by ISO week, and explore the
//! result as a pannable, zoomable tree.
//!
//! # Overview
//!
//! Each goal is the root of a tree of tasks. A goal and every task carry a
//! `done` flag; a node can only be marked done once everything under it is.
//! [`GoalTreeView`] is the engine behind the tree view: it projects a goal
//! into a view tree with collapse/minimize flags, lays it out, and owns the
//! viewport and keyboard focus.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`model`] | Goals, tasks, tags and the persisted document |
//! | [`tree_view`] | Projection, layout, viewport, navigation and mutations |
//! | [`store`] | Local JSON file with an optional remote mirror |
//! | [`ai`] | Subtask generation and description enhancement |
//! | [`tui`] | Full-screen terminal interface |
//!
//! # Quick Start
//!
//! ```no_run
//! use goaltree::{AppData, Config, GoalTreeView, NewGoal, Store};
//!
//! let config = Config::load();
//! let mut store = Store::from_config(&config);
//! let mut data = store.load().unwrap();
//!
//! let goal_id = data
//!     .add_goal(NewGoal { title: "Run a marathon".into(), ..Default::default() })
//!     .unwrap();
//!
//! let mut view = GoalTreeView::open(&data, &goal_id, &config, 1200.0, 800.0).unwrap();
//! view.add_child(&mut data, &goal_id, "Buy shoes", "").unwrap();
//! store.save(&data, false).unwrap();
//! ```

pub mod ai;
pub mod config;
pub mod init;
pub mod model;
pub mod store;
pub mod tree;
pub mod tree_view;
pub mod tui;
pub mod week;

pub use config::Config;
pub use model::{AppData, Goal, NewGoal, Node, Tag};
pub use store::{Store, StoreError};
pub use tree_view::{EditError, GoalTreeView};
pub use week::IsoWeekId;
