//! Configuration file support for goaltree
//!
//! Reads from .goaltree/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration structure
#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq)]
pub struct Config {
    /// Tree layout constants
    #[serde(default)]
    pub layout: LayoutConfig,

    /// Pan/zoom/fit behavior
    #[serde(default)]
    pub viewport: ViewportConfig,

    /// Remote mirroring
    #[serde(default)]
    pub sync: SyncConfig,

    /// Subtask generation and description enhancement
    #[serde(default)]
    pub ai: AiConfig,
}

/// Geometry of the tree layout, in virtual pixels
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct LayoutConfig {
    /// Horizontal slot reserved per node, spacing included
    pub unit_node_width: f64,
    /// Drawn width of a node box
    pub node_width: f64,
    /// Drawn height of a node box
    pub node_height: f64,
    /// Vertical distance between the tops of two levels
    pub level_height: f64,
    /// Slot width of a minimized stub in the lane under its parent
    pub minimized_slot_width: f64,
    pub minimized_slot_height: f64,
    /// Gap between a parent's bottom edge and its minimized lane
    pub minimized_lane_gap: f64,
    /// Top margin above the root node
    pub top_margin: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            unit_node_width: 250.0,
            node_width: 200.0,
            node_height: 80.0,
            level_height: 150.0,
            minimized_slot_width: 48.0,
            minimized_slot_height: 32.0,
            minimized_lane_gap: 16.0,
            top_margin: 40.0,
        }
    }
}

/// Viewport limits and timings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct ViewportConfig {
    pub min_scale: f64,
    pub max_scale: f64,
    /// Button zoom increment
    pub zoom_step: f64,
    pub wheel_debounce_ms: u64,
    pub fit_min_scale: f64,
    pub fit_max_scale: f64,
    /// Padding around the fitted box, as a fraction of the viewport size
    pub fit_padding_ratio: f64,
    pub fit_min_padding: f64,
    /// How many levels below the root fit-to-screen considers
    pub fit_depth: usize,
    pub fit_transition_ms: u64,
    pub focus_scale: f64,
    /// Delay before re-centering on a node after keyboard navigation
    pub navigation_settle_ms: u64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            min_scale: 0.1,
            max_scale: 2.0,
            zoom_step: 0.05,
            wheel_debounce_ms: 150,
            fit_min_scale: 0.4,
            fit_max_scale: 0.9,
            fit_padding_ratio: 0.15,
            fit_min_padding: 40.0,
            fit_depth: 2,
            fit_transition_ms: 800,
            focus_scale: 0.85,
            navigation_settle_ms: 50,
        }
    }
}

impl ViewportConfig {
    pub fn wheel_debounce(&self) -> Duration {
        Duration::from_millis(self.wheel_debounce_ms)
    }

    pub fn fit_transition(&self) -> Duration {
        Duration::from_millis(self.fit_transition_ms)
    }

    pub fn navigation_settle(&self) -> Duration {
        Duration::from_millis(self.navigation_settle_ms)
    }
}

/// Remote document settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    /// Gist that mirrors the data file. No remote sync when unset.
    pub gist_id: Option<String>,
    /// File name inside the gist
    pub filename: String,
    /// Minimum time between unforced remote flushes
    pub flush_interval_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            gist_id: None,
            filename: "goals.json".to_string(),
            flush_interval_secs: 300,
        }
    }
}

impl SyncConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }
}

/// Text generation settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct AiConfig {
    /// Shell command that reads a prompt on stdin and answers on stdout.
    /// The deterministic generator is used when unset.
    pub command: Option<String>,
    pub default_subtask_count: usize,
    /// Largest count a generation request may ask for
    pub max_subtask_count: usize,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            command: None,
            default_subtask_count: 3,
            max_subtask_count: 20,
        }
    }
}

impl Config {
    /// Load config from .goaltree/config.toml
    /// Returns default config if file doesn't exist
    pub fn load() -> Self {
        if let Some(path) = Self::find_config_path() {
            if let Ok(contents) = std::fs::read_to_string(&path) {
                match toml::from_str(&contents) {
                    Ok(config) => return config,
                    Err(e) => tracing::warn!(path = %path.display(), "ignoring invalid config: {e}"),
                }
            }
        }
        Self::default()
    }

    /// Find config.toml by walking up directory tree
    fn find_config_path() -> Option<PathBuf> {
        let current_dir = std::env::current_dir().ok()?;
        let mut dir = current_dir.as_path();

        loop {
            let config_path = dir.join(".goaltree").join("config.toml");
            if config_path.exists() {
                return Some(config_path);
            }

            match dir.parent() {
                Some(parent) => dir = parent,
                None => break,
            }
        }
        None
    }
}

/// Location of the data file: `GOALTREE_DATA_PATH`, else the nearest
/// `.goaltree/goals.json` walking up, else `.goaltree/goals.json` here.
pub fn data_path() -> PathBuf {
    if let Ok(path) = std::env::var("GOALTREE_DATA_PATH") {
        return PathBuf::from(path);
    }

    if let Ok(current_dir) = std::env::current_dir() {
        let mut dir = current_dir.as_path();
        loop {
            let goaltree_dir = dir.join(".goaltree");
            if goaltree_dir.is_dir() {
                return goaltree_dir.join("goals.json");
            }
            match dir.parent() {
                Some(parent) => dir = parent,
                None => break,
            }
        }
    }

    PathBuf::from(".goaltree/goals.json")
}
