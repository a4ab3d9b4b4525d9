//! Project initialization for goaltree
//!
//! Creates `.goaltree/` with a commented config file and an empty goals file.

use colored::Colorize;
use std::fs;
use std::path::Path;

use crate::model::AppData;

const CONFIG_TOML: &str = r#"# goaltree configuration
# Every key is optional; the values below are the defaults.

[layout]
unit_node_width = 250.0
node_width = 200.0
node_height = 80.0
level_height = 150.0
minimized_slot_width = 48.0
minimized_slot_height = 32.0
minimized_lane_gap = 16.0
top_margin = 40.0

[viewport]
min_scale = 0.1
max_scale = 2.0
zoom_step = 0.05
wheel_debounce_ms = 150
fit_min_scale = 0.4
fit_max_scale = 0.9
fit_padding_ratio = 0.15
fit_min_padding = 40.0
fit_depth = 2
fit_transition_ms = 800
focus_scale = 0.85
navigation_settle_ms = 50

[sync]
# gist_id = "your-gist-id"
filename = "goals.json"
flush_interval_secs = 300

[ai]
# command = "llm -m gpt-4o-mini"
default_subtask_count = 3
max_subtask_count = 20
"#;

const GITIGNORE_ENTRY: &str = ".goaltree/goaltree.log";

/// Initialize goaltree in `dir`. Existing files are left alone.
pub fn init_project(dir: &Path) -> Result<(), String> {
    println!("\n{}", "Initializing goaltree...".cyan().bold());
    println!("   Directory: {}\n", dir.display());

    let goaltree_dir = dir.join(".goaltree");
    create_dir_if_missing(&goaltree_dir)?;

    write_file_if_missing(&goaltree_dir.join("config.toml"), CONFIG_TOML, ".goaltree/config.toml")?;

    let empty = serde_json::to_string_pretty(&AppData::default())
        .map_err(|e| format!("Could not serialize goals: {}", e))?;
    write_file_if_missing(&goaltree_dir.join("goals.json"), &empty, ".goaltree/goals.json")?;

    add_to_gitignore(dir)?;

    println!("\n{}", "goaltree initialized!".green().bold());
    println!("\nNext steps:");
    println!("  1. Add a goal with {}", "goaltree add-goal \"Learn Rust\"".cyan());
    println!("  2. Open it with {}", "goaltree tui".cyan());
    println!();

    Ok(())
}

fn create_dir_if_missing(path: &Path) -> Result<(), String> {
    if !path.exists() {
        fs::create_dir_all(path).map_err(|e| format!("Could not create {}: {}", path.display(), e))?;
        println!("   {} {}", "Creating".green(), path.display());
    }
    Ok(())
}

fn write_file_if_missing(path: &Path, content: &str, display_name: &str) -> Result<(), String> {
    if path.exists() {
        println!("   {} {} (already exists)", "Skipping".yellow(), display_name);
    } else {
        fs::write(path, content).map_err(|e| format!("Could not write {}: {}", display_name, e))?;
        println!("   {} {}", "Creating".green(), display_name);
    }
    Ok(())
}

/// Keep the TUI log out of version control; the goals file is meant to be shared
fn add_to_gitignore(dir: &Path) -> Result<(), String> {
    let gitignore_path = dir.join(".gitignore");

    if gitignore_path.exists() {
        let existing =
            fs::read_to_string(&gitignore_path).map_err(|e| format!("Could not read .gitignore: {}", e))?;
        if existing.lines().any(|line| line.trim() == GITIGNORE_ENTRY) {
            return Ok(());
        }
        let new_content = format!("{}\n\n# goaltree log\n{}\n", existing.trim_end(), GITIGNORE_ENTRY);
        fs::write(&gitignore_path, new_content).map_err(|e| format!("Could not update .gitignore: {}", e))?;
        println!("   {} .gitignore (added {})", "Updated".green(), GITIGNORE_ENTRY);
    } else {
        let content = format!("# goaltree log\n{}\n", GITIGNORE_ENTRY);
        fs::write(&gitignore_path, content).map_err(|e| format!("Could not create .gitignore: {}", e))?;
        println!("   {} .gitignore", "Creating".green());
    }

    Ok(())
}
