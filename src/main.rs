use std::fs::OpenOptions;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use goaltree::ai::{Assistant, TaskGenerator};
use goaltree::model::{AppData, Goal, NewGoal, Node};
use goaltree::store::RemoteOutcome;
use goaltree::tree_view::DeleteOutcome;
use goaltree::{Config, GoalTreeView, IsoWeekId, Store};
use tracing_subscriber::EnvFilter;

/// Canvas size used when the engine runs headless
const HEADLESS_WIDTH: f64 = 1200.0;
const HEADLESS_HEIGHT: f64 = 800.0;

#[derive(Parser, Debug)]
#[command(name = "goaltree")]
#[command(author, version, about = "Personal goal tracking with hierarchical task trees")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create .goaltree/ with a config file and an empty goals file
    Init,

    /// List all goals with progress, schedule and tags
    Goals,

    /// Create a new goal
    AddGoal {
        title: String,

        #[arg(short, long, default_value = "")]
        description: String,

        /// Starting ISO week, e.g. 2025-W10
        #[arg(long)]
        week: Option<String>,

        /// Number of weeks the goal spans
        #[arg(long)]
        duration: Option<u32>,

        /// Tag name (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Add a subtask under a goal or task
    Add {
        parent: String,
        title: String,

        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// Change a node's title or description
    Edit {
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        description: Option<String>,
    },

    /// Toggle a node's done state
    Done { id: String },

    /// Delete a node and everything under it
    Rm {
        id: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Print a goal's tree
    Show { goal: String },

    /// Generate subtasks for a node
    Generate {
        parent: String,

        /// How many subtasks (defaults to ai.default_subtask_count)
        #[arg(short = 'n', long)]
        count: Option<i64>,
    },

    /// Rewrite a node's description as a summary with topics
    Enhance {
        id: String,

        /// Save the result instead of printing it
        #[arg(long)]
        apply: bool,
    },

    /// List registered tags
    Tags,

    /// Register a tag
    TagAdd {
        name: String,

        #[arg(long, default_value = "gray")]
        color: String,

        #[arg(long)]
        hot: bool,
    },

    /// Toggle a tag's hot marker
    TagHot { name: String },

    /// List goals scheduled in a week (default: this week)
    Week { week: Option<String> },

    /// Push the goals file to the configured remote now
    Sync,

    /// Open the terminal UI, optionally straight into one goal
    Tui { goal: Option<String> },

    /// Print shell completions
    Completion { shell: Shell },
}

fn main() {
    let cli = Cli::parse();

    let log_file = match &cli.command {
        Command::Tui { .. } => goaltree::config::data_path()
            .parent()
            .map(|dir| dir.join("goaltree.log")),
        _ => None,
    };
    init_logging(log_file.as_deref());
    // after logging, so a broken config.toml gets reported
    let config = Config::load();

    let result = match cli.command {
        Command::Init => std::env::current_dir()
            .map_err(|e| e.to_string())
            .and_then(|dir| goaltree::init::init_project(&dir)),
        Command::Tui { goal } => goaltree::tui::run(config, goal).map_err(|e| e.to_string()),
        Command::Completion { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "goaltree", &mut io::stdout());
            Ok(())
        }
        command => run(command, &config),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// Logs go to stderr, or to a file when the terminal belongs to the TUI
fn init_logging(file: Option<&Path>) {
    let directives = std::env::var("GOALTREE_LOG").unwrap_or_else(|_| "goaltree=warn".to_string());
    let env_filter = EnvFilter::builder().parse_lossy(directives);
    let builder = tracing_subscriber::fmt().compact().with_env_filter(env_filter);

    let file = file.and_then(|path| {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok()?;
        }
        OpenOptions::new().create(true).append(true).open(path).ok()
    });
    match file {
        Some(file) => builder.with_writer(Mutex::new(file)).with_ansi(false).init(),
        None => builder.with_writer(io::stderr).init(),
    }
}

fn run(command: Command, config: &Config) -> Result<(), String> {
    let mut store = Store::from_config(config);
    let mut data = store.load().map_err(|e| e.to_string())?;

    let changed = match command {
        Command::Goals => {
            list_goals(&data, &data.goals.iter().collect::<Vec<_>>());
            false
        }
        Command::AddGoal {
            title,
            description,
            week,
            duration,
            tags,
        } => {
            let tags = tags
                .iter()
                .map(|name| resolve_tag(&data, name))
                .collect::<Result<Vec<_>, _>>()?;
            let id = data
                .add_goal(NewGoal {
                    title,
                    description,
                    week,
                    duration,
                    tags,
                })
                .map_err(|e| e.to_string())?;
            println!("{} goal {}", "Created".green(), id);
            true
        }
        Command::Add {
            parent,
            title,
            description,
        } => {
            let mut view = open_view(&data, &parent, config)?;
            let id = view
                .add_child(&mut data, &parent, &title, &description)
                .map_err(|e| e.to_string())?;
            println!("{} task {}", "Added".green(), id);
            true
        }
        Command::Edit { id, title, description } => {
            let mut view = open_view(&data, &id, config)?;
            let node = find_node(&data, &id)?;
            let title = title.unwrap_or_else(|| node.title.clone());
            let description = description.unwrap_or_else(|| node.description.clone());
            view.edit_node(&mut data, &id, &title, &description)
                .map_err(|e| e.to_string())?;
            println!("{} {}", "Updated".green(), id);
            true
        }
        Command::Done { id } => {
            let mut view = open_view(&data, &id, config)?;
            let done = view
                .toggle_done(&mut data, &id, Instant::now())
                .map_err(|e| e.to_string())?;
            if done {
                println!("{} {}", "Completed".green(), id);
            } else {
                println!("{} {}", "Reopened".yellow(), id);
            }
            true
        }
        Command::Rm { id, yes } => {
            let mut view = open_view(&data, &id, config)?;
            let title = find_node(&data, &id)?.title.clone();
            if !yes && !confirm(&format!("Delete '{}' and all its subtasks?", title))? {
                println!("Cancelled");
                return Ok(());
            }
            match view
                .delete_node(&mut data, &id, Instant::now())
                .map_err(|e| e.to_string())?
            {
                DeleteOutcome::GoalRemoved => println!("{} goal '{}'", "Deleted".red(), title),
                DeleteOutcome::Refocused(_) => println!("{} '{}'", "Deleted".red(), title),
            }
            true
        }
        Command::Show { goal } => {
            let goal = data
                .goal(&goal)
                .ok_or_else(|| format!("Goal {} not found", goal))?;
            print_tree(&goal.root, 0);
            false
        }
        Command::Generate { parent, count } => {
            let count = count.unwrap_or(config.ai.default_subtask_count as i64);
            let mut view = open_view(&data, &parent, config)?;
            let request = view
                .begin_generation(&data, &parent, count)
                .map_err(|e| e.to_string())?;
            let assistant = Assistant::<Box<dyn TaskGenerator>>::from_config(&config.ai);
            let tasks = assistant.generate_subtasks(&request.description, count as usize);
            let ids = view
                .finish_generation(&mut data, &request, Ok(tasks), Instant::now())
                .map_err(|e| e.to_string())?
                .unwrap_or_default();
            for id in &ids {
                if let Ok(node) = find_node(&data, id) {
                    println!("{} {} {}", "Added".green(), node.title, id.dimmed());
                }
            }
            !ids.is_empty()
        }
        Command::Enhance { id, apply } => {
            let mut view = open_view(&data, &id, config)?;
            let request = view.begin_enhancement(&data, &id).map_err(|e| e.to_string())?;
            let assistant = Assistant::<Box<dyn TaskGenerator>>::from_config(&config.ai);
            let text = assistant.enhance_description(&request.description);
            println!("{}", text);
            if apply {
                view.finish_enhancement(&mut data, &request, text, Instant::now())
                    .map_err(|e| e.to_string())?;
                println!("{} {}", "Updated".green(), id);
            }
            apply
        }
        Command::Tags => {
            for tag in &data.tags {
                let hot = if tag.is_hot { " hot".red().bold().to_string() } else { String::new() };
                println!("{:<12} {:<10} {}{}", tag.name, tag.color, tag.id.dimmed(), hot);
            }
            false
        }
        Command::TagAdd { name, color, hot } => {
            let id = data.add_tag(&name, &color, hot).map_err(|e| e.to_string())?;
            println!("{} tag {} ({})", "Created".green(), name, id);
            true
        }
        Command::TagHot { name } => {
            let id = resolve_tag(&data, &name)?;
            let hot = data.toggle_hot(&id).map_err(|e| e.to_string())?;
            println!("{} is {}", name, if hot { "hot".red() } else { "not hot".normal() });
            true
        }
        Command::Week { week } => {
            let week = match week {
                Some(w) => w.parse::<IsoWeekId>().map_err(|e| e.to_string())?,
                None => IsoWeekId::current(),
            };
            println!("{}", week.to_string().cyan().bold());
            list_goals(&data, &data.goals_in_week(week));
            false
        }
        Command::Sync => {
            if !store.has_remote() {
                return Err("No remote configured (set sync.gist_id in .goaltree/config.toml)".to_string());
            }
            let report = store.save(&data, true).map_err(|e| e.to_string())?;
            match report.remote {
                RemoteOutcome::Flushed => println!("{} {} goals", "Synced".green(), data.goals.len()),
                RemoteOutcome::Failed(msg) => return Err(msg),
                RemoteOutcome::Skipped => println!("Nothing to sync"),
            }
            false
        }
        Command::Init | Command::Tui { .. } | Command::Completion { .. } => false,
    };

    if changed {
        let report = store.save(&data, false).map_err(|e| e.to_string())?;
        if let RemoteOutcome::Failed(msg) = report.remote {
            eprintln!("{} remote sync failed: {}", "Warning:".yellow(), msg);
        }
    }
    Ok(())
}

/// Open the engine on whichever goal contains `node_id`
fn open_view(data: &AppData, node_id: &str, config: &Config) -> Result<GoalTreeView, String> {
    let goal = data
        .goal_containing(node_id)
        .ok_or_else(|| format!("Node {} not found", node_id))?;
    GoalTreeView::open(data, goal.id(), config, HEADLESS_WIDTH, HEADLESS_HEIGHT).map_err(|e| e.to_string())
}

fn find_node<'a>(data: &'a AppData, id: &str) -> Result<&'a Node, String> {
    data.goals
        .iter()
        .find_map(|g| goaltree::tree::find(&g.root, id))
        .ok_or_else(|| format!("Node {} not found", id))
}

/// Tags are addressed by name or id
fn resolve_tag(data: &AppData, name: &str) -> Result<String, String> {
    data.tags
        .iter()
        .find(|t| t.id == name || t.name.eq_ignore_ascii_case(name))
        .map(|t| t.id.clone())
        .ok_or_else(|| format!("Unknown tag '{}' (see `goaltree tags`)", name))
}

fn confirm(question: &str) -> Result<bool, String> {
    print!("{} [y/N] ", question);
    io::stdout().flush().map_err(|e| e.to_string())?;
    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .map_err(|e| e.to_string())?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn list_goals(data: &AppData, goals: &[&Goal]) {
    if goals.is_empty() {
        println!("No goals");
        return;
    }
    for goal in goals {
        let percent = (goal.progress() * 100.0).round() as u32;
        let percent = if percent == 100 {
            format!("{:>3}%", percent).green()
        } else {
            format!("{:>3}%", percent).yellow()
        };
        let week = goal.week.clone().unwrap_or_default();
        let tags: Vec<String> = data.tags_for(goal).map(|t| format!("#{}", t.name)).collect();
        println!(
            "{} {} {:<30} {} {}",
            goal.id().dimmed(),
            percent,
            goal.title(),
            week.cyan(),
            tags.join(" ").magenta()
        );
    }
}

fn print_tree(node: &Node, depth: usize) {
    let mark = if node.done { "[x]".green() } else { "[ ]".normal() };
    println!("{}{} {} {}", "  ".repeat(depth), mark, node.title, node.id.dimmed());
    for child in &node.children {
        print_tree(child, depth + 1);
    }
}
