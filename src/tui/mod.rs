//! Terminal user interface for goaltree
//!
//! - Goal picker listing every goal with progress, week and tags
//! - Tree view: the goal's tree on a pannable, zoomable canvas
//! - Background subtask generation with stale-reply protection
//! - Auto-refresh when the data file changes on disk

pub mod app;
pub mod msg;
pub mod ui;
pub mod views;

use std::io;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use crossterm::{
    event::{poll, read, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use notify::{Config as WatcherConfig, RecommendedWatcher, RecursiveMode, Watcher};
use ratatui::prelude::*;

use crate::config::Config;
use crate::store::Store;
use app::App;
use msg::{key_to_msg, Msg};

/// Run the TUI application, optionally opening one goal directly
pub fn run(config: Config, goal: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let store = Store::from_config(&config);
    let mut app = App::new(store, config, goal.as_deref(), Instant::now())?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app, ensuring cleanup happens even on error
    let result = run_app_inner(&mut terminal, &mut app);
    app.shutdown();

    // Restore terminal - this MUST run even if app fails
    let _ = disable_raw_mode();
    let _ = execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture);
    let _ = terminal.show_cursor();

    result
}

fn run_app_inner<B: Backend + std::io::Write>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> Result<(), Box<dyn std::error::Error>> {
    let size = terminal.size()?;
    app.update(Msg::Resize(size.width, size.height), Instant::now());

    // The watcher needs an existing file
    app.ensure_data_file()?;
    let data_path = app.data_path().to_path_buf();

    let (tx, rx) = mpsc::channel();
    let mut watcher = RecommendedWatcher::new(
        move |res: Result<notify::Event, notify::Error>| {
            if let Ok(event) = res {
                if event.kind.is_modify() || event.kind.is_create() {
                    let _ = tx.send(());
                }
            }
        },
        WatcherConfig::default(),
    )?;
    watcher.watch(&data_path, RecursiveMode::NonRecursive)?;

    run_event_loop(terminal, app, rx)
}

fn run_event_loop<B: Backend + std::io::Write>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    file_change_rx: mpsc::Receiver<()>,
) -> Result<(), Box<dyn std::error::Error>> {
    // short enough for the navigation settle delay
    let tick_rate = Duration::from_millis(25);
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        let timeout = tick_rate.saturating_sub(last_tick.elapsed());
        if poll(timeout)? {
            let msg = match read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    key_to_msg(key.code, key.modifiers, app.key_context())
                }
                Event::Mouse(mouse) => Msg::Mouse(mouse),
                Event::Resize(width, height) => Msg::Resize(width, height),
                _ => Msg::Noop,
            };
            if app.update(msg, Instant::now()) {
                return Ok(());
            }
        }

        // Drain file change notifications; our own saves produce them too
        if file_change_rx.try_iter().count() > 0 {
            app.reload(Instant::now());
        }

        app.poll_ai(Instant::now());
        app.poll_sync(Instant::now());

        if last_tick.elapsed() >= tick_rate {
            app.update(Msg::Tick, Instant::now());
            last_tick = Instant::now();
        }
    }
}
