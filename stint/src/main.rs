use anyhow::{Context, Result};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use stint_ipc::SOCKET_PATH;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod app;
mod config;
mod ipc;
mod ledger;
mod persistence;
mod refresh;
mod ui;

use app::{App, AppMode};
use config::Config;
use ipc::IpcRequest;
use ledger::{SystemClock, TimerLedger};
use persistence::{FileStore, MemoryStore, SnapshotStore};
use refresh::RefreshLoop;

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::load_config()?;
    init_tracing(&config);

    // Claim the socket before touching stored state; a live instance owns both.
    let socket_path = Path::new(SOCKET_PATH);
    let listener = ipc::server::bind(socket_path).await?;

    let ledger = open_ledger(&config)?;
    let mut app = App::new(ledger, config);

    let (ipc_tx, ipc_rx) = mpsc::channel(16);
    let server = tokio::spawn(ipc::server::serve(listener, ipc_tx));

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app, spawn_input_reader(), ipc_rx).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    server.abort();
    let _ = fs::remove_file(socket_path);
    info!("stint exiting");

    if let Err(err) = res {
        eprintln!("Error: {:?}", err);
    }

    Ok(())
}

fn init_tracing(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let log_file = persistence::data_dir().ok().and_then(|dir| {
        fs::create_dir_all(&dir).ok()?;
        let path = dir.join("stint.log");
        let file = OpenOptions::new().create(true).append(true).open(&path).ok()?;
        Some((path, file))
    });

    match log_file {
        Some((path, file)) => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .with(env_filter)
                .init();
            info!(path = %path.display(), "Logging initialized");
        }
        // Without a log file, stay silent rather than write over the TUI.
        None => tracing_subscriber::registry().with(env_filter).init(),
    }
}

fn open_ledger(config: &Config) -> Result<TimerLedger> {
    let store: Box<dyn SnapshotStore> = if config.storage.ephemeral {
        info!("using in-memory storage");
        Box::new(MemoryStore::new())
    } else {
        let store = match &config.storage.path {
            Some(path) => FileStore::new(path),
            None => FileStore::default_location().context("Could not locate state file")?,
        };
        info!(path = %store.path().display(), "using file storage");
        Box::new(store)
    };

    Ok(TimerLedger::open(Box::new(SystemClock), store))
}

/// Forwards terminal events from a blocking reader thread. The thread exits
/// once the receiver is dropped.
fn spawn_input_reader() -> mpsc::UnboundedReceiver<Event> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || loop {
        if tx.is_closed() {
            break;
        }
        match event::poll(Duration::from_millis(100)) {
            Ok(true) => match event::read() {
                Ok(event) => {
                    if tx.send(event).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "failed to read terminal event");
                    break;
                }
            },
            Ok(false) => {}
            Err(e) => {
                warn!(error = %e, "failed to poll terminal events");
                break;
            }
        }
    });
    rx
}

async fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    mut input: mpsc::UnboundedReceiver<Event>,
    mut ipc: mpsc::Receiver<IpcRequest>,
) -> Result<()> {
    let mut refresh = RefreshLoop::new(Duration::from_millis(app.config.refresh.interval_ms));

    loop {
        // The display only needs ticks while a segment is open.
        refresh.sync(app.ledger.is_running());
        terminal.draw(|f| ui::draw(f, app))?;

        if app.should_quit {
            break;
        }

        tokio::select! {
            _ = refresh.tick() => {}
            event = input.recv() => match event {
                Some(Event::Key(key)) if key.kind == KeyEventKind::Press => handle_key(app, key),
                Some(_) => {}
                None => anyhow::bail!("terminal input closed"),
            },
            Some(request) = ipc.recv() => {
                let response = app.handle_command(request.command);
                let _ = request.reply.send(response);
            }
        }
    }

    refresh.stop();
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    match app.mode {
        AppMode::Normal => match key.code {
            KeyCode::Char('q') => app.should_quit = true,
            KeyCode::Char(' ') => app.toggle_timer(),
            KeyCode::Char('r') => app.request_reset(),
            KeyCode::Char('d') => app.delete_selected_interval(),
            KeyCode::Char('c') => app.begin_edit_comment(),
            KeyCode::Char('s') => app.begin_edit_start(),
            KeyCode::Char('e') => app.begin_edit_end(),
            KeyCode::Char('?') => app.mode = AppMode::ShowHelp,
            KeyCode::Up | KeyCode::Char('k') => app.move_selection_up(),
            KeyCode::Down | KeyCode::Char('j') => app.move_selection_down(),
            KeyCode::Esc => app.message = None,
            _ => {}
        },
        AppMode::EditingComment(_) | AppMode::EditingStart(_) | AppMode::EditingEnd(_) => {
            match key.code {
                KeyCode::Esc => app.cancel_input(),
                KeyCode::Enter => app.handle_char('\n'),
                KeyCode::Backspace => app.handle_backspace(),
                KeyCode::Char(c) => app.handle_char(c),
                _ => {}
            }
        }
        AppMode::ConfirmReset => match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => app.confirm_reset(true),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => app.confirm_reset(false),
            _ => {}
        },
        AppMode::ShowHelp => match key.code {
            KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q') => app.mode = AppMode::Normal,
            _ => {}
        },
    }
}
