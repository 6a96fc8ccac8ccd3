use std::fs::{self, OpenOptions};
use std::sync::Mutex;

use anyhow::{Context, Result};
use careerbot_core::{Config, FileTokenStorage, SessionEvent};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod app;
mod handler;
mod tui;
mod ui;

use app::App;
use tui::{AppEvent, EventHandler};

const LOG_ENV: &str = "CAREERBOT_LOG";
const DEFAULT_LOG_FILTER: &str = "careerbot=info,careerbot_core=info";

enum Next {
    App(Option<AppEvent>),
    Session(Option<SessionEvent>),
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;

    let config = Config::load().unwrap_or_else(|e| {
        warn!(error = %e, "could not read config, using defaults");
        Config::new()
    });
    let storage = FileTokenStorage::new(Config::token_path()?);
    info!(api_url = %config.api_url(), "starting careerbot");

    let mut app = App::new(config, Box::new(storage))?;

    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let result = run(&mut terminal, &mut app).await;

    app.shutdown();
    tui::restore()?;
    result
}

async fn run(terminal: &mut tui::Tui, app: &mut App) -> Result<()> {
    let mut events = EventHandler::new();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        let next = tokio::select! {
            event = events.next() => Next::App(event),
            event = app::next_session_event(app.session_rx.as_mut()) => Next::Session(event),
        };

        match next {
            Next::App(Some(event)) => handler::handle_event(app, event).await?,
            Next::App(None) => break,
            Next::Session(Some(event)) => app.on_session_event(event),
            Next::Session(None) => {}
        }
    }

    Ok(())
}

/// Logs go to a file: the terminal belongs to the UI.
fn init_logging() -> Result<()> {
    let Some(data_dir) = dirs::data_dir() else {
        return Ok(());
    };
    let log_dir = data_dir.join("careerbot");
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("creating {}", log_dir.display()))?;
    let log_path = log_dir.join("careerbot.log");
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("opening {}", log_path.display()))?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .init();

    Ok(())
}
