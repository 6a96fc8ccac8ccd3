use std::io::{self, Stderr};
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{
        DisableMouseCapture, EnableMouseCapture, Event, EventStream, KeyEvent, KeyEventKind,
        MouseEvent,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures_util::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

pub type Tui = Terminal<CrosstermBackend<Stderr>>;

/// Drives the "Thinking" dots and the auth request poll.
const TICK_RATE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    Key(KeyEvent),
    Mouse(MouseEvent),
    /// The layout is recomputed on every draw; a resize only wakes the loop.
    Resize,
    Tick,
}

/// Terminal input and the tick, merged into one channel. The reader tasks
/// stop when the handler is dropped.
pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<AppEvent>,
    tasks: [JoinHandle<()>; 2],
}

impl EventHandler {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        let input_tx = tx.clone();
        let input = tokio::spawn(async move {
            let mut reader = EventStream::new();
            while let Some(read) = reader.next().await {
                let event = match read {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(error = %e, "terminal read failed");
                        continue;
                    }
                };
                if let Some(event) = translate(event) {
                    if input_tx.send(event).is_err() {
                        break;
                    }
                }
            }
        });

        let tick = tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK_RATE);
            while tx.send(AppEvent::Tick).is_ok() {
                interval.tick().await;
            }
        });

        Self {
            rx,
            tasks: [input, tick],
        }
    }

    pub async fn next(&mut self) -> Option<AppEvent> {
        self.rx.recv().await
    }
}

impl Drop for EventHandler {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Key releases and focus or paste events are of no interest to the app.
fn translate(event: Event) -> Option<AppEvent> {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => Some(AppEvent::Key(key)),
        Event::Mouse(mouse) => Some(AppEvent::Mouse(mouse)),
        Event::Resize(_, _) => Some(AppEvent::Resize),
        _ => None,
    }
}

pub fn init() -> Result<Tui> {
    enable_raw_mode().context("enabling raw mode")?;
    // Mouse capture feeds wheel scrolling in the chat
    execute!(io::stderr(), EnterAlternateScreen, EnableMouseCapture)
        .context("entering alternate screen")?;
    Terminal::new(CrosstermBackend::new(io::stderr())).context("creating terminal")
}

pub fn restore() -> Result<()> {
    execute!(io::stderr(), DisableMouseCapture, LeaveAlternateScreen)
        .context("leaving alternate screen")?;
    disable_raw_mode().context("disabling raw mode")?;
    Ok(())
}

/// Puts the terminal back before the default hook prints the panic.
pub fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = restore();
        original_hook(panic_info);
    }));
}
