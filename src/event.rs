use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind};
use std::io;
use std::time::Duration;
use tokio::sync::mpsc;

use tracing::warn;

use crate::cache::ReferenceSnapshot;
use crate::sync::{Notice, Visibility};

/// Application events
#[derive(Debug)]
pub enum Event {
  /// Terminal key press
  Key(KeyEvent),
  /// Terminal gained or lost focus
  Focus(Visibility),
  /// Mutation outcome for the status line
  Notice(Notice),
  /// Reference lists finished loading
  Reference(ReferenceSnapshot),
  /// Periodic tick for redrawing the dashboard
  Tick,
}

/// Event handler that produces events from terminal input and a tick timer
pub struct EventHandler {
  tx: mpsc::UnboundedSender<Event>,
  rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
  pub fn new() -> Self {
    let (tx, rx) = mpsc::unbounded_channel();
    Self { tx, rx }
  }

  /// Start reading terminal input, emitting a tick whenever `tick_rate`
  /// passes without any
  pub fn listen(&self, tick_rate: Duration) {
    let reader_tx = self.tx.clone();

    // crossterm's poll/read block, so keep them off the runtime workers
    tokio::task::spawn_blocking(move || loop {
      let event = match next_input(event::poll(tick_rate), event::read) {
        Input::Event(event) => event,
        Input::Ignored => continue,
        Input::Closed => break,
      };

      if reader_tx.send(event).is_err() {
        break;
      }
    });
  }

  /// Sender for background tasks that report back to the app
  pub fn sender(&self) -> mpsc::UnboundedSender<Event> {
    self.tx.clone()
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}

/// One step of the terminal reader
#[derive(Debug)]
enum Input {
  Event(Event),
  Ignored,
  /// The terminal can no longer be read; stop the reader
  Closed,
}

fn next_input(
  polled: io::Result<bool>,
  read: impl FnOnce() -> io::Result<CrosstermEvent>,
) -> Input {
  let ready = match polled {
    Ok(ready) => ready,
    Err(e) => {
      warn!(error = %e, "terminal poll failed, input reader stopped");
      return Input::Closed;
    }
  };
  if !ready {
    return Input::Event(Event::Tick);
  }

  match read() {
    Ok(CrosstermEvent::Key(key)) if key.kind == KeyEventKind::Press => Input::Event(Event::Key(key)),
    Ok(CrosstermEvent::FocusGained) => Input::Event(Event::Focus(Visibility::Visible)),
    Ok(CrosstermEvent::FocusLost) => Input::Event(Event::Focus(Visibility::Hidden)),
    Ok(_) => Input::Ignored,
    Err(e) => {
      warn!(error = %e, "terminal read failed, input reader stopped");
      Input::Closed
    }
  }
}
