use crate::api::{HttpTaskApi, RecordPatch, RequestRecord, RequestStatus, TaskApi};
use crate::cache::{ReferenceData, ReferenceSnapshot, SessionStore, SqliteSessionStore, TtlCache};
use crate::config::Config;
use crate::error::{SyncError, SyncResult};
use crate::event::{Event, EventHandler};
use crate::sync::{Category, Notice, Notifier, SyncController, SyncSnapshot, Visibility};
use crate::ui;
use crate::ui::components::{InputResult, TextInput};
use color_eyre::{eyre::eyre, Result};
use crossterm::event::{DisableFocusChange, EnableFocusChange, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use ratatui::widgets::ListState;
use std::future::Future;
use std::io::stdout;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::debug;

const TICK_RATE: Duration = Duration::from_millis(250);

/// Input mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
  Normal,
  /// Typing a comment for request `id`
  Comment { id: u64, send_back: bool },
}

/// Forwards mutation outcomes to the status line
struct UiNotifier {
  tx: mpsc::UnboundedSender<Event>,
}

impl Notifier for UiNotifier {
  fn notify(&self, notice: Notice) {
    // The app may already be shutting down
    let _ = self.tx.send(Event::Notice(notice));
  }
}

/// Main application state
pub struct App {
  config: Config,
  controller: Arc<SyncController>,
  events: EventHandler,

  /// Fed from terminal focus changes
  visibility: watch::Sender<Visibility>,

  /// Category whose requests are listed
  tab: usize,
  list_state: ListState,

  /// Current input mode
  mode: Mode,
  comment: TextInput,

  /// Last mutation outcome
  status: Option<Notice>,
  reference: ReferenceSnapshot,

  /// Whether to quit
  should_quit: bool,
}

impl App {
  pub fn new(config: Config) -> Result<Self> {
    let api: Arc<dyn TaskApi> = Arc::new(HttpTaskApi::new(&config)?);
    let events = EventHandler::new();

    let store: Arc<dyn SessionStore> = match &config.cache.path {
      Some(path) => Arc::new(
        SqliteSessionStore::open(path, config.cache.max_bytes)
          .map_err(|e| eyre!("Failed to open session store {}: {}", path.display(), e))?,
      ),
      None => Arc::new(
        SqliteSessionStore::in_memory(config.cache.max_bytes)
          .map_err(|e| eyre!("Failed to open session store: {}", e))?,
      ),
    };
    let reference = ReferenceData::new(
      Arc::clone(&api),
      TtlCache::new(store),
      config.cache.reference_max_age(),
    );

    let notifier = Arc::new(UiNotifier {
      tx: events.sender(),
    });
    let controller = SyncController::new(api, config.api.user_id.clone(), config.sync.clone(), notifier)
      .with_reference(reference);

    let (visibility, _) = watch::channel(Visibility::Visible);

    Ok(Self {
      config,
      controller: Arc::new(controller),
      events,
      visibility,
      tab: 0,
      list_state: ListState::default(),
      mode: Mode::Normal,
      comment: TextInput::new(),
      status: None,
      reference: ReferenceSnapshot::default(),
      should_quit: false,
    })
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    stdout().execute(EnableFocusChange)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    self.events.listen(TICK_RATE);
    let polling = self.controller.activate(self.visibility.subscribe());
    self.load_reference();

    let result = self.event_loop(&mut terminal).await;

    polling.shutdown().await;

    // Cleanup terminal
    stdout().execute(DisableFocusChange)?;
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  async fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>) -> Result<()> {
    while !self.should_quit {
      let snapshot = self.controller.snapshot();
      terminal.draw(|frame| ui::draw(frame, self, &snapshot))?;

      match self.events.next().await {
        Some(event) => self.handle_event(event, &snapshot),
        None => break,
      }
    }
    Ok(())
  }

  fn load_reference(&self) {
    let controller = Arc::clone(&self.controller);
    let tx = self.events.sender();

    tokio::spawn(async move {
      let reference = controller.load_reference().await;
      let _ = tx.send(Event::Reference(reference));
    });
  }

  fn handle_event(&mut self, event: Event, snapshot: &SyncSnapshot) {
    match event {
      Event::Key(key) => self.handle_key(key, snapshot),
      Event::Focus(visibility) => {
        debug!(?visibility, "focus changed");
        self.visibility.send_replace(visibility);
      }
      Event::Notice(notice) => self.status = Some(notice),
      Event::Reference(reference) => self.reference = reference,
      Event::Tick => {} // Redraw happens at the top of the loop
    }
  }

  fn handle_key(&mut self, key: KeyEvent, snapshot: &SyncSnapshot) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    match self.mode.clone() {
      Mode::Normal => self.handle_normal_mode_key(key, snapshot),
      Mode::Comment { id, send_back } => self.handle_comment_key(key, id, send_back),
    }
  }

  fn handle_normal_mode_key(&mut self, key: KeyEvent, snapshot: &SyncSnapshot) {
    match key.code {
      KeyCode::Char('q') => self.should_quit = true,

      // Navigation
      KeyCode::Tab | KeyCode::Right | KeyCode::Char('l') => self.switch_tab(1),
      KeyCode::BackTab | KeyCode::Left | KeyCode::Char('h') => self.switch_tab(-1),
      KeyCode::Down | KeyCode::Char('j') => self.list_state.select_next(),
      KeyCode::Up | KeyCode::Char('k') => self.list_state.select_previous(),

      KeyCode::Char('r') => {
        let controller = Arc::clone(&self.controller);
        tokio::spawn(async move {
          controller.refresh_all(true).await;
        });
      }

      // Mutations on the selected request
      KeyCode::Char('c') => {
        if let Some(id) = self.selected_id(snapshot) {
          self.spawn_mutation(move |c| async move { c.claim_request(id).await.map(drop) });
        }
      }
      KeyCode::Char('d') => {
        if let Some(id) = self.selected_id(snapshot) {
          self.spawn_mutation(move |c| async move {
            c.update_request_status(id, RequestStatus::Completed, None)
              .await
              .map(drop)
          });
        }
      }
      KeyCode::Char('u') => {
        if let Some(id) = self.selected_id(snapshot) {
          self.spawn_mutation(move |c| async move {
            c.update_request_data(id, &RecordPatch::unassign())
              .await
              .map(drop)
          });
        }
      }
      KeyCode::Char('m') | KeyCode::Char('b') => {
        if let Some(id) = self.selected_id(snapshot) {
          self.comment.clear();
          self.mode = Mode::Comment {
            id,
            send_back: key.code == KeyCode::Char('b'),
          };
        }
      }
      _ => {}
    }
  }

  fn handle_comment_key(&mut self, key: KeyEvent, id: u64, send_back: bool) {
    match self.comment.handle_key(key) {
      InputResult::Submitted(text) => {
        self.mode = Mode::Normal;
        let text = text.trim().to_string();
        if text.is_empty() {
          return;
        }
        self.spawn_mutation(move |c| async move {
          c.add_comment(id, &text, send_back).await?;
          if send_back {
            c.update_request_status(id, RequestStatus::SentBack, None)
              .await?;
          }
          Ok::<_, SyncError>(())
        });
      }
      InputResult::Cancelled => self.mode = Mode::Normal,
      InputResult::Consumed | InputResult::NotHandled => {}
    }
  }

  /// Run a mutation in the background. Failures already reach the status
  /// line through the notifier.
  fn spawn_mutation<F, Fut>(&self, mutation: F)
  where
    F: FnOnce(Arc<SyncController>) -> Fut,
    Fut: Future<Output = SyncResult<()>> + Send + 'static,
  {
    let future = mutation(Arc::clone(&self.controller));
    tokio::spawn(async move {
      if let Err(e) = future.await {
        debug!(error = %e, "mutation rejected");
      }
    });
  }

  fn switch_tab(&mut self, delta: i32) {
    let len = Category::ALL.len() as i32;
    self.tab = (self.tab as i32 + delta).rem_euclid(len) as usize;
    self.list_state.select(None);
  }

  fn selected_id(&self, snapshot: &SyncSnapshot) -> Option<u64> {
    self.selected_record(snapshot).map(|r| r.id)
  }

  // Accessors for UI rendering
  pub fn category(&self) -> Category {
    Category::ALL[self.tab]
  }

  pub fn list_state_mut(&mut self) -> &mut ListState {
    &mut self.list_state
  }

  pub fn mode(&self) -> &Mode {
    &self.mode
  }

  pub fn comment(&self) -> &TextInput {
    &self.comment
  }

  pub fn status(&self) -> Option<&Notice> {
    self.status.as_ref()
  }

  pub fn reference(&self) -> &ReferenceSnapshot {
    &self.reference
  }

  pub fn title(&self) -> Option<&str> {
    self.config.title.as_deref()
  }

  pub fn api_url(&self) -> &str {
    &self.config.api.url
  }

  pub fn user_id(&self) -> &str {
    self.controller.user_id()
  }

  pub fn selected_record<'a>(&self, snapshot: &'a SyncSnapshot) -> Option<&'a RequestRecord> {
    let idx = self.list_state.selected()?;
    snapshot.buckets[self.category()].get(idx)
  }
}
