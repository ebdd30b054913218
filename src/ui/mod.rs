pub mod components;
pub mod renderfns;

use crate::app::{App, Mode};
use crate::sync::{Category, SyncSnapshot};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Tabs};
use renderfns::{draw_header, draw_shortcuts, format_hours, status_color, tab_label, truncate, HeaderInfo};

/// Main draw function
pub fn draw(frame: &mut Frame, app: &mut App, snapshot: &SyncSnapshot) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Header
      Constraint::Length(1), // Category tabs
      Constraint::Length(1), // Stats
      Constraint::Min(1),    // Request list
      Constraint::Length(1), // Selected request
      Constraint::Length(1), // Shortcuts
      Constraint::Length(1), // Status bar
    ])
    .split(frame.area());

  draw_header(
    frame,
    chunks[0],
    &HeaderInfo {
      title: app.title(),
      api_url: app.api_url(),
      user_id: app.user_id(),
      syncing: snapshot.any_in_flight,
      reference: app.reference(),
    },
  );
  draw_tabs(frame, chunks[1], app.category(), snapshot);
  draw_stats(frame, chunks[2], snapshot);
  draw_detail(frame, chunks[4], app, snapshot);
  draw_shortcuts(frame, chunks[5]);
  draw_status_bar(frame, chunks[6], app);

  let category = app.category();
  draw_list(frame, chunks[3], category, snapshot, app.list_state_mut());

  if let Mode::Comment { id, send_back } = app.mode() {
    let title = if *send_back {
      format!("Send back #{}: reason", id)
    } else {
      format!("Comment on #{}", id)
    };
    app.comment().render_overlay(frame, chunks[3], &title);
  }
}

fn draw_tabs(frame: &mut Frame, area: Rect, current: Category, snapshot: &SyncSnapshot) {
  let titles: Vec<String> = Category::ALL
    .into_iter()
    .map(|c| tab_label(c, snapshot.buckets[c].len(), snapshot.in_flight[c]))
    .collect();
  let selected = Category::ALL.iter().position(|c| *c == current).unwrap_or(0);

  let tabs = Tabs::new(titles)
    .select(selected)
    .style(Style::default().fg(Color::White))
    .highlight_style(Style::default().fg(Color::Cyan).bold())
    .divider("│");

  frame.render_widget(tabs, area);
}

fn draw_stats(frame: &mut Frame, area: Rect, snapshot: &SyncSnapshot) {
  let stats = &snapshot.stats;
  let line = Line::from(vec![
    Span::styled(" total ", Style::default().fg(Color::DarkGray)),
    Span::raw(stats.total_count.to_string()),
    Span::styled("   pending ", Style::default().fg(Color::DarkGray)),
    Span::styled(stats.pending_count.to_string(), Style::default().fg(Color::Yellow)),
    Span::styled("   completed ", Style::default().fg(Color::DarkGray)),
    Span::styled(stats.completed_count.to_string(), Style::default().fg(Color::Green)),
    Span::styled("   avg resolution ", Style::default().fg(Color::DarkGray)),
    Span::raw(format_hours(stats.average_resolution_hours)),
  ]);

  frame.render_widget(Paragraph::new(line), area);
}

fn draw_list(
  frame: &mut Frame,
  area: Rect,
  category: Category,
  snapshot: &SyncSnapshot,
  list_state: &mut ListState,
) {
  let records = &snapshot.buckets[category];
  ensure_valid_selection(list_state, records.len());

  let title = if snapshot.in_flight[category] {
    format!(" {} (loading...) ", category.label())
  } else if snapshot.stale[category] {
    format!(" {} (stale) ", category.label())
  } else {
    format!(" {} ({}) ", category.label(), records.len())
  };

  let block = Block::default()
    .title(title)
    .title_alignment(Alignment::Center)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));

  if records.is_empty() {
    let paragraph = Paragraph::new("No requests.")
      .block(block)
      .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
    return;
  }

  let items: Vec<ListItem> = records
    .iter()
    .map(|record| {
      let line = Line::from(vec![
        Span::styled(format!("#{:<8}", record.id), Style::default().fg(Color::Cyan)),
        Span::raw(" "),
        Span::styled(
          format!("{:<10}", record.status.as_str()),
          Style::default().fg(status_color(record.status)),
        ),
        Span::raw(" "),
        Span::styled(
          format!("{:<12}", truncate(record.assigned_to.as_deref().unwrap_or("-"), 12)),
          Style::default().fg(Color::DarkGray),
        ),
        Span::raw(" "),
        Span::raw(truncate(record.title.as_deref().unwrap_or(""), 60)),
      ]);
      ListItem::new(line)
    })
    .collect();

  let list = List::new(items)
    .block(block)
    .highlight_style(
      Style::default()
        .bg(Color::DarkGray)
        .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("> ");

  frame.render_stateful_widget(list, area, list_state);
}

fn draw_detail(frame: &mut Frame, area: Rect, app: &App, snapshot: &SyncSnapshot) {
  let Some(record) = app.selected_record(snapshot) else {
    return;
  };

  let updated = record
    .updated_at
    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
    .unwrap_or_else(|| "-".to_string());
  let line = Line::from(vec![
    Span::styled(format!(" #{} ", record.id), Style::default().fg(Color::Cyan)),
    Span::styled("updated ", Style::default().fg(Color::DarkGray)),
    Span::raw(updated),
  ]);

  frame.render_widget(Paragraph::new(line), area);
}

fn draw_status_bar(frame: &mut Frame, area: Rect, app: &App) {
  let (content, style) = match (app.mode(), app.status()) {
    (Mode::Comment { .. }, _) => (
      " Enter:submit  Esc:cancel".to_string(),
      Style::default().fg(Color::Yellow),
    ),
    (Mode::Normal, Some(notice)) if notice.is_failure() => {
      (format!(" {}", notice.message()), Style::default().fg(Color::Red))
    }
    (Mode::Normal, Some(notice)) => {
      (format!(" {}", notice.message()), Style::default().fg(Color::Green))
    }
    (Mode::Normal, None) => (String::new(), Style::default()),
  };

  frame.render_widget(Paragraph::new(content).style(style), area);
}

/// Keep the selection inside the list after its contents changed
pub fn ensure_valid_selection(state: &mut ListState, len: usize) {
  match state.selected() {
    _ if len == 0 => state.select(None),
    Some(i) if i >= len => state.select(Some(len - 1)),
    None => state.select(Some(0)),
    Some(_) => {}
  }
}
