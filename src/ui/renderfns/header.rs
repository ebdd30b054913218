use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

use crate::cache::ReferenceSnapshot;

/// Everything the header shows
pub struct HeaderInfo<'a> {
  pub title: Option<&'a str>,
  pub api_url: &'a str,
  pub user_id: &'a str,
  pub syncing: bool,
  pub reference: &'a ReferenceSnapshot,
}

/// Draw the header bar with logo, context, and shortcuts
pub fn draw_header(frame: &mut Frame, area: Rect, info: &HeaderInfo) {
  let title = info.title.unwrap_or_else(|| extract_domain(info.api_url));

  let sync = if info.syncing {
    Span::styled(" syncing ", Style::default().fg(Color::Yellow))
  } else {
    Span::styled(" idle ", Style::default().fg(Color::DarkGray))
  };

  let header = Line::from(vec![
    Span::styled(" queue-sync ", Style::default().fg(Color::Cyan).bold()),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(format!(" {} ", title), Style::default().fg(Color::White)),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(
      format!(" {} ", info.user_id),
      Style::default().fg(Color::Yellow).bold(),
    ),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    sync,
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(
      format!(
        " {} users, {} handlers ",
        info.reference.users.len(),
        info.reference.handlers.len()
      ),
      Style::default().fg(Color::DarkGray),
    ),
  ]);

  let paragraph = Paragraph::new(header).style(Style::default().bg(Color::Black));

  frame.render_widget(paragraph, area);
}

/// Draw the key hints under the list
pub fn draw_shortcuts(frame: &mut Frame, area: Rect) {
  let hints = [
    ("tab", "category"),
    ("j/k", "select"),
    ("r", "refresh"),
    ("c", "claim"),
    ("d", "complete"),
    ("b", "send back"),
    ("m", "comment"),
    ("u", "unassign"),
    ("q", "quit"),
  ];

  let mut spans = vec![Span::raw(" ")];
  for (key, label) in hints {
    spans.push(Span::styled(format!("<{}>", key), Style::default().fg(Color::Cyan)));
    spans.push(Span::styled(format!(" {}   ", label), Style::default().fg(Color::DarkGray)));
  }

  frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Extract domain from the service URL
fn extract_domain(url: &str) -> &str {
  url
    .strip_prefix("https://")
    .or_else(|| url.strip_prefix("http://"))
    .unwrap_or(url)
    .split('/')
    .next()
    .unwrap_or(url)
}
