use ratatui::prelude::Color;

use crate::api::RequestStatus;
use crate::sync::Category;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Get the display color for a request status
pub fn status_color(status: RequestStatus) -> Color {
  match status {
    RequestStatus::Completed => Color::Green,
    RequestStatus::Assigned | RequestStatus::Submitted => Color::Yellow,
    RequestStatus::SentBack => Color::Red,
    RequestStatus::New => Color::Cyan,
    RequestStatus::Unknown => Color::White,
  }
}

/// Tab label with the bucket size, marked when a fetch is running
pub fn tab_label(category: Category, count: usize, in_flight: bool) -> String {
  if in_flight {
    format!(" {} ({}) * ", category.label(), count)
  } else {
    format!(" {} ({}) ", category.label(), count)
  }
}

/// Format a duration in hours the way the stats line shows it
pub fn format_hours(hours: f64) -> String {
  if hours <= 0.0 {
    "-".to_string()
  } else if hours < 24.0 {
    format!("{:.1}h", hours)
  } else {
    format!("{:.1}d", hours / 24.0)
  }
}
