pub mod header;
pub mod utils;

pub use header::{draw_header, draw_shortcuts, HeaderInfo};
pub use utils::{format_hours, status_color, tab_label, truncate};
