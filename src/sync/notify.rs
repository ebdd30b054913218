/// User-facing outcome of a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
  Success(String),
  Failure(String),
}

impl Notice {
  pub fn message(&self) -> &str {
    match self {
      Notice::Success(m) | Notice::Failure(m) => m,
    }
  }

  pub fn is_failure(&self) -> bool {
    matches!(self, Notice::Failure(_))
  }
}

/// Receives notices from the controller. Passed in, never global.
pub trait Notifier: Send + Sync {
  fn notify(&self, notice: Notice);
}
