use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use super::category::{Category, PerCategory};

/// Handle held by one fetch; goes stale once a newer fetch for the same
/// category begins or the registry is torn down.
#[derive(Debug, Clone)]
pub struct FetchToken {
  category: Category,
  generation: u64,
  inner: CancellationToken,
}

impl FetchToken {
  pub fn is_current(&self) -> bool {
    !self.inner.is_cancelled()
  }

  /// Resolves when this token is invalidated.
  pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
    self.inner.cancelled()
  }

  pub fn generation(&self) -> u64 {
    self.generation
  }
}

/// Issues one live token per category.
#[derive(Debug, Default)]
pub struct CancellationRegistry {
  tokens: PerCategory<Option<FetchToken>>,
  next_generation: u64,
}

impl CancellationRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Invalidate the category's previous token and register a fresh one.
  pub fn begin(&mut self, category: Category) -> FetchToken {
    if let Some(previous) = self.tokens.take(category) {
      previous.inner.cancel();
    }

    self.next_generation += 1;
    let token = FetchToken {
      category,
      generation: self.next_generation,
      inner: CancellationToken::new(),
    };
    self.tokens[category] = Some(token.clone());
    token
  }

  /// Drop the registration for a fetch that resolved while current.
  pub fn release(&mut self, token: &FetchToken) {
    let slot = &mut self.tokens[token.category];
    if slot.as_ref().map(|t| t.generation) == Some(token.generation) {
      *slot = None;
    }
  }

  pub fn cancel_all(&mut self) {
    for category in Category::ALL {
      if let Some(token) = self.tokens.take(category) {
        token.inner.cancel();
      }
    }
  }

  #[cfg(test)]
  pub fn active(&self, category: Category) -> Option<&FetchToken> {
    self.tokens[category].as_ref()
  }
}
