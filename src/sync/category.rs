use std::fmt;
use std::ops::{Index, IndexMut};

use crate::api::RequestStatus;

/// Status-derived bucket a request is shown under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
  Available,
  Assigned,
  Submitted,
  SentBack,
  Completed,
}

impl Category {
  /// Display order
  pub const ALL: [Category; 5] = [
    Category::Available,
    Category::Assigned,
    Category::Submitted,
    Category::SentBack,
    Category::Completed,
  ];

  /// Issue order for the ordered refresh strategy
  pub const FETCH_ORDER: [Category; 5] = [
    Category::Available,
    Category::Assigned,
    Category::Completed,
    Category::Submitted,
    Category::SentBack,
  ];

  pub fn for_status(status: RequestStatus) -> Option<Category> {
    match status {
      RequestStatus::New => Some(Category::Available),
      RequestStatus::Assigned => Some(Category::Assigned),
      RequestStatus::Submitted => Some(Category::Submitted),
      RequestStatus::SentBack => Some(Category::SentBack),
      RequestStatus::Completed => Some(Category::Completed),
      RequestStatus::Unknown => None,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Category::Available => "available",
      Category::Assigned => "assigned",
      Category::Submitted => "submitted",
      Category::SentBack => "sentBack",
      Category::Completed => "completed",
    }
  }

  pub fn label(&self) -> &'static str {
    match self {
      Category::Available => "Available",
      Category::Assigned => "Assigned",
      Category::Submitted => "Submitted",
      Category::SentBack => "Sent back",
      Category::Completed => "Completed",
    }
  }

  fn index(self) -> usize {
    self as usize
  }
}

impl fmt::Display for Category {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// One value per category, indexed by `Category`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerCategory<T>([T; 5]);

impl<T> PerCategory<T> {
  pub fn from_fn(f: impl FnMut(Category) -> T) -> Self {
    PerCategory(Category::ALL.map(f))
  }

  #[cfg(test)]
  pub fn iter(&self) -> impl Iterator<Item = (Category, &T)> {
    Category::ALL.into_iter().zip(self.0.iter())
  }

  pub fn values(&self) -> impl Iterator<Item = &T> {
    self.0.iter()
  }
}

impl<T: Default> PerCategory<T> {
  /// Move a value out, leaving the default behind.
  pub fn take(&mut self, category: Category) -> T {
    std::mem::take(&mut self.0[category.index()])
  }
}

impl<T> Index<Category> for PerCategory<T> {
  type Output = T;

  fn index(&self, category: Category) -> &T {
    &self.0[category.index()]
  }
}

impl<T> IndexMut<Category> for PerCategory<T> {
  fn index_mut(&mut self, category: Category) -> &mut T {
    &mut self.0[category.index()]
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_every_known_status_has_a_category() {
    assert_eq!(
      Category::for_status(RequestStatus::New),
      Some(Category::Available)
    );
    assert_eq!(
      Category::for_status(RequestStatus::SentBack),
      Some(Category::SentBack)
    );
    assert_eq!(Category::for_status(RequestStatus::Unknown), None);
  }

  #[test]
  fn test_per_category_indexing_follows_all() {
    let map = PerCategory::from_fn(|c| c.as_str());
    for (category, value) in map.iter() {
      assert_eq!(*value, category.as_str());
    }
    assert_eq!(map[Category::SentBack], "sentBack");
  }

  #[test]
  fn test_fetch_order_covers_every_category() {
    let mut order = Category::FETCH_ORDER.to_vec();
    order.sort();
    assert_eq!(order, Category::ALL.to_vec());
  }
}
