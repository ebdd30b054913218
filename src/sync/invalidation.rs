//! Which categories a successful mutation can have changed.

use std::collections::BTreeSet;

use super::category::Category;
use crate::api::{RecordPatch, RequestStatus};

/// What a mutation did to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationEffect {
  StatusChanged(RequestStatus),
  Unassigned,
  Comment { send_back_reason: bool },
  Claimed,
  FieldUpdate,
}

impl MutationEffect {
  /// Effects of a data patch; a patch that clears the assignee and also
  /// changes other fields has both.
  pub fn for_patch(patch: &RecordPatch) -> Vec<MutationEffect> {
    let mut effects = Vec::new();
    if patch.clears_assignee() {
      effects.push(MutationEffect::Unassigned);
    }
    if patch.has_other_changes() || effects.is_empty() {
      effects.push(MutationEffect::FieldUpdate);
    }
    effects
  }

  /// Categories whose contents this effect can change.
  pub fn categories(&self) -> &'static [Category] {
    use Category::*;

    match self {
      MutationEffect::StatusChanged(RequestStatus::Completed) => &[Assigned, Completed],
      MutationEffect::StatusChanged(RequestStatus::New) => &[Available, Assigned],
      MutationEffect::StatusChanged(RequestStatus::SentBack) => &[Assigned, SentBack],
      MutationEffect::Unassigned => &[Available],
      MutationEffect::Comment {
        send_back_reason: true,
      } => &[Assigned, SentBack],
      MutationEffect::Comment {
        send_back_reason: false,
      } => &[Assigned],
      MutationEffect::Claimed => &[Available, Assigned],
      MutationEffect::StatusChanged(_) | MutationEffect::FieldUpdate => &[Assigned],
    }
  }
}

/// Deduplicated categories to refetch after all `effects`.
pub fn invalidated_categories(effects: &[MutationEffect]) -> Vec<Category> {
  effects
    .iter()
    .flat_map(|e| e.categories().iter().copied())
    .collect::<BTreeSet<_>>()
    .into_iter()
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use Category::*;

  fn for_effect(effect: MutationEffect) -> Vec<Category> {
    invalidated_categories(&[effect])
  }

  #[test]
  fn test_status_changes() {
    assert_eq!(
      for_effect(MutationEffect::StatusChanged(RequestStatus::Completed)),
      vec![Assigned, Completed]
    );
    assert_eq!(
      for_effect(MutationEffect::StatusChanged(RequestStatus::New)),
      vec![Available, Assigned]
    );
    assert_eq!(
      for_effect(MutationEffect::StatusChanged(RequestStatus::SentBack)),
      vec![Assigned, SentBack]
    );
    assert_eq!(
      for_effect(MutationEffect::StatusChanged(RequestStatus::Submitted)),
      vec![Assigned]
    );
  }

  #[test]
  fn test_comments() {
    assert_eq!(
      for_effect(MutationEffect::Comment {
        send_back_reason: true
      }),
      vec![Assigned, SentBack]
    );
    assert_eq!(
      for_effect(MutationEffect::Comment {
        send_back_reason: false
      }),
      vec![Assigned]
    );
  }

  #[test]
  fn test_claim_and_unassign() {
    assert_eq!(for_effect(MutationEffect::Claimed), vec![Available, Assigned]);
    assert_eq!(for_effect(MutationEffect::Unassigned), vec![Available]);
  }

  #[test]
  fn test_duplicates_collapse() {
    let categories = invalidated_categories(&[
      MutationEffect::Claimed,
      MutationEffect::StatusChanged(RequestStatus::Completed),
      MutationEffect::FieldUpdate,
    ]);
    assert_eq!(categories, vec![Available, Assigned, Completed]);
  }

  #[test]
  fn test_patch_effects() {
    assert_eq!(
      MutationEffect::for_patch(&RecordPatch::unassign()),
      vec![MutationEffect::Unassigned]
    );
    assert_eq!(
      MutationEffect::for_patch(&RecordPatch::default()),
      vec![MutationEffect::FieldUpdate]
    );

    let both = RecordPatch::unassign().field("priority", serde_json::json!("low"));
    assert_eq!(
      invalidated_categories(&MutationEffect::for_patch(&both)),
      vec![Available, Assigned]
    );
  }
}
