//! Staged editing of a role's permission matrix.
//!
//! An administrator reviews the full grid for one role, toggles any number
//! of cells, then commits them as a batch or discards them. Pending changes
//! live only in the editor value; the rule store is touched exclusively by
//! `commit`, row by row, so a partial failure leaves every succeeded row
//! persisted and reports the rest.

use serde::Serialize;
use std::collections::HashMap;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::authz::Effect;
use crate::errors::{AppError, AppResult};
use crate::store::RuleStore;

/// Outcome of a batch commit. `failed` is empty on full success; succeeded
/// rows stay persisted either way, there is no batch rollback.
#[derive(Debug, Default, Clone, Serialize, ToSchema)]
pub struct CommitReport {
    pub applied: Vec<Uuid>,
    pub failed: Vec<FailedCell>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FailedCell {
    pub permission_id: Uuid,
    pub reason: String,
}

/// One editing session over one role's matrix.
///
/// `committed` mirrors the rule store as of the last load; `pending` holds
/// every cell touched since. `pending` is the only evidence of unsaved
/// work: a cell is "modified" exactly when it has a pending entry.
pub struct MatrixEditor {
    role_id: Uuid,
    committed: HashMap<Uuid, Effect>,
    pending: HashMap<Uuid, Effect>,
    commit_in_flight: bool,
}

impl MatrixEditor {
    pub async fn load(store: &RuleStore, role_id: Uuid) -> AppResult<Self> {
        let committed = store.matrix_for_role(role_id).await?;
        Ok(Self {
            role_id,
            committed,
            pending: HashMap::new(),
            commit_in_flight: false,
        })
    }

    pub fn role_id(&self) -> Uuid {
        self.role_id
    }

    /// Pending value if the cell was touched, else the committed value,
    /// else Unset.
    pub fn effective_value(&self, permission_id: Uuid) -> Effect {
        self.pending
            .get(&permission_id)
            .or_else(|| self.committed.get(&permission_id))
            .copied()
            .unwrap_or(Effect::Unset)
    }

    /// Cycle the cell Unset -> Allow -> Deny -> Unset. Only `pending` is
    /// written; the committed map never changes outside load/commit.
    pub fn toggle(&mut self, permission_id: Uuid) -> Effect {
        let next = self.effective_value(permission_id).cycled();
        self.pending.insert(permission_id, next);
        next
    }

    /// Stage an explicit target value (used by the HTTP surface, where the
    /// client sends final values rather than click counts).
    pub fn stage(&mut self, permission_id: Uuid, effect: Effect) {
        self.pending.insert(permission_id, effect);
    }

    pub fn is_modified(&self, permission_id: Uuid) -> bool {
        self.pending.contains_key(&permission_id)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Discard staged work. Never touches the rule store.
    pub fn cancel(&mut self) {
        self.pending.clear();
    }

    /// Persist every pending cell, one keyed upsert or delete per row.
    ///
    /// After the writes — regardless of per-row failures — committed state
    /// is reloaded from the store and pending is cleared, so the editor
    /// reflects what is actually persisted rather than stale intent.
    pub async fn commit(&mut self, store: &RuleStore) -> AppResult<CommitReport> {
        if self.commit_in_flight {
            return Err(AppError::conflict("a commit for this matrix is already in flight"));
        }
        self.commit_in_flight = true;

        let mut entries: Vec<(Uuid, Effect)> =
            self.pending.iter().map(|(id, effect)| (*id, *effect)).collect();
        entries.sort_by_key(|(id, _)| *id);

        let mut report = CommitReport::default();
        for (permission_id, effect) in entries {
            let result = match effect {
                Effect::Unset => store
                    .clear_matrix_cell(self.role_id, permission_id)
                    .await
                    .map(|_| ()),
                effect => store.set_matrix_cell(self.role_id, permission_id, effect).await,
            };

            match result {
                Ok(()) => report.applied.push(permission_id),
                Err(err) => report.failed.push(FailedCell {
                    permission_id,
                    reason: err.to_string(),
                }),
            }
        }

        let reloaded = store.matrix_for_role(self.role_id).await;
        self.commit_in_flight = false;
        self.committed = reloaded?;
        self.pending.clear();

        if !report.failed.is_empty() {
            tracing::warn!(
                role_id = %self.role_id,
                failed = report.failed.len(),
                applied = report.applied.len(),
                "matrix commit completed with failures"
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn editor() -> MatrixEditor {
        MatrixEditor {
            role_id: Uuid::new_v4(),
            committed: HashMap::new(),
            pending: HashMap::new(),
            commit_in_flight: false,
        }
    }

    #[test]
    fn toggle_cycles_back_to_unset_in_three_steps() {
        let mut editor = editor();
        let cell = Uuid::new_v4();

        assert_eq!(editor.effective_value(cell), Effect::Unset);
        assert_eq!(editor.toggle(cell), Effect::Allow);
        assert_eq!(editor.effective_value(cell), Effect::Allow);
        assert_eq!(editor.toggle(cell), Effect::Deny);
        assert_eq!(editor.effective_value(cell), Effect::Deny);
        assert_eq!(editor.toggle(cell), Effect::Unset);
        assert_eq!(editor.effective_value(cell), Effect::Unset);
    }

    #[test]
    fn toggle_starts_from_the_committed_value() {
        let mut editor = editor();
        let cell = Uuid::new_v4();
        editor.committed.insert(cell, Effect::Allow);

        assert_eq!(editor.effective_value(cell), Effect::Allow);
        assert_eq!(editor.toggle(cell), Effect::Deny);
        // Committed map is untouched; only pending carries the change.
        assert_eq!(editor.committed.get(&cell), Some(&Effect::Allow));
        assert!(editor.is_modified(cell));
    }

    #[test]
    fn cancel_discards_pending_and_nothing_else() {
        let mut editor = editor();
        let cell = Uuid::new_v4();
        editor.committed.insert(cell, Effect::Deny);

        editor.toggle(cell);
        assert!(editor.has_pending());

        editor.cancel();
        assert!(!editor.has_pending());
        assert!(!editor.is_modified(cell));
        assert_eq!(editor.effective_value(cell), Effect::Deny);
    }

    #[test]
    fn pending_shadows_committed_until_cleared() {
        let mut editor = editor();
        let cell = Uuid::new_v4();
        editor.committed.insert(cell, Effect::Allow);

        editor.stage(cell, Effect::Unset);
        assert_eq!(editor.effective_value(cell), Effect::Unset);
        editor.cancel();
        assert_eq!(editor.effective_value(cell), Effect::Allow);
    }
}
