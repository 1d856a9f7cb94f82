//! Priority reordering: turn a drop position into a new sort key
//!
//! Rows are ordered by descending priority. When a row is dropped at a new
//! index its priority is derived from the rows that will surround it, so
//! that normally only the moved row changes. Only when the neighbours leave
//! no integer room between them is the whole list renumbered.

use crate::model::{Row, RowKey};

/// Reasons a reorder cannot be planned
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReorderError {
    #[error("row '{0}' is not in the list")]
    UnknownKey(RowKey),

    #[error("drop index {index} is outside a list of {len} rows")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Tunables for key derivation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReorderPolicy {
    /// Distance kept from the neighbour when dropping at either end
    pub step: i64,
    /// Gap between consecutive rows after a renumbering pass
    pub spacing: i64,
}

impl Default for ReorderPolicy {
    fn default() -> Self {
        Self {
            step: 10,
            spacing: 10,
        }
    }
}

/// The priority changes a drop requires
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriorityPlan {
    /// Only the moved row changes
    Insert { key: RowKey, priority: i64 },
    /// No room was left between the neighbours; every listed row is rewritten
    Renumber {
        key: RowKey,
        assignments: Vec<(RowKey, i64)>,
    },
}

impl PriorityPlan {
    pub fn moved_key(&self) -> &RowKey {
        match self {
            PriorityPlan::Insert { key, .. } | PriorityPlan::Renumber { key, .. } => key,
        }
    }

    pub fn moved_priority(&self) -> i64 {
        match self {
            PriorityPlan::Insert { priority, .. } => *priority,
            PriorityPlan::Renumber { key, assignments } => assignments
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, p)| *p)
                .unwrap_or_default(),
        }
    }

    /// Every `(key, priority)` pair that must be sent to the backend
    pub fn assignments(&self) -> Vec<(RowKey, i64)> {
        match self {
            PriorityPlan::Insert { key, priority } => vec![(key.clone(), *priority)],
            PriorityPlan::Renumber { assignments, .. } => assignments.clone(),
        }
    }

    pub fn is_renumber(&self) -> bool {
        matches!(self, PriorityPlan::Renumber { .. })
    }
}

/// Plan the priority changes for dropping `moved` at `new_index`.
///
/// `rows` is the list in its current display order. Neighbours are looked up
/// in the list as it will be after the move, i.e. with `moved` taken out.
pub fn plan_reorder(
    rows: &[Row],
    moved: &RowKey,
    new_index: usize,
    policy: ReorderPolicy,
) -> Result<PriorityPlan, ReorderError> {
    let n = rows.len();
    let from = rows
        .iter()
        .position(|r| &r.key == moved)
        .ok_or_else(|| ReorderError::UnknownKey(moved.clone()))?;
    if new_index >= n {
        return Err(ReorderError::IndexOutOfRange {
            index: new_index,
            len: n,
        });
    }

    let others: Vec<&Row> = rows
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != from)
        .map(|(_, r)| r)
        .collect();

    let priority = if new_index == 0 {
        match others.first() {
            Some(next) => next.priority.checked_add(policy.step),
            None => Some(policy.step),
        }
    } else if new_index == n - 1 {
        others
            .last()
            .and_then(|prev| prev.priority.checked_sub(policy.step))
    } else {
        let prev = others[new_index - 1].priority;
        let next = others[new_index].priority;
        if i128::from(prev) - i128::from(next) > 1 {
            Some(floor_midpoint(prev, next))
        } else {
            None
        }
    };

    match priority {
        Some(priority) => Ok(PriorityPlan::Insert {
            key: moved.clone(),
            priority,
        }),
        None => {
            tracing::debug!(
                "No room for '{}' at index {}, renumbering {} rows",
                moved,
                new_index,
                n
            );
            Ok(renumber(&others, &rows[from], new_index, policy.spacing))
        }
    }
}

/// The new priority of the moved row alone
pub fn compute_new_priority(
    rows: &[Row],
    moved: &RowKey,
    new_index: usize,
    policy: ReorderPolicy,
) -> Result<i64, ReorderError> {
    plan_reorder(rows, moved, new_index, policy).map(|plan| plan.moved_priority())
}

/// `floor((a + b) / 2)` without intermediate overflow
fn floor_midpoint(a: i64, b: i64) -> i64 {
    a.div_euclid(2) + b.div_euclid(2) + (a.rem_euclid(2) + b.rem_euclid(2)) / 2
}

/// Evenly spaced priorities over the post-move order. Rows already holding
/// their new value are left out, the moved row is always included.
fn renumber(others: &[&Row], moved: &Row, new_index: usize, spacing: i64) -> PriorityPlan {
    let mut order: Vec<&Row> = others.to_vec();
    order.insert(new_index, moved);
    let n = order.len() as i64;
    let assignments = order
        .iter()
        .enumerate()
        .map(|(i, row)| (row, (n - i as i64).saturating_mul(spacing)))
        .filter(|(row, priority)| row.key == moved.key || row.priority != *priority)
        .map(|(row, priority)| (row.key.clone(), priority))
        .collect();
    PriorityPlan::Renumber {
        key: moved.key.clone(),
        assignments,
    }
}
