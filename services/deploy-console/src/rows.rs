//! Ordered row collection with a key index

use std::collections::HashMap;

use crate::model::{Progress, Row, RowDetails, RowKey, Status};

/// Rows in display order (descending priority) plus a key -> position map.
///
/// The position map is the only way rows are looked up; nothing is ever
/// recovered from what has been rendered. `epoch` increases on every
/// wholesale replacement so callers can tell whether state they captured
/// earlier has since been superseded.
#[derive(Debug, Clone, Default)]
pub struct RowCollection {
    rows: Vec<Row>,
    index: HashMap<RowKey, usize>,
    epoch: u64,
}

impl RowCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<Row>) -> Self {
        let mut collection = Self::new();
        collection.load(rows);
        collection
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn iter(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter()
    }

    pub fn keys(&self) -> Vec<RowKey> {
        self.rows.iter().map(|r| r.key.clone()).collect()
    }

    pub fn priorities(&self) -> Vec<i64> {
        self.rows.iter().map(|r| r.priority).collect()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn contains(&self, key: &RowKey) -> bool {
        self.index.contains_key(key)
    }

    pub fn position(&self, key: &RowKey) -> Option<usize> {
        self.index.get(key).copied()
    }

    pub fn get(&self, key: &RowKey) -> Option<&Row> {
        self.position(key).map(|i| &self.rows[i])
    }

    /// Discard every row and take `rows` in the given order
    pub fn replace_all(&mut self, rows: Vec<Row>) {
        self.load(rows);
        self.epoch += 1;
    }

    /// Insert a row ahead of all others. Returns false if the key exists.
    ///
    /// The row's priority is raised to the current front's so the
    /// descending order still holds.
    pub fn insert_front(&mut self, mut row: Row) -> bool {
        if self.contains(&row.key) {
            return false;
        }
        if let Some(first) = self.rows.first() {
            row.priority = row.priority.max(first.priority);
        }
        self.rows.insert(0, row);
        self.reindex();
        true
    }

    /// Set a row's status, returning the previous one
    pub fn set_status(&mut self, key: &RowKey, status: Status) -> Option<Status> {
        let i = self.position(key)?;
        Some(std::mem::replace(&mut self.rows[i].status, status))
    }

    pub fn set_details(&mut self, key: &RowKey, details: RowDetails) -> bool {
        match self.position(key) {
            Some(i) => {
                self.rows[i].details = details;
                true
            }
            None => false,
        }
    }

    pub fn set_progress(&mut self, key: &RowKey, progress: Progress) -> bool {
        match self.position(key) {
            Some(i) => {
                self.rows[i].progress = Some(progress);
                true
            }
            None => false,
        }
    }

    /// Give `key` a new priority and place it at `new_index`.
    ///
    /// The caller is responsible for choosing a priority that belongs at
    /// that position; the other rows are not touched.
    pub fn move_to(&mut self, key: &RowKey, new_index: usize, priority: i64) -> bool {
        let Some(from) = self.position(key) else {
            return false;
        };
        let mut row = self.rows.remove(from);
        row.priority = priority;
        let to = new_index.min(self.rows.len());
        self.rows.insert(to, row);
        self.reindex();
        true
    }

    /// Apply several priorities at once and restore descending order.
    ///
    /// The sort is stable, so rows with equal priorities keep their
    /// relative order.
    pub fn apply_priorities(&mut self, assignments: &[(RowKey, i64)]) {
        for (key, priority) in assignments {
            if let Some(i) = self.position(key) {
                self.rows[i].priority = *priority;
            }
        }
        self.rows.sort_by(|a, b| b.priority.cmp(&a.priority));
        self.reindex();
    }

    fn load(&mut self, rows: Vec<Row>) {
        self.rows.clear();
        self.index.clear();
        for row in rows {
            if self.index.contains_key(&row.key) {
                tracing::warn!("Dropping duplicate row '{}' from refresh", row.key);
                continue;
            }
            self.index.insert(row.key.clone(), self.rows.len());
            self.rows.push(row);
        }
    }

    fn reindex(&mut self) {
        self.index = self
            .rows
            .iter()
            .enumerate()
            .map(|(i, r)| (r.key.clone(), i))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(key: &str, priority: i64) -> Row {
        Row {
            priority,
            ..Row::minimal(RowKey::from(key), Status::Pending)
        }
    }

    fn collection(priorities: &[(&str, i64)]) -> RowCollection {
        RowCollection::from_rows(priorities.iter().map(|(k, p)| row(k, *p)).collect())
    }

    #[test]
    fn lookup_by_key() {
        let rows = collection(&[("a", 30), ("b", 20), ("c", 10)]);
        assert_eq!(rows.position(&"b".into()), Some(1));
        assert_eq!(rows.get(&"c".into()).unwrap().priority, 10);
        assert!(rows.get(&"z".into()).is_none());
    }

    #[test]
    fn replace_all_bumps_epoch_and_keeps_order() {
        let mut rows = collection(&[("a", 30)]);
        assert_eq!(rows.epoch(), 0);
        rows.replace_all(vec![row("x", 1), row("y", 5)]);
        assert_eq!(rows.epoch(), 1);
        assert_eq!(rows.keys(), vec![RowKey::from("x"), RowKey::from("y")]);
        assert!(!rows.contains(&"a".into()));
    }

    #[test]
    fn duplicate_keys_in_refresh_keep_first() {
        let rows = RowCollection::from_rows(vec![row("a", 3), row("a", 2), row("b", 1)]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows.get(&"a".into()).unwrap().priority, 3);
    }

    #[test]
    fn insert_front_rejects_existing_key() {
        let mut rows = collection(&[("a", 0)]);
        assert!(!rows.insert_front(row("a", 0)));
        assert!(rows.insert_front(row("b", 0)));
        assert_eq!(rows.keys(), vec![RowKey::from("b"), RowKey::from("a")]);
        assert_eq!(rows.position(&"a".into()), Some(1));
    }

    #[test]
    fn insert_front_raises_priority_to_keep_order() {
        let mut rows = collection(&[("a", 7)]);
        rows.insert_front(row("b", 0));
        assert_eq!(rows.priorities(), vec![7, 7]);
    }

    #[test]
    fn move_to_repositions_only_the_moved_row() {
        let mut rows = collection(&[("a", 50), ("b", 40), ("c", 30)]);
        assert!(rows.move_to(&"c".into(), 0, 60));
        assert_eq!(rows.priorities(), vec![60, 50, 40]);
        assert_eq!(rows.position(&"c".into()), Some(0));
        assert_eq!(rows.position(&"b".into()), Some(2));
    }

    #[test]
    fn move_to_unknown_key_is_noop() {
        let mut rows = collection(&[("a", 50)]);
        assert!(!rows.move_to(&"z".into(), 0, 10));
        assert_eq!(rows.priorities(), vec![50]);
    }

    #[test]
    fn apply_priorities_resorts() {
        let mut rows = collection(&[("a", 30), ("b", 20), ("c", 10)]);
        rows.apply_priorities(&[("c".into(), 100), ("a".into(), 5)]);
        assert_eq!(
            rows.keys(),
            vec![RowKey::from("c"), RowKey::from("b"), RowKey::from("a")]
        );
        assert_eq!(rows.position(&"a".into()), Some(2));
    }

    #[test]
    fn set_status_returns_previous() {
        let mut rows = collection(&[("a", 1)]);
        assert_eq!(
            rows.set_status(&"a".into(), Status::Active),
            Some(Status::Pending)
        );
        assert_eq!(rows.set_status(&"z".into(), Status::Active), None);
    }
}
