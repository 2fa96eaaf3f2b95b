use std::collections::HashSet;

/// Direction for keyboard reordering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Up,
    Down,
}

/// Pointer-driven reorder in progress
#[derive(Debug, Clone, Copy)]
pub struct DragSession {
    pub dragged_index: usize,
    pub drag_over_index: Option<usize>,
}

/// User-defined display order over the aggregated task collection.
///
/// Seeded once from the first non-empty fetch and never re-seeded; later
/// fetches only reconcile: surviving keys keep their relative order, vanished
/// keys are dropped, new keys are appended in fetch order. The store is the
/// one piece of state mutated from two event sources (refresh vs. drag), so a
/// refresh that lands mid-drag is parked until the drag ends.
#[derive(Debug, Default)]
pub struct OrderingStore {
    keys: Vec<String>,
    seeded: bool,
    drag: Option<DragSession>,
    pending: Option<Vec<String>>,
}

impl OrderingStore {
    /// Restore a previously saved order (counts as seeded when non-empty)
    pub fn from_saved(keys: Vec<String>) -> Self {
        let seeded = !keys.is_empty();
        Self {
            keys,
            seeded,
            drag: None,
            pending: None,
        }
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn position(&self, key: &str) -> Option<usize> {
        self.keys.iter().position(|k| k == key)
    }

    /// Fold a fresh fetch into the stored order
    pub fn reconcile(&mut self, fetched: Vec<String>) {
        if self.drag.is_some() {
            self.pending = Some(fetched);
            return;
        }
        self.apply_reconcile(fetched);
    }

    fn apply_reconcile(&mut self, fetched: Vec<String>) {
        if !self.seeded {
            if fetched.is_empty() {
                return;
            }
            self.keys = fetched;
            self.seeded = true;
            return;
        }

        let incoming: HashSet<&str> = fetched.iter().map(|k| k.as_str()).collect();
        self.keys.retain(|k| incoming.contains(k.as_str()));
        let existing: HashSet<String> = self.keys.iter().cloned().collect();
        for key in fetched {
            if !existing.contains(&key) {
                self.keys.push(key);
            }
        }
    }

    /// Adjacent swap; returns false when the move falls off either end
    pub fn move_task(&mut self, index: usize, direction: MoveDirection) -> bool {
        match direction {
            MoveDirection::Up => {
                if index == 0 || index >= self.keys.len() {
                    return false;
                }
                self.keys.swap(index - 1, index);
                true
            }
            MoveDirection::Down => {
                if index + 1 >= self.keys.len() {
                    return false;
                }
                self.keys.swap(index, index + 1);
                true
            }
        }
    }

    /// Full-list replace (drag-and-drop commit from the rendering layer)
    pub fn replace(&mut self, new_order: Vec<String>) {
        self.keys = new_order;
        self.seeded = self.seeded || !self.keys.is_empty();
    }

    pub fn begin_drag(&mut self, index: usize) {
        if index < self.keys.len() {
            self.drag = Some(DragSession {
                dragged_index: index,
                drag_over_index: None,
            });
        }
    }

    pub fn drag_over(&mut self, index: usize) {
        if let Some(drag) = self.drag.as_mut() {
            drag.drag_over_index = Some(index);
        }
    }

    pub fn drag(&self) -> Option<&DragSession> {
        self.drag.as_ref()
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Commit the drag: removal at the source, insertion at the target.
    /// A no-op when the source equals the target or either is unset.
    pub fn drop_drag(&mut self) -> bool {
        let moved = match self.drag.take() {
            Some(DragSession {
                dragged_index,
                drag_over_index: Some(target),
            }) if dragged_index != target
                && dragged_index < self.keys.len()
                && target < self.keys.len() =>
            {
                let key = self.keys.remove(dragged_index);
                self.keys.insert(target, key);
                true
            }
            _ => false,
        };
        if let Some(pending) = self.pending.take() {
            self.apply_reconcile(pending);
        }
        moved
    }

    pub fn cancel_drag(&mut self) {
        self.drag = None;
        if let Some(pending) = self.pending.take() {
            self.apply_reconcile(pending);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_seeds_from_first_non_empty_fetch_only() {
        let mut store = OrderingStore::default();
        store.reconcile(Vec::new());
        assert!(store.keys().is_empty());

        store.reconcile(keys(&["p:a", "p:b"]));
        assert_eq!(store.keys(), &keys(&["p:a", "p:b"])[..]);

        // A later fetch in a different order does not re-seed
        store.reconcile(keys(&["p:b", "p:a"]));
        assert_eq!(store.keys(), &keys(&["p:a", "p:b"])[..]);
    }

    #[test]
    fn test_reconcile_drops_and_appends() {
        let mut store = OrderingStore::from_saved(keys(&["p:a", "p:b", "p:c"]));
        store.reconcile(keys(&["p:b", "p:c", "p:d"]));
        assert_eq!(store.keys(), &keys(&["p:b", "p:c", "p:d"])[..]);
    }

    #[test]
    fn test_move_up_swaps_adjacent_and_leaves_rest() {
        let mut store = OrderingStore::from_saved(keys(&["p:a", "p:b", "p:c", "p:d"]));
        assert!(store.move_task(2, MoveDirection::Up));
        assert_eq!(store.keys(), &keys(&["p:a", "p:c", "p:b", "p:d"])[..]);

        assert!(!store.move_task(0, MoveDirection::Up));
        assert!(!store.move_task(3, MoveDirection::Down));
    }

    #[test]
    fn test_drag_matches_remove_then_insert() {
        let mut store = OrderingStore::from_saved(keys(&["p:a", "p:b", "p:c", "p:d"]));
        store.begin_drag(0);
        store.drag_over(2);
        assert!(store.drop_drag());

        let mut expected = keys(&["p:a", "p:b", "p:c", "p:d"]);
        let k = expected.remove(0);
        expected.insert(2, k);
        assert_eq!(store.keys(), &expected[..]);
    }

    #[test]
    fn test_drop_is_noop_without_target_or_onto_self() {
        let mut store = OrderingStore::from_saved(keys(&["p:a", "p:b"]));
        store.begin_drag(1);
        assert!(!store.drop_drag());
        assert_eq!(store.keys(), &keys(&["p:a", "p:b"])[..]);

        store.begin_drag(1);
        store.drag_over(1);
        assert!(!store.drop_drag());
        assert_eq!(store.keys(), &keys(&["p:a", "p:b"])[..]);
    }

    #[test]
    fn test_refresh_during_drag_is_deferred() {
        let mut store = OrderingStore::from_saved(keys(&["p:a", "p:b", "p:c"]));
        store.begin_drag(0);
        store.drag_over(2);

        // Refresh lands mid-drag: order must not change yet
        store.reconcile(keys(&["p:b", "p:c", "p:d"]));
        assert_eq!(store.keys(), &keys(&["p:a", "p:b", "p:c"])[..]);

        // Drop applies the permutation, then the parked reconcile
        assert!(store.drop_drag());
        assert_eq!(store.keys(), &keys(&["p:b", "p:c", "p:d"])[..]);
    }

    #[test]
    fn test_replace_installs_a_full_new_order() {
        let mut store = OrderingStore::default();
        store.replace(keys(&["p:c", "p:a", "p:b"]));
        assert_eq!(store.keys(), &keys(&["p:c", "p:a", "p:b"])[..]);

        // Replace counts as seeding; the next fetch reconciles instead
        store.reconcile(keys(&["p:a", "p:b"]));
        assert_eq!(store.keys(), &keys(&["p:a", "p:b"])[..]);
    }

    #[test]
    fn test_cancel_drag_applies_parked_reconcile() {
        let mut store = OrderingStore::from_saved(keys(&["p:a", "p:b"]));
        store.begin_drag(0);
        store.reconcile(keys(&["p:b"]));
        store.cancel_drag();
        assert_eq!(store.keys(), &keys(&["p:b"])[..]);
        assert!(!store.is_dragging());
    }
}
