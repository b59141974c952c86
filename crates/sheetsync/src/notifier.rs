//! Change notification
//!
//! Every flush produces one [`ChangeSet`]: the cells whose visible value
//! differs from what it was before the flush window opened, sorted by
//! [`CellKey`]. Subscribers are called synchronously, in registration order,
//! before the mutating call returns. They only see the change-set, so they
//! cannot reach back into the session.

use sheetsync_core::{CellKey, CellValue};

/// Cells whose value changed in one flush, sorted by address
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    entries: Vec<(CellKey, CellValue)>,
}

impl ChangeSet {
    /// Build from entries already sorted by key
    pub(crate) fn from_sorted(entries: Vec<(CellKey, CellValue)>) -> Self {
        debug_assert!(entries.windows(2).all(|w| w[0].0 < w[1].0));
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The `(address, new value)` pairs
    pub fn entries(&self) -> &[(CellKey, CellValue)] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &(CellKey, CellValue)> {
        self.entries.iter()
    }

    /// Changed addresses in order
    pub fn keys(&self) -> impl Iterator<Item = CellKey> + '_ {
        self.entries.iter().map(|(key, _)| *key)
    }

    /// New value of a changed cell
    pub fn get(&self, key: CellKey) -> Option<&CellValue> {
        self.entries
            .binary_search_by(|(k, _)| k.cmp(&key))
            .ok()
            .map(|i| &self.entries[i].1)
    }

    pub fn contains(&self, key: CellKey) -> bool {
        self.get(key).is_some()
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = &'a (CellKey, CellValue);
    type IntoIter = std::slice::Iter<'a, (CellKey, CellValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Handle returned by [`Session::subscribe`](crate::Session::subscribe)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Callback = Box<dyn FnMut(&ChangeSet)>;

/// Observer list owned by one session
#[derive(Default)]
pub(crate) struct Notifier {
    next_id: u64,
    subscribers: Vec<(SubscriptionId, Callback)>,
}

impl Notifier {
    pub(crate) fn subscribe(&mut self, callback: Callback) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, callback));
        id
    }

    pub(crate) fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub, _)| *sub != id);
        self.subscribers.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub(crate) fn notify(&mut self, changes: &ChangeSet) {
        for (_, callback) in self.subscribers.iter_mut() {
            callback(changes);
        }
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
