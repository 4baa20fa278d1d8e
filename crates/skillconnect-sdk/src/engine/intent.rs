//! Intent tagging for optimistic fields
//!
//! Each optimistic change to a field is an *intent*. The ledger remembers,
//! per field, the newest pending intent and the last value the server
//! acknowledged (the baseline). Responses are reconciled against it:
//!
//! | response                 | newest intent | older intent            |
//! |--------------------------|---------------|-------------------------|
//! | success                  | field stable  | baseline := its value   |
//! | failure                  | revert        | ignored                 |
//!
//! Once a field is stable again, any response still in flight for it is
//! discarded. Local state always ends at the last user intent that was not
//! rejected.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use crate::error::SdkError;

/// Tag carried by one outgoing call
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IntentId(u64);

impl fmt::Display for IntentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Per-field state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldPhase {
    Stable,
    OptimisticallyApplied(IntentId),
}

/// How a mutation ended, as seen by the caller that issued it
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T = ()> {
    /// The server accepted it and local state already reflects it
    Confirmed(T),
    /// A newer intent on the same field took over; this response was
    /// reconciled silently
    Superseded,
    /// The server rejected it and the local change was undone
    Reverted(SdkError),
    /// The server rejected it and local state was re-fetched
    Resynced(SdkError),
}

impl<T> Outcome<T> {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Outcome::Confirmed(_))
    }

    pub fn error(&self) -> Option<&SdkError> {
        match self {
            Outcome::Reverted(e) | Outcome::Resynced(e) => Some(e),
            _ => None,
        }
    }

    pub fn into_confirmed(self) -> Option<T> {
        match self {
            Outcome::Confirmed(value) => Some(value),
            _ => None,
        }
    }
}

/// Result of reconciling a success response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acknowledged {
    /// The newest intent; the field is stable
    Current,
    /// An older intent; only the baseline moved
    Stale,
}

#[derive(Debug)]
struct Entry<V> {
    baseline: V,
    pending: IntentId,
    /// First intent of this run; older ids belong to a run already resolved
    opened: IntentId,
}

/// Pending intents and baselines for one kind of field
#[derive(Debug)]
pub struct IntentLedger<K, V> {
    next: u64,
    entries: HashMap<K, Entry<V>>,
}

impl<K: Eq + Hash, V: Clone> IntentLedger<K, V> {
    pub fn new() -> Self {
        Self {
            next: 0,
            entries: HashMap::new(),
        }
    }

    /// Register a new intent on `key`, superseding any pending one.
    ///
    /// `before` is the field's value before this intent was applied; it
    /// becomes the baseline only when the field was stable.
    pub fn begin(&mut self, key: K, before: V) -> IntentId {
        self.next += 1;
        let id = IntentId(self.next);
        self.entries
            .entry(key)
            .and_modify(|e| e.pending = id)
            .or_insert(Entry {
                baseline: before,
                pending: id,
                opened: id,
            });
        id
    }

    pub fn phase(&self, key: &K) -> FieldPhase {
        match self.entries.get(key) {
            Some(entry) => FieldPhase::OptimisticallyApplied(entry.pending),
            None => FieldPhase::Stable,
        }
    }

    pub fn is_current(&self, key: &K, id: IntentId) -> bool {
        self.phase(key) == FieldPhase::OptimisticallyApplied(id)
    }

    /// Reconcile a success carrying the value the server stored
    pub fn confirm(&mut self, key: &K, id: IntentId, stored: V) -> Acknowledged {
        match self.entries.get_mut(key) {
            Some(entry) if entry.pending == id => {
                self.entries.remove(key);
                Acknowledged::Current
            }
            Some(entry) if id >= entry.opened => {
                entry.baseline = stored;
                Acknowledged::Stale
            }
            _ => Acknowledged::Stale,
        }
    }

    /// Reconcile a failure. Returns the baseline to restore when `id` is the
    /// newest intent, `None` when the failure is stale.
    pub fn fail(&mut self, key: &K, id: IntentId) -> Option<V> {
        match self.entries.get(key) {
            Some(entry) if entry.pending == id => self.entries.remove(key).map(|e| e.baseline),
            _ => None,
        }
    }

    /// Drop every pending intent; used when local state is replaced
    /// wholesale from the server
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drop pending intents for one key
    pub fn forget(&mut self, key: &K) {
        self.entries.remove(key);
    }

    pub fn pending_count(&self) -> usize {
        self.entries.len()
    }
}

impl<K: Eq + Hash, V: Clone> Default for IntentLedger<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
