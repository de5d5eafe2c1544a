use anyhow::Result;
use parlay_types::{Key, Value};
use std::{collections::BTreeMap, future::Future};

#[cfg(any(test, feature = "mocks"))]
use std::collections::HashMap;

/// Outcome of a guarded batch write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GuardOutcome {
    /// Every guard held; all changes were applied.
    Applied,
    /// Nothing was applied; the guard at this index was stale.
    Stale(usize),
}

/// A staged change to a single key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Status {
    Update(Value),
    Delete,
}

/// Async key-addressed storage for progression state.
///
/// "No row" (`None`) is distinct from any stored value, including a zero
/// balance.
pub trait State {
    fn get(&self, key: &Key) -> impl Future<Output = Result<Option<Value>>>;
    fn insert(&mut self, key: Key, value: Value) -> impl Future<Output = Result<()>>;
    fn delete(&mut self, key: &Key) -> impl Future<Output = Result<()>>;

    /// Apply `changes` iff every guard key still holds its expected value.
    ///
    /// On a stale guard nothing is applied and the index of the first stale
    /// guard is reported, so callers can distinguish "lost a completion
    /// race" from "balance moved underneath us".
    ///
    /// The default implementation is read-compare-apply, which is atomic
    /// only when writes to the store are serialized (a single writer, an
    /// overlay, or an actor owning the store). Backends with genuine write
    /// concurrency must override this with a native transaction.
    fn apply_guarded(
        &mut self,
        guards: &[(Key, Option<Value>)],
        changes: Vec<(Key, Status)>,
    ) -> impl Future<Output = Result<GuardOutcome>> {
        async move {
            for (index, (key, expected)) in guards.iter().enumerate() {
                if self.get(key).await? != *expected {
                    return Ok(GuardOutcome::Stale(index));
                }
            }
            for (key, status) in changes {
                match status {
                    Status::Update(value) => self.insert(key, value).await?,
                    Status::Delete => self.delete(&key).await?,
                }
            }
            Ok(GuardOutcome::Applied)
        }
    }
}

/// A write buffer over a borrowed store.
///
/// Reads consult pending changes first; writes only stage. `commit` hands
/// the staged changes back so the caller can apply them in one guarded
/// batch against the underlying store.
pub struct Overlay<'a, S: State> {
    state: &'a S,
    pending: BTreeMap<Key, Status>,
}

impl<'a, S: State> Overlay<'a, S> {
    pub fn new(state: &'a S) -> Self {
        Self {
            state,
            pending: BTreeMap::new(),
        }
    }

    /// Consume the overlay, returning the staged changes in key order.
    pub fn commit(self) -> Vec<(Key, Status)> {
        self.pending.into_iter().collect()
    }
}

impl<'a, S: State> State for Overlay<'a, S> {
    async fn get(&self, key: &Key) -> Result<Option<Value>> {
        Ok(match self.pending.get(key) {
            Some(Status::Update(value)) => Some(value.clone()),
            Some(Status::Delete) => None,
            None => self.state.get(key).await?,
        })
    }

    async fn insert(&mut self, key: Key, value: Value) -> Result<()> {
        self.pending.insert(key, Status::Update(value));
        Ok(())
    }

    async fn delete(&mut self, key: &Key) -> Result<()> {
        self.pending.insert(key.clone(), Status::Delete);
        Ok(())
    }
}

/// In-memory store for tests and simulations.
#[cfg(any(test, feature = "mocks"))]
#[derive(Default)]
pub struct Memory {
    state: HashMap<Key, Value>,
}

#[cfg(any(test, feature = "mocks"))]
impl State for Memory {
    async fn get(&self, key: &Key) -> Result<Option<Value>> {
        Ok(self.state.get(key).cloned())
    }

    async fn insert(&mut self, key: Key, value: Value) -> Result<()> {
        self.state.insert(key, value);
        Ok(())
    }

    async fn delete(&mut self, key: &Key) -> Result<()> {
        self.state.remove(key);
        Ok(())
    }
}
