use crate::domain::{Ledger, LedgerEvent, LedgerKey, LedgerTransition, OperationId, Revision};
use crate::ports::ledger_store::{LedgerStore as LedgerStoreTrait, Result, WriteOutcome};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tokio_stream::wrappers::{BroadcastStream, errors::BroadcastStreamRecvError};

/// Default number of buffered change notifications per subscriber.
pub const DEFAULT_CHANGE_BUFFER: usize = 64;

/// Default number of commit records kept across all ledgers.
pub const DEFAULT_HISTORY_LIMIT: usize = 1024;

/// In-memory implementation of LedgerStore
///
/// Holds every ledger behind a single mutex, so the revision check and the write
/// happen atomically. Change notifications are fanned out with a broadcast channel
/// and are sent while the lock is held, which keeps delivery order equal to commit order.
///
/// A subscriber that falls behind the buffer receives the current ledger in place of
/// the dropped intermediates.
///
/// Commit history is bounded: only the most recent `history_limit` records are kept,
/// oldest dropped first.
#[derive(Clone)]
pub struct LedgerStore {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<State>,
    changes: broadcast::Sender<(LedgerKey, Ledger)>,
    history_limit: usize,
}

#[derive(Default)]
struct State {
    ledgers: HashMap<LedgerKey, Ledger>,
    history: VecDeque<(LedgerKey, LedgerEvent)>,
}

impl State {
    fn load_or_init(&mut self, key: &LedgerKey) -> Ledger {
        self.ledgers
            .entry(key.clone())
            .or_insert_with(Ledger::empty)
            .clone()
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn load_or_init(&self, key: &LedgerKey) -> Ledger {
        self.lock().load_or_init(key)
    }
}

impl LedgerStore {
    pub fn new() -> Self {
        Self::with_change_buffer(DEFAULT_CHANGE_BUFFER)
    }

    pub fn with_change_buffer(capacity: usize) -> Self {
        Self::with_limits(capacity, DEFAULT_HISTORY_LIMIT)
    }

    pub fn with_limits(change_buffer: usize, history_limit: usize) -> Self {
        let (changes, _) = broadcast::channel(change_buffer.max(1));
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::default()),
                changes,
                history_limit: history_limit.max(1),
            }),
        }
    }

    /// Retained commit records for a ledger, in commit order
    pub fn history(&self, key: &LedgerKey) -> Vec<LedgerEvent> {
        self.inner
            .lock()
            .history
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, event)| event.clone())
            .collect()
    }
}

impl Default for LedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerStoreTrait for LedgerStore {
    async fn load_or_init(&self, key: &LedgerKey) -> Result<Ledger> {
        Ok(self.inner.load_or_init(key))
    }

    async fn compare_and_swap(
        &self,
        key: &LedgerKey,
        transition: &LedgerTransition,
    ) -> Result<WriteOutcome> {
        let mut state = self.inner.lock();

        let current = state
            .ledgers
            .entry(key.clone())
            .or_insert_with(Ledger::empty);

        if current.revision() != transition.expected {
            return Ok(WriteOutcome::Conflict {
                current: current.revision(),
            });
        }

        *current = transition.next.clone();
        if state.history.len() >= self.inner.history_limit {
            state.history.pop_front();
        }
        state
            .history
            .push_back((key.clone(), transition.event.clone()));

        // No receivers is not an error: nobody is watching yet.
        let _ = self
            .inner
            .changes
            .send((key.clone(), transition.next.clone()));

        Ok(WriteOutcome::Committed(transition.next.clone()))
    }

    async fn find_commit(
        &self,
        key: &LedgerKey,
        operation_id: OperationId,
    ) -> Result<Option<Revision>> {
        Ok(self
            .inner
            .lock()
            .history
            .iter()
            .find(|(k, event)| k == key && event.operation_id() == operation_id)
            .map(|(_, event)| event.revision()))
    }

    fn subscribe(&self, key: &LedgerKey) -> BoxStream<'static, Result<Ledger>> {
        // Commits broadcast under the same lock, so the snapshot and the receiver agree
        // on where the live feed starts.
        let (initial, receiver) = {
            let mut state = self.inner.lock();
            let receiver = self.inner.changes.subscribe();
            (state.load_or_init(key), receiver)
        };
        let initial: Result<Ledger> = Ok(initial);
        let initial = stream::once(futures::future::ready(initial));

        let inner = self.inner.clone();
        let key = key.clone();
        let live = BroadcastStream::new(receiver).filter_map(move |item| {
            let result: Option<Result<Ledger>> = match item {
                Ok((changed, ledger)) if changed == key => Some(Ok(ledger)),
                Ok(_) => None,
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, ledger = %key, "subscriber lagged, coalescing");
                    Some(Ok(inner.load_or_init(&key)))
                }
            };
            futures::future::ready(result)
        });

        initial.chain(live).boxed()
    }
}
