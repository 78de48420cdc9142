//! Write-behind persistence of progress records.
//!
//! Callers hand records to [`WriteBehindQueue::schedule`], which never
//! blocks: the record lands in a pending map keyed by `(actor, quest)` and a
//! background worker is woken. A newer revision for the same key replaces an
//! older one that has not been picked up yet, so the queue holds at most one
//! entry per live record. The worker upserts drained records with bounded
//! concurrency and a bounded retry policy. A failed write is logged and
//! counted; it never reaches the caller and never touches the cache.
//!
//! Until a record has landed it stays visible through
//! [`WriteBehindQueue::unwritten_for`], either as pending or as being
//! written, so a session load can overlay it on what the store returned.
//!
//! ```text
//! schedule() --> pending (DashMap) --notify--> worker --> drain --> upsert (retry)
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures_util::StreamExt;
use questline_core::ids::{ActorId, QuestId};
use questline_core::repository::{ProgressRepository, StoredProgress};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::PersistenceError;

/// Retry and concurrency policy for durable writes.
#[derive(Debug, Clone)]
pub struct WritePolicy {
    /// Attempts per record before giving up. At least 1 is always made.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubled for each later one.
    pub retry_backoff: Duration,
    /// Upserts issued concurrently by one drain.
    pub concurrency: usize,
}

/// Counters describing the queue's lifetime activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    /// Records handed to `schedule`.
    pub scheduled: u64,
    /// Records replaced by a newer revision before being written.
    pub coalesced: u64,
    /// Successful upserts.
    pub written: u64,
    /// Records given up after exhausting retries.
    pub failed: u64,
}

type RecordKey = (ActorId, QuestId);

struct Shared {
    repo: Arc<dyn ProgressRepository>,
    policy: WritePolicy,
    pending: DashMap<RecordKey, StoredProgress>,
    /// Highest revision currently being written per key.
    writing: DashMap<RecordKey, StoredProgress>,
    in_flight: AtomicUsize,
    wake: Notify,
    scheduled: AtomicU64,
    coalesced: AtomicU64,
    written: AtomicU64,
    failed: AtomicU64,
}

impl Shared {
    fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.in_flight.load(Ordering::SeqCst) == 0
    }

    /// Takes everything pending and writes it, repeating until nothing is
    /// left.
    async fn drain(&self) {
        loop {
            let keys: Vec<RecordKey> = self.pending.iter().map(|e| *e.key()).collect();
            let mut batch = Vec::with_capacity(keys.len());
            for key in keys {
                let Entry::Occupied(queued) = self.pending.entry(key) else {
                    continue;
                };
                // Count and track before removing so neither `is_idle` nor
                // `unwritten_for` ever sees a gap.
                self.in_flight.fetch_add(1, Ordering::SeqCst);
                self.track_writing(queued.get());
                batch.push(queued.remove());
            }
            if batch.is_empty() {
                return;
            }

            futures_util::stream::iter(batch)
                .for_each_concurrent(self.policy.concurrency.max(1), |record| async move {
                    if let Err(e) = self.persist(&record).await {
                        self.failed.fetch_add(1, Ordering::Relaxed);
                        tracing::error!(
                            actor_id = %e.actor_id,
                            quest_id = %e.quest_id,
                            attempts = e.attempts,
                            error = %e.source,
                            "Giving up on progress write"
                        );
                    }
                    self.writing.remove_if(&(record.actor_id, record.quest_id), |_, current| {
                        current.revision == record.revision
                    });
                    self.in_flight.fetch_sub(1, Ordering::SeqCst);
                })
                .await;
        }
    }

    fn track_writing(&self, record: &StoredProgress) {
        match self.writing.entry((record.actor_id, record.quest_id)) {
            Entry::Occupied(mut current) => {
                if current.get().revision < record.revision {
                    current.insert(record.clone());
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
            }
        }
    }

    async fn persist(&self, record: &StoredProgress) -> Result<(), PersistenceError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut backoff = self.policy.retry_backoff;
        let mut attempt = 1;
        loop {
            match self.repo.upsert_progress(record).await {
                Ok(()) => {
                    self.written.fetch_add(1, Ordering::Relaxed);
                    return Ok(());
                }
                Err(source) if attempt >= max_attempts => {
                    return Err(PersistenceError {
                        actor_id: record.actor_id,
                        quest_id: record.quest_id,
                        attempts: attempt,
                        source,
                    });
                }
                Err(e) => {
                    if self.superseded(record) {
                        tracing::debug!(
                            actor_id = %record.actor_id,
                            quest_id = %record.quest_id,
                            "Newer revision pending, dropping failed write"
                        );
                        return Ok(());
                    }
                    tracing::warn!(
                        actor_id = %record.actor_id,
                        quest_id = %record.quest_id,
                        attempt,
                        error = %e,
                        "Progress write failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                    attempt += 1;
                }
            }
        }
    }

    fn superseded(&self, record: &StoredProgress) -> bool {
        self.pending
            .get(&(record.actor_id, record.quest_id))
            .is_some_and(|newer| newer.revision > record.revision)
    }
}

/// Background write-behind queue in front of a [`ProgressRepository`].
pub struct WriteBehindQueue {
    shared: Arc<Shared>,
    cancel: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for WriteBehindQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteBehindQueue")
            .field("pending", &self.shared.pending.len())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl WriteBehindQueue {
    /// Starts the queue and its worker task.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn spawn(repo: Arc<dyn ProgressRepository>, policy: WritePolicy) -> Self {
        let shared = Arc::new(Shared {
            repo,
            policy,
            pending: DashMap::new(),
            writing: DashMap::new(),
            in_flight: AtomicUsize::new(0),
            wake: Notify::new(),
            scheduled: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
            written: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        });
        let cancel = CancellationToken::new();
        let worker = tokio::spawn(run_worker(Arc::clone(&shared), cancel.clone()));
        Self {
            shared,
            cancel,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Queues `record` for a durable upsert. Never blocks and never fails.
    pub fn schedule(&self, record: StoredProgress) {
        self.shared.scheduled.fetch_add(1, Ordering::Relaxed);
        match self.shared.pending.entry((record.actor_id, record.quest_id)) {
            Entry::Occupied(mut queued) => {
                self.shared.coalesced.fetch_add(1, Ordering::Relaxed);
                if queued.get().revision < record.revision {
                    queued.insert(record);
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(record);
            }
        }
        self.shared.wake.notify_one();
    }

    /// Number of records waiting to be picked up.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.shared.pending.len()
    }

    /// Every record of `actor_id` that has not landed yet, pending or being
    /// written, with the highest revision per quest.
    #[must_use]
    pub fn unwritten_for(&self, actor_id: ActorId) -> Vec<StoredProgress> {
        // Pending first: a drained record is tracked as writing before it
        // leaves the pending map.
        let pending: Vec<StoredProgress> = self
            .shared
            .pending
            .iter()
            .filter(|e| e.key().0 == actor_id)
            .map(|e| e.value().clone())
            .collect();
        let writing: Vec<StoredProgress> = self
            .shared
            .writing
            .iter()
            .filter(|e| e.key().0 == actor_id)
            .map(|e| e.value().clone())
            .collect();

        let mut latest: HashMap<QuestId, StoredProgress> = HashMap::new();
        for record in pending.into_iter().chain(writing) {
            if latest
                .get(&record.quest_id)
                .is_none_or(|kept| kept.revision < record.revision)
            {
                latest.insert(record.quest_id, record);
            }
        }
        latest.into_values().collect()
    }

    /// Lifetime counters.
    #[must_use]
    pub fn stats(&self) -> WriteStats {
        WriteStats {
            scheduled: self.shared.scheduled.load(Ordering::Relaxed),
            coalesced: self.shared.coalesced.load(Ordering::Relaxed),
            written: self.shared.written.load(Ordering::Relaxed),
            failed: self.shared.failed.load(Ordering::Relaxed),
        }
    }

    /// Waits until every record scheduled so far has been written or given
    /// up.
    pub async fn flush(&self) {
        loop {
            self.shared.drain().await;
            if self.shared.is_idle() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    /// Stops the worker and writes whatever is still pending, giving up once
    /// `deadline` has passed. Returns the number of records left unwritten.
    pub async fn shutdown(&self, deadline: Duration) -> usize {
        self.cancel.cancel();
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let pending = self.pending_len();
        let drained = tokio::time::timeout(deadline, async {
            if let Some(worker) = worker {
                if let Err(e) = worker.await {
                    tracing::error!(error = %e, "Write-behind worker panicked");
                }
            }
            self.flush().await;
        })
        .await;

        let remaining = self.pending_len() + self.shared.in_flight.load(Ordering::SeqCst);
        match drained {
            Ok(()) => tracing::info!(drained = pending, "Write-behind queue drained"),
            Err(_) => tracing::warn!(
                remaining,
                ?deadline,
                "Write-behind drain deadline exceeded, unwritten progress dropped"
            ),
        }
        remaining
    }
}

impl Drop for WriteBehindQueue {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_worker(shared: Arc<Shared>, cancel: CancellationToken) {
    tracing::debug!("Write-behind worker started");
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = shared.wake.notified() => {}
        }
        shared.drain().await;
    }
    tracing::debug!("Write-behind worker stopped");
}
