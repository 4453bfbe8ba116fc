//! Capacity Queue - FIFO admission control over a fixed number of slots
//!
//! - At most `capacity` executions hold a slot at once
//! - Excess executions wait in arrival order and are admitted strictly FIFO
//! - A listener is told when an execution is throttled and when it is released
//!
//! Slot accounting is count-based: `dequeue` frees one slot without naming the
//! execution that finished. Callers pair every admission with exactly one
//! `dequeue` or `remove`.

use crate::domain::ExecutionId;
use std::collections::{HashSet, VecDeque};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tracing::debug;

/// Outcome of asking for a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// A slot was free
    Immediate,
    /// Waited in the queue, then got a slot
    Released,
    /// Removed from the queue while waiting, never held a slot
    Cancelled,
    /// Not subject to concurrency control
    Bypassed,
}

impl Admission {
    /// True if the execution may run
    pub fn is_admitted(&self) -> bool {
        !matches!(self, Admission::Cancelled)
    }
}

/// Notification emitted by the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEvent {
    /// Execution had to wait for a slot
    Throttled(ExecutionId),
    /// Execution left the wait queue (admitted or removed)
    Released(ExecutionId),
}

/// Receives queue notifications.
///
/// Events arrive in the order the queue changed state: `Throttled(id)` is
/// always seen before `Released(id)`. Calls are serialized and made outside
/// the state lock; implementations must not call back into the queue.
pub trait QueueListener: Send + Sync {
    fn on_event(&self, event: &QueueEvent);
}

struct PendingEntry {
    execution_id: ExecutionId,
    waiter: oneshot::Sender<Admission>,
}

#[derive(Default)]
struct QueueState {
    running: VecDeque<ExecutionId>, // admission order
    pending: VecDeque<PendingEntry>,
}

impl QueueState {
    /// Fill free slots from the head of the wait queue.
    /// Waiters whose caller stopped listening are dropped without taking a slot.
    fn promote_next(&mut self, capacity: usize) -> Option<ExecutionId> {
        while self.running.len() < capacity {
            let entry = self.pending.pop_front()?;
            if entry.waiter.send(Admission::Released).is_err() {
                debug!(execution_id = %entry.execution_id, "Skipping abandoned waiter");
                continue;
            }
            self.running.push_back(entry.execution_id.clone());
            return Some(entry.execution_id);
        }
        None
    }
}

/// FIFO admission queue bounding the number of running executions
pub struct CapacityQueue {
    capacity: NonZeroUsize,
    state: Mutex<QueueState>,
    // Taken before `state` is released, held while the listener runs
    delivery: Mutex<()>,
    listener: Arc<dyn QueueListener>,
}

impl CapacityQueue {
    pub fn new(capacity: NonZeroUsize, listener: Arc<dyn QueueListener>) -> Self {
        Self {
            capacity,
            state: Mutex::new(QueueState::default()),
            delivery: Mutex::new(()),
            listener,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// Take a slot, waiting in line if none is free.
    ///
    /// Resolves with `Immediate` or `Released` once the execution holds a
    /// slot, or `Cancelled` if it was removed while waiting. There is no
    /// timeout; dropping the future gives up the place in line.
    pub async fn enqueue(&self, execution_id: ExecutionId) -> Admission {
        let rx = {
            let (rx, _delivery) = {
                let mut state = self.lock();
                if state.running.len() < self.capacity.get() {
                    state.running.push_back(execution_id);
                    return Admission::Immediate;
                }
                let (tx, rx) = oneshot::channel();
                state.pending.push_back(PendingEntry {
                    execution_id: execution_id.clone(),
                    waiter: tx,
                });
                (rx, self.lock_delivery())
            };
            self.listener.on_event(&QueueEvent::Throttled(execution_id));
            rx
        };

        rx.await.unwrap_or(Admission::Cancelled)
    }

    /// Free one slot and admit the oldest waiter, if any
    pub fn dequeue(&self) {
        let (released, _delivery) = {
            let mut state = self.lock();
            if state.running.pop_front().is_none() {
                debug!("Dequeue called with no running executions");
            }
            (state.promote_next(self.capacity.get()), self.lock_delivery())
        };

        if let Some(execution_id) = released {
            self.listener.on_event(&QueueEvent::Released(execution_id));
        }
    }

    /// Drop an execution from the queue wherever it is.
    ///
    /// A waiting execution is cancelled and never takes a slot; a running one
    /// gives its slot to the next waiter. Unknown IDs are ignored.
    pub fn remove(&self, execution_id: &str) {
        let (released, _delivery) = {
            let mut state = self.lock();
            let released = if let Some(pos) = state
                .pending
                .iter()
                .position(|entry| entry.execution_id == execution_id)
            {
                state.pending.remove(pos).map(|entry| {
                    // Waiter may already be gone
                    let _ = entry.waiter.send(Admission::Cancelled);
                    entry.execution_id
                })
            } else if let Some(pos) = state.running.iter().position(|id| id == execution_id) {
                state.running.remove(pos);
                state.promote_next(self.capacity.get())
            } else {
                return;
            };
            (released, self.lock_delivery())
        };

        if let Some(execution_id) = released {
            self.listener.on_event(&QueueEvent::Released(execution_id));
        }
    }

    /// All tracked executions, running and waiting
    pub fn get_all(&self) -> HashSet<ExecutionId> {
        let state = self.lock();
        state
            .running
            .iter()
            .cloned()
            .chain(state.pending.iter().map(|entry| entry.execution_id.clone()))
            .collect()
    }

    /// Waiting executions, head of the line first
    pub fn pending_ids(&self) -> Vec<ExecutionId> {
        self.lock()
            .pending
            .iter()
            .map(|entry| entry.execution_id.clone())
            .collect()
    }

    /// Slot holders, oldest admission first
    pub fn running_ids(&self) -> Vec<ExecutionId> {
        self.lock().running.iter().cloned().collect()
    }

    pub fn running_count(&self) -> usize {
        self.lock().running.len()
    }

    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    // No await happens under this lock, so a poisoned state is still consistent
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_delivery(&self) -> MutexGuard<'_, ()> {
        self.delivery.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
