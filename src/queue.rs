//! Bounded FIFO task queue keyed by task id.
//!
//! At most `max_concurrent` tasks run at once; the rest wait in arrival
//! order. An id that is already queued or running is rejected, so the same
//! paragraph is never requested twice concurrently.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::oneshot;

#[derive(Debug, Default)]
struct QueueState {
    active: usize,
    waiting: VecDeque<oneshot::Sender<()>>,
    tracked: HashMap<String, u64>,
    next_ticket: u64,
}

/// Concurrency-limited queue of async tasks.
///
/// Cloning is cheap; clones share the same slots and waiters.
#[derive(Debug, Clone)]
pub struct TaskQueue {
    max_concurrent: usize,
    state: Arc<Mutex<QueueState>>,
}

impl TaskQueue {
    /// Create a queue running at most `max_concurrent` tasks (minimum 1).
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
            state: Arc::new(Mutex::new(QueueState::default())),
        }
    }

    /// Run `task` once a slot is free.
    ///
    /// Returns `None` without running the task when `id` is already queued
    /// or running, or when the queue is cleared while the task waits.
    /// The id is released when the task settles or the returned future is
    /// dropped, whichever comes first.
    pub async fn enqueue<F, T>(&self, id: impl Into<String>, task: F) -> Option<T>
    where
        F: Future<Output = T>,
    {
        let id = id.into();
        let mut ticket = {
            let mut state = self.lock();
            if state.tracked.contains_key(&id) {
                log::debug!("task {} already queued; ignoring", id);
                return None;
            }
            let number = state.next_ticket;
            state.next_ticket += 1;
            state.tracked.insert(id.clone(), number);

            let slot = if state.active < self.max_concurrent {
                state.active += 1;
                Slot::Held
            } else {
                let (tx, rx) = oneshot::channel();
                state.waiting.push_back(tx);
                Slot::Waiting(rx)
            };
            Ticket {
                queue: self,
                id,
                number,
                slot,
            }
        };

        let granted = match &mut ticket.slot {
            Slot::Waiting(rx) => rx.await.is_ok(),
            _ => true,
        };
        if !granted {
            log::debug!("task {} dropped from cleared queue", ticket.id);
            ticket.slot = Slot::Released;
            return None;
        }
        ticket.slot = Slot::Held;

        Some(task.await)
    }

    /// Check whether a task id is queued or running.
    pub fn has(&self, id: &str) -> bool {
        self.lock().tracked.contains_key(id)
    }

    /// Number of running tasks.
    pub fn active(&self) -> usize {
        self.lock().active
    }

    /// Number of tasks waiting for a slot.
    pub fn waiting(&self) -> usize {
        self.lock()
            .waiting
            .iter()
            .filter(|tx| !tx.is_closed())
            .count()
    }

    /// Maximum number of concurrently running tasks.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Abandon every waiting task and forget all tracked ids.
    ///
    /// Running tasks are not interrupted; they release their slots when
    /// they settle.
    pub fn clear(&self) {
        let mut state = self.lock();
        let abandoned = state.waiting.len();
        state.waiting.clear();
        state.tracked.clear();
        log::debug!(
            "queue cleared ({} waiting abandoned, {} running)",
            abandoned,
            state.active
        );
    }

    fn release(&self, id: &str, number: u64, granted: bool) {
        let mut state = self.lock();
        if state.tracked.get(id) == Some(&number) {
            state.tracked.remove(id);
        }
        if granted {
            state.active = state.active.saturating_sub(1);
        }
        while state.active < self.max_concurrent {
            let Some(waiter) = state.waiting.pop_front() else {
                break;
            };
            if waiter.send(()).is_ok() {
                state.active += 1;
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

enum Slot {
    Held,
    Waiting(oneshot::Receiver<()>),
    Released,
}

/// Releases the id and slot of one enqueued task on drop.
struct Ticket<'a> {
    queue: &'a TaskQueue,
    id: String,
    number: u64,
    slot: Slot,
}

impl Drop for Ticket<'_> {
    fn drop(&mut self) {
        let granted = match &mut self.slot {
            Slot::Held => true,
            // A slot may have been handed over after the last poll.
            Slot::Waiting(rx) => rx.try_recv().is_ok(),
            Slot::Released => false,
        };
        self.queue.release(&self.id, self.number, granted);
    }
}
