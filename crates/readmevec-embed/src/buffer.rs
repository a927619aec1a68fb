use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use readmevec_core::Item;

struct State {
    items: VecDeque<Item>,
    done: bool,
}

/// A bounded FIFO between file readers and embed workers. `push` blocks
/// while the buffer is at capacity; `pull` blocks until at least `batch_size`
/// items are available or the buffer has been finalized.
///
/// Once `finish()` is called, no further `push` succeeds and every blocked
/// (or future) `pull` drains whatever remains, then returns empty batches —
/// consumers treat an empty batch after `done` as the termination signal.
pub struct AsyncBuffer {
    state: Mutex<State>,
    not_full: Condvar,
    not_empty: Condvar,
    max_size: usize,
}

impl AsyncBuffer {
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self {
            state: Mutex::new(State {
                items: VecDeque::new(),
                done: false,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            max_size: max_size.max(1),
        }
    }

    /// Blocks until there is room, then pushes one item. Silently drops the
    /// item if the buffer has already been finalized (a producer racing a
    /// shutdown has nothing useful to do with it).
    pub fn push(&self, item: Item) {
        let mut state = self.state.lock();
        while state.items.len() >= self.max_size && !state.done {
            self.not_full.wait(&mut state);
        }
        if state.done {
            return;
        }
        state.items.push_back(item);
        self.not_empty.notify_one();
    }

    /// Blocks until at least `batch_size` items are queued, or the buffer
    /// drains to completion. Returns fewer than `batch_size` items only when
    /// `finish()` has been called and the buffer is exhausted; returns an
    /// empty vector exactly once the buffer is both done and empty.
    pub fn pull(&self, batch_size: usize) -> Vec<Item> {
        let mut state = self.state.lock();
        while state.items.len() < batch_size && !state.done {
            self.not_empty.wait(&mut state);
        }
        let take = batch_size.min(state.items.len());
        let batch: Vec<Item> = state.items.drain(..take).collect();
        if !batch.is_empty() {
            self.not_full.notify_all();
        }
        batch
    }

    /// Flips the buffer to draining: wakes every blocked producer and
    /// consumer so they can observe `done` and exit cleanly.
    pub fn finish(&self) {
        let mut state = self.state.lock();
        state.done = true;
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    #[must_use]
    pub fn is_done_and_empty(&self) -> bool {
        let state = self.state.lock();
        state.done && state.items.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shared handle convenience: most callers pass the buffer across tasks.
pub type SharedAsyncBuffer = Arc<AsyncBuffer>;

#[cfg(test)]
mod tests {
    use super::*;
    use readmevec_core::Item;

    fn item(n: u32) -> Item {
        Item::from_raw(format!("repo/{n}"), &format!("readme content number {n}")).unwrap()
    }

    #[test]
    fn pull_waits_for_batch_size_then_returns_it() {
        let buffer = AsyncBuffer::new(10);
        buffer.push(item(1));
        buffer.push(item(2));
        let batch = buffer.pull(2);
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn finish_wakes_pull_with_a_partial_batch() {
        let buffer = AsyncBuffer::new(10);
        buffer.push(item(1));
        buffer.finish();
        let batch = buffer.pull(5);
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn pull_after_drain_and_finish_returns_empty() {
        let buffer = AsyncBuffer::new(10);
        buffer.push(item(1));
        buffer.finish();
        assert_eq!(buffer.pull(5).len(), 1);
        assert!(buffer.pull(5).is_empty());
        assert!(buffer.is_done_and_empty());
    }

    #[test]
    fn push_after_finish_is_a_no_op() {
        let buffer = AsyncBuffer::new(10);
        buffer.finish();
        buffer.push(item(1));
        assert!(buffer.is_empty());
    }

    #[test]
    fn total_consumed_never_exceeds_total_produced() {
        let buffer = AsyncBuffer::new(4);
        for n in 0..10 {
            buffer.push(item(n));
        }
        buffer.finish();
        let mut consumed = 0;
        loop {
            let batch = buffer.pull(3);
            if batch.is_empty() {
                break;
            }
            consumed += batch.len();
        }
        assert_eq!(consumed, 10);
    }
}
