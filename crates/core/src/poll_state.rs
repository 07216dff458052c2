//! Per-worker credit accounting.

use std::sync::Mutex;

/// Tracks in-flight credits for one worker against a fixed maximum.
///
/// `total` is set once at construction; `in_progress` is mutated under a
/// single lock so acquire/release are atomic with respect to each other.
/// Independent `PollState` instances never share a lock.
#[derive(Debug)]
pub struct PollState {
    total: u32,
    in_progress: Mutex<u32>,
}

impl PollState {
    /// Creates a new credit counter with `total` credits, none in flight.
    pub fn new(total: u32) -> Self {
        Self {
            total,
            in_progress: Mutex::new(0),
        }
    }

    /// The configured maximum in-flight count for this worker.
    pub fn total(&self) -> u32 {
        self.total
    }

    /// Current number of credits held.
    pub fn in_progress(&self) -> u32 {
        *self.in_progress.lock().expect("poll state lock poisoned")
    }

    /// Atomically returns and reserves all currently available slack.
    pub fn acquire_max_available(&self) -> u32 {
        let mut in_progress = self.in_progress.lock().expect("poll state lock poisoned");
        let available = self.total.saturating_sub(*in_progress);
        *in_progress += available;
        available
    }

    /// Releases up to `n` credits, floored at zero in-flight.
    pub fn release(&self, n: u32) {
        let mut in_progress = self.in_progress.lock().expect("poll state lock poisoned");
        *in_progress = in_progress.saturating_sub(n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn acquire_drains_and_release_restores() {
        let state = PollState::new(5);
        assert_eq!(state.acquire_max_available(), 5);
        assert_eq!(state.acquire_max_available(), 0);
        state.release(2);
        assert_eq!(state.in_progress(), 3);
        assert_eq!(state.acquire_max_available(), 2);
    }

    #[test]
    fn release_floors_at_zero() {
        let state = PollState::new(3);
        state.acquire_max_available();
        state.release(10);
        assert_eq!(state.in_progress(), 0);
        state.release(1);
        assert_eq!(state.in_progress(), 0);
    }

    #[test]
    fn concurrent_acquire_release_never_exceeds_total() {
        let state = Arc::new(PollState::new(50));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let state = Arc::clone(&state);
            handles.push(thread::spawn(move || {
                for _ in 0..200 {
                    let acquired = state.acquire_max_available();
                    assert!(state.in_progress() <= state.total());
                    state.release(acquired);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(state.in_progress(), 0);
    }
}
