//! Single-flight run guard.
//!
//! A boolean flag, not a lock held for the run's duration: the guard is
//! acquired with one atomic test-and-set and released when the [`RunPermit`]
//! drops, so the flag is owned for the whole run while no lock is.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared Idle/Running flag. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct RunGuard {
    running: Arc<AtomicBool>,
}

impl RunGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically transition Idle → Running.
    ///
    /// Returns `None` when a run is already active. The returned permit
    /// releases the guard on drop — on every exit path, panics included.
    pub fn try_acquire(&self) -> Option<RunPermit> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunPermit {
                running: self.running.clone(),
            })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Proof of an acquired guard; dropping it transitions Running → Idle.
#[derive(Debug)]
pub struct RunPermit {
    running: Arc<AtomicBool>,
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn acquire_release_cycle() {
        let guard = RunGuard::new();
        assert!(!guard.is_running());

        let permit = guard.try_acquire().expect("first acquire");
        assert!(guard.is_running());
        assert!(guard.try_acquire().is_none(), "second acquire must fail");

        drop(permit);
        assert!(!guard.is_running());
        assert!(guard.try_acquire().is_some(), "reacquirable after release");
    }

    #[test]
    fn concurrent_acquires_have_exactly_one_winner() {
        let guard = RunGuard::new();
        // Threads return the permit itself so no release happens until all
        // acquires have raced.
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let guard = guard.clone();
                thread::spawn(move || guard.try_acquire())
            })
            .collect();

        let permits: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().expect("join"))
            .collect();
        let winners = permits.iter().filter(|p| p.is_some()).count();
        assert_eq!(winners, 1, "exactly one concurrent caller may win");

        drop(permits);
        assert!(!guard.is_running());
    }

    #[test]
    fn permit_releases_even_when_holder_panics() {
        let guard = RunGuard::new();
        let inner = guard.clone();
        let result = thread::spawn(move || {
            let _permit = inner.try_acquire().expect("acquire");
            panic!("run blew up");
        })
        .join();

        assert!(result.is_err());
        assert!(!guard.is_running(), "guard must release on panic");
    }
}
