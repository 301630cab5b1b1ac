//! In-memory seen-link bookkeeping for one run
//!
//! Claiming a link checks the seen set and the in-flight set and marks the
//! link in flight under one lock, so concurrent workers never process the
//! same URL at the same time. A poisoned lock is recovered rather than
//! treated as empty, so a panicking worker cannot wipe the checkpoint.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct State {
    seen: HashSet<String>,
    in_flight: HashSet<String>,
}

#[derive(Debug, Default)]
pub struct SeenLinks {
    state: Mutex<State>,
}

impl SeenLinks {
    pub fn new(seen: HashSet<String>) -> Self {
        Self {
            state: Mutex::new(State {
                seen,
                in_flight: HashSet::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark `url` in flight unless it is already seen or being processed
    pub fn try_claim(&self, url: &str) -> bool {
        let mut state = self.state();
        if state.seen.contains(url) || state.in_flight.contains(url) {
            return false;
        }
        state.in_flight.insert(url.to_string())
    }

    /// Release a claimed link, adding it to the seen set when `mark_seen`
    pub fn complete(&self, url: &str, mark_seen: bool) {
        let mut state = self.state();
        state.in_flight.remove(url);
        if mark_seen {
            state.seen.insert(url.to_string());
        }
    }

    pub fn contains(&self, url: &str) -> bool {
        self.state().seen.contains(url)
    }

    pub fn len(&self) -> usize {
        self.state().seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the seen set, for checkpointing
    pub fn snapshot(&self) -> HashSet<String> {
        self.state().seen.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn seen_links_cannot_be_claimed() {
        let links = SeenLinks::new(["https://events.brown.edu/event/1".to_string()].into());
        assert!(!links.try_claim("https://events.brown.edu/event/1"));
        assert!(links.try_claim("https://events.brown.edu/event/2"));
    }

    #[test]
    fn in_flight_link_is_claimed_once() {
        let links = SeenLinks::default();
        assert!(links.try_claim("a"));
        assert!(!links.try_claim("a"));

        links.complete("a", false);
        assert!(links.try_claim("a"), "released without marking can be retried");

        links.complete("a", true);
        assert!(!links.try_claim("a"));
        assert!(links.contains("a"));
        assert_eq!(links.snapshot(), HashSet::from(["a".to_string()]));
    }

    #[test]
    fn concurrent_claims_have_one_winner() {
        let links = Arc::new(SeenLinks::default());
        let winners: usize = (0..8)
            .map(|_| {
                let links = Arc::clone(&links);
                std::thread::spawn(move || links.try_claim("https://events.brown.edu/event/7"))
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|handle| usize::from(handle.join().unwrap()))
            .sum();
        assert_eq!(winners, 1);
    }

    #[test]
    fn poisoned_lock_keeps_the_seen_set() {
        let links = Arc::new(SeenLinks::new(["https://events.brown.edu/event/1".to_string()].into()));
        let worker = Arc::clone(&links);
        let panicked = std::thread::spawn(move || {
            let _state = worker.state.lock().unwrap();
            panic!("worker died while holding the lock");
        })
        .join();
        assert!(panicked.is_err());
        assert!(links.state.is_poisoned());

        assert_eq!(links.snapshot().len(), 1);
        assert!(links.try_claim("https://events.brown.edu/event/2"));
        links.complete("https://events.brown.edu/event/2", true);
        assert!(links.contains("https://events.brown.edu/event/2"));
        assert_eq!(links.len(), 2);
    }
}
