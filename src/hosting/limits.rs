use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

/// Sliding-window rate limiter keyed (actor, command kind). A boolean
/// gate: either the command proceeds or it is dropped at the door.
#[derive(Debug, Default)]
pub struct Limiter {
    windows: Mutex<HashMap<(String, &'static str), VecDeque<Instant>>>,
}

impl Limiter {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn allow(&self, actor: &str, kind: &'static str) -> bool {
        let now = Instant::now();
        let window = Duration::from_millis(crate::RATE_WINDOW_MS);
        let mut windows = self.windows.lock().expect("limiter lock");
        let hits = windows.entry((actor.to_string(), kind)).or_default();
        while let Some(first) = hits.front() {
            if now.duration_since(*first) > window {
                hits.pop_front();
            } else {
                break;
            }
        }
        if hits.len() >= crate::RATE_BURST {
            false
        } else {
            hits.push_back(now);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caps_the_burst() {
        let limiter = Limiter::new();
        for _ in 0..crate::RATE_BURST {
            assert!(limiter.allow("alice", "hit"));
        }
        assert!(!limiter.allow("alice", "hit"));
    }

    #[test]
    fn kinds_are_independent() {
        let limiter = Limiter::new();
        for _ in 0..crate::RATE_BURST {
            assert!(limiter.allow("alice", "hit"));
        }
        assert!(limiter.allow("alice", "stand"));
        assert!(limiter.allow("bob", "hit"));
    }
}
