pub mod profile;

pub use profile::Profile;

use crate::Chips;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

/// What the heuristics expose to event payloads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Temper {
    pub streak: i32,
    pub tilt: f32,
    pub afk: bool,
}

/// Shared per-login profiles. Only settlement and timeout paths mutate,
/// both already serialized per channel, so one lock over the map is
/// plenty.
#[derive(Debug, Default)]
pub struct Heuristics {
    profiles: Mutex<HashMap<String, Profile>>,
}

impl Heuristics {
    pub fn new() -> Self {
        Self::default()
    }
    /// Folds a settled round in for one participant.
    pub fn settle(&self, login: &str, won: bool, bet: Chips, post_balance: Chips) {
        let ratio = if bet <= 0 {
            0.0
        } else {
            bet as f32 / (bet + post_balance.max(0)) as f32
        };
        let mut profiles = self.profiles.lock().expect("heuristics lock");
        profiles.entry(login.to_string()).or_default().record(won, ratio);
    }
    pub fn record_timeout(&self, login: &str) {
        let mut profiles = self.profiles.lock().expect("heuristics lock");
        profiles
            .entry(login.to_string())
            .or_default()
            .record_timeout(Instant::now());
        log::debug!("[heuristics] {} timed out", login);
    }
    pub fn temper(&self, login: &str) -> Temper {
        let profiles = self.profiles.lock().expect("heuristics lock");
        let now = Instant::now();
        profiles
            .get(login)
            .map(|p| Temper {
                streak: p.streak(),
                tilt: p.tilt(),
                afk: p.afk(now),
            })
            .unwrap_or(Temper {
                streak: 0,
                tilt: 0.0,
                afk: false,
            })
    }
    /// Shaped blackjack turn duration for this login.
    pub fn turn_duration(&self, login: &str) -> Duration {
        let profiles = self.profiles.lock().expect("heuristics lock");
        let ms = profiles
            .get(login)
            .map(|p| p.turn_ms(Instant::now()))
            .unwrap_or(crate::TURN_MAX_MS);
        Duration::from_millis(ms)
    }
    /// Tilted players get aggressive blackjack bets clamped to a
    /// fraction of what they could put up.
    pub fn clamp_bet(&self, login: &str, requested: Chips, available: Chips) -> Chips {
        let tilt = self.temper(login).tilt;
        if tilt >= crate::TILT_GATE {
            let cap = (available as f32 * crate::TILT_CLAMP) as Chips;
            let clamped = requested.min(cap.max(crate::MIN_BET));
            if clamped < requested {
                log::info!("[heuristics] clamping {} bet {} -> {}", login, requested, clamped);
            }
            clamped
        } else {
            requested
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_applies_only_when_tilted() {
        let heuristics = Heuristics::new();
        assert_eq!(heuristics.clamp_bet("eve", 400, 1_000), 400);
        for _ in 0..4 {
            heuristics.settle("eve", false, 500, 500);
        }
        assert!(heuristics.temper("eve").tilt >= crate::TILT_GATE);
        let clamped = heuristics.clamp_bet("eve", 400, 1_000);
        assert_eq!(clamped, (1_000.0 * crate::TILT_CLAMP) as Chips);
    }

    #[test]
    fn temper_defaults() {
        let heuristics = Heuristics::new();
        let temper = heuristics.temper("nobody");
        assert_eq!(temper.streak, 0);
        assert_eq!(temper.tilt, 0.0);
        assert!(!temper.afk);
    }

    #[test]
    fn timeout_shortens_turns() {
        let heuristics = Heuristics::new();
        assert_eq!(
            heuristics.turn_duration("frank"),
            Duration::from_millis(crate::TURN_MAX_MS)
        );
        heuristics.settle("frank", true, 10, 990);
        heuristics.record_timeout("frank");
        assert_eq!(
            heuristics.turn_duration("frank"),
            Duration::from_millis(crate::TURN_BASE_MS)
        );
    }
}
