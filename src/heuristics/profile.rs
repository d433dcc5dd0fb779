use std::collections::VecDeque;
use std::time::Duration;
use std::time::Instant;

/// Per-login behavior record: a windowed outcome vector, its summed
/// streak, a bounded tilt score, and recent turn timeouts.
#[derive(Debug, Clone, Default)]
pub struct Profile {
    results: VecDeque<i8>,
    streak: i32,
    tilt: f32,
    timeouts: VecDeque<Instant>,
    rounds: u64,
}

impl Profile {
    /// Folds one settled round in. `ratio` is the last-bet ratio
    /// bet / (bet + post-bet balance); wins relax tilt at half weight,
    /// losses raise it at full weight.
    pub fn record(&mut self, won: bool, ratio: f32) {
        self.results.push_back(if won { 1 } else { -1 });
        while self.results.len() > crate::STREAK_WINDOW {
            self.results.pop_front();
        }
        self.streak = self.results.iter().map(|&r| r as i32).sum();
        self.tilt += if won { -0.5 * ratio } else { ratio };
        self.tilt = self.tilt.clamp(crate::TILT_MIN, crate::TILT_MAX);
        self.rounds += 1;
    }
    pub fn record_timeout(&mut self, now: Instant) {
        self.timeouts.push_back(now);
        self.trim(now);
    }
    fn trim(&mut self, now: Instant) {
        let window = Duration::from_millis(crate::TIMEOUT_WINDOW_MS);
        while let Some(first) = self.timeouts.front() {
            if now.duration_since(*first) > window {
                self.timeouts.pop_front();
            } else {
                break;
            }
        }
    }
    fn recent_timeouts(&self, now: Instant) -> usize {
        let window = Duration::from_millis(crate::TIMEOUT_WINDOW_MS);
        self.timeouts
            .iter()
            .filter(|t| now.duration_since(**t) <= window)
            .count()
    }
    pub fn afk(&self, now: Instant) -> bool {
        self.recent_timeouts(now) >= crate::AFK_TIMEOUTS
    }
    /// Blackjack turn duration: AFK players get the floor, fresh or
    /// attentive players the ceiling, everyone else the base.
    pub fn turn_ms(&self, now: Instant) -> u64 {
        if self.afk(now) {
            crate::TURN_MIN_MS
        } else if self.rounds == 0 || self.recent_timeouts(now) == 0 {
            crate::TURN_MAX_MS
        } else {
            crate::TURN_BASE_MS
        }
    }
    pub fn streak(&self) -> i32 {
        self.streak
    }
    pub fn tilt(&self) -> f32 {
        self.tilt
    }
    pub fn rounds(&self) -> u64 {
        self.rounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streak_windows() {
        let mut profile = Profile::default();
        for _ in 0..crate::STREAK_WINDOW + 5 {
            profile.record(true, 0.0);
        }
        assert_eq!(profile.streak(), crate::STREAK_WINDOW as i32);
        profile.record(false, 0.0);
        assert_eq!(profile.streak(), crate::STREAK_WINDOW as i32 - 2);
    }

    #[test]
    fn tilt_bounded() {
        let mut profile = Profile::default();
        for _ in 0..100 {
            profile.record(false, 1.0);
        }
        assert_eq!(profile.tilt(), crate::TILT_MAX);
        for _ in 0..100 {
            profile.record(true, 1.0);
        }
        assert_eq!(profile.tilt(), crate::TILT_MIN);
    }

    #[test]
    fn wins_relax_at_half_weight() {
        let mut profile = Profile::default();
        profile.record(false, 1.0);
        profile.record(true, 1.0);
        assert!((profile.tilt() - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn afk_after_threshold() {
        let now = Instant::now();
        let mut profile = Profile::default();
        assert!(!profile.afk(now));
        for _ in 0..crate::AFK_TIMEOUTS {
            profile.record_timeout(now);
        }
        assert!(profile.afk(now));
        assert_eq!(profile.turn_ms(now), crate::TURN_MIN_MS);
    }

    #[test]
    fn fresh_player_gets_ceiling() {
        let profile = Profile::default();
        assert_eq!(profile.turn_ms(Instant::now()), crate::TURN_MAX_MS);
    }

    #[test]
    fn timed_out_player_scales_down() {
        let now = Instant::now();
        let mut profile = Profile::default();
        profile.record(true, 0.1);
        profile.record_timeout(now);
        assert_eq!(profile.turn_ms(now), crate::TURN_BASE_MS);
    }
}
