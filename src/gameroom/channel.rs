use super::event::Event;
use super::event::Limits;
use crate::Chips;
use crate::cards::Card;
use crate::cards::Shoe;
use crate::gameplay::HandState;
use crate::gameplay::Mode;
use crate::gameplay::Phase;
use crate::gameplay::Rotation;
use crate::gameplay::Seat;
use crate::gameplay::Street;
use crate::ledger::Purse;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::time::Instant;

/// Per-channel knobs. Tests shrink the windows; tournaments override
/// nothing here, they just bind.
#[derive(Debug, Clone)]
pub struct TableConfig {
    pub min_bet: Chips,
    pub max_bet: Chips,
    pub betting_ms: u64,
    pub decks: usize,
    /// fixed shuffle seed for reproducible tables; None draws from OS
    pub seed: Option<u64>,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            min_bet: crate::MIN_BET,
            max_bet: crate::MAX_BET,
            betting_ms: crate::BETTING_WINDOW_MS,
            decks: crate::BLACKJACK_DECKS,
            seed: None,
        }
    }
}

/// Identifier-only reference to the tournament table this channel is
/// hosting. The tournament side holds the mirror image, also by
/// identifier; neither owns the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub tournament: u64,
    pub round: usize,
    pub table: usize,
}

/// The one mutable owner of a table's round progress. Every mutation
/// happens on the owning room task; nothing here is shared.
#[derive(Debug)]
pub struct ChannelState {
    pub name: String,
    pub mode: Mode,
    pub phase: Phase,
    pub config: TableConfig,
    pub seats: Vec<Seat>,
    pub queue: VecDeque<String>,
    pub shoe: Shoe,
    pub dealer: Vec<Card>,
    pub dealer_hidden: bool,
    /// blackjack: dealer up-card is an ace and the side-bet window is open
    pub insurance_open: bool,
    /// blackjack: dealer has already checked for a natural
    pub peeked: bool,
    pub community: Vec<Card>,
    pub street: Street,
    pub pot: Chips,
    pub current_bet: Chips,
    pub rotation: Rotation,
    /// poker: seat offset that opens the next rotation (after the big blind)
    pub opener: usize,
    pub binding: Option<Binding>,
    pub ready: BTreeSet<String>,
    pub cooldowns: HashMap<String, Instant>,
    pub round: u64,
    pub rng: StdRng,
}

impl ChannelState {
    pub fn new(name: &str, mode: Mode, config: TableConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let decks = match mode {
            Mode::Blackjack => config.decks,
            Mode::Poker => 1,
        };
        let mut this = Self {
            name: name.to_string(),
            mode,
            phase: Phase::Idle,
            config,
            seats: Vec::new(),
            queue: VecDeque::new(),
            shoe: Shoe::fresh(decks),
            dealer: Vec::new(),
            dealer_hidden: false,
            insurance_open: false,
            peeked: false,
            community: Vec::new(),
            street: Street::Pref,
            pot: 0,
            current_bet: 0,
            rotation: Rotation::default(),
            opener: 0,
            binding: None,
            ready: BTreeSet::new(),
            cooldowns: HashMap::new(),
            round: 0,
            rng,
        };
        this.shoe.shuffle(&mut this.rng);
        this
    }
    pub fn cap(&self) -> usize {
        self.mode.cap()
    }
    /// Which account this channel's bets draw from.
    pub fn purse(&self) -> Purse {
        match self.binding {
            Some(b) => Purse::Stack(b.tournament),
            None => Purse::Wallet,
        }
    }
    pub fn seat(&self, login: &str) -> Option<&Seat> {
        self.seats.iter().find(|s| s.login == login)
    }
    pub fn seat_mut(&mut self, login: &str) -> Option<&mut Seat> {
        self.seats.iter_mut().find(|s| s.login == login)
    }
    pub fn is_seated(&self, login: &str) -> bool {
        self.seat(login).is_some()
    }
    /// Seats that escrowed chips for this round.
    pub fn bettors(&self) -> usize {
        self.seats.iter().filter(|s| s.bet > 0).count()
    }
    /// Draws the next card, replenishing an exhausted shoe in place.
    /// Rigged test shoes are the exception: they must never run dry.
    pub fn draw(&mut self) -> Card {
        match self.shoe.draw() {
            Some(card) => card,
            None => {
                self.shoe = Shoe::shuffled(self.config.decks.max(1), &mut self.rng);
                self.shoe.draw().expect("fresh shoe is never empty")
            }
        }
    }
    /// The dealer hand as the table is allowed to see it.
    pub fn dealer_public(&self) -> Vec<String> {
        if self.dealer_hidden {
            self.dealer.iter().take(1).map(|c| c.to_string()).collect()
        } else {
            self.dealer.iter().map(|c| c.to_string()).collect()
        }
    }
    pub fn community_public(&self) -> Vec<String> {
        self.community.iter().map(|c| c.to_string()).collect()
    }
    pub fn queue_event(&self) -> Event {
        Event::QueueUpdate {
            waiting: self.queue.iter().cloned().collect(),
            limits: Limits {
                min: self.config.min_bet,
                max: self.config.max_bet,
            },
            active_bets: self
                .seats
                .iter()
                .filter(|s| s.bet > 0)
                .map(|s| (s.login.clone(), s.bet))
                .collect::<BTreeMap<_, _>>(),
        }
    }
    /// Moves queued players who pass the eligibility check (funds for
    /// the minimum bet) into free seats, in arrival order. Ineligible
    /// players keep their place in line. Promoted seats are flagged to
    /// auto-bet the minimum at the next window.
    pub fn promote_queue<F>(&mut self, eligible: F) -> bool
    where
        F: Fn(&str) -> bool,
    {
        let mut changed = false;
        let mut i = 0;
        while self.seats.len() < self.cap() && i < self.queue.len() {
            if !eligible(&self.queue[i]) {
                i += 1;
                continue;
            }
            if let Some(login) = self.queue.remove(i) {
                log::debug!("[channel {}] promoting {} from queue", self.name, login);
                let mut seat = Seat::new(&login, Default::default());
                seat.auto = true;
                self.seats.push(seat);
                changed = true;
            }
        }
        changed
    }
    /// Clears round-scoped state back to idle. Seats, queue, shoe,
    /// binding, and cooldowns survive; bets and hands do not.
    pub fn reset_round(&mut self) {
        self.phase = Phase::Idle;
        self.dealer.clear();
        self.dealer_hidden = false;
        self.insurance_open = false;
        self.peeked = false;
        self.community.clear();
        self.street = Street::Pref;
        self.pot = 0;
        self.current_bet = 0;
        self.rotation.clear();
        self.opener = 0;
        self.ready.clear();
        for seat in &mut self.seats {
            seat.bet = 0;
            seat.hand = HandState::Empty;
        }
    }
    /// Cheap structural checks run after every mutation. A violation
    /// here means the round can no longer be trusted and must abort.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.seats.len() > self.cap() {
            return Err(format!(
                "seat count {} exceeds cap {}",
                self.seats.len(),
                self.cap()
            ));
        }
        if self.mode == Mode::Poker && self.phase == Phase::Action {
            let contributed: Chips = self
                .seats
                .iter()
                .filter_map(|s| s.poker())
                .map(|h| h.total)
                .sum();
            if contributed != self.pot {
                return Err(format!(
                    "pot {} diverges from contributions {}",
                    self.pot, contributed
                ));
            }
        }
        if self.community.len() > 5 {
            return Err(format!("community overflow: {}", self.community.len()));
        }
        Ok(())
    }
}

/// Channel identifiers are lowercase `[a-z0-9_-]+`.
pub fn normalize(name: &str) -> Option<String> {
    let name = name.trim().to_lowercase();
    if name.is_empty() || name.len() > 64 {
        return None;
    }
    name.chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
        .then_some(name)
}

/// Cards rendered for event payloads.
pub fn strings(cards: &[Card]) -> Vec<String> {
    cards.iter().map(|c| c.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_identifiers() {
        assert_eq!(normalize(" Alice "), Some("alice".to_string()));
        assert_eq!(normalize("lobby-a1b2c3"), Some("lobby-a1b2c3".to_string()));
        assert_eq!(normalize("bad name"), None);
        assert_eq!(normalize(""), None);
    }

    #[test]
    fn purse_follows_binding() {
        let mut state = ChannelState::new("t-1-r1-table-1", Mode::Poker, TableConfig::default());
        assert_eq!(state.purse(), Purse::Wallet);
        state.binding = Some(Binding {
            tournament: 1,
            round: 1,
            table: 1,
        });
        assert_eq!(state.purse(), Purse::Stack(1));
    }

    #[test]
    fn dealer_hole_stays_hidden() {
        let mut state = ChannelState::new("main", Mode::Blackjack, TableConfig::default());
        state.dealer = crate::cards::card::cards("9c 6h");
        state.dealer_hidden = true;
        assert_eq!(state.dealer_public(), vec!["9c".to_string()]);
        state.dealer_hidden = false;
        assert_eq!(state.dealer_public().len(), 2);
    }

    #[test]
    fn promotion_respects_cap() {
        let mut state = ChannelState::new("main", Mode::Blackjack, TableConfig::default());
        for i in 0..crate::BLACKJACK_SEATS {
            state.seats.push(Seat::new(&format!("p{}", i), Default::default()));
        }
        state.queue.push_back("kate".to_string());
        assert!(!state.promote_queue(|_| true));
        state.seats.pop();
        assert!(state.promote_queue(|_| true));
        assert!(state.is_seated("kate"));
        assert!(state.seat("kate").unwrap().auto);
    }

    #[test]
    fn promotion_skips_ineligible_but_keeps_order() {
        let mut state = ChannelState::new("main", Mode::Blackjack, TableConfig::default());
        state.queue.push_back("broke".to_string());
        state.queue.push_back("flush".to_string());
        assert!(state.promote_queue(|login| login != "broke"));
        assert!(state.is_seated("flush"));
        assert_eq!(state.queue.front().map(String::as_str), Some("broke"));
    }

    #[test]
    fn seeded_tables_reproduce() {
        let config = TableConfig {
            seed: Some(99),
            ..TableConfig::default()
        };
        let mut a = ChannelState::new("main", Mode::Blackjack, config.clone());
        let mut b = ChannelState::new("main", Mode::Blackjack, config);
        for _ in 0..20 {
            assert_eq!(a.shoe.draw(), b.shoe.draw());
        }
    }
}
