pub mod blackjack;
pub mod cmd;
pub mod error;
pub mod mode;
pub mod phase;
pub mod poker;
pub mod rotation;
pub mod seat;

pub use blackjack::Blackjack;
pub use cmd::TableCmd;
pub use error::TableError;
pub use mode::Mode;
pub use phase::Phase;
pub use phase::Street;
pub use poker::Poker;
pub use rotation::Rotation;
pub use seat::BjHand;
pub use seat::HandState;
pub use seat::PokerHand;
pub use seat::Role;
pub use seat::Seat;
pub use seat::SubHand;

use crate::Chips;
use crate::gameroom::channel::ChannelState;
use crate::gameroom::event::Event;
use crate::gameroom::event::PlayerDelta;
use crate::heuristics::Heuristics;
use crate::ledger::Ledger;
use crate::ledger::Purse;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

/// Shared collaborators every engine call gets handed. Cloning is an
/// Arc bump; channels never own these.
#[derive(Clone)]
pub struct Services {
    pub ledger: Arc<Ledger>,
    pub heuristics: Arc<Heuristics>,
}

impl Services {
    pub fn new() -> Self {
        Self {
            ledger: Arc::new(Ledger::new()),
            heuristics: Arc::new(Heuristics::new()),
        }
    }
}

impl Default for Services {
    fn default() -> Self {
        Self::new()
    }
}

/// What the room loop must do with its timer slots after a mutation.
/// Each timer kind is single-armed: arming cancels the predecessor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cue {
    ArmBetting(Duration),
    ArmTurn { login: String, duration: Duration },
    ArmPhase(Duration),
    CancelTurn,
    CancelPhase,
    /// round over: cancel every timer class
    Settled,
}

/// Events to fan out plus timer cues, in emission order. Every engine
/// mutation returns one of these; the room applies it verbatim.
#[derive(Debug, Default, PartialEq)]
pub struct Outcome {
    pub events: Vec<Event>,
    pub cues: Vec<Cue>,
}

impl Outcome {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with(event: Event) -> Self {
        Self {
            events: vec![event],
            cues: Vec::new(),
        }
    }
    pub fn merge(&mut self, other: Outcome) {
        self.events.extend(other.events);
        self.cues.extend(other.cues);
    }
}

/// The capability set both games implement over an explicit
/// [`ChannelState`]. The router dispatches on the channel's mode tag;
/// neither engine holds state of its own.
pub trait ModeOps: Send + Sync {
    /// The betting window closed with at least one bettor: deal.
    fn begin(&self, state: &mut ChannelState, services: &Services) -> Outcome;
    /// A seated actor's game action, through the legality gate.
    fn act(
        &self,
        state: &mut ChannelState,
        services: &Services,
        login: &str,
        cmd: &TableCmd,
    ) -> Result<Outcome, TableError>;
    /// The active turn's deadline expired.
    fn expire(&self, state: &mut ChannelState, services: &Services) -> Outcome;
    /// Phase progression: idle auto-advance, or admin-forced settlement.
    fn advance(&self, state: &mut ChannelState, services: &Services, forced: bool) -> Outcome;
    /// Settles the round as it stands, paying out every escrowed chip.
    fn settle(&self, state: &mut ChannelState, services: &Services) -> Outcome;
    /// Per-turn deadline for this login.
    fn turn_duration(&self, services: &Services, login: &str) -> Duration;
}

pub fn ops(mode: Mode) -> &'static dyn ModeOps {
    match mode {
        Mode::Blackjack => &Blackjack,
        Mode::Poker => &Poker,
    }
}

/// Opens the betting window: idle -> betting, queue promotion, auto
/// bets for promoted and house-AI seats, one armed window timer.
pub fn open_betting(state: &mut ChannelState, services: &Services) -> Result<Outcome, TableError> {
    if state.phase != Phase::Idle {
        return Err(TableError::OutOfPhase);
    }
    let purse = state.purse();
    let min = state.config.min_bet;
    state.promote_queue(|login| services.ledger.balance(purse, login) >= min);
    state.phase = Phase::Betting;
    let mut outcome = Outcome::new();
    let mut returned = Vec::new();
    for i in 0..state.seats.len() {
        let auto = state.seats[i].auto || state.seats[i].role.is_ai();
        if !auto || state.seats[i].bet > 0 {
            continue;
        }
        let login = state.seats[i].login.clone();
        match services.ledger.debit(purse, &login, min) {
            Ok(balance) => {
                state.seats[i].bet = min;
                state.seats[i].auto = false;
                outcome.events.push(Event::PlayerUpdate(PlayerDelta {
                    bet: Some(min),
                    balance: Some(balance),
                    ..PlayerDelta::of(&login)
                }));
            }
            Err(_) if !state.seats[i].role.is_ai() => returned.push(login),
            Err(_) => {}
        }
    }
    // seats that cannot cover the auto minimum go back to the queue
    for login in &returned {
        state.seats.retain(|s| &s.login != login);
        state.queue.push_back(login.clone());
        log::debug!("[channel {}] {} cannot cover auto-bet, requeued", state.name, login);
    }
    let duration = Duration::from_millis(state.config.betting_ms);
    outcome.events.push(Event::BettingStarted {
        duration_ms: state.config.betting_ms,
        ends_at: crate::now_ms() + state.config.betting_ms,
        mode: state.mode,
    });
    outcome.events.push(state.queue_event());
    outcome.cues.push(Cue::ArmBetting(duration));
    Ok(outcome)
}

/// The betting window timer fired (or an admin started now). With at
/// least one escrowed bet the round deals; otherwise back to idle.
pub fn close_betting(state: &mut ChannelState, services: &Services) -> Outcome {
    if state.phase != Phase::Betting {
        return Outcome::new();
    }
    if state.bettors() == 0 {
        log::debug!("[channel {}] betting window closed empty", state.name);
        state.phase = Phase::Idle;
        return Outcome::with(state.queue_event());
    }
    ops(state.mode).begin(state, services)
}

/// Escrows a bet. Debit strictly precedes the seat insert; a full
/// table queues the actor instead. Re-bets refund before re-deduction.
pub fn place_bet(
    state: &mut ChannelState,
    services: &Services,
    login: &str,
    role: Role,
    requested: Chips,
) -> Result<Outcome, TableError> {
    if state.phase != Phase::Betting {
        return Err(TableError::OutOfPhase);
    }
    if requested <= 0 {
        return Err(TableError::InvalidPayload("bet must be positive"));
    }
    if state.binding.is_none() {
        if let Some(last) = state.cooldowns.get(login) {
            if last.elapsed() < Duration::from_millis(crate::BET_COOLDOWN_MS) {
                return Err(TableError::InvalidAction("betting cooldown"));
            }
        }
    }
    let purse = state.purse();
    let existing = state.seat(login).map(|s| s.bet).unwrap_or(0);
    let available = services.ledger.balance(purse, login) + existing;
    let mut amount = requested;
    if state.mode == Mode::Blackjack && state.binding.is_none() {
        amount = services.heuristics.clamp_bet(login, amount, available);
    }
    let amount = amount.clamp(state.config.min_bet, state.config.max_bet);
    if available < amount {
        return Err(TableError::InsufficientFunds {
            short: amount - available,
        });
    }
    if !state.is_seated(login) && state.seats.len() >= state.cap() {
        // overflow is strictly queued in arrival order
        let mut outcome = Outcome::new();
        if !state.queue.contains(&login.to_string()) {
            state.queue.push_back(login.to_string());
            log::info!("[channel {}] table full, queued {}", state.name, login);
            outcome.events.push(state.queue_event());
        }
        outcome.events.push(Event::Warning {
            login: login.to_string(),
            reason: TableError::TableFull.reason().to_string(),
        });
        return Ok(outcome);
    }
    if existing > 0 {
        services.ledger.credit(purse, login, existing);
    }
    let balance = match services.ledger.debit(purse, login, amount) {
        Ok(balance) => balance,
        Err(e) => {
            // restore the original escrow untouched
            if existing > 0 {
                let _ = services.ledger.debit(purse, login, existing);
            }
            return Err(e.into());
        }
    };
    match state.seat_mut(login) {
        Some(seat) => seat.bet = amount,
        None => {
            let mut seat = Seat::new(login, role);
            seat.bet = amount;
            state.seats.push(seat);
        }
    }
    state.cooldowns.insert(login.to_string(), Instant::now());
    log::debug!("[channel {}] {} bet {}", state.name, login, amount);
    let mut outcome = Outcome::with(Event::PlayerUpdate(PlayerDelta {
        bet: Some(amount),
        balance: Some(balance),
        ..PlayerDelta::of(login)
    }));
    outcome.events.push(state.queue_event());
    Ok(outcome)
}

/// Tournament ready-check. The controller watches the resulting
/// events and triggers the auto-start once the whole roster is in.
pub fn ready(state: &mut ChannelState, login: &str) -> Result<Outcome, TableError> {
    if state.binding.is_none() {
        return Err(TableError::InvalidAction("no tournament binding"));
    }
    if !state.is_seated(login) {
        return Err(TableError::InvalidAction("not seated"));
    }
    state.ready.insert(login.to_string());
    Ok(Outcome::with(Event::ReadyStatus {
        ready: state.ready.iter().cloned().collect(),
        required: state.seats.len(),
        all_ready: state.ready.len() == state.seats.len(),
    }))
}

/// Tournament auto-start: forced blinds for poker, equal antes at the
/// big blind for blackjack, both capped by the remaining stack.
pub fn auto_start(
    state: &mut ChannelState,
    services: &Services,
    small: Chips,
    big: Chips,
) -> Result<Outcome, TableError> {
    if state.binding.is_none() {
        return Err(TableError::TournamentMisbound);
    }
    if state.phase != Phase::Idle {
        return Err(TableError::OutOfPhase);
    }
    if state.seats.len() < 2 {
        return Err(TableError::InvalidAction("not enough players"));
    }
    let purse = state.purse();
    match state.mode {
        Mode::Poker => {
            for (i, blind) in [(0usize, small), (1usize, big)] {
                let login = state.seats[i].login.clone();
                let stack = services.ledger.balance(purse, &login);
                let post = blind.min(stack);
                services.ledger.debit(purse, &login, post)?;
                state.seats[i].bet = post;
            }
            state.opener = 2 % state.seats.len();
        }
        Mode::Blackjack => {
            for i in 0..state.seats.len() {
                let login = state.seats[i].login.clone();
                let stack = services.ledger.balance(purse, &login);
                let ante = big.min(stack);
                if ante > 0 {
                    services.ledger.debit(purse, &login, ante)?;
                    state.seats[i].bet = ante;
                }
            }
        }
    }
    state.phase = Phase::Betting;
    Ok(close_betting(state, services))
}

/// Invariant breach recovery: refund every escrowed chip, broadcast a
/// generic abort, and return the channel to idle.
pub fn abort_round(state: &mut ChannelState, services: &Services, reason: &str) -> Outcome {
    log::error!("[channel {}] aborting round: {}", state.name, reason);
    let purse = state.purse();
    for seat in &state.seats {
        if seat.bet > 0 {
            services.ledger.credit(purse, &seat.login, seat.bet);
        }
    }
    state.reset_round();
    let mut outcome = Outcome::with(Event::RoundAborted {
        reason: "round aborted".to_string(),
    });
    outcome.events.push(state.queue_event());
    outcome.cues.push(Cue::Settled);
    outcome
}

/// Post-settlement bookkeeping both engines share: heuristic updates,
/// per-player balance fanout, demotion of busted seats, queue
/// promotion, and the reset back to idle.
pub(crate) fn finish_round(
    state: &mut ChannelState,
    services: &Services,
    stakes: &BTreeMap<String, Chips>,
    payouts: &BTreeMap<String, Chips>,
    outcome: &mut Outcome,
) {
    let purse = state.purse();
    for (login, stake) in stakes {
        let payout = payouts.get(login).copied().unwrap_or(0);
        let net = payout - stake;
        let balance = services.ledger.balance(purse, login);
        if net != 0 {
            services.heuristics.settle(login, net > 0, *stake, balance - payout);
        }
        let temper = services.heuristics.temper(login);
        outcome.events.push(Event::PlayerUpdate(PlayerDelta {
            balance: Some(balance),
            streak: Some(temper.streak),
            tilt: Some(temper.tilt),
            afk: Some(temper.afk),
            ..PlayerDelta::of(login)
        }));
    }
    state.reset_round();
    let min = state.config.min_bet;
    let broke = state
        .seats
        .iter()
        .filter(|s| !s.role.is_ai())
        .filter(|s| services.ledger.balance(purse, &s.login) < min)
        .map(|s| s.login.clone())
        .collect::<Vec<_>>();
    for login in &broke {
        state.seats.retain(|s| &s.login != login);
        state.queue.push_back(login.clone());
        log::info!("[channel {}] {} below minimum, moved to queue", state.name, login);
    }
    state.promote_queue(|login| services.ledger.balance(purse, login) >= min);
    outcome.events.push(state.queue_event());
}
