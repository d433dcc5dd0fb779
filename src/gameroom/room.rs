use super::channel::Binding;
use super::channel::ChannelState;
use super::command::Command;
use super::command::CommandKind;
use super::command::Directive;
use super::command::Identity;
use super::event::Event;
use super::event::Outbound;
use super::timer::TimerKind;
use super::timer::TimerSlot;
use crate::gameplay;
use crate::gameplay::Cue;
use crate::gameplay::Outcome;
use crate::gameplay::Phase;
use crate::gameplay::Role;
use crate::gameplay::Seat;
use crate::gameplay::TableCmd;
use crate::gameplay::TableError;
use crate::gameplay::Services;
use crate::gameplay::ops;
use crate::players;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::time::Duration;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::mpsc::unbounded_channel;

/// Everything a channel's task consumes, on one queue: commands, its
/// own timer ticks, and subscription churn. Ordering on this queue is
/// the channel's serialization boundary.
#[derive(Debug)]
pub enum Input {
    Cmd(Command),
    Tick { kind: TimerKind, epoch: u64 },
    Subscribe {
        id: u64,
        login: Option<String>,
        tx: UnboundedSender<Outbound>,
    },
    Unsubscribe { id: u64 },
    Shutdown,
}

#[derive(Debug)]
struct Subscriber {
    login: Option<String>,
    tx: UnboundedSender<Outbound>,
}

/// One task per channel. Owns the [`ChannelState`] exclusively,
/// applies every mutation in queue order, fans events out without
/// blocking, and drives house-AI turns synchronously between inputs.
pub struct Room {
    state: ChannelState,
    services: Services,
    tx: UnboundedSender<Input>,
    rx: UnboundedReceiver<Input>,
    subs: HashMap<u64, Subscriber>,
    betting: TimerSlot,
    turn: TimerSlot,
    phase: TimerSlot,
    pending_ai: Option<String>,
    warned: HashMap<String, Instant>,
}

impl Room {
    pub fn new(state: ChannelState, services: Services) -> (Self, UnboundedSender<Input>) {
        let (tx, rx) = unbounded_channel();
        let room = Self {
            state,
            services,
            tx: tx.clone(),
            rx,
            subs: HashMap::new(),
            betting: TimerSlot::default(),
            turn: TimerSlot::default(),
            phase: TimerSlot::default(),
            pending_ai: None,
            warned: HashMap::new(),
        };
        (room, tx)
    }

    pub async fn run(mut self) {
        log::debug!("[room {}] starting", self.state.name);
        while let Some(input) = self.rx.recv().await {
            match input {
                Input::Cmd(cmd) => self.on_command(cmd),
                Input::Tick { kind, epoch } => self.on_tick(kind, epoch),
                Input::Subscribe { id, login, tx } => {
                    // late joiners get the current table snapshot
                    let _ = tx.send(Outbound {
                        channel: self.state.name.clone(),
                        event: self.state.queue_event(),
                    });
                    self.subs.insert(id, Subscriber { login, tx });
                }
                Input::Unsubscribe { id } => {
                    self.subs.remove(&id);
                    // lifecycle: destroyed when idle with no subscribers
                    // and no tournament reference
                    if self.subs.is_empty()
                        && self.state.binding.is_none()
                        && self.state.phase == Phase::Idle
                    {
                        log::debug!("[room {}] empty and idle, closing", self.state.name);
                        break;
                    }
                }
                Input::Shutdown => {
                    if self.state.phase != Phase::Idle {
                        let outcome =
                            gameplay::abort_round(&mut self.state, &self.services, "shutdown");
                        self.process(outcome);
                    } else {
                        self.emit(self.state.queue_event());
                    }
                    break;
                }
            }
        }
        self.betting.cancel();
        self.turn.cancel();
        self.phase.cancel();
        log::debug!("[room {}] stopped", self.state.name);
    }

    fn on_command(&mut self, cmd: Command) {
        log::debug!(
            "[room {}] {} -> {}",
            self.state.name,
            cmd.actor.login,
            cmd.kind.kind()
        );
        let result = match &cmd.kind {
            CommandKind::Table(table) => self.on_table(&cmd.actor, table),
            CommandKind::Admin(directive) => self.on_directive(directive.clone()),
        };
        match result {
            Ok(outcome) => self.process(outcome),
            Err(e) => self.warn(cmd.origin, &cmd.actor.login, e),
        }
    }

    fn on_table(&mut self, actor: &Identity, cmd: &TableCmd) -> Result<Outcome, TableError> {
        match cmd {
            TableCmd::PlaceBet(amount) => gameplay::place_bet(
                &mut self.state,
                &self.services,
                &actor.login,
                actor.role,
                *amount,
            ),
            TableCmd::Ready => gameplay::ready(&mut self.state, &actor.login),
            other => ops(self.state.mode).act(&mut self.state, &self.services, &actor.login, other),
        }
    }

    fn on_directive(&mut self, directive: Directive) -> Result<Outcome, TableError> {
        match directive {
            Directive::OpenBetting => gameplay::open_betting(&mut self.state, &self.services),
            Directive::StartNow => match self.state.phase {
                Phase::Betting => Ok(gameplay::close_betting(&mut self.state, &self.services)),
                _ => Err(TableError::OutOfPhase),
            },
            Directive::ForceAdvance => match self.state.phase {
                Phase::Betting => Ok(gameplay::close_betting(&mut self.state, &self.services)),
                Phase::Action | Phase::Showdown => {
                    Ok(ops(self.state.mode).advance(&mut self.state, &self.services, true))
                }
                _ => Err(TableError::OutOfPhase),
            },
            Directive::BindTable {
                tournament,
                round,
                table,
                roster,
            } => {
                self.state.reset_round();
                self.state.queue.clear();
                self.state.binding = Some(Binding {
                    tournament,
                    round,
                    table,
                });
                self.state.seats = roster.iter().map(|l| Seat::new(l, Role::Player)).collect();
                log::info!(
                    "[room {}] bound to tournament {} round {} table {}",
                    self.state.name,
                    tournament,
                    round,
                    table
                );
                Ok(Outcome::with(Event::ReadyStatus {
                    ready: Vec::new(),
                    required: self.state.seats.len(),
                    all_ready: false,
                }))
            }
            Directive::AutoStart { small, big } => {
                gameplay::auto_start(&mut self.state, &self.services, small, big)
            }
            Directive::Level {
                tournament,
                level,
                small,
                big,
            } => match self.state.binding {
                Some(b) if b.tournament == tournament => Ok(Outcome::with(Event::TournamentLevel {
                    id: tournament,
                    level,
                    small,
                    big,
                })),
                _ => Err(TableError::TournamentMisbound),
            },
        }
    }

    fn on_tick(&mut self, kind: TimerKind, epoch: u64) {
        let claimed = match kind {
            TimerKind::Betting => self.betting.expire(epoch),
            TimerKind::Turn => self.turn.expire(epoch),
            TimerKind::Phase => self.phase.expire(epoch),
        };
        if !claimed {
            log::trace!("[room {}] stale {} tick", self.state.name, kind);
            return;
        }
        log::debug!("[room {}] {} timer fired", self.state.name, kind);
        let outcome = match kind {
            TimerKind::Betting => gameplay::close_betting(&mut self.state, &self.services),
            TimerKind::Turn => ops(self.state.mode).expire(&mut self.state, &self.services),
            TimerKind::Phase => ops(self.state.mode).advance(&mut self.state, &self.services, false),
        };
        self.process(outcome);
    }

    /// Applies an outcome: events out, cues into timer slots, then any
    /// house-AI turns it queued up, each through the same legality
    /// gate as human commands.
    fn process(&mut self, outcome: Outcome) {
        let mut queue = VecDeque::from([outcome]);
        let mut guard = 0usize;
        while let Some(outcome) = queue.pop_front() {
            for event in outcome.events {
                self.emit(event);
            }
            for cue in outcome.cues {
                self.cue(cue);
            }
            if let Err(reason) = self.state.check_invariants() {
                let aborted = gameplay::abort_round(&mut self.state, &self.services, &reason);
                self.pending_ai = None;
                queue.push_back(aborted);
                continue;
            }
            if let Some(login) = self.pending_ai.take() {
                guard += 1;
                if guard > 512 {
                    log::error!("[room {}] runaway AI loop, standing down", self.state.name);
                    continue;
                }
                queue.push_back(self.drive_ai(&login));
            }
        }
    }

    /// One synchronous house-AI decision, with an always-legal
    /// fallback if the policy's pick is rejected.
    fn drive_ai(&mut self, login: &str) -> Outcome {
        let cmd = players::decide(&mut self.state, &self.services, login)
            .unwrap_or_else(|| players::fallback(&self.state, login));
        log::debug!("[room {}] ai {} plays {}", self.state.name, login, cmd);
        match ops(self.state.mode).act(&mut self.state, &self.services, login, &cmd) {
            Ok(outcome) => outcome,
            Err(e) => {
                log::warn!("[room {}] ai {} rejected ({}), falling back", self.state.name, login, e);
                let fallback = players::fallback(&self.state, login);
                ops(self.state.mode)
                    .act(&mut self.state, &self.services, login, &fallback)
                    .unwrap_or_default()
            }
        }
    }

    fn cue(&mut self, cue: Cue) {
        match cue {
            Cue::ArmBetting(duration) => self.betting.arm(TimerKind::Betting, duration, &self.tx),
            Cue::ArmTurn { login, duration } => {
                let ai = self
                    .state
                    .seat(&login)
                    .map(|s| s.role.is_ai())
                    .unwrap_or(false);
                if ai {
                    // AI seats skip the human deadline and decide
                    // synchronously once this outcome is applied
                    self.turn.cancel();
                    self.pending_ai = Some(login);
                } else {
                    self.turn.arm(TimerKind::Turn, duration, &self.tx);
                }
            }
            Cue::ArmPhase(duration) => self.phase.arm(TimerKind::Phase, duration, &self.tx),
            Cue::CancelTurn => self.turn.cancel(),
            Cue::CancelPhase => self.phase.cancel(),
            Cue::Settled => {
                self.betting.cancel();
                self.turn.cancel();
                self.phase.cancel();
                self.pending_ai = None;
            }
        }
    }

    /// Non-blocking fan-out. Dead subscribers are dropped rather than
    /// ever stalling the loop.
    fn emit(&mut self, event: Event) {
        let outbound = Outbound {
            channel: self.state.name.clone(),
            event,
        };
        let mut dead = Vec::new();
        match outbound.event.unicast_to().map(str::to_string) {
            Some(login) => {
                for (id, sub) in &self.subs {
                    if sub.login.as_deref() == Some(login.as_str())
                        && sub.tx.send(outbound.clone()).is_err()
                    {
                        dead.push(*id);
                    }
                }
            }
            None => {
                for (id, sub) in &self.subs {
                    if sub.tx.send(outbound.clone()).is_err() {
                        dead.push(*id);
                    }
                }
            }
        }
        for id in dead {
            log::debug!("[room {}] dropping dead subscriber {}", self.state.name, id);
            self.subs.remove(&id);
        }
    }

    /// Actor-local failure report, rate limited per login so a
    /// misbehaving client cannot flood its own warnings.
    fn warn(&mut self, origin: Option<u64>, login: &str, err: TableError) {
        log::warn!("[room {}] {} rejected: {}", self.state.name, login, err);
        let now = Instant::now();
        if let Some(last) = self.warned.get(login) {
            if now.duration_since(*last) < Duration::from_millis(crate::WARN_COOLDOWN_MS) {
                return;
            }
        }
        self.warned.insert(login.to_string(), now);
        let outbound = Outbound {
            channel: self.state.name.clone(),
            event: Event::Warning {
                login: login.to_string(),
                reason: err.reason().to_string(),
            },
        };
        match origin.and_then(|id| self.subs.get(&id)) {
            Some(sub) => {
                let _ = sub.tx.send(outbound);
            }
            None => {
                for sub in self.subs.values() {
                    if sub.login.as_deref() == Some(login) {
                        let _ = sub.tx.send(outbound.clone());
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::Shoe;
    use crate::cards::card::cards;
    use crate::gameplay::Mode;
    use crate::gameroom::channel::TableConfig;
    use crate::gameroom::event::Outbound;
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::sync::mpsc::unbounded_channel;

    fn admin() -> Identity {
        Identity::new("main", Role::Admin)
    }

    fn command(kind: CommandKind) -> Command {
        Command {
            channel: "main".to_string(),
            actor: admin(),
            kind,
            origin: None,
        }
    }

    async fn await_event<F>(rx: &mut UnboundedReceiver<Outbound>, pred: F) -> bool
    where
        F: Fn(&Event) -> bool,
    {
        tokio::time::timeout(Duration::from_secs(5), async {
            while let Some(outbound) = rx.recv().await {
                if pred(&outbound.event) {
                    return true;
                }
            }
            false
        })
        .await
        .unwrap_or(false)
    }

    #[tokio::test]
    async fn bots_play_a_full_round_unattended() {
        let services = Services::new();
        let mut state = ChannelState::new("main", Mode::Blackjack, TableConfig::default());
        for i in 1..=2 {
            let login = format!("main-bot-{}", i);
            services.ledger.ensure(&login);
            let mut seat = crate::gameplay::Seat::new(&login, Role::Ai);
            seat.auto = true;
            state.seats.push(seat);
        }
        state.shoe = Shoe::stacked(cards("2h 7s 9d 8c 7c Td 5h 6s 4d 9h 3c 8s 2d 7h 6c 5d"));
        let (room, tx) = Room::new(state, services);
        tokio::spawn(room.run());
        let (sub, mut rx) = unbounded_channel();
        tx.send(Input::Subscribe {
            id: 1,
            login: None,
            tx: sub,
        })
        .unwrap();
        tx.send(Input::Cmd(command(CommandKind::Admin(Directive::OpenBetting))))
            .unwrap();
        tx.send(Input::Cmd(command(CommandKind::Admin(Directive::StartNow))))
            .unwrap();
        // both seats are AI: the entire round resolves without input
        assert!(await_event(&mut rx, |e| matches!(e, Event::Settled { .. })).await);
    }

    #[tokio::test]
    async fn betting_window_closes_on_its_own() {
        let services = Services::new();
        services.ledger.ensure("alice");
        let config = TableConfig {
            betting_ms: 50,
            ..TableConfig::default()
        };
        let mut state = ChannelState::new("main", Mode::Blackjack, config);
        state.shoe = Shoe::stacked(cards("Ks 7d 9c 6h 5s"));
        let (room, tx) = Room::new(state, services);
        tokio::spawn(room.run());
        let (sub, mut rx) = unbounded_channel();
        tx.send(Input::Subscribe {
            id: 1,
            login: Some("alice".to_string()),
            tx: sub,
        })
        .unwrap();
        tx.send(Input::Cmd(command(CommandKind::Admin(Directive::OpenBetting))))
            .unwrap();
        tx.send(Input::Cmd(Command {
            channel: "main".to_string(),
            actor: Identity::new("alice", Role::Player),
            kind: CommandKind::Table(TableCmd::PlaceBet(100)),
            origin: Some(1),
        }))
        .unwrap();
        // no start command: the window timer deals the round
        assert!(await_event(&mut rx, |e| matches!(e, Event::RoundStarted { .. })).await);
    }

    #[tokio::test]
    async fn failures_warn_the_actor_privately() {
        let services = Services::new();
        services.ledger.ensure("alice");
        let state = ChannelState::new("main", Mode::Blackjack, TableConfig::default());
        let (room, tx) = Room::new(state, services);
        tokio::spawn(room.run());
        let (alice_tx, mut alice_rx) = unbounded_channel();
        let (spectator_tx, mut spectator_rx) = unbounded_channel();
        tx.send(Input::Subscribe {
            id: 1,
            login: Some("alice".to_string()),
            tx: alice_tx,
        })
        .unwrap();
        tx.send(Input::Subscribe {
            id: 2,
            login: None,
            tx: spectator_tx,
        })
        .unwrap();
        // hitting while idle is out of phase
        tx.send(Input::Cmd(Command {
            channel: "main".to_string(),
            actor: Identity::new("alice", Role::Player),
            kind: CommandKind::Table(TableCmd::Hit),
            origin: Some(1),
        }))
        .unwrap();
        assert!(
            await_event(&mut alice_rx, |e| matches!(
                e,
                Event::Warning { reason, .. } if reason == "out_of_phase"
            ))
            .await
        );
        // overlays see the join snapshot but never the failure
        tokio::time::sleep(Duration::from_millis(50)).await;
        while let Ok(outbound) = spectator_rx.try_recv() {
            assert!(!matches!(outbound.event, Event::Warning { .. }));
        }
    }
}
