use super::*;
use crate::Chips;
use crate::cards::Shoe;
use crate::cards::Strength;
use crate::gameroom::channel::ChannelState;
use crate::gameroom::channel::strings;
use crate::gameroom::event::Event;
use crate::gameroom::event::PlayerDelta;
use crate::gameroom::event::PlayerPublic;
use std::collections::BTreeMap;
use std::collections::HashSet;
use std::time::Duration;

/// The no-limit hold'em engine. Stateless like [`Blackjack`]; streets
/// progress preflop through river with 3/1/1 community reveals.
///
/// All-in handling is deliberately simple: short contributions are
/// accepted, and at showdown the entire pot goes to the single
/// best-evaluated hand among non-folded players (ties split). There is
/// no side-pot separation, so a short-stack all-in against two or more
/// live opponents can win chips it never covered. Known deviation from
/// cardroom rules; clients already settled on this behavior.
pub struct Poker;

impl ModeOps for Poker {
    fn begin(&self, state: &mut ChannelState, services: &Services) -> Outcome {
        state.phase = Phase::Dealing;
        state.round += 1;
        if !state.shoe.rigged() {
            state.shoe = Shoe::shuffled(1, &mut state.rng);
        }
        let purse = state.purse();
        let tournament = state.binding.is_some();
        let mut holes = Vec::new();
        for i in 0..state.seats.len() {
            let bet = state.seats[i].bet;
            let login = state.seats[i].login.clone();
            let stack = services.ledger.balance(purse, &login);
            // cash tables deal to bettors; tournament tables deal every
            // seat still holding chips, blinds or not
            if bet <= 0 && !(tournament && stack > 0) {
                continue;
            }
            let hole = vec![state.draw(), state.draw()];
            holes.push(Event::HoleCards {
                login: login.clone(),
                cards: strings(&hole),
            });
            state.seats[i].hand = HandState::Poker(PokerHand::deal(hole, bet, bet > 0 && stack == 0));
        }
        state.pot = state
            .seats
            .iter()
            .filter_map(|s| s.poker())
            .map(|h| h.total)
            .sum();
        state.current_bet = state
            .seats
            .iter()
            .filter_map(|s| s.poker())
            .map(|h| h.street)
            .max()
            .unwrap_or(0);
        state.street = Street::Pref;
        state.phase = Phase::Action;
        let order = state
            .seats
            .iter()
            .filter(|s| s.poker().is_some())
            .map(|s| s.login.clone())
            .collect();
        state.rotation = Rotation::start(order, state.opener);
        let players = state
            .seats
            .iter()
            .filter(|s| s.poker().is_some())
            .map(|s| PlayerPublic {
                login: s.login.clone(),
                bet: s.bet,
                cards: Vec::new(),
                avatar: None,
            })
            .collect();
        let mut outcome = Outcome::with(Event::RoundStarted {
            mode: state.mode,
            dealer_up: None,
            players,
            community: Vec::new(),
            pot: state.pot,
            current_bet: state.current_bet,
            action_ends_at: Some(crate::now_ms() + crate::POKER_TURN_MS),
        });
        outcome.events.extend(holes);
        outcome.cues.push(Cue::ArmPhase(Duration::from_millis(crate::STREET_IDLE_MS)));
        self.resume(state, services, &mut outcome);
        outcome
    }

    fn act(
        &self,
        state: &mut ChannelState,
        services: &Services,
        login: &str,
        cmd: &TableCmd,
    ) -> Result<Outcome, TableError> {
        if state.phase != Phase::Action {
            return Err(TableError::OutOfPhase);
        }
        if state.rotation.current() != Some(login) {
            return Err(TableError::InvalidAction("not your turn"));
        }
        let mut outcome = Outcome::new();
        match cmd {
            TableCmd::Check => self.check(state, login)?,
            TableCmd::Call => self.call(state, services, login, &mut outcome)?,
            TableCmd::Raise(to) => self.raise(state, services, login, *to, &mut outcome)?,
            TableCmd::Fold => self.fold(state, login, &mut outcome)?,
            _ => return Err(TableError::InvalidAction("not a poker action")),
        }
        // emitted only after pot and acted-set are consistent
        outcome.events.push(self.betting_event(state));
        self.resume(state, services, &mut outcome);
        Ok(outcome)
    }

    fn expire(&self, state: &mut ChannelState, services: &Services) -> Outcome {
        if state.phase != Phase::Action {
            return Outcome::new();
        }
        let Some(login) = state.rotation.current().map(str::to_string) else {
            return Outcome::new();
        };
        services.heuristics.record_timeout(&login);
        let mut outcome = Outcome::new();
        let current_bet = state.current_bet;
        let channel_name = state.name.clone();
        if let Some(hand) = state.seat_mut(&login).and_then(|s| s.poker_mut()) {
            if hand.street == current_bet {
                log::info!("[channel {}] {} timed out, checking", channel_name, login);
                hand.acted = true;
            } else {
                log::info!("[channel {}] {} timed out, folding", channel_name, login);
                hand.folded = true;
                outcome.events.push(Event::PlayerUpdate(PlayerDelta {
                    folded: Some(true),
                    ..PlayerDelta::of(&login)
                }));
            }
        }
        outcome.events.push(self.betting_event(state));
        self.resume(state, services, &mut outcome);
        outcome
    }

    fn advance(&self, state: &mut ChannelState, services: &Services, forced: bool) -> Outcome {
        if state.phase != Phase::Action {
            return Outcome::new();
        }
        if forced {
            return self.settle(state, services);
        }
        // idle street: check the matched, fold the rest
        let current_bet = state.current_bet;
        let mut outcome = Outcome::new();
        for seat in &mut state.seats {
            let login = seat.login.clone();
            let Some(hand) = seat.poker_mut() else { continue };
            if !hand.pending(current_bet) {
                continue;
            }
            if hand.street == current_bet {
                hand.acted = true;
            } else {
                hand.folded = true;
                outcome.events.push(Event::PlayerUpdate(PlayerDelta {
                    folded: Some(true),
                    ..PlayerDelta::of(&login)
                }));
            }
        }
        log::info!("[channel {}] street idled out, advancing", state.name);
        outcome.events.push(self.betting_event(state));
        self.resume(state, services, &mut outcome);
        outcome
    }

    fn settle(&self, state: &mut ChannelState, services: &Services) -> Outcome {
        let mut outcome = Outcome::new();
        if matches!(state.phase, Phase::Action | Phase::Showdown) {
            self.showdown(state, services, &mut outcome);
        }
        outcome
    }

    fn turn_duration(&self, _services: &Services, _login: &str) -> Duration {
        Duration::from_millis(crate::POKER_TURN_MS)
    }
}

impl Poker {
    /// Legal only when the street contribution already matches.
    fn check(&self, state: &mut ChannelState, login: &str) -> Result<(), TableError> {
        let current_bet = state.current_bet;
        let Some(hand) = state.seat_mut(login).and_then(|s| s.poker_mut()) else {
            return Err(TableError::InvalidAction("not in the hand"));
        };
        if hand.street != current_bet {
            return Err(TableError::InvalidAction("bet to match"));
        }
        hand.acted = true;
        Ok(())
    }

    /// Top up to the bet-to-match, capped by the remaining stack. A
    /// short call is an accepted all-in.
    fn call(
        &self,
        state: &mut ChannelState,
        services: &Services,
        login: &str,
        outcome: &mut Outcome,
    ) -> Result<(), TableError> {
        let purse = state.purse();
        let current_bet = state.current_bet;
        let street = state
            .seat(login)
            .and_then(|s| s.poker())
            .map(|h| h.street)
            .ok_or(TableError::InvalidAction("not in the hand"))?;
        let need = current_bet - street;
        let balance = services.ledger.balance(purse, login);
        let pay = need.min(balance);
        let balance = if pay > 0 {
            services.ledger.debit(purse, login, pay)?
        } else {
            balance
        };
        let Some(seat) = state.seat_mut(login) else {
            return Err(TableError::InvalidAction("not seated"));
        };
        seat.bet += pay;
        let Some(hand) = seat.poker_mut() else {
            return Err(TableError::InvalidAction("not in the hand"));
        };
        hand.street += pay;
        hand.total += pay;
        hand.acted = true;
        if pay < need || balance == 0 {
            hand.all_in = true;
        }
        let delta = PlayerDelta {
            bet: Some(hand.total),
            balance: Some(balance),
            all_in: hand.all_in.then_some(true),
            ..PlayerDelta::of(login)
        };
        state.pot += pay;
        outcome.events.push(Event::PlayerUpdate(delta));
        Ok(())
    }

    /// Raise to a new street total. Must exceed the bet-to-match and
    /// stay within table bounds; a raise the stack cannot cover
    /// becomes an accepted all-in. A true raise resets the acted set
    /// to just the raiser.
    fn raise(
        &self,
        state: &mut ChannelState,
        services: &Services,
        login: &str,
        to: Chips,
        outcome: &mut Outcome,
    ) -> Result<(), TableError> {
        if to <= state.current_bet {
            return Err(TableError::InvalidAction("raise must exceed the bet"));
        }
        if to < state.config.min_bet || to > state.config.max_bet {
            return Err(TableError::InvalidAction("raise out of bounds"));
        }
        let purse = state.purse();
        let street = state
            .seat(login)
            .and_then(|s| s.poker())
            .map(|h| h.street)
            .ok_or(TableError::InvalidAction("not in the hand"))?;
        let balance = services.ledger.balance(purse, login);
        let mut delta = to - street;
        let mut shove = false;
        if delta >= balance {
            delta = balance;
            shove = true;
        }
        if delta <= 0 {
            return Err(TableError::InvalidAction("no chips behind"));
        }
        let balance = services.ledger.debit(purse, login, delta)?;
        let Some(seat) = state.seat_mut(login) else {
            return Err(TableError::InvalidAction("not seated"));
        };
        seat.bet += delta;
        let Some(hand) = seat.poker_mut() else {
            return Err(TableError::InvalidAction("not in the hand"));
        };
        hand.street += delta;
        hand.total += delta;
        hand.acted = true;
        hand.all_in = shove;
        let raised_to = hand.street;
        let total = hand.total;
        state.pot += delta;
        if raised_to > state.current_bet {
            state.current_bet = raised_to;
            // every other live player must respond again
            for seat in &mut state.seats {
                if seat.login != login {
                    if let Some(hand) = seat.poker_mut() {
                        hand.acted = false;
                    }
                }
            }
        }
        outcome.events.push(Event::PlayerUpdate(PlayerDelta {
            bet: Some(total),
            balance: Some(balance),
            all_in: shove.then_some(true),
            ..PlayerDelta::of(login)
        }));
        Ok(())
    }

    fn fold(&self, state: &mut ChannelState, login: &str, outcome: &mut Outcome) -> Result<(), TableError> {
        let Some(hand) = state.seat_mut(login).and_then(|s| s.poker_mut()) else {
            return Err(TableError::InvalidAction("not in the hand"));
        };
        hand.folded = true;
        hand.acted = true;
        outcome.events.push(Event::PlayerUpdate(PlayerDelta {
            folded: Some(true),
            ..PlayerDelta::of(login)
        }));
        Ok(())
    }

    fn betting_event(&self, state: &ChannelState) -> Event {
        Event::PokerBetting {
            pot: state.pot,
            current_bet: state.current_bet,
            street_bets: state
                .seats
                .iter()
                .filter_map(|s| s.poker().map(|h| (s.login.clone(), h.street)))
                .collect::<BTreeMap<_, _>>(),
            community: state.community_public(),
            phase: state.street,
        }
    }

    fn live(&self, state: &ChannelState) -> Vec<String> {
        state
            .seats
            .iter()
            .filter(|s| s.poker().map(|h| h.live()).unwrap_or(false))
            .map(|s| s.login.clone())
            .collect()
    }

    /// Drives the hand forward after any mutation: next turn on this
    /// street, next street, or showdown. Streets with nobody left to
    /// act (everyone all-in) cascade straight through.
    fn resume(&self, state: &mut ChannelState, services: &Services, outcome: &mut Outcome) {
        loop {
            let live = self.live(state);
            if live.len() <= 1 {
                self.showdown(state, services, outcome);
                return;
            }
            let current_bet = state.current_bet;
            let pending = state
                .seats
                .iter()
                .filter(|s| s.poker().map(|h| h.pending(current_bet)).unwrap_or(false))
                .map(|s| s.login.clone())
                .collect::<HashSet<_>>();
            if !pending.is_empty() {
                let next = state
                    .rotation
                    .open_cycle(|l| pending.contains(l))
                    .map(str::to_string);
                if let Some(login) = next {
                    let duration = Duration::from_millis(crate::POKER_TURN_MS);
                    outcome.events.push(Event::PlayerUpdate(PlayerDelta {
                        acting: Some(true),
                        ends_at: Some(crate::now_ms() + crate::POKER_TURN_MS),
                        ..PlayerDelta::of(&login)
                    }));
                    outcome.cues.push(Cue::ArmTurn { login, duration });
                    return;
                }
            }
            // street concluded: everyone live has matched and acted,
            // or is all-in, or folded
            match state.street.next() {
                Some(next) => {
                    state.street = next;
                    state.current_bet = 0;
                    for seat in &mut state.seats {
                        if let Some(hand) = seat.poker_mut() {
                            hand.street = 0;
                            hand.acted = false;
                        }
                    }
                    for _ in 0..next.reveals() {
                        let card = state.draw();
                        state.community.push(card);
                    }
                    let order = state
                        .seats
                        .iter()
                        .filter(|s| s.poker().map(|h| h.live()).unwrap_or(false))
                        .map(|s| s.login.clone())
                        .collect();
                    state.rotation = Rotation::start(order, 0);
                    outcome.events.push(self.betting_event(state));
                    outcome
                        .cues
                        .push(Cue::ArmPhase(Duration::from_millis(crate::STREET_IDLE_MS)));
                }
                None => {
                    self.showdown(state, services, outcome);
                    return;
                }
            }
        }
    }

    /// Awards the pot: uncontested to the last live player, otherwise
    /// to the best five-of-seven among non-folded hands after running
    /// the board out. Ties split; odd chips go to the earliest seats.
    fn showdown(&self, state: &mut ChannelState, services: &Services, outcome: &mut Outcome) {
        state.phase = Phase::Showdown;
        let live = self.live(state);
        let contested = live.len() > 1;
        if contested {
            while state.community.len() < 5 {
                let card = state.draw();
                state.community.push(card);
            }
        }
        let mut winners: Vec<String> = Vec::new();
        if contested {
            let mut best: Option<Strength> = None;
            for i in 0..state.seats.len() {
                let Some(hand) = state.seats[i].poker() else { continue };
                if !hand.live() {
                    continue;
                }
                let login = state.seats[i].login.clone();
                let mut cards = hand.hole.clone();
                cards.extend(state.community.iter().copied());
                let strength = match Strength::evaluate(&cards) {
                    Ok(strength) => strength,
                    Err(e) => {
                        log::error!("[channel {}] unevaluable hand for {}: {}", state.name, login, e);
                        continue;
                    }
                };
                outcome.events.push(Event::PlayerUpdate(PlayerDelta {
                    hand: Some(strings(&hand.hole)),
                    ..PlayerDelta::of(&login)
                }));
                match &best {
                    Some(b) if strength > *b => {
                        best = Some(strength);
                        winners = vec![login];
                    }
                    Some(b) if strength == *b => winners.push(login),
                    None => {
                        best = Some(strength);
                        winners = vec![login];
                    }
                    _ => {}
                }
            }
        } else {
            winners = live;
        }
        let mut stakes = BTreeMap::new();
        let mut payouts = BTreeMap::new();
        for seat in &state.seats {
            if let Some(hand) = seat.poker() {
                stakes.insert(seat.login.clone(), hand.total);
                payouts.insert(seat.login.clone(), 0);
            }
        }
        let pot = state.pot;
        if winners.is_empty() {
            // nobody can take the pot; refund contributions verbatim
            log::error!("[channel {}] no showdown winner, refunding", state.name);
            for (login, stake) in &stakes {
                payouts.insert(login.clone(), *stake);
            }
        } else {
            let n = winners.len() as Chips;
            let share = pot / n;
            let bonus = (pot % n) as usize;
            for (i, login) in winners.iter().enumerate() {
                let amount = share + if i < bonus { 1 } else { 0 };
                payouts.insert(login.clone(), amount);
            }
        }
        let purse = state.purse();
        for (login, amount) in &payouts {
            if *amount > 0 {
                services.ledger.credit(purse, login, *amount);
            }
        }
        state.phase = Phase::Settled;
        outcome.events.push(Event::Settled {
            payouts: payouts.clone(),
            dealer: Vec::new(),
            community: state.community_public(),
        });
        finish_round(state, services, &stakes, &payouts, outcome);
        outcome.cues.push(Cue::Settled);
    }
}
