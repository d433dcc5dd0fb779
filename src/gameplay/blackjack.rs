use super::*;
use crate::Chips;
use crate::cards::Rank;
use crate::cards::Score;
use crate::cards::Shoe;
use crate::gameroom::channel::ChannelState;
use crate::gameroom::channel::strings;
use crate::gameroom::event::Event;
use crate::gameroom::event::PlayerDelta;
use crate::gameroom::event::PlayerPublic;
use crate::ledger::Purse;
use std::collections::BTreeMap;
use std::collections::HashSet;
use std::time::Duration;

/// The blackjack engine. Stateless; every call operates on the
/// channel's [`ChannelState`] and returns the events and timer cues
/// the room must apply.
///
/// Round shape: betting window, deal, optional insurance window when
/// the dealer shows an ace, dealer peek for naturals, one linear pass
/// of player turns, dealer auto-play to seventeen, single-pass
/// settlement.
pub struct Blackjack;

impl ModeOps for Blackjack {
    fn begin(&self, state: &mut ChannelState, services: &Services) -> Outcome {
        state.phase = Phase::Dealing;
        state.round += 1;
        if !state.shoe.rigged() && state.shoe.depleted() {
            log::info!("[channel {}] reshuffling shoe", state.name);
            state.shoe = Shoe::shuffled(state.config.decks, &mut state.rng);
        }
        let mut outcome = Outcome::new();
        for i in 0..state.seats.len() {
            if state.seats[i].bet <= 0 {
                continue;
            }
            let cards = vec![state.draw(), state.draw()];
            let bet = state.seats[i].bet;
            state.seats[i].hand = HandState::Blackjack(BjHand::deal(cards, bet));
        }
        state.dealer = vec![state.draw(), state.draw()];
        state.dealer_hidden = true;
        let players = state
            .seats
            .iter()
            .filter_map(|s| {
                s.bj().map(|h| PlayerPublic {
                    login: s.login.clone(),
                    bet: s.bet,
                    cards: strings(&h.hands[0].cards),
                    avatar: None,
                })
            })
            .collect();
        outcome.events.push(Event::RoundStarted {
            mode: state.mode,
            dealer_up: state.dealer.first().map(|c| c.to_string()),
            players,
            community: Vec::new(),
            pot: 0,
            current_bet: 0,
            action_ends_at: None,
        });
        let up = state.dealer[0].rank();
        if up == Rank::Ace {
            // side-bet window before the peek
            state.insurance_open = true;
            state.phase = Phase::Action;
            outcome.cues.push(Cue::ArmPhase(Duration::from_millis(
                crate::INSURANCE_WINDOW_MS,
            )));
        } else if up.pips() == 10 {
            outcome.merge(self.peek(state, services));
        } else {
            outcome.merge(self.start_turns(state, services));
        }
        outcome
    }

    fn act(
        &self,
        state: &mut ChannelState,
        services: &Services,
        login: &str,
        cmd: &TableCmd,
    ) -> Result<Outcome, TableError> {
        if state.insurance_open {
            return match cmd {
                TableCmd::Insurance(amount) => self.insure(state, services, login, *amount),
                TableCmd::Surrender => {
                    let mut outcome = Outcome::new();
                    self.surrender(state, services, login, &mut outcome)?;
                    Ok(outcome)
                }
                _ => Err(TableError::InvalidAction("insurance window open")),
            };
        }
        if state.phase != Phase::Action {
            return Err(TableError::OutOfPhase);
        }
        if state.rotation.current() != Some(login) {
            return Err(TableError::InvalidAction("not your turn"));
        }
        let mut outcome = Outcome::new();
        match cmd {
            TableCmd::Hit => self.hit(state, login, &mut outcome)?,
            TableCmd::Stand => self.stand(state, login, &mut outcome)?,
            TableCmd::Double => self.double(state, services, login, &mut outcome)?,
            TableCmd::Split => self.split(state, services, login, &mut outcome)?,
            TableCmd::Surrender => self.surrender(state, services, login, &mut outcome)?,
            TableCmd::Insurance(_) => return Err(TableError::InvalidAction("insurance closed")),
            _ => return Err(TableError::InvalidAction("not a blackjack action")),
        }
        self.continue_turns(state, services, &mut outcome);
        Ok(outcome)
    }

    fn expire(&self, state: &mut ChannelState, services: &Services) -> Outcome {
        if state.phase != Phase::Action || state.insurance_open {
            return Outcome::new();
        }
        let Some(login) = state.rotation.current().map(str::to_string) else {
            return Outcome::new();
        };
        log::info!("[channel {}] {} timed out, standing", state.name, login);
        services.heuristics.record_timeout(&login);
        let mut outcome = Outcome::new();
        if let Some(hand) = state.seat_mut(&login).and_then(|s| s.bj_mut()) {
            if let Some(i) = hand.live() {
                hand.hands[i].stood = true;
            }
        }
        self.continue_turns(state, services, &mut outcome);
        outcome
    }

    fn advance(&self, state: &mut ChannelState, services: &Services, forced: bool) -> Outcome {
        if state.insurance_open {
            return self.peek(state, services);
        }
        if forced && state.phase == Phase::Action {
            log::info!("[channel {}] forced advance, standing all hands", state.name);
            for seat in &mut state.seats {
                if let Some(hand) = seat.bj_mut() {
                    for sub in &mut hand.hands {
                        sub.stood = true;
                    }
                }
            }
            let mut outcome = Outcome::new();
            self.dealer_play(state, &mut outcome);
            outcome.merge(self.settle(state, services));
            return outcome;
        }
        Outcome::new()
    }

    fn settle(&self, state: &mut ChannelState, services: &Services) -> Outcome {
        state.phase = Phase::Settled;
        let purse = state.purse();
        let dealer_score = Score::of(&state.dealer);
        let dealer_natural = Score::natural(&state.dealer);
        let mut stakes = BTreeMap::new();
        let mut payouts = BTreeMap::new();
        for seat in &state.seats {
            let Some(hand) = seat.bj() else { continue };
            let mut payout = 0;
            if hand.surrendered {
                // half the original bet comes back
                payout += hand.hands[0].bet / 2;
            } else {
                for sub in &hand.hands {
                    payout += Self::payout(sub, hand.natural, dealer_score, dealer_natural);
                }
            }
            if dealer_natural {
                payout += hand.insurance * 3;
            }
            stakes.insert(seat.login.clone(), seat.bet);
            payouts.insert(seat.login.clone(), payout);
        }
        // single credit pass; the house account absorbs the residual
        for (login, payout) in &payouts {
            if *payout > 0 {
                services.ledger.credit(purse, login, *payout);
            }
        }
        if purse == Purse::Wallet {
            let escrowed: Chips = stakes.values().sum();
            let returned: Chips = payouts.values().sum();
            services.ledger.adjust_house(escrowed - returned);
        }
        let mut outcome = Outcome::with(Event::Settled {
            payouts: payouts.clone(),
            dealer: state.dealer_public(),
            community: Vec::new(),
        });
        finish_round(state, services, &stakes, &payouts, &mut outcome);
        outcome.cues.push(Cue::Settled);
        outcome
    }

    fn turn_duration(&self, services: &Services, login: &str) -> Duration {
        services.heuristics.turn_duration(login)
    }
}

impl Blackjack {
    /// Chips returned for one resolved sub-hand, stake included.
    fn payout(sub: &SubHand, natural: bool, dealer: Score, dealer_natural: bool) -> Chips {
        let score = sub.score();
        if score.bust() {
            0
        } else if natural {
            if dealer_natural {
                sub.bet
            } else {
                sub.bet + sub.bet * 3 / 2
            }
        } else if dealer_natural {
            0
        } else if dealer.bust() {
            sub.bet * 2
        } else {
            match score.total.cmp(&dealer.total) {
                std::cmp::Ordering::Greater => sub.bet * 2,
                std::cmp::Ordering::Equal => sub.bet,
                std::cmp::Ordering::Less => 0,
            }
        }
    }

    /// Dealer checks the hole card for a natural. Ends the round on
    /// the spot when there is one; surrender is closed either way.
    fn peek(&self, state: &mut ChannelState, services: &Services) -> Outcome {
        state.peeked = true;
        state.insurance_open = false;
        if Score::natural(&state.dealer) {
            log::info!("[channel {}] dealer natural", state.name);
            state.dealer_hidden = false;
            let mut outcome = Outcome::with(Event::DealerUpdate {
                hand: state.dealer_public(),
            });
            outcome.merge(self.settle(state, services));
            outcome
        } else {
            self.start_turns(state, services)
        }
    }

    fn start_turns(&self, state: &mut ChannelState, services: &Services) -> Outcome {
        state.phase = Phase::Action;
        let order = state
            .seats
            .iter()
            .filter(|s| s.bj().is_some())
            .map(|s| s.login.clone())
            .collect();
        state.rotation = Rotation::start(order, 0);
        let mut outcome = Outcome::new();
        self.continue_turns(state, services, &mut outcome);
        outcome
    }

    /// Re-arms the turn for the pointer's next live hand, or runs the
    /// dealer and settles once every player hand is resolved.
    fn continue_turns(&self, state: &mut ChannelState, services: &Services, outcome: &mut Outcome) {
        let unresolved = state
            .seats
            .iter()
            .filter(|s| s.bj().map(|h| !h.resolved()).unwrap_or(false))
            .map(|s| s.login.clone())
            .collect::<HashSet<_>>();
        let current = state
            .rotation
            .open(|l| unresolved.contains(l))
            .map(str::to_string);
        match current {
            Some(login) => {
                if let Some(hand) = state.seat_mut(&login).and_then(|s| s.bj_mut()) {
                    if let Some(i) = hand.live() {
                        hand.active = i;
                    }
                }
                let duration = self.turn_duration(services, &login);
                outcome.events.push(Event::PlayerUpdate(PlayerDelta {
                    acting: Some(true),
                    ends_at: Some(crate::now_ms() + duration.as_millis() as u64),
                    ..PlayerDelta::of(&login)
                }));
                outcome.cues.push(Cue::ArmTurn { login, duration });
            }
            None => {
                self.dealer_play(state, outcome);
                outcome.merge(self.settle(state, services));
            }
        }
    }

    /// Hole card up, then hit to seventeen while any hand still
    /// contests the outcome. Dealer stands on all seventeens.
    fn dealer_play(&self, state: &mut ChannelState, outcome: &mut Outcome) {
        state.phase = Phase::Showdown;
        state.dealer_hidden = false;
        let contested = state
            .seats
            .iter()
            .filter_map(|s| s.bj())
            .filter(|h| !h.surrendered && !h.natural)
            .any(|h| h.hands.iter().any(|sub| !sub.busted()));
        if contested {
            while Score::of(&state.dealer).total < crate::DEALER_STAND {
                let card = state.draw();
                state.dealer.push(card);
            }
        }
        outcome.events.push(Event::DealerUpdate {
            hand: state.dealer_public(),
        });
    }

    fn hit(&self, state: &mut ChannelState, login: &str, outcome: &mut Outcome) -> Result<(), TableError> {
        let active = state
            .seat(login)
            .and_then(|s| s.bj())
            .and_then(|h| h.live())
            .ok_or(TableError::InvalidAction("no live hand"))?;
        let card = state.draw();
        let Some(hand) = state.seat_mut(login).and_then(|s| s.bj_mut()) else {
            return Err(TableError::InvalidAction("no live hand"));
        };
        hand.active = active;
        let sub = &mut hand.hands[active];
        sub.cards.push(card);
        let score = sub.score();
        if score.total == 21 {
            sub.stood = true;
        }
        outcome.events.push(Event::PlayerUpdate(PlayerDelta {
            hand: Some(strings(&sub.cards)),
            total: Some(score.total),
            ..PlayerDelta::of(login)
        }));
        Ok(())
    }

    fn stand(&self, state: &mut ChannelState, login: &str, outcome: &mut Outcome) -> Result<(), TableError> {
        let Some(hand) = state.seat_mut(login).and_then(|s| s.bj_mut()) else {
            return Err(TableError::InvalidAction("no live hand"));
        };
        let active = hand.live().ok_or(TableError::InvalidAction("no live hand"))?;
        hand.active = active;
        hand.hands[active].stood = true;
        let total = hand.hands[active].score().total;
        outcome.events.push(Event::PlayerUpdate(PlayerDelta {
            total: Some(total),
            ..PlayerDelta::of(login)
        }));
        Ok(())
    }

    /// Double the bet, draw exactly one, stand. Two-card hands only.
    fn double(
        &self,
        state: &mut ChannelState,
        services: &Services,
        login: &str,
        outcome: &mut Outcome,
    ) -> Result<(), TableError> {
        let purse = state.purse();
        let (active, extra) = {
            let hand = state
                .seat(login)
                .and_then(|s| s.bj())
                .ok_or(TableError::InvalidAction("no live hand"))?;
            let active = hand.live().ok_or(TableError::InvalidAction("no live hand"))?;
            let sub = &hand.hands[active];
            if sub.cards.len() != 2 || sub.doubled {
                return Err(TableError::InvalidAction("cannot double"));
            }
            (active, sub.bet)
        };
        let balance = services.ledger.debit(purse, login, extra)?;
        let card = state.draw();
        let Some(seat) = state.seat_mut(login) else {
            return Err(TableError::InvalidAction("not seated"));
        };
        seat.bet += extra;
        let total_bet = seat.bet;
        let Some(hand) = seat.bj_mut() else {
            return Err(TableError::InvalidAction("no live hand"));
        };
        hand.active = active;
        let sub = &mut hand.hands[active];
        sub.bet += extra;
        sub.doubled = true;
        sub.cards.push(card);
        sub.stood = true;
        let cards = strings(&sub.cards);
        let total = sub.score().total;
        outcome.events.push(Event::PlayerUpdate(PlayerDelta {
            bet: Some(total_bet),
            balance: Some(balance),
            hand: Some(cards),
            total: Some(total),
            ..PlayerDelta::of(login)
        }));
        Ok(())
    }

    /// Equal ranks split into two sequential sub-hands of one card
    /// each, the bet duplicated. No re-split.
    fn split(
        &self,
        state: &mut ChannelState,
        services: &Services,
        login: &str,
        outcome: &mut Outcome,
    ) -> Result<(), TableError> {
        let purse = state.purse();
        let bet = {
            let hand = state
                .seat(login)
                .and_then(|s| s.bj())
                .ok_or(TableError::InvalidAction("no live hand"))?;
            if hand.split() {
                return Err(TableError::InvalidAction("already split"));
            }
            let sub = &hand.hands[0];
            if sub.cards.len() != 2 || sub.cards[0].rank() != sub.cards[1].rank() {
                return Err(TableError::InvalidAction("cannot split"));
            }
            sub.bet
        };
        let balance = services.ledger.debit(purse, login, bet)?;
        let Some(seat) = state.seat_mut(login) else {
            return Err(TableError::InvalidAction("not seated"));
        };
        seat.bet += bet;
        let total_bet = seat.bet;
        let Some(hand) = seat.bj_mut() else {
            return Err(TableError::InvalidAction("no live hand"));
        };
        let first = hand.hands[0].cards[0];
        let second = hand.hands[0].cards[1];
        hand.hands = vec![
            SubHand::new(vec![first], bet), //
            SubHand::new(vec![second], bet),
        ];
        hand.active = 0;
        outcome.events.push(Event::PlayerUpdate(PlayerDelta {
            bet: Some(total_bet),
            balance: Some(balance),
            hand: Some(vec![first.to_string(), second.to_string()]),
            ..PlayerDelta::of(login)
        }));
        Ok(())
    }

    /// Early surrender only: half the bet forfeited, closed once the
    /// dealer has peeked.
    fn surrender(
        &self,
        state: &mut ChannelState,
        services: &Services,
        login: &str,
        outcome: &mut Outcome,
    ) -> Result<(), TableError> {
        let _ = services;
        if state.peeked {
            return Err(TableError::InvalidAction("surrender closed"));
        }
        let Some(hand) = state.seat_mut(login).and_then(|s| s.bj_mut()) else {
            return Err(TableError::InvalidAction("no live hand"));
        };
        if hand.split()
            || hand.natural
            || hand.surrendered
            || hand.hands[0].cards.len() != 2
            || hand.hands[0].doubled
        {
            return Err(TableError::InvalidAction("cannot surrender"));
        }
        hand.surrendered = true;
        hand.hands[0].stood = true;
        log::debug!("[channel {}] {} surrenders", state.name, login);
        outcome.events.push(Event::PlayerUpdate(PlayerDelta {
            folded: Some(true),
            ..PlayerDelta::of(login)
        }));
        Ok(())
    }

    /// Insurance while the dealer shows an ace: up to half the bet,
    /// paid two to one against a dealer natural.
    fn insure(
        &self,
        state: &mut ChannelState,
        services: &Services,
        login: &str,
        amount: Chips,
    ) -> Result<Outcome, TableError> {
        if amount <= 0 {
            return Err(TableError::InvalidPayload("insurance must be positive"));
        }
        let purse = state.purse();
        let amount = {
            let hand = state
                .seat(login)
                .and_then(|s| s.bj())
                .ok_or(TableError::InvalidAction("no live hand"))?;
            if hand.insurance > 0 {
                return Err(TableError::InvalidAction("already insured"));
            }
            let cap = hand.hands[0].bet / 2;
            if cap == 0 {
                return Err(TableError::InvalidAction("bet too small to insure"));
            }
            amount.min(cap)
        };
        let balance = services.ledger.debit(purse, login, amount)?;
        let Some(seat) = state.seat_mut(login) else {
            return Err(TableError::InvalidAction("not seated"));
        };
        seat.bet += amount;
        let total_bet = seat.bet;
        if let Some(hand) = seat.bj_mut() {
            hand.insurance = amount;
        }
        Ok(Outcome::with(Event::PlayerUpdate(PlayerDelta {
            bet: Some(total_bet),
            balance: Some(balance),
            ..PlayerDelta::of(login)
        })))
    }
}
