use crate::Chips;
use crate::cards::Card;
use crate::cards::Rank;
use crate::gameplay::Services;
use crate::gameplay::Street;
use crate::gameroom::channel::ChannelState;

/// Read-only projection of a blackjack turn. Policies see exactly what
/// a player at the table would: their own hand and the dealer up-card.
#[derive(Debug, Clone)]
pub struct BjView {
    pub total: u8,
    pub soft: bool,
    pub dealer_up: Rank,
    pub can_double: bool,
    pub can_split: bool,
    pub pair: Option<Rank>,
}

/// Read-only projection of a poker turn.
#[derive(Debug, Clone)]
pub struct PokerView {
    pub hole: Vec<Card>,
    pub community: Vec<Card>,
    pub street: Street,
    pub pot: Chips,
    pub current_bet: Chips,
    pub my_street: Chips,
    pub to_call: Chips,
    pub stack: Chips,
    pub min_bet: Chips,
    pub max_bet: Chips,
}

pub fn bj_view(state: &ChannelState, login: &str) -> Option<BjView> {
    let hand = state.seat(login)?.bj()?;
    let active = hand.live()?;
    let sub = &hand.hands[active];
    let score = sub.score();
    let dealer_up = state.dealer.first()?.rank();
    Some(BjView {
        total: score.total,
        soft: score.soft,
        dealer_up,
        can_double: sub.cards.len() == 2 && !sub.doubled,
        can_split: !hand.split()
            && sub.cards.len() == 2
            && sub.cards[0].rank() == sub.cards[1].rank(),
        pair: (sub.cards.len() == 2 && sub.cards[0].rank() == sub.cards[1].rank())
            .then(|| sub.cards[0].rank()),
    })
}

pub fn poker_view(state: &ChannelState, services: &Services, login: &str) -> Option<PokerView> {
    let hand = state.seat(login)?.poker()?;
    let stack = services.ledger.balance(state.purse(), login);
    Some(PokerView {
        hole: hand.hole.clone(),
        community: state.community.clone(),
        street: state.street,
        pot: state.pot,
        current_bet: state.current_bet,
        my_street: hand.street,
        to_call: (state.current_bet - hand.street).max(0),
        stack,
        min_bet: state.config.min_bet,
        max_bet: state.config.max_bet,
    })
}

impl PokerView {
    /// Pot odds the caller is being offered: needed / (pot + needed).
    pub fn odds(&self) -> f32 {
        if self.to_call <= 0 {
            0.0
        } else {
            self.to_call as f32 / (self.pot + self.to_call) as f32
        }
    }
    /// Stack-to-pot ratio; deep stacks play more speculative hands.
    pub fn spr(&self) -> f32 {
        self.stack as f32 / self.pot.max(1) as f32
    }
}
