use crate::Chips;
use crate::cards::Card;
use crate::cards::Score;
use serde::Deserialize;
use serde::Serialize;

/// Roles the authorization collaborator hands us. The core only cares
/// about admin-ness and whether a seat is driven by the house AI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Player,
    Ai,
    Streamer,
    Admin,
    Premier,
}

impl Role {
    pub const fn is_admin(&self) -> bool {
        matches!(self, Self::Admin | Self::Streamer)
    }
    pub const fn is_ai(&self) -> bool {
        matches!(self, Self::Ai)
    }
}

/// One seated login. `bet` is every chip escrowed for the current round
/// across sub-hands, doubles, splits, and insurance; the per-hand
/// breakdown lives in the mode state.
#[derive(Debug, Clone)]
pub struct Seat {
    pub login: String,
    pub role: Role,
    pub bet: Chips,
    /// queue-promoted seats place the minimum automatically at the
    /// next betting window
    pub auto: bool,
    pub hand: HandState,
}

impl Seat {
    pub fn new(login: &str, role: Role) -> Self {
        Self {
            login: login.to_string(),
            role,
            bet: 0,
            auto: false,
            hand: HandState::Empty,
        }
    }
    pub fn bj(&self) -> Option<&BjHand> {
        match &self.hand {
            HandState::Blackjack(h) => Some(h),
            _ => None,
        }
    }
    pub fn bj_mut(&mut self) -> Option<&mut BjHand> {
        match &mut self.hand {
            HandState::Blackjack(h) => Some(h),
            _ => None,
        }
    }
    pub fn poker(&self) -> Option<&PokerHand> {
        match &self.hand {
            HandState::Poker(h) => Some(h),
            _ => None,
        }
    }
    pub fn poker_mut(&mut self) -> Option<&mut PokerHand> {
        match &mut self.hand {
            HandState::Poker(h) => Some(h),
            _ => None,
        }
    }
}

/// Mode-specific hand state; Empty between rounds and for seats that
/// sat out the betting window.
#[derive(Debug, Clone, Default)]
pub enum HandState {
    #[default]
    Empty,
    Blackjack(BjHand),
    Poker(PokerHand),
}

/// One blackjack sub-hand. A split produces two, each starting from a
/// single card.
#[derive(Debug, Clone)]
pub struct SubHand {
    pub cards: Vec<Card>,
    pub bet: Chips,
    pub stood: bool,
    pub doubled: bool,
}

impl SubHand {
    pub fn new(cards: Vec<Card>, bet: Chips) -> Self {
        Self {
            cards,
            bet,
            stood: false,
            doubled: false,
        }
    }
    pub fn score(&self) -> Score {
        Score::of(&self.cards)
    }
    pub fn busted(&self) -> bool {
        self.score().bust()
    }
    pub fn resolved(&self) -> bool {
        self.stood || self.busted()
    }
}

#[derive(Debug, Clone)]
pub struct BjHand {
    pub hands: Vec<SubHand>,
    /// index of the sub-hand currently in play
    pub active: usize,
    pub surrendered: bool,
    pub insurance: Chips,
    pub natural: bool,
}

impl BjHand {
    pub fn deal(cards: Vec<Card>, bet: Chips) -> Self {
        let natural = Score::natural(&cards);
        let mut hand = SubHand::new(cards, bet);
        hand.stood = natural;
        Self {
            hands: vec![hand],
            active: 0,
            surrendered: false,
            insurance: 0,
            natural,
        }
    }
    pub fn split(&self) -> bool {
        self.hands.len() > 1
    }
    /// The sub-hand whose turn it is, if any is unresolved.
    pub fn live(&self) -> Option<usize> {
        self.hands
            .iter()
            .enumerate()
            .skip(self.active)
            .find(|(_, h)| !h.resolved())
            .map(|(i, _)| i)
    }
    pub fn resolved(&self) -> bool {
        self.surrendered || self.hands.iter().all(|h| h.resolved())
    }
}

#[derive(Debug, Clone, Default)]
pub struct PokerHand {
    pub hole: Vec<Card>,
    pub folded: bool,
    pub all_in: bool,
    /// chips contributed during the current street
    pub street: Chips,
    /// chips contributed across the whole round
    pub total: Chips,
    /// has responded to the current bet-to-match
    pub acted: bool,
}

impl PokerHand {
    pub fn deal(hole: Vec<Card>, posted: Chips, all_in: bool) -> Self {
        Self {
            hole,
            folded: false,
            all_in,
            street: posted,
            total: posted,
            acted: false,
        }
    }
    /// Still eligible to win the pot.
    pub fn live(&self) -> bool {
        !self.folded
    }
    /// Can still be asked to act this street.
    pub fn pending(&self, current_bet: Chips) -> bool {
        self.live() && !self.all_in && (self.street < current_bet || !self.acted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::card::cards;

    #[test]
    fn natural_stands_itself() {
        let hand = BjHand::deal(cards("As Kd"), 100);
        assert!(hand.natural);
        assert!(hand.resolved());
    }

    #[test]
    fn live_walks_sub_hands() {
        let mut hand = BjHand::deal(cards("8s 8d"), 50);
        hand.hands = vec![
            SubHand::new(cards("8s"), 50), //
            SubHand::new(cards("8d"), 50),
        ];
        assert_eq!(hand.live(), Some(0));
        hand.hands[0].stood = true;
        assert_eq!(hand.live(), Some(1));
        hand.hands[1].stood = true;
        assert!(hand.resolved());
    }

    #[test]
    fn pending_tracks_bet_to_match() {
        let mut hand = PokerHand::deal(cards("As Kd"), 10, false);
        assert!(hand.pending(10)); // matched but has not acted
        hand.acted = true;
        assert!(!hand.pending(10));
        assert!(hand.pending(30)); // raise re-opens the action
        hand.all_in = true;
        assert!(!hand.pending(30));
    }
}
