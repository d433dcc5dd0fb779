use super::card::Card;

/// A blackjack hand total. Aces count 11 while the total stays at or
/// under 21, otherwise 1; `soft` is true when an ace is still counted
/// as 11.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Score {
    pub total: u8,
    pub soft: bool,
}

impl Score {
    pub fn of(cards: &[Card]) -> Self {
        let aces = cards
            .iter()
            .filter(|c| c.rank() == super::Rank::Ace)
            .count() as u8;
        let hard: u8 = cards
            .iter()
            .map(|c| c.rank().pips())
            .map(|p| if p == 11 { 1 } else { p })
            .sum();
        if aces > 0 && hard + 10 <= 21 {
            Self {
                total: hard + 10,
                soft: true,
            }
        } else {
            Self {
                total: hard,
                soft: false,
            }
        }
    }
    /// A two-card 21.
    pub fn natural(cards: &[Card]) -> bool {
        cards.len() == 2 && Self::of(cards).total == 21
    }
    pub fn bust(&self) -> bool {
        self.total > 21
    }
}

impl std::fmt::Display for Score {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        if self.soft {
            write!(f, "soft {}", self.total)
        } else {
            write!(f, "{}", self.total)
        }
    }
}
