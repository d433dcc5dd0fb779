use super::card::Card;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// A dealing source: one deck per poker hand, a multi-deck shoe for
/// blackjack. Cards come off the head and are never observable from
/// outside the engine.
#[derive(Debug, Clone)]
pub struct Shoe {
    /// stored in reverse so the head of the shoe is the tail of the Vec
    cards: Vec<Card>,
    decks: usize,
}

impl Shoe {
    /// An ordered 52 x k sequence, head at the first card of the first deck.
    pub fn fresh(decks: usize) -> Self {
        assert!(decks > 0);
        let mut cards = Vec::with_capacity(decks * 52);
        for _ in 0..decks {
            for n in 0..52u8 {
                cards.push(Card::from(n));
            }
        }
        cards.reverse();
        Self { cards, decks }
    }
    /// Uniform Fisher-Yates over the whole remaining shoe.
    pub fn shuffle(&mut self, rng: &mut StdRng) {
        self.cards.shuffle(rng);
    }
    /// Fresh and shuffled in one step.
    pub fn shuffled(decks: usize, rng: &mut StdRng) -> Self {
        let mut shoe = Self::fresh(decks);
        shoe.shuffle(rng);
        shoe
    }
    /// A rigged shoe that deals exactly the given cards in order.
    /// Rigged shoes are never reshuffled or replaced by the engines.
    pub fn stacked(cards: Vec<Card>) -> Self {
        let mut cards = cards;
        cards.reverse();
        Self { cards, decks: 0 }
    }
    pub fn rigged(&self) -> bool {
        self.decks == 0
    }
    pub fn draw(&mut self) -> Option<Card> {
        self.cards.pop()
    }
    pub fn remaining(&self) -> usize {
        self.cards.len()
    }
    /// Cut-card check: reshuffle the blackjack shoe once three quarters
    /// of it has been dealt.
    pub fn depleted(&self) -> bool {
        self.cards.len() * 4 < self.decks * 52
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use std::collections::HashMap;

    #[test]
    fn fresh_is_full() {
        let shoe = Shoe::fresh(6);
        assert_eq!(shoe.remaining(), 312);
    }

    #[test]
    fn shuffle_is_permutation() {
        let ref mut rng = StdRng::seed_from_u64(0xDEA1);
        let mut shoe = Shoe::shuffled(2, rng);
        let mut counts = HashMap::new();
        while let Some(card) = shoe.draw() {
            *counts.entry(card).or_insert(0usize) += 1;
        }
        assert_eq!(counts.len(), 52);
        assert!(counts.values().all(|&n| n == 2));
    }

    #[test]
    fn stacked_deals_in_order() {
        let cards = super::super::card::cards("Ks 7d 9c 6h 5s");
        let mut shoe = Shoe::stacked(cards.clone());
        for card in cards {
            assert_eq!(shoe.draw(), Some(card));
        }
        assert_eq!(shoe.draw(), None);
    }

    #[test]
    fn same_seed_same_order() {
        let ref mut a = StdRng::seed_from_u64(42);
        let ref mut b = StdRng::seed_from_u64(42);
        let mut x = Shoe::shuffled(1, a);
        let mut y = Shoe::shuffled(1, b);
        while let Some(card) = x.draw() {
            assert_eq!(Some(card), y.draw());
        }
    }

    #[test]
    fn cut_card() {
        let mut shoe = Shoe::fresh(1);
        assert!(!shoe.depleted());
        for _ in 0..40 {
            shoe.draw();
        }
        assert!(shoe.depleted());
    }
}
