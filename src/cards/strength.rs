use super::InvalidHand;
use super::card::Card;
use super::rank::Rank;
use super::suit::Suit;

/// The nine standard hand categories, high card low, straight flush high.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum Category {
    HighCard = 0,
    OnePair = 1,
    TwoPair = 2,
    ThreeOfAKind = 3,
    Straight = 4,
    Flush = 5,
    FullHouse = 6,
    FourOfAKind = 7,
    StraightFlush = 8,
}

impl Category {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::HighCard => "HighCard",
            Self::OnePair => "OnePair",
            Self::TwoPair => "TwoPair",
            Self::ThreeOfAKind => "ThreeOfAKind",
            Self::Straight => "Straight",
            Self::Flush => "Flush",
            Self::FullHouse => "FullHouse",
            Self::FourOfAKind => "FourOfAKind",
            Self::StraightFlush => "StraightFlush",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Tie-break ranks in comparison order: the category-defining ranks
/// first (pair, trips, straight high, ...), then the free kickers,
/// descending. Lexicographic Vec ordering gives the standard total
/// order once categories are equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Kicks(Vec<Rank>);

impl From<Vec<Rank>> for Kicks {
    fn from(ranks: Vec<Rank>) -> Self {
        Self(ranks)
    }
}

impl Kicks {
    pub fn ranks(&self) -> &[Rank] {
        &self.0
    }
}

impl std::fmt::Display for Kicks {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        for rank in &self.0 {
            write!(f, "{}", rank)?;
        }
        Ok(())
    }
}

/// A fully-evaluated hand strength for comparison.
/// Ordering is lexicographic: category first, then kickers.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Strength {
    pub category: Category,
    pub kicks: Kicks,
}

impl Strength {
    /// Best five-card strength within five to seven distinct cards.
    /// Pure and deterministic on its input.
    pub fn evaluate(cards: &[Card]) -> Result<Self, InvalidHand> {
        if cards.len() < 5 || cards.len() > 7 {
            return Err(InvalidHand("expected five to seven cards"));
        }
        let mut seen = [false; 52];
        for card in cards {
            let i = u8::from(*card) as usize;
            if seen[i] {
                return Err(InvalidHand("duplicate card"));
            }
            seen[i] = true;
        }
        let mut counts = [0u8; 13];
        for card in cards {
            counts[u8::from(card.rank()) as usize] += 1;
        }
        let flush = Suit::all()
            .into_iter()
            .find(|s| cards.iter().filter(|c| c.suit() == *s).count() >= 5);
        if let Some(suit) = flush {
            let mut mask = [false; 13];
            for card in cards.iter().filter(|c| c.suit() == suit) {
                mask[u8::from(card.rank()) as usize] = true;
            }
            if let Some(high) = Self::straight_high(&mask) {
                return Ok(Self::from((Category::StraightFlush, vec![high])));
            }
        }
        if let Some(quad) = Self::tier(&counts, 4).first().copied() {
            let kicker = Self::free(&counts, &[quad], 1);
            let mut kicks = vec![quad];
            kicks.extend(kicker);
            return Ok(Self::from((Category::FourOfAKind, kicks)));
        }
        let trips = Self::tier(&counts, 3);
        let pairs = Self::tier(&counts, 2);
        if let Some(trip) = trips.first().copied() {
            // a second set fills the house as the pair
            let pair = trips
                .get(1)
                .copied()
                .into_iter()
                .chain(pairs.first().copied())
                .max();
            if let Some(pair) = pair {
                return Ok(Self::from((Category::FullHouse, vec![trip, pair])));
            }
        }
        if let Some(suit) = flush {
            let mut kicks = cards
                .iter()
                .filter(|c| c.suit() == suit)
                .map(|c| c.rank())
                .collect::<Vec<_>>();
            kicks.sort_unstable_by(|a, b| b.cmp(a));
            kicks.truncate(5);
            return Ok(Self::from((Category::Flush, kicks)));
        }
        let mut mask = [false; 13];
        for (i, &n) in counts.iter().enumerate() {
            mask[i] = n > 0;
        }
        if let Some(high) = Self::straight_high(&mask) {
            return Ok(Self::from((Category::Straight, vec![high])));
        }
        if let Some(trip) = trips.first().copied() {
            let mut kicks = vec![trip];
            kicks.extend(Self::free(&counts, &[trip], 2));
            return Ok(Self::from((Category::ThreeOfAKind, kicks)));
        }
        match pairs.as_slice() {
            [] => {
                let kicks = Self::free(&counts, &[], 5);
                Ok(Self::from((Category::HighCard, kicks)))
            }
            [pair] => {
                let mut kicks = vec![*pair];
                kicks.extend(Self::free(&counts, &[*pair], 3));
                Ok(Self::from((Category::OnePair, kicks)))
            }
            [hi, lo, ..] => {
                let mut kicks = vec![*hi, *lo];
                kicks.extend(Self::free(&counts, &[*hi, *lo], 1));
                Ok(Self::from((Category::TwoPair, kicks)))
            }
        }
    }
    /// Highest straight top card in a rank presence mask, wheel included.
    fn straight_high(mask: &[bool; 13]) -> Option<Rank> {
        for high in (3..13usize).rev() {
            if (high - 3..=high).all(|i| mask[i]) && mask[if high == 3 { 12 } else { high - 4 }] {
                return Some(Rank::from(high as u8));
            }
        }
        None
    }
    /// Ranks appearing exactly n times, descending.
    fn tier(counts: &[u8; 13], n: u8) -> Vec<Rank> {
        (0..13usize)
            .rev()
            .filter(|&i| counts[i] == n)
            .map(|i| Rank::from(i as u8))
            .collect()
    }
    /// The top `take` ranks not already consumed by the category.
    fn free(counts: &[u8; 13], used: &[Rank], take: usize) -> Vec<Rank> {
        (0..13usize)
            .rev()
            .filter(|&i| counts[i] > 0)
            .map(|i| Rank::from(i as u8))
            .filter(|r| !used.contains(r))
            .take(take)
            .collect()
    }
}

impl From<(Category, Vec<Rank>)> for Strength {
    fn from((category, kicks): (Category, Vec<Rank>)) -> Self {
        Self {
            category,
            kicks: Kicks::from(kicks),
        }
    }
}

impl std::fmt::Display for Strength {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:<14}{}", self.category, self.kicks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::card::cards;

    fn eval(s: &str) -> Strength {
        Strength::evaluate(&cards(s)).unwrap()
    }

    #[test]
    fn categories() {
        assert_eq!(eval("2c 5d 9h Jc Ks Th 3d").category, Category::HighCard);
        assert_eq!(eval("2c 2d 9h Jc Ks Th 3d").category, Category::OnePair);
        assert_eq!(eval("2c 2d 9h 9c Ks Th 3d").category, Category::TwoPair);
        assert_eq!(eval("2c 2d 2h 9c Ks Th 3d").category, Category::ThreeOfAKind);
        assert_eq!(eval("2c 3d 4h 5c 6s Th Kd").category, Category::Straight);
        assert_eq!(eval("2c 8c 4c Jc Kc Th 3d").category, Category::Flush);
        assert_eq!(eval("2c 2d 2h 9c 9s Th 3d").category, Category::FullHouse);
        assert_eq!(eval("2c 2d 2h 2s Ks Th 3d").category, Category::FourOfAKind);
        assert_eq!(eval("2c 3c 4c 5c 6c Th Kd").category, Category::StraightFlush);
    }

    #[test]
    fn wheel() {
        let straight = eval("Ac 2d 3h 4c 5s Th Kd");
        assert_eq!(straight.category, Category::Straight);
        assert_eq!(straight.kicks.ranks(), &[Rank::Five]);
    }

    #[test]
    fn ace_high_straight() {
        let straight = eval("Ac Kd Qh Jc Ts 2h 3d");
        assert_eq!(straight.kicks.ranks(), &[Rank::Ace]);
    }

    #[test]
    fn double_trips_is_full_house() {
        let boat = eval("9c 9d 9h 5c 5s 5d Kd");
        assert_eq!(boat.category, Category::FullHouse);
        assert_eq!(boat.kicks.ranks(), &[Rank::Nine, Rank::Five]);
    }

    #[test]
    fn kicker_tiebreak() {
        let hi = eval("Ac Ad 9h Jc Ks 4h 3d");
        let lo = eval("As Ah 9c Jd Qs 4d 3c");
        assert!(hi > lo);
    }

    #[test]
    fn three_pairs_take_best_two() {
        let two = eval("9c 9d 5h 5c 2s 2d Kd");
        assert_eq!(two.category, Category::TwoPair);
        assert_eq!(two.kicks.ranks(), &[Rank::Nine, Rank::Five, Rank::King]);
    }

    #[test]
    fn total_order() {
        let ladder = [
            eval("2c 5d 9h Jc Ks Th 3d"),
            eval("2c 2d 9h Jc Ks Th 3d"),
            eval("2c 2d 9h 9c Ks Th 3d"),
            eval("2c 2d 2h 9c Ks Th 3d"),
            eval("2c 3d 4h 5c 6s Th Kd"),
            eval("2c 8c 4c Jc Kc Th 3d"),
            eval("2c 2d 2h 9c 9s Th 3d"),
            eval("2c 2d 2h 2s Ks Th 3d"),
            eval("2c 3c 4c 5c 6c Th Kd"),
        ];
        for pair in ladder.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn deterministic() {
        let hand = "2c 8c 4c Jc Kc Th 3d";
        assert_eq!(eval(hand), eval(hand));
    }

    #[test]
    fn rejects_duplicates() {
        assert!(Strength::evaluate(&cards("2c 2c 4h 5c 6s Th Kd")).is_err());
    }

    #[test]
    fn rejects_short_hands() {
        assert!(Strength::evaluate(&cards("2c 3d 4h")).is_err());
    }
}
