use super::view::PokerView;
use crate::cards::Card;
use crate::cards::Category;
use crate::cards::Strength;
use crate::gameplay::TableCmd;
use rand::Rng;
use rand::rngs::StdRng;

/// How often the policy peels or stabs without the equity to back it.
const BLUFF_RATE: f32 = 0.08;

/// Equity-heuristic poker policy: weighted hole strength preflop,
/// best-of-seven category postflop, measured against pot odds and
/// stack-to-pot ratio. A small stochastic bluff rate keeps it honest;
/// everything else is deterministic on the view.
pub struct PotOdds;

impl PotOdds {
    pub fn decide(view: &PokerView, rng: &mut StdRng) -> TableCmd {
        let equity = if view.community.is_empty() {
            Self::preflop(&view.hole)
        } else {
            Self::postflop(view)
        };
        if view.to_call <= 0 {
            if equity > 0.70 && view.stack > 0 {
                return Self::raise_to(view);
            }
            if equity > 0.40 && rng.random::<f32>() < BLUFF_RATE {
                return Self::raise_to(view);
            }
            TableCmd::Check
        } else {
            let odds = view.odds();
            // deep stacks can chase a little thinner
            let cushion = if view.spr() > 6.0 { 0.05 } else { 0.0 };
            if equity > 0.80 && view.stack > view.to_call {
                Self::raise_to(view)
            } else if equity + cushion >= odds {
                TableCmd::Call
            } else if odds < 0.20 && rng.random::<f32>() < BLUFF_RATE {
                TableCmd::Call
            } else {
                TableCmd::Fold
            }
        }
    }

    /// Half-pot pressure, clamped into the table bounds and the stack.
    fn raise_to(view: &PokerView) -> TableCmd {
        if view.current_bet >= view.max_bet {
            return if view.to_call > 0 {
                TableCmd::Call
            } else {
                TableCmd::Check
            };
        }
        let target = view.current_bet + (view.pot / 2).max(view.min_bet);
        let ceiling = view.my_street + view.stack;
        let to = target
            .min(view.max_bet)
            .min(ceiling)
            .max(view.current_bet + 1);
        TableCmd::Raise(to)
    }

    /// Hole weighting: pair rank, high cards, suitedness, gap penalty.
    fn preflop(hole: &[Card]) -> f32 {
        let (a, b) = match hole {
            [a, b] => (*a, *b),
            _ => return 0.0,
        };
        let hi = a.rank().max(b.rank()) as u8 as f32;
        let lo = a.rank().min(b.rank()) as u8 as f32;
        if a.rank() == b.rank() {
            return 0.55 + hi / 12.0 * 0.35;
        }
        let mut equity = 0.15 + hi / 12.0 * 0.30 + lo / 12.0 * 0.10;
        if a.suit() == b.suit() {
            equity += 0.08;
        }
        let gap = (hi - lo - 1.0).max(0.0);
        if gap == 0.0 {
            equity += 0.05;
        } else {
            equity -= 0.03 * gap.min(3.0);
        }
        equity.clamp(0.0, 1.0)
    }

    /// Made-hand category against the board, squashed to [0, 1].
    fn postflop(view: &PokerView) -> f32 {
        let mut cards = view.hole.clone();
        cards.extend(view.community.iter().copied());
        let strength = match Strength::evaluate(&cards) {
            Ok(strength) => strength,
            Err(_) => return 0.3,
        };
        let kicker = strength
            .kicks
            .ranks()
            .first()
            .map(|r| *r as u8 as f32 / 12.0)
            .unwrap_or(0.0);
        match strength.category {
            Category::HighCard => 0.12 + kicker * 0.10,
            Category::OnePair => 0.35 + kicker * 0.10,
            Category::TwoPair => 0.60,
            Category::ThreeOfAKind => 0.72,
            Category::Straight => 0.80,
            Category::Flush => 0.85,
            Category::FullHouse => 0.92,
            Category::FourOfAKind => 0.97,
            Category::StraightFlush => 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gameplay::Street;
    use rand::SeedableRng;

    fn view(hole: &str, community: &str, pot: i64, current: i64, mine: i64, stack: i64) -> PokerView {
        PokerView {
            hole: crate::cards::card::cards(hole),
            community: crate::cards::card::cards(community),
            street: Street::Pref,
            pot,
            current_bet: current,
            my_street: mine,
            to_call: (current - mine).max(0),
            stack,
            min_bet: 10,
            max_bet: 500,
        }
    }

    #[test]
    fn aces_raise_preflop() {
        let ref mut rng = StdRng::seed_from_u64(1);
        let v = view("As Ad", "", 20, 10, 10, 190);
        match PotOdds::decide(&v, rng) {
            TableCmd::Raise(to) => assert!(to > 10),
            other => panic!("expected raise, got {}", other),
        }
    }

    #[test]
    fn junk_folds_to_pressure() {
        let ref mut rng = StdRng::seed_from_u64(2);
        let v = view("2c 7d", "", 100, 90, 10, 190);
        // 80 to call into 180: terrible odds for seven-deuce
        assert_eq!(PotOdds::decide(&v, rng), TableCmd::Fold);
    }

    #[test]
    fn checks_when_free() {
        let ref mut rng = StdRng::seed_from_u64(3);
        let v = view("2c 7d", "Kh 9s 4c", 40, 0, 0, 200);
        assert_eq!(PotOdds::decide(&v, rng), TableCmd::Check);
    }

    #[test]
    fn made_flush_piles_in() {
        let ref mut rng = StdRng::seed_from_u64(4);
        let v = view("Ah Kh", "Qh 9h 4h", 60, 30, 0, 300);
        match PotOdds::decide(&v, rng) {
            TableCmd::Raise(to) => assert!(to > 30 && to <= 500),
            other => panic!("expected raise, got {}", other),
        }
    }

    #[test]
    fn respects_table_cap() {
        let ref mut rng = StdRng::seed_from_u64(5);
        let mut v = view("Ah Kh", "Qh 9h 4h", 900, 500, 0, 400);
        v.max_bet = 500;
        // cannot raise past the cap, so the call keeps it legal
        assert_eq!(PotOdds::decide(&v, rng), TableCmd::Call);
    }

    #[test]
    fn deterministic_given_seed() {
        let v = view("Js Td", "9c 8h 2d", 80, 40, 0, 200);
        let a = PotOdds::decide(&v, &mut StdRng::seed_from_u64(7));
        let b = PotOdds::decide(&v, &mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
    }
}
