use super::view::BjView;
use crate::cards::Rank;
use crate::gameplay::TableCmd;

/// Basic-strategy blackjack policy on (total, soft flag, dealer up).
/// Always splits aces and eights, doubles nine through eleven against
/// the appropriate dealer ranges, and plays the standard soft table.
/// Never takes insurance.
pub struct Basic;

impl Basic {
    pub fn decide(view: &BjView) -> TableCmd {
        if view.can_split {
            if let Some(pair) = view.pair {
                if pair == Rank::Ace || pair == Rank::Eight {
                    return TableCmd::Split;
                }
            }
        }
        let up = view.dealer_up.pips();
        if view.can_double && !view.soft {
            let double = match view.total {
                11 => up <= 10,
                10 => (2..=9).contains(&up),
                9 => (3..=6).contains(&up),
                _ => false,
            };
            if double {
                return TableCmd::Double;
            }
        }
        if view.soft {
            return match view.total {
                t if t <= 17 => TableCmd::Hit,
                18 if up >= 9 => TableCmd::Hit,
                _ => TableCmd::Stand,
            };
        }
        match view.total {
            t if t <= 11 => TableCmd::Hit,
            12 => {
                if (4..=6).contains(&up) {
                    TableCmd::Stand
                } else {
                    TableCmd::Hit
                }
            }
            t if t <= 16 => {
                if (2..=6).contains(&up) {
                    TableCmd::Stand
                } else {
                    TableCmd::Hit
                }
            }
            _ => TableCmd::Stand,
        }
    }
}
