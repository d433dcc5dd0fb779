pub mod basic;
pub mod odds;
pub mod view;

pub use basic::Basic;
pub use odds::PotOdds;
pub use view::BjView;
pub use view::PokerView;

use crate::gameplay::Mode;
use crate::gameplay::Services;
use crate::gameplay::TableCmd;
use crate::gameroom::channel::ChannelState;

/// Decides the house action for the login currently on turn. Pure
/// projection in, ordinary [`TableCmd`] out; the command then passes
/// the same legality gate as a human one. None when there is nothing
/// to decide.
pub fn decide(state: &mut ChannelState, services: &Services, login: &str) -> Option<TableCmd> {
    match state.mode {
        Mode::Blackjack => {
            let view = view::bj_view(state, login)?;
            Some(Basic::decide(&view))
        }
        Mode::Poker => {
            let view = view::poker_view(state, services, login)?;
            // the bluff draw comes off the channel RNG so seeded
            // tables replay identically
            Some(PotOdds::decide(&view, &mut state.rng))
        }
    }
}

/// The always-legal fallback when a policy's pick is rejected.
pub fn fallback(state: &ChannelState, login: &str) -> TableCmd {
    match state.mode {
        Mode::Blackjack => TableCmd::Stand,
        Mode::Poker => {
            let matched = state
                .seat(login)
                .and_then(|s| s.poker())
                .map(|h| h.street == state.current_bet)
                .unwrap_or(true);
            if matched { TableCmd::Check } else { TableCmd::Fold }
        }
    }
}
