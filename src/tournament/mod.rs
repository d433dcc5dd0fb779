//! Multi-table tournaments composed from channel round engines.
//!
//! - [`schedule`] — blind levels and the clock's walk over them
//! - [`bracket`] — seat assignment and the derived channel identifiers
//! - [`controller`] — lifecycle, observation, and advancement

pub mod bracket;
pub mod controller;
pub mod schedule;

pub use bracket::BracketRow;
pub use bracket::parse_channel;
pub use bracket::table_channel;
pub use controller::Controller;
pub use controller::Entrant;
pub use controller::Export;
pub use controller::RoundResult;
pub use controller::Summary;
pub use controller::Tournament;
pub use controller::TournamentState;
pub use schedule::Level;
pub use schedule::Schedule;
