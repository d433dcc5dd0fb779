use serde::Deserialize;
use serde::Serialize;

/// The two games a channel can host. One mode per channel at a time;
/// the mode decides the seat cap and which engine handles commands.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Blackjack,
    Poker,
}

impl Mode {
    pub const fn cap(&self) -> usize {
        match self {
            Self::Blackjack => crate::BLACKJACK_SEATS,
            Self::Poker => crate::POKER_SEATS,
        }
    }
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Blackjack => "blackjack",
            Self::Poker => "poker",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl TryFrom<&str> for Mode {
    type Error = super::TableError;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "blackjack" | "bj" => Ok(Self::Blackjack),
            "poker" | "holdem" => Ok(Self::Poker),
            _ => Err(super::TableError::InvalidPayload("unknown game code")),
        }
    }
}
