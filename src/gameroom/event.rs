use crate::Chips;
use crate::gameplay::Mode;
use crate::gameplay::Street;
use serde::Serialize;
use std::collections::BTreeMap;

/// Events a channel broadcasts to its subscribers, in mutation order.
/// Wire form is internally tagged JSON, one event kind per line on the
/// socket, each wrapped in an [`Outbound`] carrying the channel.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// The betting window opened.
    BettingStarted {
        duration_ms: u64,
        ends_at: u64,
        mode: Mode,
    },
    /// Cards are out; the round is live.
    RoundStarted {
        mode: Mode,
        #[serde(skip_serializing_if = "Option::is_none")]
        dealer_up: Option<String>,
        players: Vec<PlayerPublic>,
        community: Vec<String>,
        pot: Chips,
        current_bet: Chips,
        #[serde(skip_serializing_if = "Option::is_none")]
        action_ends_at: Option<u64>,
    },
    /// Partial per-player delta; absent fields are unchanged.
    PlayerUpdate(PlayerDelta),
    /// Pot and street state after a poker action, emitted only once
    /// the pot and acted set are consistent.
    PokerBetting {
        pot: Chips,
        current_bet: Chips,
        street_bets: BTreeMap<String, Chips>,
        community: Vec<String>,
        phase: Street,
    },
    /// Dealer hand as currently revealed.
    DealerUpdate { hand: Vec<String> },
    /// Private hole cards, unicast to their owner only.
    HoleCards { login: String, cards: Vec<String> },
    /// Round settled; payouts are the chips credited per login.
    Settled {
        payouts: BTreeMap<String, Chips>,
        dealer: Vec<String>,
        community: Vec<String>,
    },
    /// Waiting queue or betting roster changed.
    QueueUpdate {
        waiting: Vec<String>,
        limits: Limits,
        active_bets: BTreeMap<String, Chips>,
    },
    /// Tournament table ready-check state.
    ReadyStatus {
        ready: Vec<String>,
        required: usize,
        all_ready: bool,
    },
    /// Blind level advanced on the tournament clock.
    TournamentLevel {
        id: u64,
        level: usize,
        small: Chips,
        big: Chips,
    },
    /// Invariant breach: everyone refunded, channel back to idle.
    RoundAborted { reason: String },
    /// Actor-directed terse failure reason, unicast only.
    Warning { login: String, reason: String },
}

/// Public roster entry in `RoundStarted`. Poker hole cards stay out of
/// it; blackjack hands are table-public. The avatar is enriched by the
/// cosmetics collaborator, never by the core.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct PlayerPublic {
    pub login: String,
    pub bet: Chips,
    pub cards: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Limits {
    pub min: Chips,
    pub max: Chips,
}

/// Sparse per-player update. Only populated fields serialize.
#[derive(Clone, Debug, Serialize, PartialEq, Default)]
pub struct PlayerDelta {
    pub login: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bet: Option<Chips>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<Chips>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hand: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folded: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_in: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acting: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub streak: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tilt: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub afk: Option<bool>,
}

impl PlayerDelta {
    pub fn of(login: &str) -> Self {
        Self {
            login: login.to_string(),
            ..Self::default()
        }
    }
}

impl Event {
    /// True for events that must reach only one login, not the room.
    pub fn unicast_to(&self) -> Option<&str> {
        match self {
            Self::HoleCards { login, .. } => Some(login),
            Self::Warning { login, .. } => Some(login),
            _ => None,
        }
    }
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BettingStarted { .. } => "betting_started",
            Self::RoundStarted { .. } => "round_started",
            Self::PlayerUpdate(_) => "player_update",
            Self::PokerBetting { .. } => "poker_betting",
            Self::DealerUpdate { .. } => "dealer_update",
            Self::HoleCards { .. } => "hole_cards",
            Self::Settled { .. } => "settled",
            Self::QueueUpdate { .. } => "queue_update",
            Self::ReadyStatus { .. } => "ready_status",
            Self::TournamentLevel { .. } => "tournament_level",
            Self::RoundAborted { .. } => "round_aborted",
            Self::Warning { .. } => "warning",
        }
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.kind())
    }
}

/// An event tagged with its originating channel, the demux key for
/// subscribers watching several channels at once.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Outbound {
    pub channel: String,
    #[serde(flatten)]
    pub event: Event,
}

impl Outbound {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("serialize outbound event")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_wire_form() {
        let outbound = Outbound {
            channel: "lobby-abc123".to_string(),
            event: Event::DealerUpdate {
                hand: vec!["Ks".to_string(), "7d".to_string()],
            },
        };
        let json = outbound.to_json();
        assert!(json.contains(r#""type":"dealer_update""#));
        assert!(json.contains(r#""channel":"lobby-abc123""#));
    }

    #[test]
    fn sparse_delta_omits_unset_fields() {
        let event = Event::PlayerUpdate(PlayerDelta {
            bet: Some(100),
            ..PlayerDelta::of("alice")
        });
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""bet":100"#));
        assert!(!json.contains("tilt"));
        assert!(!json.contains("folded"));
    }

    #[test]
    fn unicast_routing() {
        let hole = Event::HoleCards {
            login: "bob".to_string(),
            cards: vec![],
        };
        assert_eq!(hole.unicast_to(), Some("bob"));
        let dealer = Event::DealerUpdate { hand: vec![] };
        assert_eq!(dealer.unicast_to(), None);
    }
}
