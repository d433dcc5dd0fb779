use crate::Chips;
use crate::gameplay::Role;
use crate::gameplay::TableCmd;
use serde::Deserialize;

/// Who issued a command, as resolved by the authorization
/// collaborator. The core never sees credentials.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Identity {
    pub login: String,
    #[serde(default)]
    pub role: Role,
}

impl Identity {
    pub fn new(login: &str, role: Role) -> Self {
        Self {
            login: login.to_string(),
            role,
        }
    }
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// Control-plane operations a channel accepts besides table commands:
/// admin round control and the tournament controller's directives.
#[derive(Debug, Clone)]
pub enum Directive {
    OpenBetting,
    StartNow,
    ForceAdvance,
    /// Rebind this channel to a tournament table, resetting any
    /// leftover round state and seating the roster.
    BindTable {
        tournament: u64,
        round: usize,
        table: usize,
        roster: Vec<String>,
    },
    /// All seats ready: post blinds (poker) or antes (blackjack) and
    /// start immediately.
    AutoStart { small: Chips, big: Chips },
    /// The blind clock advanced a level.
    Level {
        tournament: u64,
        level: usize,
        small: Chips,
        big: Chips,
    },
}

impl Directive {
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::OpenBetting => "open_betting",
            Self::StartNow => "start_now",
            Self::ForceAdvance => "force_advance",
            Self::BindTable { .. } => "bind_tournament_table",
            Self::AutoStart { .. } => "auto_start",
            Self::Level { .. } => "tournament_level",
        }
    }
}

/// The ingress envelope: channel, actor, and what to do. `origin` is
/// the subscriber that sent it, so failures can be answered privately.
#[derive(Debug, Clone)]
pub struct Command {
    pub channel: String,
    pub actor: Identity,
    pub kind: CommandKind,
    pub origin: Option<u64>,
}

#[derive(Debug, Clone)]
pub enum CommandKind {
    Table(TableCmd),
    Admin(Directive),
}

impl CommandKind {
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Table(cmd) => cmd.kind(),
            Self::Admin(directive) => directive.kind(),
        }
    }
    /// Admin-gated kinds; everything else any seated player may send.
    pub const fn requires_admin(&self) -> bool {
        matches!(self, Self::Admin(_))
    }
}

/// A blind level as clients and persistence spell it.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LevelSpec {
    pub small: Chips,
    pub big: Chips,
    pub seconds: u64,
}

/// What clients send over the websocket. Tournament operations are
/// routed to the controller; the rest become channel commands.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    PlaceBet { amount: Chips },
    Hit,
    Stand,
    Double,
    Split,
    Surrender,
    Insurance { amount: Chips },
    Check,
    Call,
    Raise { to: Chips },
    Fold,
    Ready,
    OpenBetting,
    StartNow,
    ForceAdvance,
    CreateTournament {
        game: String,
        starting: Chips,
        cutoffs: Vec<usize>,
        levels: Vec<LevelSpec>,
        table_size: usize,
    },
    AddTournamentPlayer { tournament: u64, login: String },
    GenerateBracket { tournament: u64 },
    StartTournament { tournament: u64 },
    AdvanceRound { tournament: u64 },
    BindTournamentTable { tournament: u64, round: usize, table: usize },
}

impl ClientMessage {
    /// Channel-scoped messages become command kinds; tournament
    /// operations return None and take the controller path instead.
    pub fn into_command(self) -> Option<CommandKind> {
        match self {
            Self::PlaceBet { amount } => Some(CommandKind::Table(TableCmd::PlaceBet(amount))),
            Self::Hit => Some(CommandKind::Table(TableCmd::Hit)),
            Self::Stand => Some(CommandKind::Table(TableCmd::Stand)),
            Self::Double => Some(CommandKind::Table(TableCmd::Double)),
            Self::Split => Some(CommandKind::Table(TableCmd::Split)),
            Self::Surrender => Some(CommandKind::Table(TableCmd::Surrender)),
            Self::Insurance { amount } => Some(CommandKind::Table(TableCmd::Insurance(amount))),
            Self::Check => Some(CommandKind::Table(TableCmd::Check)),
            Self::Call => Some(CommandKind::Table(TableCmd::Call)),
            Self::Raise { to } => Some(CommandKind::Table(TableCmd::Raise(to))),
            Self::Fold => Some(CommandKind::Table(TableCmd::Fold)),
            Self::Ready => Some(CommandKind::Table(TableCmd::Ready)),
            Self::OpenBetting => Some(CommandKind::Admin(Directive::OpenBetting)),
            Self::StartNow => Some(CommandKind::Admin(Directive::StartNow)),
            Self::ForceAdvance => Some(CommandKind::Admin(Directive::ForceAdvance)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_table_commands() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"place_bet","amount":100}"#).unwrap();
        match msg.into_command() {
            Some(CommandKind::Table(TableCmd::PlaceBet(100))) => {}
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn decodes_admin_commands() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"force_advance"}"#).unwrap();
        let kind = msg.into_command().unwrap();
        assert!(kind.requires_admin());
        assert_eq!(kind.kind(), "force_advance");
    }

    #[test]
    fn tournament_ops_route_elsewhere() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"generate_bracket","tournament":3}"#).unwrap();
        assert!(msg.into_command().is_none());
    }

    #[test]
    fn rejects_malformed_payloads() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"place_bet"}"#).is_err());
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"warp"}"#).is_err());
    }
}
