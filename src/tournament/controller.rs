use super::bracket;
use super::bracket::BracketRow;
use super::schedule::Schedule;
use crate::Chips;
use crate::gameplay::Mode;
use crate::gameplay::Role;
use crate::gameplay::TableError;
use crate::gameroom::Command;
use crate::gameroom::CommandKind;
use crate::gameroom::Directive;
use crate::gameroom::Event;
use crate::gameroom::Floor;
use crate::gameroom::Identity;
use crate::gameroom::LevelSpec;
use crate::gameroom::Outbound;
use crate::gameroom::TableConfig;
use crate::gameroom::channel::normalize;
use crate::ledger::Purse;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use tokio::sync::Mutex;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::unbounded_channel;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TournamentState {
    Pending,
    Active,
    Complete,
}

impl std::fmt::Display for TournamentState {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Active => write!(f, "active"),
            Self::Complete => write!(f, "complete"),
        }
    }
}

impl TryFrom<&str> for TournamentState {
    type Error = TableError;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            "complete" => Ok(Self::Complete),
            _ => Err(TableError::InvalidPayload("unknown tournament state")),
        }
    }
}

/// One registered player. `rank` is set exactly once, at elimination
/// or completion; alive players have none.
#[derive(Debug, Clone)]
pub struct Entrant {
    pub login: String,
    pub seat: usize,
    pub chips: Chips,
    pub rank: Option<usize>,
}

/// One player's outcome for one round, persisted for audit.
#[derive(Debug, Clone)]
pub struct RoundResult {
    pub round: usize,
    pub login: String,
    pub chips_end: Chips,
    pub rank: usize,
    pub advanced: bool,
}

/// Tournament record. Channels are referenced purely by the derived
/// `t-<id>-r<round>-table-<n>` identifiers; nothing here owns a room.
#[derive(Debug)]
pub struct Tournament {
    pub id: u64,
    pub game: Mode,
    pub state: TournamentState,
    pub starting: Chips,
    pub table_size: usize,
    /// per-round advance counts; 0 designates the final round
    pub cutoffs: Vec<usize>,
    pub schedule: Schedule,
    pub level: usize,
    /// current round, 1-based; 0 before the first bracket
    pub round: usize,
    pub players: Vec<Entrant>,
    pub bracket: Vec<BracketRow>,
    pub results: Vec<RoundResult>,
    settled: HashSet<usize>,
}

impl Tournament {
    fn alive(&self) -> Vec<String> {
        self.players
            .iter()
            .filter(|p| p.rank.is_none())
            .map(|p| p.login.clone())
            .collect()
    }
    fn tables_in_round(&self) -> usize {
        self.bracket
            .iter()
            .filter(|r| r.round == self.round)
            .map(|r| r.table)
            .max()
            .unwrap_or(0)
    }
    fn roster(&self, round: usize, table: usize) -> Vec<String> {
        let mut rows = self
            .bracket
            .iter()
            .filter(|r| r.round == round && r.table == table)
            .collect::<Vec<_>>();
        rows.sort_by_key(|r| r.seat);
        rows.iter().map(|r| r.login.clone()).collect()
    }
    /// Current forced bets; the last level holds once the clock runs
    /// off the end of the schedule.
    fn blinds(&self) -> (Chips, Chips) {
        let index = self.level.min(self.schedule.len().saturating_sub(1));
        match self.schedule.level(index) {
            Some(level) => (level.small, level.big),
            None => (crate::MIN_BET, crate::MIN_BET * 2),
        }
    }
    /// Later rounds collapse onto fewer tables: once the whole field
    /// fits under the game's seat cap, play one table.
    fn chunk_size(&self, alive: usize) -> usize {
        if alive <= self.game.cap() {
            alive.max(2)
        } else {
            self.table_size
        }
    }
}

/// Owned persistence image of one tournament: exactly the rows that
/// must survive a restart.
#[derive(Debug, Clone)]
pub struct Export {
    pub id: u64,
    pub game: Mode,
    pub state: TournamentState,
    pub starting: Chips,
    pub table_size: usize,
    pub cutoffs: Vec<usize>,
    pub levels: Vec<super::schedule::Level>,
    pub level: usize,
    pub round: usize,
    pub players: Vec<Entrant>,
    pub bracket: Vec<BracketRow>,
    pub results: Vec<RoundResult>,
}

/// Serializable snapshot for wire replies and the admin surface.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub id: u64,
    pub state: TournamentState,
    pub round: usize,
    pub level: usize,
    pub players: Vec<(String, Chips, Option<usize>)>,
}

enum Verdict {
    Complete,
    NextRound,
}

/// Composes round engines into multi-table tournaments: bracket
/// generation, table binding, the blind clock, auto-starts on ready,
/// result tallying, and advancement. Observes its tables the same way
/// any spectator does, through the event stream, and touches them
/// only via router commands.
pub struct Controller {
    floor: Arc<Floor>,
    tournaments: Mutex<HashMap<u64, Tournament>>,
    clocks: Mutex<HashMap<u64, JoinHandle<()>>>,
    subscribed: Mutex<HashSet<String>>,
    observer: UnboundedSender<Outbound>,
    next: AtomicU64,
}

impl Controller {
    pub fn spawn(floor: Arc<Floor>) -> Arc<Self> {
        let (tx, rx) = unbounded_channel();
        let controller = Arc::new(Self {
            floor,
            tournaments: Mutex::new(HashMap::new()),
            clocks: Mutex::new(HashMap::new()),
            subscribed: Mutex::new(HashSet::new()),
            observer: tx,
            next: AtomicU64::new(1),
        });
        tokio::spawn(Self::observe(controller.clone(), rx));
        controller
    }

    fn actor() -> Identity {
        Identity::new("tournament-controller", Role::Admin)
    }

    pub async fn create(
        &self,
        game: Mode,
        starting: Chips,
        cutoffs: Vec<usize>,
        levels: Vec<LevelSpec>,
        table_size: usize,
    ) -> Result<u64, TableError> {
        if starting <= 0 {
            return Err(TableError::InvalidPayload("starting chips"));
        }
        if table_size < 2 || table_size > game.cap() {
            return Err(TableError::InvalidPayload("table size"));
        }
        if levels.is_empty() || cutoffs.is_empty() {
            return Err(TableError::InvalidPayload("schedule"));
        }
        let id = self.next.fetch_add(1, Ordering::Relaxed);
        let tournament = Tournament {
            id,
            game,
            state: TournamentState::Pending,
            starting,
            table_size,
            cutoffs,
            schedule: Schedule::from(levels),
            level: 0,
            round: 0,
            players: Vec::new(),
            bracket: Vec::new(),
            results: Vec::new(),
            settled: HashSet::new(),
        };
        self.tournaments.lock().await.insert(id, tournament);
        log::info!("[tourney {}] created ({})", id, game);
        Ok(id)
    }

    /// Seats are 1-indexed in registration order; duplicates rejected.
    pub async fn add_player(&self, id: u64, login: &str) -> Result<usize, TableError> {
        let login = normalize(login).ok_or(TableError::InvalidPayload("bad login"))?;
        let mut tournaments = self.tournaments.lock().await;
        let tournament = tournaments.get_mut(&id).ok_or(TableError::TournamentMisbound)?;
        if tournament.state != TournamentState::Pending {
            return Err(TableError::OutOfPhase);
        }
        if tournament.players.iter().any(|p| p.login == login) {
            return Err(TableError::InvalidAction("duplicate login"));
        }
        let seat = tournament.players.len() + 1;
        let chips = tournament.starting;
        tournament.players.push(Entrant {
            login,
            seat,
            chips,
            rank: None,
        });
        Ok(seat)
    }

    /// Shuffle-and-chunk the alive roster into tables, persist the
    /// rows, then create, subscribe to, and bind each table channel.
    /// Returns the channel identifiers so callers may join them.
    pub async fn generate_bracket(&self, id: u64) -> Result<Vec<String>, TableError> {
        let (round, tables) = {
            let mut tournaments = self.tournaments.lock().await;
            let tournament = tournaments.get_mut(&id).ok_or(TableError::TournamentMisbound)?;
            let alive = tournament.alive();
            if alive.len() < 2 {
                return Err(TableError::InvalidAction("not enough players"));
            }
            tournament.round += 1;
            tournament.settled.clear();
            let size = tournament.chunk_size(alive.len());
            let ref mut rng = StdRng::from_os_rng();
            let rows = bracket::assign(alive, size, tournament.round, rng);
            tournament.bracket.extend(rows);
            (tournament.round, tournament.tables_in_round())
        };
        let mut channels = Vec::new();
        for table in 1..=tables {
            channels.push(self.bind_table(id, round, table).await?);
        }
        log::info!("[tourney {}] round {} bracket: {} tables", id, round, channels.len());
        Ok(channels)
    }

    /// Creates, subscribes to, and binds one bracket table's channel.
    /// Also the recovery path when an operator needs to re-bind a
    /// table whose channel went away.
    pub async fn bind_table(&self, id: u64, round: usize, table: usize) -> Result<String, TableError> {
        let (game, roster) = {
            let tournaments = self.tournaments.lock().await;
            let tournament = tournaments.get(&id).ok_or(TableError::TournamentMisbound)?;
            if round != tournament.round {
                return Err(TableError::TournamentMisbound);
            }
            let roster = tournament.roster(round, table);
            if roster.is_empty() {
                return Err(TableError::TournamentMisbound);
            }
            (tournament.game, roster)
        };
        let name = bracket::table_channel(id, round, table);
        self.floor.ensure(&name, game, TableConfig::default()).await?;
        if self.subscribed.lock().await.insert(name.clone()) {
            self.floor
                .subscribe(&name, game, Some(Self::actor().login), self.observer.clone())
                .await?;
        }
        self.floor
            .dispatch(Command {
                channel: name.clone(),
                actor: Self::actor(),
                kind: CommandKind::Admin(Directive::BindTable {
                    tournament: id,
                    round,
                    table,
                    roster,
                }),
                origin: None,
            })
            .await?;
        Ok(name)
    }

    /// pending -> active: stacks seeded, blind clock armed.
    pub async fn start(self: &Arc<Self>, id: u64) -> Result<(), TableError> {
        let players = {
            let mut tournaments = self.tournaments.lock().await;
            let tournament = tournaments.get_mut(&id).ok_or(TableError::TournamentMisbound)?;
            if tournament.state != TournamentState::Pending {
                return Err(TableError::OutOfPhase);
            }
            if tournament.round == 0 {
                return Err(TableError::InvalidAction("no bracket"));
            }
            tournament.state = TournamentState::Active;
            tournament
                .players
                .iter()
                .map(|p| (p.login.clone(), tournament.starting))
                .collect::<Vec<_>>()
        };
        let ledger = self.floor.services().ledger.clone();
        for (login, starting) in players {
            ledger.seed_stack(id, &login, starting);
        }
        self.announce_level(id).await;
        let clock = tokio::spawn(Self::clock(self.clone(), id));
        self.clocks.lock().await.insert(id, clock);
        log::info!("[tourney {}] started", id);
        Ok(())
    }

    /// The blind clock: sleep a level's duration, advance, announce,
    /// halt when the schedule is exhausted or the tournament ends.
    async fn clock(self: Arc<Self>, id: u64) {
        loop {
            let wait = {
                let tournaments = self.tournaments.lock().await;
                match tournaments.get(&id) {
                    Some(t) if t.state == TournamentState::Active => {
                        t.schedule.level(t.level).map(|l| l.seconds)
                    }
                    _ => None,
                }
            };
            let Some(seconds) = wait else { break };
            tokio::time::sleep(std::time::Duration::from_secs(seconds)).await;
            let advanced = {
                let mut tournaments = self.tournaments.lock().await;
                match tournaments.get_mut(&id) {
                    Some(t) if t.state == TournamentState::Active => {
                        t.level += 1;
                        t.schedule.level(t.level).is_some()
                    }
                    _ => false,
                }
            };
            if advanced {
                self.announce_level(id).await;
            } else {
                log::info!("[tourney {}] blind schedule exhausted", id);
                break;
            }
        }
    }

    async fn announce_level(&self, id: u64) {
        let (level, small, big, channels) = {
            let tournaments = self.tournaments.lock().await;
            let Some(t) = tournaments.get(&id) else { return };
            let (small, big) = t.blinds();
            let channels = (1..=t.tables_in_round())
                .map(|n| bracket::table_channel(id, t.round, n))
                .collect::<Vec<_>>();
            (t.level, small, big, channels)
        };
        for channel in channels {
            let _ = self
                .floor
                .dispatch(Command {
                    channel,
                    actor: Self::actor(),
                    kind: CommandKind::Admin(Directive::Level {
                        tournament: id,
                        level,
                        small,
                        big,
                    }),
                    origin: None,
                })
                .await;
        }
    }

    /// The controller's event loop: it learns about its tables the
    /// same way overlays do.
    async fn observe(self: Arc<Self>, mut rx: UnboundedReceiver<Outbound>) {
        while let Some(outbound) = rx.recv().await {
            match &outbound.event {
                Event::ReadyStatus { all_ready: true, .. } => {
                    self.on_ready(&outbound.channel).await;
                }
                Event::Settled { .. } => {
                    self.on_settled(&outbound.channel).await;
                }
                _ => {}
            }
        }
    }

    /// The whole roster readied up: auto-start the table with the
    /// current level's forced bets.
    async fn on_ready(&self, channel: &str) {
        let Some((id, round, _)) = bracket::parse_channel(channel) else {
            return;
        };
        let blinds = {
            let tournaments = self.tournaments.lock().await;
            tournaments
                .get(&id)
                .filter(|t| t.state == TournamentState::Active && t.round == round)
                .map(|t| t.blinds())
        };
        let Some((small, big)) = blinds else { return };
        log::debug!("[tourney {}] {} ready, auto-starting {}/{}", id, channel, small, big);
        let _ = self
            .floor
            .dispatch(Command {
                channel: channel.to_string(),
                actor: Self::actor(),
                kind: CommandKind::Admin(Directive::AutoStart { small, big }),
                origin: None,
            })
            .await
            .inspect_err(|e| log::warn!("[tourney {}] auto-start failed: {}", id, e));
    }

    /// A bound table settled: pull ending stacks off the ledger by
    /// identifier and advance once every table of the round reported.
    async fn on_settled(&self, channel: &str) {
        let Some((id, round, table)) = bracket::parse_channel(channel) else {
            return;
        };
        let ledger = self.floor.services().ledger.clone();
        let done = {
            let mut tournaments = self.tournaments.lock().await;
            let Some(tournament) = tournaments.get_mut(&id) else {
                return;
            };
            if tournament.state != TournamentState::Active || round != tournament.round {
                return;
            }
            tournament.settled.insert(table);
            for login in tournament.roster(round, table) {
                let chips = ledger.balance(Purse::Stack(id), &login);
                if let Some(player) = tournament.players.iter_mut().find(|p| p.login == login) {
                    player.chips = chips;
                }
            }
            tournament.settled.len() >= tournament.tables_in_round()
        };
        if done {
            log::info!("[tourney {}] round {} complete", id, round);
            if let Err(e) = self.advance_round(id).await {
                log::warn!("[tourney {}] advance failed: {}", id, e);
            }
        }
    }

    /// Ranks the round: cutoff zero finishes the tournament, anything
    /// else advances the top k (ties at the cutoff chip count included
    /// up to the next round's capacity, excess eliminated by seat) and
    /// rebrackets.
    pub async fn advance_round(&self, id: u64) -> Result<Vec<String>, TableError> {
        let verdict = {
            let mut tournaments = self.tournaments.lock().await;
            let tournament = tournaments.get_mut(&id).ok_or(TableError::TournamentMisbound)?;
            if tournament.state != TournamentState::Active || tournament.round == 0 {
                return Err(TableError::OutOfPhase);
            }
            let cutoff = tournament
                .cutoffs
                .get(tournament.round - 1)
                .copied()
                .unwrap_or(0);
            let mut standing = tournament
                .players
                .iter()
                .filter(|p| p.rank.is_none())
                .map(|p| (p.login.clone(), p.chips, p.seat))
                .collect::<Vec<_>>();
            standing.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
            if cutoff == 0 || standing.len() <= 1 {
                for (i, (login, chips, _)) in standing.iter().enumerate() {
                    tournament.results.push(RoundResult {
                        round: tournament.round,
                        login: login.clone(),
                        chips_end: *chips,
                        rank: i + 1,
                        advanced: false,
                    });
                    if let Some(player) = tournament.players.iter_mut().find(|p| &p.login == login) {
                        player.rank = Some(i + 1);
                    }
                }
                tournament.state = TournamentState::Complete;
                if let Some((champion, chips, _)) = standing.first() {
                    log::info!("[tourney {}] complete, {} wins with {}", id, champion, chips);
                }
                Verdict::Complete
            } else {
                let cutoff = cutoff.min(standing.len());
                let capacity = if cutoff <= tournament.game.cap() {
                    tournament.game.cap()
                } else {
                    tournament.table_size * cutoff.div_ceil(tournament.table_size)
                };
                let kth = standing[cutoff - 1].1;
                let mut split = cutoff;
                while split < standing.len() && split < capacity && standing[split].1 == kth {
                    split += 1;
                }
                for (i, (login, chips, _)) in standing.iter().enumerate() {
                    let advanced = i < split;
                    tournament.results.push(RoundResult {
                        round: tournament.round,
                        login: login.clone(),
                        chips_end: *chips,
                        rank: i + 1,
                        advanced,
                    });
                    if !advanced {
                        if let Some(player) =
                            tournament.players.iter_mut().find(|p| &p.login == login)
                        {
                            player.rank = Some(i + 1);
                        }
                    }
                }
                Verdict::NextRound
            }
        };
        match verdict {
            Verdict::Complete => {
                if let Some(clock) = self.clocks.lock().await.remove(&id) {
                    clock.abort();
                }
                self.floor.services().ledger.sweep_stacks(id);
                Ok(Vec::new())
            }
            Verdict::NextRound => self.generate_bracket(id).await,
        }
    }

    /// Owned copy of everything §persistence must round-trip.
    pub async fn export(&self) -> Vec<Export> {
        let tournaments = self.tournaments.lock().await;
        let mut exports = tournaments
            .values()
            .map(|t| Export {
                id: t.id,
                game: t.game,
                state: t.state,
                starting: t.starting,
                table_size: t.table_size,
                cutoffs: t.cutoffs.clone(),
                levels: t.schedule.levels().to_vec(),
                level: t.level,
                round: t.round,
                players: t.players.clone(),
                bracket: t.bracket.clone(),
                results: t.results.clone(),
            })
            .collect::<Vec<_>>();
        exports.sort_by_key(|e| e.id);
        exports
    }

    /// Restores persisted tournaments at startup. Active ones resume
    /// their blind clock and table observation; in-round transient
    /// state is not restored, tables simply ready up again.
    pub async fn import(self: &Arc<Self>, exports: Vec<Export>) {
        for export in exports {
            let id = export.id;
            let active = export.state == TournamentState::Active;
            let round = export.round;
            let game = export.game;
            let tables = {
                let mut tournaments = self.tournaments.lock().await;
                let tournament = Tournament {
                    id,
                    game,
                    state: export.state,
                    starting: export.starting,
                    table_size: export.table_size,
                    cutoffs: export.cutoffs,
                    schedule: Schedule::new(export.levels),
                    level: export.level,
                    round,
                    players: export.players,
                    bracket: export.bracket,
                    results: export.results,
                    settled: HashSet::new(),
                };
                let tables = tournament.tables_in_round();
                tournaments.insert(id, tournament);
                tables
            };
            self.next.fetch_max(id + 1, Ordering::Relaxed);
            if active {
                for table in 1..=tables {
                    let name = bracket::table_channel(id, round, table);
                    if self.floor.ensure(&name, game, TableConfig::default()).await.is_ok()
                        && self.subscribed.lock().await.insert(name.clone())
                    {
                        let _ = self
                            .floor
                            .subscribe(&name, game, Some(Self::actor().login), self.observer.clone())
                            .await;
                    }
                }
                let clock = tokio::spawn(Self::clock(self.clone(), id));
                self.clocks.lock().await.insert(id, clock);
                log::info!("[tourney {}] resumed at round {}", id, round);
            }
        }
    }

    pub async fn summary(&self, id: u64) -> Option<Summary> {
        let tournaments = self.tournaments.lock().await;
        tournaments.get(&id).map(|t| Summary {
            id: t.id,
            state: t.state,
            round: t.round,
            level: t.level,
            players: t
                .players
                .iter()
                .map(|p| (p.login.clone(), p.chips, p.rank))
                .collect(),
        })
    }

    /// Read access for persistence and the admin surface.
    pub async fn with<T>(&self, id: u64, read: impl FnOnce(&Tournament) -> T) -> Option<T> {
        let tournaments = self.tournaments.lock().await;
        tournaments.get(&id).map(read)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gameplay::Services;

    fn specs() -> Vec<LevelSpec> {
        vec![
            LevelSpec { small: 5, big: 10, seconds: 300 },
            LevelSpec { small: 10, big: 20, seconds: 300 },
        ]
    }

    async fn twelve(controller: &Arc<Controller>) -> u64 {
        let id = controller
            .create(Mode::Poker, 1_000, vec![6, 0], specs(), 4)
            .await
            .unwrap();
        for i in 0..12 {
            controller.add_player(id, &format!("p{}", i)).await.unwrap();
        }
        id
    }

    #[tokio::test]
    async fn registration_rules() {
        let floor = Floor::new(Services::new());
        let controller = Controller::spawn(floor);
        let id = controller
            .create(Mode::Poker, 1_000, vec![0], specs(), 4)
            .await
            .unwrap();
        assert_eq!(controller.add_player(id, "alice").await.unwrap(), 1);
        assert_eq!(controller.add_player(id, "bob").await.unwrap(), 2);
        assert_eq!(
            controller.add_player(id, "alice").await.unwrap_err(),
            TableError::InvalidAction("duplicate login")
        );
        assert_eq!(
            controller.add_player(99, "carol").await.unwrap_err(),
            TableError::TournamentMisbound
        );
    }

    #[tokio::test]
    async fn bracket_binds_three_tables() {
        let floor = Floor::new(Services::new());
        let controller = Controller::spawn(floor);
        let id = twelve(&controller).await;
        let channels = controller.generate_bracket(id).await.unwrap();
        assert_eq!(channels.len(), 3);
        assert_eq!(channels[0], format!("t-{}-r1-table-1", id));
        let rows = controller
            .with(id, |t| t.bracket.len())
            .await
            .unwrap();
        assert_eq!(rows, 12);
    }

    #[tokio::test]
    async fn advancement_and_elimination() {
        let floor = Floor::new(Services::new());
        let controller = Controller::spawn(floor.clone());
        let id = twelve(&controller).await;
        controller.generate_bracket(id).await.unwrap();
        controller.start(id).await.unwrap();
        // round ends with chip counts 120, 240, ... 1440
        {
            let mut tournaments = controller.tournaments.lock().await;
            let tournament = tournaments.get_mut(&id).unwrap();
            for (i, player) in tournament.players.iter_mut().enumerate() {
                player.chips = 120 * (i as i64 + 1);
            }
        }
        let next = controller.advance_round(id).await.unwrap();
        // six advance onto a single table under the poker cap
        assert_eq!(next.len(), 1);
        assert_eq!(next[0], format!("t-{}-r2-table-1", id));
        let (eliminated, alive) = controller
            .with(id, |t| {
                let eliminated = t
                    .players
                    .iter()
                    .filter_map(|p| p.rank.map(|r| (p.login.clone(), r)))
                    .collect::<Vec<_>>();
                (eliminated, t.players.iter().filter(|p| p.rank.is_none()).count())
            })
            .await
            .unwrap();
        assert_eq!(alive, 6);
        assert_eq!(eliminated.len(), 6);
        // the best-stacked non-advancer holds rank 7, the shortest 12
        for (login, rank) in &eliminated {
            assert!((7..=12).contains(rank), "{} ranked {}", login, rank);
        }
        let p5 = eliminated.iter().find(|(l, _)| l == "p5").unwrap();
        assert_eq!(p5.1, 7);
        let p0 = eliminated.iter().find(|(l, _)| l == "p0").unwrap();
        assert_eq!(p0.1, 12);
    }

    #[tokio::test]
    async fn final_round_completes_and_ranks() {
        let floor = Floor::new(Services::new());
        let controller = Controller::spawn(floor.clone());
        let id = controller
            .create(Mode::Poker, 1_000, vec![0], specs(), 4)
            .await
            .unwrap();
        for login in ["alice", "bob", "carol"] {
            controller.add_player(id, login).await.unwrap();
        }
        controller.generate_bracket(id).await.unwrap();
        controller.start(id).await.unwrap();
        {
            let mut tournaments = controller.tournaments.lock().await;
            let tournament = tournaments.get_mut(&id).unwrap();
            for player in tournament.players.iter_mut() {
                player.chips = match player.login.as_str() {
                    "bob" => 2_000,
                    "alice" => 900,
                    _ => 100,
                };
            }
        }
        controller.advance_round(id).await.unwrap();
        let summary = controller.summary(id).await.unwrap();
        assert_eq!(summary.state, TournamentState::Complete);
        let rank_of = |login: &str| {
            summary
                .players
                .iter()
                .find(|(l, _, _)| l == login)
                .and_then(|(_, _, r)| *r)
                .unwrap()
        };
        assert_eq!(rank_of("bob"), 1);
        assert_eq!(rank_of("alice"), 2);
        assert_eq!(rank_of("carol"), 3);
        // stacks are swept once the tournament ends
        let ledger = floor.services().ledger.clone();
        assert_eq!(ledger.balance(Purse::Stack(id), "bob"), 0);
    }

    #[tokio::test]
    async fn ties_at_cutoff_included_under_cap() {
        let floor = Floor::new(Services::new());
        let controller = Controller::spawn(floor);
        let id = controller
            .create(Mode::Poker, 1_000, vec![2, 0], specs(), 4)
            .await
            .unwrap();
        for login in ["a", "b", "c", "d"] {
            controller.add_player(id, login).await.unwrap();
        }
        controller.generate_bracket(id).await.unwrap();
        controller.start(id).await.unwrap();
        {
            let mut tournaments = controller.tournaments.lock().await;
            let tournament = tournaments.get_mut(&id).unwrap();
            for player in tournament.players.iter_mut() {
                player.chips = match player.login.as_str() {
                    "a" => 2_000,
                    "d" => 100,
                    _ => 1_000, // b and c tie at the cutoff count
                };
            }
        }
        controller.advance_round(id).await.unwrap();
        let alive = controller
            .with(id, |t| t.players.iter().filter(|p| p.rank.is_none()).count())
            .await
            .unwrap();
        // both tied players advance: cap is far above the cutoff
        assert_eq!(alive, 3);
    }
}
