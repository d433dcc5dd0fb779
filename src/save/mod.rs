//! PostgreSQL round-trip for the state that must survive a restart:
//! wallet balances, tournament rows (players, bracket, results, blind
//! config), and the bot-channel set. Channel subscriptions and
//! in-round state are ephemeral on purpose.

use crate::gameplay::Mode;
use crate::gameroom::Floor;
use crate::ledger::Ledger;
use crate::tournament::BracketRow;
use crate::tournament::Controller;
use crate::tournament::Entrant;
use crate::tournament::Export;
use crate::tournament::Level;
use crate::tournament::RoundResult;
use crate::tournament::TournamentState;
use std::sync::Arc;
use tokio_postgres::Client;

const WALLETS: &str = "rb_wallets";
const TOURNAMENTS: &str = "rb_tournaments";
const PLAYERS: &str = "rb_tournament_players";
const BRACKET: &str = "rb_bracket";
const RESULTS: &str = "rb_round_results";
const BLINDS: &str = "rb_blind_config";
const BOTS: &str = "rb_bot_channels";

/// Table metadata: name plus `CREATE TABLE IF NOT EXISTS` DDL. No I/O
/// here, just compile-time SQL.
pub trait Schema {
    fn name() -> &'static str;
    fn creates() -> &'static str;
}

macro_rules! schema {
    ($marker:ident, $table:ident, $ddl:expr) => {
        pub struct $marker;
        impl Schema for $marker {
            fn name() -> &'static str {
                $table
            }
            fn creates() -> &'static str {
                const_format::concatcp!("CREATE TABLE IF NOT EXISTS ", $table, " ", $ddl)
            }
        }
    };
}

schema!(
    Wallets,
    WALLETS,
    "(
        login       TEXT PRIMARY KEY,
        chips       BIGINT NOT NULL
    );"
);
schema!(
    Tournaments,
    TOURNAMENTS,
    "(
        id          BIGINT PRIMARY KEY,
        game        TEXT NOT NULL,
        state       TEXT NOT NULL,
        starting    BIGINT NOT NULL,
        table_size  INT NOT NULL,
        cutoffs     TEXT NOT NULL,
        level       INT NOT NULL,
        round       INT NOT NULL
    );"
);
schema!(
    Players,
    PLAYERS,
    "(
        tournament  BIGINT NOT NULL,
        login       TEXT NOT NULL,
        seat        INT NOT NULL,
        chips       BIGINT NOT NULL,
        rank        INT,
        PRIMARY KEY (tournament, login)
    );"
);
schema!(
    Bracket,
    BRACKET,
    "(
        tournament  BIGINT NOT NULL,
        round       INT NOT NULL,
        table_no    INT NOT NULL,
        seat        INT NOT NULL,
        login       TEXT NOT NULL,
        PRIMARY KEY (tournament, round, table_no, seat)
    );"
);
schema!(
    Results,
    RESULTS,
    "(
        tournament  BIGINT NOT NULL,
        round       INT NOT NULL,
        login       TEXT NOT NULL,
        chips_end   BIGINT NOT NULL,
        rank        INT NOT NULL,
        advanced    BOOL NOT NULL,
        PRIMARY KEY (tournament, round, login)
    );"
);
schema!(
    Blinds,
    BLINDS,
    "(
        tournament  BIGINT NOT NULL,
        idx         INT NOT NULL,
        small       BIGINT NOT NULL,
        big         BIGINT NOT NULL,
        seconds     BIGINT NOT NULL,
        PRIMARY KEY (tournament, idx)
    );"
);
schema!(
    Bots,
    BOTS,
    "(
        channel     TEXT PRIMARY KEY
    );"
);

pub async fn migrate(client: &Client) -> anyhow::Result<()> {
    for ddl in [
        Wallets::creates(),
        Tournaments::creates(),
        Players::creates(),
        Bracket::creates(),
        Results::creates(),
        Blinds::creates(),
        Bots::creates(),
    ] {
        client.batch_execute(ddl).await?;
    }
    Ok(())
}

pub async fn flush_wallets(client: &Client, ledger: &Ledger) -> anyhow::Result<()> {
    for (login, chips) in ledger.snapshot() {
        client
            .execute(
                const_format::concatcp!(
                    "INSERT INTO ",
                    WALLETS,
                    " (login, chips) VALUES ($1, $2)
                     ON CONFLICT (login) DO UPDATE SET chips = EXCLUDED.chips"
                ),
                &[&login, &chips],
            )
            .await?;
    }
    Ok(())
}

pub async fn hydrate_wallets(client: &Client, ledger: &Ledger) -> anyhow::Result<()> {
    let rows = client
        .query(
            const_format::concatcp!("SELECT login, chips FROM ", WALLETS),
            &[],
        )
        .await?;
    ledger.restore(rows.iter().map(|r| (r.get(0), r.get(1))).collect());
    log::info!("[save] hydrated {} wallets", rows.len());
    Ok(())
}

pub async fn flush_bots(client: &Client, floor: &Floor) -> anyhow::Result<()> {
    for channel in floor.bot_channels() {
        client
            .execute(
                const_format::concatcp!(
                    "INSERT INTO ",
                    BOTS,
                    " (channel) VALUES ($1) ON CONFLICT DO NOTHING"
                ),
                &[&channel],
            )
            .await?;
    }
    Ok(())
}

pub async fn hydrate_bots(client: &Client, floor: &Floor) -> anyhow::Result<()> {
    let rows = client
        .query(const_format::concatcp!("SELECT channel FROM ", BOTS), &[])
        .await?;
    for row in &rows {
        floor.add_bot_channel(row.get(0));
    }
    Ok(())
}

/// Rewrites every persisted tournament row from the live controller.
pub async fn flush_tournaments(client: &Client, controller: &Arc<Controller>) -> anyhow::Result<()> {
    for export in controller.export().await {
        flush_tournament(client, &export).await?;
    }
    Ok(())
}

async fn flush_tournament(client: &Client, t: &Export) -> anyhow::Result<()> {
    let id = t.id as i64;
    let cutoffs = serde_json::to_string(&t.cutoffs)?;
    client
        .execute(
            const_format::concatcp!(
                "INSERT INTO ",
                TOURNAMENTS,
                " (id, game, state, starting, table_size, cutoffs, level, round)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                 ON CONFLICT (id) DO UPDATE SET
                    state = EXCLUDED.state,
                    level = EXCLUDED.level,
                    round = EXCLUDED.round"
            ),
            &[
                &id,
                &t.game.label(),
                &t.state.to_string(),
                &t.starting,
                &(t.table_size as i32),
                &cutoffs,
                &(t.level as i32),
                &(t.round as i32),
            ],
        )
        .await?;
    for table in [PLAYERS, BRACKET, RESULTS, BLINDS] {
        client
            .execute(
                format!("DELETE FROM {} WHERE tournament = $1", table).as_str(),
                &[&id],
            )
            .await?;
    }
    for p in &t.players {
        client
            .execute(
                const_format::concatcp!(
                    "INSERT INTO ",
                    PLAYERS,
                    " (tournament, login, seat, chips, rank) VALUES ($1, $2, $3, $4, $5)"
                ),
                &[&id, &p.login, &(p.seat as i32), &p.chips, &p.rank.map(|r| r as i32)],
            )
            .await?;
    }
    for b in &t.bracket {
        client
            .execute(
                const_format::concatcp!(
                    "INSERT INTO ",
                    BRACKET,
                    " (tournament, round, table_no, seat, login) VALUES ($1, $2, $3, $4, $5)"
                ),
                &[
                    &id,
                    &(b.round as i32),
                    &(b.table as i32),
                    &(b.seat as i32),
                    &b.login,
                ],
            )
            .await?;
    }
    for r in &t.results {
        client
            .execute(
                const_format::concatcp!(
                    "INSERT INTO ",
                    RESULTS,
                    " (tournament, round, login, chips_end, rank, advanced)
                     VALUES ($1, $2, $3, $4, $5, $6)"
                ),
                &[
                    &id,
                    &(r.round as i32),
                    &r.login,
                    &r.chips_end,
                    &(r.rank as i32),
                    &r.advanced,
                ],
            )
            .await?;
    }
    for (idx, level) in t.levels.iter().enumerate() {
        client
            .execute(
                const_format::concatcp!(
                    "INSERT INTO ",
                    BLINDS,
                    " (tournament, idx, small, big, seconds) VALUES ($1, $2, $3, $4, $5)"
                ),
                &[
                    &id,
                    &(idx as i32),
                    &level.small,
                    &level.big,
                    &(level.seconds as i64),
                ],
            )
            .await?;
    }
    Ok(())
}

/// Loads every persisted tournament back into controller exports.
pub async fn hydrate_tournaments(client: &Client) -> anyhow::Result<Vec<Export>> {
    let mut exports = Vec::new();
    let heads = client
        .query(
            const_format::concatcp!(
                "SELECT id, game, state, starting, table_size, cutoffs, level, round FROM ",
                TOURNAMENTS
            ),
            &[],
        )
        .await?;
    for head in &heads {
        let id: i64 = head.get(0);
        let game = Mode::try_from(head.get::<_, &str>(1)).map_err(|e| anyhow::anyhow!("{}", e))?;
        let state = TournamentState::try_from(head.get::<_, &str>(2))
            .map_err(|e| anyhow::anyhow!("{}", e))?;
        let cutoffs: Vec<usize> = serde_json::from_str(head.get::<_, &str>(5))?;
        let players = client
            .query(
                const_format::concatcp!(
                    "SELECT login, seat, chips, rank FROM ",
                    PLAYERS,
                    " WHERE tournament = $1 ORDER BY seat"
                ),
                &[&id],
            )
            .await?
            .iter()
            .map(|r| Entrant {
                login: r.get(0),
                seat: r.get::<_, i32>(1) as usize,
                chips: r.get(2),
                rank: r.get::<_, Option<i32>>(3).map(|n| n as usize),
            })
            .collect();
        let bracket = client
            .query(
                const_format::concatcp!(
                    "SELECT round, table_no, seat, login FROM ",
                    BRACKET,
                    " WHERE tournament = $1 ORDER BY round, table_no, seat"
                ),
                &[&id],
            )
            .await?
            .iter()
            .map(|r| BracketRow {
                round: r.get::<_, i32>(0) as usize,
                table: r.get::<_, i32>(1) as usize,
                seat: r.get::<_, i32>(2) as usize,
                login: r.get(3),
            })
            .collect();
        let results = client
            .query(
                const_format::concatcp!(
                    "SELECT round, login, chips_end, rank, advanced FROM ",
                    RESULTS,
                    " WHERE tournament = $1 ORDER BY round, rank"
                ),
                &[&id],
            )
            .await?
            .iter()
            .map(|r| RoundResult {
                round: r.get::<_, i32>(0) as usize,
                login: r.get(1),
                chips_end: r.get(2),
                rank: r.get::<_, i32>(3) as usize,
                advanced: r.get(4),
            })
            .collect();
        let levels = client
            .query(
                const_format::concatcp!(
                    "SELECT small, big, seconds FROM ",
                    BLINDS,
                    " WHERE tournament = $1 ORDER BY idx"
                ),
                &[&id],
            )
            .await?
            .iter()
            .map(|r| Level {
                small: r.get(0),
                big: r.get(1),
                seconds: r.get::<_, i64>(2) as u64,
            })
            .collect();
        exports.push(Export {
            id: id as u64,
            game,
            state,
            starting: head.get(3),
            table_size: head.get::<_, i32>(4) as usize,
            cutoffs,
            levels,
            level: head.get::<_, i32>(6) as usize,
            round: head.get::<_, i32>(7) as usize,
            players,
            bracket,
            results,
        });
    }
    log::info!("[save] hydrated {} tournaments", exports.len());
    Ok(exports)
}
