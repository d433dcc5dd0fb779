use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// One seat assignment row: `(round, table, seat) -> login`. Seats are
/// 1-indexed; rows persist so a round can be replayed or audited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BracketRow {
    pub round: usize,
    pub table: usize,
    pub seat: usize,
    pub login: String,
}

/// The channel identifier a tournament table binds to. Identifiers are
/// the only reference between tournaments and channels, in both
/// directions.
pub fn table_channel(tournament: u64, round: usize, table: usize) -> String {
    format!("t-{}-r{}-table-{}", tournament, round, table)
}

/// Inverse of [`table_channel`].
pub fn parse_channel(name: &str) -> Option<(u64, usize, usize)> {
    let rest = name.strip_prefix("t-")?;
    let (tournament, rest) = rest.split_once("-r")?;
    let (round, table) = rest.split_once("-table-")?;
    Some((
        tournament.parse().ok()?,
        round.parse().ok()?,
        table.parse().ok()?,
    ))
}

/// Shuffles the alive roster and chunks it into tables of at most
/// `size`, assigning seats 1..n in shuffle order.
pub fn assign(mut alive: Vec<String>, size: usize, round: usize, rng: &mut StdRng) -> Vec<BracketRow> {
    assert!(size >= 2);
    alive.shuffle(rng);
    alive
        .chunks(size)
        .enumerate()
        .flat_map(|(t, logins)| {
            logins.iter().enumerate().map(move |(s, login)| BracketRow {
                round,
                table: t + 1,
                seat: s + 1,
                login: login.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn roster(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("p{}", i)).collect()
    }

    #[test]
    fn channel_round_trip() {
        let name = table_channel(7, 2, 3);
        assert_eq!(name, "t-7-r2-table-3");
        assert_eq!(parse_channel(&name), Some((7, 2, 3)));
        assert!(parse_channel("lobby-abc123").is_none());
        assert!(parse_channel("t-x-r1-table-1").is_none());
    }

    #[test]
    fn chunks_into_tables() {
        let ref mut rng = StdRng::seed_from_u64(5);
        let rows = assign(roster(12), 4, 1, rng);
        assert_eq!(rows.len(), 12);
        for table in 1..=3 {
            let seats: Vec<usize> = rows
                .iter()
                .filter(|r| r.table == table)
                .map(|r| r.seat)
                .collect();
            assert_eq!(seats, vec![1, 2, 3, 4]);
        }
        // every login appears exactly once
        let mut logins: Vec<&str> = rows.iter().map(|r| r.login.as_str()).collect();
        logins.sort();
        logins.dedup();
        assert_eq!(logins.len(), 12);
    }

    #[test]
    fn remainder_table_is_short() {
        let ref mut rng = StdRng::seed_from_u64(6);
        let rows = assign(roster(10), 4, 1, rng);
        let last: Vec<_> = rows.iter().filter(|r| r.table == 3).collect();
        assert_eq!(last.len(), 2);
    }
}
