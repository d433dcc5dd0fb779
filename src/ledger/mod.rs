pub mod purse;

pub use purse::Purse;

use crate::Chips;
use std::collections::HashMap;
use std::sync::Mutex;

/// Reserved login for the banked side of house games.
const HOUSE: &str = "house";

/// Shared chip ledger: one wallet per login plus a parallel map of
/// tournament stacks keyed (tournament, login). All mutating operations
/// take the single lock, so a debit-then-seat or credit-in-settlement
/// pair observed from outside is atomic per account.
///
/// The escrow contract: every bet is debited here before the bettor is
/// seated, lives in the channel pot until settlement, and is credited
/// back to winners in one pass. Per round, debits minus credits is zero.
#[derive(Debug, Default)]
pub struct Ledger {
    accounts: Mutex<Accounts>,
}

#[derive(Debug, Default)]
struct Accounts {
    wallets: HashMap<String, Chips>,
    stacks: HashMap<(u64, String), Chips>,
}

/// Debit-time failure; the bet is rejected and no seat changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsufficientFunds {
    pub login: String,
    pub short: Chips,
}

impl std::fmt::Display for InsufficientFunds {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{} is {} chips short", self.login, self.short)
    }
}

impl std::error::Error for InsufficientFunds {}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }
    /// Creates the wallet at the configured starting amount if absent.
    pub fn ensure(&self, login: &str) -> Chips {
        let mut accounts = self.accounts.lock().expect("ledger lock");
        *accounts
            .wallets
            .entry(login.to_string())
            .or_insert(crate::STARTING_CHIPS)
    }
    pub fn balance(&self, purse: Purse, login: &str) -> Chips {
        let accounts = self.accounts.lock().expect("ledger lock");
        match purse {
            Purse::Wallet => accounts.wallets.get(login).copied().unwrap_or(0),
            Purse::Stack(t) => accounts
                .stacks
                .get(&(t, login.to_string()))
                .copied()
                .unwrap_or(0),
        }
    }
    pub fn debit(&self, purse: Purse, login: &str, amount: Chips) -> Result<Chips, InsufficientFunds> {
        assert!(amount >= 0);
        let mut accounts = self.accounts.lock().expect("ledger lock");
        let balance = accounts.slot(purse, login);
        if *balance < amount {
            let short = amount - *balance;
            return Err(InsufficientFunds {
                login: login.to_string(),
                short,
            });
        }
        *balance -= amount;
        log::debug!("[ledger] {} -{} -> {} ({})", login, amount, balance, purse);
        Ok(*balance)
    }
    pub fn credit(&self, purse: Purse, login: &str, amount: Chips) -> Chips {
        assert!(amount >= 0);
        let mut accounts = self.accounts.lock().expect("ledger lock");
        let balance = accounts.slot(purse, login);
        *balance += amount;
        log::debug!("[ledger] {} +{} -> {} ({})", login, amount, balance, purse);
        *balance
    }
    /// The banked side of blackjack: residual escrow beyond payouts
    /// lands on the house account, shortfalls draw from it, so every
    /// settled round balances to the chip across all accounts. The
    /// house may run negative.
    pub fn adjust_house(&self, delta: Chips) {
        if delta == 0 {
            return;
        }
        let mut accounts = self.accounts.lock().expect("ledger lock");
        let house = accounts.wallets.entry(HOUSE.to_string()).or_insert(0);
        *house += delta;
        log::debug!("[ledger] house {:+} -> {}", delta, house);
    }
    pub fn house(&self) -> Chips {
        let accounts = self.accounts.lock().expect("ledger lock");
        accounts.wallets.get(HOUSE).copied().unwrap_or(0)
    }
    /// Seeds a tournament stack, replacing whatever was there.
    pub fn seed_stack(&self, tournament: u64, login: &str, amount: Chips) {
        let mut accounts = self.accounts.lock().expect("ledger lock");
        accounts
            .stacks
            .insert((tournament, login.to_string()), amount);
    }
    /// Drops every stack belonging to a finished tournament.
    pub fn sweep_stacks(&self, tournament: u64) {
        let mut accounts = self.accounts.lock().expect("ledger lock");
        accounts.stacks.retain(|(t, _), _| *t != tournament);
    }
    /// Wallet snapshot for persistence.
    pub fn snapshot(&self) -> Vec<(String, Chips)> {
        let accounts = self.accounts.lock().expect("ledger lock");
        let mut wallets = accounts
            .wallets
            .iter()
            .map(|(login, chips)| (login.clone(), *chips))
            .collect::<Vec<_>>();
        wallets.sort();
        wallets
    }
    /// Restores a wallet snapshot, e.g. at startup.
    pub fn restore(&self, wallets: Vec<(String, Chips)>) {
        let mut accounts = self.accounts.lock().expect("ledger lock");
        for (login, chips) in wallets {
            accounts.wallets.insert(login, chips);
        }
    }
}

impl Accounts {
    fn slot(&mut self, purse: Purse, login: &str) -> &mut Chips {
        match purse {
            Purse::Wallet => self.wallets.entry(login.to_string()).or_insert(0),
            Purse::Stack(t) => self.stacks.entry((t, login.to_string())).or_insert(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_seeds_starting_chips() {
        let ledger = Ledger::new();
        assert_eq!(ledger.ensure("alice"), crate::STARTING_CHIPS);
        ledger.credit(Purse::Wallet, "alice", 50);
        assert_eq!(ledger.ensure("alice"), crate::STARTING_CHIPS + 50);
    }

    #[test]
    fn debit_rejects_overdraft() {
        let ledger = Ledger::new();
        ledger.ensure("bob");
        let err = ledger
            .debit(Purse::Wallet, "bob", crate::STARTING_CHIPS + 1)
            .unwrap_err();
        assert_eq!(err.short, 1);
        assert_eq!(ledger.balance(Purse::Wallet, "bob"), crate::STARTING_CHIPS);
    }

    #[test]
    fn stacks_are_separate() {
        let ledger = Ledger::new();
        ledger.ensure("carol");
        ledger.seed_stack(7, "carol", 5_000);
        assert_eq!(ledger.balance(Purse::Stack(7), "carol"), 5_000);
        ledger.debit(Purse::Stack(7), "carol", 100).unwrap();
        assert_eq!(ledger.balance(Purse::Stack(7), "carol"), 4_900);
        assert_eq!(ledger.balance(Purse::Wallet, "carol"), crate::STARTING_CHIPS);
        ledger.sweep_stacks(7);
        assert_eq!(ledger.balance(Purse::Stack(7), "carol"), 0);
    }

    #[test]
    fn debit_credit_round_trips() {
        let ledger = Ledger::new();
        ledger.ensure("dave");
        ledger.debit(Purse::Wallet, "dave", 100).unwrap();
        ledger.credit(Purse::Wallet, "dave", 100);
        assert_eq!(ledger.balance(Purse::Wallet, "dave"), crate::STARTING_CHIPS);
    }
}
