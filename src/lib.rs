pub mod cards;
pub mod gameplay;
pub mod gameroom;
pub mod heuristics;
pub mod hosting;
pub mod ledger;
pub mod players;
#[cfg(feature = "database")]
pub mod save;
pub mod tournament;

/// dimensional analysis types
pub type Chips = i64;

// table parameters
const BLACKJACK_SEATS: usize = 7;
const POKER_SEATS: usize = 10;
const BLACKJACK_DECKS: usize = 6;
const DEALER_STAND: u8 = 17;
const MIN_BET: Chips = 10;
const MAX_BET: Chips = 500;
const STARTING_CHIPS: Chips = 1_000;
const BET_COOLDOWN_MS: u64 = 5_000;
const HOUSE_BOTS: usize = 2;

// timing parameters
const BETTING_WINDOW_MS: u64 = 20_000;
const INSURANCE_WINDOW_MS: u64 = 8_000;
const TURN_MIN_MS: u64 = 6_000;
const TURN_BASE_MS: u64 = 12_000;
const TURN_MAX_MS: u64 = 18_000;
const POKER_TURN_MS: u64 = 15_000;
const STREET_IDLE_MS: u64 = 30_000;

// heuristics parameters
const STREAK_WINDOW: usize = 10;
const TILT_MIN: f32 = -3.0;
const TILT_MAX: f32 = 3.0;
const TILT_GATE: f32 = 2.0;
const TILT_CLAMP: f32 = 0.35;
const TIMEOUT_WINDOW_MS: u64 = 600_000;
const AFK_TIMEOUTS: usize = 3;

// ingress parameters
const RATE_WINDOW_MS: u64 = 10_000;
const RATE_BURST: usize = 20;
const WARN_COOLDOWN_MS: u64 = 2_000;
const LOBBY_CODE: usize = 6;

/// initialize logging and exit on ctrl-c
pub fn init() {
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.unwrap();
        println!();
        log::warn!("forcing exit");
        std::process::exit(0);
    });
    std::fs::create_dir_all("logs").expect("create logs directory");
    let config = simplelog::ConfigBuilder::new()
        .set_location_level(log::LevelFilter::Off)
        .set_target_level(log::LevelFilter::Off)
        .set_thread_level(log::LevelFilter::Off)
        .build();
    let time = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("time moves slow")
        .as_secs();
    let file = simplelog::WriteLogger::new(
        log::LevelFilter::Debug,
        config.clone(),
        std::fs::File::create(format!("logs/{}.log", time)).expect("create log file"),
    );
    let term = simplelog::TermLogger::new(
        log::LevelFilter::Info,
        config.clone(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );
    simplelog::CombinedLogger::init(vec![term, file]).expect("initialize logger");
}

/// wall-clock milliseconds since the unix epoch, for deadline fields on events
pub(crate) fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
