use clap::Parser;
use railbird::gameplay::Services;
use railbird::gameroom::Floor;
use railbird::hosting::Server;
use railbird::tournament::Controller;

/// Multi-tenant realtime blackjack and no-limit hold'em table host.
#[derive(Parser, Debug)]
#[command(name = "railbird", version, about)]
struct Args {
    /// address to bind the hosting server on
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind: String,
    /// channels the house AI keeps seats filled on (repeatable)
    #[arg(long = "bot-channel")]
    bot_channels: Vec<String>,
    /// postgres connection string for durable state
    #[cfg(feature = "database")]
    #[arg(long, env = "DB_URL")]
    db_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    railbird::init();
    let args = Args::parse();
    let services = Services::new();
    let floor = Floor::new(services);
    for channel in &args.bot_channels {
        floor.add_bot_channel(channel);
    }
    let controller = Controller::spawn(floor.clone());
    #[cfg(feature = "database")]
    if let Some(ref url) = args.db_url {
        let client = connect(url).await?;
        railbird::save::migrate(&client).await?;
        railbird::save::hydrate_wallets(&client, &floor.services().ledger).await?;
        railbird::save::hydrate_bots(&client, &floor).await?;
        let exports = railbird::save::hydrate_tournaments(&client).await?;
        controller.import(exports).await;
        tokio::spawn(flush_loop(client, floor.clone(), controller.clone()));
    }
    Server::run(&args.bind, floor.clone(), controller).await?;
    floor.shutdown().await;
    Ok(())
}

#[cfg(feature = "database")]
async fn connect(url: &str) -> anyhow::Result<std::sync::Arc<tokio_postgres::Client>> {
    log::info!("connecting to database");
    let (client, connection) = tokio_postgres::connect(url, tokio_postgres::tls::NoTls).await?;
    tokio::spawn(connection);
    Ok(std::sync::Arc::new(client))
}

/// Durable state is rewritten on a coarse cadence; in-round state is
/// deliberately ephemeral.
#[cfg(feature = "database")]
async fn flush_loop(
    client: std::sync::Arc<tokio_postgres::Client>,
    floor: std::sync::Arc<Floor>,
    controller: std::sync::Arc<Controller>,
) {
    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(60));
    loop {
        ticker.tick().await;
        if let Err(e) = railbird::save::flush_wallets(&client, &floor.services().ledger).await {
            log::warn!("[save] wallet flush failed: {}", e);
        }
        if let Err(e) = railbird::save::flush_bots(&client, &floor).await {
            log::warn!("[save] bot list flush failed: {}", e);
        }
        if let Err(e) = railbird::save::flush_tournaments(&client, &controller).await {
            log::warn!("[save] tournament flush failed: {}", e);
        }
    }
}
