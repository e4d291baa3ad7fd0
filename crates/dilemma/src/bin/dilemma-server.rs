//! `dilemma-server`: runs a dilemma server from the command line.

use std::time::Duration;

use clap::Parser;
use dilemma::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "dilemma-server", version, about = "Iterated Prisoner's Dilemma match server")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "DILEMMA_BIND", default_value = "127.0.0.1:8000")]
    bind: String,

    /// Rounds per match.
    #[arg(long, env = "DILEMMA_TOTAL_ROUNDS", default_value_t = 5)]
    total_rounds: u32,

    /// Seat a bot opposite a player who has waited this many seconds.
    /// Bots are off unless this is set.
    #[arg(long, env = "DILEMMA_BOT_FILL_AFTER_SECS")]
    bot_fill_after_secs: Option<u64>,

    /// How often to log server stats, in seconds. 0 disables.
    #[arg(long, env = "DILEMMA_STATS_INTERVAL_SECS", default_value_t = 30)]
    stats_interval_secs: u64,
}

impl Args {
    fn match_config(&self) -> MatchConfig {
        MatchConfig {
            total_rounds: self.total_rounds,
            bot: self.bot_fill_after_secs.map(|secs| BotConfig {
                fill_after: Duration::from_secs(secs),
                ..BotConfig::default()
            }),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), DilemmaError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let server = DilemmaServer::builder()
        .bind(&args.bind)
        .match_config(args.match_config())
        .build()
        .await?;

    if args.stats_interval_secs > 0 {
        let stats = server.stats_handle();
        let period = Duration::from_secs(args.stats_interval_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let s = stats.snapshot().await;
                tracing::info!(
                    active_matches = s.active_matches,
                    waiting_sessions = s.waiting_sessions,
                    connected_sessions = s.connected_sessions,
                    "server stats"
                );
            }
        });
    }

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
}
