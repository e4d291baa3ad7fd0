//! Server-side bot opponent.
//!
//! Used only when [`BotConfig`] is set: a player left waiting for
//! `fill_after` gets a bot instead of a human. The bot picks cooperate or
//! defect with equal probability, after a random think time, once per round.

use std::time::Duration;

use dilemma_protocol::{Choice, SessionId};
use rand::Rng;

use crate::{BotConfig, Participant};

/// A bot seat's behaviour.
#[derive(Debug, Clone)]
pub struct BotPlayer {
    think_min: Duration,
    think_max: Duration,
}

impl BotPlayer {
    pub fn new(config: &BotConfig) -> Self {
        Self {
            think_min: config.think_min,
            think_max: config.think_max.max(config.think_min),
        }
    }

    /// Picks this round's choice.
    pub fn choose(&self) -> Choice {
        if rand::random::<bool>() {
            Choice::Cooperate
        } else {
            Choice::Defect
        }
    }

    /// How long to wait before submitting, uniform in
    /// `[think_min, think_max]` at millisecond resolution.
    pub fn think_time(&self) -> Duration {
        let min = self.think_min.as_millis() as u64;
        let max = self.think_max.as_millis() as u64;
        if max <= min {
            return self.think_min;
        }
        Duration::from_millis(rand::rng().random_range(min..=max))
    }

    /// A fresh identity for a bot seat. Bot session ids start with `bot-`
    /// and never collide with the 32-hex-digit ids issued to players.
    pub fn participant(config: &BotConfig) -> Participant {
        let mut rng = rand::rng();
        let tag: u64 = rng.random();
        let suffix: u16 = rng.random_range(1000..=9999);
        Participant {
            session_id: SessionId::new(format!("bot-{tag:016x}")),
            display_name: format!("{}_{suffix}", config.name_prefix),
        }
    }
}
