//! Match configuration and status.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::MatchmakingError;

// ---------------------------------------------------------------------------
// MatchConfig
// ---------------------------------------------------------------------------

/// Settings applied to every match the matchmaker creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchConfig {
    /// Rounds per match. Must be at least 1.
    pub total_rounds: u32,

    /// Pair a lone waiting player with a server-side bot. `None` (the
    /// default) means players wait for a human opponent indefinitely.
    pub bot: Option<BotConfig>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            total_rounds: 5,
            bot: None,
        }
    }
}

impl MatchConfig {
    /// Checks that the config describes a playable match.
    ///
    /// # Errors
    /// [`MatchmakingError::InvalidConfig`] for zero rounds or a bot think
    /// time range whose minimum exceeds its maximum.
    pub fn validate(&self) -> Result<(), MatchmakingError> {
        if self.total_rounds == 0 {
            return Err(MatchmakingError::InvalidConfig(
                "total_rounds must be at least 1".into(),
            ));
        }
        if let Some(bot) = &self.bot {
            if bot.think_min > bot.think_max {
                return Err(MatchmakingError::InvalidConfig(
                    "bot think_min must not exceed think_max".into(),
                ));
            }
        }
        Ok(())
    }
}

/// Settings for the server-side bot opponent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotConfig {
    /// How long a player waits alone before a bot is seated against them.
    pub fill_after: Duration,

    /// Shortest delay before the bot commits its choice for a round.
    pub think_min: Duration,

    /// Longest delay before the bot commits its choice for a round.
    pub think_max: Duration,

    /// Display names are `{name_prefix}_{4 digits}`.
    pub name_prefix: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            fill_after: Duration::from_secs(5),
            think_min: Duration::from_secs(1),
            think_max: Duration::from_secs(5),
            name_prefix: "Bot".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// MatchStatus
// ---------------------------------------------------------------------------

/// Why a match stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinishReason {
    /// Every round was played.
    Completed,
    /// A participant left before the last round resolved.
    Abandoned,
}

/// The lifecycle state of a match.
///
/// ```text
/// Active ──(last round resolved)──→ Finished(Completed)
///    └─────(participant left)─────→ Finished(Abandoned)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchStatus {
    Active,
    Finished(FinishReason),
}

impl MatchStatus {
    /// Returns `true` while rounds are still being played.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "Active"),
            Self::Finished(FinishReason::Completed) => write!(f, "Completed"),
            Self::Finished(FinishReason::Abandoned) => write!(f, "Abandoned"),
        }
    }
}
