//! Tunables for the battle flow.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Candidates fetched per round.
pub const DEFAULT_POOL_LIMIT: usize = 10;

/// Pause between a confirmed vote and the next round.
pub const DEFAULT_NEXT_ROUND_DELAY_MS: u64 = 1_000;

pub const DEFAULT_LEADERBOARD_LIMIT: usize = 20;

/// Sessions untouched for this long are closed and dropped.
pub const DEFAULT_SESSION_IDLE_SECS: u64 = 15 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BattleConfig {
    pub pool_limit: usize,
    pub next_round_delay_ms: u64,
    pub leaderboard_limit: usize,
    pub session_idle_secs: u64,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            pool_limit: DEFAULT_POOL_LIMIT,
            next_round_delay_ms: DEFAULT_NEXT_ROUND_DELAY_MS,
            leaderboard_limit: DEFAULT_LEADERBOARD_LIMIT,
            session_idle_secs: DEFAULT_SESSION_IDLE_SECS,
        }
    }
}

impl BattleConfig {
    pub fn next_round_delay(&self) -> Duration {
        Duration::from_millis(self.next_round_delay_ms)
    }

    pub fn session_idle(&self) -> Duration {
        Duration::from_secs(self.session_idle_secs)
    }

    /// How often idle sessions are swept; never below one second.
    pub fn session_sweep_interval(&self) -> Duration {
        (self.session_idle() / 2).max(Duration::from_secs(1))
    }

    /// Same settings with no pause between rounds.
    pub fn without_delay(self) -> Self {
        Self {
            next_round_delay_ms: 0,
            ..self
        }
    }
}
