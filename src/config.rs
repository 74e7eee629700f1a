//! Application-level configuration loading: scoring rules, OTP policy and display settings.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use time::UtcOffset;
use tracing::{info, warn};

use crate::state::game::Round;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "TECHQUIZ_BACK_CONFIG_PATH";
/// India Standard Time, the venue's local time.
const DEFAULT_UTC_OFFSET_MINUTES: i32 = 330;

/// Scoring rules of the competition.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Points per correct answer in round one.
    pub round1_points: i32,
    /// Points per correct answer in round two.
    pub round2_points: i32,
    /// Teams ranked at or above this position in round one play round two.
    pub round1_cutoff: usize,
    /// Teams ranked at or above this position in round two play round three.
    pub round2_cutoff: usize,
    /// Number of illegal buzzer hits that triggers one penalty.
    pub penalty_every: u32,
    /// Points removed per penalty.
    pub penalty_points: i32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            round1_points: 10,
            round2_points: 20,
            round1_cutoff: 20,
            round2_cutoff: 10,
            penalty_every: 3,
            penalty_points: 10,
        }
    }
}

impl ScoringConfig {
    /// Points per correct answer for `round`; round three reuses round one's value.
    pub fn points_per_correct(&self, round: Round) -> i32 {
        match round {
            Round::Two => self.round2_points,
            Round::One | Round::Three => self.round1_points,
        }
    }

    /// Rank a team needs in the previous round to play `round`.
    pub fn cutoff_for(&self, round: Round) -> Option<usize> {
        match round {
            Round::One => None,
            Round::Two => Some(self.round1_cutoff),
            Round::Three => Some(self.round2_cutoff),
        }
    }
}

/// One-time password policy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OtpConfig {
    pub ttl_secs: u64,
    pub max_attempts: u32,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            max_attempts: 5,
        }
    }
}

impl OtpConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Immutable runtime configuration shared across the application.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scoring: ScoringConfig,
    pub otp: OtpConfig,
    /// Entries shown on the public leaderboard.
    pub leaderboard_size: usize,
    /// Offset applied when rendering wall-clock times.
    pub display_utc_offset_minutes: i32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scoring: ScoringConfig::default(),
            otp: OtpConfig::default(),
            leaderboard_size: 10,
            display_utc_offset_minutes: DEFAULT_UTC_OFFSET_MINUTES,
        }
    }
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<Self>(&contents) {
                Ok(config) => {
                    info!(
                        path = %path.display(),
                        leaderboard_size = config.leaderboard_size,
                        penalty_every = config.scoring.penalty_every,
                        "loaded configuration"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Offset used to render timestamps, UTC when the configured value is out of range.
    pub fn display_offset(&self) -> UtcOffset {
        UtcOffset::from_whole_seconds(self.display_utc_offset_minutes.saturating_mul(60))
            .unwrap_or(UtcOffset::UTC)
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
