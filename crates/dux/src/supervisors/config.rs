//! 🔧 Knobs for the supervisor and its minions.
//!
//! 🧠 Knowledge graph:
//! - `RuntimeConfig`: how many workers, how deep the result buffer, spinner or no spinner.
//! - `RetryConfig`: how patiently we nag a flaky remote. Converted into a
//!   [`RetryPolicy`](super::retry::RetryPolicy) after validation, because a negative
//!   jitter is a cry for help, not a setting.
//! - Both are `[runtime]` / `[retry]` sections in the TOML, or `DUX_RUNTIME__*` / `DUX_RETRY__*`
//!   in the environment. Every field has a default. Nobody has to write a config file.

use std::time::Duration;

use anyhow::{Result, bail};
use serde::Deserialize;

use super::retry::{Growth, RetryPolicy};

/// 🧵 How the traversal is staffed.
#[derive(Debug, Deserialize, Clone)]
pub struct RuntimeConfig {
    /// 👷 Concurrent workers popping tasks. Ten, like the old tool. Old habits.
    #[serde(default = "default_workers", alias = "worker_count")]
    pub workers: usize,
    /// 📦 Leaves buffered between the walkers and the consumer before producers start waiting.
    #[serde(default = "default_result_buffer")]
    pub result_buffer: usize,
    /// 📊 Show the spinner. Turned off automatically in tests, manually by the grumpy.
    #[serde(default = "default_progress")]
    pub progress: bool,
}

fn default_workers() -> usize {
    10
}

fn default_result_buffer() -> usize {
    64
}

fn default_progress() -> bool {
    true
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            result_buffer: default_result_buffer(),
            progress: default_progress(),
        }
    }
}

/// 📈 How the backoff base grows between attempts.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GrowthKind {
    /// ✖️ `base *= multiplier`. The sane one.
    #[default]
    Multiplicative,
    /// 💥 `base_ms = base_ms²`. The one the old tool shipped. Hits the ceiling by attempt three.
    Squared,
}

/// 🔄 Backoff settings, as humans write them (milliseconds, floats, optimism).
#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// ✖️ Growth factor per failed attempt when `growth = "multiplicative"`.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default)]
    pub growth: GrowthKind,
    /// 🎲 Sleep is stretched by a uniform fraction in `[0, jitter)`.
    #[serde(default = "default_jitter")]
    pub jitter: f64,
    /// 🧱 Total attempts spent on an error that looks permanent before it is surfaced.
    #[serde(default = "default_terminal_attempts")]
    pub terminal_attempts: u32,
    /// ♾️ Cap on attempts for transient errors. Unset means "until the heat death of the universe".
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    // -- ⏱️ two minutes. long enough to get coffee, short enough to not forget why.
    120_000
}

fn default_multiplier() -> f64 {
    1.5
}

fn default_jitter() -> f64 {
    0.5
}

fn default_terminal_attempts() -> u32 {
    3
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
            growth: GrowthKind::default(),
            jitter: default_jitter(),
            terminal_attempts: default_terminal_attempts(),
            max_attempts: None,
        }
    }
}

impl RetryConfig {
    /// ✅ Validate and convert. Bad numbers bail here, not three hours into a walk.
    pub fn to_policy(&self) -> Result<RetryPolicy> {
        if self.base_delay_ms == 0 {
            bail!("💀 retry.base_delay_ms must be > 0. Zero-delay retries are just a DoS with extra steps.");
        }
        if self.max_delay_ms < self.base_delay_ms {
            bail!(
                "💀 retry.max_delay_ms ({}) is smaller than retry.base_delay_ms ({}). The ceiling is below the floor.",
                self.max_delay_ms,
                self.base_delay_ms
            );
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            bail!(
                "💀 retry.multiplier must be a finite number >= 1.0, got {}. Backoff is supposed to back off.",
                self.multiplier
            );
        }
        if !self.jitter.is_finite() || !(0.0..=1.0).contains(&self.jitter) {
            bail!("💀 retry.jitter must be within [0, 1], got {}", self.jitter);
        }
        if self.max_attempts == Some(0) {
            bail!("💀 retry.max_attempts = 0 means never even trying. Unset it or pick >= 1.");
        }
        Ok(RetryPolicy {
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            growth: match self.growth {
                GrowthKind::Multiplicative => Growth::Multiplicative(self.multiplier),
                GrowthKind::Squared => Growth::Squared,
            },
            jitter: self.jitter,
            terminal_attempts: self.terminal_attempts.max(1),
            max_attempts: self.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_defaults_match_the_old_tool() {
        let policy = RetryConfig::default().to_policy().expect("💀 defaults must validate");
        assert_eq!(policy.base_delay, Duration::from_millis(500));
        assert_eq!(policy.max_delay, Duration::from_secs(120));
        assert_eq!(policy.growth, Growth::Multiplicative(1.5));
        assert_eq!(policy.terminal_attempts, 3);
        assert_eq!(policy.max_attempts, None);
    }

    #[test]
    fn the_one_where_a_shrinking_backoff_is_rejected_at_the_door() {
        let config = RetryConfig {
            multiplier: 0.5,
            ..RetryConfig::default()
        };
        assert!(config.to_policy().is_err());

        let config = RetryConfig {
            max_delay_ms: 10,
            ..RetryConfig::default()
        };
        assert!(config.to_policy().is_err());
    }

    #[test]
    fn the_one_where_squared_growth_ignores_the_multiplier() {
        let config = RetryConfig {
            growth: GrowthKind::Squared,
            multiplier: 7.0,
            ..RetryConfig::default()
        };
        assert_eq!(config.to_policy().expect("💀 valid").growth, Growth::Squared);
    }
}
