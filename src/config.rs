use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::SimError;
use crate::types::Tick;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CostModel {
    /// Euclidean distance between the link endpoints.
    #[default]
    Euclidean,
    Unit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub hello_interval: Tick,
    pub hello_offset: Tick,
    pub advert_interval: Tick,
    pub advert_offset: Tick,
    pub loss_prob: f64,
    pub seed: u64,
    pub cost_model: CostModel,
    pub sim_time: Tick,
    pub data_start: Tick,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            hello_interval: 10,
            hello_offset: 0,
            advert_interval: 30,
            advert_offset: 0,
            loss_prob: 0.0,
            seed: 123,
            cost_model: CostModel::Euclidean,
            sim_time: 2000,
            data_start: 100,
        }
    }
}

impl SimConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SimError> {
        let content = fs::read_to_string(path)?;
        let config: SimConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), SimError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), SimError> {
        if self.hello_interval == 0 || self.advert_interval == 0 {
            return Err(SimError::InvalidConfig("timer intervals must be positive".into()));
        }
        // the recompute midpoint must fall on a different tick than the advert
        if self.advert_interval < 2 {
            return Err(SimError::InvalidConfig(format!(
                "advert interval {} leaves no room for a midpoint",
                self.advert_interval
            )));
        }
        if self.hello_offset >= self.hello_interval {
            return Err(SimError::InvalidConfig(format!(
                "hello offset {} not below interval {}",
                self.hello_offset, self.hello_interval
            )));
        }
        if self.advert_offset >= self.advert_interval {
            return Err(SimError::InvalidConfig(format!(
                "advert offset {} not below interval {}",
                self.advert_offset, self.advert_interval
            )));
        }
        if !(0.0..=1.0).contains(&self.loss_prob) {
            return Err(SimError::InvalidConfig(format!(
                "loss probability {} outside [0, 1]",
                self.loss_prob
            )));
        }
        if self.data_start >= self.sim_time {
            return Err(SimError::InvalidConfig(format!(
                "data start {} is past the end of the run ({})",
                self.data_start, self.sim_time
            )));
        }
        Ok(())
    }

    pub fn timers(&self) -> Timers {
        Timers {
            hello_interval: self.hello_interval,
            hello_offset: self.hello_offset,
            advert_interval: self.advert_interval,
            advert_offset: self.advert_offset,
        }
    }
}

/// Per-router timer schedule. A timer fires on tick `t` when
/// `t % interval == offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timers {
    pub hello_interval: Tick,
    pub hello_offset: Tick,
    pub advert_interval: Tick,
    pub advert_offset: Tick,
}

impl Default for Timers {
    fn default() -> Self {
        SimConfig::default().timers()
    }
}

impl Timers {
    pub fn hello_due(&self, time: Tick) -> bool {
        time % self.hello_interval == self.hello_offset
    }

    pub fn advert_due(&self, time: Tick) -> bool {
        time % self.advert_interval == self.advert_offset
    }

    /// Half an advertisement interval after the broadcast.
    pub fn midpoint_due(&self, time: Tick) -> bool {
        let midpoint = (self.advert_offset + self.advert_interval / 2) % self.advert_interval;
        time % self.advert_interval == midpoint
    }

    /// Neighbors not heard from within this many ticks are expired.
    pub fn dead_interval(&self) -> Tick {
        2 * self.hello_interval
    }
}
