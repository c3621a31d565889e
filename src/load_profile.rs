//! Load profiles.

use chrono::{DateTime, Timelike, Utc};
use dyn_clone::{clone_trait_object, DynClone};
use erased_serde::serialize_trait_object;
use serde::{Deserialize, Serialize};

/// Number of concurrent users of a load run and how fast they are spawned.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoadLevel {
    pub num_clients: u64,
    /// Users started per second while ramping up.
    pub hatch_rate: f64,
}

impl LoadLevel {
    pub fn new(num_clients: u64, hatch_rate: f64) -> Self {
        Self { num_clients, hatch_rate }
    }
}

/// A load profile is a function, which defines the load level of the next load run.
/// probe - index of the probe in the short experiment (0 in the long one),
/// now - wall clock time the run starts at.
pub trait LoadProfile: DynClone + erased_serde::Serialize + Send + Sync {
    fn level(&self, probe: u64, now: DateTime<Utc>) -> LoadLevel;
}

clone_trait_object!(LoadProfile);
serialize_trait_object!(LoadProfile);

#[derive(Clone, Serialize)]
pub struct ConstantLoadProfile {
    level: LoadLevel,
}

impl ConstantLoadProfile {
    pub fn new(level: LoadLevel) -> Self {
        Self { level }
    }
}

impl LoadProfile for ConstantLoadProfile {
    fn level(&self, _probe: u64, _now: DateTime<Utc>) -> LoadLevel {
        self.level
    }
}

/// Base load with a spike every `every` probes, starting at probe `offset`.
#[derive(Clone, Serialize)]
pub struct PeriodicSpikeLoadProfile {
    base: LoadLevel,
    spike: LoadLevel,
    offset: u64,
    every: u64,
}

impl PeriodicSpikeLoadProfile {
    pub fn new(base: LoadLevel, spike: LoadLevel, offset: u64, every: u64) -> Self {
        Self { base, spike, offset, every }
    }

    /// With `every == 0` only probe `offset` spikes.
    pub fn is_spike(&self, probe: u64) -> bool {
        match probe.checked_sub(self.offset) {
            Some(since) => since.checked_rem(self.every).map_or(since == 0, |rem| rem == 0),
            None => false,
        }
    }
}

impl LoadProfile for PeriodicSpikeLoadProfile {
    fn level(&self, probe: u64, _now: DateTime<Utc>) -> LoadLevel {
        if self.is_spike(probe) {
            self.spike
        } else {
            self.base
        }
    }
}

/// Half-open range of UTC hours, `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HourWindow {
    pub start: u32,
    pub end: u32,
}

impl HourWindow {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, hour: u32) -> bool {
        self.start <= hour && hour < self.end
    }
}

/// Daily pattern: low load all day, medium and high load inside fixed hour windows.
#[derive(Clone, Serialize)]
pub struct DailyWindowLoadProfile {
    low: LoadLevel,
    medium: LoadLevel,
    high: LoadLevel,
    medium_hours: HourWindow,
    high_hours: HourWindow,
}

impl DailyWindowLoadProfile {
    pub fn new(low: LoadLevel, medium: LoadLevel, high: LoadLevel,
               medium_hours: HourWindow, high_hours: HourWindow) -> Self {
        Self { low, medium, high, medium_hours, high_hours }
    }
}

impl LoadProfile for DailyWindowLoadProfile {
    fn level(&self, _probe: u64, now: DateTime<Utc>) -> LoadLevel {
        let hour = now.hour();
        // medium wins if the windows overlap
        if self.medium_hours.contains(hour) {
            self.medium
        } else if self.high_hours.contains(hour) {
            self.high
        } else {
            self.low
        }
    }
}

/// Load profile as written in the YAML config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoadProfileConfig {
    Constant {
        level: LoadLevel,
    },
    PeriodicSpike {
        base: LoadLevel,
        spike: LoadLevel,
        offset: u64,
        every: u64,
    },
    DailyWindow {
        low: LoadLevel,
        medium: LoadLevel,
        high: LoadLevel,
        medium_hours: HourWindow,
        high_hours: HourWindow,
    },
}

impl LoadProfileConfig {
    /// Profile driving the short experiment: 5 users, 100 users every 10th probe from probe 5.
    pub fn default_short() -> Self {
        Self::PeriodicSpike {
            base: LoadLevel::new(5, 5.),
            spike: LoadLevel::new(100, 100.),
            offset: 5,
            every: 10,
        }
    }

    /// Profile driving the long experiment.
    pub fn default_long() -> Self {
        Self::DailyWindow {
            low: LoadLevel::new(15, 3.),
            medium: LoadLevel::new(40, 4.),
            high: LoadLevel::new(80, 20.),
            medium_hours: HourWindow::new(9, 12),
            high_hours: HourWindow::new(15, 17),
        }
    }

    pub fn build(&self) -> Box<dyn LoadProfile> {
        match self.clone() {
            Self::Constant { level } => Box::new(ConstantLoadProfile::new(level)),
            Self::PeriodicSpike { base, spike, offset, every } => {
                Box::new(PeriodicSpikeLoadProfile::new(base, spike, offset, every))
            }
            Self::DailyWindow { low, medium, high, medium_hours, high_hours } => {
                Box::new(DailyWindowLoadProfile::new(low, medium, high, medium_hours, high_hours))
            }
        }
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        let levels = match self {
            Self::Constant { level } => vec![level],
            Self::PeriodicSpike { every: 0, .. } => return Err("load profile `every` must be positive".into()),
            Self::PeriodicSpike { base, spike, .. } => vec![base, spike],
            Self::DailyWindow { low, medium, high, .. } => vec![low, medium, high],
        };
        match levels.iter().find(|level| !level.hatch_rate.is_finite() || level.hatch_rate <= 0.) {
            Some(level) => Err(format!("hatch rate must be a finite positive number, got {}", level.hatch_rate)),
            None => Ok(()),
        }
    }
}
