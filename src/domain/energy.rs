use chrono::{DateTime, TimeDelta, Utc};

use crate::domain::reading::PowerSource;
use crate::domain::sample::Sample;

const SECONDS_PER_HOUR: f64 = 3_600.0;

/// Running kWh total integrated from kW readings (left-rectangle Riemann sum).
///
/// The power read at an observation is assumed to have held for the whole
/// interval since the previous step. The clock is seeded by the first usable
/// observation and only advances when a strictly positive interval elapsed.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyAccumulator {
    source: PowerSource,
    total: f64,
    last_step_time: Option<DateTime<Utc>>,
}

impl EnergyAccumulator {
    pub fn new(source: PowerSource, total: f64) -> Self {
        Self {
            source,
            total,
            last_step_time: None,
        }
    }

    /// Seeds the total from a persisted raw value. Missing or unparseable
    /// values start from zero.
    pub fn restore(source: PowerSource, persisted: Option<&str>) -> Self {
        let total = match persisted {
            Some(raw) => parse_restored(raw).unwrap_or_else(|| {
                tracing::warn!(
                    field = source.primary_field(),
                    raw,
                    "persisted energy total is not a number; starting from zero"
                );
                0.0
            }),
            None => 0.0,
        };

        Self::new(source, total)
    }

    /// Unrounded running total, as it should be persisted.
    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn last_step_time(&self) -> Option<DateTime<Utc>> {
        self.last_step_time
    }

    pub fn current_value(&self) -> f64 {
        round_kwh(self.total)
    }

    pub fn observe(&mut self, sample: Option<&Sample>, observation_time: DateTime<Utc>) -> f64 {
        let Some(sample) = sample else {
            return self.current_value();
        };

        let Some(power_kw) = self.source.read(sample) else {
            return self.current_value();
        };

        let Some(last_step_time) = self.last_step_time else {
            self.last_step_time = Some(observation_time);
            return self.current_value();
        };

        let elapsed_hours = elapsed_seconds(observation_time - last_step_time) / SECONDS_PER_HOUR;

        if elapsed_hours > 0.0 {
            self.total += power_kw * elapsed_hours;
            self.last_step_time = Some(observation_time);

            tracing::trace!(
                field = self.source.primary_field(),
                power_kw,
                elapsed_hours,
                total_kwh = self.total,
                "energy integration step"
            );
        }

        self.current_value()
    }
}

// Nanosecond resolution; only spans beyond ~292 years fall back to millis.
fn elapsed_seconds(delta: TimeDelta) -> f64 {
    delta
        .num_nanoseconds()
        .map(|nanos| nanos as f64 / 1e9)
        .unwrap_or_else(|| delta.num_milliseconds() as f64 / 1e3)
}

pub fn round_kwh(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

fn parse_restored(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}
