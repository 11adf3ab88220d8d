use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

/// One snapshot of every instantaneous reading returned by a poll.
///
/// Samples are replaced wholesale on each successful poll and never merged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sample {
    readings: BTreeMap<String, f64>,
}

#[derive(Debug, Error, PartialEq)]
pub enum SampleError {
    #[error("status payload must be a JSON object")]
    InvalidPayloadType,
}

impl Sample {
    pub fn from_payload(payload: &Value) -> Result<Self, SampleError> {
        let object = payload.as_object().ok_or(SampleError::InvalidPayloadType)?;

        let readings = object
            .iter()
            .filter_map(|(key, value)| numeric_value(value).map(|number| (key.clone(), number)))
            .collect();

        Ok(Self { readings })
    }

    pub fn get(&self, field: &str) -> Option<f64> {
        self.readings.get(field).copied()
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for Sample {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self {
            readings: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value))
                .collect(),
        }
    }
}

fn numeric_value(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(raw) => raw.trim().parse::<f64>().ok(),
        _ => None,
    }?;

    number.is_finite().then_some(number)
}

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Read side of the poll scheduler.
pub trait DataSource {
    fn latest_sample(&self) -> Option<&Sample>;

    /// Time of the most recent successful fetch, or the current wall-clock
    /// time if no fetch has succeeded yet.
    fn last_observation_time(&self) -> DateTime<Utc>;
}
