use serde::Serialize;

use crate::domain::diagnostics::DiagnosticsReport;
use crate::domain::sensor::{DeviceInfo, SensorState};

#[derive(Debug, Clone, PartialEq)]
pub struct EnergyTotalRecord {
    pub sensor_key: String,
    pub value: String,
    pub updated_at: String,
}

/// Outcome of the latest evaluation round, as served over HTTP.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishedState {
    pub device: DeviceInfo,
    pub sensors: Vec<SensorState>,
    pub diagnostics: DiagnosticsReport,
}
