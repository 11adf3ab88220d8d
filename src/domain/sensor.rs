use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

use crate::domain::energy::EnergyAccumulator;
use crate::domain::reading::PowerSource;
use crate::domain::sample::DataSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Power,
    Energy,
    SummedEnergy,
    Temperature,
    Battery,
    Price,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerUnit {
    #[default]
    Kilowatt,
    Watt,
}

impl PowerUnit {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Kilowatt => "kW",
            Self::Watt => "W",
        }
    }

    fn scale(self, kilowatts: f64) -> f64 {
        match self {
            Self::Kilowatt => kilowatts,
            Self::Watt => kilowatts * 1000.0,
        }
    }
}

impl fmt::Display for PowerUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown power unit {0:?}; expected kW or W")]
pub struct UnknownPowerUnit(pub String);

impl FromStr for PowerUnit {
    type Err = UnknownPowerUnit;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "kw" => Ok(Self::Kilowatt),
            "w" => Ok(Self::Watt),
            _ => Err(UnknownPowerUnit(raw.to_string())),
        }
    }
}

/// Static description of one entity. `sources` lists the power fields an
/// energy sensor integrates; instantaneous sensors read their own key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorDefinition {
    pub key: &'static str,
    pub kind: SensorKind,
    pub sources: &'static [&'static str],
    pub icon: Option<&'static str>,
}

const fn instant(
    key: &'static str,
    kind: SensorKind,
    icon: Option<&'static str>,
) -> SensorDefinition {
    SensorDefinition {
        key,
        kind,
        sources: &[],
        icon,
    }
}

const fn energy(
    key: &'static str,
    source: &'static [&'static str],
    icon: &'static str,
) -> SensorDefinition {
    SensorDefinition {
        key,
        kind: SensorKind::Energy,
        sources: source,
        icon: Some(icon),
    }
}

const fn summed(
    key: &'static str,
    sources: &'static [&'static str],
    icon: &'static str,
) -> SensorDefinition {
    SensorDefinition {
        key,
        kind: SensorKind::SummedEnergy,
        sources,
        icon: Some(icon),
    }
}

// Oddities kept as configured on the device: solar_to_house_kwh integrates
// solar_to_battery_kw, and both summed sensors name *_kwh keys that the
// payload does not carry, so they integrate zero power.
pub const SENSOR_CATALOG: &[SensorDefinition] = &[
    instant("battery_power_kw", SensorKind::Power, Some("mdi:home-battery")),
    instant("solar_power_kw", SensorKind::Power, Some("mdi:solar-power")),
    instant("grid_power_kw", SensorKind::Power, Some("mdi:transmission-tower")),
    instant("house_power_kw", SensorKind::Power, Some("mdi:home-lightning-bolt")),
    instant("solar_to_house_kw", SensorKind::Power, Some("mdi:solar-power-variant")),
    instant("solar_to_battery_kw", SensorKind::Power, Some("mdi:solar-power-variant")),
    instant("solar_to_grid_kw", SensorKind::Power, Some("mdi:solar-power-variant")),
    instant("grid_to_house_kw", SensorKind::Power, Some("mdi:transmission-tower-export")),
    instant("grid_to_battery_kw", SensorKind::Power, Some("mdi:transmission-tower-export")),
    instant("battery_to_house_kw", SensorKind::Power, Some("mdi:home-battery")),
    instant("battery_to_grid_kw", SensorKind::Power, Some("mdi:home-battery")),
    energy("battery_energy_kwh", &["battery_power_kw"], "mdi:home-battery"),
    energy("solar_energy_kwh", &["solar_power_kw"], "mdi:solar-power-variant"),
    energy("grid_energy_kwh", &["grid_power_kw"], "mdi:transmission-tower-export"),
    energy("house_energy_kwh", &["house_power_kw"], "mdi:home-lightning-bolt"),
    energy("solar_to_house_kwh", &["solar_to_battery_kw"], "mdi:solar-power-variant"),
    energy("solar_to_battery_kwh", &["solar_to_battery_kw"], "mdi:solar-power-variant"),
    energy("solar_to_grid_kwh", &["solar_to_grid_kw"], "mdi:solar-power-variant"),
    energy("grid_to_house_kwh", &["grid_to_house_kw"], "mdi:transmission-tower-export"),
    energy("grid_to_battery_kwh", &["grid_to_battery_kw"], "mdi:transmission-tower-export"),
    energy("battery_to_house_kwh", &["battery_to_house_kw"], "mdi:home-battery"),
    energy("battery_to_grid_kwh", &["battery_to_grid_kw"], "mdi:home-battery"),
    summed(
        "total_battery_charge_kwh",
        &["solar_to_battery_kwh", "grid_to_battery_kwh"],
        "mdi:battery-charging",
    ),
    summed(
        "total_grid_export_kwh",
        &["solar_to_grid_kwh", "battery_to_grid_kwh"],
        "mdi:transmission-tower-import",
    ),
    instant("battery_temperature_c", SensorKind::Temperature, None),
    instant("state_of_charge_percent", SensorKind::Battery, None),
    instant("spot_price_cents_per_kwh", SensorKind::Price, Some("mdi:cash-fast")),
];

impl SensorDefinition {
    pub fn is_energy(&self) -> bool {
        matches!(self.kind, SensorKind::Energy | SensorKind::SummedEnergy)
    }

    pub fn power_source(&self) -> Option<PowerSource> {
        let primary = *self.sources.first()?;
        match self.kind {
            SensorKind::Energy => Some(PowerSource::direct(primary)),
            SensorKind::SummedEnergy => Some(PowerSource::summed(
                primary,
                self.sources.iter().copied(),
            )),
            _ => None,
        }
    }

    pub fn unit(&self, power_unit: PowerUnit) -> &'static str {
        match self.kind {
            SensorKind::Power => power_unit.symbol(),
            SensorKind::Energy | SensorKind::SummedEnergy => "kWh",
            SensorKind::Temperature => "°C",
            SensorKind::Battery => "%",
            SensorKind::Price => "c/kWh",
        }
    }

    pub fn device_class(&self) -> Option<&'static str> {
        match self.kind {
            SensorKind::Power => Some("power"),
            SensorKind::Energy | SensorKind::SummedEnergy => Some("energy"),
            SensorKind::Temperature => Some("temperature"),
            SensorKind::Battery => Some("battery"),
            SensorKind::Price => None,
        }
    }

    pub fn state_class(&self) -> &'static str {
        if self.is_energy() {
            "total_increasing"
        } else {
            "measurement"
        }
    }

    /// Key as it appears in entity ids; power keys follow the chosen unit.
    pub fn display_key(&self, power_unit: PowerUnit) -> String {
        match (self.kind, power_unit) {
            (SensorKind::Power, PowerUnit::Watt) => match self.key.strip_suffix("_kw") {
                Some(stem) => format!("{stem}_w"),
                None => self.key.to_string(),
            },
            _ => self.key.to_string(),
        }
    }
}

/// Device-level identity every entity hangs off.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceInfo {
    pub identifiers: Vec<(String, String)>,
    pub name: String,
    pub manufacturer: String,
    pub model: String,
}

pub const INTEGRATION_DOMAIN: &str = "elisa_kotiakku";
pub const MANUFACTURER: &str = "Huawei (Elisa)";
pub const MODEL: &str = "FusionSolar LUNA2000";

impl DeviceInfo {
    pub fn new(entry_id: &str, name: &str) -> Self {
        Self {
            identifiers: vec![(INTEGRATION_DOMAIN.to_string(), entry_id.to_string())],
            name: name.to_string(),
            manufacturer: MANUFACTURER.to_string(),
            model: MODEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorState {
    pub entity_id: String,
    pub unique_id: String,
    pub key: String,
    pub kind: SensorKind,
    pub value: Option<f64>,
    pub unit: String,
    pub device_class: Option<String>,
    pub state_class: String,
    pub icon: Option<String>,
}

#[derive(Debug, Clone)]
struct Sensor {
    definition: SensorDefinition,
    accumulator: Option<EnergyAccumulator>,
}

impl Sensor {
    fn value<D: DataSource>(&mut self, source: &D, power_unit: PowerUnit) -> Option<f64> {
        let sample = source.latest_sample();

        if let Some(accumulator) = self.accumulator.as_mut() {
            return Some(accumulator.observe(sample, source.last_observation_time()));
        }

        let raw = sample?.get(self.definition.key)?;
        match self.definition.kind {
            SensorKind::Power => Some(power_unit.scale(raw)),
            _ => Some(raw),
        }
    }
}

/// Every entity of one device. Owns one accumulator per energy sensor.
#[derive(Debug, Clone)]
pub struct SensorSet {
    entry_id: String,
    device_slug: String,
    power_unit: PowerUnit,
    sensors: Vec<Sensor>,
}

impl SensorSet {
    pub fn new(
        definitions: &[SensorDefinition],
        entry_id: &str,
        device_name: &str,
        power_unit: PowerUnit,
        restored: &HashMap<String, String>,
    ) -> Self {
        let sensors = definitions
            .iter()
            .map(|definition| Sensor {
                definition: *definition,
                accumulator: definition.power_source().map(|source| {
                    EnergyAccumulator::restore(
                        source,
                        restored.get(definition.key).map(String::as_str),
                    )
                }),
            })
            .collect();

        Self {
            entry_id: entry_id.to_string(),
            device_slug: slugify(device_name),
            power_unit,
            sensors,
        }
    }

    /// Computes every entity's value against the data source's current
    /// sample. Energy sensors integrate as a side effect.
    pub fn evaluate<D: DataSource>(&mut self, source: &D) -> Vec<SensorState> {
        let power_unit = self.power_unit;
        let mut states = Vec::with_capacity(self.sensors.len());

        for sensor in &mut self.sensors {
            let value = sensor.value(source, power_unit);
            let definition = sensor.definition;

            states.push(SensorState {
                entity_id: format!(
                    "sensor.{}_{}",
                    self.device_slug,
                    definition.display_key(power_unit)
                ),
                unique_id: format!("{}_{}", self.entry_id, definition.key),
                key: definition.key.to_string(),
                kind: definition.kind,
                value,
                unit: definition.unit(power_unit).to_string(),
                device_class: definition.device_class().map(str::to_string),
                state_class: definition.state_class().to_string(),
                icon: definition.icon.map(str::to_string),
            });
        }

        states
    }

    /// Unrounded totals of every energy sensor, keyed by sensor key.
    pub fn energy_totals(&self) -> Vec<(&'static str, f64)> {
        self.sensors
            .iter()
            .filter_map(|sensor| {
                sensor
                    .accumulator
                    .as_ref()
                    .map(|accumulator| (sensor.definition.key, accumulator.total()))
            })
            .collect()
    }
}

/// Lowercase ASCII slug with runs of other characters collapsed to `_`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_separator = false;

    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('_');
            }
            pending_separator = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
    }

    if slug.is_empty() {
        "unknown".to_string()
    } else {
        slug
    }
}
