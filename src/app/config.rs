use serde_json::{Value, json};

use crate::app::AppError;
use crate::domain::sensor::PowerUnit;

pub const DEFAULT_NAME: &str = "Kotiakku";
pub const DEFAULT_SCAN_INTERVAL_SECONDS: u64 = 300;
pub const MIN_SCAN_INTERVAL_SECONDS: u64 = 120;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub url: String,
    pub api_key: String,
    pub name: String,
    pub scan_interval_seconds: u64,
    pub power_unit: PowerUnit,
    pub db_path: String,
    pub http_bind: String,
    pub replay_file: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        if let Err(error) = dotenvy::dotenv()
            && !error.not_found()
        {
            return Err(AppError::config(format!("failed to read .env file: {error}")));
        }

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let scan_interval_seconds = parse_or_default(
            &lookup,
            "SCAN_INTERVAL_SECONDS",
            DEFAULT_SCAN_INTERVAL_SECONDS,
        )?;
        if scan_interval_seconds < MIN_SCAN_INTERVAL_SECONDS {
            return Err(AppError::config(format!(
                "SCAN_INTERVAL_SECONDS must be at least {MIN_SCAN_INTERVAL_SECONDS}"
            )));
        }

        let power_unit = match non_empty(&lookup, "POWER_UNIT") {
            Some(raw) => raw
                .parse::<PowerUnit>()
                .map_err(|error| AppError::config(format!("POWER_UNIT: {error}")))?,
            None => PowerUnit::default(),
        };

        Ok(Self {
            url: required(&lookup, "KOTIAKKU_URL")?,
            api_key: required(&lookup, "KOTIAKKU_API_KEY")?,
            name: non_empty(&lookup, "KOTIAKKU_NAME").unwrap_or_else(|| DEFAULT_NAME.to_string()),
            scan_interval_seconds,
            power_unit,
            db_path: non_empty(&lookup, "DB_PATH")
                .unwrap_or_else(|| "/var/lib/kotiakku/kotiakku.db".to_string()),
            http_bind: non_empty(&lookup, "HTTP_BIND")
                .unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            replay_file: non_empty(&lookup, "KOTIAKKU_REPLAY_FILE"),
        })
    }

    /// The entry as shown in diagnostics, before redaction.
    pub fn entry_json(&self, entry_id: &str) -> Value {
        json!({
            "entry_id": entry_id,
            "title": self.name,
            "data": {
                "url": self.url,
                "api_key": self.api_key,
                "name": self.name,
                "scan_interval": self.scan_interval_seconds,
            },
            "options": {
                "power_unit": self.power_unit.symbol(),
            },
        })
    }
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required<F>(lookup: &F, key: &str) -> Result<String, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    non_empty(lookup, key).ok_or_else(|| AppError::config(format!("{key} is required")))
}

fn parse_or_default<T, F>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr + Copy,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::config(format!("{key} must be a valid number"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::AppConfig;
    use crate::domain::sensor::PowerUnit;

    fn base(key: &str) -> Option<String> {
        match key {
            "KOTIAKKU_URL" => Some("https://api.example.invalid/status".to_string()),
            "KOTIAKKU_API_KEY" => Some("secret".to_string()),
            _ => None,
        }
    }

    #[test]
    fn rejects_missing_url() {
        let result = AppConfig::from_lookup(|_| None);
        assert_eq!(
            result.unwrap_err().to_string(),
            "invalid configuration: KOTIAKKU_URL is required"
        );
    }

    #[test]
    fn rejects_blank_api_key() {
        let result = AppConfig::from_lookup(|key| match key {
            "KOTIAKKU_API_KEY" => Some("   ".to_string()),
            other => base(other),
        });
        assert_eq!(
            result.unwrap_err().to_string(),
            "invalid configuration: KOTIAKKU_API_KEY is required"
        );
    }

    #[test]
    fn applies_defaults_for_optional_fields() {
        let config = AppConfig::from_lookup(base).expect("config should be valid");

        assert_eq!(config.name, "Kotiakku");
        assert_eq!(config.scan_interval_seconds, 300);
        assert_eq!(config.power_unit, PowerUnit::Kilowatt);
        assert_eq!(config.db_path, "/var/lib/kotiakku/kotiakku.db");
        assert_eq!(config.http_bind, "0.0.0.0:8080");
        assert_eq!(config.replay_file, None);
    }

    #[test]
    fn rejects_scan_interval_below_minimum() {
        let result = AppConfig::from_lookup(|key| match key {
            "SCAN_INTERVAL_SECONDS" => Some("60".to_string()),
            other => base(other),
        });
        assert_eq!(
            result.unwrap_err().to_string(),
            "invalid configuration: SCAN_INTERVAL_SECONDS must be at least 120"
        );
    }

    #[test]
    fn rejects_invalid_numeric_values() {
        let result = AppConfig::from_lookup(|key| match key {
            "SCAN_INTERVAL_SECONDS" => Some("soon".to_string()),
            other => base(other),
        });
        assert_eq!(
            result.unwrap_err().to_string(),
            "invalid configuration: SCAN_INTERVAL_SECONDS must be a valid number"
        );
    }

    #[test]
    fn parses_power_unit_option() {
        let config = AppConfig::from_lookup(|key| match key {
            "POWER_UNIT" => Some("W".to_string()),
            other => base(other),
        })
        .expect("config should be valid");
        assert_eq!(config.power_unit, PowerUnit::Watt);

        let invalid = AppConfig::from_lookup(|key| match key {
            "POWER_UNIT" => Some("MW".to_string()),
            other => base(other),
        });
        assert!(invalid.is_err());
    }

    #[test]
    fn entry_json_carries_credentials_for_later_redaction() {
        let config = AppConfig::from_lookup(base).expect("config should be valid");
        let entry = config.entry_json("abc123");

        assert_eq!(entry["entry_id"], "abc123");
        assert_eq!(entry["data"]["api_key"], "secret");
        assert_eq!(entry["data"]["scan_interval"], 300);
        assert_eq!(entry["options"]["power_unit"], "kW");
    }
}
