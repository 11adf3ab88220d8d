use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::adapters::kotiakku_http::{KotiakkuClient, KotiakkuClientError};
use crate::domain::sample::{Clock, DataSource, Sample, SampleError};

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Fetch(#[from] KotiakkuClientError),
    #[error("failed to parse status payload: {0}")]
    Parse(#[from] SampleError),
}

impl RefreshError {
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Fetch(error) if error.is_auth_failure())
    }
}

/// Holds the last successful fetch. A failed refresh keeps the previous
/// sample and timestamp so the next evaluation round sees no elapsed time.
pub struct Coordinator<C, Cl> {
    client: C,
    clock: Cl,
    sample: Option<Sample>,
    raw_payload: Option<Value>,
    last_success_at: Option<DateTime<Utc>>,
    last_update_success: bool,
    last_error: Option<String>,
}

impl<C, Cl> Coordinator<C, Cl>
where
    C: KotiakkuClient,
    Cl: Clock,
{
    pub fn new(client: C, clock: Cl) -> Self {
        Self {
            client,
            clock,
            sample: None,
            raw_payload: None,
            last_success_at: None,
            last_update_success: false,
            last_error: None,
        }
    }

    pub fn refresh(&mut self) -> Result<(), RefreshError> {
        match self.fetch_sample() {
            Ok((payload, sample)) => {
                tracing::debug!(readings = sample.len(), "status refreshed");
                self.sample = Some(sample);
                self.raw_payload = Some(payload);
                self.last_success_at = Some(self.clock.now());
                self.last_update_success = true;
                self.last_error = None;
                Ok(())
            }
            Err(error) => {
                self.last_update_success = false;
                self.last_error = Some(error.to_string());
                Err(error)
            }
        }
    }

    fn fetch_sample(&self) -> Result<(Value, Sample), RefreshError> {
        let payload = self.client.fetch()?;
        let sample = Sample::from_payload(&payload)?;
        Ok((payload, sample))
    }

    pub fn raw_payload(&self) -> Option<&Value> {
        self.raw_payload.as_ref()
    }

    pub fn last_success_at(&self) -> Option<DateTime<Utc>> {
        self.last_success_at
    }

    pub fn last_update_success(&self) -> bool {
        self.last_update_success
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

impl<C, Cl> DataSource for Coordinator<C, Cl>
where
    Cl: Clock,
{
    fn latest_sample(&self) -> Option<&Sample> {
        self.sample.as_ref()
    }

    fn last_observation_time(&self) -> DateTime<Utc> {
        self.last_success_at.unwrap_or_else(|| self.clock.now())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::Cell;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use chrono::{DateTime, Duration, TimeZone, Utc};
    use serde_json::{Value, json};

    use super::{Coordinator, RefreshError};
    use crate::adapters::kotiakku_http::{KotiakkuClient, KotiakkuClientError};
    use crate::domain::sample::{Clock, DataSource};

    pub(crate) struct ScriptedClient {
        responses: Mutex<VecDeque<Result<Value, KotiakkuClientError>>>,
    }

    impl ScriptedClient {
        pub(crate) fn new(responses: Vec<Result<Value, KotiakkuClientError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
            }
        }
    }

    impl KotiakkuClient for ScriptedClient {
        fn fetch(&self) -> Result<Value, KotiakkuClientError> {
            self.responses
                .lock()
                .expect("script lock should be available")
                .pop_front()
                .unwrap_or(Err(KotiakkuClientError::Io(std::io::Error::other(
                    "script exhausted",
                ))))
        }
    }

    /// Starts at `start` and moves forward `step` on every reading.
    pub(crate) struct StepClock {
        start: DateTime<Utc>,
        step: Duration,
        reads: Cell<i32>,
    }

    impl StepClock {
        pub(crate) fn new(start: DateTime<Utc>, step: Duration) -> Self {
            Self {
                start,
                step,
                reads: Cell::new(0),
            }
        }
    }

    impl Clock for StepClock {
        fn now(&self) -> DateTime<Utc> {
            let reads = self.reads.get();
            self.reads.set(reads + 1);
            self.start + self.step * reads
        }
    }

    pub(crate) fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 6, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    #[test]
    fn successful_refresh_replaces_sample_and_timestamp() {
        let client = ScriptedClient::new(vec![
            Ok(json!({"solar_power_kw": 2.0, "grid_power_kw": 1.0})),
            Ok(json!({"solar_power_kw": 3.0})),
        ]);
        let mut coordinator = Coordinator::new(client, StepClock::new(t0(), Duration::minutes(5)));

        coordinator.refresh().expect("first refresh should succeed");
        coordinator.refresh().expect("second refresh should succeed");

        let sample = coordinator.latest_sample().expect("sample should exist");
        assert_eq!(sample.get("solar_power_kw"), Some(3.0));
        assert_eq!(sample.get("grid_power_kw"), None);
        assert_eq!(
            coordinator.last_observation_time(),
            t0() + Duration::minutes(5)
        );
        assert!(coordinator.last_update_success());
        assert_eq!(coordinator.raw_payload(), Some(&json!({"solar_power_kw": 3.0})));
    }

    #[test]
    fn failed_refresh_keeps_previous_sample_and_timestamp() {
        let client = ScriptedClient::new(vec![
            Ok(json!({"solar_power_kw": 2.0})),
            Err(KotiakkuClientError::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "timed out",
            ))),
        ]);
        let mut coordinator = Coordinator::new(client, StepClock::new(t0(), Duration::minutes(5)));

        coordinator.refresh().expect("first refresh should succeed");
        let error = coordinator.refresh().expect_err("second refresh should fail");

        assert!(!error.is_auth_failure());
        assert!(!coordinator.last_update_success());
        assert_eq!(
            coordinator.last_error(),
            Some("Error communicating with API: timed out")
        );
        assert_eq!(coordinator.last_success_at(), Some(t0()));
        assert_eq!(coordinator.last_observation_time(), t0());
        assert_eq!(
            coordinator
                .latest_sample()
                .and_then(|sample| sample.get("solar_power_kw")),
            Some(2.0)
        );
    }

    #[test]
    fn auth_failure_keeps_authentication_message() {
        let client = ScriptedClient::new(vec![Err(KotiakkuClientError::InvalidAuth)]);
        let mut coordinator = Coordinator::new(client, StepClock::new(t0(), Duration::minutes(5)));

        let error = coordinator.refresh().expect_err("refresh should fail");

        assert!(error.is_auth_failure());
        assert_eq!(
            coordinator.last_error(),
            Some("Invalid API Key - Authentication failed")
        );
    }

    #[test]
    fn non_object_payload_is_a_parse_failure() {
        let client = ScriptedClient::new(vec![Ok(json!([1, 2]))]);
        let mut coordinator = Coordinator::new(client, StepClock::new(t0(), Duration::minutes(5)));

        let error = coordinator.refresh().expect_err("refresh should fail");

        assert!(matches!(error, RefreshError::Parse(_)));
        assert!(coordinator.latest_sample().is_none());
    }

    #[test]
    fn falls_back_to_wall_clock_before_first_success() {
        let client = ScriptedClient::new(Vec::new());
        let coordinator = Coordinator::new(client, StepClock::new(t0(), Duration::minutes(1)));

        assert_eq!(coordinator.last_observation_time(), t0());
        assert_eq!(
            coordinator.last_observation_time(),
            t0() + Duration::minutes(1)
        );
    }
}
