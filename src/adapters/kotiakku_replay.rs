use std::fs;
use std::io;
use std::sync::Mutex;

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;

use crate::adapters::kotiakku_http::{KotiakkuClient, KotiakkuClientError};

#[derive(Debug, Clone, Deserialize)]
struct ReplayScript {
    #[serde(default = "default_loop")]
    loop_forever: bool,
    fetches: Vec<ScriptEvent>,
}

#[derive(Debug, Clone, Deserialize)]
struct ScriptEvent {
    ok: Option<Value>,
    error: Option<String>,
}

fn default_loop() -> bool {
    true
}

/// Replays scripted fetch outcomes from a JSON file instead of calling the
/// endpoint. Used for offline runs and tests.
#[derive(Debug)]
pub struct KotiakkuReplayClient {
    script: ReplayScript,
    next_index: Mutex<usize>,
}

impl KotiakkuReplayClient {
    pub fn from_file(path: &str) -> Result<Self, KotiakkuClientError> {
        let content = fs::read_to_string(path)?;
        let script: ReplayScript = serde_json::from_str(&content)?;

        if script.fetches.is_empty() {
            return Err(KotiakkuClientError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                "replay script must contain at least one fetch event",
            )));
        }

        Ok(Self {
            script,
            next_index: Mutex::new(0),
        })
    }

    fn next_event(&self) -> Result<ScriptEvent, KotiakkuClientError> {
        let mut index = self
            .next_index
            .lock()
            .map_err(|_| io::Error::other("replay state lock poisoned"))?;

        if *index >= self.script.fetches.len() {
            if !self.script.loop_forever {
                return Err(KotiakkuClientError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "replay finished",
                )));
            }
            *index = 0;
        }

        let event = self.script.fetches[*index].clone();
        *index += 1;

        Ok(event)
    }
}

fn scripted_error(kind: &str) -> KotiakkuClientError {
    match kind.trim().to_ascii_lowercase().as_str() {
        "unauthorized" | "invalid_auth" => KotiakkuClientError::InvalidAuth,
        "server_error" => KotiakkuClientError::Status(StatusCode::INTERNAL_SERVER_ERROR),
        "timeout" => io::Error::new(io::ErrorKind::TimedOut, kind.to_string()).into(),
        "connection_refused" => {
            io::Error::new(io::ErrorKind::ConnectionRefused, kind.to_string()).into()
        }
        "host_unreachable" => io::Error::new(io::ErrorKind::HostUnreachable, kind.to_string()).into(),
        "invalid_json" => match serde_json::from_str::<Value>("{") {
            Err(error) => KotiakkuClientError::Json(error),
            Ok(_) => io::Error::new(io::ErrorKind::InvalidData, kind.to_string()).into(),
        },
        _ => io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("unknown scripted error kind: {kind}"),
        )
        .into(),
    }
}

impl KotiakkuClient for KotiakkuReplayClient {
    fn fetch(&self) -> Result<Value, KotiakkuClientError> {
        match self.next_event()? {
            ScriptEvent {
                ok: Some(payload),
                error: None,
            } => Ok(payload),
            ScriptEvent {
                ok: None,
                error: Some(kind),
            } => Err(scripted_error(&kind)),
            _ => Err(KotiakkuClientError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                "script event must contain exactly one of: ok or error",
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::ErrorKind;

    use crate::adapters::kotiakku_http::{KotiakkuClient, KotiakkuClientError};

    use super::KotiakkuReplayClient;

    fn fixture(name: &str) -> String {
        format!(
            "{}/testdata/replay/{name}",
            env!("CARGO_MANIFEST_DIR").replace('\\', "/")
        )
    }

    fn io_kind(error: KotiakkuClientError) -> ErrorKind {
        match error {
            KotiakkuClientError::Io(io) => io.kind(),
            other => panic!("expected io error, got {other:?}"),
        }
    }

    #[test]
    fn replays_and_loops_scripted_payloads() {
        let client =
            KotiakkuReplayClient::from_file(&fixture("daylight_loop.json")).expect("script");

        let first = client.fetch().expect("first fetch should succeed");
        let second = client.fetch().expect("second fetch should succeed");
        let third = client.fetch().expect("replay should loop");

        assert_eq!(first["solar_power_kw"], 3.4);
        assert_eq!(second["solar_power_kw"], 2.9);
        assert_eq!(third, first);
    }

    #[test]
    fn simulates_scripted_failures_then_finishes() {
        let client = KotiakkuReplayClient::from_file(&fixture("outage.json")).expect("script");

        assert!(client.fetch().is_ok());
        assert_eq!(
            io_kind(client.fetch().expect_err("timeout")),
            ErrorKind::TimedOut
        );
        assert!(client.fetch().expect_err("auth").is_auth_failure());
        assert!(matches!(
            client.fetch(),
            Err(KotiakkuClientError::Status(_))
        ));
        assert!(matches!(client.fetch(), Err(KotiakkuClientError::Json(_))));
        assert_eq!(
            io_kind(client.fetch().expect_err("finished")),
            ErrorKind::UnexpectedEof
        );
    }

    #[test]
    fn rejects_empty_script() {
        let error = KotiakkuReplayClient::from_file(&fixture("empty_script.json"))
            .expect_err("empty script should fail");
        assert_eq!(io_kind(error), ErrorKind::InvalidData);
    }

    #[test]
    fn rejects_invalid_top_level_json() {
        let error = KotiakkuReplayClient::from_file(&fixture("invalid_top_level_json.json"))
            .expect_err("invalid json should fail");
        assert!(matches!(error, KotiakkuClientError::Json(_)));
    }

    #[test]
    fn rejects_ambiguous_and_unknown_events() {
        let ambiguous =
            KotiakkuReplayClient::from_file(&fixture("ambiguous_event.json")).expect("script");
        assert_eq!(
            io_kind(ambiguous.fetch().expect_err("ambiguous event")),
            ErrorKind::InvalidData
        );

        let unknown =
            KotiakkuReplayClient::from_file(&fixture("unknown_error_kind.json")).expect("script");
        assert_eq!(
            io_kind(unknown.fetch().expect_err("unknown kind")),
            ErrorKind::InvalidInput
        );
    }
}
