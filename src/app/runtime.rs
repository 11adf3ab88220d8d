use std::sync::{
    Arc, Mutex, RwLock,
    atomic::{AtomicBool, Ordering},
};
use std::thread::JoinHandle;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::{App, HttpServer, web};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::adapters::api::{ApiState, configure_routes};
use crate::adapters::kotiakku_http::{KotiakkuClient, KotiakkuHttpClient};
use crate::adapters::kotiakku_replay::KotiakkuReplayClient;
use crate::app::config::AppConfig;
use crate::app::coordinator::Coordinator;
use crate::app::error::AppError;
use crate::app::services::{EnergyStore, SqliteEnergyStore};
use crate::domain::diagnostics::{DiagnosticsReport, redact};
use crate::domain::models::{EnergyTotalRecord, PublishedState};
use crate::domain::sample::{Clock, DataSource};
use crate::domain::sensor::{DeviceInfo, SENSOR_CATALOG, SensorSet};

const STOP_CHECK_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub type SharedState = Arc<RwLock<PublishedState>>;

/// Drives one device: refreshes the coordinator, evaluates every sensor,
/// persists energy totals and publishes the round.
pub struct Poller<C, Cl, S> {
    coordinator: Coordinator<C, Cl>,
    sensors: SensorSet,
    store: S,
    published: SharedState,
    entry: Value,
}

impl<C, Cl, S> Poller<C, Cl, S>
where
    C: KotiakkuClient,
    Cl: Clock,
    S: EnergyStore,
{
    pub fn new(
        coordinator: Coordinator<C, Cl>,
        sensors: SensorSet,
        store: S,
        published: SharedState,
        entry: Value,
    ) -> Self {
        Self {
            coordinator,
            sensors,
            store,
            published,
            entry,
        }
    }

    /// First refresh at setup. Only an authentication failure is fatal.
    pub fn first_refresh(&mut self) -> Result<(), AppError> {
        if let Err(error) = self.coordinator.refresh() {
            if error.is_auth_failure() {
                return Err(AppError::setup(error));
            }
            tracing::warn!(error = %error, "first refresh failed; polling continues");
        }

        self.evaluate_round();
        Ok(())
    }

    pub fn tick(&mut self) {
        if let Err(error) = self.coordinator.refresh() {
            tracing::warn!(error = %error, "status refresh failed");
        }

        self.evaluate_round();
    }

    fn evaluate_round(&mut self) {
        let states = self.sensors.evaluate(&self.coordinator);
        self.persist_totals();

        let diagnostics = DiagnosticsReport {
            entry: redact(&self.entry),
            data: self.coordinator.raw_payload().map(redact),
            last_update_success: self.coordinator.last_update_success(),
            last_success_at: self.coordinator.last_success_at().map(to_iso8601),
            last_error: self.coordinator.last_error().map(str::to_string),
        };

        match self.published.write() {
            Ok(mut published) => {
                published.sensors = states;
                published.diagnostics = diagnostics;
            }
            Err(_) => tracing::error!("published state lock poisoned; round dropped"),
        }
    }

    /// Stamps the totals with the observation time they were integrated up to.
    fn persist_totals(&self) {
        let updated_at = to_iso8601(self.coordinator.last_observation_time());
        let records: Vec<EnergyTotalRecord> = self
            .sensors
            .energy_totals()
            .into_iter()
            .map(|(key, total)| EnergyTotalRecord {
                sensor_key: key.to_string(),
                value: total.to_string(),
                updated_at: updated_at.clone(),
            })
            .collect();

        match self.store.save_totals(&records) {
            Ok(written) => tracing::debug!(written, "energy totals persisted"),
            Err(error) => tracing::warn!(error = %error, "failed to persist energy totals"),
        }
    }
}

pub fn start_poller<C, Cl, S>(
    mut poller: Poller<C, Cl, S>,
    poll_interval: Duration,
    stop_flag: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<()>>
where
    C: KotiakkuClient,
    Cl: Clock + Send + 'static,
    S: EnergyStore + Send + 'static,
{
    std::thread::Builder::new()
        .name("kotiakku-poller".to_string())
        .spawn(move || {
            while sleep_unless_stopped(poll_interval, &stop_flag) {
                poller.tick();
            }
        })
}

fn sleep_unless_stopped(duration: Duration, stop_flag: &AtomicBool) -> bool {
    let mut remaining = duration;
    while !remaining.is_zero() {
        if stop_flag.load(Ordering::Relaxed) {
            return false;
        }
        let slice = remaining.min(STOP_CHECK_INTERVAL);
        std::thread::sleep(slice);
        remaining -= slice;
    }
    !stop_flag.load(Ordering::Relaxed)
}

struct Setup {
    store: SqliteEnergyStore,
    sensors: SensorSet,
    published: SharedState,
    entry: Value,
}

fn setup(config: &AppConfig) -> Result<Setup, AppError> {
    let mut connection =
        crate::adapters::db::open_connection(&config.db_path).map_err(AppError::database_init)?;
    crate::adapters::db::run_migrations(&mut connection).map_err(AppError::database_init)?;

    let store = SqliteEnergyStore::new(Arc::new(Mutex::new(connection)));
    let entry_id = store.entry_id().map_err(AppError::database_init)?;
    let restored = store.load_totals().map_err(AppError::database_init)?;

    tracing::info!(
        entry_id = %entry_id,
        restored_totals = restored.len(),
        "energy totals restored"
    );

    let sensors = SensorSet::new(
        SENSOR_CATALOG,
        &entry_id,
        &config.name,
        config.power_unit,
        &restored,
    );
    let entry = config.entry_json(&entry_id);
    let published = Arc::new(RwLock::new(PublishedState {
        device: DeviceInfo::new(&entry_id, &config.name),
        sensors: Vec::new(),
        diagnostics: DiagnosticsReport {
            entry: redact(&entry),
            data: None,
            last_update_success: false,
            last_success_at: None,
            last_error: None,
        },
    }));

    Ok(Setup {
        store,
        sensors,
        published,
        entry,
    })
}

fn spawn_for_client<C: KotiakkuClient>(
    client: C,
    config: &AppConfig,
    setup: Setup,
    stop_flag: Arc<AtomicBool>,
) -> Result<JoinHandle<()>, AppError> {
    let mut poller = Poller::new(
        Coordinator::new(client, SystemClock),
        setup.sensors,
        setup.store,
        setup.published,
        setup.entry,
    );
    poller.first_refresh()?;

    start_poller(
        poller,
        Duration::from_secs(config.scan_interval_seconds),
        stop_flag,
    )
    .map_err(AppError::runtime)
}

fn spawn_poller(
    config: &AppConfig,
    setup: Setup,
    stop_flag: Arc<AtomicBool>,
) -> Result<JoinHandle<()>, AppError> {
    match &config.replay_file {
        Some(path) => {
            tracing::info!(path = %path, "replaying scripted status payloads");
            let client = KotiakkuReplayClient::from_file(path).map_err(AppError::runtime)?;
            spawn_for_client(client, config, setup, stop_flag)
        }
        None => {
            let client =
                KotiakkuHttpClient::new(&config.url, &config.api_key).map_err(AppError::runtime)?;
            spawn_for_client(client, config, setup, stop_flag)
        }
    }
}

fn join_poller(handle: JoinHandle<()>) -> Result<(), AppError> {
    handle
        .join()
        .map_err(|_| AppError::runtime("poller thread panicked"))
}

/// Polls and serves the HTTP API until the server stops.
pub fn run(config: AppConfig) -> Result<(), AppError> {
    let setup = setup(&config)?;
    let api_state = ApiState {
        published: Arc::clone(&setup.published),
    };

    let stop_flag = Arc::new(AtomicBool::new(false));
    let poller_handle = spawn_poller(&config, setup, Arc::clone(&stop_flag))?;

    tracing::info!(bind = %config.http_bind, "http server starting");

    let server_result = actix_web::rt::System::new().block_on(async move {
        HttpServer::new(move || {
            App::new()
                .wrap(Cors::permissive())
                .app_data(web::Data::new(api_state.clone()))
                .configure(configure_routes)
        })
        .bind(&config.http_bind)?
        .run()
        .await
    });

    stop_flag.store(true, Ordering::Relaxed);
    join_poller(poller_handle)?;

    server_result.map_err(AppError::runtime)
}

/// Polls and persists energy totals without serving HTTP.
pub fn run_headless(config: AppConfig) -> Result<(), AppError> {
    let setup = setup(&config)?;
    let stop_flag = Arc::new(AtomicBool::new(false));
    let poller_handle = spawn_poller(&config, setup, stop_flag)?;

    tracing::info!("headless poller running");
    join_poller(poller_handle)
}

fn to_iso8601(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}
