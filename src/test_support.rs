use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use rusqlite::Connection;

use crate::adapters::db::{open_connection, run_migrations};

static TEST_DB_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Opens a private copy of the migrated template database.
pub fn open_test_connection(test_name: &str) -> Connection {
    let template = template_db_path();
    let test_db_path = unique_test_db_path(test_name);

    if let Some(parent) = test_db_path.parent() {
        std::fs::create_dir_all(parent).expect("test db dir should be creatable");
    }

    std::fs::copy(template, &test_db_path).expect("template db should be copied");
    open_connection(test_db_path.to_string_lossy().as_ref()).expect("test db should open")
}

pub fn shared_test_connection(test_name: &str) -> Arc<Mutex<Connection>> {
    Arc::new(Mutex::new(open_test_connection(test_name)))
}

fn template_db_path() -> &'static Path {
    static TEMPLATE_PATH: OnceLock<PathBuf> = OnceLock::new();

    TEMPLATE_PATH.get_or_init(|| {
        let template_path = std::env::var("TEST_DB_TEMPLATE_PATH")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data/kotiakku_test.db"));

        if let Some(parent) = template_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).expect("template parent dir should be creatable");
        }

        let mut connection =
            open_connection(template_path.to_string_lossy().as_ref()).expect("template db opens");
        run_migrations(&mut connection).expect("template migrations should succeed");

        template_path
    })
}

fn unique_test_db_path(test_name: &str) -> PathBuf {
    let counter = TEST_DB_COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = tempfile::Builder::new()
        .prefix("kotiakku-testdb-")
        .tempdir()
        .expect("tempdir should be created");
    let path = dir
        .path()
        .join(format!("{test_name}-{}-{counter}.sqlite", std::process::id()));
    std::mem::forget(dir);
    path
}
