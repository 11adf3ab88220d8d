use std::path::Path;

use chrono::{SecondsFormat, Utc};
use kotiakku_home_api::adapters::db::{
    get_or_create_entry_id, load_energy_totals, open_connection, run_migrations, schema_version,
    upsert_energy_totals,
};
use kotiakku_home_api::domain::models::EnergyTotalRecord;

const DEFAULT_PATH: &str = "./data/kotiakku_test.db";

fn main() {
    if let Err(error) = run() {
        eprintln!("failed to create test db: {error}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let mut path = DEFAULT_PATH.to_string();
    let mut force = false;
    let mut seeds = Vec::new();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--path" => {
                let Some(value) = args.get(index + 1) else {
                    return Err("--path requires a value".to_string());
                };
                path = value.clone();
                index += 2;
            }
            "--seed" => {
                let Some(value) = args.get(index + 1) else {
                    return Err("--seed requires a value".to_string());
                };
                seeds.push(parse_seed(value)?);
                index += 2;
            }
            "--force" => {
                force = true;
                index += 1;
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            other => {
                return Err(format!("unknown argument: {other}"));
            }
        }
    }

    let path_ref = Path::new(&path);
    if let Some(parent) = path_ref.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .map_err(|error| format!("failed to create parent directory: {error}"))?;
    }

    if force && path_ref.exists() {
        std::fs::remove_file(path_ref)
            .map_err(|error| format!("failed to remove existing db file: {error}"))?;
    }

    let mut connection = open_connection(&path).map_err(|error| error.to_string())?;
    run_migrations(&mut connection).map_err(|error| error.to_string())?;
    let entry_id = get_or_create_entry_id(&connection).map_err(|error| error.to_string())?;

    if !seeds.is_empty() {
        upsert_energy_totals(&mut connection, &seeds).map_err(|error| error.to_string())?;
    }

    let version = schema_version(&connection).map_err(|error| error.to_string())?;
    let totals = load_energy_totals(&connection).map_err(|error| error.to_string())?;

    println!("created/updated test db at: {path}");
    println!("schema version: {version}");
    println!("entry id: {entry_id}");
    println!("stored energy totals: {}", totals.len());
    Ok(())
}

/// `key=value`; the value is stored verbatim so corrupt totals can be seeded.
fn parse_seed(raw: &str) -> Result<EnergyTotalRecord, String> {
    let Some((key, value)) = raw.split_once('=') else {
        return Err(format!("--seed expects key=value, got {raw:?}"));
    };

    Ok(EnergyTotalRecord {
        sensor_key: key.trim().to_string(),
        value: value.trim().to_string(),
        updated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

fn print_help() {
    println!("create_test_db");
    println!();
    println!("Usage:");
    println!("  cargo run --bin create_test_db -- [--path <file>] [--seed <key=value>]... [--force]");
    println!();
    println!("Options:");
    println!("  --path <file>        target sqlite file (default: {DEFAULT_PATH})");
    println!("  --seed <key=value>   store a raw energy total for a sensor key");
    println!("  --force              delete existing file before creating");
}
