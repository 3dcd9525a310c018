use std::error::Error;
use std::sync::Arc;

use serde::Serialize;
use tomato_core::storage::data_dir;
use tomato_core::{AppConfig, SqliteStorage, TimerCoordinator};

use crate::notifier::DesktopNotifier;

pub mod config;
pub mod data;
pub mod settings;
pub mod stats;
pub mod timer;

pub type CommandResult = Result<(), Box<dyn Error>>;

/// Open the database named by `config` and load the stored state into a
/// fresh coordinator. Unreadable data is reported and replaced by defaults.
pub async fn open_coordinator(config: &AppConfig) -> Result<TimerCoordinator, Box<dyn Error>> {
    let db_path = config.database_path(&data_dir()?);
    let storage = SqliteStorage::open(&db_path)?;
    tracing::debug!(path = %db_path.display(), "database opened");

    let coordinator = TimerCoordinator::builder(
        Arc::new(storage),
        Arc::new(DesktopNotifier::new(&config.alerts)),
    )
    .tick_interval(config.tick_interval())
    .week_start(config.statistics.week_start)
    .build();

    if let Err(e) = coordinator.load_data().await {
        tracing::warn!(error = %e, "stored data unreadable; continuing with defaults");
    }
    Ok(coordinator)
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> CommandResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
