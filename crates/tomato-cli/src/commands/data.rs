use std::path::PathBuf;

use clap::Subcommand;
use tomato_core::AppConfig;

use super::{open_coordinator, print_json, CommandResult};

#[derive(Subcommand)]
pub enum DataAction {
    /// Write settings, history and timer as one JSON document
    Export {
        /// Output file; stdout when omitted
        file: Option<PathBuf>,
    },
    /// Replace data with the parts present in an exported document
    Import {
        file: PathBuf,
    },
    /// Delete all stored data
    Clear,
}

pub async fn run(action: DataAction, config: &AppConfig) -> CommandResult {
    let coordinator = open_coordinator(config).await?;

    match action {
        DataAction::Export { file } => {
            let bundle = coordinator.export_data().await?;
            match file {
                Some(path) => {
                    std::fs::write(&path, serde_json::to_string_pretty(&bundle)?)?;
                    eprintln!("exported {} sessions to {}", bundle.sessions.len(), path.display());
                }
                None => print_json(&bundle)?,
            }
        }
        DataAction::Import { file } => {
            let raw = std::fs::read_to_string(&file)?;
            let value: serde_json::Value = serde_json::from_str(&raw)?;
            let imported = coordinator.import_data(&value).await?;
            println!(
                "imported settings: {}, sessions: {}, timer: {}",
                imported.settings.is_some(),
                imported.sessions.as_ref().map_or(0, Vec::len),
                imported.timer.is_some()
            );
        }
        DataAction::Clear => {
            coordinator.clear_data().await?;
            println!("all data cleared");
        }
    }
    Ok(())
}
