use clap::Subcommand;
use serde_json::{Map, Value};
use tomato_core::{AppConfig, SettingsPatch};

use super::{open_coordinator, print_json, CommandResult};

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Print current settings as JSON
    Show,
    /// Change one setting
    Set {
        /// Setting key (e.g. "pomodoroLength", "notifications.sound")
        key: String,
        /// New value; parsed as JSON, otherwise taken as a string
        value: String,
    },
    /// Restore default settings
    Reset,
}

pub async fn run(action: SettingsAction, config: &AppConfig) -> CommandResult {
    let coordinator = open_coordinator(config).await?;

    match action {
        SettingsAction::Show => {
            print_json(&coordinator.settings())?;
        }
        SettingsAction::Set { key, value } => {
            let patch = SettingsPatch::from_json(&patch_document(&key, &value));
            let report = coordinator.update_settings(&patch);
            coordinator.flush_pending().await;

            if let Some((field, err)) = report.rejected().next() {
                return Err(format!("{field}: {err}").into());
            }
            if let Some(field) = report.ignored().next() {
                return Err(format!("unknown setting: {field}").into());
            }
            print_json(&coordinator.settings())?;
        }
        SettingsAction::Reset => {
            coordinator.reset_settings();
            coordinator.flush_pending().await;
            println!("settings reset to defaults");
        }
    }
    Ok(())
}

/// Nest `value` under the dot-separated `key`: `a.b=1` becomes `{"a":{"b":1}}`.
fn patch_document(key: &str, value: &str) -> Value {
    let leaf = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    key.rsplit('.').fold(leaf, |inner, part| {
        let mut obj = Map::new();
        obj.insert(part.to_string(), inner);
        Value::Object(obj)
    })
}
