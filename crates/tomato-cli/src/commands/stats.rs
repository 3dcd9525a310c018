use clap::Subcommand;
use tomato_core::AppConfig;

use super::{open_coordinator, print_json, CommandResult};

#[derive(Subcommand)]
pub enum StatsAction {
    /// Today, week, month, all-time totals and streaks
    Summary,
    /// Completed session history
    Sessions {
        /// Only the most recent N sessions
        #[arg(long)]
        limit: Option<usize>,
    },
}

pub async fn run(action: StatsAction, config: &AppConfig) -> CommandResult {
    let coordinator = open_coordinator(config).await?;

    match action {
        StatsAction::Summary => {
            print_json(&coordinator.get_statistics())?;
        }
        StatsAction::Sessions { limit } => {
            let sessions = coordinator.sessions();
            let skip = limit.map_or(0, |n| sessions.len().saturating_sub(n));
            print_json(&sessions[skip..])?;
        }
    }
    Ok(())
}
