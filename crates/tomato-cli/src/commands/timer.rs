use clap::Subcommand;
use tokio::sync::broadcast::error::RecvError;
use tomato_core::{AppConfig, Event, IntervalKind, TimerCoordinator, TimerStatus};

use super::{open_coordinator, print_json, CommandResult};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Run an interval in the foreground until it completes.
    /// Without a kind, a paused timer is resumed.
    Run {
        /// pomodoro, short_break or long_break
        kind: Option<IntervalKind>,
    },
    /// Replace the current timer with a fresh idle one
    Create {
        /// pomodoro, short_break or long_break
        kind: IntervalKind,
    },
    /// Print current timer state as JSON
    Status,
    /// Restore the full duration of the current timer
    Reset,
    /// Discard the current timer
    Stop,
}

pub async fn run(action: TimerAction, config: &AppConfig) -> CommandResult {
    let coordinator = open_coordinator(config).await?;

    match action {
        TimerAction::Run { kind } => {
            run_foreground(&coordinator, kind, config.timer.default_kind).await?;
        }
        TimerAction::Create { kind } => {
            let timer = coordinator.create_timer(kind);
            print_json(&timer)?;
        }
        TimerAction::Status => {
            print_json(&coordinator.snapshot())?;
            return Ok(());
        }
        TimerAction::Reset => {
            if !coordinator.reset_timer() {
                return Err("no timer to reset".into());
            }
            print_json(&coordinator.snapshot())?;
        }
        TimerAction::Stop => {
            coordinator.stop_timer();
            println!("{{\"type\": \"timer_stopped\"}}");
        }
    }

    coordinator.save_data().await?;
    Ok(())
}

async fn run_foreground(
    coordinator: &TimerCoordinator,
    kind: Option<IntervalKind>,
    default_kind: IntervalKind,
) -> CommandResult {
    let resumable = kind.is_none()
        && coordinator
            .current_timer()
            .is_some_and(|t| t.status() == TimerStatus::Paused);
    if !resumable {
        coordinator.create_timer(kind.unwrap_or(default_kind));
    }

    let mut events = coordinator.subscribe();
    if !coordinator.start_timer() {
        return Err("timer could not be started".into());
    }
    if let Some(timer) = coordinator.current_timer() {
        eprintln!("{} started, {} left (Ctrl-C to pause)", timer.kind().label(), timer.formatted_remaining());
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let completed = loop {
        tokio::select! {
            received = events.recv() => match received {
                Ok(event @ Event::TimerCompleted { .. }) => break Some(event),
                Ok(Event::TimerTicked { .. }) => {
                    if let Some(timer) = coordinator.current_timer() {
                        eprint!("\r{}  ", timer.formatted_remaining());
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "event receiver lagged");
                }
                Err(RecvError::Closed) => break None,
            },
            _ = &mut ctrl_c => {
                coordinator.pause_timer();
                break None;
            }
        }
    };
    eprintln!();

    // Let the completion alert and its save finish before the process exits.
    coordinator.flush_pending().await;
    match completed {
        Some(event) => print_json(&event),
        None => print_json(&coordinator.snapshot()),
    }
}
