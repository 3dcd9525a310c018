//! Integration tests for the timer coordinator.
//!
//! Drives full work/break cycles against real storage backends and checks
//! what ends up persisted and what the statistics report.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tomato_core::{
    IntervalKind, LogNotifier, ManualClock, MemoryStorage, SettingsPatch, SqliteStorage, Storage,
    TimerCoordinator, TimerStatus, WeekStart,
};

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::at(NaiveDate::from_ymd_opt(2024, 5, 15).unwrap(), 9, 0))
}

fn coordinator(storage: Arc<dyn Storage>, clock: Arc<ManualClock>) -> TimerCoordinator {
    TimerCoordinator::builder(storage, Arc::new(LogNotifier))
        .clock(clock)
        .tick_interval(Duration::from_secs(3600))
        .week_start(WeekStart::Monday)
        .build()
}

fn run_to_completion(coordinator: &TimerCoordinator, clock: &ManualClock) {
    assert!(coordinator.start_timer());
    loop {
        clock.advance_secs(1);
        if coordinator.tick().is_some() {
            break;
        }
    }
}

#[tokio::test]
async fn test_one_second_pomodoro_records_exact_duration() {
    let clock = clock();
    let storage = Arc::new(MemoryStorage::new());
    let coordinator = coordinator(storage.clone(), clock.clone());
    coordinator.update_settings(&SettingsPatch::new().pomodoro_length(1));

    coordinator.create_timer(IntervalKind::Pomodoro);
    run_to_completion(&coordinator, &clock);
    coordinator.flush_pending().await;

    let sessions = coordinator.sessions();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].actual_duration(), Some(sessions[0].duration()));
    assert_eq!(sessions[0].duration(), 1);

    let stored = storage.load_all().await.unwrap();
    assert_eq!(stored.sessions, sessions);
    assert_eq!(
        stored.timer.map(|t| t.status()),
        Some(TimerStatus::Completed)
    );
}

#[tokio::test]
async fn test_full_cycle_statistics() {
    let clock = clock();
    let coordinator = coordinator(Arc::new(MemoryStorage::new()), clock.clone());
    coordinator.update_settings(
        &SettingsPatch::new()
            .pomodoro_length(3)
            .short_break_length(2)
            .long_break_length(4),
    );

    // Two days of work: two pomodoros with a break each day.
    for _ in 0..2 {
        for kind in [
            IntervalKind::Pomodoro,
            IntervalKind::ShortBreak,
            IntervalKind::Pomodoro,
            IntervalKind::LongBreak,
        ] {
            coordinator.create_timer(kind);
            run_to_completion(&coordinator, &clock);
        }
        clock.advance_days(1);
    }
    coordinator.flush_pending().await;

    let sessions = coordinator.sessions();
    assert_eq!(sessions.len(), 4);
    assert!(sessions.iter().all(|s| s.kind() == IntervalKind::Pomodoro));

    // The clock now sits on the third day, which has no sessions yet.
    let stats = coordinator.get_statistics();
    assert_eq!(stats.today.count, 0);
    assert_eq!(stats.streak, 0);
    assert_eq!(stats.best_streak, 2);
    assert_eq!(stats.total.count, 4);
    assert_eq!(stats.total.total_time, 12);
    assert_eq!(stats.total.average_time, 3.0);
}

#[tokio::test]
async fn test_restart_with_sqlite_restores_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tomato.db");
    let clock = clock();

    {
        let storage = Arc::new(SqliteStorage::open(&path).unwrap());
        let coordinator = coordinator(storage, clock.clone());
        coordinator.update_settings(&SettingsPatch::new().pomodoro_length(2).language("en"));
        coordinator.create_timer(IntervalKind::Pomodoro);
        run_to_completion(&coordinator, &clock);

        coordinator.create_timer(IntervalKind::Pomodoro);
        coordinator.start_timer();
        clock.advance_secs(1);
        coordinator.tick();
        coordinator.flush_pending().await;
        coordinator.save_data().await.unwrap();
    }

    let storage = Arc::new(SqliteStorage::open(&path).unwrap());
    let coordinator = coordinator(storage, clock.clone());
    coordinator.load_data().await.unwrap();

    assert_eq!(coordinator.settings().pomodoro_length(), 2);
    assert_eq!(coordinator.settings().language(), "en");
    assert_eq!(coordinator.sessions().len(), 1);
    let timer = coordinator.current_timer().unwrap();
    assert_eq!(timer.status(), TimerStatus::Paused);
    assert_eq!(timer.remaining(), 1);

    assert!(coordinator.resume_timer());
    clock.advance_secs(1);
    assert!(coordinator.tick().is_some());
    assert_eq!(coordinator.sessions().len(), 2);
}

#[tokio::test]
async fn test_export_bundle_moves_between_stores() {
    let clock = clock();
    let source = coordinator(Arc::new(MemoryStorage::new()), clock.clone());
    source.update_settings(&SettingsPatch::new().pomodoro_length(1));
    source.create_timer(IntervalKind::Pomodoro);
    run_to_completion(&source, &clock);
    let bundle = source.export_data().await.unwrap();
    let json = serde_json::to_string(&bundle).unwrap();

    let target_storage = Arc::new(MemoryStorage::new());
    let target = coordinator(target_storage.clone(), clock.clone());
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    target.import_data(&value).await.unwrap();

    assert_eq!(target.sessions(), source.sessions());
    assert_eq!(target.settings(), source.settings());
    assert_eq!(target_storage.load_all().await.unwrap().sessions.len(), 1);
}

#[tokio::test]
async fn test_events_follow_a_cycle() {
    let clock = clock();
    let coordinator = coordinator(Arc::new(MemoryStorage::new()), clock.clone());
    coordinator.update_settings(&SettingsPatch::new().short_break_length(2));
    let mut events = coordinator.subscribe();

    coordinator.create_timer(IntervalKind::ShortBreak);
    run_to_completion(&coordinator, &clock);
    coordinator.flush_pending().await;

    let mut names = Vec::new();
    while let Ok(event) = events.try_recv() {
        names.push(event.name());
    }
    assert_eq!(
        names,
        vec![
            "timer_created",
            "timer_started",
            "timer_ticked",
            "timer_completed",
            "data_saved"
        ]
    );
}

#[tokio::test]
async fn test_imported_zero_length_timer_still_completes() {
    let clock = clock();
    let coordinator = coordinator(Arc::new(MemoryStorage::new()), clock.clone());
    coordinator
        .import_data(&serde_json::json!({
            "version": 1,
            "timer": {"type": "pomodoro", "duration": 0, "status": "idle"}
        }))
        .await
        .unwrap();

    let timer = coordinator.current_timer().unwrap();
    assert_eq!(timer.duration(), 1500);
    assert_eq!(timer.remaining(), 1500);

    assert!(coordinator.start_timer());
    let mut completed = false;
    for _ in 0..1500 {
        clock.advance_secs(1);
        if coordinator.tick().is_some() {
            completed = true;
            break;
        }
    }
    assert!(completed);
    assert_eq!(coordinator.current_timer().unwrap().status(), TimerStatus::Completed);
    assert!(!coordinator.is_ticking());
    coordinator.flush_pending().await;
}
