//! The timer coordinator: single owner of the current timer, settings and
//! session history.
//!
//! Every UI intent goes through [`TimerCoordinator`]. It mutates the
//! entities, drives the once-per-period tick, runs the completion pipeline
//! (record session, alert, persist) and broadcasts an [`Event`] for each
//! state change so hosts can re-read state without polling.
//!
//! State lives behind one mutex. The tick driver is a tokio task tagged with
//! a generation number; arming a new driver or disarming bumps the number,
//! and a driver that wakes up with a stale number leaves without touching
//! anything.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use crate::clock::{to_utc, Clock, SystemClock};
use crate::error::{Result, StorageError};
use crate::events::Event;
use crate::notify::{EnglishText, Notifier, TextLookup};
use crate::session::SessionRecord;
use crate::settings::{NotificationPrefs, Settings, SettingsPatch, SettingsUpdateReport};
use crate::stats::{Statistics, StatisticsEngine, WeekStart};
use crate::storage::{ExportBundle, ImportBundle, PersistedState, Storage};
use crate::timer::{IntervalKind, Timer, TimerStatus};

const EVENT_CAPACITY: usize = 64;
const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Default)]
struct CoordinatorState {
    timer: Option<Timer>,
    settings: Settings,
    sessions: Vec<SessionRecord>,
    is_loading: bool,
    error: Option<String>,
    driver: Option<JoinHandle<()>>,
    generation: u64,
}

struct Shared {
    state: Mutex<CoordinatorState>,
    storage: Arc<dyn Storage>,
    notifier: Arc<dyn Notifier>,
    text: Arc<dyn TextLookup>,
    clock: Arc<dyn Clock>,
    stats: StatisticsEngine,
    tick_interval: Duration,
    events: broadcast::Sender<Event>,
    pending: Mutex<Vec<JoinHandle<()>>>,
    persist_lock: tokio::sync::Mutex<()>,
}

/// Outcome of one driver step.
enum Step {
    Ticked,
    Completed(Event),
    Idle,
}

/// Handle to the coordinator. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct TimerCoordinator {
    shared: Arc<Shared>,
}

pub struct TimerCoordinatorBuilder {
    storage: Arc<dyn Storage>,
    notifier: Arc<dyn Notifier>,
    text: Arc<dyn TextLookup>,
    clock: Arc<dyn Clock>,
    tick_interval: Duration,
    week_start: WeekStart,
}

impl TimerCoordinatorBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn text(mut self, text: Arc<dyn TextLookup>) -> Self {
        self.text = text;
        self
    }

    /// Driver period. Each period removes one second from the timer, so
    /// anything but one second only makes sense for demos and tests.
    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn week_start(mut self, week_start: WeekStart) -> Self {
        self.week_start = week_start;
        self
    }

    pub fn build(self) -> TimerCoordinator {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        TimerCoordinator {
            shared: Arc::new(Shared {
                state: Mutex::new(CoordinatorState::default()),
                storage: self.storage,
                notifier: self.notifier,
                text: self.text,
                clock: self.clock,
                stats: StatisticsEngine::new(self.week_start),
                tick_interval: self.tick_interval,
                events,
                pending: Mutex::new(Vec::new()),
                persist_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }
}

impl TimerCoordinator {
    pub fn new(storage: Arc<dyn Storage>, notifier: Arc<dyn Notifier>) -> Self {
        Self::builder(storage, notifier).build()
    }

    pub fn builder(storage: Arc<dyn Storage>, notifier: Arc<dyn Notifier>) -> TimerCoordinatorBuilder {
        TimerCoordinatorBuilder {
            storage,
            notifier,
            text: Arc::new(EnglishText),
            clock: Arc::new(SystemClock),
            tick_interval: DEFAULT_TICK_INTERVAL,
            week_start: WeekStart::default(),
        }
    }

    // ── Timer intents ───────────────────────────────────────────────

    /// Replace the current timer with a fresh idle one sized from settings.
    pub fn create_timer(&self, kind: IntervalKind) -> Timer {
        let mut state = self.shared.lock_state();
        self.shared.disarm(&mut state);
        let timer = Timer::new(kind, state.settings.duration_for(kind));
        tracing::debug!(timer_id = timer.id(), kind = %kind, duration = timer.duration(), "timer created");
        self.shared.emit(Event::TimerCreated {
            timer_id: timer.id().to_string(),
            kind,
            duration_secs: timer.duration(),
            at: to_utc(self.shared.clock.now_ms()),
        });
        state.timer = Some(timer.clone());
        timer
    }

    /// Start (or resume) the current timer and arm the driver. `false` when
    /// there is no timer or it is running or completed.
    pub fn start_timer(&self) -> bool {
        self.run_transition(Timer::start_at)
    }

    /// Same transition as [`start_timer`](Self::start_timer).
    pub fn resume_timer(&self) -> bool {
        self.run_transition(Timer::start_at)
    }

    pub fn pause_timer(&self) -> bool {
        self.stop_transition(Timer::pause_at)
    }

    pub fn reset_timer(&self) -> bool {
        self.stop_transition(Timer::reset_at)
    }

    /// Discard the current timer. Always succeeds.
    pub fn stop_timer(&self) -> bool {
        let mut state = self.shared.lock_state();
        self.shared.disarm(&mut state);
        if let Some(timer) = state.timer.take() {
            tracing::debug!(timer_id = timer.id(), "timer stopped");
            self.shared.emit(Event::TimerStopped {
                timer_id: Some(timer.id().to_string()),
                at: to_utc(self.shared.clock.now_ms()),
            });
        }
        true
    }

    /// Advance the running timer by one second, as the driver does. Returns
    /// the completion event when this tick finished the timer.
    pub fn tick(&self) -> Option<Event> {
        match self.shared.step(None) {
            Step::Completed(event) => Some(event),
            Step::Ticked | Step::Idle => None,
        }
    }

    fn run_transition(&self, transition: fn(&mut Timer, u64) -> Option<Event>) -> bool {
        let mut state = self.shared.lock_state();
        let now = self.shared.clock.now_ms();
        let Some(event) = state.timer.as_mut().and_then(|t| transition(t, now)) else {
            return false;
        };
        tracing::debug!(event = event.name(), "timer transition");
        self.shared.emit(event);
        Shared::arm(&self.shared, &mut state);
        true
    }

    fn stop_transition(&self, transition: fn(&mut Timer, u64) -> Option<Event>) -> bool {
        let mut state = self.shared.lock_state();
        let now = self.shared.clock.now_ms();
        let Some(event) = state.timer.as_mut().and_then(|t| transition(t, now)) else {
            return false;
        };
        self.shared.disarm(&mut state);
        tracing::debug!(event = event.name(), "timer transition");
        self.shared.emit(event);
        true
    }

    // ── Settings and sessions ───────────────────────────────────────

    /// Apply each valid field of `patch`. When anything changed the
    /// settings are saved in the background.
    pub fn update_settings(&self, patch: &SettingsPatch) -> SettingsUpdateReport {
        let report = {
            let mut state = self.shared.lock_state();
            state.settings.apply(patch)
        };
        for (field, err) in report.rejected() {
            tracing::debug!(field, error = %err, "settings field rejected");
        }
        if report.any_applied() {
            self.shared.emit(Event::SettingsUpdated {
                at: to_utc(self.shared.clock.now_ms()),
            });
            Shared::persist_in_background(&self.shared, "settings update");
        }
        report
    }

    /// Restore default settings and save them in the background.
    pub fn reset_settings(&self) {
        self.shared.lock_state().settings.reset();
        self.shared.emit(Event::SettingsUpdated {
            at: to_utc(self.shared.clock.now_ms()),
        });
        Shared::persist_in_background(&self.shared, "settings reset");
    }

    /// Append a record to the history. Records are never modified here.
    pub fn add_session(&self, record: SessionRecord) {
        let event = Event::SessionRecorded {
            session_id: record.id().to_string(),
            kind: record.kind(),
            actual_duration_secs: record.actual_duration(),
            at: to_utc(self.shared.clock.now_ms()),
        };
        self.shared.lock_state().sessions.push(record);
        self.shared.emit(event);
    }

    pub fn get_statistics(&self) -> Statistics {
        let today = self.shared.clock.today();
        let state = self.shared.lock_state();
        self.shared.stats.compute(&state.sessions, today)
    }

    // ── Persistence ─────────────────────────────────────────────────

    /// Replace in-memory state with the stored state.
    ///
    /// A timer stored as running comes back paused since no driver survived
    /// the restart. On a storage fault, defaults are used, the error slot is
    /// set and the error is returned.
    pub async fn load_data(&self) -> Result<()> {
        {
            let mut state = self.shared.lock_state();
            state.is_loading = true;
            state.error = None;
        }
        let loaded = self.shared.storage.load_all().await;
        let now = self.shared.clock.now_ms();

        let mut state = self.shared.lock_state();
        self.shared.disarm(&mut state);
        state.is_loading = false;
        match loaded {
            Ok(PersistedState {
                settings,
                sessions,
                mut timer,
            }) => {
                if let Some(timer) = timer.as_mut() {
                    if timer.pause_at(now).is_some() {
                        tracing::info!(timer_id = timer.id(), "restored running timer as paused");
                    }
                }
                let has_timer = timer.is_some();
                let count = sessions.len();
                state.settings = settings;
                state.sessions = sessions;
                state.timer = timer;
                tracing::debug!(sessions = count, has_timer, "data loaded");
                self.shared.emit(Event::DataLoaded {
                    sessions: count,
                    has_timer,
                    at: to_utc(now),
                });
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to load data; using defaults");
                state.settings = Settings::default();
                state.sessions.clear();
                state.timer = None;
                self.shared.record_error(&mut state, e.to_string());
                Err(e.into())
            }
        }
    }

    /// Write settings, sessions and timer. Failures go to the error slot
    /// and are returned.
    pub async fn save_data(&self) -> Result<()> {
        match self.shared.persist().await {
            Ok(()) => {
                self.shared.emit(Event::DataSaved {
                    at: to_utc(self.shared.clock.now_ms()),
                });
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to save data");
                let mut state = self.shared.lock_state();
                self.shared.record_error(&mut state, e.to_string());
                Err(e.into())
            }
        }
    }

    /// Snapshot of everything for an export file. Outstanding completion
    /// side effects are awaited first.
    pub async fn export_data(&self) -> Result<ExportBundle> {
        self.flush_pending().await;
        let state = self.shared.lock_state();
        Ok(ExportBundle::new(
            state.settings.clone(),
            state.sessions.clone(),
            state.timer.clone(),
            to_utc(self.shared.clock.now_ms()),
        ))
    }

    /// Replace the parts present in `bundle` and save. Absent parts are
    /// kept. An imported running timer is paused.
    pub async fn import_data(&self, bundle: &Value) -> Result<ImportBundle> {
        let parsed = match ImportBundle::parse(bundle) {
            Ok(parsed) => parsed,
            Err(e) => {
                let mut state = self.shared.lock_state();
                self.shared.record_error(&mut state, e.to_string());
                return Err(e.into());
            }
        };

        {
            let now = self.shared.clock.now_ms();
            let mut state = self.shared.lock_state();
            if let Some(settings) = &parsed.settings {
                state.settings = settings.clone();
            }
            if let Some(sessions) = &parsed.sessions {
                state.sessions = sessions.clone();
            }
            if let Some(timer) = &parsed.timer {
                self.shared.disarm(&mut state);
                let mut timer = timer.clone();
                timer.pause_at(now);
                state.timer = Some(timer);
            }
            tracing::info!(
                settings = parsed.settings.is_some(),
                sessions = ?parsed.sessions.as_ref().map(Vec::len),
                timer = parsed.timer.is_some(),
                "imported data"
            );
            self.shared.emit(Event::DataLoaded {
                sessions: state.sessions.len(),
                has_timer: state.timer.is_some(),
                at: to_utc(now),
            });
        }

        self.save_data().await?;
        Ok(parsed)
    }

    /// Erase stored data and return to defaults.
    pub async fn clear_data(&self) -> Result<()> {
        {
            let mut state = self.shared.lock_state();
            self.shared.disarm(&mut state);
        }
        self.flush_pending().await;

        let _guard = self.shared.persist_lock.lock().await;
        if let Err(e) = self.shared.storage.clear_all().await {
            tracing::error!(error = %e, "failed to clear data");
            let mut state = self.shared.lock_state();
            self.shared.record_error(&mut state, e.to_string());
            return Err(e.into());
        }

        let mut state = self.shared.lock_state();
        state.settings = Settings::default();
        state.sessions.clear();
        state.timer = None;
        state.error = None;
        self.shared.emit(Event::DataCleared {
            at: to_utc(self.shared.clock.now_ms()),
        });
        Ok(())
    }

    /// Wait for completion alerts and background saves spawned so far.
    pub async fn flush_pending(&self) {
        let handles: Vec<_> = {
            let mut pending = self
                .shared
                .pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            pending.drain(..).collect()
        };
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "background task ended abnormally");
            }
        }
    }

    // ── Error slot ──────────────────────────────────────────────────

    pub fn set_error(&self, message: impl Into<String>) {
        let mut state = self.shared.lock_state();
        self.shared.record_error(&mut state, message.into());
    }

    pub fn clear_error(&self) {
        let mut state = self.shared.lock_state();
        if state.error.take().is_some() {
            self.shared.emit(Event::ErrorChanged {
                message: None,
                at: to_utc(self.shared.clock.now_ms()),
            });
        }
    }

    // ── Snapshots ───────────────────────────────────────────────────

    pub fn current_timer(&self) -> Option<Timer> {
        self.shared.lock_state().timer.clone()
    }

    pub fn settings(&self) -> Settings {
        self.shared.lock_state().settings.clone()
    }

    pub fn sessions(&self) -> Vec<SessionRecord> {
        self.shared.lock_state().sessions.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.shared.lock_state().is_loading
    }

    pub fn error(&self) -> Option<String> {
        self.shared.lock_state().error.clone()
    }

    /// Whether a tick driver is currently armed.
    pub fn is_ticking(&self) -> bool {
        Shared::driver_alive(&self.shared.lock_state())
    }

    /// Everything a timer screen renders, as one event.
    pub fn snapshot(&self) -> Event {
        let state = self.shared.lock_state();
        let timer = state.timer.as_ref();
        Event::StateSnapshot {
            timer_id: timer.map(|t| t.id().to_string()),
            status: timer.map(Timer::status),
            kind: timer.map(Timer::kind),
            remaining_secs: timer.map_or(0, Timer::remaining),
            duration_secs: timer.map_or(0, Timer::duration),
            progress_pct: timer.map_or(0.0, Timer::progress),
            ticking: Shared::driver_alive(&state),
            is_loading: state.is_loading,
            error: state.error.clone(),
            at: to_utc(self.shared.clock.now_ms()),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.shared.events.subscribe()
    }
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: Event) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn record_error(&self, state: &mut CoordinatorState, message: String) {
        state.error = Some(message.clone());
        self.emit(Event::ErrorChanged {
            message: Some(message),
            at: to_utc(self.clock.now_ms()),
        });
    }

    fn driver_alive(state: &CoordinatorState) -> bool {
        state.driver.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Replace any driver with a fresh one for the running timer.
    fn arm(this: &Arc<Self>, state: &mut CoordinatorState) {
        this.disarm(state);
        let generation = state.generation;
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("no async runtime; timer must be driven with tick()");
            return;
        };

        let weak: Weak<Shared> = Arc::downgrade(this);
        let period = this.tick_interval;
        state.driver = Some(runtime.spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            loop {
                interval.tick().await;
                let Some(shared) = weak.upgrade() else {
                    break;
                };
                match shared.step(Some(generation)) {
                    Step::Ticked => {}
                    Step::Completed(_) | Step::Idle => break,
                }
            }
        }));
        tracing::debug!(generation, "tick driver armed");
    }

    /// Abort the driver and invalidate its generation.
    fn disarm(&self, state: &mut CoordinatorState) {
        state.generation = state.generation.wrapping_add(1);
        if let Some(handle) = state.driver.take() {
            handle.abort();
        }
    }

    /// One tick. `generation` is `Some` for driver calls, which are ignored
    /// unless they belong to the current driver.
    fn step(self: &Arc<Self>, generation: Option<u64>) -> Step {
        let mut state = self.lock_state();
        if generation.is_some_and(|g| g != state.generation) {
            return Step::Idle;
        }
        let now = self.clock.now_ms();
        let Some(timer) = state.timer.as_mut() else {
            return Step::Idle;
        };
        if timer.status() != TimerStatus::Running {
            return Step::Idle;
        }

        let Some(completed) = timer.tick_at(now) else {
            let event = Event::TimerTicked {
                timer_id: timer.id().to_string(),
                remaining_secs: timer.remaining(),
                at: to_utc(now),
            };
            self.emit(event);
            return Step::Ticked;
        };

        let kind = timer.kind();
        let duration = timer.duration();
        let started = timer.start_time().unwrap_or(now);
        tracing::info!(timer_id = timer.id(), kind = %kind, "timer completed");
        self.emit(completed.clone());

        if kind.records_session() {
            let record = SessionRecord::new(kind, duration, started, self.clock.local_date(now))
                .completed_at(now);
            self.emit(Event::SessionRecorded {
                session_id: record.id().to_string(),
                kind,
                actual_duration_secs: record.actual_duration(),
                at: to_utc(now),
            });
            state.sessions.push(record);
        }

        self.disarm(&mut state);
        let prefs = state.settings.notifications();
        drop(state);

        self.after_completion(kind, prefs);
        Step::Completed(completed)
    }

    /// Alert, then save. Both run in the background and only log failures.
    fn after_completion(self: &Arc<Self>, kind: IntervalKind, prefs: NotificationPrefs) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(kind = %kind, "no async runtime; skipping completion alert and save");
            return;
        };
        let shared = Arc::clone(self);
        let handle = runtime.spawn(async move {
            let alert = shared
                .notifier
                .show_complete_notification(kind, prefs, shared.text.as_ref())
                .await;
            if alert.is_none() {
                tracing::debug!(kind = %kind, "no completion alert shown");
            }
            match shared.persist().await {
                Ok(()) => shared.emit(Event::DataSaved {
                    at: to_utc(shared.clock.now_ms()),
                }),
                Err(e) => tracing::warn!(error = %e, "failed to save after completion"),
            }
        });
        self.track(handle);
    }

    fn persist_in_background(this: &Arc<Self>, reason: &'static str) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!(reason, "no async runtime; change kept in memory until save_data");
            return;
        };
        let shared = Arc::clone(this);
        let handle = runtime.spawn(async move {
            if let Err(e) = shared.persist().await {
                tracing::warn!(reason, error = %e, "background save failed");
            }
        });
        this.track(handle);
    }

    fn track(&self, handle: JoinHandle<()>) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }

    /// Save the state as it is when the write starts. Writes are serialized
    /// so a slow older save never lands after a newer one.
    async fn persist(&self) -> Result<(), StorageError> {
        let _guard = self.persist_lock.lock().await;
        let (settings, sessions, timer) = {
            let state = self.lock_state();
            (
                state.settings.clone(),
                state.sessions.clone(),
                state.timer.clone(),
            )
        };
        self.storage
            .save_all(&settings, &sessions, timer.as_ref())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::{CoreError, NotifyError};
    use crate::notify::Alert;
    use crate::storage::MemoryStorage;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingNotifier {
        shown: AtomicUsize,
        fail: AtomicBool,
    }

    #[async_trait]
    impl Notifier for CountingNotifier {
        async fn deliver(&self, _alert: &Alert) -> Result<Option<String>, NotifyError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(NotifyError::Unavailable);
            }
            self.shown.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }
    }

    /// Memory storage whose writes can be switched off.
    #[derive(Default)]
    struct FlakyStorage {
        inner: MemoryStorage,
        fail: AtomicBool,
        saves: AtomicUsize,
    }

    #[async_trait]
    impl Storage for FlakyStorage {
        async fn load_all(&self) -> Result<PersistedState, StorageError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(StorageError::Unavailable("disk gone".into()));
            }
            self.inner.load_all().await
        }

        async fn save_all(
            &self,
            settings: &Settings,
            sessions: &[SessionRecord],
            timer: Option<&Timer>,
        ) -> Result<(), StorageError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(StorageError::Unavailable("disk gone".into()));
            }
            self.saves.fetch_add(1, Ordering::SeqCst);
            self.inner.save_all(settings, sessions, timer).await
        }

        async fn clear_all(&self) -> Result<(), StorageError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(StorageError::Unavailable("disk gone".into()));
            }
            self.inner.clear_all().await
        }
    }

    struct Fixture {
        coordinator: TimerCoordinator,
        storage: Arc<FlakyStorage>,
        notifier: Arc<CountingNotifier>,
        clock: Arc<ManualClock>,
    }

    fn fixture_with(interval: Duration) -> Fixture {
        let storage = Arc::new(FlakyStorage::default());
        let notifier = Arc::new(CountingNotifier::default());
        let clock = Arc::new(ManualClock::at(
            NaiveDate::from_ymd_opt(2024, 5, 15).unwrap(),
            9,
            0,
        ));
        let coordinator = TimerCoordinator::builder(storage.clone(), notifier.clone())
            .clock(clock.clone())
            .tick_interval(interval)
            .build();
        Fixture {
            coordinator,
            storage,
            notifier,
            clock,
        }
    }

    fn fixture() -> Fixture {
        // Long enough that the built-in driver never fires during a test
        // that drives ticks by hand.
        fixture_with(Duration::from_secs(3600))
    }

    fn with_pomodoro_length(f: &Fixture, secs: i64) {
        let report = f
            .coordinator
            .update_settings(&SettingsPatch::new().pomodoro_length(secs));
        assert!(report.is_clean());
    }

    #[test]
    fn create_uses_settings_duration() {
        let f = fixture();
        let timer = f.coordinator.create_timer(IntervalKind::ShortBreak);
        assert_eq!(timer.duration(), 300);
        assert_eq!(timer.status(), TimerStatus::Idle);
        assert_eq!(f.coordinator.current_timer(), Some(timer));
    }

    #[test]
    fn intents_without_timer_fail() {
        let f = fixture();
        assert!(!f.coordinator.start_timer());
        assert!(!f.coordinator.pause_timer());
        assert!(!f.coordinator.resume_timer());
        assert!(!f.coordinator.reset_timer());
        assert!(f.coordinator.stop_timer());
        assert!(f.coordinator.tick().is_none());
    }

    #[test]
    fn start_without_runtime_still_succeeds() {
        let f = fixture();
        f.coordinator.create_timer(IntervalKind::Pomodoro);
        assert!(f.coordinator.start_timer());
        assert!(!f.coordinator.is_ticking());
        assert!(!f.coordinator.start_timer());

        f.clock.advance_secs(1);
        assert!(f.coordinator.tick().is_none());
        assert_eq!(f.coordinator.current_timer().unwrap().remaining(), 1499);
    }

    #[test]
    fn pause_resume_reset() {
        let f = fixture();
        f.coordinator.create_timer(IntervalKind::Pomodoro);
        f.coordinator.start_timer();
        f.coordinator.tick();
        assert!(f.coordinator.pause_timer());
        assert!(!f.coordinator.pause_timer());
        assert!(f.coordinator.tick().is_none());
        assert_eq!(f.coordinator.current_timer().unwrap().remaining(), 1499);

        assert!(f.coordinator.resume_timer());
        assert!(f.coordinator.reset_timer());
        let timer = f.coordinator.current_timer().unwrap();
        assert_eq!(timer.status(), TimerStatus::Idle);
        assert_eq!(timer.remaining(), 1500);
    }

    #[test]
    fn stop_discards_timer() {
        let f = fixture();
        f.coordinator.create_timer(IntervalKind::LongBreak);
        f.coordinator.start_timer();
        assert!(f.coordinator.stop_timer());
        assert!(f.coordinator.current_timer().is_none());
        assert!(f.coordinator.tick().is_none());
    }

    #[test]
    fn pomodoro_completion_records_one_session() {
        let f = fixture();
        with_pomodoro_length(&f, 2);
        f.coordinator.create_timer(IntervalKind::Pomodoro);
        f.coordinator.start_timer();

        f.clock.advance_secs(1);
        assert!(f.coordinator.tick().is_none());
        f.clock.advance_secs(1);
        let event = f.coordinator.tick();
        assert!(matches!(event, Some(Event::TimerCompleted { .. })));
        assert!(f.coordinator.tick().is_none());

        let sessions = f.coordinator.sessions();
        assert_eq!(sessions.len(), 1);
        assert!(sessions[0].is_completed());
        assert_eq!(sessions[0].actual_duration(), Some(2));
        assert_eq!(sessions[0].date(), "2024-05-15");
        assert_eq!(
            f.coordinator.current_timer().unwrap().status(),
            TimerStatus::Completed
        );
    }

    #[test]
    fn break_completion_records_nothing() {
        let f = fixture();
        f.coordinator
            .update_settings(&SettingsPatch::new().short_break_length(1));
        f.coordinator.create_timer(IntervalKind::ShortBreak);
        f.coordinator.start_timer();
        assert!(f.coordinator.tick().is_some());
        assert!(f.coordinator.sessions().is_empty());
    }

    #[test]
    fn rejected_settings_leave_state_unchanged() {
        let f = fixture();
        let report = f
            .coordinator
            .update_settings(&SettingsPatch::new().pomodoro_length(0).language("xx"));
        assert!(!report.any_applied());
        assert_eq!(f.coordinator.settings(), Settings::default());
    }

    #[test]
    fn statistics_use_clock_date() {
        let f = fixture();
        let today = f.clock.today();
        f.coordinator
            .add_session(SessionRecord::new(IntervalKind::Pomodoro, 60, 0, today).completed_at(60_000));
        let stats = f.coordinator.get_statistics();
        assert_eq!(stats.today.count, 1);
        assert_eq!(stats.streak, 1);
    }

    #[test]
    fn error_slot() {
        let f = fixture();
        let mut events = f.coordinator.subscribe();
        f.coordinator.set_error("boom");
        assert_eq!(f.coordinator.error().as_deref(), Some("boom"));
        f.coordinator.clear_error();
        assert!(f.coordinator.error().is_none());
        assert!(matches!(
            events.try_recv(),
            Ok(Event::ErrorChanged { message: Some(_), .. })
        ));
        assert!(matches!(
            events.try_recv(),
            Ok(Event::ErrorChanged { message: None, .. })
        ));
    }

    #[test]
    fn snapshot_reflects_timer() {
        let f = fixture();
        f.coordinator.create_timer(IntervalKind::Pomodoro);
        match f.coordinator.snapshot() {
            Event::StateSnapshot {
                status,
                remaining_secs,
                progress_pct,
                ticking,
                ..
            } => {
                assert_eq!(status, Some(TimerStatus::Idle));
                assert_eq!(remaining_secs, 1500);
                assert_eq!(progress_pct, 0.0);
                assert!(!ticking);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn completion_pipeline_alerts_and_saves() {
        let f = fixture();
        with_pomodoro_length(&f, 1);
        f.coordinator.create_timer(IntervalKind::Pomodoro);
        f.coordinator.start_timer();
        f.clock.advance_secs(1);
        assert!(f.coordinator.tick().is_some());
        assert!(!f.coordinator.is_ticking());

        f.coordinator.flush_pending().await;
        assert_eq!(f.notifier.shown.load(Ordering::SeqCst), 1);
        let stored = f.storage.load_all().await.unwrap();
        assert_eq!(stored.sessions.len(), 1);
        assert_eq!(stored.settings.pomodoro_length(), 1);
    }

    #[tokio::test]
    async fn pipeline_failures_keep_the_session() {
        let f = fixture();
        with_pomodoro_length(&f, 1);
        f.coordinator.flush_pending().await;
        f.notifier.fail.store(true, Ordering::SeqCst);
        f.storage.fail.store(true, Ordering::SeqCst);

        f.coordinator.create_timer(IntervalKind::Pomodoro);
        f.coordinator.start_timer();
        assert!(f.coordinator.tick().is_some());
        f.coordinator.flush_pending().await;

        assert_eq!(f.coordinator.sessions().len(), 1);
        assert!(f.coordinator.error().is_none());
        assert!(!f.coordinator.is_ticking());
    }

    #[tokio::test]
    async fn save_and_load_failures_reach_error_slot() {
        let f = fixture();
        f.storage.fail.store(true, Ordering::SeqCst);
        assert!(f.coordinator.save_data().await.is_err());
        assert!(f.coordinator.error().is_some());

        f.coordinator.add_session(
            SessionRecord::new(IntervalKind::Pomodoro, 60, 0, f.clock.today()).completed_at(60_000),
        );
        assert!(f.coordinator.load_data().await.is_err());
        assert!(f.coordinator.sessions().is_empty());
        assert!(!f.coordinator.is_loading());
        assert!(f.coordinator.error().unwrap().contains("disk gone"));
    }

    #[tokio::test]
    async fn running_timer_loads_as_paused() {
        let f = fixture();
        f.coordinator.create_timer(IntervalKind::Pomodoro);
        f.coordinator.start_timer();
        f.coordinator.save_data().await.unwrap();
        f.coordinator.stop_timer();

        f.coordinator.load_data().await.unwrap();
        let timer = f.coordinator.current_timer().unwrap();
        assert_eq!(timer.status(), TimerStatus::Paused);
        assert!(!f.coordinator.is_ticking());
    }

    #[tokio::test]
    async fn stopped_timer_is_removed_from_storage() {
        let f = fixture();
        f.coordinator.create_timer(IntervalKind::Pomodoro);
        f.coordinator.save_data().await.unwrap();
        f.coordinator.stop_timer();
        f.coordinator.save_data().await.unwrap();
        assert!(f.storage.load_all().await.unwrap().timer.is_none());
    }

    #[tokio::test]
    async fn export_import_and_clear() {
        let f = fixture();
        f.coordinator.update_settings(&SettingsPatch::new().language("en"));
        f.coordinator.add_session(
            SessionRecord::new(IntervalKind::Pomodoro, 60, 0, f.clock.today()).completed_at(60_000),
        );
        let bundle = f.coordinator.export_data().await.unwrap();
        let exported = bundle.to_value().unwrap();

        f.coordinator.clear_data().await.unwrap();
        assert!(f.coordinator.sessions().is_empty());
        assert_eq!(f.coordinator.settings(), Settings::default());

        let imported = f.coordinator.import_data(&exported).await.unwrap();
        assert_eq!(imported.sessions.as_ref().map(Vec::len), Some(1));
        assert_eq!(f.coordinator.settings().language(), "en");
        assert_eq!(f.storage.load_all().await.unwrap().sessions.len(), 1);
    }

    #[tokio::test]
    async fn invalid_import_sets_error() {
        let f = fixture();
        let err = f
            .coordinator
            .import_data(&serde_json::json!({"version": 9}))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Import(_)));
        assert!(f.coordinator.error().is_some());
    }

    // ── Driver ──────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn driver_ticks_once_per_period() {
        let f = fixture_with(Duration::from_secs(1));
        f.coordinator.create_timer(IntervalKind::Pomodoro);
        f.coordinator.start_timer();
        assert!(f.coordinator.is_ticking());

        time::sleep(Duration::from_millis(3_500)).await;
        assert_eq!(f.coordinator.current_timer().unwrap().remaining(), 1497);
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_never_double_ticks() {
        let f = fixture_with(Duration::from_secs(1));
        f.coordinator.create_timer(IntervalKind::Pomodoro);
        f.coordinator.start_timer();
        time::sleep(Duration::from_millis(500)).await;
        assert!(f.coordinator.pause_timer());
        assert!(f.coordinator.resume_timer());

        // Re-armed at 0.5s: ticks land at 1.5s, 2.5s and 3.5s.
        time::sleep(Duration::from_millis(3_200)).await;
        assert_eq!(f.coordinator.current_timer().unwrap().remaining(), 1497);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_and_stop_halt_the_driver() {
        let f = fixture_with(Duration::from_secs(1));
        f.coordinator.create_timer(IntervalKind::Pomodoro);
        f.coordinator.start_timer();
        time::sleep(Duration::from_millis(1_500)).await;
        f.coordinator.pause_timer();
        assert!(!f.coordinator.is_ticking());
        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(f.coordinator.current_timer().unwrap().remaining(), 1499);

        f.coordinator.resume_timer();
        f.coordinator.stop_timer();
        time::sleep(Duration::from_secs(5)).await;
        assert!(f.coordinator.current_timer().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_generation_is_inert() {
        let f = fixture_with(Duration::from_secs(1));
        f.coordinator.create_timer(IntervalKind::Pomodoro);
        f.coordinator.start_timer();
        let stale = f.coordinator.shared.lock_state().generation.wrapping_sub(1);
        assert!(matches!(f.coordinator.shared.step(Some(stale)), Step::Idle));
        assert_eq!(f.coordinator.current_timer().unwrap().remaining(), 1500);
    }

    #[tokio::test(start_paused = true)]
    async fn driver_completes_and_disarms() {
        let f = fixture_with(Duration::from_secs(1));
        with_pomodoro_length(&f, 2);
        let mut events = f.coordinator.subscribe();
        f.coordinator.create_timer(IntervalKind::Pomodoro);
        f.coordinator.start_timer();

        time::sleep(Duration::from_millis(2_500)).await;
        f.coordinator.flush_pending().await;
        assert_eq!(
            f.coordinator.current_timer().unwrap().status(),
            TimerStatus::Completed
        );
        assert!(!f.coordinator.is_ticking());
        assert_eq!(f.coordinator.sessions().len(), 1);
        assert_eq!(f.notifier.shown.load(Ordering::SeqCst), 1);
        assert!(f.storage.saves.load(Ordering::SeqCst) >= 1);

        let mut names = Vec::new();
        while let Ok(event) = events.try_recv() {
            names.push(event.name());
        }
        assert_eq!(names.iter().filter(|n| **n == "timer_completed").count(), 1);
        assert!(names.contains(&"session_recorded"));
    }
}
