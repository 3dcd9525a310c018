//! Completion alerts.
//!
//! A [`Notifier`] delivers one [`Alert`]; the provided
//! [`Notifier::show_complete_notification`] applies the user's preferences
//! and resolves the localized text, so backends only implement delivery.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::NotifyError;
use crate::settings::NotificationPrefs;
use crate::timer::IntervalKind;

pub const POMODORO_COMPLETED: &str = "notifications.pomodoroCompleted";
pub const TIME_TO_BREAK: &str = "notifications.timeToBreak";
pub const BREAK_COMPLETED: &str = "notifications.breakCompleted";
pub const TIME_TO_WORK: &str = "notifications.timeToWork";

/// Resolves message keys to display text.
pub trait TextLookup: Send + Sync {
    fn text(&self, key: &str) -> String;
}

impl<F> TextLookup for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn text(&self, key: &str) -> String {
        self(key)
    }
}

/// Built-in English messages; unknown keys resolve to themselves.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnglishText;

impl TextLookup for EnglishText {
    fn text(&self, key: &str) -> String {
        match key {
            POMODORO_COMPLETED => "Pomodoro complete!",
            TIME_TO_BREAK => "Time to take a break.",
            BREAK_COMPLETED => "Break is over!",
            TIME_TO_WORK => "Time to get back to work.",
            other => other,
        }
        .to_string()
    }
}

/// Returns every key unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityText;

impl TextLookup for IdentityText {
    fn text(&self, key: &str) -> String {
        key.to_string()
    }
}

/// Message keys of the alert for a finished interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionMessage {
    pub title_key: &'static str,
    pub body_key: &'static str,
}

impl CompletionMessage {
    pub fn for_kind(kind: IntervalKind) -> Self {
        if kind.is_break() {
            Self {
                title_key: BREAK_COMPLETED,
                body_key: TIME_TO_WORK,
            }
        } else {
            Self {
                title_key: POMODORO_COMPLETED,
                body_key: TIME_TO_BREAK,
            }
        }
    }
}

/// What a backend is asked to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub title: String,
    pub body: String,
    pub sound: bool,
    pub vibration: bool,
}

/// Identifies a delivered alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationHandle {
    pub id: String,
    pub alert: Alert,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Show `alert`. Returns a backend id when it has one.
    async fn deliver(&self, alert: &Alert) -> Result<Option<String>, NotifyError>;

    /// Alert that an interval of `kind` finished.
    ///
    /// `None` when alerts are disabled or delivery failed; failures are
    /// logged and never propagated.
    async fn show_complete_notification(
        &self,
        kind: IntervalKind,
        prefs: NotificationPrefs,
        text: &dyn TextLookup,
    ) -> Option<NotificationHandle> {
        if !prefs.enabled {
            tracing::debug!(kind = %kind, "notifications disabled; skipping alert");
            return None;
        }
        let message = CompletionMessage::for_kind(kind);
        let alert = Alert {
            title: text.text(message.title_key),
            body: text.text(message.body_key),
            sound: prefs.sound,
            vibration: prefs.vibration,
        };
        match self.deliver(&alert).await {
            Ok(id) => Some(NotificationHandle {
                id: id.unwrap_or_else(|| format!("notification_{}", Uuid::new_v4().simple())),
                alert,
            }),
            Err(e) => {
                tracing::warn!(kind = %kind, error = %e, "failed to show completion alert");
                None
            }
        }
    }
}

/// Emits alerts through `tracing` only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, alert: &Alert) -> Result<Option<String>, NotifyError> {
        tracing::info!(
            title = %alert.title,
            body = %alert.body,
            sound = alert.sound,
            vibration = alert.vibration,
            "timer alert"
        );
        Ok(None)
    }
}
