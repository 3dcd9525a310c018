//! Desktop alert backend for the CLI.

use async_trait::async_trait;
use std::io::Write;
use tomato_core::config::AlertsConfig;
use tomato_core::{Alert, NotifyError, Notifier};

const APP_NAME: &str = "Tomato Timer";

/// Shows completion alerts as desktop notifications and rings the terminal
/// bell when the alert asks for sound.
#[derive(Debug, Clone, Copy)]
pub struct DesktopNotifier {
    desktop: bool,
    terminal_bell: bool,
}

impl DesktopNotifier {
    pub fn new(alerts: &AlertsConfig) -> Self {
        Self {
            desktop: alerts.desktop,
            terminal_bell: alerts.terminal_bell,
        }
    }

    fn ring_bell(&self) {
        let mut stderr = std::io::stderr();
        if let Err(e) = stderr.write_all(b"\x07").and_then(|_| stderr.flush()) {
            tracing::debug!(error = %e, "terminal bell failed");
        }
    }
}

#[async_trait]
impl Notifier for DesktopNotifier {
    async fn deliver(&self, alert: &Alert) -> Result<Option<String>, NotifyError> {
        if alert.sound && self.terminal_bell {
            self.ring_bell();
        }
        if alert.vibration {
            tracing::debug!("vibration requested; no haptic device on desktop");
        }
        if !self.desktop {
            tracing::info!(title = %alert.title, body = %alert.body, "timer alert");
            return Ok(None);
        }

        let title = alert.title.clone();
        let body = alert.body.clone();
        tokio::task::spawn_blocking(move || {
            notify_rust::Notification::new()
                .summary(&title)
                .body(&body)
                .appname(APP_NAME)
                .show()
                .map(|_| ())
        })
        .await
        .map_err(|e| NotifyError::DeliveryFailed(e.to_string()))?
        .map_err(|e| NotifyError::DeliveryFailed(e.to_string()))?;

        Ok(None)
    }
}
