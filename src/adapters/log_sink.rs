//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the `log` facade.  A tray icon or dashboard adapter would implement the
//! same trait.

use log::{debug, error, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`].
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started { interval_ms } => {
                info!("START | interval={interval_ms}ms");
            }
            AppEvent::BindingsLoaded(report) => {
                info!(
                    "LOAD  | loaded={} skipped={}",
                    report.loaded, report.skipped
                );
            }
            AppEvent::TickCompleted(t) => {
                debug!(
                    "TICK  | #{} | evaluated={} faulted={} unresolved={}",
                    t.tick, t.evaluated, t.faulted, t.unresolved
                );
            }
            AppEvent::PolicyFaulted { identifier, reason } => {
                error!("FAULT | {identifier} | {reason}");
            }
            AppEvent::PolicyRecovered { identifier } => {
                info!("FAULT | {identifier} | cleared");
            }
            AppEvent::BindingChanged { identifier, enabled } => {
                info!(
                    "BIND  | {identifier} | {}",
                    if *enabled { "enabled" } else { "disabled" }
                );
            }
            AppEvent::BindingRemoved { identifier } => {
                info!("BIND  | {identifier} | removed");
            }
            AppEvent::SettingsSaved { written } => {
                info!("SAVE  | {written} binding(s)");
            }
            AppEvent::Shutdown { commanded } => {
                warn!("STOP  | {commanded} output(s) at fail-safe level");
            }
        }
    }
}
