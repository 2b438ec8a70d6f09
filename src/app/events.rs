//! Outbound application events.
//!
//! The [`EngineService`](super::service::EngineService) emits these through
//! the [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log them, show them in a tray icon,
//! forward them to a dashboard.

use crate::hardware::Identifier;
use crate::persistence::LoadReport;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The service has started ticking at the given interval.
    Started { interval_ms: u32 },

    /// Bindings were read back from the settings store.
    BindingsLoaded(LoadReport),

    /// One execution pass finished.
    TickCompleted(TickSummary),

    /// An output's policy began faulting; its control is at the fail-safe level.
    PolicyFaulted { identifier: Identifier, reason: String },

    /// A previously faulting policy produced a clean result again.
    PolicyRecovered { identifier: Identifier },

    /// A binding was attached, edited, enabled or disabled.
    BindingChanged { identifier: Identifier, enabled: bool },

    /// A binding was detached.
    BindingRemoved { identifier: Identifier },

    /// Bindings were written to the settings store.
    SettingsSaved { written: usize },

    /// Outputs were driven to the fail-safe level and policies released.
    Shutdown { commanded: usize },
}

/// Counters for one tick, suitable for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickSummary {
    pub tick: u64,
    pub evaluated: usize,
    pub faulted: usize,
    pub unresolved: usize,
}
