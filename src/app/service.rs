//! Application service: the hexagonal core.
//!
//! [`EngineService`] owns the execution loop, the fault supervisor and a
//! shared handle to the policy registry.  It exposes a clean,
//! device-agnostic API.  All I/O flows through port traits injected at call
//! sites, making the entire service testable with mock adapters.
//!
//! ```text
//!  HardwarePort ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!                   │        EngineService          │
//! SettingsStore ◀──▶│ Registry · Loop · Supervisor  │
//!                   └──────────────────────────────┘
//! ```

use std::sync::Arc;

use log::{info, warn};

use crate::config::EngineConfig;
use crate::error::CompileError;
use crate::execution::{ExecutionLoop, TickReport};
use crate::hardware::Identifier;
use crate::persistence::{self, LoadReport};
use crate::registry::PolicyRegistry;
use crate::safety::{FaultTransition, SafetySupervisor};

use super::commands::AppCommand;
use super::events::{AppEvent, TickSummary};
use super::ports::{EventSink, HardwarePort, PolicyCompiler, SettingsStore};

// ───────────────────────────────────────────────────────────────
// EngineService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct EngineService<C> {
    registry: Arc<PolicyRegistry<C>>,
    executor: ExecutionLoop,
    safety: SafetySupervisor,
    config: EngineConfig,
    tick_count: u64,
    settings_dirty: bool,
    dirty_since_tick: u64,
    save_requested: bool,
}

impl<C: PolicyCompiler> EngineService<C> {
    /// Construct the service around a (possibly shared) registry.
    ///
    /// Does **not** load anything; call [`start`](Self::start) next.
    pub fn new(config: EngineConfig, registry: Arc<PolicyRegistry<C>>) -> Self {
        Self {
            registry,
            executor: ExecutionLoop::new(&config),
            safety: SafetySupervisor::new(),
            config,
            tick_count: 0,
            settings_dirty: false,
            dirty_since_tick: 0,
            save_requested: false,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Scan the hardware once and restore every stored binding for the
    /// controls found.
    pub fn start(
        &mut self,
        hw: &mut impl HardwarePort,
        store: &impl SettingsStore,
        sink: &mut impl EventSink,
    ) -> LoadReport {
        let tree = hw.scan();
        let report = persistence::load_all(&self.registry, store, &tree);
        sink.emit(&AppEvent::Started {
            interval_ms: self.config.control_loop_interval_ms,
        });
        sink.emit(&AppEvent::BindingsLoaded(report));
        info!(
            "EngineService started: {} binding(s), tick every {} ms",
            self.registry.len(),
            self.config.control_loop_interval_ms
        );
        report
    }

    /// Drive every enabled output to the fail-safe level and release all
    /// compiled policies.  Unsaved edits are flushed first.
    pub fn shutdown(
        &mut self,
        hw: &mut impl HardwarePort,
        store: &mut impl SettingsStore,
        sink: &mut impl EventSink,
    ) -> usize {
        self.force_save_if_dirty(store, sink);
        let tree = hw.scan();
        let commanded = self.executor.shutdown(&self.registry, &tree);
        sink.emit(&AppEvent::Shutdown { commanded });
        commanded
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one full cycle: scan → evaluate and apply → supervise.
    pub fn tick(&mut self, hw: &mut impl HardwarePort, sink: &mut impl EventSink) -> TickReport {
        self.tick_count += 1;

        // 1. Fresh snapshot; the tree may change between ticks.
        let tree = hw.scan();

        // 2. Evaluate every enabled binding and drive its control.
        let report = self.executor.execute_all(&self.registry, &tree);

        // 3. Latch fault transitions so each is reported once.
        for outcome in &report.outcomes {
            match self
                .safety
                .observe(&outcome.identifier, outcome.faulted, &outcome.result.reason)
            {
                Some(FaultTransition::Raised) => sink.emit(&AppEvent::PolicyFaulted {
                    identifier: outcome.identifier.clone(),
                    reason: outcome.result.reason.clone(),
                }),
                Some(FaultTransition::Cleared) => sink.emit(&AppEvent::PolicyRecovered {
                    identifier: outcome.identifier.clone(),
                }),
                None => {}
            }
        }
        // Bindings disabled or removed straight on the shared registry are
        // no longer evaluated; their latches would never clear otherwise.
        self.safety
            .retain(|identifier| report.outcome(identifier).is_some());

        sink.emit(&AppEvent::TickCompleted(TickSummary {
            tick: self.tick_count,
            evaluated: report.evaluated(),
            faulted: report.faulted(),
            unresolved: report.unresolved(),
        }));
        report
    }

    // ── Command handling ──────────────────────────────────────

    /// Apply an external edit.  Compile failures are returned after the
    /// registry has recorded the binding as disabled.
    pub fn handle_command(&mut self, cmd: AppCommand, sink: &mut impl EventSink) -> Result<(), CompileError> {
        match cmd {
            AppCommand::Attach { identifier, binding } => {
                let result = self.registry.attach(identifier.clone(), binding);
                self.after_edit(&identifier, sink);
                result
            }
            AppCommand::UpdateSource { identifier, source } => {
                let result = self.registry.update_source(&identifier, &source);
                match result {
                    Ok(false) => {
                        warn!("UpdateSource for unattached output {identifier} ignored");
                        Ok(())
                    }
                    Ok(true) => {
                        self.after_edit(&identifier, sink);
                        Ok(())
                    }
                    Err(e) => {
                        self.after_edit(&identifier, sink);
                        Err(e)
                    }
                }
            }
            AppCommand::Enable(identifier) => match self.registry.enable(&identifier) {
                Ok(false) => {
                    warn!("Enable for unattached output {identifier} ignored");
                    Ok(())
                }
                Ok(true) => {
                    self.after_edit(&identifier, sink);
                    Ok(())
                }
                Err(e) => {
                    self.after_edit(&identifier, sink);
                    Err(e)
                }
            },
            AppCommand::Disable(identifier) => {
                if self.registry.get(&identifier).is_some() {
                    self.registry.disable(&identifier);
                    self.after_edit(&identifier, sink);
                }
                Ok(())
            }
            AppCommand::Remove(identifier) => {
                if self.registry.remove(&identifier) {
                    self.safety.forget(&identifier);
                    self.mark_settings_dirty();
                    sink.emit(&AppEvent::BindingRemoved { identifier });
                }
                Ok(())
            }
            AppCommand::Validate(source) => self.registry.validate(&source),
            AppCommand::SaveSettings => {
                self.save_requested = true;
                self.mark_settings_dirty();
                info!("Explicit settings save requested (will flush on next auto-save check)");
                Ok(())
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    /// Shared registry handle, for editors on other threads.
    pub fn registry(&self) -> &Arc<PolicyRegistry<C>> {
        &self.registry
    }

    /// Total ticks executed since startup.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// True if any output is latched in the fault state.
    pub fn has_faults(&self) -> bool {
        self.safety.has_faults()
    }

    pub fn is_faulted(&self, identifier: &Identifier) -> bool {
        self.safety.is_faulted(identifier)
    }

    // ── Internal ──────────────────────────────────────────────

    fn after_edit(&mut self, identifier: &Identifier, sink: &mut impl EventSink) {
        let enabled = self.registry.is_active(identifier);
        if !enabled {
            self.safety.forget(identifier);
        }
        self.mark_settings_dirty();
        sink.emit(&AppEvent::BindingChanged {
            identifier: identifier.clone(),
            enabled,
        });
    }

    // ── Settings dirty-flag management ────────────────────────

    /// Mark bindings as modified since the last save.
    pub fn mark_settings_dirty(&mut self) {
        if !self.settings_dirty {
            self.settings_dirty = true;
            self.dirty_since_tick = self.tick_count;
        }
    }

    /// Save once `autosave_delay_secs` worth of ticks have passed since the
    /// first unsaved change, or right away after
    /// [`AppCommand::SaveSettings`].  Returns `true` if bindings were saved.
    pub fn auto_save_if_needed(&mut self, store: &mut impl SettingsStore, sink: &mut impl EventSink) -> bool {
        if !self.settings_dirty {
            return false;
        }
        let ticks_since_dirty = self.tick_count.saturating_sub(self.dirty_since_tick);
        let secs_since_dirty = ticks_since_dirty as f32 * self.config.tick_secs();
        if !self.save_requested && secs_since_dirty < self.config.autosave_delay_secs as f32 {
            return false;
        }
        self.save(store, sink, "auto-saved")
    }

    /// Save if dirty (call before exit).
    pub fn force_save_if_dirty(&mut self, store: &mut impl SettingsStore, sink: &mut impl EventSink) {
        if self.settings_dirty {
            self.save(store, sink, "force-saved before shutdown");
        }
    }

    /// Whether bindings have unsaved changes.
    pub fn is_settings_dirty(&self) -> bool {
        self.settings_dirty
    }

    fn save(&mut self, store: &mut impl SettingsStore, sink: &mut impl EventSink, how: &str) -> bool {
        let written = persistence::save_all(&self.registry, store);
        match store.flush() {
            Ok(()) => {
                self.settings_dirty = false;
                self.save_requested = false;
                info!("Bindings {how} ({written})");
                sink.emit(&AppEvent::SettingsSaved { written });
                true
            }
            Err(e) => {
                warn!("Settings save failed: {e}");
                false
            }
        }
    }
}
