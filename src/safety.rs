//! Fail-safe rules and fault supervision.
//!
//! Two guarantees live here:
//!
//! 1. **Output bounds.** Every software command is clamped to 0–100 before
//!    it reaches a control ([`clamp_percent`]).
//! 2. **Fail loud, fail cool.** Whenever a policy cannot produce a trusted
//!    result the output is driven to [`FAILSAFE_PERCENT`].
//!
//! ## Fault lifecycle
//!
//! The execution loop contains faults on every tick, so a broken policy
//! faults *every* tick.  The [`SafetySupervisor`] latches per-output fault
//! state across ticks so that the transition is reported once:
//!
//! 1. A binding's evaluation faults; the supervisor sets its latch and logs
//!    at `error`.
//! 2. While it keeps faulting, nothing new is reported.
//! 3. The first clean evaluation clears the latch and logs at `info`.

use std::collections::HashSet;

use log::{error, info};

use crate::hardware::Identifier;

/// Output commanded whenever a policy faults or the engine shuts down.
pub const FAILSAFE_PERCENT: f32 = 100.0;

/// Clamp a requested output into the 0–100 range.
///
/// Callers must reject NaN before calling; `f32::clamp` passes it through.
pub fn clamp_percent(percent: f32) -> f32 {
    percent.clamp(0.0, 100.0)
}

/// A change in an output's fault latch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultTransition {
    Raised,
    Cleared,
}

/// Per-output fault latch.
#[derive(Debug, Default)]
pub struct SafetySupervisor {
    faulted: HashSet<Identifier>,
}

impl SafetySupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of one evaluation.  Returns the transition, if any.
    pub fn observe(&mut self, identifier: &Identifier, faulted: bool, reason: &str) -> Option<FaultTransition> {
        if faulted {
            if self.faulted.insert(identifier.clone()) {
                error!("POLICY FAULT SET: {identifier}: {reason}");
                return Some(FaultTransition::Raised);
            }
        } else if self.faulted.remove(identifier) {
            info!("POLICY FAULT CLEARED: {identifier}");
            return Some(FaultTransition::Cleared);
        }
        None
    }

    /// Drop the latch for an output that is no longer supervised
    /// (binding disabled or removed).
    pub fn forget(&mut self, identifier: &Identifier) {
        self.faulted.remove(identifier);
    }

    /// Drop every latch whose output `supervised` no longer covers.  Catches
    /// bindings disabled or removed without going through the service.
    pub fn retain(&mut self, supervised: impl Fn(&Identifier) -> bool) {
        self.faulted.retain(|identifier| {
            let keep = supervised(identifier);
            if !keep {
                info!("POLICY FAULT DROPPED: {identifier} is no longer evaluated");
            }
            keep
        });
    }

    /// True if **any** output is latched in the fault state.
    pub fn has_faults(&self) -> bool {
        !self.faulted.is_empty()
    }

    pub fn is_faulted(&self, identifier: &Identifier) -> bool {
        self.faulted.contains(identifier)
    }

    pub fn fault_count(&self) -> usize {
        self.faulted.len()
    }
}
