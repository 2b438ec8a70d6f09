//! Policy bindings and evaluation results.

use serde::{Deserialize, Serialize};

use crate::error::RuntimeFault;
use crate::hardware::ControlMode;
use crate::safety::FAILSAFE_PERCENT;

/// What a policy wants done with its control this tick.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationResult {
    pub control_mode: ControlMode,
    /// Requested output (0–100).  Only meaningful for [`ControlMode::Software`];
    /// clamped by the execution loop before it reaches a control.
    pub target_percent: f32,
    pub reason: String,
}

impl EvaluationResult {
    pub fn software(target_percent: f32, reason: impl Into<String>) -> Self {
        Self {
            control_mode: ControlMode::Software,
            target_percent,
            reason: reason.into(),
        }
    }

    pub fn hardware_default(reason: impl Into<String>) -> Self {
        Self {
            control_mode: ControlMode::Default,
            target_percent: 0.0,
            reason: reason.into(),
        }
    }

    pub fn undefined(reason: impl Into<String>) -> Self {
        Self {
            control_mode: ControlMode::Undefined,
            target_percent: 0.0,
            reason: reason.into(),
        }
    }

    /// Full software output with the fault as the visible reason.
    pub fn fail_safe(fault: &RuntimeFault) -> Self {
        Self::software(FAILSAFE_PERCENT, format!("ERROR: {fault}"))
    }
}

/// A policy attached to one controllable output.
///
/// The identifier is the registry key and is not repeated here.  Only
/// `enabled` and `source` are persisted; `last_reason` is a runtime
/// diagnostic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub enabled: bool,
    pub source: String,
    #[serde(skip)]
    pub last_reason: String,
}

impl Binding {
    pub fn new(source: impl Into<String>, enabled: bool) -> Self {
        Self {
            enabled,
            source: source.into(),
            last_reason: String::new(),
        }
    }
}
