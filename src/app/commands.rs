//! Inbound commands to the application service.
//!
//! These represent edits requested by the outside world (a settings UI, a
//! CLI, a test harness) that the
//! [`EngineService`](super::service::EngineService) applies to the registry.

use crate::hardware::Identifier;
use crate::policy::Binding;

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone)]
pub enum AppCommand {
    /// Store or replace the binding for a control.
    Attach { identifier: Identifier, binding: Binding },

    /// Replace the source text of an existing binding.
    UpdateSource { identifier: Identifier, source: String },

    /// Compile and start running an attached binding.
    Enable(Identifier),

    /// Stop running a binding; the control keeps its last command.
    Disable(Identifier),

    /// Detach a binding entirely.
    Remove(Identifier),

    /// Compile source text without touching any binding.
    Validate(String),

    /// Persist bindings on the next auto-save check instead of waiting
    /// for the delay.
    SaveSettings,
}
