//! Port traits: the hexagonal boundary between the engine and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ EngineService (domain)
//! ```
//!
//! Driven adapters (hardware scan, controls, policy compiler, settings
//! store, event sinks) implement these traits.  The
//! [`EngineService`](super::service::EngineService) and the registry consume
//! them via generics, so the domain core never touches a device or a file
//! directly.

use crate::config::EngineConfig;
use crate::error::{CompileError, RuntimeFault};
use crate::hardware::{ControlMode, HardwareTree, Identifier};
use crate::policy::EvaluationResult;

// ───────────────────────────────────────────────────────────────
// Hardware ports (driven adapter: hardware ↔ domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port: produces a fresh hardware snapshot.
///
/// Called once per tick.  The tree may differ between calls (hardware
/// rescans, hot-plug), so callers must not hold on to it.
pub trait HardwarePort {
    fn scan(&mut self) -> HardwareTree;
}

/// A live, commandable output (fan PWM, pump, …).
///
/// Commands take `&self`: a control is an opaque device write, and the
/// snapshot handing it out is shared read-only with the policy that is
/// being evaluated.
pub trait Control {
    fn identifier(&self) -> &Identifier;

    /// Current mode as last reported by the device.
    fn control_mode(&self) -> ControlMode;

    /// Drive the output at `percent` (0–100) under software control.
    fn set_software(&self, percent: f32);

    /// Hand the output back to the hardware / firmware controller.
    fn set_default(&self);
}

// ───────────────────────────────────────────────────────────────
// Policy ports (driven adapter: source text → invocable policy)
// ───────────────────────────────────────────────────────────────

/// Turns policy source text into an invocable [`Policy`].
pub trait PolicyCompiler: Send + Sync {
    fn compile(&self, source: &str) -> Result<Box<dyn Policy>, CompileError>;
}

/// A compiled policy.
///
/// Invoked once per tick with the whole snapshot.  Implementations may keep
/// internal state between invocations (e.g. smoothing windows); that state
/// is dropped when the registry invalidates the compiled policy.
pub trait Policy: Send {
    fn invoke(&self, snapshot: &HardwareTree) -> Result<EvaluationResult, RuntimeFault>;
}

// ───────────────────────────────────────────────────────────────
// Settings ports (driven adapter: domain ↔ persistent settings)
// ───────────────────────────────────────────────────────────────

/// Opaque string key/value settings store.
pub trait SettingsStore {
    fn contains(&self, key: &str) -> bool;

    /// Stored value, or `default` when the key is absent.
    fn get_value(&self, key: &str, default: &str) -> String;

    /// Write (or overwrite) a value.
    fn set_value(&mut self, key: &str, value: &str);

    /// Make every `set_value` so far durable.  Stores with no backing
    /// medium have nothing to do.
    fn flush(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Loads and persists engine configuration.
///
/// Implementations MUST validate before persisting; invalid ranges are
/// rejected with [`ConfigError::ValidationFailed`], not silently clamped.
pub trait ConfigPort {
    /// Returns [`EngineConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<EngineConfig, ConfigError>;

    fn save(&mut self, config: &EngineConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The engine emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug)]
pub enum ConfigError {
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    ValidationFailed(&'static str),
}

/// Errors from the settings file backend.
#[derive(Debug)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    Io(std::io::Error),
    /// The backing file is not a valid settings document.
    Corrupted(String),
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl core::fmt::Display for StoreError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::Corrupted(msg) => write!(f, "settings corrupted: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Corrupted(_) => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
