//! Execution loop.
//!
//! One [`ExecutionLoop::execute_all`] call per monitoring tick:
//!
//! ```text
//!  for each enabled binding:
//!      cached policy ──(miss)──▶ compile + cache
//!            │
//!            ▼
//!      invoke(snapshot) ──(fault / panic)──▶ Software 100 % "ERROR: …"
//!            │
//!            ▼
//!      binding.last_reason = result.reason
//!            │
//!            ▼
//!      resolve(identifier) ──(miss)──▶ skip
//!            │
//!            ▼
//!      Undefined → default, only if currently software
//!      Software  → set_software(clamp(target))
//!      Default   → set_default()
//! ```
//!
//! Bindings are independent: one binding faulting never stops the others
//! from being evaluated and applied.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use log::{debug, info};

use crate::app::ports::{Control, Policy, PolicyCompiler};
use crate::config::EngineConfig;
use crate::error::RuntimeFault;
use crate::hardware::{ControlMode, HardwareTree, Identifier};
use crate::policy::EvaluationResult;
use crate::registry::{PolicyRegistry, RegistryState};
use crate::resolver;
use crate::safety::{FAILSAFE_PERCENT, clamp_percent};

// ───────────────────────────────────────────────────────────────
// Tick report
// ───────────────────────────────────────────────────────────────

/// What the loop did to a control.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlAction {
    /// `set_software` with the clamped value.
    Software(f32),
    /// `set_default`.
    Default,
    /// Control already in the requested state; nothing written.
    Unchanged,
    /// No control with this identifier in the current tree.
    Unresolved,
}

/// Result of evaluating one binding.
#[derive(Debug, Clone)]
pub struct BindingOutcome {
    pub identifier: Identifier,
    pub result: EvaluationResult,
    /// True when `result` is the fail-safe substitute.
    pub faulted: bool,
    pub action: ControlAction,
}

/// Everything one pass did, in evaluation order.
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub outcomes: Vec<BindingOutcome>,
}

impl TickReport {
    pub fn evaluated(&self) -> usize {
        self.outcomes.len()
    }

    pub fn faulted(&self) -> usize {
        self.outcomes.iter().filter(|o| o.faulted).count()
    }

    pub fn unresolved(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.action == ControlAction::Unresolved)
            .count()
    }

    pub fn outcome(&self, identifier: &Identifier) -> Option<&BindingOutcome> {
        self.outcomes.iter().find(|o| &o.identifier == identifier)
    }
}

// ───────────────────────────────────────────────────────────────
// Execution loop
// ───────────────────────────────────────────────────────────────

pub struct ExecutionLoop {
    max_reason_len: usize,
}

impl ExecutionLoop {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            max_reason_len: config.max_reason_len,
        }
    }

    /// Evaluate every enabled binding against `snapshot` and drive its control.
    ///
    /// Holds the registry lock for the whole pass.
    pub fn execute_all<C: PolicyCompiler>(
        &self,
        registry: &PolicyRegistry<C>,
        snapshot: &HardwareTree,
    ) -> TickReport {
        let mut report = TickReport::default();
        let mut guard = registry.lock();
        let RegistryState { bindings, cache } = &mut *guard;

        for (identifier, binding) in bindings.iter_mut().filter(|(_, b)| b.enabled) {
            let evaluation = cached_policy(cache, registry.compiler(), identifier, &binding.source)
                .and_then(|policy| contain(|| policy.invoke(snapshot)))
                .and_then(check_result);

            let (result, faulted) = match evaluation {
                Ok(result) => (result, false),
                Err(fault) => {
                    debug!("Exec: {identifier} faulted: {fault}");
                    (EvaluationResult::fail_safe(&fault), true)
                }
            };

            binding.last_reason = truncate(&result.reason, self.max_reason_len);

            let action = match resolver::resolve(snapshot, identifier) {
                Some(control) => apply(control, &result),
                None => ControlAction::Unresolved,
            };
            debug!(
                "Exec: {identifier} -> {} {:.1}% ({:?}) \"{}\"",
                result.control_mode, result.target_percent, action, binding.last_reason
            );

            report.outcomes.push(BindingOutcome {
                identifier: identifier.clone(),
                result,
                faulted,
                action,
            });
        }
        report
    }

    /// Drive every enabled binding's control to the fail-safe output and
    /// release all compiled policies.  Returns the number of controls
    /// commanded.
    pub fn shutdown<C: PolicyCompiler>(&self, registry: &PolicyRegistry<C>, snapshot: &HardwareTree) -> usize {
        let mut state = registry.lock();
        let mut commanded = 0;
        for identifier in state.bindings.iter().filter(|(_, b)| b.enabled).map(|(id, _)| id) {
            if let Some(control) = resolver::resolve(snapshot, identifier) {
                control.set_software(FAILSAFE_PERCENT);
                commanded += 1;
            }
        }
        state.cache.clear();
        info!("Exec: shutdown, {commanded} output(s) set to {FAILSAFE_PERCENT}%");
        commanded
    }
}

// ───────────────────────────────────────────────────────────────
// Internals
// ───────────────────────────────────────────────────────────────

/// Cached policy for `identifier`, compiling it on a miss.
fn cached_policy<'a, C: PolicyCompiler>(
    cache: &'a mut HashMap<Identifier, Box<dyn Policy>>,
    compiler: &C,
    identifier: &Identifier,
    source: &str,
) -> Result<&'a dyn Policy, RuntimeFault> {
    match cache.entry(identifier.clone()) {
        Entry::Occupied(entry) => Ok(&**entry.into_mut()),
        Entry::Vacant(entry) => {
            let policy = contain(|| compiler.compile(source).map_err(RuntimeFault::from))?;
            debug!("Exec: compiled policy for {identifier}");
            Ok(&**entry.insert(policy))
        }
    }
}

/// The one catch-all boundary around user-supplied computation: a panic
/// becomes a [`RuntimeFault`] instead of unwinding through the loop.
fn contain<T>(f: impl FnOnce() -> Result<T, RuntimeFault>) -> Result<T, RuntimeFault> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_owned())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_owned());
            Err(RuntimeFault::new(format!("policy panicked: {message}")))
        }
    }
}

/// A software target that is not a number cannot be clamped into range.
fn check_result(result: EvaluationResult) -> Result<EvaluationResult, RuntimeFault> {
    if result.control_mode == ControlMode::Software && result.target_percent.is_nan() {
        return Err(RuntimeFault::new("policy returned a non-numeric target"));
    }
    Ok(result)
}

fn apply(control: &dyn Control, result: &EvaluationResult) -> ControlAction {
    match result.control_mode {
        ControlMode::Undefined => {
            if control.control_mode() == ControlMode::Software {
                control.set_default();
                ControlAction::Default
            } else {
                ControlAction::Unchanged
            }
        }
        ControlMode::Software => {
            let percent = clamp_percent(result.target_percent);
            control.set_software(percent);
            ControlAction::Software(percent)
        }
        ControlMode::Default => {
            control.set_default();
            ControlAction::Default
        }
    }
}

fn truncate(reason: &str, max_chars: usize) -> String {
    match reason.char_indices().nth(max_chars) {
        Some((cut, _)) => reason[..cut].to_owned(),
        None => reason.to_owned(),
    }
}
