//! Policy registry.
//!
//! Owns the Identifier → [`Binding`] map and the compiled-policy cache.
//! Both maps sit behind one mutex so that a source edit and its cache
//! invalidation are never observed separately, whether the caller is the
//! execution loop or an editor on another thread.
//!
//! ## Per-binding lifecycle
//!
//! ```text
//!  Unattached ──attach──▶ Disabled ──enable──▶ Enabled/Uncompiled ──tick──▶ Enabled/Compiled
//!                            ▲                        │   ▲                       │
//!                            └────────disable─────────┘   └────update_source──────┘
//!  any state ──remove──▶ Unattached
//! ```
//!
//! A compile failure while attaching, enabling or editing leaves the
//! binding **disabled** and returns the error: a broken policy is never run
//! silently.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{info, warn};

use crate::app::ports::{Policy, PolicyCompiler};
use crate::error::CompileError;
use crate::hardware::Identifier;
use crate::policy::Binding;

/// Everything guarded by the registry lock.
#[derive(Default)]
pub(crate) struct RegistryState {
    pub(crate) bindings: HashMap<Identifier, Binding>,
    /// Subset of enabled bindings that have been compiled.
    pub(crate) cache: HashMap<Identifier, Box<dyn Policy>>,
}

/// Registry of policy bindings, generic over the compiler that turns
/// source text into policies.
pub struct PolicyRegistry<C> {
    compiler: C,
    state: Mutex<RegistryState>,
}

impl<C: PolicyCompiler> PolicyRegistry<C> {
    pub fn new(compiler: C) -> Self {
        Self {
            compiler,
            state: Mutex::new(RegistryState::default()),
        }
    }

    pub fn compiler(&self) -> &C {
        &self.compiler
    }

    /// Lock the registry.  A panic while the lock was held cannot leave the
    /// maps half-updated (every mutation is a single map operation), so a
    /// poisoned lock is recovered rather than propagated.
    pub(crate) fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Editing ───────────────────────────────────────────────

    /// Store or replace the binding for `identifier`.
    ///
    /// An enabled binding is compiled immediately.  On failure it is stored
    /// disabled with the error as its reason, and the error is returned.
    pub fn attach(&self, identifier: Identifier, mut binding: Binding) -> Result<(), CompileError> {
        let mut state = self.lock();
        state.cache.remove(&identifier);

        let mut outcome = Ok(());
        if binding.enabled {
            match self.compiler.compile(&binding.source) {
                Ok(policy) => {
                    state.cache.insert(identifier.clone(), policy);
                }
                Err(e) => {
                    warn!("Registry: policy for {identifier} failed to compile, stored disabled: {e}");
                    binding.enabled = false;
                    binding.last_reason = format!("ERROR: {e}");
                    outcome = Err(e);
                }
            }
        }

        info!(
            "Registry: attached policy to {identifier} (enabled={})",
            binding.enabled
        );
        state.bindings.insert(identifier, binding);
        outcome
    }

    /// Replace the source text of an existing binding.
    ///
    /// Returns `Ok(false)` for unknown identifiers.  An enabled binding is
    /// recompiled; on failure it falls back to disabled.
    pub fn update_source(&self, identifier: &Identifier, source: &str) -> Result<bool, CompileError> {
        let mut guard = self.lock();
        let RegistryState { bindings, cache } = &mut *guard;
        let Some(binding) = bindings.get_mut(identifier) else {
            return Ok(false);
        };

        cache.remove(identifier);
        binding.source = source.to_owned();
        binding.last_reason.clear();

        if binding.enabled {
            match self.compiler.compile(source) {
                Ok(policy) => {
                    cache.insert(identifier.clone(), policy);
                }
                Err(e) => {
                    warn!("Registry: edited policy for {identifier} failed to compile, disabling: {e}");
                    binding.enabled = false;
                    binding.last_reason = format!("ERROR: {e}");
                    return Err(e);
                }
            }
        }
        info!("Registry: updated source for {identifier}");
        Ok(true)
    }

    /// Enable an attached binding, compiling it first.
    ///
    /// Returns `Ok(false)` for unknown identifiers.
    pub fn enable(&self, identifier: &Identifier) -> Result<bool, CompileError> {
        let mut guard = self.lock();
        let RegistryState { bindings, cache } = &mut *guard;
        let Some(binding) = bindings.get_mut(identifier) else {
            return Ok(false);
        };
        if binding.enabled && cache.contains_key(identifier) {
            return Ok(true);
        }

        match self.compiler.compile(&binding.source) {
            Ok(policy) => {
                cache.insert(identifier.clone(), policy);
                binding.enabled = true;
                binding.last_reason.clear();
                info!("Registry: enabled policy for {identifier}");
                Ok(true)
            }
            Err(e) => {
                warn!("Registry: cannot enable {identifier}: {e}");
                binding.enabled = false;
                binding.last_reason = format!("ERROR: {e}");
                Err(e)
            }
        }
    }

    /// Disable a binding.  No-op for unknown identifiers.
    pub fn disable(&self, identifier: &Identifier) {
        let mut guard = self.lock();
        let RegistryState { bindings, cache } = &mut *guard;
        if let Some(binding) = bindings.get_mut(identifier) {
            binding.enabled = false;
            binding.last_reason.clear();
            cache.remove(identifier);
            info!("Registry: disabled policy for {identifier}");
        }
    }

    /// Remove a binding and its compiled policy.  True iff it existed.
    pub fn remove(&self, identifier: &Identifier) -> bool {
        let mut state = self.lock();
        state.cache.remove(identifier);
        let existed = state.bindings.remove(identifier).is_some();
        if existed {
            info!("Registry: removed policy for {identifier}");
        }
        existed
    }

    /// Compile `source` without touching the registry.
    pub fn validate(&self, source: &str) -> Result<(), CompileError> {
        self.compiler.compile(source).map(|_| ())
    }

    /// Insert a binding exactly as stored, without compiling it.
    pub(crate) fn restore(&self, identifier: Identifier, binding: Binding) {
        let mut state = self.lock();
        state.cache.remove(&identifier);
        state.bindings.insert(identifier, binding);
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn get(&self, identifier: &Identifier) -> Option<Binding> {
        self.lock().bindings.get(identifier).cloned()
    }

    pub fn is_active(&self, identifier: &Identifier) -> bool {
        self.lock()
            .bindings
            .get(identifier)
            .is_some_and(|b| b.enabled)
    }

    /// Last evaluation reason, or an empty string.
    pub fn reason(&self, identifier: &Identifier) -> String {
        self.lock()
            .bindings
            .get(identifier)
            .map(|b| b.last_reason.clone())
            .unwrap_or_default()
    }

    /// True if a compiled policy is cached for `identifier`.
    pub fn is_compiled(&self, identifier: &Identifier) -> bool {
        self.lock().cache.contains_key(identifier)
    }

    /// Attached identifiers, sorted.
    pub fn identifiers(&self) -> Vec<Identifier> {
        let mut ids: Vec<Identifier> = self.lock().bindings.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Copy of every binding, sorted by identifier.
    pub fn bindings(&self) -> Vec<(Identifier, Binding)> {
        let mut all: Vec<(Identifier, Binding)> = self
            .lock()
            .bindings
            .iter()
            .map(|(id, b)| (id.clone(), b.clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    pub fn len(&self) -> usize {
        self.lock().bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().bindings.is_empty()
    }
}
