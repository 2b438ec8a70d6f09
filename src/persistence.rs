//! Persistence adapter.
//!
//! Moves bindings between the [`PolicyRegistry`] and a [`SettingsStore`],
//! one key per controllable output:
//!
//! ```text
//!   "script:/lpc/nct6798d/control/1"  →  {"enabled":true,"source":"…"}
//! ```
//!
//! Loading does not compile anything; an enabled binding is compiled the
//! first time the execution loop reaches it.  The runtime reason string is
//! never written.

use log::{info, warn};

use crate::app::ports::{PolicyCompiler, SettingsStore};
use crate::hardware::{HardwareTree, Identifier};
use crate::policy::Binding;
use crate::registry::PolicyRegistry;
use crate::resolver;

/// Namespace prefix for binding keys.
pub const SCRIPT_KEY_PREFIX: &str = "script:";

/// Settings key holding the binding for `identifier`.
pub fn settings_key(identifier: &Identifier) -> String {
    format!("{SCRIPT_KEY_PREFIX}{identifier}")
}

/// Outcome of [`load_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: usize,
    /// Keys present but not decodable.
    pub skipped: usize,
}

/// Populate `registry` from `store` for every control present in `tree`.
///
/// Stored bindings for outputs not present in the tree are left in the
/// store untouched.  Malformed values are skipped.
pub fn load_all<C: PolicyCompiler>(
    registry: &PolicyRegistry<C>,
    store: &impl SettingsStore,
    tree: &HardwareTree,
) -> LoadReport {
    let mut report = LoadReport::default();
    let mut seen: Vec<&Identifier> = Vec::new();

    for control in resolver::controls(tree) {
        let identifier = control.identifier();
        if seen.contains(&identifier) {
            continue;
        }
        seen.push(identifier);

        let key = settings_key(identifier);
        if !store.contains(&key) {
            continue;
        }
        match decode(&store.get_value(&key, "")) {
            Ok(binding) => {
                registry.restore(identifier.clone(), binding);
                report.loaded += 1;
            }
            Err(e) => {
                warn!("Persistence: skipping malformed binding under '{key}': {e}");
                report.skipped += 1;
            }
        }
    }

    info!(
        "Persistence: loaded {} binding(s), skipped {}",
        report.loaded, report.skipped
    );
    report
}

/// Write every binding in `registry` to `store`.  Returns the number written.
pub fn save_all<C: PolicyCompiler>(registry: &PolicyRegistry<C>, store: &mut impl SettingsStore) -> usize {
    let mut written = 0;
    for (identifier, binding) in registry.bindings() {
        match encode(&binding) {
            Ok(value) => {
                store.set_value(&settings_key(&identifier), &value);
                written += 1;
            }
            Err(e) => warn!("Persistence: cannot encode binding for {identifier}: {e}"),
        }
    }
    info!("Persistence: saved {written} binding(s)");
    written
}

fn encode(binding: &Binding) -> Result<String, serde_json::Error> {
    serde_json::to_string(binding)
}

fn decode(value: &str) -> Result<Binding, serde_json::Error> {
    serde_json::from_str(value)
}
