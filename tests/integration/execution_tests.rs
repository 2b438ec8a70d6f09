//! Execution loop: evaluation, fault containment and control application.

use fanscript::app::ports::SettingsStore;
use fanscript::config::EngineConfig;
use fanscript::execution::{ControlAction, ExecutionLoop};
use fanscript::hardware::{ControlMode, Identifier};
use fanscript::persistence::{self, settings_key};
use fanscript::policy::Binding;
use fanscript::registry::PolicyRegistry;

use crate::mock_hw::{ControlCall, MockControl, MockSettings, StubCompiler, board};

fn exec() -> ExecutionLoop {
    ExecutionLoop::new(&EngineConfig::default())
}

fn attach(registry: &PolicyRegistry<StubCompiler>, identifier: &str, source: &str) {
    registry
        .attach(Identifier::new(identifier), Binding::new(source, true))
        .unwrap();
}

#[test]
fn software_result_reaches_control_with_reason() {
    let fan1 = MockControl::new("fan1");
    let registry = PolicyRegistry::new(StubCompiler::default());
    attach(&registry, "fan1", "set 42.5 steady");

    let report = exec().execute_all(&registry, &board(40.0, &[&fan1]));

    assert_eq!(fan1.calls(), vec![ControlCall::Software(42.5)]);
    assert_eq!(registry.reason(&"fan1".into()), "steady");
    let outcome = report.outcome(&"fan1".into()).unwrap();
    assert!(!outcome.faulted);
    assert_eq!(outcome.action, ControlAction::Software(42.5));
}

#[test]
fn software_targets_are_clamped() {
    let hot = MockControl::new("hot");
    let cold = MockControl::new("cold");
    let registry = PolicyRegistry::new(StubCompiler::default());
    attach(&registry, "hot", "set 150");
    attach(&registry, "cold", "set -20");

    exec().execute_all(&registry, &board(40.0, &[&hot, &cold]));

    assert_eq!(hot.last_call(), Some(ControlCall::Software(100.0)));
    assert_eq!(cold.last_call(), Some(ControlCall::Software(0.0)));
}

#[test]
fn runtime_fault_drives_full_output() {
    let fan1 = MockControl::new("fan1");
    let registry = PolicyRegistry::new(StubCompiler::default());
    attach(&registry, "fan1", "fault sensor went missing");

    let report = exec().execute_all(&registry, &board(40.0, &[&fan1]));

    assert_eq!(fan1.calls(), vec![ControlCall::Software(100.0)]);
    assert_eq!(registry.reason(&"fan1".into()), "ERROR: sensor went missing");
    assert_eq!(report.faulted(), 1);
}

#[test]
fn panicking_policy_is_contained() {
    let bad = MockControl::new("bad");
    let good = MockControl::new("good");
    let registry = PolicyRegistry::new(StubCompiler::default());
    attach(&registry, "bad", "panic");
    attach(&registry, "good", "set 35");

    let report = exec().execute_all(&registry, &board(40.0, &[&bad, &good]));

    assert_eq!(bad.last_call(), Some(ControlCall::Software(100.0)));
    assert!(registry.reason(&"bad".into()).starts_with("ERROR: policy panicked"));
    assert_eq!(good.last_call(), Some(ControlCall::Software(35.0)));
    assert_eq!(report.evaluated(), 2);
    assert_eq!(report.faulted(), 1);
}

#[test]
fn nan_target_is_treated_as_fault() {
    let fan1 = MockControl::new("fan1");
    let registry = PolicyRegistry::new(StubCompiler::default());
    attach(&registry, "fan1", "nan");

    exec().execute_all(&registry, &board(40.0, &[&fan1]));

    assert_eq!(fan1.last_call(), Some(ControlCall::Software(100.0)));
    assert!(registry.reason(&"fan1".into()).starts_with("ERROR: "));
}

#[test]
fn default_is_unconditional() {
    let fan1 = MockControl::with_mode("fan1", ControlMode::Default);
    let registry = PolicyRegistry::new(StubCompiler::default());
    attach(&registry, "fan1", "default");

    exec().execute_all(&registry, &board(40.0, &[&fan1]));

    assert_eq!(fan1.calls(), vec![ControlCall::Default]);
}

#[test]
fn undefined_only_resets_software_controls() {
    let soft = MockControl::with_mode("soft", ControlMode::Software);
    let firmware = MockControl::with_mode("firmware", ControlMode::Default);
    let registry = PolicyRegistry::new(StubCompiler::default());
    attach(&registry, "soft", "undefined");
    attach(&registry, "firmware", "undefined");

    let report = exec().execute_all(&registry, &board(40.0, &[&soft, &firmware]));

    assert_eq!(soft.calls(), vec![ControlCall::Default]);
    assert!(firmware.calls().is_empty());
    assert_eq!(report.outcome(&"firmware".into()).unwrap().action, ControlAction::Unchanged);

    // Once handed back, later Undefined results leave it alone.
    exec().execute_all(&registry, &board(40.0, &[&soft, &firmware]));
    assert_eq!(soft.calls().len(), 1);
}

#[test]
fn disabled_binding_is_never_evaluated() {
    let fan1 = MockControl::new("fan1");
    let compiler = StubCompiler::default();
    let registry = PolicyRegistry::new(compiler.clone());
    attach(&registry, "fan1", "set 60");
    registry.disable(&"fan1".into());

    let report = exec().execute_all(&registry, &board(40.0, &[&fan1]));

    assert!(fan1.calls().is_empty());
    assert_eq!(report.evaluated(), 0);
    assert_eq!(compiler.invoke_count(), 0);
}

#[test]
fn failed_attach_is_never_invoked() {
    let fan1 = MockControl::new("fan1");
    let compiler = StubCompiler::default();
    let registry = PolicyRegistry::new(compiler.clone());
    assert!(registry.attach("fan1".into(), Binding::new("broken", true)).is_err());

    exec().execute_all(&registry, &board(40.0, &[&fan1]));

    assert!(fan1.calls().is_empty());
    assert_eq!(compiler.invoke_count(), 0);
}

#[test]
fn removed_binding_leaves_control_alone() {
    let fan1 = MockControl::new("fan1");
    let registry = PolicyRegistry::new(StubCompiler::default());
    attach(&registry, "fan1", "set 60");
    registry.remove(&"fan1".into());

    exec().execute_all(&registry, &board(40.0, &[&fan1]));

    assert!(fan1.calls().is_empty());
}

#[test]
fn unresolved_control_is_skipped_but_reason_recorded() {
    let registry = PolicyRegistry::new(StubCompiler::default());
    attach(&registry, "unplugged", "set 55 still evaluated");

    let report = exec().execute_all(&registry, &board(40.0, &[]));

    assert_eq!(report.unresolved(), 1);
    assert_eq!(registry.reason(&"unplugged".into()), "still evaluated");
}

#[test]
fn cached_policy_is_reused_across_passes() {
    let fan1 = MockControl::new("fan1");
    let compiler = StubCompiler::default();
    let registry = PolicyRegistry::new(compiler.clone());
    registry.attach("fan1".into(), Binding::new("set 20", false)).unwrap();
    registry.enable(&"fan1".into()).unwrap();
    registry.update_source(&"fan1".into(), "set 25").unwrap();
    let compiles_before = compiler.compile_count();

    let tree = board(40.0, &[&fan1]);
    exec().execute_all(&registry, &tree);
    exec().execute_all(&registry, &tree);

    assert_eq!(compiler.compile_count(), compiles_before);
    assert_eq!(compiler.invoke_count(), 2);
    assert_eq!(fan1.last_call(), Some(ControlCall::Software(25.0)));
}

#[test]
fn long_reasons_are_truncated() {
    let fan1 = MockControl::new("fan1");
    let config = EngineConfig {
        max_reason_len: 16,
        ..EngineConfig::default()
    };
    let registry = PolicyRegistry::new(StubCompiler::default());
    attach(&registry, "fan1", &format!("set 10 {}", "x".repeat(100)));

    ExecutionLoop::new(&config).execute_all(&registry, &board(40.0, &[&fan1]));

    assert_eq!(registry.reason(&"fan1".into()).chars().count(), 16);
}

#[test]
fn shutdown_fails_safe_and_releases_policies() {
    let on = MockControl::new("on");
    let off = MockControl::new("off");
    let registry = PolicyRegistry::new(StubCompiler::default());
    attach(&registry, "on", "set 20");
    registry.attach("off".into(), Binding::new("set 20", false)).unwrap();

    let commanded = exec().shutdown(&registry, &board(40.0, &[&on, &off]));

    assert_eq!(commanded, 1);
    assert_eq!(on.calls(), vec![ControlCall::Software(100.0)]);
    assert!(off.calls().is_empty());
    assert!(!registry.is_compiled(&"on".into()));
    assert!(registry.is_active(&"on".into()));
}

#[test]
fn loaded_binding_compiles_on_first_pass_only() {
    let fan1 = MockControl::new("fan1");
    let compiler = StubCompiler::default();
    let registry = PolicyRegistry::new(compiler.clone());
    let mut store = MockSettings::new();
    store.set_value(&settings_key(&"fan1".into()), r#"{"enabled":true,"source":"set 35 loaded"}"#);
    let tree = board(40.0, &[&fan1]);
    persistence::load_all(&registry, &store, &tree);
    assert_eq!(compiler.compile_count(), 0);

    exec().execute_all(&registry, &tree);
    exec().execute_all(&registry, &tree);

    assert_eq!(compiler.compile_count(), 1);
    assert_eq!(compiler.invoke_count(), 2);
    assert_eq!(fan1.last_call(), Some(ControlCall::Software(35.0)));
    assert_eq!(registry.reason(&"fan1".into()), "loaded");
}
