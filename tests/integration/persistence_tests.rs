//! Bindings ↔ settings store.

use fanscript::app::ports::SettingsStore;
use fanscript::hardware::Identifier;
use fanscript::persistence::{self, LoadReport, settings_key};
use fanscript::policy::Binding;
use fanscript::registry::PolicyRegistry;

use crate::mock_hw::{MockControl, MockSettings, StubCompiler, board};

#[test]
fn save_then_load_into_fresh_registry() {
    let fan1 = MockControl::new("/lpc/mock/control/0");
    let fan2 = MockControl::new("/lpc/mock/control/1");
    let tree = board(40.0, &[&fan1, &fan2]);

    let original = PolicyRegistry::new(StubCompiler::default());
    original
        .attach("/lpc/mock/control/0".into(), Binding::new("set 40 quiet", true))
        .unwrap();
    original
        .attach("/lpc/mock/control/1".into(), Binding::new("default", false))
        .unwrap();
    let mut store = MockSettings::new();
    assert_eq!(persistence::save_all(&original, &mut store), 2);

    let compiler = StubCompiler::default();
    let restored = PolicyRegistry::new(compiler.clone());
    let report = persistence::load_all(&restored, &store, &tree);

    assert_eq!(report, LoadReport { loaded: 2, skipped: 0 });
    let strip = |(id, b): (Identifier, Binding)| (id, b.enabled, b.source);
    assert_eq!(
        restored.bindings().into_iter().map(strip).collect::<Vec<_>>(),
        original.bindings().into_iter().map(strip).collect::<Vec<_>>()
    );
    // Loading never compiles.
    assert_eq!(compiler.compile_count(), 0);
    assert!(restored.is_active(&"/lpc/mock/control/0".into()));
}

#[test]
fn reason_is_not_persisted() {
    let registry = PolicyRegistry::new(StubCompiler::default());
    registry.attach("fan1".into(), Binding::new("broken", true)).unwrap_err();
    let mut store = MockSettings::new();
    persistence::save_all(&registry, &mut store);

    let stored = store.get_value(&settings_key(&"fan1".into()), "");
    assert!(!stored.contains("ERROR"));
    assert!(stored.contains("\"enabled\":false"));
}

#[test]
fn only_controls_in_the_tree_are_loaded() {
    let present = MockControl::new("present");
    let mut store = MockSettings::new();
    store.set_value("script:present", r#"{"enabled":true,"source":"set 10"}"#);
    store.set_value("script:absent", r#"{"enabled":true,"source":"set 10"}"#);

    let registry = PolicyRegistry::new(StubCompiler::default());
    let report = persistence::load_all(&registry, &store, &board(40.0, &[&present]));

    assert_eq!(report.loaded, 1);
    assert_eq!(registry.identifiers(), vec![Identifier::new("present")]);
    // Untouched in the store.
    assert!(store.contains("script:absent"));
}

#[test]
fn malformed_values_are_skipped() {
    let good = MockControl::new("good");
    let bad = MockControl::new("bad");
    let mut store = MockSettings::new();
    store.set_value("script:good", r#"{"enabled":false,"source":"default"}"#);
    store.set_value("script:bad", "<ScriptItem><Enabled>true</Enabled></ScriptItem>");

    let registry = PolicyRegistry::new(StubCompiler::default());
    let report = persistence::load_all(&registry, &store, &board(40.0, &[&good, &bad]));

    assert_eq!(report, LoadReport { loaded: 1, skipped: 1 });
    assert!(registry.get(&"bad".into()).is_none());
    assert_eq!(registry.get(&"good".into()).unwrap().source, "default");
}

#[test]
fn duplicate_controls_load_once() {
    let fan = MockControl::new("fan1");
    let mut store = MockSettings::new();
    store.set_value("script:fan1", r#"{"enabled":true,"source":"set 10"}"#);

    let registry = PolicyRegistry::new(StubCompiler::default());
    let report = persistence::load_all(&registry, &store, &board(40.0, &[&fan, &fan]));

    assert_eq!(report.loaded, 1);
}

#[test]
fn loaded_broken_source_faults_at_first_tick() {
    use fanscript::config::EngineConfig;
    use fanscript::execution::ExecutionLoop;

    use crate::mock_hw::ControlCall;

    let fan = MockControl::new("fan1");
    let tree = board(40.0, &[&fan]);
    let mut store = MockSettings::new();
    store.set_value("script:fan1", r#"{"enabled":true,"source":"not a policy"}"#);

    let registry = PolicyRegistry::new(StubCompiler::default());
    persistence::load_all(&registry, &store, &tree);
    ExecutionLoop::new(&EngineConfig::default()).execute_all(&registry, &tree);

    assert_eq!(fan.last_call(), Some(ControlCall::Software(100.0)));
    assert!(registry.reason(&"fan1".into()).starts_with("ERROR: compile failed"));
}
