//! Integration tests for the EngineService → registry → controls pipeline.
//!
//! These verify the full chain from an incoming command or tick down to a
//! control write, using mock adapters only.

use std::sync::Arc;

use fanscript::app::commands::AppCommand;
use fanscript::app::events::AppEvent;
use fanscript::app::service::EngineService;
use fanscript::config::EngineConfig;
use fanscript::policy::Binding;
use fanscript::registry::PolicyRegistry;

use crate::mock_hw::{ControlCall, LogSink, MockHardware, MockSettings, StubCompiler};

const FAN: &str = "/lpc/mock/control/0";

fn make_app() -> (EngineService<StubCompiler>, MockHardware, MockSettings, LogSink) {
    let config = EngineConfig::default();
    let registry = Arc::new(PolicyRegistry::new(StubCompiler::default()));
    let app = EngineService::new(config, registry);
    (app, MockHardware::new(&[FAN]), MockSettings::new(), LogSink::new())
}

fn attach(app: &mut EngineService<StubCompiler>, sink: &mut LogSink, source: &str) {
    app.handle_command(
        AppCommand::Attach {
            identifier: FAN.into(),
            binding: Binding::new(source, true),
        },
        sink,
    )
    .unwrap();
}

#[test]
fn start_loads_bindings_and_emits_events() {
    let (mut app, mut hw, mut store, mut sink) = make_app();
    store
        .values
        .insert(format!("script:{FAN}"), r#"{"enabled":true,"source":"set 30"}"#.into());

    let report = app.start(&mut hw, &store, &mut sink);

    assert_eq!(report.loaded, 1);
    assert!(app.registry().is_active(&FAN.into()));
    assert_eq!(sink.events[0], AppEvent::Started { interval_ms: 1000 });
    assert_eq!(sink.events[1], AppEvent::BindingsLoaded(report));
}

#[test]
fn tick_drives_controls() {
    let (mut app, mut hw, _store, mut sink) = make_app();
    attach(&mut app, &mut sink, "set 65 warm");

    let report = app.tick(&mut hw, &mut sink);

    assert_eq!(report.evaluated(), 1);
    assert_eq!(hw.fan(FAN).last_call(), Some(ControlCall::Software(65.0)));
    assert_eq!(hw.scans, 1);
}

#[test]
fn fault_is_reported_once_and_recovery_once() {
    let (mut app, mut hw, _store, mut sink) = make_app();
    attach(&mut app, &mut sink, "fault sensor offline");

    for _ in 0..3 {
        app.tick(&mut hw, &mut sink);
    }
    assert!(app.has_faults());
    assert!(app.is_faulted(&FAN.into()));
    assert_eq!(sink.count(|e| matches!(e, AppEvent::PolicyFaulted { .. })), 1);

    app.handle_command(
        AppCommand::UpdateSource {
            identifier: FAN.into(),
            source: "set 40".into(),
        },
        &mut sink,
    )
    .unwrap();
    app.tick(&mut hw, &mut sink);
    app.tick(&mut hw, &mut sink);

    assert!(!app.has_faults());
    assert_eq!(sink.count(|e| matches!(e, AppEvent::PolicyRecovered { .. })), 1);
}

#[test]
fn disabling_a_faulted_binding_clears_its_latch() {
    let (mut app, mut hw, _store, mut sink) = make_app();
    attach(&mut app, &mut sink, "panic");
    app.tick(&mut hw, &mut sink);
    assert!(app.has_faults());

    app.handle_command(AppCommand::Disable(FAN.into()), &mut sink).unwrap();

    assert!(!app.has_faults());
    hw.fan(FAN).clear();
    app.tick(&mut hw, &mut sink);
    assert!(hw.fan(FAN).calls().is_empty());
}

#[test]
fn failing_attach_surfaces_error_and_stores_disabled() {
    let (mut app, _hw, _store, mut sink) = make_app();
    let err = app
        .handle_command(
            AppCommand::Attach {
                identifier: FAN.into(),
                binding: Binding::new("???", true),
            },
            &mut sink,
        )
        .unwrap_err();

    assert!(err.message.contains("???"));
    assert!(!app.registry().is_active(&FAN.into()));
    assert!(app.is_settings_dirty());
    assert_eq!(
        sink.events.last(),
        Some(&AppEvent::BindingChanged {
            identifier: FAN.into(),
            enabled: false
        })
    );
}

#[test]
fn remove_emits_event_and_marks_dirty() {
    let (mut app, _hw, _store, mut sink) = make_app();
    attach(&mut app, &mut sink, "default");

    app.handle_command(AppCommand::Remove(FAN.into()), &mut sink).unwrap();
    app.handle_command(AppCommand::Remove(FAN.into()), &mut sink).unwrap();

    assert!(app.registry().is_empty());
    assert_eq!(sink.count(|e| matches!(e, AppEvent::BindingRemoved { .. })), 1);
}

#[test]
fn auto_save_waits_for_delay() {
    let (mut app, mut hw, mut store, mut sink) = make_app();
    attach(&mut app, &mut sink, "set 50");

    // Default: 1 s ticks, 5 s delay.
    for _ in 0..4 {
        app.tick(&mut hw, &mut sink);
        assert!(!app.auto_save_if_needed(&mut store, &mut sink));
    }
    app.tick(&mut hw, &mut sink);
    assert!(app.auto_save_if_needed(&mut store, &mut sink));

    assert!(!app.is_settings_dirty());
    assert!(store.values.contains_key(&format!("script:{FAN}")));
    assert_eq!(store.flushes, 1);
    assert_eq!(sink.count(|e| matches!(e, AppEvent::SettingsSaved { written: 1 })), 1);
}

#[test]
fn save_settings_command_skips_delay() {
    let (mut app, _hw, mut store, mut sink) = make_app();
    attach(&mut app, &mut sink, "set 50");
    app.handle_command(AppCommand::SaveSettings, &mut sink).unwrap();

    assert!(app.auto_save_if_needed(&mut store, &mut sink));
    assert!(!app.auto_save_if_needed(&mut store, &mut sink));
}

#[test]
fn failed_flush_keeps_dirty() {
    let (mut app, _hw, mut store, mut sink) = make_app();
    store.fail_flush = true;
    attach(&mut app, &mut sink, "set 50");
    app.handle_command(AppCommand::SaveSettings, &mut sink).unwrap();

    assert!(!app.auto_save_if_needed(&mut store, &mut sink));
    assert!(app.is_settings_dirty());
}

#[test]
fn shutdown_saves_and_fails_safe() {
    let (mut app, mut hw, mut store, mut sink) = make_app();
    attach(&mut app, &mut sink, "set 25");
    app.tick(&mut hw, &mut sink);

    let commanded = app.shutdown(&mut hw, &mut store, &mut sink);

    assert_eq!(commanded, 1);
    assert_eq!(hw.fan(FAN).last_call(), Some(ControlCall::Software(100.0)));
    assert!(!app.is_settings_dirty());
    assert_eq!(sink.events.last(), Some(&AppEvent::Shutdown { commanded: 1 }));
}

#[test]
fn unplugged_fan_is_counted_unresolved() {
    let (mut app, mut hw, _store, mut sink) = make_app();
    attach(&mut app, &mut sink, "set 25");
    let unplugged = hw.unplug(FAN);

    let report = app.tick(&mut hw, &mut sink);

    assert_eq!(report.unresolved(), 1);
    assert!(unplugged.calls().is_empty());
}

#[test]
fn latch_clears_when_binding_is_dropped_behind_the_service() {
    let (mut app, mut hw, _store, mut sink) = make_app();
    attach(&mut app, &mut sink, "fault sensor lost");
    app.tick(&mut hw, &mut sink);
    assert!(app.is_faulted(&FAN.into()));

    // Another holder of the shared registry disables it directly.
    let shared = Arc::clone(app.registry());
    shared.disable(&FAN.into());
    app.tick(&mut hw, &mut sink);

    assert!(!app.has_faults());
    assert_eq!(sink.count(|e| matches!(e, AppEvent::PolicyRecovered { .. })), 0);
}
