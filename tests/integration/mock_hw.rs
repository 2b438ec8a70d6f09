//! Mock adapters for integration tests.
//!
//! Records every control command so tests can assert on the full command
//! history without touching real fan headers.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use fanscript::app::events::AppEvent;
use fanscript::app::ports::{Control, EventSink, HardwarePort, Policy, PolicyCompiler, SettingsStore, StoreError};
use fanscript::error::{CompileError, RuntimeFault};
use fanscript::hardware::{ControlMode, Hardware, HardwareTree, Identifier, Sensor, SensorType};
use fanscript::policy::EvaluationResult;

// ── Control call record ───────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlCall {
    Software(f32),
    Default,
}

// ── MockControl ───────────────────────────────────────────────

pub struct MockControl {
    identifier: Identifier,
    mode: Mutex<ControlMode>,
    pub calls: Mutex<Vec<ControlCall>>,
}

impl MockControl {
    pub fn new(identifier: &str) -> Arc<Self> {
        Self::with_mode(identifier, ControlMode::Undefined)
    }

    pub fn with_mode(identifier: &str, mode: ControlMode) -> Arc<Self> {
        Arc::new(Self {
            identifier: Identifier::new(identifier),
            mode: Mutex::new(mode),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<ControlCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_call(&self) -> Option<ControlCall> {
        self.calls.lock().unwrap().last().copied()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }
}

impl Control for MockControl {
    fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    fn control_mode(&self) -> ControlMode {
        *self.mode.lock().unwrap()
    }

    fn set_software(&self, percent: f32) {
        *self.mode.lock().unwrap() = ControlMode::Software;
        self.calls.lock().unwrap().push(ControlCall::Software(percent));
    }

    fn set_default(&self) {
        *self.mode.lock().unwrap() = ControlMode::Default;
        self.calls.lock().unwrap().push(ControlCall::Default);
    }
}

// ── Hardware snapshots ────────────────────────────────────────

/// One motherboard with a temperature sensor and a control per fan.
pub fn board(temperature: f32, fans: &[&Arc<MockControl>]) -> HardwareTree {
    let mut superio = Hardware::new("/lpc/mock", "Mock Super I/O");
    for fan in fans {
        let control: Arc<dyn Control> = Arc::clone(*fan) as Arc<dyn Control>;
        superio = superio.with_sensor(
            Sensor::new(fan.identifier().clone(), "Fan Control", SensorType::Control).with_control(control),
        );
    }
    HardwareTree::new(vec![Hardware::new("/mainboard", "Mock Board")
        .with_sensor(Sensor::new("/mainboard/temperature/0", "System", SensorType::Temperature).with_value(temperature))
        .with_sub_hardware(superio)])
}

/// [`HardwarePort`] that hands out the same set of fans on every scan.
pub struct MockHardware {
    pub fans: Vec<Arc<MockControl>>,
    pub temperature: f32,
    pub scans: usize,
}

impl MockHardware {
    pub fn new(fans: &[&str]) -> Self {
        Self {
            fans: fans.iter().map(|id| MockControl::new(id)).collect(),
            temperature: 45.0,
            scans: 0,
        }
    }

    pub fn fan(&self, identifier: &str) -> &Arc<MockControl> {
        self.fans
            .iter()
            .find(|f| f.identifier().as_str() == identifier)
            .unwrap()
    }

    /// Unplug a fan: later scans no longer contain it.
    pub fn unplug(&mut self, identifier: &str) -> Arc<MockControl> {
        let idx = self
            .fans
            .iter()
            .position(|f| f.identifier().as_str() == identifier)
            .unwrap();
        self.fans.remove(idx)
    }
}

impl HardwarePort for MockHardware {
    fn scan(&mut self) -> HardwareTree {
        self.scans += 1;
        let fans: Vec<&Arc<MockControl>> = self.fans.iter().collect();
        board(self.temperature, &fans)
    }
}

// ── StubCompiler ──────────────────────────────────────────────

/// Compiler for a tiny command vocabulary, counting compiles:
///
/// | Source        | Policy behaviour                    |
/// |---------------|-------------------------------------|
/// | `set <p> <r>` | Software `p` with reason `r`        |
/// | `default`     | Default                             |
/// | `undefined`   | Undefined                           |
/// | `fault <m>`   | RuntimeFault `m`                    |
/// | `panic`       | panics inside `invoke`              |
/// | `nan`         | Software NaN                        |
/// | anything else | CompileError                        |
#[derive(Clone, Default)]
pub struct StubCompiler {
    pub compiles: Arc<AtomicUsize>,
    pub invocations: Arc<AtomicUsize>,
}

impl StubCompiler {
    pub fn compile_count(&self) -> usize {
        self.compiles.load(Ordering::SeqCst)
    }

    pub fn invoke_count(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

enum StubBehaviour {
    Result(EvaluationResult),
    Fault(String),
    Panic,
}

struct StubPolicy {
    behaviour: StubBehaviour,
    invocations: Arc<AtomicUsize>,
}

impl Policy for StubPolicy {
    fn invoke(&self, _snapshot: &HardwareTree) -> Result<EvaluationResult, RuntimeFault> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        match &self.behaviour {
            StubBehaviour::Result(r) => Ok(r.clone()),
            StubBehaviour::Fault(m) => Err(RuntimeFault::new(m.clone())),
            StubBehaviour::Panic => panic!("stub policy blew up"),
        }
    }
}

impl PolicyCompiler for StubCompiler {
    fn compile(&self, source: &str) -> Result<Box<dyn Policy>, CompileError> {
        self.compiles.fetch_add(1, Ordering::SeqCst);
        let mut words = source.splitn(3, ' ');
        let behaviour = match (words.next(), words.next(), words.next()) {
            (Some("set"), Some(p), reason) => {
                let percent: f32 = p.parse().map_err(|_| CompileError::at("bad percent", 1, 5))?;
                StubBehaviour::Result(EvaluationResult::software(percent, reason.unwrap_or("")))
            }
            (Some("default"), None, None) => StubBehaviour::Result(EvaluationResult::hardware_default("stub default")),
            (Some("undefined"), None, None) => StubBehaviour::Result(EvaluationResult::undefined("stub undefined")),
            (Some("fault"), Some(first), rest) => {
                let message = match rest {
                    Some(rest) => format!("{first} {rest}"),
                    None => first.to_owned(),
                };
                StubBehaviour::Fault(message)
            }
            (Some("panic"), None, None) => StubBehaviour::Panic,
            (Some("nan"), None, None) => StubBehaviour::Result(EvaluationResult::software(f32::NAN, "nan")),
            _ => return Err(CompileError::at(format!("unknown policy '{source}'"), 1, 1)),
        };
        Ok(Box::new(StubPolicy {
            behaviour,
            invocations: Arc::clone(&self.invocations),
        }))
    }
}

// ── MockSettings ──────────────────────────────────────────────

#[derive(Default)]
pub struct MockSettings {
    pub values: HashMap<String, String>,
    pub flushes: usize,
    pub fail_flush: bool,
}

impl MockSettings {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MockSettings {
    fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    fn get_value(&self, key: &str, default: &str) -> String {
        self.values.get(key).cloned().unwrap_or_else(|| default.to_owned())
    }

    fn set_value(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_owned(), value.to_owned());
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        if self.fail_flush {
            return Err(StoreError::Io(std::io::Error::other("disk full")));
        }
        self.flushes += 1;
        Ok(())
    }
}

// ── LogSink ───────────────────────────────────────────────────

/// Event sink that keeps everything it is given.
#[derive(Default)]
pub struct LogSink {
    pub events: Vec<AppEvent>,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for LogSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}
