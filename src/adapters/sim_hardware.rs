//! Simulated hardware adapter.
//!
//! Exposes a fake CPU and one fan header through [`HardwarePort`] so the
//! engine can run end to end without real sensors.  The CPU heats with
//! load and cools with fan output; each [`scan`](HardwarePort::scan)
//! advances the model by one step.
//!
//! ```text
//!  /intelcpu/0                         /lpc/sim
//!  ├── temperature/0  (°C)             ├── fan/0      (RPM)
//!  └── load/0         (%)              └── control/0  (%)  ◀── policy
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use log::debug;

use crate::app::ports::{Control, HardwarePort};
use crate::hardware::{ControlMode, Hardware, HardwareTree, Identifier, Sensor, SensorType};

pub const CPU_TEMPERATURE: &str = "/intelcpu/0/temperature/0";
pub const CPU_LOAD: &str = "/intelcpu/0/load/0";
pub const FAN_SPEED: &str = "/lpc/sim/fan/0";
pub const FAN_CONTROL: &str = "/lpc/sim/control/0";

const AMBIENT_C: f32 = 30.0;
/// Temperature rise over ambient at 100 % load with the fan stopped.
const MAX_RISE_C: f32 = 70.0;
/// Share of the rise a fan at 100 % removes.
const FAN_COOLING: f32 = 0.6;
/// Fraction of the gap to equilibrium closed per step.
const THERMAL_RATE: f32 = 0.2;
/// Output the firmware curve holds when the fan is not under software control.
const FIRMWARE_PERCENT: f32 = 40.0;
const MAX_RPM: f32 = 2000.0;

// ── Control ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct FanState {
    mode: ControlMode,
    percent: f32,
}

/// Simulated fan header.  Records the last command it received.
#[derive(Debug)]
pub struct SimControl {
    identifier: Identifier,
    state: Mutex<FanState>,
}

impl SimControl {
    pub fn new(identifier: impl Into<Identifier>) -> Self {
        Self {
            identifier: identifier.into(),
            state: Mutex::new(FanState {
                mode: ControlMode::Undefined,
                percent: FIRMWARE_PERCENT,
            }),
        }
    }

    /// Output the fan is actually running at.
    pub fn effective_percent(&self) -> f32 {
        let state = self.state();
        match state.mode {
            ControlMode::Software => state.percent,
            ControlMode::Default | ControlMode::Undefined => FIRMWARE_PERCENT,
        }
    }

    fn state(&self) -> FanState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Control for SimControl {
    fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    fn control_mode(&self) -> ControlMode {
        self.state().mode
    }

    fn set_software(&self, percent: f32) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.mode = ControlMode::Software;
        state.percent = percent;
        debug!("SimControl {}: software {percent:.1}%", self.identifier);
    }

    fn set_default(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.mode = ControlMode::Default;
        debug!("SimControl {}: default", self.identifier);
    }
}

// ── Hardware port ─────────────────────────────────────────────

pub struct SimHardware {
    fan: Arc<SimControl>,
    temperature_c: f32,
    load_percent: f32,
}

impl SimHardware {
    pub fn new() -> Self {
        Self {
            fan: Arc::new(SimControl::new(FAN_CONTROL)),
            temperature_c: AMBIENT_C,
            load_percent: 0.0,
        }
    }

    /// Set the simulated CPU load (clamped to 0–100).
    pub fn set_load(&mut self, percent: f32) {
        self.load_percent = percent.clamp(0.0, 100.0);
    }

    pub fn temperature(&self) -> f32 {
        self.temperature_c
    }

    pub fn fan(&self) -> &Arc<SimControl> {
        &self.fan
    }

    fn step(&mut self) {
        let fan = self.fan.effective_percent() / 100.0;
        let rise = MAX_RISE_C * (self.load_percent / 100.0) * (1.0 - FAN_COOLING * fan);
        let equilibrium = AMBIENT_C + rise;
        self.temperature_c += (equilibrium - self.temperature_c) * THERMAL_RATE;
    }
}

impl Default for SimHardware {
    fn default() -> Self {
        Self::new()
    }
}

impl HardwarePort for SimHardware {
    fn scan(&mut self) -> HardwareTree {
        self.step();
        let fan_percent = self.fan.effective_percent();

        let cpu = Hardware::new("/intelcpu/0", "Simulated CPU")
            .with_sensor(Sensor::new(CPU_TEMPERATURE, "CPU Package", SensorType::Temperature).with_value(self.temperature_c))
            .with_sensor(Sensor::new(CPU_LOAD, "CPU Total", SensorType::Load).with_value(self.load_percent));

        let control: Arc<dyn Control> = self.fan.clone();
        let superio = Hardware::new("/lpc/sim", "Simulated Super I/O")
            .with_sensor(Sensor::new(FAN_SPEED, "Fan #1", SensorType::Fan).with_value(fan_percent / 100.0 * MAX_RPM))
            .with_sensor(
                Sensor::new(FAN_CONTROL, "Fan Control #1", SensorType::Control)
                    .with_value(fan_percent)
                    .with_control(control),
            );

        HardwareTree::new(vec![cpu, superio])
    }
}
