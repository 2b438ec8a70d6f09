//! Hardware snapshot model.
//!
//! A [`HardwareTree`] is a read-only picture of the machine for one tick:
//! devices, their sub-devices, and the sensors hanging off each.  A sensor
//! may reference a live [`Control`] (e.g. the PWM output driving a fan).
//!
//! ```text
//! HardwareTree
//!  └─ Hardware "/lpc/nct6798d"
//!      ├─ Sensor "/lpc/nct6798d/temperature/0"
//!      ├─ Sensor "/lpc/nct6798d/control/1" ──▶ Control
//!      └─ Hardware (sub)
//!          └─ Sensor …
//! ```
//!
//! The tree is produced fresh by a [`HardwarePort`](crate::app::ports::HardwarePort)
//! every tick.  Nothing in the engine keeps a reference into it past the
//! tick it was built for.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::app::ports::Control;

// ---------------------------------------------------------------------------
// Identifier
// ---------------------------------------------------------------------------

/// Stable key naming one hardware node or controllable output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for Identifier {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// ---------------------------------------------------------------------------
// Control mode
// ---------------------------------------------------------------------------

/// Who is currently driving a control output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ControlMode {
    /// No explicit opinion.
    #[default]
    Undefined,
    /// Explicit software-set percentage.
    Software,
    /// Deferred to the hardware / firmware controller.
    Default,
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => write!(f, "undefined"),
            Self::Software => write!(f, "software"),
            Self::Default => write!(f, "default"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tree nodes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SensorType {
    Voltage,
    Clock,
    Temperature,
    Load,
    Fan,
    Flow,
    Control,
    Level,
    Power,
}

/// One sensor reading in the snapshot.
#[derive(Clone)]
pub struct Sensor {
    pub identifier: Identifier,
    pub name: String,
    pub sensor_type: SensorType,
    /// `None` when the sensor exists but produced no reading this scan.
    pub value: Option<f32>,
    pub control: Option<Arc<dyn Control>>,
}

impl Sensor {
    pub fn new(identifier: impl Into<Identifier>, name: impl Into<String>, sensor_type: SensorType) -> Self {
        Self {
            identifier: identifier.into(),
            name: name.into(),
            sensor_type,
            value: None,
            control: None,
        }
    }

    #[must_use]
    pub fn with_value(mut self, value: f32) -> Self {
        self.value = Some(value);
        self
    }

    #[must_use]
    pub fn with_control(mut self, control: Arc<dyn Control>) -> Self {
        self.control = Some(control);
        self
    }
}

impl fmt::Debug for Sensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sensor")
            .field("identifier", &self.identifier)
            .field("name", &self.name)
            .field("sensor_type", &self.sensor_type)
            .field("value", &self.value)
            .field("control", &self.control.as_ref().map(|c| c.identifier().clone()))
            .finish()
    }
}

/// A device, possibly with nested sub-devices.
#[derive(Debug, Clone)]
pub struct Hardware {
    pub identifier: Identifier,
    pub name: String,
    pub sub_hardware: Vec<Hardware>,
    pub sensors: Vec<Sensor>,
}

impl Hardware {
    pub fn new(identifier: impl Into<Identifier>, name: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            name: name.into(),
            sub_hardware: Vec::new(),
            sensors: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_sensor(mut self, sensor: Sensor) -> Self {
        self.sensors.push(sensor);
        self
    }

    #[must_use]
    pub fn with_sub_hardware(mut self, hardware: Hardware) -> Self {
        self.sub_hardware.push(hardware);
        self
    }

    /// Depth-first: own sensors first, then each sub-device in order.
    fn collect_sensors<'a>(&'a self, out: &mut Vec<&'a Sensor>) {
        out.extend(self.sensors.iter());
        for sub in &self.sub_hardware {
            sub.collect_sensors(out);
        }
    }
}

/// The whole machine as seen by one scan.
#[derive(Debug, Clone, Default)]
pub struct HardwareTree {
    pub hardware: Vec<Hardware>,
}

impl HardwareTree {
    pub fn new(hardware: Vec<Hardware>) -> Self {
        Self { hardware }
    }

    /// Every sensor in traversal order.
    pub fn sensors(&self) -> Vec<&Sensor> {
        let mut out = Vec::new();
        for hw in &self.hardware {
            hw.collect_sensors(&mut out);
        }
        out
    }

    /// First sensor whose identifier equals `identifier`.
    pub fn find_sensor(&self, identifier: &str) -> Option<&Sensor> {
        self.sensors()
            .into_iter()
            .find(|s| s.identifier.as_str() == identifier)
    }
}
