//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements         | Connects to              |
//! |----------------|--------------------|--------------------------|
//! | `log_sink`     | EventSink          | `log` facade             |
//! | `settings`     | SettingsStore      | JSON settings file       |
//! |                | ConfigPort         |                          |
//! | `sim_hardware` | HardwarePort       | Simulated CPU + fan      |
//! |                | Control            |                          |

pub mod log_sink;
pub mod settings;
pub mod sim_hardware;
