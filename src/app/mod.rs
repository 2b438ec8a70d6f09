//! Application core: engine orchestration with no direct I/O.
//!
//! The service ties the registry, execution loop and fault supervisor
//! together.  All interaction with hardware and storage happens through
//! **port traits** defined in [`ports`], keeping this layer fully testable
//! without real devices.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
