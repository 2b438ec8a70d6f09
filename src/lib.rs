//! fanscript: scripted fan-control policy engine.
//!
//! Binds user-authored policies to controllable outputs (fan headers,
//! pumps) found in a hardware snapshot, evaluates them once per tick and
//! drives each output accordingly.  Any policy that cannot produce a
//! trusted result sends its output to full speed.
//!
//! | Module          | Role                                          |
//! |-----------------|-----------------------------------------------|
//! | [`registry`]    | Identifier → binding map + compiled cache     |
//! | [`execution`]   | Per-tick evaluate / contain / apply loop      |
//! | [`resolver`]    | Identifier → live control lookup              |
//! | [`persistence`] | Bindings ↔ settings store                     |
//! | [`script`]      | Built-in policy language                      |
//! | [`app`]         | Service, commands, events, port traits        |
//! | [`adapters`]    | Settings file, log sink, simulated hardware   |

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod error;
pub mod execution;
pub mod hardware;
pub mod persistence;
pub mod policy;
pub mod registry;
pub mod resolver;
pub mod safety;
pub mod script;
