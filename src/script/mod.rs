//! Built-in policy language.
//!
//! A small expression language whose programs decide what one control
//! should do each tick:
//!
//! ```text
//!   # CPU fan curve, smoothed over 5 ticks
//!   let t = smooth(sensor("/intelcpu/0/temperature/0"), 5);
//!   if t < 35 { return default("idle"); }
//!   return software(curve(t, 35, 25, 60, 55, 80, 100), "cpu " + round(t));
//! ```
//!
//! Source → [`lexer`] → [`parser`] (all name, arity and window checks
//! happen here) → [`interp`] per tick.

pub mod interp;
pub mod lexer;
pub mod parser;
pub mod window;

use std::sync::{Mutex, PoisonError};

use crate::app::ports::{Policy, PolicyCompiler};
use crate::config::EngineConfig;
use crate::error::{CompileError, RuntimeFault};
use crate::hardware::HardwareTree;
use crate::policy::EvaluationResult;

use parser::Program;
use window::SmoothingWindow;

/// Source offered for a newly attached control.
pub const DEFAULT_POLICY_SOURCE: &str = "return software(100, \"Default script!\");\n";

/// [`PolicyCompiler`] for the built-in language.
#[derive(Debug, Clone)]
pub struct ScriptCompiler {
    max_window: usize,
}

impl ScriptCompiler {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            max_window: config.max_smoothing_samples as usize,
        }
    }
}

impl Default for ScriptCompiler {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl PolicyCompiler for ScriptCompiler {
    fn compile(&self, source: &str) -> Result<Box<dyn Policy>, CompileError> {
        let program = parser::parse(source, self.max_window)?;
        Ok(Box::new(CompiledScript::new(program)))
    }
}

/// A checked program plus its smoothing state.
///
/// Windows start empty on every compile, so editing a policy resets its
/// history.
#[derive(Debug)]
pub struct CompiledScript {
    program: Program,
    windows: Mutex<Vec<SmoothingWindow>>,
}

impl CompiledScript {
    fn new(program: Program) -> Self {
        let windows = program.windows.iter().map(|&len| SmoothingWindow::new(len)).collect();
        Self {
            program,
            windows: Mutex::new(windows),
        }
    }
}

impl Policy for CompiledScript {
    fn invoke(&self, snapshot: &HardwareTree) -> Result<EvaluationResult, RuntimeFault> {
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        interp::run(&self.program, snapshot, &mut windows)
    }
}
