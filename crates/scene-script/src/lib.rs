pub mod ast;
mod bindings;
pub mod interp;
mod lexer;
mod parser;
pub mod validate;

use std::error::Error;
use std::fmt;

use scene_core::Point3;

pub use ast::Program;
pub use bindings::Builtin;
pub use interp::{ExecError, ExecFailure, ExecLimits, SandboxOutput, execute};
pub use parser::parse_program;
pub use validate::validate;

/// Parse or validation diagnostic with an optional source position.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptError {
    message: String,
    line: Option<u32>,
    column: Option<u32>,
}

impl ScriptError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: None,
            column: None,
        }
    }

    pub(crate) fn at(message: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            message: message.into(),
            line: Some(line),
            column: Some(column),
        }
    }

    pub fn line(&self) -> Option<u32> {
        self.line
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.line, self.column) {
            (Some(line), Some(column)) => {
                write!(f, "{} at line {}, column {}", self.message, line, column)
            }
            (Some(line), None) => write!(f, "{} at line {}", self.message, line),
            _ => f.write_str(&self.message),
        }
    }
}

impl Error for ScriptError {}

/// The conventional scene volume handed to every generation. The engine
/// derives the sandbox's `SCENE_*` constants from it; the core never
/// mutates it.
/// The center is carried explicitly rather than derived: the conventional
/// scene keeps its focal point at z = -3 even though the volume extends
/// further back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneBounds {
    pub min: Point3,
    pub max: Point3,
    pub center: Point3,
}

impl Default for SceneBounds {
    fn default() -> Self {
        Self {
            min: [-3.0, -1.5, -6.0],
            max: [3.0, 1.5, -1.0],
            center: [0.0, 0.0, -3.0],
        }
    }
}
