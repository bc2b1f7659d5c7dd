#![forbid(unsafe_code)]

//! Statechart model + guard/action evaluation (headless).
//!
//! Design goals:
//! - deterministic, testable outputs (document-ordered state and transition queries)
//! - a read-only query surface over the state tree that renderers can consume
//! - evaluation of guard/action code with a selectable strict or permissive mode

pub mod error;
pub mod eval;
pub mod expr;
pub mod interpreter;
pub mod loader;
pub mod statechart;

pub use error::{Error, Result};
pub use eval::{EvalContext, EvalError, EvalMode, Value};
pub use interpreter::{Event, Interpreter, MacroStep, MicroStep};
pub use loader::{load_statechart, load_statechart_file};
pub use statechart::{State, StateKind, Statechart, Transition};

#[cfg(test)]
mod tests;
