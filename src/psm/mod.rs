//! Phase State Machine (spec.md §4.1): decides whether a command against a
//! cycle is legal right now and computes the resulting phase.

pub mod engine;
pub mod error;
pub mod transitions;

pub use engine::{Psm, Validation};
pub use error::{PsmError, PsmResult};
pub use transitions::ResourceAction;
