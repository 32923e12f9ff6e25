//! State machine module.

pub mod machine;

pub use machine::{Action, SessionState, Transition, Trigger, transition};
