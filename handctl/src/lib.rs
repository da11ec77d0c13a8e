//! handctl: hand and face landmarks in, pointer motion and input intents out.
//!
//! The camera, the landmark model and OS input injection are external.
//! This crate owns everything between them: pose classification,
//! debouncing, pointer smoothing, the click/drag state machine, gaze
//! calibration and the mode selector.

pub mod config;
pub mod engine;
pub mod error;
pub mod exchange;
pub mod sexp;
pub mod trace;
