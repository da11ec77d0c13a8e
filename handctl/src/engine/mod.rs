//! Gesture and pointer engine.
//!
//! Provides:
//! - `landmarks`: per-frame hand and face landmark types
//! - `pose`: rule-table pose classifier and two-hand clap detector
//! - `debounce`: global-cooldown gesture commit
//! - `pointer`: pointer smoothing and stability gate
//! - `interaction`: click / drag / right-click / scroll state machine
//! - `calibration`: affine gaze calibration and the capture session
//! - `draw`: pen-state stroke tracker
//! - `modes`: mode selector and gesture-to-action tables
//! - `scheduler`: cancellable delayed actions
//! - `action`: intents and the dispatch seam
//! - `frame_timing`: per-phase timing and adaptive classification stride
//! - `pipeline`: `InteractionContext` and `process_frame`

pub mod action;
pub mod calibration;
pub mod debounce;
pub mod draw;
pub mod frame_timing;
pub mod interaction;
pub mod landmarks;
pub mod modes;
pub mod pipeline;
pub mod pointer;
pub mod pose;
pub mod scheduler;

pub use action::{ActionDispatcher, Intent, LogDispatcher};
pub use landmarks::{FaceLandmarks, FrameSize, HandLandmarks, LandmarkFrame, Point2};
pub use modes::Mode;
pub use pipeline::{dispatch_output, process_frame, Engine, FrameOutput, InteractionContext};
