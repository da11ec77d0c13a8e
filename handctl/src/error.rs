//! Error types for the control engine.
//!
//! Classification and filtering are total and never fail.  Only landmark
//! ingestion, calibration, configuration and action dispatch report errors.

use thiserror::Error;

/// Malformed landmark input from the tracking collaborator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LandmarkError {
    #[error("expected {expected} landmarks, got {got}")]
    WrongCount { expected: usize, got: usize },

    #[error("face mesh has {got} landmarks, at least {min} required")]
    TooFewFacePoints { min: usize, got: usize },
}

/// Calibration procedure and model errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    /// Pointer mapping requested before calibration completed.
    #[error("calibration has not completed")]
    Uncalibrated,

    #[error("no calibration session is active")]
    NotCollecting,

    /// Capture requested on a frame with no usable face landmarks.
    #[error("no face landmarks available for capture")]
    NoLandmarks,

    #[error("need at least {need} correspondences, got {got}")]
    TooFewPoints { got: usize, need: usize },

    /// Camera points are collinear or coincident.
    #[error("correspondences are degenerate (rank {rank})")]
    Degenerate { rank: usize },

    #[error("least-squares solve failed: {0}")]
    Solve(String),
}

/// The external input-injection collaborator failed to perform an action.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    #[error("dispatch of {intent} failed: {reason}")]
    Failed { intent: String, reason: String },
}

/// Configuration file problems.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed config s-expression: {0}")]
    Parse(String),

    #[error("invalid value for :{key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Landmark trace (replay input) problems.
#[derive(Error, Debug)]
pub enum TraceError {
    #[error("line {line}: malformed s-expression: {reason}")]
    Parse { line: usize, reason: String },

    #[error("line {line}: missing :{key}")]
    MissingKey { line: usize, key: &'static str },

    #[error("line {line}: {source}")]
    Landmarks {
        line: usize,
        #[source]
        source: LandmarkError,
    },

    #[error("line {line}: unknown command {command}")]
    UnknownCommand { line: usize, command: String },

    #[error("failed to read trace: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by the per-frame pipeline to the caller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
}
