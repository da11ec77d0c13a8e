//! Camera-to-screen calibration.
//!
//! The user looks at five anchor targets in turn and confirms each one.
//! Every confirmation pairs the current iris centre (camera space) with
//! the target's screen position.  Once all five are in, an affine map is
//! fitted by ordinary least squares and kept for the session.

use nalgebra::{DMatrix, Matrix3x2, RowVector3};
use tracing::{debug, info, warn};

use super::landmarks::{FrameSize, Point2};
use crate::error::CalibrationError;

/// Smallest number of correspondences that determines an affine map.
pub const MIN_CORRESPONDENCES: usize = 3;

const RANK_EPSILON: f64 = 1e-9;
const SOLVE_EPSILON: f64 = 1e-12;

// ── Targets ─────────────────────────────────────────────────

/// A calibration target, as a fraction of the screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnchorTarget {
    pub name: &'static str,
    pub fx: f32,
    pub fy: f32,
}

impl AnchorTarget {
    pub fn screen_point(&self, screen: FrameSize) -> Point2 {
        Point2::new(self.fx * screen.width as f32, self.fy * screen.height as f32)
    }
}

/// The four corners inset by 10%, then the centre.
pub const ANCHOR_TARGETS: [AnchorTarget; 5] = [
    AnchorTarget { name: "top-left", fx: 0.1, fy: 0.1 },
    AnchorTarget { name: "top-right", fx: 0.9, fy: 0.1 },
    AnchorTarget { name: "bottom-left", fx: 0.1, fy: 0.9 },
    AnchorTarget { name: "bottom-right", fx: 0.9, fy: 0.9 },
    AnchorTarget { name: "center", fx: 0.5, fy: 0.5 },
];

/// One camera-point / screen-point pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correspondence {
    pub camera: Point2,
    pub screen: Point2,
}

// ── Model ───────────────────────────────────────────────────

/// Affine map `[x, y, 1] * T` with `T` 3x2, clamped to the screen.
#[derive(Debug, Clone, PartialEq)]
pub struct AffineModel {
    transform: Matrix3x2<f64>,
    screen: FrameSize,
    rms_residual: f64,
}

impl AffineModel {
    /// Least-squares fit.
    pub fn fit(pairs: &[Correspondence], screen: FrameSize) -> Result<Self, CalibrationError> {
        let n = pairs.len();
        if n < MIN_CORRESPONDENCES {
            return Err(CalibrationError::TooFewPoints {
                got: n,
                need: MIN_CORRESPONDENCES,
            });
        }

        let a = DMatrix::<f64>::from_fn(n, 3, |r, c| match c {
            0 => pairs[r].camera.x as f64,
            1 => pairs[r].camera.y as f64,
            _ => 1.0,
        });
        let b = DMatrix::<f64>::from_fn(n, 2, |r, c| match c {
            0 => pairs[r].screen.x as f64,
            _ => pairs[r].screen.y as f64,
        });

        let svd = a.svd(true, true);
        let rank = svd.rank(RANK_EPSILON);
        if rank < 3 {
            return Err(CalibrationError::Degenerate { rank });
        }
        let solution = svd
            .solve(&b, SOLVE_EPSILON)
            .map_err(|e| CalibrationError::Solve(e.to_string()))?;
        let transform = Matrix3x2::from_fn(|r, c| solution[(r, c)]);

        let mut model = Self {
            transform,
            screen,
            rms_residual: 0.0,
        };
        model.rms_residual = model.residual(pairs);
        debug!("Affine fit over {} points, rms {:.2}px", n, model.rms_residual);
        Ok(model)
    }

    fn project(&self, camera: Point2) -> Point2 {
        let row = RowVector3::new(camera.x as f64, camera.y as f64, 1.0) * self.transform;
        Point2::new(row[0] as f32, row[1] as f32)
    }

    fn residual(&self, pairs: &[Correspondence]) -> f64 {
        let sum: f64 = pairs
            .iter()
            .map(|p| {
                let d = self.project(p.camera).distance(&p.screen) as f64;
                d * d
            })
            .sum();
        (sum / pairs.len() as f64).sqrt()
    }

    /// Map a camera point to the screen, clamping each axis to
    /// `[0, dim - 1]`.
    pub fn apply(&self, camera: Point2) -> Point2 {
        self.screen.clamp(self.project(camera))
    }

    /// Root-mean-square distance (px) between fitted and target points.
    pub fn rms_residual(&self) -> f64 {
        self.rms_residual
    }

    pub fn screen(&self) -> FrameSize {
        self.screen
    }
}

// ── Session ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationSession {
    Idle,
    Collecting { captured: Vec<Correspondence> },
}

/// Result of a successful capture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CaptureOutcome {
    /// Stored; the next target is waiting.
    Next(AnchorTarget),
    /// Last target stored and the model fitted.
    Complete { rms_residual: f64 },
}

/// Drives the five-target procedure and owns the fitted model.
pub struct Calibrator {
    screen: FrameSize,
    session: CalibrationSession,
    model: Option<AffineModel>,
}

impl Calibrator {
    pub fn new(screen: FrameSize) -> Self {
        Self {
            screen,
            session: CalibrationSession::Idle,
            model: None,
        }
    }

    /// Begin (or restart) collection.  A previous model stays usable
    /// until a new one is fitted.
    pub fn start(&mut self) -> AnchorTarget {
        self.session = CalibrationSession::Collecting {
            captured: Vec::with_capacity(ANCHOR_TARGETS.len()),
        };
        info!("Calibration started ({} targets)", ANCHOR_TARGETS.len());
        ANCHOR_TARGETS[0]
    }

    pub fn is_collecting(&self) -> bool {
        matches!(self.session, CalibrationSession::Collecting { .. })
    }

    /// Target awaiting capture.
    pub fn current_target(&self) -> Option<AnchorTarget> {
        match &self.session {
            CalibrationSession::Collecting { captured } => ANCHOR_TARGETS.get(captured.len()).copied(),
            CalibrationSession::Idle => None,
        }
    }

    /// Confirm the current target using the latest camera point.
    ///
    /// Without a camera point the session keeps waiting on the same
    /// target.  A failed fit returns the session to idle.
    pub fn capture(&mut self, camera: Option<Point2>) -> Result<CaptureOutcome, CalibrationError> {
        let CalibrationSession::Collecting { captured } = &mut self.session else {
            return Err(CalibrationError::NotCollecting);
        };
        let Some(camera) = camera else {
            warn!("Calibration capture with no face landmarks");
            return Err(CalibrationError::NoLandmarks);
        };

        let target = ANCHOR_TARGETS[captured.len()];
        captured.push(Correspondence {
            camera,
            screen: target.screen_point(self.screen),
        });
        info!(
            anchor = target.name,
            "Calibration point {}/{} captured",
            captured.len(),
            ANCHOR_TARGETS.len()
        );

        if captured.len() < ANCHOR_TARGETS.len() {
            return Ok(CaptureOutcome::Next(ANCHOR_TARGETS[captured.len()]));
        }

        let pairs = std::mem::take(captured);
        self.session = CalibrationSession::Idle;
        let model = AffineModel::fit(&pairs, self.screen)?;
        let rms_residual = model.rms_residual();
        info!("Calibration complete: rms residual {:.1}px", rms_residual);
        self.model = Some(model);
        Ok(CaptureOutcome::Complete { rms_residual })
    }

    /// Abandon collection.  Captured points are dropped.
    pub fn cancel(&mut self) {
        if self.is_collecting() {
            info!("Calibration cancelled");
        }
        self.session = CalibrationSession::Idle;
    }

    pub fn model(&self) -> Result<&AffineModel, CalibrationError> {
        self.model.as_ref().ok_or(CalibrationError::Uncalibrated)
    }

    pub fn is_calibrated(&self) -> bool {
        self.model.is_some()
    }

    /// Map a camera point through the fitted model.
    pub fn apply(&self, camera: Point2) -> Result<Point2, CalibrationError> {
        Ok(self.model()?.apply(camera))
    }

    /// Generate s-expression for status output.
    pub fn status_sexp(&self) -> String {
        let (state, captured) = match &self.session {
            CalibrationSession::Idle => ("idle", 0),
            CalibrationSession::Collecting { captured } => ("collecting", captured.len()),
        };
        let target = self
            .current_target()
            .map(|t| format!(":{}", t.name))
            .unwrap_or_else(|| "nil".to_string());
        let rms = self
            .model
            .as_ref()
            .map(|m| format!("{:.2}", m.rms_residual()))
            .unwrap_or_else(|| "nil".to_string());
        format!(
            "(:state :{} :captured {} :total {} :target {} :calibrated {} :rms {})",
            state,
            captured,
            ANCHOR_TARGETS.len(),
            target,
            if self.is_calibrated() { "t" } else { "nil" },
            rms,
        )
    }
}

// ── Tests ───────────────────────────────────────────────────
