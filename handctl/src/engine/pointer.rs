//! Pointer smoothing.
//!
//! Converts a jittery raw fingertip or iris position into a stable screen
//! coordinate.  Two strategies: exponential smoothing, or a moving-average
//! buffer optionally followed by a light exponential pass.  An optional
//! stability gate holds the pointer still for sub-threshold motion.

use std::collections::VecDeque;

use tracing::trace;

use super::landmarks::{FrameSize, Point2};

// ── Config ──────────────────────────────────────────────────

/// Smoothing strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Smoothing {
    /// `smoothed = alpha * raw + (1 - alpha) * previous`.
    Exponential { alpha: f32 },
    /// Mean of the last `window` raw points, then an optional exponential pass.
    MovingAverage { window: usize, alpha: Option<f32> },
}

impl Smoothing {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exponential { .. } => "exponential",
            Self::MovingAverage { .. } => "moving-average",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PointerConfig {
    pub smoothing: Smoothing,
    /// Minimum movement (px) for an update to be accepted.  0 disables.
    pub jitter_threshold_px: f32,
}

impl Default for PointerConfig {
    fn default() -> Self {
        Self {
            smoothing: Smoothing::Exponential { alpha: 0.7 },
            jitter_threshold_px: 0.0,
        }
    }
}

impl PointerConfig {
    /// Exponential smoothing with the given alpha and no gate.
    pub fn exponential(alpha: f32) -> Self {
        Self {
            smoothing: Smoothing::Exponential { alpha },
            jitter_threshold_px: 0.0,
        }
    }
}

// ── Filter ──────────────────────────────────────────────────

/// Stateful pointer filter.  One instance per pointer source.
pub struct PointerFilter {
    pub config: PointerConfig,
    history: VecDeque<Point2>,
    smoothed: Option<Point2>,
    suppressed: u64,
}

impl PointerFilter {
    pub fn new(config: PointerConfig) -> Self {
        let capacity = match config.smoothing {
            Smoothing::MovingAverage { window, .. } => window,
            Smoothing::Exponential { .. } => 0,
        };
        Self {
            config,
            history: VecDeque::with_capacity(capacity),
            smoothed: None,
            suppressed: 0,
        }
    }

    /// Swap the strategy, dropping accumulated state.
    pub fn reconfigure(&mut self, config: PointerConfig) {
        self.config = config;
        self.reset();
    }

    /// Feed one raw position and return the smoothed one.
    ///
    /// The first point after construction or a reset passes through
    /// unchanged.
    pub fn update(&mut self, raw: Point2) -> Point2 {
        let candidate = match self.config.smoothing {
            Smoothing::Exponential { alpha } => self.exponential(raw, alpha),
            Smoothing::MovingAverage { window, alpha } => {
                let mean = self.push_and_average(raw, window);
                match alpha {
                    Some(alpha) => self.exponential(mean, alpha),
                    None => mean,
                }
            }
        };

        if let Some(prev) = self.smoothed {
            let threshold = self.config.jitter_threshold_px;
            if threshold > 0.0 && candidate.distance(&prev) < threshold {
                self.suppressed += 1;
                trace!("Pointer update suppressed by stability gate");
                return prev;
            }
        }

        self.smoothed = Some(candidate);
        candidate
    }

    fn exponential(&self, raw: Point2, alpha: f32) -> Point2 {
        match self.smoothed {
            Some(prev) => prev.lerp(&raw, alpha),
            None => raw,
        }
    }

    fn push_and_average(&mut self, raw: Point2, window: usize) -> Point2 {
        let window = window.max(1);
        while self.history.len() >= window {
            self.history.pop_front();
        }
        self.history.push_back(raw);
        let n = self.history.len() as f32;
        let (sx, sy) = self
            .history
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        Point2::new(sx / n, sy / n)
    }

    /// Last emitted position, if any.
    pub fn current(&self) -> Option<Point2> {
        self.smoothed
    }

    /// Clear history and the previous smoothed point.
    pub fn reset(&mut self) {
        self.history.clear();
        self.smoothed = None;
    }

    /// Generate s-expression for status output.
    pub fn status_sexp(&self) -> String {
        let current = self
            .smoothed
            .map(|p| format!("({:.1} {:.1})", p.x, p.y))
            .unwrap_or_else(|| "nil".to_string());
        format!(
            "(:smoothing :{} :history {} :jitter-threshold {:.1} :suppressed {} :current {})",
            self.config.smoothing.as_str(),
            self.history.len(),
            self.config.jitter_threshold_px,
            self.suppressed,
            current,
        )
    }
}

/// Linearly map a point in classifier-frame pixels onto the screen.
pub fn frame_to_screen(p: Point2, frame: FrameSize, screen: FrameSize) -> Point2 {
    let sx = screen.width as f32 / frame.width.max(1) as f32;
    let sy = screen.height as f32 / frame.height.max(1) as f32;
    screen.clamp(Point2::new(p.x * sx, p.y * sy))
}

// ── Tests ───────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_point_passes_through() {
        let mut f = PointerFilter::new(PointerConfig::exponential(0.3));
        assert_eq!(f.update(Point2::new(100.0, 50.0)), Point2::new(100.0, 50.0));
    }

    #[test]
    fn test_exponential_step() {
        let mut f = PointerFilter::new(PointerConfig::exponential(0.5));
        f.update(Point2::new(0.0, 0.0));
        let p = f.update(Point2::new(100.0, 40.0));
        assert!((p.x - 50.0).abs() < 1e-4);
        assert!((p.y - 20.0).abs() < 1e-4);
    }

    #[test]
    fn test_converges_for_any_alpha() {
        let target = Point2::new(640.0, 360.0);
        for alpha in [0.05, 0.2, 0.5, 0.7, 0.95, 1.0] {
            let mut f = PointerFilter::new(PointerConfig::exponential(alpha));
            f.update(Point2::new(0.0, 0.0));
            let mut out = Point2::default();
            for _ in 0..500 {
                out = f.update(target);
            }
            assert!(out.distance(&target) < 0.01, "alpha {} ended at {:?}", alpha, out);
        }
    }

    #[test]
    fn test_moving_average_converges() {
        let mut f = PointerFilter::new(PointerConfig {
            smoothing: Smoothing::MovingAverage {
                window: 4,
                alpha: Some(0.5),
            },
            jitter_threshold_px: 0.0,
        });
        f.update(Point2::new(0.0, 0.0));
        let target = Point2::new(10.0, 20.0);
        let mut out = Point2::default();
        for _ in 0..100 {
            out = f.update(target);
        }
        assert!(out.distance(&target) < 0.01, "ended at {:?}", out);
    }

    #[test]
    fn test_moving_average_window() {
        let mut f = PointerFilter::new(PointerConfig {
            smoothing: Smoothing::MovingAverage {
                window: 3,
                alpha: None,
            },
            jitter_threshold_px: 0.0,
        });
        f.update(Point2::new(0.0, 0.0));
        f.update(Point2::new(3.0, 0.0));
        let p = f.update(Point2::new(6.0, 0.0));
        assert!((p.x - 3.0).abs() < 1e-4);
        // Oldest point drops out.
        let p = f.update(Point2::new(9.0, 0.0));
        assert!((p.x - 6.0).abs() < 1e-4);
    }

    #[test]
    fn test_stability_gate_holds_still() {
        let mut f = PointerFilter::new(PointerConfig {
            smoothing: Smoothing::Exponential { alpha: 1.0 },
            jitter_threshold_px: 5.0,
        });
        f.update(Point2::new(100.0, 100.0));
        assert_eq!(f.update(Point2::new(102.0, 101.0)), Point2::new(100.0, 100.0));
        assert_eq!(f.update(Point2::new(110.0, 100.0)), Point2::new(110.0, 100.0));
    }

    #[test]
    fn test_reset_clears_state() {
        let mut f = PointerFilter::new(PointerConfig::exponential(0.1));
        f.update(Point2::new(0.0, 0.0));
        f.update(Point2::new(10.0, 10.0));
        f.reset();
        assert!(f.current().is_none());
        assert_eq!(f.update(Point2::new(500.0, 5.0)), Point2::new(500.0, 5.0));
    }

    #[test]
    fn test_frame_to_screen() {
        let p = frame_to_screen(
            Point2::new(320.0, 240.0),
            FrameSize::new(640, 480),
            FrameSize::new(1920, 1080),
        );
        assert_eq!(p, Point2::new(960.0, 540.0));
        let edge = frame_to_screen(
            Point2::new(640.0, 480.0),
            FrameSize::new(640, 480),
            FrameSize::new(1920, 1080),
        );
        assert_eq!(edge, Point2::new(1919.0, 1079.0));
    }

    #[test]
    fn test_status_sexp() {
        let mut f = PointerFilter::new(PointerConfig::default());
        f.update(Point2::new(1.0, 2.0));
        let s = f.status_sexp();
        assert!(s.contains(":smoothing :exponential"));
        assert!(s.contains(":current (1.0 2.0)"));
    }
}
