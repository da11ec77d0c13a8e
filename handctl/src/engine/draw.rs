//! Handwriting stroke tracking.
//!
//! The pen goes down while thumb and index are spread apart and lifts when
//! they close, with a hysteresis band between.  While down, the smoothed
//! pointer produces stroke segments.

use tracing::{debug, info, warn};

use super::action::Intent;
use super::landmarks::Point2;

/// Segments between large-canvas warnings.
const STROKE_WARN_INTERVAL: u64 = 500;

#[derive(Debug, Clone)]
pub struct DrawConfig {
    /// Pen goes down when the pinch distance reaches this (px).
    pub pen_down_px: f32,
    /// Pen lifts when the pinch distance falls to this (px).
    pub pen_up_px: f32,
    /// Shortest segment emitted (px).
    pub min_movement_px: f32,
}

impl Default for DrawConfig {
    fn default() -> Self {
        Self {
            pen_down_px: 50.0,
            pen_up_px: 35.0,
            min_movement_px: 2.0,
        }
    }
}

pub struct StrokeTracker {
    pub config: DrawConfig,
    pen_down: bool,
    last_point: Option<Point2>,
    segments: u64,
    strokes: u64,
}

impl StrokeTracker {
    pub fn new(config: DrawConfig) -> Self {
        Self {
            config,
            pen_down: false,
            last_point: None,
            segments: 0,
            strokes: 0,
        }
    }

    pub fn is_pen_down(&self) -> bool {
        self.pen_down
    }

    pub fn segment_count(&self) -> u64 {
        self.segments
    }

    pub fn stroke_count(&self) -> u64 {
        self.strokes
    }

    /// Advance one frame.  `None` distance means the hand is gone.
    ///
    /// A returned `StrokeEnd` tells the caller to reset the pointer filter.
    pub fn update(&mut self, pinch_distance: Option<f32>, pointer: Option<Point2>) -> Vec<Intent> {
        let Some(distance) = pinch_distance else {
            return self.lift();
        };

        if !self.pen_down && distance >= self.config.pen_down_px {
            debug!("Pen down at {:.0}px", distance);
            self.pen_down = true;
            self.last_point = pointer;
            return Vec::new();
        }
        if self.pen_down && distance <= self.config.pen_up_px {
            return self.lift();
        }
        if !self.pen_down {
            return Vec::new();
        }

        let Some(to) = pointer else {
            return Vec::new();
        };
        let Some(from) = self.last_point else {
            self.last_point = Some(to);
            return Vec::new();
        };
        if from.distance(&to) < self.config.min_movement_px {
            return Vec::new();
        }

        self.last_point = Some(to);
        self.segments += 1;
        if self.segments % STROKE_WARN_INTERVAL == 0 {
            warn!("Canvas holds {} stroke segments; consider clearing", self.segments);
        }
        vec![Intent::StrokeSegment { from, to }]
    }

    /// Lift the pen, ending the stroke in progress.
    pub fn lift(&mut self) -> Vec<Intent> {
        self.last_point = None;
        if !self.pen_down {
            return Vec::new();
        }
        self.pen_down = false;
        self.strokes += 1;
        debug!("Pen up, stroke {} ended", self.strokes);
        vec![Intent::StrokeEnd]
    }

    /// Forget the canvas.
    pub fn clear(&mut self) {
        info!("Canvas cleared ({} segments)", self.segments);
        self.pen_down = false;
        self.last_point = None;
        self.segments = 0;
        self.strokes = 0;
    }

    /// Generate s-expression for status output.
    pub fn status_sexp(&self) -> String {
        format!(
            "(:pen-down {} :segments {} :strokes {} :pen-down-px {:.0} :pen-up-px {:.0})",
            if self.pen_down { "t" } else { "nil" },
            self.segments,
            self.strokes,
            self.config.pen_down_px,
            self.config.pen_up_px,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> StrokeTracker {
        StrokeTracker::new(DrawConfig::default())
    }

    #[test]
    fn test_pen_hysteresis() {
        let mut t = tracker();
        t.update(Some(40.0), Some(Point2::new(0.0, 0.0)));
        assert!(!t.is_pen_down());
        t.update(Some(55.0), Some(Point2::new(0.0, 0.0)));
        assert!(t.is_pen_down());
        // Inside the band: stays down.
        t.update(Some(40.0), Some(Point2::new(0.0, 0.0)));
        assert!(t.is_pen_down());
        assert_eq!(t.update(Some(30.0), None), vec![Intent::StrokeEnd]);
        assert!(!t.is_pen_down());
    }

    #[test]
    fn test_segments_respect_min_movement() {
        let mut t = tracker();
        t.update(Some(60.0), Some(Point2::new(10.0, 10.0)));
        assert!(t.update(Some(60.0), Some(Point2::new(11.0, 10.0))).is_empty());
        assert_eq!(
            t.update(Some(60.0), Some(Point2::new(13.0, 10.0))),
            vec![Intent::StrokeSegment {
                from: Point2::new(10.0, 10.0),
                to: Point2::new(13.0, 10.0),
            }]
        );
        assert_eq!(t.segment_count(), 1);
    }

    #[test]
    fn test_tracking_loss_ends_stroke() {
        let mut t = tracker();
        t.update(Some(60.0), Some(Point2::new(0.0, 0.0)));
        assert_eq!(t.update(None, None), vec![Intent::StrokeEnd]);
        assert!(t.update(None, None).is_empty());
        assert_eq!(t.stroke_count(), 1);
    }

    #[test]
    fn test_no_segments_while_pen_up() {
        let mut t = tracker();
        for i in 0..10 {
            let out = t.update(Some(20.0), Some(Point2::new(i as f32 * 10.0, 0.0)));
            assert!(out.is_empty());
        }
    }

    #[test]
    fn test_clear_resets_counts() {
        let mut t = tracker();
        t.update(Some(60.0), Some(Point2::new(0.0, 0.0)));
        t.update(Some(60.0), Some(Point2::new(10.0, 0.0)));
        t.clear();
        assert_eq!(t.segment_count(), 0);
        assert!(!t.is_pen_down());
    }
}
