//! Landmark frame data structures.
//!
//! Models the 21 hand landmarks and the refined face mesh produced by the
//! external tracker.  Coordinates are normalized to [0,1] image space with
//! Y growing downward.  Frames are read-only and never retained.

use crate::error::LandmarkError;

// ── Hand landmark definitions ───────────────────────────────

/// The 21 hand landmarks, in the tracker's fixed index order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandLandmark {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexMcp,
    IndexPip,
    IndexDip,
    IndexTip,
    MiddleMcp,
    MiddlePip,
    MiddleDip,
    MiddleTip,
    RingMcp,
    RingPip,
    RingDip,
    RingTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

/// Total number of landmarks per hand.
pub const HAND_LANDMARK_COUNT: usize = 21;

/// Minimum face mesh size.
pub const FACE_LANDMARK_COUNT: usize = 468;

/// Face mesh size with iris refinement (adds 10 iris points).
pub const REFINED_FACE_LANDMARK_COUNT: usize = 478;

/// Left iris ring indices in the refined face mesh.
pub const LEFT_IRIS: [usize; 4] = [474, 475, 476, 477];

/// Right iris ring indices in the refined face mesh.
pub const RIGHT_IRIS: [usize; 4] = [469, 470, 471, 472];

impl HandLandmark {
    /// Palm base, used for two-hand proximity.
    pub const PALM_BASE: HandLandmark = HandLandmark::MiddleMcp;

    /// Convert landmark enum to the tracker index (0-20).
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// String representation for logs and status output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wrist => "wrist",
            Self::ThumbCmc => "thumb-cmc",
            Self::ThumbMcp => "thumb-mcp",
            Self::ThumbIp => "thumb-ip",
            Self::ThumbTip => "thumb-tip",
            Self::IndexMcp => "index-mcp",
            Self::IndexPip => "index-pip",
            Self::IndexDip => "index-dip",
            Self::IndexTip => "index-tip",
            Self::MiddleMcp => "middle-mcp",
            Self::MiddlePip => "middle-pip",
            Self::MiddleDip => "middle-dip",
            Self::MiddleTip => "middle-tip",
            Self::RingMcp => "ring-mcp",
            Self::RingPip => "ring-pip",
            Self::RingDip => "ring-dip",
            Self::RingTip => "ring-tip",
            Self::PinkyMcp => "pinky-mcp",
            Self::PinkyPip => "pinky-pip",
            Self::PinkyDip => "pinky-dip",
            Self::PinkyTip => "pinky-tip",
        }
    }
}

// ── Points and sizes ────────────────────────────────────────

/// A 2-D point.  Normalized or pixel space depending on context.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: &Point2) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Flip horizontally in normalized space.
    pub fn mirrored(&self) -> Self {
        Self::new(1.0 - self.x, self.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Linear interpolation toward `other` by `t`.
    pub fn lerp(&self, other: &Point2, t: f32) -> Self {
        Self::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }
}

/// Pixel dimensions of an image or screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Scale a normalized point to pixels.
    pub fn to_pixels(&self, p: Point2) -> Point2 {
        Point2::new(p.x * self.width as f32, p.y * self.height as f32)
    }

    /// Clamp a pixel point to `[0, dim - 1]` on each axis.
    pub fn clamp(&self, p: Point2) -> Point2 {
        let max_x = self.width.saturating_sub(1) as f32;
        let max_y = self.height.saturating_sub(1) as f32;
        Point2::new(p.x.clamp(0.0, max_x), p.y.clamp(0.0, max_y))
    }
}

// ── Hand landmarks ──────────────────────────────────────────

/// Landmarks for one detected hand.
#[derive(Debug, Clone, PartialEq)]
pub struct HandLandmarks {
    points: Vec<Point2>,
}

impl HandLandmarks {
    /// Wrap a tracker landmark list.  Must contain exactly 21 points.
    pub fn new(points: Vec<Point2>) -> Result<Self, LandmarkError> {
        if points.len() != HAND_LANDMARK_COUNT {
            return Err(LandmarkError::WrongCount {
                expected: HAND_LANDMARK_COUNT,
                got: points.len(),
            });
        }
        Ok(Self { points })
    }

    /// Normalized position of a landmark.
    pub fn get(&self, lm: HandLandmark) -> Point2 {
        self.points[lm.index()]
    }

    /// Position of a landmark in pixels of the classifier input frame.
    pub fn pixel(&self, lm: HandLandmark, size: FrameSize) -> Point2 {
        size.to_pixels(self.get(lm))
    }

    pub fn points(&self) -> &[Point2] {
        &self.points
    }

    /// Whether every landmark has finite coordinates.
    pub fn is_finite(&self) -> bool {
        self.points.iter().all(Point2::is_finite)
    }

    pub fn mirrored(&self) -> Self {
        Self {
            points: self.points.iter().map(Point2::mirrored).collect(),
        }
    }
}

// ── Face landmarks ──────────────────────────────────────────

/// Face mesh landmarks for one detected face.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceLandmarks {
    points: Vec<Point2>,
}

impl FaceLandmarks {
    /// Wrap a face mesh.  Needs at least 468 points.
    pub fn new(points: Vec<Point2>) -> Result<Self, LandmarkError> {
        if points.len() < FACE_LANDMARK_COUNT {
            return Err(LandmarkError::TooFewFacePoints {
                min: FACE_LANDMARK_COUNT,
                got: points.len(),
            });
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[Point2] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Whether iris refinement points are present.
    pub fn has_iris(&self) -> bool {
        self.points.len() >= REFINED_FACE_LANDMARK_COUNT
    }

    /// Midpoint of both iris rings in normalized space.
    ///
    /// Returns `None` for an unrefined mesh.
    pub fn iris_center(&self) -> Option<Point2> {
        if !self.has_iris() {
            return None;
        }
        let ring_mean = |ring: &[usize; 4]| {
            let (sx, sy) = ring.iter().fold((0.0f32, 0.0f32), |(sx, sy), &i| {
                (sx + self.points[i].x, sy + self.points[i].y)
            });
            Point2::new(sx / ring.len() as f32, sy / ring.len() as f32)
        };
        let left = ring_mean(&LEFT_IRIS);
        let right = ring_mean(&RIGHT_IRIS);
        let center = left.lerp(&right, 0.5);
        center.is_finite().then_some(center)
    }

    pub fn mirrored(&self) -> Self {
        Self {
            points: self.points.iter().map(Point2::mirrored).collect(),
        }
    }
}

// ── Frame ───────────────────────────────────────────────────

/// Everything the tracker produced for one camera frame.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkFrame {
    /// Capture time in seconds (monotonic).
    pub timestamp_s: f64,
    /// Detected hands, primary hand first.
    pub hands: Vec<HandLandmarks>,
    /// Detected face, if face tracking is running.
    pub face: Option<FaceLandmarks>,
}

impl LandmarkFrame {
    pub fn new(timestamp_s: f64) -> Self {
        Self {
            timestamp_s,
            hands: Vec::new(),
            face: None,
        }
    }

    pub fn with_hand(mut self, hand: HandLandmarks) -> Self {
        self.hands.push(hand);
        self
    }

    pub fn with_face(mut self, face: FaceLandmarks) -> Self {
        self.face = Some(face);
        self
    }

    /// The hand that drives the pointer and single-hand gestures.
    pub fn primary_hand(&self) -> Option<&HandLandmarks> {
        self.hands.first()
    }

    /// Flip every landmark horizontally.
    pub fn mirrored(&self) -> Self {
        Self {
            timestamp_s: self.timestamp_s,
            hands: self.hands.iter().map(HandLandmarks::mirrored).collect(),
            face: self.face.as_ref().map(FaceLandmarks::mirrored),
        }
    }
}

// ── Test helpers ────────────────────────────────────────────

/// A hand with every landmark at the same point.
#[cfg(test)]
pub(crate) fn test_hand_at(x: f32, y: f32) -> HandLandmarks {
    HandLandmarks {
        points: vec![Point2::new(x, y); HAND_LANDMARK_COUNT],
    }
}

#[cfg(test)]
pub(crate) fn set_landmark(hand: &mut HandLandmarks, lm: HandLandmark, x: f32, y: f32) {
    hand.points[lm.index()] = Point2::new(x, y);
}

/// A refined face mesh with both iris rings centred on `(x, y)`.
#[cfg(test)]
pub(crate) fn test_face_looking_at(x: f32, y: f32) -> FaceLandmarks {
    let mut points = vec![Point2::new(0.5, 0.5); REFINED_FACE_LANDMARK_COUNT];
    let offsets = [(-0.01, 0.0), (0.0, -0.01), (0.01, 0.0), (0.0, 0.01)];
    for ring in [LEFT_IRIS, RIGHT_IRIS] {
        for (i, (dx, dy)) in ring.iter().zip(offsets) {
            points[*i] = Point2::new(x + dx, y + dy);
        }
    }
    FaceLandmarks { points }
}

// ── Tests ───────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landmark_indices() {
        assert_eq!(HandLandmark::Wrist.index(), 0);
        assert_eq!(HandLandmark::ThumbMcp.index(), 2);
        assert_eq!(HandLandmark::ThumbIp.index(), 3);
        assert_eq!(HandLandmark::ThumbTip.index(), 4);
        assert_eq!(HandLandmark::IndexPip.index(), 6);
        assert_eq!(HandLandmark::IndexTip.index(), 8);
        assert_eq!(HandLandmark::PALM_BASE.index(), 9);
        assert_eq!(HandLandmark::MiddlePip.index(), 10);
        assert_eq!(HandLandmark::MiddleTip.index(), 12);
        assert_eq!(HandLandmark::RingMcp.index(), 13);
        assert_eq!(HandLandmark::RingTip.index(), 16);
        assert_eq!(HandLandmark::PinkyMcp.index(), 17);
        assert_eq!(HandLandmark::PinkyPip.index(), 18);
        assert_eq!(HandLandmark::PinkyTip.index(), 20);
    }

    #[test]
    fn test_hand_wrong_count() {
        let err = HandLandmarks::new(vec![Point2::default(); 10]).unwrap_err();
        assert_eq!(err, LandmarkError::WrongCount { expected: 21, got: 10 });
    }

    #[test]
    fn test_pixel_scaling() {
        let mut hand = test_hand_at(0.0, 0.0);
        set_landmark(&mut hand, HandLandmark::IndexTip, 0.5, 0.25);
        let p = hand.pixel(HandLandmark::IndexTip, FrameSize::new(640, 480));
        assert!((p.x - 320.0).abs() < 1e-4);
        assert!((p.y - 120.0).abs() < 1e-4);
    }

    #[test]
    fn test_mirror_flips_x_only() {
        let mut hand = test_hand_at(0.0, 0.0);
        set_landmark(&mut hand, HandLandmark::ThumbTip, 0.2, 0.7);
        let m = hand.mirrored();
        let p = m.get(HandLandmark::ThumbTip);
        assert!((p.x - 0.8).abs() < 1e-6);
        assert!((p.y - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_iris_center() {
        let face = test_face_looking_at(0.4, 0.6);
        let c = face.iris_center().unwrap();
        assert!((c.x - 0.4).abs() < 1e-5, "got {:?}", c);
        assert!((c.y - 0.6).abs() < 1e-5, "got {:?}", c);
    }

    #[test]
    fn test_unrefined_face_has_no_iris() {
        let face = FaceLandmarks::new(vec![Point2::new(0.5, 0.5); FACE_LANDMARK_COUNT]).unwrap();
        assert!(!face.has_iris());
        assert!(face.iris_center().is_none());
    }

    #[test]
    fn test_face_too_small() {
        assert!(FaceLandmarks::new(vec![Point2::default(); 100]).is_err());
    }

    #[test]
    fn test_clamp_to_screen() {
        let screen = FrameSize::new(1920, 1080);
        let p = screen.clamp(Point2::new(-5.0, 2000.0));
        assert_eq!(p, Point2::new(0.0, 1079.0));
    }

    #[test]
    fn test_primary_hand() {
        let frame = LandmarkFrame::new(0.0);
        assert!(frame.primary_hand().is_none());
        let frame = frame.with_hand(test_hand_at(0.1, 0.1));
        assert!(frame.primary_hand().is_some());
    }
}
