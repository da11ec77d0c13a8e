//! Per-frame hand pose classification.
//!
//! Maps one hand's landmarks to a discrete pose plus continuous features
//! (pinch distance and the pointer anchor).  Stateless; the rules live in a
//! priority-ordered table because poses overlap by construction.  The
//! two-hand clap is edge-detected separately by `ClapDetector`.

use tracing::debug;

use super::landmarks::{FrameSize, HandLandmark, HandLandmarks, Point2};

// ── Pose types ──────────────────────────────────────────────

/// Discrete pose label for a single frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoseKind {
    /// No hand in frame.
    NoHand,
    /// Landmark geometry is unusable (non-finite coordinates).
    Ambiguous,
    /// All five fingers closed, judged against the knuckles.
    Fist,
    /// All five fingers extended.
    OpenPalm,
    /// Thumb and index fingertips closer than the pinch threshold.
    Pinch,
    /// Generic extended-finger count with no more specific match.
    FingerCount(u8),
    /// Only the thumb extended.
    ThumbsUp,
    /// Index and middle extended, ring and pinky closed.
    PeaceSign,
    /// Only the pinky extended (thumb may be either way).
    PinkyOnly,
    /// Index and pinky extended, middle and ring closed.
    RockSign,
    /// Two palms brought together.  Produced by `ClapDetector` only.
    TwoHandClap,
}

impl PoseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoHand => "no-hand",
            Self::Ambiguous => "ambiguous",
            Self::Fist => "fist",
            Self::OpenPalm => "open-palm",
            Self::Pinch => "pinch",
            Self::FingerCount(0) => "finger-count-0",
            Self::FingerCount(1) => "finger-count-1",
            Self::FingerCount(2) => "finger-count-2",
            Self::FingerCount(3) => "finger-count-3",
            Self::FingerCount(4) => "finger-count-4",
            Self::FingerCount(_) => "finger-count",
            Self::ThumbsUp => "thumbs-up",
            Self::PeaceSign => "peace-sign",
            Self::PinkyOnly => "pinky-only",
            Self::RockSign => "rock-sign",
            Self::TwoHandClap => "two-hand-clap",
        }
    }
}

/// Which joints the fist test compares fingertips against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FistReference {
    /// Knuckles (MCP).  Tighter closure bar.
    Mcp,
    /// Middle joints (PIP).  Same bar as the generic closed test.
    Pip,
}

impl FistReference {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mcp => "mcp",
            Self::Pip => "pip",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "mcp" => Some(Self::Mcp),
            "pip" => Some(Self::Pip),
            _ => None,
        }
    }
}

// ── Config ──────────────────────────────────────────────────

/// Classifier thresholds.  Pixel values are resolution dependent.
#[derive(Debug, Clone)]
pub struct PoseConfig {
    /// Resolution of the frame the tracker ran on.
    pub frame: FrameSize,
    /// Thumb-index distance (px) below which the pose is a pinch.
    pub pinch_threshold_px: f32,
    /// Joint reference for the fist test.
    pub fist_reference: FistReference,
    /// Palm-base distance (px) below which two hands are clapping.
    pub clap_threshold_px: f32,
}

impl Default for PoseConfig {
    fn default() -> Self {
        Self {
            frame: FrameSize::new(640, 480),
            pinch_threshold_px: 35.0,
            fist_reference: FistReference::Mcp,
            clap_threshold_px: 100.0,
        }
    }
}

// ── Finger states ───────────────────────────────────────────

/// Extended flags in thumb, index, middle, ring, pinky order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FingerStates(pub [bool; 5]);

impl FingerStates {
    pub fn thumb(&self) -> bool {
        self.0[0]
    }
    pub fn index(&self) -> bool {
        self.0[1]
    }
    pub fn middle(&self) -> bool {
        self.0[2]
    }
    pub fn ring(&self) -> bool {
        self.0[3]
    }
    pub fn pinky(&self) -> bool {
        self.0[4]
    }

    /// Number of extended fingers.
    pub fn count(&self) -> u8 {
        self.0.iter().filter(|e| **e).count() as u8
    }
}

/// Tip / middle-joint pairs for the four non-thumb fingers.
const TIP_PIP: [(HandLandmark, HandLandmark); 4] = [
    (HandLandmark::IndexTip, HandLandmark::IndexPip),
    (HandLandmark::MiddleTip, HandLandmark::MiddlePip),
    (HandLandmark::RingTip, HandLandmark::RingPip),
    (HandLandmark::PinkyTip, HandLandmark::PinkyPip),
];

/// Tip / knuckle pairs for the four non-thumb fingers.
const TIP_MCP: [(HandLandmark, HandLandmark); 4] = [
    (HandLandmark::IndexTip, HandLandmark::IndexMcp),
    (HandLandmark::MiddleTip, HandLandmark::MiddleMcp),
    (HandLandmark::RingTip, HandLandmark::RingMcp),
    (HandLandmark::PinkyTip, HandLandmark::PinkyMcp),
];

/// Generic extension test.
///
/// Non-thumb fingers are extended when the tip is above (smaller y than)
/// the PIP joint.  The thumb flexes sideways, so it is extended when its
/// tip is left of (smaller x than) its IP joint.  That thumb test assumes
/// a mirrored view of a right hand.
pub fn finger_states(hand: &HandLandmarks) -> FingerStates {
    let thumb = hand.get(HandLandmark::ThumbTip).x < hand.get(HandLandmark::ThumbIp).x;
    let mut states = [thumb, false, false, false, false];
    for (slot, (tip, pip)) in states[1..].iter_mut().zip(TIP_PIP) {
        *slot = hand.get(tip).y < hand.get(pip).y;
    }
    FingerStates(states)
}

/// Fist test.  Every finger must be closed.
///
/// The thumb is closed when its tip crosses the palm past the thumb MCP
/// (tip x greater than MCP x).  The other fingers are closed when their
/// tips sit below the reference joint.
pub fn is_fist(hand: &HandLandmarks, reference: FistReference) -> bool {
    let thumb_closed = hand.get(HandLandmark::ThumbTip).x > hand.get(HandLandmark::ThumbMcp).x;
    if !thumb_closed {
        return false;
    }
    let pairs = match reference {
        FistReference::Mcp => TIP_MCP,
        FistReference::Pip => TIP_PIP,
    };
    pairs
        .iter()
        .all(|(tip, joint)| hand.get(*tip).y > hand.get(*joint).y)
}

/// Thumb-tip to index-tip distance in pixels of the classifier frame.
pub fn pinch_distance(hand: &HandLandmarks, frame: FrameSize) -> f32 {
    let thumb = hand.pixel(HandLandmark::ThumbTip, frame);
    let index = hand.pixel(HandLandmark::IndexTip, frame);
    thumb.distance(&index)
}

// ── Rule table ──────────────────────────────────────────────

/// Everything a pose rule may look at.
#[derive(Debug, Clone, Copy)]
pub struct PoseFeatures {
    pub fingers: FingerStates,
    pub fist: bool,
    pub pinch_distance: f32,
    pub pinch_threshold: f32,
}

/// One entry in the pose table.
pub struct PoseRule {
    pub kind: PoseKind,
    /// Higher wins.  The table is stored in descending order.
    pub priority: u8,
    pub matches: fn(&PoseFeatures) -> bool,
}

fn rule_fist(f: &PoseFeatures) -> bool {
    f.fist
}
fn rule_open_palm(f: &PoseFeatures) -> bool {
    f.fingers.count() == 5
}
fn rule_three(f: &PoseFeatures) -> bool {
    f.fingers.count() == 3
}
fn rule_thumbs_up(f: &PoseFeatures) -> bool {
    f.fingers.count() == 1 && f.fingers.thumb()
}
fn rule_pinky_only(f: &PoseFeatures) -> bool {
    let x = &f.fingers;
    !x.index() && !x.middle() && !x.ring() && x.pinky()
}
fn rule_rock(f: &PoseFeatures) -> bool {
    let x = &f.fingers;
    x.index() && !x.middle() && !x.ring() && x.pinky()
}
fn rule_peace(f: &PoseFeatures) -> bool {
    let x = &f.fingers;
    x.count() == 2 && x.index() && x.middle() && !x.ring() && !x.pinky()
}
fn rule_four(f: &PoseFeatures) -> bool {
    f.fingers.count() == 4
}
fn rule_pinch(f: &PoseFeatures) -> bool {
    f.pinch_distance < f.pinch_threshold
}
fn rule_two(f: &PoseFeatures) -> bool {
    f.fingers.count() == 2
}
fn rule_one(f: &PoseFeatures) -> bool {
    f.fingers.count() == 1
}
fn rule_zero(f: &PoseFeatures) -> bool {
    f.fingers.count() == 0
}

/// Pose rules, highest priority first.
///
/// Known overlaps: three fingers beats a rock sign with the thumb out
/// (the thumb-index-pinky hand is the three-finger gesture), and the
/// generic counts at the bottom catch whatever the signs above reject.
pub static POSE_RULES: &[PoseRule] = &[
    PoseRule { kind: PoseKind::Fist, priority: 120, matches: rule_fist },
    PoseRule { kind: PoseKind::OpenPalm, priority: 110, matches: rule_open_palm },
    PoseRule { kind: PoseKind::FingerCount(3), priority: 100, matches: rule_three },
    PoseRule { kind: PoseKind::ThumbsUp, priority: 90, matches: rule_thumbs_up },
    PoseRule { kind: PoseKind::PinkyOnly, priority: 80, matches: rule_pinky_only },
    PoseRule { kind: PoseKind::RockSign, priority: 70, matches: rule_rock },
    PoseRule { kind: PoseKind::PeaceSign, priority: 60, matches: rule_peace },
    PoseRule { kind: PoseKind::FingerCount(4), priority: 50, matches: rule_four },
    PoseRule { kind: PoseKind::Pinch, priority: 40, matches: rule_pinch },
    PoseRule { kind: PoseKind::FingerCount(2), priority: 12, matches: rule_two },
    PoseRule { kind: PoseKind::FingerCount(1), priority: 11, matches: rule_one },
    PoseRule { kind: PoseKind::FingerCount(0), priority: 10, matches: rule_zero },
];

/// Pick the highest-priority matching rule.
pub fn resolve(features: &PoseFeatures) -> PoseKind {
    POSE_RULES
        .iter()
        .find(|rule| (rule.matches)(features))
        .map(|rule| rule.kind)
        .unwrap_or(PoseKind::Ambiguous)
}

// ── Classification ──────────────────────────────────────────

/// Result of classifying one hand for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseClassification {
    pub kind: PoseKind,
    pub fingers: FingerStates,
    /// Thumb-index distance in pixels; `None` without a usable hand.
    pub pinch_distance: Option<f32>,
    /// Index fingertip in pixels of the classifier frame.
    pub anchor: Option<Point2>,
}

impl PoseClassification {
    pub fn no_hand() -> Self {
        Self {
            kind: PoseKind::NoHand,
            fingers: FingerStates::default(),
            pinch_distance: None,
            anchor: None,
        }
    }

    pub fn ambiguous() -> Self {
        Self {
            kind: PoseKind::Ambiguous,
            ..Self::no_hand()
        }
    }

    pub fn has_hand(&self) -> bool {
        !matches!(self.kind, PoseKind::NoHand)
    }
}

/// Classify a single hand.  Total over its input: bad geometry yields
/// `Ambiguous` rather than an error.
pub fn classify(hand: &HandLandmarks, config: &PoseConfig) -> PoseClassification {
    if !hand.is_finite() {
        debug!("Ambiguous pose: non-finite landmarks");
        return PoseClassification::ambiguous();
    }

    let fingers = finger_states(hand);
    let distance = pinch_distance(hand, config.frame);
    let features = PoseFeatures {
        fingers,
        fist: is_fist(hand, config.fist_reference),
        pinch_distance: distance,
        pinch_threshold: config.pinch_threshold_px,
    };

    PoseClassification {
        kind: resolve(&features),
        fingers,
        pinch_distance: Some(distance),
        anchor: Some(hand.pixel(HandLandmark::IndexTip, config.frame)),
    }
}

/// Classify the primary hand, or report `NoHand`.
pub fn classify_primary(hands: &[HandLandmarks], config: &PoseConfig) -> PoseClassification {
    match hands.first() {
        Some(hand) => classify(hand, config),
        None => PoseClassification::no_hand(),
    }
}

// ── Two-hand clap ───────────────────────────────────────────

/// Edge detector for palms coming together.
///
/// Independent of the gesture debouncer: it fires once each time the
/// palm-base distance drops below the threshold from above.
#[derive(Debug, Clone)]
pub struct ClapDetector {
    pub threshold_px: f32,
    palms_close: bool,
    last_distance_px: Option<f32>,
}

impl ClapDetector {
    pub fn new(threshold_px: f32) -> Self {
        Self {
            threshold_px,
            palms_close: false,
            last_distance_px: None,
        }
    }

    /// Feed one frame's hands.  Returns true on the frame the clap lands.
    ///
    /// Only evaluated with exactly two hands; other frames leave the
    /// edge state untouched.
    pub fn update(&mut self, hands: &[HandLandmarks], frame: FrameSize) -> bool {
        let [a, b] = hands else {
            return false;
        };
        let pa = a.pixel(HandLandmark::PALM_BASE, frame);
        let pb = b.pixel(HandLandmark::PALM_BASE, frame);
        self.update_distance(pa.distance(&pb))
    }

    /// Edge logic over a precomputed palm distance.
    pub fn update_distance(&mut self, distance_px: f32) -> bool {
        self.last_distance_px = Some(distance_px);
        let close = distance_px < self.threshold_px;
        let fired = close && !self.palms_close;
        self.palms_close = close;
        if fired {
            debug!("Clap detected at {:.0}px", distance_px);
        }
        fired
    }

    pub fn last_distance_px(&self) -> Option<f32> {
        self.last_distance_px
    }

    pub fn reset(&mut self) {
        self.palms_close = false;
        self.last_distance_px = None;
    }
}

// ── Test helpers ────────────────────────────────────────────

/// Build a hand from an extended-finger pattern.
///
/// Upright hand, palm toward the camera, mirrored view.  Thumb tip
/// and index tip are kept well apart so no pinch is reported.
#[cfg(test)]
pub(crate) fn hand_with_fingers(pattern: [bool; 5]) -> HandLandmarks {
    use super::landmarks::{set_landmark, test_hand_at};

    let mut hand = test_hand_at(0.5, 0.5);
    set_landmark(&mut hand, HandLandmark::Wrist, 0.5, 0.9);
    // Thumb: MCP at 0.40, IP at 0.35.  Extended tip sits left of the IP,
    // closed tip crosses the palm to the right of the MCP.
    set_landmark(&mut hand, HandLandmark::ThumbMcp, 0.40, 0.70);
    set_landmark(&mut hand, HandLandmark::ThumbIp, 0.35, 0.65);
    let thumb_x = if pattern[0] { 0.25 } else { 0.60 };
    set_landmark(&mut hand, HandLandmark::ThumbTip, thumb_x, 0.70);

    let columns = [
        (HandLandmark::IndexMcp, HandLandmark::IndexPip, HandLandmark::IndexTip, 0.42),
        (HandLandmark::MiddleMcp, HandLandmark::MiddlePip, HandLandmark::MiddleTip, 0.50),
        (HandLandmark::RingMcp, HandLandmark::RingPip, HandLandmark::RingTip, 0.58),
        (HandLandmark::PinkyMcp, HandLandmark::PinkyPip, HandLandmark::PinkyTip, 0.66),
    ];
    for (extended, (mcp, pip, tip, x)) in pattern[1..].iter().zip(columns) {
        set_landmark(&mut hand, mcp, x, 0.60);
        set_landmark(&mut hand, pip, x, 0.45);
        // Extended: tip well above the PIP.  Closed: tip folded below the knuckle.
        let tip_y = if *extended { 0.20 } else { 0.65 };
        set_landmark(&mut hand, tip, x, tip_y);
    }
    hand
}

// ── Tests ───────────────────────────────────────────────────
