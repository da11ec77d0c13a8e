//! Gesture debouncing.
//!
//! Turns the noisy per-frame pose label into committed gesture events.
//! A single global refractory counter, in frames, blocks every gesture kind
//! after a commit so adjacent poses seen mid-transition cannot double-fire.

use tracing::{debug, info};

use super::pose::PoseKind;

// ── Gesture kinds ───────────────────────────────────────────

/// Discrete gestures that can be committed.
///
/// Pinch is absent: it drives the interaction machine continuously.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GestureKind {
    OneFinger,
    ThreeFingers,
    FourFingers,
    Fist,
    OpenPalm,
    ThumbsUp,
    PeaceSign,
    PinkyOnly,
    RockSign,
}

impl GestureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneFinger => "one-finger",
            Self::ThreeFingers => "three-fingers",
            Self::FourFingers => "four-fingers",
            Self::Fist => "fist",
            Self::OpenPalm => "open-palm",
            Self::ThumbsUp => "thumbs-up",
            Self::PeaceSign => "peace-sign",
            Self::PinkyOnly => "pinky-only",
            Self::RockSign => "rock-sign",
        }
    }

    /// Gesture a pose would commit, if any.
    pub fn from_pose(pose: PoseKind) -> Option<Self> {
        match pose {
            PoseKind::FingerCount(1) => Some(Self::OneFinger),
            PoseKind::FingerCount(3) => Some(Self::ThreeFingers),
            PoseKind::FingerCount(4) => Some(Self::FourFingers),
            PoseKind::Fist => Some(Self::Fist),
            PoseKind::OpenPalm => Some(Self::OpenPalm),
            PoseKind::ThumbsUp => Some(Self::ThumbsUp),
            PoseKind::PeaceSign => Some(Self::PeaceSign),
            PoseKind::PinkyOnly => Some(Self::PinkyOnly),
            PoseKind::RockSign => Some(Self::RockSign),
            _ => None,
        }
    }
}

/// A committed gesture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureEvent {
    pub kind: GestureKind,
    /// Frame index the gesture was committed on.
    pub frame: u64,
    pub timestamp_s: f64,
}

impl GestureEvent {
    pub fn to_sexp(&self) -> String {
        format!(
            "(:type :event :event :gesture :kind :{} :frame {} :t {:.3})",
            self.kind.as_str(),
            self.frame,
            self.timestamp_s,
        )
    }
}

// ── Config ──────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct DebounceConfig {
    /// Refractory period after a commit, in frames.
    pub cooldown_frames: u32,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            cooldown_frames: 30,
        }
    }
}

// ── Debouncer ───────────────────────────────────────────────

/// Global-cooldown gesture debouncer for the primary hand.
pub struct GestureDebouncer {
    pub config: DebounceConfig,
    cooldown_remaining: u32,
    /// Gestures that commit in the current mode.
    actionable: Vec<GestureKind>,
    committed_total: u64,
    last_event: Option<GestureEvent>,
}

impl GestureDebouncer {
    pub fn new(config: DebounceConfig) -> Self {
        Self {
            config,
            cooldown_remaining: 0,
            actionable: Vec::new(),
            committed_total: 0,
            last_event: None,
        }
    }

    /// Replace the set of gestures that commit.
    ///
    /// The running cooldown is kept, so a mode switch triggered by a
    /// gesture still blocks the first gesture of the new mode.
    pub fn set_actionable(&mut self, kinds: &[GestureKind]) {
        self.actionable = kinds.to_vec();
    }

    pub fn is_actionable(&self, kind: GestureKind) -> bool {
        self.actionable.contains(&kind)
    }

    /// Feed one frame's pose.  Must be called every frame, including
    /// frames with no hand, so the cooldown keeps counting down.
    pub fn observe(&mut self, pose: PoseKind, frame: u64, timestamp_s: f64) -> Option<GestureEvent> {
        if self.cooldown_remaining > 0 {
            self.cooldown_remaining -= 1;
            return None;
        }

        let kind = GestureKind::from_pose(pose)?;
        if !self.is_actionable(kind) {
            return None;
        }

        self.cooldown_remaining = self.config.cooldown_frames;
        self.committed_total += 1;
        let event = GestureEvent {
            kind,
            frame,
            timestamp_s,
        };
        self.last_event = Some(event);
        info!(
            gesture = kind.as_str(),
            frame,
            "Gesture committed, cooldown {} frames",
            self.config.cooldown_frames
        );
        Some(event)
    }

    pub fn cooldown_remaining(&self) -> u32 {
        self.cooldown_remaining
    }

    pub fn last_event(&self) -> Option<&GestureEvent> {
        self.last_event.as_ref()
    }

    /// Clear the cooldown and history.
    pub fn reset(&mut self) {
        debug!("Debouncer reset");
        self.cooldown_remaining = 0;
        self.last_event = None;
    }

    /// Generate s-expression for status output.
    pub fn status_sexp(&self) -> String {
        let last = self
            .last_event
            .map(|e| format!(":{}", e.kind.as_str()))
            .unwrap_or_else(|| "nil".to_string());
        let actionable: Vec<String> = self
            .actionable
            .iter()
            .map(|k| format!(":{}", k.as_str()))
            .collect();
        format!(
            "(:cooldown-frames {} :cooldown-remaining {} :committed {} :last {} :actionable ({}))",
            self.config.cooldown_frames,
            self.cooldown_remaining,
            self.committed_total,
            last,
            actionable.join(" "),
        )
    }
}

// ── Tests ───────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [GestureKind; 9] = [
        GestureKind::OneFinger,
        GestureKind::ThreeFingers,
        GestureKind::FourFingers,
        GestureKind::Fist,
        GestureKind::OpenPalm,
        GestureKind::ThumbsUp,
        GestureKind::PeaceSign,
        GestureKind::PinkyOnly,
        GestureKind::RockSign,
    ];

    fn debouncer(cooldown: u32) -> GestureDebouncer {
        let mut d = GestureDebouncer::new(DebounceConfig {
            cooldown_frames: cooldown,
        });
        d.set_actionable(&ALL);
        d
    }

    #[test]
    fn test_commits_actionable_pose() {
        let mut d = debouncer(30);
        let event = d.observe(PoseKind::Fist, 0, 0.0).unwrap();
        assert_eq!(event.kind, GestureKind::Fist);
        assert_eq!(d.cooldown_remaining(), 30);
    }

    #[test]
    fn test_non_actionable_pose_ignored() {
        let mut d = debouncer(30);
        d.set_actionable(&[GestureKind::Fist]);
        assert!(d.observe(PoseKind::OpenPalm, 0, 0.0).is_none());
        assert!(d.observe(PoseKind::Pinch, 1, 0.0).is_none());
        assert!(d.observe(PoseKind::NoHand, 2, 0.0).is_none());
        assert_eq!(d.cooldown_remaining(), 0);
    }

    #[test]
    fn test_silent_while_cooling_down() {
        let mut d = debouncer(30);
        assert!(d.observe(PoseKind::Fist, 0, 0.0).is_some());
        let poses = [
            PoseKind::Fist,
            PoseKind::OpenPalm,
            PoseKind::FingerCount(3),
            PoseKind::NoHand,
            PoseKind::RockSign,
        ];
        for frame in 1..=30u64 {
            assert!(d.cooldown_remaining() > 0);
            let pose = poses[frame as usize % poses.len()];
            assert!(
                d.observe(pose, frame, 0.0).is_none(),
                "frame {} pose {:?} fired during cooldown",
                frame,
                pose,
            );
        }
        assert_eq!(d.cooldown_remaining(), 0);
        assert!(d.observe(PoseKind::OpenPalm, 31, 0.0).is_some());
    }

    #[test]
    fn test_events_spaced_by_cooldown() {
        let mut d = debouncer(10);
        let frames: Vec<u64> = (0..100u64)
            .filter_map(|f| d.observe(PoseKind::ThumbsUp, f, 0.0))
            .map(|e| e.frame)
            .collect();
        assert!(frames.len() > 1);
        for pair in frames.windows(2) {
            assert!(pair[1] - pair[0] >= 10, "events too close: {:?}", frames);
        }
    }

    #[test]
    fn test_cooldown_counts_without_hand() {
        let mut d = debouncer(5);
        d.observe(PoseKind::Fist, 0, 0.0);
        for frame in 1..=5 {
            d.observe(PoseKind::NoHand, frame, 0.0);
        }
        assert_eq!(d.cooldown_remaining(), 0);
    }

    #[test]
    fn test_from_pose_mapping() {
        assert_eq!(GestureKind::from_pose(PoseKind::FingerCount(3)), Some(GestureKind::ThreeFingers));
        assert_eq!(GestureKind::from_pose(PoseKind::FingerCount(2)), None);
        assert_eq!(GestureKind::from_pose(PoseKind::Pinch), None);
        assert_eq!(GestureKind::from_pose(PoseKind::TwoHandClap), None);
        assert_eq!(GestureKind::from_pose(PoseKind::Ambiguous), None);
    }

    #[test]
    fn test_reset_clears_cooldown() {
        let mut d = debouncer(30);
        d.observe(PoseKind::Fist, 0, 0.0);
        d.reset();
        assert_eq!(d.cooldown_remaining(), 0);
        assert!(d.last_event().is_none());
    }

    #[test]
    fn test_status_sexp() {
        let mut d = debouncer(30);
        d.set_actionable(&[GestureKind::Fist]);
        d.observe(PoseKind::Fist, 0, 0.0);
        let s = d.status_sexp();
        assert!(s.contains(":cooldown-remaining 30"));
        assert!(s.contains(":last :fist"));
        assert!(s.contains(":actionable (:fist)"));
    }

    #[test]
    fn test_event_sexp() {
        let e = GestureEvent {
            kind: GestureKind::PeaceSign,
            frame: 7,
            timestamp_s: 1.5,
        };
        assert_eq!(
            e.to_sexp(),
            "(:type :event :event :gesture :kind :peace-sign :frame 7 :t 1.500)"
        );
    }
}
