//! Press / hold / drag / double-click state machine.
//!
//! Click and drag come from the continuous pinch distance, with a
//! hysteresis latch so the boundary does not flicker.  Right click and
//! scroll toggling arrive as commands from committed gestures.  Losing
//! the hand always lands in `Neutral` with every button released.

use tracing::{debug, info};

use super::action::Intent;
use super::landmarks::Point2;
use super::pose::PoseKind;

// ── Config ──────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct InteractionConfig {
    /// Pinched when the distance drops below this (px).
    pub pinch_on_px: f32,
    /// Released when the distance rises above this (px).
    pub pinch_off_px: f32,
    /// Pinch held longer than this (s) becomes a drag.
    pub hold_threshold_s: f64,
    /// Two releases closer than this (s) make a double click.
    pub double_click_window_s: f64,
    /// Vertical px per scroll unit.
    pub scroll_divisor: f32,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            pinch_on_px: 35.0,
            pinch_off_px: 45.0,
            hold_threshold_s: 0.3,
            double_click_window_s: 0.5,
            scroll_divisor: 10.0,
        }
    }
}

// ── State ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InteractionState {
    Neutral,
    /// Pinched, not yet long enough to be a drag.
    PressPending { since: f64 },
    /// Primary button held.
    Dragging { since: f64 },
    /// Right click fired; waiting for the triggering pose to end.
    RightHeld { pose: PoseKind },
    /// Vertical motion scrolls.  Anchor is set on the first pointer sample.
    Scrolling { anchor_y: Option<f32> },
}

impl InteractionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Neutral => "neutral",
            Self::PressPending { .. } => "press-pending",
            Self::Dragging { .. } => "dragging",
            Self::RightHeld { .. } => "right-held",
            Self::Scrolling { .. } => "scrolling",
        }
    }
}

/// Discrete requests routed from committed gestures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionCommand {
    RightClick,
    ToggleScroll,
}

/// Everything the machine sees for one frame.
#[derive(Debug, Clone, Copy)]
pub struct InteractionInput {
    pub now: f64,
    /// `None` when no hand is tracked.
    pub pinch_distance: Option<f32>,
    /// Smoothed pointer, used by scrolling.
    pub pointer: Option<Point2>,
    pub pose: PoseKind,
    pub command: Option<InteractionCommand>,
}

impl InteractionInput {
    /// A frame with no hand.
    pub fn lost(now: f64) -> Self {
        Self {
            now,
            pinch_distance: None,
            pointer: None,
            pose: PoseKind::NoHand,
            command: None,
        }
    }
}

// ── Machine ─────────────────────────────────────────────────

pub struct InteractionMachine {
    pub config: InteractionConfig,
    state: InteractionState,
    /// Hysteresis latch over the pinch distance.
    pinched: bool,
    last_release: Option<f64>,
    /// Pose that last toggled scrolling.  Further toggles wait until it
    /// has been released.
    scroll_toggle_pose: Option<PoseKind>,
}

impl InteractionMachine {
    pub fn new(config: InteractionConfig) -> Self {
        Self {
            config,
            state: InteractionState::Neutral,
            pinched: false,
            last_release: None,
            scroll_toggle_pose: None,
        }
    }

    pub fn state(&self) -> InteractionState {
        self.state
    }

    /// Whether a button is currently down.
    pub fn button_held(&self) -> bool {
        matches!(self.state, InteractionState::Dragging { .. })
    }

    /// Advance one frame.
    pub fn step(&mut self, input: &InteractionInput) -> Vec<Intent> {
        let Some(distance) = input.pinch_distance else {
            return self.release_all("tracking lost");
        };
        self.update_latch(distance);
        let command = self.accept_command(input);

        let mut intents = Vec::new();
        let next = match self.state {
            InteractionState::Neutral => match command {
                Some(InteractionCommand::RightClick) => {
                    intents.push(Intent::RightClick);
                    InteractionState::RightHeld { pose: input.pose }
                }
                Some(InteractionCommand::ToggleScroll) => {
                    info!("Scrolling on");
                    self.scroll_toggle_pose = Some(input.pose);
                    InteractionState::Scrolling {
                        anchor_y: input.pointer.map(|p| p.y),
                    }
                }
                None if self.pinched => InteractionState::PressPending { since: input.now },
                None => InteractionState::Neutral,
            },

            InteractionState::PressPending { since } => {
                if !self.pinched {
                    intents.push(self.release_click(input.now));
                    InteractionState::Neutral
                } else if input.now - since > self.config.hold_threshold_s {
                    info!("Drag start after {:.2}s hold", input.now - since);
                    intents.push(Intent::DragStart);
                    InteractionState::Dragging { since: input.now }
                } else {
                    self.state
                }
            }

            InteractionState::Dragging { since } => {
                if self.pinched {
                    self.state
                } else {
                    info!("Drag end after {:.2}s", input.now - since);
                    intents.push(Intent::DragEnd);
                    InteractionState::Neutral
                }
            }

            InteractionState::RightHeld { pose } => {
                if input.pose == pose {
                    self.state
                } else {
                    InteractionState::Neutral
                }
            }

            InteractionState::Scrolling { anchor_y } => {
                if command == Some(InteractionCommand::ToggleScroll) {
                    info!("Scrolling off");
                    self.scroll_toggle_pose = Some(input.pose);
                    InteractionState::Neutral
                } else {
                    match (anchor_y, input.pointer) {
                        (Some(anchor), Some(p)) => {
                            let amount = (-(p.y - anchor) / self.config.scroll_divisor).trunc() as i32;
                            if amount != 0 {
                                intents.push(Intent::ScrollDelta(amount));
                                InteractionState::Scrolling { anchor_y: Some(p.y) }
                            } else {
                                self.state
                            }
                        }
                        (None, Some(p)) => InteractionState::Scrolling { anchor_y: Some(p.y) },
                        (_, None) => self.state,
                    }
                }
            }
        };

        if next != self.state {
            debug!(from = self.state.as_str(), to = next.as_str(), "Interaction transition");
        }
        self.state = next;
        intents
    }

    /// Drop a scroll toggle re-committed by the pose that made the last one.
    fn accept_command(&mut self, input: &InteractionInput) -> Option<InteractionCommand> {
        if self.scroll_toggle_pose.is_some_and(|pose| pose != input.pose) {
            self.scroll_toggle_pose = None;
        }
        match input.command {
            Some(InteractionCommand::ToggleScroll) if self.scroll_toggle_pose.is_some() => {
                debug!(pose = input.pose.as_str(), "Scroll toggle ignored until the pose is released");
                None
            }
            command => command,
        }
    }

    fn update_latch(&mut self, distance: f32) {
        if distance < self.config.pinch_on_px {
            self.pinched = true;
        } else if distance > self.config.pinch_off_px {
            self.pinched = false;
        }
    }

    /// Click or double click for a short pinch released at `now`.
    fn release_click(&mut self, now: f64) -> Intent {
        let double = self
            .last_release
            .map(|t| now - t < self.config.double_click_window_s)
            .unwrap_or(false);
        self.last_release = Some(now);
        if double {
            info!("Double click");
            Intent::DoubleClick
        } else {
            debug!("Click");
            Intent::Click
        }
    }

    /// Return to `Neutral`, releasing a held button.
    ///
    /// Used on tracking loss and mode changes.  The double-click history
    /// survives.
    pub fn release_all(&mut self, reason: &str) -> Vec<Intent> {
        let mut intents = Vec::new();
        if self.button_held() {
            info!("Drag end: {}", reason);
            intents.push(Intent::DragEnd);
        }
        if self.state != InteractionState::Neutral {
            debug!(from = self.state.as_str(), "Interaction reset: {}", reason);
        }
        self.state = InteractionState::Neutral;
        self.pinched = false;
        self.scroll_toggle_pose = None;
        intents
    }

    /// Generate s-expression for status output.
    pub fn status_sexp(&self) -> String {
        format!(
            "(:state :{} :pinched {} :pinch-on {:.0} :pinch-off {:.0} :hold-threshold {:.2} :double-click-window {:.2})",
            self.state.as_str(),
            if self.pinched { "t" } else { "nil" },
            self.config.pinch_on_px,
            self.config.pinch_off_px,
            self.config.hold_threshold_s,
            self.config.double_click_window_s,
        )
    }
}

// ── Tests ───────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const FPS: f64 = 60.0;

    fn machine() -> InteractionMachine {
        InteractionMachine::new(InteractionConfig::default())
    }

    fn pinch_frame(now: f64, distance: f32) -> InteractionInput {
        InteractionInput {
            now,
            pinch_distance: Some(distance),
            pointer: Some(Point2::new(100.0, 100.0)),
            pose: PoseKind::Pinch,
            command: None,
        }
    }

    fn open_frame(now: f64) -> InteractionInput {
        InteractionInput {
            pose: PoseKind::FingerCount(2),
            ..pinch_frame(now, 120.0)
        }
    }

    /// Pinch for `frames` frames starting at `start`, then release.
    fn tap(m: &mut InteractionMachine, start: f64, frames: usize) -> Vec<Intent> {
        let mut out = Vec::new();
        for i in 0..frames {
            out.extend(m.step(&pinch_frame(start + i as f64 / FPS, 20.0)));
        }
        out.extend(m.step(&open_frame(start + frames as f64 / FPS)));
        out
    }

    #[test]
    fn test_short_pinch_is_click() {
        let mut m = machine();
        for frames in 1..=17 {
            let intents = tap(&mut m, frames as f64 * 10.0, frames);
            assert_eq!(intents, vec![Intent::Click], "hold of {} frames", frames);
            assert_eq!(m.state(), InteractionState::Neutral);
        }
    }

    #[test]
    fn test_double_click_within_window() {
        let mut m = machine();
        assert_eq!(tap(&mut m, 0.0, 5), vec![Intent::Click]);
        assert_eq!(tap(&mut m, 0.2, 5), vec![Intent::DoubleClick]);
        // Well outside the window: single again.
        assert_eq!(tap(&mut m, 5.0, 5), vec![Intent::Click]);
    }

    #[test]
    fn test_drag_scenario_at_60fps() {
        let mut m = machine();
        let mut drag_frames = Vec::new();
        let mut all = Vec::new();
        for i in 0..30 {
            let intents = m.step(&pinch_frame(i as f64 / FPS, 20.0));
            if intents.contains(&Intent::DragStart) {
                drag_frames.push(i);
            }
            all.extend(intents);
        }
        assert_eq!(drag_frames.len(), 1, "{:?}", all);
        assert!((18..=19).contains(&drag_frames[0]), "drag at frame {}", drag_frames[0]);
        assert!(!all.contains(&Intent::Click));
        assert!(m.button_held());

        let release = m.step(&open_frame(0.5));
        assert_eq!(release, vec![Intent::DragEnd]);
        assert_eq!(m.state(), InteractionState::Neutral);
    }

    #[test]
    fn test_long_hold_single_drag_start() {
        let mut m = machine();
        let mut all = Vec::new();
        for i in 0..600 {
            all.extend(m.step(&pinch_frame(i as f64 / FPS, 20.0)));
        }
        all.extend(m.step(&open_frame(10.0)));
        assert_eq!(all, vec![Intent::DragStart, Intent::DragEnd]);
    }

    #[test]
    fn test_hysteresis_band_holds_pinch() {
        let mut m = machine();
        m.step(&pinch_frame(0.0, 30.0));
        assert!(matches!(m.state(), InteractionState::PressPending { .. }));
        // Inside the band (35..45): still pinched.
        let intents = m.step(&pinch_frame(0.05, 40.0));
        assert!(intents.is_empty());
        assert!(matches!(m.state(), InteractionState::PressPending { .. }));
        // Above the off threshold: release.
        assert_eq!(m.step(&pinch_frame(0.1, 50.0)), vec![Intent::Click]);
    }

    #[test]
    fn test_band_does_not_start_pinch() {
        let mut m = machine();
        m.step(&pinch_frame(0.0, 40.0));
        assert_eq!(m.state(), InteractionState::Neutral);
    }

    #[test]
    fn test_tracking_loss_from_drag_releases() {
        let mut m = machine();
        for i in 0..30 {
            m.step(&pinch_frame(i as f64 / FPS, 20.0));
        }
        assert!(m.button_held());
        assert_eq!(m.step(&InteractionInput::lost(0.6)), vec![Intent::DragEnd]);
        assert_eq!(m.state(), InteractionState::Neutral);
        assert!(!m.button_held());
    }

    #[test]
    fn test_tracking_loss_from_every_state() {
        fn pending(m: &mut InteractionMachine) {
            m.step(&pinch_frame(0.0, 20.0));
        }
        fn right_held(m: &mut InteractionMachine) {
            m.step(&InteractionInput {
                command: Some(InteractionCommand::RightClick),
                ..open_frame(0.0)
            });
        }
        fn scrolling(m: &mut InteractionMachine) {
            m.step(&InteractionInput {
                command: Some(InteractionCommand::ToggleScroll),
                ..open_frame(0.0)
            });
        }
        let setups: [fn(&mut InteractionMachine); 3] = [pending, right_held, scrolling];
        for setup in setups {
            let mut m = machine();
            setup(&mut m);
            assert_ne!(m.state(), InteractionState::Neutral);
            let intents = m.step(&InteractionInput::lost(1.0));
            assert!(intents.is_empty(), "{:?}", intents);
            assert_eq!(m.state(), InteractionState::Neutral);
        }
    }

    #[test]
    fn test_pending_lost_emits_no_click() {
        let mut m = machine();
        m.step(&pinch_frame(0.0, 20.0));
        assert!(m.step(&InteractionInput::lost(0.1)).is_empty());
        // Hand returns open: nothing happens.
        assert!(m.step(&open_frame(0.2)).is_empty());
    }

    #[test]
    fn test_right_click_is_atomic() {
        let mut m = machine();
        let three = InteractionInput {
            pose: PoseKind::FingerCount(3),
            command: Some(InteractionCommand::RightClick),
            ..open_frame(0.0)
        };
        assert_eq!(m.step(&three), vec![Intent::RightClick]);
        assert!(matches!(m.state(), InteractionState::RightHeld { .. }));
        assert!(!m.button_held());
        // Pose persists: stays put, no repeat.
        let held = InteractionInput { command: None, ..three };
        assert!(m.step(&held).is_empty());
        // Pose changes: back to neutral.
        assert!(m.step(&open_frame(0.2)).is_empty());
        assert_eq!(m.state(), InteractionState::Neutral);
    }

    #[test]
    fn test_scroll_deltas_and_rebase() {
        let mut m = machine();
        let at = |now: f64, y: f32, command: Option<InteractionCommand>| InteractionInput {
            pointer: Some(Point2::new(500.0, y)),
            pose: if command.is_some() { PoseKind::OpenPalm } else { PoseKind::FingerCount(2) },
            command,
            ..open_frame(now)
        };
        m.step(&at(0.0, 500.0, Some(InteractionCommand::ToggleScroll)));
        assert_eq!(m.state(), InteractionState::Scrolling { anchor_y: Some(500.0) });

        // 5px up: under one unit, anchor kept.
        assert!(m.step(&at(0.1, 495.0, None)).is_empty());
        // 35px up from the anchor: +3, natural direction.
        assert_eq!(m.step(&at(0.2, 465.0, None)), vec![Intent::ScrollDelta(3)]);
        assert_eq!(m.state(), InteractionState::Scrolling { anchor_y: Some(465.0) });
        // 20px down from the new anchor: -2.
        assert_eq!(m.step(&at(0.3, 485.0, None)), vec![Intent::ScrollDelta(-2)]);

        m.step(&at(0.4, 485.0, Some(InteractionCommand::ToggleScroll)));
        assert_eq!(m.state(), InteractionState::Neutral);
    }

    #[test]
    fn test_held_palm_keeps_scrolling() {
        let mut m = machine();
        let palm = |now: f64, command| InteractionInput {
            pose: PoseKind::OpenPalm,
            command,
            ..open_frame(now)
        };
        m.step(&palm(0.0, Some(InteractionCommand::ToggleScroll)));
        // The debouncer re-commits the held palm every cooldown + 1 frames.
        for i in 1..100 {
            let command = (i % 31 == 0).then_some(InteractionCommand::ToggleScroll);
            m.step(&palm(i as f64 / FPS, command));
            assert!(
                matches!(m.state(), InteractionState::Scrolling { .. }),
                "scrolling dropped at frame {}",
                i
            );
        }
        // Relax the hand, then open it again: scrolling ends.
        m.step(&open_frame(2.0));
        m.step(&palm(2.1, Some(InteractionCommand::ToggleScroll)));
        assert_eq!(m.state(), InteractionState::Neutral);
        // Still the same palm: no immediate re-entry.
        m.step(&palm(2.7, Some(InteractionCommand::ToggleScroll)));
        assert_eq!(m.state(), InteractionState::Neutral);
    }

    #[test]
    fn test_scroll_ignores_pinch() {
        let mut m = machine();
        m.step(&InteractionInput {
            command: Some(InteractionCommand::ToggleScroll),
            ..open_frame(0.0)
        });
        for i in 0..40 {
            let intents = m.step(&pinch_frame(i as f64 / FPS, 10.0));
            assert!(!intents.contains(&Intent::DragStart));
        }
    }

    #[test]
    fn test_release_all_from_drag() {
        let mut m = machine();
        for i in 0..30 {
            m.step(&pinch_frame(i as f64 / FPS, 20.0));
        }
        assert_eq!(m.release_all("mode change"), vec![Intent::DragEnd]);
        assert!(m.release_all("again").is_empty());
    }

    #[test]
    fn test_status_sexp() {
        let m = machine();
        let s = m.status_sexp();
        assert!(s.contains(":state :neutral"));
        assert!(s.contains(":pinched nil"));
    }
}
