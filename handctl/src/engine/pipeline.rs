//! Per-frame pipeline.
//!
//! All mutable interaction state lives in one `InteractionContext`.
//! `process_frame` consumes one landmark frame and returns what happened
//! on it, so replaying the same trace always produces the same intents.
//!
//! Stage order per frame:
//!
//! 1. mirror, remember the iris centre, release due delayed actions
//! 2. stop here while a calibration session is collecting
//! 3. classify the primary hand (or reuse the previous pose under load)
//! 4. debounce, two-hand clap, mode table lookup
//! 5. the active mode's pointer stage (mouse, draw or gaze)

use std::borrow::Cow;
use std::time::Instant;

use tracing::{debug, info, warn};

use super::action::{ActionDispatcher, Intent};
use super::calibration::{AnchorTarget, Calibrator, CaptureOutcome};
use super::debounce::{GestureDebouncer, GestureEvent};
use super::draw::StrokeTracker;
use super::frame_timing::FrameTiming;
use super::interaction::{InteractionCommand, InteractionInput, InteractionMachine};
use super::landmarks::{HandLandmark, LandmarkFrame, Point2};
use super::modes::{Mode, ModeAction};
use super::pointer::{frame_to_screen, PointerFilter};
use super::pose::{classify, classify_primary, pinch_distance, ClapDetector, PoseClassification};
use super::scheduler::Scheduler;
use crate::config::EngineConfig;
use crate::error::{CalibrationError, DispatchError, EngineError};
use crate::sexp::bool_sexp;
use crate::trace::TraceCommand;

const SHUTDOWN_LABEL: &str = "shutdown";

// ── Output ──────────────────────────────────────────────────

/// Everything one frame produced.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameOutput {
    pub frame_index: u64,
    pub timestamp_s: f64,
    /// Mode after the frame (a switch on this frame is already applied).
    pub mode: Mode,
    pub pose: PoseClassification,
    pub gesture: Option<GestureEvent>,
    /// Smoothed pointer in screen pixels.
    pub pointer: Option<Point2>,
    pub intents: Vec<Intent>,
    /// Per-frame conditions the caller should surface (e.g. `Uncalibrated`).
    pub errors: Vec<EngineError>,
}

impl FrameOutput {
    fn new(frame_index: u64, timestamp_s: f64, mode: Mode) -> Self {
        Self {
            frame_index,
            timestamp_s,
            mode,
            pose: PoseClassification::no_hand(),
            gesture: None,
            pointer: None,
            intents: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Whether the session ends after this frame.
    pub fn is_terminal(&self) -> bool {
        self.intents.iter().any(Intent::is_terminal)
    }
}

// ── Context ─────────────────────────────────────────────────

/// The whole mutable state of the engine.
pub struct InteractionContext {
    pub mode: Mode,
    pub debouncer: GestureDebouncer,
    pub clap: ClapDetector,
    pub pointer: PointerFilter,
    pub interaction: InteractionMachine,
    pub strokes: StrokeTracker,
    pub calibrator: Calibrator,
    pub scheduler: Scheduler<Intent>,
    pub timing: FrameTiming,
    /// Iris-driven pointer enabled (gaze mode only).
    pub gaze_tracking: bool,
    pub overlay_visible: bool,
    last_pose: PoseClassification,
    /// Iris centre of the latest frame, in normalized camera space.
    last_iris: Option<Point2>,
    frame_index: u64,
    last_timestamp_s: f64,
    /// Fingertip seen on the previous frame.
    hand_tracked: bool,
    /// `Uncalibrated` already logged for the current stretch.
    uncalibrated_logged: bool,
}

impl InteractionContext {
    pub fn new(config: &EngineConfig) -> Self {
        let mode = config.start_mode;
        let mut debouncer = GestureDebouncer::new(config.debounce.clone());
        debouncer.set_actionable(&mode.actionable());
        let mut timing = FrameTiming::new(600, config.frame_budget_ms);
        timing.adaptive = config.adaptive_rate;
        info!(mode = mode.as_str(), "Interaction context initialized");
        Self {
            mode,
            debouncer,
            clap: ClapDetector::new(config.pose.clap_threshold_px),
            pointer: PointerFilter::new(config.pointer_for(mode)),
            interaction: InteractionMachine::new(config.interaction.clone()),
            strokes: StrokeTracker::new(config.draw.clone()),
            calibrator: Calibrator::new(config.screen),
            scheduler: Scheduler::new(),
            timing,
            gaze_tracking: true,
            overlay_visible: false,
            last_pose: PoseClassification::no_hand(),
            last_iris: None,
            frame_index: 0,
            last_timestamp_s: 0.0,
            hand_tracked: false,
            uncalibrated_logged: false,
        }
    }

    /// Frames processed so far.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn last_iris(&self) -> Option<Point2> {
        self.last_iris
    }

    /// Change mode without restarting anything.
    ///
    /// Held buttons and a stroke in progress are released, the pointer
    /// filter is rebuilt for the new mode and the gesture table swapped.
    /// The debouncer cooldown keeps running.
    pub fn switch_mode(&mut self, config: &EngineConfig, mode: Mode) -> Vec<Intent> {
        let mut intents = self.interaction.release_all("mode switch");
        intents.extend(self.strokes.lift());
        if mode == self.mode {
            return intents;
        }
        info!(from = self.mode.as_str(), to = mode.as_str(), "Mode switch");
        self.mode = mode;
        self.pointer.reconfigure(config.pointer_for(mode));
        self.debouncer.set_actionable(&mode.actionable());
        self.clap.reset();
        self.uncalibrated_logged = false;
        intents.push(Intent::ModeSwitch(mode));
        intents
    }

    /// First clap schedules the delayed shutdown, a second one cancels it.
    fn toggle_shutdown(&mut self, config: &EngineConfig, now: f64) -> Intent {
        if self.scheduler.is_pending(SHUTDOWN_LABEL) {
            self.scheduler.cancel_label(SHUTDOWN_LABEL);
            info!("Shutdown cancelled by clap");
            Intent::ShutdownCancelled
        } else {
            let delay_s = config.shutdown_delay_s;
            self.scheduler.schedule(Intent::Shutdown, SHUTDOWN_LABEL, now, delay_s);
            Intent::ShutdownScheduled { delay_s }
        }
    }

    /// Classify, or under load reuse the previous pose with fresh geometry.
    fn classify(&mut self, frame: &LandmarkFrame, config: &EngineConfig, index: u64) -> PoseClassification {
        let reusable = self.last_pose.anchor.is_some() && !self.timing.should_classify(index);
        let pose = match frame.primary_hand() {
            Some(hand) if reusable && hand.is_finite() => PoseClassification {
                pinch_distance: Some(pinch_distance(hand, config.frame())),
                anchor: Some(hand.pixel(HandLandmark::IndexTip, config.frame())),
                ..self.last_pose
            },
            Some(hand) => classify(hand, &config.pose),
            None => classify_primary(&frame.hands, &config.pose),
        };
        self.last_pose = pose;
        pose
    }

    fn apply_action(&mut self, config: &EngineConfig, action: ModeAction, out: &mut FrameOutput) -> Option<InteractionCommand> {
        debug!(action = action.as_str(), mode = self.mode.as_str(), "Mode action");
        match action {
            ModeAction::SwitchMode(mode) => {
                let intents = self.switch_mode(config, mode);
                out.intents.extend(intents);
            }
            ModeAction::Quit => {
                info!("Quit requested");
                out.intents.push(Intent::Quit);
            }
            ModeAction::RightClick => return Some(InteractionCommand::RightClick),
            ModeAction::ToggleScroll => return Some(InteractionCommand::ToggleScroll),
            ModeAction::ToggleOverlay => {
                self.overlay_visible = !self.overlay_visible;
                out.intents.push(Intent::ModeToggle);
            }
            ModeAction::Shortcut(shortcut) => {
                info!(shortcut = shortcut.as_str(), "Shortcut {}", shortcut.keys());
                out.intents.push(Intent::Shortcut(shortcut));
            }
            ModeAction::SaveCanvas => out.intents.push(Intent::SaveCanvas),
            ModeAction::ClearCanvas => {
                out.intents.extend(self.strokes.lift());
                self.strokes.clear();
                self.pointer.reset();
                out.intents.push(Intent::ClearCanvas);
            }
        }
        None
    }

    fn mouse_stage(&mut self, config: &EngineConfig, pose: &PoseClassification, command: Option<InteractionCommand>, out: &mut FrameOutput) {
        let pointer = pose
            .anchor
            .map(|a| self.pointer.update(frame_to_screen(a, config.frame(), config.screen)));
        let input = InteractionInput {
            now: out.timestamp_s,
            pinch_distance: pose.pinch_distance,
            pointer,
            pose: pose.kind,
            command,
        };
        out.intents.extend(self.interaction.step(&input));
        out.pointer = pointer;
    }

    fn draw_stage(&mut self, config: &EngineConfig, pose: &PoseClassification, out: &mut FrameOutput) {
        let pointer = pose
            .anchor
            .map(|a| self.pointer.update(frame_to_screen(a, config.frame(), config.screen)));
        let intents = self.strokes.update(pose.pinch_distance, pointer);
        if intents.contains(&Intent::StrokeEnd) {
            self.pointer.reset();
        }
        out.intents.extend(intents);
        out.pointer = pointer;
    }

    fn gaze_stage(&mut self, out: &mut FrameOutput) {
        if !self.gaze_tracking {
            return;
        }
        let Some(iris) = self.last_iris else {
            self.pointer.reset();
            return;
        };
        match self.calibrator.apply(iris) {
            Ok(screen) => {
                self.uncalibrated_logged = false;
                out.pointer = Some(self.pointer.update(screen));
            }
            Err(e) => {
                if !self.uncalibrated_logged {
                    warn!("Gaze pointer unavailable: {}", e);
                    self.uncalibrated_logged = true;
                }
                out.errors.push(e.into());
            }
        }
    }

    /// Generate s-expression for status output.
    pub fn status_sexp(&self) -> String {
        format!(
            "(:mode :{} :frame {} :overlay {} :gaze-tracking {} :debounce {} :pointer {} :interaction {} :draw {} :calibration {} :scheduler {} :timing {})",
            self.mode.as_str(),
            self.frame_index,
            bool_sexp(self.overlay_visible),
            bool_sexp(self.gaze_tracking),
            self.debouncer.status_sexp(),
            self.pointer.status_sexp(),
            self.interaction.status_sexp(),
            self.strokes.status_sexp(),
            self.calibrator.status_sexp(),
            self.scheduler.status_sexp(self.last_timestamp_s),
            self.timing.stats_sexp(),
        )
    }
}

// ── Frame processing ────────────────────────────────────────

/// Run one frame through the pipeline.
pub fn process_frame(ctx: &mut InteractionContext, config: &EngineConfig, frame: &LandmarkFrame) -> FrameOutput {
    let frame: Cow<'_, LandmarkFrame> = if config.mirror {
        Cow::Owned(frame.mirrored())
    } else {
        Cow::Borrowed(frame)
    };
    let index = ctx.frame_index;
    let now = frame.timestamp_s;
    ctx.frame_index += 1;
    ctx.last_timestamp_s = now;
    ctx.last_iris = frame.face.as_ref().and_then(|f| f.iris_center());

    let mut out = FrameOutput::new(index, now, ctx.mode);
    out.intents.extend(ctx.scheduler.poll(now));

    if ctx.calibrator.is_collecting() {
        return out;
    }

    let classify_start = Instant::now();
    let pose = ctx.classify(&frame, config, index);
    let classify_ms = classify_start.elapsed().as_secs_f64() * 1000.0;
    let update_start = Instant::now();
    out.pose = pose;

    let tracked = pose.anchor.is_some();
    if ctx.hand_tracked && !tracked {
        info!(mode = ctx.mode.as_str(), "Hand tracking lost");
        if ctx.mode.tracks_fingertip() {
            ctx.pointer.reset();
        }
    }
    ctx.hand_tracked = tracked;

    // The debouncer must see every frame so the cooldown counts down.
    out.gesture = ctx.debouncer.observe(pose.kind, index, now);

    if ctx.mode.listens_for_clap() && ctx.clap.update(&frame.hands, config.frame()) {
        let intent = ctx.toggle_shutdown(config, now);
        out.intents.push(intent);
    }

    let mut command = None;
    if let Some(event) = out.gesture {
        if let Some(action) = ctx.mode.action_for(event.kind) {
            command = ctx.apply_action(config, action, &mut out);
        }
    }

    match ctx.mode {
        Mode::Mouse => ctx.mouse_stage(config, &pose, command, &mut out),
        Mode::Draw => ctx.draw_stage(config, &pose, &mut out),
        Mode::Gaze => ctx.gaze_stage(&mut out),
        Mode::Menu | Mode::Shortcut => {}
    }

    out.mode = ctx.mode;
    let update_ms = update_start.elapsed().as_secs_f64() * 1000.0;
    ctx.timing.record_frame(classify_ms, update_ms);

    if !out.intents.is_empty() {
        debug!(frame = index, "{} intent(s)", out.intents.len());
    }
    out
}

// ── Engine ──────────────────────────────────────────────────

/// Owns the configuration and the context, and takes control commands.
pub struct Engine {
    pub config: EngineConfig,
    ctx: InteractionContext,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let ctx = InteractionContext::new(&config);
        Self { config, ctx }
    }

    pub fn context(&self) -> &InteractionContext {
        &self.ctx
    }

    pub fn mode(&self) -> Mode {
        self.ctx.mode
    }

    pub fn process(&mut self, frame: &LandmarkFrame) -> FrameOutput {
        process_frame(&mut self.ctx, &self.config, frame)
    }

    pub fn switch_mode(&mut self, mode: Mode) -> Vec<Intent> {
        self.ctx.switch_mode(&self.config, mode)
    }

    /// Start a calibration session.  Pointer and gestures pause until it
    /// completes or is cancelled.
    pub fn begin_calibration(&mut self) -> Vec<Intent> {
        let mut intents = self.ctx.interaction.release_all("calibration");
        intents.extend(self.ctx.strokes.lift());
        self.ctx.pointer.reset();
        let target = self.ctx.calibrator.start();
        info!(anchor = target.name, "Look at the first target");
        intents
    }

    pub fn calibration_target(&self) -> Option<AnchorTarget> {
        self.ctx.calibrator.current_target()
    }

    /// Capture the current target from the latest iris centre.
    pub fn capture_calibration_point(&mut self) -> Result<CaptureOutcome, CalibrationError> {
        let outcome = self.ctx.calibrator.capture(self.ctx.last_iris)?;
        match outcome {
            CaptureOutcome::Next(target) => info!(anchor = target.name, "Look at the next target"),
            CaptureOutcome::Complete { .. } => {
                self.ctx.pointer.reset();
                self.ctx.uncalibrated_logged = false;
            }
        }
        Ok(outcome)
    }

    pub fn cancel_calibration(&mut self) {
        self.ctx.calibrator.cancel();
    }

    /// Cancel every pending delayed action.
    pub fn cancel_pending(&mut self) -> Vec<Intent> {
        let had_shutdown = self.ctx.scheduler.is_pending(SHUTDOWN_LABEL);
        self.ctx.scheduler.cancel_all();
        if had_shutdown {
            vec![Intent::ShutdownCancelled]
        } else {
            Vec::new()
        }
    }

    pub fn set_gaze_tracking(&mut self, enabled: bool) {
        if self.ctx.gaze_tracking != enabled {
            info!("Gaze tracking {}", if enabled { "on" } else { "off" });
        }
        self.ctx.gaze_tracking = enabled;
        self.ctx.pointer.reset();
    }

    /// Apply an out-of-band control command.
    pub fn apply_command(&mut self, command: TraceCommand) -> Result<Vec<Intent>, EngineError> {
        debug!(command = command.as_str(), "Control command");
        match command {
            TraceCommand::CalibrateStart => Ok(self.begin_calibration()),
            TraceCommand::CalibrateCapture => {
                self.capture_calibration_point()?;
                Ok(Vec::new())
            }
            TraceCommand::CalibrateCancel => {
                self.cancel_calibration();
                Ok(Vec::new())
            }
            TraceCommand::Cancel => Ok(self.cancel_pending()),
            TraceCommand::GazeOn => {
                self.set_gaze_tracking(true);
                Ok(Vec::new())
            }
            TraceCommand::GazeOff => {
                self.set_gaze_tracking(false);
                Ok(Vec::new())
            }
            TraceCommand::SwitchMode(mode) => Ok(self.switch_mode(mode)),
        }
    }

    pub fn status_sexp(&self) -> String {
        self.ctx.status_sexp()
    }
}

// ── Dispatch ────────────────────────────────────────────────

/// Hand a frame's pointer and intents to the dispatcher.
///
/// Failures are logged and returned; the remaining intents are still
/// dispatched and engine state is not rolled back.
pub fn dispatch_output(out: &FrameOutput, dispatcher: &mut dyn ActionDispatcher) -> Vec<DispatchError> {
    dispatch_intents(out.pointer, &out.intents, dispatcher)
}

/// Dispatch an optional pointer move followed by intents.
pub fn dispatch_intents(
    pointer: Option<Point2>,
    intents: &[Intent],
    dispatcher: &mut dyn ActionDispatcher,
) -> Vec<DispatchError> {
    let mut errors = Vec::new();
    if let Some(p) = pointer {
        if let Err(e) = dispatcher.move_pointer(p) {
            warn!("Pointer move failed: {}", e);
            errors.push(e);
        }
    }
    for intent in intents {
        if let Err(e) = dispatcher.dispatch(intent) {
            warn!(intent = intent.as_str(), "Action dispatch failed: {}", e);
            errors.push(e);
        }
    }
    errors
}

// ── Tests ───────────────────────────────────────────────────
