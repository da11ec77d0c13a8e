//! Engine configuration.
//!
//! Every component owns a small config struct with defaults.  A config
//! file is one s-expression plist; any key it leaves out keeps its
//! default.  Example:
//!
//! ```text
//! (:frame-width 1280 :frame-height 720
//!  :pinch-threshold-on 60 :pinch-threshold-off 75
//!  :smoothing-alpha 0.5 :mirror t)
//! ```

use std::path::Path;

use lexpr::Value;
use tracing::debug;

use crate::engine::debounce::DebounceConfig;
use crate::engine::draw::DrawConfig;
use crate::engine::interaction::InteractionConfig;
use crate::engine::landmarks::FrameSize;
use crate::engine::modes::Mode;
use crate::engine::pointer::{PointerConfig, Smoothing};
use crate::engine::pose::{FistReference, PoseConfig};
use crate::error::ConfigError;
use crate::sexp::{bool_sexp, get_bool, get_keyword};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub screen: FrameSize,
    /// Flip incoming landmarks horizontally (selfie view).
    pub mirror: bool,
    pub start_mode: Mode,
    /// Also carries the classifier frame size.
    pub pose: PoseConfig,
    pub debounce: DebounceConfig,
    /// Pointer filter for mouse mode.
    pub pointer: PointerConfig,
    pub interaction: InteractionConfig,
    pub draw: DrawConfig,
    pub draw_alpha: f32,
    pub gaze_alpha: f32,
    pub shutdown_delay_s: f64,
    pub adaptive_rate: bool,
    pub frame_budget_ms: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            screen: FrameSize::new(1920, 1080),
            mirror: false,
            start_mode: Mode::Menu,
            pose: PoseConfig::default(),
            debounce: DebounceConfig::default(),
            pointer: PointerConfig::default(),
            interaction: InteractionConfig::default(),
            draw: DrawConfig::default(),
            draw_alpha: 0.5,
            gaze_alpha: 0.2,
            shutdown_delay_s: 5.0,
            adaptive_rate: false,
            frame_budget_ms: 16.0,
        }
    }
}

impl EngineConfig {
    /// Classifier input resolution.
    pub fn frame(&self) -> FrameSize {
        self.pose.frame
    }

    /// Read and parse a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        debug!("Loading config from {}", path.display());
        Self::from_sexp_str(&text)
    }

    pub fn from_sexp_str(text: &str) -> Result<Self, ConfigError> {
        let value = lexpr::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let mut config = Self::default();
        config.apply(&value)?;
        Ok(config)
    }

    /// Overlay the keys present in `value` and re-validate.
    pub fn apply(&mut self, value: &Value) -> Result<(), ConfigError> {
        if let Some(w) = uint(value, "frame-width")? {
            self.pose.frame.width = w;
        }
        if let Some(h) = uint(value, "frame-height")? {
            self.pose.frame.height = h;
        }
        if let Some(w) = uint(value, "screen-width")? {
            self.screen.width = w;
        }
        if let Some(h) = uint(value, "screen-height")? {
            self.screen.height = h;
        }
        if let Some(b) = get_bool(value, "mirror") {
            self.mirror = b;
        }
        if let Some(name) = get_keyword(value, "mode") {
            self.start_mode = Mode::parse(&name).ok_or_else(|| invalid("mode", format!("unknown mode {}", name)))?;
        }

        if let Some(v) = float(value, "pinch-threshold-on")? {
            self.interaction.pinch_on_px = v as f32;
            self.pose.pinch_threshold_px = v as f32;
        }
        if let Some(v) = float(value, "pinch-threshold-off")? {
            self.interaction.pinch_off_px = v as f32;
        }
        if let Some(v) = uint(value, "cooldown-frames")? {
            self.debounce.cooldown_frames = v;
        }
        if let Some(v) = float(value, "hold-threshold")? {
            self.interaction.hold_threshold_s = v;
        }
        if let Some(v) = float(value, "double-click-window")? {
            self.interaction.double_click_window_s = v;
        }
        if let Some(v) = float(value, "scroll-divisor")? {
            self.interaction.scroll_divisor = v as f32;
        }

        let alpha = float(value, "smoothing-alpha")?.map(|a| a as f32);
        let buffer = uint(value, "buffer-size")?;
        if alpha.is_some() || buffer.is_some() {
            let alpha = alpha.unwrap_or_else(|| self.pointer_alpha());
            let window = buffer.map(|b| b as usize).unwrap_or_else(|| self.pointer_window());
            self.pointer.smoothing = if window == 0 {
                Smoothing::Exponential { alpha }
            } else {
                Smoothing::MovingAverage {
                    window,
                    alpha: (alpha < 1.0).then_some(alpha),
                }
            };
        }
        if let Some(v) = float(value, "jitter-threshold")? {
            self.pointer.jitter_threshold_px = v as f32;
        }

        if let Some(v) = float(value, "clap-threshold")? {
            self.pose.clap_threshold_px = v as f32;
        }
        if let Some(name) = get_keyword(value, "fist-reference") {
            self.pose.fist_reference = FistReference::parse(&name)
                .ok_or_else(|| invalid("fist-reference", format!("expected mcp or pip, got {}", name)))?;
        }

        if let Some(v) = float(value, "draw-pen-down")? {
            self.draw.pen_down_px = v as f32;
        }
        if let Some(v) = float(value, "draw-pen-up")? {
            self.draw.pen_up_px = v as f32;
        }
        if let Some(v) = float(value, "draw-min-movement")? {
            self.draw.min_movement_px = v as f32;
        }
        if let Some(v) = float(value, "draw-alpha")? {
            self.draw_alpha = v as f32;
        }
        if let Some(v) = float(value, "gaze-alpha")? {
            self.gaze_alpha = v as f32;
        }
        if let Some(v) = float(value, "shutdown-delay")? {
            self.shutdown_delay_s = v;
        }
        if let Some(b) = get_bool(value, "adaptive-rate") {
            self.adaptive_rate = b;
        }
        if let Some(v) = float(value, "frame-budget-ms")? {
            self.frame_budget_ms = v;
        }

        self.validate()
    }

    fn pointer_alpha(&self) -> f32 {
        match self.pointer.smoothing {
            Smoothing::Exponential { alpha } => alpha,
            Smoothing::MovingAverage { alpha, .. } => alpha.unwrap_or(1.0),
        }
    }

    fn pointer_window(&self) -> usize {
        match self.pointer.smoothing {
            Smoothing::Exponential { .. } => 0,
            Smoothing::MovingAverage { window, .. } => window,
        }
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, size) in [("frame-width", self.frame()), ("screen-width", self.screen)] {
            if size.width == 0 || size.height == 0 {
                return Err(invalid(key, "dimensions must be positive"));
            }
        }
        if self.interaction.pinch_on_px <= 0.0 {
            return Err(invalid("pinch-threshold-on", "must be positive"));
        }
        if self.interaction.pinch_off_px < self.interaction.pinch_on_px {
            return Err(invalid(
                "pinch-threshold-off",
                format!(
                    "{} is below pinch-threshold-on {}",
                    self.interaction.pinch_off_px, self.interaction.pinch_on_px
                ),
            ));
        }
        if self.draw.pen_down_px < self.draw.pen_up_px {
            return Err(invalid("draw-pen-down", "must not be below draw-pen-up"));
        }
        for (key, alpha) in [
            ("smoothing-alpha", self.pointer_alpha()),
            ("draw-alpha", self.draw_alpha),
            ("gaze-alpha", self.gaze_alpha),
        ] {
            if !(alpha > 0.0 && alpha <= 1.0) {
                return Err(invalid(key, format!("{} is outside (0, 1]", alpha)));
            }
        }
        if self.interaction.scroll_divisor <= 0.0 {
            return Err(invalid("scroll-divisor", "must be positive"));
        }
        for (key, v) in [
            ("hold-threshold", self.interaction.hold_threshold_s),
            ("double-click-window", self.interaction.double_click_window_s),
            ("shutdown-delay", self.shutdown_delay_s),
            ("frame-budget-ms", self.frame_budget_ms),
        ] {
            if !(v >= 0.0) {
                return Err(invalid(key, "must not be negative"));
            }
        }
        Ok(())
    }

    /// Pointer filter settings for a mode.
    pub fn pointer_for(&self, mode: Mode) -> PointerConfig {
        match mode {
            Mode::Draw => PointerConfig {
                smoothing: Smoothing::Exponential { alpha: self.draw_alpha },
                jitter_threshold_px: self.pointer.jitter_threshold_px,
            },
            Mode::Gaze => PointerConfig::exponential(self.gaze_alpha),
            _ => self.pointer.clone(),
        }
    }

    /// Effective configuration as a plist.
    pub fn to_sexp(&self) -> String {
        format!(
            "(:frame-width {} :frame-height {} :screen-width {} :screen-height {} :mirror {} :mode :{} \
:pinch-threshold-on {:.1} :pinch-threshold-off {:.1} :cooldown-frames {} :hold-threshold {:.2} \
:double-click-window {:.2} :smoothing-alpha {:.2} :buffer-size {} :jitter-threshold {:.1} \
:scroll-divisor {:.1} :clap-threshold {:.1} :fist-reference :{} :draw-pen-down {:.1} :draw-pen-up {:.1} \
:draw-min-movement {:.1} :draw-alpha {:.2} :gaze-alpha {:.2} :shutdown-delay {:.1} :adaptive-rate {} \
:frame-budget-ms {:.1})",
            self.frame().width,
            self.frame().height,
            self.screen.width,
            self.screen.height,
            bool_sexp(self.mirror),
            self.start_mode.as_str(),
            self.interaction.pinch_on_px,
            self.interaction.pinch_off_px,
            self.debounce.cooldown_frames,
            self.interaction.hold_threshold_s,
            self.interaction.double_click_window_s,
            self.pointer_alpha(),
            self.pointer_window(),
            self.pointer.jitter_threshold_px,
            self.interaction.scroll_divisor,
            self.pose.clap_threshold_px,
            self.pose.fist_reference.as_str(),
            self.draw.pen_down_px,
            self.draw.pen_up_px,
            self.draw.min_movement_px,
            self.draw_alpha,
            self.gaze_alpha,
            self.shutdown_delay_s,
            bool_sexp(self.adaptive_rate),
            self.frame_budget_ms,
        )
    }
}

// ── Key readers ─────────────────────────────────────────────

fn invalid(key: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn float(value: &Value, key: &str) -> Result<Option<f64>, ConfigError> {
    match get_keyword(value, key) {
        None => Ok(None),
        Some(s) => s
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(Some)
            .ok_or_else(|| invalid(key, format!("expected a number, got {}", s))),
    }
}

fn uint(value: &Value, key: &str) -> Result<Option<u32>, ConfigError> {
    match get_keyword(value, key) {
        None => Ok(None),
        Some(s) => s
            .parse::<u32>()
            .map(Some)
            .map_err(|_| invalid(key, format!("expected a non-negative integer, got {}", s))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_valid() {
        let c = EngineConfig::default();
        assert!(c.validate().is_ok());
        assert_eq!(c.frame(), FrameSize::new(640, 480));
        assert_eq!(c.debounce.cooldown_frames, 30);
        assert_eq!(c.pose.fist_reference, FistReference::Mcp);
    }

    #[test]
    fn test_empty_plist_keeps_defaults() {
        let c = EngineConfig::from_sexp_str("()").unwrap();
        assert_eq!(c.to_sexp(), EngineConfig::default().to_sexp());
    }

    #[test]
    fn test_parse_overrides() {
        let c = EngineConfig::from_sexp_str(
            "(:frame-width 1280 :frame-height 720 :pinch-threshold-on 60 :pinch-threshold-off 75 \
             :cooldown-frames 12 :mirror t :mode :draw :fist-reference :pip)",
        )
        .unwrap();
        assert_eq!(c.frame(), FrameSize::new(1280, 720));
        assert_eq!(c.interaction.pinch_on_px, 60.0);
        assert_eq!(c.pose.pinch_threshold_px, 60.0);
        assert_eq!(c.interaction.pinch_off_px, 75.0);
        assert_eq!(c.debounce.cooldown_frames, 12);
        assert!(c.mirror);
        assert_eq!(c.start_mode, Mode::Draw);
        assert_eq!(c.pose.fist_reference, FistReference::Pip);
    }

    #[test]
    fn test_buffer_size_selects_moving_average() {
        let c = EngineConfig::from_sexp_str("(:buffer-size 5 :smoothing-alpha 0.6)").unwrap();
        assert_eq!(
            c.pointer.smoothing,
            Smoothing::MovingAverage {
                window: 5,
                alpha: Some(0.6)
            }
        );
    }

    #[test]
    fn test_hysteresis_inverted_rejected() {
        let err = EngineConfig::from_sexp_str("(:pinch-threshold-on 50 :pinch-threshold-off 40)").unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "pinch-threshold-off"),
            "got {:?}",
            err
        );
    }

    #[test]
    fn test_bad_alpha_rejected() {
        assert!(EngineConfig::from_sexp_str("(:smoothing-alpha 0)").is_err());
        assert!(EngineConfig::from_sexp_str("(:gaze-alpha 1.5)").is_err());
    }

    #[test]
    fn test_non_numeric_rejected() {
        let err = EngineConfig::from_sexp_str("(:hold-threshold fast)").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_unknown_mode_rejected() {
        assert!(EngineConfig::from_sexp_str("(:mode :juggling)").is_err());
    }

    #[test]
    fn test_malformed_sexp() {
        assert!(matches!(
            EngineConfig::from_sexp_str("(:frame-width"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_pointer_for_modes() {
        let c = EngineConfig::default();
        assert_eq!(c.pointer_for(Mode::Draw).smoothing, Smoothing::Exponential { alpha: 0.5 });
        assert_eq!(c.pointer_for(Mode::Gaze).smoothing, Smoothing::Exponential { alpha: 0.2 });
        assert_eq!(c.pointer_for(Mode::Mouse).smoothing, Smoothing::Exponential { alpha: 0.7 });
    }

    #[test]
    fn test_to_sexp_reparses() {
        let c = EngineConfig::from_sexp_str("(:cooldown-frames 20 :jitter-threshold 3)").unwrap();
        let again = EngineConfig::from_sexp_str(&c.to_sexp()).unwrap();
        assert_eq!(again.debounce.cooldown_frames, 20);
        assert_eq!(again.pointer.jitter_threshold_px, 3.0);
    }

    #[test]
    fn test_load_missing_file() {
        let err = EngineConfig::load(Path::new("/nonexistent/handctl.sexp")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
