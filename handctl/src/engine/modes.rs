//! Interaction modes and their gesture bindings.
//!
//! Each mode commits a different subset of gestures and maps them to
//! actions.  Switching mode never restarts tracking; the pipeline just
//! swaps the active table and resets pointer state.

use super::action::Shortcut;
use super::debounce::GestureKind;

/// Top-level operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Mode chooser.  No pointer.
    Menu,
    /// Fingertip pointer with pinch click and drag.
    Mouse,
    /// Fingertip handwriting canvas.
    Draw,
    /// Gesture keyboard shortcuts.
    Shortcut,
    /// Iris-driven pointer through the calibration model.
    Gaze,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Menu => "menu",
            Self::Mouse => "mouse",
            Self::Draw => "draw",
            Self::Shortcut => "shortcut",
            Self::Gaze => "gaze",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "menu" => Some(Self::Menu),
            "mouse" => Some(Self::Mouse),
            "draw" => Some(Self::Draw),
            "shortcut" | "gesture" => Some(Self::Shortcut),
            "gaze" | "eye" => Some(Self::Gaze),
            _ => None,
        }
    }

    /// Whether the fingertip drives a pointer in this mode.
    pub fn tracks_fingertip(&self) -> bool {
        matches!(self, Self::Mouse | Self::Draw)
    }

    /// Whether a two-hand clap is meaningful in this mode.
    pub fn listens_for_clap(&self) -> bool {
        matches!(self, Self::Shortcut)
    }

    /// Gesture bindings for this mode.
    pub fn bindings(&self) -> &'static [ModeBinding] {
        match self {
            Self::Menu => MENU_BINDINGS,
            Self::Mouse => MOUSE_BINDINGS,
            Self::Draw => DRAW_BINDINGS,
            Self::Shortcut => SHORTCUT_BINDINGS,
            Self::Gaze => GAZE_BINDINGS,
        }
    }

    /// Gesture kinds that commit in this mode.
    pub fn actionable(&self) -> Vec<GestureKind> {
        self.bindings().iter().map(|b| b.gesture).collect()
    }

    /// Action bound to a committed gesture.
    pub fn action_for(&self, gesture: GestureKind) -> Option<ModeAction> {
        self.bindings()
            .iter()
            .find(|b| b.gesture == gesture)
            .map(|b| b.action)
    }
}

/// What a committed gesture does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeAction {
    SwitchMode(Mode),
    Quit,
    RightClick,
    ToggleScroll,
    /// Show or hide the on-screen overlay.
    ToggleOverlay,
    Shortcut(Shortcut),
    SaveCanvas,
    ClearCanvas,
}

impl ModeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SwitchMode(_) => "switch-mode",
            Self::Quit => "quit",
            Self::RightClick => "right-click",
            Self::ToggleScroll => "toggle-scroll",
            Self::ToggleOverlay => "toggle-overlay",
            Self::Shortcut(_) => "shortcut",
            Self::SaveCanvas => "save-canvas",
            Self::ClearCanvas => "clear-canvas",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ModeBinding {
    pub gesture: GestureKind,
    pub action: ModeAction,
}

const fn bind(gesture: GestureKind, action: ModeAction) -> ModeBinding {
    ModeBinding { gesture, action }
}

/// Any single extended finger opens the canvas, thumb and pinky included.
static MENU_BINDINGS: &[ModeBinding] = &[
    bind(GestureKind::OneFinger, ModeAction::SwitchMode(Mode::Draw)),
    bind(GestureKind::ThumbsUp, ModeAction::SwitchMode(Mode::Draw)),
    bind(GestureKind::PinkyOnly, ModeAction::SwitchMode(Mode::Draw)),
    bind(GestureKind::ThreeFingers, ModeAction::SwitchMode(Mode::Mouse)),
    bind(GestureKind::OpenPalm, ModeAction::SwitchMode(Mode::Shortcut)),
    bind(GestureKind::FourFingers, ModeAction::Quit),
];

static MOUSE_BINDINGS: &[ModeBinding] = &[
    bind(GestureKind::ThreeFingers, ModeAction::RightClick),
    bind(GestureKind::RockSign, ModeAction::ToggleOverlay),
    bind(GestureKind::OpenPalm, ModeAction::ToggleScroll),
    bind(GestureKind::FourFingers, ModeAction::SwitchMode(Mode::Menu)),
];

static DRAW_BINDINGS: &[ModeBinding] = &[
    bind(GestureKind::ThreeFingers, ModeAction::SaveCanvas),
    bind(GestureKind::Fist, ModeAction::ClearCanvas),
    bind(GestureKind::FourFingers, ModeAction::SwitchMode(Mode::Menu)),
];

static SHORTCUT_BINDINGS: &[ModeBinding] = &[
    bind(GestureKind::Fist, ModeAction::Shortcut(Shortcut::Copy)),
    bind(GestureKind::OpenPalm, ModeAction::Shortcut(Shortcut::Paste)),
    bind(GestureKind::ThreeFingers, ModeAction::Shortcut(Shortcut::Save)),
    bind(GestureKind::ThumbsUp, ModeAction::Shortcut(Shortcut::Enter)),
    bind(GestureKind::PeaceSign, ModeAction::Shortcut(Shortcut::Space)),
    bind(GestureKind::PinkyOnly, ModeAction::Shortcut(Shortcut::Undo)),
    bind(GestureKind::RockSign, ModeAction::ToggleOverlay),
    bind(GestureKind::FourFingers, ModeAction::SwitchMode(Mode::Menu)),
];

static GAZE_BINDINGS: &[ModeBinding] = &[bind(
    GestureKind::FourFingers,
    ModeAction::SwitchMode(Mode::Menu),
)];

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_MODES: [Mode; 5] = [Mode::Menu, Mode::Mouse, Mode::Draw, Mode::Shortcut, Mode::Gaze];

    #[test]
    fn test_every_mode_can_leave() {
        for mode in ALL_MODES {
            assert!(
                mode.bindings()
                    .iter()
                    .any(|b| matches!(b.action, ModeAction::SwitchMode(_) | ModeAction::Quit)),
                "{:?} has no way out",
                mode,
            );
        }
    }

    #[test]
    fn test_bindings_unique_per_mode() {
        for mode in ALL_MODES {
            let kinds = mode.actionable();
            for (i, k) in kinds.iter().enumerate() {
                assert!(!kinds[i + 1..].contains(k), "{:?} binds {:?} twice", mode, k);
            }
        }
    }

    #[test]
    fn test_menu_routes() {
        assert_eq!(
            Mode::Menu.action_for(GestureKind::ThreeFingers),
            Some(ModeAction::SwitchMode(Mode::Mouse))
        );
        assert_eq!(Mode::Menu.action_for(GestureKind::FourFingers), Some(ModeAction::Quit));
        assert_eq!(Mode::Menu.action_for(GestureKind::Fist), None);
    }

    #[test]
    fn test_menu_single_finger_opens_draw() {
        for gesture in [GestureKind::OneFinger, GestureKind::ThumbsUp, GestureKind::PinkyOnly] {
            assert_eq!(
                Mode::Menu.action_for(gesture),
                Some(ModeAction::SwitchMode(Mode::Draw)),
                "{:?}",
                gesture,
            );
        }
    }

    #[test]
    fn test_shortcut_table() {
        assert_eq!(
            Mode::Shortcut.action_for(GestureKind::PinkyOnly),
            Some(ModeAction::Shortcut(Shortcut::Undo))
        );
        assert_eq!(
            Mode::Shortcut.action_for(GestureKind::PeaceSign),
            Some(ModeAction::Shortcut(Shortcut::Space))
        );
    }

    #[test]
    fn test_parse_roundtrip_names() {
        for mode in ALL_MODES {
            assert_eq!(Mode::parse(mode.as_str()), Some(mode));
        }
        assert_eq!(Mode::parse("gesture"), Some(Mode::Shortcut));
        assert_eq!(Mode::parse("bogus"), None);
    }

    #[test]
    fn test_pointer_modes() {
        assert!(Mode::Mouse.tracks_fingertip());
        assert!(Mode::Draw.tracks_fingertip());
        assert!(!Mode::Menu.tracks_fingertip());
        assert!(!Mode::Gaze.tracks_fingertip());
    }
}
