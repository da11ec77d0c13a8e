//! Intent events and the action-dispatch seam.
//!
//! The engine only decides *what* should happen.  Injecting mouse and key
//! events, drawing strokes and saving canvases belong to an external
//! dispatcher behind `ActionDispatcher`.

use std::io::Write;

use super::landmarks::Point2;
use super::modes::Mode;
use crate::error::DispatchError;
use crate::sexp::format_event;

/// Keyboard shortcut requested by a gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shortcut {
    Copy,
    Paste,
    Save,
    Undo,
    Space,
    Enter,
}

impl Shortcut {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Copy => "copy",
            Self::Paste => "paste",
            Self::Save => "save",
            Self::Undo => "undo",
            Self::Space => "space",
            Self::Enter => "enter",
        }
    }

    /// Conventional key chord for the shortcut.
    pub fn keys(&self) -> &'static str {
        match self {
            Self::Copy => "ctrl+c",
            Self::Paste => "ctrl+v",
            Self::Save => "ctrl+s",
            Self::Undo => "ctrl+z",
            Self::Space => "space",
            Self::Enter => "enter",
        }
    }
}

/// A discrete request for the action dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    Click,
    DoubleClick,
    /// Atomic press and release of the secondary button.
    RightClick,
    /// Primary button down.
    DragStart,
    /// Primary button up.
    DragEnd,
    /// Scroll by whole units.  Positive scrolls up.
    ScrollDelta(i32),
    /// Toggle the overlay UI.
    ModeToggle,
    ModeSwitch(Mode),
    Shortcut(Shortcut),
    StrokeSegment { from: Point2, to: Point2 },
    StrokeEnd,
    ClearCanvas,
    SaveCanvas,
    ShutdownScheduled { delay_s: f64 },
    ShutdownCancelled,
    Shutdown,
    Quit,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::DoubleClick => "double-click",
            Self::RightClick => "right-click",
            Self::DragStart => "drag-start",
            Self::DragEnd => "drag-end",
            Self::ScrollDelta(_) => "scroll",
            Self::ModeToggle => "mode-toggle",
            Self::ModeSwitch(_) => "mode-switch",
            Self::Shortcut(_) => "shortcut",
            Self::StrokeSegment { .. } => "stroke-segment",
            Self::StrokeEnd => "stroke-end",
            Self::ClearCanvas => "clear-canvas",
            Self::SaveCanvas => "save-canvas",
            Self::ShutdownScheduled { .. } => "shutdown-scheduled",
            Self::ShutdownCancelled => "shutdown-cancelled",
            Self::Shutdown => "shutdown",
            Self::Quit => "quit",
        }
    }

    /// Whether the intent ends the session.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Shutdown | Self::Quit)
    }

    /// Generate the event s-expression.
    pub fn to_sexp(&self) -> String {
        match self {
            Self::ScrollDelta(delta) => format_event(self.as_str(), &[("delta", delta.to_string().as_str())]),
            Self::ModeSwitch(mode) => {
                format_event(self.as_str(), &[("mode", format!(":{}", mode.as_str()).as_str())])
            }
            Self::Shortcut(s) => format_event(
                self.as_str(),
                &[
                    ("name", format!(":{}", s.as_str()).as_str()),
                    ("keys", format!("\"{}\"", s.keys()).as_str()),
                ],
            ),
            Self::StrokeSegment { from, to } => format_event(
                self.as_str(),
                &[
                    ("from", format!("({:.0} {:.0})", from.x, from.y).as_str()),
                    ("to", format!("({:.0} {:.0})", to.x, to.y).as_str()),
                ],
            ),
            Self::ShutdownScheduled { delay_s } => {
                format_event(self.as_str(), &[("delay", format!("{:.1}", delay_s).as_str())])
            }
            _ => format_event(self.as_str(), &[]),
        }
    }
}

// ── Dispatch seam ───────────────────────────────────────────

/// External collaborator that turns intents into OS-level effects.
pub trait ActionDispatcher {
    /// Move the pointer to a screen position.
    fn move_pointer(&mut self, position: Point2) -> Result<(), DispatchError>;

    /// Perform a discrete intent.
    fn dispatch(&mut self, intent: &Intent) -> Result<(), DispatchError>;
}

/// Writes every intent as an s-expression line.
pub struct LogDispatcher<W: Write> {
    out: W,
    /// Also write pointer moves.
    pub emit_pointer: bool,
}

impl<W: Write> LogDispatcher<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            emit_pointer: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_line(&mut self, what: &str, line: &str) -> Result<(), DispatchError> {
        writeln!(self.out, "{}", line).map_err(|e| DispatchError::Failed {
            intent: what.to_string(),
            reason: e.to_string(),
        })
    }
}

impl<W: Write> ActionDispatcher for LogDispatcher<W> {
    fn move_pointer(&mut self, position: Point2) -> Result<(), DispatchError> {
        if !self.emit_pointer {
            return Ok(());
        }
        let line = format_event(
            "pointer",
            &[
                ("x", format!("{:.0}", position.x).as_str()),
                ("y", format!("{:.0}", position.y).as_str()),
            ],
        );
        self.write_line("pointer", &line)
    }

    fn dispatch(&mut self, intent: &Intent) -> Result<(), DispatchError> {
        let line = intent.to_sexp();
        self.write_line(intent.as_str(), &line)
    }
}

/// Keeps everything it is asked to do.  Can be told to fail.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    pub intents: Vec<Intent>,
    pub moves: Vec<Point2>,
    /// Intent names that fail instead of being recorded.
    pub fail_on: Vec<&'static str>,
}

#[cfg(test)]
impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl ActionDispatcher for RecordingDispatcher {
    fn move_pointer(&mut self, position: Point2) -> Result<(), DispatchError> {
        self.moves.push(position);
        Ok(())
    }

    fn dispatch(&mut self, intent: &Intent) -> Result<(), DispatchError> {
        if self.fail_on.contains(&intent.as_str()) {
            tracing::warn!(intent = intent.as_str(), "Recording dispatcher refusing intent");
            return Err(DispatchError::Failed {
                intent: intent.as_str().to_string(),
                reason: "refused".to_string(),
            });
        }
        self.intents.push(intent.clone());
        Ok(())
    }
}
