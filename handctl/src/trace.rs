//! Landmark trace reader.
//!
//! A trace is the replay form of the tracker's output: one s-expression
//! per line, either a frame
//!
//! ```text
//! (:t 0.033 :hands ((x0 y0 x1 y1 ... x20 y20)) :face (x0 y0 ...))
//! ```
//!
//! or a control command
//!
//! ```text
//! (:t 2.0 :command :calibrate-start)
//! (:t 3.5 :command :switch-mode :mode :mouse)
//! ```
//!
//! Blank lines and lines starting with `;` are skipped.

use std::io::BufRead;

use lexpr::Value;

use crate::engine::landmarks::{FaceLandmarks, HandLandmarks, LandmarkFrame, Point2};
use crate::engine::modes::Mode;
use crate::error::TraceError;
use crate::sexp::{get_float, get_keyword, list_items, number_list, plist_get};

/// Out-of-band control requests carried in a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceCommand {
    CalibrateStart,
    CalibrateCapture,
    CalibrateCancel,
    /// Cancel pending delayed actions.
    Cancel,
    GazeOn,
    GazeOff,
    SwitchMode(Mode),
}

impl TraceCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CalibrateStart => "calibrate-start",
            Self::CalibrateCapture => "calibrate-capture",
            Self::CalibrateCancel => "calibrate-cancel",
            Self::Cancel => "cancel",
            Self::GazeOn => "gaze-on",
            Self::GazeOff => "gaze-off",
            Self::SwitchMode(_) => "switch-mode",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TraceEntry {
    Frame(LandmarkFrame),
    Command { timestamp_s: f64, command: TraceCommand },
}

impl TraceEntry {
    pub fn timestamp_s(&self) -> f64 {
        match self {
            Self::Frame(f) => f.timestamp_s,
            Self::Command { timestamp_s, .. } => *timestamp_s,
        }
    }
}

/// Parse one trace line.  `Ok(None)` for blank and comment lines.
pub fn parse_line(text: &str, line: usize) -> Result<Option<TraceEntry>, TraceError> {
    let text = text.trim();
    if text.is_empty() || text.starts_with(';') {
        return Ok(None);
    }
    let value = lexpr::from_str(text).map_err(|e| TraceError::Parse {
        line,
        reason: e.to_string(),
    })?;

    let timestamp_s = get_float(&value, "t").ok_or(TraceError::MissingKey { line, key: "t" })?;

    if let Some(name) = get_keyword(&value, "command") {
        let command = parse_command(&value, &name, line)?;
        return Ok(Some(TraceEntry::Command {
            timestamp_s,
            command,
        }));
    }

    let mut frame = LandmarkFrame::new(timestamp_s);
    if let Some(hands) = plist_get(&value, "hands") {
        for hand in list_items(hands) {
            let points = parse_points(hand, line)?;
            let hand = HandLandmarks::new(points).map_err(|source| TraceError::Landmarks { line, source })?;
            frame.hands.push(hand);
        }
    }
    if let Some(face) = plist_get(&value, "face") {
        if !is_nil(face) {
            let points = parse_points(face, line)?;
            let face = FaceLandmarks::new(points).map_err(|source| TraceError::Landmarks { line, source })?;
            frame.face = Some(face);
        }
    }
    Ok(Some(TraceEntry::Frame(frame)))
}

fn is_nil(value: &Value) -> bool {
    match value {
        Value::Null | Value::Nil => true,
        Value::Symbol(s) => s.as_ref() == "nil",
        _ => false,
    }
}

fn parse_command(value: &Value, name: &str, line: usize) -> Result<TraceCommand, TraceError> {
    Ok(match name {
        "calibrate-start" => TraceCommand::CalibrateStart,
        "calibrate-capture" => TraceCommand::CalibrateCapture,
        "calibrate-cancel" => TraceCommand::CalibrateCancel,
        "cancel" => TraceCommand::Cancel,
        "gaze-on" => TraceCommand::GazeOn,
        "gaze-off" => TraceCommand::GazeOff,
        "switch-mode" => {
            let mode = get_keyword(value, "mode").ok_or(TraceError::MissingKey { line, key: "mode" })?;
            TraceCommand::SwitchMode(Mode::parse(&mode).ok_or_else(|| TraceError::UnknownCommand {
                line,
                command: format!("switch-mode {}", mode),
            })?)
        }
        other => {
            return Err(TraceError::UnknownCommand {
                line,
                command: other.to_string(),
            })
        }
    })
}

/// Flat `x0 y0 x1 y1 ...` list into points.
fn parse_points(value: &Value, line: usize) -> Result<Vec<Point2>, TraceError> {
    let numbers = number_list(value).ok_or_else(|| TraceError::Parse {
        line,
        reason: "landmark list must contain only numbers".to_string(),
    })?;
    if numbers.len() % 2 != 0 {
        return Err(TraceError::Parse {
            line,
            reason: format!("odd coordinate count {}", numbers.len()),
        });
    }
    Ok(numbers
        .chunks_exact(2)
        .map(|xy| Point2::new(xy[0] as f32, xy[1] as f32))
        .collect())
}

/// Iterator over the entries of a trace stream.
pub struct TraceReader<R> {
    input: R,
    line: usize,
    buf: String,
}

impl<R: BufRead> TraceReader<R> {
    pub fn new(input: R) -> Self {
        Self {
            input,
            line: 0,
            buf: String::new(),
        }
    }
}

impl<R: BufRead> Iterator for TraceReader<R> {
    type Item = Result<TraceEntry, TraceError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.input.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {
                    self.line += 1;
                    match parse_line(&self.buf, self.line) {
                        Ok(None) => continue,
                        Ok(Some(entry)) => return Some(Ok(entry)),
                        Err(e) => return Some(Err(e)),
                    }
                }
                Err(e) => return Some(Err(TraceError::Io(e))),
            }
        }
    }
}

/// Format a frame as a trace line.
pub fn format_frame(frame: &LandmarkFrame) -> String {
    let coords = |points: &[Point2]| {
        points
            .iter()
            .map(|p| format!("{} {}", p.x, p.y))
            .collect::<Vec<_>>()
            .join(" ")
    };
    let hands: Vec<String> = frame
        .hands
        .iter()
        .map(|h| format!("({})", coords(h.points())))
        .collect();
    let mut line = format!("(:t {} :hands ({})", frame.timestamp_s, hands.join(" "));
    if let Some(face) = &frame.face {
        line.push_str(&format!(" :face ({})", coords(face.points())));
    }
    line.push(')');
    line
}
