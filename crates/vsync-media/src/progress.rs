//! FFmpeg progress parsing.
//!
//! FFmpeg's stderr arrives in arbitrary chunks that do not respect line
//! boundaries. [`LineBuffer`] reassembles lines and [`ProgressTracker`]
//! turns `time=`/`speed=`/`bitrate=` tokens into job progress.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Progress reported when FFmpeg starts.
pub const PROCESSING_START_PERCENT: u8 = 50;
/// Highest progress reported before the job completes.
pub const PROCESSING_CEILING_PERCENT: u8 = 95;

static TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"time=(\d{2}):(\d{2}):(\d{2})\.(\d+)").expect("valid regex"));
static SPEED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"speed=\s*([0-9.]+)x").expect("valid regex"));
static BITRATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"bitrate=\s*([0-9.]+)kbits/s").expect("valid regex"));

/// Reassembles lines from a byte stream read in arbitrary chunks.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every line it completes.
    ///
    /// Both `\n` and `\r` end a line; empty lines are dropped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in chunk {
            if byte == b'\n' || byte == b'\r' {
                self.take_line(&mut lines);
            } else {
                self.pending.push(byte);
            }
        }
        lines
    }

    /// Flush whatever is left once the stream ends.
    pub fn finish(&mut self) -> Option<String> {
        let mut lines = Vec::new();
        self.take_line(&mut lines);
        lines.pop()
    }

    fn take_line(&mut self, out: &mut Vec<String>) {
        if self.pending.is_empty() {
            return;
        }
        let line = String::from_utf8_lossy(&self.pending).trim().to_string();
        self.pending.clear();
        if !line.is_empty() {
            out.push(line);
        }
    }
}

/// Extract the elapsed media time, in seconds, from a `time=HH:MM:SS.frac` token.
///
/// The fraction may have any number of digits and is scaled by its length,
/// so `10.5`, `10.50` and `10.500` all read as 10.5 seconds.
pub fn parse_time_marker(line: &str) -> Option<f64> {
    let caps = TIME_RE.captures(line)?;
    let hours: f64 = caps[1].parse().ok()?;
    let minutes: f64 = caps[2].parse().ok()?;
    let seconds: f64 = caps[3].parse().ok()?;

    // Digits past nanoseconds add nothing and would overflow the integer parse
    let digits = &caps[4][..caps[4].len().min(9)];
    let fraction = digits.parse::<u64>().ok()? as f64 / 10f64.powi(digits.len() as i32);

    Some(hours * 3600.0 + minutes * 60.0 + seconds + fraction)
}

/// Whether a line is one of the `key=value` fields written by `-progress`.
///
/// These are not diagnostics and are left out of error logs.
pub fn is_progress_field(line: &str) -> bool {
    match line.split_once('=') {
        Some((key, value)) => {
            !key.is_empty()
                && key.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
                && !value.contains(' ')
        }
        None => false,
    }
}

fn parse_speed(line: &str) -> Option<f64> {
    SPEED_RE.captures(line)?[1].parse().ok()
}

fn parse_bitrate(line: &str) -> Option<f64> {
    BITRATE_RE.captures(line)?[1].parse().ok()
}

/// One progress observation derived from a `time=` line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Media time encoded so far, in seconds
    pub elapsed_secs: f64,
    /// Job percentage, `None` when the total duration is unknown
    pub percent: Option<u8>,
    /// Display message
    pub message: String,
}

/// Turns FFmpeg stderr lines into bounded, non-decreasing job progress.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    total_secs: f64,
    last_percent: u8,
    speed: Option<f64>,
    bitrate_kbps: Option<f64>,
}

impl ProgressTracker {
    /// Create a tracker for an output of `total_secs` seconds.
    ///
    /// A total of zero (probe failed) disables percentage estimates.
    pub fn new(total_secs: f64) -> Self {
        Self {
            total_secs,
            last_percent: PROCESSING_START_PERCENT,
            speed: None,
            bitrate_kbps: None,
        }
    }

    /// Whether percentages can be estimated.
    pub fn has_duration(&self) -> bool {
        self.total_secs > 0.0
    }

    /// Expected output duration, `None` when unknown.
    pub fn total_secs(&self) -> Option<f64> {
        self.has_duration().then_some(self.total_secs)
    }

    /// Map elapsed media time onto the 50-95 processing band.
    pub fn percent_for(&self, elapsed_secs: f64) -> Option<u8> {
        if !self.has_duration() {
            return None;
        }
        let raw = PROCESSING_START_PERCENT as f64
            + (elapsed_secs / self.total_secs) * (PROCESSING_CEILING_PERCENT - PROCESSING_START_PERCENT) as f64;
        Some(raw.clamp(0.0, PROCESSING_CEILING_PERCENT as f64) as u8)
    }

    /// Feed one stderr line. Returns an update when the line carries a time marker.
    pub fn observe(&mut self, line: &str) -> Option<ProgressUpdate> {
        if let Some(speed) = parse_speed(line) {
            self.speed = Some(speed);
        }
        if let Some(bitrate) = parse_bitrate(line) {
            self.bitrate_kbps = Some(bitrate);
        }

        let elapsed_secs = parse_time_marker(line)?;

        let percent = self.percent_for(elapsed_secs).map(|p| {
            self.last_percent = self.last_percent.max(p);
            self.last_percent
        });

        Some(ProgressUpdate {
            elapsed_secs,
            percent,
            message: self.message(elapsed_secs),
        })
    }

    fn message(&self, elapsed_secs: f64) -> String {
        let mut message = if self.has_duration() {
            format!(
                "Processing video: {:.1}s / {:.1}s",
                elapsed_secs, self.total_secs
            )
        } else {
            format!("Processing video: {:.1}s encoded", elapsed_secs)
        };
        if let Some(speed) = self.speed {
            message.push_str(&format!(" at {}x speed", speed));
        }
        if let Some(bitrate) = self.bitrate_kbps {
            message.push_str(&format!(" ({} kbps)", bitrate));
        }
        message
    }
}
