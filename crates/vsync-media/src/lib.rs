#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper for audio/video synchronization.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with multiple inputs
//! - A runner that streams stderr to a caller-supplied consumer under a timeout
//! - FFprobe duration and audio-stream probing that degrades instead of failing
//! - The sync filter graph builder (offset, crossfade, clip vs. pad)
//! - Incremental parsing of FFmpeg's progress output

pub mod command;
pub mod error;
pub mod fs_utils;
pub mod probe;
pub mod progress;
pub mod sync_graph;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner, StderrTail};
pub use error::{MediaError, MediaResult};
pub use fs_utils::{move_file, remove_dir_quietly, remove_file_quietly};
pub use probe::{probe_media, MediaProbe};
pub use progress::{
    is_progress_field, parse_time_marker, LineBuffer, ProgressTracker, ProgressUpdate, PROCESSING_CEILING_PERCENT,
    PROCESSING_START_PERCENT,
};
pub use sync_graph::{build_sync_command, SyncGraph, SyncOptions};
