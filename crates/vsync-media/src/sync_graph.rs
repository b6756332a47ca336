//! Filter graph for aligning a replacement audio track with a video.
//!
//! Input 0 is the video (optionally carrying its own audio), input 1 is the
//! replacement audio. The graph depends only on [`SyncOptions`]:
//!
//! | mode    | offset | video                   | replacement audio          |
//! |---------|--------|-------------------------|----------------------------|
//! | clip    | > 0    | `trim=start=offset`     | `adelay=ms\|ms`            |
//! | clip    | < 0    | untouched               | `atrim=start=\|offset\|`   |
//! | silence | > 0    | untouched               | `adelay=ms\|ms`            |
//! | silence | < 0    | untouched               | `apad=pad_dur=\|offset\|`  |
//! | any     | 0      | untouched               | untouched                  |
//!
//! A crossfade below 100 mixes the video's own audio back in underneath.

use std::path::Path;

use crate::command::FfmpegCommand;

const VIDEO_IN: &str = "0:v";
const ORIGINAL_AUDIO_IN: &str = "0:a";
const REPLACEMENT_AUDIO_IN: &str = "1:a";

/// Parameters that shape the sync filter graph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncOptions {
    /// Audio offset in seconds; positive delays the replacement audio
    pub offset: f64,
    /// Replacement audio weight, 0-100
    pub crossfade: f64,
    /// Trim the video (clip mode) instead of padding the audio (silence mode)
    pub clip_video: bool,
    /// Whether the video file has an audio stream of its own
    pub video_has_audio: bool,
}

impl SyncOptions {
    /// Crossfade after accounting for a video without audio.
    pub fn effective_crossfade(&self) -> f64 {
        if self.video_has_audio {
            self.crossfade
        } else {
            100.0
        }
    }

    /// Whether the video stream must be re-encoded.
    pub fn trims_video(&self) -> bool {
        self.clip_video && self.offset > 0.0
    }
}

/// Resolved filter graph and stream mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncGraph {
    /// Filter chains, joined with `;` for `-filter_complex`
    pub filters: Vec<String>,
    /// `-map` argument for the video stream
    pub video_map: String,
    /// `-map` argument for the audio stream
    pub audio_map: String,
    /// Re-encode video instead of stream-copying it
    pub reencode_video: bool,
}

impl SyncGraph {
    /// Build the graph for the given options.
    pub fn build(opts: &SyncOptions) -> Self {
        let mut filters = Vec::new();
        let offset = opts.offset;
        let abs_offset = offset.abs();
        let delay_ms = (abs_offset * 1000.0) as i64;

        let mut video = Stream::Raw(VIDEO_IN);
        let mut audio = Stream::Raw(REPLACEMENT_AUDIO_IN);

        if opts.clip_video {
            if offset > 0.0 {
                filters.push(format!("[{VIDEO_IN}]trim=start={offset}[video_trimmed]"));
                filters.push(format!(
                    "[{REPLACEMENT_AUDIO_IN}]adelay={delay_ms}|{delay_ms}[audio_delayed]"
                ));
                video = Stream::Label("video_trimmed");
                audio = Stream::Label("audio_delayed");
            } else if offset < 0.0 {
                filters.push(format!(
                    "[{REPLACEMENT_AUDIO_IN}]atrim=start={abs_offset}[audio_trimmed]"
                ));
                audio = Stream::Label("audio_trimmed");
            }
        } else if offset > 0.0 {
            filters.push(format!(
                "[{REPLACEMENT_AUDIO_IN}]adelay={delay_ms}|{delay_ms}[audio_delayed]"
            ));
            audio = Stream::Label("audio_delayed");
        } else if offset < 0.0 {
            filters.push(format!(
                "[{REPLACEMENT_AUDIO_IN}]apad=pad_dur={abs_offset}[audio_padded]"
            ));
            audio = Stream::Label("audio_padded");
        }

        let crossfade = opts.effective_crossfade();
        if crossfade < 100.0 {
            let original_level = (100.0 - crossfade) / 100.0;
            let clean_level = crossfade / 100.0;

            if opts.trims_video() {
                // Keep the original track aligned with the trimmed video
                filters.push(format!(
                    "[{ORIGINAL_AUDIO_IN}]atrim=start={offset},volume={original_level}[orig_audio]"
                ));
            } else {
                filters.push(format!(
                    "[{ORIGINAL_AUDIO_IN}]volume={original_level}[orig_audio]"
                ));
            }
            filters.push(format!(
                "[{}]volume={clean_level}[clean_audio]",
                audio.graph_input()
            ));
            filters.push("[orig_audio][clean_audio]amix=inputs=2[final_audio]".to_string());
            audio = Stream::Label("final_audio");
        }

        Self {
            filters,
            video_map: video.map_arg(),
            audio_map: audio.map_arg(),
            reencode_video: opts.trims_video(),
        }
    }

    /// Graph string for `-filter_complex`, if any filter is needed.
    pub fn filter_complex(&self) -> Option<String> {
        if self.filters.is_empty() {
            None
        } else {
            Some(self.filters.join(";"))
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    /// An input stream specifier such as `0:v`
    Raw(&'static str),
    /// A filter graph output label
    Label(&'static str),
}

impl Stream {
    fn graph_input(&self) -> &'static str {
        match self {
            Stream::Raw(s) | Stream::Label(s) => s,
        }
    }

    fn map_arg(&self) -> String {
        match self {
            Stream::Raw(s) => s.to_string(),
            Stream::Label(s) => format!("[{s}]"),
        }
    }
}

/// Build the full FFmpeg command that muxes `video` with re-timed `audio`.
pub fn build_sync_command(
    video: impl AsRef<Path>,
    audio: impl AsRef<Path>,
    output: impl AsRef<Path>,
    opts: &SyncOptions,
) -> FfmpegCommand {
    let graph = SyncGraph::build(opts);

    let mut cmd = FfmpegCommand::new(video, output).add_input(audio);

    if let Some(filter) = graph.filter_complex() {
        cmd = cmd.filter_complex(filter);
    }
    cmd = cmd.map(graph.video_map).map(graph.audio_map);

    cmd = if graph.reencode_video {
        cmd.video_codec("libx264")
            .preset("ultrafast")
            .crf(23)
            .pixel_format("yuv420p")
    } else {
        cmd.video_codec("copy")
    };

    cmd.audio_codec("aac")
        .audio_bitrate("128k")
        .audio_sample_rate(48_000)
        .audio_channels(2)
        .output_args(["-movflags", "+faststart", "-f", "mp4"])
}
