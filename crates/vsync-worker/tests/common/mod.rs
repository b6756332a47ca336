//! Fake FFmpeg/FFprobe executables for integration tests.
//!
//! Also compiled into the vsync-api tests through `#[path]`.

#![allow(dead_code)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// How the fake FFmpeg behaves.
pub enum FfmpegBehavior {
    /// Print progress up to `secs`, write the output and exit 0
    Succeed { secs: u32 },
    /// Like `Succeed`, pausing `pause_ms` after each progress block
    Slow { secs: u32, pause_ms: u32 },
    /// Print progress up to `secs`, then exit 1
    Fail { secs: u32 },
    /// Exit 0 without writing the output
    NoOutput,
    /// Sleep past any reasonable timeout
    Hang,
}

/// How the fake FFprobe behaves.
pub enum FfprobeBehavior {
    /// Report a duration and whether an audio stream exists
    Report { duration: f64, has_audio: bool },
    /// Crash on every call
    Crash,
}

/// Scripts and their argument log inside a temp directory.
pub struct FakeTools {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
    args_log: PathBuf,
}

impl FakeTools {
    pub fn install(dir: &Path, ffmpeg: FfmpegBehavior, ffprobe: FfprobeBehavior) -> Self {
        let bin = dir.join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        let args_log = dir.join("ffmpeg_args.txt");

        let paced_progress = |secs: u32, pause_ms: u32| {
            let mut lines = String::new();
            for t in (0..=secs).step_by(10) {
                lines.push_str(&format!(
                    "echo 'out_time=00:{:02}:{:02}.000000' >&2\necho 'speed=2.0x' >&2\necho 'progress=continue' >&2\n",
                    t / 60,
                    t % 60
                ));
                if pause_ms > 0 {
                    lines.push_str(&format!("sleep {}.{:03}\n", pause_ms / 1000, pause_ms % 1000));
                }
            }
            lines
        };
        let progress = |secs: u32| paced_progress(secs, 0);

        let body = match ffmpeg {
            FfmpegBehavior::Succeed { secs } => format!(
                "{}echo 'progress=end' >&2\nprintf 'fake mp4' > \"$last\"\nexit 0\n",
                progress(secs)
            ),
            FfmpegBehavior::Slow { secs, pause_ms } => format!(
                "{}echo 'progress=end' >&2\nprintf 'fake mp4' > \"$last\"\nexit 0\n",
                paced_progress(secs, pause_ms)
            ),
            FfmpegBehavior::Fail { secs } => format!(
                "{}echo 'Conversion failed!' >&2\nexit 1\n",
                progress(secs)
            ),
            FfmpegBehavior::NoOutput => "exit 0\n".to_string(),
            FfmpegBehavior::Hang => "exec sleep 30\n".to_string(),
        };
        let ffmpeg_script = format!(
            "#!/bin/sh\nprintf '%s\\n' \"$@\" > '{}'\nfor last; do :; done\n{}",
            args_log.display(),
            body
        );

        let ffprobe_script = match ffprobe {
            FfprobeBehavior::Report { duration, has_audio } => {
                let streams = if has_audio {
                    r#"{"streams": [{"index": 1, "codec_type": "audio"}]}"#
                } else {
                    r#"{"streams": []}"#
                };
                format!(
                    "#!/bin/sh\ncase \"$*\" in\n  *-show_format*) echo '{{\"format\": {{\"duration\": \"{:.6}\"}}}}' ;;\n  *) echo '{}' ;;\nesac\n",
                    duration, streams
                )
            }
            FfprobeBehavior::Crash => "#!/bin/sh\necho 'Segmentation fault' >&2\nexit 139\n".to_string(),
        };

        let tools = Self {
            ffmpeg: bin.join("ffmpeg"),
            ffprobe: bin.join("ffprobe"),
            args_log,
        };
        write_executable(&tools.ffmpeg, &ffmpeg_script);
        write_executable(&tools.ffprobe, &ffprobe_script);
        tools
    }

    /// Arguments of the last FFmpeg invocation.
    pub fn ffmpeg_args(&self) -> Vec<String> {
        std::fs::read_to_string(&self.args_log)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

fn write_executable(path: &Path, contents: &str) {
    std::fs::write(path, contents).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

/// Value following `flag` in an argument list.
pub fn arg_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

/// All values following each occurrence of `flag`.
pub fn args_after<'a>(args: &'a [String], flag: &str) -> Vec<&'a str> {
    args.windows(2)
        .filter(|w| w[0] == flag)
        .map(|w| w[1].as_str())
        .collect()
}
