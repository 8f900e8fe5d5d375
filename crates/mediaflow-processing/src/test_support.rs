//! Shell stand-ins for the ffmpeg executables.
//!
//! The ffprobe stand-in prints a fixed JSON document. The ffmpeg stand-in
//! appends its argv to a log and writes one byte to its last argument, which
//! is always the output path.

use crate::ffmpeg::FfmpegTools;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub(crate) struct StubTools {
    _dir: TempDir,
    log: PathBuf,
    pub tools: FfmpegTools,
}

impl StubTools {
    pub fn new(ffprobe_json: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let fixture = dir.path().join("ffprobe.json");
        let log = dir.path().join("ffmpeg.log");
        std::fs::write(&fixture, ffprobe_json).unwrap();

        let ffprobe = write_script(
            dir.path(),
            "ffprobe",
            &format!("cat '{}'\n", fixture.display()),
        );
        let ffmpeg = write_script(
            dir.path(),
            "ffmpeg",
            &format!(
                "printf '%s\\n' \"$*\" >> '{}'\nfor last; do :; done\nprintf x > \"$last\"\n",
                log.display()
            ),
        );

        Self {
            tools: FfmpegTools::new(ffmpeg.display().to_string(), ffprobe.display().to_string()),
            log,
            _dir: dir,
        }
    }

    /// One line per ffmpeg invocation, in completion order.
    pub fn ffmpeg_calls(&self) -> Vec<String> {
        std::fs::read_to_string(&self.log)
            .unwrap_or_default()
            .lines()
            .map(String::from)
            .collect()
    }
}

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

pub(crate) fn video_probe_json(codec: &str, width: u32, height: u32, duration: &str) -> String {
    serde_json::json!({
        "format": { "duration": duration, "bit_rate": "800000" },
        "streams": [
            {
                "codec_type": "video",
                "codec_name": codec,
                "width": width,
                "height": height,
                "r_frame_rate": "30/1"
            },
            { "codec_type": "audio", "codec_name": "aac", "sample_rate": "48000", "channels": 2 }
        ]
    })
    .to_string()
}

pub(crate) fn audio_probe_json(codec: &str, duration: &str) -> String {
    serde_json::json!({
        "format": { "duration": duration, "bit_rate": "128000" },
        "streams": [
            { "codec_type": "audio", "codec_name": codec, "sample_rate": "44100", "channels": 2 }
        ]
    })
    .to_string()
}
