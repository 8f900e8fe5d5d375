//! ffmpeg / ffprobe wrappers
//!
//! Every call spawns one child process with `kill_on_drop`, so dropping the
//! future of a failed fan-out sibling also stops its encoder.

use crate::metadata::{AudioMetadata, VideoMetadata};
use anyhow::{anyhow, Context, Result};
use mediaflow_core::Dimension;
use serde::Deserialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

#[derive(Debug, Deserialize)]
struct FFprobeOutput {
    format: Option<FFprobeFormat>,
    streams: Option<Vec<FFprobeStream>>,
}

#[derive(Debug, Deserialize)]
struct FFprobeFormat {
    duration: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FFprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    sample_rate: Option<String>,
    channels: Option<u32>,
    r_frame_rate: Option<String>,
}

impl FFprobeOutput {
    fn duration(&self) -> Option<f64> {
        self.format
            .as_ref()
            .and_then(|f| f.duration.as_ref())
            .and_then(|d| d.parse::<f64>().ok())
    }

    fn bitrate(&self) -> Option<u64> {
        self.format
            .as_ref()
            .and_then(|f| f.bit_rate.as_ref())
            .and_then(|b| b.parse::<u64>().ok())
    }

    fn first_stream(&self, codec_type: &str) -> Option<&FFprobeStream> {
        self.streams
            .as_ref()?
            .iter()
            .find(|s| s.codec_type.as_deref() == Some(codec_type))
    }
}

fn parse_frame_rate(raw: &str) -> Option<f32> {
    let (num, den) = raw.split_once('/')?;
    let num: f32 = num.parse().ok()?;
    let den: f32 = den.parse().ok()?;
    if den != 0.0 {
        Some(num / den)
    } else {
        None
    }
}

/// Watermark overlay fed to ffmpeg as a second input
#[derive(Debug, Clone)]
pub struct OverlayInput {
    pub path: PathBuf,
    pub x: u32,
    pub y: u32,
}

/// Per-variant video encode settings
#[derive(Debug, Clone)]
pub struct VideoEncode {
    pub size: Dimension,
    /// Audio codec, `copy` when unset
    pub acodec: Option<String>,
    /// Video codec; left to ffmpeg's container default when unset
    pub vcodec: Option<String>,
    pub overlay: Option<OverlayInput>,
}

impl VideoEncode {
    fn args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-i".into(), input.into()];

        match &self.overlay {
            Some(overlay) => {
                let graph = format!(
                    "[0:v]scale={}:{}[base];[base][1:v]overlay={}:{}[out]",
                    self.size.width, self.size.height, overlay.x, overlay.y
                );
                args.extend([
                    OsString::from("-i"),
                    overlay.path.clone().into_os_string(),
                    OsString::from("-filter_complex"),
                    OsString::from(graph),
                    OsString::from("-map"),
                    OsString::from("[out]"),
                    OsString::from("-map"),
                    OsString::from("0:a?"),
                ]);
            }
            None => {
                args.extend([OsString::from("-s"), OsString::from(self.size.to_size_arg())]);
            }
        }

        args.extend([
            OsString::from("-c:a"),
            OsString::from(self.acodec.as_deref().unwrap_or("copy")),
        ]);
        if let Some(vcodec) = &self.vcodec {
            args.extend([OsString::from("-c:v"), OsString::from(vcodec)]);
        }
        args.push(output.into());
        args
    }
}

/// Paths of the ffmpeg executables
#[derive(Debug, Clone)]
pub struct FfmpegTools {
    ffmpeg_path: String,
    ffprobe_path: String,
}

impl Default for FfmpegTools {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

impl FfmpegTools {
    pub fn new(ffmpeg_path: impl Into<String>, ffprobe_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
        }
    }

    pub fn from_config(config: &mediaflow_core::Config) -> Self {
        Self::new(config.ffmpeg_path.clone(), config.ffprobe_path.clone())
    }

    async fn probe(&self, path: &Path) -> Result<FFprobeOutput> {
        let output = Command::new(&self.ffprobe_path)
            .args(["-v", "error", "-show_format", "-show_streams", "-of", "json"])
            .arg(path)
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to execute {}", self.ffprobe_path))?;

        if !output.status.success() {
            return Err(anyhow!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }

        serde_json::from_slice(&output.stdout).context("Failed to parse ffprobe output")
    }

    /// Primary video stream geometry and codec plus container duration
    #[tracing::instrument(skip(self), fields(ffmpeg.operation = "probe"))]
    pub async fn probe_video(&self, path: &Path) -> Result<VideoMetadata> {
        let start = std::time::Instant::now();
        let probe = self.probe(path).await?;

        let stream = probe
            .first_stream("video")
            .ok_or_else(|| anyhow!("No video stream found"))?;
        let width = stream
            .width
            .ok_or_else(|| anyhow!("Could not parse width"))?;
        let height = stream
            .height
            .ok_or_else(|| anyhow!("Could not parse height"))?;
        let codec = stream
            .codec_name
            .clone()
            .unwrap_or_else(|| "unknown".to_string());
        let framerate = stream.r_frame_rate.as_deref().and_then(parse_frame_rate);

        let metadata = VideoMetadata {
            duration: probe.duration(),
            width,
            height,
            codec,
            bitrate: probe.bitrate(),
            framerate,
        };

        tracing::info!(
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            video_duration = ?metadata.duration,
            width = metadata.width,
            height = metadata.height,
            codec = %metadata.codec,
            bitrate = ?metadata.bitrate,
            framerate = ?metadata.framerate,
            "Video probe completed"
        );

        Ok(metadata)
    }

    #[tracing::instrument(skip(self), fields(ffmpeg.operation = "probe"))]
    pub async fn probe_audio(&self, path: &Path) -> Result<AudioMetadata> {
        let probe = self.probe(path).await?;
        let stream = probe
            .first_stream("audio")
            .ok_or_else(|| anyhow!("No audio stream found"))?;

        Ok(AudioMetadata {
            duration: probe.duration(),
            bitrate: probe.bitrate(),
            sample_rate: stream.sample_rate.as_ref().and_then(|s| s.parse().ok()),
            channels: stream.channels,
            codec: stream.codec_name.clone(),
        })
    }

    /// Run ffmpeg with `args`, overwriting outputs.
    async fn run(&self, operation: &str, args: Vec<OsString>) -> Result<()> {
        let start = std::time::Instant::now();

        let output = Command::new(&self.ffmpeg_path)
            .args(["-y", "-hide_banner", "-loglevel", "error"])
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to execute {}", self.ffmpeg_path))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("FFmpeg {} failed: {}", operation, stderr.trim()));
        }

        tracing::debug!(
            operation = operation,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "FFmpeg finished"
        );
        Ok(())
    }

    /// Re-encode audio; the output container follows the output extension.
    #[tracing::instrument(skip(self))]
    pub async fn transcode_audio(&self, input: &Path, output: &Path) -> Result<()> {
        self.run(
            "audio transcode",
            vec!["-i".into(), input.into(), "-vn".into(), output.into()],
        )
        .await
    }

    #[tracing::instrument(skip(self, encode), fields(size = %encode.size))]
    pub async fn transcode_video(
        &self,
        input: &Path,
        output: &Path,
        encode: &VideoEncode,
    ) -> Result<()> {
        self.run("video transcode", encode.args(input, output)).await
    }

    /// Normalize any source to H.264/AAC in MP4 so later filter graphs see one layout.
    #[tracing::instrument(skip(self))]
    pub async fn normalize_video(&self, input: &Path, output: &Path) -> Result<()> {
        self.run(
            "normalize",
            vec![
                "-i".into(),
                input.into(),
                "-c:v".into(),
                "libx264".into(),
                "-pix_fmt".into(),
                "yuv420p".into(),
                "-c:a".into(),
                "aac".into(),
                "-movflags".into(),
                "+faststart".into(),
                output.into(),
            ],
        )
        .await
    }

    /// Grab one frame at `at_seconds`, scaled to `size`.
    #[tracing::instrument(skip(self))]
    pub async fn extract_frame(
        &self,
        input: &Path,
        output: &Path,
        at_seconds: f64,
        size: Dimension,
    ) -> Result<()> {
        self.run(
            "thumbnail",
            vec![
                "-ss".into(),
                format!("{:.3}", at_seconds.max(0.0)).into(),
                "-i".into(),
                input.into(),
                "-frames:v".into(),
                "1".into(),
                "-s".into(),
                size.to_size_arg().into(),
                output.into(),
            ],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: Vec<OsString>) -> Vec<String> {
        args.into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_plain_encode_args() {
        let encode = VideoEncode {
            size: Dimension::new(640, 360),
            acodec: None,
            vcodec: Some("libx264".to_string()),
            overlay: None,
        };
        let args = strings(encode.args(Path::new("/t/in.mov"), Path::new("/t/out.mp4")));
        assert_eq!(
            args,
            vec![
                "-i", "/t/in.mov", "-s", "640x360", "-c:a", "copy", "-c:v", "libx264",
                "/t/out.mp4"
            ]
        );
    }

    #[test]
    fn test_overlay_encode_args() {
        let encode = VideoEncode {
            size: Dimension::new(1280, 720),
            acodec: Some("aac".to_string()),
            vcodec: None,
            overlay: Some(OverlayInput {
                path: PathBuf::from("/t/wm.png"),
                x: 10,
                y: 650,
            }),
        };
        let args = strings(encode.args(Path::new("/t/in.mp4"), Path::new("/t/out.mp4")));
        assert!(args.contains(&"[0:v]scale=1280:720[base];[base][1:v]overlay=10:650[out]".to_string()));
        assert!(!args.contains(&"-s".to_string()));
        assert!(!args.contains(&"-c:v".to_string()));
        let acodec = args.iter().position(|a| a == "-c:a").unwrap();
        assert_eq!(args[acodec + 1], "aac");
    }

    #[test]
    fn test_parse_probe_output() {
        let raw = r#"{
            "streams": [
                {"codec_type": "audio", "codec_name": "aac", "sample_rate": "48000", "channels": 2},
                {"codec_type": "video", "codec_name": "hevc", "width": 1920, "height": 1080, "r_frame_rate": "30000/1001"}
            ],
            "format": {"duration": "12.480000", "bit_rate": "4000000"}
        }"#;
        let probe: FFprobeOutput = serde_json::from_str(raw).unwrap();
        assert_eq!(probe.duration(), Some(12.48));
        assert_eq!(probe.bitrate(), Some(4_000_000));
        let video = probe.first_stream("video").unwrap();
        assert_eq!(video.width, Some(1920));
        assert_eq!(video.codec_name.as_deref(), Some("hevc"));
        assert!(parse_frame_rate("30000/1001").unwrap() > 29.9);
        assert_eq!(parse_frame_rate("25/0"), None);
    }
}
