//! Best-effort downscaling of oversized recordings.
//!
//! The service calls the compressor at most once per upload and keeps the
//! original payload whenever it returns an error.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;

use crate::{CompressError, CompressionMode, CompressionSettings, MediaBlob, VideoFormat};

/// Shrinks a recording to fit the configured bounds
#[async_trait]
pub trait VideoCompressor: Send + Sync {
    async fn compress(
        &self,
        blob: &MediaBlob,
        settings: &CompressionSettings,
    ) -> Result<MediaBlob, CompressError>;
}

/// Uniform scale that fits `width`×`height` inside the bounds, never upscaling.
///
/// Output sides are rounded down to even numbers since the common video
/// encoders reject odd dimensions.
pub fn fit_dimensions(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (width, height);
    }
    let scale = (max_width as f64 / width as f64)
        .min(max_height as f64 / height as f64)
        .min(1.0);

    let even = |side: u32| -> u32 {
        let scaled = (side as f64 * scale).round() as u32;
        (scaled - scaled % 2).max(2)
    };
    (even(width), even(height))
}

/// Compressor that shells out to `ffprobe` and `ffmpeg`
#[derive(Debug, Clone)]
pub struct FfmpegCompressor {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl Default for FfmpegCompressor {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

impl FfmpegCompressor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use binaries outside `PATH`
    pub fn with_binaries<P: Into<PathBuf>, Q: Into<PathBuf>>(ffmpeg: P, ffprobe: Q) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    async fn probe(&self, input: &Path) -> Result<(u32, u32), CompressError> {
        let output = Command::new(&self.ffprobe)
            .args(["-v", "error", "-select_streams", "v:0"])
            .args(["-show_entries", "stream=width,height", "-of", "csv=p=0"])
            .arg(input)
            .output()
            .await
            .map_err(|e| CompressError::Probe(format!("failed to run ffprobe: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CompressError::Probe(format!("ffprobe failed: {}", stderr.trim())));
        }
        parse_probe_output(&String::from_utf8_lossy(&output.stdout))
    }

    async fn encode(&self, args: Vec<String>) -> Result<(), CompressError> {
        let output = Command::new(&self.ffmpeg)
            .args(["-hide_banner", "-loglevel", "error", "-y"])
            .args(&args)
            .output()
            .await
            .map_err(|e| CompressError::Encode(format!("failed to run ffmpeg: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CompressError::Encode(stderr.trim().to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl VideoCompressor for FfmpegCompressor {
    async fn compress(
        &self,
        blob: &MediaBlob,
        settings: &CompressionSettings,
    ) -> Result<MediaBlob, CompressError> {
        let format = VideoFormat::from_content_type(&blob.content_type);
        let workdir = tempfile::tempdir()?;
        let input = workdir.path().join(format!("input.{}", format.extension()));
        tokio::fs::write(&input, &blob.bytes).await?;

        let (width, height) = self.probe(&input).await?;
        let (out_w, out_h) = fit_dimensions(width, height, settings.max_width, settings.max_height);
        tracing::debug!(
            "Downscaling {}x{} -> {}x{} ({:?})",
            width,
            height,
            out_w,
            out_h,
            settings.mode
        );

        let (output, content_type) = match settings.mode {
            CompressionMode::Reencode => (
                workdir.path().join(format!("output.{}", format.extension())),
                blob.content_type.clone(),
            ),
            CompressionMode::FrameSnapshot => {
                (workdir.path().join("output.jpg"), "image/jpeg".to_string())
            }
        };

        let args = encoder_args(&input, &output, format, out_w, out_h, settings);
        self.encode(args).await?;

        let bytes = tokio::fs::read(&output).await?;
        if bytes.is_empty() {
            return Err(CompressError::EmptyOutput);
        }
        Ok(MediaBlob::new(bytes, content_type))
    }
}

/// `"1920,1080"` as printed by `ffprobe -of csv=p=0`
fn parse_probe_output(stdout: &str) -> Result<(u32, u32), CompressError> {
    let line = stdout.lines().next().unwrap_or_default().trim();
    let mut parts = line.split(',');
    let mut side = |name: &str| -> Result<u32, CompressError> {
        parts
            .next()
            .and_then(|v| v.trim().parse().ok())
            .filter(|v: &u32| *v > 0)
            .ok_or_else(|| CompressError::Probe(format!("invalid {} in {:?}", name, line)))
    };
    let width = side("width")?;
    let height = side("height")?;
    Ok((width, height))
}

/// Map `quality` in `0.0..=1.0` onto an encoder scale where lower is better
fn quality_to_scale(quality: f32, best: u32, worst: u32) -> u32 {
    let quality = quality.clamp(0.0, 1.0);
    (best as f32 + (1.0 - quality) * (worst - best) as f32).round() as u32
}

fn encoder_args(
    input: &Path,
    output: &Path,
    format: VideoFormat,
    width: u32,
    height: u32,
    settings: &CompressionSettings,
) -> Vec<String> {
    let mut args = vec![
        "-i".to_string(),
        input.to_string_lossy().into_owned(),
        "-vf".to_string(),
        format!("scale={}:{}", width, height),
    ];

    match (settings.mode, format) {
        (CompressionMode::FrameSnapshot, _) => {
            let qscale = quality_to_scale(settings.quality, 2, 31);
            args.extend(["-frames:v".into(), "1".into(), "-q:v".into(), qscale.to_string()]);
        }
        (CompressionMode::Reencode, VideoFormat::Webm) => {
            let crf = quality_to_scale(settings.quality, 24, 50);
            args.extend([
                "-c:v".into(),
                "libvpx-vp9".into(),
                "-crf".into(),
                crf.to_string(),
                "-b:v".into(),
                "0".into(),
                "-c:a".into(),
                "libopus".into(),
            ]);
        }
        (CompressionMode::Reencode, VideoFormat::Mp4) => {
            let crf = quality_to_scale(settings.quality, 18, 40);
            args.extend([
                "-c:v".into(),
                "libx264".into(),
                "-preset".into(),
                "veryfast".into(),
                "-crf".into(),
                crf.to_string(),
                "-c:a".into(),
                "aac".into(),
                "-movflags".into(),
                "+faststart".into(),
            ]);
        }
    }

    args.push(output.to_string_lossy().into_owned());
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_landscape_1080p() {
        assert_eq!(fit_dimensions(1920, 1080, 1280, 720), (1280, 720));
    }

    #[test]
    fn test_fit_portrait_is_height_bound() {
        assert_eq!(fit_dimensions(1080, 1920, 1280, 720), (404, 720));
    }

    #[test]
    fn test_fit_never_upscales() {
        assert_eq!(fit_dimensions(640, 480, 1280, 720), (640, 480));
    }

    #[test]
    fn test_fit_rounds_to_even() {
        let (w, h) = fit_dimensions(2001, 1001, 1280, 720);
        assert_eq!(w % 2, 0);
        assert_eq!(h % 2, 0);
        assert!(w <= 1280 && h <= 720);
    }

    #[test]
    fn test_parse_probe_output() {
        assert_eq!(parse_probe_output("1920,1080\n").unwrap(), (1920, 1080));
        assert!(parse_probe_output("").is_err());
        assert!(parse_probe_output("N/A,N/A").is_err());
    }

    #[test]
    fn test_quality_scale() {
        assert_eq!(quality_to_scale(1.0, 18, 40), 18);
        assert_eq!(quality_to_scale(0.0, 18, 40), 40);
        assert_eq!(quality_to_scale(0.7, 2, 31), 11);
    }

    #[test]
    fn test_snapshot_args_emit_single_frame() {
        let settings = CompressionSettings::default().with_mode(CompressionMode::FrameSnapshot);
        let args = encoder_args(
            Path::new("/tmp/in.webm"),
            Path::new("/tmp/out.jpg"),
            VideoFormat::Webm,
            1280,
            720,
            &settings,
        );
        assert!(args.windows(2).any(|w| w[0] == "-frames:v" && w[1] == "1"));
        assert!(args.contains(&"scale=1280:720".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("/tmp/out.jpg"));
    }
}
