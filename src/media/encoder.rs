use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::command::{self, FfmpegCommand};
use super::frames::{I420Frame, PtsClock};
use super::{EncodeSettings, EncodedVideo, VideoEncoder};
use crate::error::{MediaError, MediaResult};

/// Software H.264 encoder fed raw I420 frames over a pipe.
pub struct FfmpegEncoder {
    ffmpeg: PathBuf,
    settings: EncodeSettings,
}

impl FfmpegEncoder {
    pub fn new(ffmpeg: PathBuf, settings: EncodeSettings) -> Self {
        Self { ffmpeg, settings }
    }

    pub fn command(&self, output: &Path) -> FfmpegCommand {
        let s = &self.settings;
        FfmpegCommand::new(output)
            .input_with(
                [
                    "-f".to_string(),
                    "rawvideo".to_string(),
                    "-pix_fmt".to_string(),
                    "yuv420p".to_string(),
                    "-s".to_string(),
                    format!("{}x{}", s.width, s.height),
                    "-framerate".to_string(),
                    s.frame_rate.to_string(),
                ],
                "pipe:0",
            )
            .video_codec("libx264")
            .video_bitrate(s.bitrate)
            .gop(s.gop())
            .output_args(["-pix_fmt", "yuv420p", "-an"])
    }

    fn check_frames(&self, slides: &[I420Frame]) -> MediaResult<()> {
        if slides.is_empty() {
            return Err(MediaError::NoFrames);
        }
        let expected = self.settings.frame_len();
        for slide in slides {
            if slide.width != self.settings.width
                || slide.height != self.settings.height
                || slide.data.len() != expected
            {
                return Err(MediaError::FrameSize {
                    expected_width: self.settings.width,
                    expected_height: self.settings.height,
                    width: slide.width,
                    height: slide.height,
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl VideoEncoder for FfmpegEncoder {
    async fn encode(&self, slides: &[I420Frame], seconds_per_image: u32, output: &Path) -> MediaResult<EncodedVideo> {
        self.check_frames(slides)?;

        let frames_per_slide = seconds_per_image.max(1) as u64 * self.settings.frame_rate as u64;
        let cmd = self.command(output);
        let mut child = command::spawn(&self.ffmpeg, &cmd)?;
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| MediaError::ffmpeg_failed("encoder stdin not captured", None))?;

        let mut clock = PtsClock::new(self.settings.frame_rate);
        let mut frame_count = 0u64;
        for slide in slides {
            for _ in 0..frames_per_slide {
                clock.tick()?;
                if let Err(e) = stdin.write_all(&slide.data).await {
                    // ffmpeg quit early; its exit status carries the reason
                    debug!("Encoder pipe closed after {} frames: {}", frame_count, e);
                    drop(stdin);
                    command::wait(child).await?;
                    return Err(MediaError::Io(e));
                }
                frame_count += 1;
            }
        }
        stdin.shutdown().await?;
        drop(stdin);

        command::wait(child).await?;

        if !output.exists() {
            return Err(MediaError::FileNotFound(output.to_path_buf()));
        }

        info!(
            "Encoded {} slides into {} frames ({}s) at {}",
            slides.len(),
            frame_count,
            clock.elapsed_micros() / 1_000_000,
            output.display()
        );

        Ok(EncodedVideo {
            path: output.to_path_buf(),
            frame_count,
            duration_micros: clock.elapsed_micros(),
        })
    }
}
