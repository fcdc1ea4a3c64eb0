//! Video assembly: slide preparation, raw frame encoding and muxing.

pub mod command;
mod encoder;
pub mod frames;
mod muxer;

pub use command::{find_ffmpeg, FfmpegCommand};
pub use encoder::FfmpegEncoder;
pub use frames::{prepare_slide, rgb_to_i420, I420Frame, PtsClock};
pub use muxer::FfmpegMuxer;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::config::VideoConfig;
use crate::error::MediaResult;

/// Fixed encoder parameters for every video.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeSettings {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub bitrate: u32,
    pub keyframe_interval_secs: u32,
}

impl EncodeSettings {
    pub fn from_config(config: &VideoConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            frame_rate: config.frame_rate.max(1),
            bitrate: config.bitrate,
            keyframe_interval_secs: config.keyframe_interval_secs.max(1),
        }
    }

    /// Frames between keyframes.
    pub fn gop(&self) -> u32 {
        self.frame_rate * self.keyframe_interval_secs
    }

    /// Bytes in one I420 frame at this size.
    pub fn frame_len(&self) -> usize {
        let (w, h) = (self.width as usize, self.height as usize);
        w * h + 2 * ((w + 1) / 2) * ((h + 1) / 2)
    }
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self::from_config(&VideoConfig::default())
    }
}

/// Result of encoding a slideshow.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedVideo {
    pub path: PathBuf,
    pub frame_count: u64,
    pub duration_micros: i64,
}

impl EncodedVideo {
    pub fn duration_secs(&self) -> u32 {
        (self.duration_micros / 1_000_000) as u32
    }
}

/// Turns prepared slides into a video-only container.
#[async_trait]
pub trait VideoEncoder: Send + Sync {
    /// Each slide is shown for `seconds_per_image` seconds.
    async fn encode(&self, slides: &[I420Frame], seconds_per_image: u32, output: &Path) -> MediaResult<EncodedVideo>;
}

/// Combines a video-only file and an audio-only file without re-encoding.
#[async_trait]
pub trait Muxer: Send + Sync {
    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> MediaResult<()>;
}
