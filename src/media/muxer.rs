use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

use super::command::{self, FfmpegCommand};
use super::Muxer;
use crate::error::{MediaError, MediaResult};

/// Remuxes the first video track of one file with the first audio track of
/// another, copying both streams.
pub struct FfmpegMuxer {
    ffmpeg: PathBuf,
}

impl FfmpegMuxer {
    pub fn new(ffmpeg: PathBuf) -> Self {
        Self { ffmpeg }
    }

    pub fn command(video: &Path, audio: &Path, output: &Path) -> FfmpegCommand {
        FfmpegCommand::new(output)
            .input(video)
            .input(audio)
            .map("0:v:0")
            .map("1:a:0")
            .stream_copy()
    }
}

#[async_trait]
impl Muxer for FfmpegMuxer {
    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> MediaResult<()> {
        for input in [video, audio] {
            if !input.exists() {
                return Err(MediaError::FileNotFound(input.to_path_buf()));
            }
        }

        command::run(&self.ffmpeg, &Self::command(video, audio, output)).await?;
        if !output.exists() {
            return Err(MediaError::FileNotFound(output.to_path_buf()));
        }

        info!("Merged narration into {}", output.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mux_command_copies_both_tracks() {
        let args = FfmpegMuxer::command(Path::new("v.mkv"), Path::new("a.wav"), Path::new("o.mkv")).build_args();
        assert!(args.windows(2).any(|w| w == ["-map", "0:v:0"]));
        assert!(args.windows(2).any(|w| w == ["-map", "1:a:0"]));
        assert!(args.windows(2).any(|w| w == ["-c", "copy"]));
        assert!(!args.iter().any(|a| a == "-c:v" || a == "-c:a"));
    }

    #[tokio::test]
    async fn test_missing_input_fails_fast() {
        let muxer = FfmpegMuxer::new(PathBuf::from("ffmpeg"));
        assert!(matches!(
            muxer
                .mux(Path::new("/nonexistent/v.mkv"), Path::new("/nonexistent/a.wav"), Path::new("o.mkv"))
                .await,
            Err(MediaError::FileNotFound(_))
        ));
    }
}
