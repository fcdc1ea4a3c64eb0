//! FFmpeg command builder and runner.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// One `-i` input with the options that precede it.
#[derive(Debug, Clone)]
struct Input {
    args: Vec<String>,
    source: String,
}

/// Builder for FFmpeg commands with any number of inputs.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    inputs: Vec<Input>,
    output_args: Vec<String>,
    output: PathBuf,
    overwrite: bool,
    log_level: String,
}

impl FfmpegCommand {
    pub fn new(output: impl AsRef<Path>) -> Self {
        Self {
            inputs: Vec::new(),
            output_args: Vec::new(),
            output: output.as_ref().to_path_buf(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Add a file input.
    pub fn input(self, path: impl AsRef<Path>) -> Self {
        self.input_with(Vec::<String>::new(), path.as_ref().to_string_lossy())
    }

    /// Add an input with format options, e.g. raw frames on `pipe:0`.
    pub fn input_with<I, S>(mut self, args: I, source: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.push(Input {
            args: args.into_iter().map(Into::into).collect(),
            source: source.into(),
        });
        self
    }

    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    pub fn video_bitrate(self, bits_per_sec: u32) -> Self {
        self.output_arg("-b:v").output_arg(bits_per_sec.to_string())
    }

    /// Keyframe every `frames` frames.
    pub fn gop(self, frames: u32) -> Self {
        self.output_arg("-g")
            .output_arg(frames.to_string())
            .output_arg("-keyint_min")
            .output_arg(frames.to_string())
    }

    /// Select a stream, e.g. `0:v:0`.
    pub fn map(self, spec: impl Into<String>) -> Self {
        self.output_arg("-map").output_arg(spec)
    }

    /// Copy all selected streams without re-encoding.
    pub fn stream_copy(self) -> Self {
        self.output_arg("-c").output_arg("copy")
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-v".to_string());
        args.push(self.log_level.clone());
        if !self.reads_stdin() {
            args.push("-nostdin".to_string());
        }

        for input in &self.inputs {
            args.extend(input.args.iter().cloned());
            args.push("-i".to_string());
            args.push(input.source.clone());
        }

        args.extend(self.output_args.iter().cloned());
        args.push(self.output.to_string_lossy().to_string());
        args
    }

    /// True when an input reads from stdin.
    fn reads_stdin(&self) -> bool {
        self.inputs.iter().any(|i| i.source == "pipe:0" || i.source == "-")
    }
}

/// Resolve the ffmpeg binary, by path or on `PATH`.
pub fn find_ffmpeg(program: &str) -> MediaResult<PathBuf> {
    which::which(program).map_err(|e| MediaError::FfmpegNotFound(format!("{}: {}", program, e)))
}

/// Spawn ffmpeg for `cmd`. The child is killed if its handle is dropped,
/// which is how timeouts around the returned work stop it.
pub fn spawn(program: &Path, cmd: &FfmpegCommand) -> MediaResult<Child> {
    let args = cmd.build_args();
    debug!("Running FFmpeg: {} {}", program.display(), args.join(" "));

    let stdin = if cmd.reads_stdin() {
        Stdio::piped()
    } else {
        Stdio::null()
    };

    let child = Command::new(program)
        .args(&args)
        .stdin(stdin)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;
    Ok(child)
}

/// Wait for a spawned ffmpeg, turning a non-zero exit into an error that
/// carries its stderr.
pub async fn wait(mut child: Child) -> MediaResult<()> {
    let mut stderr = String::new();
    if let Some(mut pipe) = child.stderr.take() {
        pipe.read_to_string(&mut stderr).await?;
    }

    let status = child.wait().await?;
    if status.success() {
        Ok(())
    } else {
        let message = stderr.trim();
        Err(MediaError::ffmpeg_failed(
            if message.is_empty() {
                "FFmpeg exited with non-zero status".to_string()
            } else {
                message.to_string()
            },
            status.code(),
        ))
    }
}

/// Run a command that needs no stdin to completion.
pub async fn run(program: &Path, cmd: &FfmpegCommand) -> MediaResult<()> {
    let child = spawn(program, cmd)?;
    wait(child).await
}
