//! Speech engine that shells out to a TTS program such as `espeak-ng`.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::{estimate_duration_secs, wav_duration_secs, Narration, SpeechEngine};
use crate::config::SpeechConfig;
use crate::error::{SpeechError, SpeechResult};

pub struct CommandSpeechEngine {
    program: String,
    args: Vec<String>,
    words_per_minute: u32,
}

impl CommandSpeechEngine {
    pub fn new(program: impl Into<String>, args: Vec<String>, words_per_minute: u32) -> Self {
        Self {
            program: program.into(),
            args,
            words_per_minute,
        }
    }

    pub fn from_config(config: &SpeechConfig) -> Self {
        Self::new(config.program.clone(), config.args.clone(), config.words_per_minute)
    }

    /// Expand `{output}` and `{text}` placeholders in the argument template.
    pub fn build_args(&self, script: &str, output: &Path) -> Vec<String> {
        let output = output.to_string_lossy();
        self.args
            .iter()
            .map(|arg| arg.replace("{output}", &output).replace("{text}", script))
            .collect()
    }
}

async fn run_synthesis(
    program: PathBuf,
    args: Vec<String>,
    script: String,
    output: PathBuf,
    words_per_minute: u32,
) -> SpeechResult<Narration> {
    debug!("Running TTS: {} {}", program.display(), args.join(" "));

    let result = Command::new(&program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        return Err(SpeechError::Failed(format!(
            "{} exited with {:?}: {}",
            program.display(),
            result.status.code(),
            stderr.trim()
        )));
    }

    let bytes = tokio::fs::read(&output).await?;
    let duration_secs = match wav_duration_secs(&bytes) {
        Some(secs) => secs,
        None => {
            warn!("No usable WAV header in {}, estimating length", output.display());
            estimate_duration_secs(&script, words_per_minute)
        }
    };

    Ok(Narration {
        audio_path: output,
        duration_secs,
    })
}

impl SpeechEngine for CommandSpeechEngine {
    fn start_init(&self, done: oneshot::Sender<SpeechResult<()>>) {
        let result = which::which(&self.program)
            .map(|_| ())
            .map_err(|e| SpeechError::Unavailable(format!("{}: {}", self.program, e)));
        let _ = done.send(result);
    }

    fn start_synthesis(&self, script: &str, output: &Path, done: oneshot::Sender<SpeechResult<Narration>>) {
        let program = match which::which(&self.program) {
            Ok(path) => path,
            Err(e) => {
                let _ = done.send(Err(SpeechError::Unavailable(format!("{}: {}", self.program, e))));
                return;
            }
        };
        let args = self.build_args(script, output);
        let script = script.to_string();
        let output = output.to_path_buf();
        let words_per_minute = self.words_per_minute;

        tokio::spawn(async move {
            let result = run_synthesis(program, args, script, output, words_per_minute).await;
            // The receiver is gone if the narrator already timed out
            let _ = done.send(result);
        });
    }
}
