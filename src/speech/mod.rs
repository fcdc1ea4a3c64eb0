//! Text-to-speech narration.
//!
//! Engines report completion through a single-use [`oneshot`] latch. The
//! [`Narrator`] waits on those latches with hard timeouts so a hung engine
//! never blocks a batch.

mod command;

pub use command::CommandSpeechEngine;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, OnceCell};
use tracing::{debug, warn};

use crate::config::SpeechConfig;
use crate::error::{SpeechError, SpeechResult};

/// A synthesized narration track.
#[derive(Debug, Clone, PartialEq)]
pub struct Narration {
    pub audio_path: PathBuf,
    pub duration_secs: f64,
}

/// Callback-style TTS engine. Each call must eventually send exactly one
/// result on `done`, or drop it.
pub trait SpeechEngine: Send + Sync {
    fn start_init(&self, done: oneshot::Sender<SpeechResult<()>>);

    fn start_synthesis(&self, script: &str, output: &Path, done: oneshot::Sender<SpeechResult<Narration>>);
}

/// Drives a [`SpeechEngine`] with init and synthesis timeouts.
pub struct Narrator {
    engine: Arc<dyn SpeechEngine>,
    init_timeout: Duration,
    synthesis_timeout: Duration,
    ready: OnceCell<()>,
}

impl Narrator {
    pub fn new(engine: Arc<dyn SpeechEngine>, init_timeout: Duration, synthesis_timeout: Duration) -> Self {
        Self {
            engine,
            init_timeout,
            synthesis_timeout,
            ready: OnceCell::new(),
        }
    }

    pub fn from_config(engine: Arc<dyn SpeechEngine>, config: &SpeechConfig) -> Self {
        Self::new(
            engine,
            Duration::from_secs(config.init_timeout_secs),
            Duration::from_secs(config.synthesis_timeout_secs),
        )
    }

    /// Initialise the engine once. A failed init is retried on the next call.
    async fn ensure_ready(&self) -> SpeechResult<()> {
        self.ready
            .get_or_try_init(|| async {
                let (tx, rx) = oneshot::channel();
                self.engine.start_init(tx);
                match tokio::time::timeout(self.init_timeout, rx).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(_)) => Err(SpeechError::Abandoned),
                    Err(_) => Err(SpeechError::InitTimeout(self.init_timeout.as_secs())),
                }
            })
            .await
            .map(|_| ())
    }

    /// Synthesize `script` into `output`.
    pub async fn narrate(&self, script: &str, output: &Path) -> SpeechResult<Narration> {
        self.ensure_ready().await?;

        let (tx, rx) = oneshot::channel();
        self.engine.start_synthesis(script, output, tx);

        let narration = match tokio::time::timeout(self.synthesis_timeout, rx).await {
            Ok(Ok(result)) => result?,
            Ok(Err(_)) => return Err(SpeechError::Abandoned),
            Err(_) => {
                warn!(
                    "Speech synthesis exceeded {}s, abandoning",
                    self.synthesis_timeout.as_secs()
                );
                return Err(SpeechError::SynthesisTimeout(self.synthesis_timeout.as_secs()));
            }
        };

        if narration.duration_secs <= 0.0 {
            return Err(SpeechError::Failed("narration has no duration".to_string()));
        }
        debug!(
            "Narration ready at {} ({:.1}s)",
            narration.audio_path.display(),
            narration.duration_secs
        );
        Ok(narration)
    }
}

/// Duration of a PCM WAV file from its header.
pub fn wav_duration_secs(bytes: &[u8]) -> Option<f64> {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return None;
    }

    let mut byte_rate: Option<u32> = None;
    let mut offset = 12;
    while offset + 8 <= bytes.len() {
        let id = &bytes[offset..offset + 4];
        let size = u32::from_le_bytes(bytes[offset + 4..offset + 8].try_into().ok()?);
        let body = offset + 8;

        match id {
            b"fmt " if body + 12 <= bytes.len() => {
                byte_rate = Some(u32::from_le_bytes(bytes[body + 8..body + 12].try_into().ok()?));
            }
            b"data" => {
                let rate = byte_rate.filter(|r| *r > 0)?;
                // Streaming writers leave the size at 0 or u32::MAX
                let data_len = if size == 0 || size == u32::MAX {
                    (bytes.len() - body) as u64
                } else {
                    size as u64
                };
                return Some(data_len as f64 / rate as f64);
            }
            _ => {}
        }

        // Chunks are word aligned
        offset = body + size as usize + (size as usize & 1);
    }
    None
}

/// Spoken-length estimate for engines that give no usable audio header.
pub fn estimate_duration_secs(script: &str, words_per_minute: u32) -> f64 {
    let words = script.split_whitespace().count();
    if words == 0 || words_per_minute == 0 {
        return 0.0;
    }
    words as f64 * 60.0 / words_per_minute as f64
}
