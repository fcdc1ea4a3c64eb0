//! Error types for the library layers.
//!
//! Binaries and the photo scanner use `anyhow`; everything the scheduler and
//! composition pipeline touch returns one of these so failures can be
//! classified (skip, fall back, or abort the batch item).

use std::path::PathBuf;
use thiserror::Error;

use crate::pipeline::Stage;

/// Result type for document store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by the document store and the repositories built on it.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Invalid document path: {0}")]
    InvalidPath(String),

    #[error("Malformed document at {path}: {reason}")]
    Malformed { path: String, reason: String },

    #[error("Database lock poisoned")]
    Poisoned,

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    pub fn malformed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for blob storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while moving files to and from blob storage.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Invalid key or URL: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn upload_failed(msg: impl Into<String>) -> Self {
        Self::UploadFailed(msg.into())
    }

    pub fn download_failed(msg: impl Into<String>) -> Self {
        Self::DownloadFailed(msg.into())
    }
}

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors from slide preparation, encoding and muxing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found: {0}")]
    FfmpegNotFound(String),

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        exit_code: Option<i32>,
    },

    #[error("Failed to load image {path}: {reason}")]
    ImageLoad { path: PathBuf, reason: String },

    #[error("No frames to encode")]
    NoFrames,

    #[error("Frame has wrong dimensions: expected {expected_width}x{expected_height}, got {width}x{height}")]
    FrameSize {
        expected_width: u32,
        expected_height: u32,
        width: u32,
        height: u32,
    },

    #[error("Presentation timestamps went backwards: {previous}us then {next}us")]
    NonMonotonicPts { previous: i64, next: i64 },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    pub fn ffmpeg_failed(message: impl Into<String>, exit_code: Option<i32>) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            exit_code,
        }
    }
}

/// Result type for speech synthesis.
pub type SpeechResult<T> = Result<T, SpeechError>;

/// Errors from the text-to-speech engine.
#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("Speech engine unavailable: {0}")]
    Unavailable(String),

    #[error("Speech engine did not initialise within {0} seconds")]
    InitTimeout(u64),

    #[error("Speech synthesis did not complete within {0} seconds")]
    SynthesisTimeout(u64),

    #[error("Speech synthesis failed: {0}")]
    Failed(String),

    #[error("Speech engine dropped its completion signal")]
    Abandoned,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for reverse geocoding.
pub type GeocodeResult<T> = Result<T, GeocodeError>;

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("Geocoding request failed: {0}")]
    Request(String),

    #[error("No place found for {latitude}, {longitude}")]
    NoResult { latitude: f64, longitude: f64 },
}

/// Result type for a single video composition.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// A failed composition, tagged with the stage that failed.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Cluster {0} has no photos")]
    EmptyCluster(String),

    #[error("None of the {attempted} selected photos could be loaded")]
    NoLoadablePhotos { attempted: usize },

    #[error("{stage} stage timed out after {secs} seconds")]
    Timeout { stage: Stage, secs: u64 },

    #[error("{stage} stage failed: media error: {source}")]
    Media {
        stage: Stage,
        #[source]
        source: MediaError,
    },

    #[error("{stage} stage failed: storage error: {source}")]
    Storage {
        stage: Stage,
        #[source]
        source: StorageError,
    },

    #[error("{stage} stage failed: store error: {source}")]
    Store {
        stage: Stage,
        #[source]
        source: StoreError,
    },

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl PipelineError {
    /// The stage a failure is attributed to in the failure log.
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::EmptyCluster(_) => Stage::SelectPhotos,
            PipelineError::NoLoadablePhotos { .. } => Stage::PrepareFrames,
            PipelineError::Timeout { stage, .. }
            | PipelineError::Media { stage, .. }
            | PipelineError::Storage { stage, .. }
            | PipelineError::Store { stage, .. } => *stage,
            PipelineError::Join(_) => Stage::PrepareFrames,
        }
    }
}
