use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Scratch space for per-video temporary files.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    #[serde(default)]
    pub library: LibraryConfig,

    #[serde(default)]
    pub clustering: ClusteringConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub video: VideoConfig,

    #[serde(default)]
    pub speech: SpeechConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub geocoder: GeocoderConfig,

    #[serde(default)]
    pub daemon: DaemonConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    #[serde(default = "default_photo_dir")]
    pub photo_dir: PathBuf,

    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,
}

fn default_photo_dir() -> PathBuf {
    dirs::picture_dir().unwrap_or_else(|| PathBuf::from("."))
}

fn default_image_extensions() -> Vec<String> {
    vec![
        "jpg".to_string(),
        "jpeg".to_string(),
        "png".to_string(),
        "webp".to_string(),
        "tif".to_string(),
        "tiff".to_string(),
    ]
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            photo_dir: default_photo_dir(),
            image_extensions: default_image_extensions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteringConfig {
    #[serde(default = "default_location_radius")]
    pub location_radius_meters: f64,

    #[serde(default = "default_time_window_minutes")]
    pub time_window_minutes: u32,

    /// Fixed seed for reproducible cluster ids. Random when unset.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_location_radius() -> f64 {
    100.0
}

fn default_time_window_minutes() -> u32 {
    180
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            location_radius_meters: default_location_radius(),
            time_window_minutes: default_time_window_minutes(),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_max_videos_per_day")]
    pub max_videos_per_day: u32,

    /// Pause between consecutive videos in one batch.
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,

    /// Number of largest clusters a pick is drawn from.
    #[serde(default = "default_top_candidates")]
    pub top_candidates: usize,

    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_max_videos_per_day() -> u32 {
    10
}

fn default_cooldown_ms() -> u64 {
    1000
}

fn default_top_candidates() -> usize {
    5
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_videos_per_day: default_max_videos_per_day(),
            cooldown_ms: default_cooldown_ms(),
            top_candidates: default_top_candidates(),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConfig {
    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,

    /// Output frames per second. Slides are static, so 1 is enough.
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,

    #[serde(default = "default_bitrate")]
    pub bitrate: u32,

    #[serde(default = "default_keyframe_interval")]
    pub keyframe_interval_secs: u32,

    #[serde(default = "default_max_photos")]
    pub max_photos: usize,

    #[serde(default = "default_min_seconds")]
    pub min_seconds_per_image: u32,

    #[serde(default = "default_max_seconds")]
    pub max_seconds_per_image: u32,

    /// Used when no narration is available.
    #[serde(default = "default_seconds")]
    pub default_seconds_per_image: u32,

    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,

    /// Output file extension. Matroska carries H.264 and PCM narration
    /// with both streams copied as-is.
    #[serde(default = "default_container")]
    pub container: String,

    #[serde(default = "default_encode_timeout")]
    pub encode_timeout_secs: u64,

    #[serde(default = "default_merge_timeout")]
    pub merge_timeout_secs: u64,
}

fn default_width() -> u32 {
    1280
}

fn default_height() -> u32 {
    720
}

fn default_frame_rate() -> u32 {
    1
}

fn default_bitrate() -> u32 {
    2_000_000
}

fn default_keyframe_interval() -> u32 {
    1
}

fn default_max_photos() -> usize {
    4
}

fn default_min_seconds() -> u32 {
    3
}

fn default_max_seconds() -> u32 {
    10
}

fn default_seconds() -> u32 {
    4
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_container() -> String {
    "mkv".to_string()
}

fn default_encode_timeout() -> u64 {
    300
}

fn default_merge_timeout() -> u64 {
    120
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            frame_rate: default_frame_rate(),
            bitrate: default_bitrate(),
            keyframe_interval_secs: default_keyframe_interval(),
            max_photos: default_max_photos(),
            min_seconds_per_image: default_min_seconds(),
            max_seconds_per_image: default_max_seconds(),
            default_seconds_per_image: default_seconds(),
            ffmpeg_path: default_ffmpeg_path(),
            container: default_container(),
            encode_timeout_secs: default_encode_timeout(),
            merge_timeout_secs: default_merge_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    #[serde(default = "default_speech_program")]
    pub program: String,

    /// Arguments passed to the program; `{output}` and `{text}` are
    /// substituted per request.
    #[serde(default = "default_speech_args")]
    pub args: Vec<String>,

    #[serde(default = "default_init_timeout")]
    pub init_timeout_secs: u64,

    #[serde(default = "default_synthesis_timeout")]
    pub synthesis_timeout_secs: u64,

    /// Speaking rate used to estimate duration when the audio header
    /// cannot be read.
    #[serde(default = "default_words_per_minute")]
    pub words_per_minute: u32,
}

fn default_speech_program() -> String {
    "espeak-ng".to_string()
}

fn default_speech_args() -> Vec<String> {
    vec![
        "-s".to_string(),
        "140".to_string(),
        "-w".to_string(),
        "{output}".to_string(),
        "{text}".to_string(),
    ]
}

fn default_init_timeout() -> u64 {
    15
}

fn default_synthesis_timeout() -> u64 {
    60
}

fn default_words_per_minute() -> u32 {
    140
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            program: default_speech_program(),
            args: default_speech_args(),
            init_timeout_secs: default_init_timeout(),
            synthesis_timeout_secs: default_synthesis_timeout(),
            words_per_minute: default_words_per_minute(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,

    #[serde(default = "default_transfer_timeout")]
    pub transfer_timeout_secs: u64,
}

fn default_storage_root() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("reminisce")
        .join("blobs")
}

fn default_transfer_timeout() -> u64 {
    120
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            transfer_timeout_secs: default_transfer_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocoderConfig {
    #[serde(default = "default_geocoder_enabled")]
    pub enabled: bool,

    #[serde(default = "default_geocoder_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_geocoder_timeout")]
    pub timeout_secs: u64,
}

fn default_geocoder_enabled() -> bool {
    true
}

fn default_geocoder_endpoint() -> String {
    "https://nominatim.openstreetmap.org".to_string()
}

fn default_user_agent() -> String {
    format!("reminisce/{}", env!("CARGO_PKG_VERSION"))
}

fn default_geocoder_timeout() -> u64 {
    10
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            enabled: default_geocoder_enabled(),
            endpoint: default_geocoder_endpoint(),
            user_agent: default_user_agent(),
            timeout_secs: default_geocoder_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Patients the daemon generates videos for.
    #[serde(default)]
    pub patients: Vec<String>,

    /// Interval between background top-up passes.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

fn default_poll_interval() -> u64 {
    60 * 60
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            patients: Vec::new(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("reminisce")
        .join("reminisce.db")
}

fn default_work_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("reminisce/work")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            work_dir: default_work_dir(),
            library: LibraryConfig::default(),
            clustering: ClusteringConfig::default(),
            generation: GenerationConfig::default(),
            video: VideoConfig::default(),
            speech: SpeechConfig::default(),
            storage: StorageConfig::default(),
            geocoder: GeocoderConfig::default(),
            daemon: DaemonConfig::default(),
        }
    }
}

impl Config {
    /// Load from `REMINISCE_CONFIG` or the default location, writing a
    /// default file when none exists.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Config::default();
            config.save_to(&config_path)?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("reminisce")
    }

    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("REMINISCE_CONFIG") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }
}
