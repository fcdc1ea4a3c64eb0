pub mod cluster;
pub mod daily;
pub mod photo;
pub mod video;

pub use cluster::{describe_time_range, PhotoCluster, UNKNOWN_LOCATION};
pub use daily::DailyGenerationState;
pub use photo::{PhotoRecord, TimeOfDay};
pub use video::{GeneratedVideoRecord, GenerationFailure, TriggerType};
