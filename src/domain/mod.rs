pub mod episode;
pub mod messages;
pub mod podcast_config;
pub mod processing_log;

pub use episode::{
    ContentAnalysis, Episode, EpisodeMetadata, EpisodeStatus, PodcastFormat, ProcessingStage,
    StageHistoryEntry, StageHistoryStatus,
};
pub use messages::{
    CollectMessage, DynamicConfig, PreprocessMessage, SynthesizeMessage,
};
pub use podcast_config::{PodcastConfiguration, SpeakerGender};
pub use processing_log::{ProcessingLog, StageStatus};
