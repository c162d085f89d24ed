mod candidates;
mod engine;
mod output;

pub use candidates::{
    build_candidate_urls, infer_bitrate, rank_candidate_stations, DEFAULT_BITRATE_KBPS,
};
pub use engine::{PlaybackEngine, PlaybackFailure, PlaybackState, PlaybackStatus};
pub use output::{AttemptTicket, AudioOutput, NullOutput, PlayerEvent};
