use serde::Serialize;
use url::Url;

/// Identifies one connection attempt: the play session it belongs to and
/// the candidate index within that session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct AttemptTicket {
    pub session: u64,
    pub attempt: usize,
}

/// What the player reports back about an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerEvent {
    Ready,
    Failed,
    Stalled,
}

/// The audio backend. Calls must return quickly; outcomes come back later
/// through `PlaybackEngine::report` tagged with the ticket given here.
pub trait AudioOutput: Send + Sync {
    fn load_and_play(&self, url: &Url, ticket: AttemptTicket);
    fn pause(&self);
    fn resume(&self);
    fn set_volume(&self, volume: f32);
}

/// Output that plays nothing. Used by the CLI, which only resolves streams.
#[derive(Debug, Default)]
pub struct NullOutput;

impl AudioOutput for NullOutput {
    fn load_and_play(&self, _url: &Url, _ticket: AttemptTicket) {}
    fn pause(&self) {}
    fn resume(&self) {}
    fn set_volume(&self, _volume: f32) {}
}
