//! Candidate failover state machine.
//!
//! Every `play` opens a new session. Player events and connect timeouts carry
//! an [`AttemptTicket`]; anything tagged with an older session, or an older
//! attempt inside the current session, is dropped on arrival.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use serde_json::json;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use url::Url;

use super::candidates::{build_candidate_urls, infer_bitrate};
use super::output::{AttemptTicket, AudioOutput, PlayerEvent};
use crate::{
    config::PlaybackConfig,
    error::{CatalogError, Result},
    logging::logger,
    stations::{Station, VariantCluster},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    #[default]
    Idle,
    Connecting,
    Playing,
    Paused,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlaybackFailure {
    NoPlayableSource { station: String },
}

impl From<PlaybackFailure> for CatalogError {
    fn from(failure: PlaybackFailure) -> Self {
        match failure {
            PlaybackFailure::NoPlayableSource { station } => {
                CatalogError::NoPlayableSource { station }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PlaybackStatus {
    pub session: u64,
    pub state: PlaybackState,
    pub station: Option<Station>,
    pub candidate_index: usize,
    pub candidate_count: usize,
    pub inferred_bitrate_kbps: Option<u32>,
    pub volume: f32,
    pub failure: Option<PlaybackFailure>,
}

struct EngineInner {
    session: u64,
    attempt: usize,
    candidates: Vec<Url>,
    station: Option<Station>,
    state: PlaybackState,
    queue: Vec<Station>,
    queue_index: Option<usize>,
    variants: Arc<HashMap<String, VariantCluster>>,
    prefer_lower_bitrate: bool,
    volume: f32,
    failure: Option<PlaybackFailure>,
    connect_timeout: Option<AbortHandle>,
}

impl EngineInner {
    fn ticket(&self) -> AttemptTicket {
        AttemptTicket {
            session: self.session,
            attempt: self.attempt,
        }
    }

    fn is_current(&self, ticket: AttemptTicket) -> bool {
        ticket.session == self.session && ticket.attempt == self.attempt
    }

    fn cancel_timeout(&mut self) {
        if let Some(handle) = self.connect_timeout.take() {
            handle.abort();
        }
    }

    fn status(&self) -> PlaybackStatus {
        PlaybackStatus {
            session: self.session,
            state: self.state,
            station: self.station.clone(),
            candidate_index: self.attempt,
            candidate_count: self.candidates.len(),
            inferred_bitrate_kbps: self.station.as_ref().map(infer_bitrate),
            volume: self.volume,
            failure: self.failure.clone(),
        }
    }
}

/// Side effects decided under the lock and run after it is released.
enum OutputCommand {
    Load(Url, AttemptTicket),
    Pause,
    Resume,
    Volume(f32),
}

struct Shared {
    inner: Mutex<EngineInner>,
    output: Arc<dyn AudioOutput>,
    status: watch::Sender<PlaybackStatus>,
    connect_timeout: Duration,
}

#[derive(Clone)]
pub struct PlaybackEngine {
    shared: Arc<Shared>,
}

const DEFAULT_VOLUME: f32 = 0.8;

impl PlaybackEngine {
    pub fn new(output: Arc<dyn AudioOutput>, config: &PlaybackConfig) -> Self {
        let inner = EngineInner {
            session: 0,
            attempt: 0,
            candidates: Vec::new(),
            station: None,
            state: PlaybackState::Idle,
            queue: Vec::new(),
            queue_index: None,
            variants: Arc::new(HashMap::new()),
            prefer_lower_bitrate: false,
            volume: DEFAULT_VOLUME,
            failure: None,
            connect_timeout: None,
        };
        let (status, _) = watch::channel(inner.status());
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(inner),
                output,
                status,
                connect_timeout: config.connect_timeout(),
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackStatus> {
        self.shared.status.subscribe()
    }

    pub fn status(&self) -> PlaybackStatus {
        self.lock().status()
    }

    /// Variant clusters of the catalog currently on screen, keyed by primary id.
    pub fn set_variants(&self, variants: Arc<HashMap<String, VariantCluster>>) {
        self.lock().variants = variants;
    }

    /// Constrained or metered links make the next play prefer low bitrates.
    pub fn set_network_constraints(&self, constrained: bool, expensive: bool) {
        self.lock().prefer_lower_bitrate = constrained || expensive;
    }

    /// Starts a new session for `station`. When `queue` is given it replaces
    /// the navigation queue. Fails only when the station has no usable URL.
    pub fn play(&self, station: &Station, queue: Option<Vec<Station>>) -> Result<u64> {
        let (command, session) = {
            let mut inner = self.lock();
            inner.session += 1;
            inner.cancel_timeout();

            match queue {
                Some(queue) if !queue.is_empty() => {
                    inner.queue_index = queue.iter().position(|item| item.id == station.id);
                    inner.queue = queue;
                }
                _ if inner.queue.is_empty() => {
                    inner.queue = vec![station.clone()];
                    inner.queue_index = Some(0);
                }
                _ => {
                    if let Some(index) = inner.queue.iter().position(|item| item.id == station.id) {
                        inner.queue_index = Some(index);
                    }
                }
            }

            let cluster = inner.variants.get(&station.id).cloned();
            inner.candidates =
                build_candidate_urls(station, cluster.as_ref(), inner.prefer_lower_bitrate);
            inner.attempt = 0;
            inner.station = Some(station.clone());
            inner.failure = None;

            if inner.candidates.is_empty() {
                let failure = PlaybackFailure::NoPlayableSource {
                    station: station.name.clone(),
                };
                inner.state = PlaybackState::Idle;
                inner.failure = Some(failure.clone());
                self.publish(&inner);
                logger().warn(
                    "playback.no_candidates",
                    json!({ "station": station.id, "session": inner.session }),
                );
                return Err(failure.into());
            }

            let session = inner.session;
            let command = self.start_attempt(&mut inner);
            logger().info(
                "playback.session_started",
                json!({
                    "station": station.id,
                    "session": session,
                    "candidates": inner.candidates.len(),
                }),
            );
            (command, session)
        };
        self.run(Some(command));
        Ok(session)
    }

    /// Applies a player event. Returns `false` when the ticket was stale and
    /// the event was ignored.
    pub fn report(&self, ticket: AttemptTicket, event: PlayerEvent) -> bool {
        let command = {
            let mut inner = self.lock();
            if !inner.is_current(ticket) {
                logger().debug(
                    "playback.stale_event",
                    json!({
                        "session": ticket.session,
                        "attempt": ticket.attempt,
                        "current_session": inner.session,
                        "event": event,
                    }),
                );
                return false;
            }
            match event {
                PlayerEvent::Ready => {
                    if inner.state == PlaybackState::Connecting {
                        inner.cancel_timeout();
                        inner.state = PlaybackState::Playing;
                        self.publish(&inner);
                    }
                    None
                }
                PlayerEvent::Failed | PlayerEvent::Stalled => {
                    if inner.state == PlaybackState::Idle {
                        None
                    } else {
                        self.advance(&mut inner, event_reason(event))
                    }
                }
            }
        };
        self.run(command);
        true
    }

    pub fn play_next(&self) -> Result<Option<u64>> {
        self.step_queue(true)
    }

    pub fn play_previous(&self) -> Result<Option<u64>> {
        self.step_queue(false)
    }

    fn step_queue(&self, forward: bool) -> Result<Option<u64>> {
        let station = {
            let mut inner = self.lock();
            let len = inner.queue.len();
            if len == 0 {
                return Ok(None);
            }
            let index = match (forward, inner.queue_index) {
                (true, Some(current)) => (current + 1) % len,
                (true, None) => 0,
                (false, Some(current)) => (current + len - 1) % len,
                (false, None) => 0,
            };
            inner.queue_index = Some(index);
            inner.queue[index].clone()
        };
        self.play(&station, None).map(Some)
    }

    /// Playing pauses, paused resumes; other states are left alone.
    pub fn toggle_playback(&self) -> PlaybackState {
        let (command, state) = {
            let mut inner = self.lock();
            let command = match inner.state {
                PlaybackState::Playing => {
                    inner.state = PlaybackState::Paused;
                    Some(OutputCommand::Pause)
                }
                PlaybackState::Paused => {
                    inner.state = PlaybackState::Playing;
                    Some(OutputCommand::Resume)
                }
                PlaybackState::Idle | PlaybackState::Connecting => None,
            };
            if command.is_some() {
                self.publish(&inner);
            }
            (command, inner.state)
        };
        self.run(command);
        state
    }

    pub fn set_volume(&self, volume: f32) -> f32 {
        let volume = if volume.is_nan() {
            0.0
        } else {
            volume.clamp(0.0, 1.0)
        };
        {
            let mut inner = self.lock();
            inner.volume = volume;
            self.publish(&inner);
        }
        self.run(Some(OutputCommand::Volume(volume)));
        volume
    }

    fn on_connect_timeout(&self, ticket: AttemptTicket) {
        let command = {
            let mut inner = self.lock();
            if !inner.is_current(ticket) || inner.state != PlaybackState::Connecting {
                return;
            }
            // This task is the armed timeout; drop its handle rather than abort itself.
            inner.connect_timeout = None;
            self.advance(&mut inner, "connect_timeout")
        };
        self.run(command);
    }

    fn advance(&self, inner: &mut EngineInner, reason: &str) -> Option<OutputCommand> {
        inner.cancel_timeout();
        let next = inner.attempt + 1;
        if next >= inner.candidates.len() {
            let station = inner
                .station
                .as_ref()
                .map(|station| station.name.clone())
                .unwrap_or_default();
            inner.state = PlaybackState::Idle;
            inner.failure = Some(PlaybackFailure::NoPlayableSource {
                station: station.clone(),
            });
            logger().warn(
                "playback.exhausted",
                json!({
                    "station": station,
                    "session": inner.session,
                    "attempts": inner.candidates.len(),
                    "reason": reason,
                }),
            );
            self.publish(inner);
            return None;
        }

        logger().info(
            "playback.failover",
            json!({
                "session": inner.session,
                "from": inner.attempt,
                "to": next,
                "reason": reason,
            }),
        );
        inner.attempt = next;
        Some(self.start_attempt(inner))
    }

    fn start_attempt(&self, inner: &mut EngineInner) -> OutputCommand {
        inner.state = PlaybackState::Connecting;
        let ticket = inner.ticket();
        inner.connect_timeout = Some(self.arm_timeout(ticket));
        self.publish(inner);
        OutputCommand::Load(inner.candidates[inner.attempt].clone(), ticket)
    }

    fn arm_timeout(&self, ticket: AttemptTicket) -> AbortHandle {
        let engine = self.clone();
        let delay = self.shared.connect_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            engine.on_connect_timeout(ticket);
        })
        .abort_handle()
    }

    fn run(&self, command: Option<OutputCommand>) {
        let output = &self.shared.output;
        match command {
            Some(OutputCommand::Load(url, ticket)) => output.load_and_play(&url, ticket),
            Some(OutputCommand::Pause) => output.pause(),
            Some(OutputCommand::Resume) => output.resume(),
            Some(OutputCommand::Volume(volume)) => output.set_volume(volume),
            None => {}
        }
    }

    fn publish(&self, inner: &EngineInner) {
        self.shared.status.send_replace(inner.status());
    }

    fn lock(&self) -> MutexGuard<'_, EngineInner> {
        // State stays consistent across a panic in a caller; keep going.
        self.shared
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn event_reason(event: PlayerEvent) -> &'static str {
    match event {
        PlayerEvent::Ready => "ready",
        PlayerEvent::Failed => "failed",
        PlayerEvent::Stalled => "stalled",
    }
}
