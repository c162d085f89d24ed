mod common;

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use radio_catalog::{
    config::PlaybackConfig,
    playback::{PlaybackEngine, PlaybackFailure, PlaybackState, PlayerEvent},
    stations::{Station, VariantCluster},
    CatalogError,
};

use common::RecordingOutput;

const CONNECT_TIMEOUT: Duration = Duration::from_millis(1_000);

fn engine(output: Arc<RecordingOutput>) -> PlaybackEngine {
    PlaybackEngine::new(
        output,
        &PlaybackConfig {
            connect_timeout_ms: CONNECT_TIMEOUT.as_millis() as u64,
        },
    )
}

/// A primary with two URLs and one mirror: three candidates in total.
fn clustered() -> (Station, HashMap<String, VariantCluster>) {
    let primary = Station::new("p", "Capital London")
        .with_urls(Some("http://a.example.com/live"), "http://a.example.com/resolved")
        .with_popularity(50, 0);
    let mirror = Station::new("m", "Capital London (mirror)")
        .with_urls(None, "http://b.example.com/resolved")
        .with_popularity(5, 0);
    let cluster = VariantCluster {
        primary: primary.clone(),
        variants: vec![primary.clone(), mirror],
    };
    (primary, HashMap::from([("p".to_string(), cluster)]))
}

fn single(id: &str) -> Station {
    Station::new(id, format!("Station {id}"))
        .with_urls(None, &format!("http://{id}.example.com/stream"))
}

#[tokio::test(start_paused = true)]
async fn exhausts_after_every_candidate_failed_once() {
    let output = RecordingOutput::new();
    let engine = engine(output.clone());
    let (station, variants) = clustered();
    engine.set_variants(Arc::new(variants));

    engine.play(&station, None).unwrap();
    for _ in 0..3 {
        assert!(engine.report(output.last_ticket(), PlayerEvent::Failed));
    }

    let urls: Vec<String> = output
        .loads()
        .iter()
        .map(|(url, _)| url.to_string())
        .collect();
    assert_eq!(
        urls,
        vec![
            "http://a.example.com/resolved",
            "http://a.example.com/live",
            "http://b.example.com/resolved",
        ]
    );
    let status = engine.status();
    assert_eq!(status.state, PlaybackState::Idle);
    assert_eq!(
        status.failure,
        Some(PlaybackFailure::NoPlayableSource {
            station: "Capital London".into()
        })
    );

    // Nothing left to try; a late timeout must not restart anything.
    tokio::time::sleep(CONNECT_TIMEOUT * 3).await;
    assert_eq!(output.loads().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn repeated_failure_for_an_old_attempt_is_ignored() {
    let output = RecordingOutput::new();
    let engine = engine(output.clone());
    let (station, variants) = clustered();
    engine.set_variants(Arc::new(variants));

    engine.play(&station, None).unwrap();
    let first = output.last_ticket();
    assert!(engine.report(first, PlayerEvent::Stalled));
    assert!(!engine.report(first, PlayerEvent::Failed));

    assert_eq!(output.loads().len(), 2);
    assert_eq!(engine.status().candidate_index, 1);
    assert_eq!(engine.status().state, PlaybackState::Connecting);
}

#[tokio::test(start_paused = true)]
async fn events_from_a_previous_session_are_dropped() {
    let output = RecordingOutput::new();
    let engine = engine(output.clone());

    let first_session = engine.play(&single("one"), None).unwrap();
    let old_ticket = output.last_ticket();
    let second_session = engine.play(&single("two"), None).unwrap();
    assert!(second_session > first_session);

    assert!(!engine.report(old_ticket, PlayerEvent::Ready));
    assert!(!engine.report(old_ticket, PlayerEvent::Failed));
    let status = engine.status();
    assert_eq!(status.state, PlaybackState::Connecting);
    assert_eq!(status.station.unwrap().id, "two");
    assert_eq!(output.loads().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn connect_timeout_moves_to_the_next_candidate() {
    let output = RecordingOutput::new();
    let engine = engine(output.clone());
    let (station, variants) = clustered();
    engine.set_variants(Arc::new(variants));

    engine.play(&station, None).unwrap();
    tokio::time::sleep(CONNECT_TIMEOUT + Duration::from_millis(10)).await;

    assert_eq!(output.loads().len(), 2);
    assert_eq!(engine.status().candidate_index, 1);

    assert!(engine.report(output.last_ticket(), PlayerEvent::Ready));
    assert_eq!(engine.status().state, PlaybackState::Playing);

    // The armed timeout was cancelled by the ready event.
    tokio::time::sleep(CONNECT_TIMEOUT * 3).await;
    assert_eq!(output.loads().len(), 2);
    assert_eq!(engine.status().state, PlaybackState::Playing);
}

#[tokio::test(start_paused = true)]
async fn toggle_pauses_and_resumes_only_live_playback() {
    let output = RecordingOutput::new();
    let engine = engine(output.clone());
    assert_eq!(engine.toggle_playback(), PlaybackState::Idle);

    engine.play(&single("one"), None).unwrap();
    assert_eq!(engine.toggle_playback(), PlaybackState::Connecting);
    engine.report(output.last_ticket(), PlayerEvent::Ready);

    assert_eq!(engine.toggle_playback(), PlaybackState::Paused);
    assert_eq!(engine.toggle_playback(), PlaybackState::Playing);
    assert_eq!(output.pauses.load(Ordering::SeqCst), 1);
    assert_eq!(output.resumes.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn queue_navigation_wraps_both_ways() {
    let output = RecordingOutput::new();
    let engine = engine(output.clone());
    let queue = vec![single("a"), single("b"), single("c")];

    engine.play(&queue[0], Some(queue.clone())).unwrap();
    engine.play_next().unwrap();
    assert_eq!(engine.status().station.unwrap().id, "b");
    engine.play_previous().unwrap();
    engine.play_previous().unwrap();
    assert_eq!(engine.status().station.unwrap().id, "c");
    engine.play_next().unwrap();
    assert_eq!(engine.status().station.unwrap().id, "a");
}

#[tokio::test(start_paused = true)]
async fn empty_queue_navigation_does_nothing() {
    let output = RecordingOutput::new();
    let engine = engine(output.clone());
    assert_eq!(engine.play_next().unwrap(), None);
    assert!(output.loads().is_empty());
}

#[tokio::test(start_paused = true)]
async fn station_without_urls_fails_immediately() {
    let output = RecordingOutput::new();
    let engine = engine(output.clone());

    let error = engine.play(&Station::new("x", "Silent"), None).unwrap_err();

    assert!(matches!(error, CatalogError::NoPlayableSource { .. }));
    assert!(output.loads().is_empty());
    assert_eq!(engine.status().state, PlaybackState::Idle);
    assert!(engine.status().failure.is_some());
}

#[tokio::test(start_paused = true)]
async fn constrained_network_tries_the_lightest_stream_first() {
    let output = RecordingOutput::new();
    let engine = engine(output.clone());
    let heavy = Station::new("hq", "Jazz 320k").with_urls(None, "http://jazz.example.com/320");
    let light = Station::new("lq", "Jazz 64k").with_urls(None, "http://jazz.example.com/64");
    engine.set_variants(Arc::new(HashMap::from([(
        "hq".to_string(),
        VariantCluster {
            primary: heavy.clone(),
            variants: vec![heavy.clone(), light],
        },
    )])));

    engine.play(&heavy, None).unwrap();
    assert_eq!(output.loads()[0].0.as_str(), "http://jazz.example.com/320");

    engine.set_network_constraints(false, true);
    engine.play(&heavy, None).unwrap();
    assert_eq!(output.loads()[1].0.as_str(), "http://jazz.example.com/64");
    assert_eq!(engine.status().inferred_bitrate_kbps, Some(320));
}

#[tokio::test(start_paused = true)]
async fn volume_is_clamped() {
    let output = RecordingOutput::new();
    let engine = engine(output.clone());
    assert_eq!(engine.set_volume(1.7), 1.0);
    assert_eq!(engine.set_volume(-0.2), 0.0);
    assert_eq!(engine.status().volume, 0.0);
    assert_eq!(*output.volumes.lock().unwrap(), vec![1.0, 0.0]);
}
