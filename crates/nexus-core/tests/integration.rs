//! Integration tests driving the coordinator through whole submissions:
//! begin → backend response → complete → clock ticks, across modules.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use nexus_core::{
    AudioConfig, AudioEngine, AudioScheduler, AudioUnavailable, CameraMode, Coordinator,
    CoordinatorConfig, Cue, Emotion, InteractionEvent, LatencyBucket, ProcessResponse,
    RequestFailure, StreamEffect, StreamMessage, Submission, Tone, VoiceId,
};

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

/// Records every cue the scheduler starts.
#[derive(Clone, Default)]
struct CueLog {
    cues: Arc<Mutex<Vec<Cue>>>,
    next: u64,
}

impl CueLog {
    fn cues(&self) -> Vec<Cue> {
        self.cues.lock().unwrap().clone()
    }

    fn activations(&self) -> Vec<usize> {
        self.cues()
            .into_iter()
            .filter_map(|c| match c {
                Cue::UnitActivation(i) => Some(i),
                _ => None,
            })
            .collect()
    }
}

impl AudioEngine for CueLog {
    fn start(&mut self, tone: &Tone) -> Result<VoiceId, AudioUnavailable> {
        self.cues.lock().unwrap().push(tone.cue);
        self.next += 1;
        Ok(VoiceId(self.next))
    }

    fn release(&mut self, _voice: VoiceId) {}
}

fn with_audio() -> (Coordinator, CueLog) {
    let log = CueLog::default();
    let audio = AudioScheduler::new(AudioConfig::default(), Some(Box::new(log.clone())));
    (Coordinator::new(CoordinatorConfig::default(), audio), log)
}

fn edge(from: &str, to: &str) -> InteractionEvent {
    InteractionEvent {
        from_unit: from.to_string(),
        to_unit: to.to_string(),
        ..Default::default()
    }
}

fn response(edges: Vec<InteractionEvent>, processing_time_ms: f64) -> ProcessResponse {
    ProcessResponse {
        success: true,
        interactions: edges,
        processing_time_ms,
        timestamp: "2026-10-18T09:30:00Z".to_string(),
        ..Default::default()
    }
}

/// Test 1: the deploy question from submission to a cleared display.
#[test]
fn deploy_question_end_to_end() {
    let (mut c, log) = with_audio();

    let submission =
        Submission::new("why did the last deploy fail?").with_emotion(Emotion::Focused);
    let pending = c.begin(ms(0), &submission).expect("non-empty query");
    assert!(c.is_processing());
    assert_eq!(pending.request.context.current_emotion, "focused");
    assert_eq!(pending.request.context.goal, "general query");

    let body = response(vec![edge("INPUT", "U7"), edge("U7", "U9")], 42.0);
    let activation = c.complete(ms(60), pending.ticket, Ok(body)).unwrap();
    assert!(!c.is_processing());

    assert_eq!(activation.active, vec!["U7", "U9"]);
    assert_eq!(c.projection().active(), ["U7", "U9"]);

    let history = c.projection().history();
    assert_eq!(history.len(), 1);
    let entry = history.latest().unwrap();
    assert_eq!(entry.processing_time_ms, 42.0);
    assert_eq!(entry.bucket(), LatencyBucket::Nominal);
    assert_eq!(entry.query_excerpt, "why did the last deploy fail?");

    // uncatalogued units get audio slots after the nine catalogued ones
    assert_eq!(log.activations(), vec![9, 10]);
    assert!(log.cues().contains(&Cue::ConnectionChime));

    assert!(!c.tick(ms(3000)));
    assert!(c.tick(ms(3060)));
    assert!(c.projection().active().is_empty());
}

/// Test 2: processing start plays the arpeggio, then the delayed hum.
#[test]
fn submission_cues_follow_the_clock() {
    let (mut c, log) = with_audio();
    c.begin(ms(0), &Submission::new("hello")).unwrap();
    assert_eq!(log.cues(), vec![Cue::ProcessingStart]);

    c.tick(ms(100));
    assert_eq!(
        log.cues().iter().filter(|c| **c == Cue::ProcessingStart).count(),
        3
    );
    assert!(!log.cues().contains(&Cue::AmbientHum));

    c.tick(ms(200));
    assert!(log.cues().contains(&Cue::AmbientHum));
}

/// Test 3: a second response inside the window keeps the display lit.
#[test]
fn overlapping_responses_do_not_flicker() {
    let (mut c, _log) = with_audio();

    let a = c.begin(ms(0), &Submission::new("a")).unwrap();
    c.complete(ms(0), a.ticket, Ok(response(vec![edge("INPUT", "LAB_001")], 10.0)));

    let b = c.begin(ms(900), &Submission::new("b")).unwrap();
    c.complete(ms(1000), b.ticket, Ok(response(vec![edge("INPUT", "LAB_010")], 10.0)));

    for t in (0..=3100).step_by(100) {
        c.tick(ms(t));
    }
    assert_eq!(c.projection().active(), ["LAB_010"]);

    c.tick(ms(4000));
    assert!(c.projection().active().is_empty());
}

/// Test 4: fifteen queries leave the ten most recent, newest first.
#[test]
fn history_keeps_ten_most_recent() {
    let (mut c, _log) = with_audio();
    for i in 0..15u64 {
        let p = c.begin(ms(i * 10), &Submission::new(format!("query {i}"))).unwrap();
        c.complete(
            ms(i * 10 + 5),
            p.ticket,
            Ok(response(vec![edge("INPUT", "LAB_006")], i as f64)),
        );
    }

    let excerpts: Vec<String> = c
        .projection()
        .history()
        .iter()
        .map(|e| e.query_excerpt.clone())
        .collect();
    let expected: Vec<String> = (5..15).rev().map(|i| format!("query {i}")).collect();
    assert_eq!(excerpts, expected);
}

/// Test 5: a transport failure becomes a banner and nothing else changes.
#[test]
fn failed_request_surfaces_error() {
    let (mut c, log) = with_audio();
    let p = c.begin(ms(0), &Submission::new("will fail")).unwrap();
    c.complete(
        ms(10_000),
        p.ticket,
        Err(RequestFailure::new("request failed", "operation timed out")),
    );

    assert!(!c.is_processing());
    assert!(c.projection().history().is_empty());
    assert!(log.activations().is_empty());

    let snap = c.snapshot();
    assert_eq!(snap.error.unwrap().cause, "operation timed out");
    assert!(!snap.is_processing);
}

/// Test 6: pushed interaction frames light units without a history entry.
#[test]
fn stream_interactions_light_units() {
    let (mut c, log) = with_audio();
    let frame: StreamMessage = serde_json::from_str(
        r#"{"type":"lab_interaction","data":{"from_lab":"INPUT","to_lab":"LAB_011"},
            "timestamp":"2026-10-18T09:30:00Z"}"#,
    )
    .unwrap();

    let effect = c.on_stream_message(ms(0), &frame).unwrap();
    assert!(matches!(effect, StreamEffect::Interaction(_)));
    assert_eq!(c.projection().active(), ["LAB_011"]);
    assert!(c.projection().history().is_empty());
    assert_eq!(log.activations(), vec![6]);
    assert!(!log.cues().contains(&Cue::ConnectionChime));
}

/// Test 7: selecting a unit zooms in; reset returns to the overview.
#[test]
fn select_then_reset_camera() {
    let (mut c, log) = with_audio();
    c.tick(ms(0));
    assert!(c.select_unit(ms(0), "LAB_001"));
    assert_eq!(c.camera().mode(), CameraMode::Animating);

    c.reset_view(ms(500));
    c.tick(ms(2000));
    let view = c.camera().state();
    assert_eq!(c.camera().mode(), CameraMode::IdleOrbit);
    assert!((view.position.z - 6.0).abs() < 1e-9);

    let cues = log.cues();
    assert!(cues.contains(&Cue::CameraZoom));
    assert!(cues.contains(&Cue::CameraReset));
}

/// Test 8: without an audio engine every cue is a silent no-op.
#[test]
fn missing_audio_engine_is_silent() {
    let audio = AudioScheduler::new(AudioConfig::default(), None);
    let mut c = Coordinator::new(CoordinatorConfig::default(), audio);
    let p = c.begin(ms(0), &Submission::new("quiet")).unwrap();
    c.complete(ms(5), p.ticket, Ok(response(vec![edge("INPUT", "LAB_012")], 5.0)));
    c.tick(ms(300));
    assert_eq!(c.audio().live_voices(), 0);
    assert_eq!(c.projection().active(), ["LAB_012"]);
}
