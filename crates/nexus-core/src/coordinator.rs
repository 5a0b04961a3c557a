//! Orchestration coordinator: owns the projection, camera animator and audio
//! scheduler, and applies each submission's side effects in a fixed order.
//!
//! The coordinator performs no I/O. A submission is split in two halves:
//! [`Coordinator::begin`] validates and hands back the request to send, and
//! [`Coordinator::complete`] applies whatever the gateway returned. Whoever
//! drives the coordinator (the console event loop) owns the network call in
//! between, so several submissions may be in flight at once. Responses are
//! applied in completion order: the last one to complete wins the active set.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::audio::AudioScheduler;
use crate::camera::{CameraAnimator, CameraConfig, CameraMode, Vec3, ViewpointState};
use crate::catalog::catalog;
use crate::constants::{AMBIENT_HUM_DELAY, AMBIENT_HUM_HOLD, SELECTION_DISTANCE};
use crate::model::{
    ConnectionState, Emotion, EmotionalState, FutureVision, HealthResponse, ProcessRequest,
    ProcessResponse, StreamMessage, WorkingMemoryItem,
};
use crate::projection::{
    Activation, ActivityProjection, Connection, DisplayMetrics, ProjectionConfig, StreamEffect,
};
use crate::timeline::TimelineEvent;

/// One operator submission.
#[derive(Clone, Debug, PartialEq)]
pub struct Submission {
    pub query: String,
    pub emotion: Emotion,
    pub goal: String,
}

impl Submission {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            emotion: Emotion::default(),
            goal: String::new(),
        }
    }

    pub fn with_emotion(mut self, emotion: Emotion) -> Self {
        self.emotion = emotion;
        self
    }

    pub fn with_goal(mut self, goal: impl Into<String>) -> Self {
        self.goal = goal.into();
        self
    }
}

/// A failed request in display form: a short message plus the underlying cause.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RequestFailure {
    pub summary: String,
    pub cause: String,
}

impl RequestFailure {
    pub fn new(summary: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            cause: cause.into(),
        }
    }
}

impl fmt::Display for RequestFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.cause.is_empty() {
            write!(f, "{}", self.summary)
        } else {
            write!(f, "{}: {}", self.summary, self.cause)
        }
    }
}

/// Identifies one in-flight submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Ticket(pub u64);

/// A validated submission ready to send.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingQuery {
    pub ticket: Ticket,
    pub request: ProcessRequest,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    #[default]
    Loading,
    Healthy,
    /// Reachable but reporting a non-healthy status
    Degraded,
    Unreachable,
}

/// Backend link status shown in the header.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct LinkStatus {
    pub stream: ConnectionState,
    pub reconnect_attempt: u32,
    /// Reconnection exhausted; only a manual reconnect restarts the channel
    pub gave_up: bool,
    pub health: HealthStatus,
    pub last_health: Option<HealthResponse>,
}

#[derive(Clone, Copy, Debug)]
pub struct CoordinatorConfig {
    pub projection: ProjectionConfig,
    pub camera: CameraConfig,
    pub ambient_hum_delay: Duration,
    pub ambient_hum_hold: Duration,
    pub selection_distance: f64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            projection: ProjectionConfig::default(),
            camera: CameraConfig::default(),
            ambient_hum_delay: AMBIENT_HUM_DELAY,
            ambient_hum_hold: AMBIENT_HUM_HOLD,
            selection_distance: SELECTION_DISTANCE,
        }
    }
}

/// A lit unit, resolved against the catalog where possible.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ActiveUnit {
    pub id: String,
    pub name: Option<&'static str>,
    pub color: &'static str,
    pub position: Option<Vec3>,
}

/// Everything the rendering layer needs for one frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConsoleSnapshot {
    pub revision: u64,
    pub is_processing: bool,
    pub in_flight: usize,
    pub active: Vec<ActiveUnit>,
    pub connections: Vec<Connection>,
    pub history: Vec<TimelineEvent>,
    pub working_memory: Vec<WorkingMemoryItem>,
    pub metrics: DisplayMetrics,
    pub future_vision: Option<FutureVision>,
    pub emotional_state: Option<EmotionalState>,
    pub viewpoint: ViewpointState,
    pub camera_mode: CameraMode,
    pub error: Option<RequestFailure>,
    pub link: LinkStatus,
}

pub struct Coordinator {
    config: CoordinatorConfig,
    projection: ActivityProjection,
    camera: CameraAnimator,
    audio: AudioScheduler,
    in_flight: Vec<(Ticket, String)>,
    next_ticket: u64,
    error: Option<RequestFailure>,
    link: LinkStatus,
    revision: u64,
}

impl Coordinator {
    pub fn new(config: CoordinatorConfig, audio: AudioScheduler) -> Self {
        Self {
            projection: ActivityProjection::new(config.projection),
            camera: CameraAnimator::new(config.camera),
            audio,
            config,
            in_flight: Vec::new(),
            next_ticket: 0,
            error: None,
            link: LinkStatus::default(),
            revision: 0,
        }
    }

    // --- Submissions ---

    /// Validate a submission and start its cues. Returns `None` (and sends
    /// nothing) for a blank query.
    pub fn begin(&mut self, now: Duration, submission: &Submission) -> Option<PendingQuery> {
        let query = submission.query.trim();
        if query.is_empty() {
            return None;
        }

        self.error = None;
        self.audio.processing_start(now);
        self.audio
            .ambient_hum_after(now, self.config.ambient_hum_delay, self.config.ambient_hum_hold);

        self.next_ticket += 1;
        let ticket = Ticket(self.next_ticket);
        self.in_flight.push((ticket, query.to_string()));
        self.bump();

        Some(PendingQuery {
            ticket,
            request: ProcessRequest::new(query, submission.emotion, &submission.goal),
        })
    }

    /// Apply the outcome of an in-flight submission. Failures are stored for
    /// display and leave the active set and history untouched.
    pub fn complete(
        &mut self,
        now: Duration,
        ticket: Ticket,
        result: Result<ProcessResponse, RequestFailure>,
    ) -> Option<Activation> {
        let query = self
            .in_flight
            .iter()
            .position(|(t, _)| *t == ticket)
            .map(|i| self.in_flight.remove(i).1);
        self.bump();

        match result {
            Ok(response) => {
                let activation = self
                    .projection
                    .apply_response(now, &response, query.as_deref());
                self.audio.connection_chime(now);
                self.cue_activations(now, &activation.newly_active);
                Some(activation)
            }
            Err(failure) => {
                self.error = Some(failure);
                None
            }
        }
    }

    pub fn is_processing(&self) -> bool {
        !self.in_flight.is_empty()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn error(&self) -> Option<&RequestFailure> {
        self.error.as_ref()
    }

    pub fn dismiss_error(&mut self) {
        if self.error.take().is_some() {
            self.bump();
        }
    }

    // --- Stream ---

    /// Apply a frame from the stream channel. Undecodable payloads are
    /// returned as errors and change nothing.
    pub fn on_stream_message(
        &mut self,
        now: Duration,
        message: &StreamMessage,
    ) -> Result<StreamEffect, serde_json::Error> {
        let effect = self.projection.apply_stream_event(now, message)?;
        if let StreamEffect::Response(a) | StreamEffect::Interaction(a) = &effect {
            self.cue_activations(now, &a.newly_active);
        }
        self.bump();
        Ok(effect)
    }

    pub fn record_stream_state(&mut self, state: ConnectionState, reconnect_attempt: u32) {
        let gave_up = self.link.gave_up && state != ConnectionState::Connecting;
        if self.link.stream != state
            || self.link.reconnect_attempt != reconnect_attempt
            || self.link.gave_up != gave_up
        {
            self.link.stream = state;
            self.link.reconnect_attempt = reconnect_attempt;
            self.link.gave_up = gave_up;
            self.bump();
        }
    }

    pub fn record_stream_gave_up(&mut self) {
        self.link.stream = ConnectionState::Closed;
        self.link.gave_up = true;
        self.bump();
    }

    pub fn record_health(&mut self, result: Result<HealthResponse, RequestFailure>) {
        match result {
            Ok(health) => {
                self.link.health = if health.is_healthy() {
                    HealthStatus::Healthy
                } else {
                    HealthStatus::Degraded
                };
                self.link.last_health = Some(health);
            }
            Err(_) => self.link.health = HealthStatus::Unreachable,
        }
        self.bump();
    }

    pub fn link(&self) -> &LinkStatus {
        &self.link
    }

    // --- Camera ---

    /// Fly the camera to a catalogued unit. Unknown ids are ignored.
    pub fn select_unit(&mut self, now: Duration, id: &str) -> bool {
        let Some(unit) = catalog().get(id) else {
            return false;
        };
        let outward = match unit.position.normalized() {
            dir if dir == Vec3::ZERO => Vec3::new(0.0, 0.0, 1.0),
            dir => dir,
        };
        let eye = unit.position + outward * self.config.selection_distance;
        self.camera.request_view(now, eye, unit.position, None);
        self.audio.camera_zoom(now);
        self.bump();
        true
    }

    pub fn reset_view(&mut self, now: Duration) {
        self.camera.reset(now);
        self.audio.camera_reset(now);
        self.bump();
    }

    pub fn set_interacting(&mut self, interacting: bool) {
        self.camera.set_interacting(interacting);
    }

    // --- Clock ---

    /// Advance every timer to `now`. Returns true if display state changed
    /// beyond the continuous camera motion.
    pub fn tick(&mut self, now: Duration) -> bool {
        let cleared = self.projection.tick(now);
        let landed = self.camera.tick(now).is_some();
        self.audio.tick(now);
        if cleared || landed {
            self.bump();
            true
        } else {
            false
        }
    }

    /// Changes whenever anything but the camera's continuous motion changes.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn projection(&self) -> &ActivityProjection {
        &self.projection
    }

    pub fn camera(&self) -> &CameraAnimator {
        &self.camera
    }

    pub fn audio(&self) -> &AudioScheduler {
        &self.audio
    }

    pub fn snapshot(&self) -> ConsoleSnapshot {
        let cat = catalog();
        let active = self
            .projection
            .active()
            .iter()
            .map(|id| {
                let unit = cat.get(id);
                ActiveUnit {
                    id: id.clone(),
                    name: unit.map(|u| u.name),
                    color: cat.color_of(id),
                    position: unit.map(|u| u.position),
                }
            })
            .collect();
        let latest = self.projection.latest();

        ConsoleSnapshot {
            revision: self.revision,
            is_processing: self.is_processing(),
            in_flight: self.in_flight.len(),
            active,
            connections: self.projection.connections(),
            history: self.projection.history().to_vec(),
            working_memory: self.projection.working_memory().to_vec(),
            metrics: self.projection.metrics(),
            future_vision: latest.and_then(|r| r.future_vision.clone()),
            emotional_state: latest.map(|r| r.emotional_state.clone()),
            viewpoint: self.camera.state(),
            camera_mode: self.camera.mode(),
            error: self.error.clone(),
            link: self.link.clone(),
        }
    }

    /// Audio index for each newly lit unit: catalog position when known,
    /// otherwise slots after the catalog in arrival order.
    fn cue_activations(&mut self, now: Duration, newly_active: &[String]) {
        let cat = catalog();
        let mut extra = 0;
        for id in newly_active {
            let index = match cat.index_of(id) {
                Some(i) => i,
                None => {
                    extra += 1;
                    cat.len() + extra - 1
                }
            };
            self.audio.unit_activation(now, index);
        }
    }

    fn bump(&mut self) {
        self.revision += 1;
    }
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("revision", &self.revision)
            .field("in_flight", &self.in_flight.len())
            .field("active", &self.projection.active())
            .field("camera", &self.camera.mode())
            .field("audio", &self.audio)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::InteractionEvent;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn coordinator() -> Coordinator {
        Coordinator::new(CoordinatorConfig::default(), AudioScheduler::silent())
    }

    fn response(targets: &[&str]) -> ProcessResponse {
        ProcessResponse {
            interactions: targets
                .iter()
                .map(|t| InteractionEvent {
                    from_unit: "INPUT".to_string(),
                    to_unit: t.to_string(),
                    ..Default::default()
                })
                .collect(),
            processing_time_ms: 20.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_blank_query_rejected() {
        let mut c = coordinator();
        assert!(c.begin(ms(0), &Submission::new("   \t ")).is_none());
        assert!(!c.is_processing());
        assert_eq!(c.revision(), 0);
    }

    #[test]
    fn test_begin_trims_and_tracks() {
        let mut c = coordinator();
        let pending = c
            .begin(ms(0), &Submission::new("  hello  ").with_emotion(Emotion::Calm))
            .unwrap();
        assert_eq!(pending.request.query, "hello");
        assert_eq!(pending.request.context.current_emotion, "calm");
        assert!(c.is_processing());

        c.complete(ms(10), pending.ticket, Ok(response(&["LAB_001"])));
        assert!(!c.is_processing());
        assert_eq!(c.projection().history().latest().unwrap().query_excerpt, "hello");
    }

    #[test]
    fn test_failure_leaves_state_untouched() {
        let mut c = coordinator();
        let a = c.begin(ms(0), &Submission::new("first")).unwrap();
        c.complete(ms(5), a.ticket, Ok(response(&["LAB_006"])));

        let b = c.begin(ms(10), &Submission::new("second")).unwrap();
        c.complete(
            ms(20),
            b.ticket,
            Err(RequestFailure::new("request failed", "timed out")),
        );

        assert!(!c.is_processing());
        assert_eq!(c.projection().active(), ["LAB_006"]);
        assert_eq!(c.projection().history().len(), 1);
        assert_eq!(c.error().unwrap().to_string(), "request failed: timed out");

        c.dismiss_error();
        assert!(c.error().is_none());
    }

    #[test]
    fn test_new_submission_clears_error() {
        let mut c = coordinator();
        let a = c.begin(ms(0), &Submission::new("q")).unwrap();
        c.complete(ms(1), a.ticket, Err(RequestFailure::new("request failed", "")));
        assert!(c.error().is_some());
        c.begin(ms(2), &Submission::new("again")).unwrap();
        assert!(c.error().is_none());
    }

    #[test]
    fn test_last_completed_wins() {
        let mut c = coordinator();
        let slow = c.begin(ms(0), &Submission::new("slow")).unwrap();
        let fast = c.begin(ms(1), &Submission::new("fast")).unwrap();
        assert_eq!(c.in_flight(), 2);

        c.complete(ms(10), fast.ticket, Ok(response(&["LAB_010"])));
        assert!(c.is_processing());
        c.complete(ms(50), slow.ticket, Ok(response(&["LAB_001"])));

        assert!(!c.is_processing());
        assert_eq!(c.projection().active(), ["LAB_001"]);
        let excerpts: Vec<_> = c
            .projection()
            .history()
            .iter()
            .map(|e| e.query_excerpt.as_str())
            .collect();
        assert_eq!(excerpts, vec!["slow", "fast"]);
    }

    #[test]
    fn test_select_unit_moves_camera_outward() {
        let mut c = coordinator();
        c.tick(ms(0));
        assert!(c.select_unit(ms(0), "LAB_009"));
        assert!(!c.select_unit(ms(0), "LAB_404"));

        let target = c.camera().state().pending_target.unwrap();
        let unit = catalog().get("LAB_009").unwrap().position;
        assert!((target.distance(unit) - SELECTION_DISTANCE).abs() < 1e-9);
        assert!(target.length() > unit.length());

        assert!(c.tick(ms(1500)));
        assert_eq!(c.camera().state().look_at, unit);
        assert_eq!(c.camera().mode(), CameraMode::IdleOrbit);
    }

    #[test]
    fn test_activation_does_not_move_camera() {
        let mut c = coordinator();
        let p = c.begin(ms(0), &Submission::new("q")).unwrap();
        c.complete(ms(5), p.ticket, Ok(response(&["LAB_001", "LAB_006"])));
        assert!(!c.camera().is_animating());
    }

    #[test]
    fn test_link_status() {
        let mut c = coordinator();
        c.record_stream_state(ConnectionState::Open, 0);
        assert_eq!(c.link().stream, ConnectionState::Open);

        c.record_stream_gave_up();
        c.record_stream_state(ConnectionState::Closed, 10);
        assert!(c.link().gave_up);

        // a manual reconnect starts a fresh cycle
        c.record_stream_state(ConnectionState::Connecting, 0);
        assert!(!c.link().gave_up);

        c.record_health(Err(RequestFailure::new("request failed", "refused")));
        assert_eq!(c.link().health, HealthStatus::Unreachable);
        c.record_health(Ok(HealthResponse {
            status: "healthy".to_string(),
            ..Default::default()
        }));
        assert_eq!(c.link().health, HealthStatus::Healthy);
    }

    #[test]
    fn test_snapshot_resolves_catalog() {
        let mut c = coordinator();
        let p = c.begin(ms(0), &Submission::new("q")).unwrap();
        c.complete(ms(5), p.ticket, Ok(response(&["LAB_011", "X1"])));
        let snap = c.snapshot();
        assert_eq!(snap.active[0].name, Some("Working Memory"));
        assert_eq!(snap.active[0].color, "#00D9FF");
        assert_eq!(snap.active[1].name, None);
        assert!(snap.active[1].position.is_none());
        assert!(!snap.is_processing);
        assert_eq!(snap.history.len(), 1);
        // every hop leaves the input source
        assert!(snap.connections.is_empty());
    }

    #[test]
    fn test_snapshot_carries_connections() {
        let mut c = coordinator();
        let p = c.begin(ms(0), &Submission::new("q")).unwrap();
        let mut resp = response(&["LAB_001"]);
        resp.interactions.push(InteractionEvent {
            from_unit: "LAB_001".to_string(),
            to_unit: "LAB_028".to_string(),
            ..Default::default()
        });
        c.complete(ms(5), p.ticket, Ok(resp));

        let snap = c.snapshot();
        assert_eq!(snap.connections.len(), 1);
        assert_eq!(snap.connections[0].from, "LAB_001");
        assert_eq!(snap.connections[0].to, "LAB_028");
        assert_eq!(snap.connections[0].color, "#FF3864");
    }
}
