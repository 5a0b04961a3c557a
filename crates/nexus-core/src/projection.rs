//! Activity projection: the single place where backend responses and stream
//! events become display state.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::camera::Vec3;
use crate::catalog::catalog;
use crate::constants::{DEFAULT_DISPLAY_WINDOW, HISTORY_CAPACITY, INPUT_SOURCE};
use crate::emotion::{RadarAxis, neutral_radar, radar};
use crate::model::{InteractionEvent, ProcessResponse, StreamMessage, WorkingMemoryItem};
use crate::schedule::Deadline;
use crate::timeline::{History, LatencyBucket, TimelineEvent, latency_progress};

#[derive(Clone, Copy, Debug)]
pub struct ProjectionConfig {
    /// How long an activation batch stays lit
    pub display_window: Duration,
    pub history_capacity: usize,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            display_window: DEFAULT_DISPLAY_WINDOW,
            history_capacity: HISTORY_CAPACITY,
        }
    }
}

/// Outcome of replacing the active set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Activation {
    /// Units in the new set that were not lit before, in arrival order
    pub newly_active: Vec<String>,
    pub active: Vec<String>,
}

/// What a stream frame did to the projection.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEffect {
    Response(Activation),
    Interaction(Activation),
    WorkingMemory(usize),
    Observed,
}

/// Derived numbers for the metrics panel.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DisplayMetrics {
    pub processing_time_ms: Option<f64>,
    pub latency_bucket: Option<LatencyBucket>,
    pub latency_progress: f64,
    pub confidence: Option<f64>,
    pub emotional_intensity: Option<f64>,
    pub active_units: usize,
    pub total_units: usize,
    pub memory_count: usize,
    pub radar: [RadarAxis; 6],
}

/// One drawable edge between two catalogued units, colored by its source.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Connection {
    pub from: String,
    pub to: String,
    pub color: &'static str,
    pub from_pos: Vec3,
    pub to_pos: Vec3,
}

#[derive(Deserialize)]
struct InteractionBatch {
    interactions: Vec<InteractionEvent>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum InteractionPayload {
    Batch(InteractionBatch),
    Single(InteractionEvent),
}

#[derive(Deserialize)]
struct MemoryBatch {
    items: Vec<WorkingMemoryItem>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MemoryPayload {
    List(Vec<WorkingMemoryItem>),
    Batch(MemoryBatch),
}

/// Distinct activation targets in first-arrival order, excluding the
/// synthetic input source.
pub fn distinct_targets(interactions: &[InteractionEvent]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for ev in interactions {
        let id = ev.to_unit.as_str();
        if id.is_empty() || id == INPUT_SOURCE {
            continue;
        }
        if !out.iter().any(|seen| seen == id) {
            out.push(id.to_string());
        }
    }
    out
}

/// Edges worth drawing: hops out of the input source are dropped, as are
/// hops touching a unit with no catalog position.
pub fn connections(interactions: &[InteractionEvent]) -> Vec<Connection> {
    let cat = catalog();
    interactions
        .iter()
        .filter(|ev| ev.from_unit != INPUT_SOURCE)
        .filter_map(|ev| {
            let from = cat.get(&ev.from_unit)?;
            let to = cat.get(&ev.to_unit)?;
            Some(Connection {
                from: ev.from_unit.clone(),
                to: ev.to_unit.clone(),
                color: from.color,
                from_pos: from.position,
                to_pos: to.position,
            })
        })
        .collect()
}

#[derive(Debug)]
pub struct ActivityProjection {
    window: Duration,
    active: Vec<String>,
    // most recent interaction batch, from a response or a stream frame
    interactions: Vec<InteractionEvent>,
    clear: Deadline,
    history: History,
    working_memory: Vec<WorkingMemoryItem>,
    latest: Option<ProcessResponse>,
    last_event: Option<StreamMessage>,
}

impl ActivityProjection {
    pub fn new(config: ProjectionConfig) -> Self {
        Self {
            window: config.display_window,
            active: Vec::new(),
            interactions: Vec::new(),
            clear: Deadline::new(),
            history: History::with_capacity(config.history_capacity),
            working_memory: Vec::new(),
            latest: None,
            last_event: None,
        }
    }

    /// Apply a completed query response: replace the active set, record one
    /// timeline entry and take over its working memory.
    pub fn apply_response(
        &mut self,
        now: Duration,
        response: &ProcessResponse,
        query: Option<&str>,
    ) -> Activation {
        let activation = self.activate(now, distinct_targets(&response.interactions));
        self.interactions = response.interactions.clone();
        self.history.push(TimelineEvent::from_response(response, query));
        self.working_memory = response.working_memory.clone();
        self.latest = Some(response.clone());
        activation
    }

    /// Replace the active set and (re)arm its clear timeout. An empty target
    /// list clears immediately.
    pub fn activate(&mut self, now: Duration, targets: Vec<String>) -> Activation {
        let newly_active: Vec<String> = targets
            .iter()
            .filter(|id| !self.active.contains(id))
            .cloned()
            .collect();

        self.active = targets;
        if self.active.is_empty() {
            self.clear.cancel();
        } else {
            self.clear.schedule(now, self.window);
        }

        Activation {
            newly_active,
            active: self.active.clone(),
        }
    }

    /// Apply one frame pushed over the stream channel.
    pub fn apply_stream_event(
        &mut self,
        now: Duration,
        message: &StreamMessage,
    ) -> Result<StreamEffect, serde_json::Error> {
        let effect = match message.kind.as_str() {
            "process_result" | "brain_process" => {
                let response: ProcessResponse = serde_json::from_value(message.data.clone())?;
                StreamEffect::Response(self.apply_response(now, &response, None))
            }
            "interaction" | "lab_interaction" => {
                let interactions = match serde_json::from_value(message.data.clone())? {
                    InteractionPayload::Batch(b) => b.interactions,
                    InteractionPayload::Single(ev) => vec![ev],
                };
                let activation = self.activate(now, distinct_targets(&interactions));
                self.interactions = interactions;
                StreamEffect::Interaction(activation)
            }
            "working_memory" => {
                self.working_memory = match serde_json::from_value(message.data.clone())? {
                    MemoryPayload::List(items) => items,
                    MemoryPayload::Batch(b) => b.items,
                };
                StreamEffect::WorkingMemory(self.working_memory.len())
            }
            _ => StreamEffect::Observed,
        };
        self.last_event = Some(message.clone());
        Ok(effect)
    }

    /// Fire the clear timeout if due. Returns true if the set was cleared.
    pub fn tick(&mut self, now: Duration) -> bool {
        if self.clear.fire(now).is_some() {
            self.active.clear();
            true
        } else {
            false
        }
    }

    pub fn active(&self) -> &[String] {
        &self.active
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.active.iter().any(|a| a == id)
    }

    /// When the active set will clear, if lit.
    pub fn clears_at(&self) -> Option<Duration> {
        self.clear.due()
    }

    /// Edges of the most recent interaction batch. They outlive the active
    /// set's display window, like the rest of the latest response.
    pub fn connections(&self) -> Vec<Connection> {
        connections(&self.interactions)
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn working_memory(&self) -> &[WorkingMemoryItem] {
        &self.working_memory
    }

    pub fn latest(&self) -> Option<&ProcessResponse> {
        self.latest.as_ref()
    }

    pub fn last_event(&self) -> Option<&StreamMessage> {
        self.last_event.as_ref()
    }

    pub fn metrics(&self) -> DisplayMetrics {
        let latest = self.latest.as_ref();
        let ms = latest.map(|r| r.processing_time_ms);
        DisplayMetrics {
            processing_time_ms: ms,
            latency_bucket: ms.map(LatencyBucket::classify),
            latency_progress: ms.map(latency_progress).unwrap_or(0.0),
            confidence: latest.map(|r| r.metacognition.confidence),
            emotional_intensity: latest.map(|r| r.emotional_state.intensity),
            active_units: self.active.len(),
            total_units: catalog().len(),
            memory_count: self.working_memory.len(),
            radar: latest
                .map(|r| radar(&r.emotional_state))
                .unwrap_or_else(neutral_radar),
        }
    }
}

impl Default for ActivityProjection {
    fn default() -> Self {
        Self::new(ProjectionConfig::default())
    }
}
