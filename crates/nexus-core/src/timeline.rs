use std::collections::VecDeque;

use serde::Serialize;
use uuid::Uuid;

use crate::constants::{ELEVATED_LATENCY_MS, EXCERPT_CHARS, HISTORY_CAPACITY, NOMINAL_LATENCY_MS};
use crate::model::ProcessResponse;
use crate::time::now_iso8601;

/// Color bucket for a processing time. Used wherever latency is color-coded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LatencyBucket {
    Nominal,
    Elevated,
    Degraded,
}

impl LatencyBucket {
    pub fn classify(processing_time_ms: f64) -> Self {
        if processing_time_ms < NOMINAL_LATENCY_MS {
            LatencyBucket::Nominal
        } else if processing_time_ms < ELEVATED_LATENCY_MS {
            LatencyBucket::Elevated
        } else {
            LatencyBucket::Degraded
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            LatencyBucket::Nominal => "#4ade80",
            LatencyBucket::Elevated => "#facc15",
            LatencyBucket::Degraded => "#f87171",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LatencyBucket::Nominal => "nominal",
            LatencyBucket::Elevated => "elevated",
            LatencyBucket::Degraded => "degraded",
        }
    }
}

/// Progress-bar fill for a processing time: 100 ms fills the bar.
pub fn latency_progress(processing_time_ms: f64) -> f64 {
    (processing_time_ms * 100.0 / ELEVATED_LATENCY_MS).clamp(0.0, 100.0)
}

/// Summary of one past query.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TimelineEvent {
    pub id: Uuid,
    pub timestamp: String,
    pub query_excerpt: String,
    pub processing_time_ms: f64,
    pub memory_count: usize,
    pub confidence: f64,
    pub emotion_label: String,
}

impl TimelineEvent {
    /// Derive an entry from a response. The excerpt prefers the submitted query,
    /// then the top working-memory item.
    pub fn from_response(response: &ProcessResponse, query: Option<&str>) -> Self {
        let source = query
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .or_else(|| {
                response
                    .working_memory
                    .first()
                    .map(|m| m.content.trim())
                    .filter(|c| !c.is_empty())
            });
        let query_excerpt = match source {
            Some(text) => excerpt(text, EXCERPT_CHARS),
            None => "processed query".to_string(),
        };
        let timestamp = if response.timestamp.is_empty() {
            now_iso8601()
        } else {
            response.timestamp.clone()
        };

        Self {
            id: Uuid::new_v4(),
            timestamp,
            query_excerpt,
            processing_time_ms: response.processing_time_ms,
            memory_count: response.working_memory.len(),
            confidence: response.metacognition.confidence.clamp(0.0, 1.0),
            emotion_label: response.emotional_state.current.clone(),
        }
    }

    pub fn bucket(&self) -> LatencyBucket {
        LatencyBucket::classify(self.processing_time_ms)
    }
}

/// First `max_chars` characters (not bytes) of `text`.
fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Fixed-capacity history, newest first. Entries are never mutated; pushing
/// past capacity discards the oldest.
#[derive(Clone, Debug)]
pub struct History {
    entries: VecDeque<TimelineEvent>,
    capacity: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }
}

impl History {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Insert at the head; returns the evicted entry, if any.
    pub fn push(&mut self, event: TimelineEvent) -> Option<TimelineEvent> {
        self.entries.push_front(event);
        if self.entries.len() > self.capacity {
            self.entries.pop_back()
        } else {
            None
        }
    }

    pub fn latest(&self) -> Option<&TimelineEvent> {
        self.entries.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimelineEvent> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn to_vec(&self) -> Vec<TimelineEvent> {
        self.entries.iter().cloned().collect()
    }
}
