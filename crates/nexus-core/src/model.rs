//! Wire records exchanged with the cognitive backend.
//!
//! Every response struct is lenient: missing fields fall back to their
//! defaults so partial payloads from older backends still decode.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_GOAL;

/// One directed activation between two processing units.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionEvent {
    #[serde(alias = "from_lab")]
    pub from_unit: String,
    #[serde(alias = "to_lab")]
    pub to_unit: String,
    #[serde(alias = "signal")]
    pub signal_label: String,
    pub timestamp: String,
}

/// A retrieved memory fragment. Display-only; never re-ranked.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkingMemoryItem {
    pub episode_id: String,
    pub content: String,
    pub attention: f64,
    pub salience: f64,
    pub created_at: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SalienceBand {
    High,
    Medium,
    Low,
}

impl WorkingMemoryItem {
    pub fn salience_band(&self) -> SalienceBand {
        if self.salience > 0.8 {
            SalienceBand::High
        } else if self.salience > 0.5 {
            SalienceBand::Medium
        } else {
            SalienceBand::Low
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FutureVision {
    pub scenario: String,
    pub success_probability: f64,
    pub based_on_episodes: Vec<String>,
    pub time_horizon: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmotionalState {
    pub current: String,
    pub regulated: String,
    pub intensity: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metacognition {
    pub confidence: f64,
    pub reasoning: String,
    pub calibration_score: f64,
}

/// Result of `POST /brain/process`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessResponse {
    pub success: bool,
    pub working_memory: Vec<WorkingMemoryItem>,
    pub predictions: Vec<String>,
    pub future_vision: Option<FutureVision>,
    pub emotional_state: EmotionalState,
    pub interactions: Vec<InteractionEvent>,
    pub metacognition: Metacognition,
    pub processing_time_ms: f64,
    pub timestamp: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryContext {
    pub current_emotion: String,
    pub goal: String,
}

/// Body of `POST /brain/process`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProcessRequest {
    pub query: String,
    pub context: QueryContext,
}

impl ProcessRequest {
    pub fn new(query: &str, emotion: Emotion, goal: &str) -> Self {
        let goal = goal.trim();
        Self {
            query: query.to_string(),
            context: QueryContext {
                current_emotion: emotion.to_string(),
                goal: if goal.is_empty() {
                    DEFAULT_GOAL.to_string()
                } else {
                    goal.to_string()
                },
            },
        }
    }
}

/// Result of `GET /health`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub agent_id: String,
    pub database: String,
    pub redis: String,
    pub queue_depth: u64,
    pub timestamp: String,
}

impl HealthResponse {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitActivity {
    #[default]
    Active,
    Inactive,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitStatus {
    pub id: String,
    pub name: String,
    pub status: UnitActivity,
    pub last_processed: Option<String>,
    pub total_invocations: Option<u64>,
}

/// Result of `GET /stats`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsResponse {
    pub total_episodes: u64,
    pub total_queries: u64,
    pub avg_processing_time_ms: f64,
    #[serde(alias = "active_units")]
    pub active_labs: u64,
    #[serde(alias = "units")]
    pub labs: Vec<UnitStatus>,
}

/// One frame on the live stream channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StreamMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub timestamp: String,
}

/// Stream channel lifecycle as seen by the console.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Open,
    #[default]
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Open => write!(f, "open"),
            ConnectionState::Closed => write!(f, "closed"),
        }
    }
}

/// Emotional context attached to a submitted query.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    #[default]
    Focused,
    Curious,
    Stressed,
    Calm,
}

impl Emotion {
    pub const ALL: [Emotion; 4] = [
        Emotion::Focused,
        Emotion::Curious,
        Emotion::Stressed,
        Emotion::Calm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Focused => "focused",
            Emotion::Curious => "curious",
            Emotion::Stressed => "stressed",
            Emotion::Calm => "calm",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEmotion(pub String);

impl fmt::Display for UnknownEmotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown emotion '{}' (expected focused, curious, stressed or calm)",
            self.0
        )
    }
}

impl std::error::Error for UnknownEmotion {}

impl FromStr for Emotion {
    type Err = UnknownEmotion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Emotion::ALL
            .into_iter()
            .find(|e| e.as_str() == lower)
            .ok_or_else(|| UnknownEmotion(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interaction_accepts_backend_aliases() {
        let ev: InteractionEvent = serde_json::from_str(
            r#"{"from_lab":"INPUT","to_lab":"LAB_001","signal":"query",
                "timestamp":"2026-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(ev.from_unit, "INPUT");
        assert_eq!(ev.to_unit, "LAB_001");
        assert_eq!(ev.signal_label, "query");

        let ev: InteractionEvent =
            serde_json::from_str(r#"{"from_unit":"U7","to_unit":"U9"}"#).unwrap();
        assert_eq!(ev.to_unit, "U9");
        assert!(ev.timestamp.is_empty());
    }

    #[test]
    fn test_partial_response_decodes() {
        let resp: ProcessResponse = serde_json::from_str(
            r#"{"interactions":[{"from_unit":"INPUT","to_unit":"U7"}],"processing_time_ms":42}"#,
        )
        .unwrap();
        assert_eq!(resp.interactions.len(), 1);
        assert_eq!(resp.processing_time_ms, 42.0);
        assert!(resp.working_memory.is_empty());
        assert!(resp.future_vision.is_none());
    }

    #[test]
    fn test_stream_message_requires_type() {
        assert!(serde_json::from_str::<StreamMessage>(r#"{"data":{}}"#).is_err());
        let msg: StreamMessage =
            serde_json::from_str(r#"{"type":"ping","data":{"n":1},"timestamp":"t"}"#).unwrap();
        assert_eq!(msg.kind, "ping");
        assert_eq!(msg.data["n"], 1);
    }

    #[test]
    fn test_request_default_goal() {
        let req = ProcessRequest::new("hello", Emotion::Curious, "  ");
        assert_eq!(req.context.goal, DEFAULT_GOAL);
        assert_eq!(req.context.current_emotion, "curious");

        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["context"]["current_emotion"], "curious");
    }

    #[test]
    fn test_emotion_parse() {
        assert_eq!("Calm".parse::<Emotion>().unwrap(), Emotion::Calm);
        assert!("furious".parse::<Emotion>().is_err());
    }

    #[test]
    fn test_salience_band() {
        let mut item = WorkingMemoryItem {
            salience: 0.9,
            ..Default::default()
        };
        assert_eq!(item.salience_band(), SalienceBand::High);
        item.salience = 0.8;
        assert_eq!(item.salience_band(), SalienceBand::Medium);
        item.salience = 0.2;
        assert_eq!(item.salience_band(), SalienceBand::Low);
    }

    #[test]
    fn test_stats_unit_status() {
        let stats: StatsResponse = serde_json::from_str(
            r#"{"total_queries":3,"labs":[{"id":"LAB_001","name":"x","status":"inactive"}]}"#,
        )
        .unwrap();
        assert_eq!(stats.total_queries, 3);
        assert_eq!(stats.labs[0].status, UnitActivity::Inactive);
    }
}
