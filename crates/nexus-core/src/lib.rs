//! Nexus console presentation engine.
//!
//! Turns responses and stream events from the cognitive backend into display
//! state: which processing units are lit, a bounded query history, a camera
//! viewpoint that glides between targets, and a queue of audio cues.
//!
//! No network or file I/O. Every time-dependent call takes `now`, the elapsed
//! time since the console started, so timers and animation run
//! deterministically under test and follow whatever clock the caller owns.
//! The one ambient read is the wall clock, used to stamp a history entry when
//! the backend sends a response without a timestamp.

pub mod audio;
pub mod camera;
pub mod catalog;
pub mod constants;
pub mod coordinator;
pub mod emotion;
pub mod model;
pub mod projection;
pub mod schedule;
pub mod time;
pub mod timeline;

pub use audio::{
    AudioConfig, AudioEngine, AudioScheduler, AudioUnavailable, Cue, Lowpass, Oscillator, Tone,
    Tremolo, VoiceId, Waveform,
};
pub use camera::{
    CameraAnimator, CameraConfig, CameraMode, CompletionCallback, Vec3, ViewpointState,
    ease_out_cubic,
};
pub use catalog::{Catalog, ProcessingUnit, catalog};
pub use coordinator::{
    ActiveUnit, ConsoleSnapshot, Coordinator, CoordinatorConfig, HealthStatus, LinkStatus,
    PendingQuery, RequestFailure, Submission, Ticket,
};
pub use emotion::{RadarAxis, neutral_radar, radar};
pub use model::{
    ConnectionState, Emotion, EmotionalState, FutureVision, HealthResponse, InteractionEvent,
    Metacognition, ProcessRequest, ProcessResponse, QueryContext, SalienceBand, StatsResponse,
    StreamMessage, UnitActivity, UnitStatus, UnknownEmotion, WorkingMemoryItem,
};
pub use projection::{
    Activation, ActivityProjection, Connection, DisplayMetrics, ProjectionConfig, StreamEffect,
    connections, distinct_targets,
};
pub use schedule::{Deadline, TimerQueue};
pub use timeline::{History, LatencyBucket, TimelineEvent, latency_progress};
