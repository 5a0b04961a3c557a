//! Plain-text rendering of console state. Output goes to stdout; logs go to
//! stderr, so a rendered frame can be piped or asserted on directly.

use std::fmt::Write;

use nexus_core::time::{now_unix_secs, relative_age};
use nexus_core::{
    CameraMode, Connection, ConnectionState, ConsoleSnapshot, Emotion, HealthResponse, HealthStatus,
    LinkStatus, StatsResponse, catalog,
};

const BAR_WIDTH: usize = 20;
const MEMORY_ROWS: usize = 5;

/// Operator session settings shown in the header.
#[derive(Clone, Debug, Default)]
pub struct SessionView {
    pub emotion: Emotion,
    pub goal: String,
}

pub fn snapshot(snap: &ConsoleSnapshot, session: Option<&SessionView>) -> String {
    let mut out = String::new();
    let now = now_unix_secs();

    let _ = writeln!(out, "== nexus | {}", link_line(&snap.link));
    if let Some(session) = session {
        let goal = if session.goal.is_empty() {
            "(general query)"
        } else {
            session.goal.as_str()
        };
        let _ = writeln!(out, "emotion  {}   goal {goal}", session.emotion);
    }
    if snap.is_processing {
        let _ = writeln!(out, "...      processing ({} in flight)", snap.in_flight);
    }
    if let Some(err) = &snap.error {
        let _ = writeln!(out, "!        {err}   (:dismiss to clear)");
    }

    let active = if snap.active.is_empty() {
        "-".to_string()
    } else {
        snap.active
            .iter()
            .map(|u| match u.name {
                Some(name) => format!("{} {name} {}", u.id, u.color),
                None => format!("{} {}", u.id, u.color),
            })
            .collect::<Vec<_>>()
            .join(", ")
    };
    let _ = writeln!(out, "active   {active}");
    let _ = writeln!(out, "flow     {}", flow(&snap.connections));

    let m = &snap.metrics;
    match (m.processing_time_ms, m.latency_bucket) {
        (Some(ms), Some(bucket)) => {
            let _ = writeln!(
                out,
                "latency  {ms:.1} ms [{}] {} {:.0}%",
                bucket.label(),
                bar(m.latency_progress),
                m.latency_progress
            );
        }
        _ => {
            let _ = writeln!(out, "latency  -");
        }
    }
    let _ = writeln!(
        out,
        "metrics  confidence {}   intensity {}   units {}/{}   memories {}",
        percent(m.confidence),
        percent(m.emotional_intensity),
        m.active_units,
        m.total_units,
        m.memory_count
    );
    let radar = m
        .radar
        .iter()
        .map(|a| format!("{} {:.0}", a.axis, a.value))
        .collect::<Vec<_>>()
        .join("  ");
    let _ = writeln!(out, "radar    {radar}");

    if let Some(vision) = &snap.future_vision {
        let _ = writeln!(
            out,
            "vision   {} (p={:.2}, {})",
            vision.scenario, vision.success_probability, vision.time_horizon
        );
    }

    if !snap.history.is_empty() {
        let _ = writeln!(out, "history");
        for entry in &snap.history {
            let age = relative_age(&entry.timestamp, now).unwrap_or_else(|| "-".to_string());
            let _ = writeln!(
                out,
                "  {age:>8}  {:>7.1} ms {:<8}  {}",
                entry.processing_time_ms,
                entry.bucket().label(),
                entry.query_excerpt
            );
        }
    }

    if !snap.working_memory.is_empty() {
        let _ = writeln!(out, "memory");
        for item in snap.working_memory.iter().take(MEMORY_ROWS) {
            let band = format!("{:?}", item.salience_band()).to_lowercase();
            let _ = writeln!(out, "  [{band:<6}] {}", item.content);
        }
    }

    let view = snap.viewpoint;
    let mode = match snap.camera_mode {
        CameraMode::IdleOrbit => "orbit",
        CameraMode::Animating => "moving",
    };
    let _ = writeln!(
        out,
        "camera   {mode} at ({:.2}, {:.2}, {:.2}) looking at ({:.2}, {:.2}, {:.2})",
        view.position.x,
        view.position.y,
        view.position.z,
        view.look_at.x,
        view.look_at.y,
        view.look_at.z
    );
    out
}

fn flow(connections: &[Connection]) -> String {
    if connections.is_empty() {
        return "-".to_string();
    }
    connections
        .iter()
        .map(|c| format!("{} -> {} {}", c.from, c.to, c.color))
        .collect::<Vec<_>>()
        .join(", ")
}

fn link_line(link: &LinkStatus) -> String {
    let stream = if link.gave_up {
        "stream disconnected (:reconnect to retry)".to_string()
    } else {
        match link.stream {
            ConnectionState::Closed if link.reconnect_attempt > 0 => {
                format!("stream closed, retry {}", link.reconnect_attempt)
            }
            state => format!("stream {state}"),
        }
    };
    let backend = match link.health {
        HealthStatus::Loading => "backend ?",
        HealthStatus::Healthy => "backend healthy",
        HealthStatus::Degraded => "backend degraded",
        HealthStatus::Unreachable => "backend unreachable",
    };
    format!("{stream} | {backend}")
}

fn percent(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.0}%", v * 100.0),
        None => "-".to_string(),
    }
}

fn bar(progress: f64) -> String {
    let filled = ((progress / 100.0) * BAR_WIDTH as f64).round() as usize;
    let filled = filled.min(BAR_WIDTH);
    format!("{}{}", "#".repeat(filled), ".".repeat(BAR_WIDTH - filled))
}

pub fn units() -> String {
    let mut out = String::new();
    for unit in catalog().iter() {
        let _ = writeln!(
            out,
            "{:<8} {:<24} {:<22} {}",
            unit.id, unit.name, unit.region, unit.color
        );
    }
    out
}

pub fn health(health: &HealthResponse) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "status:      {}", health.status);
    let _ = writeln!(out, "version:     {}", health.version);
    let _ = writeln!(out, "agent:       {}", health.agent_id);
    let _ = writeln!(out, "database:    {}", health.database);
    let _ = writeln!(out, "redis:       {}", health.redis);
    let _ = writeln!(out, "queue_depth: {}", health.queue_depth);
    out
}

pub fn stats(stats: &StatsResponse) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "episodes:    {}", stats.total_episodes);
    let _ = writeln!(out, "queries:     {}", stats.total_queries);
    let _ = writeln!(out, "avg_latency: {:.1} ms", stats.avg_processing_time_ms);
    let _ = writeln!(out, "active:      {}/{}", stats.active_labs, stats.labs.len());
    for unit in &stats.labs {
        let invocations = unit
            .total_invocations
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "  {:<8} {:<24} {:?} ({invocations})",
            unit.id, unit.name, unit.status
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_core::Vec3;

    #[test]
    fn test_bar_bounds() {
        assert_eq!(bar(0.0), ".".repeat(BAR_WIDTH));
        assert_eq!(bar(100.0), "#".repeat(BAR_WIDTH));
        assert_eq!(bar(42.0).matches('#').count(), 8);
    }

    #[test]
    fn test_link_line_states() {
        let mut link = LinkStatus::default();
        assert_eq!(link_line(&link), "stream closed | backend ?");

        link.reconnect_attempt = 2;
        assert_eq!(link_line(&link), "stream closed, retry 2 | backend ?");

        link.gave_up = true;
        link.health = HealthStatus::Healthy;
        assert!(link_line(&link).starts_with("stream disconnected"));
    }

    #[test]
    fn test_flow_lists_edges() {
        assert_eq!(flow(&[]), "-");
        let edge = Connection {
            from: "LAB_001".to_string(),
            to: "LAB_009".to_string(),
            color: "#FF3864",
            from_pos: Vec3::new(-1.5, -0.5, 1.0),
            to_pos: Vec3::new(0.0, -1.5, 0.5),
        };
        assert_eq!(flow(&[edge]), "LAB_001 -> LAB_009 #FF3864");
    }

    #[test]
    fn test_units_lists_catalog() {
        let text = units();
        assert_eq!(text.lines().count(), 9);
        assert!(text.contains("LAB_011  Working Memory"));
    }
}
