//! Six-axis emotional radar derived from the backend's emotional state.

use serde::Serialize;

use crate::model::EmotionalState;

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct RadarAxis {
    pub axis: &'static str,
    pub value: f64,
}

/// Baseline shown before any response has arrived.
pub fn neutral_radar() -> [RadarAxis; 6] {
    axes([50.0; 6])
}

/// Map an emotional state onto the radar. The current emotion raises its own
/// axis; intensity drives the confidence axis; stress lowers clarity.
pub fn radar(state: &EmotionalState) -> [RadarAxis; 6] {
    let current = state.current.as_str();
    let level = match current {
        "calm" => 80.0,
        "focused" => 90.0,
        "curious" => 70.0,
        "stressed" => 40.0,
        "excited" => 85.0,
        _ => 50.0,
    };
    let pick = |name: &str, otherwise: f64| if current == name { level } else { otherwise };

    axes([
        pick("calm", 50.0),
        pick("focused", 50.0),
        pick("curious", 60.0),
        (state.intensity * 100.0).clamp(0.0, 100.0),
        pick("excited", 50.0),
        if current == "stressed" { 100.0 - level } else { 70.0 },
    ])
}

fn axes(values: [f64; 6]) -> [RadarAxis; 6] {
    const NAMES: [&str; 6] = ["calm", "focus", "curiosity", "confidence", "energy", "clarity"];
    let mut out = [RadarAxis { axis: "", value: 0.0 }; 6];
    for (slot, (axis, value)) in out.iter_mut().zip(NAMES.into_iter().zip(values)) {
        *slot = RadarAxis { axis, value };
    }
    out
}
