//! Audio cue scheduling.
//!
//! Each trigger builds a self-contained [`Tone`], starts it on the engine as a
//! fresh voice and schedules that voice's release at the end of the tone. Voices
//! are never shared between triggers, so re-triggering before a previous tone
//! ends simply overlaps two independent voices, each with its own release.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::constants::DEFAULT_VOLUME;
use crate::schedule::TimerQueue;

/// Envelope ratios of the master volume.
const PULSE_GAIN: f64 = 0.3;
const CHIME_GAIN: f64 = 0.2;
const HUM_GAIN: f64 = 0.1;
const HUM_TREMOLO_DEPTH: f64 = 0.05;

const PULSE_CUTOFF_HZ: f64 = 2000.0;
const PULSE_Q: f64 = 10.0;

const ARPEGGIO_HZ: [f64; 5] = [220.0, 330.0, 440.0, 550.0, 660.0];
const ARPEGGIO_STEP: Duration = Duration::from_millis(50);
const ARPEGGIO_NOTE: Duration = Duration::from_millis(150);

const ACTIVATION_BASE_HZ: f64 = 200.0;
const ACTIVATION_STEP_HZ: f64 = 50.0;
const ACTIVATION_NOTE: Duration = Duration::from_millis(200);

const CHIME_FROM_HZ: f64 = 800.0;
const CHIME_TO_HZ: f64 = 400.0;
const CHIME_LENGTH: Duration = Duration::from_millis(300);

const HUM_HZ: [f64; 2] = [60.0, 90.0];
const HUM_TREMOLO_HZ: f64 = 0.5;
const HUM_FADE: Duration = Duration::from_secs(1);

const ZOOM_HZ: f64 = 660.0;
const ZOOM_LENGTH: Duration = Duration::from_millis(200);
const RESET_HZ: f64 = 330.0;
const RESET_LENGTH: Duration = Duration::from_millis(250);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    Sine,
    Triangle,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Oscillator {
    pub waveform: Waveform,
    pub frequency: f64,
    /// Exponential glide target reached at the end of the tone
    pub glide_to: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Lowpass {
    pub cutoff_hz: f64,
    pub q: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Tremolo {
    pub rate_hz: f64,
    pub depth: f64,
}

/// The domain event a tone renders.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Cue {
    Pulse,
    ProcessingStart,
    UnitActivation(usize),
    ConnectionChime,
    AmbientHum,
    CameraZoom,
    CameraReset,
}

/// Everything an engine needs to synthesize one cue. Gain already includes
/// the master volume; it decays to silence over `duration`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Tone {
    pub cue: Cue,
    pub oscillators: Vec<Oscillator>,
    pub gain: f64,
    pub duration: Duration,
    pub lowpass: Option<Lowpass>,
    pub tremolo: Option<Tremolo>,
}

/// Handle to one engine voice (its oscillators, filter and gain nodes).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VoiceId(pub u64);

/// The engine could not start a voice (no output device, closed context).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioUnavailable(pub String);

impl fmt::Display for AudioUnavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "audio unavailable: {}", self.0)
    }
}

impl std::error::Error for AudioUnavailable {}

/// Synthesis backend. `start` allocates a fresh voice; `release` frees it.
pub trait AudioEngine: Send {
    fn start(&mut self, tone: &Tone) -> Result<VoiceId, AudioUnavailable>;
    fn release(&mut self, voice: VoiceId);
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AudioConfig {
    pub enabled: bool,
    /// Master volume, clamped to [0, 1]
    pub volume: f64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            volume: DEFAULT_VOLUME,
        }
    }
}

pub struct AudioScheduler {
    engine: Option<Box<dyn AudioEngine>>,
    enabled: bool,
    volume: f64,
    releases: TimerQueue<VoiceId>,
    deferred: TimerQueue<Tone>,
}

impl AudioScheduler {
    /// `engine: None` models an environment without audio output: every
    /// trigger becomes a no-op.
    pub fn new(config: AudioConfig, engine: Option<Box<dyn AudioEngine>>) -> Self {
        Self {
            engine,
            enabled: config.enabled,
            volume: config.volume.clamp(0.0, 1.0),
            releases: TimerQueue::new(),
            deferred: TimerQueue::new(),
        }
    }

    /// A scheduler that never makes a sound.
    pub fn silent() -> Self {
        Self::new(
            AudioConfig {
                enabled: false,
                volume: 0.0,
            },
            None,
        )
    }

    pub fn is_active(&self) -> bool {
        self.enabled && self.engine.is_some()
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.deferred.drain_all();
        }
    }

    // --- Triggers ---

    pub fn pulse(&mut self, now: Duration, frequency: f64, duration: Duration) {
        let tone = self.pulse_tone(Cue::Pulse, frequency, duration);
        self.play(now, tone);
    }

    /// Short ascending arpeggio, one note every 50 ms.
    pub fn processing_start(&mut self, now: Duration) {
        for (i, freq) in ARPEGGIO_HZ.into_iter().enumerate() {
            let tone = self.pulse_tone(Cue::ProcessingStart, freq, ARPEGGIO_NOTE);
            if i == 0 {
                self.play(now, tone);
            } else {
                self.defer(now + ARPEGGIO_STEP * i as u32, tone);
            }
        }
    }

    pub fn unit_activation(&mut self, now: Duration, index: usize) {
        let freq = ACTIVATION_BASE_HZ + index as f64 * ACTIVATION_STEP_HZ;
        let tone = self.pulse_tone(Cue::UnitActivation(index), freq, ACTIVATION_NOTE);
        self.play(now, tone);
    }

    /// Falling triangle chirp marking a completed request.
    pub fn connection_chime(&mut self, now: Duration) {
        let tone = Tone {
            cue: Cue::ConnectionChime,
            oscillators: vec![Oscillator {
                waveform: Waveform::Triangle,
                frequency: CHIME_FROM_HZ,
                glide_to: Some(CHIME_TO_HZ),
            }],
            gain: self.volume * CHIME_GAIN,
            duration: CHIME_LENGTH,
            lowpass: None,
            tremolo: None,
        };
        self.play(now, tone);
    }

    /// Low two-oscillator drone held for `hold`, then faded out over one second.
    pub fn ambient_hum(&mut self, now: Duration, hold: Duration) {
        let tone = self.hum_tone(hold);
        self.play(now, tone);
    }

    /// Fire-and-forget hum starting `delay` from now.
    pub fn ambient_hum_after(&mut self, now: Duration, delay: Duration, hold: Duration) {
        let tone = self.hum_tone(hold);
        self.defer(now + delay, tone);
    }

    pub fn camera_zoom(&mut self, now: Duration) {
        let tone = self.pulse_tone(Cue::CameraZoom, ZOOM_HZ, ZOOM_LENGTH);
        self.play(now, tone);
    }

    pub fn camera_reset(&mut self, now: Duration) {
        let tone = self.pulse_tone(Cue::CameraReset, RESET_HZ, RESET_LENGTH);
        self.play(now, tone);
    }

    // --- Clock ---

    /// Start deferred cues and release voices whose tones have ended.
    pub fn tick(&mut self, now: Duration) {
        for tone in self.deferred.drain_due(now) {
            self.play(now, tone);
        }
        let due = self.releases.drain_due(now);
        if let Some(engine) = self.engine.as_mut() {
            for voice in due {
                engine.release(voice);
            }
        }
    }

    /// Voices started and not yet released.
    pub fn live_voices(&self) -> usize {
        self.releases.len()
    }

    /// Cues waiting for their start time.
    pub fn pending_cues(&self) -> usize {
        self.deferred.len()
    }

    pub fn next_due(&self) -> Option<Duration> {
        match (self.releases.next_due(), self.deferred.next_due()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Release every live voice and drop pending cues.
    pub fn release_all(&mut self) {
        self.deferred.drain_all();
        let voices = self.releases.drain_all();
        if let Some(engine) = self.engine.as_mut() {
            for voice in voices {
                engine.release(voice);
            }
        }
    }

    fn pulse_tone(&self, cue: Cue, frequency: f64, duration: Duration) -> Tone {
        Tone {
            cue,
            oscillators: vec![Oscillator {
                waveform: Waveform::Sine,
                frequency,
                glide_to: None,
            }],
            gain: self.volume * PULSE_GAIN,
            duration,
            lowpass: Some(Lowpass {
                cutoff_hz: PULSE_CUTOFF_HZ,
                q: PULSE_Q,
            }),
            tremolo: None,
        }
    }

    fn hum_tone(&self, hold: Duration) -> Tone {
        Tone {
            cue: Cue::AmbientHum,
            oscillators: HUM_HZ
                .into_iter()
                .map(|frequency| Oscillator {
                    waveform: Waveform::Sine,
                    frequency,
                    glide_to: None,
                })
                .collect(),
            gain: self.volume * HUM_GAIN,
            duration: hold + HUM_FADE,
            lowpass: None,
            tremolo: Some(Tremolo {
                rate_hz: HUM_TREMOLO_HZ,
                depth: self.volume * HUM_TREMOLO_DEPTH,
            }),
        }
    }

    fn defer(&mut self, at: Duration, tone: Tone) {
        if self.is_active() {
            self.deferred.push(at, tone);
        }
    }

    fn play(&mut self, now: Duration, tone: Tone) {
        if !self.enabled {
            return;
        }
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        // a voice that cannot start is simply skipped
        if let Ok(voice) = engine.start(&tone) {
            self.releases.push(now + tone.duration, voice);
        }
    }
}

impl Drop for AudioScheduler {
    fn drop(&mut self) {
        self.release_all();
    }
}

impl fmt::Debug for AudioScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioScheduler")
            .field("enabled", &self.enabled)
            .field("engine", &self.engine.is_some())
            .field("volume", &self.volume)
            .field("live_voices", &self.releases.len())
            .field("pending_cues", &self.deferred.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Start(u64, Tone),
        Release(u64),
    }

    #[derive(Clone, Default)]
    struct Recorder {
        calls: Arc<Mutex<Vec<Call>>>,
        next: u64,
        fail: bool,
    }

    impl Recorder {
        fn starts(&self) -> Vec<Tone> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter_map(|c| match c {
                    Call::Start(_, t) => Some(t.clone()),
                    _ => None,
                })
                .collect()
        }

        fn released(&self) -> Vec<u64> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter_map(|c| match c {
                    Call::Release(v) => Some(*v),
                    _ => None,
                })
                .collect()
        }
    }

    impl AudioEngine for Recorder {
        fn start(&mut self, tone: &Tone) -> Result<VoiceId, AudioUnavailable> {
            if self.fail {
                return Err(AudioUnavailable("no device".into()));
            }
            self.next += 1;
            self.calls
                .lock()
                .unwrap()
                .push(Call::Start(self.next, tone.clone()));
            Ok(VoiceId(self.next))
        }

        fn release(&mut self, voice: VoiceId) {
            self.calls.lock().unwrap().push(Call::Release(voice.0));
        }
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn scheduler(volume: f64) -> (AudioScheduler, Recorder) {
        let rec = Recorder::default();
        let sched = AudioScheduler::new(
            AudioConfig {
                enabled: true,
                volume,
            },
            Some(Box::new(rec.clone())),
        );
        (sched, rec)
    }

    #[test]
    fn test_processing_start_arpeggio() {
        let (mut s, rec) = scheduler(0.5);
        s.processing_start(ms(0));
        assert_eq!(rec.starts().len(), 1);
        assert_eq!(s.pending_cues(), 4);

        for t in (10..=200).step_by(10) {
            s.tick(ms(t));
        }
        let freqs: Vec<f64> = rec
            .starts()
            .iter()
            .map(|t| t.oscillators[0].frequency)
            .collect();
        assert_eq!(freqs, vec![220.0, 330.0, 440.0, 550.0, 660.0]);
        assert!(rec.starts().iter().all(|t| t.cue == Cue::ProcessingStart));

        s.tick(ms(400));
        assert_eq!(rec.released().len(), 5);
        assert_eq!(s.live_voices(), 0);
    }

    #[test]
    fn test_unit_activation_frequency() {
        let (mut s, rec) = scheduler(0.3);
        s.unit_activation(ms(0), 3);
        let tone = &rec.starts()[0];
        assert_eq!(tone.cue, Cue::UnitActivation(3));
        assert_eq!(tone.oscillators[0].frequency, 350.0);
        assert_relative_eq!(tone.gain, 0.09);
    }

    #[test]
    fn test_retrigger_uses_independent_voices() {
        let (mut s, rec) = scheduler(0.3);
        s.pulse(ms(0), 440.0, ms(100));
        s.pulse(ms(50), 440.0, ms(100));
        assert_eq!(s.live_voices(), 2);

        s.tick(ms(100));
        assert_eq!(rec.released(), vec![1]);
        s.tick(ms(150));
        assert_eq!(rec.released(), vec![1, 2]);
    }

    #[test]
    fn test_chime_and_hum_envelopes() {
        let (mut s, rec) = scheduler(1.0);
        s.connection_chime(ms(0));
        s.ambient_hum(ms(0), ms(2000));
        let starts = rec.starts();

        let chime = &starts[0];
        assert_eq!(chime.oscillators[0].waveform, Waveform::Triangle);
        assert_eq!(chime.oscillators[0].glide_to, Some(400.0));
        assert_relative_eq!(chime.gain, 0.2);

        let hum = &starts[1];
        assert_eq!(hum.oscillators.len(), 2);
        assert_eq!(hum.duration, ms(3000));
        assert_relative_eq!(hum.gain, 0.1);
        assert_relative_eq!(hum.tremolo.unwrap().depth, 0.05);
    }

    #[test]
    fn test_deferred_hum() {
        let (mut s, rec) = scheduler(0.3);
        s.ambient_hum_after(ms(0), ms(200), ms(2000));
        s.tick(ms(199));
        assert!(rec.starts().is_empty());
        s.tick(ms(200));
        assert_eq!(rec.starts()[0].cue, Cue::AmbientHum);
    }

    #[test]
    fn test_volume_clamped() {
        let (mut s, rec) = scheduler(4.0);
        assert_eq!(s.volume(), 1.0);
        s.pulse(ms(0), 440.0, ms(100));
        assert_relative_eq!(rec.starts()[0].gain, 0.3);
    }

    #[test]
    fn test_disabled_is_noop() {
        let rec = Recorder::default();
        let mut s = AudioScheduler::new(
            AudioConfig {
                enabled: false,
                volume: 0.3,
            },
            Some(Box::new(rec.clone())),
        );
        s.processing_start(ms(0));
        s.unit_activation(ms(0), 1);
        s.tick(ms(1000));
        assert!(rec.calls.lock().unwrap().is_empty());
        assert_eq!(s.pending_cues(), 0);
    }

    #[test]
    fn test_missing_or_failing_engine_is_noop() {
        let mut s = AudioScheduler::new(AudioConfig::default(), None);
        s.processing_start(ms(0));
        s.connection_chime(ms(0));
        s.tick(ms(1000));
        assert_eq!(s.live_voices(), 0);

        let failing = Recorder {
            fail: true,
            ..Default::default()
        };
        let mut s = AudioScheduler::new(AudioConfig::default(), Some(Box::new(failing)));
        s.pulse(ms(0), 440.0, ms(100));
        assert_eq!(s.live_voices(), 0);
    }

    #[test]
    fn test_drop_releases_live_voices() {
        let (mut s, rec) = scheduler(0.3);
        s.ambient_hum(ms(0), ms(5000));
        s.camera_zoom(ms(0));
        drop(s);
        assert_eq!(rec.released().len(), 2);
    }
}
