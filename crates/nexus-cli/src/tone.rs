use nexus_core::{AudioEngine, AudioUnavailable, Tone, VoiceId};

/// Terminal stand-in for a synthesizer: every voice becomes a debug trace
/// event, so `--verbose` shows the cue timeline without an audio device.
#[derive(Debug, Default)]
pub struct TraceEngine {
    next_voice: u64,
}

impl AudioEngine for TraceEngine {
    fn start(&mut self, tone: &Tone) -> Result<VoiceId, AudioUnavailable> {
        self.next_voice += 1;
        let frequencies: Vec<f64> = tone.oscillators.iter().map(|o| o.frequency).collect();
        tracing::debug!(
            voice = self.next_voice,
            cue = ?tone.cue,
            ?frequencies,
            gain = tone.gain,
            duration_ms = tone.duration.as_millis() as u64,
            "tone start"
        );
        Ok(VoiceId(self.next_voice))
    }

    fn release(&mut self, voice: VoiceId) {
        tracing::trace!(voice = voice.0, "tone release");
    }
}
