// THEORY:
// The `tone_synthesizer` renders one tone segment per detection: a pure sine
// at the mapped frequency, optionally softened by a one-pole low-pass and
// bracketed by short linear fades so segment edges never click. Rendering is
// deterministic - the same parameters and length always yield bit-identical
// samples - which is what makes the whole pipeline reproducible and lets the
// parallel renderer match the sequential one byte for byte.
//
// The fade length follows the frame period: min(frame_ms / 2, 50 ms). At
// normal frame rates that is the half-frame crossfade window; the 50 ms cap
// keeps long duration-mapped tones from smearing.

use crate::core_modules::coordinate_mapper::SoundParams;
use std::f64::consts::PI;

/// Hard cap on the edge fade length.
const MAX_FADE_MS: f64 = 50.0;

/// Rendered audio for one detection, tagged with where it belongs on the
/// timeline.
#[derive(Debug, Clone)]
pub struct ToneSegment {
    pub frame_index: u64,
    pub start_offset_ms: f64,
    pub samples: Vec<f32>,
}

#[derive(Debug, Clone, Copy)]
pub struct SynthConfig {
    /// Output sample rate in Hz. Explicit, never a library default.
    pub sample_rate: u32,
    /// One-pole low-pass cutoff in Hz. `None` renders the raw sine.
    pub lowpass_cutoff_hz: Option<f64>,
    /// Nominal frame period, which bounds the edge fades.
    pub frame_ms: f64,
}

pub struct ToneSynthesizer {
    config: SynthConfig,
}

impl ToneSynthesizer {
    pub fn new(config: SynthConfig) -> Self {
        Self { config }
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    /// Renders one tone. `params.duration_ms` wins when present; otherwise
    /// the tone spans one frame period.
    pub fn render(&self, params: &SoundParams) -> Vec<f32> {
        let length_ms = params.duration_ms.unwrap_or(self.config.frame_ms);
        let sample_rate = self.config.sample_rate as f64;
        let num_samples = (length_ms / 1000.0 * sample_rate).round() as usize;

        let step = 2.0 * PI * params.frequency / sample_rate;
        let mut samples: Vec<f32> = (0..num_samples)
            .map(|n| (step * n as f64).sin() as f32)
            .collect();

        if let Some(cutoff) = self.config.lowpass_cutoff_hz {
            Self::low_pass_in_place(&mut samples, cutoff, sample_rate);
        }
        self.fade_in_place(&mut samples);

        samples
    }

    /// One-pole RC low-pass, run in place over the segment.
    fn low_pass_in_place(samples: &mut [f32], cutoff_hz: f64, sample_rate: f64) {
        let rc = 1.0 / (2.0 * PI * cutoff_hz);
        let dt = 1.0 / sample_rate;
        let alpha = (dt / (rc + dt)) as f32;

        let mut previous = 0.0f32;
        for sample in samples.iter_mut() {
            previous += alpha * (*sample - previous);
            *sample = previous;
        }
    }

    /// Linear fade-in and fade-out at the segment edges.
    fn fade_in_place(&self, samples: &mut [f32]) {
        let fade_ms = (self.config.frame_ms / 2.0).min(MAX_FADE_MS);
        let fade_len = ((fade_ms / 1000.0 * self.config.sample_rate as f64).round() as usize)
            .min(samples.len() / 2);
        if fade_len == 0 {
            return;
        }

        for i in 0..fade_len {
            let gain = i as f32 / fade_len as f32;
            samples[i] *= gain;
        }
        let len = samples.len();
        for i in 0..fade_len {
            let gain = i as f32 / fade_len as f32;
            samples[len - 1 - i] *= gain;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synth(lowpass: Option<f64>) -> ToneSynthesizer {
        ToneSynthesizer::new(SynthConfig {
            sample_rate: 44_100,
            lowpass_cutoff_hz: lowpass,
            frame_ms: 1000.0 / 30.0,
        })
    }

    fn tone(frequency: f64) -> SoundParams {
        SoundParams {
            frequency,
            duration_ms: None,
        }
    }

    #[test]
    fn segment_length_matches_frame_period() {
        let samples = synth(None).render(&tone(440.0));
        // 33.33 ms at 44.1 kHz
        assert_eq!(samples.len(), 1470);
    }

    #[test]
    fn explicit_duration_overrides_frame_period() {
        let samples = synth(None).render(&SoundParams {
            frequency: 440.0,
            duration_ms: Some(100.0),
        });
        assert_eq!(samples.len(), 4410);
    }

    #[test]
    fn render_is_deterministic() {
        let synth = synth(Some(1000.0));
        let a = synth.render(&tone(523.25));
        let b = synth.render(&tone(523.25));
        assert_eq!(a, b);
    }

    #[test]
    fn edges_are_faded_to_silence() {
        let samples = synth(None).render(&tone(440.0));
        assert_eq!(samples[0], 0.0);
        assert_eq!(*samples.last().unwrap(), 0.0);
        // Mid-segment is untouched by the fades.
        let peak = samples
            .iter()
            .fold(0.0f32, |acc, s| acc.max(s.abs()));
        assert!(peak > 0.9);
    }

    #[test]
    fn low_pass_attenuates_high_frequencies() {
        let rms = |samples: &[f32]| {
            (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
        };
        let raw = synth(None).render(&tone(8000.0));
        let soft = synth(Some(1000.0)).render(&tone(8000.0));
        assert!(rms(&soft) < rms(&raw) * 0.5);
    }
}
