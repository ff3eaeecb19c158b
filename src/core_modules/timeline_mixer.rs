// THEORY:
// The `timeline_mixer` owns the single mutable audio buffer of the mixing
// stage and composites every tone segment onto it.
//
// Key architectural principles:
// 1.  **Fixed-length timeline**: The buffer is sized exactly once, from
//     `round(total_frames / fps * 1000)` ms at the configured sample rate,
//     and never resized. However many (or few) detections occur, the output
//     duration is the video's duration.
// 2.  **Absolute-time overlay**: Each segment is additively mixed at its own
//     absolute offset (`frame_index * 1000 / fps`), the discipline chosen
//     over sequential append-with-crossfade. Append drifts from the nominal
//     duration as rounding accumulates and forces strictly ordered
//     placement; absolute overlay keeps the length invariant exact and lets
//     segments arrive in any order. A segment running past the buffer end is
//     clipped at the boundary, keeping every written sample inside
//     [0, timeline_len].
// 3.  **Bounded overlap gain**: Every tone is attenuated by a fixed per-tone
//     gain (default -6 dB) so a handful of simultaneous tones stays clear of
//     full scale. The attenuation is intentionally independent of how many
//     tones overlap; see DESIGN.md.
// 4.  **Ambient bed once**: `finalize` consumes the mixer, overlays one
//     low-frequency low-gain sine across the entire buffer (default 80 Hz at
//     -20 dB) and yields the finished samples. Consuming `self` makes a
//     second bed application unrepresentable.

use crate::core_modules::tone_synthesizer::ToneSegment;
use std::f64::consts::PI;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct MixerConfig {
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Attenuation applied to every placed tone, in dB.
    pub tone_gain_db: f64,
    /// Ambient bed frequency in Hz.
    pub ambient_freq: f64,
    /// Ambient bed gain in dB.
    pub ambient_gain_db: f64,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            tone_gain_db: -6.0,
            ambient_freq: 80.0,
            ambient_gain_db: -20.0,
        }
    }
}

fn db_to_linear(db: f64) -> f32 {
    10f64.powf(db / 20.0) as f32
}

/// A finished, fixed-length mono audio buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    /// Nominal length in milliseconds, fixed at pipeline start.
    pub length_ms: u64,
}

/// The mixing stage's single exclusively-owned buffer.
pub struct TimelineMixer {
    config: MixerConfig,
    /// Timeline length in milliseconds, fixed at construction.
    length_ms: u64,
    samples: Vec<f32>,
}

impl TimelineMixer {
    /// Sizes the timeline from the nominal video duration. `duration_ms` is
    /// rounded to whole milliseconds before sizing, so the length is
    /// independent of later placements.
    pub fn new(duration_ms: f64, config: MixerConfig) -> Self {
        let length_ms = duration_ms.round() as u64;
        let num_samples =
            (length_ms as f64 / 1000.0 * config.sample_rate as f64).round() as usize;
        Self {
            config,
            length_ms,
            samples: vec![0.0; num_samples],
        }
    }

    pub fn length_ms(&self) -> u64 {
        self.length_ms
    }

    pub fn len_samples(&self) -> usize {
        self.samples.len()
    }

    /// Additively mixes one segment at its absolute offset, applying the
    /// per-tone gain. Samples past the timeline end are dropped.
    pub fn place(&mut self, segment: &ToneSegment) {
        let gain = db_to_linear(self.config.tone_gain_db);
        let start =
            (segment.start_offset_ms / 1000.0 * self.config.sample_rate as f64).round() as usize;
        if start >= self.samples.len() {
            return;
        }

        let available = self.samples.len() - start;
        let take = segment.samples.len().min(available);
        for (i, &sample) in segment.samples[..take].iter().enumerate() {
            self.samples[start + i] += sample * gain;
        }
        debug!(
            frame = segment.frame_index,
            offset_ms = segment.start_offset_ms,
            samples = take,
            "placed tone segment"
        );
    }

    /// Overlays the ambient bed across the whole buffer, exactly once, and
    /// yields the finished timeline.
    pub fn finalize(mut self) -> Timeline {
        let gain = db_to_linear(self.config.ambient_gain_db);
        let step = 2.0 * PI * self.config.ambient_freq / self.config.sample_rate as f64;
        for (n, sample) in self.samples.iter_mut().enumerate() {
            *sample += (step * n as f64).sin() as f32 * gain;
        }
        Timeline {
            samples: self.samples,
            sample_rate: self.config.sample_rate,
            length_ms: self.length_ms,
        }
    }
}
