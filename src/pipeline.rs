// THEORY:
// The `pipeline` module is the top-level API for the sonification engine. It
// encapsulates the full stack - motion detection, blob extraction,
// coordinate mapping, tone synthesis, timeline mixing - behind a single,
// configuration-driven entry point, so an embedder only ever hands it a
// frame source and receives a finished timeline.
//
// Key architectural principles:
// 1.  **Validate before work**: `SonificationPipeline::new` rejects an
//     invalid configuration before any frame is touched. A bad frequency
//     range or a non-positive threshold never gets to waste a decode pass.
// 2.  **Strictly ordered detection**: The background model and the previous
//     frame create a hard per-frame data dependency, so the detection stage
//     is one ordered fold over frames 0..N-1. Rendering and mixing have no
//     such dependency; the parallel variant in `parallel_pipeline` exploits
//     that.
// 3.  **Injectable observability**: Progress reporting goes through the
//     `ProgressObserver` trait (plus `tracing` diagnostics), never through
//     prints interleaved with the math, so tests run silently.
// 4.  **Cooperative cancellation**: An optional shared flag is checked
//     between frames. A cancelled run yields no timeline at all rather than
//     a partial one.

use crate::core_modules::blob_extractor::{BlobExtractor, Detection, ExtractorConfig};
use crate::core_modules::coordinate_mapper::{self, MapperConfig, SoundParams};
use crate::core_modules::frame::FrameMeta;
use crate::core_modules::frame_source::FrameSource;
use crate::core_modules::motion_detector::{DetectorConfig, MotionDetector};
use crate::core_modules::timeline_mixer::{MixerConfig, TimelineMixer};
use crate::core_modules::tone_synthesizer::{SynthConfig, ToneSegment, ToneSynthesizer};
use crate::error::PipelineError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

// Re-export key data structures for the public API.
pub use crate::core_modules::blob_extractor::Blob;
pub use crate::core_modules::timeline_mixer::Timeline;

/// Configuration for the sonification pipeline, allowing for tunable
/// behavior. All recognized options live here; none of the stage tunables
/// is a hidden constant.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    // --- Detection ---
    /// Exponential update rate of the background model (0..1).
    pub learning_rate: f64,
    /// Standard deviations from the learned mean for a pixel to count as
    /// foreground.
    pub foreground_sigma: f64,
    /// Frame-difference gate threshold; `None` disables the gate.
    pub diff_threshold: Option<u8>,
    /// Minimum connected-component area, in pixels.
    pub min_blob_area: u32,
    /// Minimum distance between accepted centroids within one frame.
    pub dedup_radius: f64,

    // --- Sonification ---
    /// Frequency mapped to x = 0, in Hz.
    pub min_freq: f64,
    /// Frequency mapped to x = width, in Hz.
    pub max_freq: f64,
    /// Optional y-mapped tone duration range; both ends or neither.
    pub min_duration_ms: Option<f64>,
    pub max_duration_ms: Option<f64>,
    /// One-pole low-pass cutoff; `None` keeps the raw sine.
    pub lowpass_cutoff_hz: Option<f64>,

    // --- Mixing ---
    /// Output sample rate in Hz, explicit rather than a library default.
    pub sample_rate: u32,
    /// Per-tone overlay attenuation in dB.
    pub tone_gain_db: f64,
    /// Ambient bed frequency in Hz.
    pub ambient_freq: f64,
    /// Ambient bed gain in dB.
    pub ambient_gain_db: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.05,
            foreground_sigma: 3.0,
            diff_threshold: Some(15),
            min_blob_area: 100,
            dedup_radius: 30.0,
            min_freq: 220.0,
            max_freq: 880.0,
            min_duration_ms: None,
            max_duration_ms: None,
            lowpass_cutoff_hz: Some(1000.0),
            sample_rate: 44_100,
            tone_gain_db: -6.0,
            ambient_freq: 80.0,
            ambient_gain_db: -20.0,
        }
    }
}

impl PipelineConfig {
    /// Rejects invalid parameter ranges. Called at pipeline construction,
    /// before any frame is processed.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let fail = |msg: String| Err(PipelineError::Config(msg));

        if !(self.min_freq > 0.0) {
            return fail(format!("min_freq must be positive, got {}", self.min_freq));
        }
        if !(self.max_freq >= self.min_freq) {
            return fail(format!(
                "max_freq ({}) must be >= min_freq ({})",
                self.max_freq, self.min_freq
            ));
        }
        match (self.min_duration_ms, self.max_duration_ms) {
            (None, None) => {}
            (Some(min), Some(max)) => {
                if !(min > 0.0) {
                    return fail(format!("min_duration_ms must be positive, got {min}"));
                }
                if !(max >= min) {
                    return fail(format!(
                        "max_duration_ms ({max}) must be >= min_duration_ms ({min})"
                    ));
                }
            }
            _ => {
                return fail("min_duration_ms and max_duration_ms must be set together".to_string());
            }
        }
        if self.min_blob_area == 0 {
            return fail("min_blob_area must be positive".to_string());
        }
        if !(self.dedup_radius >= 0.0) {
            return fail(format!(
                "dedup_radius must be non-negative, got {}",
                self.dedup_radius
            ));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate < 1.0) {
            return fail(format!(
                "learning_rate must be in (0, 1), got {}",
                self.learning_rate
            ));
        }
        if !(self.foreground_sigma > 0.0) {
            return fail(format!(
                "foreground_sigma must be positive, got {}",
                self.foreground_sigma
            ));
        }
        if let Some(cutoff) = self.lowpass_cutoff_hz
            && !(cutoff > 0.0)
        {
            return fail(format!("lowpass_cutoff_hz must be positive, got {cutoff}"));
        }
        if self.sample_rate == 0 {
            return fail("sample_rate must be positive".to_string());
        }
        if !(self.ambient_freq > 0.0) {
            return fail(format!(
                "ambient_freq must be positive, got {}",
                self.ambient_freq
            ));
        }
        Ok(())
    }

    pub(crate) fn detector(&self) -> DetectorConfig {
        DetectorConfig {
            learning_rate: self.learning_rate,
            foreground_sigma: self.foreground_sigma,
            diff_threshold: self.diff_threshold,
        }
    }

    pub(crate) fn extractor(&self) -> ExtractorConfig {
        ExtractorConfig {
            min_blob_area: self.min_blob_area,
            dedup_radius: self.dedup_radius,
        }
    }

    pub(crate) fn mapper(&self) -> MapperConfig {
        MapperConfig {
            min_freq: self.min_freq,
            max_freq: self.max_freq,
            min_duration_ms: self.min_duration_ms,
            max_duration_ms: self.max_duration_ms,
        }
    }

    pub(crate) fn synth(&self, frame_ms: f64) -> SynthConfig {
        SynthConfig {
            sample_rate: self.sample_rate,
            lowpass_cutoff_hz: self.lowpass_cutoff_hz,
            frame_ms,
        }
    }

    pub(crate) fn mixer(&self) -> MixerConfig {
        MixerConfig {
            sample_rate: self.sample_rate,
            tone_gain_db: self.tone_gain_db,
            ambient_freq: self.ambient_freq,
            ambient_gain_db: self.ambient_gain_db,
        }
    }
}

/// Checkpoint callbacks for embedders; all hooks default to no-ops so tests
/// run silently.
pub trait ProgressObserver {
    /// Called once per processed frame with its detection count.
    fn on_frame(&mut self, _frame_index: u64, _detections: usize) {}
    /// Called each time a full second of video has been processed.
    fn on_second(&mut self, _seconds: u64) {}
}

/// The default observer: does nothing.
pub struct SilentObserver;
impl ProgressObserver for SilentObserver {}

/// The main, top-level struct for the sonification engine.
#[derive(Debug)]
pub struct SonificationPipeline {
    config: PipelineConfig,
    cancel: Option<Arc<AtomicBool>>,
}

impl SonificationPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            config,
            cancel: None,
        })
    }

    /// Installs a shared cancellation flag, checked between frames.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn check_cancelled(&self) -> Result<(), PipelineError> {
        if let Some(flag) = &self.cancel
            && flag.load(Ordering::Relaxed)
        {
            return Err(PipelineError::Cancelled);
        }
        Ok(())
    }

    /// Runs the detection stage alone: one ordered pass over all frames,
    /// yielding each frame's deduplicated detections. This is the sequential
    /// half shared with the parallel renderer.
    pub fn collect_detections(
        &self,
        source: &mut dyn FrameSource,
        observer: &mut dyn ProgressObserver,
    ) -> Result<(FrameMeta, Vec<Detection>), PipelineError> {
        let meta = source.meta();
        meta.validate()?;

        let mut detector = MotionDetector::new(meta.width, meta.height, self.config.detector());
        let extractor = BlobExtractor::new(self.config.extractor());
        let mut detections: Vec<Detection> = Vec::with_capacity(meta.total_frames as usize);
        let mut last_whole_second = 0u64;

        let mut frame_index: u64 = 0;
        while let Some(frame) = source.next_frame()? {
            self.check_cancelled()?;
            if frame_index >= meta.total_frames {
                return Err(PipelineError::Source(format!(
                    "source yielded more than the declared {} frames",
                    meta.total_frames
                )));
            }

            let mask = detector.step(&frame)?;
            let detection = extractor.extract(&mask);
            debug!(
                frame = frame_index,
                detections = detection.len(),
                "frame analyzed"
            );
            observer.on_frame(frame_index, detection.len());

            let seconds = ((frame_index + 1) as f64 / meta.fps) as u64;
            if seconds > last_whole_second {
                last_whole_second = seconds;
                info!(seconds, "processed video second");
                observer.on_second(seconds);
            }

            detections.push(detection);
            frame_index += 1;
        }

        if frame_index != meta.total_frames {
            return Err(PipelineError::Source(format!(
                "source yielded {frame_index} frames, metadata declared {}",
                meta.total_frames
            )));
        }
        Ok((meta, detections))
    }

    /// Maps one frame's detections to tone parameters.
    pub(crate) fn frame_params(&self, meta: &FrameMeta, detection: &Detection) -> Vec<SoundParams> {
        let mapper = self.config.mapper();
        detection
            .iter()
            .map(|blob| {
                coordinate_mapper::map(
                    blob.centroid.0,
                    blob.centroid.1,
                    meta.width,
                    meta.height,
                    &mapper,
                )
            })
            .collect()
    }

    /// Runs the whole pipeline sequentially: detect, map, render, place,
    /// finalize. Returns the finished timeline.
    pub fn run(
        &self,
        source: &mut dyn FrameSource,
        observer: &mut dyn ProgressObserver,
    ) -> Result<Timeline, PipelineError> {
        let (meta, detections) = self.collect_detections(source, observer)?;
        let synthesizer = ToneSynthesizer::new(self.config.synth(meta.frame_ms()));
        let mut mixer = TimelineMixer::new(meta.duration_ms(), self.config.mixer());

        let mut total_tones = 0u64;
        for (frame_index, detection) in detections.iter().enumerate() {
            self.check_cancelled()?;
            let start_offset_ms = frame_index as f64 * meta.frame_ms();
            for params in self.frame_params(&meta, detection) {
                let segment = ToneSegment {
                    frame_index: frame_index as u64,
                    start_offset_ms,
                    samples: synthesizer.render(&params),
                };
                mixer.place(&segment);
                total_tones += 1;
            }
        }

        let timeline = mixer.finalize();
        info!(
            frames = meta.total_frames,
            tones = total_tones,
            length_ms = timeline.length_ms,
            "sonification complete"
        );
        Ok(timeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn inverted_frequency_range_is_rejected() {
        let config = PipelineConfig {
            min_freq: 880.0,
            max_freq: 220.0,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            SonificationPipeline::new(config),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn half_open_duration_range_is_rejected() {
        let config = PipelineConfig {
            min_duration_ms: Some(50.0),
            max_duration_ms: None,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_area_threshold_is_rejected() {
        let config = PipelineConfig {
            min_blob_area: 0,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn nan_tunables_are_rejected() {
        let config = PipelineConfig {
            foreground_sigma: f64::NAN,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn nan_range_ends_are_rejected() {
        // A NaN upper bound must not slip through the ordering checks.
        let config = PipelineConfig {
            max_freq: f64::NAN,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());

        let config = PipelineConfig {
            min_duration_ms: Some(20.0),
            max_duration_ms: Some(f64::NAN),
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
