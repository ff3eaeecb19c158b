// THEORY:
// The `motion_detector` module is the temporal analysis layer of the
// pipeline. It owns the only persistent mutable state of the detection
// stage: an adaptive per-pixel background model plus the previous frame used
// by the difference gate. Its job is to turn each incoming frame into a
// binary foreground mask for the spatial layer (`blob_extractor`).
//
// Key architectural principles:
// 1.  **Stateful, learning entity**: Each pixel carries a running Gaussian
//     (mean + variance) updated with an exponential learning rate. The model
//     learns the "normal" appearance of its own pixel and flags statistical
//     outliers against that history.
// 2.  **Z-score classification**: A pixel is foreground when its deviation
//     from the learned mean exceeds `foreground_sigma` standard deviations.
//     Thresholding a significance score rather than a raw delta makes the detector
//     self-calibrating per pixel: noisy pixels earn wide tolerances, stable
//     pixels stay sensitive.
// 3.  **Difference gate**: Slow lighting drift can outrun the model and read
//     as motion. An optional gate ANDs the statistical mask with a simple
//     |current - previous| threshold, so a pixel must both be an outlier AND
//     have just changed. The gate is skipped on frame 0 (no previous frame).
// 4.  **Strict sequencing**: `step` must be called frame 0..N-1 in order.
//     The model is never reset mid-run; the stage is a sequential fold and
//     is deliberately not parallel.

use crate::core_modules::frame::Frame;
use crate::error::PipelineError;
use tracing::debug;

/// Variance floor. A perfectly static pixel would otherwise learn variance 0
/// and make any change infinitely significant, including sensor noise.
const MIN_VARIANCE: f64 = 4.0;

/// Variance assigned to every pixel before the first observation.
const INITIAL_VARIANCE: f64 = 64.0;

/// Binary foreground mask for one frame, row-major, same shape as the frame.
#[derive(Debug, Clone)]
pub struct ForegroundMask {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<bool>,
}

impl ForegroundMask {
    /// Number of foreground pixels, used for per-frame diagnostics.
    pub fn foreground_count(&self) -> usize {
        self.pixels.iter().filter(|p| **p).count()
    }
}

/// Tunables for the background model and the difference gate.
#[derive(Debug, Clone, Copy)]
pub struct DetectorConfig {
    /// Exponential update rate of the per-pixel mean and variance (0..1).
    pub learning_rate: f64,
    /// How many standard deviations from the learned mean a pixel must be
    /// to classify as foreground.
    pub foreground_sigma: f64,
    /// When set, the statistical mask is ANDed with
    /// |current - previous| > threshold. `None` disables the gate.
    pub diff_threshold: Option<u8>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.05,
            foreground_sigma: 3.0,
            diff_threshold: Some(15),
        }
    }
}

/// Adaptive per-pixel background model. The only persistent mutable state in
/// the detection stage.
pub struct MotionDetector {
    width: u32,
    height: u32,
    config: DetectorConfig,
    /// Learned per-pixel mean luma.
    mean: Vec<f64>,
    /// Learned per-pixel luma variance.
    variance: Vec<f64>,
    /// The previous frame's luma, for the difference gate.
    previous: Option<Vec<u8>>,
    frames_seen: u64,
}

impl MotionDetector {
    pub fn new(width: u32, height: u32, config: DetectorConfig) -> Self {
        let len = (width as usize) * (height as usize);
        Self {
            width,
            height,
            config,
            mean: vec![0.0; len],
            variance: vec![INITIAL_VARIANCE; len],
            previous: None,
            frames_seen: 0,
        }
    }

    /// Classifies one frame against the model, then folds the frame into the
    /// model. Stateful across calls; frames must arrive in order.
    pub fn step(&mut self, frame: &Frame) -> Result<ForegroundMask, PipelineError> {
        if frame.width != self.width || frame.height != self.height {
            return Err(PipelineError::Source(format!(
                "frame {} is {}x{}, detector was built for {}x{}",
                self.frames_seen, frame.width, frame.height, self.width, self.height
            )));
        }

        let mut pixels = vec![false; self.mean.len()];

        if self.frames_seen == 0 {
            // First observation seeds the model; nothing can be foreground
            // against an empty background yet.
            for (i, &luma) in frame.luma.iter().enumerate() {
                self.mean[i] = luma as f64;
            }
        } else {
            let lr = self.config.learning_rate;
            for (i, &luma) in frame.luma.iter().enumerate() {
                let value = luma as f64;
                let delta = value - self.mean[i];
                let std_dev = self.variance[i].sqrt();
                pixels[i] = delta.abs() > self.config.foreground_sigma * std_dev;

                // Exponential update, applied after classification so the
                // current frame cannot vouch for itself.
                self.mean[i] += lr * delta;
                self.variance[i] =
                    ((1.0 - lr) * self.variance[i] + lr * delta * delta).max(MIN_VARIANCE);
            }

            if let (Some(threshold), Some(previous)) =
                (self.config.diff_threshold, self.previous.as_deref())
            {
                for (i, flag) in pixels.iter_mut().enumerate() {
                    if *flag {
                        let diff = (frame.luma[i] as i16 - previous[i] as i16).unsigned_abs();
                        *flag = diff > threshold as u16;
                    }
                }
            }
        }

        self.previous = Some(frame.luma.clone());
        self.frames_seen += 1;

        let mask = ForegroundMask {
            width: self.width,
            height: self.height,
            pixels,
        };
        debug!(
            frame = self.frames_seen - 1,
            foreground = mask.foreground_count(),
            "classified frame"
        );
        Ok(mask)
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_frame(width: u32, height: u32, luma: u8) -> Frame {
        Frame::new(width, height, vec![luma; (width * height) as usize]).unwrap()
    }

    fn detector(width: u32, height: u32) -> MotionDetector {
        MotionDetector::new(
            width,
            height,
            DetectorConfig {
                learning_rate: 0.05,
                foreground_sigma: 3.0,
                diff_threshold: None,
            },
        )
    }

    #[test]
    fn first_frame_is_all_background() {
        let mut det = detector(8, 8);
        let mask = det.step(&flat_frame(8, 8, 200)).unwrap();
        assert_eq!(mask.foreground_count(), 0);
    }

    #[test]
    fn static_scene_stays_background() {
        let mut det = detector(8, 8);
        for _ in 0..20 {
            let mask = det.step(&flat_frame(8, 8, 100)).unwrap();
            assert_eq!(mask.foreground_count(), 0);
        }
    }

    #[test]
    fn sudden_bright_region_is_foreground() {
        let mut det = detector(8, 8);
        for _ in 0..10 {
            det.step(&flat_frame(8, 8, 50)).unwrap();
        }
        let mut luma = vec![50u8; 64];
        luma[0] = 255;
        luma[1] = 255;
        let mask = det.step(&Frame::new(8, 8, luma).unwrap()).unwrap();
        assert!(mask.pixels[0]);
        assert!(mask.pixels[1]);
        assert!(!mask.pixels[10]);
    }

    #[test]
    fn difference_gate_suppresses_settled_change() {
        // With the gate on, a pixel that stopped changing goes quiet even if
        // the statistical model still considers it an outlier.
        let mut det = MotionDetector::new(
            4,
            1,
            DetectorConfig {
                learning_rate: 0.01,
                foreground_sigma: 3.0,
                diff_threshold: Some(15),
            },
        );
        for _ in 0..10 {
            det.step(&flat_frame(4, 1, 20)).unwrap();
        }
        // Jump, then hold: the jump frame passes the gate, the hold does not.
        let jump = det.step(&flat_frame(4, 1, 220)).unwrap();
        assert_eq!(jump.foreground_count(), 4);
        let hold = det.step(&flat_frame(4, 1, 220)).unwrap();
        assert_eq!(hold.foreground_count(), 0);
    }

    #[test]
    fn mismatched_frame_is_fatal() {
        let mut det = detector(8, 8);
        assert!(det.step(&flat_frame(4, 4, 0)).is_err());
    }
}
