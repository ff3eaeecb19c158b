// THEORY:
// The `frame` module holds the "dumb" data containers at the bottom of the
// pipeline: a single grayscale raster (`Frame`) and the sequence-level
// metadata (`FrameMeta`) every later stage derives its timing from.
//
// Key architectural principles:
// 1.  **Luma-only analysis**: Motion detection runs on perceived brightness.
//     Color adds nothing to "did this pixel move" and tripling the state of
//     the background model would triple its cost, so RGBA input is collapsed
//     to a Rec. 601 luma byte on ingestion.
// 2.  **Flat buffers**: A frame is a `width * height` `Vec<u8>` in row-major
//     order, matching how sources hand us decoded rasters and keeping the
//     per-pixel loops in the detector cache-friendly.
// 3.  **Metadata as contract**: `FrameMeta` is validated once, up front.
//     Total duration (`total_frames / fps`) is the anchor for the fixed
//     timeline length, so a zero frame rate or zero dimensions is fatal
//     before any frame is touched.

use crate::error::PipelineError;

/// Sequence-level metadata supplied by a frame source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameMeta {
    /// Width of every frame in pixels.
    pub width: u32,
    /// Height of every frame in pixels.
    pub height: u32,
    /// Frames per second of the original video.
    pub fps: f64,
    /// Total number of frames the source will yield.
    pub total_frames: u64,
}

impl FrameMeta {
    /// Rejects metadata the pipeline cannot derive a timeline from.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.width == 0 || self.height == 0 {
            return Err(PipelineError::Source(format!(
                "frame dimensions must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if !self.fps.is_finite() || self.fps <= 0.0 {
            return Err(PipelineError::Source(format!(
                "frame rate must be positive, got {}",
                self.fps
            )));
        }
        Ok(())
    }

    /// Nominal duration of the whole sequence in milliseconds.
    pub fn duration_ms(&self) -> f64 {
        self.total_frames as f64 / self.fps * 1000.0
    }

    /// Duration of a single frame in milliseconds.
    pub fn frame_ms(&self) -> f64 {
        1000.0 / self.fps
    }
}

/// A single grayscale raster, row-major, one luma byte per pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub luma: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32, luma: Vec<u8>) -> Result<Self, PipelineError> {
        if luma.len() != (width as usize) * (height as usize) {
            return Err(PipelineError::Source(format!(
                "frame buffer holds {} bytes, expected {} for {}x{}",
                luma.len(),
                width as usize * height as usize,
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            luma,
        })
    }

    /// Collapses an RGBA byte buffer to luma using Rec. 601 weights.
    pub fn from_rgba(width: u32, height: u32, rgba: &[u8]) -> Result<Self, PipelineError> {
        let expected = (width as usize) * (height as usize) * 4;
        if rgba.len() != expected {
            return Err(PipelineError::Source(format!(
                "RGBA buffer holds {} bytes, expected {} for {}x{}",
                rgba.len(),
                expected,
                width,
                height
            )));
        }
        let luma = rgba
            .chunks_exact(4)
            .map(|px| {
                let y = 0.299_f64 * px[0] as f64 + 0.587_f64 * px[1] as f64 + 0.114_f64 * px[2] as f64;
                y.round().clamp(0.0, 255.0) as u8
            })
            .collect();
        Ok(Self {
            width,
            height,
            luma,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_buffer() {
        assert!(Frame::new(10, 10, vec![0u8; 99]).is_err());
        assert!(Frame::new(10, 10, vec![0u8; 100]).is_ok());
    }

    #[test]
    fn rgba_luma_uses_rec601_weights() {
        let frame = Frame::from_rgba(1, 1, &[255, 0, 0, 255]).unwrap();
        // 0.299 * 255 = 76.245
        assert_eq!(frame.luma[0], 76);
    }

    #[test]
    fn metadata_rejects_zero_fps() {
        let meta = FrameMeta {
            width: 10,
            height: 10,
            fps: 0.0,
            total_frames: 5,
        };
        assert!(meta.validate().is_err());
    }

    #[test]
    fn duration_is_frames_over_fps() {
        let meta = FrameMeta {
            width: 1,
            height: 1,
            fps: 30.0,
            total_frames: 30,
        };
        assert!((meta.duration_ms() - 1000.0).abs() < 1e-9);
    }
}
