// THEORY:
// The `audio_sink` module is the output boundary. The pipeline hands over a
// finished mono `f32` buffer; encoding it is the sink's problem. `WavSink`
// writes 16-bit PCM WAV through `hound` at the pipeline's configured sample
// rate - the rate is explicit in the header written to disk, never a library
// default. A sink failure is fatal and the computed timeline is discarded;
// the encoder writes into a sibling `.part` file and only renames it onto
// the destination after a clean `finalize`, so a failed run leaves no
// partial file at the destination path.

use crate::error::PipelineError;
use std::path::{Path, PathBuf};

/// Encodes and persists a finished timeline.
pub trait AudioSink {
    fn write(&self, samples: &[f32], sample_rate: u32) -> Result<(), PipelineError>;
}

/// Mono 16-bit PCM WAV output.
pub struct WavSink {
    path: PathBuf,
}

impl WavSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn encode(path: &Path, spec: hound::WavSpec, samples: &[f32]) -> Result<(), hound::Error> {
        let mut writer = hound::WavWriter::create(path, spec)?;
        for &sample in samples {
            let clamped = sample.clamp(-1.0, 1.0);
            writer.write_sample((clamped * i16::MAX as f32) as i16)?;
        }
        writer.finalize()
    }
}

impl AudioSink for WavSink {
    fn write(&self, samples: &[f32], sample_rate: u32) -> Result<(), PipelineError> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        // Encode into a sibling temp file; the destination only ever sees a
        // complete, finalized WAV via the rename.
        let part = self.path.with_extension("wav.part");
        if let Err(e) = Self::encode(&part, spec, samples) {
            std::fs::remove_file(&part).ok();
            return Err(e.into());
        }
        std::fs::rename(&part, &self.path).map_err(|e| {
            std::fs::remove_file(&part).ok();
            PipelineError::Sink(e.into())
        })
    }
}
