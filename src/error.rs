// THEORY:
// The `error` module defines the single failure taxonomy for the whole
// pipeline. The run is a one-shot deterministic batch transform: every
// condition here is fatal for the run and none is retried or auto-recovered
// mid-pipeline. Degenerate blobs (zero area moment) are deliberately NOT an
// error - they are silently skipped inside the extractor.

use thiserror::Error;

/// Fatal conditions that terminate a sonification run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The frame sequence cannot be read, or its metadata is invalid
    /// (zero frame rate, zero dimensions, frame/metadata size mismatch).
    #[error("frame source error: {0}")]
    Source(String),

    /// Invalid parameter ranges, rejected at startup before any frame
    /// is processed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The output buffer could not be encoded or written. The computed
    /// timeline is discarded; no partial file is considered valid.
    #[error("audio sink error: {0}")]
    Sink(#[from] hound::Error),

    /// A render worker or its channel failed. Synthesis itself is pure, so
    /// this only surfaces when a worker task is lost mid-run.
    #[error("render stage error: {0}")]
    Render(String),

    /// Cooperative cancellation was requested between frames. Produces no
    /// output rather than a partial file.
    #[error("run cancelled")]
    Cancelled,
}
