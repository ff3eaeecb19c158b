// THEORY:
// This file is the main entry point for the `birdwav` library crate. It
// follows the standard Rust convention of using `lib.rs` to define the
// public API exposed to external consumers.
//
// The primary goal is to export the `SonificationPipeline` and its
// associated data structures (`PipelineConfig`, `Timeline`, the error
// taxonomy) as the clean, high-level interface for the whole engine. The
// stage internals live under `core_modules` and are reachable for embedders
// who want to drive a single stage (for example, running the detector alone
// over a frame sequence).

pub mod core_modules;
pub mod error;
pub mod parallel_pipeline;
pub mod pipeline;

pub use error::PipelineError;
pub use parallel_pipeline::ParallelSonificationPipeline;
pub use pipeline::{PipelineConfig, ProgressObserver, SilentObserver, SonificationPipeline, Timeline};
