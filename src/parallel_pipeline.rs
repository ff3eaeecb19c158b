// THEORY:
// The detection stage is a strict sequential fold (the background model and
// previous frame chain every step to the one before it), but once the
// per-frame detections are known, tone rendering has no cross-frame
// dependency at all. This module exploits that: a pool of workers renders
// frames' tone segments concurrently, and because the mixer places each
// segment at an absolute offset, completion order does not matter. The
// placements themselves are merged by a single owner of the timeline buffer,
// so no synchronization on sample ranges is ever needed.
//
// Rendering is deterministic, so the parallel pipeline produces output
// byte-identical to `SonificationPipeline::run`.

use crate::core_modules::coordinate_mapper::SoundParams;
use crate::core_modules::frame_source::FrameSource;
use crate::core_modules::timeline_mixer::{Timeline, TimelineMixer};
use crate::core_modules::tone_synthesizer::{SynthConfig, ToneSegment, ToneSynthesizer};
use crate::error::PipelineError;
use crate::pipeline::{PipelineConfig, ProgressObserver, SonificationPipeline};
use tokio::sync::{mpsc, oneshot};
use tracing::info;

/// One frame's worth of rendering work.
struct RenderTask {
    frame_index: u64,
    start_offset_ms: f64,
    params: Vec<SoundParams>,
    result_sender: oneshot::Sender<Vec<ToneSegment>>,
}

/// A fixed pool of render workers fed round-robin by a dispatcher task.
struct RenderPool {
    task_sender: mpsc::UnboundedSender<RenderTask>,
}

impl RenderPool {
    fn new(synth_config: SynthConfig, pool_size: usize) -> Self {
        let (task_sender, mut task_receiver) = mpsc::unbounded_channel::<RenderTask>();

        let (worker_senders, worker_receivers): (Vec<_>, Vec<_>) = (0..pool_size)
            .map(|_| mpsc::unbounded_channel::<RenderTask>())
            .unzip();

        // Dispatcher distributes tasks to workers round-robin.
        tokio::spawn(async move {
            let mut worker_idx = 0;
            while let Some(task) = task_receiver.recv().await {
                let _ = worker_senders[worker_idx].send(task);
                worker_idx = (worker_idx + 1) % pool_size;
            }
        });

        // Each worker owns its own synthesizer; rendering is deterministic,
        // so worker identity never shows in the output.
        for mut worker_receiver in worker_receivers {
            tokio::spawn(async move {
                let synthesizer = ToneSynthesizer::new(synth_config);
                while let Some(task) = worker_receiver.recv().await {
                    let segments = task
                        .params
                        .iter()
                        .map(|params| ToneSegment {
                            frame_index: task.frame_index,
                            start_offset_ms: task.start_offset_ms,
                            samples: synthesizer.render(params),
                        })
                        .collect();
                    let _ = task.result_sender.send(segments);
                }
            });
        }

        Self { task_sender }
    }

    fn submit(
        &self,
        frame_index: u64,
        start_offset_ms: f64,
        params: Vec<SoundParams>,
    ) -> Result<oneshot::Receiver<Vec<ToneSegment>>, PipelineError> {
        let (result_sender, result_receiver) = oneshot::channel();
        self.task_sender
            .send(RenderTask {
                frame_index,
                start_offset_ms,
                params,
                result_sender,
            })
            .map_err(|_| PipelineError::Render("render pool is shut down".to_string()))?;
        Ok(result_receiver)
    }
}

/// Sequential detection pass plus pooled tone rendering. Same contract and
/// same output as the sequential pipeline.
pub struct ParallelSonificationPipeline {
    inner: SonificationPipeline,
    pool_size: usize,
}

impl ParallelSonificationPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        Ok(Self {
            inner: SonificationPipeline::new(config)?,
            pool_size: num_cpus::get().max(1),
        })
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size.max(1);
        self
    }

    pub async fn run(
        &self,
        source: &mut dyn FrameSource,
        observer: &mut dyn ProgressObserver,
    ) -> Result<Timeline, PipelineError> {
        let (meta, detections) = self.inner.collect_detections(source, observer)?;

        let pool = RenderPool::new(self.inner.config().synth(meta.frame_ms()), self.pool_size);
        let mut pending = Vec::new();
        for (frame_index, detection) in detections.iter().enumerate() {
            if detection.is_empty() {
                continue;
            }
            let receiver = pool.submit(
                frame_index as u64,
                frame_index as f64 * meta.frame_ms(),
                self.inner.frame_params(&meta, detection),
            )?;
            pending.push(receiver);
        }

        // Single-threaded merge: the mixer is the sole owner of the buffer,
        // and absolute offsets make the placement order irrelevant.
        let mut mixer = TimelineMixer::new(meta.duration_ms(), self.inner.config().mixer());
        let mut total_tones = 0u64;
        for result in futures::future::join_all(pending).await {
            let segments =
                result.map_err(|_| PipelineError::Render("render worker dropped".to_string()))?;
            for segment in &segments {
                mixer.place(segment);
                total_tones += 1;
            }
        }

        let timeline = mixer.finalize();
        info!(
            frames = meta.total_frames,
            tones = total_tones,
            workers = self.pool_size,
            length_ms = timeline.length_ms,
            "parallel sonification complete"
        );
        Ok(timeline)
    }
}
