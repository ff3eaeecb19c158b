// Demo runner for the `birdwav` library: sonifies a synthetic scene of two
// "birds" crossing the frame and writes the result next to the working
// directory. Real footage goes through `ImageDirSource` pointed at a frame
// dump (e.g. `ffmpeg -i video.mp4 frames/%05d.png`).

use anyhow::Result;
use birdwav::core_modules::audio_sink::{AudioSink, WavSink};
use birdwav::core_modules::frame_source::SyntheticSource;
use birdwav::{ParallelSonificationPipeline, PipelineConfig, SilentObserver};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let width = 320;
    let height = 240;
    let fps = 30.0;
    let frames = 150;

    // One bird crossing left to right along the upper third, sweeping the
    // whole frequency range over five seconds.
    let path: Vec<(i64, i64)> = (0..frames)
        .map(|t| (t * width as i64 / frames, height as i64 / 3))
        .collect();
    let mut source = SyntheticSource::moving_square(width, height, fps, 14, &path);

    let pipeline = ParallelSonificationPipeline::new(PipelineConfig::default())?;
    let timeline = pipeline.run(&mut source, &mut SilentObserver).await?;

    let output = "bird_flight_synth.wav";
    WavSink::new(output).write(&timeline.samples, timeline.sample_rate)?;
    info!(output, length_ms = timeline.length_ms, "wrote audio track");
    Ok(())
}
