// THEORY:
// The `frame_source` module is the input boundary. Decoding a video
// container is someone else's job; the pipeline only asks for an ordered,
// finite sequence of rasters plus the metadata needed to size the timeline.
// The `FrameSource` trait is that seam. Two implementations ship with the
// crate: a synthetic scripted scene (tests and the demo runner) and a
// directory of numbered still images decoded with the `image` crate, which
// is what a `ffmpeg -i video.mp4 frames/%05d.png` dump produces.

use crate::core_modules::frame::{Frame, FrameMeta};
use crate::error::PipelineError;
use std::path::PathBuf;

/// An ordered, finite sequence of decoded frames.
pub trait FrameSource {
    fn meta(&self) -> FrameMeta;

    /// Next frame in presentation order, or `None` when exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>, PipelineError>;
}

/// A scripted in-memory scene. Frames are prebuilt, so tests can lay out
/// exact pixel trajectories.
pub struct SyntheticSource {
    meta: FrameMeta,
    frames: std::vec::IntoIter<Frame>,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32, fps: f64, frames: Vec<Frame>) -> Self {
        let meta = FrameMeta {
            width,
            height,
            fps,
            total_frames: frames.len() as u64,
        };
        Self {
            meta,
            frames: frames.into_iter(),
        }
    }

    /// A fully static scene: the same flat frame repeated.
    pub fn static_scene(width: u32, height: u32, fps: f64, total_frames: u64, luma: u8) -> Self {
        let frame = Frame {
            width,
            height,
            luma: vec![luma; (width * height) as usize],
        };
        Self::new(width, height, fps, vec![frame; total_frames as usize])
    }

    /// A dark scene with one bright square whose top-left corner is given
    /// per frame by `path`. Squares are clipped at the frame edges.
    pub fn moving_square(
        width: u32,
        height: u32,
        fps: f64,
        square: u32,
        path: &[(i64, i64)],
    ) -> Self {
        let frames = path
            .iter()
            .map(|&(sx, sy)| {
                let mut luma = vec![20u8; (width * height) as usize];
                for dy in 0..square as i64 {
                    for dx in 0..square as i64 {
                        let x = sx + dx;
                        let y = sy + dy;
                        if x >= 0 && x < width as i64 && y >= 0 && y < height as i64 {
                            luma[(y * width as i64 + x) as usize] = 235;
                        }
                    }
                }
                Frame {
                    width,
                    height,
                    luma,
                }
            })
            .collect();
        Self::new(width, height, fps, frames)
    }
}

impl FrameSource for SyntheticSource {
    fn meta(&self) -> FrameMeta {
        self.meta
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, PipelineError> {
        Ok(self.frames.next())
    }
}

/// Frames decoded one-by-one from a sorted list of image files.
pub struct ImageDirSource {
    meta: FrameMeta,
    paths: std::vec::IntoIter<PathBuf>,
}

impl ImageDirSource {
    /// Scans `dir` for image files, sorts them by name, and probes the first
    /// one for the frame dimensions. The frame rate cannot be recovered from
    /// stills, so the caller supplies it.
    pub fn open(dir: &std::path::Path, fps: f64) -> Result<Self, PipelineError> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
            .map_err(|e| PipelineError::Source(format!("cannot read {}: {e}", dir.display())))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                matches!(
                    p.extension().and_then(|e| e.to_str()),
                    Some("png") | Some("jpg") | Some("jpeg") | Some("bmp")
                )
            })
            .collect();
        paths.sort();

        let first = paths
            .first()
            .ok_or_else(|| PipelineError::Source(format!("no frames in {}", dir.display())))?;
        let probe = image::image_dimensions(first)
            .map_err(|e| PipelineError::Source(format!("cannot probe {}: {e}", first.display())))?;

        let meta = FrameMeta {
            width: probe.0,
            height: probe.1,
            fps,
            total_frames: paths.len() as u64,
        };
        meta.validate()?;
        Ok(Self {
            meta,
            paths: paths.into_iter(),
        })
    }
}

impl FrameSource for ImageDirSource {
    fn meta(&self) -> FrameMeta {
        self.meta
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, PipelineError> {
        let Some(path) = self.paths.next() else {
            return Ok(None);
        };
        let decoded = image::open(&path)
            .map_err(|e| PipelineError::Source(format!("cannot decode {}: {e}", path.display())))?
            .into_luma8();
        Frame::new(decoded.width(), decoded.height(), decoded.into_raw()).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_source_reports_its_length() {
        let mut source = SyntheticSource::static_scene(16, 16, 30.0, 5, 100);
        assert_eq!(source.meta().total_frames, 5);
        let mut count = 0;
        while source.next_frame().unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 5);
    }

    #[test]
    fn moving_square_lights_the_right_pixels() {
        let mut source = SyntheticSource::moving_square(20, 20, 30.0, 4, &[(2, 3)]);
        let frame = source.next_frame().unwrap().unwrap();
        assert_eq!(frame.luma[(3 * 20 + 2) as usize], 235);
        assert_eq!(frame.luma[0], 20);
    }

    #[test]
    fn image_dir_source_decodes_numbered_frames() {
        let dir = std::env::temp_dir().join("birdwav_frames_test");
        std::fs::create_dir_all(&dir).unwrap();
        for (i, luma) in [40u8, 200u8].iter().enumerate() {
            let img = image::GrayImage::from_pixel(6, 4, image::Luma([*luma]));
            img.save(dir.join(format!("{i:05}.png"))).unwrap();
        }

        let mut source = ImageDirSource::open(&dir, 25.0).unwrap();
        let meta = source.meta();
        assert_eq!((meta.width, meta.height, meta.total_frames), (6, 4, 2));
        assert_eq!(meta.fps, 25.0);

        let first = source.next_frame().unwrap().unwrap();
        assert_eq!(first.luma, vec![40u8; 24]);
        let second = source.next_frame().unwrap().unwrap();
        assert_eq!(second.luma, vec![200u8; 24]);
        assert!(source.next_frame().unwrap().is_none());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn square_clips_at_frame_edges() {
        let mut source = SyntheticSource::moving_square(10, 10, 30.0, 4, &[(-2, -2), (8, 8)]);
        let a = source.next_frame().unwrap().unwrap();
        let b = source.next_frame().unwrap().unwrap();
        assert_eq!(a.luma[0], 235);
        assert_eq!(b.luma[99], 235);
    }
}
