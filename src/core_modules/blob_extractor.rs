// THEORY:
// The `blob_extractor` is the spatial grouping layer. It turns a per-frame
// binary mask into a deduplicated, ordered set of centroids ("detections")
// ready for sonification.
//
// Key architectural principles:
// 1.  **Connected components via flood fill**: Foreground pixels are grouped
//     into 4-connected components by a stack-based flood from each unvisited
//     seed, with a shared `visited` grid so no pixel is processed twice. The
//     traversal order within a component does not affect its area or moments.
//     Only external regions emerge from this; holes inside a component are
//     simply never reached and are ignored by construction.
// 2.  **Moment centroids**: Each component reports its area (pixel count)
//     and the area-weighted first moments. A component whose total moment is
//     exactly zero has no defined centroid and is silently dropped - a
//     defensive guard against degenerate single-pixel noise, not an error.
// 3.  **Order-dependent dedup**: Accepted-area blobs are considered in their
//     discovery order (raster order of their seed pixels). A blob enters the
//     frame's detection only if its centroid is at least `dedup_radius` from
//     every already-accepted centroid; otherwise it is discarded. This is
//     order-dependent by construction: when two blobs contend, the first
//     discovered one wins. That tie-break is part of the contract, so the
//     extractor does not attempt order-independent clustering.
// 4.  **Stateless utility**: One mask in, one detection out, no memory of
//     previous frames.

use crate::core_modules::motion_detector::ForegroundMask;

/// A single connected foreground region, summarized.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Blob {
    /// Area-weighted geometric center, in pixel coordinates.
    pub centroid: (f64, f64),
    /// Component size in pixels.
    pub area: u32,
}

/// The ordered blobs surviving the area filter and dedup for one frame.
pub type Detection = Vec<Blob>;

/// Tunables for the spatial layer.
#[derive(Debug, Clone, Copy)]
pub struct ExtractorConfig {
    /// Components smaller than this are discarded as noise. Deployments
    /// differ on the right value (100 and 200 are both in use), so this is a
    /// parameter rather than a constant.
    pub min_blob_area: u32,
    /// Minimum Euclidean distance between any two accepted centroids in the
    /// same frame.
    pub dedup_radius: f64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            min_blob_area: 100,
            dedup_radius: 30.0,
        }
    }
}

pub struct BlobExtractor {
    config: ExtractorConfig,
}

impl BlobExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    /// Extracts the deduplicated detections for one frame's mask.
    pub fn extract(&self, mask: &ForegroundMask) -> Detection {
        let width = mask.width as usize;
        let height = mask.height as usize;
        let mut visited = vec![false; width * height];
        let mut accepted: Detection = Vec::new();

        for seed in 0..mask.pixels.len() {
            if !mask.pixels[seed] || visited[seed] {
                continue;
            }
            let Some(blob) = Self::grow_component(mask, &mut visited, seed) else {
                continue;
            };
            if blob.area < self.config.min_blob_area {
                continue;
            }
            if self.is_distinct(&accepted, blob.centroid) {
                accepted.push(blob);
            }
        }

        accepted
    }

    /// Stack-based flood from an unvisited foreground seed, aggregating area
    /// and first moments along the way. Returns `None` for a degenerate
    /// component with zero total moment.
    fn grow_component(mask: &ForegroundMask, visited: &mut [bool], seed: usize) -> Option<Blob> {
        let width = mask.width as i64;
        let height = mask.height as i64;

        let mut queue = vec![seed];
        visited[seed] = true;

        let mut area: u32 = 0;
        let mut moment_x: f64 = 0.0;
        let mut moment_y: f64 = 0.0;

        while let Some(index) = queue.pop() {
            let x = (index as i64) % width;
            let y = (index as i64) / width;
            area += 1;
            moment_x += x as f64;
            moment_y += y as f64;

            for (dx, dy) in &[(0i64, 1i64), (0, -1), (1, 0), (-1, 0)] {
                let nx = x + dx;
                let ny = y + dy;
                if nx < 0 || nx >= width || ny < 0 || ny >= height {
                    continue;
                }
                let ni = (ny * width + nx) as usize;
                if mask.pixels[ni] && !visited[ni] {
                    visited[ni] = true;
                    queue.push(ni);
                }
            }
        }

        if area == 0 {
            // Unreachable for a real seed, but a zero moment would make the
            // centroid division undefined; drop rather than divide.
            return None;
        }

        Some(Blob {
            centroid: (moment_x / area as f64, moment_y / area as f64),
            area,
        })
    }

    fn is_distinct(&self, accepted: &Detection, centroid: (f64, f64)) -> bool {
        accepted.iter().all(|existing| {
            let dx = existing.centroid.0 - centroid.0;
            let dy = existing.centroid.1 - centroid.1;
            (dx * dx + dy * dy).sqrt() >= self.config.dedup_radius
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_from_rows(rows: &[&str]) -> ForegroundMask {
        let height = rows.len() as u32;
        let width = rows[0].len() as u32;
        let pixels = rows
            .iter()
            .flat_map(|row| row.chars().map(|c| c == '#'))
            .collect();
        ForegroundMask {
            width,
            height,
            pixels,
        }
    }

    fn extractor(min_blob_area: u32, dedup_radius: f64) -> BlobExtractor {
        BlobExtractor::new(ExtractorConfig {
            min_blob_area,
            dedup_radius,
        })
    }

    #[test]
    fn finds_single_component_centroid() {
        let mask = mask_from_rows(&[
            "....",
            ".##.",
            ".##.",
            "....",
        ]);
        let detection = extractor(1, 0.0).extract(&mask);
        assert_eq!(detection.len(), 1);
        assert_eq!(detection[0].area, 4);
        assert_eq!(detection[0].centroid, (1.5, 1.5));
    }

    #[test]
    fn area_filter_drops_small_components() {
        let mask = mask_from_rows(&[
            "#...",
            "....",
            ".###",
            ".###",
        ]);
        let detection = extractor(4, 0.0).extract(&mask);
        assert_eq!(detection.len(), 1);
        assert_eq!(detection[0].area, 6);
    }

    #[test]
    fn diagonal_pixels_are_separate_components() {
        let mask = mask_from_rows(&[
            "#.",
            ".#",
        ]);
        let detection = extractor(1, 0.0).extract(&mask);
        assert_eq!(detection.len(), 2);
    }

    #[test]
    fn dedup_keeps_first_discovered_of_close_pair() {
        // Two blobs 10 units apart with radius 30: only the first discovered
        // (upper) survives.
        let mut rows = vec!["........".to_string(); 16];
        for r in 0..2 {
            rows[r].replace_range(0..2, "##");
            rows[r + 10].replace_range(0..2, "##");
        }
        let rows: Vec<&str> = rows.iter().map(|s| s.as_str()).collect();
        let mask = mask_from_rows(&rows);

        let detection = extractor(1, 30.0).extract(&mask);
        assert_eq!(detection.len(), 1);
        assert!(detection[0].centroid.1 < 5.0, "first discovered blob wins");
    }

    #[test]
    fn all_accepted_centroids_respect_radius() {
        let mask = mask_from_rows(&[
            "##....##",
            "##....##",
            "........",
            "........",
            "##....##",
            "##....##",
        ]);
        let radius = 3.0;
        let detection = extractor(1, radius).extract(&mask);
        for (i, a) in detection.iter().enumerate() {
            for b in detection.iter().skip(i + 1) {
                let dx = a.centroid.0 - b.centroid.0;
                let dy = a.centroid.1 - b.centroid.1;
                assert!((dx * dx + dy * dy).sqrt() >= radius);
            }
        }
        assert_eq!(detection.len(), 4);
    }
}
