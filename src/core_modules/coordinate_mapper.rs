// THEORY:
// The `coordinate_mapper` is the sonification seam: a pure function from a
// detection's position to sound parameters. Horizontal position interpolates
// linearly between the configured frequency bounds; vertical position
// (when a duration range is configured) interpolates the tone length the
// same way. Inputs are deliberately unclamped - a centroid outside the frame
// extrapolates past the configured range rather than pinning to it, which is
// accepted behavior.

/// Frequency (and optional duration) mapping ranges.
#[derive(Debug, Clone, Copy)]
pub struct MapperConfig {
    /// Frequency emitted at x = 0, in Hz.
    pub min_freq: f64,
    /// Frequency emitted at x = width, in Hz.
    pub max_freq: f64,
    /// When set, tone duration is mapped from y over
    /// [`min_duration_ms`, `max_duration_ms`] instead of the frame period.
    pub min_duration_ms: Option<f64>,
    pub max_duration_ms: Option<f64>,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            min_freq: 220.0,
            max_freq: 880.0,
            min_duration_ms: None,
            max_duration_ms: None,
        }
    }
}

/// Parameters for one synthesized tone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoundParams {
    pub frequency: f64,
    /// Tone length in milliseconds. `None` means "use the frame period",
    /// which is the behavior when no duration range is configured.
    pub duration_ms: Option<f64>,
}

/// Maps a centroid and the frame dimensions to sound parameters.
/// `frequency(0) == min_freq`, `frequency(width) == max_freq`, linear and
/// monotonically non-decreasing in between (given `max_freq >= min_freq`).
pub fn map(x: f64, y: f64, width: u32, height: u32, config: &MapperConfig) -> SoundParams {
    let frequency = config.min_freq + (x / width as f64) * (config.max_freq - config.min_freq);

    let duration_ms = match (config.min_duration_ms, config.max_duration_ms) {
        (Some(min), Some(max)) => Some(min + (y / height as f64) * (max - min)),
        _ => None,
    };

    SoundParams {
        frequency,
        duration_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WIDTH: u32 = 640;
    const HEIGHT: u32 = 480;

    #[test]
    fn frequency_endpoints_are_exact() {
        let config = MapperConfig::default();
        for y in [0.0, 100.0, 479.0] {
            assert_eq!(map(0.0, y, WIDTH, HEIGHT, &config).frequency, config.min_freq);
            assert_eq!(
                map(WIDTH as f64, y, WIDTH, HEIGHT, &config).frequency,
                config.max_freq
            );
        }
    }

    #[test]
    fn frequency_is_monotone_in_x() {
        let config = MapperConfig::default();
        let mut last = f64::NEG_INFINITY;
        for x in 0..=WIDTH {
            let freq = map(x as f64, 0.0, WIDTH, HEIGHT, &config).frequency;
            assert!(freq >= last);
            last = freq;
        }
    }

    #[test]
    fn out_of_frame_x_extrapolates() {
        let config = MapperConfig::default();
        let beyond = map(WIDTH as f64 * 2.0, 0.0, WIDTH, HEIGHT, &config);
        assert!(beyond.frequency > config.max_freq);
    }

    #[test]
    fn duration_maps_from_y_when_configured() {
        let config = MapperConfig {
            min_duration_ms: Some(50.0),
            max_duration_ms: Some(250.0),
            ..MapperConfig::default()
        };
        assert_eq!(map(0.0, 0.0, WIDTH, HEIGHT, &config).duration_ms, Some(50.0));
        assert_eq!(
            map(0.0, HEIGHT as f64, WIDTH, HEIGHT, &config).duration_ms,
            Some(250.0)
        );
        let mid = map(0.0, HEIGHT as f64 / 2.0, WIDTH, HEIGHT, &config)
            .duration_ms
            .unwrap();
        assert!((mid - 150.0).abs() < 1e-9);
    }

    #[test]
    fn duration_defaults_to_frame_period_marker() {
        let params = map(10.0, 10.0, WIDTH, HEIGHT, &MapperConfig::default());
        assert_eq!(params.duration_ms, None);
    }
}
