//! # Noise Field Module
//!
//! Deterministic fractal noise sampled in world space.
//!
//! Each field draws one large pseudo-random offset per octave and axis from its seed.
//! Offsets are added to *world-space* coordinates, never chunk-local ones, so the field
//! is continuous across chunk seams no matter which chunk is generated first.
//!
//! For every octave `i` the sample is
//!
//! ```text
//! value += perlin(world / scale * frequency^i + offset_i) * amplitude^i
//! ```
//!
//! and the sum is normalised to `[0, 1]` with `(value + max) / (2 * max)` where
//! `max = Σ amplitude^i`.

use cgmath::Vector3;
use noise::{NoiseFn, Perlin};
use serde::{Deserialize, Serialize};

use crate::core::ConfigurationError;

/// Magnitude of the per-octave offsets drawn from the seed.
pub const OCTAVE_OFFSET_RANGE: f64 = 100_000.0;

/// Inclusive interval of normalised noise values treated as "occupied".
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRange {
    /// Lower bound (inclusive)
    pub min: f64,
    /// Upper bound (inclusive)
    pub max: f64,
}

impl ThresholdRange {
    /// Creates a new threshold range.
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Whether `value` lies inside the interval.
    pub fn contains(&self, value: f64) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

/// Parameters of a fractal noise field. Immutable once built.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NoiseProfile {
    /// World units per noise unit; larger values give broader features.
    pub scale: f64,
    /// Amplitude multiplier per octave (persistence).
    pub amplitude: f64,
    /// Frequency multiplier per octave (lacunarity).
    pub frequency: f64,
    /// Number of octaves summed.
    pub octaves: i32,
    /// Multiplier applied to the normalised value for height fields.
    pub magnitude: f64,
    /// Occupancy interval for volume fields.
    #[serde(default)]
    pub threshold: Option<ThresholdRange>,
}

impl NoiseProfile {
    /// Profile used for the terrain surface by default.
    pub fn default_height() -> Self {
        Self {
            scale: 64.0,
            amplitude: 0.5,
            frequency: 2.0,
            octaves: 4,
            magnitude: 48.0,
            threshold: None,
        }
    }

    /// Profile used for cave carving by default.
    pub fn default_cave() -> Self {
        Self {
            scale: 24.0,
            amplitude: 0.5,
            frequency: 2.0,
            octaves: 3,
            magnitude: 1.0,
            threshold: Some(ThresholdRange::new(0.0, 0.625)),
        }
    }

    /// Rejects malformed parameters. `name` identifies the profile in the error.
    pub fn validate(&self, name: &'static str) -> Result<(), ConfigurationError> {
        if self.octaves <= 0 {
            return Err(ConfigurationError::InvalidOctaves {
                profile: name,
                octaves: self.octaves,
            });
        }

        for (field, value) in [
            ("scale", self.scale),
            ("amplitude", self.amplitude),
            ("frequency", self.frequency),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigurationError::InvalidProfileValue {
                    profile: name,
                    field,
                    value,
                });
            }
        }

        if !self.magnitude.is_finite() || self.magnitude < 0.0 {
            return Err(ConfigurationError::InvalidProfileValue {
                profile: name,
                field: "magnitude",
                value: self.magnitude,
            });
        }

        if let Some(threshold) = self.threshold {
            if !threshold.min.is_finite() || !threshold.max.is_finite() || threshold.min > threshold.max {
                return Err(ConfigurationError::InvertedThreshold {
                    profile: name,
                    min: threshold.min,
                    max: threshold.max,
                });
            }
        }

        Ok(())
    }
}

/// A seeded, validated fractal noise sampler.
///
/// Sampling is a pure function of `(seed, profile, world position)`, so a field can be
/// shared freely between worker threads.
#[derive(Clone, Debug)]
pub struct NoiseField {
    profile: NoiseProfile,
    perlin: Perlin,
    offsets: Vec<Vector3<f64>>,
    max_possible: f64,
}

impl NoiseField {
    /// Builds a field from a seed and a profile, validating the profile first.
    pub fn new(
        seed: u32,
        profile: NoiseProfile,
        name: &'static str,
    ) -> Result<Self, ConfigurationError> {
        profile.validate(name)?;

        let mut rng = fastrand::Rng::with_seed(seed as u64);
        // Perlin is zero on the integer lattice, so offsets must be fractional.
        let mut offset = || rng.f64() * 2.0 * OCTAVE_OFFSET_RANGE - OCTAVE_OFFSET_RANGE;
        let offsets = (0..profile.octaves)
            .map(|_| Vector3::new(offset(), offset(), offset()))
            .collect();

        let max_possible = (0..profile.octaves)
            .map(|octave| profile.amplitude.powi(octave))
            .sum();

        Ok(Self {
            perlin: Perlin::new(seed),
            profile,
            offsets,
            max_possible,
        })
    }

    /// The profile this field samples.
    pub fn profile(&self) -> &NoiseProfile {
        &self.profile
    }

    /// Fractal noise at a world column, normalised to `[0, 1]`.
    pub fn sample_2d(&self, world_x: f64, world_z: f64) -> f64 {
        let (x, z) = (world_x / self.profile.scale, world_z / self.profile.scale);
        let mut value = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = 1.0;

        for offset in &self.offsets {
            let sample = self
                .perlin
                .get([x * frequency + offset.x, z * frequency + offset.z]);
            value += sample * amplitude;
            amplitude *= self.profile.amplitude;
            frequency *= self.profile.frequency;
        }

        self.normalize(value)
    }

    /// Fractal noise at a world voxel, normalised to `[0, 1]`.
    pub fn sample_3d(&self, world_x: f64, world_y: f64, world_z: f64) -> f64 {
        let scale = self.profile.scale;
        let (x, y, z) = (world_x / scale, world_y / scale, world_z / scale);
        let mut value = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = 1.0;

        for offset in &self.offsets {
            let sample = self.perlin.get([
                x * frequency + offset.x,
                y * frequency + offset.y,
                z * frequency + offset.z,
            ]);
            value += sample * amplitude;
            amplitude *= self.profile.amplitude;
            frequency *= self.profile.frequency;
        }

        self.normalize(value)
    }

    /// Column height at a world column: the normalised sample scaled by the profile
    /// magnitude and floored.
    pub fn height(&self, world_x: i32, world_z: i32) -> i32 {
        (self.sample_2d(world_x as f64, world_z as f64) * self.profile.magnitude).floor() as i32
    }

    /// Whether the volume field marks a world voxel as occupied.
    ///
    /// A profile without a threshold occupies every voxel.
    pub fn is_occupied(&self, world_x: i32, world_y: i32, world_z: i32) -> bool {
        match self.profile.threshold {
            Some(threshold) => {
                threshold.contains(self.sample_3d(world_x as f64, world_y as f64, world_z as f64))
            }
            None => true,
        }
    }

    fn normalize(&self, value: f64) -> f64 {
        ((value + self.max_possible) / (2.0 * self.max_possible)).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(seed: u32) -> NoiseField {
        NoiseField::new(seed, NoiseProfile::default_height(), "height").unwrap()
    }

    #[test]
    fn test_samples_are_normalized() {
        let field = field(7);
        for i in -50..50 {
            let x = i as f64 * 13.37;
            let z = i as f64 * -7.1;
            let flat = field.sample_2d(x, z);
            let volume = field.sample_3d(x, i as f64, z);
            assert!((0.0..=1.0).contains(&flat), "2d sample {flat} out of range");
            assert!((0.0..=1.0).contains(&volume), "3d sample {volume} out of range");
        }
    }

    #[test]
    fn test_same_seed_is_deterministic() {
        let a = field(1234);
        let b = field(1234);
        for i in 0..64 {
            let (x, z) = (i as f64 * 3.5, i as f64 * 1.25);
            assert_eq!(a.sample_2d(x, z).to_bits(), b.sample_2d(x, z).to_bits());
            assert_eq!(a.height(i, -i), b.height(i, -i));
        }
    }

    #[test]
    fn test_different_seeds_differ() {
        let a = field(1);
        let b = field(2);
        let differs = (0..64).any(|i| {
            let (x, z) = (i as f64 * 5.3, i as f64 * 2.9);
            a.sample_2d(x, z) != b.sample_2d(x, z)
        });
        assert!(differs);
    }

    #[test]
    fn test_scale_multiples_vary_with_seed() {
        let columns = [(0, 0), (64, 0), (0, -64), (128, 192), (-640, 320)];
        let mut values = Vec::new();
        for seed in [0, 1, 7, 1234, 99_999] {
            let field = field(seed);
            for (x, z) in columns {
                values.push(field.sample_2d(x as f64, z as f64));
            }
        }
        assert!(values.iter().any(|value| *value != 0.5));
        assert!(values.windows(2).any(|pair| pair[0] != pair[1]));

        let voxels = [(24, 24, 24), (48, 0, -24), (0, 0, 0), (-72, 48, 96)];
        let cave_values: Vec<f64> = [0, 1, 7, 1234]
            .into_iter()
            .flat_map(|seed| {
                let cave = NoiseField::new(seed, NoiseProfile::default_cave(), "cave").unwrap();
                voxels.map(|(x, y, z)| cave.sample_3d(x as f64, y as f64, z as f64))
            })
            .collect();
        assert!(cave_values.iter().any(|value| *value != 0.5));
    }

    #[test]
    fn test_height_is_bounded_by_magnitude() {
        let field = field(99);
        for x in -32..32 {
            let height = field.height(x, x * 3);
            assert!((0..=48).contains(&height));
        }
    }

    #[test]
    fn test_threshold_controls_occupancy() {
        let mut profile = NoiseProfile::default_cave();
        profile.threshold = Some(ThresholdRange::new(0.0, 1.0));
        let everything = NoiseField::new(3, profile.clone(), "cave").unwrap();
        profile.threshold = Some(ThresholdRange::new(2.0, 3.0));
        let nothing = NoiseField::new(3, profile.clone(), "cave").unwrap();
        profile.threshold = None;
        let unthresholded = NoiseField::new(3, profile, "cave").unwrap();

        for i in 0..32 {
            assert!(everything.is_occupied(i, i / 2, -i));
            assert!(!nothing.is_occupied(i, i / 2, -i));
            assert!(unthresholded.is_occupied(i, i / 2, -i));
        }
    }

    #[test]
    fn test_rejects_malformed_profiles() {
        let mut profile = NoiseProfile::default_height();
        profile.octaves = 0;
        assert_eq!(
            NoiseField::new(0, profile, "height").unwrap_err(),
            ConfigurationError::InvalidOctaves {
                profile: "height",
                octaves: 0
            }
        );

        let mut profile = NoiseProfile::default_height();
        profile.scale = 0.0;
        assert!(matches!(
            profile.validate("height"),
            Err(ConfigurationError::InvalidProfileValue { field: "scale", .. })
        ));

        let mut profile = NoiseProfile::default_cave();
        profile.threshold = Some(ThresholdRange::new(0.8, 0.2));
        assert!(matches!(
            profile.validate("cave"),
            Err(ConfigurationError::InvertedThreshold { .. })
        ));
    }
}
