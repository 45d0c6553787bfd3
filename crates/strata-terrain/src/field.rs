//! Terrain noise fields.
//!
//! A [`TerrainField`] answers two questions about the world at a given seed:
//! how high the ground is in a column, and how "solid" a point below ground
//! is. The generator only thresholds these values, so any deterministic
//! function can stand in for the default simplex field.

use glam::IVec3;
use noise::{NoiseFn, Simplex};

/// Deterministic height and cave density for a world seed.
pub trait TerrainField: Send + Sync {
    /// World-space y of the topmost solid block in column `(x, z)`.
    fn surface_height(&self, x: i32, z: i32) -> i32;

    /// Cave density at `pos`, roughly in `[-1, 1]`. Low values are hollow.
    fn cave_density(&self, pos: IVec3) -> f64;
}

/// Parameters for [`NoiseTerrain`].
#[derive(Clone, Debug)]
pub struct NoiseTerrainParams {
    /// World seed for deterministic generation.
    pub seed: u64,
    /// Number of fBm octaves for the heightmap.
    pub octaves: u32,
    /// Frequency multiplier between octaves.
    pub lacunarity: f64,
    /// Amplitude multiplier between octaves.
    pub persistence: f64,
    /// Frequency of the first octave, in cycles per block.
    pub base_frequency: f64,
    /// Amplitude of the first octave, in blocks.
    pub amplitude: f64,
    /// Height the noise oscillates around.
    pub base_height: i32,
    /// Frequency of the 3D cave noise.
    pub cave_frequency: f64,
    /// Octaves of the 3D cave noise.
    pub cave_octaves: u32,
}

impl Default for NoiseTerrainParams {
    fn default() -> Self {
        Self {
            seed: 0,
            octaves: 5,
            lacunarity: 2.0,
            persistence: 0.5,
            base_frequency: 0.005,
            amplitude: 24.0,
            base_height: 0,
            cave_frequency: 0.04,
            cave_octaves: 3,
        }
    }
}

/// Simplex fBm heightmap with 3D simplex caves.
pub struct NoiseTerrain {
    height_noise: Simplex,
    cave_noise: Simplex,
    params: NoiseTerrainParams,
}

impl NoiseTerrain {
    pub fn new(params: NoiseTerrainParams) -> Self {
        let height_noise = Simplex::new(params.seed as u32);
        // Offset seed so caves do not line up with hills.
        let cave_noise = Simplex::new(params.seed.wrapping_add(0xCAFE_BABE) as u32);
        Self {
            height_noise,
            cave_noise,
            params,
        }
    }

    /// Default parameters with the given seed.
    pub fn with_seed(seed: u64) -> Self {
        Self::new(NoiseTerrainParams {
            seed,
            ..Default::default()
        })
    }

    pub fn params(&self) -> &NoiseTerrainParams {
        &self.params
    }

    /// Raw fBm height at `(x, z)` before rounding.
    pub fn sample_height(&self, x: f64, z: f64) -> f64 {
        let mut total = 0.0;
        let mut frequency = self.params.base_frequency;
        let mut amplitude = self.params.amplitude;

        for _ in 0..self.params.octaves {
            total += self.height_noise.get([x * frequency, z * frequency]) * amplitude;
            frequency *= self.params.lacunarity;
            amplitude *= self.params.persistence;
        }

        f64::from(self.params.base_height) + total
    }

    /// Sum of all octave amplitudes.
    pub fn max_amplitude(&self) -> f64 {
        let mut sum = 0.0;
        let mut amp = self.params.amplitude;
        for _ in 0..self.params.octaves {
            sum += amp;
            amp *= self.params.persistence;
        }
        sum
    }
}

impl TerrainField for NoiseTerrain {
    fn surface_height(&self, x: i32, z: i32) -> i32 {
        self.sample_height(f64::from(x), f64::from(z)).floor() as i32
    }

    fn cave_density(&self, pos: IVec3) -> f64 {
        let p = pos.as_dvec3();
        let mut total = 0.0;
        let mut frequency = self.params.cave_frequency;
        let mut amplitude = 1.0;
        let mut max_amplitude = 0.0;

        for _ in 0..self.params.cave_octaves {
            let f = p * frequency;
            total += self.cave_noise.get([f.x, f.y, f.z]) * amplitude;
            max_amplitude += amplitude;
            frequency *= 2.0;
            amplitude *= 0.5;
        }

        if max_amplitude > 0.0 {
            total / max_amplitude
        } else {
            1.0
        }
    }
}

/// Flat ground at a fixed height with no caves.
#[derive(Clone, Copy, Debug)]
pub struct FlatField {
    pub height: i32,
}

impl TerrainField for FlatField {
    fn surface_height(&self, _x: i32, _z: i32) -> i32 {
        self.height
    }

    fn cave_density(&self, _pos: IVec3) -> f64 {
        1.0
    }
}
