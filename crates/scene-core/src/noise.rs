//! Deterministic seeded noise: a Mulberry32 PRNG, 2D/3D value noise, and
//! fractal Brownian motion.
//!
//! Given the same seed, every call sequence produces identical output on
//! every platform. All intermediates are f32.

/// Mulberry32 sequential PRNG over 32-bit state.
#[derive(Debug, Clone)]
pub struct Mulberry32 {
    state: u32,
}

impl Mulberry32 {
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_add(0x6D2B_79F5);
        let mut t = self.state;
        t = (t ^ (t >> 15)).wrapping_mul(t | 1);
        t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
        t ^ (t >> 14)
    }

    /// Next value in [0, 1), from the top 24 bits.
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u32() >> 8) as f32 / 16_777_216.0
    }
}

/// Lattice value noise seeded by a single u32.
#[derive(Debug, Clone, Copy)]
pub struct ValueNoise {
    seed: u32,
}

/// Hash a lattice corner into [-1, 1] using PCG-style mixing rounds.
#[inline]
fn corner_hash(seed: u32, xi: i32, yi: i32, zi: i32) -> f32 {
    let mut state = seed
        .wrapping_add((xi as u32).wrapping_mul(0x9E37_79B9))
        .wrapping_add((yi as u32).wrapping_mul(0x517C_C1B7))
        .wrapping_add((zi as u32).wrapping_mul(0x6C62_272E));

    state ^= state >> 16;
    state = state.wrapping_mul(0x045D_9F3B);
    state ^= state >> 16;
    state = state.wrapping_mul(0x045D_9F3B);
    state ^= state >> 16;

    (state >> 8) as f32 / 16_777_216.0 * 2.0 - 1.0
}

#[inline]
fn smoothstep(t: f32) -> f32 {
    t * t * (3.0 - 2.0 * t)
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

impl ValueNoise {
    pub fn new(seed: u32) -> Self {
        Self { seed }
    }

    /// 2D value noise in [-1, 1].
    pub fn noise2(&self, x: f32, y: f32) -> f32 {
        let x0 = x.floor();
        let y0 = y.floor();
        let xi = x0 as i32;
        let yi = y0 as i32;
        let tx = smoothstep(x - x0);
        let ty = smoothstep(y - y0);

        let c00 = corner_hash(self.seed, xi, yi, 0);
        let c10 = corner_hash(self.seed, xi + 1, yi, 0);
        let c01 = corner_hash(self.seed, xi, yi + 1, 0);
        let c11 = corner_hash(self.seed, xi + 1, yi + 1, 0);

        lerp(lerp(c00, c10, tx), lerp(c01, c11, tx), ty)
    }

    /// 3D value noise in [-1, 1].
    pub fn noise3(&self, x: f32, y: f32, z: f32) -> f32 {
        let x0 = x.floor();
        let y0 = y.floor();
        let z0 = z.floor();
        let xi = x0 as i32;
        let yi = y0 as i32;
        let zi = z0 as i32;
        let tx = smoothstep(x - x0);
        let ty = smoothstep(y - y0);
        let tz = smoothstep(z - z0);

        let c000 = corner_hash(self.seed, xi, yi, zi);
        let c100 = corner_hash(self.seed, xi + 1, yi, zi);
        let c010 = corner_hash(self.seed, xi, yi + 1, zi);
        let c110 = corner_hash(self.seed, xi + 1, yi + 1, zi);
        let c001 = corner_hash(self.seed, xi, yi, zi + 1);
        let c101 = corner_hash(self.seed, xi + 1, yi, zi + 1);
        let c011 = corner_hash(self.seed, xi, yi + 1, zi + 1);
        let c111 = corner_hash(self.seed, xi + 1, yi + 1, zi + 1);

        let bottom = lerp(lerp(c000, c100, tx), lerp(c010, c110, tx), ty);
        let top = lerp(lerp(c001, c101, tx), lerp(c011, c111, tx), ty);
        lerp(bottom, top, tz)
    }

    /// 2D fractal Brownian motion in [-1, 1], normalized by amplitude sum.
    pub fn fbm2(&self, x: f32, y: f32, octaves: u32, gain: f32, lacunarity: f32) -> f32 {
        let mut total = 0.0_f32;
        let mut amplitude = 1.0_f32;
        let mut frequency = 1.0_f32;
        let mut norm = 0.0_f32;

        for _ in 0..octaves {
            let sample = self.noise2(x * frequency, y * frequency);
            if sample.is_finite() {
                total += sample * amplitude;
            }
            norm += amplitude;
            amplitude *= gain;
            frequency *= lacunarity;
        }

        if norm <= f32::EPSILON { 0.0 } else { total / norm }
    }

    /// 3D fractal Brownian motion in [-1, 1], normalized by amplitude sum.
    pub fn fbm3(&self, x: f32, y: f32, z: f32, octaves: u32, gain: f32, lacunarity: f32) -> f32 {
        let mut total = 0.0_f32;
        let mut amplitude = 1.0_f32;
        let mut frequency = 1.0_f32;
        let mut norm = 0.0_f32;

        for _ in 0..octaves {
            let sample = self.noise3(x * frequency, y * frequency, z * frequency);
            if sample.is_finite() {
                total += sample * amplitude;
            }
            norm += amplitude;
            amplitude *= gain;
            frequency *= lacunarity;
        }

        if norm <= f32::EPSILON { 0.0 } else { total / norm }
    }
}

/// Default octave count for fBm bindings.
pub const FBM_DEFAULT_OCTAVES: u32 = 4;
/// Default per-octave amplitude decay.
pub const FBM_DEFAULT_GAIN: f32 = 0.5;
/// Default per-octave frequency growth.
pub const FBM_DEFAULT_LACUNARITY: f32 = 2.0;
