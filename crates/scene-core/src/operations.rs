//! Combinators on raw signed distances. None of these know about position;
//! domain transforms live in [`crate::domain`].

#[inline]
fn clamp(value: f32, low: f32, high: f32) -> f32 {
    value.max(low).min(high)
}

#[inline]
fn mix(a: f32, b: f32, t: f32) -> f32 {
    a * (1.0 - t) + b * t
}

/// Exact CSG union for true SDFs.
#[inline]
pub fn union(a: f32, b: f32) -> f32 {
    a.min(b)
}

/// Exact CSG subtraction: `a` minus `b`.
#[inline]
pub fn subtract(a: f32, b: f32) -> f32 {
    a.max(-b)
}

/// Exact CSG intersection for true SDFs.
#[inline]
pub fn intersect(a: f32, b: f32) -> f32 {
    a.max(b)
}

/// Smooth CSG union using a polynomial smooth-min blend radius `k`.
#[inline]
pub fn smooth_union(a: f32, b: f32, k: f32) -> f32 {
    if k <= 0.0 {
        return union(a, b);
    }
    let h = clamp(0.5 + 0.5 * (b - a) / k, 0.0, 1.0);
    mix(b, a, h) - k * h * (1.0 - h)
}

/// Smooth CSG subtraction (dual form based on smooth union).
#[inline]
pub fn smooth_subtract(a: f32, b: f32, k: f32) -> f32 {
    -smooth_union(-a, b, k)
}

/// Smooth CSG intersection (dual of smooth union).
#[inline]
pub fn smooth_intersect(a: f32, b: f32, k: f32) -> f32 {
    -smooth_union(-a, -b, k)
}

/// Rounds a shape outward by `r`.
#[inline]
pub fn round_edge(distance: f32, r: f32) -> f32 {
    distance - r
}

/// Adds a displacement term to a distance.
#[inline]
pub fn displace(distance: f32, offset: f32) -> f32 {
    distance + offset
}

/// Onion/shell operation: a band of thickness `t` around the surface.
#[inline]
pub fn shell(distance: f32, thickness: f32) -> f32 {
    distance.abs() - thickness
}

/// Symmetric difference of two shapes.
#[inline]
pub fn xor(a: f32, b: f32) -> f32 {
    a.min(b).max(-a.max(b))
}

/// Union with a 45-degree chamfered seam of size `r`.
#[inline]
pub fn chamfer(a: f32, b: f32, r: f32) -> f32 {
    a.min(b).min((a - r + b) * std::f32::consts::FRAC_1_SQRT_2)
}

/// Union with `n` step-shaped seams of total size `r`.
#[inline]
pub fn stairs(a: f32, b: f32, r: f32, n: f32) -> f32 {
    let n = n.max(1.0);
    let s = r / n;
    if s <= 0.0 {
        return a.min(b);
    }
    let u = b - r;
    a.min(b)
        .min(0.5 * (u + a + ((u - a + s).rem_euclid(2.0 * s) - s).abs()))
}
