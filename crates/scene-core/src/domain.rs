//! Operators that warp the query point before an SDF evaluation.

/// Mirrors a coordinate across the origin plane.
#[inline]
pub fn mirror(value: f32) -> f32 {
    value.abs()
}

/// Repeats a coordinate with period `size`, centered on each cell.
#[inline]
pub fn repeat(value: f32, size: f32) -> f32 {
    if size.abs() <= f32::EPSILON {
        return value;
    }
    value.rem_euclid(size) - size * 0.5
}

/// Twists space around the Y axis: rotates (x, z) by `rate * y`.
#[inline]
pub fn twist(x: f32, y: f32, z: f32, rate: f32) -> [f32; 3] {
    let angle = rate * y;
    let c = angle.cos();
    let s = angle.sin();
    [c * x - s * z, y, s * x + c * z]
}

/// Bends space along X: rotates (x, y) by `rate * x`.
#[inline]
pub fn bend(x: f32, y: f32, rate: f32) -> [f32; 2] {
    let angle = rate * x;
    let c = angle.cos();
    let s = angle.sin();
    [c * x - s * y, s * x + c * y]
}

/// Rotates (x, z) by a fixed angle around the Y axis.
#[inline]
pub fn rotate_y(x: f32, z: f32, angle: f32) -> [f32; 2] {
    let c = angle.cos();
    let s = angle.sin();
    [c * x - s * z, s * x + c * z]
}
