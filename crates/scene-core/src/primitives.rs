/// Cartesian point used for SDF evaluation.
pub type Point3 = [f32; 3];

/// Trait for 3D signed distance fields.
///
/// Negative inside the surface, positive outside, zero on it. Primitives are
/// centered at the origin; callers translate the query point to place them.
pub trait Sdf3 {
    fn evaluate(&self, point: Point3) -> f32;
}

#[inline]
fn dot(a: Point3, b: Point3) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
fn length(v: Point3) -> f32 {
    dot(v, v).sqrt()
}

#[inline]
fn length2(v: [f32; 2]) -> f32 {
    (v[0] * v[0] + v[1] * v[1]).sqrt()
}

#[inline]
fn sub(a: Point3, b: Point3) -> Point3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
fn mul_scalar(v: Point3, scalar: f32) -> Point3 {
    [v[0] * scalar, v[1] * scalar, v[2] * scalar]
}

#[inline]
fn max_component(v: Point3) -> f32 {
    v[0].max(v[1]).max(v[2])
}

#[inline]
fn clamp(value: f32, low: f32, high: f32) -> f32 {
    value.max(low).min(high)
}

/// Sphere SDF primitive.
#[derive(Debug, Clone, Copy)]
pub struct Sphere {
    radius: f32,
}

impl Sphere {
    /// Creates a sphere with a non-negative radius.
    pub fn new(radius: f32) -> Self {
        assert!(radius >= 0.0, "sphere radius must be non-negative");
        Self { radius }
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }
}

impl Sdf3 for Sphere {
    #[inline]
    fn evaluate(&self, point: Point3) -> f32 {
        length(point) - self.radius
    }
}

#[inline]
pub fn sphere(radius: f32) -> Sphere {
    Sphere::new(radius)
}

/// Axis-aligned box SDF primitive using half extents per axis.
#[derive(Debug, Clone, Copy)]
pub struct Box3 {
    half_extents: Point3,
}

impl Box3 {
    pub fn new(half_extents: Point3) -> Self {
        assert!(
            half_extents[0] >= 0.0 && half_extents[1] >= 0.0 && half_extents[2] >= 0.0,
            "box half extents must be non-negative"
        );
        Self { half_extents }
    }

    pub fn half_extents(&self) -> Point3 {
        self.half_extents
    }
}

impl Sdf3 for Box3 {
    #[inline]
    fn evaluate(&self, point: Point3) -> f32 {
        let q = [
            point[0].abs() - self.half_extents[0],
            point[1].abs() - self.half_extents[1],
            point[2].abs() - self.half_extents[2],
        ];
        let outside = length([q[0].max(0.0), q[1].max(0.0), q[2].max(0.0)]);
        let inside = max_component(q).min(0.0);
        outside + inside
    }
}

#[inline]
pub fn box3(half_extents: Point3) -> Box3 {
    Box3::new(half_extents)
}

/// Capsule defined by segment [a, b] and radius.
#[derive(Debug, Clone, Copy)]
pub struct Capsule {
    a: Point3,
    b: Point3,
    radius: f32,
}

impl Capsule {
    pub fn new(a: Point3, b: Point3, radius: f32) -> Self {
        assert!(radius >= 0.0, "capsule radius must be non-negative");
        Self { a, b, radius }
    }
}

impl Sdf3 for Capsule {
    #[inline]
    fn evaluate(&self, point: Point3) -> f32 {
        let pa = sub(point, self.a);
        let ba = sub(self.b, self.a);
        let ba_dot = dot(ba, ba);
        if ba_dot <= f32::EPSILON {
            return length(pa) - self.radius;
        }
        let h = clamp(dot(pa, ba) / ba_dot, 0.0, 1.0);
        length(sub(pa, mul_scalar(ba, h))) - self.radius
    }
}

#[inline]
pub fn capsule(a: Point3, b: Point3, radius: f32) -> Capsule {
    Capsule::new(a, b, radius)
}

/// Torus with its ring in the XZ plane, centered at origin.
#[derive(Debug, Clone, Copy)]
pub struct Torus {
    major_radius: f32,
    minor_radius: f32,
}

impl Torus {
    pub fn new(major_radius: f32, minor_radius: f32) -> Self {
        assert!(major_radius >= 0.0, "torus major radius must be non-negative");
        assert!(minor_radius >= 0.0, "torus minor radius must be non-negative");
        Self {
            major_radius,
            minor_radius,
        }
    }
}

impl Sdf3 for Torus {
    #[inline]
    fn evaluate(&self, point: Point3) -> f32 {
        let qx = (point[0] * point[0] + point[2] * point[2]).sqrt() - self.major_radius;
        (qx * qx + point[1] * point[1]).sqrt() - self.minor_radius
    }
}

#[inline]
pub fn torus(major_radius: f32, minor_radius: f32) -> Torus {
    Torus::new(major_radius, minor_radius)
}

/// Cone with its tip at the origin, opening downward along -Y to a base of
/// `radius` at y = -height.
#[derive(Debug, Clone, Copy)]
pub struct Cone {
    radius: f32,
    height: f32,
}

impl Cone {
    pub fn new(radius: f32, height: f32) -> Self {
        assert!(radius >= 0.0, "cone radius must be non-negative");
        assert!(height > 0.0, "cone height must be positive");
        Self { radius, height }
    }
}

impl Sdf3 for Cone {
    #[inline]
    fn evaluate(&self, point: Point3) -> f32 {
        let half = self.height * 0.5;
        // Tip at origin means the centered tapered form is shifted up by half.
        let local = [point[0], point[1] + half, point[2]];
        tapered_cylinder(self.radius, 0.0, half).evaluate(local)
    }
}

#[inline]
pub fn cone(radius: f32, height: f32) -> Cone {
    Cone::new(radius, height)
}

/// Plane SDF: dot(point, normal) - offset.
#[derive(Debug, Clone, Copy)]
pub struct Plane {
    normal: Point3,
    offset: f32,
}

impl Plane {
    pub fn new(normal: Point3, offset: f32) -> Self {
        Self { normal, offset }
    }
}

impl Sdf3 for Plane {
    #[inline]
    fn evaluate(&self, point: Point3) -> f32 {
        dot(point, self.normal) - self.offset
    }
}

#[inline]
pub fn plane(normal: Point3, offset: f32) -> Plane {
    Plane::new(normal, offset)
}

/// Finite cylinder along the Y axis, parameterized by radius and half-height.
#[derive(Debug, Clone, Copy)]
pub struct Cylinder {
    radius: f32,
    half_height: f32,
}

impl Cylinder {
    pub fn new(radius: f32, half_height: f32) -> Self {
        assert!(radius >= 0.0, "cylinder radius must be non-negative");
        assert!(half_height >= 0.0, "cylinder half-height must be non-negative");
        Self {
            radius,
            half_height,
        }
    }
}

impl Sdf3 for Cylinder {
    #[inline]
    fn evaluate(&self, point: Point3) -> f32 {
        let d = [
            (point[0] * point[0] + point[2] * point[2]).sqrt() - self.radius,
            point[1].abs() - self.half_height,
        ];
        let outside = length2([d[0].max(0.0), d[1].max(0.0)]);
        let inside = d[0].max(d[1]).min(0.0);
        outside + inside
    }
}

#[inline]
pub fn cylinder(radius: f32, half_height: f32) -> Cylinder {
    Cylinder::new(radius, half_height)
}

/// Ellipsoid SDF with per-axis radii. Sign-correct approximation; the value
/// is not a true euclidean distance away from the surface.
#[derive(Debug, Clone, Copy)]
pub struct Ellipsoid {
    radii: Point3,
}

impl Ellipsoid {
    pub fn new(radii: Point3) -> Self {
        assert!(
            radii[0] > 0.0 && radii[1] > 0.0 && radii[2] > 0.0,
            "ellipsoid radii must be positive"
        );
        Self { radii }
    }
}

impl Sdf3 for Ellipsoid {
    #[inline]
    fn evaluate(&self, point: Point3) -> f32 {
        let r = self.radii;
        let k0 = length([point[0] / r[0], point[1] / r[1], point[2] / r[2]]);
        let k1 = length([
            point[0] / (r[0] * r[0]),
            point[1] / (r[1] * r[1]),
            point[2] / (r[2] * r[2]),
        ]);
        if k1 <= f32::EPSILON {
            // Query at the exact center.
            return -r[0].min(r[1]).min(r[2]);
        }
        k0 * (k0 - 1.0) / k1
    }
}

#[inline]
pub fn ellipsoid(radii: Point3) -> Ellipsoid {
    Ellipsoid::new(radii)
}

/// Regular octahedron SDF (exact), circumscribed size `s`.
#[derive(Debug, Clone, Copy)]
pub struct Octahedron {
    size: f32,
}

impl Octahedron {
    pub fn new(size: f32) -> Self {
        assert!(size >= 0.0, "octahedron size must be non-negative");
        Self { size }
    }
}

impl Sdf3 for Octahedron {
    #[inline]
    fn evaluate(&self, point: Point3) -> f32 {
        let s = self.size;
        let p = [point[0].abs(), point[1].abs(), point[2].abs()];
        let m = p[0] + p[1] + p[2] - s;

        let q = if 3.0 * p[0] < m {
            p
        } else if 3.0 * p[1] < m {
            [p[1], p[2], p[0]]
        } else if 3.0 * p[2] < m {
            [p[2], p[0], p[1]]
        } else {
            return m * 0.577_350_3;
        };

        let k = clamp(0.5 * (q[2] - q[1] + s), 0.0, s);
        length([q[0], q[1] - s + k, q[2] - k])
    }
}

#[inline]
pub fn octahedron(size: f32) -> Octahedron {
    Octahedron::new(size)
}

/// Hexagonal prism along the Y axis: half-height `h`, hexagon radius `r` in
/// the XZ plane. Approximate but sign-correct.
#[derive(Debug, Clone, Copy)]
pub struct HexPrism {
    half_height: f32,
    radius: f32,
}

impl HexPrism {
    pub fn new(half_height: f32, radius: f32) -> Self {
        assert!(half_height >= 0.0, "hex prism half-height must be non-negative");
        assert!(radius >= 0.0, "hex prism radius must be non-negative");
        Self {
            half_height,
            radius,
        }
    }
}

impl Sdf3 for HexPrism {
    #[inline]
    fn evaluate(&self, point: Point3) -> f32 {
        const COS30: f32 = 0.866_025_4;
        let q = [point[0].abs(), point[1].abs(), point[2].abs()];
        let hex = (q[0] * COS30 + q[2] * 0.5).max(q[2]) - self.radius;
        let cap = q[1] - self.half_height;
        hex.max(cap).min(0.0) + length2([hex.max(0.0), cap.max(0.0)])
    }
}

#[inline]
pub fn hex_prism(half_height: f32, radius: f32) -> HexPrism {
    HexPrism::new(half_height, radius)
}

/// Tapered cylinder along the Y axis: radius `r1` at y = -half_height,
/// `r2` at y = +half_height. Exact.
#[derive(Debug, Clone, Copy)]
pub struct TaperedCylinder {
    r1: f32,
    r2: f32,
    half_height: f32,
}

impl TaperedCylinder {
    pub fn new(r1: f32, r2: f32, half_height: f32) -> Self {
        assert!(r1 >= 0.0, "tapered cylinder r1 must be non-negative");
        assert!(r2 >= 0.0, "tapered cylinder r2 must be non-negative");
        assert!(half_height > 0.0, "tapered cylinder half-height must be positive");
        Self {
            r1,
            r2,
            half_height,
        }
    }
}

impl Sdf3 for TaperedCylinder {
    #[inline]
    fn evaluate(&self, point: Point3) -> f32 {
        let h = self.half_height;
        let q = [(point[0] * point[0] + point[2] * point[2]).sqrt(), point[1]];
        let k1 = [self.r2, h];
        let k2 = [self.r2 - self.r1, 2.0 * h];

        let ca = [
            q[0] - q[0].min(if q[1] < 0.0 { self.r1 } else { self.r2 }),
            q[1].abs() - h,
        ];
        let k2_dot = k2[0] * k2[0] + k2[1] * k2[1];
        let h_proj = if k2_dot <= f32::EPSILON {
            0.0
        } else {
            clamp(
                ((k1[0] - q[0]) * k2[0] + (k1[1] - q[1]) * k2[1]) / k2_dot,
                0.0,
                1.0,
            )
        };
        let cb = [q[0] - k1[0] + k2[0] * h_proj, q[1] - k1[1] + k2[1] * h_proj];
        let s = if cb[0] < 0.0 && ca[1] < 0.0 { -1.0 } else { 1.0 };

        let ca_dot = ca[0] * ca[0] + ca[1] * ca[1];
        let cb_dot = cb[0] * cb[0] + cb[1] * cb[1];
        s * ca_dot.min(cb_dot).sqrt()
    }
}

#[inline]
pub fn tapered_cylinder(r1: f32, r2: f32, half_height: f32) -> TaperedCylinder {
    TaperedCylinder::new(r1, r2, half_height)
}

#[cfg(test)]
mod tests {
    use super::{
        Sdf3, box3, capsule, cone, cylinder, ellipsoid, hex_prism, octahedron, plane, sphere,
        tapered_cylinder, torus,
    };

    #[test]
    fn sphere_matches_analytical_points() {
        let sdf = sphere(1.0);

        assert!((sdf.evaluate([0.0, 0.0, 0.0]) + 1.0).abs() < 1e-6);
        assert!(sdf.evaluate([1.0, 0.0, 0.0]).abs() < 1e-6);
        assert!((sdf.evaluate([2.0, 0.0, 0.0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn box_matches_axis_aligned_expectations() {
        let sdf = box3([1.0, 2.0, 3.0]);
        assert!((sdf.evaluate([0.0, 0.0, 0.0]) + 1.0).abs() < 1e-6);
        assert!(sdf.evaluate([1.0, 0.0, 0.0]).abs() < 1e-6);
        assert!((sdf.evaluate([3.0, 0.0, 0.0]) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn capsule_uses_segment_distance_minus_radius() {
        let sdf = capsule([0.0, -1.0, 0.0], [0.0, 1.0, 0.0], 0.5);
        assert!((sdf.evaluate([0.0, 0.0, 0.0]) + 0.5).abs() < 1e-6);
        assert!(sdf.evaluate([0.5, 0.0, 0.0]).abs() < 1e-6);
        assert!(sdf.evaluate([0.0, 1.5, 0.0]).abs() < 1e-6);
    }

    #[test]
    fn torus_ring_lies_in_xz_plane() {
        let sdf = torus(2.0, 0.5);
        assert!((sdf.evaluate([2.0, 0.0, 0.0]) + 0.5).abs() < 1e-6);
        assert!(sdf.evaluate([2.5, 0.0, 0.0]).abs() < 1e-6);
        assert!(sdf.evaluate([0.0, 0.0, 2.5]).abs() < 1e-6);
        assert!(sdf.evaluate([2.0, 0.5, 0.0]).abs() < 1e-6);
    }

    #[test]
    fn cone_tip_sits_at_origin_and_opens_down() {
        let sdf = cone(1.0, 2.0);
        assert!(sdf.evaluate([0.0, 0.0, 0.0]).abs() < 1e-5);
        assert!(sdf.evaluate([0.0, -1.0, 0.0]) < 0.0);
        assert!(sdf.evaluate([1.0, -2.0, 0.0]).abs() < 1e-5);
        assert!(sdf.evaluate([0.0, 1.0, 0.0]) > 0.0);
    }

    #[test]
    fn plane_matches_dot_definition() {
        let sdf = plane([0.0, 1.0, 0.0], -1.5);
        assert!(sdf.evaluate([0.0, -1.5, 0.0]).abs() < 1e-6);
        assert!((sdf.evaluate([0.0, 0.0, 0.0]) - 1.5).abs() < 1e-6);
    }

    #[test]
    fn cylinder_is_y_axis_aligned() {
        let sdf = cylinder(1.0, 1.0);
        assert!(sdf.evaluate([1.0, 0.0, 0.0]).abs() < 1e-6);
        assert!(sdf.evaluate([0.0, 1.0, 0.0]).abs() < 1e-6);
        assert!(sdf.evaluate([0.0, 0.0, 0.0]) < 0.0);
        assert!((sdf.evaluate([0.0, 2.0, 0.0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn ellipsoid_sign_is_correct_on_axes() {
        let sdf = ellipsoid([1.0, 2.0, 3.0]);
        assert!(sdf.evaluate([0.0, 0.0, 0.0]) < 0.0);
        assert!(sdf.evaluate([1.0, 0.0, 0.0]).abs() < 1e-5);
        assert!(sdf.evaluate([0.0, 2.0, 0.0]).abs() < 1e-5);
        assert!(sdf.evaluate([0.0, 0.0, 4.0]) > 0.0);
    }

    #[test]
    fn octahedron_vertices_lie_on_surface() {
        let sdf = octahedron(1.0);
        assert!(sdf.evaluate([1.0, 0.0, 0.0]).abs() < 1e-5);
        assert!(sdf.evaluate([0.0, -1.0, 0.0]).abs() < 1e-5);
        assert!(sdf.evaluate([0.0, 0.0, 0.0]) < 0.0);
        assert!(sdf.evaluate([1.0, 1.0, 1.0]) > 0.0);
    }

    #[test]
    fn hex_prism_caps_along_y() {
        let sdf = hex_prism(1.0, 0.5);
        assert!(sdf.evaluate([0.0, 0.0, 0.0]) < 0.0);
        assert!((sdf.evaluate([0.0, 2.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(sdf.evaluate([0.0, 0.0, 1.0]) > 0.0);
    }

    #[test]
    fn tapered_cylinder_reduces_to_cylinder_when_radii_match() {
        let tapered = tapered_cylinder(1.0, 1.0, 1.0);
        let straight = cylinder(1.0, 1.0);
        for p in [[0.25_f32, 0.25, 0.75], [1.5, 0.0, 0.0], [0.0, -1.5, 0.0]] {
            assert!((tapered.evaluate(p) - straight.evaluate(p)).abs() < 1e-5);
        }
    }

    #[test]
    fn tapered_cylinder_radii_apply_at_both_ends() {
        let sdf = tapered_cylinder(1.0, 0.25, 1.0);
        assert!(sdf.evaluate([1.0, -1.0, 0.0]).abs() < 1e-5);
        assert!(sdf.evaluate([0.25, 1.0, 0.0]).abs() < 1e-5);
        assert!(sdf.evaluate([1.0, 1.0, 0.0]) > 0.0);
    }
}
