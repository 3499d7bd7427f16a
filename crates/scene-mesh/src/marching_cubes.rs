use std::convert::Infallible;

use scene_core::Point3;

use crate::buffer::MeshBuffer;
use crate::tables::{EDGE_TABLE, TRI_TABLE};

/// A sampled scalar field plus surface color. Sampling is fallible so that
/// script-driven fields can propagate runtime errors out of the extraction
/// loop.
pub trait ScalarField {
    type Error;

    fn sample(&mut self, x: f32, y: f32, z: f32) -> Result<f32, Self::Error>;
    fn color(&mut self, x: f32, y: f32, z: f32) -> Result<Point3, Self::Error>;
}

/// Adapter for plain closures; sampling never fails.
pub struct FnField<F, C> {
    pub sdf: F,
    pub color: C,
}

impl<F, C> ScalarField for FnField<F, C>
where
    F: FnMut(f32, f32, f32) -> f32,
    C: FnMut(f32, f32, f32) -> Point3,
{
    type Error = Infallible;

    fn sample(&mut self, x: f32, y: f32, z: f32) -> Result<f32, Infallible> {
        Ok((self.sdf)(x, y, z))
    }

    fn color(&mut self, x: f32, y: f32, z: f32) -> Result<Point3, Infallible> {
        Ok((self.color)(x, y, z))
    }
}

const CORNER_OFFSETS: [[usize; 3]; 8] = [
    [0, 0, 0],
    [1, 0, 0],
    [1, 1, 0],
    [0, 1, 0],
    [0, 0, 1],
    [1, 0, 1],
    [1, 1, 1],
    [0, 1, 1],
];

const EDGE_ENDPOINTS: [[usize; 2]; 12] = [
    [0, 1],
    [1, 2],
    [2, 3],
    [3, 0],
    [4, 5],
    [5, 6],
    [6, 7],
    [7, 4],
    [0, 4],
    [1, 5],
    [2, 6],
    [3, 7],
];

/// Extracts the zero iso-surface of `field` over `[min, max]` into `buffer`
/// as smooth-shaded triangles. `resolution` is the cell count per axis, so
/// the field is sampled at `(resolution + 1)^3` grid vertices. Negative
/// field values are inside; the tables produce outward-facing triangles for
/// that convention.
pub fn polygonize<F: ScalarField>(
    field: &mut F,
    buffer: &mut MeshBuffer,
    min: Point3,
    max: Point3,
    resolution: u32,
) -> Result<(), F::Error> {
    if resolution == 0 {
        return Ok(());
    }
    let n = resolution as usize + 1;
    let spacing = [
        (max[0] - min[0]) / resolution as f32,
        (max[1] - min[1]) / resolution as f32,
        (max[2] - min[2]) / resolution as f32,
    ];
    let eps = spacing[0].max(spacing[1]).max(spacing[2]) * 0.5;

    // Dense sample pass; row-major with x fastest.
    let mut values = vec![0.0_f32; n * n * n];
    for iz in 0..n {
        for iy in 0..n {
            for ix in 0..n {
                let point = grid_point(min, spacing, ix, iy, iz);
                values[grid_index(ix, iy, iz, n)] = field.sample(point[0], point[1], point[2])?;
            }
        }
    }

    let mut corner_values = [0.0_f32; 8];
    let mut corner_points = [[0.0_f32; 3]; 8];
    let mut edge_points = [[0.0_f32; 3]; 12];
    let mut edge_normals = [[0.0_f32; 3]; 12];

    for iz in 0..n - 1 {
        for iy in 0..n - 1 {
            for ix in 0..n - 1 {
                let mut case_index = 0usize;
                for (corner, offset) in CORNER_OFFSETS.iter().enumerate() {
                    let gx = ix + offset[0];
                    let gy = iy + offset[1];
                    let gz = iz + offset[2];
                    let value = values[grid_index(gx, gy, gz, n)];
                    corner_values[corner] = value;
                    corner_points[corner] = grid_point(min, spacing, gx, gy, gz);
                    if value < 0.0 {
                        case_index |= 1 << corner;
                    }
                }

                let edge_mask = EDGE_TABLE[case_index];
                if edge_mask == 0 {
                    continue;
                }

                for (edge, endpoints) in EDGE_ENDPOINTS.iter().enumerate() {
                    if edge_mask & (1u16 << edge) == 0 {
                        continue;
                    }
                    let [a, b] = *endpoints;
                    let crossing = interpolate_edge(
                        corner_points[a],
                        corner_points[b],
                        corner_values[a],
                        corner_values[b],
                    );
                    edge_points[edge] = crossing;
                    edge_normals[edge] = gradient_normal(field, crossing, eps)?;
                }

                let row = &TRI_TABLE[case_index];
                let mut i = 0usize;
                while i + 2 < row.len() && row[i] != -1 {
                    let e0 = row[i] as usize;
                    let e1 = row[i + 1] as usize;
                    let e2 = row[i + 2] as usize;
                    i += 3;

                    // A table row should only reference crossed edges; skip
                    // any group that does not, rather than emit garbage.
                    let all_present = [e0, e1, e2]
                        .iter()
                        .all(|&e| edge_mask & (1u16 << e) != 0);
                    if !all_present {
                        continue;
                    }

                    let (p0, p1, p2) = (edge_points[e0], edge_points[e1], edge_points[e2]);
                    let centroid = [
                        (p0[0] + p1[0] + p2[0]) / 3.0,
                        (p0[1] + p1[1] + p2[1]) / 3.0,
                        (p0[2] + p1[2] + p2[2]) / 3.0,
                    ];
                    let color = field.color(centroid[0], centroid[1], centroid[2])?;
                    // The tables are authored clockwise-from-outside under the
                    // negative-inside corner convention; swap two vertices to
                    // meet the counter-clockwise render contract.
                    buffer.emit_smooth_triangle(
                        p0,
                        edge_normals[e0],
                        p2,
                        edge_normals[e2],
                        p1,
                        edge_normals[e1],
                        color,
                    );
                }
            }
        }
    }

    Ok(())
}

#[inline]
fn grid_index(ix: usize, iy: usize, iz: usize, n: usize) -> usize {
    ix + iy * n + iz * n * n
}

#[inline]
fn grid_point(min: Point3, spacing: Point3, ix: usize, iy: usize, iz: usize) -> Point3 {
    [
        min[0] + ix as f32 * spacing[0],
        min[1] + iy as f32 * spacing[1],
        min[2] + iz as f32 * spacing[2],
    ]
}

/// Surface crossing on an edge: t = v0 / (v0 - v1), with the exact-tie
/// midpoint fallback.
#[inline]
fn interpolate_edge(p0: Point3, p1: Point3, v0: f32, v1: f32) -> Point3 {
    let dv = v0 - v1;
    let t = if dv.abs() <= f32::EPSILON { 0.5 } else { v0 / dv };
    [
        p0[0] + t * (p1[0] - p0[0]),
        p0[1] + t * (p1[1] - p0[1]),
        p0[2] + t * (p1[2] - p0[2]),
    ]
}

/// Normalized central-difference gradient of the field at `point`. Falls
/// back to unit Y when the gradient underflows to zero.
fn gradient_normal<F: ScalarField>(
    field: &mut F,
    point: Point3,
    eps: f32,
) -> Result<Point3, F::Error> {
    let [x, y, z] = point;
    let gx = field.sample(x + eps, y, z)? - field.sample(x - eps, y, z)?;
    let gy = field.sample(x, y + eps, z)? - field.sample(x, y - eps, z)?;
    let gz = field.sample(x, y, z + eps)? - field.sample(x, y, z - eps)?;
    let len = (gx * gx + gy * gy + gz * gz).sqrt();
    if len <= f32::MIN_POSITIVE {
        return Ok([0.0, 1.0, 0.0]);
    }
    Ok([gx / len, gy / len, gz / len])
}

#[cfg(test)]
mod tests {
    use scene_core::{Sdf3, sphere};

    use super::{FnField, polygonize};
    use crate::buffer::MeshBuffer;

    fn sphere_field(radius: f32) -> FnField<impl FnMut(f32, f32, f32) -> f32, impl FnMut(f32, f32, f32) -> [f32; 3]> {
        FnField {
            sdf: move |x, y, z| sphere(radius).evaluate([x, y, z]),
            color: |_, _, _| [1.0, 0.5, 0.25],
        }
    }

    fn bounds_of(buffer: &MeshBuffer) -> ([f32; 3], [f32; 3]) {
        let mut min = [f32::INFINITY; 3];
        let mut max = [f32::NEG_INFINITY; 3];
        for vertex in buffer.positions().chunks_exact(3) {
            for axis in 0..3 {
                min[axis] = min[axis].min(vertex[axis]);
                max[axis] = max[axis].max(vertex[axis]);
            }
        }
        (min, max)
    }

    #[test]
    fn field_positive_everywhere_emits_nothing() {
        let mut field = FnField {
            sdf: |_, _, _| 1.0_f32,
            color: |_, _, _| [1.0; 3],
        };
        let mut buffer = MeshBuffer::new();
        polygonize(&mut field, &mut buffer, [-1.0; 3], [1.0; 3], 10).unwrap();
        assert!(buffer.is_empty());
    }

    #[test]
    fn field_negative_everywhere_emits_nothing() {
        let mut field = FnField {
            sdf: |_, _, _| -1.0_f32,
            color: |_, _, _| [1.0; 3],
        };
        let mut buffer = MeshBuffer::new();
        polygonize(&mut field, &mut buffer, [-1.0; 3], [1.0; 3], 10).unwrap();
        assert!(buffer.is_empty());
    }

    #[test]
    fn bounds_outside_surface_emit_nothing() {
        let mut field = sphere_field(0.5);
        let mut buffer = MeshBuffer::new();
        polygonize(&mut field, &mut buffer, [2.0, 2.0, 2.0], [3.0, 3.0, 3.0], 16).unwrap();
        assert!(buffer.is_empty());
    }

    #[test]
    fn sphere_bounds_match_radius_within_a_cell() {
        let radius = 1.0_f32;
        let mut field = sphere_field(radius);
        let mut buffer = MeshBuffer::new();
        polygonize(&mut field, &mut buffer, [-1.5; 3], [1.5; 3], 32).unwrap();
        assert!(!buffer.is_empty());
        assert!(buffer.has_custom_normals());
        assert_eq!(buffer.vertex_count() % 3, 0);

        let cell = 3.0 / 32.0;
        let (min, max) = bounds_of(&buffer);
        for axis in 0..3 {
            assert!((min[axis] + radius).abs() <= cell, "min[{axis}] = {}", min[axis]);
            assert!((max[axis] - radius).abs() <= cell, "max[{axis}] = {}", max[axis]);
        }
    }

    #[test]
    fn sphere_normals_point_away_from_center() {
        let mut field = sphere_field(1.0);
        let mut buffer = MeshBuffer::new();
        polygonize(&mut field, &mut buffer, [-1.5; 3], [1.5; 3], 24).unwrap();

        let positions = buffer.positions();
        let normals = buffer.normals();
        for i in (0..buffer.vertex_count() as usize).step_by(17) {
            let p = [positions[i * 3], positions[i * 3 + 1], positions[i * 3 + 2]];
            let n = [normals[i * 3], normals[i * 3 + 1], normals[i * 3 + 2]];
            let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
            assert!((0.5..=1.5).contains(&len), "normal length {len}");
            let outward = p[0] * n[0] + p[1] * n[1] + p[2] * n[2];
            assert!(outward > 0.0, "normal at {p:?} points inward");
        }
    }

    #[test]
    fn triangle_winding_faces_outward() {
        let mut field = sphere_field(1.0);
        let mut buffer = MeshBuffer::new();
        polygonize(&mut field, &mut buffer, [-1.5; 3], [1.5; 3], 16).unwrap();

        let positions = buffer.positions();
        let triangles = buffer.triangle_count() as usize;
        let mut checked = 0usize;
        for t in 0..triangles {
            let v = |k: usize| -> [f32; 3] {
                let i = (t * 3 + k) * 3;
                [positions[i], positions[i + 1], positions[i + 2]]
            };
            let (a, b, c) = (v(0), v(1), v(2));
            let e1 = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
            let e2 = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
            let face = [
                e1[1] * e2[2] - e1[2] * e2[1],
                e1[2] * e2[0] - e1[0] * e2[2],
                e1[0] * e2[1] - e1[1] * e2[0],
            ];
            let area2 = face[0] * face[0] + face[1] * face[1] + face[2] * face[2];
            if area2 < 1e-12 {
                // Sliver where the surface grazes a grid vertex; its sign is
                // numerically meaningless.
                continue;
            }
            let centroid = [
                (a[0] + b[0] + c[0]) / 3.0,
                (a[1] + b[1] + c[1]) / 3.0,
                (a[2] + b[2] + c[2]) / 3.0,
            ];
            let dot = face[0] * centroid[0] + face[1] * centroid[1] + face[2] * centroid[2];
            assert!(dot > 0.0, "triangle {t} wound inward");
            checked += 1;
        }
        assert!(checked > triangles / 2, "too few well-formed triangles");
    }

    #[test]
    fn colors_come_from_the_color_callback() {
        let mut field = sphere_field(1.0);
        let mut buffer = MeshBuffer::new();
        polygonize(&mut field, &mut buffer, [-1.5; 3], [1.5; 3], 8).unwrap();
        for chunk in buffer.colors().chunks_exact(3) {
            assert_eq!(chunk, [1.0, 0.5, 0.25]);
        }
    }

    #[test]
    fn sampling_errors_propagate() {
        struct Failing;
        impl super::ScalarField for Failing {
            type Error = &'static str;
            fn sample(&mut self, _: f32, _: f32, _: f32) -> Result<f32, &'static str> {
                Err("boom")
            }
            fn color(&mut self, _: f32, _: f32, _: f32) -> Result<[f32; 3], &'static str> {
                Ok([0.0; 3])
            }
        }
        let mut buffer = MeshBuffer::new();
        let result = polygonize(&mut Failing, &mut buffer, [-1.0; 3], [1.0; 3], 4);
        assert_eq!(result, Err("boom"));
    }
}
