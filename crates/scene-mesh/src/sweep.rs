//! Swept surfaces: `lathe` (surface of revolution) and `extrude_path`
//! (profile carried along a 3D spine with rotation-minimizing frames).

use std::f32::consts::TAU;

use scene_core::Point3;

use crate::buffer::MeshBuffer;

#[inline]
fn sub(a: Point3, b: Point3) -> Point3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
fn dot(a: Point3, b: Point3) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
fn cross(a: Point3, b: Point3) -> Point3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[inline]
fn length(v: Point3) -> f32 {
    dot(v, v).sqrt()
}

#[inline]
fn normalize(v: Point3) -> Option<Point3> {
    let len = length(v);
    if len <= 1.0e-12 {
        None
    } else {
        Some([v[0] / len, v[1] / len, v[2] / len])
    }
}

/// Revolves a profile of `(radius, y_offset)` pairs (ordered bottom to top)
/// around the vertical axis through `center`. Each adjacent profile pair
/// becomes a ring of quads; a zero-radius end collapses its quads to pole
/// triangles. Winding keeps outward normals pointing away from the axis.
pub fn lathe(
    buffer: &mut MeshBuffer,
    center: Point3,
    profile: &[[f32; 2]],
    segments: u32,
    angle_offset: f32,
    color: Point3,
) {
    if profile.len() < 2 || segments < 3 {
        return;
    }

    let ring_point = |radius: f32, y: f32, angle: f32| -> Point3 {
        [
            center[0] + radius * angle.cos(),
            center[1] + y,
            center[2] + radius * angle.sin(),
        ]
    };

    for pair in profile.windows(2) {
        let [r0, y0] = pair[0];
        let [r1, y1] = pair[1];
        if r0 <= f32::EPSILON && r1 <= f32::EPSILON {
            continue;
        }

        for s in 0..segments {
            let a0 = angle_offset + TAU * s as f32 / segments as f32;
            let a1 = angle_offset + TAU * (s + 1) as f32 / segments as f32;

            if r0 <= f32::EPSILON {
                // Bottom pole: one triangle up to the ring above.
                let pole = ring_point(0.0, y0, 0.0);
                buffer.emit_triangle(pole, ring_point(r1, y1, a0), ring_point(r1, y1, a1), color);
            } else if r1 <= f32::EPSILON {
                // Top pole.
                let pole = ring_point(0.0, y1, 0.0);
                buffer.emit_triangle(ring_point(r0, y0, a0), pole, ring_point(r0, y0, a1), color);
            } else {
                buffer.emit_quad(
                    ring_point(r0, y0, a0),
                    ring_point(r1, y1, a0),
                    ring_point(r1, y1, a1),
                    ring_point(r0, y0, a1),
                    color,
                );
            }
        }
    }
}

/// Sweeps a 2D profile along a 3D path using double-reflection
/// rotation-minimizing frames. `closed` wraps the last profile point back
/// to the first, forming a tube. Degenerate path segments inherit the
/// previous frame; fewer than two profile or path points emits nothing.
pub fn extrude_path(
    buffer: &mut MeshBuffer,
    profile: &[[f32; 2]],
    path: &[Point3],
    closed: bool,
    color: Point3,
) {
    if profile.len() < 2 || path.len() < 2 {
        return;
    }
    let n = path.len();

    // Per-vertex tangents: one-sided at the ends, centered inside.
    let mut tangents = vec![[0.0_f32; 3]; n];
    let mut prev = [0.0, 1.0, 0.0];
    for k in 0..n {
        let raw = if k == 0 {
            sub(path[1], path[0])
        } else if k == n - 1 {
            sub(path[n - 1], path[n - 2])
        } else {
            sub(path[k + 1], path[k - 1])
        };
        tangents[k] = normalize(raw).unwrap_or(prev);
        prev = tangents[k];
    }

    // Initial frame from any axis not parallel to the first tangent.
    let t0 = tangents[0];
    let seed = if t0[0].abs() < 0.9 {
        [1.0, 0.0, 0.0]
    } else {
        [0.0, 1.0, 0.0]
    };
    let n0 = normalize(cross(t0, seed)).unwrap_or([0.0, 0.0, 1.0]);

    let mut normals = vec![[0.0_f32; 3]; n];
    let mut binormals = vec![[0.0_f32; 3]; n];
    normals[0] = n0;
    binormals[0] = cross(t0, n0);

    // Double-reflection propagation: reflect through the segment bisector,
    // then through the bisector of the reflected and actual tangents.
    for k in 1..n {
        let v1 = sub(path[k], path[k - 1]);
        let c1 = dot(v1, v1);
        if c1 <= 1.0e-12 {
            normals[k] = normals[k - 1];
            binormals[k] = binormals[k - 1];
            continue;
        }
        let reflect = |v: Point3, axis: Point3, c: f32| -> Point3 {
            let scale = 2.0 * dot(axis, v) / c;
            [
                v[0] - scale * axis[0],
                v[1] - scale * axis[1],
                v[2] - scale * axis[2],
            ]
        };
        let r_l = reflect(normals[k - 1], v1, c1);
        let t_l = reflect(tangents[k - 1], v1, c1);
        let v2 = sub(tangents[k], t_l);
        let c2 = dot(v2, v2);
        normals[k] = if c2 <= 1.0e-12 {
            r_l
        } else {
            reflect(r_l, v2, c2)
        };
        binormals[k] = cross(tangents[k], normals[k]);
    }

    let ring = |k: usize, j: usize| -> Point3 {
        let [u, v] = profile[j];
        [
            path[k][0] + u * normals[k][0] + v * binormals[k][0],
            path[k][1] + u * normals[k][1] + v * binormals[k][1],
            path[k][2] + u * normals[k][2] + v * binormals[k][2],
        ]
    };

    let p = profile.len();
    for k in 0..n - 1 {
        for j in 0..p - 1 {
            buffer.emit_quad(ring(k, j), ring(k, j + 1), ring(k + 1, j + 1), ring(k + 1, j), color);
        }
        if closed {
            buffer.emit_quad(ring(k, p - 1), ring(k, 0), ring(k + 1, 0), ring(k + 1, p - 1), color);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::TAU;

    use super::{extrude_path, lathe};
    use crate::buffer::MeshBuffer;

    fn vertex(buffer: &MeshBuffer, i: usize) -> [f32; 3] {
        let p = buffer.positions();
        [p[i * 3], p[i * 3 + 1], p[i * 3 + 2]]
    }

    #[test]
    fn lathe_two_rings_emit_one_quad_per_segment() {
        let mut buffer = MeshBuffer::new();
        lathe(
            &mut buffer,
            [0.0, 0.0, 0.0],
            &[[1.0, 0.0], [1.0, 2.0]],
            16,
            0.0,
            [0.5; 3],
        );
        assert_eq!(buffer.vertex_count(), 16 * 6);
        assert!(!buffer.has_custom_normals());
    }

    #[test]
    fn lathe_cone_profile_emits_cap_triangles() {
        let mut buffer = MeshBuffer::new();
        lathe(
            &mut buffer,
            [0.0, 0.0, 0.0],
            &[[1.0, 0.0], [0.0, 2.0]],
            12,
            0.0,
            [0.5; 3],
        );
        // One triangle per segment for the single pole pair.
        assert_eq!(buffer.vertex_count(), 12 * 3);
    }

    #[test]
    fn lathe_degenerate_profile_emits_nothing() {
        let mut buffer = MeshBuffer::new();
        lathe(
            &mut buffer,
            [0.0, 0.0, 0.0],
            &[[0.0, 0.0], [0.0, 2.0]],
            12,
            0.0,
            [0.5; 3],
        );
        assert!(buffer.is_empty());

        lathe(&mut buffer, [0.0, 0.0, 0.0], &[[1.0, 0.0]], 12, 0.0, [0.5; 3]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn lathe_bottom_sits_at_center_height() {
        let mut buffer = MeshBuffer::new();
        let center = [1.0, -0.5, 2.0];
        lathe(&mut buffer, center, &[[0.8, 0.0], [0.4, 1.0]], 8, 0.0, [0.5; 3]);

        let mut min_y = f32::INFINITY;
        let mut max_y = f32::NEG_INFINITY;
        for i in 0..buffer.vertex_count() as usize {
            let v = vertex(&buffer, i);
            min_y = min_y.min(v[1]);
            max_y = max_y.max(v[1]);
        }
        assert!((min_y - center[1]).abs() < 1e-6);
        assert!((max_y - (center[1] + 1.0)).abs() < 1e-6);
    }

    #[test]
    fn lathe_winding_points_away_from_axis() {
        let mut buffer = MeshBuffer::new();
        lathe(
            &mut buffer,
            [0.0, 0.0, 0.0],
            &[[1.0, 0.0], [1.0, 1.0]],
            24,
            0.0,
            [0.5; 3],
        );

        for t in 0..buffer.triangle_count() as usize {
            let a = vertex(&buffer, t * 3);
            let b = vertex(&buffer, t * 3 + 1);
            let c = vertex(&buffer, t * 3 + 2);
            let e1 = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
            let e2 = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
            let face = [
                e1[1] * e2[2] - e1[2] * e2[1],
                e1[2] * e2[0] - e1[0] * e2[2],
                e1[0] * e2[1] - e1[1] * e2[0],
            ];
            let centroid = [(a[0] + b[0] + c[0]) / 3.0, 0.0, (a[2] + b[2] + c[2]) / 3.0];
            let outward = face[0] * centroid[0] + face[2] * centroid[2];
            assert!(outward > 0.0, "triangle {t} faces the axis");
        }
    }

    #[test]
    fn extrude_straight_path_gives_right_cylinder() {
        let profile: Vec<[f32; 2]> = (0..12)
            .map(|i| {
                let a = TAU * i as f32 / 12.0;
                [0.5 * a.cos(), 0.5 * a.sin()]
            })
            .collect();
        let path: Vec<[f32; 3]> = (0..8).map(|k| [0.0, 0.0, k as f32 * 0.25]).collect();

        let mut buffer = MeshBuffer::new();
        extrude_path(&mut buffer, &profile, &path, true, [0.5; 3]);

        assert_eq!(buffer.vertex_count(), 7 * 12 * 6);
        for i in 0..buffer.vertex_count() as usize {
            let v = vertex(&buffer, i);
            let radius = (v[0] * v[0] + v[1] * v[1]).sqrt();
            assert!(
                (radius - 0.5).abs() < 1e-4,
                "vertex {i} off the cylinder: radius {radius}"
            );
        }
    }

    #[test]
    fn extrude_open_profile_skips_wraparound() {
        let profile = [[-0.5, 0.0], [0.5, 0.0]];
        let path = [[0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 2.0, 0.0]];
        let mut buffer = MeshBuffer::new();
        extrude_path(&mut buffer, &profile, &path, false, [0.5; 3]);
        // One strip of quads, no closing seam.
        assert_eq!(buffer.vertex_count(), 2 * 1 * 6);
    }

    #[test]
    fn extrude_short_inputs_emit_nothing() {
        let mut buffer = MeshBuffer::new();
        extrude_path(&mut buffer, &[[0.0, 0.0]], &[[0.0; 3], [1.0, 0.0, 0.0]], false, [0.5; 3]);
        assert!(buffer.is_empty());
        extrude_path(&mut buffer, &[[0.0, 0.0], [1.0, 0.0]], &[[0.0; 3]], false, [0.5; 3]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn extrude_tolerates_duplicate_path_points() {
        let profile = [[-0.2, 0.0], [0.2, 0.0], [0.0, 0.3]];
        let path = [
            [0.0, 0.0, 0.0],
            [0.0, 0.0, 1.0],
            [0.0, 0.0, 1.0],
            [0.0, 0.0, 2.0],
        ];
        let mut buffer = MeshBuffer::new();
        extrude_path(&mut buffer, &profile, &path, true, [0.5; 3]);
        assert!(!buffer.is_empty());
        for value in buffer.positions() {
            assert!(value.is_finite());
        }
    }

    #[test]
    fn extrude_rmf_avoids_roll_on_gentle_curve() {
        // A quarter arc; ring radii must stay near the profile radius, which
        // fails if the frame flips or rolls between samples.
        let profile: Vec<[f32; 2]> = (0..8)
            .map(|i| {
                let a = TAU * i as f32 / 8.0;
                [0.1 * a.cos(), 0.1 * a.sin()]
            })
            .collect();
        let path: Vec<[f32; 3]> = (0..24)
            .map(|k| {
                let t = k as f32 / 23.0 * TAU * 0.25;
                [t.cos(), 0.0, t.sin()]
            })
            .collect();

        let mut buffer = MeshBuffer::new();
        extrude_path(&mut buffer, &profile, &path, true, [0.5; 3]);

        for i in 0..buffer.vertex_count() as usize {
            let v = vertex(&buffer, i);
            let to_arc = ((v[0] * v[0] + v[2] * v[2]).sqrt() - 1.0).hypot(v[1]);
            assert!(to_arc < 0.12, "vertex {i} strayed {to_arc} from the tube");
        }
    }
}
