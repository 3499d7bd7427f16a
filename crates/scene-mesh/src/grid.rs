//! Heightfield grid emitter for terrain-style surfaces.

use std::convert::Infallible;

use scene_core::Point3;

use crate::buffer::MeshBuffer;

/// Height and color sampled over the XZ plane. Fallible for the same reason
/// as [`crate::ScalarField`]: script callbacks can raise runtime errors.
pub trait HeightField {
    type Error;

    fn height(&mut self, x: f32, z: f32) -> Result<f32, Self::Error>;
    fn color(&mut self, x: f32, z: f32) -> Result<Point3, Self::Error>;
}

/// Adapter for plain closures.
pub struct FnHeightField<H, C> {
    pub height: H,
    pub color: C,
}

impl<H, C> HeightField for FnHeightField<H, C>
where
    H: FnMut(f32, f32) -> f32,
    C: FnMut(f32, f32) -> Point3,
{
    type Error = Infallible;

    fn height(&mut self, x: f32, z: f32) -> Result<f32, Infallible> {
        Ok((self.height)(x, z))
    }

    fn color(&mut self, x: f32, z: f32) -> Result<Point3, Infallible> {
        Ok((self.color)(x, z))
    }
}

/// Emits a `res_x` by `res_z` cell heightfield over the rectangle
/// `(x0, z0)`–`(x1, z1)`. Heights are precomputed at the grid vertices; each
/// cell becomes one quad colored at its centroid, wound to face +Y.
pub fn heightfield<F: HeightField>(
    field: &mut F,
    buffer: &mut MeshBuffer,
    x0: f32,
    z0: f32,
    x1: f32,
    z1: f32,
    res_x: u32,
    res_z: u32,
) -> Result<(), F::Error> {
    if res_x == 0 || res_z == 0 {
        return Ok(());
    }
    let nx = res_x as usize + 1;
    let nz = res_z as usize + 1;
    // Interpolate by fraction so the final row/column lands exactly on the
    // rectangle edge.
    let grid_x = |ix: usize| x0 + (x1 - x0) * (ix as f32 / res_x as f32);
    let grid_z = |iz: usize| z0 + (z1 - z0) * (iz as f32 / res_z as f32);

    let mut heights = vec![0.0_f32; nx * nz];
    for iz in 0..nz {
        for ix in 0..nx {
            heights[ix + iz * nx] = field.height(grid_x(ix), grid_z(iz))?;
        }
    }

    for iz in 0..res_z as usize {
        for ix in 0..res_x as usize {
            let xa = grid_x(ix);
            let xb = grid_x(ix + 1);
            let za = grid_z(iz);
            let zb = grid_z(iz + 1);

            let h00 = heights[ix + iz * nx];
            let h10 = heights[ix + 1 + iz * nx];
            let h01 = heights[ix + (iz + 1) * nx];
            let h11 = heights[ix + 1 + (iz + 1) * nx];

            let color = field.color((xa + xb) * 0.5, (za + zb) * 0.5)?;
            buffer.emit_quad(
                [xa, h00, za],
                [xa, h01, zb],
                [xb, h11, zb],
                [xb, h10, za],
                color,
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{FnHeightField, heightfield};
    use crate::buffer::MeshBuffer;

    #[test]
    fn flat_grid_has_expected_counts_and_bounds() {
        let mut field = FnHeightField {
            height: |_, _| -1.5_f32,
            color: |_, _| [0.35, 0.32, 0.28],
        };
        let mut buffer = MeshBuffer::new();
        heightfield(&mut field, &mut buffer, -3.0, -6.0, 3.0, 0.0, 20, 20).unwrap();

        assert_eq!(buffer.vertex_count(), 20 * 20 * 6);
        assert!(!buffer.has_custom_normals());

        for chunk in buffer.positions().chunks_exact(3) {
            assert!((-3.0..=3.0).contains(&chunk[0]));
            assert_eq!(chunk[1], -1.5);
            assert!((-6.0..=0.0).contains(&chunk[2]));
        }
    }

    #[test]
    fn quads_face_up() {
        let mut field = FnHeightField {
            height: |_, _| 0.0_f32,
            color: |_, _| [1.0; 3],
        };
        let mut buffer = MeshBuffer::new();
        heightfield(&mut field, &mut buffer, 0.0, 0.0, 1.0, 1.0, 2, 2).unwrap();

        let positions = buffer.positions();
        for t in 0..buffer.triangle_count() as usize {
            let v = |k: usize| -> [f32; 3] {
                let i = (t * 3 + k) * 3;
                [positions[i], positions[i + 1], positions[i + 2]]
            };
            let (a, b, c) = (v(0), v(1), v(2));
            let e1 = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
            let e2 = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
            let ny = e1[2] * e2[0] - e1[0] * e2[2];
            assert!(ny > 0.0, "triangle {t} does not face +Y");
        }
    }

    #[test]
    fn heights_follow_the_callback() {
        let mut field = FnHeightField {
            height: |x, z| x + z,
            color: |_, _| [1.0; 3],
        };
        let mut buffer = MeshBuffer::new();
        heightfield(&mut field, &mut buffer, 0.0, 0.0, 2.0, 2.0, 2, 2).unwrap();

        for chunk in buffer.positions().chunks_exact(3) {
            assert!((chunk[1] - (chunk[0] + chunk[2])).abs() < 1e-6);
        }
    }

    #[test]
    fn colors_sample_cell_centroids() {
        let mut field = FnHeightField {
            height: |_, _| 0.0_f32,
            color: |x, z| [x, z, 0.0],
        };
        let mut buffer = MeshBuffer::new();
        heightfield(&mut field, &mut buffer, 0.0, 0.0, 1.0, 1.0, 1, 1).unwrap();

        for chunk in buffer.colors().chunks_exact(3) {
            assert_eq!(&chunk[..2], &[0.5, 0.5]);
        }
    }

    #[test]
    fn zero_resolution_emits_nothing() {
        let mut field = FnHeightField {
            height: |_, _| 0.0_f32,
            color: |_, _| [1.0; 3],
        };
        let mut buffer = MeshBuffer::new();
        heightfield(&mut field, &mut buffer, 0.0, 0.0, 1.0, 1.0, 0, 5).unwrap();
        assert!(buffer.is_empty());
    }
}
