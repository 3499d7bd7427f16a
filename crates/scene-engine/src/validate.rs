//! Post-execution mesh checks. Errors abort the generation; warnings ride
//! along with the successful result.

use scene_mesh::MeshBuffer;

/// Hard ceiling on emitted vertices.
const VERTEX_HARD_LIMIT: u32 = 500_000;
/// Soft ceiling that only warns.
const VERTEX_SOFT_LIMIT: u32 = 100_000;
/// Positions further out than this are almost certainly misplaced.
const OFF_SCENE_DISTANCE: f32 = 1000.0;
/// How many triangles the degeneracy check samples at most.
const DEGENERACY_SAMPLE_LIMIT: u32 = 1000;
const DEGENERACY_EPSILON: f32 = 1.0e-20;

#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

pub fn validate_mesh(buffer: &MeshBuffer) -> ValidationReport {
    let mut report = ValidationReport::default();
    let vertex_count = buffer.vertex_count();

    if vertex_count >= VERTEX_HARD_LIMIT {
        report.errors.push(format!(
            "mesh has {vertex_count} vertices, at or beyond the {VERTEX_HARD_LIMIT} hard limit"
        ));
    } else if vertex_count >= VERTEX_SOFT_LIMIT {
        report.warnings.push(format!(
            "mesh has {vertex_count} vertices; consider reducing resolution"
        ));
    }
    if vertex_count == 0 {
        report
            .warnings
            .push("no geometry was produced (zero vertices)".to_string());
    }

    let positions = buffer.positions();
    let non_finite_positions = positions.iter().filter(|v| !v.is_finite()).count();
    if non_finite_positions > 0 {
        report.errors.push(format!(
            "{non_finite_positions} non-finite position component(s)"
        ));
    } else if positions.chunks_exact(3).any(|v| {
        (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt() > OFF_SCENE_DISTANCE
    }) {
        report.warnings.push(format!(
            "some positions lie more than {OFF_SCENE_DISTANCE} units from the origin"
        ));
    }

    if buffer.colors().iter().any(|v| !v.is_finite()) {
        report
            .warnings
            .push("non-finite color component(s)".to_string());
    }
    if buffer.has_custom_normals() && buffer.normals().iter().any(|v| !v.is_finite()) {
        report
            .warnings
            .push("non-finite normal component(s)".to_string());
    }

    // Degeneracy sampling only makes sense on finite positions.
    if non_finite_positions == 0
        && let Some(warning) = degenerate_triangle_warning(buffer)
    {
        report.warnings.push(warning);
    }

    report
}

/// Samples up to [`DEGENERACY_SAMPLE_LIMIT`] triangles with a uniform
/// stride; reports the raw hit count and the stride-scaled estimate.
fn degenerate_triangle_warning(buffer: &MeshBuffer) -> Option<String> {
    let triangle_count = buffer.triangle_count();
    if triangle_count == 0 {
        return None;
    }
    let stride = triangle_count.div_ceil(DEGENERACY_SAMPLE_LIMIT).max(1);
    let positions = buffer.positions();

    let mut sampled = 0u32;
    let mut degenerate = 0u32;
    let mut t = 0u32;
    while t < triangle_count {
        let base = (t as usize) * 9;
        let a = &positions[base..base + 3];
        let b = &positions[base + 3..base + 6];
        let c = &positions[base + 6..base + 9];
        let e1 = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
        let e2 = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
        let cross = [
            e1[1] * e2[2] - e1[2] * e2[1],
            e1[2] * e2[0] - e1[0] * e2[2],
            e1[0] * e2[1] - e1[1] * e2[0],
        ];
        let squared = cross[0] * cross[0] + cross[1] * cross[1] + cross[2] * cross[2];
        if squared < DEGENERACY_EPSILON {
            degenerate += 1;
        }
        sampled += 1;
        t += stride;
    }

    if degenerate == 0 {
        return None;
    }
    let estimated = degenerate.saturating_mul(stride);
    Some(format!(
        "~{estimated} degenerate triangle(s) estimated ({degenerate} found in a sample of {sampled})"
    ))
}

#[cfg(test)]
mod tests {
    use super::validate_mesh;
    use scene_mesh::MeshBuffer;

    #[test]
    fn empty_buffer_warns_without_error() {
        let report = validate_mesh(&MeshBuffer::new());
        assert!(report.is_ok());
        assert!(report.warnings.iter().any(|w| w.contains("zero vertices")));
    }

    #[test]
    fn healthy_mesh_passes_clean() {
        let mut buffer = MeshBuffer::new();
        buffer.emit_triangle([0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.5; 3]);
        let report = validate_mesh(&buffer);
        assert!(report.is_ok());
        assert!(report.warnings.is_empty(), "{:?}", report.warnings);
    }

    #[test]
    fn non_finite_positions_are_an_error() {
        let mut buffer = MeshBuffer::new();
        buffer.emit_triangle([f32::NAN, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.5; 3]);
        let report = validate_mesh(&buffer);
        assert!(!report.is_ok());
        assert!(report.errors[0].contains("non-finite position"));
    }

    #[test]
    fn far_positions_only_warn() {
        let mut buffer = MeshBuffer::new();
        buffer.emit_triangle([5000.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.5; 3]);
        let report = validate_mesh(&buffer);
        assert!(report.is_ok());
        assert!(report.warnings.iter().any(|w| w.contains("1000")));
    }

    #[test]
    fn off_scene_uses_vertex_magnitude_not_components() {
        // No single component exceeds the limit, but the vertex magnitude
        // (~1273) does.
        let mut buffer = MeshBuffer::new();
        buffer.emit_triangle([900.0, 900.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.5; 3]);
        let report = validate_mesh(&buffer);
        assert!(report.is_ok());
        assert!(report.warnings.iter().any(|w| w.contains("1000")));

        // A vertex whose magnitude stays under the limit is not flagged.
        let mut near = MeshBuffer::new();
        near.emit_triangle([700.0, 700.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.5; 3]);
        let report = validate_mesh(&near);
        assert!(!report.warnings.iter().any(|w| w.contains("1000")), "{:?}", report.warnings);
    }

    #[test]
    fn non_finite_colors_only_warn() {
        let mut buffer = MeshBuffer::new();
        buffer.emit_triangle(
            [0.0; 3],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [f32::INFINITY, 0.0, 0.0],
        );
        let report = validate_mesh(&buffer);
        assert!(report.is_ok());
        assert!(report.warnings.iter().any(|w| w.contains("color")));
    }

    #[test]
    fn degenerate_triangles_are_estimated() {
        let mut buffer = MeshBuffer::new();
        for _ in 0..10 {
            // Zero-area: all three vertices identical.
            buffer.emit_triangle([1.0; 3], [1.0; 3], [1.0; 3], [0.5; 3]);
        }
        let report = validate_mesh(&buffer);
        assert!(report.is_ok());
        let warning = report
            .warnings
            .iter()
            .find(|w| w.contains("degenerate"))
            .expect("degeneracy warning");
        assert!(warning.contains("10"), "{warning}");
    }

    #[test]
    fn vertex_count_thresholds_split_warning_and_error() {
        let mut buffer = MeshBuffer::new();
        // 34000 triangles = 102k vertices: above the soft limit, below hard.
        for i in 0..34_000 {
            let x = i as f32 * 1e-4;
            buffer.emit_triangle([x, 0.0, 0.0], [x + 0.1, 0.0, 0.0], [x, 0.1, 0.0], [0.5; 3]);
        }
        let report = validate_mesh(&buffer);
        assert!(report.is_ok());
        assert!(report.warnings.iter().any(|w| w.contains("vertices")));
    }
}
