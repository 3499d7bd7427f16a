use scene_core::Point3;

/// First allocation, in vertex slots. Later growth doubles.
const INITIAL_VERTEX_CAPACITY: usize = 300_000;

/// Flat, non-indexed triangle soup: three parallel f32 channels, three
/// vertices per triangle. Vertices `3k, 3k+1, 3k+2` form triangle `k`.
///
/// The `normals` channel is always the same length as the others; it holds
/// zeros for vertices emitted without an explicit normal. Renderers check
/// `has_custom_normals` to decide whether to synthesize face normals.
#[derive(Debug, Clone, Default)]
pub struct MeshBuffer {
    positions: Vec<f32>,
    colors: Vec<f32>,
    normals: Vec<f32>,
    vertex_count: u32,
    has_custom_normals: bool,
}

impl MeshBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn positions(&self) -> &[f32] {
        &self.positions
    }

    pub fn colors(&self) -> &[f32] {
        &self.colors
    }

    pub fn normals(&self) -> &[f32] {
        &self.normals
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn triangle_count(&self) -> u32 {
        self.vertex_count / 3
    }

    pub fn has_custom_normals(&self) -> bool {
        self.has_custom_normals
    }

    pub fn is_empty(&self) -> bool {
        self.vertex_count == 0
    }

    /// Grows each channel so `additional` more vertices fit, doubling from
    /// the initial capacity. Callers must not hold slot references across
    /// emissions; emitters accept values only.
    fn ensure_capacity(&mut self, additional: usize) {
        let needed = self.vertex_count as usize + additional;
        let current = self.positions.capacity() / 3;
        if needed <= current {
            return;
        }
        let mut target = current.max(INITIAL_VERTEX_CAPACITY);
        while target < needed {
            target *= 2;
        }
        let grow = target * 3 - self.positions.len();
        self.positions.reserve_exact(grow);
        self.colors.reserve_exact(grow);
        self.normals.reserve_exact(grow);
    }

    #[inline]
    fn push_vertex(&mut self, position: Point3, normal: Point3, color: Point3) {
        self.positions.extend_from_slice(&position);
        self.normals.extend_from_slice(&normal);
        self.colors.extend_from_slice(&color);
        self.vertex_count += 1;
    }

    /// Emits one flat-shaded triangle; all three vertices share `color`.
    pub fn emit_triangle(&mut self, p1: Point3, p2: Point3, p3: Point3, color: Point3) {
        self.ensure_capacity(3);
        self.push_vertex(p1, [0.0; 3], color);
        self.push_vertex(p2, [0.0; 3], color);
        self.push_vertex(p3, [0.0; 3], color);
    }

    /// Emits a quad as two triangles `(p1,p2,p3)` and `(p1,p3,p4)`,
    /// preserving the caller's winding.
    pub fn emit_quad(&mut self, p1: Point3, p2: Point3, p3: Point3, p4: Point3, color: Point3) {
        self.emit_triangle(p1, p2, p3, color);
        self.emit_triangle(p1, p3, p4, color);
    }

    /// Emits one triangle with per-vertex normals.
    #[allow(clippy::too_many_arguments)]
    pub fn emit_smooth_triangle(
        &mut self,
        p1: Point3,
        n1: Point3,
        p2: Point3,
        n2: Point3,
        p3: Point3,
        n3: Point3,
        color: Point3,
    ) {
        self.ensure_capacity(3);
        self.push_vertex(p1, n1, color);
        self.push_vertex(p2, n2, color);
        self.push_vertex(p3, n3, color);
        self.has_custom_normals = true;
    }

    /// Moves every vertex of `other` onto the end of this buffer, in order.
    pub fn append(&mut self, other: MeshBuffer) {
        self.ensure_capacity(other.vertex_count as usize);
        self.positions.extend_from_slice(&other.positions);
        self.colors.extend_from_slice(&other.colors);
        self.normals.extend_from_slice(&other.normals);
        self.vertex_count += other.vertex_count;
        self.has_custom_normals |= other.has_custom_normals;
    }
}

/// Optional PBR-ish hints attached to a layer. Unset fields are the
/// renderer's choice; repeated writes replace field-by-field.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MaterialHints {
    pub roughness: Option<f32>,
    pub metalness: Option<f32>,
    pub opacity: Option<f32>,
}

impl MaterialHints {
    pub fn merge(&mut self, other: MaterialHints) {
        if other.roughness.is_some() {
            self.roughness = other.roughness;
        }
        if other.metalness.is_some() {
            self.metalness = other.metalness;
        }
        if other.opacity.is_some() {
            self.opacity = other.opacity;
        }
    }
}
