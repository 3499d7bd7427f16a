//! Layers, bounds, and the spatial relationships reported to the LLM
//! between turns.

use scene_mesh::{MaterialHints, MeshBuffer};
use serde::Serialize;

pub type Vec3 = [f32; 3];

/// Axis-aligned bounding box. An empty mesh is represented by all zeros.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
    pub center: Vec3,
}

impl Aabb {
    pub fn zero() -> Self {
        Self {
            min: [0.0; 3],
            max: [0.0; 3],
            center: [0.0; 3],
        }
    }

    /// Scans a flat position array. Returns the zero box for empty input.
    pub fn from_positions(positions: &[f32]) -> Self {
        if positions.is_empty() {
            return Self::zero();
        }
        let mut min = [f32::INFINITY; 3];
        let mut max = [f32::NEG_INFINITY; 3];
        for vertex in positions.chunks_exact(3) {
            for axis in 0..3 {
                min[axis] = min[axis].min(vertex[axis]);
                max[axis] = max[axis].max(vertex[axis]);
            }
        }
        let center = [
            (min[0] + max[0]) * 0.5,
            (min[1] + max[1]) * 0.5,
            (min[2] + max[2]) * 0.5,
        ];
        Self { min, max, center }
    }

    /// True iff every axis has positive intersection.
    pub fn overlaps(&self, other: &Aabb) -> bool {
        (0..3).all(|axis| {
            self.min[axis].max(other.min[axis]) < self.max[axis].min(other.max[axis])
        })
    }

    pub fn size(&self) -> Vec3 {
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

const AXES: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

/// A separating or penetrating axis with its magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AxisMeasure {
    pub axis: Axis,
    pub magnitude: f32,
}

/// For separated boxes: the axis with the largest positive gap.
pub fn gap_between(a: &Aabb, b: &Aabb) -> Option<AxisMeasure> {
    let mut best: Option<AxisMeasure> = None;
    for (index, axis) in AXES.into_iter().enumerate() {
        let gap = (a.min[index] - b.max[index]).max(b.min[index] - a.max[index]);
        if gap > 0.0 && best.map(|m| gap > m.magnitude).unwrap_or(true) {
            best = Some(AxisMeasure {
                axis,
                magnitude: gap,
            });
        }
    }
    best
}

/// For overlapping boxes: the axis with the smallest positive overlap
/// (the shallowest way out).
pub fn penetration_between(a: &Aabb, b: &Aabb) -> Option<AxisMeasure> {
    let mut best: Option<AxisMeasure> = None;
    for (index, axis) in AXES.into_iter().enumerate() {
        let overlap = a.max[index].min(b.max[index]) - a.min[index].max(b.min[index]);
        if overlap <= 0.0 {
            return None;
        }
        if best.map(|m| overlap < m.magnitude).unwrap_or(true) {
            best = Some(AxisMeasure {
                axis,
                magnitude: overlap,
            });
        }
    }
    best
}

pub fn center_distance(a: &Aabb, b: &Aabb) -> f32 {
    let dx = a.center[0] - b.center[0];
    let dy = a.center[1] - b.center[1];
    let dz = a.center[2] - b.center[2];
    (dx * dx + dy * dy + dz * dz).sqrt()
}

/// One generation's output: an owned mesh plus metadata under a stable id.
#[derive(Debug)]
pub struct Layer {
    pub id: String,
    pub description: String,
    pub mesh: MeshBuffer,
    pub material: MaterialHints,
    pub bounds: Aabb,
    pub vertex_count: u32,
}

/// The summary exposed to the LLM between turns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerMeta {
    pub id: String,
    pub description: String,
    pub bounds: Aabb,
    pub vertex_count: u32,
}

/// How a new layer relates to one prior layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpatialRelationship {
    pub id: String,
    pub description: String,
    pub overlaps: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gap: Option<AxisMeasure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub penetration: Option<AxisMeasure>,
    pub center_distance: f32,
}

/// Relationships to every prior layer, in insertion order, plus the id of
/// the nearest one. Absent when there are no prior layers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpatialAnalysis {
    pub relationships: Vec<SpatialRelationship>,
    pub nearest: String,
}

pub fn analyze_spatial(bounds: &Aabb, prior: &[Layer]) -> Option<SpatialAnalysis> {
    if prior.is_empty() {
        return None;
    }

    let mut relationships = Vec::with_capacity(prior.len());
    let mut nearest = (prior[0].id.clone(), f32::INFINITY);
    for layer in prior {
        let overlaps = bounds.overlaps(&layer.bounds);
        let distance = center_distance(bounds, &layer.bounds);
        relationships.push(SpatialRelationship {
            id: layer.id.clone(),
            description: layer.description.clone(),
            overlaps,
            gap: if overlaps {
                None
            } else {
                gap_between(bounds, &layer.bounds)
            },
            penetration: if overlaps {
                penetration_between(bounds, &layer.bounds)
            } else {
                None
            },
            center_distance: distance,
        });
        // Strict comparison keeps the first layer on ties.
        if distance < nearest.1 {
            nearest = (layer.id.clone(), distance);
        }
    }

    Some(SpatialAnalysis {
        relationships,
        nearest: nearest.0,
    })
}
