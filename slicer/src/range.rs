use nalgebra::Matrix4;

use crate::{
    bounds::Aabb,
    error::DegenerateReason,
    mesh::Mesh,
    plane::Plane,
    Result, SliceError,
};

/// Slack for float error when turning a step fraction into a layer count.
const COUNT_EPSILON: f32 = 1e-5;

/// Plane offsets that bound a mesh and the fraction of that span covered by
/// one physical layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliceRange {
    /// Offset at which the plane first touches the mesh.
    pub offset_min: f32,
    /// Offset at which the plane last touches the mesh.
    pub offset_max: f32,
    /// Fraction of `offset_max - offset_min` between consecutive layers.
    pub step_fraction: f32,
}

impl SliceRange {
    /// Computes the range for a mesh under its current transform.
    pub fn compute(mesh: &Mesh, plane: &Plane, thickness: f32) -> Result<Self> {
        let bounds = mesh.local_bounds()?;
        Self::from_bounds(&bounds, mesh.transformation_matrix(), plane, thickness)
    }

    /// Computes the range from local `bounds` placed in the world by
    /// `transform`. All eight corners are moved into plane-local space; the
    /// plane meets a corner at offset `z / cos(tilt)`, where `z` is the
    /// corner's distance along the plane normal.
    pub fn from_bounds(
        bounds: &Aabb,
        transform: &Matrix4<f32>,
        plane: &Plane,
        thickness: f32,
    ) -> Result<Self> {
        if !(thickness > 0.0) {
            return Err(SliceError::InvalidConfig("slice thickness must be positive"));
        }

        if plane.is_perpendicular() {
            return Err(SliceError::degenerate(DegenerateReason::PerpendicularPlane));
        }

        let cos = plane.tilt().cos();
        let to_plane = plane.world_to_plane() * transform;
        let (offset_min, offset_max) = bounds
            .corners()
            .iter()
            .map(|corner| (to_plane * corner.push(1.0)).z / cos)
            .fold((f32::MAX, f32::MIN), |(min, max), offset| {
                (min.min(offset), max.max(offset))
            });

        let extent = offset_max - offset_min;
        if !(extent > f32::EPSILON) {
            return Err(SliceError::degenerate(DegenerateReason::FlatMesh));
        }

        Ok(Self {
            offset_min,
            offset_max,
            step_fraction: thickness / extent / cos.abs(),
        })
    }

    pub fn extent(&self) -> f32 {
        self.offset_max - self.offset_min
    }

    /// Plane offset at a fractional position, 0 being `offset_min`.
    pub fn offset_at(&self, fraction: f32) -> f32 {
        (1.0 - fraction) * self.offset_min + fraction * self.offset_max
    }

    /// Number of whole layers that fit in the range.
    pub fn slice_count(&self) -> u32 {
        ((1.0 + COUNT_EPSILON) / self.step_fraction).floor() as u32
    }

    /// Number of images a full session emits. This includes a trailing
    /// partial layer when the range isn't a whole number of layers.
    pub fn layer_count(&self) -> u32 {
        (((1.0 - COUNT_EPSILON) / self.step_fraction).ceil() as u32).max(1)
    }

    /// Fractional position of the start of a layer, clamped to 1.
    pub fn layer_fraction(&self, layer: u32) -> f32 {
        (layer as f32 * self.step_fraction).min(1.0)
    }

    /// Offsets of the `samples` planes blended into the layer at `fraction`.
    /// The first plane is the layer's own offset, the others step back
    /// towards the previous layer in equal parts and never leave the range.
    pub fn sample_offsets(&self, fraction: f32, samples: u32) -> Vec<f32> {
        let samples = samples.max(1);
        let spacing = self.step_fraction / samples as f32;
        (0..samples)
            .map(|i| self.offset_at((fraction - i as f32 * spacing).clamp(0.0, 1.0)))
            .collect()
    }
}
