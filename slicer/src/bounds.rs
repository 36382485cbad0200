use nalgebra::{Matrix3, Matrix4, Vector3};

use crate::{mesh::Mesh, Pos, Result, SliceError};

/// Axis aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Pos,
    pub max: Pos,
}

impl Aabb {
    pub fn center(&self) -> Pos {
        (self.min + self.max) / 2.0
    }

    pub fn size(&self) -> Pos {
        self.max - self.min
    }

    /// Vector from the center to the `max` corner.
    pub fn half_extents(&self) -> Pos {
        self.size() / 2.0
    }

    pub fn expand_point(&mut self, point: Pos) {
        self.min = self.min.inf(&point);
        self.max = self.max.sup(&point);
    }

    pub fn corners(&self) -> [Pos; 8] {
        let (min, max) = (self.min, self.max);
        [
            // Bottom vertices
            Pos::new(min.x, min.y, min.z),
            Pos::new(max.x, min.y, min.z),
            Pos::new(min.x, max.y, min.z),
            Pos::new(max.x, max.y, min.z),
            // Top vertices
            Pos::new(min.x, min.y, max.z),
            Pos::new(max.x, min.y, max.z),
            Pos::new(min.x, max.y, max.z),
            Pos::new(max.x, max.y, max.z),
        ]
    }
}

/// Gets the minimum and maximum of each component of every vertex after
/// `transform`. These points define the bounding box of the model.
pub fn compute_bounds(mesh: &Mesh, transform: &Matrix4<f32>) -> Result<Aabb> {
    let mut vertices = mesh.triangles().iter().flat_map(|x| x.vertices.iter());
    let first = vertices.next().ok_or(SliceError::EmptyMesh)?;

    let apply = |v: &Pos| (transform * v.push(1.0)).xyz();
    let start = apply(first);
    let mut bounds = Aabb {
        min: start,
        max: start,
    };

    vertices.for_each(|v| bounds.expand_point(apply(v)));
    Ok(bounds)
}

/// Builds the model matrix that centers a mesh with local `bounds` over the
/// origin, applies `orientation` (scale and rotation), and lifts it so its
/// lowest corner is level with the lower edge of a bed of depth `bed_size_y`
/// lying on the plane with normal `plane_normal`.
pub fn compute_alignment(
    bounds: &Aabb,
    orientation: &Matrix3<f32>,
    plane_normal: &Vector3<f32>,
    bed_size_y: f32,
) -> Matrix4<f32> {
    let center = Matrix4::new_translation(&-bounds.center());
    let orientation = orientation.to_homogeneous();

    // Every corner of the oriented box sits at +-half along each oriented
    // axis, so the one furthest down is found by taking the magnitude of each
    // axis' vertical component.
    let half = bounds.half_extents();
    let down = (0..3)
        .map(|axis| orientation[(2, axis)].abs() * half[axis])
        .sum::<f32>();

    // The bed tips by the plane's tilt about X; its lower edge drops by half
    // its depth times the sine of that tilt.
    let bed_bottom = -0.5 * bed_size_y * plane_normal.y.abs();
    let lift = Matrix4::new_translation(&Vector3::new(0.0, 0.0, bed_bottom + down));

    lift * orientation * center
}
