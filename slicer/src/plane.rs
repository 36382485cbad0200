use nalgebra::{Matrix4, Vector2, Vector3};

use crate::Pos;

/// Below this `|cos(tilt)|` the plane is treated as perpendicular to the bed.
pub const MIN_TILT_COS: f32 = 1e-6;

/// Orientation of the slicing plane. The plane is tilted by `tilt` radians
/// about the world X axis and, at offset `d`, crosses the world Z axis at
/// height `d`.
///
/// Plane-local space has the plane's normal as its Z axis and mirrors Y, so
/// rows of a slice image run the same way as the print area when viewed
/// from above the plane.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Plane {
    tilt: f32,
}

impl Plane {
    pub fn new(tilt: f32) -> Self {
        Self { tilt }
    }

    pub fn tilt(&self) -> f32 {
        self.tilt
    }

    /// Outward normal of the plane in world space.
    pub fn normal(&self) -> Vector3<f32> {
        Vector3::new(0.0, self.tilt.sin(), self.tilt.cos())
    }

    pub fn is_perpendicular(&self) -> bool {
        self.tilt.cos().abs() < MIN_TILT_COS
    }

    /// Rotates the plane-local frame into world space.
    pub fn plane_to_world(&self) -> Matrix4<f32> {
        Matrix4::from_axis_angle(&Vector3::x_axis(), -self.tilt) * mirror_y()
    }

    /// Inverse of [`Plane::plane_to_world`].
    pub fn world_to_plane(&self) -> Matrix4<f32> {
        mirror_y() * Matrix4::from_axis_angle(&Vector3::x_axis(), self.tilt)
    }

    /// Moves the world so the plane at `offset` passes through the origin.
    pub fn offset_transform(&self, offset: f32) -> Matrix4<f32> {
        Matrix4::new_translation(&Vector3::new(0.0, 0.0, -offset))
    }

    /// World to plane-local transform for the plane at `offset`. Points on
    /// that plane end up with a local Z of zero.
    pub fn view(&self, offset: f32) -> Matrix4<f32> {
        self.world_to_plane() * self.offset_transform(offset)
    }

    /// Offset at which the plane passes through a world-space point. Only
    /// meaningful when the plane is not perpendicular.
    pub fn offset_of(&self, point: &Pos) -> f32 {
        let local = self.world_to_plane().transform_point(&(*point).into());
        local.z / self.tilt.cos()
    }

    /// World-space corners of a print area of the given size lying on the
    /// plane at offset zero.
    pub fn bed_corners(&self, size: Vector2<f32>) -> [Pos; 4] {
        let (x, y) = (size.x / 2.0, size.y / 2.0);
        let to_world = self.plane_to_world();

        [(x, y), (-x, y), (-x, -y), (x, -y)]
            .map(|(x, y)| to_world.transform_point(&Pos::new(x, y, 0.0).into()).coords)
    }
}

fn mirror_y() -> Matrix4<f32> {
    Matrix4::new_nonuniform_scaling(&Vector3::new(1.0, -1.0, 1.0))
}
