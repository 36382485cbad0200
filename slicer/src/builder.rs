use std::f32::consts::TAU;

use crate::{
    mesh::{Mesh, Triangle},
    Pos,
};

/// Builds meshes out of triangles with outward facing normals. Faces are
/// wound counter clockwise when viewed from outside.
pub struct MeshBuilder {
    triangles: Vec<Triangle>,
}

impl MeshBuilder {
    pub fn new() -> Self {
        Self {
            triangles: Vec::new(),
        }
    }

    pub fn add_face(&mut self, face: [Pos; 3]) {
        self.triangles.push(Triangle::flat(face));
    }

    /// Adds the two triangles of a planar quad given in counter clockwise
    /// order.
    pub fn add_quad(&mut self, quad: [Pos; 4]) {
        self.add_face([quad[0], quad[1], quad[2]]);
        self.add_face([quad[2], quad[3], quad[0]]);
    }

    pub fn build(self) -> Mesh {
        Mesh::new(self.triangles)
    }
}

impl MeshBuilder {
    /// Adds a closed box spanning `min` to `max`.
    pub fn add_cuboid(&mut self, min: Pos, max: Pos) {
        let corner = |x: bool, y: bool, z: bool| {
            Pos::new(
                if x { max.x } else { min.x },
                if y { max.y } else { min.y },
                if z { max.z } else { min.z },
            )
        };

        let (f, t) = (false, true);
        // Bottom and top
        self.add_quad([corner(f, f, f), corner(f, t, f), corner(t, t, f), corner(t, f, f)]);
        self.add_quad([corner(f, f, t), corner(t, f, t), corner(t, t, t), corner(f, t, t)]);
        // Front and back
        self.add_quad([corner(f, f, f), corner(t, f, f), corner(t, f, t), corner(f, f, t)]);
        self.add_quad([corner(f, t, f), corner(f, t, t), corner(t, t, t), corner(t, t, f)]);
        // Left and right
        self.add_quad([corner(f, f, f), corner(f, f, t), corner(f, t, t), corner(f, t, f)]);
        self.add_quad([corner(t, f, f), corner(t, t, f), corner(t, t, t), corner(t, f, t)]);
    }

    /// Adds a closed, capped cylinder (or cone frustum) standing on `bottom`.
    pub fn add_vertical_cylinder(
        &mut self,
        bottom: Pos,
        height: f32,
        (bottom_radius, top_radius): (f32, f32),
        precision: u32,
    ) {
        let top = bottom + Pos::new(0.0, 0.0, height);
        let ring = |i: u32| {
            let angle = TAU * (i % precision) as f32 / precision as f32;
            Pos::new(angle.cos(), angle.sin(), 0.0)
        };

        for i in 0..precision {
            let (a, b) = (ring(i), ring(i + 1));
            let (bottom_a, bottom_b) = (bottom + a * bottom_radius, bottom + b * bottom_radius);
            let (top_a, top_b) = (top + a * top_radius, top + b * top_radius);

            self.add_quad([bottom_a, bottom_b, top_b, top_a]);
            self.add_face([top, top_a, top_b]);
            self.add_face([bottom, bottom_b, bottom_a]);
        }
    }
}

impl Default for MeshBuilder {
    fn default() -> Self {
        Self::new()
    }
}
