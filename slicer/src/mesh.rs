use std::{
    collections::HashMap,
    io::{Read, Seek},
    sync::Arc,
};

use anyhow::{bail, Context};
use common::color::Rgb;
use nalgebra::{Matrix3, Matrix4};
use ordered_float::OrderedFloat;

use crate::{
    bounds::{self, Aabb},
    plane::Plane,
    Pos, Result, SliceError,
};

/// One face of a mesh. Normals are per vertex and expected to point out of
/// the solid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub vertices: [Pos; 3],
    pub normals: [Pos; 3],
}

/// A triangle mesh that can be scaled, translated, and rotated. The
/// geometry is shared between clones, so handing a mesh to several slicing
/// sessions is cheap and needs no locking.
#[derive(Debug, Clone)]
pub struct Mesh {
    inner: Arc<MeshInner>,

    transformation_matrix: Matrix4<f32>,

    position: Pos,
    scale: Pos,
    rotation: Pos,
}

#[derive(Debug)]
struct MeshInner {
    triangles: Box<[Triangle]>,
    colors: Option<Box<[[Rgb<u8>; 3]]>>,
}

impl Triangle {
    /// Creates a triangle whose three normals are the face normal implied by
    /// counter clockwise winding.
    pub fn flat(vertices: [Pos; 3]) -> Self {
        let normal = face_normal(&vertices);
        Self {
            vertices,
            normals: [normal; 3],
        }
    }

    /// Sum of the vertex normals, falling back to the winding normal when the
    /// supplied normals cancel out or are missing.
    pub fn normal(&self) -> Pos {
        let sum = self.normals[0] + self.normals[1] + self.normals[2];
        if sum.norm_squared() > f32::EPSILON {
            sum.normalize()
        } else {
            face_normal(&self.vertices)
        }
    }
}

impl Mesh {
    /// Creates a new mesh from the given triangles. The transformations are
    /// all identity by default.
    pub fn new(triangles: Vec<Triangle>) -> Self {
        Self {
            inner: Arc::new(MeshInner {
                triangles: triangles.into_boxed_slice(),
                colors: None,
            }),
            ..Default::default()
        }
    }

    /// Creates a mesh with a color for every vertex of every triangle.
    pub fn with_colors(triangles: Vec<Triangle>, colors: Vec<[Rgb<u8>; 3]>) -> Result<Self> {
        if colors.len() != triangles.len() {
            return Err(SliceError::InvalidConfig(
                "vertex colors must match the triangle count",
            ));
        }

        Ok(Self {
            inner: Arc::new(MeshInner {
                triangles: triangles.into_boxed_slice(),
                colors: Some(colors.into_boxed_slice()),
            }),
            ..Default::default()
        })
    }

    pub fn triangles(&self) -> &[Triangle] {
        &self.inner.triangles
    }

    pub fn colors(&self) -> Option<&[[Rgb<u8>; 3]]> {
        self.inner.colors.as_deref()
    }

    pub fn face_count(&self) -> usize {
        self.inner.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.triangles.is_empty()
    }

    /// Checks that every directed edge is matched by exactly one edge running
    /// the other way. A closed, consistently wound mesh always passes;
    /// vertices are matched by exact position.
    pub fn is_manifold(&self) -> bool {
        type Key = [OrderedFloat<f32>; 3];
        let key = |v: &Pos| -> Key { [v.x, v.y, v.z].map(OrderedFloat) };

        let mut edges = HashMap::<(Key, Key), i32>::new();
        for triangle in self.triangles() {
            let [a, b, c] = triangle.vertices.map(|v| key(&v));
            for (a, b) in [(a, b), (b, c), (c, a)] {
                // Forward edges count up, reverse edges count down.
                let (edge, delta) = if a < b { ((a, b), 1) } else { ((b, a), -1) };
                *edges.entry(edge).or_default() += delta;
            }
        }

        edges.values().all(|&count| count == 0)
    }

    /// Updates the internal transformation matrix. This is called
    /// automatically by the setters.
    pub fn update_transformation_matrix(&mut self) {
        let scale = Matrix4::new_nonuniform_scaling(&self.scale);
        let rotation =
            Matrix4::from_euler_angles(self.rotation.x, self.rotation.y, self.rotation.z);
        let translation = Matrix4::new_translation(&self.position);

        self.transformation_matrix = translation * scale * rotation;
    }

    /// Transforms a point according to the models translation, scale, and rotation.
    pub fn transform(&self, pos: &Pos) -> Pos {
        (self.transformation_matrix * pos.push(1.0)).xyz()
    }

    /// Scale and rotation part of the model matrix.
    pub fn orientation(&self) -> Matrix3<f32> {
        self.transformation_matrix.fixed_view::<3, 3>(0, 0).into_owned()
    }

    /// Axis aligned bounds of the transformed mesh.
    pub fn bounds(&self) -> Result<Aabb> {
        bounds::compute_bounds(self, &self.transformation_matrix)
    }

    /// Axis aligned bounds of the untransformed vertices.
    pub fn local_bounds(&self) -> Result<Aabb> {
        bounds::compute_bounds(self, &Matrix4::identity())
    }

    /// Centers the mesh over the origin and rests its lowest corner on the
    /// lower edge of a bed lying on `plane`, keeping scale and rotation.
    pub fn align(&mut self, plane: &Plane, bed_size_y: f32) -> Result<()> {
        let alignment = bounds::compute_alignment(
            &self.local_bounds()?,
            &self.orientation(),
            &plane.normal(),
            bed_size_y,
        );

        self.set_position(alignment.fixed_view::<3, 1>(0, 3).into_owned());
        Ok(())
    }
}

impl Mesh {
    /// Gets the current transformation matrix of the model.
    pub fn transformation_matrix(&self) -> &Matrix4<f32> {
        &self.transformation_matrix
    }

    /// Changes the position of the model, automatically updating the internal
    /// transformation matrix.
    pub fn set_position(&mut self, pos: Pos) {
        self.position = pos;
        self.update_transformation_matrix();
    }

    pub fn position(&self) -> Pos {
        self.position
    }

    /// Changes the current scale of the model, automatically updating the
    /// internal transformation matrix.
    pub fn set_scale(&mut self, scale: Pos) {
        self.scale = scale;
        self.update_transformation_matrix();
    }

    pub fn scale(&self) -> Pos {
        self.scale
    }

    /// Changes the current rotation of the model, using [Euler
    /// angles](https://en.wikipedia.org/wiki/Euler_angles) in radians. The
    /// internal transformation matrix is automatically updated.
    pub fn set_rotation(&mut self, rotation: Pos) {
        self.rotation = rotation;
        self.update_transformation_matrix();
    }

    pub fn rotation(&self) -> Pos {
        self.rotation
    }
}

/// Loads an STL buffer into a mesh. Each face normal is copied to the three
/// vertices of its face.
pub fn load_mesh<T: Read + Seek>(mut reader: T, format: &str) -> anyhow::Result<Mesh> {
    let format = format.to_ascii_lowercase();
    if format != "stl" {
        bail!("Unsupported mesh format `{format}`");
    }

    let stl = stl_io::read_stl(&mut reader).context("Failed to parse STL")?;
    let position = |idx: usize| {
        let v = &stl.vertices[idx];
        Pos::new(v[0], v[1], v[2])
    };

    let triangles = stl
        .faces
        .iter()
        .map(|face| {
            let normal = Pos::new(face.normal[0], face.normal[1], face.normal[2]);
            Triangle {
                vertices: face.vertices.map(&position),
                normals: [normal; 3],
            }
        })
        .collect();

    Ok(Mesh::new(triangles))
}

impl Default for Mesh {
    fn default() -> Self {
        Self {
            inner: Arc::new(MeshInner {
                triangles: Box::new([]),
                colors: None,
            }),

            transformation_matrix: Matrix4::identity(),

            position: Pos::repeat(0.0),
            scale: Pos::repeat(1.0),
            rotation: Pos::repeat(0.0),
        }
    }
}

fn face_normal([a, b, c]: &[Pos; 3]) -> Pos {
    let normal = (b - a).cross(&(c - a));
    if normal.norm_squared() > 0.0 {
        normal.normalize()
    } else {
        Pos::zeros()
    }
}
