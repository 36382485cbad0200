//! Cross-section slicing engine. A [`mesh::Mesh`] is cut by a tilted
//! [`plane::Plane`] at evenly spaced offsets and every cut is rasterized into
//! an anti-aliased [`common::image::SliceImage`].

use nalgebra::Vector3;

pub mod bounds;
pub mod builder;
pub mod error;
pub mod mesh;
pub mod plane;
pub mod range;
pub mod raster;
pub mod session;

pub type Pos = Vector3<f32>;

pub use error::{Result, SliceError};
