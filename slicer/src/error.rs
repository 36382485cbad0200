//! Errors raised before a slicing session starts. Once a session is running
//! slices can't fail, they can only come out empty.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SliceError {
    /// The mesh has no triangles, so it has no bounds.
    #[error("mesh has no triangles")]
    EmptyMesh,

    /// The slice range can't be computed without dividing by zero.
    #[error("degenerate slice range: {reason}")]
    DegenerateRange { reason: DegenerateReason },

    #[error("invalid slice config: {0}")]
    InvalidConfig(&'static str),

    /// [`crate::session::Slicer::start`] was called on a session that
    /// already left the idle state.
    #[error("slicing session was already started")]
    NotIdle,

    /// The session's cancel token was triggered before it could start.
    #[error("slicing session was cancelled before it started")]
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegenerateReason {
    /// The plane is tilted (close to) perpendicular to the bed.
    PerpendicularPlane,
    /// The mesh has no extent along the slicing direction.
    FlatMesh,
}

pub type Result<T> = std::result::Result<T, SliceError>;

impl SliceError {
    pub(crate) fn degenerate(reason: DegenerateReason) -> Self {
        Self::DegenerateRange { reason }
    }
}

impl std::fmt::Display for DegenerateReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            DegenerateReason::PerpendicularPlane => "plane tilt is too close to 90 degrees",
            DegenerateReason::FlatMesh => "mesh has no extent along the slicing axis",
        })
    }
}
