//! Value types shared between the slicing engine and its collaborators.

pub mod color;
pub mod config;
pub mod format;
pub mod image;
pub mod progress;
