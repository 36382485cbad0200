use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use common::{config::SliceConfig, image::SliceImage, progress::Progress};
use tracing::{debug, info, warn};

use crate::{
    mesh::Mesh,
    plane::Plane,
    range::SliceRange,
    raster::Rasterizer,
    Result, SliceError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceState {
    Idle,
    Running,
    Completed,
    Cancelled,
}

/// Requests that a running session stops. Clones share the same flag, so a
/// token can be handed to another thread. The session only looks at it
/// between slices.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

/// One emitted slice.
#[derive(Debug, Clone)]
pub struct SliceLayer {
    /// Layer number in the range, starting at zero.
    pub index: u32,
    /// Fractional position of the layer in the slice range.
    pub fraction: f32,
    /// Plane offset the layer was cut at. With subsampling the extra planes
    /// lie below it, towards the previous layer.
    pub offset: f32,
    pub image: SliceImage,
}

/// Cursor over the layers of a started session.
#[derive(Debug, Clone, Copy)]
struct SlicingSession {
    range: SliceRange,
    layer: u32,
    layers: u32,
}

/// Produces the slices of one mesh, one at a time and in order. Iterating a
/// started slicer yields every layer until the range is exhausted or the
/// session is cancelled.
pub struct Slicer {
    mesh: Mesh,
    config: SliceConfig,
    plane: Plane,
    rasterizer: Rasterizer,

    state: SliceState,
    session: Option<SlicingSession>,
    cancel: CancelToken,
    progress: Progress,
    reported_open: bool,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl Slicer {
    pub fn new(mesh: Mesh, config: SliceConfig) -> Self {
        let plane = Plane::new(config.plane_tilt);
        Self {
            rasterizer: Rasterizer::new(mesh.clone(), plane, &config),
            mesh,
            plane,
            config,

            state: SliceState::Idle,
            session: None,
            cancel: CancelToken::new(),
            progress: Progress::new(),
            reported_open: false,
        }
    }

    /// Validates the configuration and the mesh, computes the slice range
    /// and moves the session to [`SliceState::Running`].
    pub fn start(&mut self) -> Result<SliceRange> {
        if self.state != SliceState::Idle {
            return Err(SliceError::NotIdle);
        }

        if self.cancel.is_cancelled() {
            self.finish(SliceState::Cancelled);
            return Err(SliceError::Cancelled);
        }

        self.config.validate().map_err(SliceError::InvalidConfig)?;
        let mesh = &self.mesh;
        if mesh.is_empty() {
            return Err(SliceError::EmptyMesh);
        }

        if !mesh.is_manifold() {
            warn!("Mesh is not closed or not consistently wound, slices may leak");
        }

        if mesh.colors().is_some() {
            debug!(
                "Ignoring vertex colors, slices are filled with #{}",
                self.config.slice_color.to_hex()
            );
        }

        let range = SliceRange::compute(mesh, &self.plane, self.config.slice_height)?;
        let layers = range.layer_count();
        info!(
            "Slicing {} triangles over offsets {:.3}..{:.3} into {layers} layers",
            mesh.face_count(),
            range.offset_min,
            range.offset_max,
        );

        self.session = Some(SlicingSession {
            range,
            layer: 0,
            layers,
        });
        self.state = SliceState::Running;
        self.progress.set_total(layers);
        self.progress.set_completed(0);
        Ok(range)
    }

    /// Stops the session. Slices already returned stay valid, no new ones
    /// are produced. Cancelling an idle session is final, it can't be
    /// started afterwards.
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        if matches!(self.state, SliceState::Idle | SliceState::Running) {
            self.finish(SliceState::Cancelled);
        }
    }

    /// Token that cancels this session from anywhere.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Skips a running session ahead to the layer containing `fraction`.
    /// Returns false, leaving the cursor alone, if the session isn't running
    /// or the layer was already produced.
    pub fn seek(&mut self, fraction: f32) -> bool {
        if self.state != SliceState::Running {
            return false;
        }

        let Some(session) = self.session.as_mut() else {
            return false;
        };

        let fraction = fraction.clamp(0.0, 1.0);
        let layer = (fraction / session.range.step_fraction).floor() as u32;
        let layer = layer.min(session.layers - 1);
        if layer < session.layer {
            return false;
        }

        session.layer = layer;
        self.progress.set_completed(session.layer);
        true
    }

    /// Renders the layer at `fraction` without moving the session.
    /// Works in every state, computing the range on the spot if the session
    /// hasn't started.
    pub fn render_preview(&self, fraction: f32) -> Result<SliceImage> {
        let range = match self.session {
            Some(session) => session.range,
            None => {
                self.config.validate().map_err(SliceError::InvalidConfig)?;
                SliceRange::compute(&self.mesh, &self.plane, self.config.slice_height)?
            }
        };

        let offsets = range.sample_offsets(fraction.clamp(0.0, 1.0), self.config.subsampling);
        Ok(self.rasterizer.render(&offsets))
    }

    pub fn state(&self) -> SliceState {
        self.state
    }

    pub fn range(&self) -> Option<&SliceRange> {
        self.session.as_ref().map(|x| &x.range)
    }

    /// Fraction of the next layer to be produced.
    pub fn current_fraction(&self) -> Option<f32> {
        self.session.map(|x| x.range.layer_fraction(x.layer))
    }

    pub fn progress(&self) -> Progress {
        self.progress.clone()
    }

    fn finish(&mut self, state: SliceState) {
        self.state = state;
        self.progress.set_finished();

        let layers = self.session.map(|x| x.layer).unwrap_or_default();
        match state {
            SliceState::Cancelled => info!("Slicing cancelled after {layers} layers"),
            _ => info!("Slicing finished, {layers} layers"),
        }
    }
}

impl Iterator for Slicer {
    type Item = SliceLayer;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state != SliceState::Running {
            return None;
        }

        if self.cancel.is_cancelled() {
            self.finish(SliceState::Cancelled);
            return None;
        }

        let session = self.session.as_mut()?;
        let index = session.layer;
        let fraction = session.range.layer_fraction(index);
        let offsets = session.range.sample_offsets(fraction, self.config.subsampling);
        let offset = session.range.offset_at(fraction);

        let (image, stats) = self.rasterizer.render_with_stats(&offsets);
        debug!(
            "Layer {index} at {offset:.3} ({:.1}%), {} pixels lit",
            fraction * 100.0,
            image.lit_pixels()
        );

        if stats.open_pixels > 0 && !self.reported_open {
            self.reported_open = true;
            warn!(
                "Layer {index} has {} pixels on open rays, the mesh is not watertight",
                stats.open_pixels
            );
        }

        session.layer += 1;
        let done = session.layer >= session.layers;
        self.progress.set_completed(session.layer);
        if done {
            self.finish(SliceState::Completed);
        }

        Some(SliceLayer {
            index,
            fraction,
            offset,
            image,
        })
    }
}
