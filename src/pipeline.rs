//! Contracts for the four external reconstruction stages.
//!
//! The stages themselves live outside this crate; the controller only
//! sequences them. Each stage keeps internal state between `set_input`
//! calls and must be `reset` before being reused for a new pass — the
//! controller enforces this through [`PipelineState`].

use std::sync::Arc;

use crate::error::Result;
use crate::mesh::ContourMesh;
use crate::volume::BinarySlice;

/// Sampled implicit distance field produced by the implicit-field stage
/// and consumed by iso-surface extraction.
#[derive(Debug, Clone)]
pub struct DistanceField {
    /// Sample counts along each axis.
    pub dimensions: [usize; 3],
    /// Isotropic sample spacing.
    pub spacing: f64,
    /// Row-major signed distance samples, zero on the surface.
    pub samples: Vec<f64>,
}

/// Contour decimation stage: reduces the point count of each staged
/// contour before normal estimation.
pub trait ReduceStage {
    /// Discards all staged inputs and outputs.
    fn reset(&mut self);

    /// Stages one contour at `index`.
    fn set_input(&mut self, index: usize, mesh: Arc<ContourMesh>);

    /// Runs the reduction over all staged contours.
    ///
    /// # Errors
    ///
    /// Returns an error if the stage fails internally.
    fn update(&mut self) -> Result<()>;

    /// Number of reduced output contours available after `update`.
    fn num_outputs(&self) -> usize;

    /// The reduced contour at `index`, if produced.
    fn output(&self, index: usize) -> Option<Arc<ContourMesh>>;

    /// Lower spacing bound for the reduction.
    fn set_min_spacing(&mut self, spacing: f64);

    /// Upper spacing bound for the reduction.
    fn set_max_spacing(&mut self, spacing: f64);

    /// Total point count across all outputs after reduction.
    fn points_after_reduction(&self) -> usize;
}

/// Normal-field estimation stage: orients per-contour normals against
/// the segmentation's reference slice.
pub trait NormalsStage {
    /// Discards all staged inputs and outputs.
    fn reset(&mut self);

    /// Sets the reference binary slice normals are oriented against;
    /// `None` detaches the current slice.
    fn set_segmentation_slice(&mut self, slice: Option<BinarySlice>);

    /// Stages one reduced contour at `index`.
    fn set_input(&mut self, index: usize, mesh: Arc<ContourMesh>);

    /// The contour with estimated normals at `index`, if produced.
    fn output(&self, index: usize) -> Option<Arc<ContourMesh>>;

    /// Upper spacing bound for normal estimation.
    fn set_max_spacing(&mut self, spacing: f64);
}

/// Implicit-field construction stage: builds a signed distance image
/// from the normal-carrying contours.
pub trait DistanceFieldStage {
    /// Discards all staged inputs and outputs.
    fn reset(&mut self);

    /// Sets the reference slice defining the field's extent.
    fn set_reference_slice(&mut self, slice: Option<BinarySlice>);

    /// Stages one normal-carrying contour at `index`.
    fn set_input(&mut self, index: usize, mesh: Arc<ContourMesh>);

    /// The constructed distance field, if available.
    fn output(&self) -> Option<DistanceField>;

    /// Target voxel count of the distance image.
    fn set_distance_image_volume(&mut self, voxels: u32);

    /// The sample spacing the stage settled on.
    fn spacing(&self) -> f64;
}

/// Iso-surface extraction stage, with its input and output made
/// explicit: one call extracts the threshold surface of `field` and
/// smooths it for `smooth_iterations` passes.
pub trait IsoSurfaceStage {
    /// Extracts the iso-surface of `field` at `threshold`.
    ///
    /// # Errors
    ///
    /// Returns an error if extraction fails internally.
    fn extract(
        &mut self,
        field: &DistanceField,
        threshold: f64,
        smooth_iterations: u32,
    ) -> Result<ContourMesh>;
}

/// Observational progress reporting; has no effect on correctness.
pub trait ProgressSink {
    /// Announces `n` upcoming work units.
    fn add_steps(&mut self, n: usize);

    /// Reports `n` completed work units.
    fn progress(&mut self, n: usize);
}

/// Progress sink that discards all reports.
#[derive(Debug, Default)]
pub struct NoOpProgress;

impl ProgressSink for NoOpProgress {
    fn add_steps(&mut self, _n: usize) {}
    fn progress(&mut self, _n: usize) {}
}

/// Lifecycle of the shared stage objects between passes.
///
/// `set_input` on a stage is only valid after a reset; the controller
/// tracks the discipline here instead of leaving it to convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Stages are reset; nothing staged.
    Idle,
    /// Contours for one label/time step are staged into the reduction.
    Staged,
    /// A pass has run; stages hold its outputs until the next reset.
    Computed,
}
