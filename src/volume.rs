use crate::math::{Point3, Vector3, TOLERANCE};

/// Proportional time axis of a volume.
///
/// Time points are continuous; time steps are the discrete frames of the
/// volume. The axis starts at `first_time_point` and advances in frames
/// of `step_duration`.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeGeometry {
    first_time_point: f64,
    step_duration: f64,
    num_steps: usize,
}

impl TimeGeometry {
    /// Creates a time axis starting at `first_time_point` with
    /// `num_steps` frames of `step_duration` each.
    #[must_use]
    pub fn new(first_time_point: f64, step_duration: f64, num_steps: usize) -> Self {
        Self {
            first_time_point,
            step_duration,
            num_steps,
        }
    }

    /// Single-frame axis covering `[0, 1)`, the common static case.
    #[must_use]
    pub fn static_frame() -> Self {
        Self::new(0.0, 1.0, 1)
    }

    /// Returns the number of time steps.
    #[must_use]
    pub fn num_steps(&self) -> usize {
        self.num_steps
    }

    /// Tests whether `time_point` falls inside the covered time range.
    #[must_use]
    pub fn is_valid_time_point(&self, time_point: f64) -> bool {
        let span = self.step_duration * self.num_steps as f64;
        time_point >= self.first_time_point && time_point < self.first_time_point + span
    }

    /// Maps a continuous time point to its discrete time step.
    ///
    /// Returns `None` for time points outside the covered range.
    #[must_use]
    pub fn time_point_to_step(&self, time_point: f64) -> Option<usize> {
        if !self.is_valid_time_point(time_point) {
            return None;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let step = ((time_point - self.first_time_point) / self.step_duration).floor() as usize;
        Some(step.min(self.num_steps - 1))
    }

    /// Returns the `[start, end)` time bounds of one time step.
    #[must_use]
    pub fn time_bounds(&self, step: usize) -> (f64, f64) {
        let start = self.first_time_point + self.step_duration * step as f64;
        (start, start + self.step_duration)
    }
}

/// Spatial geometry of a volume: origin, voxel spacing, and voxel
/// dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeGeometry {
    /// World-space origin of the first voxel.
    pub origin: Point3,
    /// Voxel spacing along each axis.
    pub spacing: Vector3,
    /// Voxel counts along each axis.
    pub dimensions: [usize; 3],
}

impl VolumeGeometry {
    /// Numeric equality within the global tolerance, used to decide
    /// whether one volume may stand in for another.
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        self.dimensions == other.dimensions
            && (self.origin - other.origin).norm() < TOLERANCE
            && (self.spacing - other.spacing).norm() < TOLERANCE
    }
}

/// One binary segmentation slice of a volume at a fixed time step.
#[derive(Debug, Clone)]
pub struct BinarySlice {
    /// In-plane voxel dimensions.
    pub dimensions: [usize; 2],
    /// In-plane voxel spacing.
    pub spacing: [f64; 2],
    /// Row-major voxel values, non-zero inside the segmentation.
    pub voxels: Vec<u8>,
}

/// External volume contract consumed by the controller.
///
/// Volumes are owned by the embedding application; the controller keeps
/// only weak back-references and never assumes a volume outlives its
/// session.
pub trait Volume {
    /// The volume's time axis.
    fn time_geometry(&self) -> &TimeGeometry;

    /// The volume's spatial geometry.
    fn geometry(&self) -> &VolumeGeometry;

    /// The binary segmentation slice for one time step and channel, or
    /// `None` if the step or channel does not exist.
    fn binary_slice(&self, time_step: usize, channel: usize) -> Option<BinarySlice>;
}
