use crate::contour::ContourInfo;

/// Per-volume contour storage: one contour list per time step.
///
/// Grows and shrinks to follow the volume's time axis but never reorders
/// the lists it keeps.
#[derive(Debug, Default)]
pub struct ContourStore {
    steps: Vec<Vec<ContourInfo>>,
}

impl ContourStore {
    /// Creates an empty store with no time steps.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of time steps currently allocated.
    #[must_use]
    pub fn num_steps(&self) -> usize {
        self.steps.len()
    }

    /// Resizes the store to `num_steps` time steps.
    ///
    /// Existing lists keep their order; surplus steps are dropped,
    /// missing steps start empty.
    pub fn resize_steps(&mut self, num_steps: usize) {
        self.steps.resize_with(num_steps, Vec::new);
    }

    /// The contour list at `step`, empty for unallocated steps.
    #[must_use]
    pub fn list(&self, step: usize) -> &[ContourInfo] {
        self.steps.get(step).map_or(&[], Vec::as_slice)
    }

    /// Mutable access to the contour list at `step`, allocating up to
    /// and including it if needed.
    pub fn list_mut(&mut self, step: usize) -> &mut Vec<ContourInfo> {
        if step >= self.steps.len() {
            self.steps.resize_with(step + 1, Vec::new);
        }
        &mut self.steps[step]
    }

    /// Clears the contour list at `step`, keeping the step allocated.
    pub fn clear_step(&mut self, step: usize) {
        if let Some(list) = self.steps.get_mut(step) {
            list.clear();
        }
    }

    /// Clears every time step's contour list, keeping the allocation.
    pub fn clear_all_steps(&mut self) {
        for list in &mut self.steps {
            list.clear();
        }
    }
}
