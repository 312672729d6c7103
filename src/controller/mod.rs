//! The interpolation controller: session registry, contour bookkeeping,
//! and sequencing of the four-stage reconstruction pipeline.

pub mod regroup;
pub mod store;

use std::sync::{Arc, Weak};

use log::{error, warn};
use slotmap::SlotMap;

use crate::contour::{contours_coplanar, ContourInfo};
use crate::error::{PipelineError, Result};
use crate::mesh::ContourMesh;
use crate::pipeline::{
    DistanceFieldStage, IsoSurfaceStage, NoOpProgress, NormalsStage, PipelineState, ProgressSink,
    ReduceStage,
};
use crate::volume::{TimeGeometry, Volume};

use store::ContourStore;

slotmap::new_key_type! {
    /// Handle for a registered volume's session record.
    ///
    /// Issued when a volume is first registered; all further per-volume
    /// operations go through the handle rather than the volume itself.
    pub struct VolumeId;
}

/// Everything the controller keeps per registered volume.
struct SessionRecord {
    /// Non-owning back-reference; the embedding application owns the
    /// volume and may drop it at any time.
    volume: Weak<dyn Volume>,
    /// All drawn contours, for every label.
    contours: ContourStore,
    /// Contours of the label currently staged for interpolation.
    staged: ContourStore,
}

/// The most recently interpolated surface.
#[derive(Debug, Clone)]
pub struct InterpolationResult {
    /// The extracted and smoothed iso-surface.
    pub mesh: ContourMesh,
    /// Time step the surface was computed for.
    pub time_step: usize,
    /// Time axis of the volume, matching the active volume at compute
    /// time.
    pub time_geometry: TimeGeometry,
}

/// Combined single-mesh view of the staged contours, for display.
#[derive(Debug, Clone)]
pub struct CombinedContours {
    /// All staged contours merged into one mesh.
    pub mesh: ContourMesh,
    /// Single-frame time axis covering the computed time step.
    pub time_geometry: TimeGeometry,
}

/// Controller for contour sessions and the surface-interpolation
/// pipeline.
///
/// One instance serves the whole application session; it is constructed
/// explicitly with the four reconstruction stages and owned by the
/// caller. All operations run on the caller's thread; the stages are
/// synchronous and a new [`interpolate`](Self::interpolate) pass simply
/// recomputes from scratch.
pub struct InterpolationController {
    sessions: SlotMap<VolumeId, SessionRecord>,
    active: Option<VolumeId>,
    current_time_point: f64,
    /// Next unused plane slot. Monotonic for the controller's lifetime,
    /// never reused after removal.
    slot_counter: u32,

    reduce: Box<dyn ReduceStage>,
    normals: Box<dyn NormalsStage>,
    distance: Box<dyn DistanceFieldStage>,
    iso: Box<dyn IsoSurfaceStage>,
    progress: Box<dyn ProgressSink>,
    state: PipelineState,

    result: Option<InterpolationResult>,
    combined: Option<CombinedContours>,
    distance_image_spacing: f64,
    num_reduced: usize,
}

impl InterpolationController {
    /// Creates a controller around the four reconstruction stages.
    #[must_use]
    pub fn new(
        reduce: Box<dyn ReduceStage>,
        normals: Box<dyn NormalsStage>,
        distance: Box<dyn DistanceFieldStage>,
        iso: Box<dyn IsoSurfaceStage>,
    ) -> Self {
        Self {
            sessions: SlotMap::with_key(),
            active: None,
            current_time_point: 0.0,
            slot_counter: 0,
            reduce,
            normals,
            distance,
            iso,
            progress: Box::new(NoOpProgress),
            state: PipelineState::Idle,
            result: None,
            combined: None,
            distance_image_spacing: 0.0,
            num_reduced: 0,
        }
    }

    /// Installs a progress sink; reporting is observational only.
    pub fn set_progress_sink(&mut self, sink: Box<dyn ProgressSink>) {
        self.progress = sink;
    }

    // --- Selection state ---

    /// Sets the current time point. The discrete time step is derived
    /// from the active volume's own time geometry on each operation.
    pub fn set_current_time_point(&mut self, time_point: f64) {
        self.current_time_point = time_point;
    }

    /// Returns the current time point.
    #[must_use]
    pub fn current_time_point(&self) -> f64 {
        self.current_time_point
    }

    /// Makes `volume` the active volume, registering it on first sight,
    /// or clears the selection on `None`.
    ///
    /// Registering creates the volume's contour store and session entry
    /// and takes a weak back-reference. Re-selecting the already active
    /// volume is a no-op; a genuine change invalidates the cached result
    /// and reinitializes the pipeline.
    pub fn set_active_volume(&mut self, volume: Option<&Arc<dyn Volume>>) -> Option<VolumeId> {
        self.prune_dead_sessions();
        let Some(volume) = volume else {
            self.active = None;
            return None;
        };
        if let Some((id, active)) = self.active_session() {
            if same_volume(&active, volume) {
                return Some(id);
            }
        }
        let id = self.lookup(volume).unwrap_or_else(|| {
            self.sessions.insert(SessionRecord {
                volume: Arc::downgrade(volume),
                contours: ContourStore::new(),
                staged: ContourStore::new(),
            })
        });
        self.result = None;
        self.num_reduced = 0;
        self.active = Some(id);
        self.reinitialize();
        Some(id)
    }

    /// Returns the active volume's handle, if one is selected.
    #[must_use]
    pub fn active_volume_id(&self) -> Option<VolumeId> {
        self.active
    }

    // --- Contour store ---

    /// Inserts one drawn contour for the active volume at the current
    /// time step.
    ///
    /// Insert-or-replace semantics: a stored contour coplanar with the
    /// new one and sharing its label is overwritten in place; a coplanar
    /// contour of any label donates its plane slot; a contour on a
    /// previously unseen plane gets the next unused slot. Empty meshes
    /// are skipped. Without an active volume the call is a no-op, and an
    /// invalid current time point is logged and ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the mesh carries no label tag.
    pub fn add_contour(&mut self, mesh: Arc<ContourMesh>) -> Result<()> {
        self.prune_dead_sessions();
        // A cancelled draw hands over an empty mesh; nothing to store
        if mesh.is_empty() {
            return Ok(());
        }
        let info = ContourInfo::from_mesh(mesh)?;
        self.insert_contour(info);
        Ok(())
    }

    /// Inserts a batch of drawn contours, skipping empty meshes.
    ///
    /// # Errors
    ///
    /// Returns an error if any mesh carries no label tag; meshes before
    /// the offending one are already inserted.
    pub fn add_contours(&mut self, meshes: Vec<Arc<ContourMesh>>) -> Result<()> {
        self.prune_dead_sessions();
        for mesh in meshes {
            if mesh.is_empty() {
                continue;
            }
            let info = ContourInfo::from_mesh(mesh)?;
            self.insert_contour(info);
        }
        Ok(())
    }

    fn insert_contour(&mut self, mut info: ContourInfo) {
        let Some((id, volume)) = self.active_session() else {
            return;
        };
        let Some(step) = volume.time_geometry().time_point_to_step(self.current_time_point)
        else {
            error!(
                "invalid time point {} requested for interpolation pipeline",
                self.current_time_point
            );
            return;
        };
        let Some(record) = self.sessions.get(id) else {
            return;
        };

        let mut replacement: Option<usize> = None;
        let mut matched_slot: Option<u32> = None;
        for (i, existing) in record.contours.list(step).iter().enumerate() {
            if contours_coplanar(&info, existing) {
                // Coplanar contours share the same slot
                matched_slot = existing.slot;
                if existing.label == info.label {
                    replacement = Some(i);
                }
            }
        }

        info.slot = match matched_slot {
            Some(slot) => Some(slot),
            None => {
                let slot = self.slot_counter;
                self.slot_counter += 1;
                Some(slot)
            }
        };

        let Some(record) = self.sessions.get_mut(id) else {
            return;
        };
        let list = record.contours.list_mut(step);
        if let Some(i) = replacement {
            list[i] = info;
            return;
        }

        list.push(info);
    }

    /// Removes the first stored contour coplanar with `probe` (label
    /// ignored) at the current time step, reinitializing the pipeline
    /// when a removal happened.
    ///
    /// Returns `false` when nothing matched, no volume is active, or the
    /// current time point is invalid.
    pub fn remove_contour(&mut self, probe: &ContourInfo) -> bool {
        let Some((id, volume)) = self.active_session() else {
            return false;
        };
        let Some(step) = volume.time_geometry().time_point_to_step(self.current_time_point)
        else {
            return false;
        };
        let Some(record) = self.sessions.get_mut(id) else {
            return false;
        };
        let list = record.contours.list_mut(step);
        let Some(index) = list.iter().position(|c| contours_coplanar(c, probe)) else {
            return false;
        };
        list.remove(index);
        self.reinitialize();
        true
    }

    /// Looks up the staged contour coplanar with `probe` at the current
    /// time step.
    ///
    /// Searches the interpolation session, not the full store; returns
    /// `None` without an active volume or with an invalid time point.
    #[must_use]
    pub fn contour_at(&self, probe: &ContourInfo) -> Option<Arc<ContourMesh>> {
        let (id, volume) = self.active_session()?;
        let step = volume.time_geometry().time_point_to_step(self.current_time_point)?;
        self.sessions
            .get(id)?
            .staged
            .list(step)
            .iter()
            .find(|c| contours_coplanar(probe, c))
            .map(|c| c.mesh.clone())
    }

    /// Number of staged contours at the current time step, or `None`
    /// without an active volume or valid time point.
    #[must_use]
    pub fn num_contours(&self) -> Option<usize> {
        let (id, volume) = self.active_session()?;
        let step = volume.time_geometry().time_point_to_step(self.current_time_point)?;
        Some(self.sessions.get(id)?.staged.list(step).len())
    }

    /// All stored contours (every label) at the current time step, or
    /// `None` without an active volume or valid time point.
    #[must_use]
    pub fn stored_contours(&self) -> Option<&[ContourInfo]> {
        let (id, volume) = self.active_session()?;
        let step = volume.time_geometry().time_point_to_step(self.current_time_point)?;
        Some(self.sessions.get(id)?.contours.list(step))
    }

    // --- Pipeline orchestration ---

    /// Stages every stored contour of `label` at the current time step
    /// into the interpolation session, feeding each into the decimation
    /// stage.
    pub fn select_label_for_interpolation(&mut self, label: i32) {
        self.prune_dead_sessions();
        self.reduce.reset();
        self.reinitialize();

        let Some((id, volume)) = self.active_session() else {
            return;
        };
        let Some(step) = volume.time_geometry().time_point_to_step(self.current_time_point)
        else {
            error!(
                "invalid time point {} requested for interpolation pipeline",
                self.current_time_point
            );
            return;
        };
        let Some(record) = self.sessions.get(id) else {
            return;
        };
        let matching: Vec<ContourInfo> = record
            .contours
            .list(step)
            .iter()
            .filter(|c| c.label == label)
            .cloned()
            .collect();

        for info in matching {
            let index = {
                let Some(record) = self.sessions.get_mut(id) else {
                    return;
                };
                let staged = record.staged.list_mut(step);
                staged.push(info.clone());
                staged.len() - 1
            };
            self.reduce.set_input(index, info.mesh);
        }
        self.state = PipelineState::Staged;
    }

    /// Runs the four-stage reconstruction over the staged contours.
    ///
    /// With fewer than two reduced contours the cached result is cleared
    /// and the iso-surface stage is never invoked; that is the expected
    /// state with zero or one drawn contour, not an error. An invalid
    /// time point or missing active volume likewise clears the result,
    /// as does running with nothing staged since the last reset: the
    /// stages are only driven from the
    /// [`Staged`](PipelineState::Staged) state.
    ///
    /// # Errors
    ///
    /// Returns an error if a stage fails internally or the implicit
    /// field is missing when it is required.
    pub fn interpolate(&mut self) -> Result<()> {
        self.prune_dead_sessions();
        let Some((id, volume)) = self.active_session() else {
            warn!("no interpolation possible, no active volume selected");
            self.result = None;
            return Ok(());
        };
        let Some(step) = volume.time_geometry().time_point_to_step(self.current_time_point)
        else {
            warn!(
                "no interpolation possible, time point {} is outside the active volume's time bounds",
                self.current_time_point
            );
            self.result = None;
            return Ok(());
        };

        // Nothing staged since the last reset: the stage inputs are not
        // valid, so leave the stages untouched
        if self.state == PipelineState::Idle {
            self.num_reduced = 0;
            self.result = None;
            return Ok(());
        }

        self.reduce.update()?;
        self.num_reduced = self.reduce.num_outputs();

        // A single empty output means the reduction collapsed everything
        if self.num_reduced == 1 && self.reduce.output(0).is_none_or(|m| m.is_empty()) {
            self.num_reduced = 0;
        }

        self.normals.set_segmentation_slice(volume.binary_slice(step, 0));

        for i in 0..self.num_reduced {
            let Some(reduced) = self.reduce.output(i) else {
                continue;
            };
            // Snapshot the output so the stage can be reset underneath it
            let detached = Arc::new(reduced.detach());
            self.normals.set_input(i, detached);
            if let Some(with_normals) = self.normals.output(i) {
                self.distance.set_input(i, with_normals);
            }
        }

        if self.num_reduced < 2 {
            self.result = None;
            self.state = PipelineState::Computed;
            return Ok(());
        }

        self.progress.add_steps(10);

        let field = self
            .distance
            .output()
            .ok_or(PipelineError::MissingDistanceField)?;
        let surface = self.iso.extract(&field, 0.0, 1)?;

        self.result = Some(InterpolationResult {
            mesh: surface,
            time_step: step,
            time_geometry: volume.time_geometry().clone(),
        });
        self.distance_image_spacing = self.distance.spacing();

        let staged: Vec<Arc<ContourMesh>> = self
            .sessions
            .get(id)
            .map(|record| record.staged.list(step).iter().map(|c| c.mesh.clone()).collect())
            .unwrap_or_default();
        let (start, end) = volume.time_geometry().time_bounds(step);
        self.combined = Some(CombinedContours {
            mesh: ContourMesh::merge(&staged),
            time_geometry: TimeGeometry::new(start, end - start, 1),
        });

        self.progress.progress(20);
        self.state = PipelineState::Computed;
        Ok(())
    }

    /// The most recently interpolated surface, if the last pass
    /// produced one.
    #[must_use]
    pub fn interpolation_result(&self) -> Option<&InterpolationResult> {
        self.result.as_ref()
    }

    /// The staged contours of the last pass merged into one mesh.
    #[must_use]
    pub fn contours_as_mesh(&self) -> Option<&CombinedContours> {
        self.combined.as_ref()
    }

    /// Sample spacing the implicit-field stage used in the last pass.
    #[must_use]
    pub fn distance_image_spacing(&self) -> f64 {
        self.distance_image_spacing
    }

    /// Contour count after decimation in the last pass.
    #[must_use]
    pub fn num_reduced_contours(&self) -> usize {
        self.num_reduced
    }

    /// Current lifecycle state of the shared pipeline stages.
    #[must_use]
    pub fn pipeline_state(&self) -> PipelineState {
        self.state
    }

    // --- Session registry ---

    /// Number of registered sessions.
    #[must_use]
    pub fn num_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Removes one session, clearing the active selection if it pointed
    /// at the removed volume.
    pub fn remove_session(&mut self, id: VolumeId) {
        if self.active == Some(id) {
            self.normals.set_segmentation_slice(None);
            self.active = None;
        }
        self.sessions.remove(id);
    }

    /// Removes every session and clears the active selection.
    pub fn remove_all_sessions(&mut self) {
        self.normals.set_segmentation_slice(None);
        self.active = None;
        self.sessions.clear();
    }

    /// Moves `old`'s session onto `new`, a volume standing in for an
    /// equivalent one (e.g. after a save/reload round trip).
    ///
    /// Fails when `old` has no session, when `new` is the same volume,
    /// when the geometries differ numerically, or when the current time
    /// point is invalid for `new`. On success the drawn contours carry
    /// over, the active selection follows if it pointed at `old`, and
    /// the reference slice is refreshed from `new`.
    pub fn replace_session(&mut self, old: VolumeId, new: &Arc<dyn Volume>) -> bool {
        let Some(old_record) = self.sessions.get(old) else {
            return false;
        };
        let Some(old_volume) = old_record.volume.upgrade() else {
            return false;
        };
        if same_volume(&old_volume, new) {
            return false;
        }
        if !old_volume.geometry().matches(new.geometry()) {
            return false;
        }
        let Some(step) = new.time_geometry().time_point_to_step(self.current_time_point) else {
            warn!(
                "session cannot be replaced, time point {} is outside the new volume's time bounds",
                self.current_time_point
            );
            return false;
        };

        let Some(record) = self.sessions.remove(old) else {
            return false;
        };
        let new_id = self.sessions.insert(SessionRecord {
            volume: Arc::downgrade(new),
            contours: record.contours,
            staged: record.staged,
        });
        if self.active == Some(old) {
            self.active = Some(new_id);
        }
        self.normals.set_segmentation_slice(new.binary_slice(step, 0));
        true
    }

    /// Drops every session whose volume owner has released it, clearing
    /// the active selection when it is affected.
    ///
    /// Runs on entry to the public mutating operations, so no session
    /// outlives its volume across any public call.
    pub fn prune_dead_sessions(&mut self) {
        let dead: Vec<VolumeId> = self
            .sessions
            .iter()
            .filter(|(_, record)| record.volume.strong_count() == 0)
            .map(|(id, _)| id)
            .collect();
        for id in dead {
            if self.active == Some(id) {
                self.normals.set_segmentation_slice(None);
                self.active = None;
            }
            self.sessions.remove(id);
        }
    }

    // --- Reinitialization ---

    /// Resets the three stateful stages and re-syncs the active
    /// volume's bookkeeping: clears the staged session lists, refreshes
    /// the reference slice, and resizes the per-step sequences to the
    /// volume's time-step count.
    pub fn reinitialize(&mut self) {
        self.reduce.reset();
        self.normals.reset();
        self.distance.reset();
        self.state = PipelineState::Idle;

        let Some((id, volume)) = self.active_session() else {
            return;
        };
        // The staged session is stale even when the time point below
        // turns out to be invalid
        if let Some(record) = self.sessions.get_mut(id) {
            record.staged.clear_all_steps();
        }
        let Some(step) = volume.time_geometry().time_point_to_step(self.current_time_point)
        else {
            warn!(
                "interpolation cannot be reinitialized, time point {} is outside the active volume's time bounds",
                self.current_time_point
            );
            return;
        };

        self.distance.set_reference_slice(volume.binary_slice(step, 0));

        let num_steps = volume.time_geometry().num_steps();
        if let Some(record) = self.sessions.get_mut(id) {
            if record.contours.num_steps() != num_steps {
                record.contours.resize_steps(num_steps);
                record.staged.resize_steps(num_steps);
            }
        }
    }

    /// Restores a previously merged multi-polygon contour surface into
    /// fresh contour records.
    ///
    /// The mesh is split per polygon cell, coplanar cells are clustered
    /// in cell order, and each cluster is re-inserted through the normal
    /// contour path with freshly assigned slots.
    ///
    /// # Errors
    ///
    /// Returns an error if `merged` carries no label tag.
    pub fn reinitialize_from_mesh(&mut self, merged: &ContourMesh) -> Result<()> {
        let clusters = regroup::regroup_contours(merged)?;
        self.add_contours(clusters.into_iter().map(Arc::new).collect())
    }

    // --- Stage configuration pass-throughs ---

    /// Lower spacing bound for the decimation stage.
    pub fn set_min_spacing(&mut self, spacing: f64) {
        self.reduce.set_min_spacing(spacing);
    }

    /// Upper spacing bound for decimation and normal estimation.
    pub fn set_max_spacing(&mut self, spacing: f64) {
        self.reduce.set_max_spacing(spacing);
        self.normals.set_max_spacing(spacing);
    }

    /// Target voxel count of the distance image.
    pub fn set_distance_image_volume(&mut self, voxels: u32) {
        self.distance.set_distance_image_volume(voxels);
    }

    // --- Internal ---

    fn active_session(&self) -> Option<(VolumeId, Arc<dyn Volume>)> {
        let id = self.active?;
        let volume = self.sessions.get(id)?.volume.upgrade()?;
        Some((id, volume))
    }

    fn lookup(&self, volume: &Arc<dyn Volume>) -> Option<VolumeId> {
        let key: *const () = Arc::as_ptr(volume).cast();
        self.sessions
            .iter()
            .find(|(_, record)| Weak::as_ptr(&record.volume).cast::<()>() == key)
            .map(|(id, _)| id)
    }
}

fn same_volume(a: &Arc<dyn Volume>, b: &Arc<dyn Volume>) -> bool {
    let pa: *const () = Arc::as_ptr(a).cast();
    let pb: *const () = Arc::as_ptr(b).cast();
    pa == pb
}
