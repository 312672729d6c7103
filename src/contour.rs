use std::sync::Arc;

use crate::error::{ContourError, Result};
use crate::math::{polygon_normal, Point3, Vector3, COPLANARITY_TOLERANCE};
use crate::mesh::ContourMesh;

/// One drawn contour together with the plane it was drawn on.
///
/// The mesh handle is shared with whoever produced the contour; the
/// normal and representative point pin down the drawing plane, the label
/// identifies the segmentation label, and the slot is the stable plane
/// identifier assigned by the controller (`None` until assigned).
#[derive(Debug, Clone)]
pub struct ContourInfo {
    /// Handle to the contour's polygon mesh.
    pub mesh: Arc<ContourMesh>,
    /// Normal of the drawing plane.
    pub normal: Vector3,
    /// A point on the drawing plane (the mesh's first vertex).
    pub point: Point3,
    /// Label value the contour belongs to.
    pub label: i32,
    /// Position slot of the drawing plane, `None` while unassigned.
    pub slot: Option<u32>,
}

impl ContourInfo {
    /// Derives a contour record from a polygon mesh.
    ///
    /// The plane normal is computed over the mesh's point loop, the
    /// representative point is the first vertex, and the slot is left
    /// unassigned.
    ///
    /// # Errors
    ///
    /// Returns [`ContourError::MissingLabelTag`] if the mesh carries no
    /// label tag, and [`ContourError::NoPolygons`] if it has no points to
    /// derive a plane from.
    pub fn from_mesh(mesh: Arc<ContourMesh>) -> Result<Self> {
        let label = mesh.label_tag().ok_or(ContourError::MissingLabelTag)?;
        let point = *mesh.points().first().ok_or(ContourError::NoPolygons)?;
        let normal = polygon_normal(mesh.points());
        Ok(Self {
            mesh,
            normal,
            point,
            label,
            slot: None,
        })
    }

    /// Builds a plane-only probe record with an empty mesh.
    ///
    /// Probes are used for removal and lookup, where only the plane
    /// matters; label and slot take part in neither operation.
    #[must_use]
    pub fn probe(normal: Vector3, point: Point3) -> Self {
        Self {
            mesh: Arc::new(ContourMesh::new()),
            normal,
            point,
            label: 0,
            slot: None,
        }
    }
}

/// Tests whether two contours lie in the same geometric plane.
///
/// Two checks, both against [`COPLANARITY_TOLERANCE`]:
///
/// 1. the normals are parallel, sign-insensitive: `|n_a . n_b|` equals
///    `|n_a| * |n_b|` within tolerance;
/// 2. the displacement between the representative points is orthogonal
///    to one of the normals: `n_b . (p_a - p_b)` is zero within
///    tolerance.
///
/// The predicate is symmetric but not transitive near the tolerance
/// boundary, so tolerance-based plane grouping is best-effort rather
/// than exact. Degenerate normals are not special-cased; callers supply
/// polygon-derived normals.
#[must_use]
pub fn contours_coplanar(a: &ContourInfo, b: &ContourInfo) -> bool {
    let displacement = a.point - b.point;
    let in_plane = b.normal.dot(&displacement).abs() <= COPLANARITY_TOLERANCE;

    let parallel = (a.normal.norm() * b.normal.norm() - a.normal.dot(&b.normal).abs()).abs()
        <= COPLANARITY_TOLERANCE;

    in_plane && parallel
}
