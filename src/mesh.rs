use std::sync::Arc;

use crate::math::Point3;

/// A planar-polygon mesh holding one or more closed contour loops.
///
/// Points are shared through an index-based cell list, and an attached
/// integer field carries per-mesh metadata; by convention its first entry
/// is the label tag of the segmentation label the contours were drawn
/// for. This is the mesh shape produced by the drawing tools and consumed
/// by the reconstruction stages.
#[derive(Debug, Clone, Default)]
pub struct ContourMesh {
    points: Vec<Point3>,
    polygons: Vec<Vec<usize>>,
    field: Vec<i32>,
}

impl ContourMesh {
    /// Creates an empty mesh with no points, cells, or field data.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mesh containing a single closed polygon over `points`,
    /// tagged with `label`.
    #[must_use]
    pub fn from_loop(points: Vec<Point3>, label: i32) -> Self {
        let cell: Vec<usize> = (0..points.len()).collect();
        let polygons = if cell.is_empty() { Vec::new() } else { vec![cell] };
        Self {
            points,
            polygons,
            field: vec![label],
        }
    }

    /// Returns the point list.
    #[must_use]
    pub fn points(&self) -> &[Point3] {
        &self.points
    }

    /// Returns the polygon cells as point-index loops.
    #[must_use]
    pub fn polygons(&self) -> &[Vec<usize>] {
        &self.polygons
    }

    /// Returns the label tag, i.e. the first entry of the attached
    /// integer field, if any field is attached.
    #[must_use]
    pub fn label_tag(&self) -> Option<i32> {
        self.field.first().copied()
    }

    /// Attaches `label` as the mesh's label tag, replacing any
    /// previously attached field.
    pub fn set_label_tag(&mut self, label: i32) {
        self.field = vec![label];
    }

    /// Returns the number of points in the mesh.
    #[must_use]
    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    /// Returns `true` if the mesh holds no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Appends one polygon cell, renumbering its points into this mesh.
    pub fn push_polygon(&mut self, loop_points: &[Point3]) {
        let base = self.points.len();
        self.points.extend_from_slice(loop_points);
        self.polygons.push((base..base + loop_points.len()).collect());
    }

    /// Returns a decoupled deep copy, detached from any producer that
    /// still holds the original.
    #[must_use]
    pub fn detach(&self) -> Self {
        self.clone()
    }

    /// Merges several meshes into one combined mesh.
    ///
    /// Points are renumbered, cells are appended in input order, and the
    /// integer fields are concatenated so the first mesh's label tag
    /// becomes the merged mesh's tag.
    #[must_use]
    pub fn merge(meshes: &[Arc<ContourMesh>]) -> Self {
        let mut merged = Self::new();
        for mesh in meshes {
            for cell in &mesh.polygons {
                let loop_points: Vec<Point3> = cell.iter().map(|&i| mesh.points[i]).collect();
                merged.push_polygon(&loop_points);
            }
            merged.field.extend_from_slice(&mesh.field);
        }
        merged
    }

    /// Extracts the point loop of every polygon cell, in cell order.
    #[must_use]
    pub fn split_polygons(&self) -> Vec<Vec<Point3>> {
        self.polygons
            .iter()
            .map(|cell| cell.iter().map(|&i| self.points[i]).collect())
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    fn square_at(z: f64) -> Vec<Point3> {
        vec![
            p(0.0, 0.0, z),
            p(1.0, 0.0, z),
            p(1.0, 1.0, z),
            p(0.0, 1.0, z),
        ]
    }

    #[test]
    fn from_loop_builds_single_cell() {
        let mesh = ContourMesh::from_loop(square_at(0.0), 3);
        assert_eq!(mesh.num_points(), 4);
        assert_eq!(mesh.polygons().len(), 1);
        assert_eq!(mesh.label_tag(), Some(3));
    }

    #[test]
    fn empty_loop_has_no_cells() {
        let mesh = ContourMesh::from_loop(Vec::new(), 1);
        assert!(mesh.is_empty());
        assert!(mesh.polygons().is_empty());
        assert_eq!(mesh.label_tag(), Some(1));
    }

    #[test]
    fn merge_renumbers_points() {
        let a = Arc::new(ContourMesh::from_loop(square_at(0.0), 1));
        let b = Arc::new(ContourMesh::from_loop(square_at(2.0), 1));
        let merged = ContourMesh::merge(&[a, b]);
        assert_eq!(merged.num_points(), 8);
        assert_eq!(merged.polygons().len(), 2);
        // Second cell must reference the renumbered points
        assert_eq!(merged.polygons()[1], vec![4, 5, 6, 7]);
        assert_eq!(merged.label_tag(), Some(1));
    }

    #[test]
    fn split_recovers_cell_loops() {
        let a = Arc::new(ContourMesh::from_loop(square_at(0.0), 1));
        let b = Arc::new(ContourMesh::from_loop(square_at(2.0), 1));
        let merged = ContourMesh::merge(&[a, b]);
        let loops = merged.split_polygons();
        assert_eq!(loops.len(), 2);
        assert_eq!(loops[0], square_at(0.0));
        assert_eq!(loops[1], square_at(2.0));
    }

    #[test]
    fn detach_is_independent() {
        let mut mesh = ContourMesh::from_loop(square_at(0.0), 1);
        let snapshot = mesh.detach();
        mesh.push_polygon(&square_at(1.0));
        assert_eq!(snapshot.polygons().len(), 1);
        assert_eq!(mesh.polygons().len(), 2);
    }
}
