//! Regrouping of a previously merged multi-polygon contour surface.
//!
//! A combined contour mesh (for example one reloaded from storage) is
//! split back into its polygon cells, each cell's plane is re-derived,
//! coplanar cells are clustered, and every cluster is rebuilt as one
//! mesh ready for re-insertion through the normal contour path.

use crate::contour::{contours_coplanar, ContourInfo};
use crate::error::{ContourError, Result};
use crate::math::{polygon_normal, Point3};
use crate::mesh::ContourMesh;

/// Splits `merged` into per-plane contour meshes.
///
/// Clustering is greedy and order-preserving: the first remaining cell
/// seeds a cluster and pulls in every later cell coplanar with it;
/// rejected cells are never re-checked against another seed, so
/// ambiguous near-tolerance groupings follow cell order. Each cluster is
/// rebuilt with renumbered points and inherits the merged mesh's label
/// tag.
///
/// # Errors
///
/// Returns [`ContourError::MissingLabelTag`] if `merged` carries no
/// label tag; the rebuilt meshes could not be re-inserted without one.
pub fn regroup_contours(merged: &ContourMesh) -> Result<Vec<ContourMesh>> {
    let label = merged.label_tag().ok_or(ContourError::MissingLabelTag)?;

    let mut remaining: Vec<(ContourInfo, Vec<Point3>)> = merged
        .split_polygons()
        .into_iter()
        .filter(|cell| !cell.is_empty())
        .map(|cell| {
            let info = ContourInfo::probe(polygon_normal(&cell), cell[0]);
            (info, cell)
        })
        .collect();

    let mut clusters: Vec<ContourMesh> = Vec::new();
    while !remaining.is_empty() {
        let (seed, seed_points) = remaining.remove(0);
        let mut mesh = ContourMesh::new();
        mesh.set_label_tag(label);
        mesh.push_polygon(&seed_points);

        let mut i = 0;
        while i < remaining.len() {
            if contours_coplanar(&seed, &remaining[i].0) {
                let (_, points) = remaining.remove(i);
                mesh.push_polygon(&points);
            } else {
                i += 1;
            }
        }
        clusters.push(mesh);
    }
    Ok(clusters)
}
