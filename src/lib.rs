pub mod contour;
pub mod controller;
pub mod error;
pub mod math;
pub mod mesh;
pub mod pipeline;
pub mod volume;

pub use contour::{contours_coplanar, ContourInfo};
pub use controller::{CombinedContours, InterpolationController, InterpolationResult, VolumeId};
pub use error::{IntersurfError, Result};
pub use mesh::ContourMesh;
pub use volume::{TimeGeometry, Volume, VolumeGeometry};
