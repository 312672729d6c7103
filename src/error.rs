use thiserror::Error;

/// Top-level error type for the intersurf controller.
#[derive(Debug, Error)]
pub enum IntersurfError {
    #[error(transparent)]
    Contour(#[from] ContourError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// Errors related to contour records and their source meshes.
#[derive(Debug, Error)]
pub enum ContourError {
    #[error("contour mesh carries no label tag")]
    MissingLabelTag,

    #[error("contour mesh has no polygon cells")]
    NoPolygons,
}

/// Errors raised by the external reconstruction stages.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("pipeline stage failed: {0}")]
    Stage(String),

    #[error("implicit-field stage produced no output")]
    MissingDistanceField,
}

/// Convenience type alias for results using [`IntersurfError`].
pub type Result<T> = std::result::Result<T, IntersurfError>;
