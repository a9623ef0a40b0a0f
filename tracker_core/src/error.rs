//! Error taxonomy (spec.md §7). Only invalid geometry is fatal; every
//! other condition is a typed status value, never an exception crossing
//! a component boundary.

use thiserror::Error;

/// Geometry build failures (spec.md §7.1). Fatal: the caller should
/// abort the build with a non-zero exit code.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeometryError {
    #[error("unexpected shape class for volume `{0}`")]
    UnexpectedShape(String),

    #[error("identifier `{0}` is out of the packed id range")]
    IdOutOfRange(u64),

    #[error("plane `{0}` has fewer than two boundary intersections for wire at transverse coordinate {1}")]
    DegeneratePlane(String, f64),

    #[error("no orientation config found for orientation class {0}")]
    MissingOrientationConfig(u8),
}

/// Digitization failures. None of these are fatal; they describe why a
/// particular wire did not fire.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DigitizerError {
    #[error("helix arc-length minimization did not converge for wire {0}")]
    ImpactParameterSearchFailed(u64),

    #[error("segment has zero length and cannot be projected onto a wire")]
    DegenerateSegment,
}

/// Nonlinear fit status (spec.md §7.4). Stored in [`crate::reco::FitReport`],
/// never retried automatically.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FitStatus {
    #[error("converged")]
    Converged,
    #[error("maximum iterations reached without convergence")]
    MaxIterationsReached,
    #[error("objective function is degenerate (too few hits)")]
    DegenerateInput,
}

/// Errors in reconstruction orchestration.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ReconstructionError {
    #[error("no horizontal wire hits available to seed the circle fit")]
    NoHorizontalHits,
    #[error("no vertical wire hits available to seed the line fit")]
    NoVerticalHits,
    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

/// Sentinel returned by [`crate::geometry::GeometryIndex::get_cell_at_point`]
/// when the query point does not resolve to an active layer within the
/// bounded search of spec.md §7.2.
pub const UNRECOGNIZED_VOLUME_SENTINEL: i64 = -999;
