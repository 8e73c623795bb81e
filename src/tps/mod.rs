//! Thin-plate spline warping of meshes and point sets.

mod cache;
mod coefficients;
mod document;
mod error;
mod evaluator;
mod landmark;
mod solver;

pub use cache::{TpsBackend, TpsCacheStats, TpsResultCache, WarpBackend};
pub use coefficients::{NonAffineTerm, TpsCoefficients};
pub use document::{TpsDocument, WarpDocument};
pub use error::TpsError;
pub use evaluator::{
    evaluate, radial_basis, warp_mesh, warp_mesh_in_place, warp_point, warp_points,
    warp_points_in_place,
};
pub use landmark::{CoefficientSolverInputs, LandmarkPair};
pub use solver::{SolveDiagnostics, SolverOptions, solve, solve_with_options};

#[cfg(test)]
mod tests;
