#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Thin-plate spline warping of a source mesh and auxiliary points onto a
//! target shape, driven by sparse landmark correspondences.
//!
//! [`tps::TpsResultCache`] is the entry point for interactive callers: it
//! re-solves and re-warps only what changed since the previous query.

pub mod geom;
pub mod tps;

pub use geom::{GeomMesh, Point3, Vec3};
pub use tps::{
    CoefficientSolverInputs, LandmarkPair, TpsCoefficients, TpsDocument, TpsError,
    TpsResultCache, WarpDocument,
};
