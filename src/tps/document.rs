use std::sync::Arc;

use super::landmark::{CoefficientSolverInputs, LandmarkPair};
use crate::geom::{GeomMesh, Point3};

/// Read-only view of the document a [`TpsResultCache`](super::TpsResultCache) warps.
///
/// The document owns the source mesh and the landmark lists; pairing named
/// landmarks into [`LandmarkPair`]s happens on the document side.
pub trait WarpDocument {
    fn source_mesh(&self) -> &Arc<GeomMesh>;

    /// Paired landmarks in a stable order.
    fn landmark_pairs(&self) -> &[LandmarkPair];

    /// Source-space points moved by the warp without constraining it.
    fn non_participating_landmarks(&self) -> &[Point3];

    fn blending_factor(&self) -> f64;

    fn apply_affine_translation(&self) -> bool;
    fn apply_affine_scale(&self) -> bool;
    fn apply_affine_rotation(&self) -> bool;
    fn apply_non_affine_warp(&self) -> bool;

    /// Everything the coefficient solver needs from this document.
    fn solver_inputs(&self) -> CoefficientSolverInputs {
        CoefficientSolverInputs::new(self.landmark_pairs().to_vec())
            .apply_affine_translation(self.apply_affine_translation())
            .apply_affine_scale(self.apply_affine_scale())
            .apply_affine_rotation(self.apply_affine_rotation())
            .apply_non_affine_warp(self.apply_non_affine_warp())
    }
}

/// Plain owned [`WarpDocument`].
#[derive(Debug, Clone, PartialEq)]
pub struct TpsDocument {
    pub source_mesh: Arc<GeomMesh>,
    pub landmark_pairs: Vec<LandmarkPair>,
    pub non_participating_landmarks: Vec<Point3>,
    pub blending_factor: f64,
    pub apply_affine_translation: bool,
    pub apply_affine_scale: bool,
    pub apply_affine_rotation: bool,
    pub apply_non_affine_warp: bool,
}

impl TpsDocument {
    /// Document with no landmarks, full blend and every warp component enabled.
    #[must_use]
    pub fn new(source_mesh: impl Into<Arc<GeomMesh>>) -> Self {
        Self {
            source_mesh: source_mesh.into(),
            landmark_pairs: Vec::new(),
            non_participating_landmarks: Vec::new(),
            blending_factor: 1.0,
            apply_affine_translation: true,
            apply_affine_scale: true,
            apply_affine_rotation: true,
            apply_non_affine_warp: true,
        }
    }

    #[must_use]
    pub fn with_landmark_pairs(mut self, pairs: Vec<LandmarkPair>) -> Self {
        self.landmark_pairs = pairs;
        self
    }

    #[must_use]
    pub fn with_non_participating_landmarks(mut self, points: Vec<Point3>) -> Self {
        self.non_participating_landmarks = points;
        self
    }

    #[must_use]
    pub const fn with_blending_factor(mut self, factor: f64) -> Self {
        self.blending_factor = factor;
        self
    }

    #[must_use]
    pub const fn with_affine_translation(mut self, apply: bool) -> Self {
        self.apply_affine_translation = apply;
        self
    }

    #[must_use]
    pub const fn with_affine_scale(mut self, apply: bool) -> Self {
        self.apply_affine_scale = apply;
        self
    }

    #[must_use]
    pub const fn with_affine_rotation(mut self, apply: bool) -> Self {
        self.apply_affine_rotation = apply;
        self
    }

    #[must_use]
    pub const fn with_non_affine_warp(mut self, apply: bool) -> Self {
        self.apply_non_affine_warp = apply;
        self
    }

    /// Append a landmark pair.
    pub fn add_landmark_pair(&mut self, source: Point3, destination: Point3) {
        self.landmark_pairs.push(LandmarkPair::new(source, destination));
    }
}

impl WarpDocument for TpsDocument {
    fn source_mesh(&self) -> &Arc<GeomMesh> {
        &self.source_mesh
    }

    fn landmark_pairs(&self) -> &[LandmarkPair] {
        &self.landmark_pairs
    }

    fn non_participating_landmarks(&self) -> &[Point3] {
        &self.non_participating_landmarks
    }

    fn blending_factor(&self) -> f64 {
        self.blending_factor
    }

    fn apply_affine_translation(&self) -> bool {
        self.apply_affine_translation
    }

    fn apply_affine_scale(&self) -> bool {
        self.apply_affine_scale
    }

    fn apply_affine_rotation(&self) -> bool {
        self.apply_affine_rotation
    }

    fn apply_non_affine_warp(&self) -> bool {
        self.apply_non_affine_warp
    }
}
