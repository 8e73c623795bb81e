use serde::{Deserialize, Serialize};

use crate::geom::{Point3, Vec3};

/// A corresponding pair of points: where a landmark sits on the source shape
/// and where it should end up on the destination shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LandmarkPair {
    pub source: Point3,
    pub destination: Point3,
}

impl LandmarkPair {
    #[must_use]
    pub const fn new(source: Point3, destination: Point3) -> Self {
        Self {
            source,
            destination,
        }
    }

    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.source.is_finite() && self.destination.is_finite()
    }

    /// Vector from the source to the destination.
    #[must_use]
    pub fn displacement(&self) -> Vec3 {
        self.destination - self.source
    }
}

/// Everything the coefficient solver reads.
///
/// Equality is by value and includes landmark order, so two inputs holding the
/// same pairs in a different order compare unequal even though they solve to
/// the same warp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientSolverInputs {
    pub landmarks: Vec<LandmarkPair>,
    pub apply_affine_translation: bool,
    pub apply_affine_scale: bool,
    pub apply_affine_rotation: bool,
    pub apply_non_affine_warp: bool,
}

impl CoefficientSolverInputs {
    /// Inputs with every warp component enabled.
    #[must_use]
    pub fn new(landmarks: Vec<LandmarkPair>) -> Self {
        Self {
            landmarks,
            apply_affine_translation: true,
            apply_affine_scale: true,
            apply_affine_rotation: true,
            apply_non_affine_warp: true,
        }
    }

    #[must_use]
    pub const fn apply_affine_translation(mut self, apply: bool) -> Self {
        self.apply_affine_translation = apply;
        self
    }

    #[must_use]
    pub const fn apply_affine_scale(mut self, apply: bool) -> Self {
        self.apply_affine_scale = apply;
        self
    }

    #[must_use]
    pub const fn apply_affine_rotation(mut self, apply: bool) -> Self {
        self.apply_affine_rotation = apply;
        self
    }

    #[must_use]
    pub const fn apply_non_affine_warp(mut self, apply: bool) -> Self {
        self.apply_non_affine_warp = apply;
        self
    }
}

impl Default for CoefficientSolverInputs {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}
