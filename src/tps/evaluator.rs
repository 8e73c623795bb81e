//! Evaluation of a solved warp at query points.
//!
//! Every point is warped independently, so the batch forms may run in
//! parallel (`parallel` feature) while keeping the output order of the input.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::coefficients::TpsCoefficients;
use crate::geom::{GeomMesh, Point3};

/// Radial basis kernel of the 3D thin-plate spline.
///
/// In three dimensions the biharmonic Green's function is linear in the
/// distance, `U(r) = r`. The `r^2 log r` kernel only applies to 2D splines.
#[inline]
#[must_use]
pub fn radial_basis(r: f64) -> f64 {
    r
}

/// Full (unblended) warp of `p`.
#[must_use]
pub fn evaluate(coefficients: &TpsCoefficients, p: Point3) -> Point3 {
    let mut rv = coefficients.a1
        + coefficients.a2 * p.x
        + coefficients.a3 * p.y
        + coefficients.a4 * p.z;

    for term in &coefficients.non_affine_terms {
        rv = rv + term.weight * radial_basis(term.control_point.distance_to(p));
    }

    Point3::from(rv)
}

/// Warp `p`, blended with the identity map.
///
/// `blend_factor` 0 returns `p`, 1 returns the full warp. Values outside
/// `[0, 1]` extrapolate; clamping is the caller's business.
#[must_use]
pub fn warp_point(coefficients: &TpsCoefficients, p: Point3, blend_factor: f64) -> Point3 {
    p.lerp(evaluate(coefficients, p), blend_factor)
}

/// Warp a batch of points. Output has the same length and order as `points`.
#[must_use]
pub fn warp_points(
    coefficients: &TpsCoefficients,
    points: &[Point3],
    blend_factor: f64,
) -> Vec<Point3> {
    #[cfg(feature = "parallel")]
    {
        points
            .par_iter()
            .map(|&p| warp_point(coefficients, p, blend_factor))
            .collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        points
            .iter()
            .map(|&p| warp_point(coefficients, p, blend_factor))
            .collect()
    }
}

/// Warp a buffer of points in place.
pub fn warp_points_in_place(
    coefficients: &TpsCoefficients,
    points: &mut [Point3],
    blend_factor: f64,
) {
    #[cfg(feature = "parallel")]
    points
        .par_iter_mut()
        .for_each(|p| *p = warp_point(coefficients, *p, blend_factor));

    #[cfg(not(feature = "parallel"))]
    for p in points.iter_mut() {
        *p = warp_point(coefficients, *p, blend_factor);
    }
}

/// Copy of `mesh` with every vertex position warped.
///
/// Indices, UVs and normals are copied verbatim. Normals are not recomputed.
#[must_use]
pub fn warp_mesh(coefficients: &TpsCoefficients, mesh: &GeomMesh, blend_factor: f64) -> GeomMesh {
    let mut warped = mesh.clone();
    warp_mesh_in_place(coefficients, &mut warped, blend_factor);
    warped
}

/// Warp the vertex positions of `mesh` in place.
pub fn warp_mesh_in_place(coefficients: &TpsCoefficients, mesh: &mut GeomMesh, blend_factor: f64) {
    let warp_position = |pos: &mut [f64; 3]| {
        *pos = warp_point(coefficients, Point3::from_array(*pos), blend_factor).to_array();
    };

    #[cfg(feature = "parallel")]
    mesh.positions.par_iter_mut().for_each(warp_position);

    #[cfg(not(feature = "parallel"))]
    mesh.positions.iter_mut().for_each(warp_position);
}
