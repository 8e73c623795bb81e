//! Tests for incremental recomputation in the result cache.

use std::sync::Arc;

use super::{pairs_mapped, unit_cube_mesh, unit_tetrahedron};
use crate::geom::{GeomMesh, Point3};
use crate::tps::{
    CoefficientSolverInputs, LandmarkPair, TpsBackend, TpsCoefficients, TpsDocument, TpsError,
    TpsResultCache, WarpBackend, solve, warp_mesh, warp_points,
};

// ============================================================================
// Counting backend
// ============================================================================

/// Wraps the production backend and counts every stage it runs.
#[derive(Debug, Default)]
struct CountingBackend {
    inner: TpsBackend,
    solves: usize,
    mesh_warps: usize,
    point_warps: usize,
    fail_solves: bool,
}

impl WarpBackend for CountingBackend {
    fn solve(&mut self, inputs: &CoefficientSolverInputs) -> Result<TpsCoefficients, TpsError> {
        self.solves += 1;
        if self.fail_solves {
            return Err(TpsError::SolveFailed("injected failure".to_string()));
        }
        self.inner.solve(inputs)
    }

    fn warp_mesh(
        &mut self,
        coefficients: &TpsCoefficients,
        mesh: &GeomMesh,
        blend_factor: f64,
    ) -> GeomMesh {
        self.mesh_warps += 1;
        self.inner.warp_mesh(coefficients, mesh, blend_factor)
    }

    fn warp_points(
        &mut self,
        coefficients: &TpsCoefficients,
        points: &[Point3],
        blend_factor: f64,
    ) -> Vec<Point3> {
        self.point_warps += 1;
        self.inner.warp_points(coefficients, points, blend_factor)
    }
}

fn counting_cache() -> TpsResultCache<CountingBackend> {
    TpsResultCache::with_backend(CountingBackend::default())
}

fn counts(cache: &TpsResultCache<CountingBackend>) -> (usize, usize, usize) {
    let backend = cache.backend();
    (backend.solves, backend.mesh_warps, backend.point_warps)
}

fn stretch(p: Point3) -> Point3 {
    Point3::new(1.5 * p.x, p.y + 0.2 * p.x * p.z, p.z - 0.1)
}

fn sample_document() -> TpsDocument {
    let mut sources = unit_tetrahedron();
    sources.push(Point3::new(1.0, 1.0, 1.0));
    TpsDocument::new(unit_cube_mesh())
        .with_landmark_pairs(pairs_mapped(&sources, stretch))
        .with_non_participating_landmarks(vec![
            Point3::new(0.5, 0.5, 0.5),
            Point3::new(0.2, 0.8, 0.1),
        ])
}

// ============================================================================
// Single-solve invariant
// ============================================================================

#[test]
fn repeated_queries_solve_and_warp_once() {
    let doc = sample_document();
    let mut cache = counting_cache();

    for _ in 0..10 {
        cache.get_warped_mesh(&doc).unwrap();
    }
    assert_eq!(counts(&cache), (1, 1, 1));

    let stats = cache.stats();
    assert_eq!(stats.queries, 10);
    assert_eq!(stats.solves, 1);
    assert_eq!(stats.mesh_warps, 1);
    assert_eq!(stats.point_warps, 1);
}

#[test]
fn interleaved_getters_share_one_refresh() {
    let doc = sample_document();
    let mut cache = counting_cache();

    for _ in 0..5 {
        cache.get_warped_non_participating_points(&doc).unwrap();
        cache.get_warped_mesh(&doc).unwrap();
        cache.get_coefficients(&doc).unwrap();
    }
    assert_eq!(counts(&cache), (1, 1, 1));
}

#[test]
fn cached_results_match_direct_evaluation() {
    let doc = sample_document().with_blending_factor(0.6);
    let mut cache = TpsResultCache::new();

    let expected_coefficients = solve(&CoefficientSolverInputs::new(doc.landmark_pairs.clone()))
        .unwrap();
    let expected_mesh = warp_mesh(&expected_coefficients, &doc.source_mesh, 0.6);
    let expected_points = warp_points(&expected_coefficients, &doc.non_participating_landmarks, 0.6);

    assert_eq!(cache.get_coefficients(&doc).unwrap(), &expected_coefficients);
    assert_eq!(cache.get_warped_mesh(&doc).unwrap(), &expected_mesh);
    assert_eq!(
        cache.get_warped_non_participating_points(&doc).unwrap(),
        expected_points.as_slice()
    );
    assert!(cache.backend().last_diagnostics().is_some());
}

// ============================================================================
// Independent invalidation
// ============================================================================

#[test]
fn non_participating_edit_skips_mesh_warp() {
    let mut doc = sample_document();
    let mut cache = counting_cache();
    cache.get_warped_mesh(&doc).unwrap();

    doc.non_participating_landmarks[0] = Point3::new(0.9, 0.1, 0.4);
    let warped = cache.get_warped_non_participating_points(&doc).unwrap().to_vec();
    assert_eq!(counts(&cache), (1, 1, 2));
    assert_eq!(warped.len(), 2);

    doc.non_participating_landmarks.push(Point3::ORIGIN);
    assert_eq!(cache.get_warped_non_participating_points(&doc).unwrap().len(), 3);
    assert_eq!(counts(&cache), (1, 1, 3));
}

#[test]
fn mesh_swap_skips_solve_and_point_warp() {
    let mut doc = sample_document();
    let mut cache = counting_cache();
    cache.get_warped_mesh(&doc).unwrap();

    let mut bigger = unit_cube_mesh();
    for p in &mut bigger.positions {
        p[0] *= 2.0;
    }
    doc.source_mesh = Arc::new(bigger);
    cache.get_warped_mesh(&doc).unwrap();
    assert_eq!(counts(&cache), (1, 2, 1));
}

#[test]
fn equal_mesh_in_new_allocation_is_not_rewarped() {
    let mut doc = sample_document();
    let mut cache = counting_cache();
    cache.get_warped_mesh(&doc).unwrap();

    doc.source_mesh = Arc::new(unit_cube_mesh());
    cache.get_warped_mesh(&doc).unwrap();
    cache.get_warped_mesh(&doc).unwrap();
    assert_eq!(counts(&cache), (1, 1, 1));
}

#[test]
fn blend_change_rewarps_without_solving() {
    let doc = sample_document();
    let mut cache = counting_cache();
    cache.get_warped_mesh(&doc).unwrap();

    let identity = doc.clone().with_blending_factor(0.0);
    let mesh = cache.get_warped_mesh(&identity).unwrap().clone();
    assert_eq!(counts(&cache), (1, 2, 2));
    assert_eq!(&mesh, doc.source_mesh.as_ref());
    assert_eq!(
        cache.get_warped_non_participating_points(&identity).unwrap(),
        doc.non_participating_landmarks.as_slice()
    );
}

#[test]
fn nan_blend_does_not_thrash() {
    let doc = sample_document().with_blending_factor(f64::NAN);
    let mut cache = counting_cache();
    for _ in 0..3 {
        cache.get_warped_mesh(&doc).unwrap();
    }
    assert_eq!(counts(&cache), (1, 1, 1));
}

#[test]
fn landmark_edit_resolves_and_rewarps_everything() {
    let mut doc = sample_document();
    let mut cache = counting_cache();
    cache.get_warped_mesh(&doc).unwrap();

    doc.landmark_pairs[0].destination = Point3::new(-0.2, 0.0, 0.0);
    cache.get_warped_mesh(&doc).unwrap();
    assert_eq!(counts(&cache), (2, 2, 2));
}

#[test]
fn toggle_change_resolves() {
    let doc = sample_document();
    let mut cache = counting_cache();
    cache.get_warped_mesh(&doc).unwrap();

    let affine = doc.clone().with_non_affine_warp(false);
    let coefficients = cache.get_coefficients(&affine).unwrap();
    assert!(coefficients.non_affine_terms.is_empty());
    assert_eq!(counts(&cache), (2, 2, 2));
}

#[test]
fn reordered_landmarks_count_as_a_change() {
    let mut doc = sample_document();
    let mut cache = counting_cache();
    cache.get_warped_mesh(&doc).unwrap();

    doc.landmark_pairs.reverse();
    cache.get_warped_mesh(&doc).unwrap();
    assert_eq!(counts(&cache).0, 2);
}

// ============================================================================
// Failure handling
// ============================================================================

#[test]
fn failed_solve_keeps_last_good_state() {
    let doc = sample_document();
    let mut cache = counting_cache();
    let good_mesh = cache.get_warped_mesh(&doc).unwrap().clone();
    let good_points = cache.get_warped_non_participating_points(&doc).unwrap().to_vec();

    let mut edited = doc.clone().with_blending_factor(0.5);
    edited.landmark_pairs[1].destination = Point3::new(3.0, 0.0, 0.0);
    edited.source_mesh = Arc::new(GeomMesh::new(vec![[0.0, 0.0, 0.0]], Vec::new()));
    cache.backend_mut().fail_solves = true;
    assert!(matches!(
        cache.get_warped_mesh(&edited),
        Err(TpsError::SolveFailed(_))
    ));
    assert_eq!(counts(&cache), (2, 1, 1));

    // The original document still matches every cached input.
    cache.backend_mut().fail_solves = false;
    assert_eq!(cache.get_warped_mesh(&doc).unwrap(), &good_mesh);
    assert_eq!(
        cache.get_warped_non_participating_points(&doc).unwrap(),
        good_points.as_slice()
    );
    assert_eq!(counts(&cache), (2, 1, 1));
}

#[test]
fn non_finite_landmark_surfaces_as_error() {
    let doc = sample_document();
    let mut cache = TpsResultCache::new();
    let good = cache.get_coefficients(&doc).unwrap().clone();

    let mut broken = doc.clone();
    broken.landmark_pairs.push(LandmarkPair::new(
        Point3::new(f64::INFINITY, 0.0, 0.0),
        Point3::ORIGIN,
    ));
    assert_eq!(
        cache.get_warped_mesh(&broken),
        Err(TpsError::NonFiniteLandmark { index: 5 })
    );
    assert_eq!(cache.get_coefficients(&doc).unwrap(), &good);
    assert_eq!(cache.stats().solves, 2);
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn clear_forces_full_recompute() {
    let doc = sample_document();
    let mut cache = counting_cache();
    cache.get_warped_mesh(&doc).unwrap();

    cache.clear();
    assert_eq!(cache.stats().queries, 0);
    cache.get_warped_mesh(&doc).unwrap();
    assert_eq!(counts(&cache), (2, 2, 2));
}

#[test]
fn empty_document_warps_to_identity() {
    let doc = TpsDocument::new(unit_cube_mesh())
        .with_non_participating_landmarks(vec![Point3::new(0.3, 0.3, 0.3)]);
    let mut cache = TpsResultCache::new();

    assert_eq!(cache.get_warped_mesh(&doc).unwrap(), doc.source_mesh.as_ref());
    assert_eq!(
        cache.get_warped_non_participating_points(&doc).unwrap(),
        doc.non_participating_landmarks.as_slice()
    );
    assert_eq!(cache.get_coefficients(&doc).unwrap(), &TpsCoefficients::identity());
}

#[test]
fn timing_report_follows_feature_flag() {
    let doc = sample_document();
    let mut cache = TpsResultCache::new();
    cache.get_warped_mesh(&doc).unwrap();

    #[cfg(not(feature = "warp_metrics"))]
    assert!(cache.timing_report().is_none());
    #[cfg(all(feature = "warp_metrics", not(target_arch = "wasm32")))]
    assert!(cache.timing_report().is_some());
}
