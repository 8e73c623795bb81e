//! Incremental result cache for warp queries.
//!
//! A UI polls the cache every frame with the current document. The cache
//! tracks four independently changing inputs and only re-runs the stages that
//! depend on what changed:
//!
//! | changed                    | solve | mesh warp | point warp |
//! |----------------------------|-------|-----------|------------|
//! | landmarks or warp toggles  | yes   | yes       | yes        |
//! | source mesh                |       | yes       |            |
//! | non-participating points   |       |           | yes        |
//! | blend factor               |       | yes       | yes        |
//!
//! # Example
//! ```ignore
//! let mut cache = TpsResultCache::new();
//! let mesh = cache.get_warped_mesh(&doc)?;
//! let points = cache.get_warped_non_participating_points(&doc)?;
//! assert_eq!(cache.stats().solves, 1);
//! ```

use std::sync::Arc;

use super::coefficients::TpsCoefficients;
use super::document::WarpDocument;
use super::error::TpsError;
use super::evaluator;
use super::landmark::CoefficientSolverInputs;
use super::solver::{SolveDiagnostics, SolverOptions, solve_with_options};
use crate::geom::{GeomMesh, Point3, TimingBucket, WarpMetrics, WarpTimingReport};

/// The solve and warp stages driven by [`TpsResultCache`].
pub trait WarpBackend {
    /// Solve coefficients for `inputs`.
    ///
    /// # Errors
    /// Any error aborts the query and leaves the cache untouched.
    fn solve(&mut self, inputs: &CoefficientSolverInputs) -> Result<TpsCoefficients, TpsError>;

    fn warp_mesh(
        &mut self,
        coefficients: &TpsCoefficients,
        mesh: &GeomMesh,
        blend_factor: f64,
    ) -> GeomMesh;

    fn warp_points(
        &mut self,
        coefficients: &TpsCoefficients,
        points: &[Point3],
        blend_factor: f64,
    ) -> Vec<Point3>;
}

/// Production backend: truncated-SVD solver and the direct evaluator.
#[derive(Debug, Clone, Default)]
pub struct TpsBackend {
    options: SolverOptions,
    last_diagnostics: Option<SolveDiagnostics>,
}

impl TpsBackend {
    #[must_use]
    pub fn new(options: SolverOptions) -> Self {
        Self {
            options,
            last_diagnostics: None,
        }
    }

    #[must_use]
    pub const fn options(&self) -> &SolverOptions {
        &self.options
    }

    /// Diagnostics of the most recent successful solve.
    #[must_use]
    pub const fn last_diagnostics(&self) -> Option<&SolveDiagnostics> {
        self.last_diagnostics.as_ref()
    }
}

impl WarpBackend for TpsBackend {
    fn solve(&mut self, inputs: &CoefficientSolverInputs) -> Result<TpsCoefficients, TpsError> {
        let (coefficients, diagnostics) = solve_with_options(inputs, &self.options)?;
        for warning in &diagnostics.warnings {
            log::warn!("tps solve: {warning}");
        }
        self.last_diagnostics = Some(diagnostics);
        Ok(coefficients)
    }

    fn warp_mesh(
        &mut self,
        coefficients: &TpsCoefficients,
        mesh: &GeomMesh,
        blend_factor: f64,
    ) -> GeomMesh {
        evaluator::warp_mesh(coefficients, mesh, blend_factor)
    }

    fn warp_points(
        &mut self,
        coefficients: &TpsCoefficients,
        points: &[Point3],
        blend_factor: f64,
    ) -> Vec<Point3> {
        evaluator::warp_points(coefficients, points, blend_factor)
    }
}

/// Work counters for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TpsCacheStats {
    /// Calls to any getter.
    pub queries: usize,
    /// Backend solve calls, including failed ones.
    pub solves: usize,
    pub mesh_warps: usize,
    pub point_warps: usize,
}

/// Caches the solved coefficients and the warped outputs of one document.
///
/// Both getters run the same dirty check, so interleaving them never causes
/// extra work. The cache is meant to be owned and polled by a single caller.
#[derive(Debug)]
pub struct TpsResultCache<B: WarpBackend = TpsBackend> {
    backend: B,
    cached_inputs: Option<CoefficientSolverInputs>,
    cached_coefficients: TpsCoefficients,
    cached_source_mesh: Option<Arc<GeomMesh>>,
    cached_blend_factor: Option<f64>,
    cached_non_participating_sources: Option<Vec<Point3>>,
    cached_warped_mesh: GeomMesh,
    cached_warped_points: Vec<Point3>,
    stats: TpsCacheStats,
    metrics: WarpMetrics,
}

impl TpsResultCache {
    /// Empty cache with the default solver options.
    #[must_use]
    pub fn new() -> Self {
        Self::with_backend(TpsBackend::default())
    }

    #[must_use]
    pub fn with_options(options: SolverOptions) -> Self {
        Self::with_backend(TpsBackend::new(options))
    }
}

impl Default for TpsResultCache {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: WarpBackend> TpsResultCache<B> {
    #[must_use]
    pub fn with_backend(backend: B) -> Self {
        let mut metrics = WarpMetrics::default();
        metrics.begin();
        Self {
            backend,
            cached_inputs: None,
            cached_coefficients: TpsCoefficients::identity(),
            cached_source_mesh: None,
            cached_blend_factor: None,
            cached_non_participating_sources: None,
            cached_warped_mesh: GeomMesh::default(),
            cached_warped_points: Vec::new(),
            stats: TpsCacheStats::default(),
            metrics,
        }
    }

    /// Warped copy of the document's source mesh.
    ///
    /// # Errors
    /// Returns the solver error if the landmarks changed and could not be
    /// solved. The previously cached results are kept in that case.
    pub fn get_warped_mesh<D: WarpDocument + ?Sized>(
        &mut self,
        doc: &D,
    ) -> Result<&GeomMesh, TpsError> {
        self.update(doc)?;
        Ok(&self.cached_warped_mesh)
    }

    /// Warped non-participating landmarks, in document order.
    ///
    /// # Errors
    /// See [`get_warped_mesh`](Self::get_warped_mesh).
    pub fn get_warped_non_participating_points<D: WarpDocument + ?Sized>(
        &mut self,
        doc: &D,
    ) -> Result<&[Point3], TpsError> {
        self.update(doc)?;
        Ok(&self.cached_warped_points)
    }

    /// Coefficients solved for the document's current landmarks.
    ///
    /// # Errors
    /// See [`get_warped_mesh`](Self::get_warped_mesh).
    pub fn get_coefficients<D: WarpDocument + ?Sized>(
        &mut self,
        doc: &D,
    ) -> Result<&TpsCoefficients, TpsError> {
        self.update(doc)?;
        Ok(&self.cached_coefficients)
    }

    #[must_use]
    pub const fn stats(&self) -> TpsCacheStats {
        self.stats
    }

    /// Cumulative stage timings since construction or the last [`clear`](Self::clear).
    ///
    /// `None` unless the `warp_metrics` feature is enabled.
    #[must_use]
    pub fn timing_report(&self) -> Option<WarpTimingReport> {
        self.metrics.end()
    }

    /// Drop every cached value and reset counters. The next query recomputes everything.
    pub fn clear(&mut self) {
        self.cached_inputs = None;
        self.cached_coefficients = TpsCoefficients::identity();
        self.cached_source_mesh = None;
        self.cached_blend_factor = None;
        self.cached_non_participating_sources = None;
        self.cached_warped_mesh = GeomMesh::default();
        self.cached_warped_points.clear();
        self.stats = TpsCacheStats::default();
        self.metrics.begin();
    }

    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    fn inputs_unchanged<D: WarpDocument + ?Sized>(&self, doc: &D) -> bool {
        self.cached_inputs.as_ref().is_some_and(|cached| {
            cached.apply_affine_translation == doc.apply_affine_translation()
                && cached.apply_affine_scale == doc.apply_affine_scale()
                && cached.apply_affine_rotation == doc.apply_affine_rotation()
                && cached.apply_non_affine_warp == doc.apply_non_affine_warp()
                && cached.landmarks.as_slice() == doc.landmark_pairs()
        })
    }

    fn update<D: WarpDocument + ?Sized>(&mut self, doc: &D) -> Result<(), TpsError> {
        self.stats.queries += 1;

        // 1. coefficients
        let solved = if self.inputs_unchanged(doc) {
            None
        } else {
            let inputs = doc.solver_inputs();
            let backend = &mut self.backend;
            self.stats.solves += 1;
            let coefficients = self
                .metrics
                .time(TimingBucket::Solve, || backend.solve(&inputs))?;
            Some((inputs, coefficients))
        };
        let coefficients_changed = solved.is_some();

        // 2..4. mesh, non-participating points, blend
        let source_mesh = doc.source_mesh();
        let points = doc.non_participating_landmarks();
        let blend_factor = doc.blending_factor();

        let (mesh_identical, mesh_changed, points_changed, blend_changed) =
            self.metrics.time(TimingBucket::Cache, || {
                let identical = self
                    .cached_source_mesh
                    .as_ref()
                    .is_some_and(|cached| Arc::ptr_eq(cached, source_mesh));
                let equal = identical
                    || self
                        .cached_source_mesh
                        .as_ref()
                        .is_some_and(|cached| **cached == **source_mesh);
                let points_changed =
                    self.cached_non_participating_sources.as_deref() != Some(points);
                let blend_changed = self
                    .cached_blend_factor
                    .is_none_or(|cached| cached.to_bits() != blend_factor.to_bits());
                (identical, !equal, points_changed, blend_changed)
            });

        if coefficients_changed || mesh_changed || points_changed || blend_changed {
            log::debug!(
                "tps cache refresh: coefficients={coefficients_changed} mesh={mesh_changed} \
                 points={points_changed} blend={blend_changed}"
            );
        }

        // 5..6. warps, computed before anything is committed
        let coefficients = solved
            .as_ref()
            .map_or(&self.cached_coefficients, |(_, solved)| solved);
        let backend = &mut self.backend;
        let metrics = &mut self.metrics;

        let warped_mesh = (coefficients_changed || mesh_changed || blend_changed).then(|| {
            metrics.time(TimingBucket::MeshWarp, || {
                backend.warp_mesh(coefficients, source_mesh, blend_factor)
            })
        });
        let warped_points = (coefficients_changed || points_changed || blend_changed).then(|| {
            metrics.time(TimingBucket::PointWarp, || {
                backend.warp_points(coefficients, points, blend_factor)
            })
        });

        // commit
        if let Some((inputs, coefficients)) = solved {
            self.cached_inputs = Some(inputs);
            self.cached_coefficients = coefficients;
        }
        if !mesh_identical {
            self.cached_source_mesh = Some(Arc::clone(source_mesh));
        }
        if points_changed {
            self.cached_non_participating_sources = Some(points.to_vec());
        }
        self.cached_blend_factor = Some(blend_factor);
        if let Some(mesh) = warped_mesh {
            self.cached_warped_mesh = mesh;
            self.stats.mesh_warps += 1;
        }
        if let Some(points) = warped_points {
            self.cached_warped_points = points;
            self.stats.point_warps += 1;
        }

        Ok(())
    }
}
