//! Thin-plate spline coefficient solver.
//!
//! For `n` landmark pairs the solver assembles the classic TPS system
//!
//! ```text
//! | K   P | | w |   | y |
//! | P^T 0 | | a | = | 0 |
//! ```
//!
//! where `K[i][j] = U(|s_i - s_j|)`, `P` holds the affine basis of each source
//! point and `y` the destinations. Every system is solved with a truncated
//! SVD, so rank-deficient layouts (fewer than four pairs, collinear or coplanar
//! sources, duplicated landmarks) produce the minimum-norm least-squares answer
//! instead of an error.
//!
//! The linear part of the affine map is written as `base + D` and the system is
//! solved for `D`, with `base` moved to the right-hand side. `base` is the
//! identity unless rotation-only fitting pins it to a rotation. Directions the
//! landmarks leave unconstrained therefore default to the identity map: a single
//! pair yields a pure translation rather than collapsing everything onto the
//! destination point.
//!
//! Affine toggles shape the columns of `P`:
//!
//! | translation | scale | rotation | columns per output axis              |
//! |-------------|-------|----------|--------------------------------------|
//! | on          |       |          | `1`                                  |
//! |             | on    | on       | `x, y, z` (full linear part)         |
//! |             | on    | off      | the axis' own coordinate (diagonal)  |
//! |             | off   | on       | none, `base` = nearest rotation      |
//! |             | off   | off      | none, `base` = identity              |
//!
//! Disabling the non-affine warp drops `K` and the side conditions, leaving
//! an over-determined affine least-squares fit.

use nalgebra::{DMatrix, DVector, Matrix3, Vector3};

use super::coefficients::{NonAffineTerm, TpsCoefficients};
use super::error::TpsError;
use super::evaluator::radial_basis;
use super::landmark::{CoefficientSolverInputs, LandmarkPair};
use crate::geom::{Point3, Vec3};

/// Configuration for the least-squares solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverOptions {
    /// Singular values below `rcond * sigma_max` are treated as zero.
    /// `None` uses `f64::EPSILON * max(rows, cols)`.
    pub rcond: Option<f64>,
    /// Iteration cap for each singular value decomposition.
    pub max_iterations: usize,
}

impl SolverOptions {
    pub const DEFAULT_MAX_ITERATIONS: usize = 10_000;

    #[must_use]
    pub const fn new() -> Self {
        Self {
            rcond: None,
            max_iterations: Self::DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Set the relative singular value cut-off.
    #[must_use]
    pub const fn rcond(mut self, rcond: f64) -> Self {
        self.rcond = Some(rcond);
        self
    }

    /// Set the iteration cap for the decomposition.
    #[must_use]
    pub const fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    fn cutoff_ratio(&self, rows: usize, cols: usize) -> f64 {
        self.rcond
            .filter(|r| r.is_finite() && *r >= 0.0)
            .unwrap_or_else(|| f64::EPSILON * rows.max(cols) as f64)
    }
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// What the solver had to do to produce its answer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolveDiagnostics {
    pub landmark_count: usize,
    /// Rows of the largest system solved.
    pub equation_count: usize,
    /// Columns of the largest system solved.
    pub unknown_count: usize,
    /// Number of linear systems decomposed (1 to 6 depending on the toggles).
    pub system_count: usize,
    /// Smallest effective rank across the systems solved.
    pub rank: usize,
    /// Largest number of singular values discarded in any one system.
    pub truncated_singular_values: usize,
    pub max_singular_value: f64,
    /// Smallest singular value that survived truncation.
    pub min_kept_singular_value: f64,
    pub warnings: Vec<String>,
}

impl SolveDiagnostics {
    /// Returns true if any system lost singular values to truncation.
    #[must_use]
    pub fn is_rank_deficient(&self) -> bool {
        self.truncated_singular_values > 0
    }

    fn record(&mut self, rows: usize, cols: usize, summary: &SvdSummary) {
        if self.system_count == 0 {
            self.rank = summary.rank;
            self.min_kept_singular_value = summary.min_kept;
        } else {
            self.rank = self.rank.min(summary.rank);
            self.min_kept_singular_value = self.min_kept_singular_value.min(summary.min_kept);
        }
        self.system_count += 1;
        self.equation_count = self.equation_count.max(rows);
        self.unknown_count = self.unknown_count.max(cols);
        self.truncated_singular_values = self.truncated_singular_values.max(summary.truncated);
        self.max_singular_value = self.max_singular_value.max(summary.max);
    }
}

/// Solve with default options.
///
/// # Errors
/// Returns an error if a landmark is not finite or the decomposition fails.
/// Degenerate landmark layouts are not errors.
pub fn solve(inputs: &CoefficientSolverInputs) -> Result<TpsCoefficients, TpsError> {
    solve_with_options(inputs, &SolverOptions::default()).map(|(coefficients, _)| coefficients)
}

/// Solve and report how well-posed the system was.
///
/// # Errors
/// See [`solve`].
pub fn solve_with_options(
    inputs: &CoefficientSolverInputs,
    options: &SolverOptions,
) -> Result<(TpsCoefficients, SolveDiagnostics), TpsError> {
    let landmarks = inputs.landmarks.as_slice();
    let mut diagnostics = SolveDiagnostics {
        landmark_count: landmarks.len(),
        ..Default::default()
    };

    if let Some(index) = landmarks.iter().position(|pair| !pair.is_finite()) {
        return Err(TpsError::NonFiniteLandmark { index });
    }

    if landmarks.is_empty() {
        diagnostics
            .warnings
            .push("no landmark pairs; using the identity warp".to_string());
        return Ok((TpsCoefficients::identity(), diagnostics));
    }

    let linear = match (inputs.apply_affine_scale, inputs.apply_affine_rotation) {
        (true, true) => LinearPart::Free,
        (true, false) => LinearPart::Diagonal,
        (false, true) => {
            let free = SystemLayout {
                landmarks,
                kernel: inputs.apply_non_affine_warp,
                translation: inputs.apply_affine_translation,
                linear: LinearPart::Free,
            };
            let fitted = free.solve(options, &mut diagnostics)?;
            LinearPart::Fixed(nearest_rotation(&linear_part(&fitted), options)?)
        }
        (false, false) => LinearPart::Fixed(Matrix3::identity()),
    };

    let layout = SystemLayout {
        landmarks,
        kernel: inputs.apply_non_affine_warp,
        translation: inputs.apply_affine_translation,
        linear,
    };
    let coefficients = layout.solve(options, &mut diagnostics)?;

    if diagnostics.is_rank_deficient() {
        let message = format!(
            "landmark system is rank deficient: discarded {} singular value(s), effective rank {}",
            diagnostics.truncated_singular_values, diagnostics.rank
        );
        log::debug!("{message}");
        diagnostics.warnings.push(message);
    }

    Ok((coefficients, diagnostics))
}

// ============================================================================
// System assembly
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum LinearPart {
    /// All nine entries of `D` are unknowns.
    Free,
    /// Only the diagonal of `D` is unknown.
    Diagonal,
    /// `D` is zero and the linear part is the given matrix.
    Fixed(Matrix3<f64>),
}

struct SystemLayout<'a> {
    landmarks: &'a [LandmarkPair],
    kernel: bool,
    translation: bool,
    linear: LinearPart,
}

impl SystemLayout<'_> {
    fn kernel_columns(&self) -> usize {
        if self.kernel { self.landmarks.len() } else { 0 }
    }

    fn affine_columns(&self) -> usize {
        let linear = match self.linear {
            LinearPart::Free => 3,
            LinearPart::Diagonal => 1,
            LinearPart::Fixed(_) => 0,
        };
        usize::from(self.translation) + linear
    }

    fn unknowns(&self) -> usize {
        self.kernel_columns() + self.affine_columns()
    }

    fn equations(&self) -> usize {
        let side_conditions = if self.kernel { self.affine_columns() } else { 0 };
        self.landmarks.len() + side_conditions
    }

    /// Diagonal layouts use a different column per output axis.
    fn shares_matrix_across_axes(&self) -> bool {
        !matches!(self.linear, LinearPart::Diagonal)
    }

    fn base(&self) -> Matrix3<f64> {
        match self.linear {
            LinearPart::Fixed(m) => m,
            LinearPart::Free | LinearPart::Diagonal => Matrix3::identity(),
        }
    }

    /// Affine basis values of `p` as seen by output axis `axis`.
    fn affine_basis(&self, p: Point3, axis: usize) -> ([f64; 4], usize) {
        let mut basis = [0.0; 4];
        let mut len = 0;
        if self.translation {
            basis[len] = 1.0;
            len += 1;
        }
        match self.linear {
            LinearPart::Free => {
                basis[len..len + 3].copy_from_slice(&p.to_array());
                len += 3;
            }
            LinearPart::Diagonal => {
                basis[len] = p.axis(axis);
                len += 1;
            }
            LinearPart::Fixed(_) => {}
        }
        (basis, len)
    }

    fn matrix(&self, axis: usize) -> DMatrix<f64> {
        let n = self.landmarks.len();
        let offset = self.kernel_columns();
        let mut m = DMatrix::zeros(self.equations(), self.unknowns());

        for (i, pi) in self.landmarks.iter().enumerate() {
            if self.kernel {
                for (j, pj) in self.landmarks.iter().enumerate() {
                    m[(i, j)] = radial_basis(pi.source.distance_to(pj.source));
                }
            }

            let (basis, len) = self.affine_basis(pi.source, axis);
            for (c, &value) in basis[..len].iter().enumerate() {
                m[(i, offset + c)] = value;
                if self.kernel {
                    m[(n + c, i)] = value;
                }
            }
        }

        m
    }

    /// Destinations minus the fixed part of the linear map; side conditions are zero.
    fn rhs(&self, axis: usize) -> DVector<f64> {
        let base = self.base();
        let mut rhs = DVector::zeros(self.equations());
        for (i, pair) in self.landmarks.iter().enumerate() {
            let s = pair.source;
            let fixed = base[(axis, 0)] * s.x + base[(axis, 1)] * s.y + base[(axis, 2)] * s.z;
            rhs[i] = pair.destination.axis(axis) - fixed;
        }
        rhs
    }

    fn solve(
        &self,
        options: &SolverOptions,
        diagnostics: &mut SolveDiagnostics,
    ) -> Result<TpsCoefficients, TpsError> {
        let rows = self.equations();
        let cols = self.unknowns();

        let solutions: [DVector<f64>; 3] = if cols == 0 {
            // Nothing left to fit: the warp is `base` with no translation.
            std::array::from_fn(|_| DVector::zeros(0))
        } else if self.shares_matrix_across_axes() {
            let rhs = DMatrix::from_columns(&[self.rhs(0), self.rhs(1), self.rhs(2)]);
            let (solution, summary) = solve_least_squares(self.matrix(0), &rhs, options)?;
            diagnostics.record(rows, cols, &summary);
            std::array::from_fn(|axis| solution.column(axis).into_owned())
        } else {
            let mut per_axis: [DVector<f64>; 3] = std::array::from_fn(|_| DVector::zeros(0));
            for (axis, slot) in per_axis.iter_mut().enumerate() {
                let rhs = DMatrix::from_columns(&[self.rhs(axis)]);
                let (solution, summary) = solve_least_squares(self.matrix(axis), &rhs, options)?;
                diagnostics.record(rows, cols, &summary);
                *slot = solution.column(0).into_owned();
            }
            per_axis
        };

        if solutions.iter().any(|s| s.iter().any(|v| !v.is_finite())) {
            return Err(TpsError::NonFiniteSolution);
        }

        log::debug!(
            "solved TPS system: {} landmarks, {rows}x{cols}, kernel={}, translation={}",
            self.landmarks.len(),
            self.kernel,
            self.translation
        );

        Ok(self.assemble(&solutions))
    }

    fn assemble(&self, solutions: &[DVector<f64>; 3]) -> TpsCoefficients {
        let offset = self.kernel_columns();
        let mut linear = self.base();
        let mut a1 = [0.0; 3];
        let mut weights = vec![[0.0; 3]; offset];

        for (axis, x) in solutions.iter().enumerate() {
            if x.is_empty() {
                continue;
            }
            for (i, weight) in weights.iter_mut().enumerate() {
                weight[axis] = x[i];
            }
            let mut c = offset;
            if self.translation {
                a1[axis] = x[c];
                c += 1;
            }
            match self.linear {
                LinearPart::Free => {
                    for k in 0..3 {
                        linear[(axis, k)] += x[c + k];
                    }
                }
                LinearPart::Diagonal => linear[(axis, axis)] += x[c],
                LinearPart::Fixed(_) => {}
            }
        }

        let column = |k: usize| Vec3::new(linear[(0, k)], linear[(1, k)], linear[(2, k)]);
        TpsCoefficients {
            a1: Vec3::from_array(a1),
            a2: column(0),
            a3: column(1),
            a4: column(2),
            non_affine_terms: weights
                .into_iter()
                .zip(self.landmarks)
                .map(|(w, pair)| NonAffineTerm::new(Vec3::from_array(w), pair.source))
                .collect(),
        }
    }
}

// ============================================================================
// Linear algebra helpers
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct SvdSummary {
    rank: usize,
    truncated: usize,
    max: f64,
    min_kept: f64,
}

/// Minimum-norm least-squares solve of `matrix * x = rhs` via truncated SVD.
fn solve_least_squares(
    matrix: DMatrix<f64>,
    rhs: &DMatrix<f64>,
    options: &SolverOptions,
) -> Result<(DMatrix<f64>, SvdSummary), TpsError> {
    let (rows, cols) = matrix.shape();
    let svd = matrix
        .try_svd(true, true, f64::EPSILON, options.max_iterations)
        .ok_or(TpsError::DecompositionDidNotConverge {
            max_iterations: options.max_iterations,
        })?;

    let max = svd.singular_values.iter().copied().fold(0.0, f64::max);
    let cutoff = options.cutoff_ratio(rows, cols) * max;

    let mut rank = 0;
    let mut min_kept = f64::INFINITY;
    for &s in &svd.singular_values {
        if s > cutoff {
            rank += 1;
            min_kept = min_kept.min(s);
        }
    }
    let summary = SvdSummary {
        rank,
        truncated: svd.singular_values.len() - rank,
        max,
        min_kept: if rank == 0 { 0.0 } else { min_kept },
    };

    let solution = svd
        .solve(rhs, cutoff)
        .map_err(|err| TpsError::SolveFailed(err.to_string()))?;
    Ok((solution, summary))
}

fn linear_part(coefficients: &TpsCoefficients) -> Matrix3<f64> {
    Matrix3::from_columns(&[
        Vector3::from(coefficients.a2.to_array()),
        Vector3::from(coefficients.a3.to_array()),
        Vector3::from(coefficients.a4.to_array()),
    ])
}

/// Closest proper rotation to `m` in the Frobenius norm (polar decomposition).
fn nearest_rotation(m: &Matrix3<f64>, options: &SolverOptions) -> Result<Matrix3<f64>, TpsError> {
    let svd = m
        .try_svd(true, true, f64::EPSILON, options.max_iterations)
        .ok_or(TpsError::DecompositionDidNotConverge {
            max_iterations: options.max_iterations,
        })?;
    let (Some(u), Some(v_t)) = (svd.u, svd.v_t) else {
        return Err(TpsError::SolveFailed(
            "polar decomposition is missing singular vectors".to_string(),
        ));
    };

    // Flip the weakest axis if the closest orthogonal matrix is a reflection.
    let mut correction = Matrix3::identity();
    if (u * v_t).determinant() < 0.0 {
        let weakest = svd.singular_values.imin();
        correction[(weakest, weakest)] = -1.0;
    }
    Ok(u * correction * v_t)
}
