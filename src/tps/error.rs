/// Failures that abort a solve.
///
/// Degenerate landmark layouts are not errors; they are absorbed by the
/// least-squares solve. Only inputs or decompositions that cannot produce a
/// finite answer end up here.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TpsError {
    #[error("landmark pair {index} has a non-finite coordinate")]
    NonFiniteLandmark { index: usize },
    #[error("singular value decomposition did not converge within {max_iterations} iterations")]
    DecompositionDidNotConverge { max_iterations: usize },
    #[error("least-squares solve failed: {0}")]
    SolveFailed(String),
    #[error("solved coefficients are not finite")]
    NonFiniteSolution,
}
