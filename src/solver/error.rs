use thiserror::Error;

/// Error type returned when a constrained solver or its supporting
/// structures cannot be built from the given constraint partition.
///
/// These are all fatal: the caller must supply a well-posed partition
/// before construction.  There is no runtime recovery.
#[derive(Error, Debug)]
pub enum ConstructionError {
    /// The secondary-dof block of a constraint group is not invertible
    #[error("secondary block of a constraint group is singular")]
    SingularSecondaryBlock,
    /// A constraint group must eliminate exactly one dof per constraint
    #[error("group has {lagrange} constraints but {secondary} secondary dofs")]
    GroupSizeMismatch {
        /// number of lagrange (constraint) rows in the group
        lagrange: usize,
        /// number of secondary dofs in the group
        secondary: usize,
    },
    /// Groups overlap, or their constraint rows do not cover the
    /// constraint space exactly once
    #[error("eliminator groups do not partition the constraints/dofs")]
    CoupledEliminators,
    /// No valid secondary dof could be derived for some constraint row
    #[error("no usable secondary dof for constraint row {row}")]
    NoSecondaryCandidate {
        /// the offending constraint row
        row: usize,
    },
    /// A dof or constraint-row index lies outside the constraint
    /// operator's dimensions
    #[error("index {index} out of range for dimension {dim}")]
    IndexOutOfRange {
        /// the offending index
        index: usize,
        /// the dimension it was checked against
        dim: usize,
    },
    /// Row-partition offsets must start at zero and be monotone
    #[error("row partition does not cover the index range contiguously")]
    BadRowPartition,
}

/// Error type returned by the constrained solvers.
#[derive(Error, Debug)]
pub enum SolverError {
    /// The solver could not be constructed; see [`ConstructionError`]
    #[error(transparent)]
    Construction(#[from] ConstructionError),
    /// A vector passed to the solver has the wrong length.
    ///
    /// Detected synchronously, before any computation or communication
    /// begins, so a failing rank cannot leave the rest of the group
    /// blocked inside a partial collective.
    #[error("dimension mismatch: expected length {expected}, got {got}")]
    DimensionMismatch {
        /// the required vector length
        expected: usize,
        /// the length actually supplied
        got: usize,
    },
}

/// Termination status of an iterative solve.
///
/// A solve that stops at the iteration cap is __not__ an error: the best
/// available approximation is still written to the output and the caller
/// observes the shortfall here, together with the achieved residual in
/// [`SolveInfo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolveStatus {
    /// Converged to the requested tolerance
    #[default]
    Solved,
    /// Iteration cap reached before the tolerance was met; the result
    /// vector holds the last iterate
    MaxIterations,
    /// The iteration broke down (non-positive curvature detected, so the
    /// operator is not SPD on the current subspace)
    NumericalProblem,
}

/// Diagnostics returned by a successful call to `mult`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SolveInfo<T> {
    /// termination status of the outer Krylov loop
    pub status: SolveStatus,
    /// outer iterations taken
    pub iterations: u32,
    /// achieved absolute residual norm of the outer iteration
    pub residual: T,
}

impl<T> SolveInfo<T> {
    /// true if the requested tolerance was reached
    pub fn converged(&self) -> bool {
        self.status == SolveStatus::Solved
    }
}
