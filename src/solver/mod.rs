//! Constrained saddle-point solvers.
//!
//! All three strategies solve
//!
//! ```text
//! A x + Bᵀ λ = f
//! B x        = c
//! ```
//!
//! behind the common [`ConstrainedSolver`] contract:
//! construct → \[`set_constraint_rhs(c)`\]* → `mult(f, x)` →
//! \[`multiplier_solution(λ)`\].   `set_constraint_rhs` is optional
//! (default `c = 0`) and may be called again before a subsequent `mult`
//! to re-solve with a different constraint target; the solver's internal
//! structures (Schur complement wiring, elimination projection, penalty
//! operator) persist across solves.   `mult` is deterministic: repeated
//! calls with unchanged inputs reproduce the result bit for bit.

pub mod elimination;
pub mod elimination_cg;
pub mod error;
pub(crate) mod krylov;
pub mod penalty;
pub mod schur;
pub mod settings;

pub use elimination::*;
pub use elimination_cg::*;
pub use error::*;
pub use penalty::*;
pub use schur::*;
pub use settings::*;

use crate::algebra::{FloatT, VectorMath};
use enum_dispatch::enum_dispatch;

/// The `A`-solve collaborator: a linear solver (or preconditioner)
/// for the primal operator, supplied by the caller.
///
/// Used as the inner solve of [`SchurConstrainedSolver`] and as the
/// preconditioner of [`PenaltyConstrainedSolver`].  The operator it
/// inverts is fixed at the collaborator's own construction; the
/// constrained solvers never re-target it, since the constraint set is
/// static for their whole lifetime.
pub trait LinearSolver<T> {
    /// solve (or approximately solve) for `x` given `rhs`
    fn solve(&self, rhs: &[T], x: &mut [T]);
}

/// The identity as a [`LinearSolver`], for operators that are their own
/// inverse or as a do-nothing preconditioner.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentitySolver;

impl<T: FloatT> LinearSolver<T> for IdentitySolver {
    fn solve(&self, rhs: &[T], x: &mut [T]) {
        x.copy_from(rhs);
    }
}

/// Common contract of the three constrained solution strategies.
///
/// When the underlying operators are distributed, every method except
/// `multiplier_solution` is a blocking collective; see
/// [`comm`](crate::comm) for the protocol requirements.
#[enum_dispatch]
pub trait ConstrainedSolver<T: FloatT> {
    /// Install the constraint right-hand side `c` (length = local
    /// constraint-row count).  May be called repeatedly between solves.
    fn set_constraint_rhs(&mut self, c: &[T]) -> Result<(), SolverError>;

    /// Solve for `x` given the primal right-hand side `f`.
    ///
    /// The result is always written, even when the iteration cap is hit;
    /// inspect [`SolveInfo::status`] for convergence.  `Err` is reserved
    /// for dimension mismatches, detected before any computation or
    /// communication begins.
    fn mult(&mut self, f: &[T], x: &mut [T]) -> Result<SolveInfo<T>, SolverError>;

    /// Recover the multiplier produced by the last `mult` (length = local
    /// constraint-row count; zeros if `mult` has not been called).
    fn multiplier_solution(&self, lambda: &mut [T]) -> Result<(), SolverError>;
}

/// All three solver strategies behind one concrete type, for callers
/// that select the strategy at runtime.
#[enum_dispatch(ConstrainedSolver<T>)]
pub enum SolverVariant<'a, T: FloatT> {
    /// Schur-complement strategy
    Schur(SchurConstrainedSolver<'a, T>),
    /// static elimination strategy
    Elimination(EliminationCGSolver<'a, T>),
    /// penalty approximation strategy
    Penalty(PenaltyConstrainedSolver<'a, T>),
}
