//! Schur-complement strategy.
//!
//! Eliminates the primal block first: with `A⁻¹` available through a
//! caller-supplied [`LinearSolver`], the multipliers solve the (SPD,
//! matrix-free) Schur complement system
//!
//! ```text
//! (B A⁻¹ Bᵀ) λ = B A⁻¹ f − c
//! ```
//!
//! after which the primal solution is recovered as `x = A⁻¹ (f − Bᵀ λ)`.
//! The complement is never assembled; each CG iteration costs one
//! `Bᵀ`-apply, one `A`-solve and one `B`-apply.

use super::krylov::cg;
use super::{ConstrainedSolver, LinearSolver, SolveInfo, SolverError, SolverSettings};
use crate::algebra::{FloatT, VectorMath};
use crate::comm::{Communicator, SERIAL};
use crate::operators::{Operator, TransposeOperator};

/// Constrained solver via the dual Schur complement.
///
/// Exact up to the accuracy of the supplied `A`-solver and the Krylov
/// tolerance; an inexact inner solve perturbs the complement system
/// itself, so the inner solver should be substantially tighter than the
/// outer tolerance.
pub struct SchurConstrainedSolver<'a, T = f64>
where
    T: FloatT,
{
    a: &'a dyn Operator<T>,
    b: &'a dyn TransposeOperator<T>,
    a_solver: &'a dyn LinearSolver<T>,
    comm: &'a dyn Communicator<T>,
    settings: SolverSettings<T>,
    dual_rhs: Vec<T>,
    multiplier: Vec<T>,
}

impl<'a, T: FloatT> SchurConstrainedSolver<'a, T> {
    /// Serial constructor; see [`new_distributed`](Self::new_distributed).
    pub fn new(
        a: &'a dyn Operator<T>,
        b: &'a dyn TransposeOperator<T>,
        a_solver: &'a dyn LinearSolver<T>,
        settings: SolverSettings<T>,
    ) -> Result<Self, SolverError> {
        Self::new_distributed(a, b, a_solver, settings, &SERIAL)
    }

    /// Wire up the solver over row-distributed `a` and `b`.
    ///
    /// `a_solver` must apply `A⁻¹` (collectively, if distributed) and
    /// `b` must expose both `B` and `Bᵀ` applies over the same local
    /// column space as `a`.
    pub fn new_distributed(
        a: &'a dyn Operator<T>,
        b: &'a dyn TransposeOperator<T>,
        a_solver: &'a dyn LinearSolver<T>,
        settings: SolverSettings<T>,
        comm: &'a dyn Communicator<T>,
    ) -> Result<Self, SolverError> {
        if a.nrows() != a.ncols() {
            return Err(SolverError::DimensionMismatch {
                expected: a.nrows(),
                got: a.ncols(),
            });
        }
        if b.ncols() != a.ncols() {
            return Err(SolverError::DimensionMismatch {
                expected: a.ncols(),
                got: b.ncols(),
            });
        }

        let m = b.nrows();
        Ok(Self {
            a,
            b,
            a_solver,
            comm,
            settings,
            dual_rhs: vec![T::zero(); m],
            multiplier: vec![T::zero(); m],
        })
    }
}

impl<T: FloatT> ConstrainedSolver<T> for SchurConstrainedSolver<'_, T> {
    fn set_constraint_rhs(&mut self, c: &[T]) -> Result<(), SolverError> {
        if c.len() != self.dual_rhs.len() {
            return Err(SolverError::DimensionMismatch {
                expected: self.dual_rhs.len(),
                got: c.len(),
            });
        }
        self.dual_rhs.copy_from(c);
        Ok(())
    }

    fn mult(&mut self, f: &[T], x: &mut [T]) -> Result<SolveInfo<T>, SolverError> {
        let n = self.a.ncols();
        let m = self.dual_rhs.len();
        if f.len() != n {
            return Err(SolverError::DimensionMismatch {
                expected: n,
                got: f.len(),
            });
        }
        if x.len() != n {
            return Err(SolverError::DimensionMismatch {
                expected: n,
                got: x.len(),
            });
        }

        // dual right-hand side: g = B A⁻¹ f − c
        let mut ainv_f = vec![T::zero(); n];
        self.a_solver.solve(f, &mut ainv_f);
        let mut g = vec![T::zero(); m];
        self.b.apply(&ainv_f, &mut g);
        g.axpby(-T::one(), &self.dual_rhs, T::one());

        let b = self.b;
        let a_solver = self.a_solver;
        let mut wn = vec![T::zero(); n];
        let mut wn2 = vec![T::zero(); n];
        let apply = |p: &[T], out: &mut [T]| {
            b.apply_transpose(p, &mut wn);
            a_solver.solve(&wn, &mut wn2);
            b.apply(&wn2, out);
        };

        let info = cg(
            apply,
            None,
            &g,
            &mut self.multiplier,
            self.comm,
            &self.settings,
            "schur",
        );

        // primal recovery: x = A⁻¹ (f − Bᵀ λ)
        self.b.apply_transpose(&self.multiplier, &mut wn);
        wn2.waxpby(T::one(), f, -T::one(), &wn);
        self.a_solver.solve(&wn2, x);

        Ok(info)
    }

    fn multiplier_solution(&self, lambda: &mut [T]) -> Result<(), SolverError> {
        if lambda.len() != self.multiplier.len() {
            return Err(SolverError::DimensionMismatch {
                expected: self.multiplier.len(),
                got: lambda.len(),
            });
        }
        lambda.copy_from(&self.multiplier);
        Ok(())
    }
}
