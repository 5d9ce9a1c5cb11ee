//! Penalty strategy.
//!
//! Replaces the saddle-point system by the SPD approximation
//!
//! ```text
//! (A + ρ Bᵀ B) x = f + ρ Bᵀ c
//! ```
//!
//! applied matrix free, with the multiplier estimated a posteriori as
//! `λ = ρ (B x − c)`.  The constraint is satisfied only approximately:
//! the error in `x` and `λ` is O(1/ρ), while the condition number of
//! the penalized operator grows with ρ, so the penalty trades accuracy
//! against Krylov convergence.  Useful when no invertible secondary
//! block exists and no good `A`-solver is available.

use super::krylov::cg;
use super::{ConstrainedSolver, LinearSolver, SolveInfo, SolverError, SolverSettings};
use crate::algebra::{FloatT, VectorMath};
use crate::comm::{Communicator, SERIAL};
use crate::operators::{Operator, TransposeOperator};

/// Constrained solver via a quadratic penalty on the constraint residual.
pub struct PenaltyConstrainedSolver<'a, T = f64>
where
    T: FloatT,
{
    a: &'a dyn Operator<T>,
    b: &'a dyn TransposeOperator<T>,
    prec: Option<&'a dyn LinearSolver<T>>,
    penalty: T,
    comm: &'a dyn Communicator<T>,
    settings: SolverSettings<T>,
    dual_rhs: Vec<T>,
    multiplier: Vec<T>,
}

impl<'a, T: FloatT> PenaltyConstrainedSolver<'a, T> {
    /// Serial constructor; see [`new_distributed`](Self::new_distributed).
    ///
    /// `penalty` is the weight ρ > 0; constraint violation scales as
    /// O(1/ρ).
    pub fn new(
        a: &'a dyn Operator<T>,
        b: &'a dyn TransposeOperator<T>,
        penalty: T,
        settings: SolverSettings<T>,
    ) -> Result<Self, SolverError> {
        Self::new_distributed(a, b, penalty, settings, &SERIAL)
    }

    /// Build the solver over row-distributed `a` and `b`.
    pub fn new_distributed(
        a: &'a dyn Operator<T>,
        b: &'a dyn TransposeOperator<T>,
        penalty: T,
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
            prec: None,
            penalty,
            comm,
            settings,
            dual_rhs: vec![T::zero(); m],
            multiplier: vec![T::zero(); m],
        })
    }

    /// Attach an SPD preconditioner for the penalized operator.
    pub fn with_preconditioner(mut self, prec: &'a dyn LinearSolver<T>) -> Self {
        self.prec = Some(prec);
        self
    }
}

impl<T: FloatT> ConstrainedSolver<T> for PenaltyConstrainedSolver<'_, T> {
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

        let rho = self.penalty;

        // penalized right-hand side: f + ρ Bᵀ c
        let mut frho = f.to_vec();
        let mut wn = vec![T::zero(); n];
        self.b.apply_transpose(&self.dual_rhs, &mut wn);
        frho.axpby(rho, &wn, T::one());

        let a = self.a;
        let b = self.b;
        let mut wm = vec![T::zero(); m];
        let apply = |p: &[T], out: &mut [T]| {
            // out = A p + ρ Bᵀ (B p)
            a.apply(p, out);
            b.apply(p, &mut wm);
            b.apply_transpose(&wm, &mut wn);
            out.axpby(rho, &wn, T::one());
        };

        let info = cg(
            apply,
            self.prec,
            &frho,
            x,
            self.comm,
            &self.settings,
            "penalty",
        );

        // multiplier estimate: λ = ρ (B x − c)
        self.b.apply(x, &mut self.multiplier);
        self.multiplier.axpby(-T::one(), &self.dual_rhs, T::one());
        self.multiplier.scale(rho);

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
