//! Elimination strategy: project the constraints away, then run CG on
//! the reduced operator.
//!
//! With the projection `P` of [`EliminationProjection`] satisfying
//! `B P = 0`, any `x = P x̃ + x_c` with `B x_c = c` satisfies the
//! constraints exactly, and the reduced unknowns solve the SPD system
//!
//! ```text
//! (Pᵀ A P) x̃ = Pᵀ (f − A x_c)
//! ```
//!
//! applied matrix free.  The multipliers fall out of the primal residual
//! afterwards: on the secondary dofs `Bᵀ λ = f − A x`.

use super::elimination::{nodal_eliminators, EliminationProjection, Eliminator};
use super::krylov::cg;
use super::{ConstrainedSolver, ConstructionError, SolveInfo, SolverError, SolverSettings};
use crate::algebra::{CscMatrix, FloatT, VectorMath};
use crate::comm::{Communicator, SERIAL};
use crate::operators::{Operator, RowPartition};

/// Constrained solver via static elimination and reduced-space CG.
///
/// Exact (up to the Krylov tolerance) and free of inner solves, but
/// requires a constraint operator whose rows can be partitioned into
/// groups with invertible secondary blocks.  In the distributed case
/// every constraint row must be local to the rank that owns it: each
/// rank eliminates its own rows against its own dofs, while the reduced
/// CG iterates globally.
pub struct EliminationCGSolver<'a, T = f64>
where
    T: FloatT,
{
    a: &'a dyn Operator<T>,
    projection: EliminationProjection<T>,
    comm: &'a dyn Communicator<T>,
    settings: SolverSettings<T>,
    dual_rhs: Vec<T>,
    multiplier: Vec<T>,
}

impl<'a, T: FloatT> EliminationCGSolver<'a, T> {
    /// Serial constructor with automatic secondary-dof selection: one
    /// single-row group per constraint, eliminating the largest
    /// remaining entry of each row.
    pub fn new(
        a: &'a dyn Operator<T>,
        b: &CscMatrix<T>,
        settings: SolverSettings<T>,
    ) -> Result<Self, SolverError> {
        let elims = nodal_eliminators(b)?;
        Self::build(a, b, elims, settings, &SERIAL)
    }

    /// Serial constructor with a caller-chosen primary/secondary split,
    /// eliminating all constraint rows as one group.
    ///
    /// Needed when the rows are coupled and no per-row split exists.
    /// Every dof appearing in `b` must be listed in `primary` or
    /// `secondary`.
    pub fn with_partition(
        a: &'a dyn Operator<T>,
        b: &CscMatrix<T>,
        primary: &[usize],
        secondary: &[usize],
        settings: SolverSettings<T>,
    ) -> Result<Self, SolverError> {
        let mut in_group = vec![false; b.n];
        for &d in primary.iter().chain(secondary) {
            if d >= b.n {
                return Err(ConstructionError::CoupledEliminators.into());
            }
            in_group[d] = true;
        }
        for col in 0..b.n {
            if b.colptr[col] < b.colptr[col + 1] && !in_group[col] {
                return Err(ConstructionError::CoupledEliminators.into());
            }
        }

        let lagrange: Vec<usize> = (0..b.m).collect();
        let elim = Eliminator::new(b, &lagrange, primary, secondary)?;
        Self::build(a, b, vec![elim], settings, &SERIAL)
    }

    /// Distributed constructor over a row-distributed `a`.
    ///
    /// `b` holds this rank's constraint rows over this rank's dofs
    /// (columns), so the constraints must not cross rank boundaries;
    /// `lagrange_rows` records the global ownership of the constraint
    /// rows and must agree with `b` locally.
    pub fn new_distributed(
        a: &'a dyn Operator<T>,
        b: &CscMatrix<T>,
        lagrange_rows: &RowPartition,
        settings: SolverSettings<T>,
        comm: &'a dyn Communicator<T>,
    ) -> Result<Self, SolverError> {
        if lagrange_rows.num_ranks() != comm.size()
            || lagrange_rows.local_count(comm.rank()) != b.m
        {
            return Err(ConstructionError::BadRowPartition.into());
        }
        let elims = nodal_eliminators(b)?;
        Self::build(a, b, elims, settings, comm)
    }

    fn build(
        a: &'a dyn Operator<T>,
        b: &CscMatrix<T>,
        elims: Vec<Eliminator<T>>,
        settings: SolverSettings<T>,
        comm: &'a dyn Communicator<T>,
    ) -> Result<Self, SolverError> {
        if a.nrows() != a.ncols() {
            return Err(SolverError::DimensionMismatch {
                expected: a.nrows(),
                got: a.ncols(),
            });
        }
        if b.n != a.ncols() {
            return Err(SolverError::DimensionMismatch {
                expected: a.ncols(),
                got: b.n,
            });
        }

        let projection = EliminationProjection::new(b.n, b.m, elims)?;
        Ok(Self {
            a,
            projection,
            comm,
            settings,
            dual_rhs: vec![T::zero(); b.m],
            multiplier: vec![T::zero(); b.m],
        })
    }

    /// the projection in use, e.g. for inspection via
    /// [`assemble_exact`](EliminationProjection::assemble_exact)
    pub fn projection(&self) -> &EliminationProjection<T> {
        &self.projection
    }
}

impl<T: FloatT> ConstrainedSolver<T> for EliminationCGSolver<'_, T> {
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
        let nred = self.projection.ncols();

        // particular solution of the constraints, on the secondary dofs
        let mut xc = vec![T::zero(); n];
        self.projection.particular_solution(&self.dual_rhs, &mut xc);

        // reduced right-hand side: Pᵀ (f − A x_c)
        let mut full = vec![T::zero(); n];
        self.a.apply(&xc, &mut full);
        full.axpby(T::one(), f, -T::one());
        let mut rhs_r = vec![T::zero(); nred];
        self.projection.mult_transpose(&full, &mut rhs_r);

        let a = self.a;
        let projection = &self.projection;
        let mut wn = vec![T::zero(); n];
        let mut awn = vec![T::zero(); n];
        let apply = |p: &[T], out: &mut [T]| {
            // out = Pᵀ A P p
            projection.mult(p, &mut wn);
            a.apply(&wn, &mut awn);
            projection.mult_transpose(&awn, out);
        };

        let mut xr = vec![T::zero(); nred];
        let info = cg(
            apply,
            None,
            &rhs_r,
            &mut xr,
            self.comm,
            &self.settings,
            "elimination",
        );

        // x = P x̃ + x_c
        self.projection.mult(&xr, x);
        x.axpby(T::one(), &xc, T::one());

        // multipliers from the primal residual f − A x
        self.a.apply(x, &mut awn);
        wn.copy_from(f);
        wn.axpby(-T::one(), &awn, T::one());
        self.projection
            .multiplier_from_residual(&wn, &mut self.multiplier);

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

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;

    #[test]
    fn test_elimination_simple_saddle() {
        // A = I₂, single constraint x₀ + x₁ = 0, f = (4, −2):
        // closed form x = (3, −3), λ = 1
        let A = CscMatrix::<f64>::identity(2);
        let B = CscMatrix::from_triplets(1, 2, &[(0, 0, 1.), (0, 1, 1.)]);

        let mut solver = EliminationCGSolver::new(&A, &B, Default::default()).unwrap();
        let mut x = vec![0.; 2];
        let info = solver.mult(&[4., -2.], &mut x).unwrap();
        assert!(info.converged());
        assert!(x.dist(&[3., -3.]) < 1e-10);

        let mut lambda = vec![0.; 1];
        solver.multiplier_solution(&mut lambda).unwrap();
        assert!((lambda[0] - 1.).abs() < 1e-10);
    }

    #[test]
    fn test_with_partition_requires_coverage() {
        let A = CscMatrix::<f64>::identity(2);
        let B = CscMatrix::from_triplets(1, 2, &[(0, 0, 1.), (0, 1, 1.)]);
        // dof 0 appears in B but is in neither list
        assert!(EliminationCGSolver::with_partition(&A, &B, &[], &[1], Default::default())
            .is_err());
    }
}
