//! Preconditioned conjugate gradients over a [`Communicator`].
//!
//! The operator is passed as a closure so that callers can compose it
//! matrix free (Schur complement, projected operator, penalized
//! operator) without materializing anything.  Every inner product is
//! reduced through the communicator, so the iteration makes identical
//! decisions on every rank of a group.

use super::{LinearSolver, SolveInfo, SolveStatus, SolverSettings};
use crate::algebra::{FloatT, VectorMath};
use crate::comm::Communicator;

/// Run CG on `apply(p) = Op p` with right-hand side `rhs`, starting
/// from `x = 0`.  `prec` optionally applies an SPD preconditioner.
///
/// `rhs` and `x` are the locally owned slices; `apply` must itself be
/// collective when the operator is distributed.
pub(crate) fn cg<T: FloatT>(
    mut apply: impl FnMut(&[T], &mut [T]),
    prec: Option<&dyn LinearSolver<T>>,
    rhs: &[T],
    x: &mut [T],
    comm: &dyn Communicator<T>,
    settings: &SolverSettings<T>,
    label: &str,
) -> SolveInfo<T> {
    let n = rhs.len();
    x.set(T::zero());

    let mut r = rhs.to_vec();
    let mut z = vec![T::zero(); n];
    match prec {
        Some(m) => m.solve(&r, &mut z),
        None => {
            z.copy_from(&r);
        }
    }
    let mut p = z.clone();
    let mut ap = vec![T::zero(); n];

    let mut rz = comm.sum_scalar(r.dot(&z));
    let mut resnorm = T::sqrt(comm.sum_scalar(rhs.sumsq()));
    let tol = T::max(settings.abs_tol, settings.rel_tol * resnorm);

    if resnorm <= tol {
        return SolveInfo {
            status: SolveStatus::Solved,
            iterations: 0,
            residual: resnorm,
        };
    }

    for iter in 1..=settings.max_iter {
        apply(&p, &mut ap);
        let pap = comm.sum_scalar(p.dot(&ap));

        // curvature must stay positive on an SPD operator
        if !(pap > T::zero()) {
            return SolveInfo {
                status: SolveStatus::NumericalProblem,
                iterations: iter - 1,
                residual: resnorm,
            };
        }

        let alpha = rz / pap;
        x.axpby(alpha, &p, T::one());
        r.axpby(-alpha, &ap, T::one());

        resnorm = T::sqrt(comm.sum_scalar(r.sumsq()));
        if settings.verbose && comm.rank() == 0 {
            println!("{} cg iter {:4}: residual {:.6e}", label, iter, resnorm);
        }
        if resnorm <= tol {
            return SolveInfo {
                status: SolveStatus::Solved,
                iterations: iter,
                residual: resnorm,
            };
        }

        match prec {
            Some(m) => m.solve(&r, &mut z),
            None => {
                z.copy_from(&r);
            }
        }
        let rz_next = comm.sum_scalar(r.dot(&z));
        let beta = rz_next / rz;
        rz = rz_next;

        // p = z + beta p
        p.axpby(T::one(), &z, beta);
    }

    SolveInfo {
        status: SolveStatus::MaxIterations,
        iterations: settings.max_iter,
        residual: resnorm,
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use crate::algebra::CscMatrix;
    use crate::comm::SERIAL;
    use crate::operators::Operator;
    use crate::solver::IdentitySolver;

    fn spd_testmat() -> CscMatrix<f64> {
        // [4 1 0]
        // [1 3 1]
        // [0 1 2]
        CscMatrix::from_triplets(
            3,
            3,
            &[
                (0, 0, 4.),
                (0, 1, 1.),
                (1, 0, 1.),
                (1, 1, 3.),
                (1, 2, 1.),
                (2, 1, 1.),
                (2, 2, 2.),
            ],
        )
    }

    #[test]
    fn test_cg_converges() {
        let A = spd_testmat();
        let xtrue = [1., -2., 0.5];
        let mut rhs = vec![0.; 3];
        A.apply(&xtrue, &mut rhs);

        let settings = SolverSettings::default();
        let mut x = vec![0.; 3];
        let info = cg(
            |p, out| A.apply(p, out),
            None,
            &rhs,
            &mut x,
            &SERIAL,
            &settings,
            "test",
        );

        assert!(info.converged());
        assert!(info.iterations <= 3);
        assert!(x.dist(&xtrue) < 1e-10);
    }

    #[test]
    fn test_cg_identity_preconditioner_matches() {
        let A = spd_testmat();
        let rhs = [1., 2., 3.];
        let settings = SolverSettings::default();

        let mut x0 = vec![0.; 3];
        cg(
            |p, out| A.apply(p, out),
            None,
            &rhs,
            &mut x0,
            &SERIAL,
            &settings,
            "plain",
        );

        let prec = IdentitySolver;
        let mut x1 = vec![0.; 3];
        cg(
            |p, out| A.apply(p, out),
            Some(&prec),
            &rhs,
            &mut x1,
            &SERIAL,
            &settings,
            "prec",
        );

        assert_eq!(x0, x1);
    }

    #[test]
    fn test_cg_zero_rhs() {
        let A = spd_testmat();
        let settings = SolverSettings::default();
        let mut x = vec![7.; 3];
        let info = cg(
            |p, out| A.apply(p, out),
            None,
            &[0.; 3],
            &mut x,
            &SERIAL,
            &settings,
            "zero",
        );
        assert!(info.converged());
        assert_eq!(info.iterations, 0);
        assert_eq!(x, vec![0.; 3]);
    }

    #[test]
    fn test_cg_indefinite_breakdown() {
        // indefinite diagonal
        let A = CscMatrix::from_triplets(2, 2, &[(0, 0, 1.), (1, 1, -1.)]);
        let settings = SolverSettings::default();
        let mut x = vec![0.; 2];
        let info = cg(
            |p, out| A.apply(p, out),
            None,
            &[0., 1.],
            &mut x,
            &SERIAL,
            &settings,
            "indef",
        );
        assert_eq!(info.status, SolveStatus::NumericalProblem);
    }
}
