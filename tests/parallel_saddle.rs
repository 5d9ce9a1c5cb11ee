#![allow(non_snake_case)]

use std::thread;

use sella::algebra::{CscMatrix, VectorMath};
use sella::comm::{Communicator, ThreadComm};
use sella::operators::{DistMatrix, RowPartition};
use sella::solver::{
    ConstrainedSolver, EliminationCGSolver, IdentitySolver, PenaltyConstrainedSolver,
    SchurConstrainedSolver, SolverSettings, SolverSettingsBuilder,
};

const NRANKS: usize = 4;

// Four ranks with two dofs each, A = I₈, and one constraint row per
// rank forcing a pair of dofs to sum to zero.  Each constraint crosses
// a rank boundary: rank r < 3 links dofs 2r+1 and 2r+2, rank 3 wraps
// around and links dofs 7 and 0.
const RHS: [f64; 8] = [1.1, -2., 3., -1.4, 2.1, -3.2, -1.1, 2.2];
const TRUESOL: [f64; 8] = [-0.55, -2.5, 2.5, -1.75, 1.75, -1.05, 1.05, 0.55];
const TRUELAMBDA: [f64; 4] = [0.5, 0.35, -2.15, 1.65];

/// this rank's two rows of the global identity, over global columns
fn local_identity_block(rank: usize) -> CscMatrix<f64> {
    CscMatrix::from_triplets(2, 8, &[(0, 2 * rank, 1.), (1, 2 * rank + 1, 1.)])
}

/// this rank's constraint row, over global columns
fn crossing_constraint_row(rank: usize) -> CscMatrix<f64> {
    let (d0, d1) = if rank < 3 {
        (2 * rank + 1, 2 * rank + 2)
    } else {
        (7, 0)
    };
    CscMatrix::from_triplets(1, 8, &[(0, d0, 1.), (0, d1, 1.)])
}

fn run_on_ranks<F>(f: F)
where
    F: Fn(ThreadComm<f64>) + Send + Sync + Clone + 'static,
{
    let handles: Vec<_> = ThreadComm::group(NRANKS)
        .into_iter()
        .map(|comm| {
            let f = f.clone();
            thread::spawn(move || f(comm))
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
}

#[test]
fn schur_solves_crossing_constraints() {
    run_on_ranks(|comm| {
        let rank = Communicator::<f64>::rank(&comm);

        let A = DistMatrix::new(
            local_identity_block(rank),
            RowPartition::uniform(NRANKS, 2),
            RowPartition::uniform(NRANKS, 2),
            &comm,
        )
        .unwrap();
        let B = DistMatrix::new(
            crossing_constraint_row(rank),
            RowPartition::uniform(NRANKS, 1),
            RowPartition::uniform(NRANKS, 2),
            &comm,
        )
        .unwrap();

        let asolver = IdentitySolver;
        let mut solver = SchurConstrainedSolver::new_distributed(
            &A,
            &B,
            &asolver,
            SolverSettings::default(),
            &comm,
        )
        .unwrap();

        let f = &RHS[2 * rank..2 * rank + 2];
        let mut x = vec![0.; 2];
        let info = solver.mult(f, &mut x).unwrap();
        assert!(info.converged());
        assert!(x.dist(&TRUESOL[2 * rank..2 * rank + 2]) < 1e-10);

        let mut lambda = vec![0.; 1];
        solver.multiplier_solution(&mut lambda).unwrap();
        assert!((lambda[0] - TRUELAMBDA[rank]).abs() < 1e-10);

        // the reductions are rank-ordered, so a re-solve is bitwise equal
        let mut x2 = vec![0.; 2];
        solver.mult(f, &mut x2).unwrap();
        assert_eq!(x, x2);
    });
}

#[test]
fn penalty_solves_crossing_constraints() {
    run_on_ranks(|comm| {
        let rank = Communicator::<f64>::rank(&comm);

        let A = DistMatrix::new(
            local_identity_block(rank),
            RowPartition::uniform(NRANKS, 2),
            RowPartition::uniform(NRANKS, 2),
            &comm,
        )
        .unwrap();
        let B = DistMatrix::new(
            crossing_constraint_row(rank),
            RowPartition::uniform(NRANKS, 1),
            RowPartition::uniform(NRANKS, 2),
            &comm,
        )
        .unwrap();

        for pen in [1e4, 1e6] {
            // Krylov tolerance loosened with the penalty so the solve
            // can terminate above the residual floor of A + ρBᵀB
            let settings = SolverSettingsBuilder::default()
                .rel_tol(1e-2 / pen)
                .build()
                .unwrap();
            let mut solver =
                PenaltyConstrainedSolver::new_distributed(&A, &B, pen, settings, &comm).unwrap();

            let f = &RHS[2 * rank..2 * rank + 2];
            let mut x = vec![0.; 2];
            let info = solver.mult(f, &mut x).unwrap();
            assert!(info.converged());
            // O(1/ρ) with a constant set by the largest pair sum in f
            assert!(x.dist(&TRUESOL[2 * rank..2 * rank + 2]) < 2. / pen);

            let mut lambda = vec![0.; 1];
            solver.multiplier_solution(&mut lambda).unwrap();
            assert!((lambda[0] - TRUELAMBDA[rank]).abs() < 2. / pen);
        }
    });
}

// Same distributed primal space, but the single constraint row lives
// entirely on rank 3, forcing its two dofs to sum to zero.  Ranks 0..3
// own no constraints at all, so their multiplier slices are empty.
const TRUESOL_LOCAL: [f64; 8] = [1.1, -2., 3., -1.4, 2.1, -3.2, -1.65, 1.65];
const TRUELAMBDA_LOCAL: f64 = 0.55;

fn rank_local_partition() -> RowPartition {
    RowPartition::new(vec![0, 0, 0, 0, 1]).unwrap()
}

#[test]
fn elimination_solves_rank_local_constraint() {
    run_on_ranks(|comm| {
        let rank = Communicator::<f64>::rank(&comm);

        let A = DistMatrix::new(
            local_identity_block(rank),
            RowPartition::uniform(NRANKS, 2),
            RowPartition::uniform(NRANKS, 2),
            &comm,
        )
        .unwrap();

        // local constraint block over local dofs
        let B = if rank == 3 {
            CscMatrix::from_triplets(1, 2, &[(0, 0, 1.), (0, 1, 1.)])
        } else {
            CscMatrix::from_triplets(0, 2, &[])
        };

        let mut solver = EliminationCGSolver::new_distributed(
            &A,
            &B,
            &rank_local_partition(),
            SolverSettings::default(),
            &comm,
        )
        .unwrap();

        let f = &RHS[2 * rank..2 * rank + 2];
        let mut x = vec![0.; 2];
        let info = solver.mult(f, &mut x).unwrap();
        assert!(info.converged());
        assert!(x.dist(&TRUESOL_LOCAL[2 * rank..2 * rank + 2]) < 1e-10);

        let mut lambda = vec![0.; B.m];
        solver.multiplier_solution(&mut lambda).unwrap();
        if rank == 3 {
            assert!((lambda[0] - TRUELAMBDA_LOCAL).abs() < 1e-10);
        }
    });
}

#[test]
fn penalty_solves_rank_local_constraint() {
    run_on_ranks(|comm| {
        let rank = Communicator::<f64>::rank(&comm);

        let A = DistMatrix::new(
            local_identity_block(rank),
            RowPartition::uniform(NRANKS, 2),
            RowPartition::uniform(NRANKS, 2),
            &comm,
        )
        .unwrap();

        let local = if rank == 3 {
            CscMatrix::from_triplets(1, 8, &[(0, 6, 1.), (0, 7, 1.)])
        } else {
            CscMatrix::from_triplets(0, 8, &[])
        };
        let B = DistMatrix::new(
            local,
            rank_local_partition(),
            RowPartition::uniform(NRANKS, 2),
            &comm,
        )
        .unwrap();

        let pen = 1e6;
        let settings = SolverSettingsBuilder::default()
            .rel_tol(1e-2 / pen)
            .build()
            .unwrap();
        let mut solver =
            PenaltyConstrainedSolver::new_distributed(&A, &B, pen, settings, &comm).unwrap();

        let f = &RHS[2 * rank..2 * rank + 2];
        let mut x = vec![0.; 2];
        let info = solver.mult(f, &mut x).unwrap();
        assert!(info.converged());
        assert!(x.dist(&TRUESOL_LOCAL[2 * rank..2 * rank + 2]) < 1. / pen);

        let mut lambda = vec![0.; if rank == 3 { 1 } else { 0 }];
        solver.multiplier_solution(&mut lambda).unwrap();
        if rank == 3 {
            assert!((lambda[0] - TRUELAMBDA_LOCAL).abs() < 1. / pen);
        }
    });
}

#[test]
fn schur_solves_rank_local_constraint() {
    run_on_ranks(|comm| {
        let rank = Communicator::<f64>::rank(&comm);

        let A = DistMatrix::new(
            local_identity_block(rank),
            RowPartition::uniform(NRANKS, 2),
            RowPartition::uniform(NRANKS, 2),
            &comm,
        )
        .unwrap();

        // the global constraint row, held by its owner only
        let local = if rank == 3 {
            CscMatrix::from_triplets(1, 8, &[(0, 6, 1.), (0, 7, 1.)])
        } else {
            CscMatrix::from_triplets(0, 8, &[])
        };
        let B = DistMatrix::new(
            local,
            rank_local_partition(),
            RowPartition::uniform(NRANKS, 2),
            &comm,
        )
        .unwrap();

        let asolver = IdentitySolver;
        let mut solver = SchurConstrainedSolver::new_distributed(
            &A,
            &B,
            &asolver,
            SolverSettings::default(),
            &comm,
        )
        .unwrap();

        let f = &RHS[2 * rank..2 * rank + 2];
        let mut x = vec![0.; 2];
        let info = solver.mult(f, &mut x).unwrap();
        assert!(info.converged());
        assert!(x.dist(&TRUESOL_LOCAL[2 * rank..2 * rank + 2]) < 1e-10);

        let mut lambda = vec![0.; if rank == 3 { 1 } else { 0 }];
        solver.multiplier_solution(&mut lambda).unwrap();
        if rank == 3 {
            assert!((lambda[0] - TRUELAMBDA_LOCAL).abs() < 1e-10);
        }
    });
}
