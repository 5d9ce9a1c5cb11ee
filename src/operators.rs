//! Opaque linear operator abstraction consumed by the constrained solvers.
//!
//! The solvers treat the primal operator `A` and the constraint operator
//! `B` purely algebraically: all they require is `apply` (and, for `B`,
//! `apply_transpose`).  Serial callers can pass
//! [`CscMatrix`](crate::algebra::CscMatrix) directly; distributed callers
//! wrap their local row block in a [`DistMatrix`], whose applies fold in
//! the required collective communication so that the solver logic never
//! sees it.

use crate::algebra::{CscMatrix, FloatT, MatrixVectorMultiply};
use crate::comm::Communicator;
use crate::solver::ConstructionError;
use std::ops::Range;

/// A linear map `y = Op(x)` between (locally owned slices of) vector spaces.
///
/// `nrows`/`ncols` report the __local__ sizes, i.e. the lengths of the
/// slices this process passes to `apply`.
pub trait Operator<T> {
    /// local length of the output vector
    fn nrows(&self) -> usize;
    /// local length of the input vector
    fn ncols(&self) -> usize;
    /// `y = Op(x)`.  Collective when the operator is distributed.
    fn apply(&self, x: &[T], y: &mut [T]);
}

/// An [`Operator`] that also exposes the action of its transpose,
/// as required of the constraint operator `B`.
pub trait TransposeOperator<T>: Operator<T> {
    /// `y = Opᵀ(x)`.  Collective when the operator is distributed.
    fn apply_transpose(&self, x: &[T], y: &mut [T]);
}

impl<T: FloatT> Operator<T> for CscMatrix<T> {
    fn nrows(&self) -> usize {
        self.m
    }
    fn ncols(&self) -> usize {
        self.n
    }
    fn apply(&self, x: &[T], y: &mut [T]) {
        self.gemv(y, x, T::one(), T::zero());
    }
}

impl<T: FloatT> TransposeOperator<T> for CscMatrix<T> {
    fn apply_transpose(&self, x: &[T], y: &mut [T]) {
        self.t().gemv(y, x, T::one(), T::zero());
    }
}

/// Contiguous row ownership of a distributed vector or matrix.
///
/// `starts` holds, per process, the first global row index it owns,
/// terminated by the global row count: rank `r` owns rows
/// `starts[r]..starts[r+1]`.  Offsets must begin at zero and be monotone,
/// so that ownership covers the global index range contiguously.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowPartition {
    starts: Vec<usize>,
}

impl RowPartition {
    /// Build and validate a partition from per-rank start offsets.
    pub fn new(starts: Vec<usize>) -> Result<Self, ConstructionError> {
        if starts.len() < 2
            || starts[0] != 0
            || starts.windows(2).any(|w| w[0] > w[1])
        {
            return Err(ConstructionError::BadRowPartition);
        }
        Ok(Self { starts })
    }

    /// Partition with the same number of rows on every rank.
    pub fn uniform(num_ranks: usize, rows_per_rank: usize) -> Self {
        let starts = (0..=num_ranks).map(|r| r * rows_per_rank).collect();
        Self { starts }
    }

    /// number of ranks covered by the partition
    pub fn num_ranks(&self) -> usize {
        self.starts.len() - 1
    }

    /// global row count
    pub fn extent(&self) -> usize {
        *self.starts.last().unwrap()
    }

    /// the global rows owned by `rank`
    pub fn range(&self, rank: usize) -> Range<usize> {
        self.starts[rank]..self.starts[rank + 1]
    }

    /// number of rows owned by `rank`
    pub fn local_count(&self, rank: usize) -> usize {
        self.range(rank).len()
    }
}

/// Row-distributed sparse operator.
///
/// Each rank stores the sparse block of its owned rows over the __global__
/// column space.  Input and output vectors are the locally owned slices;
/// `apply` reassembles the global input by summing each rank's
/// contribution (every rank zero-fills the columns it does not own), and
/// `apply_transpose` sums the per-rank contributions to the global output
/// before extracting the local slice.  A single row may therefore couple
/// degrees of freedom owned by several ranks ("crossing constraints")
/// without the solvers being aware of it.
pub struct DistMatrix<'a, T> {
    local: CscMatrix<T>,
    rows: RowPartition,
    cols: RowPartition,
    comm: &'a dyn Communicator<T>,
}

impl<'a, T: FloatT> DistMatrix<'a, T> {
    /// Wrap this rank's local row block.
    ///
    /// `local` must have this rank's row count under `rows` and the full
    /// global column count of `cols`.
    pub fn new(
        local: CscMatrix<T>,
        rows: RowPartition,
        cols: RowPartition,
        comm: &'a dyn Communicator<T>,
    ) -> Result<Self, ConstructionError> {
        let rank = comm.rank();
        if rows.num_ranks() != comm.size()
            || cols.num_ranks() != comm.size()
            || local.m != rows.local_count(rank)
            || local.n != cols.extent()
        {
            return Err(ConstructionError::BadRowPartition);
        }
        Ok(Self {
            local,
            rows,
            cols,
            comm,
        })
    }

    /// the row ownership of this operator
    pub fn row_partition(&self) -> &RowPartition {
        &self.rows
    }
}

impl<T: FloatT> Operator<T> for DistMatrix<'_, T> {
    fn nrows(&self) -> usize {
        self.local.m
    }

    fn ncols(&self) -> usize {
        self.cols.local_count(self.comm.rank())
    }

    fn apply(&self, x: &[T], y: &mut [T]) {
        assert_eq!(x.len(), self.ncols());
        assert_eq!(y.len(), self.local.m);

        // assemble the global input vector: every rank contributes its
        // owned slice, zeros elsewhere, and the reduction sums them
        let mut xg = vec![T::zero(); self.cols.extent()];
        xg[self.cols.range(self.comm.rank())].copy_from_slice(x);
        self.comm.sum_slice(&mut xg);

        self.local.gemv(y, &xg, T::one(), T::zero());
    }
}

impl<T: FloatT> TransposeOperator<T> for DistMatrix<'_, T> {
    fn apply_transpose(&self, x: &[T], y: &mut [T]) {
        assert_eq!(x.len(), self.local.m);
        assert_eq!(y.len(), self.ncols());

        // each rank's rows contribute into the global column space;
        // reduce, then keep the locally owned slice
        let mut yg = vec![T::zero(); self.cols.extent()];
        self.local.t().gemv(&mut yg, x, T::one(), T::zero());
        self.comm.sum_slice(&mut yg);

        y.copy_from_slice(&yg[self.cols.range(self.comm.rank())]);
    }
}
