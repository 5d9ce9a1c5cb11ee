#![allow(non_snake_case)]

use crate::algebra::{DenseFactorizationError, FloatT, ShapedMatrix};
use std::ops::{Index, IndexMut};

/// Small dense matrix in column major format.
///
/// Used for the per-constraint-group blocks of the constraint operator,
/// which are tiny (one row per eliminated degree of freedom), so all of
/// the factorization kernels here are native Rust.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix<T = f64> {
    /// number of rows
    pub m: usize,
    /// number of columns
    pub n: usize,
    /// vector of data in column major format
    pub data: Vec<T>,
}

impl<T: FloatT> Matrix<T> {
    /// m x n matrix of zeros
    pub fn zeros(m: usize, n: usize) -> Self {
        Self {
            m,
            n,
            data: vec![T::zero(); m * n],
        }
    }

    /// Construct from data in column major order.
    ///
    /// # Panics
    /// Panics if `data` does not have length `m * n`.
    pub fn new(m: usize, n: usize, data: Vec<T>) -> Self {
        assert_eq!(data.len(), m * n);
        Self { m, n, data }
    }

    #[inline]
    fn index_linear(&self, idx: (usize, usize)) -> usize {
        debug_assert!(idx.0 < self.m && idx.1 < self.n);
        idx.0 + self.m * idx.1
    }

    /// Produces `y = a*self*x + b*y`
    pub fn gemv(&self, y: &mut [T], x: &[T], a: T, b: T) {
        assert_eq!(x.len(), self.n);
        assert_eq!(y.len(), self.m);

        for v in &mut *y {
            *v *= b;
        }
        for (j, &xj) in x.iter().enumerate() {
            let col = &self.data[(j * self.m)..((j + 1) * self.m)];
            for (yi, &Aij) in y.iter_mut().zip(col) {
                *yi += a * Aij * xj;
            }
        }
    }

    /// Produces `y = a*self'*x + b*y`
    pub fn gemv_t(&self, y: &mut [T], x: &[T], a: T, b: T) {
        assert_eq!(x.len(), self.m);
        assert_eq!(y.len(), self.n);

        for (j, yj) in y.iter_mut().enumerate() {
            let col = &self.data[(j * self.m)..((j + 1) * self.m)];
            let mut acc = T::zero();
            for (&Aij, &xi) in col.iter().zip(x) {
                acc += Aij * xi;
            }
            *yj = a * acc + b * (*yj);
        }
    }
}

impl<T> ShapedMatrix for Matrix<T> {
    fn nrows(&self) -> usize {
        self.m
    }
    fn ncols(&self) -> usize {
        self.n
    }
}

impl<T: FloatT> Index<(usize, usize)> for Matrix<T> {
    type Output = T;
    fn index(&self, idx: (usize, usize)) -> &T {
        &self.data[self.index_linear(idx)]
    }
}

impl<T: FloatT> IndexMut<(usize, usize)> for Matrix<T> {
    fn index_mut(&mut self, idx: (usize, usize)) -> &mut T {
        let lidx = self.index_linear(idx);
        &mut self.data[lidx]
    }
}

/// LU factorization with partial pivoting of a small square [`Matrix`].
///
/// The factors are held packed in a single matrix, with the unit lower
/// triangle implicit.  Solves are performed in place on the right hand
/// side, with separate entry points for the matrix and its transpose.
#[derive(Debug, Clone)]
pub struct LuFactors<T = f64> {
    lu: Matrix<T>,
    piv: Vec<usize>,
}

impl<T: FloatT> LuFactors<T> {
    /// Factor the matrix `A = P⁻¹ L U`, consuming it.
    ///
    /// Returns [`DenseFactorizationError::Singular`] on a zero pivot,
    /// i.e. when `A` is not invertible.
    pub fn new(mut A: Matrix<T>) -> Result<Self, DenseFactorizationError> {
        if !A.is_square() {
            return Err(DenseFactorizationError::IncompatibleDimension);
        }
        let n = A.n;
        let mut piv = vec![0usize; n];

        for k in 0..n {
            // pivot row = largest magnitude entry on or below the diagonal
            let mut p = k;
            let mut pmax = T::abs(A[(k, k)]);
            for i in (k + 1)..n {
                let v = T::abs(A[(i, k)]);
                if v > pmax {
                    pmax = v;
                    p = i;
                }
            }
            if pmax == T::zero() {
                return Err(DenseFactorizationError::Singular);
            }
            piv[k] = p;
            if p != k {
                for j in 0..n {
                    let tmp = A[(k, j)];
                    A[(k, j)] = A[(p, j)];
                    A[(p, j)] = tmp;
                }
            }

            let ukk = A[(k, k)];
            for i in (k + 1)..n {
                let lik = A[(i, k)] / ukk;
                A[(i, k)] = lik;
                for j in (k + 1)..n {
                    let ukj = A[(k, j)];
                    A[(i, j)] -= lik * ukj;
                }
            }
        }

        Ok(Self { lu: A, piv })
    }

    /// dimension of the factored matrix
    pub fn size(&self) -> usize {
        self.lu.n
    }

    /// Solve `A x = b` in place.
    pub fn solve(&self, b: &mut [T]) {
        let n = self.size();
        assert_eq!(b.len(), n);

        // P b
        for k in 0..n {
            b.swap(k, self.piv[k]);
        }
        // forward solve, unit lower triangle
        for k in 0..n {
            for i in (k + 1)..n {
                let lik = self.lu[(i, k)];
                b[i] = b[i] - lik * b[k];
            }
        }
        // backward solve
        for k in (0..n).rev() {
            b[k] /= self.lu[(k, k)];
            for i in 0..k {
                let uik = self.lu[(i, k)];
                b[i] = b[i] - uik * b[k];
            }
        }
    }

    /// Solve `Aᵀ x = b` in place.
    pub fn solve_transpose(&self, b: &mut [T]) {
        let n = self.size();
        assert_eq!(b.len(), n);

        // Aᵀ = Uᵀ Lᵀ P, so solve Uᵀ y = b ...
        for k in 0..n {
            let mut acc = b[k];
            for i in 0..k {
                acc -= self.lu[(i, k)] * b[i];
            }
            b[k] = acc / self.lu[(k, k)];
        }
        // ... then Lᵀ z = y ...
        for k in (0..n).rev() {
            let mut acc = b[k];
            for i in (k + 1)..n {
                acc -= self.lu[(i, k)] * b[i];
            }
            b[k] = acc;
        }
        // ... then undo the pivoting
        for k in (0..n).rev() {
            b.swap(k, self.piv[k]);
        }
    }
}
