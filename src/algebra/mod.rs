//! Basic linear algebra: scalar traits, slice math, sparse and small dense
//! matrix types used throughout the constrained solvers.

mod csc;
mod dense;
mod error_types;
mod floats;
mod vecmath;

pub use csc::*;
pub use dense::*;
pub use error_types::*;
pub use floats::*;
pub use vecmath::*;

/// Adjoint (transpose) view of a matrix
#[derive(Debug, Clone, PartialEq)]
pub struct Adjoint<'a, M> {
    /// the matrix being viewed
    pub src: &'a M,
}

pub(crate) trait ShapedMatrix {
    fn nrows(&self) -> usize;
    fn ncols(&self) -> usize;
    fn is_square(&self) -> bool {
        self.nrows() == self.ncols()
    }
}

/// Matrix-vector multiply in the BLAS `gemv` style.
pub(crate) trait MatrixVectorMultiply {
    type T: FloatT;

    /// Produces `y = a*self*x + b*y`
    fn gemv(&self, y: &mut [Self::T], x: &[Self::T], a: Self::T, b: Self::T);
}
