//! Static elimination of constrained degrees of freedom.
//!
//! A constraint operator `B` whose rows can be grouped so that each group
//! owns an invertible square block admits exact elimination: within a
//! group the "secondary" dofs are determined by the remaining "primary"
//! dofs, `x_s = B_s⁻¹ (c_g − B_p x_p)`.  The [`EliminationProjection`]
//! built from the per-group [`Eliminator`]s maps the reduced space of
//! free dofs onto the full space along the homogeneous part of that
//! relation, so that `B · P = 0` and the constrained problem becomes an
//! unconstrained SPD problem in the reduced space.

#![allow(non_snake_case)]

use crate::algebra::{CscMatrix, FloatT, LuFactors, Matrix, VectorMath};
use crate::solver::ConstructionError;
use std::collections::HashMap;

/// One group of constraints together with its elimination factors.
///
/// `lagrange` lists the constraint rows of the group, `secondary` the
/// equally many dofs eliminated by them, and `primary` the remaining
/// dofs those rows touch.  The square block `B_s` over the secondary
/// dofs is LU-factored at construction and must be invertible.
pub struct Eliminator<T = f64> {
    lagrange: Vec<usize>,
    primary: Vec<usize>,
    secondary: Vec<usize>,
    /// dense copy of the group rows over the primary dofs
    Bp: Matrix<T>,
    /// factors of the group rows over the secondary dofs
    Bs: LuFactors<T>,
}

impl<T: FloatT> Eliminator<T> {
    /// Extract and factor one group from the constraint matrix `B`.
    pub fn new(
        B: &CscMatrix<T>,
        lagrange: &[usize],
        primary: &[usize],
        secondary: &[usize],
    ) -> Result<Self, ConstructionError> {
        if secondary.len() != lagrange.len() {
            return Err(ConstructionError::GroupSizeMismatch {
                lagrange: lagrange.len(),
                secondary: secondary.len(),
            });
        }
        for &row in lagrange {
            if row >= B.m {
                return Err(ConstructionError::IndexOutOfRange { index: row, dim: B.m });
            }
        }
        for &col in primary.iter().chain(secondary) {
            if col >= B.n {
                return Err(ConstructionError::IndexOutOfRange { index: col, dim: B.n });
            }
        }

        let rowmap: HashMap<usize, usize> =
            lagrange.iter().enumerate().map(|(i, &r)| (r, i)).collect();

        let Bp = extract_block(B, &rowmap, primary, lagrange.len());
        let Bs_dense = extract_block(B, &rowmap, secondary, lagrange.len());
        let Bs = LuFactors::new(Bs_dense)
            .map_err(|_| ConstructionError::SingularSecondaryBlock)?;

        Ok(Self {
            lagrange: lagrange.to_vec(),
            primary: primary.to_vec(),
            secondary: secondary.to_vec(),
            Bp,
            Bs,
        })
    }

    /// the constraint rows of this group
    pub fn lagrange_dofs(&self) -> &[usize] {
        &self.lagrange
    }

    /// the free dofs appearing in this group's rows
    pub fn primary_dofs(&self) -> &[usize] {
        &self.primary
    }

    /// the dofs eliminated by this group
    pub fn secondary_dofs(&self) -> &[usize] {
        &self.secondary
    }

    /// `out = −Bs⁻¹ Bp xp`, the homogeneous secondary response to the
    /// group-local primary values `xp`
    pub(crate) fn eliminate(&self, xp: &[T], out: &mut [T]) {
        self.Bp.gemv(out, xp, -T::one(), T::zero());
        self.Bs.solve(out);
    }

    /// `out = −Bpᵀ Bs⁻ᵀ ws`, the transpose of [`eliminate`](Self::eliminate)
    pub(crate) fn eliminate_transpose(&self, ws: &[T], out: &mut [T]) {
        let mut tmp = ws.to_vec();
        self.Bs.solve_transpose(&mut tmp);
        self.Bp.gemv_t(out, &tmp, -T::one(), T::zero());
    }

    /// `out = Bs⁻¹ cg`, the secondary values enforcing the group-local
    /// constraint target `cg` with all primary dofs at zero
    pub(crate) fn constraint_offset(&self, cg: &[T], out: &mut [T]) {
        out.copy_from(cg);
        self.Bs.solve(out);
    }

    /// Solve `Bsᵀ λg = rs` for the group-local multipliers given the
    /// primal residual restricted to the secondary dofs.
    pub(crate) fn multiplier_from_residual(&self, rs: &[T], out: &mut [T]) {
        out.copy_from(rs);
        self.Bs.solve_transpose(out);
    }
}

/// dense copy of the rows in `rowmap` restricted to the columns `cols`
fn extract_block<T: FloatT>(
    B: &CscMatrix<T>,
    rowmap: &HashMap<usize, usize>,
    cols: &[usize],
    nrows: usize,
) -> Matrix<T> {
    let mut out = Matrix::zeros(nrows, cols.len());
    for (jloc, &col) in cols.iter().enumerate() {
        for ptr in B.colptr[col]..B.colptr[col + 1] {
            if let Some(&iloc) = rowmap.get(&B.rowval[ptr]) {
                out[(iloc, jloc)] = B.nzval[ptr];
            }
        }
    }
    out
}

/// Matrix-free projection `P` from the reduced space of free dofs onto
/// the full primal space, built from disjoint [`Eliminator`] groups.
///
/// `P` has one column per non-eliminated dof: each such dof maps to
/// itself, and every secondary dof receives the group's homogeneous
/// response `−Bs⁻¹ Bp` of its primary dofs, so `B · P = 0` by
/// construction.  The operator is n × (n − m) for n dofs and m
/// constraints and is never assembled during solves;
/// [`assemble_exact`](Self::assemble_exact) exists for inspection and
/// testing.
pub struct EliminationProjection<T = f64> {
    n: usize,
    m: usize,
    /// reduced index → full dof
    reduced: Vec<usize>,
    /// full dof → reduced index, `None` for eliminated dofs
    reduced_of: Vec<Option<usize>>,
    eliminators: Vec<Eliminator<T>>,
}

impl<T: FloatT> EliminationProjection<T> {
    /// Assemble the projection over `n` dofs and `m` constraint rows.
    ///
    /// The groups must be disjoint in both their constraint rows and
    /// their secondary dofs, must jointly cover all `m` rows, and no
    /// group's primary dof may be another group's secondary dof; any
    /// violation is [`ConstructionError::CoupledEliminators`].
    pub fn new(
        n: usize,
        m: usize,
        eliminators: Vec<Eliminator<T>>,
    ) -> Result<Self, ConstructionError> {
        let mut lag_seen = vec![false; m];
        let mut is_secondary = vec![false; n];

        for e in &eliminators {
            for &l in &e.lagrange {
                if l >= m || lag_seen[l] {
                    return Err(ConstructionError::CoupledEliminators);
                }
                lag_seen[l] = true;
            }
            for &s in &e.secondary {
                if s >= n || is_secondary[s] {
                    return Err(ConstructionError::CoupledEliminators);
                }
                is_secondary[s] = true;
            }
        }
        if !lag_seen.iter().all(|&seen| seen) {
            return Err(ConstructionError::CoupledEliminators);
        }
        // a primary dof eliminated elsewhere would chain groups together
        for e in &eliminators {
            if e.primary.iter().any(|&p| p >= n || is_secondary[p]) {
                return Err(ConstructionError::CoupledEliminators);
            }
        }

        let mut reduced = Vec::with_capacity(n - m);
        let mut reduced_of = vec![None; n];
        for (dof, &sec) in is_secondary.iter().enumerate() {
            if !sec {
                reduced_of[dof] = Some(reduced.len());
                reduced.push(dof);
            }
        }

        Ok(Self {
            n,
            m,
            reduced,
            reduced_of,
            eliminators,
        })
    }

    /// full primal dimension n
    pub fn nrows(&self) -> usize {
        self.n
    }

    /// reduced dimension n − m
    pub fn ncols(&self) -> usize {
        self.reduced.len()
    }

    /// number of eliminated dofs (= constraint rows)
    pub fn num_eliminated(&self) -> usize {
        self.m
    }

    /// `y = P x`: scatter the reduced vector to the free dofs and fill
    /// in each group's homogeneous secondary response
    pub fn mult(&self, x: &[T], y: &mut [T]) {
        assert_eq!(x.len(), self.ncols());
        assert_eq!(y.len(), self.n);

        y.set(T::zero());
        for (i, &dof) in self.reduced.iter().enumerate() {
            y[dof] = x[i];
        }
        for e in &self.eliminators {
            let xp: Vec<T> = e.primary.iter().map(|&p| y[p]).collect();
            let mut xs = vec![T::zero(); e.secondary.len()];
            e.eliminate(&xp, &mut xs);
            for (i, &s) in e.secondary.iter().enumerate() {
                y[s] = xs[i];
            }
        }
    }

    /// `y = Pᵀ x`
    pub fn mult_transpose(&self, x: &[T], y: &mut [T]) {
        assert_eq!(x.len(), self.n);
        assert_eq!(y.len(), self.ncols());

        for (i, &dof) in self.reduced.iter().enumerate() {
            y[i] = x[dof];
        }
        for e in &self.eliminators {
            let ws: Vec<T> = e.secondary.iter().map(|&s| x[s]).collect();
            let mut wp = vec![T::zero(); e.primary.len()];
            e.eliminate_transpose(&ws, &mut wp);
            for (j, &p) in e.primary.iter().enumerate() {
                // primary dofs are never eliminated, so the map is total
                let jr = self.reduced_of[p].unwrap();
                y[jr] += wp[j];
            }
        }
    }

    /// A particular solution `xc` of `B xc = c`, supported on the
    /// secondary dofs only.
    pub fn particular_solution(&self, c: &[T], xc: &mut [T]) {
        assert_eq!(c.len(), self.m);
        assert_eq!(xc.len(), self.n);

        xc.set(T::zero());
        for e in &self.eliminators {
            let cg: Vec<T> = e.lagrange.iter().map(|&l| c[l]).collect();
            let mut xs = vec![T::zero(); e.secondary.len()];
            e.constraint_offset(&cg, &mut xs);
            for (i, &s) in e.secondary.iter().enumerate() {
                xc[s] = xs[i];
            }
        }
    }

    /// Recover the multipliers from the primal residual `r = f − A x`:
    /// per group, solve `Bsᵀ λg = r_s`.
    pub fn multiplier_from_residual(&self, r: &[T], lambda: &mut [T]) {
        assert_eq!(r.len(), self.n);
        assert_eq!(lambda.len(), self.m);

        for e in &self.eliminators {
            let rs: Vec<T> = e.secondary.iter().map(|&s| r[s]).collect();
            let mut lg = vec![T::zero(); e.lagrange.len()];
            e.multiplier_from_residual(&rs, &mut lg);
            for (i, &l) in e.lagrange.iter().enumerate() {
                lambda[l] = lg[i];
            }
        }
    }

    /// Assemble `P` as an explicit sparse matrix.
    ///
    /// Quadratic in the group sizes; intended for diagnostics and for
    /// validating the matrix-free applies, not for production solves.
    pub fn assemble_exact(&self) -> CscMatrix<T> {
        let mut trips: Vec<(usize, usize, T)> = Vec::with_capacity(self.n);

        for (i, &dof) in self.reduced.iter().enumerate() {
            trips.push((dof, i, T::one()));
        }
        for e in &self.eliminators {
            let nsec = e.secondary.len();
            for (j, &p) in e.primary.iter().enumerate() {
                // column j of −Bs⁻¹ Bp
                let mut col: Vec<T> = (0..nsec).map(|i| -e.Bp[(i, j)]).collect();
                e.Bs.solve(&mut col);
                let jr = self.reduced_of[p].unwrap();
                for (i, &s) in e.secondary.iter().enumerate() {
                    if col[i] != T::zero() {
                        trips.push((s, jr, col[i]));
                    }
                }
            }
        }

        CscMatrix::from_triplets(self.n, self.ncols(), &trips)
    }
}

/// Derive one single-row [`Eliminator`] per constraint row of `B`,
/// choosing as secondary the largest-magnitude entry among dofs not yet
/// eliminated by an earlier row.
///
/// Fails with [`ConstructionError::NoSecondaryCandidate`] when a row has
/// no remaining nonzero to eliminate, and with
/// [`ConstructionError::CoupledEliminators`] when the greedy choice
/// leaves one row's primary dof eliminated by another row; such
/// constraint sets need a caller-supplied multi-row group instead.
pub fn nodal_eliminators<T: FloatT>(
    B: &CscMatrix<T>,
) -> Result<Vec<Eliminator<T>>, ConstructionError> {
    // gather B by rows
    let mut rows: Vec<Vec<(usize, T)>> = vec![Vec::new(); B.m];
    for col in 0..B.n {
        for ptr in B.colptr[col]..B.colptr[col + 1] {
            rows[B.rowval[ptr]].push((col, B.nzval[ptr]));
        }
    }

    let mut used = vec![false; B.n];
    let mut secondary_of = vec![0usize; B.m];
    for (row, entries) in rows.iter().enumerate() {
        let mut best: Option<(usize, T)> = None;
        for &(col, v) in entries {
            if used[col] || v == T::zero() {
                continue;
            }
            if best.map_or(true, |(_, bv)| T::abs(v) > T::abs(bv)) {
                best = Some((col, v));
            }
        }
        let (col, _) = best.ok_or(ConstructionError::NoSecondaryCandidate { row })?;
        used[col] = true;
        secondary_of[row] = col;
    }

    // the single-row groups are only independent if no row's primary
    // dof was claimed as another row's secondary
    for (row, entries) in rows.iter().enumerate() {
        if entries
            .iter()
            .any(|&(col, _)| col != secondary_of[row] && used[col])
        {
            return Err(ConstructionError::CoupledEliminators);
        }
    }

    rows.iter()
        .enumerate()
        .map(|(row, entries)| {
            let primary: Vec<usize> = entries
                .iter()
                .map(|&(col, _)| col)
                .filter(|&col| col != secondary_of[row])
                .collect();
            Eliminator::new(B, &[row], &primary, &[secondary_of[row]])
        })
        .collect()
}
