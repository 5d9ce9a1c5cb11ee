//! __sella__ is a solver framework for linear saddle-point ("KKT") systems
//! with algebraic equality constraints:
//!
//! ```text
//! A x + Bᵀ λ = f
//! B x        = c
//! ```
//!
//! where `A` is a square (typically symmetric positive definite) operator on
//! a primal space, `B` is a constraint operator with far fewer rows than `A`
//! has degrees of freedom, and `λ` is the vector of Lagrange multipliers.
//! Systems of this form arise whenever discretized simulation fields must
//! satisfy side conditions (continuity across non-matching interfaces,
//! essential constraints, periodicity) that are not eliminated by the
//! discretization itself.
//!
//! Three interchangeable solution strategies are provided behind the common
//! [`ConstrainedSolver`](crate::solver::ConstrainedSolver) contract:
//!
//! * [`SchurConstrainedSolver`](crate::solver::SchurConstrainedSolver) —
//!   iterates on the Schur complement `B A⁻¹ Bᵀ` of the multiplier block,
//!   matrix-free, with the inner `A`-solve supplied by the caller.
//! * [`EliminationCGSolver`](crate::solver::EliminationCGSolver) — removes
//!   dependent ("secondary") degrees of freedom exactly via a matrix-free
//!   [`EliminationProjection`](crate::solver::EliminationProjection) and
//!   solves the reduced unconstrained SPD system by conjugate gradients.
//! * [`PenaltyConstrainedSolver`](crate::solver::PenaltyConstrainedSolver) —
//!   solves the perturbed system `A + ρ BᵀB` as an `O(1/ρ)` approximation.
//!
//! Operators may be serial sparse matrices or row-distributed blocks whose
//! applies fold in the required collective communication; see
//! [`operators`](crate::operators) and [`comm`](crate::comm).

pub mod algebra;
pub mod comm;
pub mod operators;
pub mod solver;
