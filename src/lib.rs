//! Hierarchical B-spline bases and sparse-grid interpolation.
//!
//! The crate is organized bottom up: translation-invariant parent functions
//! ([`parent`]), hierarchical bases mapping (level, index) pairs to functions
//! on the unit interval ([`basis`], [`fundamental`]), combinatorial grid
//! generation ([`grid`]), interpolation by dense collocation solves
//! ([`interpolate`]), and the faster equivalent hierarchization paths: the
//! unidirectional principle and breadth-first substitution ([`hierarchize`]),
//! the combination technique and residual interpolation ([`combination`]),
//! and Hermite hierarchization of value/derivative data ([`hermite`]).

pub mod basis;
pub mod combination;
pub mod fundamental;
pub mod grid;
pub mod hermite;
pub mod hierarchize;
pub mod interpolate;
pub mod linalg;
pub mod parent;

pub use basis::{
    BasisError, BasisKind, HierarchicalBSpline, HierarchicalBasis1d,
    HierarchicalClenshawCurtisBSpline, HierarchicalFundamentalSplineBasis,
    HierarchicalLagrangePolynomial, HierarchicalNaturalBSpline, HierarchicalNotAKnotBSpline,
    HierarchicalWeaklyFundamentalSplineBasis, LagrangePolynomial, ModifiedHierarchicalBSpline,
    ModifiedHierarchicalClenshawCurtisBSpline, ModifiedHierarchicalFundamentalSpline,
    TensorProductBasis, create_basis, create_nodal_fundamental_transformed,
};
pub use combination::{
    CombinationError, CombinationInterpolant, ResidualInterpolant, combination_levels,
    membership_coefficient_sum,
};
pub use fundamental::{
    CoefficientSolve, HierarchicalFundamentalTransformed, NodalFundamentalTransformed,
    NodalWeaklyFundamentalTransformed,
};
pub use grid::{
    DimensionallyAdaptiveSparse, Distribution, FullGrid, GridError, GridPointSet, RegularSparse,
    RegularSparseBoundary, SpatiallyAdaptiveSparse, coordinate, hierarchical_indices,
    hierarchical_to_nodal, nodal_indices, nodal_to_hierarchical,
};
pub use hermite::{HermiteInterpolant, hierarchize_hermite};
pub use hierarchize::{
    hierarchize_bfs, hierarchize_unidirectional, hierarchize_unidirectional_with_observer,
};
pub use interpolate::{Interpolant, InterpolationError, full_grid_matrix, interpolation_matrix};
pub use linalg::{FaerLinalgError, FaerSvd, matrix_rank, solve_dense, solve_dense_vec};
pub use parent::{
    COEFFICIENT_TOLERANCE, CardinalBSpline, CentralizedCardinalBSpline, FundamentalSpline,
    NonUniformBSpline, WeaklyFundamentalSpline,
};
