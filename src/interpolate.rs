use crate::basis::TensorProductBasis;
use crate::grid::{Distribution, FullGrid, GridPointSet};
use crate::linalg::{FaerLinalgError, solve_dense};
use log::debug;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InterpolationError {
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error(
        "Interpolation matrix is singular; the basis/grid combination is degenerate: {source}"
    )]
    SingularSystem {
        #[from]
        source: FaerLinalgError,
    },
}

/// The N x N collocation matrix of the point set: column k is the basis
/// function of (L[k], I[k]) evaluated at every grid point.
pub fn interpolation_matrix(basis: &TensorProductBasis, points: &GridPointSet) -> Array2<f64> {
    let n = points.len();
    let mut matrix = Array2::<f64>::zeros((n, n));
    for k in 0..n {
        let level = points.level(k);
        let index = points.index(k);
        for j in 0..n {
            matrix[[j, k]] = basis.evaluate(level, index, points.coord(j));
        }
    }
    matrix
}

/// Collocation matrix of the full grid of `levels`, used by the
/// linear-independence rank checks.
pub fn full_grid_matrix(
    basis: &TensorProductBasis,
    levels: &[u32],
    with_boundary: bool,
    distribution: Distribution,
) -> Array2<f64> {
    let grid = if with_boundary {
        FullGrid::with_boundary(levels.to_vec())
    } else {
        FullGrid::interior(levels.to_vec())
    };
    let points = grid.generate(distribution);
    interpolation_matrix(basis, &points)
}

/// A sparse-grid interpolant: a basis, a point set, and the hierarchical
/// surplus vector aX (one row per grid point, one column per output
/// component). Immutable once constructed; evaluation is a pure function of
/// the query points.
pub struct Interpolant {
    basis: TensorProductBasis,
    points: GridPointSet,
    surpluses: Array2<f64>,
}

impl Interpolant {
    /// Solves A * aX = fX with the dense LU factorization. `values` may have
    /// several columns (vector-valued data); all right-hand sides are solved
    /// simultaneously. A singular matrix is a configuration error.
    pub fn fit(
        basis: TensorProductBasis,
        points: GridPointSet,
        values: ArrayView2<f64>,
    ) -> Result<Self, InterpolationError> {
        if basis.dim() != points.dim() {
            return Err(InterpolationError::DimensionMismatch(format!(
                "basis has {} dimensions, point set has {}",
                basis.dim(),
                points.dim()
            )));
        }
        if values.nrows() != points.len() {
            return Err(InterpolationError::DimensionMismatch(format!(
                "{} value rows for {} grid points",
                values.nrows(),
                points.len()
            )));
        }
        debug!(
            "fitting interpolant: {} points, {} output components",
            points.len(),
            values.ncols()
        );
        let matrix = interpolation_matrix(&basis, &points);
        let surpluses = solve_dense(&matrix, &values.to_owned())?;
        Ok(Self {
            basis,
            points,
            surpluses,
        })
    }

    /// Scalar-valued convenience wrapper around [`Interpolant::fit`].
    pub fn fit_scalar(
        basis: TensorProductBasis,
        points: GridPointSet,
        values: ArrayView1<f64>,
    ) -> Result<Self, InterpolationError> {
        let n = values.len();
        let values = values
            .to_owned()
            .into_shape_with_order((n, 1))
            .map_err(|e| InterpolationError::DimensionMismatch(e.to_string()))?;
        Self::fit(basis, points, values.view())
    }

    /// Bypasses the solve with a precomputed surplus vector.
    pub fn with_surpluses(
        basis: TensorProductBasis,
        points: GridPointSet,
        surpluses: Array2<f64>,
    ) -> Result<Self, InterpolationError> {
        if surpluses.nrows() != points.len() {
            return Err(InterpolationError::DimensionMismatch(format!(
                "{} surplus rows for {} grid points",
                surpluses.nrows(),
                points.len()
            )));
        }
        Ok(Self {
            basis,
            points,
            surpluses,
        })
    }

    pub fn basis(&self) -> &TensorProductBasis {
        &self.basis
    }

    pub fn points(&self) -> &GridPointSet {
        &self.points
    }

    pub fn surpluses(&self) -> &Array2<f64> {
        &self.surpluses
    }

    pub fn surpluses_scalar(&self) -> Array1<f64> {
        self.surpluses.column(0).to_owned()
    }

    /// Evaluates sum_k aX[k] * basis(L[k], I[k], x) at one query point.
    pub fn evaluate_one(&self, x: &[f64]) -> Array1<f64> {
        let mut out = Array1::<f64>::zeros(self.surpluses.ncols());
        for k in 0..self.points.len() {
            let value = self
                .basis
                .evaluate(self.points.level(k), self.points.index(k), x);
            if value != 0.0 {
                for (component, slot) in self.surpluses.row(k).iter().zip(out.iter_mut()) {
                    *slot += component * value;
                }
            }
        }
        out
    }

    /// Vectorized evaluation over the rows of `xx` (N x d).
    pub fn evaluate(&self, xx: ArrayView2<f64>) -> Array2<f64> {
        let mut out = Array2::<f64>::zeros((xx.nrows(), self.surpluses.ncols()));
        for (j, x) in xx.outer_iter().enumerate() {
            let row = self.evaluate_one(x.as_slice().expect("query rows are contiguous"));
            out.row_mut(j).assign(&row);
        }
        out
    }

    pub fn evaluate_scalar(&self, xx: ArrayView2<f64>) -> Array1<f64> {
        self.evaluate(xx).column(0).to_owned()
    }
}
