use dyn_stack::{MemBuffer, MemStack};
use faer::diag::{Diag, DiagRef};
use faer::linalg::solvers::Solve;
use faer::linalg::svd::{self, ComputeSvdVectors};
use faer::{MatRef, get_global_parallelism};
use ndarray::{Array1, Array2, ArrayBase, Data, Ix2};
use std::marker::PhantomData;
use thiserror::Error;

const RESIDUAL_REL_TOL: f64 = 1e-8;
const RESIDUAL_ABS_TOL: f64 = 1e-10;

#[derive(Debug, Error)]
pub enum FaerLinalgError {
    #[error("Linear system is singular or severely ill-conditioned")]
    SingularSystem,
    #[error("SVD failed to converge")]
    SvdNoConvergence,
    #[error("Matrix shape mismatch: {0}")]
    ShapeMismatch(String),
}

pub fn mat_to_array(mat: MatRef<'_, f64>) -> Array2<f64> {
    let mut out = Array2::<f64>::zeros((mat.nrows(), mat.ncols()));
    for j in 0..mat.ncols() {
        for i in 0..mat.nrows() {
            out[[i, j]] = mat[(i, j)];
        }
    }
    out
}

fn diag_to_array(diag: DiagRef<'_, f64>) -> Array1<f64> {
    let mat = diag.column_vector().as_mat();
    let mut out = Array1::<f64>::zeros(mat.nrows());
    for i in 0..mat.nrows() {
        out[i] = mat[(i, 0)];
    }
    out
}

/// Borrowed faer view over an ndarray matrix.
///
/// Layouts with non-positive strides can reverse memory traversal, which
/// violates assumptions in faer kernels; those are materialized into a
/// compact owned copy instead.
pub struct FaerArrayView<'a> {
    ptr: *const f64,
    rows: usize,
    cols: usize,
    row_stride: isize,
    col_stride: isize,
    owned: Option<Array2<f64>>,
    _marker: PhantomData<&'a f64>,
}

impl<'a> FaerArrayView<'a> {
    pub fn new<S: Data<Elem = f64>>(array: &'a ArrayBase<S, Ix2>) -> Self {
        let (rows, cols) = array.dim();
        let strides = array.strides();
        if strides[0] <= 0 || strides[1] <= 0 {
            let owned = array.to_owned();
            let owned_strides = owned.strides();
            return Self {
                ptr: owned.as_ptr(),
                rows,
                cols,
                row_stride: owned_strides[0],
                col_stride: owned_strides[1],
                owned: Some(owned),
                _marker: PhantomData,
            };
        }

        Self {
            ptr: array.as_ptr(),
            rows,
            cols,
            row_stride: strides[0],
            col_stride: strides[1],
            owned: None,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn as_ref(&self) -> MatRef<'_, f64> {
        let (ptr, rows, cols, row_stride, col_stride) = if let Some(owned) = &self.owned {
            let strides = owned.strides();
            (
                owned.as_ptr(),
                owned.nrows(),
                owned.ncols(),
                strides[0],
                strides[1],
            )
        } else {
            (
                self.ptr,
                self.rows,
                self.cols,
                self.row_stride,
                self.col_stride,
            )
        };
        // SAFETY: pointer/shape/strides either come from a live ndarray view
        // with positive strides, or from the owned compact copy held by this
        // wrapper, which outlives the returned view.
        unsafe { MatRef::from_raw_parts(ptr, rows, cols, row_stride, col_stride) }
    }
}

/// Solves the square dense system `A x = rhs` by partial-pivot LU.
///
/// faer's LU factorization always completes; singularity shows up as a
/// non-finite or inconsistent solution. The residual check below turns that
/// into an explicit `SingularSystem` error so callers can react (the
/// fundamental-transform machinery falls back to Lagrange interpolation).
pub fn solve_dense(a: &Array2<f64>, rhs: &Array2<f64>) -> Result<Array2<f64>, FaerLinalgError> {
    let (n, m) = a.dim();
    if n != m {
        return Err(FaerLinalgError::ShapeMismatch(format!(
            "expected a square matrix, got {n}x{m}"
        )));
    }
    if rhs.nrows() != n {
        return Err(FaerLinalgError::ShapeMismatch(format!(
            "right-hand side has {} rows, matrix has {n}",
            rhs.nrows()
        )));
    }

    let a_view = FaerArrayView::new(a);
    let lu = a_view.as_ref().partial_piv_lu();
    let rhs_view = FaerArrayView::new(rhs);
    let solution = mat_to_array(lu.solve(rhs_view.as_ref()).as_ref());

    if !solution.iter().all(|v| v.is_finite()) {
        return Err(FaerLinalgError::SingularSystem);
    }

    let residual = a.dot(&solution) - rhs;
    let max_residual = residual.iter().fold(0.0f64, |acc, &v| acc.max(v.abs()));
    let scale = rhs
        .iter()
        .chain(solution.iter())
        .fold(1.0f64, |acc, &v| acc.max(v.abs()));
    if max_residual > RESIDUAL_ABS_TOL + RESIDUAL_REL_TOL * scale {
        return Err(FaerLinalgError::SingularSystem);
    }

    Ok(solution)
}

/// Single-right-hand-side convenience wrapper around [`solve_dense`].
pub fn solve_dense_vec(a: &Array2<f64>, rhs: &Array1<f64>) -> Result<Array1<f64>, FaerLinalgError> {
    let n = rhs.len();
    let rhs_mat = rhs
        .to_owned()
        .into_shape_with_order((n, 1))
        .map_err(|e| FaerLinalgError::ShapeMismatch(e.to_string()))?;
    let solution = solve_dense(a, &rhs_mat)?;
    Ok(solution.column(0).to_owned())
}

pub trait FaerSvd {
    fn singular_values(&self) -> Result<Array1<f64>, FaerLinalgError>;
}

impl<S: Data<Elem = f64>> FaerSvd for ArrayBase<S, Ix2> {
    fn singular_values(&self) -> Result<Array1<f64>, FaerLinalgError> {
        let faer_view = FaerArrayView::new(self);
        let faer_mat = faer_view.as_ref();
        let (rows, cols) = faer_mat.shape();
        let mut singular = Diag::<f64>::zeros(rows.min(cols));
        let par = get_global_parallelism();
        let mut mem = MemBuffer::new(svd::svd_scratch::<f64>(
            rows,
            cols,
            ComputeSvdVectors::No,
            ComputeSvdVectors::No,
            par,
            Default::default(),
        ));
        let stack = MemStack::new(&mut mem);
        svd::svd(
            faer_mat,
            singular.as_mut(),
            None,
            None,
            par,
            stack,
            Default::default(),
        )
        .map_err(|_| FaerLinalgError::SvdNoConvergence)?;
        Ok(diag_to_array(singular.as_ref()))
    }
}

/// Numerical rank from singular values, relative to the largest one.
pub fn matrix_rank<S: Data<Elem = f64>>(
    a: &ArrayBase<S, Ix2>,
    rel_tol: f64,
) -> Result<usize, FaerLinalgError> {
    let sigma = a.singular_values()?;
    let max = sigma.iter().fold(0.0f64, |acc, &v| acc.max(v));
    if max == 0.0 {
        return Ok(0);
    }
    Ok(sigma.iter().filter(|&&v| v > rel_tol * max).count())
}
