use crate::basis::TensorProductBasis;
use crate::grid::GridPointSet;
use crate::interpolate::InterpolationError;
use crate::linalg::solve_dense;
use log::debug;
use ndarray::Array2;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::collections::HashMap;
use std::sync::OnceLock;

fn pole_thread_pool() -> &'static ThreadPool {
    static POOL: OnceLock<ThreadPool> = OnceLock::new();
    POOL.get_or_init(|| {
        ThreadPoolBuilder::new()
            .build()
            .expect("pole thread pool initialization should succeed")
    })
}

/// Partitions the point ids into poles along dimension t: equivalence
/// classes sharing identical (level, index) pairs in every other dimension.
fn partition_into_poles(points: &GridPointSet, t: usize) -> Vec<Vec<usize>> {
    let mut poles: HashMap<Vec<(u32, i64)>, Vec<usize>> = HashMap::new();
    for k in 0..points.len() {
        let level = points.level(k);
        let index = points.index(k);
        let key: Vec<(u32, i64)> = (0..points.dim())
            .filter(|&s| s != t)
            .map(|s| (level[s], index[s]))
            .collect();
        poles.entry(key).or_default().push(k);
    }
    poles.into_values().collect()
}

fn solve_pole(
    basis: &TensorProductBasis,
    points: &GridPointSet,
    values: &Array2<f64>,
    t: usize,
    pole: &[usize],
) -> Result<Array2<f64>, InterpolationError> {
    let m = pole.len();
    let mut system = Array2::<f64>::zeros((m, m));
    for (b, &col) in pole.iter().enumerate() {
        let level = points.level(col)[t];
        let index = points.index(col)[t];
        for (a, &row) in pole.iter().enumerate() {
            system[[a, b]] = basis
                .component(t)
                .evaluate(level, index, points.coord(row)[t]);
        }
    }
    let mut rhs = Array2::<f64>::zeros((m, values.ncols()));
    for (a, &row) in pole.iter().enumerate() {
        rhs.row_mut(a).assign(&values.row(row));
    }
    Ok(solve_dense(&system, &rhs)?)
}

/// Unidirectional-principle hierarchization: replaces the dense interpolation
/// solve by one 1-D hierarchization sweep per dimension.
///
/// For each dimension t of `order`, the grid points are partitioned into
/// poles and each pole's one-dimensional interpolation system over the
/// t-coordinates is solved, mutating the working vector in place. Poles
/// within a sweep are independent and run on the worker pool; sweeps are
/// strictly sequential. The result does not depend on the order permutation.
pub fn hierarchize_unidirectional(
    basis: &TensorProductBasis,
    points: &GridPointSet,
    values: &Array2<f64>,
    order: &[usize],
) -> Result<Array2<f64>, InterpolationError> {
    hierarchize_unidirectional_with_observer(basis, points, values, order, |_, _| {})
}

/// [`hierarchize_unidirectional`] with a callback invoked at the end of every
/// sweep with the number of processed dimensions and the working vector (the
/// hook used to verify the partial-surplus property).
pub fn hierarchize_unidirectional_with_observer<F>(
    basis: &TensorProductBasis,
    points: &GridPointSet,
    values: &Array2<f64>,
    order: &[usize],
    mut observer: F,
) -> Result<Array2<f64>, InterpolationError>
where
    F: FnMut(usize, &Array2<f64>),
{
    let dim = points.dim();
    let mut seen = vec![false; dim];
    if order.len() != dim || !order.iter().all(|&t| t < dim && !std::mem::replace(&mut seen[t], true))
    {
        return Err(InterpolationError::DimensionMismatch(format!(
            "order {order:?} is not a permutation of the {dim} dimensions"
        )));
    }
    if values.nrows() != points.len() {
        return Err(InterpolationError::DimensionMismatch(format!(
            "{} value rows for {} grid points",
            values.nrows(),
            points.len()
        )));
    }

    let mut working = values.to_owned();
    for (sweep, &t) in order.iter().enumerate() {
        let poles = partition_into_poles(points, t);
        debug!(
            "unidirectional sweep {}/{dim} along dimension {t}: {} poles",
            sweep + 1,
            poles.len()
        );
        let solved: Result<Vec<Array2<f64>>, InterpolationError> = pole_thread_pool().install(|| {
            poles
                .par_iter()
                .map(|pole| solve_pole(basis, points, &working, t, pole))
                .collect()
        });
        for (pole, solution) in poles.iter().zip(solved?) {
            for (a, &row) in pole.iter().enumerate() {
                working.row_mut(row).assign(&solution.row(a));
            }
        }
        observer(sweep + 1, &working);
    }
    Ok(working)
}

/// Breadth-first-substitution hierarchization: processes the points in
/// increasing level-sum order and computes each surplus as
/// a_k = f_k - sum_{lambda(j) < lambda(k)} a_j * phi_j(x_k).
///
/// Exact for interpolatory (fundamental) bases, whose functions vanish at
/// every node of coarser or equal level other than their own.
pub fn hierarchize_bfs(
    basis: &TensorProductBasis,
    points: &GridPointSet,
    values: &Array2<f64>,
) -> Array2<f64> {
    let n = points.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by_key(|&k| points.level_sum(k));

    let mut surpluses = Array2::<f64>::zeros((n, values.ncols()));
    for (position, &k) in order.iter().enumerate() {
        let x = points.coord(k);
        let mut residual = values.row(k).to_owned();
        for &j in &order[..position] {
            if points.level_sum(j) >= points.level_sum(k) {
                continue;
            }
            let value = basis.evaluate(points.level(j), points.index(j), x);
            if value != 0.0 {
                for (slot, &surplus) in residual.iter_mut().zip(surpluses.row(j).iter()) {
                    *slot -= surplus * value;
                }
            }
        }
        surpluses.row_mut(k).assign(&residual);
    }
    surpluses
}
