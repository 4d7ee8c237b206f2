use crate::basis::TensorProductBasis;
use crate::grid::{Distribution, FullGrid, GridPointSet, hierarchical_indices};
use crate::interpolate::{Interpolant, InterpolationError};
use crate::linalg::solve_dense_vec;
use itertools::Itertools;
use log::debug;
use ndarray::{Array1, Array2, ArrayView2};
use rayon::prelude::*;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CombinationError {
    #[error("Combination technique needs n >= d, but n = {n} and d = {d}.")]
    LevelBelowDimension { n: u32, d: usize },

    #[error("Active level vector has {found} components, expected {expected}.")]
    DimensionMismatch { expected: usize, found: usize },

    #[error(transparent)]
    Interpolation(#[from] InterpolationError),
}

fn binomial(n: u64, k: u64) -> u64 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    let mut out: u128 = 1;
    for j in 0..k {
        out = out * (n - j) as u128 / (j + 1) as u128;
    }
    out as u64
}

fn levels_with_sum(d: usize, sum: i64, current: &mut Vec<u32>, out: &mut Vec<Vec<u32>>) {
    if current.len() == d {
        if current.iter().map(|&l| l as i64).sum::<i64>() == sum {
            out.push(current.clone());
        }
        return;
    }
    let used: i64 = current.iter().map(|&l| l as i64).sum();
    let remaining_dims = (d - current.len() - 1) as i64;
    let mut l = 1i64;
    while used + l + remaining_dims <= sum {
        current.push(l as u32);
        levels_with_sum(d, sum, current, out);
        current.pop();
        l += 1;
    }
}

/// The signed level family of the combination technique for the regular
/// sparse grid of level n in d dimensions:
/// sum_{q=0}^{d-1} (-1)^q C(d-1, q) sum_{|l| = n-q} u_l.
pub fn combination_levels(n: u32, d: usize) -> Result<Vec<(Vec<u32>, f64)>, CombinationError> {
    if (n as i64) < d as i64 {
        return Err(CombinationError::LevelBelowDimension { n, d });
    }
    let mut family = Vec::new();
    for q in 0..d as i64 {
        let sum = n as i64 - q;
        if sum < d as i64 {
            break;
        }
        let sign = if q % 2 == 0 { 1.0 } else { -1.0 };
        let coefficient = sign * binomial(d as u64 - 1, q as u64) as f64;
        let mut levels = Vec::new();
        let mut current = Vec::with_capacity(d);
        levels_with_sum(d, sum, &mut current, &mut levels);
        for level in levels {
            family.push((level, coefficient));
        }
    }
    Ok(family)
}

/// Sum of the signed coefficients of all full grids of the family that
/// contain the point with hierarchical level vector `level`; exactly 1 for
/// every sparse-grid point.
pub fn membership_coefficient_sum(n: u32, d: usize, level: &[u32]) -> Result<f64, CombinationError> {
    let family = combination_levels(n, d)?;
    let mut total = 0.0;
    for (l, coefficient) in family {
        if level.iter().zip(l.iter()).all(|(&a, &b)| a <= b) {
            total += coefficient;
        }
    }
    Ok(total)
}

/// The regular-sparse-grid interpolant expressed as a signed sum of
/// full-grid interpolants (Boolean sum formula). The full-grid pieces are
/// independent and fitted on the worker pool.
pub struct CombinationInterpolant {
    pieces: Vec<(f64, Interpolant)>,
}

impl CombinationInterpolant {
    pub fn fit<F>(
        basis: &TensorProductBasis,
        n: u32,
        d: usize,
        distribution: Distribution,
        f: F,
    ) -> Result<Self, CombinationError>
    where
        F: Fn(&[f64]) -> f64 + Sync,
    {
        let family = combination_levels(n, d)?;
        debug!("combination technique: {} full-grid pieces", family.len());
        let pieces: Result<Vec<(f64, Interpolant)>, CombinationError> = family
            .par_iter()
            .map(|(level, coefficient)| {
                let points = FullGrid::interior(level.clone()).generate(distribution);
                let values: Array1<f64> =
                    (0..points.len()).map(|k| f(points.coord(k))).collect();
                let interpolant = Interpolant::fit_scalar(basis.clone(), points, values.view())?;
                Ok((*coefficient, interpolant))
            })
            .collect();
        Ok(Self { pieces: pieces? })
    }

    pub fn pieces(&self) -> &[(f64, Interpolant)] {
        &self.pieces
    }

    pub fn evaluate_one(&self, x: &[f64]) -> f64 {
        self.pieces
            .iter()
            .map(|(coefficient, interpolant)| coefficient * interpolant.evaluate_one(x)[0])
            .sum()
    }

    pub fn evaluate(&self, xx: ArrayView2<f64>) -> Array1<f64> {
        xx.outer_iter()
            .map(|x| self.evaluate_one(x.as_slice().expect("query rows are contiguous")))
            .collect()
    }
}

/// Additive residual-correction interpolation over an arbitrary family of
/// active subgrids, processed in decreasing level-sum order.
///
/// Each step interpolates the running residual over the subgrid's
/// not-yet-covered hierarchical pairs (a square solve at the newly covered
/// points) and subtracts the reconstruction from the residual everywhere.
/// With an interpolatory basis the residual stays exactly zero at every
/// point covered by earlier steps, and the accumulated coefficients equal
/// the dense surpluses of the union grid.
pub struct ResidualInterpolant {
    interpolant: Interpolant,
}

impl ResidualInterpolant {
    pub fn fit<F>(
        basis: &TensorProductBasis,
        active_levels: &[Vec<u32>],
        distribution: Distribution,
        f: F,
    ) -> Result<Self, CombinationError>
    where
        F: Fn(&[f64]) -> f64,
    {
        Self::fit_with_observer(basis, active_levels, distribution, f, |_, _, _| {})
    }

    /// `observer(step, residual, covered)` runs after each subgrid has been
    /// incorporated; `covered[k]` marks union points interpolated so far.
    pub fn fit_with_observer<F, O>(
        basis: &TensorProductBasis,
        active_levels: &[Vec<u32>],
        distribution: Distribution,
        f: F,
        mut observer: O,
    ) -> Result<Self, CombinationError>
    where
        F: Fn(&[f64]) -> f64,
        O: FnMut(usize, &Array1<f64>, &[bool]),
    {
        let d = basis.dim();
        if let Some(bad) = active_levels.iter().find(|l| l.len() != d) {
            return Err(CombinationError::DimensionMismatch {
                expected: d,
                found: bad.len(),
            });
        }

        let mut order: Vec<usize> = (0..active_levels.len()).collect();
        order.sort_by_key(|&j| {
            std::cmp::Reverse(active_levels[j].iter().map(|&l| l as u64).sum::<u64>())
        });

        // Union point set in subgrid-processing order, with the pair lists of
        // every subgrid resolved to global ids.
        let mut union = GridPointSet::new(d, distribution);
        let mut ids: HashMap<(Vec<u32>, Vec<i64>), usize> = HashMap::new();
        let mut subgrid_ids: Vec<Vec<usize>> = Vec::with_capacity(order.len());
        for &j in &order {
            let mut members = Vec::new();
            for_each_full_grid_pair(&active_levels[j], |level, index| {
                let key = (level.to_vec(), index.to_vec());
                let next = ids.len();
                let id = *ids.entry(key).or_insert_with(|| {
                    union.push(level, index);
                    next
                });
                members.push(id);
            });
            subgrid_ids.push(members);
        }

        let n = union.len();
        let mut residual: Array1<f64> = (0..n).map(|k| f(union.coord(k))).collect();
        let mut surpluses = Array1::<f64>::zeros(n);
        let mut covered = vec![false; n];

        for (step, members) in subgrid_ids.iter().enumerate() {
            let fresh: Vec<usize> = members.iter().copied().filter(|&k| !covered[k]).collect();
            if !fresh.is_empty() {
                let m = fresh.len();
                let mut system = Array2::<f64>::zeros((m, m));
                for (b, &col) in fresh.iter().enumerate() {
                    for (a, &row) in fresh.iter().enumerate() {
                        system[[a, b]] =
                            basis.evaluate(union.level(col), union.index(col), union.coord(row));
                    }
                }
                let rhs: Array1<f64> = fresh.iter().map(|&k| residual[k]).collect();
                let piece = solve_dense_vec(&system, &rhs)
                    .map_err(InterpolationError::from)?;

                for (b, &k) in fresh.iter().enumerate() {
                    surpluses[k] = piece[b];
                }
                for k in 0..n {
                    let x = union.coord(k);
                    let mut correction = 0.0;
                    for (b, &col) in fresh.iter().enumerate() {
                        correction +=
                            piece[b] * basis.evaluate(union.level(col), union.index(col), x);
                    }
                    residual[k] -= correction;
                }
                for &k in &fresh {
                    covered[k] = true;
                }
            }
            observer(step, &residual, &covered);
        }

        let surplus_matrix = surpluses
            .into_shape_with_order((n, 1))
            .expect("surplus vector reshapes to a column");
        let interpolant = Interpolant::with_surpluses(basis.clone(), union, surplus_matrix)
            .map_err(CombinationError::from)?;
        Ok(Self { interpolant })
    }

    pub fn interpolant(&self) -> &Interpolant {
        &self.interpolant
    }
}

/// Visits every hierarchical pair of the interior full grid of `levels`.
fn for_each_full_grid_pair<F>(levels: &[u32], mut visit: F)
where
    F: FnMut(&[u32], &[i64]),
{
    let per_dim: Vec<Vec<(u32, i64)>> = levels
        .iter()
        .map(|&l_max| {
            let mut pairs = Vec::new();
            for l in 1..=l_max {
                for i in hierarchical_indices(l) {
                    pairs.push((l, i));
                }
            }
            pairs
        })
        .collect();
    for pairs in per_dim
        .iter()
        .map(|pairs| pairs.iter().copied())
        .multi_cartesian_product()
    {
        let level: Vec<u32> = pairs.iter().map(|&(l, _)| l).collect();
        let index: Vec<i64> = pairs.iter().map(|&(_, i)| i).collect();
        visit(&level, &index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basis::{BasisKind, create_basis};
    use crate::grid::RegularSparse;
    use approx::assert_abs_diff_eq;
    use std::sync::Arc;

    fn tensor(kind: &BasisKind, dim: usize) -> TensorProductBasis {
        TensorProductBasis::uniform(create_basis(kind).unwrap(), dim)
    }

    fn test_function(x: &[f64]) -> f64 {
        let mut v = 0.4;
        for (t, &c) in x.iter().enumerate() {
            v += (t as f64 + 1.0) * c * (1.0 - c) + 0.3 * c;
        }
        (2.1 * v).sin() + 0.5 * v
    }

    #[test]
    fn combination_coefficients_sum_to_one_for_every_point() {
        for (n, d) in [(5u32, 1usize), (5, 2), (5, 3)] {
            let grid = RegularSparse::new(n, d).unwrap();
            for level in grid.level_vectors() {
                let total = membership_coefficient_sum(n, d, &level).unwrap();
                assert_abs_diff_eq!(total, 1.0, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn combination_technique_matches_sparse_interpolant() {
        for d in [1usize, 2, 3] {
            let n = (d as u32) + 2;
            for kind in [
                BasisKind::BSpline { degree: 1, nu: 0 },
                BasisKind::NotAKnotBSpline { degree: 3, nu: 0 },
            ] {
                let basis = tensor(&kind, d);
                let combined =
                    CombinationInterpolant::fit(&basis, n, d, Distribution::Uniform, test_function)
                        .expect("combination fit should succeed");

                let points = RegularSparse::new(n, d)
                    .unwrap()
                    .generate(Distribution::Uniform);
                let values: Array1<f64> = (0..points.len())
                    .map(|k| test_function(points.coord(k)))
                    .collect();
                let sparse = Interpolant::fit_scalar(basis.clone(), points.clone(), values.view())
                    .expect("sparse fit should succeed");

                // Pointwise agreement at grid points and off-grid queries.
                for k in 0..points.len() {
                    let x = points.coord(k);
                    assert_abs_diff_eq!(
                        combined.evaluate_one(x),
                        sparse.evaluate_one(x)[0],
                        epsilon = 1e-9
                    );
                }
                let query: Vec<f64> = (0..d).map(|t| 0.3 + 0.11 * t as f64).collect();
                assert_abs_diff_eq!(
                    combined.evaluate_one(&query),
                    sparse.evaluate_one(&query)[0],
                    epsilon = 1e-9
                );

                // Hierarchizing the combined grid values reproduces the
                // sparse surplus vector.
                let combined_values: Array1<f64> = (0..points.len())
                    .map(|k| combined.evaluate_one(points.coord(k)))
                    .collect();
                let rehierarchized =
                    Interpolant::fit_scalar(basis.clone(), points, combined_values.view())
                        .expect("rehierarchization should succeed");
                let sparse_surpluses = sparse.surpluses_scalar();
                for (a, b) in rehierarchized
                    .surpluses_scalar()
                    .iter()
                    .zip(sparse_surpluses.iter())
                {
                    assert_abs_diff_eq!(a, b, epsilon = 1e-8);
                }
            }
        }
    }

    #[test]
    fn level_equivalent_full_grids_agree_on_shared_points() {
        let basis = tensor(&BasisKind::BSpline { degree: 1, nu: 0 }, 2);
        let grid_a = FullGrid::interior(vec![3, 1]).generate(Distribution::Uniform);
        let grid_b = FullGrid::interior(vec![1, 3]).generate(Distribution::Uniform);
        let fit = |points: &GridPointSet| {
            let values: Array1<f64> = (0..points.len())
                .map(|k| test_function(points.coord(k)))
                .collect();
            Interpolant::fit_scalar(basis.clone(), points.clone(), values.view()).unwrap()
        };
        let u_a = fit(&grid_a);
        let u_b = fit(&grid_b);
        // The intersection grid is the full grid of the componentwise
        // minimum (1, 1).
        let shared = FullGrid::interior(vec![1, 1]).generate(Distribution::Uniform);
        for k in 0..shared.len() {
            let x = shared.coord(k);
            assert_abs_diff_eq!(
                u_a.evaluate_one(x)[0],
                u_b.evaluate_one(x)[0],
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn residual_interpolation_invariant_and_equivalence() {
        // Hat functions vanish exactly at coarser nodes; the truncated
        // fundamental spline only down to its coefficient tolerance.
        for (kind, residual_tolerance) in [
            (BasisKind::BSpline { degree: 1, nu: 0 }, 1e-12),
            (BasisKind::FundamentalSpline { degree: 3, nu: 0 }, 1e-8),
        ] {
            let d = 2usize;
            let n = 4u32;
            let basis = tensor(&kind, d);
            let active = RegularSparse::new(n, d).unwrap().level_vectors();

            let residual_fit = ResidualInterpolant::fit_with_observer(
                &basis,
                &active,
                Distribution::Uniform,
                test_function,
                |step, residual, covered| {
                    for (k, &done) in covered.iter().enumerate() {
                        if done {
                            assert!(
                                residual[k].abs() <= residual_tolerance,
                                "residual {:e} at covered point {k} after step {step}",
                                residual[k]
                            );
                        }
                    }
                },
            )
            .expect("residual interpolation should succeed");

            let union = residual_fit.interpolant().points().clone();
            let values: Array1<f64> = (0..union.len())
                .map(|k| test_function(union.coord(k)))
                .collect();
            let dense = Interpolant::fit_scalar(basis.clone(), union, values.view())
                .expect("dense fit on the union grid should succeed");

            let accumulated = residual_fit.interpolant().surpluses_scalar();
            for (a, b) in accumulated.iter().zip(dense.surpluses_scalar().iter()) {
                assert_abs_diff_eq!(a, b, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn combination_rejects_too_small_level() {
        let basis = TensorProductBasis::uniform(
            Arc::new(crate::basis::HierarchicalBSpline::new(1, 0).unwrap()),
            3,
        );
        assert!(matches!(
            CombinationInterpolant::fit(&basis, 2, 3, Distribution::Uniform, |_| 0.0),
            Err(CombinationError::LevelBelowDimension { n: 2, d: 3 })
        ));
    }
}
