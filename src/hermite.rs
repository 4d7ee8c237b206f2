use crate::grid::GridPointSet;
use crate::interpolate::InterpolationError;
use ndarray::Array1;

/// Cubic Hermite value mother function on [-1, 1]: 1 with zero slope at 0,
/// a double zero at both endpoints (2|t|^3 - 3t^2 + 1).
#[inline]
fn hermite_value(t: f64) -> f64 {
    let a = t.abs();
    if a >= 1.0 {
        0.0
    } else {
        (2.0 * a - 3.0) * a * a + 1.0
    }
}

#[inline]
fn hermite_value_derivative(t: f64) -> f64 {
    let a = t.abs();
    if a >= 1.0 {
        0.0
    } else {
        (6.0 * a - 6.0) * a * t.signum()
    }
}

/// Cubic Hermite slope mother function on [-1, 1]: 0 with unit slope at 0,
/// a double zero at both endpoints (t(1 - |t|)^2).
#[inline]
fn hermite_slope(t: f64) -> f64 {
    let a = t.abs();
    if a >= 1.0 { 0.0 } else { t * (1.0 - a) * (1.0 - a) }
}

#[inline]
fn hermite_slope_derivative(t: f64) -> f64 {
    let a = t.abs();
    if a >= 1.0 {
        0.0
    } else {
        (1.0 - a) * (1.0 - 3.0 * a)
    }
}

/// One-dimensional Hermite interpolant: each grid point (l, i) carries a
/// value surplus for the dilated value function and a slope surplus for the
/// 2^-l-scaled slope function, so the interpolant matches both function
/// values and first derivatives at every grid point.
pub struct HermiteInterpolant {
    points: GridPointSet,
    value_surpluses: Array1<f64>,
    slope_surpluses: Array1<f64>,
}

impl HermiteInterpolant {
    pub fn points(&self) -> &GridPointSet {
        &self.points
    }

    pub fn value_surpluses(&self) -> &Array1<f64> {
        &self.value_surpluses
    }

    pub fn slope_surpluses(&self) -> &Array1<f64> {
        &self.slope_surpluses
    }

    pub fn evaluate(&self, x: f64) -> f64 {
        let mut sum = 0.0;
        for k in 0..self.points.len() {
            let level = self.points.level(k)[0];
            let index = self.points.index(k)[0];
            let h_inv = (1u64 << level) as f64;
            let t = x * h_inv - index as f64;
            sum += self.value_surpluses[k] * hermite_value(t)
                + self.slope_surpluses[k] / h_inv * hermite_slope(t);
        }
        sum
    }

    pub fn evaluate_derivative(&self, x: f64) -> f64 {
        let mut sum = 0.0;
        for k in 0..self.points.len() {
            let level = self.points.level(k)[0];
            let index = self.points.index(k)[0];
            let h_inv = (1u64 << level) as f64;
            let t = x * h_inv - index as f64;
            sum += self.value_surpluses[k] * hermite_value_derivative(t) * h_inv
                + self.slope_surpluses[k] * hermite_slope_derivative(t);
        }
        sum
    }
}

/// Hermite hierarchization of value/derivative data on a one-dimensional
/// grid, breadth first in increasing level order.
///
/// Both mother functions have double zeros at the neighboring same-level
/// nodes, so every already-placed contribution vanishes (with derivative) at
/// the nodes processed later and the substitution is exact: the interpolant
/// reproduces values and first derivatives at all grid points.
pub fn hierarchize_hermite(
    points: &GridPointSet,
    values: &Array1<f64>,
    derivatives: &Array1<f64>,
) -> Result<HermiteInterpolant, InterpolationError> {
    if points.dim() != 1 {
        return Err(InterpolationError::DimensionMismatch(format!(
            "Hermite hierarchization is one-dimensional, got a {}-dimensional point set",
            points.dim()
        )));
    }
    if values.len() != points.len() || derivatives.len() != points.len() {
        return Err(InterpolationError::DimensionMismatch(format!(
            "{} values / {} derivatives for {} grid points",
            values.len(),
            derivatives.len(),
            points.len()
        )));
    }

    let n = points.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by_key(|&k| points.level(k)[0]);

    let mut partial = HermiteInterpolant {
        points: points.clone(),
        value_surpluses: Array1::zeros(n),
        slope_surpluses: Array1::zeros(n),
    };
    for &k in &order {
        let x = points.coord(k)[0];
        let value_surplus = values[k] - partial.evaluate(x);
        let slope_surplus = derivatives[k] - partial.evaluate_derivative(x);
        partial.value_surpluses[k] = value_surplus;
        partial.slope_surpluses[k] = slope_surplus;
    }
    Ok(partial)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Distribution, RegularSparseBoundary};
    use approx::assert_abs_diff_eq;

    fn f(x: f64) -> f64 {
        (3.0 * x).sin() + 0.5 * x * x
    }

    fn df(x: f64) -> f64 {
        3.0 * (3.0 * x).cos() + x
    }

    #[test]
    fn mother_functions_have_hermite_node_data() {
        assert_abs_diff_eq!(hermite_value(0.0), 1.0);
        assert_abs_diff_eq!(hermite_value_derivative(0.0), 0.0);
        assert_abs_diff_eq!(hermite_slope(0.0), 0.0);
        assert_abs_diff_eq!(hermite_slope_derivative(0.0), 1.0);
        for t in [-1.0, 1.0] {
            assert_abs_diff_eq!(hermite_value(t), 0.0);
            assert_abs_diff_eq!(hermite_value_derivative(t), 0.0, epsilon = 1e-12);
            assert_abs_diff_eq!(hermite_slope(t), 0.0);
            assert_abs_diff_eq!(hermite_slope_derivative(t), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn mother_derivatives_match_finite_differences() {
        let h = 1e-6;
        for step in 1..20 {
            let t = -0.95 + 1.9 * step as f64 / 20.0;
            let fd_value = (hermite_value(t + h) - hermite_value(t - h)) / (2.0 * h);
            assert_abs_diff_eq!(hermite_value_derivative(t), fd_value, epsilon = 1e-5);
            let fd_slope = (hermite_slope(t + h) - hermite_slope(t - h)) / (2.0 * h);
            assert_abs_diff_eq!(hermite_slope_derivative(t), fd_slope, epsilon = 1e-5);
        }
    }

    #[test]
    fn hermite_hierarchization_reproduces_values_and_derivatives() {
        let points = RegularSparseBoundary::new(4, 1, 0)
            .unwrap()
            .generate(Distribution::Uniform);
        let values: Array1<f64> = (0..points.len()).map(|k| f(points.coord(k)[0])).collect();
        let derivatives: Array1<f64> =
            (0..points.len()).map(|k| df(points.coord(k)[0])).collect();

        let interpolant = hierarchize_hermite(&points, &values, &derivatives)
            .expect("Hermite hierarchization should succeed");
        for k in 0..points.len() {
            let x = points.coord(k)[0];
            assert_abs_diff_eq!(interpolant.evaluate(x), f(x), epsilon = 1e-10);
            assert_abs_diff_eq!(interpolant.evaluate_derivative(x), df(x), epsilon = 1e-9);
        }

        // Between nodes the piecewise-cubic reconstruction is close for a
        // smooth function at this resolution.
        for step in 0..50 {
            let x = step as f64 / 49.0;
            assert!((interpolant.evaluate(x) - f(x)).abs() < 2e-3);
        }
    }

    #[test]
    fn hermite_surpluses_depend_only_on_coarser_levels() {
        let fine = RegularSparseBoundary::new(4, 1, 0)
            .unwrap()
            .generate(Distribution::Uniform);
        let values: Array1<f64> = (0..fine.len()).map(|k| f(fine.coord(k)[0])).collect();
        let derivatives: Array1<f64> = (0..fine.len()).map(|k| df(fine.coord(k)[0])).collect();
        let full = hierarchize_hermite(&fine, &values, &derivatives).unwrap();

        let coarse = RegularSparseBoundary::new(3, 1, 0)
            .unwrap()
            .generate(Distribution::Uniform);
        let coarse_values: Array1<f64> =
            (0..coarse.len()).map(|k| f(coarse.coord(k)[0])).collect();
        let coarse_derivatives: Array1<f64> =
            (0..coarse.len()).map(|k| df(coarse.coord(k)[0])).collect();
        let truncated = hierarchize_hermite(&coarse, &coarse_values, &coarse_derivatives).unwrap();

        for k in 0..coarse.len() {
            let pair = (coarse.level(k)[0], coarse.index(k)[0]);
            let matching = (0..fine.len())
                .find(|&j| (fine.level(j)[0], fine.index(j)[0]) == pair)
                .expect("coarse pair must exist in the fine grid");
            assert_abs_diff_eq!(
                truncated.value_surpluses[k],
                full.value_surpluses[matching],
                epsilon = 1e-12
            );
            assert_abs_diff_eq!(
                truncated.slope_surpluses[k],
                full.slope_surpluses[matching],
                epsilon = 1e-12
            );
        }
    }
}
