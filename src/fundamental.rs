use crate::basis::{HierarchicalBasis1d, LagrangePolynomial};
use crate::grid::{Distribution, coordinate, nodal_indices};
use crate::linalg::{solve_dense, solve_dense_vec};
use ndarray::{Array1, Array2};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Outcome of a fundamental-transform coefficient solve. A singular or
/// severely ill-conditioned system is a value, not an error: callers fall
/// back to Lagrange polynomial interpolation instead of propagating a
/// failure.
#[derive(Clone, Debug)]
pub enum CoefficientSolve {
    Solved {
        /// Nodal index of the first combined underlying function.
        start: i64,
        coefficients: Vec<f64>,
    },
    Singular,
}

/// Evaluates the level-l nodal function k of the underlying basis. By the
/// shared index convention, hierarchical bases accept arbitrary (also even)
/// indices as nodal indices of the given level.
#[inline]
fn nodal_eval(basis: &dyn HierarchicalBasis1d, level: u32, k: i64, x: f64) -> f64 {
    basis.evaluate(level, k, x)
}

fn level_nodes(level: u32, distribution: Distribution) -> Vec<f64> {
    nodal_indices(level)
        .into_iter()
        .map(|i| coordinate(level, i, distribution))
        .collect()
}

fn lagrange_fallback(level: u32, index: i64, distribution: Distribution, x: f64) -> f64 {
    let nodes = level_nodes(level, distribution);
    LagrangePolynomial::from_nodes(&nodes, index as usize).evaluate(x, 0)
}

// ============================================================================
// Exact per-level transform
// ============================================================================

/// Turns an arbitrary hierarchical basis into a genuinely interpolating one:
/// the transformed function of (l, i) is the combination of the level's nodal
/// underlying functions that is exactly 1 at its own node and exactly 0 at
/// every other node of the level. The per-level collocation inverse is cached
/// by the basis instance; a singular level degrades to Lagrange polynomial
/// interpolation.
pub struct HierarchicalFundamentalTransformed {
    underlying: Arc<dyn HierarchicalBasis1d>,
    degree: usize,
    distribution: Distribution,
    inverse_cache: Mutex<HashMap<u32, Option<Arc<Array2<f64>>>>>,
}

impl HierarchicalFundamentalTransformed {
    pub fn new(
        underlying: Arc<dyn HierarchicalBasis1d>,
        degree: usize,
        distribution: Distribution,
    ) -> Self {
        Self {
            underlying,
            degree,
            distribution,
            inverse_cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Columns of the cached inverse are the transform coefficient vectors;
    /// `None` marks a level whose collocation system is singular.
    fn level_inverse(&self, level: u32) -> Option<Arc<Array2<f64>>> {
        let mut cache = self
            .inverse_cache
            .lock()
            .expect("transform inverse cache lock should not be poisoned");
        cache
            .entry(level)
            .or_insert_with(|| {
                let nodes = level_nodes(level, self.distribution);
                let n = nodes.len();
                let mut collocation = Array2::<f64>::zeros((n, n));
                for (j, &x) in nodes.iter().enumerate() {
                    for k in 0..n {
                        collocation[[j, k]] =
                            nodal_eval(self.underlying.as_ref(), level, k as i64, x);
                    }
                }
                let identity = Array2::<f64>::eye(n);
                solve_dense(&collocation, &identity).ok().map(Arc::new)
            })
            .clone()
    }

    pub fn coefficients(&self, level: u32, index: i64) -> CoefficientSolve {
        match self.level_inverse(level) {
            Some(inverse) => CoefficientSolve::Solved {
                start: 0,
                coefficients: inverse.column(index as usize).to_vec(),
            },
            None => CoefficientSolve::Singular,
        }
    }
}

impl HierarchicalBasis1d for HierarchicalFundamentalTransformed {
    fn evaluate(&self, level: u32, index: i64, x: f64) -> f64 {
        match self.coefficients(level, index) {
            CoefficientSolve::Solved {
                start,
                coefficients,
            } => coefficients
                .iter()
                .enumerate()
                .map(|(k, &c)| c * nodal_eval(self.underlying.as_ref(), level, start + k as i64, x))
                .sum(),
            CoefficientSolve::Singular => {
                lagrange_fallback(level, index, self.distribution, x)
            }
        }
    }

    fn support(&self, _level: u32, _index: i64) -> (f64, f64) {
        // The combination couples every nodal function of the level.
        (0.0, 1.0)
    }
}

// ============================================================================
// Windowed nodal transforms
// ============================================================================

fn window_for(
    index: i64,
    half_width: i64,
    h_inv: i64,
    degree: usize,
    not_a_knot: bool,
) -> (i64, i64) {
    let mut lo = (index - half_width).max(0);
    let mut hi = (index + half_width).min(h_inv);
    // Degree-3 not-a-knot splines next to the removed knots do not vanish at
    // the boundary as the symmetric window assumes; widen the window by one
    // function toward that boundary for i = 3 and its mirror image.
    if not_a_knot && degree == 3 {
        if index == 3 {
            lo = (lo - 1).max(0);
        }
        if index == h_inv - 3 {
            hi = (hi + 1).min(h_inv);
        }
    }
    (lo, hi)
}

fn windowed_coefficients(
    underlying: &dyn HierarchicalBasis1d,
    distribution: Distribution,
    level: u32,
    index: i64,
    lo: i64,
    hi: i64,
) -> CoefficientSolve {
    let size = (hi - lo + 1) as usize;
    let mut collocation = Array2::<f64>::zeros((size, size));
    for j in 0..size {
        let x = coordinate(level, lo + j as i64, distribution);
        for k in 0..size {
            collocation[[j, k]] = nodal_eval(underlying, level, lo + k as i64, x);
        }
    }
    let mut rhs = Array1::<f64>::zeros(size);
    rhs[(index - lo) as usize] = 1.0;
    match solve_dense_vec(&collocation, &rhs) {
        Ok(coefficients) => CoefficientSolve::Solved {
            start: lo,
            coefficients: coefficients.to_vec(),
        },
        Err(_) => CoefficientSolve::Singular,
    }
}

fn evaluate_windowed(
    underlying: &dyn HierarchicalBasis1d,
    distribution: Distribution,
    level: u32,
    index: i64,
    x: f64,
    solve: &CoefficientSolve,
) -> f64 {
    match solve {
        CoefficientSolve::Solved {
            start,
            coefficients,
        } => coefficients
            .iter()
            .enumerate()
            .map(|(k, &c)| c * nodal_eval(underlying, level, start + k as i64, x))
            .sum(),
        CoefficientSolve::Singular => lagrange_fallback(level, index, distribution, x),
    }
}

/// Locally interpolating transform: combines the underlying nodal functions
/// within a window of half-width p around the index, enforcing the Kronecker
/// delta at the window's nodes.
pub struct NodalFundamentalTransformed {
    underlying: Arc<dyn HierarchicalBasis1d>,
    degree: usize,
    distribution: Distribution,
    not_a_knot: bool,
}

impl NodalFundamentalTransformed {
    pub fn new(
        underlying: Arc<dyn HierarchicalBasis1d>,
        degree: usize,
        distribution: Distribution,
        not_a_knot: bool,
    ) -> Self {
        Self {
            underlying,
            degree,
            distribution,
            not_a_knot,
        }
    }

    pub fn coefficients(&self, level: u32, index: i64) -> CoefficientSolve {
        let h_inv = 1i64 << level;
        let (lo, hi) = window_for(
            index,
            self.degree as i64,
            h_inv,
            self.degree,
            self.not_a_knot,
        );
        windowed_coefficients(
            self.underlying.as_ref(),
            self.distribution,
            level,
            index,
            lo,
            hi,
        )
    }
}

impl HierarchicalBasis1d for NodalFundamentalTransformed {
    fn evaluate(&self, level: u32, index: i64, x: f64) -> f64 {
        let solve = self.coefficients(level, index);
        evaluate_windowed(
            self.underlying.as_ref(),
            self.distribution,
            level,
            index,
            x,
            &solve,
        )
    }

    fn support(&self, level: u32, index: i64) -> (f64, f64) {
        let h_inv = 1i64 << level;
        let (lo, hi) = window_for(
            index,
            self.degree as i64,
            h_inv,
            self.degree,
            self.not_a_knot,
        );
        let (lower, _) = self.underlying.support(level, lo);
        let (_, upper) = self.underlying.support(level, hi);
        (lower, upper)
    }
}

/// Weakly fundamental transform: the window only spans the (p-1)/2 nearest
/// neighbors on each side, so the result is 1 at its own node and 0 at the
/// p-1 nearest other nodes (not at every node of the level).
pub struct NodalWeaklyFundamentalTransformed {
    underlying: Arc<dyn HierarchicalBasis1d>,
    degree: usize,
    distribution: Distribution,
    not_a_knot: bool,
}

impl NodalWeaklyFundamentalTransformed {
    pub fn new(
        underlying: Arc<dyn HierarchicalBasis1d>,
        degree: usize,
        distribution: Distribution,
        not_a_knot: bool,
    ) -> Self {
        Self {
            underlying,
            degree,
            distribution,
            not_a_knot,
        }
    }

    pub fn coefficients(&self, level: u32, index: i64) -> CoefficientSolve {
        let h_inv = 1i64 << level;
        let half_width = (self.degree as i64 - 1) / 2;
        let (lo, hi) = window_for(index, half_width, h_inv, self.degree, self.not_a_knot);
        windowed_coefficients(
            self.underlying.as_ref(),
            self.distribution,
            level,
            index,
            lo,
            hi,
        )
    }
}

impl HierarchicalBasis1d for NodalWeaklyFundamentalTransformed {
    fn evaluate(&self, level: u32, index: i64, x: f64) -> f64 {
        let solve = self.coefficients(level, index);
        evaluate_windowed(
            self.underlying.as_ref(),
            self.distribution,
            level,
            index,
            x,
            &solve,
        )
    }

    fn support(&self, level: u32, index: i64) -> (f64, f64) {
        let h_inv = 1i64 << level;
        let half_width = (self.degree as i64 - 1) / 2;
        let (lo, hi) = window_for(index, half_width, h_inv, self.degree, self.not_a_knot);
        let (lower, _) = self.underlying.support(level, lo);
        let (_, upper) = self.underlying.support(level, hi);
        (lower, upper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basis::{BasisKind, HierarchicalNotAKnotBSpline, create_basis};
    use approx::assert_abs_diff_eq;

    fn not_a_knot_cubic() -> Arc<dyn HierarchicalBasis1d> {
        Arc::new(HierarchicalNotAKnotBSpline::new(3, 0).unwrap())
    }

    #[test]
    fn exact_transform_is_kronecker_on_its_level() {
        let transform =
            HierarchicalFundamentalTransformed::new(not_a_knot_cubic(), 3, Distribution::Uniform);
        let level = 3u32;
        for i in [1i64, 3, 5, 7] {
            for j in 0..=8i64 {
                let x = j as f64 / 8.0;
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(transform.evaluate(level, i, x), expected, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn exact_transform_vanishes_at_coarser_nodes() {
        // Coarser-level nodes are nodes of the fine level too, so the
        // transformed functions are hierarchically interpolatory.
        let transform =
            HierarchicalFundamentalTransformed::new(not_a_knot_cubic(), 3, Distribution::Uniform);
        for j in 0..=4i64 {
            let x = j as f64 / 4.0;
            assert_abs_diff_eq!(transform.evaluate(3, 5, x), 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn weakly_transform_zeroes_nearest_neighbors() {
        let underlying = create_basis(&BasisKind::BSpline { degree: 5, nu: 0 }).unwrap();
        let transform =
            NodalWeaklyFundamentalTransformed::new(underlying, 5, Distribution::Uniform, false);
        let level = 4u32;
        let i = 7i64;
        assert_abs_diff_eq!(
            transform.evaluate(level, i, i as f64 / 16.0),
            1.0,
            epsilon = 1e-9
        );
        for j in [5i64, 6, 8, 9] {
            assert_abs_diff_eq!(
                transform.evaluate(level, i, j as f64 / 16.0),
                0.0,
                epsilon = 1e-9
            );
        }
    }

    #[test]
    fn degree_three_not_a_knot_window_is_widened() {
        let underlying = not_a_knot_cubic();
        let patched = NodalWeaklyFundamentalTransformed::new(
            underlying.clone(),
            3,
            Distribution::Uniform,
            true,
        );
        let plain =
            NodalWeaklyFundamentalTransformed::new(underlying, 3, Distribution::Uniform, false);

        let level = 4u32;
        match patched.coefficients(level, 3) {
            CoefficientSolve::Solved { start, .. } => assert_eq!(start, 1),
            CoefficientSolve::Singular => panic!("patched window solve should succeed"),
        }
        match plain.coefficients(level, 3) {
            CoefficientSolve::Solved { start, .. } => assert_eq!(start, 2),
            CoefficientSolve::Singular => panic!("plain window solve should succeed"),
        }
        // The mirrored index is widened on the right.
        match patched.coefficients(level, 13) {
            CoefficientSolve::Solved {
                start,
                coefficients,
            } => assert_eq!(start + coefficients.len() as i64 - 1, 15),
            CoefficientSolve::Singular => panic!("mirrored window solve should succeed"),
        }
    }

    struct DegenerateBasis;

    impl HierarchicalBasis1d for DegenerateBasis {
        fn evaluate(&self, _level: u32, _index: i64, _x: f64) -> f64 {
            0.0
        }

        fn support(&self, _level: u32, _index: i64) -> (f64, f64) {
            (0.0, 1.0)
        }
    }

    #[test]
    fn singular_solve_falls_back_to_lagrange() {
        let transform = NodalWeaklyFundamentalTransformed::new(
            Arc::new(DegenerateBasis),
            3,
            Distribution::Uniform,
            false,
        );
        assert!(matches!(
            transform.coefficients(2, 1),
            CoefficientSolve::Singular
        ));
        // The fallback is the Lagrange polynomial of the level's nodal
        // points: 1 at the own node, 0 at the others.
        assert_abs_diff_eq!(transform.evaluate(2, 1, 0.25), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(transform.evaluate(2, 1, 0.5), 0.0, epsilon = 1e-12);
    }
}
