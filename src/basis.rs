use crate::fundamental::{
    HierarchicalFundamentalTransformed, NodalFundamentalTransformed,
    NodalWeaklyFundamentalTransformed,
};
use crate::grid::{Distribution, coordinate, nodal_indices};
use crate::parent::{
    CentralizedCardinalBSpline, FundamentalSpline, WeaklyFundamentalSpline, bspline_derivative,
};
use ndarray::{Array1, Array2, ArrayView1};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors of the basis layer. Configuration problems (invalid degree or
/// derivative order, malformed knot vectors) are hard errors and never
/// silently coerced.
#[derive(Error, Debug)]
pub enum BasisError {
    #[error("Spline degree must be a positive odd integer, but was {0}.")]
    InvalidDegree(usize),

    #[error("Derivative order {nu} exceeds the spline degree {degree}.")]
    UnsupportedDerivativeOrder { nu: usize, degree: usize },

    #[error("The provided knot vector is invalid: {0}.")]
    InvalidKnotVector(String),

    #[error("The fundamental-spline coefficient system for degree {0} is degenerate.")]
    DegenerateFundamentalSystem(usize),
}

fn validate_degree(degree: usize) -> Result<(), BasisError> {
    if degree == 0 || degree % 2 == 0 {
        return Err(BasisError::InvalidDegree(degree));
    }
    Ok(())
}

fn validate_degree_nu(degree: usize, nu: usize) -> Result<(), BasisError> {
    validate_degree(degree)?;
    if nu > degree {
        return Err(BasisError::UnsupportedDerivativeOrder { nu, degree });
    }
    Ok(())
}

/// A one-dimensional hierarchical basis: maps a (level, index) pair to a
/// function on the unit interval.
///
/// `evaluate` must vectorize over query points (see `evaluate_many`);
/// `support` returns an interval within [0, 1], except for true fundamental
/// splines whose formal support is the whole real line and whose numerically
/// significant part is reported instead.
pub trait HierarchicalBasis1d: Send + Sync {
    fn evaluate(&self, level: u32, index: i64, x: f64) -> f64;

    fn support(&self, level: u32, index: i64) -> (f64, f64);

    fn evaluate_many(&self, level: u32, index: i64, xx: ArrayView1<f64>) -> Array1<f64> {
        xx.mapv(|x| self.evaluate(level, index, x))
    }
}

#[inline]
fn mesh_width(level: u32) -> f64 {
    1.0 / (1u64 << level) as f64
}

#[inline]
fn derivative_scale(level: u32, nu: usize) -> f64 {
    ((1u64 << level) as f64).powi(nu as i32)
}

fn clip_unit(lower: f64, upper: f64) -> (f64, f64) {
    (lower.max(0.0), upper.min(1.0))
}

// ============================================================================
// Plain hierarchical B-splines (uniform and Clenshaw-Curtis)
// ============================================================================

/// Hierarchical B-spline on the uniform lattice: the centralized cardinal
/// B-spline dilated by 2^l and translated by i, scaled by 2^(l*nu) when the
/// nu-th derivative is requested (chain rule).
#[derive(Clone, Debug)]
pub struct HierarchicalBSpline {
    parent: CentralizedCardinalBSpline,
    degree: usize,
    nu: usize,
}

impl HierarchicalBSpline {
    pub fn new(degree: usize, nu: usize) -> Result<Self, BasisError> {
        validate_degree_nu(degree, nu)?;
        Ok(Self {
            parent: CentralizedCardinalBSpline::new(degree),
            degree,
            nu,
        })
    }

    pub fn degree(&self) -> usize {
        self.degree
    }
}

impl HierarchicalBasis1d for HierarchicalBSpline {
    fn evaluate(&self, level: u32, index: i64, x: f64) -> f64 {
        let t = x * (1u64 << level) as f64 - index as f64;
        derivative_scale(level, self.nu) * self.parent.evaluate_derivative(t, self.nu)
    }

    fn support(&self, level: u32, index: i64) -> (f64, f64) {
        let h = mesh_width(level);
        let reach = (self.degree + 1) as f64 / 2.0;
        clip_unit((index as f64 - reach) * h, (index as f64 + reach) * h)
    }
}

/// Hierarchical B-spline over Clenshaw-Curtis-distributed knots: the local
/// knot vector consists of the p+2 warped grid coordinates centered at the
/// index, extrapolated past [0, 1] by reflection where needed.
#[derive(Clone, Debug)]
pub struct HierarchicalClenshawCurtisBSpline {
    degree: usize,
    nu: usize,
}

impl HierarchicalClenshawCurtisBSpline {
    pub fn new(degree: usize, nu: usize) -> Result<Self, BasisError> {
        validate_degree_nu(degree, nu)?;
        Ok(Self { degree, nu })
    }

    fn local_knots(&self, level: u32, index: i64) -> Vec<f64> {
        // p+2 knots centered at the index: reach = (p+1)/2 on both sides.
        let reach = (self.degree as i64 + 1) / 2;
        (index - reach..=index + reach)
            .map(|i| coordinate(level, i, Distribution::ClenshawCurtis))
            .collect()
    }
}

impl HierarchicalBasis1d for HierarchicalClenshawCurtisBSpline {
    fn evaluate(&self, level: u32, index: i64, x: f64) -> f64 {
        let knots = self.local_knots(level, index);
        bspline_derivative(&knots, self.degree, x, self.nu)
    }

    fn support(&self, level: u32, index: i64) -> (f64, f64) {
        let knots = self.local_knots(level, index);
        clip_unit(knots[0], knots[self.degree + 1])
    }
}

// ============================================================================
// Boundary-modified bases
// ============================================================================

/// Truncated Marsden combination shared by the modified bases: the leftmost
/// interior function becomes sum_{k <= 1} (2 - k) * phi_{l,k}, which equals
/// the linear function 2 - 2^l x near the left boundary; the rightmost
/// function mirrors it through the reflected indices 2^l - k.
fn evaluate_modified<B: HierarchicalBasis1d>(
    inner: &B,
    degree: usize,
    nu: usize,
    level: u32,
    index: i64,
    x: f64,
) -> f64 {
    if level == 1 {
        return if nu == 0 { 1.0 } else { 0.0 };
    }
    let h_inv = 1i64 << level;
    let k_min = 1 - (degree as i64 + 1) / 2;
    if index == 1 {
        (k_min..=1)
            .map(|k| (2 - k) as f64 * inner.evaluate(level, k, x))
            .sum()
    } else if index == h_inv - 1 {
        (k_min..=1)
            .map(|k| (2 - k) as f64 * inner.evaluate(level, h_inv - k, x))
            .sum()
    } else {
        inner.evaluate(level, index, x)
    }
}

fn modified_support<B: HierarchicalBasis1d>(
    inner: &B,
    level: u32,
    index: i64,
) -> (f64, f64) {
    if level == 1 {
        return (0.0, 1.0);
    }
    let h_inv = 1i64 << level;
    if index == 1 {
        let (_, upper) = inner.support(level, 1);
        (0.0, upper)
    } else if index == h_inv - 1 {
        let (lower, _) = inner.support(level, h_inv - 1);
        (lower, 1.0)
    } else {
        inner.support(level, index)
    }
}

/// Boundary-modified hierarchical B-spline for grids without boundary
/// points: constant 1 at level 1, Marsden-truncated combinations at the
/// outermost interior indices, plain B-splines elsewhere.
#[derive(Clone, Debug)]
pub struct ModifiedHierarchicalBSpline {
    inner: HierarchicalBSpline,
    degree: usize,
    nu: usize,
}

impl ModifiedHierarchicalBSpline {
    pub fn new(degree: usize, nu: usize) -> Result<Self, BasisError> {
        Ok(Self {
            inner: HierarchicalBSpline::new(degree, nu)?,
            degree,
            nu,
        })
    }
}

impl HierarchicalBasis1d for ModifiedHierarchicalBSpline {
    fn evaluate(&self, level: u32, index: i64, x: f64) -> f64 {
        evaluate_modified(&self.inner, self.degree, self.nu, level, index, x)
    }

    fn support(&self, level: u32, index: i64) -> (f64, f64) {
        modified_support(&self.inner, level, index)
    }
}

/// Clenshaw-Curtis counterpart of [`ModifiedHierarchicalBSpline`].
#[derive(Clone, Debug)]
pub struct ModifiedHierarchicalClenshawCurtisBSpline {
    inner: HierarchicalClenshawCurtisBSpline,
    degree: usize,
    nu: usize,
}

impl ModifiedHierarchicalClenshawCurtisBSpline {
    pub fn new(degree: usize, nu: usize) -> Result<Self, BasisError> {
        Ok(Self {
            inner: HierarchicalClenshawCurtisBSpline::new(degree, nu)?,
            degree,
            nu,
        })
    }
}

impl HierarchicalBasis1d for ModifiedHierarchicalClenshawCurtisBSpline {
    fn evaluate(&self, level: u32, index: i64, x: f64) -> f64 {
        evaluate_modified(&self.inner, self.degree, self.nu, level, index, x)
    }

    fn support(&self, level: u32, index: i64) -> (f64, f64) {
        modified_support(&self.inner, level, index)
    }
}

/// Boundary-modified hierarchical fundamental spline. Because the parent is
/// exactly interpolating at the lattice points, re-solving the boundary
/// combination against Kronecker conditions at the out-of-domain nodes
/// reduces to the same linear-continuation coefficients 2 - k.
#[derive(Clone, Debug)]
pub struct ModifiedHierarchicalFundamentalSpline {
    inner: HierarchicalFundamentalSplineBasis,
    degree: usize,
    nu: usize,
}

impl ModifiedHierarchicalFundamentalSpline {
    pub fn new(degree: usize, nu: usize) -> Result<Self, BasisError> {
        Ok(Self {
            inner: HierarchicalFundamentalSplineBasis::new(degree, nu)?,
            degree,
            nu,
        })
    }
}

impl HierarchicalBasis1d for ModifiedHierarchicalFundamentalSpline {
    fn evaluate(&self, level: u32, index: i64, x: f64) -> f64 {
        evaluate_modified(&self.inner, self.degree, self.nu, level, index, x)
    }

    fn support(&self, level: u32, index: i64) -> (f64, f64) {
        modified_support(&self.inner, level, index)
    }
}

// ============================================================================
// Not-a-knot B-splines
// ============================================================================

/// Hierarchical B-spline with the classical not-a-knot end condition: the
/// (p-1)/2 interior knots nearest each boundary are removed and p
/// extrapolated knots are appended outside each end. When the level cannot
/// support the degree (2^l < p+1), the basis degenerates to the Lagrange
/// polynomials of the level's nodal points.
pub struct HierarchicalNotAKnotBSpline {
    degree: usize,
    nu: usize,
    distribution: Distribution,
    knot_cache: Mutex<HashMap<u32, Arc<Vec<f64>>>>,
}

impl HierarchicalNotAKnotBSpline {
    pub fn new(degree: usize, nu: usize) -> Result<Self, BasisError> {
        Self::with_distribution(degree, nu, Distribution::Uniform)
    }

    pub fn with_distribution(
        degree: usize,
        nu: usize,
        distribution: Distribution,
    ) -> Result<Self, BasisError> {
        validate_degree_nu(degree, nu)?;
        Ok(Self {
            degree,
            nu,
            distribution,
            knot_cache: Mutex::new(HashMap::new()),
        })
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    /// True when the level falls back to Lagrange polynomials.
    pub fn is_lagrange_level(&self, level: u32) -> bool {
        (1u64 << level) < (self.degree + 1) as u64
    }

    /// Global not-a-knot knot vector of the level: retained grid coordinates
    /// {0} u {m+1, ..., 2^l - m - 1} u {2^l} flanked by p extrapolated knots
    /// per side. Basis function k lives on knots[k..k+p+2].
    fn level_knots(&self, level: u32) -> Arc<Vec<f64>> {
        let mut cache = self
            .knot_cache
            .lock()
            .expect("not-a-knot knot cache lock should not be poisoned");
        cache
            .entry(level)
            .or_insert_with(|| {
                let h_inv = 1i64 << level;
                let m = (self.degree as i64 - 1) / 2;
                let mut knots = Vec::new();
                for i in -(self.degree as i64)..=-1 {
                    knots.push(coordinate(level, i, self.distribution));
                }
                knots.push(coordinate(level, 0, self.distribution));
                for i in m + 1..=h_inv - m - 1 {
                    knots.push(coordinate(level, i, self.distribution));
                }
                knots.push(coordinate(level, h_inv, self.distribution));
                for i in h_inv + 1..=h_inv + self.degree as i64 {
                    knots.push(coordinate(level, i, self.distribution));
                }
                Arc::new(knots)
            })
            .clone()
    }

    fn lagrange(&self, level: u32, index: i64) -> LagrangePolynomial {
        let nodes: Vec<f64> = nodal_indices(level)
            .into_iter()
            .map(|i| coordinate(level, i, self.distribution))
            .collect();
        LagrangePolynomial::from_nodes(&nodes, index as usize)
    }
}

impl HierarchicalBasis1d for HierarchicalNotAKnotBSpline {
    fn evaluate(&self, level: u32, index: i64, x: f64) -> f64 {
        if self.is_lagrange_level(level) {
            return self.lagrange(level, index).evaluate(x, self.nu);
        }
        let knots = self.level_knots(level);
        let k = index as usize;
        bspline_derivative(&knots[k..k + self.degree + 2], self.degree, x, self.nu)
    }

    fn support(&self, level: u32, index: i64) -> (f64, f64) {
        if self.is_lagrange_level(level) {
            return (0.0, 1.0);
        }
        let knots = self.level_knots(level);
        let k = index as usize;
        clip_unit(knots[k], knots[k + self.degree + 1])
    }
}

// ============================================================================
// Natural B-splines
// ============================================================================

/// Hierarchical B-spline with natural boundary conditions: derivatives of
/// orders 2 ..= (p-1)/2 + 1 vanish at both domain endpoints. Each of the
/// (p-1)/2 near-boundary basis functions blends in the one-sided B-splines
/// beyond the boundary, with coefficients from a small square system. After
/// chain-rule scaling the coefficients are level independent, so the table is
/// computed once at construction and owned by the instance.
#[derive(Clone, Debug)]
pub struct HierarchicalNaturalBSpline {
    parent: CentralizedCardinalBSpline,
    degree: usize,
    nu: usize,
    /// blend[k][j-1] is the coefficient of the j-th outside spline for the
    /// k-th inside function, k = 0 ..= (p-1)/2.
    blend: Vec<Vec<f64>>,
}

impl HierarchicalNaturalBSpline {
    pub fn new(degree: usize, nu: usize) -> Result<Self, BasisError> {
        validate_degree_nu(degree, nu)?;
        let parent = CentralizedCardinalBSpline::new(degree);
        let m = (degree - 1) / 2;

        let mut blend = Vec::with_capacity(m + 1);
        if m == 0 {
            blend.push(Vec::new());
        } else {
            // Rows are the derivative orders r = 2 ..= m+1 at the boundary,
            // columns the outside splines B_{-j}, j = 1 ..= m.
            let mut system = Array2::<f64>::zeros((m, m));
            for r in 2..=m + 1 {
                for j in 1..=m {
                    system[[r - 2, j - 1]] = parent.evaluate_derivative(j as f64, r);
                }
            }
            for k in 0..=m {
                let mut rhs = Array1::<f64>::zeros(m);
                for r in 2..=m + 1 {
                    rhs[r - 2] = -parent.evaluate_derivative(-(k as f64), r);
                }
                let coefficients = crate::linalg::solve_dense_vec(&system, &rhs)
                    .map_err(|_| BasisError::DegenerateFundamentalSystem(degree))?;
                blend.push(coefficients.to_vec());
            }
        }

        Ok(Self {
            parent,
            degree,
            nu,
            blend,
        })
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn is_lagrange_level(&self, level: u32) -> bool {
        (1u64 << level) < (self.degree + 1) as u64
    }

    fn lagrange(&self, level: u32, index: i64) -> LagrangePolynomial {
        let nodes: Vec<f64> = nodal_indices(level)
            .into_iter()
            .map(|i| coordinate(level, i, Distribution::Uniform))
            .collect();
        LagrangePolynomial::from_nodes(&nodes, index as usize)
    }
}

impl HierarchicalBasis1d for HierarchicalNaturalBSpline {
    fn evaluate(&self, level: u32, index: i64, x: f64) -> f64 {
        if self.is_lagrange_level(level) {
            return self.lagrange(level, index).evaluate(x, self.nu);
        }
        let h_inv = 1i64 << level;
        let m = (self.degree as i64 - 1) / 2;
        let t = x * h_inv as f64;

        let mut value = self.parent.evaluate_derivative(t - index as f64, self.nu);
        if index <= m {
            for (j, &c) in self.blend[index as usize].iter().enumerate() {
                value += c * self.parent.evaluate_derivative(t + (j + 1) as f64, self.nu);
            }
        }
        if h_inv - index <= m {
            for (j, &c) in self.blend[(h_inv - index) as usize].iter().enumerate() {
                value += c
                    * self
                        .parent
                        .evaluate_derivative(t - h_inv as f64 - (j + 1) as f64, self.nu);
            }
        }
        derivative_scale(level, self.nu) * value
    }

    fn support(&self, level: u32, index: i64) -> (f64, f64) {
        if self.is_lagrange_level(level) {
            return (0.0, 1.0);
        }
        let h = mesh_width(level);
        let h_inv = 1i64 << level;
        let m = (self.degree as i64 - 1) / 2;
        let reach = (self.degree + 1) as f64 / 2.0;
        let lower = if index <= m {
            0.0
        } else {
            (index as f64 - reach) * h
        };
        let upper = if h_inv - index <= m {
            1.0
        } else {
            (index as f64 + reach) * h
        };
        clip_unit(lower, upper)
    }
}

// ============================================================================
// Fundamental-spline adapters
// ============================================================================

/// Hierarchical basis built from the fundamental-spline parent function.
#[derive(Clone, Debug)]
pub struct HierarchicalFundamentalSplineBasis {
    parent: FundamentalSpline,
    nu: usize,
}

impl HierarchicalFundamentalSplineBasis {
    pub fn new(degree: usize, nu: usize) -> Result<Self, BasisError> {
        validate_degree_nu(degree, nu)?;
        Ok(Self {
            parent: FundamentalSpline::new(degree)?,
            nu,
        })
    }

    pub fn parent(&self) -> &FundamentalSpline {
        &self.parent
    }
}

impl HierarchicalBasis1d for HierarchicalFundamentalSplineBasis {
    fn evaluate(&self, level: u32, index: i64, x: f64) -> f64 {
        let t = x * (1u64 << level) as f64 - index as f64;
        derivative_scale(level, self.nu) * self.parent.evaluate_derivative(t, self.nu)
    }

    fn support(&self, level: u32, index: i64) -> (f64, f64) {
        let h = mesh_width(level);
        let (lower, upper) = self.parent.significant_support();
        clip_unit((index as f64 + lower) * h, (index as f64 + upper) * h)
    }
}

/// Hierarchical basis built from the weakly fundamental parent function.
#[derive(Clone, Debug)]
pub struct HierarchicalWeaklyFundamentalSplineBasis {
    parent: WeaklyFundamentalSpline,
    nu: usize,
}

impl HierarchicalWeaklyFundamentalSplineBasis {
    pub fn new(degree: usize, nu: usize) -> Result<Self, BasisError> {
        validate_degree_nu(degree, nu)?;
        Ok(Self {
            parent: WeaklyFundamentalSpline::new(degree)?,
            nu,
        })
    }
}

impl HierarchicalBasis1d for HierarchicalWeaklyFundamentalSplineBasis {
    fn evaluate(&self, level: u32, index: i64, x: f64) -> f64 {
        let t = x * (1u64 << level) as f64 - index as f64;
        derivative_scale(level, self.nu) * self.parent.evaluate_derivative(t, self.nu)
    }

    fn support(&self, level: u32, index: i64) -> (f64, f64) {
        let h = mesh_width(level);
        let (lower, upper) = self.parent.support();
        clip_unit((index as f64 + lower) * h, (index as f64 + upper) * h)
    }
}

// ============================================================================
// Lagrange polynomials
// ============================================================================

/// A single Lagrange basis polynomial in the monomial representation, so that
/// derivatives are exact. Intended for the low-degree fallback levels and the
/// global Lagrange basis family at coarse levels.
#[derive(Clone, Debug)]
pub struct LagrangePolynomial {
    /// Monomial coefficients, ascending powers.
    coefficients: Vec<f64>,
}

impl LagrangePolynomial {
    /// The polynomial that is 1 at `nodes[which]` and 0 at the other nodes.
    pub fn from_nodes(nodes: &[f64], which: usize) -> Self {
        let mut coefficients = vec![1.0f64];
        for (j, &node) in nodes.iter().enumerate() {
            if j == which {
                continue;
            }
            // Multiply by (x - node).
            coefficients.push(0.0);
            for idx in (1..coefficients.len()).rev() {
                coefficients[idx] = coefficients[idx - 1] - node * coefficients[idx];
            }
            coefficients[0] *= -node;
        }
        // Normalize to value 1 at the own node.
        let x0 = nodes[which];
        let value: f64 = coefficients.iter().rev().fold(0.0, |acc, &c| acc * x0 + c);
        for c in &mut coefficients {
            *c /= value;
        }
        Self { coefficients }
    }

    pub fn evaluate(&self, x: f64, nu: usize) -> f64 {
        let mut coefficients = self.coefficients.clone();
        for _ in 0..nu {
            if coefficients.len() <= 1 {
                return 0.0;
            }
            coefficients = coefficients
                .iter()
                .enumerate()
                .skip(1)
                .map(|(k, &c)| k as f64 * c)
                .collect();
        }
        coefficients.iter().rev().fold(0.0, |acc, &c| acc * x + c)
    }
}

/// Global Lagrange polynomial basis: the hierarchical pair (l, i) maps to the
/// polynomial interpolating the Kronecker delta on the nodal points of
/// level l.
#[derive(Clone, Debug)]
pub struct HierarchicalLagrangePolynomial {
    nu: usize,
    distribution: Distribution,
}

impl HierarchicalLagrangePolynomial {
    pub fn new(nu: usize) -> Self {
        Self {
            nu,
            distribution: Distribution::Uniform,
        }
    }

    pub fn with_distribution(nu: usize, distribution: Distribution) -> Self {
        Self { nu, distribution }
    }
}

impl HierarchicalBasis1d for HierarchicalLagrangePolynomial {
    fn evaluate(&self, level: u32, index: i64, x: f64) -> f64 {
        let nodes: Vec<f64> = nodal_indices(level)
            .into_iter()
            .map(|i| coordinate(level, i, self.distribution))
            .collect();
        LagrangePolynomial::from_nodes(&nodes, index as usize).evaluate(x, self.nu)
    }

    fn support(&self, _level: u32, _index: i64) -> (f64, f64) {
        (0.0, 1.0)
    }
}

// ============================================================================
// Tensor products
// ============================================================================

/// The d-fold tensor product of (possibly distinct) one-dimensional bases.
#[derive(Clone)]
pub struct TensorProductBasis {
    components: Vec<Arc<dyn HierarchicalBasis1d>>,
}

impl TensorProductBasis {
    pub fn new(components: Vec<Arc<dyn HierarchicalBasis1d>>) -> Self {
        Self { components }
    }

    /// The same 1-D basis in every dimension.
    pub fn uniform(basis: Arc<dyn HierarchicalBasis1d>, dim: usize) -> Self {
        Self {
            components: vec![basis; dim],
        }
    }

    pub fn dim(&self) -> usize {
        self.components.len()
    }

    pub fn component(&self, t: usize) -> &Arc<dyn HierarchicalBasis1d> {
        &self.components[t]
    }

    pub fn evaluate(&self, level: &[u32], index: &[i64], x: &[f64]) -> f64 {
        debug_assert_eq!(level.len(), self.components.len());
        let mut product = 1.0;
        for (t, component) in self.components.iter().enumerate() {
            product *= component.evaluate(level[t], index[t], x[t]);
            if product == 0.0 {
                return 0.0;
            }
        }
        product
    }

    /// Per-axis support intervals stacked into a 2 x d array (row 0 lower
    /// bounds, row 1 upper bounds).
    pub fn support(&self, level: &[u32], index: &[i64]) -> Array2<f64> {
        let d = self.components.len();
        let mut out = Array2::<f64>::zeros((2, d));
        for (t, component) in self.components.iter().enumerate() {
            let (lower, upper) = component.support(level[t], index[t]);
            out[[0, t]] = lower;
            out[[1, t]] = upper;
        }
        out
    }
}

// ============================================================================
// Closed basis taxonomy
// ============================================================================

/// The closed set of concrete basis kinds, each carrying its construction
/// parameters. Replaces the free-floating string dispatch of basis names.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BasisKind {
    BSpline { degree: usize, nu: usize },
    ClenshawCurtisBSpline { degree: usize, nu: usize },
    ModifiedBSpline { degree: usize, nu: usize },
    ModifiedClenshawCurtisBSpline { degree: usize, nu: usize },
    NotAKnotBSpline { degree: usize, nu: usize },
    ClenshawCurtisNotAKnotBSpline { degree: usize, nu: usize },
    NaturalBSpline { degree: usize, nu: usize },
    FundamentalSpline { degree: usize, nu: usize },
    ModifiedFundamentalSpline { degree: usize, nu: usize },
    WeaklyFundamentalSpline { degree: usize, nu: usize },
    LagrangePolynomial { nu: usize },
    FundamentalTransformed { underlying: Box<BasisKind> },
    WeaklyFundamentalTransformed { underlying: Box<BasisKind> },
}

impl BasisKind {
    pub fn degree(&self) -> usize {
        match self {
            BasisKind::BSpline { degree, .. }
            | BasisKind::ClenshawCurtisBSpline { degree, .. }
            | BasisKind::ModifiedBSpline { degree, .. }
            | BasisKind::ModifiedClenshawCurtisBSpline { degree, .. }
            | BasisKind::NotAKnotBSpline { degree, .. }
            | BasisKind::ClenshawCurtisNotAKnotBSpline { degree, .. }
            | BasisKind::NaturalBSpline { degree, .. }
            | BasisKind::FundamentalSpline { degree, .. }
            | BasisKind::ModifiedFundamentalSpline { degree, .. }
            | BasisKind::WeaklyFundamentalSpline { degree, .. } => *degree,
            BasisKind::LagrangePolynomial { .. } => 0,
            BasisKind::FundamentalTransformed { underlying }
            | BasisKind::WeaklyFundamentalTransformed { underlying } => underlying.degree(),
        }
    }

    pub fn distribution(&self) -> Distribution {
        match self {
            BasisKind::ClenshawCurtisBSpline { .. }
            | BasisKind::ModifiedClenshawCurtisBSpline { .. }
            | BasisKind::ClenshawCurtisNotAKnotBSpline { .. } => Distribution::ClenshawCurtis,
            BasisKind::FundamentalTransformed { underlying }
            | BasisKind::WeaklyFundamentalTransformed { underlying } => underlying.distribution(),
            _ => Distribution::Uniform,
        }
    }

    fn is_not_a_knot(&self) -> bool {
        matches!(
            self,
            BasisKind::NotAKnotBSpline { .. } | BasisKind::ClenshawCurtisNotAKnotBSpline { .. }
        )
    }
}

/// Constructs the basis described by `kind`; the single entry point mapping
/// the taxonomy to instances.
pub fn create_basis(kind: &BasisKind) -> Result<Arc<dyn HierarchicalBasis1d>, BasisError> {
    Ok(match kind {
        BasisKind::BSpline { degree, nu } => Arc::new(HierarchicalBSpline::new(*degree, *nu)?),
        BasisKind::ClenshawCurtisBSpline { degree, nu } => {
            Arc::new(HierarchicalClenshawCurtisBSpline::new(*degree, *nu)?)
        }
        BasisKind::ModifiedBSpline { degree, nu } => {
            Arc::new(ModifiedHierarchicalBSpline::new(*degree, *nu)?)
        }
        BasisKind::ModifiedClenshawCurtisBSpline { degree, nu } => {
            Arc::new(ModifiedHierarchicalClenshawCurtisBSpline::new(*degree, *nu)?)
        }
        BasisKind::NotAKnotBSpline { degree, nu } => {
            Arc::new(HierarchicalNotAKnotBSpline::new(*degree, *nu)?)
        }
        BasisKind::ClenshawCurtisNotAKnotBSpline { degree, nu } => {
            Arc::new(HierarchicalNotAKnotBSpline::with_distribution(
                *degree,
                *nu,
                Distribution::ClenshawCurtis,
            )?)
        }
        BasisKind::NaturalBSpline { degree, nu } => {
            Arc::new(HierarchicalNaturalBSpline::new(*degree, *nu)?)
        }
        BasisKind::FundamentalSpline { degree, nu } => {
            Arc::new(HierarchicalFundamentalSplineBasis::new(*degree, *nu)?)
        }
        BasisKind::ModifiedFundamentalSpline { degree, nu } => {
            Arc::new(ModifiedHierarchicalFundamentalSpline::new(*degree, *nu)?)
        }
        BasisKind::WeaklyFundamentalSpline { degree, nu } => {
            Arc::new(HierarchicalWeaklyFundamentalSplineBasis::new(*degree, *nu)?)
        }
        BasisKind::LagrangePolynomial { nu } => Arc::new(HierarchicalLagrangePolynomial::new(*nu)),
        BasisKind::FundamentalTransformed { underlying } => {
            let inner = create_basis(underlying)?;
            Arc::new(HierarchicalFundamentalTransformed::new(
                inner,
                underlying.degree(),
                underlying.distribution(),
            ))
        }
        BasisKind::WeaklyFundamentalTransformed { underlying } => {
            let inner = create_basis(underlying)?;
            Arc::new(NodalWeaklyFundamentalTransformed::new(
                inner,
                underlying.degree(),
                underlying.distribution(),
                underlying.is_not_a_knot(),
            ))
        }
    })
}

/// Windowed nodal transform factory, kept outside the taxonomy: a tool for
/// turning an arbitrary basis into a locally interpolating one.
pub fn create_nodal_fundamental_transformed(
    underlying: &BasisKind,
) -> Result<Arc<dyn HierarchicalBasis1d>, BasisError> {
    let inner = create_basis(underlying)?;
    Ok(Arc::new(NodalFundamentalTransformed::new(
        inner,
        underlying.degree(),
        underlying.distribution(),
        underlying.is_not_a_knot(),
    )))
}
