use crate::basis::BasisError;
use crate::linalg::solve_dense_vec;
use ndarray::{Array1, Array2};

/// Absolute tolerance governing truncation of the fundamental-spline
/// coefficient series. Chosen once and used consistently; coefficients below
/// it are silently dropped, which is an accepted approximation rather than an
/// error condition.
pub const COEFFICIENT_TOLERANCE: f64 = 1e-10;

const KNOT_DENOM_TOL: f64 = 1e-12;

/// Evaluates a single degree-`p` B-spline over the local knot sequence
/// `knots` (length p+2) at `x`.
///
/// Local Cox-de Boor triangle over the p+1 knot spans of the support: start
/// with the degree-0 indicator row and combine upward. The function is the
/// unique degree-p piecewise polynomial matching the B-spline recursion on
/// [knots[0], knots[p+1]) and exactly zero outside.
pub(crate) fn bspline_value(knots: &[f64], degree: usize, x: f64) -> f64 {
    debug_assert_eq!(knots.len(), degree + 2);
    if x < knots[0] || x >= knots[degree + 1] {
        return 0.0;
    }

    let mut triangle = vec![0.0f64; degree + 1];
    for (j, value) in triangle.iter_mut().enumerate() {
        if x >= knots[j] && x < knots[j + 1] {
            *value = 1.0;
        }
    }

    for d in 1..=degree {
        for j in 0..=(degree - d) {
            let den_left = knots[j + d] - knots[j];
            let den_right = knots[j + d + 1] - knots[j + 1];
            let left = if den_left.abs() > KNOT_DENOM_TOL {
                (x - knots[j]) / den_left * triangle[j]
            } else {
                0.0
            };
            let right = if den_right.abs() > KNOT_DENOM_TOL {
                (knots[j + d + 1] - x) / den_right * triangle[j + 1]
            } else {
                0.0
            };
            triangle[j] = left + right;
        }
    }

    triangle[0]
}

/// `nu`-th derivative of the same B-spline, via the derivative recursion
/// B'_{p}(x) = p (B_{p-1,left}/(t_p - t_0) - B_{p-1,right}/(t_{p+1} - t_1))
/// applied `nu` times.
pub(crate) fn bspline_derivative(knots: &[f64], degree: usize, x: f64, nu: usize) -> f64 {
    if nu == 0 {
        return bspline_value(knots, degree, x);
    }
    if degree == 0 {
        return 0.0;
    }

    let den_left = knots[degree] - knots[0];
    let den_right = knots[degree + 1] - knots[1];
    let left = if den_left.abs() > KNOT_DENOM_TOL {
        bspline_derivative(&knots[..degree + 1], degree - 1, x, nu - 1) / den_left
    } else {
        0.0
    };
    let right = if den_right.abs() > KNOT_DENOM_TOL {
        bspline_derivative(&knots[1..], degree - 1, x, nu - 1) / den_right
    } else {
        0.0
    };
    degree as f64 * (left - right)
}

/// Degree-p cardinal B-spline on the uniform knots {0, 1, ..., p+1}.
#[derive(Clone, Debug)]
pub struct CardinalBSpline {
    degree: usize,
    knots: Vec<f64>,
}

impl CardinalBSpline {
    pub fn new(degree: usize) -> Self {
        let knots = (0..=degree + 1).map(|k| k as f64).collect();
        Self { degree, knots }
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Support is [0, p+1).
    pub fn support(&self) -> (f64, f64) {
        (0.0, (self.degree + 1) as f64)
    }

    pub fn evaluate(&self, x: f64) -> f64 {
        bspline_value(&self.knots, self.degree, x)
    }

    pub fn evaluate_derivative(&self, x: f64, nu: usize) -> f64 {
        bspline_derivative(&self.knots, self.degree, x, nu)
    }
}

/// Cardinal B-spline re-centered at 0: nonzero on (-(p+1)/2, (p+1)/2).
#[derive(Clone, Debug)]
pub struct CentralizedCardinalBSpline {
    inner: CardinalBSpline,
    shift: f64,
}

impl CentralizedCardinalBSpline {
    pub fn new(degree: usize) -> Self {
        Self {
            inner: CardinalBSpline::new(degree),
            shift: (degree + 1) as f64 / 2.0,
        }
    }

    pub fn degree(&self) -> usize {
        self.inner.degree()
    }

    pub fn support(&self) -> (f64, f64) {
        (-self.shift, self.shift)
    }

    pub fn evaluate(&self, x: f64) -> f64 {
        self.inner.evaluate(x + self.shift)
    }

    pub fn evaluate_derivative(&self, x: f64, nu: usize) -> f64 {
        self.inner.evaluate_derivative(x + self.shift, nu)
    }
}

/// A single B-spline of degree p over an explicit non-uniform knot sequence
/// of length p+2.
#[derive(Clone, Debug)]
pub struct NonUniformBSpline {
    degree: usize,
    knots: Vec<f64>,
}

impl NonUniformBSpline {
    pub fn new(degree: usize, knots: Vec<f64>) -> Result<Self, BasisError> {
        if knots.len() != degree + 2 {
            return Err(BasisError::InvalidKnotVector(format!(
                "degree-{degree} B-spline needs {} knots, got {}",
                degree + 2,
                knots.len()
            )));
        }
        if knots.iter().any(|k| !k.is_finite()) {
            return Err(BasisError::InvalidKnotVector(
                "knot vector contains non-finite values".to_string(),
            ));
        }
        if knots.windows(2).any(|w| w[0] > w[1]) {
            return Err(BasisError::InvalidKnotVector(
                "knot vector is not non-decreasing".to_string(),
            ));
        }
        Ok(Self { degree, knots })
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn support(&self) -> (f64, f64) {
        (self.knots[0], self.knots[self.degree + 1])
    }

    pub fn evaluate(&self, x: f64) -> f64 {
        bspline_value(&self.knots, self.degree, x)
    }

    pub fn evaluate_derivative(&self, x: f64, nu: usize) -> f64 {
        bspline_derivative(&self.knots, self.degree, x, nu)
    }
}

/// Magnitude of the largest root of the polynomial with coefficients `poly`
/// (ascending powers).
///
/// The Euler-Frobenius sample polynomials handled here have simple real
/// negative roots, so q(-t) has only real positive roots and Newton started
/// to the right of the Cauchy bound converges monotonically to the largest
/// one.
fn dominant_decay_rate(poly: &[f64]) -> f64 {
    let n = poly.len() - 1;
    debug_assert!(n >= 1);
    let lead = poly[n];

    // Coefficients of s(t) = q(-t), ascending.
    let flipped: Vec<f64> = poly
        .iter()
        .enumerate()
        .map(|(k, &c)| if k % 2 == 0 { c } else { -c })
        .collect();

    let cauchy_bound = 1.0
        + poly
            .iter()
            .take(n)
            .fold(0.0f64, |acc, &c| acc.max((c / lead).abs()));
    let mut root = cauchy_bound;
    for _ in 0..200 {
        let mut value = 0.0;
        let mut slope = 0.0;
        for &c in flipped.iter().rev() {
            slope = slope * root + value;
            value = value * root + c;
        }
        if slope.abs() < 1e-300 {
            break;
        }
        let step = value / slope;
        root -= step;
        if step.abs() <= 1e-15 * root.abs() {
            break;
        }
    }
    root
}

/// Degree-p cardinal interpolation fundamental spline: the bi-infinite
/// combination of centered cardinal B-splines that is 1 at 0 and 0 at every
/// other integer. Coefficients decay like gamma^(-|k|); the series is
/// truncated once they fall below [`COEFFICIENT_TOLERANCE`].
#[derive(Clone, Debug)]
pub struct FundamentalSpline {
    parent: CentralizedCardinalBSpline,
    /// Symmetric coefficient window c[-K..=K], stored with offset K.
    coefficients: Vec<f64>,
    cutoff: usize,
    gamma: f64,
}

impl FundamentalSpline {
    pub fn new(degree: usize) -> Result<Self, BasisError> {
        if degree % 2 == 0 {
            return Err(BasisError::InvalidDegree(degree));
        }
        let parent = CentralizedCardinalBSpline::new(degree);

        // Degree 1 is the hat function, already fundamental; the closed form
        // (single unit coefficient, decay rate e) is preserved exactly.
        if degree == 1 {
            return Ok(Self {
                parent,
                coefficients: vec![1.0],
                cutoff: 1,
                gamma: std::f64::consts::E,
            });
        }

        let m = (degree - 1) / 2;
        let samples: Vec<f64> = (-(m as i64)..=m as i64)
            .map(|k| parent.evaluate(k as f64))
            .collect();

        let gamma = dominant_decay_rate(&samples);

        // Provisional half-width from the decay estimate, with a margin so
        // the re-truncation below decides the final window.
        let half = (-(COEFFICIENT_TOLERANCE.ln()) / gamma.ln()).ceil() as usize + degree + 1;
        let size = 2 * half + 1;
        let mut toeplitz = Array2::<f64>::zeros((size, size));
        for j in 0..size {
            for k in 0..size {
                let offset = j as i64 - k as i64;
                if offset.unsigned_abs() as usize <= m {
                    toeplitz[[j, k]] = samples[(offset + m as i64) as usize];
                }
            }
        }
        let mut rhs = Array1::<f64>::zeros(size);
        rhs[half] = 1.0;
        let solved = solve_dense_vec(&toeplitz, &rhs)
            .map_err(|_| BasisError::DegenerateFundamentalSystem(degree))?;

        // Re-truncate to the smallest symmetric window with everything
        // outside below tolerance.
        let mut keep = 0usize;
        for k in 0..=half {
            if solved[half - k].abs() >= COEFFICIENT_TOLERANCE
                || solved[half + k].abs() >= COEFFICIENT_TOLERANCE
            {
                keep = k;
            }
        }
        let coefficients: Vec<f64> = (half - keep..=half + keep).map(|j| solved[j]).collect();

        Ok(Self {
            parent,
            coefficients,
            cutoff: keep + 1,
            gamma,
        })
    }

    pub fn degree(&self) -> usize {
        self.parent.degree()
    }

    /// Decay rate gamma > 1 with |c_k| ~ gamma^(-|k|) (e for degree 1 by
    /// convention).
    pub fn decay_rate(&self) -> f64 {
        self.gamma
    }

    /// Half-width of the retained coefficient window plus one; coefficients
    /// with |k| >= cutoff are below tolerance and dropped.
    pub fn cutoff(&self) -> usize {
        self.cutoff
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// Formally the support is the whole real line; this is the numerically
    /// significant part.
    pub fn significant_support(&self) -> (f64, f64) {
        let reach = (self.cutoff - 1) as f64 + (self.degree() + 1) as f64 / 2.0;
        (-reach, reach)
    }

    pub fn evaluate(&self, x: f64) -> f64 {
        self.evaluate_derivative(x, 0)
    }

    pub fn evaluate_derivative(&self, x: f64, nu: usize) -> f64 {
        let half = (self.coefficients.len() - 1) / 2;
        let mut sum = 0.0;
        for (idx, &c) in self.coefficients.iter().enumerate() {
            let k = idx as i64 - half as i64;
            sum += c * self.parent.evaluate_derivative(x - k as f64, nu);
        }
        sum
    }
}

/// Finite-support analogue of [`FundamentalSpline`]: a combination of the p
/// nearest centered cardinal B-splines that is exactly 1 at 0 and 0 at the
/// p-1 nearest other integers. Not a true bi-infinite fundamental function,
/// hence "weakly".
#[derive(Clone, Debug)]
pub struct WeaklyFundamentalSpline {
    parent: CentralizedCardinalBSpline,
    coefficients: Vec<f64>,
}

impl WeaklyFundamentalSpline {
    pub fn new(degree: usize) -> Result<Self, BasisError> {
        if degree % 2 == 0 {
            return Err(BasisError::InvalidDegree(degree));
        }
        let parent = CentralizedCardinalBSpline::new(degree);
        let m = (degree - 1) / 2;
        let size = 2 * m + 1;

        let mut system = Array2::<f64>::zeros((size, size));
        for j in 0..size {
            for k in 0..size {
                system[[j, k]] = parent.evaluate((j as i64 - k as i64) as f64);
            }
        }
        let mut rhs = Array1::<f64>::zeros(size);
        rhs[m] = 1.0;
        let coefficients = solve_dense_vec(&system, &rhs)
            .map_err(|_| BasisError::DegenerateFundamentalSystem(degree))?
            .to_vec();

        Ok(Self {
            parent,
            coefficients,
        })
    }

    pub fn degree(&self) -> usize {
        self.parent.degree()
    }

    pub fn support(&self) -> (f64, f64) {
        let m = (self.degree() - 1) / 2;
        let reach = m as f64 + (self.degree() + 1) as f64 / 2.0;
        (-reach, reach)
    }

    pub fn evaluate(&self, x: f64) -> f64 {
        self.evaluate_derivative(x, 0)
    }

    pub fn evaluate_derivative(&self, x: f64, nu: usize) -> f64 {
        let m = (self.degree() - 1) / 2;
        let mut sum = 0.0;
        for (idx, &c) in self.coefficients.iter().enumerate() {
            let k = idx as i64 - m as i64;
            sum += c * self.parent.evaluate_derivative(x - k as f64, nu);
        }
        sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn cardinal_bspline_partition_of_unity() {
        for degree in [1usize, 3, 5, 7] {
            let spline = CardinalBSpline::new(degree);
            for step in 0..40 {
                let x = 0.05 + step as f64 * 0.1;
                let shift_range = degree as i64 + 2;
                let sum: f64 = (-shift_range..=shift_range)
                    .map(|k| spline.evaluate(x - k as f64))
                    .sum();
                assert_abs_diff_eq!(sum, 1.0, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn cardinal_bspline_symmetry_and_support() {
        for degree in [1usize, 3, 5] {
            let spline = CardinalBSpline::new(degree);
            let width = (degree + 1) as f64;
            for step in 1..20 {
                let x = step as f64 * width / 20.0;
                assert_abs_diff_eq!(spline.evaluate(x), spline.evaluate(width - x), epsilon = 1e-12);
            }
            assert_eq!(spline.evaluate(-0.5), 0.0);
            assert_eq!(spline.evaluate(width + 0.5), 0.0);
        }
    }

    #[test]
    fn centralized_cardinal_known_integer_samples() {
        // Degree 3: samples 1/6, 4/6, 1/6 at -1, 0, 1.
        let spline = CentralizedCardinalBSpline::new(3);
        assert_abs_diff_eq!(spline.evaluate(-1.0), 1.0 / 6.0, epsilon = 1e-12);
        assert_abs_diff_eq!(spline.evaluate(0.0), 4.0 / 6.0, epsilon = 1e-12);
        assert_abs_diff_eq!(spline.evaluate(1.0), 1.0 / 6.0, epsilon = 1e-12);
    }

    #[test]
    fn nonuniform_bspline_matches_cardinal_on_uniform_knots() {
        let degree = 3;
        let cardinal = CardinalBSpline::new(degree);
        let knots: Vec<f64> = (0..=degree + 1).map(|k| k as f64).collect();
        let spline = NonUniformBSpline::new(degree, knots).unwrap();
        for step in 0..50 {
            let x = step as f64 * (degree + 1) as f64 / 49.0;
            assert_abs_diff_eq!(spline.evaluate(x), cardinal.evaluate(x), epsilon = 1e-12);
        }
    }

    #[test]
    fn nonuniform_bspline_rejects_bad_knots() {
        assert!(NonUniformBSpline::new(3, vec![0.0, 1.0, 2.0]).is_err());
        assert!(NonUniformBSpline::new(1, vec![0.0, 2.0, 1.0]).is_err());
        assert!(NonUniformBSpline::new(1, vec![0.0, f64::NAN, 1.0]).is_err());
    }

    #[test]
    fn bspline_derivative_matches_finite_differences() {
        let degree = 5;
        let spline = CardinalBSpline::new(degree);
        let h = 1e-6;
        for step in 1..30 {
            let x = step as f64 * (degree + 1) as f64 / 30.0;
            let fd = (spline.evaluate(x + h) - spline.evaluate(x - h)) / (2.0 * h);
            assert_abs_diff_eq!(spline.evaluate_derivative(x, 1), fd, epsilon = 1e-5);
        }
    }

    #[test]
    fn fundamental_spline_degree_one_base_case() {
        let spline = FundamentalSpline::new(1).unwrap();
        assert_eq!(spline.coefficients(), &[1.0]);
        assert_eq!(spline.cutoff(), 1);
        assert_abs_diff_eq!(spline.decay_rate(), std::f64::consts::E, epsilon = 0.0);
    }

    #[test]
    fn fundamental_spline_cubic_decay_rate() {
        // For degree 3 the sample polynomial (1 + 4z + z^2)/6 has its outer
        // root at -(2 + sqrt(3)).
        let spline = FundamentalSpline::new(3).unwrap();
        assert_abs_diff_eq!(spline.decay_rate(), 2.0 + 3.0f64.sqrt(), epsilon = 1e-10);
    }

    #[test]
    fn fundamental_spline_kronecker_property() {
        for degree in [3usize, 5, 7] {
            let spline = FundamentalSpline::new(degree).unwrap();
            assert_abs_diff_eq!(spline.evaluate(0.0), 1.0, epsilon = 1e-9);
            for k in 1..(spline.cutoff() as i64).min(12) {
                assert_abs_diff_eq!(spline.evaluate(k as f64), 0.0, epsilon = 1e-9);
                assert_abs_diff_eq!(spline.evaluate(-k as f64), 0.0, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn fundamental_spline_decay_bound() {
        // For every odd degree there is a beta with
        // |phi(x)| <= beta * gamma^(-|x|), sampled densely over [-100, 100].
        for degree in (1..=15).step_by(2) {
            let spline = FundamentalSpline::new(degree).unwrap();
            let gamma = spline.decay_rate();

            // Witness beta from the near zone; the tail ratio plateaus at the
            // coefficient decay rate, so a factor of 10 bounds the transient.
            let near_reach = (degree + 1) as f64;
            let mut beta = 1.0f64;
            let mut x = -near_reach;
            while x <= near_reach {
                beta = beta.max(spline.evaluate(x).abs() * gamma.powf(x.abs()));
                x += 0.25;
            }
            beta *= 10.0;

            let mut x = -100.0f64;
            while x <= 100.0 {
                let bound = beta * gamma.powf(-x.abs());
                let value = spline.evaluate(x).abs();
                assert!(
                    value <= bound + 1e-9,
                    "decay bound violated for degree {degree} at x={x}: |phi|={value:e}, bound={bound:e}"
                );
                x += 0.25;
            }
        }
    }

    #[test]
    fn weakly_fundamental_spline_delta_conditions() {
        for degree in [1usize, 3, 5, 7] {
            let spline = WeaklyFundamentalSpline::new(degree).unwrap();
            let m = (degree - 1) / 2;
            assert_abs_diff_eq!(spline.evaluate(0.0), 1.0, epsilon = 1e-10);
            for k in 1..=m as i64 {
                assert_abs_diff_eq!(spline.evaluate(k as f64), 0.0, epsilon = 1e-10);
                assert_abs_diff_eq!(spline.evaluate(-k as f64), 0.0, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn even_degrees_are_rejected() {
        assert!(matches!(
            FundamentalSpline::new(2),
            Err(BasisError::InvalidDegree(2))
        ));
        assert!(matches!(
            WeaklyFundamentalSpline::new(4),
            Err(BasisError::InvalidDegree(4))
        ));
    }
}
