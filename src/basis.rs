use crate::error::{Result, SplineError};
use crate::knot::KnotVector;

/// Values of the `degree + 1` basis functions that can be non-zero at a point.
/// Entry `i` of `values` belongs to basis function `first + i`.
#[derive(Debug, Clone, PartialEq)]
pub struct BasisValues {
    pub first: usize,
    pub values: Vec<f64>,
}

impl BasisValues {
    /// Pairs of (basis function index, value).
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.values.iter().enumerate().map(move |(i, v)| (self.first + i, *v))
    }

    pub fn get(&self, index: usize) -> f64 {
        index
            .checked_sub(self.first)
            .and_then(|i| self.values.get(i))
            .copied()
            .unwrap_or(0.0)
    }
}

/// Univariate B-spline basis over one knot vector, evaluated with the Cox-de Boor recursion.
#[derive(Debug, Clone, PartialEq)]
pub struct BasisFunction {
    knots: KnotVector,
}

impl BasisFunction {
    pub fn new(knots: KnotVector) -> Self {
        BasisFunction { knots }
    }

    pub fn knot_vector(&self) -> &KnotVector {
        &self.knots
    }

    pub fn degree(&self) -> usize {
        self.knots.degree()
    }

    pub fn num_basis_functions(&self) -> usize {
        self.knots.num_basis_functions()
    }

    /// Evaluates the non-zero basis functions at `x`.
    /// # Example
    /// ```
    /// use tensor_spline::{BasisFunction, KnotVector};
    /// use assert_approx_eq::assert_approx_eq;
    ///
    /// let knots = KnotVector::new(vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0], 2).unwrap();
    /// let basis = BasisFunction::new(knots).evaluate(0.5).unwrap();
    ///
    /// assert_eq!(0, basis.first);
    /// assert_approx_eq!(0.25, basis.values[0], 1e-12);
    /// assert_approx_eq!(0.5, basis.values[1], 1e-12);
    /// assert_approx_eq!(0.25, basis.values[2], 1e-12);
    /// ```
    /// # Errors
    /// [SplineError::OutOfDomain] when `x` lies outside of the clamped knots, there is no
    /// extrapolation.
    pub fn evaluate(&self, x: f64) -> Result<BasisValues> {
        let span = self.find_span(x)?;
        Ok(BasisValues {
            first: span - self.degree(),
            values: self.cox_de_boor(span, x),
        })
    }

    /// Evaluates derivative `order` of the non-zero basis functions at `x`.
    /// Derivatives of order higher than the degree are identically zero.
    pub fn evaluate_derivative(&self, x: f64, order: usize) -> Result<BasisValues> {
        let mut derivatives = self.evaluate_derivatives(x, order.min(self.degree()))?;
        if order > self.degree() {
            let first = derivatives[0].first;
            return Ok(BasisValues {
                first,
                values: vec![0.0; self.degree() + 1],
            });
        }
        Ok(derivatives.swap_remove(order))
    }

    /// Evaluates all derivatives from order 0 up to `max_order` at `x`, entry `k` holding
    /// order `k`.
    pub fn evaluate_derivatives(&self, x: f64, max_order: usize) -> Result<Vec<BasisValues>> {
        let span = self.find_span(x)?;
        let first = span - self.degree();
        Ok(self
            .derivative_table(span, x, max_order)
            .into_iter()
            .map(|values| BasisValues { first, values })
            .collect())
    }

    /// Finds the knot span `i` with `knots[i] <= x < knots[i + 1]` by bisection.
    /// The upper domain bound belongs to the last non-empty span.
    fn find_span(&self, x: f64) -> Result<usize> {
        let knots = self.knots.knots();
        if !self.knots.is_in_range(x) {
            return Err(SplineError::OutOfDomain {
                dim: 0,
                value: x,
                lower: self.knots.lower_bound(),
                upper: self.knots.upper_bound(),
            });
        }

        let n = self.num_basis_functions();
        if x >= knots[n] {
            let mut span = n - 1;
            while knots[span] == knots[n] {
                span -= 1;
            }
            return Ok(span);
        }

        let mut min = self.degree();
        let mut max = n;
        while max - min > 1 {
            let mid = (min + max) / 2;
            if x < knots[mid] {
                max = mid;
            } else {
                min = mid;
            }
        }
        Ok(min)
    }

    /// Bottom-up table fill over degrees 0..=p, reusing the lower degree row.
    fn cox_de_boor(&self, span: usize, x: f64) -> Vec<f64> {
        let p = self.degree();
        let knots = self.knots.knots();
        let mut n = vec![0.0; p + 1];
        let mut left = vec![0.0; p + 1];
        let mut right = vec![0.0; p + 1];

        n[0] = 1.0;
        for d in 1..=p {
            left[d] = x - knots[span + 1 - d];
            right[d] = knots[span + d] - x;

            let mut saved = 0.0;
            for r in 0..d {
                let temp = ratio(n[r], right[r + 1] + left[d - r]);
                n[r] = saved + right[r + 1] * temp;
                saved = left[d - r] * temp;
            }
            n[d] = saved;
        }
        n
    }

    /// Derivatives of the non-zero basis functions, built from the triangular table of lower
    /// degree basis values and knot differences (The NURBS Book, A2.3).
    fn derivative_table(&self, span: usize, x: f64, max_order: usize) -> Vec<Vec<f64>> {
        let p = self.degree();
        let knots = self.knots.knots();
        let max_order = max_order.min(p);

        // ndu[j][r] for r <= j: degree j basis values, below the diagonal: knot differences
        let mut ndu = vec![vec![0.0; p + 1]; p + 1];
        let mut left = vec![0.0; p + 1];
        let mut right = vec![0.0; p + 1];
        ndu[0][0] = 1.0;
        for j in 1..=p {
            left[j] = x - knots[span + 1 - j];
            right[j] = knots[span + j] - x;
            let mut saved = 0.0;
            for r in 0..j {
                ndu[j][r] = right[r + 1] + left[j - r];
                let temp = ratio(ndu[r][j - 1], ndu[j][r]);
                ndu[r][j] = saved + right[r + 1] * temp;
                saved = left[j - r] * temp;
            }
            ndu[j][j] = saved;
        }

        let mut ders = vec![vec![0.0; p + 1]; max_order + 1];
        for j in 0..=p {
            ders[0][j] = ndu[j][p];
        }

        let mut a = vec![vec![0.0; p + 1]; 2];
        for r in 0..=p {
            let (mut s1, mut s2) = (0, 1);
            a[0][0] = 1.0;
            for k in 1..=max_order {
                let mut d = 0.0;
                let pk = p - k;
                if r >= k {
                    let rk = r - k;
                    a[s2][0] = ratio(a[s1][0], ndu[pk + 1][rk]);
                    d = a[s2][0] * ndu[rk][pk];
                }
                let j1 = if r + 1 >= k { 1 } else { k - r };
                let j2 = if r <= pk + 1 { k - 1 } else { p - r };
                for j in j1..=j2 {
                    // r + j >= k holds for j >= j1
                    let rkj = r + j - k;
                    a[s2][j] = ratio(a[s1][j] - a[s1][j - 1], ndu[pk + 1][rkj]);
                    d += a[s2][j] * ndu[rkj][pk];
                }
                if r <= pk {
                    a[s2][k] = ratio(-a[s1][k - 1], ndu[pk + 1][r]);
                    d += a[s2][k] * ndu[r][pk];
                }
                ders[k][r] = d;
                std::mem::swap(&mut s1, &mut s2);
            }
        }

        let mut factor = p as f64;
        for (k, row) in ders.iter_mut().enumerate().skip(1) {
            for value in row.iter_mut() {
                *value *= factor;
            }
            factor *= (p - k) as f64;
        }
        ders
    }
}

/// Division with the B-spline convention 0/0 = 0 for empty knot spans.
fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}
