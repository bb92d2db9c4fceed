use nalgebra::DMatrix;
use rayon::prelude::*;

use crate::error::{ConfigurationError, Result};
use crate::knot::KnotVector;
use crate::tensor::TensorBasis;

/// Tensor-product B-spline: one knot vector and degree per input dimension and one row of
/// control point coefficients per multivariate basis function.
///
/// A model is never modified after construction. Evaluation is a pure function of the model and
/// the query point, so a model can be shared between threads freely.
#[derive(Debug, Clone, PartialEq)]
pub struct BSpline {
    basis: TensorBasis,
    control_points: DMatrix<f64>,
}

impl BSpline {
    /// Creates a model from knot vectors and a `num_basis_functions x dim_y` coefficient matrix,
    /// rows ordered row-major over the per-dimension basis indices.
    /// # Example
    /// ```
    /// use nalgebra::DMatrix;
    /// use tensor_spline::{BSpline, KnotVector};
    /// use assert_approx_eq::assert_approx_eq;
    ///
    /// // linear interpolation between 1 and 3 on [0, 2]
    /// let knots = KnotVector::new(vec![0.0, 0.0, 2.0, 2.0], 1).unwrap();
    /// let spline = BSpline::new(vec![knots], DMatrix::from_row_slice(2, 1, &[1.0, 3.0])).unwrap();
    ///
    /// assert_approx_eq!(2.0, spline.evaluate(&[1.0]).unwrap()[0], 1e-12);
    /// ```
    /// # Errors
    /// Error is returned when the coefficient matrix does not have one row per basis function.
    pub fn new(knot_vectors: Vec<KnotVector>, control_points: DMatrix<f64>) -> Result<Self> {
        let basis = TensorBasis::new(knot_vectors)?;
        Self::from_basis(basis, control_points)
    }

    /// Creates a model with all coefficients zero.
    pub fn zeros(knot_vectors: Vec<KnotVector>, dim_y: usize) -> Result<Self> {
        let basis = TensorBasis::new(knot_vectors)?;
        let control_points = DMatrix::zeros(basis.num_basis_functions(), dim_y);
        Self::from_basis(basis, control_points)
    }

    pub(crate) fn from_basis(basis: TensorBasis, control_points: DMatrix<f64>) -> Result<Self> {
        if control_points.nrows() != basis.num_basis_functions() {
            return Err(ConfigurationError::ControlPointCount {
                expected: basis.num_basis_functions(),
                found: control_points.nrows(),
            }
            .into());
        }
        if control_points.ncols() == 0 {
            return Err(ConfigurationError::SizeMismatch {
                option: "output dimension",
                expected: 1,
                found: 0,
            }
            .into());
        }
        Ok(BSpline {
            basis,
            control_points,
        })
    }

    /// Returns a new model sharing the knots of this one with different coefficients.
    pub fn with_control_points(&self, control_points: DMatrix<f64>) -> Result<Self> {
        Self::from_basis(self.basis.clone(), control_points)
    }

    /// Evaluates the spline at `point`, returning one value per output dimension.
    /// # Errors
    /// [crate::SplineError::OutOfDomain] when any coordinate is outside of its clamped knot range.
    pub fn evaluate(&self, point: &[f64]) -> Result<Vec<f64>> {
        let mut result = vec![0.0; self.dim_y()];
        for (index, value) in self.basis.evaluate(point)? {
            let coefficients = self.control_points.row(index);
            for (output, coefficient) in result.iter_mut().zip(coefficients.iter()) {
                *output += value * coefficient;
            }
        }
        Ok(result)
    }

    /// Evaluates many points in parallel. Fails if any point fails.
    pub fn evaluate_batch(&self, points: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        points.par_iter().map(|point| self.evaluate(point)).collect()
    }

    /// Jacobian at `point` as a `dim_y x dim_x` matrix.
    pub fn evaluate_jacobian(&self, point: &[f64]) -> Result<DMatrix<f64>> {
        let mut jacobian = DMatrix::zeros(self.dim_y(), self.dim_x());
        for (index, gradient) in self.basis.gradient(point)? {
            for output in 0..self.dim_y() {
                let coefficient = self.control_points[(index, output)];
                for (dim, partial) in gradient.iter().enumerate() {
                    jacobian[(output, dim)] += coefficient * partial;
                }
            }
        }
        Ok(jacobian)
    }

    /// Hessian of every output at `point`, each a symmetric `dim_x x dim_x` matrix.
    pub fn evaluate_hessian(&self, point: &[f64]) -> Result<Vec<DMatrix<f64>>> {
        let mut hessians = vec![DMatrix::zeros(self.dim_x(), self.dim_x()); self.dim_y()];
        for (index, basis_hessian) in self.basis.hessian(point)? {
            for (output, hessian) in hessians.iter_mut().enumerate() {
                *hessian += &basis_hessian * self.control_points[(index, output)];
            }
        }
        Ok(hessians)
    }

    pub fn dim_x(&self) -> usize {
        self.basis.dim()
    }

    pub fn dim_y(&self) -> usize {
        self.control_points.ncols()
    }

    pub fn basis(&self) -> &TensorBasis {
        &self.basis
    }

    pub fn knot_vectors(&self) -> Vec<&KnotVector> {
        self.basis.bases().iter().map(|b| b.knot_vector()).collect()
    }

    pub fn degrees(&self) -> Vec<usize> {
        self.basis.bases().iter().map(|b| b.degree()).collect()
    }

    pub fn num_basis_functions(&self) -> usize {
        self.basis.num_basis_functions()
    }

    pub fn num_basis_functions_per_dim(&self) -> Vec<usize> {
        self.basis.num_basis_functions_per_dim()
    }

    /// One row of coefficients per basis function, one column per output.
    pub fn control_points(&self) -> &DMatrix<f64> {
        &self.control_points
    }

    pub fn domain_lower_bound(&self) -> Vec<f64> {
        self.basis.bases().iter().map(|b| b.knot_vector().lower_bound()).collect()
    }

    pub fn domain_upper_bound(&self) -> Vec<f64> {
        self.basis.bases().iter().map(|b| b.knot_vector().upper_bound()).collect()
    }

    pub fn is_in_domain(&self, point: &[f64]) -> bool {
        self.basis.is_in_domain(point)
    }
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;

    use super::*;
    use crate::error::SplineError;

    /// Bilinear patch on [0, 1] x [0, 2] with corner values f(x, y) = 1 + 2x + 3y + xy.
    fn bilinear() -> BSpline {
        let x = KnotVector::new(vec![0.0, 0.0, 1.0, 1.0], 1).unwrap();
        let y = KnotVector::new(vec![0.0, 0.0, 2.0, 2.0], 1).unwrap();
        let f = |x: f64, y: f64| 1.0 + 2.0 * x + 3.0 * y + x * y;
        let control_points = DMatrix::from_row_slice(
            4,
            2,
            &[
                f(0.0, 0.0), -f(0.0, 0.0),
                f(0.0, 2.0), -f(0.0, 2.0),
                f(1.0, 0.0), -f(1.0, 0.0),
                f(1.0, 2.0), -f(1.0, 2.0),
            ],
        );
        BSpline::new(vec![x, y], control_points).unwrap()
    }

    #[test]
    fn evaluate_bilinear() {
        let spline = bilinear();
        let eps = 1e-12;

        for (x, y) in [(0.0, 0.0), (0.25, 1.5), (0.5, 0.5), (1.0, 2.0), (0.9, 0.1)] {
            let expected = 1.0 + 2.0 * x + 3.0 * y + x * y;
            let result = spline.evaluate(&[x, y]).unwrap();
            assert_eq!(2, result.len());
            assert_approx_eq!(result[0], expected, eps);
            assert_approx_eq!(result[1], -expected, eps);
        }
    }

    #[test]
    fn jacobian_and_hessian_bilinear() {
        let spline = bilinear();
        let eps = 1e-12;
        let (x, y) = (0.3, 1.2);

        let jacobian = spline.evaluate_jacobian(&[x, y]).unwrap();
        assert_eq!((2, 2), jacobian.shape());
        assert_approx_eq!(jacobian[(0, 0)], 2.0 + y, eps);
        assert_approx_eq!(jacobian[(0, 1)], 3.0 + x, eps);
        assert_approx_eq!(jacobian[(1, 0)], -(2.0 + y), eps);

        let hessians = spline.evaluate_hessian(&[x, y]).unwrap();
        assert_eq!(2, hessians.len());
        assert_approx_eq!(hessians[0][(0, 1)], 1.0, eps);
        assert_approx_eq!(hessians[0][(1, 0)], 1.0, eps);
        assert_approx_eq!(hessians[0][(0, 0)], 0.0, eps);
        assert_approx_eq!(hessians[1][(1, 0)], -1.0, eps);
    }

    #[test]
    fn batch_matches_single_evaluation() {
        let spline = bilinear();
        let points: Vec<Vec<f64>> = (0..=20)
            .map(|i| vec![i as f64 / 20.0, 2.0 - i as f64 / 10.0])
            .collect();

        let batch = spline.evaluate_batch(&points).unwrap();
        assert_eq!(points.len(), batch.len());
        for (point, result) in points.iter().zip(&batch) {
            assert_eq!(&spline.evaluate(point).unwrap(), result);
        }

        let mut outside = points.clone();
        outside.push(vec![0.5, 2.5]);
        assert!(spline.evaluate_batch(&outside).is_err());
    }

    #[test]
    fn out_of_domain() {
        let spline = bilinear();
        assert!(matches!(
            spline.evaluate(&[1.5, 1.0]),
            Err(SplineError::OutOfDomain { dim: 0, value, .. }) if value == 1.5
        ));
        assert!(matches!(
            spline.evaluate_jacobian(&[0.5, -1.0]),
            Err(SplineError::OutOfDomain { dim: 1, .. })
        ));
        assert!(!spline.is_in_domain(&[0.5, 2.1]));
        assert_eq!(vec![0.0, 0.0], spline.domain_lower_bound());
        assert_eq!(vec![1.0, 2.0], spline.domain_upper_bound());
    }

    #[test]
    fn zeros_and_with_control_points() {
        let x = KnotVector::new(vec![0.0, 0.0, 0.0, 1.0, 2.0, 2.0, 2.0], 2).unwrap();
        let zero = BSpline::zeros(vec![x], 1).unwrap();

        assert_eq!(4, zero.num_basis_functions());
        assert_eq!(vec![2], zero.degrees());
        assert_eq!(vec![0.0], zero.evaluate(&[1.3]).unwrap());

        let ones = zero.with_control_points(DMatrix::from_element(4, 1, 1.0)).unwrap();
        assert_approx_eq!(ones.evaluate(&[1.3]).unwrap()[0], 1.0, 1e-12);
        assert_eq!(vec![0.0], zero.evaluate(&[1.3]).unwrap());

        assert!(matches!(
            zero.with_control_points(DMatrix::zeros(3, 1)),
            Err(SplineError::InvalidConfiguration(ConfigurationError::ControlPointCount {
                expected: 4,
                found: 3
            }))
        ));
    }

    #[test]
    fn rebuilt_from_parts_is_identical() {
        let spline = bilinear();
        let knots = spline.knot_vectors().into_iter().cloned().collect();
        let copy = BSpline::new(knots, spline.control_points().clone()).unwrap();
        assert_eq!(spline, copy);
    }
}
