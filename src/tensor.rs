use nalgebra::DMatrix;

use crate::basis::{BasisFunction, BasisValues};
use crate::error::{ConfigurationError, Result};
use crate::knot::KnotVector;

/// Multivariate basis formed by the tensor product of one [BasisFunction] per input dimension.
///
/// Coefficients are addressed row-major: the last dimension varies fastest.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorBasis {
    bases: Vec<BasisFunction>,
    strides: Vec<usize>,
    num_basis_functions: usize,
}

impl TensorBasis {
    pub fn new(knot_vectors: Vec<KnotVector>) -> Result<Self> {
        if knot_vectors.is_empty() {
            return Err(ConfigurationError::SizeMismatch {
                option: "knot vectors",
                expected: 1,
                found: 0,
            }
            .into());
        }

        let mut strides = vec![1; knot_vectors.len()];
        let mut total = 1usize;
        for dim in (0..knot_vectors.len()).rev() {
            strides[dim] = total;
            total *= knot_vectors[dim].num_basis_functions();
        }

        Ok(TensorBasis {
            bases: knot_vectors.into_iter().map(BasisFunction::new).collect(),
            strides,
            num_basis_functions: total,
        })
    }

    pub fn dim(&self) -> usize {
        self.bases.len()
    }

    pub fn bases(&self) -> &[BasisFunction] {
        &self.bases
    }

    /// Total number of multivariate basis functions.
    pub fn num_basis_functions(&self) -> usize {
        self.num_basis_functions
    }

    pub fn num_basis_functions_per_dim(&self) -> Vec<usize> {
        self.bases.iter().map(|b| b.num_basis_functions()).collect()
    }

    /// Distance in the linear index between neighbours along `dim`.
    pub fn stride(&self, dim: usize) -> usize {
        self.strides[dim]
    }

    pub fn linear_index(&self, multi_index: &[usize]) -> usize {
        multi_index.iter().zip(&self.strides).map(|(i, s)| i * s).sum()
    }

    pub fn multi_index(&self, linear_index: usize) -> Vec<usize> {
        self.bases
            .iter()
            .zip(&self.strides)
            .map(|(basis, stride)| (linear_index / stride) % basis.num_basis_functions())
            .collect()
    }

    pub fn is_in_domain(&self, point: &[f64]) -> bool {
        point.len() == self.dim()
            && self
                .bases
                .iter()
                .zip(point)
                .all(|(basis, x)| basis.knot_vector().is_in_range(*x))
    }

    /// Non-zero multivariate basis values at `point` as (linear index, value) pairs.
    /// At most the product of `degree + 1` over all dimensions entries are returned.
    pub fn evaluate(&self, point: &[f64]) -> Result<Vec<(usize, f64)>> {
        let per_dim = self.univariate(point, 0)?;
        let mut entries = Vec::with_capacity(self.support_size());
        self.for_each_support(&per_dim, |index, local| {
            let value: f64 = local
                .iter()
                .zip(&per_dim)
                .map(|(i, ders)| ders[0].values[*i])
                .product();
            if value != 0.0 {
                entries.push((index, value));
            }
        });
        Ok(entries)
    }

    /// Gradients of the basis functions supported at `point`, one `dim`-long vector per entry.
    pub fn gradient(&self, point: &[f64]) -> Result<Vec<(usize, Vec<f64>)>> {
        let per_dim = self.univariate(point, 1)?;
        let mut entries = Vec::with_capacity(self.support_size());
        self.for_each_support(&per_dim, |index, local| {
            let gradient: Vec<f64> = (0..self.dim())
                .map(|wrt| partial(&per_dim, local, |dim| usize::from(dim == wrt)))
                .collect();
            entries.push((index, gradient));
        });
        Ok(entries)
    }

    /// Hessians of the basis functions supported at `point`, one symmetric `dim x dim` matrix
    /// per entry.
    pub fn hessian(&self, point: &[f64]) -> Result<Vec<(usize, DMatrix<f64>)>> {
        let per_dim = self.univariate(point, 2)?;
        let n = self.dim();
        let mut entries = Vec::with_capacity(self.support_size());
        self.for_each_support(&per_dim, |index, local| {
            let mut hessian = DMatrix::zeros(n, n);
            for a in 0..n {
                for b in a..n {
                    let value = partial(&per_dim, local, |dim| {
                        usize::from(dim == a) + usize::from(dim == b)
                    });
                    hessian[(a, b)] = value;
                    hessian[(b, a)] = value;
                }
            }
            entries.push((index, hessian));
        });
        Ok(entries)
    }

    fn support_size(&self) -> usize {
        self.bases.iter().map(|b| b.degree() + 1).product()
    }

    /// Univariate derivatives up to `max_order` for every dimension.
    /// Orders above a dimension's degree are filled with zeros.
    fn univariate(&self, point: &[f64], max_order: usize) -> Result<Vec<Vec<BasisValues>>> {
        if point.len() != self.dim() {
            return Err(ConfigurationError::DimensionMismatch {
                expected: self.dim(),
                found: point.len(),
            }
            .into());
        }

        self.bases
            .iter()
            .zip(point)
            .enumerate()
            .map(|(dim, (basis, x))| {
                let mut ders = basis
                    .evaluate_derivatives(*x, max_order)
                    .map_err(|err| err.in_dimension(dim))?;
                while ders.len() <= max_order {
                    ders.push(BasisValues {
                        first: ders[0].first,
                        values: vec![0.0; basis.degree() + 1],
                    });
                }
                Ok(ders)
            })
            .collect()
    }

    /// Walks all combinations of the per-dimension supports, last dimension fastest.
    fn for_each_support<F>(&self, per_dim: &[Vec<BasisValues>], mut visit: F)
    where
        F: FnMut(usize, &[usize]),
    {
        let n = self.dim();
        let mut local = vec![0usize; n];
        loop {
            let index: usize = (0..n)
                .map(|dim| (per_dim[dim][0].first + local[dim]) * self.strides[dim])
                .sum();
            visit(index, &local);

            let mut carried = true;
            for dim in (0..n).rev() {
                local[dim] += 1;
                if local[dim] < per_dim[dim][0].values.len() {
                    carried = false;
                    break;
                }
                local[dim] = 0;
            }
            if carried {
                break;
            }
        }
    }
}

/// Product over dimensions of the univariate derivative of the order chosen by `order_of`.
fn partial<F>(per_dim: &[Vec<BasisValues>], local: &[usize], order_of: F) -> f64
where
    F: Fn(usize) -> usize,
{
    per_dim
        .iter()
        .zip(local)
        .enumerate()
        .map(|(dim, (ders, i))| ders[order_of(dim)].values[*i])
        .product()
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::*;
    use crate::error::SplineError;
    use crate::knot::KnotSpacing;

    fn tensor() -> TensorBasis {
        let grid: Vec<f64> = (0..=10).map(|i| i as f64 / 10.0).collect();
        let x = KnotVector::build(0, &grid, 3, 6, &KnotSpacing::Equidistant).unwrap();
        let y = KnotVector::build(1, &grid, 2, 4, &KnotSpacing::Equidistant).unwrap();
        let z = KnotVector::build(2, &grid, 1, 3, &KnotSpacing::Equidistant).unwrap();
        TensorBasis::new(vec![x, y, z]).unwrap()
    }

    #[test]
    fn row_major_indexing() {
        let basis = tensor();
        assert_eq!(72, basis.num_basis_functions());
        assert_eq!(vec![6, 4, 3], basis.num_basis_functions_per_dim());
        assert_eq!(12, basis.stride(0));
        assert_eq!(3, basis.stride(1));
        assert_eq!(1, basis.stride(2));

        assert_eq!(2 * 12 + 3 * 3 + 1, basis.linear_index(&[2, 3, 1]));
        for index in 0..basis.num_basis_functions() {
            assert_eq!(index, basis.linear_index(&basis.multi_index(index)));
        }
    }

    #[test]
    fn partition_of_unity() {
        let basis = tensor();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            let point: Vec<f64> = (0..3).map(|_| rng.gen_range(0.0..=1.0)).collect();
            let values = basis.evaluate(&point).unwrap();
            assert!(values.len() <= 4 * 3 * 2);
            assert_approx_eq!(values.iter().map(|(_, v)| v).sum::<f64>(), 1.0, 1e-12);
            assert!(values.iter().all(|(_, v)| *v >= 0.0 && *v <= 1.0 + 1e-12));
        }
        let corner = basis.evaluate(&[1.0, 1.0, 1.0]).unwrap();
        assert_eq!(1, corner.len());
        assert_eq!(71, corner[0].0);
    }

    #[test]
    fn outer_product_of_univariate_values() {
        let basis = tensor();
        let point = [0.37, 0.81, 0.55];
        let values = basis.evaluate(&point).unwrap();

        for (index, value) in values {
            let multi = basis.multi_index(index);
            let expected: f64 = (0..3)
                .map(|dim| basis.bases()[dim].evaluate(point[dim]).unwrap().get(multi[dim]))
                .product();
            assert_approx_eq!(value, expected, 1e-14);
        }
    }

    #[test]
    fn gradient_and_hessian_match_finite_difference() {
        let basis = tensor();
        let point = [0.37, 0.61, 0.27];
        let h = 1e-5;

        let value_at = |p: &[f64], index: usize| -> f64 {
            basis
                .evaluate(p)
                .unwrap()
                .iter()
                .find(|(i, _)| *i == index)
                .map(|(_, v)| *v)
                .unwrap_or(0.0)
        };

        let gradients = basis.gradient(&point).unwrap();
        let hessians = basis.hessian(&point).unwrap();
        assert_eq!(gradients.len(), hessians.len());

        for ((index, gradient), (hessian_index, hessian)) in gradients.iter().zip(&hessians) {
            assert_eq!(index, hessian_index);
            for d in 0..3 {
                let mut plus = point;
                let mut minus = point;
                plus[d] += h;
                minus[d] -= h;
                let fd = (value_at(&plus, *index) - value_at(&minus, *index)) / (2.0 * h);
                assert_approx_eq!(gradient[d], fd, 1e-6);
            }

            // mixed partial of the first two dimensions
            let mut pp = point;
            let mut pm = point;
            let mut mp = point;
            let mut mm = point;
            pp[0] += h;
            pp[1] += h;
            pm[0] += h;
            pm[1] -= h;
            mp[0] -= h;
            mp[1] += h;
            mm[0] -= h;
            mm[1] -= h;
            let fd = (value_at(&pp, *index) - value_at(&pm, *index) - value_at(&mp, *index)
                + value_at(&mm, *index))
                / (4.0 * h * h);
            assert_approx_eq!(hessian[(0, 1)], fd, 1e-3);
            assert_eq!(hessian[(0, 1)], hessian[(1, 0)]);
            // the last dimension is linear
            assert_eq!(0.0, hessian[(2, 2)]);
        }
    }

    #[test]
    fn out_of_domain_reports_dimension() {
        let basis = tensor();
        assert!(matches!(
            basis.evaluate(&[0.5, 1.5, 0.5]),
            Err(SplineError::OutOfDomain { dim: 1, .. })
        ));
        assert!(matches!(
            basis.gradient(&[0.5, 0.5, -0.5]),
            Err(SplineError::OutOfDomain { dim: 2, .. })
        ));
        assert!(!basis.is_in_domain(&[0.5, 0.5, 1.01]));
        assert!(basis.is_in_domain(&[0.0, 0.5, 1.0]));
    }

    #[test]
    fn wrong_point_size() {
        let basis = tensor();
        assert!(matches!(
            basis.evaluate(&[0.5, 0.5]),
            Err(SplineError::InvalidConfiguration(ConfigurationError::DimensionMismatch {
                expected: 3,
                found: 2
            }))
        ));
    }
}
