use crate::error::{ConfigurationError, Result, SplineError};

/// Policy used to place the interior knots of one dimension.
#[derive(Debug, Clone, PartialEq)]
pub enum KnotSpacing {
    /// Interior knots are moving averages of `degree` consecutive distinct samples.
    /// Requires one basis function per distinct sample, which makes it the natural choice for
    /// interpolating gridded data.
    AsSampled,
    /// Interior knots equally spaced between the smallest and largest sample.
    Equidistant,
    /// Interior knots at quantiles of the distinct samples, so that denser regions get more knots.
    Quantile,
    /// Caller supplied interior knots. Boundary knots are added automatically.
    Custom(Vec<f64>),
}

/// Clamped, non-decreasing knot sequence of one input dimension together with its degree.
///
/// The first and last knots are repeated `degree + 1` times, so the vector holds
/// `num_basis_functions + degree + 1` values.
#[derive(Debug, Clone, PartialEq)]
pub struct KnotVector {
    knots: Vec<f64>,
    degree: usize,
}

impl KnotVector {
    /// Creates a knot vector from a full knot sequence, boundary knots included.
    /// # Example
    /// ```
    /// use tensor_spline::KnotVector;
    ///
    /// let knots = KnotVector::new(vec![0.0, 0.0, 0.5, 1.0, 1.0], 1).unwrap();
    /// assert_eq!(3, knots.num_basis_functions());
    /// ```
    /// # Errors
    /// Error is returned when the sequence is decreasing somewhere, is not clamped, spans an empty
    /// range or is too short for the degree.
    /// ```
    /// use tensor_spline::KnotVector;
    ///
    /// // first knot appears only once for degree 1
    /// assert!(KnotVector::new(vec![0.0, 0.5, 1.0, 1.0], 1).is_err());
    /// ```
    pub fn new(knots: Vec<f64>, degree: usize) -> Result<Self> {
        Self::validated(0, knots, degree)
    }

    /// Builds the knot vector of dimension `dim` for the given samples.
    ///
    /// `abscissas` may be unsorted and contain duplicates. The result is checked against the
    /// distinct samples with the Schoenberg-Whitney condition, so a vector that would make the
    /// fitting system rank deficient is never returned.
    pub fn build(
        dim: usize,
        abscissas: &[f64],
        degree: usize,
        num_basis_functions: usize,
        spacing: &KnotSpacing,
    ) -> Result<Self> {
        if abscissas.is_empty() {
            return Err(ConfigurationError::EmptyDimension { dim }.into());
        }
        if abscissas.iter().any(|x| !x.is_finite()) {
            return Err(ConfigurationError::NonFiniteSample.into());
        }
        if num_basis_functions < degree + 1 {
            return Err(ConfigurationError::TooFewBasisFunctions {
                dim,
                degree,
                requested: num_basis_functions,
            }
            .into());
        }

        let unique = unique_sorted(abscissas);
        let min = unique[0];
        let max = unique[unique.len() - 1];
        if min == max {
            return Err(ConfigurationError::DegenerateRange { dim, value: min }.into());
        }

        let num_interior = num_basis_functions - degree - 1;
        let interior = match spacing {
            KnotSpacing::AsSampled => {
                if num_basis_functions != unique.len() {
                    return Err(ConfigurationError::AsSampledBasisCount {
                        dim,
                        unique: unique.len(),
                        requested: num_basis_functions,
                    }
                    .into());
                }
                moving_average_knots(&unique, degree)
            }
            KnotSpacing::Equidistant => {
                let step = (max - min) / (num_interior + 1) as f64;
                (1..=num_interior).map(|i| min + step * i as f64).collect()
            }
            KnotSpacing::Quantile => quantile_knots(&unique, num_interior),
            KnotSpacing::Custom(knots) => {
                check_custom_knots(dim, knots, degree, num_interior, min, max)?;
                knots.clone()
            }
        };

        let mut knots = Vec::with_capacity(num_basis_functions + degree + 1);
        knots.extend(std::iter::repeat(min).take(degree + 1));
        knots.extend(interior);
        knots.extend(std::iter::repeat(max).take(degree + 1));

        let knot_vector = Self::validated(dim, knots, degree)?;
        knot_vector.check_schoenberg_whitney(dim, &unique)?;

        log::trace!("dimension {}: knot vector {:?}", dim, knot_vector.knots);
        Ok(knot_vector)
    }

    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn num_basis_functions(&self) -> usize {
        self.knots.len() - self.degree - 1
    }

    pub fn lower_bound(&self) -> f64 {
        self.knots[0]
    }

    pub fn upper_bound(&self) -> f64 {
        self.knots[self.knots.len() - 1]
    }

    pub fn is_in_range(&self, x: f64) -> bool {
        self.lower_bound() <= x && x <= self.upper_bound()
    }

    /// Checks that the strictly increasing `samples` can be matched one to one with the basis
    /// functions such that every basis function is non-zero at its sample.
    ///
    /// Supports are ordered by both ends, so taking the first usable sample for every basis
    /// function in turn finds a matching whenever one exists.
    pub fn check_schoenberg_whitney(&self, dim: usize, samples: &[f64]) -> Result<()> {
        let mut next = 0;
        for basis_index in 0..self.num_basis_functions() {
            let upper = self.knots[basis_index + self.degree + 1];
            loop {
                match samples.get(next) {
                    Some(&x) if x <= upper => {
                        next += 1;
                        if self.is_supported(basis_index, x) {
                            break;
                        }
                    }
                    _ => return Err(SplineError::IllConditionedKnots { dim, basis_index }),
                }
            }
        }
        Ok(())
    }

    /// True when basis function `i` is non-zero at `x`.
    fn is_supported(&self, i: usize, x: f64) -> bool {
        let p = self.degree;
        let start = self.knots[i];
        let end = self.knots[i + p + 1];

        if start < x && x < end {
            true
        } else if x == start {
            self.knots[i + p] == start && start < end
        } else if x == end {
            i == self.num_basis_functions() - 1
        } else {
            false
        }
    }

    fn validated(dim: usize, knots: Vec<f64>, degree: usize) -> Result<Self> {
        let order = degree + 1;
        if knots.len() < 2 * order {
            return Err(ConfigurationError::TooFewBasisFunctions {
                dim,
                degree,
                requested: knots.len().saturating_sub(order),
            }
            .into());
        }
        if let Some(index) = knots.windows(2).position(|w| !(w[0] <= w[1])) {
            return Err(ConfigurationError::NonMonotonicKnots { dim, index: index + 1 }.into());
        }

        let min = knots[0];
        let max = knots[knots.len() - 1];
        if min == max {
            return Err(ConfigurationError::DegenerateRange { dim, value: min }.into());
        }
        for (knot, multiplicity) in [
            (min, knots.iter().take_while(|k| **k == min).count()),
            (max, knots.iter().rev().take_while(|k| **k == max).count()),
        ] {
            if multiplicity != order {
                return Err(ConfigurationError::KnotMultiplicity {
                    dim,
                    knot,
                    multiplicity,
                    max: order,
                }
                .into());
            }
        }

        // interior knots repeat at most degree + 1 times
        let mut start = knots.iter().take_while(|k| **k == min).count();
        while knots[start] < max {
            let knot = knots[start];
            let multiplicity = knots[start..].iter().take_while(|k| **k == knot).count();
            if multiplicity > order {
                return Err(ConfigurationError::KnotMultiplicity {
                    dim,
                    knot,
                    multiplicity,
                    max: order,
                }
                .into());
            }
            start += multiplicity;
        }
        Ok(KnotVector { knots, degree })
    }
}

pub(crate) fn unique_sorted(values: &[f64]) -> Vec<f64> {
    let mut unique = values.to_vec();
    unique.sort_by(|a, b| a.total_cmp(b));
    unique.dedup();
    unique
}

/// de Boor's averaging: one interior knot per window of `degree` consecutive samples.
/// Degree 0 splits at the midpoints instead.
fn moving_average_knots(unique: &[f64], degree: usize) -> Vec<f64> {
    if degree == 0 {
        return unique.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect();
    }
    let num_interior = unique.len() - degree - 1;
    (1..=num_interior)
        .map(|j| unique[j..j + degree].iter().sum::<f64>() / degree as f64)
        .collect()
}

fn quantile_knots(unique: &[f64], num_interior: usize) -> Vec<f64> {
    let last = (unique.len() - 1) as f64;
    (1..=num_interior)
        .map(|i| {
            let position = last * i as f64 / (num_interior + 1) as f64;
            let lower = position.floor() as usize;
            let fraction = position - lower as f64;
            match unique.get(lower + 1) {
                Some(upper) => unique[lower] + fraction * (upper - unique[lower]),
                None => unique[lower],
            }
        })
        .collect()
}

fn check_custom_knots(
    dim: usize,
    knots: &[f64],
    degree: usize,
    num_interior: usize,
    min: f64,
    max: f64,
) -> Result<()> {
    if knots.len() != num_interior {
        return Err(ConfigurationError::SizeMismatch {
            option: "custom interior knots",
            expected: num_interior,
            found: knots.len(),
        }
        .into());
    }
    if let Some(index) = knots.windows(2).position(|w| !(w[0] <= w[1])) {
        return Err(ConfigurationError::NonMonotonicKnots { dim, index: index + 1 }.into());
    }
    if let Some(knot) = knots.iter().find(|k| !(min < **k && **k < max)) {
        return Err(ConfigurationError::KnotOutsideDomain { dim, knot: *knot }.into());
    }

    let max_multiplicity = degree.max(1);
    let mut start = 0;
    while start < knots.len() {
        let multiplicity = knots[start..].iter().take_while(|k| **k == knots[start]).count();
        if multiplicity > max_multiplicity {
            return Err(ConfigurationError::KnotMultiplicity {
                dim,
                knot: knots[start],
                multiplicity,
                max: max_multiplicity,
            }
            .into());
        }
        start += multiplicity;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;

    use super::*;

    fn grid(n: usize) -> Vec<f64> {
        (0..n).map(|i| i as f64).collect()
    }

    #[test]
    fn equidistant() {
        let knots = KnotVector::build(0, &grid(11), 3, 7, &KnotSpacing::Equidistant).unwrap();

        assert_eq!(7, knots.num_basis_functions());
        assert_eq!(11, knots.knots().len());
        assert_eq!(&[0.0; 4], &knots.knots()[..4]);
        assert_eq!(&[10.0; 4], &knots.knots()[7..]);
        assert_approx_eq!(10.0 / 4.0, knots.knots()[4], 1e-12);
        assert_approx_eq!(20.0 / 4.0, knots.knots()[5], 1e-12);
        assert_approx_eq!(30.0 / 4.0, knots.knots()[6], 1e-12);
    }

    #[test]
    fn as_sampled_moving_average() {
        let samples = vec![0.0, 1.0, 3.0, 4.0, 6.0, 7.0];
        let knots = KnotVector::build(0, &samples, 2, 6, &KnotSpacing::AsSampled).unwrap();

        let expected = vec![0.0, 0.0, 0.0, 2.0, 3.5, 5.0, 7.0, 7.0, 7.0];
        assert_eq!(expected.len(), knots.knots().len());
        for (k, e) in knots.knots().iter().zip(expected) {
            assert_approx_eq!(*k, e, 1e-12);
        }
    }

    #[test]
    fn as_sampled_degree_zero_uses_midpoints() {
        let knots = KnotVector::build(0, &grid(4), 0, 4, &KnotSpacing::AsSampled).unwrap();
        assert_eq!(&[0.0, 0.5, 1.5, 2.5, 3.0], knots.knots());
    }

    #[test]
    fn as_sampled_requires_one_basis_per_sample() {
        let result = KnotVector::build(2, &grid(6), 3, 5, &KnotSpacing::AsSampled);
        assert!(matches!(
            result,
            Err(SplineError::InvalidConfiguration(ConfigurationError::AsSampledBasisCount {
                dim: 2,
                unique: 6,
                requested: 5
            }))
        ));
    }

    #[test]
    fn quantile_follows_sample_density() {
        // nine distinct samples crowded into [0, 1], three spread over (1, 10]
        let mut samples: Vec<f64> = (0..9).map(|i| i as f64 / 8.0).collect();
        samples.extend([4.0, 7.0, 10.0]);

        let knots = KnotVector::build(0, &samples, 1, 5, &KnotSpacing::Quantile).unwrap();
        let interior = &knots.knots()[2..5];

        assert!(interior.windows(2).all(|w| w[0] < w[1]));
        assert!(interior[1] <= 1.0);
        assert!(interior[0] > 0.0 && interior[2] < 10.0);
    }

    #[test]
    fn minimum_basis_count_is_single_bezier_span() {
        let policies = [
            KnotSpacing::Equidistant,
            KnotSpacing::Quantile,
            KnotSpacing::Custom(vec![]),
        ];
        for spacing in policies {
            let knots = KnotVector::build(0, &grid(5), 3, 4, &spacing).unwrap();
            assert_eq!(&[0.0, 0.0, 0.0, 0.0, 4.0, 4.0, 4.0, 4.0], knots.knots());
        }
    }

    #[test]
    fn custom_knots() {
        let spacing = KnotSpacing::Custom(vec![1.5, 1.5, 3.0]);
        let knots = KnotVector::build(0, &grid(8), 2, 6, &spacing).unwrap();
        assert_eq!(&[0.0, 0.0, 0.0, 1.5, 1.5, 3.0, 7.0, 7.0, 7.0], knots.knots());
    }

    #[test]
    fn custom_knots_validation() {
        let samples = grid(8);

        let unsorted = KnotSpacing::Custom(vec![3.0, 1.0, 4.0]);
        assert!(matches!(
            KnotVector::build(1, &samples, 2, 6, &unsorted),
            Err(SplineError::InvalidConfiguration(ConfigurationError::NonMonotonicKnots {
                dim: 1,
                index: 1
            }))
        ));

        let outside = KnotSpacing::Custom(vec![0.0, 1.0, 4.0]);
        assert!(matches!(
            KnotVector::build(1, &samples, 2, 6, &outside),
            Err(SplineError::InvalidConfiguration(ConfigurationError::KnotOutsideDomain { .. }))
        ));

        let too_many = KnotSpacing::Custom(vec![2.0, 2.0, 2.0]);
        assert!(matches!(
            KnotVector::build(1, &samples, 2, 6, &too_many),
            Err(SplineError::InvalidConfiguration(ConfigurationError::KnotMultiplicity {
                multiplicity: 3,
                ..
            }))
        ));

        let wrong_count = KnotSpacing::Custom(vec![2.0]);
        assert!(matches!(
            KnotVector::build(1, &samples, 2, 6, &wrong_count),
            Err(SplineError::InvalidConfiguration(ConfigurationError::SizeMismatch {
                expected: 3,
                found: 1,
                ..
            }))
        ));
    }

    #[test]
    fn too_few_basis_functions() {
        let result = KnotVector::build(0, &grid(10), 3, 3, &KnotSpacing::Equidistant);
        assert!(matches!(
            result,
            Err(SplineError::InvalidConfiguration(ConfigurationError::TooFewBasisFunctions {
                dim: 0,
                degree: 3,
                requested: 3
            }))
        ));
    }

    #[test]
    fn degenerate_and_empty_dimension() {
        assert!(matches!(
            KnotVector::build(0, &[2.0, 2.0, 2.0], 1, 2, &KnotSpacing::Equidistant),
            Err(SplineError::InvalidConfiguration(ConfigurationError::DegenerateRange { .. }))
        ));
        assert!(matches!(
            KnotVector::build(3, &[], 1, 2, &KnotSpacing::Equidistant),
            Err(SplineError::InvalidConfiguration(ConfigurationError::EmptyDimension { dim: 3 }))
        ));
    }

    #[test]
    fn more_basis_functions_than_samples_is_ill_conditioned() {
        let samples = vec![0.0, 0.0, 1.0, 1.0, 2.0, 2.0, 3.0];
        let result = KnotVector::build(1, &samples, 3, 12, &KnotSpacing::Equidistant);
        assert!(matches!(result, Err(SplineError::IllConditionedKnots { dim: 1, .. })));
    }

    #[test]
    fn empty_knot_span_is_ill_conditioned() {
        // no samples between 1 and 9, while the custom knots put three hat peaks there
        let samples = vec![0.0, 0.5, 1.0, 9.0, 9.5, 10.0];
        let spacing = KnotSpacing::Custom(vec![3.0, 5.0, 7.0]);
        let result = KnotVector::build(0, &samples, 1, 5, &spacing);
        assert!(matches!(result, Err(SplineError::IllConditionedKnots { dim: 0, basis_index: 2 })));
    }

    #[test]
    fn schoenberg_whitney_ignores_zero_at_simple_knot() {
        // linear hat functions vanish at their own first knot
        let knots = KnotVector::new(vec![0.0, 0.0, 1.0, 2.0, 2.0], 1).unwrap();
        assert!(knots.check_schoenberg_whitney(0, &[0.0, 1.0, 2.0]).is_ok());
        assert!(knots.check_schoenberg_whitney(0, &[0.0, 2.0]).is_err());
        assert!(matches!(
            knots.check_schoenberg_whitney(0, &[0.0, 0.5, 0.7]),
            Err(SplineError::IllConditionedKnots { basis_index: 2, .. })
        ));
    }

    #[test]
    fn new_rejects_invalid_sequences() {
        assert!(KnotVector::new(vec![0.0, 0.0, 1.0, 1.0], 1).is_ok());
        assert!(KnotVector::new(vec![0.0, 0.0, 1.0], 1).is_err());
        assert!(KnotVector::new(vec![0.0, 0.0, 2.0, 1.0, 3.0, 3.0], 1).is_err());
        assert!(KnotVector::new(vec![1.0, 1.0, 1.0, 1.0], 1).is_err());
        assert!(KnotVector::new(vec![0.0, 0.0, 1.0, 2.0], 1).is_err());
    }

    #[test]
    fn new_limits_interior_multiplicity() {
        // degree + 1 repeats split the basis into two clamped pieces
        assert!(KnotVector::new(vec![0.0, 0.0, 1.0, 1.0, 2.0, 2.0], 1).is_ok());
        assert!(matches!(
            KnotVector::new(vec![0.0, 0.0, 1.0, 1.0, 1.0, 2.0, 2.0], 1),
            Err(SplineError::InvalidConfiguration(ConfigurationError::KnotMultiplicity {
                multiplicity: 3,
                max: 2,
                ..
            }))
        ));
    }
}
