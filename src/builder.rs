use crate::data_table::DataTable;
use crate::error::{ConfigurationError, Result};
use crate::fitter::{self, FitSettings, Smoothing};
use crate::knot::KnotSpacing;
use crate::spline::BSpline;

/// Option given either once for every input dimension or separately for each of them.
#[derive(Debug, Clone, PartialEq)]
pub enum PerDimension<T> {
    All(T),
    Each(Vec<T>),
}

impl<T: Clone> PerDimension<T> {
    /// Expands the option to one value per dimension.
    /// # Errors
    /// Per dimension values whose count differs from `dims` are rejected.
    /// ```
    /// use tensor_spline::PerDimension;
    ///
    /// assert_eq!(vec![3, 3], PerDimension::All(3).resolve("degree", 2).unwrap());
    /// assert_eq!(vec![1, 2], PerDimension::Each(vec![1, 2]).resolve("degree", 2).unwrap());
    /// assert!(PerDimension::Each(vec![1]).resolve("degree", 2).is_err());
    /// ```
    pub fn resolve(&self, option: &'static str, dims: usize) -> Result<Vec<T>> {
        match self {
            PerDimension::All(value) => Ok(vec![value.clone(); dims]),
            PerDimension::Each(values) if values.len() == dims => Ok(values.clone()),
            PerDimension::Each(values) => Err(ConfigurationError::SizeMismatch {
                option,
                expected: dims,
                found: values.len(),
            }
            .into()),
        }
    }
}

macro_rules! per_dimension_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for PerDimension<$t> {
                fn from(value: $t) -> Self {
                    PerDimension::All(value)
                }
            }

            impl From<Vec<$t>> for PerDimension<$t> {
                fn from(values: Vec<$t>) -> Self {
                    PerDimension::Each(values)
                }
            }
        )*
    };
}

per_dimension_from!(usize, KnotSpacing);

/// Fluent configuration of a B-spline fit.
///
/// Defaults: cubic in every dimension, [KnotSpacing::AsSampled] knots, one basis function per
/// distinct sample value, no smoothing, `alpha = 0.1` and unit weights.
/// # Example
/// ```
/// use tensor_spline::{Builder, DataTable, KnotSpacing, Smoothing};
/// use assert_approx_eq::assert_approx_eq;
///
/// let mut data = DataTable::new(1, 1);
/// for i in 0..50 {
///     let x = i as f64 / 49.0;
///     data.add_sample(vec![x], vec![x * x]).unwrap();
/// }
///
/// let spline = Builder::new(1, 1)
///     .degree(2)
///     .num_basis_functions(6)
///     .knot_spacing(KnotSpacing::Equidistant)
///     .smoothing(Smoothing::PSpline)
///     .alpha(1e-6)
///     .fit(&data)
///     .unwrap();
///
/// assert_approx_eq!(0.25, spline.evaluate(&[0.5]).unwrap()[0], 1e-4);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Builder {
    dim_x: usize,
    dim_y: usize,
    degrees: PerDimension<usize>,
    num_basis_functions: Option<PerDimension<usize>>,
    knot_spacing: PerDimension<KnotSpacing>,
    smoothing: Smoothing,
    alpha: f64,
    weights: Option<Vec<f64>>,
}

impl Builder {
    pub fn new(dim_x: usize, dim_y: usize) -> Self {
        Builder {
            dim_x,
            dim_y,
            degrees: PerDimension::All(3),
            num_basis_functions: None,
            knot_spacing: PerDimension::All(KnotSpacing::AsSampled),
            smoothing: Smoothing::None,
            alpha: 0.1,
            weights: None,
        }
    }

    pub fn degree<D: Into<PerDimension<usize>>>(mut self, degree: D) -> Self {
        self.degrees = degree.into();
        self
    }

    /// Number of basis functions per dimension. Defaults to the number of distinct sample values.
    pub fn num_basis_functions<N: Into<PerDimension<usize>>>(
        mut self,
        num_basis_functions: N,
    ) -> Self {
        self.num_basis_functions = Some(num_basis_functions.into());
        self
    }

    pub fn knot_spacing<S: Into<PerDimension<KnotSpacing>>>(mut self, knot_spacing: S) -> Self {
        self.knot_spacing = knot_spacing.into();
        self
    }

    pub fn smoothing(mut self, smoothing: Smoothing) -> Self {
        self.smoothing = smoothing;
        self
    }

    /// Strength of the smoothing penalty. Ignored with [Smoothing::None].
    pub fn alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// One non-negative weight per sample, in sample order.
    pub fn weights(mut self, weights: Vec<f64>) -> Self {
        self.weights = Some(weights);
        self
    }

    /// Fits control points to `data`.
    /// # Errors
    /// [crate::SplineError::InvalidConfiguration] for malformed options or data,
    /// [crate::SplineError::IllConditionedKnots] when the samples cannot support the requested
    /// basis and [crate::SplineError::SingularSystem] when the regularized system has no unique
    /// solution.
    pub fn fit(&self, data: &DataTable) -> Result<BSpline> {
        self.check_data(data)?;
        let (degrees, num_basis_functions, knot_spacing) = self.resolve(data)?;
        let settings = FitSettings {
            degrees,
            num_basis_functions,
            knot_spacing,
            smoothing: self.smoothing,
            alpha: self.alpha,
            weights: self.weights.as_deref(),
        };
        fitter::fit(data, &settings)
    }

    /// Builds the knot vectors for `data` and returns a model whose coefficients are all zero.
    pub fn unfitted(&self, data: &DataTable) -> Result<BSpline> {
        self.check_data(data)?;
        let (degrees, num_basis_functions, knot_spacing) = self.resolve(data)?;
        let knot_vectors =
            fitter::build_knot_vectors(data, &degrees, &num_basis_functions, &knot_spacing)?;
        BSpline::zeros(knot_vectors, self.dim_y)
    }

    fn check_data(&self, data: &DataTable) -> Result<()> {
        for (expected, found) in [(self.dim_x, data.dim_x()), (self.dim_y, data.dim_y())] {
            if expected != found {
                return Err(ConfigurationError::DimensionMismatch { expected, found }.into());
            }
        }
        if data.is_empty() {
            return Err(ConfigurationError::EmptyTable.into());
        }
        Ok(())
    }

    fn resolve(&self, data: &DataTable) -> Result<(Vec<usize>, Vec<usize>, Vec<KnotSpacing>)> {
        let degrees = self.degrees.resolve("degree", self.dim_x)?;
        let num_basis_functions = match &self.num_basis_functions {
            Some(n) => n.resolve("num_basis_functions", self.dim_x)?,
            None => (0..self.dim_x)
                .map(|dim| data.unique_abscissas(dim).len())
                .collect(),
        };
        let knot_spacing = self.knot_spacing.resolve("knot_spacing", self.dim_x)?;
        Ok((degrees, num_basis_functions, knot_spacing))
    }
}

/// Interpolates samples lying on a complete regular grid.
/// # Example
/// ```
/// use tensor_spline::{interpolator, DataTable};
/// use assert_approx_eq::assert_approx_eq;
///
/// let mut data = DataTable::new(1, 1);
/// for x in [0.0, 1.0, 2.0, 3.0] {
///     data.add_sample(vec![x], vec![x * x]).unwrap();
/// }
/// let spline = interpolator(&data, 3).unwrap();
///
/// assert_approx_eq!(1.0, spline.evaluate(&[1.0]).unwrap()[0], 1e-10);
/// assert_approx_eq!(4.0, spline.evaluate(&[2.0]).unwrap()[0], 1e-10);
/// ```
pub fn interpolator(data: &DataTable, degree: usize) -> Result<BSpline> {
    check_grid(data)?;
    Builder::new(data.dim_x(), data.dim_y()).degree(degree).fit(data)
}

/// Smooths samples lying on a complete regular grid with one basis function per grid line.
pub fn smoother(
    data: &DataTable,
    degree: usize,
    smoothing: Smoothing,
    alpha: f64,
    weights: Option<Vec<f64>>,
) -> Result<BSpline> {
    check_grid(data)?;
    let mut builder = Builder::new(data.dim_x(), data.dim_y())
        .degree(degree)
        .smoothing(smoothing)
        .alpha(alpha);
    if let Some(weights) = weights {
        builder = builder.weights(weights);
    }
    builder.fit(data)
}

/// Zero valued model on knot vectors built for `data`.
pub fn unfitted<D, S, N>(
    data: &DataTable,
    degrees: D,
    knot_spacing: S,
    num_basis_functions: N,
) -> Result<BSpline>
where
    D: Into<PerDimension<usize>>,
    S: Into<PerDimension<KnotSpacing>>,
    N: Into<PerDimension<usize>>,
{
    Builder::new(data.dim_x(), data.dim_y())
        .degree(degrees)
        .knot_spacing(knot_spacing)
        .num_basis_functions(num_basis_functions)
        .unfitted(data)
}

fn check_grid(data: &DataTable) -> Result<()> {
    if data.is_empty() {
        return Err(ConfigurationError::EmptyTable.into());
    }
    if !data.is_grid_complete() {
        return Err(ConfigurationError::IncompleteGrid.into());
    }
    Ok(())
}
