use thiserror::Error;

pub type Result<T> = std::result::Result<T, SplineError>;

/// Errors raised while building, fitting or evaluating a B-spline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SplineError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(#[from] ConfigurationError),

    #[error(
        "dimension {dim}: knot vector violates the Schoenberg-Whitney condition, \
         no sample supports basis function {basis_index}"
    )]
    IllConditionedKnots { dim: usize, basis_index: usize },

    #[error("value {value} in dimension {dim} is outside of the domain [{lower}, {upper}]")]
    OutOfDomain {
        dim: usize,
        value: f64,
        lower: f64,
        upper: f64,
    },

    #[error("linear system of size {size} is singular or not positive definite")]
    SingularSystem { size: usize },
}

/// Reasons a configuration or input is rejected before any numeric work.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("expected {option} of length {expected}, got {found}")]
    SizeMismatch {
        option: &'static str,
        expected: usize,
        found: usize,
    },

    #[error(
        "dimension {dim}: {requested} basis functions requested, degree {degree} needs at least {}",
        .degree + 1
    )]
    TooFewBasisFunctions {
        dim: usize,
        degree: usize,
        requested: usize,
    },

    #[error("dimension {dim} has no samples")]
    EmptyDimension { dim: usize },

    #[error("dimension {dim} has zero width range (all samples equal {value})")]
    DegenerateRange { dim: usize, value: f64 },

    #[error("dimension {dim}: knots are not non-decreasing at index {index}")]
    NonMonotonicKnots { dim: usize, index: usize },

    #[error("dimension {dim}: interior knot {knot} is not strictly inside the data range")]
    KnotOutsideDomain { dim: usize, knot: f64 },

    #[error("dimension {dim}: knot {knot} repeated {multiplicity} times, at most {max} allowed")]
    KnotMultiplicity {
        dim: usize,
        knot: f64,
        multiplicity: usize,
        max: usize,
    },

    #[error(
        "dimension {dim}: as-sampled spacing needs one basis function per distinct sample \
         ({unique}), got {requested}"
    )]
    AsSampledBasisCount {
        dim: usize,
        unique: usize,
        requested: usize,
    },

    #[error("weight {index} is {value}, weights must be finite and non-negative")]
    InvalidWeight { index: usize, value: f64 },

    #[error("alpha must be finite and non-negative, got {0}")]
    InvalidAlpha(f64),

    #[error("expected a vector of length {expected}, got {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("sample contains a non-finite value")]
    NonFiniteSample,

    #[error("data table has no samples")]
    EmptyTable,

    #[error("samples do not form a complete regular grid")]
    IncompleteGrid,

    #[error("expected {expected} control points, got {found}")]
    ControlPointCount { expected: usize, found: usize },
}

impl SplineError {
    /// Attaches the input dimension to an error raised by a univariate basis.
    pub(crate) fn in_dimension(self, dim: usize) -> Self {
        match self {
            SplineError::OutOfDomain {
                value, lower, upper, ..
            } => SplineError::OutOfDomain {
                dim,
                value,
                lower,
                upper,
            },
            SplineError::IllConditionedKnots { basis_index, .. } => {
                SplineError::IllConditionedKnots { dim, basis_index }
            }
            other => other,
        }
    }
}
