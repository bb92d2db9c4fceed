//! Library for fitting multivariate tensor-product B-splines to sampled data.
//! Splines either interpolate the samples or smooth them with a penalized least squares fit,
//! and can be evaluated together with their first and second derivatives.
//!
//! # Example
//! ```
//! use tensor_spline::{Builder, DataTable, KnotSpacing, Smoothing};
//! use assert_approx_eq::assert_approx_eq;
//!
//! let mut data = DataTable::new(2, 1);
//! for i in 0..=10 {
//!     for j in 0..=10 {
//!         let (x, y) = (i as f64 / 10.0, j as f64 / 10.0);
//!         data.add_sample(vec![x, y], vec![x * y + 1.0]).unwrap();
//!     }
//! }
//!
//! let spline = Builder::new(2, 1)
//!     .degree(vec![1, 2])
//!     .num_basis_functions(vec![4, 5])
//!     .knot_spacing(KnotSpacing::Equidistant)
//!     .smoothing(Smoothing::None)
//!     .fit(&data)
//!     .unwrap();
//!
//! assert_approx_eq!(1.12, spline.evaluate(&[0.3, 0.4]).unwrap()[0], 1e-9);
//! assert_approx_eq!(0.4, spline.evaluate_jacobian(&[0.3, 0.4]).unwrap()[(0, 0)], 1e-9);
//! assert!(spline.evaluate(&[1.2, 0.4]).is_err());
//! ```

mod basis;
mod builder;
mod data_table;
mod error;
mod fitter;
mod knot;
mod spline;
mod tensor;

pub use basis::{BasisFunction, BasisValues};
pub use builder::{interpolator, smoother, unfitted, Builder, PerDimension};
pub use data_table::{DataTable, Sample};
pub use error::{ConfigurationError, Result, SplineError};
pub use fitter::Smoothing;
pub use knot::{KnotSpacing, KnotVector};
pub use spline::BSpline;
pub use tensor::TensorBasis;
