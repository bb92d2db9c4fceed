use std::cmp::Ordering;

use crate::error::{ConfigurationError, Result};
use crate::knot::unique_sorted;

/// One observation: an input point and the function value at it.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    x: Vec<f64>,
    y: Vec<f64>,
}

impl Sample {
    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn y(&self) -> &[f64] {
        &self.y
    }
}

/// Ordered table of samples with fixed input and output sizes.
#[derive(Debug, Clone, PartialEq)]
pub struct DataTable {
    dim_x: usize,
    dim_y: usize,
    samples: Vec<Sample>,
}

impl DataTable {
    pub fn new(dim_x: usize, dim_y: usize) -> Self {
        DataTable {
            dim_x,
            dim_y,
            samples: Vec::new(),
        }
    }

    /// Appends a sample.
    /// # Example
    /// ```
    /// use tensor_spline::DataTable;
    ///
    /// let mut table = DataTable::new(2, 1);
    /// assert!(table.add_sample(vec![0.0, 1.0], vec![2.0]).is_ok());
    /// assert!(table.add_sample(vec![0.0], vec![2.0]).is_err());
    /// assert!(table.add_sample(vec![0.0, f64::NAN], vec![2.0]).is_err());
    /// ```
    pub fn add_sample(&mut self, x: Vec<f64>, y: Vec<f64>) -> Result<()> {
        for (expected, found) in [(self.dim_x, x.len()), (self.dim_y, y.len())] {
            if expected != found {
                return Err(ConfigurationError::DimensionMismatch { expected, found }.into());
            }
        }
        if x.iter().chain(&y).any(|v| !v.is_finite()) {
            return Err(ConfigurationError::NonFiniteSample.into());
        }
        self.samples.push(Sample { x, y });
        Ok(())
    }

    pub fn dim_x(&self) -> usize {
        self.dim_x
    }

    pub fn dim_y(&self) -> usize {
        self.dim_y
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Values of input `dim` in sample order.
    pub fn abscissas(&self, dim: usize) -> Vec<f64> {
        self.samples.iter().map(|s| s.x[dim]).collect()
    }

    /// Sorted distinct values of input `dim`.
    pub fn unique_abscissas(&self, dim: usize) -> Vec<f64> {
        unique_sorted(&self.abscissas(dim))
    }

    pub fn min(&self, dim: usize) -> Option<f64> {
        self.samples.iter().map(|s| s.x[dim]).min_by(f64::total_cmp)
    }

    pub fn max(&self, dim: usize) -> Option<f64> {
        self.samples.iter().map(|s| s.x[dim]).max_by(f64::total_cmp)
    }

    /// True when the distinct input points are exactly the cartesian product of the distinct
    /// values in every dimension.
    pub fn is_grid_complete(&self) -> bool {
        if self.samples.is_empty() {
            return false;
        }

        let mut points: Vec<&[f64]> = self.samples.iter().map(|s| s.x.as_slice()).collect();
        points.sort_by(|a, b| lexicographic(a, b));
        points.dedup();

        let grid_size = (0..self.dim_x)
            .map(|dim| self.unique_abscissas(dim).len())
            .try_fold(1usize, |acc, n| acc.checked_mul(n));
        grid_size == Some(points.len())
    }
}

fn lexicographic(a: &[f64], b: &[f64]) -> Ordering {
    a.iter()
        .zip(b)
        .map(|(x, y)| x.total_cmp(y))
        .find(|o| o.is_ne())
        .unwrap_or(Ordering::Equal)
}
