use std::collections::HashMap;

use faer::linalg::solvers::Solve;
use faer::sparse::{SparseColMat, Triplet};
use faer::{Mat, Side};
use nalgebra::DMatrix;
use rayon::prelude::*;

use crate::data_table::DataTable;
use crate::error::{ConfigurationError, Result, SplineError};
use crate::knot::{KnotSpacing, KnotVector};
use crate::spline::BSpline;
use crate::tensor::TensorBasis;

/// Regularization applied when fitting control points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Smoothing {
    /// Plain least squares, or exact interpolation when there are as many samples as basis
    /// functions.
    #[default]
    None,
    /// Ridge penalty `alpha * I` on the coefficients.
    Identity,
    /// Squared second differences of neighbouring coefficients along every input dimension.
    PSpline,
}

/// Smallest accepted ratio between a diagonal entry and the largest diagonal entry of the system.
const PIVOT_TOLERANCE: f64 = 1e-12;

/// Fully resolved fitting options, one entry per input dimension where applicable.
#[derive(Debug, Clone)]
pub(crate) struct FitSettings<'a> {
    pub degrees: Vec<usize>,
    pub num_basis_functions: Vec<usize>,
    pub knot_spacing: Vec<KnotSpacing>,
    pub smoothing: Smoothing,
    pub alpha: f64,
    pub weights: Option<&'a [f64]>,
}

/// Lower triangle of a symmetric sparse matrix, keyed by (row, column) with row >= column.
type LowerTriangle = HashMap<(usize, usize), f64>;

pub(crate) fn build_knot_vectors(
    data: &DataTable,
    degrees: &[usize],
    num_basis_functions: &[usize],
    knot_spacing: &[KnotSpacing],
) -> Result<Vec<KnotVector>> {
    if data.is_empty() {
        return Err(ConfigurationError::EmptyTable.into());
    }
    (0..data.dim_x())
        .map(|dim| {
            KnotVector::build(
                dim,
                &data.abscissas(dim),
                degrees[dim],
                num_basis_functions[dim],
                &knot_spacing[dim],
            )
        })
        .collect()
}

pub(crate) fn fit(data: &DataTable, settings: &FitSettings) -> Result<BSpline> {
    if !(settings.alpha >= 0.0 && settings.alpha.is_finite()) {
        return Err(ConfigurationError::InvalidAlpha(settings.alpha).into());
    }
    let weights = match settings.weights {
        Some(weights) => Some(check_weights(weights, data.len())?),
        None => None,
    };

    let knot_vectors = build_knot_vectors(
        data,
        &settings.degrees,
        &settings.num_basis_functions,
        &settings.knot_spacing,
    )?;
    let basis = TensorBasis::new(knot_vectors)?;
    let num_basis = basis.num_basis_functions();
    log::debug!(
        "fitting {} samples with {} basis functions {:?}, smoothing {:?}, alpha {}",
        data.len(),
        num_basis,
        basis.num_basis_functions_per_dim(),
        settings.smoothing,
        settings.alpha
    );

    let rows = design_rows(&basis, data)?;
    let targets = DMatrix::from_fn(data.len(), data.dim_y(), |r, c| data.samples()[r].y()[c]);

    let control_points = if settings.smoothing == Smoothing::None && data.len() == num_basis {
        log::debug!("square design matrix, solving interpolation system");
        solve_interpolation(&rows, &targets, weights, num_basis)?
    } else {
        if settings.smoothing == Smoothing::None && data.len() < num_basis {
            log::warn!(
                "{} samples for {} basis functions without smoothing, system is likely singular",
                data.len(),
                num_basis
            );
        }
        let (mut lhs, rhs) = normal_equations(&rows, &targets, weights, num_basis);
        match settings.smoothing {
            Smoothing::None => {}
            Smoothing::Identity => {
                for i in 0..num_basis {
                    *lhs.entry((i, i)).or_insert(0.0) += settings.alpha;
                }
            }
            Smoothing::PSpline => for_each_second_difference(&basis, |i, j, value| {
                if i >= j {
                    *lhs.entry((i, j)).or_insert(0.0) += settings.alpha * value;
                }
            }),
        }
        solve_normal_equations(&lhs, &rhs)?
    };

    BSpline::from_basis(basis, control_points)
}

fn check_weights(weights: &[f64], num_samples: usize) -> Result<&[f64]> {
    if weights.len() != num_samples {
        return Err(ConfigurationError::SizeMismatch {
            option: "weights",
            expected: num_samples,
            found: weights.len(),
        }
        .into());
    }
    if let Some((index, value)) = weights
        .iter()
        .enumerate()
        .find(|(_, w)| !(w.is_finite() && **w >= 0.0))
    {
        return Err(ConfigurationError::InvalidWeight {
            index,
            value: *value,
        }
        .into());
    }
    Ok(weights)
}

/// Sparse rows of the design matrix, one per sample, evaluated in parallel.
fn design_rows(basis: &TensorBasis, data: &DataTable) -> Result<Vec<Vec<(usize, f64)>>> {
    data.samples()
        .par_iter()
        .map(|sample| basis.evaluate(sample.x()))
        .collect()
}

/// Solves the square system `W^(1/2) D c = W^(1/2) Y` with a sparse LU factorization.
fn solve_interpolation(
    rows: &[Vec<(usize, f64)>],
    targets: &DMatrix<f64>,
    weights: Option<&[f64]>,
    num_basis: usize,
) -> Result<DMatrix<f64>> {
    let singular = || SplineError::SingularSystem { size: num_basis };
    let scales: Vec<f64> = (0..rows.len())
        .map(|r| weights.map_or(1.0, |w| w[r].sqrt()))
        .collect();

    let triplets: Vec<Triplet<usize, usize, f64>> = rows
        .iter()
        .zip(&scales)
        .enumerate()
        .flat_map(|(r, (row, scale))| {
            row.iter()
                .map(move |(c, value)| (r, *c, scale * value))
                .filter(|(_, _, value)| *value != 0.0)
                .map(|(r, c, value)| Triplet::new(r, c, value))
        })
        .collect();
    let matrix = SparseColMat::<usize, f64>::try_new_from_triplets(num_basis, num_basis, &triplets)
        .map_err(|_| singular())?;
    log::debug!("design matrix has {} non-zero entries", triplets.len());

    let lu = matrix.as_ref().sp_lu().map_err(|_| singular())?;
    let rhs = Mat::from_fn(num_basis, targets.ncols(), |r, c| scales[r] * targets[(r, c)]);
    to_control_points(&lu.solve(rhs.as_ref())).ok_or_else(singular)
}

/// Accumulates the lower triangle of `D^T W D` and the dense `D^T W Y` from the sparse rows.
fn normal_equations(
    rows: &[Vec<(usize, f64)>],
    targets: &DMatrix<f64>,
    weights: Option<&[f64]>,
    num_basis: usize,
) -> (LowerTriangle, DMatrix<f64>) {
    let mut lhs = LowerTriangle::new();
    let mut rhs = DMatrix::<f64>::zeros(num_basis, targets.ncols());
    for (r, row) in rows.iter().enumerate() {
        let weight = weights.map_or(1.0, |w| w[r]);
        if weight == 0.0 {
            continue;
        }
        for (i, bi) in row {
            let wbi = weight * bi;
            for (j, bj) in row.iter().filter(|(j, _)| j <= i) {
                *lhs.entry((*i, *j)).or_insert(0.0) += wbi * bj;
            }
            for c in 0..targets.ncols() {
                rhs[(*i, c)] += wbi * targets[(r, c)];
            }
        }
    }
    (lhs, rhs)
}

/// Visits every entry `(i, j, value)` of `P^T P`, where each row of `P` is a second difference
/// `c[k] - 2 c[k + e_d] + c[k + 2 e_d]` along one input dimension `d`. Entries repeat and must
/// be summed.
fn for_each_second_difference<F>(basis: &TensorBasis, mut visit: F)
where
    F: FnMut(usize, usize, f64),
{
    const STENCIL: [f64; 3] = [1.0, -2.0, 1.0];
    let per_dim = basis.num_basis_functions_per_dim();

    for (dim, n) in per_dim.iter().enumerate() {
        if *n < 3 {
            continue;
        }
        let stride = basis.stride(dim);
        for k in 0..basis.num_basis_functions() {
            if (k / stride) % n > n - 3 {
                continue;
            }
            for (a, sa) in STENCIL.iter().enumerate() {
                for (b, sb) in STENCIL.iter().enumerate() {
                    visit(k + a * stride, k + b * stride, sa * sb);
                }
            }
        }
    }
}

/// Dense `P^T P` of [for_each_second_difference], used to measure coefficient roughness.
#[cfg(test)]
fn second_difference_penalty(basis: &TensorBasis) -> DMatrix<f64> {
    let n = basis.num_basis_functions();
    let mut penalty = DMatrix::zeros(n, n);
    for_each_second_difference(basis, |i, j, value| penalty[(i, j)] += value);
    penalty
}

/// Solves the symmetric system with a sparse Cholesky factorization of its lower triangle.
fn solve_normal_equations(lhs: &LowerTriangle, rhs: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    let size = rhs.nrows();
    let singular = || SplineError::SingularSystem { size };

    let diagonal: Vec<f64> = (0..size)
        .map(|i| lhs.get(&(i, i)).copied().unwrap_or(0.0))
        .collect();
    let largest = diagonal.iter().fold(0.0_f64, |m, d| m.max(*d));
    if largest == 0.0 || diagonal.iter().any(|d| *d <= PIVOT_TOLERANCE * largest) {
        return Err(singular());
    }

    let triplets: Vec<Triplet<usize, usize, f64>> = lhs
        .iter()
        .map(|(&(i, j), &value)| Triplet::new(i, j, value))
        .collect();
    let matrix = SparseColMat::<usize, f64>::try_new_from_triplets(size, size, &triplets)
        .map_err(|_| singular())?;
    log::debug!("normal equations have {} lower triangle entries", triplets.len());

    let llt = matrix.as_ref().sp_cholesky(Side::Lower).map_err(|_| singular())?;
    let b = Mat::from_fn(size, rhs.ncols(), |r, c| rhs[(r, c)]);
    to_control_points(&llt.solve(b.as_ref())).ok_or_else(singular)
}

/// Copies a solution into the coefficient matrix. A non-finite entry means a zero pivot.
fn to_control_points(solution: &Mat<f64>) -> Option<DMatrix<f64>> {
    let control_points =
        DMatrix::from_fn(solution.nrows(), solution.ncols(), |r, c| solution[(r, c)]);
    control_points.iter().all(|v| v.is_finite()).then_some(control_points)
}
