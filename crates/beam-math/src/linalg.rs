//! Linear algebra utilities for phase-space maps.
//!
//! Congruence transport, symmetry checks, and a Jacobi eigenvalue sweep for
//! the small symmetric matrices (7x7 covariances) used by the moment model.

use ndarray::{Array1, Array2};

/// Congruence transform `M · Σ · Mᵀ`.
///
/// Used for covariance transport; preserves symmetry and positive
/// semi-definiteness of `sigma` up to rounding.
pub fn congruence(m: &Array2<f64>, sigma: &Array2<f64>) -> Array2<f64> {
    m.dot(sigma).dot(&m.t())
}

/// Largest |a_ij − a_ji|.
pub fn max_asymmetry(a: &Array2<f64>) -> f64 {
    let (n, m) = a.dim();
    let mut worst: f64 = 0.0;
    for i in 0..n.min(m) {
        for j in (i + 1)..n.min(m) {
            worst = worst.max((a[[i, j]] - a[[j, i]]).abs());
        }
    }
    worst
}

/// True when `a` is square and symmetric within `tol` relative to its
/// largest entry.
pub fn is_symmetric(a: &Array2<f64>, tol: f64) -> bool {
    let (n, m) = a.dim();
    if n != m {
        return false;
    }
    let scale = a.iter().fold(0.0f64, |acc, v| acc.max(v.abs())).max(1e-300);
    max_asymmetry(a) <= tol * scale
}

/// Eigenvalues of a symmetric matrix by cyclic Jacobi rotations, ascending.
///
/// Intended for small matrices; the input is assumed symmetric and only its
/// upper triangle drives the rotations.
pub fn sym_eigenvalues(a: &Array2<f64>) -> Array1<f64> {
    let n = a.nrows();
    let mut w = a.clone();
    let max_iter = 100;

    for _ in 0..max_iter {
        let mut off_diag = 0.0;
        for i in 0..n {
            for j in (i + 1)..n {
                off_diag += w[[i, j]].abs();
            }
        }
        let diag_scale = (0..n).fold(0.0f64, |acc, i| acc.max(w[[i, i]].abs()));
        if off_diag <= 1e-14 * diag_scale.max(1e-300) {
            break;
        }

        for i in 0..n {
            for j in (i + 1)..n {
                if w[[i, j]].abs() < 1e-300 {
                    continue;
                }
                let tau = (w[[j, j]] - w[[i, i]]) / (2.0 * w[[i, j]]);
                let t = if tau >= 0.0 {
                    1.0 / (tau + (1.0 + tau * tau).sqrt())
                } else {
                    -1.0 / (-tau + (1.0 + tau * tau).sqrt())
                };
                let cos = 1.0 / (1.0 + t * t).sqrt();
                let sin = t * cos;

                let wii = w[[i, i]];
                let wjj = w[[j, j]];
                let wij = w[[i, j]];
                w[[i, i]] = cos * cos * wii - 2.0 * sin * cos * wij + sin * sin * wjj;
                w[[j, j]] = sin * sin * wii + 2.0 * sin * cos * wij + cos * cos * wjj;
                w[[i, j]] = 0.0;
                w[[j, i]] = 0.0;

                for r in 0..n {
                    if r == i || r == j {
                        continue;
                    }
                    let ri = w[[r, i]];
                    let rj = w[[r, j]];
                    w[[r, i]] = cos * ri - sin * rj;
                    w[[i, r]] = w[[r, i]];
                    w[[r, j]] = sin * ri + cos * rj;
                    w[[j, r]] = w[[r, j]];
                }
            }
        }
    }

    let mut vals: Vec<f64> = (0..n).map(|i| w[[i, i]]).collect();
    vals.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    Array1::from_vec(vals)
}

/// Symmetric positive semi-definite within `tol` (relative to the largest
/// eigenvalue magnitude).
pub fn is_positive_semidefinite(a: &Array2<f64>, tol: f64) -> bool {
    let vals = sym_eigenvalues(a);
    let scale = vals.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
    vals.iter().all(|&v| v >= -tol * scale.max(1e-300))
}
