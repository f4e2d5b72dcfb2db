//! Closed-form fit evaluation.
//!
//! Transit-time and synchronous-phase data are distributed as fitted
//! coefficient vectors. Polynomials are stored highest power first.

/// Evaluate `c[0]·x^(n-1) + c[1]·x^(n-2) + … + c[n-1]` (Horner).
/// An empty coefficient list evaluates to zero.
pub fn poly_desc(x: f64, coeffs: &[f64]) -> f64 {
    coeffs.iter().fold(0.0, |acc, &c| acc * x + c)
}

/// Derivative of [`poly_desc`] with respect to `x`.
pub fn poly_desc_derivative(x: f64, coeffs: &[f64]) -> f64 {
    let n = coeffs.len();
    if n < 2 {
        return 0.0;
    }
    coeffs[..n - 1]
        .iter()
        .enumerate()
        .fold(0.0, |acc, (i, &c)| acc * x + c * (n - 1 - i) as f64)
}

/// Sum of exponentials `Σ a_i·exp(b_i·x)` over `[a0, b0, a1, b1, …]`.
/// A trailing unpaired coefficient is ignored.
pub fn exp_sum(x: f64, pairs: &[f64]) -> f64 {
    pairs
        .chunks_exact(2)
        .map(|p| p[0] * (p[1] * x).exp())
        .sum()
}
