//! Linear interpolation and trapezoid quadrature on sampled 1-D tables.
//!
//! Tables are (axis, values) pairs with a strictly increasing axis. Queries
//! outside the axis are errors: the sampled range is authoritative and
//! nothing is extrapolated.

use beam_types::error::{BeamError, BeamResult};

/// Index `i` of the interval `[axis[i], axis[i+1]]` containing `x`.
///
/// Returns `None` outside the axis or for axes shorter than 2 samples.
pub fn locate(axis: &[f64], x: f64) -> Option<usize> {
    let n = axis.len();
    if n < 2 || !x.is_finite() || x < axis[0] || x > axis[n - 1] {
        return None;
    }
    // partition_point gives the first sample strictly greater than x
    let upper = axis.partition_point(|&s| s <= x);
    Some(upper.saturating_sub(1).min(n - 2))
}

/// Linear interpolation of `values` at `x`.
pub fn interp1d(axis: &[f64], values: &[f64], x: f64) -> BeamResult<f64> {
    if axis.len() != values.len() {
        return Err(BeamError::Configuration(format!(
            "interpolation table length mismatch: axis={}, values={}",
            axis.len(),
            values.len()
        )));
    }
    let i = locate(axis, x).ok_or_else(|| {
        BeamError::Configuration(format!(
            "lookup at {x} outside table range [{}, {}]",
            axis.first().copied().unwrap_or(f64::NAN),
            axis.last().copied().unwrap_or(f64::NAN)
        ))
    })?;
    let h = axis[i + 1] - axis[i];
    let t = (x - axis[i]) / h;
    Ok((1.0 - t) * values[i] + t * values[i + 1])
}

/// Trapezoid integral of `values(s) * weight(s)` over `[a, b]`.
///
/// Nodes are the table samples strictly inside the interval plus the two
/// interpolated end points, so sub-ranges of a table integrate exactly like
/// the full table does.
pub fn trapz_weighted<W>(axis: &[f64], values: &[f64], a: f64, b: f64, weight: W) -> BeamResult<f64>
where
    W: Fn(f64) -> f64,
{
    if !(a <= b) {
        return Err(BeamError::Configuration(format!(
            "integration bounds must satisfy a <= b, got [{a}, {b}]"
        )));
    }
    let fa = interp1d(axis, values, a)? * weight(a);
    let fb = interp1d(axis, values, b)? * weight(b);
    if a == b {
        return Ok(0.0);
    }

    let mut sum = 0.0;
    let mut s_prev = a;
    let mut f_prev = fa;
    for (&s, &v) in axis.iter().zip(values.iter()) {
        if s <= a || s >= b {
            continue;
        }
        let f = v * weight(s);
        sum += 0.5 * (f_prev + f) * (s - s_prev);
        s_prev = s;
        f_prev = f;
    }
    sum += 0.5 * (f_prev + fb) * (b - s_prev);
    Ok(sum)
}

/// Plain trapezoid integral of the table over `[a, b]`.
pub fn trapz(axis: &[f64], values: &[f64], a: f64, b: f64) -> BeamResult<f64> {
    trapz_weighted(axis, values, a, b, |_| 1.0)
}
