// ─────────────────────────────────────────────────────────────────────
// SCPN Beamline Core — Safeguarded Newton Iteration
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Scalar Newton–Raphson with a step cap.
//!
//!   x_{k+1} = x_k − clamp(f(x_k)/f'(x_k), −max_step, max_step)
//!
//! Failure to reach `|f| <= tol` within `max_iters`, a vanishing derivative,
//! or a non-finite iterate is reported as `NumericConvergence`; the caller
//! decides whether to retry from another starting point.

use beam_types::error::{BeamError, BeamResult};

#[derive(Debug, Clone, Copy)]
pub struct NewtonConfig {
    pub max_iters: usize,
    pub tol: f64,
    pub max_step: f64,
}

impl Default for NewtonConfig {
    fn default() -> Self {
        Self {
            max_iters: 50,
            tol: 1e-12,
            max_step: 0.5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewtonResult {
    pub root: f64,
    pub iterations: usize,
    pub residual: f64,
}

pub fn newton_solve<F, D>(f: F, df: D, x0: f64, cfg: &NewtonConfig) -> BeamResult<NewtonResult>
where
    F: Fn(f64) -> f64,
    D: Fn(f64) -> f64,
{
    if !x0.is_finite() {
        return Err(BeamError::NumericConvergence {
            iterations: 0,
            message: format!("initial guess must be finite, got {x0}"),
        });
    }
    let mut x = x0;
    let mut iteration = 0;
    loop {
        let fx = f(x);
        if !fx.is_finite() {
            return Err(BeamError::NumericConvergence {
                iterations: iteration,
                message: format!("residual became non-finite at x = {x}"),
            });
        }
        if fx.abs() <= cfg.tol {
            return Ok(NewtonResult {
                root: x,
                iterations: iteration,
                residual: fx,
            });
        }
        if iteration == cfg.max_iters {
            return Err(BeamError::NumericConvergence {
                iterations: iteration,
                message: format!("residual {fx:e} above tolerance {:e}", cfg.tol),
            });
        }
        let dfx = df(x);
        if !dfx.is_finite() || dfx.abs() < 1e-300 {
            return Err(BeamError::NumericConvergence {
                iterations: iteration,
                message: format!("derivative vanished at x = {x}"),
            });
        }
        let step = (fx / dfx).clamp(-cfg.max_step, cfg.max_step);
        x -= step;
        iteration += 1;
    }
}
