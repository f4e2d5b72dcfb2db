// ─────────────────────────────────────────────────────────────────────
// SCPN Beamline Core — Gap Transit Models
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Transit-time factors of the accelerating gaps.
//!
//! Two strategies share one interface: integrals over the sampled field
//! table (generic cavities) and polynomial fits in the ion wavenumber
//! (built-in cavity types). Both also evaluate the transverse multipole
//! factors for rows of the thin-lens lattice.

use crate::field::{CavityData, CavityType, GapFit};
use crate::lattice::ThinLensElement;
use beam_math::fit::poly_desc;
use beam_math::interp::trapz_weighted;
use beam_types::error::{BeamError, BeamResult};
use std::rc::Rc;

/// Transit description of one gap at one ion wavenumber.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GapParameters {
    /// Field centre measured from the gap segment start [m].
    pub ecen: f64,
    pub t: f64,
    pub tp: f64,
    pub s: f64,
    pub sp: f64,
    /// Gap voltage [V], field scale applied.
    pub v0: f64,
}

pub trait GapTransitModel {
    fn gap_count(&self) -> usize;

    /// Length of one gap segment [m].
    fn gap_length(&self) -> f64;

    fn transit_factors(
        &self,
        gap: usize,
        beta: f64,
        ion_k: f64,
        field_scale: f64,
    ) -> BeamResult<GapParameters>;

    /// `(T, S)` of a lattice multipole row at absolute position `position`.
    fn multipole_factors(
        &self,
        element: &ThinLensElement,
        position: f64,
        ion_k: f64,
    ) -> BeamResult<(f64, f64)>;
}

fn check_gap(gap: usize, count: usize) -> BeamResult<()> {
    if gap >= count {
        return Err(BeamError::Configuration(format!(
            "gap index {gap} out of range for a {count}-gap cavity"
        )));
    }
    Ok(())
}

fn fitted_row_factors(element: &ThinLensElement, ion_k: f64) -> (f64, f64) {
    (poly_desc(ion_k, &element.t_fit), poly_desc(ion_k, &element.s_fit))
}

/// Transit factors integrated from the sampled field.
#[derive(Debug, Clone)]
pub struct TabulatedTransit {
    data: Rc<CavityData>,
    abs_field: Vec<f64>,
}

impl TabulatedTransit {
    pub fn new(data: Rc<CavityData>) -> Self {
        let abs_field = data.field.e_long.iter().map(|e| e.abs()).collect();
        TabulatedTransit { data, abs_field }
    }

    /// `[a, b]` of gap `gap`; the table is split into equal segments.
    fn segment(&self, gap: usize) -> (f64, f64) {
        let field = &self.data.field;
        let dis = self.gap_length();
        let a = field.start() + gap as f64 * dis;
        let b = if gap + 1 == self.data.gap_count {
            field.end()
        } else {
            field.start() + (gap + 1) as f64 * dis
        };
        (a, b)
    }
}

impl GapTransitModel for TabulatedTransit {
    fn gap_count(&self) -> usize {
        self.data.gap_count
    }

    fn gap_length(&self) -> f64 {
        self.data.field.span() / self.data.gap_count as f64
    }

    fn transit_factors(
        &self,
        gap: usize,
        _beta: f64,
        ion_k: f64,
        field_scale: f64,
    ) -> BeamResult<GapParameters> {
        check_gap(gap, self.data.gap_count)?;
        let (a, b) = self.segment(gap);
        let field = &self.data.field;

        let abs_int = trapz_weighted(&field.s, &self.abs_field, a, b, |_| 1.0)?;
        if abs_int <= 0.0 {
            return Ok(GapParameters {
                ecen: 0.5 * (b - a),
                ..GapParameters::default()
            });
        }
        let centre = trapz_weighted(&field.s, &self.abs_field, a, b, |s| s)? / abs_int;

        let v = field.integrate_weighted(a, b, |_| 1.0)?;
        let params = if v.abs() <= 1e-12 * abs_int {
            // Antisymmetric gap: no net voltage, factors undefined.
            GapParameters {
                ecen: centre - a,
                ..GapParameters::default()
            }
        } else {
            let cos_int = field.integrate_weighted(a, b, |s| (ion_k * (s - centre)).cos())?;
            let sin_int = field.integrate_weighted(a, b, |s| (ion_k * (s - centre)).sin())?;
            let tp_int =
                field.integrate_weighted(a, b, |s| (s - centre) * (ion_k * (s - centre)).sin())?;
            let sp_int =
                field.integrate_weighted(a, b, |s| (s - centre) * (ion_k * (s - centre)).cos())?;
            GapParameters {
                ecen: centre - a,
                t: cos_int / v,
                tp: -tp_int / v,
                s: sin_int / v,
                sp: sp_int / v,
                v0: field_scale * v,
            }
        };
        Ok(params)
    }

    fn multipole_factors(
        &self,
        element: &ThinLensElement,
        position: f64,
        ion_k: f64,
    ) -> BeamResult<(f64, f64)> {
        let kind = element.kind()?;
        match self.data.multipoles.as_ref() {
            Some(table) if table.profile(kind).is_some() => {
                let t = table.integrate_weighted(kind, |s| (ion_k * (s - position)).cos())?;
                let s = table.integrate_weighted(kind, |s| (ion_k * (s - position)).sin())?;
                Ok((t, s))
            }
            _ => Ok(fitted_row_factors(element, ion_k)),
        }
    }
}

/// Transit factors from per-gap polynomial fits.
#[derive(Debug, Clone)]
pub struct FittedTransit {
    data: Rc<CavityData>,
}

impl FittedTransit {
    pub fn new(data: Rc<CavityData>) -> BeamResult<Self> {
        if data.gap_fits.is_empty() {
            return Err(BeamError::Configuration(
                "fitted transit model needs per-gap fits".to_string(),
            ));
        }
        Ok(FittedTransit { data })
    }

    fn fit(&self, gap: usize) -> BeamResult<&GapFit> {
        check_gap(gap, self.data.gap_fits.len())?;
        Ok(&self.data.gap_fits[gap])
    }
}

impl GapTransitModel for FittedTransit {
    fn gap_count(&self) -> usize {
        self.data.gap_fits.len()
    }

    fn gap_length(&self) -> f64 {
        self.data.field.span() / self.data.gap_fits.len() as f64
    }

    fn transit_factors(
        &self,
        gap: usize,
        beta: f64,
        ion_k: f64,
        field_scale: f64,
    ) -> BeamResult<GapParameters> {
        let fit = self.fit(gap)?;
        let [lo, hi] = fit.beta_range;
        if !(lo..=hi).contains(&beta) {
            return Err(BeamError::DataRange(format!(
                "beta {beta:.6} outside fitted range [{lo}, {hi}] of gap {gap}"
            )));
        }
        Ok(GapParameters {
            ecen: poly_desc(ion_k, &fit.ecen),
            t: poly_desc(ion_k, &fit.t),
            tp: poly_desc(ion_k, &fit.tp),
            s: poly_desc(ion_k, &fit.s),
            sp: poly_desc(ion_k, &fit.sp),
            v0: fit.v0 * field_scale,
        })
    }

    fn multipole_factors(
        &self,
        element: &ThinLensElement,
        _position: f64,
        ion_k: f64,
    ) -> BeamResult<(f64, f64)> {
        element.kind()?;
        Ok(fitted_row_factors(element, ion_k))
    }
}

/// Strategy selected by cavity type.
#[derive(Debug, Clone)]
pub enum TransitModel {
    Tabulated(TabulatedTransit),
    Fitted(FittedTransit),
}

impl TransitModel {
    /// Fits for built-in cavity types, field-table quadrature otherwise or
    /// when `force_tabulated` is set.
    pub fn select(cavity_type: CavityType, data: Rc<CavityData>, force_tabulated: bool) -> BeamResult<Self> {
        if cavity_type.is_builtin() && !force_tabulated {
            Ok(TransitModel::Fitted(FittedTransit::new(data)?))
        } else {
            Ok(TransitModel::Tabulated(TabulatedTransit::new(data)))
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TransitModel::Tabulated(_) => "tabulated",
            TransitModel::Fitted(_) => "fitted",
        }
    }
}

impl GapTransitModel for TransitModel {
    fn gap_count(&self) -> usize {
        match self {
            TransitModel::Tabulated(m) => m.gap_count(),
            TransitModel::Fitted(m) => m.gap_count(),
        }
    }

    fn gap_length(&self) -> f64 {
        match self {
            TransitModel::Tabulated(m) => m.gap_length(),
            TransitModel::Fitted(m) => m.gap_length(),
        }
    }

    fn transit_factors(
        &self,
        gap: usize,
        beta: f64,
        ion_k: f64,
        field_scale: f64,
    ) -> BeamResult<GapParameters> {
        match self {
            TransitModel::Tabulated(m) => m.transit_factors(gap, beta, ion_k, field_scale),
            TransitModel::Fitted(m) => m.transit_factors(gap, beta, ion_k, field_scale),
        }
    }

    fn multipole_factors(
        &self,
        element: &ThinLensElement,
        position: f64,
        ion_k: f64,
    ) -> BeamResult<(f64, f64)> {
        match self {
            TransitModel::Tabulated(m) => m.multipole_factors(element, position, ion_k),
            TransitModel::Fitted(m) => m.multipole_factors(element, position, ion_k),
        }
    }
}
