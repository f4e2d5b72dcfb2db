// ─────────────────────────────────────────────────────────────────────
// SCPN Beamline Core — RF Cavity Element
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! RF accelerating cavity for the moment simulation.
//!
//! One `advance` call:
//! 1. reloads the cavity data when its type or data file changed,
//! 2. on a cache miss, phases the reference ion, boosts every charge state
//!    and rebuilds its transfer and misalignment matrices,
//! 3. on a hit, restores the previous output kinematics,
//! 4. propagates the moments and refreshes the beam envelope.

use crate::cache::CavityCache;
use crate::element::Element;
use crate::field::{CavityData, CavityType};
use crate::integrator::PhaseEnergyIntegrator;
use crate::lattice::LineTable;
use crate::matrix::TransferMatrixBuilder;
use crate::moments::{Misalignment, MomentPropagator};
use crate::registry::{CavityRegistry, DataSourceKey};
use crate::sync_phase::SyncPhaseSolver;
use crate::transit::{GapParameters, GapTransitModel, TransitModel};
use beam_types::config::CavityConfig;
use beam_types::error::{BeamError, BeamResult};
use beam_types::state::{MomentState, ParticleState};
use log::{debug, info};
use ndarray::Array2;
use std::cell::RefCell;
use std::rc::Rc;

pub struct RfCavity {
    config: CavityConfig,
    cavity_type: CavityType,
    registry: Rc<RefCell<CavityRegistry>>,
    source: DataSourceKey,
    data: Rc<CavityData>,
    model: TransitModel,
    sync: SyncPhaseSolver,
    aperture: f64,
    cache: CavityCache,
    driven_phase: f64,
}

impl RfCavity {
    pub fn new(config: CavityConfig, registry: Rc<RefCell<CavityRegistry>>) -> BeamResult<Self> {
        config.validate()?;
        let source = DataSourceKey::from_config(&config);
        let cavity_type: CavityType = config.cavity_type.parse()?;
        let data = load_data(&registry, &config, cavity_type, &source, false)?;
        let model = TransitModel::select(cavity_type, Rc::clone(&data), config.force_ttf_calc)?;
        let sync = SyncPhaseSolver::from_config(&config)?;
        let aperture = resolve_aperture(&config, cavity_type)?;
        debug!(
            "cavity '{}' ({}, {} model, {} gaps)",
            config.name,
            cavity_type.as_str(),
            model.label(),
            model.gap_count()
        );
        Ok(RfCavity {
            config,
            cavity_type,
            registry,
            source,
            data,
            model,
            sync,
            aperture,
            cache: CavityCache::default(),
            driven_phase: 0.0,
        })
    }

    pub fn config(&self) -> &CavityConfig {
        &self.config
    }

    /// Swap in a new configuration. Data for a changed type or file are
    /// reloaded (and length-checked) on the next `advance`; cached results
    /// are always dropped. A rejected configuration leaves the cavity as it
    /// was.
    pub fn reconfigure(&mut self, config: CavityConfig) -> BeamResult<()> {
        config.validate()?;
        let cavity_type: CavityType = config.cavity_type.parse()?;
        let sync = SyncPhaseSolver::from_config(&config)?;
        let aperture = resolve_aperture(&config, cavity_type)?;
        if DataSourceKey::from_config(&config) == self.source {
            self.data.check_length(config.length)?;
            if config.force_ttf_calc != self.config.force_ttf_calc {
                self.model = TransitModel::select(cavity_type, Rc::clone(&self.data), config.force_ttf_calc)?;
            }
        }
        self.aperture = aperture;
        self.sync = sync;
        self.config = config;
        self.cache.invalidate();
        Ok(())
    }

    fn reload(&mut self) -> BeamResult<()> {
        let source = DataSourceKey::from_config(&self.config);
        let cavity_type: CavityType = self.config.cavity_type.parse()?;
        info!(
            "cavity '{}': data source changed to {} {:?}, reloading",
            self.config.name, source.cavity_type, source.data_file
        );
        let data = load_data(&self.registry, &self.config, cavity_type, &source, true)?;
        self.model = TransitModel::select(cavity_type, Rc::clone(&data), self.config.force_ttf_calc)?;
        self.data = data;
        self.cavity_type = cavity_type;
        self.source = source;
        self.cache.invalidate();
        Ok(())
    }

    pub fn cavity_type(&self) -> CavityType {
        self.cavity_type
    }

    pub fn transit_model(&self) -> &TransitModel {
        &self.model
    }

    /// Driven phase of the last recomputation [rad].
    pub fn driven_phase(&self) -> f64 {
        self.driven_phase
    }

    pub fn transfer_matrices(&self) -> &[Array2<f64>] {
        self.cache.transfer()
    }

    pub fn line_tables(&self) -> &[LineTable] {
        self.cache.lines()
    }

    pub fn is_cached(&self, state: &MomentState) -> bool {
        self.cache.is_valid(state)
    }

    /// (hits, misses) of the result cache.
    pub fn cache_stats(&self) -> (usize, usize) {
        self.cache.stats()
    }

    /// Transit factors of `gap` for `particle` at the cavity wavelength.
    pub fn transit_factors(&self, gap: usize, particle: &ParticleState) -> BeamResult<GapParameters> {
        let k = 2.0 * std::f64::consts::PI / (particle.beta * self.config.lambda());
        self.model
            .transit_factors(gap, particle.beta, k, self.config.field_scale)
    }

    /// Phase the reference ion and carry it through the field; returns the
    /// driven phase.
    fn propagate_reference(&self, reference: &mut ParticleState) -> BeamResult<f64> {
        let harmonic = self.config.harmonic();
        let driven = self
            .sync
            .driven_phase(reference, self.config.sync_phase_rad())?;
        let phase_in = harmonic * reference.phis + driven;
        let phase_out =
            self.data
                .field
                .boost(reference, phase_in, self.config.field_scale, self.config.lambda())?;
        reference.phis += (phase_out - phase_in) / harmonic;
        Ok(driven)
    }

    /// Boost one charge state and build its transfer matrix.
    fn init_charge_state(
        &self,
        particle: &mut ParticleState,
        driven: f64,
    ) -> BeamResult<(Array2<f64>, LineTable)> {
        let harmonic = self.config.harmonic();
        let scale = self.config.field_scale;
        let lambda = self.config.lambda();
        let phase_in = harmonic * particle.phis + driven;
        let w_in = particle.ion_w;

        let phase_out = self.data.field.boost(particle, phase_in, scale, lambda)?;
        particle.phis += (phase_out - phase_in) / harmonic;

        let trajectory = PhaseEnergyIntegrator::new(
            &self.model,
            particle,
            w_in,
            phase_in,
            particle.ion_w,
            lambda,
            scale,
        )?
        .run()?;

        let builder = TransferMatrixBuilder::new(
            &self.model,
            &self.data.lattice,
            self.data.field.start(),
            self.aperture,
            self.config.multipole_level,
            scale,
        );
        let mut line = LineTable::default();
        let matrix = builder.build(particle, &trajectory, &mut line)?;
        Ok((matrix, line))
    }
}

impl Element for RfCavity {
    fn type_tag(&self) -> &'static str {
        "rfcavity"
    }

    fn advance(&mut self, state: &mut MomentState) -> BeamResult<()> {
        state.recalc();

        if DataSourceKey::from_config(&self.config) != self.source {
            self.reload()?;
        }

        if self.cache.is_valid(state) {
            debug!("cavity '{}': cache hit", self.config.name);
            self.cache.restore_output(state)?;
        } else {
            debug!("cavity '{}': recomputing {} charge states", self.config.name, state.size());
            self.cache.begin(state);
            self.recompute(state)?;
            let misalignment = Misalignment::from(self.config.misalignment);
            for i in 0..state.size() {
                self.cache
                    .set_misalignment(i, misalignment.matrix(), misalignment.inverse());
            }
            state.recalc();
            self.cache.store_output(state)?;
        }

        state.pos += self.config.length;

        MomentPropagator {
            emittance_growth: self.config.emittance_growth,
            sync_phase: self.config.sync_phase_rad(),
            lambda: self.config.lambda(),
        }
        .propagate(state, &self.cache)?;

        state.last_cavity_phase_deg = self.driven_phase.to_degrees() % 360.0;
        state.calc_rms();
        Ok(())
    }

    /// Rebuild the transfer matrices for `state`. The stored result no
    /// longer matches any input afterwards; `state` is only updated when
    /// every charge state succeeds.
    fn recompute(&mut self, state: &mut MomentState) -> BeamResult<()> {
        self.cache.invalidate();
        let mut reference = state.ref_ion.clone();
        let driven = self.propagate_reference(&mut reference)?;

        let mut real = state.real.clone();
        let mut maps = Vec::with_capacity(real.len());
        for particle in real.iter_mut() {
            // the field walk starts from the sampling wavenumber; keep the
            // caller's value
            let saved_k = particle.sample_ion_k;
            maps.push(self.init_charge_state(particle, driven)?);
            particle.sample_ion_k = saved_k;
        }

        self.cache.resize(real.len());
        for (i, (matrix, line)) in maps.into_iter().enumerate() {
            self.cache.set_transfer(i, matrix, line);
        }
        self.driven_phase = driven;
        state.ref_ion = reference;
        state.real = real;
        state.recalc();
        Ok(())
    }
}

fn resolve_aperture(config: &CavityConfig, cavity_type: CavityType) -> BeamResult<f64> {
    config
        .aperture
        .or_else(|| cavity_type.default_aperture())
        .ok_or_else(|| {
            BeamError::Configuration(format!(
                "cavity '{}': {} cavities need an aperture (Rm)",
                config.name,
                cavity_type.as_str()
            ))
        })
}

fn load_data(
    registry: &Rc<RefCell<CavityRegistry>>,
    config: &CavityConfig,
    cavity_type: CavityType,
    source: &DataSourceKey,
    fresh: bool,
) -> BeamResult<Rc<CavityData>> {
    if !cavity_type.is_builtin() && source.data_file.is_none() {
        return Err(BeamError::Configuration(format!(
            "cavity '{}': Generic cavities need a datafile",
            config.name
        )));
    }
    let data = {
        let mut registry = registry.borrow_mut();
        if fresh {
            registry.reload(source)?
        } else {
            registry.load(source)?
        }
    };
    data.check_length(config.length)?;
    Ok(data)
}
