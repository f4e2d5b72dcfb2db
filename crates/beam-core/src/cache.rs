// ─────────────────────────────────────────────────────────────────────
// SCPN Beamline Core — Cavity Result Cache
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Memo of the last input state and everything derived from it.
//!
//! The key is a bit-exact snapshot of every kinematic field of the reference
//! and charge states, so a hit reproduces the previous output exactly.

use crate::lattice::LineTable;
use beam_types::constants::PS_DIM;
use beam_types::error::{BeamError, BeamResult};
use beam_types::state::{MomentState, ParticleState};
use ndarray::Array2;

/// Bit pattern of one particle's kinematic fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParticleSnapshot([u64; 10]);

impl From<&ParticleState> for ParticleSnapshot {
    fn from(p: &ParticleState) -> Self {
        ParticleSnapshot([
            p.ion_z.to_bits(),
            p.ion_q.to_bits(),
            p.ion_es.to_bits(),
            p.ion_w.to_bits(),
            p.ion_ek.to_bits(),
            p.gamma.to_bits(),
            p.beta.to_bits(),
            p.bg.to_bits(),
            p.sample_ion_k.to_bits(),
            p.phis.to_bits(),
        ])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    reference: ParticleSnapshot,
    particles: Vec<ParticleSnapshot>,
}

impl CacheKey {
    pub fn from_state(state: &MomentState) -> Self {
        CacheKey {
            reference: ParticleSnapshot::from(&state.ref_ion),
            particles: state.real.iter().map(ParticleSnapshot::from).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CavityCache {
    key: Option<CacheKey>,
    ref_in: Option<ParticleState>,
    real_in: Vec<ParticleState>,
    ref_out: Option<ParticleState>,
    real_out: Vec<ParticleState>,
    transfer: Vec<Array2<f64>>,
    misalign: Vec<Array2<f64>>,
    misalign_inv: Vec<Array2<f64>>,
    lines: Vec<LineTable>,
    hits: usize,
    misses: usize,
}

impl CavityCache {
    pub fn is_valid(&self, state: &MomentState) -> bool {
        self.key
            .as_ref()
            .is_some_and(|key| *key == CacheKey::from_state(state))
    }

    pub fn invalidate(&mut self) {
        self.key = None;
    }

    /// Record the inputs of a recomputation and size the per-state slots.
    /// The entry stays invalid until [`CavityCache::store_output`].
    pub fn begin(&mut self, state: &MomentState) {
        self.key = None;
        self.misses += 1;
        self.ref_in = Some(state.ref_ion.clone());
        self.real_in = state.real.clone();
        self.resize(state.size());
    }

    pub fn resize(&mut self, n: usize) {
        self.transfer.resize(n, Array2::eye(PS_DIM));
        self.misalign.resize(n, Array2::eye(PS_DIM));
        self.misalign_inv.resize(n, Array2::eye(PS_DIM));
        self.lines.resize(n, LineTable::default());
    }

    pub fn set_transfer(&mut self, i: usize, matrix: Array2<f64>, line: LineTable) {
        self.transfer[i] = matrix;
        self.lines[i] = line;
    }

    pub fn set_misalignment(&mut self, i: usize, matrix: Array2<f64>, inverse: Array2<f64>) {
        self.misalign[i] = matrix;
        self.misalign_inv[i] = inverse;
    }

    /// Store the outputs and mark the entry valid for the recorded inputs.
    pub fn store_output(&mut self, state: &MomentState) -> BeamResult<()> {
        let (Some(ref_in), n) = (self.ref_in.as_ref(), self.real_in.len()) else {
            return Err(BeamError::CacheConsistency {
                cached: 0,
                incoming: state.size(),
            });
        };
        if n != state.size() {
            return Err(BeamError::CacheConsistency {
                cached: n,
                incoming: state.size(),
            });
        }
        self.key = Some(CacheKey {
            reference: ParticleSnapshot::from(ref_in),
            particles: self.real_in.iter().map(ParticleSnapshot::from).collect(),
        });
        self.ref_out = Some(state.ref_ion.clone());
        self.real_out = state.real.clone();
        Ok(())
    }

    /// Restore the cached outputs into `state` on a hit.
    pub fn restore_output(&mut self, state: &mut MomentState) -> BeamResult<()> {
        self.check_consistency(state.size())?;
        let ref_out = self.ref_out.as_ref().ok_or(BeamError::CacheConsistency {
            cached: 0,
            incoming: state.size(),
        })?;
        state.ref_ion = ref_out.clone();
        state.real.clone_from(&self.real_out);
        self.hits += 1;
        Ok(())
    }

    /// Every per-state slot must match the state count.
    pub fn check_consistency(&self, n: usize) -> BeamResult<()> {
        for cached in [
            self.transfer.len(),
            self.misalign.len(),
            self.misalign_inv.len(),
            self.lines.len(),
        ] {
            if cached != n {
                return Err(BeamError::CacheConsistency { cached, incoming: n });
            }
        }
        if self.key.is_some() && self.real_out.len() != n {
            return Err(BeamError::CacheConsistency {
                cached: self.real_out.len(),
                incoming: n,
            });
        }
        Ok(())
    }

    pub fn transfer(&self) -> &[Array2<f64>] {
        &self.transfer
    }

    pub fn misalign(&self) -> &[Array2<f64>] {
        &self.misalign
    }

    pub fn misalign_inverse(&self) -> &[Array2<f64>] {
        &self.misalign_inv
    }

    pub fn lines(&self) -> &[LineTable] {
        &self.lines
    }

    pub fn real_in(&self) -> &[ParticleState] {
        &self.real_in
    }

    pub fn real_out(&self) -> &[ParticleState] {
        &self.real_out
    }

    pub fn ref_in(&self) -> Option<&ParticleState> {
        self.ref_in.as_ref()
    }

    pub fn ref_out(&self) -> Option<&ParticleState> {
        self.ref_out.as_ref()
    }

    /// (hits, misses) since construction.
    pub fn stats(&self) -> (usize, usize) {
        (self.hits, self.misses)
    }
}
