//! RF cavity element for the moment beam-transport simulation.
//!
//! Field data and transit models, gap-by-gap phase/energy integration,
//! transfer-matrix construction, moment propagation and result caching.

pub mod cache;
pub mod cavity;
pub mod element;
pub mod field;
pub mod integrator;
pub mod lattice;
pub mod matrix;
pub mod moments;
pub mod registry;
pub mod sync_phase;
pub mod transit;

#[cfg(test)]
pub(crate) mod testing;
