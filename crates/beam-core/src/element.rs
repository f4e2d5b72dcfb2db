//! Beamline element interface.

use beam_types::error::BeamResult;
use beam_types::state::MomentState;

/// A beamline element that transports a [`MomentState`] in place.
pub trait Element {
    /// Short type name, e.g. `"rfcavity"`.
    fn type_tag(&self) -> &'static str;

    /// Transport `state` through the element.
    fn advance(&mut self, state: &mut MomentState) -> BeamResult<()>;

    /// Rebuild the transfer maps for `state`, updating its reference and
    /// charge-state kinematics to the element exit.
    fn recompute(&mut self, state: &mut MomentState) -> BeamResult<()>;
}
