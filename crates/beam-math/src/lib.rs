//! Numeric primitives for SCPN Beamline Core.

pub mod fit;
pub mod interp;
pub mod linalg;
pub mod roots;
