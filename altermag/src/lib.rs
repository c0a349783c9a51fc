//! Altermagnet classification of spin-decorated crystal structures.
//!
//! Each symmetry orbit of atoms is examined separately. An orbit is
//! altermagnetic when its up and down sublattices are connected by some
//! crystal operation, but none of the connecting operations is inversion
//! or a pure lattice translation.

use thiserror::Error;

mod orbit;
mod structure;

pub use orbit::*;
pub use structure::*;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AltermagError {
    #[error("{positions} positions but {spins} spins")]
    LengthMismatch { positions: usize, spins: usize },

    #[error("Number of up spins should equal number of down spins: got {up} up and {down} down spins!")]
    UnbalancedSpins { orbit: usize, up: usize, down: usize },

    #[error("Something is wrong with the description of magnetic atoms! Have you provided a non-magnetic/ferromagnetic material?")]
    IllPosed,
}

impl AltermagError {
    /// A spin assignment that cannot be classified, as opposed to
    /// inconsistent inputs.
    pub fn is_candidate_invalid(&self) -> bool {
        matches!(
            self,
            AltermagError::UnbalancedSpins { .. } | AltermagError::IllPosed
        )
    }
}
