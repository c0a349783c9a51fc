use crate::SearchContext;
use altermag::{is_altermagnet_in, AltermagError};
use log::{debug, warn};
use spin::{decode_candidate, SearchResult};

#[derive(Debug, Clone, PartialEq)]
pub enum CandidateOutcome {
    Accepted(SearchResult),
    Rejected,
    /// The assignment cannot be classified, e.g. an orbit is unbalanced.
    Invalid(AltermagError),
}

impl CandidateOutcome {
    pub fn is_valid(&self) -> bool {
        !matches!(self, CandidateOutcome::Invalid(_))
    }
}

/// Runs the exact classifier on candidate `id`.
pub fn evaluate_candidate(ctx: &SearchContext, id: u64) -> CandidateOutcome {
    let structure = ctx.get_structure();
    let spins = decode_candidate(id, ctx.get_magnetic_indices(), structure.get_n_atoms());

    match is_altermagnet_in(structure, ctx.get_orbits(), &spins, ctx.get_tolerance()) {
        Ok(true) => CandidateOutcome::Accepted(SearchResult::new(id, spins)),
        Ok(false) => CandidateOutcome::Rejected,
        Err(err) => {
            if err.is_candidate_invalid() {
                debug!("candidate {} skipped: {}", id, err);
            } else {
                warn!("candidate {} skipped: {}", id, err);
            }

            CandidateOutcome::Invalid(err)
        }
    }
}
