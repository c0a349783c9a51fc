//! Search over collinear spin assignments of the magnetic sublattice.
//!
//! Every magnetic atom is either up or down, so a structure with `M`
//! magnetic atoms has `2^M` candidates. Candidate `id` puts atom
//! `magnetic[i]` down when bit `i` of `id` is set.

use amconsts::*;
use crystal::{CrystalStructure, Orbit};
use spin::{MagneticElements, SearchResult};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

mod accelerator;
mod backend;
mod candidate;
mod progress;
mod search;

pub use accelerator::*;
pub use backend::*;
pub use candidate::*;
pub use progress::*;
pub use search::*;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("No magnetic atoms found in the structure: nothing to search")]
    NoMagneticAtoms,

    #[error("{n} magnetic atoms exceed the supported maximum of {max}")]
    TooManyMagneticAtoms { n: usize, max: usize },

    #[error(transparent)]
    Backend(#[from] BackendError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("cannot build thread pool: {0}")]
    ThreadPool(String),

    #[error("accelerator unavailable: {0}")]
    Unavailable(String),

    #[error("device tables need {required} bytes, budget is {budget} bytes")]
    MemoryBudget { required: usize, budget: usize },

    #[error("operation {op} does not permute the magnetic sites")]
    NotAPermutation { op: usize },

    #[error("candidate {id} lies outside the {n_magnetic}-site candidate space")]
    BatchOverflow { id: u64, n_magnetic: usize },
}

/// Read-only state shared by all workers of one search.
#[derive(Debug, Clone)]
pub struct SearchContext<'a> {
    structure: &'a CrystalStructure,
    orbits: Vec<Orbit>,
    magnetic: Vec<usize>,
    tolerance: f64,
}

impl<'a> SearchContext<'a> {
    pub fn new(
        structure: &'a CrystalStructure,
        elements: &MagneticElements,
        tolerance: f64,
    ) -> Result<SearchContext<'a>, SearchError> {
        let magnetic = elements.magnetic_indices(&structure.get_chemical_symbols());

        if magnetic.is_empty() {
            return Err(SearchError::NoMagneticAtoms);
        }

        if magnetic.len() > MAX_MAGNETIC_ATOMS {
            return Err(SearchError::TooManyMagneticAtoms {
                n: magnetic.len(),
                max: MAX_MAGNETIC_ATOMS,
            });
        }

        Ok(SearchContext {
            structure,
            orbits: structure.get_orbits(),
            magnetic,
            tolerance,
        })
    }

    pub fn get_structure(&self) -> &CrystalStructure {
        self.structure
    }

    pub fn get_orbits(&self) -> &[Orbit] {
        &self.orbits
    }

    pub fn get_magnetic_indices(&self) -> &[usize] {
        &self.magnetic
    }

    pub fn get_n_magnetic(&self) -> usize {
        self.magnetic.len()
    }

    pub fn get_tolerance(&self) -> f64 {
        self.tolerance
    }

    /// `2^M`
    pub fn get_n_candidates(&self) -> u64 {
        1u64 << self.magnetic.len()
    }

    pub fn display(&self) {
        println!("   {:-^88}", " magnetic atoms ");
        println!();

        for (i, iat) in self.magnetic.iter().enumerate() {
            let at = self.structure.get_atom(*iat);
            let p = at.get_position();

            println!(
                "   Mag {:>2} (Atom {:>2}): {:>2} at ({:>9.6}, {:>9.6}, {:>9.6})",
                i + 1,
                iat + 1,
                at.get_symbol(),
                p.x,
                p.y,
                p.z
            );
        }

        println!();
        println!(
            "   {:<width1$} = {:>width2$}",
            "n_magnetic",
            self.get_n_magnetic(),
            width1 = OUT_WIDTH1,
            width2 = OUT_WIDTH2
        );
        println!(
            "   {:<width1$} = {:>width2$}",
            "n_candidates",
            self.get_n_candidates(),
            width1 = OUT_WIDTH1,
            width2 = OUT_WIDTH2
        );
        println!();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMethod {
    Exhaustive,
    Sampling,
}

impl fmt::Display for SearchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchMethod::Exhaustive => write!(f, "exhaustive"),
            SearchMethod::Sampling => write!(f, "sampling"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conclusion {
    Found(usize),
    NotAltermagnetic,
    /// Sampling hit nothing, which does not rule altermagnetism out.
    NoneFoundInSample,
}

impl fmt::Display for Conclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Conclusion::Found(n) => write!(f, "{} altermagnetic configurations found", n),
            Conclusion::NotAltermagnetic => write!(f, "not altermagnetic"),
            Conclusion::NoneFoundInSample => write!(f, "none found in sample"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub method: SearchMethod,
    pub backend: String,
    pub n_magnetic: usize,
    pub total_tested: u64,
    /// Accepted candidates in ascending id order.
    pub results: Vec<SearchResult>,
    pub elapsed: Duration,
    pub exhaustive: bool,
}

impl SearchOutcome {
    pub fn get_n_accepted(&self) -> usize {
        self.results.len()
    }

    /// Tested share of the `2^M` candidates, in percent.
    pub fn coverage(&self) -> f64 {
        100.0 * self.total_tested as f64 / (self.n_magnetic as f64).exp2()
    }

    pub fn conclusion(&self) -> Conclusion {
        if !self.results.is_empty() {
            Conclusion::Found(self.results.len())
        } else if self.exhaustive {
            Conclusion::NotAltermagnetic
        } else {
            Conclusion::NoneFoundInSample
        }
    }

    pub fn display(&self) {
        println!("   {:-^88}", " search results ");
        println!();

        println!(
            "   {:<width1$} = {:>width2$}",
            "search_method",
            self.method.to_string(),
            width1 = OUT_WIDTH1,
            width2 = OUT_WIDTH2
        );
        println!(
            "   {:<width1$} = {:>width2$}",
            "backend",
            self.backend,
            width1 = OUT_WIDTH1,
            width2 = OUT_WIDTH2
        );
        println!(
            "   {:<width1$} = {:>width2$}",
            "configurations_tested",
            self.total_tested,
            width1 = OUT_WIDTH1,
            width2 = OUT_WIDTH2
        );
        if self.method == SearchMethod::Sampling {
            println!(
                "   {:<width1$} = {:>width2$.4} %",
                "space_coverage",
                self.coverage(),
                width1 = OUT_WIDTH1,
                width2 = OUT_WIDTH2
            );
        }
        println!(
            "   {:<width1$} = {:>width2$}",
            "altermagnetic_found",
            self.get_n_accepted(),
            width1 = OUT_WIDTH1,
            width2 = OUT_WIDTH2
        );
        println!(
            "   {:<width1$} = {:>width2$.3} s",
            "elapsed",
            self.elapsed.as_secs_f64(),
            width1 = OUT_WIDTH1,
            width2 = OUT_WIDTH2
        );

        println!();
        println!("   {}", self.conclusion());

        if self.conclusion() == Conclusion::NoneFoundInSample {
            println!("   a larger sample or a smaller supercell may still find some");
        }

        println!();
    }
}
