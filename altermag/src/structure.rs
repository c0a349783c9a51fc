use crate::{analyze_orbit, AltermagError, OrbitAnalysis, OrbitVerdict};
use amconsts::*;
use crystal::{CrystalStructure, Orbit};
use log::debug;
use nalgebra::Vector3;
use spin::{count_spins, spin_string, SpinState};

#[derive(Debug, Clone, PartialEq)]
pub enum OrbitOutcome {
    Singleton,
    /// No atom of the orbit carries a moment.
    NonMagnetic,
    Analyzed(OrbitAnalysis),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrbitReport {
    pub id: usize,
    pub symbol: String,
    pub atom_indices: Vec<usize>,
    pub outcome: OrbitOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructureAnalysis {
    pub orbits: Vec<OrbitReport>,
    pub altermagnet: bool,
}

impl StructureAnalysis {
    pub fn n_analyzed(&self) -> usize {
        self.orbits
            .iter()
            .filter(|o| matches!(o.outcome, OrbitOutcome::Analyzed(_)))
            .count()
    }

    pub fn display(&self, spins: &[SpinState]) {
        println!("   {:-^88}", " altermagnet check ");
        println!();

        for orbit in self.orbits.iter() {
            let orbit_spins: Vec<SpinState> = orbit.atom_indices.iter().map(|i| spins[*i]).collect();

            println!(
                "   orbit {:<4} {:>3} x {:<3} : {}",
                orbit.id + 1,
                orbit.atom_indices.len(),
                orbit.symbol,
                spin_string(&orbit_spins)
            );

            match &orbit.outcome {
                OrbitOutcome::Singleton => println!("   single atom, skipped"),
                OrbitOutcome::NonMagnetic => println!("   no magnetic moments, skipped"),
                OrbitOutcome::Analyzed(analysis) => {
                    analysis.display();

                    if analysis.verdict == OrbitVerdict::Altermagnet {
                        println!("   orbit is altermagnetic");
                    }
                }
            }

            println!();
        }

        println!(
            "   {:<width1$} = {:>width2$}",
            "altermagnet",
            self.altermagnet,
            width1 = OUT_WIDTH1,
            width2 = OUT_WIDTH2
        );

        println!();
    }
}

/// Classifies every orbit in ascending id order.
///
/// Singleton and all-`None` orbits are skipped. An analyzed orbit must hold
/// as many up as down spins. When nothing is analyzed the result is `false`
/// only if every orbit is a singleton, otherwise the magnetic description is
/// ill-posed.
pub fn analyze_orbits(
    structure: &CrystalStructure,
    orbits: &[Orbit],
    spins: &[SpinState],
    tol: f64,
) -> Result<StructureAnalysis, AltermagError> {
    if spins.len() != structure.get_n_atoms() {
        return Err(AltermagError::LengthMismatch {
            positions: structure.get_n_atoms(),
            spins: spins.len(),
        });
    }

    let symops = structure.get_symmetry_operations();
    let mut reports = Vec::with_capacity(orbits.len());
    let mut altermagnet = false;

    for orbit in orbits.iter() {
        let symbol = orbit
            .atom_indices
            .first()
            .map(|i| structure.get_atom(*i).get_symbol().to_string())
            .unwrap_or_default();

        let orbit_spins: Vec<SpinState> = orbit.atom_indices.iter().map(|i| spins[*i]).collect();

        let outcome = if orbit.atom_indices.len() < 2 {
            OrbitOutcome::Singleton
        } else if orbit_spins.iter().all(|s| !s.is_polarized()) {
            OrbitOutcome::NonMagnetic
        } else {
            let (up, down) = count_spins(&orbit_spins);

            if up != down {
                return Err(AltermagError::UnbalancedSpins {
                    orbit: orbit.id,
                    up,
                    down,
                });
            }

            let positions: Vec<Vector3<f64>> = orbit
                .atom_indices
                .iter()
                .map(|i| *structure.get_atom(*i).get_position())
                .collect();

            let analysis = analyze_orbit(symops, &positions, &orbit_spins, tol)?;

            debug!(
                "orbit {} ({}): {:?}, {} antisymmetry operations",
                orbit.id,
                symbol,
                analysis.verdict,
                analysis.retained_ops.len()
            );

            altermagnet |= analysis.is_altermagnetic();

            OrbitOutcome::Analyzed(analysis)
        };

        reports.push(OrbitReport {
            id: orbit.id,
            symbol,
            atom_indices: orbit.atom_indices.clone(),
            outcome,
        });
    }

    let analysis = StructureAnalysis {
        orbits: reports,
        altermagnet,
    };

    if analysis.n_analyzed() == 0 {
        let all_singletons = analysis
            .orbits
            .iter()
            .all(|o| o.outcome == OrbitOutcome::Singleton);

        if !all_singletons {
            return Err(AltermagError::IllPosed);
        }
    }

    Ok(analysis)
}

pub fn analyze_structure(
    structure: &CrystalStructure,
    spins: &[SpinState],
    tol: f64,
) -> Result<StructureAnalysis, AltermagError> {
    analyze_orbits(structure, &structure.get_orbits(), spins, tol)
}

pub fn is_altermagnet(
    structure: &CrystalStructure,
    spins: &[SpinState],
    tol: f64,
) -> Result<bool, AltermagError> {
    is_altermagnet_in(structure, &structure.get_orbits(), spins, tol)
}

/// `is_altermagnet` with orbits grouped once by the caller.
pub fn is_altermagnet_in(
    structure: &CrystalStructure,
    orbits: &[Orbit],
    spins: &[SpinState],
    tol: f64,
) -> Result<bool, AltermagError> {
    analyze_orbits(structure, orbits, spins, tol).map(|a| a.altermagnet)
}
