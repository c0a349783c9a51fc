use amconsts::*;
use itertools::Itertools;
use log::{debug, warn};
use nalgebra::{Matrix3, Vector3};
use spin::SpinState;
use symops::{
    classify_symmetry, detect_symmetry, equivalent_atoms, normalize_fractional, DetectOptions,
    DetectionError, Structure, SymOp, SymmetryClassification,
};
use thiserror::Error;

mod poscar;
pub use poscar::*;


#[derive(Debug, Error)]
pub enum CrystalError {
    #[error("cannot access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: {msg}")]
    Parse { line: usize, msg: String },

    #[error("{what}: expected {expected} entries, got {got}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("orbit id {id} of atom {atom} is not an atom index")]
    InvalidOrbitId { atom: usize, id: usize },

    #[error("structure has no atoms")]
    Empty,

    #[error(transparent)]
    Detection(#[from] DetectionError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    position: Vector3<f64>,
    symbol: String,
    atomic_number: u32,
    spin: SpinState,
}

impl Atom {
    pub fn new(symbol: &str, position: Vector3<f64>) -> Atom {
        Atom {
            position,
            symbol: symbol.to_string(),
            atomic_number: atomic_number(symbol),
            spin: SpinState::None,
        }
    }

    pub fn get_position(&self) -> &Vector3<f64> {
        &self.position
    }

    pub fn get_symbol(&self) -> &str {
        &self.symbol
    }

    pub fn get_atomic_number(&self) -> u32 {
        self.atomic_number
    }

    pub fn get_spin(&self) -> SpinState {
        self.spin
    }
}

/// Atoms sharing one orbit id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Orbit {
    pub id: usize,
    pub atom_indices: Vec<usize>,
}

// Periodic structure.
//
// - cell rows are the lattice vectors in Angstrom
// - atomic positions are fractional and reduced into [0, 1)
// - equivalent_atoms[i] is the orbit id of atom i
#[derive(Debug, Clone)]
pub struct CrystalStructure {
    cell: Matrix3<f64>,
    atoms: Vec<Atom>,
    equivalent_atoms: Vec<usize>,
    symmetry_operations: Vec<SymOp>,
}

impl CrystalStructure {
    /// Structure with identity symmetry and one orbit per element.
    pub fn new(cell: Matrix3<f64>, atoms: Vec<Atom>) -> CrystalStructure {
        let atoms: Vec<Atom> = atoms
            .into_iter()
            .map(|mut at| {
                at.position = normalize_fractional(&at.position);
                at
            })
            .collect();

        let equivalent_atoms = atoms
            .iter()
            .map(|at| {
                atoms
                    .iter()
                    .position(|other| other.symbol == at.symbol)
                    .unwrap_or(0)
            })
            .collect();

        CrystalStructure {
            cell,
            atoms,
            equivalent_atoms,
            symmetry_operations: vec![SymOp::identity()],
        }
    }

    pub fn from_symbols(
        cell: Matrix3<f64>,
        symbols: &[&str],
        positions: &[Vector3<f64>],
    ) -> Result<CrystalStructure, CrystalError> {
        if symbols.len() != positions.len() {
            return Err(CrystalError::LengthMismatch {
                what: "positions",
                expected: symbols.len(),
                got: positions.len(),
            });
        }

        let atoms = symbols
            .iter()
            .zip(positions.iter())
            .map(|(s, p)| Atom::new(s, *p))
            .collect();

        Ok(CrystalStructure::new(cell, atoms))
    }

    /// Replaces the operation list and orbit ids with externally supplied ones.
    pub fn with_symmetry(
        mut self,
        symmetry_operations: Vec<SymOp>,
        equivalent_atoms: Vec<usize>,
    ) -> Result<CrystalStructure, CrystalError> {
        let natoms = self.atoms.len();

        if equivalent_atoms.len() != natoms {
            return Err(CrystalError::LengthMismatch {
                what: "orbit ids",
                expected: natoms,
                got: equivalent_atoms.len(),
            });
        }

        if let Some((atom, id)) = equivalent_atoms.iter().enumerate().find(|(_, id)| **id >= natoms) {
            return Err(CrystalError::InvalidOrbitId { atom, id: *id });
        }

        self.symmetry_operations = symmetry_operations;
        self.equivalent_atoms = equivalent_atoms;

        Ok(self)
    }

    pub fn get_n_atoms(&self) -> usize {
        self.atoms.len()
    }

    pub fn get_cell(&self) -> &Matrix3<f64> {
        &self.cell
    }

    pub fn get_atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn get_atom(&self, i: usize) -> &Atom {
        &self.atoms[i]
    }

    pub fn get_scaled_positions(&self) -> Vec<Vector3<f64>> {
        self.atoms.iter().map(|at| at.position).collect()
    }

    /// Cartesian position in Angstrom: `r = A^T f`.
    pub fn get_cartesian_position(&self, i: usize) -> Vector3<f64> {
        self.cell.transpose() * self.atoms[i].position
    }

    pub fn get_chemical_symbols(&self) -> Vec<&str> {
        self.atoms.iter().map(|at| at.symbol.as_str()).collect()
    }

    pub fn get_atomic_numbers(&self) -> Vec<u32> {
        self.atoms.iter().map(|at| at.atomic_number).collect()
    }

    pub fn get_unique_species(&self) -> Vec<String> {
        self.atoms.iter().map(|at| at.symbol.clone()).unique().collect()
    }

    pub fn get_spins(&self) -> Vec<SpinState> {
        self.atoms.iter().map(|at| at.spin).collect()
    }

    pub fn set_spins(&mut self, spins: &[SpinState]) -> Result<(), CrystalError> {
        if spins.len() != self.atoms.len() {
            return Err(CrystalError::LengthMismatch {
                what: "spins",
                expected: self.atoms.len(),
                got: spins.len(),
            });
        }

        for (at, s) in self.atoms.iter_mut().zip(spins.iter()) {
            at.spin = *s;
        }

        Ok(())
    }

    pub fn set_spin(&mut self, i: usize, spin: SpinState) {
        self.atoms[i].spin = spin;
    }

    pub fn get_equivalent_atoms(&self) -> &[usize] {
        &self.equivalent_atoms
    }

    pub fn get_symmetry_operations(&self) -> &[SymOp] {
        &self.symmetry_operations
    }

    /// Orbits in ascending id order, atom indices ascending within each.
    pub fn get_orbits(&self) -> Vec<Orbit> {
        self.equivalent_atoms
            .iter()
            .copied()
            .unique()
            .sorted()
            .map(|id| Orbit {
                id,
                atom_indices: (0..self.atoms.len())
                    .filter(|i| self.equivalent_atoms[*i] == id)
                    .collect(),
            })
            .collect()
    }

    /// Detects the space-group operations and orbit ids.
    ///
    /// When detection fails the structure keeps identity symmetry with one
    /// orbit per element and the failure is logged.
    pub fn analyze_symmetry(&mut self, symprec: f64) -> Result<SymmetryClassification, CrystalError> {
        if self.atoms.is_empty() {
            return Err(CrystalError::Empty);
        }

        let input = Structure {
            lattice: self.cell,
            positions: self.get_scaled_positions(),
            atom_types: self.get_atomic_numbers(),
        };

        match detect_symmetry(&input, DetectOptions::with_symprec(symprec)) {
            Ok(detected) => {
                debug!(
                    "symmetry detection: {} candidate rotations, {} operations",
                    detected.candidate_rotations,
                    detected.operations.len()
                );

                self.equivalent_atoms =
                    equivalent_atoms(&detected.operations, &input.positions, &input.atom_types, symprec);
                self.symmetry_operations = detected.operations;
            }

            Err(err) => {
                warn!("symmetry detection failed ({}); falling back to identity", err);

                let fallback = CrystalStructure::new(self.cell, self.atoms.clone());
                self.equivalent_atoms = fallback.equivalent_atoms;
                self.symmetry_operations = fallback.symmetry_operations;
            }
        }

        classify_symmetry(&self.symmetry_operations)
            .map_err(|_| CrystalError::Detection(DetectionError::NoOperationsDetected))
    }

    pub fn display(&self) {
        println!("   {:-^88}", " crystal structure ");
        println!();

        println!("   lattice_vectors (A)");
        println!();

        for (label, row) in ["a", "b", "c"].iter().zip(self.cell.row_iter()) {
            println!(
                "   {} = {:20.12}  {:20.12}  {:20.12}",
                label, row[0], row[1], row[2]
            );
        }

        println!();
        println!("   natoms = {}", self.get_n_atoms());
        println!("   atom_positions\n");
        println!("                fractional                                                cartesian (A)");
        println!();

        for (i, at) in self.atoms.iter().enumerate() {
            let pos_c = self.get_cartesian_position(i);

            println!(
                "   {:<3} {:>4} : {:16.12}  {:16.12}  {:16.12}  {:20.12}  {:20.12}  {:20.12}",
                i + 1,
                at.symbol,
                at.position.x,
                at.position.y,
                at.position.z,
                pos_c.x,
                pos_c.y,
                pos_c.z
            );
        }

        println!();
    }

    pub fn display_symmetry(&self, class: &SymmetryClassification) {
        println!("   {:-^88}", " symmetry ");
        println!();

        println!(
            "   {:<width1$} = {:>width2$}",
            "crystal_system",
            class.crystal_system.to_string(),
            width1 = OUT_WIDTH1,
            width2 = OUT_WIDTH2
        );
        println!(
            "   {:<width1$} = {:>width2$}",
            "laue_class",
            class.laue_class,
            width1 = OUT_WIDTH1,
            width2 = OUT_WIDTH2
        );
        println!(
            "   {:<width1$} = {:>width2$}",
            "n_operations",
            class.n_operations,
            width1 = OUT_WIDTH1,
            width2 = OUT_WIDTH2
        );
        println!(
            "   {:<width1$} = {:>width2$}",
            "n_centring",
            class.n_centring,
            width1 = OUT_WIDTH1,
            width2 = OUT_WIDTH2
        );
        println!(
            "   {:<width1$} = {:>width2$}",
            "has_inversion",
            class.has_inversion,
            width1 = OUT_WIDTH1,
            width2 = OUT_WIDTH2
        );
        println!(
            "   {:<width1$} = {:>width2$}",
            "n_orbits",
            self.get_orbits().len(),
            width1 = OUT_WIDTH1,
            width2 = OUT_WIDTH2
        );

        println!();
    }
}
