//! Symmetry-operation detection from a periodic structure.
//!
//! 1. Build the metric tensor from the lattice vectors.
//! 2. Enumerate integer rotations with entries in `{-1, 0, 1}` and keep those
//!    that preserve the metric.
//! 3. Seed translations by mapping one anchor atom onto same-species sites.
//! 4. Verify a one-to-one species-preserving mapping for each `(R, t)`.
//! 5. Deduplicate, sort, and optionally check group closure.

use nalgebra::{Matrix3, Vector3};
use thiserror::Error;

use crate::{
    approx_eq_mod_lattice, cmp_ops, cmp_rotation, determinant, lattice_metric,
    normalize_fractional, rotation_metric_deviation, sym_op_approx_eq, validate_group,
    validate_lattice_consistency, Rotation, SymOp, SymOpError,
};

#[derive(Clone, Debug)]
pub struct Structure {
    /// Lattice vectors as rows `[a, b, c]`.
    pub lattice: Matrix3<f64>,
    /// Fractional coordinates; need not be reduced into the cell.
    pub positions: Vec<Vector3<f64>>,
    /// Species labels aligned with `positions`.
    pub atom_types: Vec<u32>,
}

#[derive(Clone, Copy, Debug)]
pub struct DetectOptions {
    /// Position tolerance in fractional coordinates.
    pub symprec: f64,
    /// Tolerance on `R^T G R = G`.
    pub metric_tol: f64,
    pub validate_group: bool,
}

impl Default for DetectOptions {
    fn default() -> Self {
        Self {
            symprec: 1.0e-6,
            metric_tol: 1.0e-6,
            validate_group: true,
        }
    }
}

impl DetectOptions {
    /// Options scaled from a single position tolerance.
    pub fn with_symprec(symprec: f64) -> Self {
        Self {
            symprec,
            metric_tol: symprec * 10.0,
            validate_group: true,
        }
    }
}

#[derive(Clone, Debug)]
pub struct DetectedSymmetry {
    pub operations: Vec<SymOp>,
    /// Rotations that survived the metric filter.
    pub candidate_rotations: usize,
}

#[derive(Clone, Debug, PartialEq, Error)]
pub enum DetectionError {
    #[error("structure has no atoms")]
    EmptyStructure,

    #[error("mismatched inputs: {positions} positions but {atom_types} atom types")]
    MismatchedInputs { positions: usize, atom_types: usize },

    #[error("tolerances must be positive")]
    NonPositiveTolerance,

    #[error("failed to detect any symmetry operation with current candidate set")]
    NoOperationsDetected,

    #[error("invalid symmetry operation: {0}")]
    InvalidOperation(SymOpError),

    #[error("detected operations failed lattice validation: {0}")]
    LatticeValidationFailed(SymOpError),

    #[error("detected operations failed group validation: {0}")]
    GroupValidationFailed(SymOpError),
}

pub fn detect_symmetry(
    structure: &Structure,
    options: DetectOptions,
) -> Result<DetectedSymmetry, DetectionError> {
    if structure.positions.is_empty() {
        return Err(DetectionError::EmptyStructure);
    }
    if structure.positions.len() != structure.atom_types.len() {
        return Err(DetectionError::MismatchedInputs {
            positions: structure.positions.len(),
            atom_types: structure.atom_types.len(),
        });
    }
    if options.symprec <= 0.0 || options.metric_tol <= 0.0 {
        return Err(DetectionError::NonPositiveTolerance);
    }

    let positions: Vec<Vector3<f64>> = structure.positions.iter().map(normalize_fractional).collect();
    let atom_types = &structure.atom_types;

    let metric = lattice_metric(&structure.lattice);
    let rotations = generate_rotation_candidates(&metric, options.metric_tol);

    // the rarest species gives the fewest translation seeds
    let anchor = rarest_species_anchor(atom_types);

    let mut operations: Vec<SymOp> = Vec::new();

    for rotation in rotations.iter() {
        let r = rotation.map(|x| x as f64);
        let anchor_rot = r * positions[anchor];

        let translations =
            candidate_translations(&anchor_rot, atom_types[anchor], &positions, atom_types, options.symprec);

        for translation in translations {
            if !is_valid_operation(&r, &translation, &positions, atom_types, options.symprec) {
                continue;
            }

            let op = SymOp::new(*rotation, translation).map_err(DetectionError::InvalidOperation)?;

            if !operations
                .iter()
                .any(|existing| sym_op_approx_eq(existing, &op, options.symprec))
            {
                operations.push(op);
            }
        }
    }

    if operations.is_empty() {
        return Err(DetectionError::NoOperationsDetected);
    }

    let operations = standardize_operations(&operations, options.symprec);

    validate_lattice_consistency(&operations, &structure.lattice, options.metric_tol)
        .map_err(DetectionError::LatticeValidationFailed)?;

    if options.validate_group {
        validate_group(&operations, options.symprec).map_err(DetectionError::GroupValidationFailed)?;
    }

    Ok(DetectedSymmetry {
        operations,
        candidate_rotations: rotations.len(),
    })
}

/// Removes approximate duplicates and sorts into a deterministic order.
pub fn standardize_operations(ops: &[SymOp], tol: f64) -> Vec<SymOp> {
    let mut out: Vec<SymOp> = Vec::new();

    for op in ops.iter() {
        if !out.iter().any(|existing| sym_op_approx_eq(existing, op, tol)) {
            out.push(op.clone());
        }
    }

    out.sort_by(cmp_ops);
    out
}

/// `3^9` candidate matrices filtered by `det = ±1` and metric invariance.
fn generate_rotation_candidates(metric: &Matrix3<f64>, tol: f64) -> Vec<Rotation> {
    let mut out = Vec::new();

    for code in 0..3_usize.pow(9) {
        let mut x = code;
        let mut vals = [0_i32; 9];
        for v in vals.iter_mut() {
            *v = (x % 3) as i32 - 1;
            x /= 3;
        }

        let rotation = Rotation::from_row_slice(&vals);

        let det = determinant(&rotation);
        if det != 1 && det != -1 {
            continue;
        }

        if rotation_metric_deviation(&rotation, metric) <= tol {
            out.push(rotation);
        }
    }

    out.sort_by(cmp_rotation);
    out
}

fn rarest_species_anchor(atom_types: &[u32]) -> usize {
    let count = |t: u32| atom_types.iter().filter(|x| **x == t).count();

    (0..atom_types.len())
        .min_by_key(|i| (count(atom_types[*i]), *i))
        .unwrap_or(0)
}

fn candidate_translations(
    rotated_anchor: &Vector3<f64>,
    anchor_type: u32,
    positions: &[Vector3<f64>],
    atom_types: &[u32],
    tol: f64,
) -> Vec<Vector3<f64>> {
    let mut out: Vec<Vector3<f64>> = Vec::new();

    for (target, _) in positions
        .iter()
        .zip(atom_types.iter())
        .filter(|(_, t)| **t == anchor_type)
    {
        let candidate = normalize_fractional(&(target - rotated_anchor));

        if !out.iter().any(|existing| approx_eq_mod_lattice(existing, &candidate, tol)) {
            out.push(candidate);
        }
    }

    out
}

/// Every atom must land on a distinct atom of its own species.
fn is_valid_operation(
    rotation: &Matrix3<f64>,
    translation: &Vector3<f64>,
    positions: &[Vector3<f64>],
    atom_types: &[u32],
    tol: f64,
) -> bool {
    let mut used = vec![false; positions.len()];

    for (position, atom_type) in positions.iter().zip(atom_types.iter()) {
        let mapped = rotation * position + translation;

        let found = (0..positions.len()).find(|j| {
            !used[*j] && atom_types[*j] == *atom_type && approx_eq_mod_lattice(&mapped, &positions[*j], tol)
        });

        match found {
            Some(j) => used[j] = true,
            None => return false,
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cubic(positions: Vec<Vector3<f64>>, atom_types: Vec<u32>) -> Structure {
        Structure {
            lattice: Matrix3::identity(),
            positions,
            atom_types,
        }
    }

    #[test]
    fn detect_cubic_single_atom() {
        let structure = cubic(vec![Vector3::zeros()], vec![1]);
        let detected = detect_symmetry(&structure, DetectOptions::default()).unwrap();

        assert_eq!(detected.operations.len(), 48);
        assert!(detected
            .operations
            .iter()
            .any(|op| sym_op_approx_eq(op, &SymOp::identity(), 1.0e-9)));
    }

    #[test]
    fn detect_body_centred_pair_finds_translation() {
        let structure = cubic(
            vec![Vector3::zeros(), Vector3::new(0.5, 0.5, 0.5)],
            vec![26, 26],
        );
        let detected = detect_symmetry(&structure, DetectOptions::default()).unwrap();

        assert_eq!(detected.operations.len(), 96);
        assert!(detected
            .operations
            .iter()
            .any(|op| op.is_pure_translation(1.0e-6)));
    }

    #[test]
    fn detect_mismatched_input_lengths() {
        let structure = cubic(vec![Vector3::zeros()], vec![]);

        assert!(matches!(
            detect_symmetry(&structure, DetectOptions::default()),
            Err(DetectionError::MismatchedInputs {
                positions: 1,
                atom_types: 0
            })
        ));
    }

    #[test]
    fn detect_rejects_bad_tolerance() {
        let structure = cubic(vec![Vector3::zeros()], vec![1]);
        let options = DetectOptions {
            symprec: 0.0,
            ..DetectOptions::default()
        };

        assert_eq!(
            detect_symmetry(&structure, options).unwrap_err(),
            DetectionError::NonPositiveTolerance
        );
    }

    #[test]
    fn standardize_operations_deduplicates() {
        let id = SymOp::identity();
        let c2z = SymOp::from_arrays([[-1, 0, 0], [0, -1, 0], [0, 0, 1]], [0.0; 3]).unwrap();

        let standardized = standardize_operations(&[c2z.clone(), id.clone(), c2z.clone(), id], 1.0e-9);

        assert_eq!(standardized.len(), 2);
        assert!(sym_op_approx_eq(&standardized[0], &c2z, 1.0e-9));
    }

    #[test]
    fn detect_low_symmetry_structure_is_identity_only() {
        let structure = Structure {
            lattice: Matrix3::new(1.0, 0.0, 0.0, 0.2, 1.1, 0.0, 0.3, 0.4, 0.9),
            positions: vec![Vector3::new(0.113, 0.271, 0.389), Vector3::new(0.457, 0.613, 0.791)],
            atom_types: vec![1, 2],
        };
        let detected = detect_symmetry(&structure, DetectOptions::default()).unwrap();

        assert_eq!(detected.operations.len(), 1);
        assert!(sym_op_approx_eq(&detected.operations[0], &SymOp::identity(), 1.0e-9));
    }
}
