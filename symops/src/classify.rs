//! Crystal system and Laue class of a detected operation set.
//!
//! Both are read off the distinct proper parts `det(R)·R` of the rotations,
//! so centring translations and improper partners do not change the counts.

use std::fmt;

use thiserror::Error;

use crate::{Rotation, SymOp};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CrystalSystem {
    Triclinic,
    Monoclinic,
    Orthorhombic,
    Tetragonal,
    Trigonal,
    Hexagonal,
    Cubic,
}

impl CrystalSystem {
    /// Laue class for a proper rotation group of order `n_rotations`.
    ///
    /// Each system has at most two Laue classes, told apart by the order.
    pub fn laue_class(self, n_rotations: usize) -> &'static str {
        match self {
            CrystalSystem::Triclinic => "-1",
            CrystalSystem::Monoclinic => "2/m",
            CrystalSystem::Orthorhombic => "mmm",
            CrystalSystem::Tetragonal if n_rotations <= 4 => "4/m",
            CrystalSystem::Tetragonal => "4/mmm",
            CrystalSystem::Trigonal if n_rotations <= 3 => "-3",
            CrystalSystem::Trigonal => "-3m",
            CrystalSystem::Hexagonal if n_rotations <= 6 => "6/m",
            CrystalSystem::Hexagonal => "6/mmm",
            CrystalSystem::Cubic if n_rotations <= 12 => "m-3",
            CrystalSystem::Cubic => "m-3m",
        }
    }
}

impl fmt::Display for CrystalSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = format!("{:?}", self).to_lowercase();
        write!(f, "{}", name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SymmetryClassification {
    pub crystal_system: CrystalSystem,
    pub laue_class: &'static str,
    pub has_inversion: bool,
    pub n_operations: usize,
    /// Distinct proper parts, the order of the rotation subgroup.
    pub n_rotations: usize,
    /// Operations with identity rotation, the identity included.
    pub n_centring: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ClassificationError {
    #[error("no symmetry operations provided")]
    EmptyOperations,
}

pub fn classify_symmetry(ops: &[SymOp]) -> Result<SymmetryClassification, ClassificationError> {
    if ops.is_empty() {
        return Err(ClassificationError::EmptyOperations);
    }

    let mut proper: Vec<Rotation> = Vec::new();

    for op in ops.iter() {
        let det = op.determinant();
        let r = op.rotation().map(|x| x * det);
        if !proper.contains(&r) {
            proper.push(r);
        }
    }

    // rotations of order 2, 3, 4 and 6
    let mut by_order = [0usize; 7];
    for r in proper.iter() {
        if let Some(order) = rotation_order(r) {
            by_order[order] += 1;
        }
    }

    let crystal_system = match by_order {
        [_, _, _, n3, _, _, _] if n3 >= 8 => CrystalSystem::Cubic,
        [_, _, _, _, _, _, n6] if n6 > 0 => CrystalSystem::Hexagonal,
        [_, _, _, _, n4, _, _] if n4 > 0 => CrystalSystem::Tetragonal,
        [_, _, _, n3, _, _, _] if n3 > 0 => CrystalSystem::Trigonal,
        [_, _, n2, _, _, _, _] if n2 >= 3 => CrystalSystem::Orthorhombic,
        [_, _, n2, _, _, _, _] if n2 > 0 => CrystalSystem::Monoclinic,
        _ => CrystalSystem::Triclinic,
    };

    Ok(SymmetryClassification {
        crystal_system,
        laue_class: crystal_system.laue_class(proper.len()),
        has_inversion: ops.iter().any(|op| op.is_inversion()),
        n_operations: ops.len(),
        n_rotations: proper.len(),
        n_centring: ops.iter().filter(|op| op.trace() == 3).count(),
    })
}

fn rotation_order(rotation: &Rotation) -> Option<usize> {
    let identity = Rotation::identity();
    let mut power = *rotation;

    for order in 1..=6 {
        if power == identity {
            return Some(order);
        }
        power *= rotation;
    }

    None
}

#[cfg(test)]
mod tests {
    use crate::detect::{detect_symmetry, DetectOptions, Structure};
    use nalgebra::{Matrix3, Vector3};

    use super::*;

    fn c4z() -> SymOp {
        SymOp::from_arrays([[0, -1, 0], [1, 0, 0], [0, 0, 1]], [0.0; 3]).unwrap()
    }

    #[test]
    fn classify_p1() {
        let class = classify_symmetry(&[SymOp::identity()]).unwrap();

        assert_eq!(class.crystal_system, CrystalSystem::Triclinic);
        assert_eq!(class.laue_class, "-1");
        assert_eq!(class.n_rotations, 1);
    }

    #[test]
    fn classify_p_minus_1() {
        let class = classify_symmetry(&[SymOp::identity(), SymOp::inversion()]).unwrap();

        assert_eq!(class.crystal_system, CrystalSystem::Triclinic);
        assert_eq!(class.laue_class, "-1");
        assert_eq!(class.n_rotations, 1);
        assert!(class.has_inversion);
    }

    #[test]
    fn centring_does_not_change_the_class() {
        let c4 = c4z();
        let c2 = c4.compose(&c4);
        let c4_3 = c2.compose(&c4);
        let mut ops = vec![SymOp::identity(), c4.clone(), c2, c4_3];

        let primitive = classify_symmetry(&ops).unwrap();

        let body = SymOp::translation_op(Vector3::new(0.5, 0.5, 0.5));
        let centred: Vec<SymOp> = ops.iter().map(|op| body.compose(op)).collect();
        ops.extend(centred);

        let class = classify_symmetry(&ops).unwrap();

        assert_eq!(primitive.laue_class, "4/m");
        assert_eq!(class.crystal_system, CrystalSystem::Tetragonal);
        assert_eq!(class.laue_class, "4/m");
        assert_eq!(class.n_rotations, 4);
        assert_eq!(class.n_centring, 2);
        assert_eq!(class.n_operations, 8);
    }

    #[test]
    fn classify_cubic_detector_output() {
        let structure = Structure {
            lattice: Matrix3::identity(),
            positions: vec![Vector3::zeros()],
            atom_types: vec![1],
        };
        let detected = detect_symmetry(&structure, DetectOptions::default()).unwrap();
        let class = classify_symmetry(&detected.operations).unwrap();

        assert_eq!(class.crystal_system, CrystalSystem::Cubic);
        assert_eq!(class.laue_class, "m-3m");
        assert_eq!(class.n_rotations, 24);
    }

    #[test]
    fn classify_empty() {
        assert_eq!(classify_symmetry(&[]), Err(ClassificationError::EmptyOperations));
    }
}
