//! Equivalent-atom orbits under a set of operations.

use nalgebra::Vector3;

use crate::{approx_eq_mod_lattice, SymOp};

/// Index of the site `op` sends `position` to, if any.
pub fn image_index(
    op: &SymOp,
    position: &Vector3<f64>,
    targets: &[Vector3<f64>],
    tol: f64,
) -> Option<usize> {
    let mapped = op.apply(position);

    targets
        .iter()
        .position(|t| approx_eq_mod_lattice(&mapped, t, tol))
}

/// Permutation induced by `op` on `positions`, or `None` when some site has
/// no image among them or two sites share one.
pub fn site_permutation(op: &SymOp, positions: &[Vector3<f64>], tol: f64) -> Option<Vec<usize>> {
    let mut perm = Vec::with_capacity(positions.len());
    let mut hit = vec![false; positions.len()];

    for p in positions.iter() {
        let j = image_index(op, p, positions, tol)?;
        if hit[j] {
            return None;
        }
        hit[j] = true;
        perm.push(j);
    }

    Some(perm)
}

/// Orbit id per atom: the smallest atom index in its orbit.
///
/// Atoms are only connected to atoms of the same type. Operations that fail
/// to map an atom are ignored for that atom.
pub fn equivalent_atoms(
    ops: &[SymOp],
    positions: &[Vector3<f64>],
    atom_types: &[u32],
    tol: f64,
) -> Vec<usize> {
    let natoms = positions.len();
    let mut parent: Vec<usize> = (0..natoms).collect();

    for op in ops.iter() {
        for i in 0..natoms {
            let mapped = op.apply(&positions[i]);

            let image = (0..natoms).find(|j| {
                atom_types[*j] == atom_types[i] && approx_eq_mod_lattice(&mapped, &positions[*j], tol)
            });

            if let Some(j) = image {
                union(&mut parent, i, j);
            }
        }
    }

    (0..natoms).map(|i| find(&mut parent, i)).collect()
}

fn find(parent: &mut [usize], i: usize) -> usize {
    let mut root = i;
    while parent[root] != root {
        root = parent[root];
    }

    let mut cur = i;
    while parent[cur] != root {
        let next = parent[cur];
        parent[cur] = root;
        cur = next;
    }

    root
}

// the smaller index always becomes the root
fn union(parent: &mut [usize], a: usize, b: usize) {
    let ra = find(parent, a);
    let rb = find(parent, b);

    if ra < rb {
        parent[rb] = ra;
    } else if rb < ra {
        parent[ra] = rb;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{detect_symmetry, DetectOptions, Structure};
    use nalgebra::Matrix3;

    #[test]
    fn orbits_of_inversion_pairs() {
        let positions = vec![
            Vector3::new(0.1, 0.2, 0.3),
            Vector3::new(0.2, 0.4, 0.1),
            Vector3::new(0.9, 0.8, 0.7),
            Vector3::new(0.8, 0.6, 0.9),
        ];
        let types = vec![26, 26, 26, 26];
        let ops = vec![SymOp::identity(), SymOp::inversion()];

        assert_eq!(equivalent_atoms(&ops, &positions, &types, 1.0e-5), vec![0, 1, 0, 1]);
    }

    #[test]
    fn orbits_respect_species() {
        let positions = vec![Vector3::zeros(), Vector3::new(0.5, 0.5, 0.5)];
        let ops = vec![
            SymOp::identity(),
            SymOp::translation_op(Vector3::new(0.5, 0.5, 0.5)),
        ];

        assert_eq!(equivalent_atoms(&ops, &positions, &[26, 26], 1.0e-5), vec![0, 0]);
        assert_eq!(equivalent_atoms(&ops, &positions, &[26, 8], 1.0e-5), vec![0, 1]);
    }

    #[test]
    fn orbits_from_detected_rocksalt_like_cell() {
        // two species on a simple cubic lattice, each on its own sublattice
        let structure = Structure {
            lattice: Matrix3::identity() * 4.0,
            positions: vec![
                Vector3::new(0.0, 0.0, 0.0),
                Vector3::new(0.5, 0.5, 0.0),
                Vector3::new(0.5, 0.0, 0.5),
                Vector3::new(0.0, 0.5, 0.5),
                Vector3::new(0.5, 0.0, 0.0),
                Vector3::new(0.0, 0.5, 0.0),
                Vector3::new(0.0, 0.0, 0.5),
                Vector3::new(0.5, 0.5, 0.5),
            ],
            atom_types: vec![28, 28, 28, 28, 8, 8, 8, 8],
        };
        let detected = detect_symmetry(&structure, DetectOptions::default()).unwrap();
        let ids = equivalent_atoms(
            &detected.operations,
            &structure.positions,
            &structure.atom_types,
            1.0e-5,
        );

        assert_eq!(ids, vec![0, 0, 0, 0, 4, 4, 4, 4]);
    }

    #[test]
    fn permutation_of_sites() {
        let positions = vec![Vector3::new(0.25, 0.0, 0.0), Vector3::new(0.75, 0.0, 0.0)];

        assert_eq!(site_permutation(&SymOp::inversion(), &positions, 1.0e-6), Some(vec![1, 0]));
        assert_eq!(site_permutation(&SymOp::identity(), &positions, 1.0e-6), Some(vec![0, 1]));

        let shift = SymOp::translation_op(Vector3::new(0.1, 0.0, 0.0));
        assert_eq!(site_permutation(&shift, &positions, 1.0e-6), None);
    }
}
