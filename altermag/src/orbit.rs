use crate::AltermagError;
use itertools::Itertools;
use log::debug;
use nalgebra::Vector3;
use spin::SpinState;
use symops::SymOp;
use utility::{cell_distance, norm3};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrbitVerdict {
    /// One atom only; it cannot split into sublattices.
    Singleton,
    /// Up and down sublattices are not related by any operation.
    LuttingerFerrimagnet,
    /// Every polarized atom is paired through inversion or translation.
    Antiferromagnet,
    Altermagnet,
}

/// Two opposite-spin atoms of an orbit related by operation `op`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelatedPair {
    pub first: usize,
    pub second: usize,
    pub op: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrbitAnalysis {
    pub verdict: OrbitVerdict,
    /// Indices into the operation list that send every polarized atom onto
    /// an opposite-spin partner.
    pub retained_ops: Vec<usize>,
    pub symmetry_related: Vec<bool>,
    pub it_related: Vec<bool>,
    pub inversion_pairs: Vec<RelatedPair>,
    pub translation_pairs: Vec<RelatedPair>,
    /// Twice the number of up spins.
    pub n_magnetic: usize,
}

impl OrbitAnalysis {
    fn singleton() -> OrbitAnalysis {
        OrbitAnalysis {
            verdict: OrbitVerdict::Singleton,
            retained_ops: Vec::new(),
            symmetry_related: vec![false],
            it_related: vec![false],
            inversion_pairs: Vec::new(),
            translation_pairs: Vec::new(),
            n_magnetic: 0,
        }
    }

    pub fn is_altermagnetic(&self) -> bool {
        self.verdict == OrbitVerdict::Altermagnet
    }

    pub fn sum_symmetry_related(&self) -> usize {
        self.symmetry_related.iter().filter(|x| **x).count()
    }

    pub fn sum_it_related(&self) -> usize {
        self.it_related.iter().filter(|x| **x).count()
    }

    pub fn display(&self) {
        let flags = |v: &[bool]| v.iter().map(|x| if *x { 1 } else { 0 }).join(" ");

        for p in self.inversion_pairs.iter() {
            println!(
                "   atoms {} and {} are related by inversion (op {})",
                p.first + 1,
                p.second + 1,
                p.op + 1
            );
        }

        for p in self.translation_pairs.iter() {
            println!(
                "   atoms {} and {} are related by translation (op {})",
                p.first + 1,
                p.second + 1,
                p.op + 1
            );
        }

        println!("   antisymmetry operations    : {}", self.retained_ops.len());
        println!("   inversion/translation pair : {}", flags(&self.it_related));
        println!("   symmetry-related pair      : {}", flags(&self.symmetry_related));

        match self.verdict {
            OrbitVerdict::LuttingerFerrimagnet => {
                println!("   up and down sublattices are not related by symmetry: Luttinger ferrimagnet")
            }
            OrbitVerdict::Antiferromagnet => {
                println!("   sublattices are related by inversion or translation: antiferromagnet")
            }
            _ => {}
        }
    }
}

/// Classifies a single orbit under the given operations.
///
/// `positions` are the fractional coordinates of the orbit's atoms and
/// `spins` their spin states in the same order.
pub fn analyze_orbit(
    symops: &[SymOp],
    positions: &[Vector3<f64>],
    spins: &[SpinState],
    tol: f64,
) -> Result<OrbitAnalysis, AltermagError> {
    let n = positions.len();

    if n == 1 {
        return Ok(OrbitAnalysis::singleton());
    }

    if n != spins.len() {
        return Err(AltermagError::LengthMismatch {
            positions: n,
            spins: spins.len(),
        });
    }

    let maps_onto = |op: &SymOp, i: usize, j: usize| -> bool {
        cell_distance(&(op.apply(&positions[i]) - positions[j]), tol) < tol
    };

    // antisymmetry filter: every polarized atom needs an opposite-spin image
    let retained_ops: Vec<usize> = symops
        .iter()
        .enumerate()
        .filter(|(_, op)| {
            (0..n).filter(|i| spins[*i].is_polarized()).all(|i| {
                (0..n).any(|j| spins[i].is_opposite(spins[j]) && maps_onto(op, i, j))
            })
        })
        .map(|(k, _)| k)
        .collect();

    let n_magnetic = 2 * spins.iter().filter(|s| **s == SpinState::Up).count();

    if retained_ops.is_empty() {
        debug!("no antisymmetry operation: Luttinger ferrimagnet");

        return Ok(OrbitAnalysis {
            verdict: OrbitVerdict::LuttingerFerrimagnet,
            retained_ops,
            symmetry_related: vec![false; n],
            it_related: vec![false; n],
            inversion_pairs: Vec::new(),
            translation_pairs: Vec::new(),
            n_magnetic,
        });
    }

    let mut symmetry_related = vec![false; n];
    let mut it_related = vec![false; n];
    let mut inversion_pairs = Vec::new();
    let mut translation_pairs = Vec::new();

    for i in 0..n {
        for j in i + 1..n {
            if !spins[i].is_opposite(spins[j]) {
                continue;
            }

            let midpoint = (positions[i] + positions[j]) / 2.0;

            for k in retained_ops.iter().copied() {
                let op = &symops[k];
                let trace = op.trace() as f64;

                if maps_onto(op, i, j) {
                    symmetry_related[i] = true;
                    symmetry_related[j] = true;
                }

                if (trace + 3.0).abs() < tol
                    && cell_distance(&(op.apply(&midpoint) - midpoint), tol) < tol
                {
                    it_related[i] = true;
                    it_related[j] = true;
                    inversion_pairs.push(RelatedPair { first: i, second: j, op: k });

                    debug!(
                        "atoms {} and {} related by inversion (midpoint {:.6} {:.6} {:.6})",
                        i + 1,
                        j + 1,
                        midpoint.x,
                        midpoint.y,
                        midpoint.z
                    );
                }

                let t = op.translation();

                if (trace - 3.0).abs() < tol
                    && norm3(t) > tol
                    && cell_distance(&(positions[i] + t - positions[j]), tol) < tol
                {
                    it_related[i] = true;
                    it_related[j] = true;
                    translation_pairs.push(RelatedPair { first: i, second: j, op: k });

                    debug!(
                        "atoms {} and {} related by translation {:.6} {:.6} {:.6}",
                        i + 1,
                        j + 1,
                        t.x,
                        t.y,
                        t.z
                    );
                }
            }
        }
    }

    let mut analysis = OrbitAnalysis {
        verdict: OrbitVerdict::Antiferromagnet,
        retained_ops,
        symmetry_related,
        it_related,
        inversion_pairs,
        translation_pairs,
        n_magnetic,
    };

    let sum_sym = analysis.sum_symmetry_related() as f64;
    let sum_it = analysis.sum_it_related() as f64;
    let n_magnetic = n_magnetic as f64;

    let luttinger = (sum_sym - n_magnetic).abs() > tol;
    let altermagnet = (sum_it - n_magnetic).abs() > tol && !luttinger;

    analysis.verdict = if luttinger {
        OrbitVerdict::LuttingerFerrimagnet
    } else if altermagnet {
        OrbitVerdict::Altermagnet
    } else {
        OrbitVerdict::Antiferromagnet
    };

    Ok(analysis)
}

/// `analyze_orbit` reduced to the altermagnet verdict.
pub fn is_orbit_altermagnetic(
    symops: &[SymOp],
    positions: &[Vector3<f64>],
    spins: &[SpinState],
    tol: f64,
) -> Result<bool, AltermagError> {
    analyze_orbit(symops, positions, spins, tol).map(|a| a.is_altermagnetic())
}

#[cfg(test)]
mod tests {
    use super::*;
    use spin::flip_all;

    const TOL: f64 = 1.0e-3;

    fn c2z() -> SymOp {
        SymOp::from_arrays([[-1, 0, 0], [0, -1, 0], [0, 0, 1]], [0.0; 3]).unwrap()
    }

    fn pair(a: [f64; 3], b: [f64; 3]) -> Vec<Vector3<f64>> {
        vec![Vector3::new(a[0], a[1], a[2]), Vector3::new(b[0], b[1], b[2])]
    }

    #[test]
    fn singleton_orbit_is_not_altermagnetic() {
        let positions = vec![Vector3::new(0.1, 0.2, 0.3)];

        for s in [SpinState::Up, SpinState::Down, SpinState::None].iter() {
            let a = analyze_orbit(&[SymOp::identity()], &positions, &[*s], TOL).unwrap();
            assert_eq!(a.verdict, OrbitVerdict::Singleton);
        }
    }

    #[test]
    fn length_mismatch_is_an_error() {
        let positions = pair([0.0; 3], [0.5, 0.5, 0.5]);

        assert_eq!(
            analyze_orbit(&[SymOp::identity()], &positions, &[SpinState::Up], TOL),
            Err(AltermagError::LengthMismatch { positions: 2, spins: 1 })
        );
    }

    #[test]
    fn translation_related_pair_is_antiferromagnet() {
        let positions = pair([0.0; 3], [0.5, 0.5, 0.5]);
        let ops = vec![
            SymOp::identity(),
            SymOp::translation_op(Vector3::new(0.5, 0.5, 0.5)),
        ];
        let spins = vec![SpinState::Up, SpinState::Down];

        let a = analyze_orbit(&ops, &positions, &spins, TOL).unwrap();

        assert_eq!(a.retained_ops, vec![1]);
        assert_eq!(a.verdict, OrbitVerdict::Antiferromagnet);
        assert_eq!(a.translation_pairs, vec![RelatedPair { first: 0, second: 1, op: 1 }]);
        assert_eq!(a.sum_it_related(), 2);
    }

    #[test]
    fn inversion_related_pair_is_antiferromagnet() {
        let positions = pair([0.1, 0.2, 0.3], [0.9, 0.8, 0.7]);
        let ops = vec![SymOp::identity(), SymOp::inversion()];
        let spins = vec![SpinState::Down, SpinState::Up];

        let a = analyze_orbit(&ops, &positions, &spins, TOL).unwrap();

        assert_eq!(a.verdict, OrbitVerdict::Antiferromagnet);
        assert_eq!(a.inversion_pairs.len(), 1);
    }

    #[test]
    fn rotation_related_pair_is_altermagnet() {
        let positions = pair([0.25, 0.0, 0.0], [0.75, 0.0, 0.0]);
        let ops = vec![SymOp::identity(), c2z()];
        let spins = vec![SpinState::Up, SpinState::Down];

        let a = analyze_orbit(&ops, &positions, &spins, TOL).unwrap();

        assert_eq!(a.retained_ops, vec![1]);
        assert_eq!(a.sum_symmetry_related(), 2);
        assert_eq!(a.sum_it_related(), 0);
        assert_eq!(a.verdict, OrbitVerdict::Altermagnet);

        assert_eq!(is_orbit_altermagnetic(&ops, &positions, &spins, TOL), Ok(true));
        assert_eq!(
            is_orbit_altermagnetic(&ops, &positions, &flip_all(&spins), TOL),
            Ok(true)
        );
    }

    #[test]
    fn no_antisymmetry_is_luttinger() {
        let positions = pair([0.25, 0.0, 0.0], [0.75, 0.0, 0.0]);
        let a = analyze_orbit(&[SymOp::identity()], &positions, &[SpinState::Up, SpinState::Down], TOL)
            .unwrap();

        assert!(a.retained_ops.is_empty());
        assert_eq!(a.verdict, OrbitVerdict::LuttingerFerrimagnet);
        assert!(!a.is_altermagnetic());
    }

    #[test]
    fn verdict_is_invariant_under_global_flip() {
        let positions = vec![
            Vector3::new(0.25, 0.0, 0.0),
            Vector3::new(0.75, 0.0, 0.0),
            Vector3::new(0.0, 0.25, 0.0),
            Vector3::new(0.0, 0.75, 0.0),
        ];
        let c4z = SymOp::from_arrays([[0, -1, 0], [1, 0, 0], [0, 0, 1]], [0.0; 3]).unwrap();
        let ops = vec![
            SymOp::identity(),
            c4z.clone(),
            c4z.compose(&c4z),
            c4z.compose(&c4z).compose(&c4z),
        ];

        let assignments = vec![
            vec![SpinState::Up, SpinState::Up, SpinState::Down, SpinState::Down],
            vec![SpinState::Up, SpinState::Down, SpinState::Up, SpinState::Down],
            vec![SpinState::Up, SpinState::Down, SpinState::Down, SpinState::Up],
        ];

        for spins in assignments.iter() {
            let a = analyze_orbit(&ops, &positions, spins, TOL).unwrap();
            let b = analyze_orbit(&ops, &positions, &flip_all(spins), TOL).unwrap();

            assert_eq!(a.verdict, b.verdict, "{:?}", spins);
        }
    }

    #[test]
    fn boundary_images_are_matched() {
        // the inversion image lands just short of a lattice vector
        let positions = pair([0.2, 0.0, 0.0], [0.7999995, 0.0, 0.0]);
        let ops = vec![SymOp::identity(), SymOp::inversion()];

        let a = analyze_orbit(&ops, &positions, &[SpinState::Up, SpinState::Down], TOL).unwrap();

        assert_eq!(a.retained_ops, vec![1]);
    }
}
