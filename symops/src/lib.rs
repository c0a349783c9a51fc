//! Space-group operation algebra in fractional coordinates.
//!
//! An operation acts as `x' = R x + t` with an integer unimodular `R`.
//! Besides composition and inversion this crate provides the predicates the
//! altermagnet classifier relies on (trace, inversion, pure translation),
//! tolerance-aware equality modulo lattice vectors, symmetry detection
//! (`detect`), equivalent-atom orbits (`orbits`) and the crystal system
//! with its Laue class (`classify`).

use nalgebra::{Matrix3, Vector3};
use std::cmp::Ordering;
use thiserror::Error;

pub mod classify;
pub mod detect;
pub mod orbits;

pub use classify::*;
pub use detect::*;
pub use orbits::*;

/// Integer 3x3 rotation in the fractional basis.
pub type Rotation = Matrix3<i32>;

const WRAP_EPS: f64 = 1.0e-12;

#[derive(Clone, Debug, PartialEq)]
pub struct SymOp {
    rotation: Rotation,
    rotation_f64: Matrix3<f64>,
    translation: Vector3<f64>,
}

#[derive(Clone, Debug, PartialEq, Error)]
pub enum SymOpError {
    #[error("rotation determinant must be +1 or -1, got {det}")]
    NonUnimodularRotation { det: i32 },

    #[error("symmetry group is empty")]
    EmptyGroup,

    #[error("symmetry group is missing identity")]
    MissingIdentity,

    #[error("symmetry op {index} has no inverse in group")]
    MissingInverse { index: usize },

    #[error("symmetry group is not closed: op {left} composed with op {right} is missing")]
    NotClosed { left: usize, right: usize },

    #[error("symmetry op {index} violates lattice consistency (max metric deviation = {deviation:.3e})")]
    LatticeInconsistent { index: usize, deviation: f64 },
}

impl SymOp {
    /// Builds an operation; the translation is reduced into `[0, 1)`.
    pub fn new(rotation: Rotation, translation: Vector3<f64>) -> Result<Self, SymOpError> {
        let det = determinant(&rotation);
        if det != 1 && det != -1 {
            return Err(SymOpError::NonUnimodularRotation { det });
        }

        Ok(Self::from_parts(rotation, normalize_fractional(&translation)))
    }

    /// Convenience constructor from row-major arrays.
    pub fn from_arrays(rotation: [[i32; 3]; 3], translation: [f64; 3]) -> Result<Self, SymOpError> {
        let r = Matrix3::new(
            rotation[0][0],
            rotation[0][1],
            rotation[0][2],
            rotation[1][0],
            rotation[1][1],
            rotation[1][2],
            rotation[2][0],
            rotation[2][1],
            rotation[2][2],
        );

        Self::new(r, Vector3::new(translation[0], translation[1], translation[2]))
    }

    pub fn identity() -> Self {
        Self::from_parts(Matrix3::identity(), Vector3::zeros())
    }

    /// Space inversion through the origin.
    pub fn inversion() -> Self {
        Self::from_parts(-Matrix3::<i32>::identity(), Vector3::zeros())
    }

    /// Pure lattice-internal translation.
    pub fn translation_op(t: Vector3<f64>) -> Self {
        Self::from_parts(Matrix3::identity(), normalize_fractional(&t))
    }

    fn from_parts(rotation: Rotation, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            rotation_f64: rotation.map(|x| x as f64),
            translation,
        }
    }

    pub fn rotation(&self) -> &Rotation {
        &self.rotation
    }

    pub fn translation(&self) -> &Vector3<f64> {
        &self.translation
    }

    pub fn trace(&self) -> i32 {
        self.rotation.trace()
    }

    pub fn determinant(&self) -> i32 {
        determinant(&self.rotation)
    }

    /// `R = -1`, whatever the translation.
    pub fn is_inversion(&self) -> bool {
        self.rotation == -Matrix3::<i32>::identity()
    }

    /// `R = 1` with a translation that is not a lattice vector.
    pub fn is_pure_translation(&self, tol: f64) -> bool {
        self.rotation == Matrix3::identity() && self.translation.norm() > tol
    }

    /// `R x + t` without reduction into the cell.
    pub fn apply(&self, x: &Vector3<f64>) -> Vector3<f64> {
        self.rotation_f64 * x + self.translation
    }

    /// `R x + t` reduced into `[0, 1)`.
    pub fn apply_fractional(&self, x: &Vector3<f64>) -> Vector3<f64> {
        normalize_fractional(&self.apply(x))
    }

    /// `(R1, t1) * (R2, t2) = (R1 R2, R1 t2 + t1)`.
    pub fn compose(&self, rhs: &SymOp) -> SymOp {
        let rotation = self.rotation * rhs.rotation;
        let translation = normalize_fractional(&(self.rotation_f64 * rhs.translation + self.translation));

        SymOp::from_parts(rotation, translation)
    }

    /// `(R, t)^-1 = (R^-1, -R^-1 t)`.
    pub fn inverse(&self) -> Result<SymOp, SymOpError> {
        let det = determinant(&self.rotation);
        if det != 1 && det != -1 {
            return Err(SymOpError::NonUnimodularRotation { det });
        }

        let inv_rotation = inverse_unimodular(&self.rotation, det);
        let inv_f64 = inv_rotation.map(|x| x as f64);
        let inv_translation = normalize_fractional(&(-(inv_f64 * self.translation)));

        Ok(SymOp::from_parts(inv_rotation, inv_translation))
    }
}

pub fn determinant(r: &Rotation) -> i32 {
    r[(0, 0)] * (r[(1, 1)] * r[(2, 2)] - r[(1, 2)] * r[(2, 1)])
        - r[(0, 1)] * (r[(1, 0)] * r[(2, 2)] - r[(1, 2)] * r[(2, 0)])
        + r[(0, 2)] * (r[(1, 0)] * r[(2, 1)] - r[(1, 1)] * r[(2, 0)])
}

/// Checks identity, inverses and closure with translations compared modulo
/// lattice vectors.
pub fn validate_group(ops: &[SymOp], tol: f64) -> Result<(), SymOpError> {
    if ops.is_empty() {
        return Err(SymOpError::EmptyGroup);
    }

    let identity = SymOp::identity();
    if !ops.iter().any(|op| sym_op_approx_eq(op, &identity, tol)) {
        return Err(SymOpError::MissingIdentity);
    }

    for (idx, op) in ops.iter().enumerate() {
        let has_inverse = ops.iter().any(|candidate| {
            sym_op_approx_eq(&op.compose(candidate), &identity, tol)
                && sym_op_approx_eq(&candidate.compose(op), &identity, tol)
        });
        if !has_inverse {
            return Err(SymOpError::MissingInverse { index: idx });
        }
    }

    for (i, left) in ops.iter().enumerate() {
        for (j, right) in ops.iter().enumerate() {
            let composed = left.compose(right);
            if !ops.iter().any(|c| sym_op_approx_eq(&composed, c, tol)) {
                return Err(SymOpError::NotClosed { left: i, right: j });
            }
        }
    }

    Ok(())
}

/// Metric tensor `G = A A^T` from lattice vectors stored as rows of `A`.
pub fn lattice_metric(lattice: &Matrix3<f64>) -> Matrix3<f64> {
    lattice * lattice.transpose()
}

/// Largest entry of `|R^T G R - G|`.
pub fn rotation_metric_deviation(rotation: &Rotation, metric: &Matrix3<f64>) -> f64 {
    let r = rotation.map(|x| x as f64);

    (r.transpose() * metric * r - metric).abs().max()
}

pub fn validate_lattice_consistency(
    ops: &[SymOp],
    lattice: &Matrix3<f64>,
    tol: f64,
) -> Result<(), SymOpError> {
    let metric = lattice_metric(lattice);

    for (idx, op) in ops.iter().enumerate() {
        let det = op.determinant();
        if det != 1 && det != -1 {
            return Err(SymOpError::NonUnimodularRotation { det });
        }

        let deviation = rotation_metric_deviation(op.rotation(), &metric);
        if deviation > tol {
            return Err(SymOpError::LatticeInconsistent {
                index: idx,
                deviation,
            });
        }
    }

    Ok(())
}

pub fn sym_op_approx_eq(lhs: &SymOp, rhs: &SymOp, tol: f64) -> bool {
    lhs.rotation == rhs.rotation && approx_eq_mod_lattice(&lhs.translation, &rhs.translation, tol)
}

/// Compares two fractional vectors modulo integer lattice shifts.
pub fn approx_eq_mod_lattice(lhs: &Vector3<f64>, rhs: &Vector3<f64>, tol: f64) -> bool {
    (0..3).all(|i| wrap_centered(lhs[i] - rhs[i]).abs() <= tol)
}

/// Lexicographic order on rotation entries (row-major), then translation.
pub fn cmp_ops(lhs: &SymOp, rhs: &SymOp) -> Ordering {
    let rot = cmp_rotation(lhs.rotation(), rhs.rotation());
    if rot != Ordering::Equal {
        return rot;
    }

    for i in 0..3 {
        match lhs.translation[i].partial_cmp(&rhs.translation[i]) {
            Some(Ordering::Equal) | None => continue,
            Some(ord) => return ord,
        }
    }

    Ordering::Equal
}

pub(crate) fn cmp_rotation(lhs: &Rotation, rhs: &Rotation) -> Ordering {
    for i in 0..3 {
        for j in 0..3 {
            let c = lhs[(i, j)].cmp(&rhs[(i, j)]);
            if c != Ordering::Equal {
                return c;
            }
        }
    }

    Ordering::Equal
}

fn inverse_unimodular(r: &Rotation, det: i32) -> Rotation {
    let mut inv = Rotation::zeros();

    for row in 0..3 {
        for col in 0..3 {
            inv[(col, row)] = cofactor(r, row, col) / det;
        }
    }

    inv
}

fn cofactor(r: &Rotation, row: usize, col: usize) -> i32 {
    let mut vals = [0_i32; 4];
    let mut idx = 0;

    for i in (0..3).filter(|i| *i != row) {
        for j in (0..3).filter(|j| *j != col) {
            vals[idx] = r[(i, j)];
            idx += 1;
        }
    }

    let minor = vals[0] * vals[3] - vals[1] * vals[2];

    if (row + col) % 2 == 0 {
        minor
    } else {
        -minor
    }
}

pub fn normalize_fractional(v: &Vector3<f64>) -> Vector3<f64> {
    v.map(wrap_fractional)
}

fn wrap_fractional(x: f64) -> f64 {
    let mut w = x - x.floor();

    if w >= 1.0 {
        w -= 1.0;
    }
    if w < 0.0 {
        w += 1.0;
    }

    if w.abs() < WRAP_EPS || (1.0 - w).abs() < WRAP_EPS {
        0.0
    } else {
        w
    }
}

// nearest-image representative in [-0.5, 0.5)
fn wrap_centered(x: f64) -> f64 {
    let mut w = x - x.round();

    if w >= 0.5 {
        w -= 1.0;
    }
    if w < -0.5 {
        w += 1.0;
    }

    w
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1.0e-9;

    fn c2z() -> SymOp {
        SymOp::from_arrays([[-1, 0, 0], [0, -1, 0], [0, 0, 1]], [0.0, 0.0, 0.0]).unwrap()
    }

    #[test]
    fn rejects_non_unimodular_rotation() {
        let err = SymOp::from_arrays([[2, 0, 0], [0, 1, 0], [0, 0, 1]], [0.0; 3]).unwrap_err();
        assert_eq!(err, SymOpError::NonUnimodularRotation { det: 2 });
    }

    #[test]
    fn translation_is_normalized() {
        let op = SymOp::from_arrays([[1, 0, 0], [0, 1, 0], [0, 0, 1]], [1.5, -0.25, 2.0]).unwrap();
        let t = op.translation();

        assert!((t.x - 0.5).abs() < TOL);
        assert!((t.y - 0.75).abs() < TOL);
        assert!(t.z.abs() < TOL);
    }

    #[test]
    fn trace_and_kind_predicates() {
        assert_eq!(SymOp::identity().trace(), 3);
        assert_eq!(SymOp::inversion().trace(), -3);
        assert_eq!(c2z().trace(), -1);

        assert!(SymOp::inversion().is_inversion());
        assert!(!c2z().is_inversion());

        let t = SymOp::translation_op(Vector3::new(0.5, 0.5, 0.5));
        assert!(t.is_pure_translation(1.0e-3));
        assert!(!SymOp::identity().is_pure_translation(1.0e-3));
        assert!(!c2z().is_pure_translation(1.0e-3));
    }

    #[test]
    fn apply_does_not_wrap() {
        let op = SymOp::translation_op(Vector3::new(0.5, 0.0, 0.0));
        let x = op.apply(&Vector3::new(0.75, 0.0, 0.0));
        assert!((x.x - 1.25).abs() < TOL);

        let y = op.apply_fractional(&Vector3::new(0.75, 0.0, 0.0));
        assert!((y.x - 0.25).abs() < TOL);
    }

    #[test]
    fn compose_with_inverse_is_identity() {
        let op = SymOp::from_arrays([[0, -1, 0], [1, -1, 0], [0, 0, 1]], [0.5, 0.25, 0.0]).unwrap();
        let inv = op.inverse().unwrap();
        let id = SymOp::identity();

        assert!(sym_op_approx_eq(&op.compose(&inv), &id, TOL));
        assert!(sym_op_approx_eq(&inv.compose(&op), &id, TOL));
    }

    #[test]
    fn validate_small_group() {
        let ops = vec![SymOp::identity(), c2z()];
        assert_eq!(validate_group(&ops, TOL), Ok(()));
    }

    #[test]
    fn validate_missing_inverse() {
        let ops = vec![
            SymOp::identity(),
            SymOp::translation_op(Vector3::new(0.25, 0.0, 0.0)),
        ];
        assert_eq!(
            validate_group(&ops, TOL),
            Err(SymOpError::MissingInverse { index: 1 })
        );
    }

    #[test]
    fn lattice_validation_rejects_non_metric_rotation() {
        let shear = SymOp::from_arrays([[1, 1, 0], [0, 1, 0], [0, 0, 1]], [0.0; 3]).unwrap();
        let err = validate_lattice_consistency(
            &[SymOp::identity(), shear],
            &Matrix3::identity(),
            1.0e-9,
        )
        .unwrap_err();

        assert!(matches!(err, SymOpError::LatticeInconsistent { index: 1, .. }));
    }

    #[test]
    fn lattice_validation_accepts_metric_preserving_group() {
        let lattice = Matrix3::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 2.0);
        let ops = vec![SymOp::identity(), c2z()];

        assert_eq!(validate_lattice_consistency(&ops, &lattice, 1.0e-9), Ok(()));
    }
}
