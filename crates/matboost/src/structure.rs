//! Periodic atomic structures.
//!
//! [`Structure`] mirrors the JARVIS `atoms` record layout: a lattice given as
//! three row vectors, one coordinate triple per site, and a flag telling
//! whether the coordinates are cartesian or fractional.
//!
//! Featurizers assume canonical input: fractional coordinates folded into the
//! base cell, i.e. every component in `[0, 1)`. [`Structure::canonicalize`]
//! produces that form. The cell itself is kept as given: no primitive-cell
//! reduction or symmetry standardisation is done, so a conventional cell stays
//! conventional in the `structure_{db}.json` checkpoint.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Determinants below this magnitude are treated as a degenerate cell.
const SINGULAR_EPS: f64 = 1e-8;

/// Errors raised while normalizing a structure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StructureError {
    #[error("structure has no sites")]
    Empty,

    #[error("site count mismatch: {coords} coordinates but {elements} elements")]
    SiteCountMismatch { coords: usize, elements: usize },

    #[error("lattice is singular (determinant {0})")]
    SingularLattice(f64),

    #[error("non-finite coordinate at site {0}")]
    NonFiniteCoordinate(usize),
}

/// A periodic crystal structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    /// Lattice vectors `a`, `b`, `c` as rows (Å).
    pub lattice_mat: [[f64; 3]; 3],
    /// Site coordinates, cartesian or fractional depending on `cartesian`.
    pub coords: Vec<[f64; 3]>,
    /// Element symbol per site.
    pub elements: Vec<String>,
    #[serde(default)]
    pub cartesian: bool,
}

impl Structure {
    pub fn n_sites(&self) -> usize {
        self.coords.len()
    }

    /// Determinant of the lattice matrix (signed cell volume).
    pub fn determinant(&self) -> f64 {
        let m = &self.lattice_mat;
        m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
    }

    /// Cell volume in Å³.
    pub fn volume(&self) -> f64 {
        self.determinant().abs()
    }

    /// Lattice vector lengths `(a, b, c)`.
    pub fn lattice_lengths(&self) -> [f64; 3] {
        self.lattice_mat.map(norm)
    }

    /// Lattice angles `(alpha, beta, gamma)` in degrees.
    pub fn lattice_angles(&self) -> [f64; 3] {
        let [a, b, c] = self.lattice_mat;
        [angle_deg(b, c), angle_deg(a, c), angle_deg(a, b)]
    }

    /// Cartesian position of a fractional coordinate.
    pub fn to_cartesian_point(&self, frac: [f64; 3]) -> [f64; 3] {
        let m = &self.lattice_mat;
        let mut out = [0.0; 3];
        for (axis, value) in out.iter_mut().enumerate() {
            *value = frac[0] * m[0][axis] + frac[1] * m[1][axis] + frac[2] * m[2][axis];
        }
        out
    }

    /// Check site bookkeeping without touching the geometry.
    pub fn validate(&self) -> Result<(), StructureError> {
        if self.coords.is_empty() {
            return Err(StructureError::Empty);
        }
        if self.coords.len() != self.elements.len() {
            return Err(StructureError::SiteCountMismatch {
                coords: self.coords.len(),
                elements: self.elements.len(),
            });
        }
        if let Some(site) = self.coords.iter().position(|c| c.iter().any(|v| !v.is_finite())) {
            return Err(StructureError::NonFiniteCoordinate(site));
        }
        Ok(())
    }

    /// Express coordinates as fractions of the lattice vectors.
    pub fn to_fractional(&self) -> Result<Structure, StructureError> {
        self.validate()?;
        if !self.cartesian {
            return Ok(self.clone());
        }
        let inverse = invert(&self.lattice_mat)?;
        let coords = self
            .coords
            .iter()
            .map(|r| {
                let mut frac = [0.0; 3];
                for (axis, value) in frac.iter_mut().enumerate() {
                    *value = r[0] * inverse[0][axis] + r[1] * inverse[1][axis] + r[2] * inverse[2][axis];
                }
                frac
            })
            .collect();
        Ok(Structure {
            lattice_mat: self.lattice_mat,
            coords,
            elements: self.elements.clone(),
            cartesian: false,
        })
    }

    /// Fold fractional coordinates into `[0, 1)`.
    ///
    /// Expects fractional input; call [`Structure::to_fractional`] first.
    pub fn to_unit_cell(mut self) -> Structure {
        for site in &mut self.coords {
            for value in site.iter_mut() {
                let mut wrapped = *value - value.floor();
                // `x - floor(x)` rounds up to exactly 1.0 for tiny negative x
                if wrapped >= 1.0 {
                    wrapped = 0.0;
                }
                *value = wrapped;
            }
        }
        self
    }

    /// Canonical featurizer input: fractional coordinates inside the base cell.
    pub fn canonicalize(&self) -> Result<Structure, StructureError> {
        self.canonical_form().map(Cow::into_owned)
    }

    /// Like [`Structure::canonicalize`], but borrows `self` when it is already
    /// canonical.
    pub fn canonical_form(&self) -> Result<Cow<'_, Structure>, StructureError> {
        let det = self.determinant();
        if det.abs() < SINGULAR_EPS || !det.is_finite() {
            return Err(StructureError::SingularLattice(det));
        }
        if self.is_canonical() {
            return Ok(Cow::Borrowed(self));
        }
        Ok(Cow::Owned(self.to_fractional()?.to_unit_cell()))
    }

    /// Fractional, well formed, and every coordinate in `[0, 1)`.
    pub fn is_canonical(&self) -> bool {
        !self.cartesian
            && self.validate().is_ok()
            && self.coords.iter().flatten().all(|v| (0.0..1.0).contains(v))
    }
}

fn norm(v: [f64; 3]) -> f64 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

fn angle_deg(u: [f64; 3], v: [f64; 3]) -> f64 {
    let denom = norm(u) * norm(v);
    if denom == 0.0 {
        return 0.0;
    }
    let cos = (u[0] * v[0] + u[1] * v[1] + u[2] * v[2]) / denom;
    cos.clamp(-1.0, 1.0).acos().to_degrees()
}

/// Inverse of a 3×3 matrix through its adjugate.
fn invert(m: &[[f64; 3]; 3]) -> Result<[[f64; 3]; 3], StructureError> {
    let det = m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0]);
    if det.abs() < SINGULAR_EPS || !det.is_finite() {
        return Err(StructureError::SingularLattice(det));
    }
    let inv_det = 1.0 / det;
    Ok([
        [
            (m[1][1] * m[2][2] - m[1][2] * m[2][1]) * inv_det,
            (m[0][2] * m[2][1] - m[0][1] * m[2][2]) * inv_det,
            (m[0][1] * m[1][2] - m[0][2] * m[1][1]) * inv_det,
        ],
        [
            (m[1][2] * m[2][0] - m[1][0] * m[2][2]) * inv_det,
            (m[0][0] * m[2][2] - m[0][2] * m[2][0]) * inv_det,
            (m[0][2] * m[1][0] - m[0][0] * m[1][2]) * inv_det,
        ],
        [
            (m[1][0] * m[2][1] - m[1][1] * m[2][0]) * inv_det,
            (m[0][1] * m[2][0] - m[0][0] * m[2][1]) * inv_det,
            (m[0][0] * m[1][1] - m[0][1] * m[1][0]) * inv_det,
        ],
    ])
}
