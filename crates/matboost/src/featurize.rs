//! Structure featurization.
//!
//! A [`Featurizer`] turns one [`Structure`] into a fixed-width descriptor
//! vector. Featurization is allowed to fail per structure; [`featurize_batch`]
//! records such rows as failed and fills them with `NaN` instead of dropping
//! them, so the table keeps one row per record.

use ndarray::Array2;

use crate::structure::{Structure, StructureError};
use crate::utils::Parallelism;

/// Per-structure featurization failure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FeaturizeError {
    #[error("unknown element symbol {0:?}")]
    UnknownElement(String),

    #[error(transparent)]
    Structure(#[from] StructureError),

    #[error("featurizer returned {got} values, expected {expected}")]
    WrongLength { expected: usize, got: usize },

    #[error("non-finite value in feature {0}")]
    NonFinite(usize),

    #[error("{0}")]
    Failed(String),
}

/// Maps a structure to a fixed-length feature vector.
pub trait Featurizer: Send + Sync {
    /// Column names, one per feature, in output order.
    fn feature_labels(&self) -> Vec<String>;

    /// Width of every vector returned by [`Featurizer::featurize`].
    fn n_features(&self) -> usize {
        self.feature_labels().len()
    }

    /// Featurize one structure. The feature cache passes structures already
    /// in canonical form.
    fn featurize(&self, structure: &Structure) -> Result<Vec<f64>, FeaturizeError>;
}

// =============================================================================
// Batch featurization
// =============================================================================

/// Result of featurizing a batch of structures.
#[derive(Debug, Clone)]
pub struct FeaturizedBatch {
    /// `n_rows × n_features`; failed rows are all `NaN`.
    pub rows: Array2<f64>,
    /// `failed[i]` is set when row `i` could not be featurized.
    pub failed: Vec<bool>,
}

impl FeaturizedBatch {
    pub fn n_failed(&self) -> usize {
        self.failed.iter().filter(|&&f| f).count()
    }
}

/// Featurize every item, in order.
///
/// `None` items are structures that already failed upstream (e.g. during
/// canonicalization); they produce a failed row without calling the
/// featurizer.
pub fn featurize_batch(
    featurizer: &dyn Featurizer,
    items: &[Option<&Structure>],
    parallelism: Parallelism,
) -> FeaturizedBatch {
    let width = featurizer.n_features();
    let results = parallelism.maybe_par_map(0..items.len(), |i| {
        items[i].map(|s| checked_featurize(featurizer, s, width))
    });

    let mut rows = Array2::from_elem((items.len(), width), f64::NAN);
    let mut failed = vec![false; items.len()];
    for (i, result) in results.into_iter().enumerate() {
        match result {
            Some(Ok(values)) => {
                for (cell, value) in rows.row_mut(i).iter_mut().zip(values) {
                    *cell = value;
                }
            }
            Some(Err(err)) => {
                tracing::debug!(row = i, %err, "featurization failed");
                failed[i] = true;
            }
            None => failed[i] = true,
        }
    }
    FeaturizedBatch { rows, failed }
}

fn checked_featurize(
    featurizer: &dyn Featurizer,
    structure: &Structure,
    width: usize,
) -> Result<Vec<f64>, FeaturizeError> {
    let values = featurizer.featurize(structure)?;
    if values.len() != width {
        return Err(FeaturizeError::WrongLength { expected: width, got: values.len() });
    }
    if let Some(idx) = values.iter().position(|v| !v.is_finite()) {
        return Err(FeaturizeError::NonFinite(idx));
    }
    Ok(values)
}

// =============================================================================
// BasicStructureFeaturizer
// =============================================================================

const BASIC_LABELS: [&str; 17] = [
    "n_sites",
    "n_species",
    "volume",
    "volume_per_atom",
    "lattice_a",
    "lattice_b",
    "lattice_c",
    "lattice_alpha",
    "lattice_beta",
    "lattice_gamma",
    "mean_Z",
    "std_Z",
    "min_Z",
    "max_Z",
    "range_Z",
    "min_nn_distance",
    "mean_nn_distance",
];

/// Cheap cell, composition and neighbour descriptors.
///
/// Stands in for a full descriptor library: it covers lattice geometry,
/// atomic-number statistics and nearest-neighbour distances under periodic
/// boundary conditions.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicStructureFeaturizer;

impl Featurizer for BasicStructureFeaturizer {
    fn feature_labels(&self) -> Vec<String> {
        BASIC_LABELS.iter().map(|s| s.to_string()).collect()
    }

    fn n_features(&self) -> usize {
        BASIC_LABELS.len()
    }

    fn featurize(&self, structure: &Structure) -> Result<Vec<f64>, FeaturizeError> {
        let s = structure.canonical_form()?;
        let z = s
            .elements
            .iter()
            .map(|el| atomic_number(el).map(f64::from).ok_or_else(|| FeaturizeError::UnknownElement(el.clone())))
            .collect::<Result<Vec<_>, _>>()?;

        let n = s.n_sites() as f64;
        let volume = s.volume();
        let [a, b, c] = s.lattice_lengths();
        let [alpha, beta, gamma] = s.lattice_angles();

        let mut species: Vec<&str> = s.elements.iter().map(String::as_str).collect();
        species.sort_unstable();
        species.dedup();

        let mean_z = z.iter().sum::<f64>() / n;
        let std_z = (z.iter().map(|v| (v - mean_z).powi(2)).sum::<f64>() / n).sqrt();
        let min_z = z.iter().copied().fold(f64::INFINITY, f64::min);
        let max_z = z.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let nn = nearest_neighbour_distances(&s);
        let min_nn = nn.iter().copied().fold(f64::INFINITY, f64::min);
        let mean_nn = nn.iter().sum::<f64>() / nn.len() as f64;

        Ok(vec![
            n,
            species.len() as f64,
            volume,
            volume / n,
            a,
            b,
            c,
            alpha,
            beta,
            gamma,
            mean_z,
            std_z,
            min_z,
            max_z,
            max_z - min_z,
            min_nn,
            mean_nn,
        ])
    }
}

/// Distance from each site to its closest neighbour over the 27 nearest images.
fn nearest_neighbour_distances(s: &Structure) -> Vec<f64> {
    let mut out = Vec::with_capacity(s.n_sites());
    for (i, fi) in s.coords.iter().enumerate() {
        let mut best = f64::INFINITY;
        for (j, fj) in s.coords.iter().enumerate() {
            for image in IMAGES {
                if i == j && image == [0.0, 0.0, 0.0] {
                    continue;
                }
                let delta = [
                    fj[0] + image[0] - fi[0],
                    fj[1] + image[1] - fi[1],
                    fj[2] + image[2] - fi[2],
                ];
                let r = s.to_cartesian_point(delta);
                let d = (r[0] * r[0] + r[1] * r[1] + r[2] * r[2]).sqrt();
                if d < best {
                    best = d;
                }
            }
        }
        out.push(best);
    }
    out
}

const IMAGES: [[f64; 3]; 27] = {
    let mut images = [[0.0; 3]; 27];
    let mut idx = 0;
    while idx < 27 {
        images[idx] = [
            (idx / 9) as f64 - 1.0,
            ((idx / 3) % 3) as f64 - 1.0,
            (idx % 3) as f64 - 1.0,
        ];
        idx += 1;
    }
    images
};

const ELEMENTS: [&str; 118] = [
    "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si", "P", "S", "Cl",
    "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge", "As",
    "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In",
    "Sn", "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd", "Pm", "Sm", "Eu", "Gd", "Tb",
    "Dy", "Ho", "Er", "Tm", "Yb", "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg", "Tl",
    "Pb", "Bi", "Po", "At", "Rn", "Fr", "Ra", "Ac", "Th", "Pa", "U", "Np", "Pu", "Am", "Cm", "Bk",
    "Cf", "Es", "Fm", "Md", "No", "Lr", "Rf", "Db", "Sg", "Bh", "Hs", "Mt", "Ds", "Rg", "Cn", "Nh",
    "Fl", "Mc", "Lv", "Ts", "Og",
];

/// Atomic number of an element symbol.
pub fn atomic_number(symbol: &str) -> Option<u8> {
    ELEMENTS.iter().position(|&el| el == symbol).map(|idx| idx as u8 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn simple_cubic(el: &str, a: f64) -> Structure {
        Structure {
            lattice_mat: [[a, 0.0, 0.0], [0.0, a, 0.0], [0.0, 0.0, a]],
            coords: vec![[0.0, 0.0, 0.0]],
            elements: vec![el.into()],
            cartesian: false,
        }
    }

    struct Flaky;

    impl Featurizer for Flaky {
        fn feature_labels(&self) -> Vec<String> {
            vec!["a".into(), "b".into()]
        }

        fn featurize(&self, s: &Structure) -> Result<Vec<f64>, FeaturizeError> {
            match s.elements[0].as_str() {
                "Fe" => Ok(vec![1.0, 2.0]),
                "Nb" => Ok(vec![1.0, f64::NAN]),
                "Cu" => Ok(vec![1.0]),
                _ => Err(FeaturizeError::Failed("boom".into())),
            }
        }
    }

    #[test]
    fn atomic_numbers() {
        assert_eq!(atomic_number("H"), Some(1));
        assert_eq!(atomic_number("Fe"), Some(26));
        assert_eq!(atomic_number("Og"), Some(118));
        assert_eq!(atomic_number("Xx"), None);
    }

    #[test]
    fn basic_features_of_simple_cubic() {
        let f = BasicStructureFeaturizer;
        let v = f.featurize(&simple_cubic("Po", 3.35)).unwrap();
        assert_eq!(v.len(), f.n_features());
        assert_eq!(v[0], 1.0);
        assert_eq!(v[1], 1.0);
        assert_abs_diff_eq!(v[2], 3.35f64.powi(3), epsilon = 1e-9);
        assert_abs_diff_eq!(v[7], 90.0, epsilon = 1e-9);
        assert_eq!(v[10], 84.0);
        assert_eq!(v[11], 0.0);
        assert_abs_diff_eq!(v[15], 3.35, epsilon = 1e-9);
        assert_abs_diff_eq!(v[16], 3.35, epsilon = 1e-9);
    }

    #[test]
    fn nearest_neighbour_in_bcc() {
        let mut s = simple_cubic("Fe", 2.0);
        s.coords.push([0.5, 0.5, 0.5]);
        s.elements.push("Fe".into());
        let v = BasicStructureFeaturizer.featurize(&s).unwrap();
        assert_abs_diff_eq!(v[15], 3.0f64.sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn cartesian_and_canonical_inputs_agree() {
        let cartesian = Structure {
            lattice_mat: [[0.0, 2.8, 2.8], [2.8, 0.0, 2.8], [2.8, 2.8, 0.0]],
            coords: vec![[0.0, 0.0, 0.0], [2.8, 2.8, 2.8]],
            elements: vec!["Na".into(), "Cl".into()],
            cartesian: true,
        };
        let canonical = cartesian.canonicalize().unwrap();
        let from_cartesian = BasicStructureFeaturizer.featurize(&cartesian).unwrap();
        let from_canonical = BasicStructureFeaturizer.featurize(&canonical).unwrap();
        for (a, b) in from_cartesian.iter().zip(&from_canonical) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
        }
    }

    #[test]
    fn unknown_element_fails() {
        let err = BasicStructureFeaturizer.featurize(&simple_cubic("Zz", 3.0)).unwrap_err();
        assert_eq!(err, FeaturizeError::UnknownElement("Zz".into()));
    }

    #[test]
    fn batch_flags_failures_without_dropping_rows() {
        let ok = simple_cubic("Fe", 3.0);
        let nan = simple_cubic("Nb", 3.0);
        let short = simple_cubic("Cu", 3.0);
        let err = simple_cubic("Al", 3.0);
        let items = [Some(&ok), Some(&nan), Some(&short), Some(&err), None];

        for par in [Parallelism::Sequential, Parallelism::Parallel] {
            let batch = featurize_batch(&Flaky, &items, par);
            assert_eq!(batch.rows.dim(), (5, 2));
            assert_eq!(batch.failed, [false, true, true, true, true]);
            assert_eq!(batch.n_failed(), 4);
            assert_eq!(batch.rows[[0, 1]], 2.0);
            assert!(batch.rows.row(1).iter().all(|v| v.is_nan()));
        }
    }
}
