use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use log::{debug, warn};
use rand::Rng;
use rand::seq::SliceRandom;

use crate::data::model::StellarType;
use crate::data::store;

// ---------------------------------------------------------------------------
// Per-class quota
// ---------------------------------------------------------------------------

/// How many examples to draw from each stellar class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassQuota {
    pub giants: usize,
    pub subgiants: usize,
    pub dwarfs: usize,
}

impl Default for ClassQuota {
    fn default() -> Self {
        Self {
            giants: 7,
            subgiants: 6,
            dwarfs: 7,
        }
    }
}

impl ClassQuota {
    pub fn for_class(&self, class: StellarType) -> usize {
        match class {
            StellarType::Giants => self.giants,
            StellarType::Subgiants => self.subgiants,
            StellarType::Dwarfs => self.dwarfs,
        }
    }
}

// ---------------------------------------------------------------------------
// Stratified selection
// ---------------------------------------------------------------------------

/// Row indices per stellar class, ascending within each class.
/// Rows whose log g cannot be classified are left out.
pub fn partition_by_type(logg: &[f64]) -> BTreeMap<StellarType, Vec<usize>> {
    let mut classes: BTreeMap<StellarType, Vec<usize>> = BTreeMap::new();
    let mut unclassified = 0usize;
    for (idx, &g) in logg.iter().enumerate() {
        match StellarType::classify(g) {
            Some(class) => classes.entry(class).or_default().push(idx),
            None => unclassified += 1,
        }
    }
    if unclassified > 0 {
        warn!("{unclassified} rows have no usable log g and are never sampled");
    }
    classes
}

/// Draw up to `quota` indices per class without replacement, concatenated
/// in class order (giants, subgiants, dwarfs) and truncated to `n_examples`.
///
/// A class smaller than its quota contributes all of its rows; an empty
/// class contributes nothing.
pub fn select_from_logg<R: Rng + ?Sized>(
    logg: &[f64],
    n_examples: usize,
    quota: ClassQuota,
    rng: &mut R,
) -> Vec<usize> {
    let classes = partition_by_type(logg);
    let mut indices = Vec::with_capacity(n_examples);

    for class in StellarType::ALL {
        let Some(members) = classes.get(&class) else {
            debug!("no {class} in the store");
            continue;
        };
        let want = quota.for_class(class);
        let drawn: Vec<usize> = members.choose_multiple(rng, want).copied().collect();
        debug!("{class}: drew {} of {} (quota {want})", drawn.len(), members.len());
        indices.extend(drawn);
    }

    indices.truncate(n_examples);
    indices
}

/// Stratified example selection straight from a dataset store.
pub fn select_diverse_examples<R: Rng + ?Sized>(
    store_path: &Path,
    n_examples: usize,
    quota: ClassQuota,
    rng: &mut R,
) -> Result<Vec<usize>> {
    let logg = store::read_logg(store_path)?;
    Ok(select_from_logg(&logg, n_examples, quota, rng))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::data::store::fixtures;

    fn count_by_class(logg: &[f64], picked: &[usize]) -> BTreeMap<StellarType, usize> {
        let mut counts = BTreeMap::new();
        for &i in picked {
            *counts.entry(StellarType::classify(logg[i]).unwrap()).or_insert(0) += 1;
        }
        counts
    }

    #[test]
    fn small_classes_contribute_everything() {
        let logg = [1.0, 1.0, 2.0, 3.0, 3.0, 4.0, 4.0, 5.0, 5.0, 5.0];
        let mut rng = StdRng::seed_from_u64(42);
        let picked = select_from_logg(&logg, 20, ClassQuota::default(), &mut rng);

        assert_eq!(picked.len(), 10);
        let counts = count_by_class(&logg, &picked);
        assert_eq!(counts[&StellarType::Giants], 3);
        assert_eq!(counts[&StellarType::Subgiants], 2);
        assert_eq!(counts[&StellarType::Dwarfs], 5);
    }

    #[test]
    fn draws_are_unique_class_consistent_and_bounded() {
        let logg: Vec<f64> = (0..300).map(|i| (i % 50) as f64 * 0.1).collect();
        let mut rng = StdRng::seed_from_u64(7);

        for n in [0, 1, 5, 13, 20, 40] {
            let picked = select_from_logg(&logg, n, ClassQuota::default(), &mut rng);
            assert!(picked.len() <= n);
            assert_eq!(picked.len(), n.min(20));
            let unique: HashSet<_> = picked.iter().collect();
            assert_eq!(unique.len(), picked.len());
        }

        let picked = select_from_logg(&logg, 20, ClassQuota::default(), &mut rng);
        let classes: Vec<StellarType> = picked
            .iter()
            .map(|&i| StellarType::classify(logg[i]).unwrap())
            .collect();
        assert!(classes[..7].iter().all(|c| *c == StellarType::Giants));
        assert!(classes[7..13].iter().all(|c| *c == StellarType::Subgiants));
        assert!(classes[13..].iter().all(|c| *c == StellarType::Dwarfs));
    }

    #[test]
    fn truncation_keeps_class_order() {
        let logg: Vec<f64> = (0..100).map(|i| (i % 10) as f64 * 0.5).collect();
        let mut rng = StdRng::seed_from_u64(1);
        let picked = select_from_logg(&logg, 9, ClassQuota::default(), &mut rng);
        let counts = count_by_class(&logg, &picked);
        assert_eq!(counts[&StellarType::Giants], 7);
        assert_eq!(counts[&StellarType::Subgiants], 2);
        assert!(!counts.contains_key(&StellarType::Dwarfs));
    }

    #[test]
    fn empty_class_is_skipped() {
        let logg = [4.0, 4.5, 1.0, 5.0];
        let mut rng = StdRng::seed_from_u64(3);
        let picked = select_from_logg(&logg, 20, ClassQuota::default(), &mut rng);
        assert_eq!(picked.len(), 4);
        assert_eq!(picked[0], 2);
        assert!(!count_by_class(&logg, &picked).contains_key(&StellarType::Subgiants));
    }

    #[test]
    fn same_seed_same_selection() {
        let logg: Vec<f64> = (0..500).map(|i| (i % 45) as f64 * 0.11).collect();
        let quota = ClassQuota::default();
        let a = select_from_logg(&logg, 20, quota, &mut StdRng::seed_from_u64(42));
        let b = select_from_logg(&logg, 20, quota, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn non_finite_rows_are_never_selected() {
        let logg = [f64::NAN, 1.0, f64::INFINITY, 4.0, f64::NEG_INFINITY];
        let mut rng = StdRng::seed_from_u64(0);
        let mut picked = select_from_logg(&logg, 20, ClassQuota::default(), &mut rng);
        picked.sort_unstable();
        assert_eq!(picked, vec![1, 3]);
    }

    #[test]
    fn selects_from_store() {
        let dir = tempfile::tempdir().unwrap();
        let logg = [1.0, 1.0, 2.0, 3.0, 3.0, 4.0, 4.0, 5.0, 5.0, 5.0];
        fixtures::write(dir.path(), &logg);

        let mut rng = StdRng::seed_from_u64(42);
        let picked =
            select_diverse_examples(dir.path(), 20, ClassQuota::default(), &mut rng).unwrap();
        let mut sorted = picked.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..10).collect::<Vec<_>>());
    }
}
