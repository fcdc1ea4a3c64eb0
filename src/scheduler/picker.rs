use rand::Rng;
use std::collections::BTreeSet;

use crate::model::PhotoCluster;

/// A cluster still available in the current batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: String,
    pub photo_count: usize,
}

/// Clusters with at least one photo that were not used today.
pub fn candidate_pool(clusters: &[PhotoCluster], used_today: &BTreeSet<String>) -> Vec<Candidate> {
    clusters
        .iter()
        .filter(|c| c.photo_count() >= 1 && !used_today.contains(&c.id))
        .map(|c| Candidate {
            id: c.id.clone(),
            photo_count: c.photo_count(),
        })
        .collect()
}

/// Take one cluster uniformly from the `top` largest in the pool and remove
/// it, so it cannot be picked again in this batch.
pub fn pick_next<R: Rng + ?Sized>(pool: &mut Vec<Candidate>, top: usize, rng: &mut R) -> Option<Candidate> {
    if pool.is_empty() {
        return None;
    }

    // Ties broken by id so a seeded run is reproducible
    pool.sort_by(|a, b| b.photo_count.cmp(&a.photo_count).then_with(|| a.id.cmp(&b.id)));
    let window = top.max(1).min(pool.len());
    let index = rng.gen_range(0..window);
    Some(pool.remove(index))
}
