//! Grouping of media ids by fingerprint proximity.
//!
//! Every unordered pair is compared, so the cost grows quadratically with
//! the number of fingerprints. That is fine for a few thousand eligible
//! assets; well past ten thousand a bucketing pre-filter would be needed.

pub mod forest;

use std::collections::HashMap;

pub use forest::Forest;

use crate::dhash::Fingerprint;

/// Largest distance, in bits, at which two fingerprints still join a cluster.
pub const DEFAULT_THRESHOLD: u32 = 8;

#[derive(Debug, Clone)]
pub struct ClusterBuilder {
    threshold: u32,
    keep_sentinel: bool,
}

impl Default for ClusterBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl ClusterBuilder {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            keep_sentinel: false,
        }
    }

    /// Cluster sentinel fingerprints too instead of dropping them.
    ///
    /// All blank images share the sentinel, so with this set they end up in
    /// one group whether or not they are related.
    pub fn keep_sentinel(mut self, keep: bool) -> Self {
        self.keep_sentinel = keep;
        self
    }

    /// Group ids whose fingerprints are connected by a chain of comparisons
    /// each within the threshold.
    ///
    /// Groups are returned with their ids sorted, ordered by smallest id.
    /// Ids without a neighbour are left out. A repeated id keeps the
    /// fingerprint it was first given.
    pub fn build<I, S>(&self, pairs: I) -> Vec<Vec<String>>
    where
        I: IntoIterator<Item = (S, Fingerprint)>,
        S: Into<String>,
    {
        let mut ids: Vec<String> = Vec::new();
        let mut fingerprints: Vec<Fingerprint> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for (id, fingerprint) in pairs {
            if fingerprint.is_sentinel() && !self.keep_sentinel {
                continue;
            }
            let id = id.into();
            if index.contains_key(&id) {
                continue;
            }
            index.insert(id.clone(), ids.len());
            ids.push(id);
            fingerprints.push(fingerprint);
        }

        let n = fingerprints.len();
        let mut forest = Forest::new(n);
        let mut merged = 0usize;
        for i in 0..n {
            for j in (i + 1)..n {
                if fingerprints[i].distance(&fingerprints[j]) <= self.threshold
                    && forest.union(i, j)
                {
                    merged += 1;
                }
            }
        }

        let mut groups: Vec<Vec<String>> = forest
            .components()
            .into_iter()
            .filter(|members| members.len() > 1)
            .map(|members| {
                let mut group: Vec<String> =
                    members.into_iter().map(|i| ids[i].clone()).collect();
                group.sort();
                group
            })
            .collect();
        groups.sort();

        log::debug!(
            "compared {} pairs of {} fingerprints, {} merges, {} groups",
            n * n.saturating_sub(1) / 2,
            n,
            merged,
            groups.len()
        );

        groups
    }
}

/// Cluster with the default options at `threshold`.
pub fn cluster_by_fingerprint<I, S>(pairs: I, threshold: u32) -> Vec<Vec<String>>
where
    I: IntoIterator<Item = (S, Fingerprint)>,
    S: Into<String>,
{
    ClusterBuilder::new(threshold).build(pairs)
}
