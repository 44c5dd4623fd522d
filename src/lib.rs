//! Near-duplicate detection for cached media.
//!
//! Images are reduced to a 9x8 grayscale grid and fingerprinted with a
//! 64-bit difference hash. Fingerprints within a small Hamming distance of
//! each other are joined into clusters with a disjoint-set forest.

pub mod assemble;
pub mod cluster;
pub mod config;
pub mod dhash;
pub mod error;
pub mod normalize;
pub mod store;

#[cfg(test)]
mod test_util;

pub use assemble::{
    find_duplicate_sets, fingerprint_pending, verify_candidate_sets, BatchReport, DuplicateSet,
};
pub use cluster::{cluster_by_fingerprint, ClusterBuilder, DEFAULT_THRESHOLD};
pub use dhash::{compare_fingerprints, compute_fingerprint, fingerprint_file, Fingerprint};
pub use error::{DecodeError, Error, StoreError};
pub use store::{Catalog, MediaRecord, MediaStore};
