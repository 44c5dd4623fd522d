//! Duplicate sets built on top of a [`MediaStore`].

use rayon::prelude::*;

use crate::{
    cluster::ClusterBuilder,
    dhash::{compute_fingerprint, Fingerprint},
    error::{Error, StoreError},
    store::{MediaRecord, MediaStore},
};

/// Records of media that look alike, one entry per cluster.
pub type DuplicateSet = Vec<MediaRecord>;

/// Cluster every eligible fingerprint in `store` and resolve the clusters to
/// full records.
pub fn find_duplicate_sets<S>(store: &S, threshold: u32) -> Result<Vec<DuplicateSet>, StoreError>
where
    S: MediaStore + ?Sized,
{
    let pairs = store.fetch_eligible_fingerprints()?;
    log::debug!("{} eligible fingerprints", pairs.len());

    let clusters = ClusterBuilder::new(threshold).build(pairs);

    let mut sets = Vec::with_capacity(clusters.len());
    for ids in clusters {
        let records = store.fetch_media_records_by_ids(&ids)?;
        if records.len() < 2 {
            log::debug!("cluster {:?} no longer resolves to a duplicate set", ids);
            continue;
        }
        sets.push(records);
    }

    log::info!("found {} duplicate sets", sets.len());
    Ok(sets)
}

/// Keep the candidate id groups that still refer to at least two live
/// records.
///
/// Only existence is checked; nothing is hashed or compared.
pub fn verify_candidate_sets<S>(
    store: &S,
    candidates: &[Vec<String>],
) -> Result<Vec<DuplicateSet>, StoreError>
where
    S: MediaStore + ?Sized,
{
    let mut sets = Vec::new();
    for ids in candidates {
        let live: Vec<MediaRecord> = store
            .fetch_media_records_by_ids(ids)?
            .into_iter()
            .filter(|record| !record.removed)
            .collect();
        if live.len() >= 2 {
            sets.push(live);
        }
    }
    Ok(sets)
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub hashed: Vec<(String, Fingerprint)>,
    pub failed: Vec<(String, Error)>,
}

/// Compute and persist fingerprints for every cached record that has none.
///
/// Work is spread over `workers` threads. Failures are isolated to the item
/// they happen on: the item is logged, reported and left without a
/// fingerprint, and the rest of the batch carries on.
pub fn fingerprint_pending<S>(store: &mut S, workers: usize) -> Result<BatchReport, StoreError>
where
    S: MediaStore + Sync,
{
    let ids = store.fetch_unhashed_ids()?;
    if ids.is_empty() {
        log::info!("no unhashed media");
        return Ok(BatchReport::default());
    }
    log::info!("fingerprinting {} media with {} workers", ids.len(), workers);

    let outcomes: Vec<(String, Result<Fingerprint, Error>)> = {
        let shared: &S = &*store;
        let compute = || {
            ids.into_par_iter()
                .map(|id| {
                    let outcome = shared
                        .load_image_bytes(&id)
                        .map_err(Error::from)
                        .and_then(|bytes| compute_fingerprint(&bytes).map_err(Error::from));
                    (id, outcome)
                })
                .collect::<Vec<_>>()
        };
        match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
            Ok(pool) => pool.install(compute),
            Err(e) => {
                log::warn!("cannot start worker pool ({e}), using the global pool");
                compute()
            }
        }
    };

    let mut report = BatchReport::default();
    for (id, outcome) in outcomes {
        match outcome {
            Ok(fingerprint) => {
                if let Err(e) = store.persist_fingerprint(&id, fingerprint) {
                    log::warn!("{id}: cannot store fingerprint: {e}");
                    report.failed.push((id, e.into()));
                    continue;
                }
                log::debug!("diff-hashed {id} {fingerprint}");
                report.hashed.push((id, fingerprint));
            }
            Err(e) => {
                log::warn!("{id}: skipped: {e}");
                report.failed.push((id, e));
            }
        }
    }

    log::info!(
        "fingerprinted {} media, {} failed",
        report.hashed.len(),
        report.failed.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::{
        store::Catalog,
        test_util::{encode_png, rgb_image},
    };

    fn cached(id: &str, hash: Option<u64>) -> MediaRecord {
        MediaRecord {
            content_length: Some(2048),
            content_hash: hash.map(Fingerprint),
            cache_path: Some(PathBuf::from(format!("{id}.png"))),
            ..MediaRecord::new(id)
        }
    }

    fn ids(set: &DuplicateSet) -> Vec<&str> {
        set.iter().map(|r| r.media_id.as_str()).collect()
    }

    #[test]
    fn duplicate_sets_resolve_to_records() {
        let catalog = Catalog::from_records(vec![
            cached("b", Some(0x00ff_00ff_00ff_00ff)),
            cached("a", Some(0x00ff_00ff_00ff_00fe)),
            cached("lone", Some(0xff00_ff00_ff00_ff00)),
            cached("blank1", Some(0)),
            cached("blank2", Some(0)),
            cached("pending", None),
        ]);

        let sets = find_duplicate_sets(&catalog, 8).unwrap();
        assert_eq!(sets.len(), 1);
        assert_eq!(ids(&sets[0]), vec!["a", "b"]);
        assert_eq!(sets[0][0].content_hash, Some(Fingerprint(0x00ff_00ff_00ff_00fe)));
    }

    #[test]
    fn no_eligible_media_means_no_sets() {
        let catalog = Catalog::from_records(vec![cached("x", None), cached("y", Some(0))]);
        assert!(find_duplicate_sets(&catalog, 8).unwrap().is_empty());
    }

    #[test]
    fn candidate_sets_drop_removed_and_unknown_members() {
        let catalog = Catalog::from_records(vec![
            cached("a", None),
            cached("b", None),
            MediaRecord {
                removed: true,
                ..cached("c", None)
            },
            cached("d", None),
        ]);
        let candidates = vec![
            vec!["a".to_string(), "b".to_string(), "c".to_string()],
            vec!["c".to_string(), "d".to_string()],
            vec!["d".to_string(), "ghost".to_string()],
        ];

        let sets = verify_candidate_sets(&catalog, &candidates).unwrap();
        assert_eq!(sets.len(), 1);
        assert_eq!(ids(&sets[0]), vec!["a", "b"]);
    }

    #[test]
    fn batch_isolates_failures() {
        let dir = tempfile::tempdir().unwrap();
        let gradient = encode_png(rgb_image(32, 32, |x, y| {
            [(x * 8) as u8, (y * 8) as u8, ((x ^ y) * 8) as u8]
        }));
        std::fs::write(dir.path().join("good.png"), &gradient).unwrap();
        std::fs::write(dir.path().join("copy.png"), &gradient).unwrap();
        std::fs::write(
            dir.path().join("blank.png"),
            encode_png(rgb_image(32, 32, |_, _| [250, 250, 250])),
        )
        .unwrap();
        std::fs::write(dir.path().join("corrupt.png"), b"\x89PNG\r\n\x1a\nbroken").unwrap();

        let path = dir.path().join("media.json");
        Catalog::from_records(vec![
            cached("good", None),
            cached("copy", None),
            cached("blank", None),
            cached("corrupt", None),
            cached("absent", None),
            cached("done", Some(0xffff_0000_ffff_0000)),
        ])
        .save_as(&path)
        .unwrap();
        let mut catalog = Catalog::open(&path).unwrap();

        let report = fingerprint_pending(&mut catalog, 2).unwrap();

        let mut failed: Vec<&str> = report.failed.iter().map(|(id, _)| id.as_str()).collect();
        failed.sort();
        assert_eq!(failed, vec!["absent", "corrupt"]);
        assert!(report
            .failed
            .iter()
            .any(|(id, e)| id == "corrupt" && matches!(e, Error::Decode(_))));
        assert!(report
            .failed
            .iter()
            .any(|(id, e)| id == "absent" && matches!(e, Error::Store(StoreError::Io { .. }))));
        assert_eq!(report.hashed.len(), 3);

        assert_eq!(catalog.get("blank").unwrap().content_hash, Some(Fingerprint(0)));
        assert_eq!(catalog.get("corrupt").unwrap().content_hash, None);
        assert_eq!(catalog.get("absent").unwrap().content_hash, None);
        assert_eq!(
            catalog.get("done").unwrap().content_hash,
            Some(Fingerprint(0xffff_0000_ffff_0000))
        );
        let good = catalog.get("good").unwrap().content_hash.unwrap();
        assert_eq!(good, Fingerprint(0x0000_0200_0808_0200));
        assert_eq!(catalog.get("copy").unwrap().content_hash, Some(good));
        assert!(good.distance(&Fingerprint(0xffff_0000_ffff_0000)) > 8);

        // failed items are retried on the next pass, hashed ones are not
        let mut pending = catalog.fetch_unhashed_ids().unwrap();
        pending.sort();
        assert_eq!(pending, vec!["absent", "corrupt"]);

        let sets = find_duplicate_sets(&catalog, 8).unwrap();
        assert_eq!(sets.len(), 1);
        assert_eq!(ids(&sets[0]), vec!["copy", "good"]);
        assert!(!ids(&sets[0]).contains(&"done"));
    }

    #[test]
    fn empty_batch_is_not_an_error() {
        let mut catalog = Catalog::from_records(vec![cached("done", Some(1))]);
        let report = fingerprint_pending(&mut catalog, 1).unwrap();
        assert!(report.hashed.is_empty() && report.failed.is_empty());
    }
}
