//! The storage side of duplicate detection.

use std::{
    collections::HashMap,
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{dhash::Fingerprint, error::StoreError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRecord {
    pub media_id: String,

    #[serde(default)]
    pub parent_url: String,

    #[serde(rename = "type", default = "default_media_type")]
    pub media_type: String,

    #[serde(default)]
    pub url: String,

    /// Milliseconds since the epoch.
    #[serde(default)]
    pub timestamp: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_millis: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,

    #[serde(default)]
    pub content_length: Option<u64>,

    /// `None` until computed. `Some(Fingerprint::SENTINEL)` is a computed value.
    #[serde(default)]
    pub content_hash: Option<Fingerprint>,

    #[serde(default)]
    pub cache_path: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_path: Option<PathBuf>,

    #[serde(default)]
    pub removed: bool,
}

fn default_media_type() -> String {
    "photo".to_string()
}

impl MediaRecord {
    pub fn new(media_id: impl Into<String>) -> Self {
        Self {
            media_id: media_id.into(),
            parent_url: String::new(),
            media_type: default_media_type(),
            url: String::new(),
            timestamp: 0,
            duration_millis: None,
            video_url: None,
            content_length: None,
            content_hash: None,
            cache_path: None,
            thumbnail_path: None,
            removed: false,
        }
    }

    /// Content has been downloaded in full.
    pub fn has_cache(&self) -> bool {
        self.content_length.is_some_and(|len| len > 0)
    }

    pub fn is_eligible(&self) -> bool {
        self.has_cache() && self.content_hash.is_some_and(|fp| !fp.is_sentinel())
    }

    pub fn is_unhashed(&self) -> bool {
        self.has_cache() && self.content_hash.is_none()
    }

    /// Thumbnail if one was made, otherwise the cached file itself.
    pub fn image_source(&self) -> Option<&Path> {
        self.thumbnail_path
            .as_deref()
            .or(self.cache_path.as_deref())
    }
}

/// Read/write contract duplicate detection needs from media storage.
pub trait MediaStore {
    /// Ids and fingerprints of cached media whose fingerprint is computed and
    /// not the sentinel.
    fn fetch_eligible_fingerprints(&self) -> Result<Vec<(String, Fingerprint)>, StoreError>;

    /// Records for those `ids` that exist, in the order given.
    fn fetch_media_records_by_ids(&self, ids: &[String]) -> Result<Vec<MediaRecord>, StoreError>;

    fn persist_fingerprint(
        &mut self,
        media_id: &str,
        fingerprint: Fingerprint,
    ) -> Result<(), StoreError>;

    /// Ids of cached media with no fingerprint yet.
    fn fetch_unhashed_ids(&self) -> Result<Vec<String>, StoreError>;

    /// The image bytes a fingerprint should be computed from.
    fn load_image_bytes(&self, media_id: &str) -> Result<Vec<u8>, StoreError>;
}

/// Media records kept in a JSON array on disk.
///
/// Relative cache and thumbnail paths resolve against the directory holding
/// the catalog file.
#[derive(Debug, Default)]
pub struct Catalog {
    path: Option<PathBuf>,
    records: Vec<MediaRecord>,
    index: HashMap<String, usize>,
}

impl Catalog {
    pub fn from_records(records: Vec<MediaRecord>) -> Self {
        let mut catalog = Catalog {
            path: None,
            records: Vec::with_capacity(records.len()),
            index: HashMap::new(),
        };
        for record in records {
            catalog.insert(record);
        }
        catalog
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let records: Vec<MediaRecord> = serde_json::from_reader(BufReader::new(file))?;

        let mut catalog = Self::from_records(records);
        catalog.path = Some(path.to_path_buf());
        Ok(catalog)
    }

    /// Write the records back to the file the catalog was opened from.
    ///
    /// A catalog built with [`Catalog::from_records`] has no such file and
    /// fails with [`StoreError::NoBackingFile`]; use [`Catalog::save_as`].
    pub fn save(&self) -> Result<(), StoreError> {
        let path = self.path.as_ref().ok_or(StoreError::NoBackingFile)?;
        self.save_as(path)
    }

    pub fn save_as(&self, path: &Path) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        };
        let mut writer = BufWriter::new(File::create(path).map_err(io_err)?);
        serde_json::to_writer_pretty(&mut writer, &self.records)?;
        writer.write_all(b"\n").map_err(io_err)?;
        writer.flush().map_err(io_err)
    }

    /// Add a record, replacing any record with the same id.
    pub fn insert(&mut self, record: MediaRecord) {
        match self.index.get(&record.media_id) {
            Some(&i) => self.records[i] = record,
            None => {
                self.index.insert(record.media_id.clone(), self.records.len());
                self.records.push(record);
            }
        }
    }

    pub fn get(&self, media_id: &str) -> Option<&MediaRecord> {
        self.index.get(media_id).map(|&i| &self.records[i])
    }

    pub fn records(&self) -> &[MediaRecord] {
        &self.records
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match self.path.as_deref().and_then(Path::parent) {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl MediaStore for Catalog {
    fn fetch_eligible_fingerprints(&self) -> Result<Vec<(String, Fingerprint)>, StoreError> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.is_eligible())
            .filter_map(|r| r.content_hash.map(|fp| (r.media_id.clone(), fp)))
            .collect())
    }

    fn fetch_media_records_by_ids(&self, ids: &[String]) -> Result<Vec<MediaRecord>, StoreError> {
        Ok(ids.iter().filter_map(|id| self.get(id)).cloned().collect())
    }

    fn persist_fingerprint(
        &mut self,
        media_id: &str,
        fingerprint: Fingerprint,
    ) -> Result<(), StoreError> {
        let &i = self
            .index
            .get(media_id)
            .ok_or_else(|| StoreError::UnknownMedia(media_id.to_string()))?;
        self.records[i].content_hash = Some(fingerprint);
        Ok(())
    }

    fn fetch_unhashed_ids(&self) -> Result<Vec<String>, StoreError> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.is_unhashed())
            .map(|r| r.media_id.clone())
            .collect())
    }

    fn load_image_bytes(&self, media_id: &str) -> Result<Vec<u8>, StoreError> {
        let record = self
            .get(media_id)
            .ok_or_else(|| StoreError::UnknownMedia(media_id.to_string()))?;
        let source = record
            .image_source()
            .ok_or_else(|| StoreError::NoImageSource(media_id.to_string()))?;
        let path = self.resolve(source);
        std::fs::read(&path).map_err(|source| StoreError::Io { path, source })
    }
}
