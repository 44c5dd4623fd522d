//! Difference-hash fingerprints.

use std::{fmt, path::Path, str::FromStr};

use base64::Engine;
use image::GrayImage;
use serde::{
    de::{Error as _, Unexpected},
    Deserialize, Serialize,
};

use crate::{
    error::{DecodeError, Error},
    normalize,
};

/// 64-bit perceptual signature of an image.
///
/// The value 0 is reserved for images without usable gradient signal (see
/// [`is_monochrome`]); it is a real, storable value distinct from "not yet
/// computed".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Fingerprint(pub u64);

impl Fingerprint {
    pub const SENTINEL: Fingerprint = Fingerprint(0);

    pub fn is_sentinel(self) -> bool {
        self == Self::SENTINEL
    }

    /// Number of differing bits, 0..=64.
    pub fn distance(&self, rhs: &Self) -> u32 {
        (self.0 ^ rhs.0).count_ones()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for Fingerprint {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        u64::from_str_radix(digits, 16).map(Fingerprint)
    }
}

impl Serialize for Fingerprint {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let engine = base64::engine::general_purpose::STANDARD;
        engine.encode(self.0.to_be_bytes()).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let string = String::deserialize(deserializer)?;
        let engine = base64::engine::general_purpose::STANDARD;
        let decoded = engine.decode(&string).map_err(|_| {
            D::Error::invalid_value(Unexpected::Str(&string), &"a base64-encoded string")
        })?;
        let raw = <[u8; 8]>::try_from(decoded.as_slice())
            .map_err(|_| D::Error::invalid_length(decoded.len(), &"8 bytes"))?;

        Ok(Fingerprint(u64::from_be_bytes(raw)))
    }
}

/// Hamming distance between two raw fingerprint values.
pub fn compare_fingerprints(a: u64, b: u64) -> u32 {
    Fingerprint(a).distance(&Fingerprint(b))
}

/// Fingerprint JPEG or PNG bytes.
pub fn compute_fingerprint(bytes: &[u8]) -> Result<Fingerprint, DecodeError> {
    normalize::normalize(bytes).map(|grid| fingerprint_grid(&grid))
}

pub fn fingerprint_file(path: impl AsRef<Path>) -> Result<Fingerprint, Error> {
    let bytes = std::fs::read(path)?;
    Ok(compute_fingerprint(&bytes)?)
}

/// Fingerprint an already normalized grid of any size.
pub fn fingerprint_grid(grid: &GrayImage) -> Fingerprint {
    if is_monochrome(grid) {
        return Fingerprint::SENTINEL;
    }
    Fingerprint(diff_hash(grid.as_raw(), grid.width() as usize))
}

/// True when more than two thirds of the pixels share one intensity after
/// crushing near-black to 0 and near-white to 255.
pub fn is_monochrome(grid: &GrayImage) -> bool {
    let total = grid.width() as f64 * grid.height() as f64;
    let border = (total * (2.0 / 3.0)) as usize;

    let mut counts = [0usize; 256];
    for &luma in grid.as_raw() {
        let luma = match luma {
            0..=7 => 0,
            248..=255 => 255,
            l => l,
        };
        counts[luma as usize] += 1;
    }

    counts.iter().any(|&count| count > border)
}

// Row-major, first comparison in the most significant emitted bit. Rows
// beyond 64 bits shift the earliest comparisons out.
fn diff_hash(luma: &[u8], row_stride: usize) -> u64 {
    if row_stride == 0 {
        return 0;
    }
    luma.chunks(row_stride)
        .flat_map(|row| row.windows(2).map(|v| v[0] > v[1]))
        .fold(0, |hash, bit| (hash << 1) | bit as u64)
}
