//! Mask persistence between the combiner and the reconstructor
//!
//! A session names the slot where the masks of one request live. The default
//! single-slot session uses `r1.txt`/`r2.txt` and is overwritten by every
//! request, so only one request may be in flight. A tagged session suffixes
//! the filenames with a request id, isolating concurrent requests.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use rand::Rng;

use crate::codec::{self, BitBlocks};
use crate::constants::DEFAULT_CHUNK_BITS;
use crate::{BitSequence, Error, Result};

/// The masks (r1, r2) drawn for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskPair {
    pub r1: BitSequence,
    pub r2: BitSequence,
}

impl MaskPair {
    /// Draw two independent uniform masks of `len` bits
    pub fn random<R: Rng + ?Sized>(len: usize, rng: &mut R) -> Self {
        let r1 = BitSequence::random(len, rng);
        let r2 = BitSequence::random(len, rng);
        Self { r1, r2 }
    }

    /// Mask length; both masks always have the same length
    pub fn len(&self) -> usize {
        self.r1.len()
    }

    pub fn is_empty(&self) -> bool {
        self.r1.is_empty()
    }
}

/// Storage slot for one request's masks
#[derive(Debug, Clone)]
pub struct Session {
    dir: PathBuf,
    request_id: Option<String>,
    chunk_bits: usize,
}

impl Session {
    /// The shared slot: `r1.txt` and `r2.txt` in `dir`
    pub fn single_slot(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            request_id: None,
            chunk_bits: DEFAULT_CHUNK_BITS,
        }
    }

    /// A slot private to `request_id`: `r1-<id>.txt` and `r2-<id>.txt`
    pub fn tagged(dir: impl Into<PathBuf>, request_id: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            request_id: Some(request_id.into()),
            chunk_bits: DEFAULT_CHUNK_BITS,
        }
    }

    /// A tagged slot with a random 64-bit request id
    pub fn fresh<R: Rng + ?Sized>(dir: impl Into<PathBuf>, rng: &mut R) -> Self {
        let id: u64 = rng.gen();
        Self::tagged(dir, format!("{:016x}", id))
    }

    pub fn with_chunk_bits(mut self, chunk_bits: usize) -> Self {
        self.chunk_bits = chunk_bits.max(1);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    fn mask_path(&self, name: &str) -> PathBuf {
        match &self.request_id {
            Some(id) => self.dir.join(format!("{}-{}.txt", name, id)),
            None => self.dir.join(format!("{}.txt", name)),
        }
    }

    pub fn r1_path(&self) -> PathBuf {
        self.mask_path("r1")
    }

    pub fn r2_path(&self) -> PathBuf {
        self.mask_path("r2")
    }

    /// Both mask artifacts exist
    pub fn has_masks(&self) -> bool {
        self.r1_path().is_file() && self.r2_path().is_file()
    }

    /// Write both masks, replacing whatever the slot held before
    ///
    /// If either write fails the slot is cleared, so a stale r1 is never
    /// paired with a fresh r2.
    pub fn persist_masks(&self, masks: &MaskPair) -> Result<()> {
        std::fs::create_dir_all(&self.dir).map_err(|source| Error::MaskPersist {
            path: self.dir.clone(),
            source,
        })?;

        let result = self
            .write_mask(&masks.r1, &self.r1_path())
            .and_then(|_| self.write_mask(&masks.r2, &self.r2_path()));

        if result.is_err() {
            if let Err(e) = self.clear() {
                tracing::warn!(
                    dir = %self.dir.display(),
                    error = %e,
                    "Failed to clear mask slot after persist failure"
                );
            }
        } else {
            tracing::debug!(
                r1 = %self.r1_path().display(),
                r2 = %self.r2_path().display(),
                bits = masks.len(),
                "Persisted masks"
            );
        }
        result
    }

    fn write_mask(&self, bits: &BitSequence, path: &Path) -> Result<()> {
        codec::write_bit_text_file(bits.as_slice(), path, self.chunk_bits).map_err(|e| match e {
            Error::Codec { path, source } => Error::MaskPersist { path, source },
            other => other,
        })
    }

    /// Both masks are present; a lone r1 or r2 is reported and ignored
    pub fn masks_present(&self) -> bool {
        if self.has_masks() {
            return true;
        }
        if self.r1_path().exists() || self.r2_path().exists() {
            tracing::warn!(dir = %self.dir.display(), "Incomplete mask pair, ignoring");
        }
        false
    }

    /// Load the masks, `None` when the slot is empty
    ///
    /// A slot holding only one of the two masks counts as empty.
    pub fn load_masks(&self) -> Result<Option<MaskPair>> {
        if !self.masks_present() {
            return Ok(None);
        }

        let r1 = codec::read_bit_text_file(&self.r1_path(), self.chunk_bits)?;
        let r2 = codec::read_bit_text_file(&self.r2_path(), self.chunk_bits)?;
        if r1.len() != r2.len() {
            return Err(Error::LengthMismatch {
                expected: r1.len(),
                actual: r2.len(),
            });
        }
        Ok(Some(MaskPair { r1, r2 }))
    }

    /// Bit lengths of r1 and r2, counted without loading them
    pub fn mask_lengths(&self) -> Result<(u64, u64)> {
        let count = |path: PathBuf| -> Result<u64> {
            let file = File::open(&path).map_err(|e| Error::codec(&path, e))?;
            codec::count_bits(BufReader::new(file), self.chunk_bits).map_err(|e| Error::codec(&path, e))
        };
        Ok((count(self.r1_path())?, count(self.r2_path())?))
    }

    /// Stream r1 and r2 in blocks of `block_bits`
    pub fn mask_blocks(
        &self,
        block_bits: usize,
    ) -> Result<(BitBlocks<BufReader<File>>, BitBlocks<BufReader<File>>)> {
        let open = |path: PathBuf| -> Result<BitBlocks<BufReader<File>>> {
            let file = File::open(&path).map_err(|e| Error::codec(&path, e))?;
            Ok(BitBlocks::new(BufReader::new(file), block_bits))
        };
        Ok((open(self.r1_path())?, open(self.r2_path())?))
    }

    /// Remove the mask artifacts, if present
    ///
    /// Both removals are attempted; the first failure is returned.
    pub fn clear(&self) -> Result<()> {
        let mut first_error = None;
        for path in [self.r1_path(), self.r2_path()] {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    first_error.get_or_insert(Error::Io(e));
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
