//! Share store: the two parallel share collections (D0, D1)

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::codec::{self, BitBlocks, BitTextDecoder};
use crate::constants::{DEFAULT_CHUNK_BITS, ITEM_SUFFIX};
use crate::{BitSequence, Error, Result};

/// Which of the two share collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Share {
    /// ShareA (D0), the canonical collection that drives enumeration
    A,
    /// ShareB (D1)
    B,
}

impl fmt::Display for Share {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Share::A => write!(f, "D0"),
            Share::B => write!(f, "D1"),
        }
    }
}

/// Stable item name, the share filename without its `.binary.txt` suffix
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Parse a share filename, `None` if it is not an item file
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        file_name
            .strip_suffix(ITEM_SUFFIX)
            .filter(|stem| !stem.is_empty())
            .map(|stem| Self(stem.to_string()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    /// Filename of this item inside a share directory
    pub fn file_name(&self) -> String {
        format!("{}{}", self.0, ITEM_SUFFIX)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Read-only view over the two share directories
#[derive(Debug, Clone)]
pub struct ShareStore {
    share_a: PathBuf,
    share_b: PathBuf,
    chunk_bits: usize,
}

impl ShareStore {
    /// Open a store over two share directories
    ///
    /// Both roots must exist; items are not scanned until [`enumerate`].
    ///
    /// [`enumerate`]: ShareStore::enumerate
    pub fn open(share_a: impl Into<PathBuf>, share_b: impl Into<PathBuf>) -> Result<Self> {
        let share_a = share_a.into();
        let share_b = share_b.into();

        for dir in [&share_a, &share_b] {
            if !dir.is_dir() {
                return Err(Error::DirectoryMissing(dir.clone()));
            }
        }

        Ok(Self {
            share_a,
            share_b,
            chunk_bits: DEFAULT_CHUNK_BITS,
        })
    }

    /// Set the bit chunk size used when reading shares
    pub fn with_chunk_bits(mut self, chunk_bits: usize) -> Self {
        self.chunk_bits = chunk_bits.max(1);
        self
    }

    pub fn chunk_bits(&self) -> usize {
        self.chunk_bits
    }

    /// Directory of a share collection
    pub fn share_dir(&self, share: Share) -> &Path {
        match share {
            Share::A => &self.share_a,
            Share::B => &self.share_b,
        }
    }

    /// Path of an item inside a share (whether or not it exists)
    pub fn share_path(&self, share: Share, item: &ItemId) -> PathBuf {
        self.share_dir(share).join(item.file_name())
    }

    /// List the items of ShareA in identifier order
    ///
    /// ShareA is authoritative: items present only in ShareB are not listed.
    /// An empty collection yields an empty list.
    pub fn enumerate(&self) -> Result<Vec<ItemId>> {
        let mut items = Vec::new();
        for entry in std::fs::read_dir(&self.share_a)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(item) = entry.file_name().to_str().and_then(ItemId::from_file_name) {
                items.push(item);
            }
        }
        items.sort();
        Ok(items)
    }

    /// Like [`enumerate`](ShareStore::enumerate), but an empty collection is
    /// an `EmptyDatabase` error
    pub fn enumerate_nonempty(&self) -> Result<Vec<ItemId>> {
        let items = self.enumerate()?;
        if items.is_empty() {
            return Err(Error::EmptyDatabase(self.share_a.clone()));
        }
        Ok(items)
    }

    /// Number of enumerated items
    pub fn item_count(&self) -> Result<usize> {
        Ok(self.enumerate()?.len())
    }

    /// Item at `index` in the enumeration order
    pub fn resolve(&self, index: usize) -> Result<ItemId> {
        let mut items = self.enumerate()?;
        let count = items.len();
        if index >= count {
            return Err(Error::InvalidIndex { index, count });
        }
        Ok(items.swap_remove(index))
    }

    fn open_share(&self, share: Share, item: &ItemId) -> Result<(PathBuf, BufReader<File>)> {
        let path = self.share_path(share, item);
        match File::open(&path) {
            Ok(file) => Ok((path, BufReader::new(file))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Error::NotFound {
                item: item.to_string(),
                share: share.to_string(),
            }),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Stream an item's bits from one share in blocks of `chunk_bits`
    pub fn share_blocks(&self, share: Share, item: &ItemId) -> Result<BitBlocks<BufReader<File>>> {
        let (_, reader) = self.open_share(share, item)?;
        Ok(BitBlocks::new(reader, self.chunk_bits))
    }

    /// Load an item's bits from one share
    pub fn load_share(&self, share: Share, item: &ItemId) -> Result<BitSequence> {
        let (path, reader) = self.open_share(share, item)?;
        let mut bits = BitSequence::new();
        for chunk in BitTextDecoder::with_chunk_bits(reader, self.chunk_bits) {
            bits.extend_from_slice(&chunk?);
        }
        tracing::debug!(
            item = %item,
            share = %share,
            path = %path.display(),
            bits = bits.len(),
            "Loaded share"
        );
        Ok(bits)
    }

    /// Load both shares of an item, checking that their lengths agree
    pub fn load_pair(&self, item: &ItemId) -> Result<(BitSequence, BitSequence)> {
        let a = self.load_share(Share::A, item)?;
        let b = self.load_share(Share::B, item)?;
        if a.len() != b.len() {
            return Err(Error::ShareLengthMismatch {
                item: item.to_string(),
                share_a: a.len(),
                share_b: b.len(),
            });
        }
        Ok((a, b))
    }

    /// Bit-length of an item in one share, counted without loading it
    pub fn bit_length(&self, share: Share, item: &ItemId) -> Result<u64> {
        let (_, reader) = self.open_share(share, item)?;
        Ok(codec::count_bits(reader, self.chunk_bits)?)
    }
}
